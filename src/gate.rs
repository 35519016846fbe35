//! Liveness flag shared between a mounted view and the work it started.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Open while its view is mounted. `on_cleanup` closes it, so the handle is
/// `Send + Sync` even though everything runs on one thread.
#[derive(Clone, Debug)]
pub struct LoadGate(Arc<AtomicBool>);

impl Default for LoadGate {
	fn default() -> Self {
		Self(Arc::new(AtomicBool::new(true)))
	}
}

impl LoadGate {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn is_open(&self) -> bool {
		self.0.load(Ordering::Relaxed)
	}

	pub fn close(&self) {
		self.0.store(false, Ordering::Relaxed);
	}

	/// Passes `value` through while the view is mounted and drops it afterwards.
	pub fn accept<T>(&self, value: T) -> Option<T> {
		self.is_open().then_some(value)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn responses_pass_while_mounted() {
		let gate = LoadGate::new();
		let result: Result<u32, String> = Ok(7);
		assert_eq!(gate.accept(result), Some(Ok(7)));
	}

	#[test]
	fn late_responses_are_dropped_after_teardown() {
		let gate = LoadGate::new();
		let cleanup = gate.clone();
		cleanup.close();
		assert!(!gate.is_open());
		let result: Result<u32, String> = Err("timeout".into());
		assert_eq!(gate.accept(result), None);
	}
}
