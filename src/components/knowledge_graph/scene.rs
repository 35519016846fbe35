//! Retained scene elements keyed by node id, with enter/update/exit
//! transitions between layout passes.

use std::collections::{HashMap, HashSet};

use super::types::NodeId;

pub fn ease_out_cubic(t: f64) -> f64 {
	1.0 - (1.0 - t).powi(3)
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Visual {
	pub x: f64,
	pub y: f64,
	pub radius: f64,
	pub opacity: f64,
}

impl Visual {
	pub fn at(x: f64, y: f64, radius: f64) -> Self {
		Self {
			x,
			y,
			radius,
			opacity: 1.0,
		}
	}

	/// Zero-size, transparent visual at a point.
	pub fn hidden(x: f64, y: f64) -> Self {
		Self {
			x,
			y,
			radius: 0.0,
			opacity: 0.0,
		}
	}

	fn lerp(&self, to: &Visual, t: f64) -> Visual {
		let mix = |a: f64, b: f64| a + (b - a) * t;
		Visual {
			x: mix(self.x, to.x),
			y: mix(self.y, to.y),
			radius: mix(self.radius, to.radius),
			opacity: mix(self.opacity, to.opacity),
		}
	}
}

/// Identity of a drawn element. Survives every update for as long as its node
/// stays visible.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementKey(u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
	Entering,
	Persisting,
	Exiting,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SceneElement {
	pub key: ElementKey,
	pub id: NodeId,
	pub parent: Option<NodeId>,
	pub phase: Phase,
	pub expanded: bool,
	from: Visual,
	to: Visual,
}

/// Desired end state of one visible node after a layout pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Target {
	pub id: NodeId,
	pub parent: Option<NodeId>,
	pub visual: Visual,
	pub expanded: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Partition {
	pub entering: Vec<NodeId>,
	pub persisting: Vec<NodeId>,
	pub exiting: Vec<NodeId>,
}

/// Splits two keyed sets. `entering` and `persisting` follow `next` order,
/// `exiting` follows `prev` order.
pub fn partition(prev: &[NodeId], next: &[NodeId]) -> Partition {
	let (prev_set, next_set): (HashSet<_>, HashSet<_>) =
		(prev.iter().collect(), next.iter().collect());
	let (entering, persisting) = next.iter().partition(|id| !prev_set.contains(id));
	Partition {
		entering,
		persisting,
		exiting: prev
			.iter()
			.filter(|id| !next_set.contains(id))
			.copied()
			.collect(),
	}
}

#[derive(Debug, Default)]
pub struct Scene {
	elements: Vec<SceneElement>,
	index: HashMap<NodeId, usize>,
	next_key: u64,
	elapsed: f64,
	duration: f64,
}

impl Scene {
	pub fn elements(&self) -> &[SceneElement] {
		&self.elements
	}

	pub fn get(&self, id: NodeId) -> Option<&SceneElement> {
		self.index.get(&id).map(|&i| &self.elements[i])
	}

	pub fn is_animating(&self) -> bool {
		self.elapsed < self.duration
	}

	fn progress(&self) -> f64 {
		if self.duration <= 0.0 {
			1.0
		} else {
			ease_out_cubic((self.elapsed / self.duration).clamp(0.0, 1.0))
		}
	}

	/// Where an element is drawn right now.
	pub fn visual(&self, element: &SceneElement) -> Visual {
		element.from.lerp(&element.to, self.progress())
	}

	/// Applies a new layout pass. Any running transition is cut short and the
	/// next one starts from where elements currently are.
	pub fn update(&mut self, targets: &[Target], duration_ms: f64) -> Partition {
		let previous: Vec<NodeId> = self.elements.iter().map(|e| e.id).collect();
		let next: Vec<NodeId> = targets.iter().map(|t| t.id).collect();
		let split = partition(&previous, &next);

		let progress = self.progress();
		let current: HashMap<NodeId, (Visual, SceneElement)> = self
			.elements
			.drain(..)
			.map(|e| (e.id, (e.from.lerp(&e.to, progress), e)))
			.collect();
		let targets_by_id: HashMap<NodeId, &Target> =
			targets.iter().map(|t| (t.id, t)).collect();

		let mut elements = Vec::with_capacity(targets.len() + split.exiting.len());
		for target in targets {
			let element = match current.get(&target.id) {
				// Also revives an element that was still fading out.
				Some((visual, old)) => SceneElement {
					key: old.key,
					id: target.id,
					parent: target.parent,
					phase: Phase::Persisting,
					expanded: target.expanded,
					from: *visual,
					to: target.visual,
				},
				None => {
					let origin = Self::entry_origin(target, &current, &targets_by_id);
					self.next_key += 1;
					SceneElement {
						key: ElementKey(self.next_key),
						id: target.id,
						parent: target.parent,
						phase: Phase::Entering,
						expanded: target.expanded,
						from: Visual::hidden(origin.0, origin.1),
						to: target.visual,
					}
				}
			};
			elements.push(element);
		}

		let mut leaving: Vec<&(Visual, SceneElement)> = current
			.values()
			.filter(|(_, e)| !targets_by_id.contains_key(&e.id))
			.collect();
		leaving.sort_by_key(|(_, e)| e.key);
		for (visual, old) in leaving {
			let anchor = Self::exit_anchor(old, &current, &targets_by_id)
				.unwrap_or((visual.x, visual.y));
			elements.push(SceneElement {
				phase: Phase::Exiting,
				from: *visual,
				to: Visual::hidden(anchor.0, anchor.1),
				..old.clone()
			});
		}

		self.elements = elements;
		self.elapsed = 0.0;
		self.duration = duration_ms.max(0.0);
		self.reindex();
		if self.duration == 0.0 {
			self.finish();
		}
		split
	}

	/// Nearest ancestor's prior position, else its new one.
	fn entry_origin(
		target: &Target,
		current: &HashMap<NodeId, (Visual, SceneElement)>,
		targets: &HashMap<NodeId, &Target>,
	) -> (f64, f64) {
		let mut parent = target.parent;
		let mut hops = 0;
		while let Some(p) = parent {
			if let Some((visual, _)) = current.get(&p) {
				return (visual.x, visual.y);
			}
			hops += 1;
			if hops > targets.len() {
				break;
			}
			parent = targets.get(&p).and_then(|t| t.parent);
		}
		target
			.parent
			.and_then(|p| targets.get(&p))
			.map(|t| (t.visual.x, t.visual.y))
			.unwrap_or((target.visual.x, target.visual.y))
	}

	/// New position of the nearest ancestor that is still visible.
	fn exit_anchor(
		element: &SceneElement,
		current: &HashMap<NodeId, (Visual, SceneElement)>,
		targets: &HashMap<NodeId, &Target>,
	) -> Option<(f64, f64)> {
		let mut parent = element.parent;
		let mut hops = 0;
		while let Some(p) = parent {
			if let Some(t) = targets.get(&p) {
				return Some((t.visual.x, t.visual.y));
			}
			hops += 1;
			if hops > current.len() {
				break;
			}
			parent = current.get(&p).and_then(|(_, e)| e.parent);
		}
		None
	}

	/// Moves an element without a transition, as the force simulation does every tick.
	pub fn move_to(&mut self, id: NodeId, x: f64, y: f64) {
		if let Some(&i) = self.index.get(&id) {
			let element = &mut self.elements[i];
			element.from.x = x;
			element.from.y = y;
			element.to.x = x;
			element.to.y = y;
		}
	}

	pub fn advance(&mut self, dt_ms: f64) {
		if !self.is_animating() {
			return;
		}
		self.elapsed += dt_ms;
		if self.elapsed >= self.duration {
			self.finish();
		}
	}

	fn finish(&mut self) {
		self.elapsed = self.duration;
		self.elements.retain(|e| e.phase != Phase::Exiting);
		for element in &mut self.elements {
			element.from = element.to;
			element.phase = Phase::Persisting;
		}
		self.reindex();
	}

	fn reindex(&mut self) {
		self.index = self
			.elements
			.iter()
			.enumerate()
			.map(|(i, e)| (e.id, i))
			.collect();
	}

	/// Topmost non-exiting element under a world-space point.
	pub fn element_at(&self, x: f64, y: f64, slop: f64) -> Option<NodeId> {
		self.elements
			.iter()
			.rev()
			.filter(|e| e.phase != Phase::Exiting)
			.find(|e| {
				let v = self.visual(e);
				let (dx, dy) = (v.x - x, v.y - y);
				(dx * dx + dy * dy).sqrt() <= v.radius + slop
			})
			.map(|e| e.id)
	}
}
