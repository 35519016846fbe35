use std::collections::HashMap;
use std::f64::consts::TAU;

use super::types::NodeId;
use super::view_state::VisibleGraph;
use crate::config::RadialConfig;

/// Where the radial layout puts a node, in world space around the origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
	pub x: f64,
	pub y: f64,
	/// Angle of the node's sector midpoint.
	pub angle: f64,
	/// Angular width of the sector the node owns.
	pub slice: f64,
}

/// Fixed-depth radial layout: one ring per level, children share their
/// parent's damped sector evenly. Root children split the full circle.
pub fn layout(visible: &VisibleGraph, config: &RadialConfig) -> HashMap<NodeId, Placement> {
	let mut placements: HashMap<NodeId, Placement> = HashMap::with_capacity(visible.nodes.len());

	// Pre-order guarantees parents are placed first.
	for node in &visible.nodes {
		let parent = node
			.parent
			.and_then(|p| placements.get(&p).map(|placement| (p, *placement)));
		let placement = match parent {
			None => Placement {
				x: 0.0,
				y: 0.0,
				angle: 0.0,
				slice: TAU,
			},
			Some((parent_id, p)) => {
				let parent_is_root = visible.get(parent_id).is_some_and(|v| v.parent.is_none());
				let width = if parent_is_root {
					TAU
				} else {
					p.slice * config.sector_damping
				};
				let slice = width / node.siblings.max(1) as f64;
				let angle = p.angle - width / 2.0 + (node.index as f64 + 0.5) * slice;
				let ring = config.band_radius(node.level);
				Placement {
					x: ring * angle.cos(),
					y: ring * angle.sin(),
					angle,
					slice,
				}
			}
		};
		placements.insert(node.id, placement);
	}
	placements
}
