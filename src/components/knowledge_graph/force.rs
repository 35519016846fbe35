//! Force-directed layout anchored to level rings.
//!
//! Charge repulsion and spring attraction are integrated by `force_graph`;
//! link distance, collision, centering and the radial ring constraint are
//! applied on top after every integration step. The root is anchored at the
//! origin. `alpha` cools every tick and the simulation stops once it drops
//! below `alpha_min`.

use std::collections::HashMap;
use std::f64::consts::TAU;

use force_graph::{EdgeData, ForceGraph, NodeData, SimulationParameters};
use log::{debug, warn};

use super::types::NodeId;
use super::view_state::VisibleGraph;
use crate::config::ForceConfig;

/// Per-body constants, indexed like `ForceLayout::slots`.
#[derive(Clone, Debug)]
struct BodyMeta {
	id: NodeId,
	radius: f64,
	target_radius: f64,
	seed: (f64, f64),
}

#[derive(Clone, Copy, Debug)]
struct Body {
	x: f64,
	y: f64,
	fixed: bool,
}

pub struct ForceLayout {
	graph: ForceGraph<NodeId, ()>,
	meta: Vec<BodyMeta>,
	slots: HashMap<NodeId, usize>,
	links: Vec<(usize, usize)>,
	root: Option<NodeId>,
	config: ForceConfig,
	alpha: f64,
	alpha_target: f64,
	running: bool,
}

impl ForceLayout {
	/// Builds a simulation over the visible projection. Nodes that were already
	/// on screen start from `previous`; new ones are seeded on their ring.
	pub fn new(
		visible: &VisibleGraph,
		config: &ForceConfig,
		previous: &HashMap<NodeId, (f64, f64)>,
	) -> Self {
		let mut graph = ForceGraph::new(SimulationParameters {
			force_charge: config.charge,
			force_spring: config.spring,
			force_max: 100.0,
			node_speed: 3000.0,
			damping_factor: 0.9,
		});

		let mut per_level: HashMap<usize, usize> = HashMap::new();
		for node in &visible.nodes {
			*per_level.entry(node.level).or_default() += 1;
		}
		let mut seen_in_level: HashMap<usize, usize> = HashMap::new();

		let (mut meta, mut slots, mut idx) = (Vec::new(), HashMap::new(), HashMap::new());
		let mut root = None;
		for node in &visible.nodes {
			let is_root = node.parent.is_none();
			let target_radius = config.target_radius(node.level);
			let index_in_level = seen_in_level.entry(node.level).or_default();
			let angle = (*index_in_level as f64 + 0.5) * TAU / per_level[&node.level] as f64;
			*index_in_level += 1;

			let seed = if is_root {
				(0.0, 0.0)
			} else {
				(target_radius * angle.cos(), target_radius * angle.sin())
			};
			let (x, y) = if is_root {
				seed
			} else {
				previous.get(&node.id).copied().unwrap_or(seed)
			};
			if is_root && root.is_none() {
				root = Some(node.id);
			}

			let node_idx = graph.add_node(NodeData {
				x: x as f32,
				y: y as f32,
				mass: 1.0,
				is_anchor: is_root,
				user_data: node.id,
			});
			idx.insert(node.id, node_idx);
			slots.insert(node.id, meta.len());
			meta.push(BodyMeta {
				id: node.id,
				radius: config.node_radius(node.level),
				target_radius,
				seed,
			});
		}

		let mut links = Vec::with_capacity(visible.links.len());
		for (source, target) in &visible.links {
			if let (Some(&src), Some(&tgt)) = (idx.get(source), idx.get(target)) {
				graph.add_edge(src, tgt, EdgeData::default());
				links.push((slots[source], slots[target]));
			}
		}
		debug!(
			"Force layout started with {} nodes and {} links",
			meta.len(),
			links.len()
		);

		Self {
			graph,
			meta,
			slots,
			links,
			root,
			config: config.clone(),
			alpha: 1.0,
			alpha_target: 0.0,
			running: true,
		}
	}

	pub fn is_running(&self) -> bool {
		self.running
	}

	pub fn alpha(&self) -> f64 {
		self.alpha
	}

	pub fn node_radius(&self, id: NodeId) -> Option<f64> {
		self.slots.get(&id).map(|&i| self.meta[i].radius)
	}

	/// Halts the simulation; positions stay where they are.
	pub fn stop(&mut self) {
		self.running = false;
	}

	/// Advances one tick. Returns whether the simulation is still running.
	pub fn step(&mut self, dt: f32) -> bool {
		if !self.running {
			return false;
		}
		self.alpha += (self.alpha_target - self.alpha) * self.config.alpha_decay;
		if self.alpha < self.config.alpha_min {
			self.running = false;
			return false;
		}

		self.graph.update(dt * self.alpha as f32);
		let mut bodies = self.read_bodies();
		self.apply_links(&mut bodies);
		self.apply_collisions(&mut bodies);
		self.apply_centering(&mut bodies);
		self.apply_radial(&mut bodies);
		self.write_bodies(&bodies);
		true
	}

	/// Current positions in world space.
	pub fn positions(&self) -> Vec<(NodeId, f64, f64)> {
		self.read_bodies()
			.iter()
			.zip(&self.meta)
			.map(|(b, m)| (m.id, b.x, b.y))
			.collect()
	}

	/// Fixes a node under the pointer and keeps the simulation warm while dragging.
	pub fn pin(&mut self, id: NodeId, x: f64, y: f64) {
		if !self.slots.contains_key(&id) {
			return;
		}
		self.graph.visit_nodes_mut(|node| {
			if node.data.user_data == id {
				node.data.x = x as f32;
				node.data.y = y as f32;
				node.data.is_anchor = true;
			}
		});
		self.alpha_target = self.config.drag_alpha_target;
		if self.alpha < self.alpha_target {
			self.alpha = self.alpha_target;
		}
		self.running = true;
	}

	/// Lets a dragged node go; the simulation cools down from here.
	pub fn release(&mut self, id: NodeId) {
		let root = self.root;
		self.graph.visit_nodes_mut(|node| {
			if node.data.user_data == id && Some(id) != root {
				node.data.is_anchor = false;
			}
		});
		self.alpha_target = 0.0;
	}

	fn read_bodies(&self) -> Vec<Body> {
		let mut bodies: Vec<Body> = self
			.meta
			.iter()
			.map(|m| Body {
				x: m.seed.0,
				y: m.seed.1,
				fixed: false,
			})
			.collect();
		let mut reseeded = 0;
		self.graph.visit_nodes(|node| {
			let Some(&slot) = self.slots.get(&node.data.user_data) else {
				return;
			};
			let (x, y) = (node.x() as f64, node.y() as f64);
			let body = &mut bodies[slot];
			body.fixed = node.data.is_anchor;
			if x.is_finite() && y.is_finite() {
				body.x = x;
				body.y = y;
			} else {
				reseeded += 1;
			}
		});
		if reseeded > 0 {
			warn!("Re-seeded {} nodes with non-finite positions", reseeded);
		}
		bodies
	}

	fn write_bodies(&mut self, bodies: &[Body]) {
		let slots = &self.slots;
		self.graph.visit_nodes_mut(|node| {
			if let Some(&slot) = slots.get(&node.data.user_data) {
				let body = bodies[slot];
				if !body.fixed {
					node.data.x = body.x as f32;
					node.data.y = body.y as f32;
				}
			}
		});
	}

	/// Pulls linked nodes toward `link_distance`.
	fn apply_links(&self, bodies: &mut [Body]) {
		let k = self.config.link_strength * self.alpha;
		for &(a, b) in &self.links {
			let (dx, dy) = (bodies[b].x - bodies[a].x, bodies[b].y - bodies[a].y);
			let dist = (dx * dx + dy * dy).sqrt();
			if dist < 1e-6 {
				continue;
			}
			let shift = (dist - self.config.link_distance) / dist * k;
			let (share_a, share_b) = match (bodies[a].fixed, bodies[b].fixed) {
				(true, true) => continue,
				(true, false) => (0.0, 1.0),
				(false, true) => (1.0, 0.0),
				(false, false) => (0.5, 0.5),
			};
			bodies[a].x += dx * shift * share_a;
			bodies[a].y += dy * shift * share_a;
			bodies[b].x -= dx * shift * share_b;
			bodies[b].y -= dy * shift * share_b;
		}
	}

	/// Separates overlapping circles, padded by `collision_padding` each.
	fn apply_collisions(&self, bodies: &mut [Body]) {
		let pad = self.config.collision_padding;
		for i in 0..bodies.len() {
			for j in (i + 1)..bodies.len() {
				let min = self.meta[i].radius + self.meta[j].radius + 2.0 * pad;
				let (mut dx, mut dy) = (bodies[j].x - bodies[i].x, bodies[j].y - bodies[i].y);
				let mut dist = (dx * dx + dy * dy).sqrt();
				if dist >= min {
					continue;
				}
				if dist < 1e-6 {
					// Coincident: split along a deterministic direction.
					let angle = j as f64;
					(dx, dy, dist) = (angle.cos() * 1e-3, angle.sin() * 1e-3, 1e-3);
				}
				let push = (min - dist) / dist * self.config.collision_strength;
				let (share_i, share_j) = match (bodies[i].fixed, bodies[j].fixed) {
					(true, true) => continue,
					(true, false) => (0.0, 1.0),
					(false, true) => (1.0, 0.0),
					(false, false) => (0.5, 0.5),
				};
				bodies[i].x -= dx * push * share_i;
				bodies[i].y -= dy * push * share_i;
				bodies[j].x += dx * push * share_j;
				bodies[j].y += dy * push * share_j;
			}
		}
	}

	/// Weakly drags the centroid of free nodes back to the origin.
	fn apply_centering(&self, bodies: &mut [Body]) {
		let free: Vec<usize> = (0..bodies.len()).filter(|&i| !bodies[i].fixed).collect();
		if free.is_empty() {
			return;
		}
		let n = free.len() as f64;
		let (cx, cy) = free.iter().fold((0.0, 0.0), |(sx, sy), &i| {
			(sx + bodies[i].x / n, sy + bodies[i].y / n)
		});
		let k = self.config.center_strength * self.alpha;
		for i in free {
			bodies[i].x -= cx * k;
			bodies[i].y -= cy * k;
		}
	}

	/// Moves every free node toward its level ring. Not scaled by alpha, so
	/// the rings hold even after the simulation has cooled.
	fn apply_radial(&self, bodies: &mut [Body]) {
		for (body, meta) in bodies.iter_mut().zip(&self.meta) {
			if body.fixed || Some(meta.id) == self.root {
				continue;
			}
			let r = (body.x * body.x + body.y * body.y).sqrt();
			if r < 1e-6 {
				(body.x, body.y) = meta.seed;
				continue;
			}
			let k = (meta.target_radius - r) / r * self.config.radial_strength;
			body.x += body.x * k;
			body.y += body.y * k;
		}
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;
	use crate::components::knowledge_graph::normalize::normalize;
	use crate::components::knowledge_graph::types::KnowledgeTree;
	use crate::components::knowledge_graph::view_state::GraphViewState;

	const DT: f32 = 0.016;

	fn settle(layout: &mut ForceLayout) -> usize {
		let mut ticks = 0;
		while layout.step(DT) && ticks < 5000 {
			ticks += 1;
		}
		ticks
	}

	fn star(children: usize) -> (KnowledgeTree, VisibleGraph) {
		let mut nodes = vec![json!({"id": 1, "parentId": -1, "nodeName": "Root"})];
		for i in 0..children {
			nodes.push(json!({"id": 10 + i, "parentId": 1, "nodeName": format!("C{i}")}));
		}
		let tree = normalize(&json!({ "mocKgNodeDtoList": nodes }));
		let mut state = GraphViewState::new(&tree);
		state.expand_all(&tree);
		let visible = state.visible(&tree);
		(tree, visible)
	}

	fn radius_of(layout: &ForceLayout, id: NodeId) -> f64 {
		let (_, x, y) = layout
			.positions()
			.into_iter()
			.find(|(n, _, _)| *n == id)
			.unwrap();
		(x * x + y * y).sqrt()
	}

	#[test]
	fn children_settle_near_first_ring() {
		let (tree, visible) = star(5);
		let config = ForceConfig::default();
		let mut layout = ForceLayout::new(&visible, &config, &HashMap::new());
		let ticks = settle(&mut layout);
		assert!(!layout.is_running());
		assert!(ticks > 0 && ticks < 5000);

		for child in tree.children(NodeId(1)) {
			let r = radius_of(&layout, child.id);
			assert!((r - 280.0).abs() <= 280.0 * 0.15, "child {} at radius {}", child.id, r);
		}
		assert_eq!(radius_of(&layout, NodeId(1)), 0.0);
		assert!(layout.positions().iter().all(|(_, x, y)| x.is_finite() && y.is_finite()));
	}

	#[test]
	fn dragging_pins_until_release() {
		let (_, visible) = star(3);
		let config = ForceConfig::default();
		let mut layout = ForceLayout::new(&visible, &config, &HashMap::new());
		settle(&mut layout);

		layout.pin(NodeId(10), 500.0, 0.0);
		assert!(layout.is_running());
		for _ in 0..50 {
			layout.step(DT);
		}
		let (_, x, y) = layout
			.positions()
			.into_iter()
			.find(|(n, _, _)| *n == NodeId(10))
			.unwrap();
		assert_eq!((x, y), (500.0, 0.0));
		assert!(layout.alpha() >= config.drag_alpha_target * 0.99);

		layout.release(NodeId(10));
		settle(&mut layout);
		assert!(!layout.is_running());
		let r = radius_of(&layout, NodeId(10));
		assert!((r - 280.0).abs() <= 280.0 * 0.15);
	}

	#[test]
	fn deeper_levels_target_outer_rings_and_shrink() {
		let tree = normalize(&json!({
			"mocKgNodeDtoList": [
				{"id": 1, "parentId": -1, "nodeName": "Root"},
				{"id": 2, "parentId": 1, "nodeName": "A"},
				{"id": 3, "parentId": 2, "nodeName": "A1"}
			]
		}));
		let mut state = GraphViewState::new(&tree);
		state.expand_all(&tree);
		let config = ForceConfig::default();
		let mut layout = ForceLayout::new(&state.visible(&tree), &config, &HashMap::new());
		settle(&mut layout);

		let r = radius_of(&layout, NodeId(3));
		assert!((r - 530.0).abs() <= 530.0 * 0.15, "grandchild at {}", r);
		assert!(layout.node_radius(NodeId(3)).unwrap() < layout.node_radius(NodeId(2)).unwrap());
	}

	#[test]
	fn persisting_nodes_start_where_they_were() {
		let (_, visible) = star(2);
		let previous = HashMap::from([(NodeId(10), (123.0, 45.0))]);
		let layout = ForceLayout::new(&visible, &ForceConfig::default(), &previous);
		let (_, x, y) = layout
			.positions()
			.into_iter()
			.find(|(n, _, _)| *n == NodeId(10))
			.unwrap();
		assert_eq!((x, y), (123.0, 45.0));
	}

	#[test]
	fn stopped_layout_does_not_move() {
		let (_, visible) = star(4);
		let mut layout = ForceLayout::new(&visible, &ForceConfig::default(), &HashMap::new());
		layout.step(DT);
		layout.stop();
		let before = layout.positions();
		assert!(!layout.step(DT));
		assert_eq!(layout.positions(), before);
	}
}
