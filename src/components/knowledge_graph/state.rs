use std::collections::{HashMap, HashSet};

use log::debug;

use super::force::ForceLayout;
use super::radial;
use super::scene::{Scene, Target, Visual};
use super::types::{KnowledgeTree, NodeId, NodeKind, Resource};
use super::view_state::{GraphViewState, Toggle, VisibleGraph};
use crate::config::{GraphConfig, LayoutMode};

/// Extra world-space slack around a node circle that still counts as a hit.
pub const HIT_SLOP: f64 = 4.0;
/// Pointer travel, in screen pixels, that turns a press into a drag.
pub const DRAG_THRESHOLD: f64 = 3.0;

/// What the host page receives when a node is clicked.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeSelection {
	pub id: NodeId,
	pub name: String,
	pub kind: NodeKind,
	pub completed: bool,
	pub resources: Vec<Resource>,
	pub description: Option<String>,
	pub has_children: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GraphStats {
	pub visible: usize,
	pub total: usize,
}

#[derive(Clone, Debug, Default)]
pub struct ViewTransform {
	pub x: f64,
	pub y: f64,
	pub k: f64,
}

#[derive(Clone, Debug, Default)]
pub struct DragState {
	pub active: bool,
	pub node: Option<NodeId>,
	pub moved: bool,
	pub start_x: f64,
	pub start_y: f64,
}

#[derive(Clone, Debug, Default)]
pub struct PanState {
	pub active: bool,
	pub start_x: f64,
	pub start_y: f64,
	pub transform_start_x: f64,
	pub transform_start_y: f64,
}

#[derive(Clone, Debug, Default)]
pub struct HoverState {
	pub node: Option<NodeId>,
	pub neighbors: HashSet<NodeId>,
	pub highlight_t: f64,
}

pub struct KnowledgeGraphState {
	tree: KnowledgeTree,
	view: GraphViewState,
	visible: VisibleGraph,
	mode: LayoutMode,
	simulation: Option<ForceLayout>,
	scene: Scene,
	config: GraphConfig,
	pub transform: ViewTransform,
	pub drag: DragState,
	pub pan: PanState,
	pub hover: HoverState,
	pub width: f64,
	pub height: f64,
	pub show_relations: bool,
	pub flow_time: f64,
}

impl KnowledgeGraphState {
	pub fn new(tree: KnowledgeTree, config: &GraphConfig, width: f64, height: f64) -> Self {
		let mode = config.layout.resolve(tree.shape);
		let view = GraphViewState::new(&tree);
		let mut state = Self {
			view,
			visible: VisibleGraph::default(),
			mode,
			simulation: None,
			scene: Scene::default(),
			config: config.clone(),
			transform: ViewTransform {
				x: width / 2.0,
				y: height / 2.0,
				k: 1.0,
			},
			drag: DragState::default(),
			pan: PanState::default(),
			hover: HoverState::default(),
			width,
			height,
			show_relations: config.show_relations,
			flow_time: 0.0,
			tree,
		};
		state.transform.k = state.fit_scale();
		state.relayout();
		debug!(
			"Knowledge graph ready: {} nodes, {:?} layout",
			state.tree.len(),
			state.mode
		);
		state
	}

	pub fn tree(&self) -> &KnowledgeTree {
		&self.tree
	}

	pub fn view(&self) -> &GraphViewState {
		&self.view
	}

	pub fn visible(&self) -> &VisibleGraph {
		&self.visible
	}

	pub fn scene(&self) -> &Scene {
		&self.scene
	}

	#[cfg(test)]
	pub fn mode(&self) -> LayoutMode {
		self.mode
	}

	#[cfg(test)]
	pub fn simulation(&self) -> Option<&ForceLayout> {
		self.simulation.as_ref()
	}

	pub fn stats(&self) -> GraphStats {
		GraphStats {
			visible: self.visible.nodes.len(),
			total: self.tree.len(),
		}
	}

	/// Scale that fits the outermost ring of the deepest level on screen.
	fn fit_scale(&self) -> f64 {
		let depth = self.tree.iter().map(|n| n.level).max().unwrap_or(0);
		let extent = match self.mode {
			LayoutMode::Force => {
				self.config.force.target_radius(depth) + self.config.force.node_radius(depth)
			}
			_ => self.config.radial.band_radius(depth) + self.config.radial.root_radius,
		};
		let half = self.width.min(self.height) / 2.0 - 20.0;
		if extent <= 0.0 || half <= 0.0 {
			return 1.0;
		}
		(half / extent).clamp(0.1, 1.0)
	}

	pub fn selection(&self, id: NodeId) -> Option<NodeSelection> {
		let node = self.tree.get(id)?;
		Some(NodeSelection {
			id: node.id,
			name: node.name.clone(),
			kind: node.kind,
			completed: node.completed,
			resources: node.resources.clone(),
			description: node.description.clone(),
			has_children: node.has_children(),
		})
	}

	/// First half of a click: records the selection and returns what the host
	/// page is told. Nothing is laid out yet.
	pub fn select(&mut self, id: NodeId) -> Option<NodeSelection> {
		let selection = self.selection(id)?;
		self.view.select(id);
		debug!(
			"Node clicked: {} ({:?}, {} resources)",
			selection.name,
			selection.kind,
			selection.resources.len()
		);
		Some(selection)
	}

	pub fn toggle(&mut self, id: NodeId) -> Toggle {
		let outcome = self.view.toggle(&self.tree, id);
		if outcome != Toggle::Leaf {
			self.relayout();
		}
		outcome
	}

	pub fn expand_all(&mut self) {
		self.view.expand_all(&self.tree);
		self.relayout();
	}

	pub fn collapse_all(&mut self) {
		self.view.collapse_all(&self.tree);
		self.relayout();
	}

	/// Recomputes the visible projection and starts a fresh layout pass,
	/// stopping whichever pass was still running.
	pub fn relayout(&mut self) {
		self.visible = self.view.visible(&self.tree);
		if let Some(mut previous) = self.simulation.take() {
			previous.stop();
		}

		match self.mode {
			LayoutMode::Force => {
				let positions: HashMap<NodeId, (f64, f64)> = self
					.scene
					.elements()
					.iter()
					.map(|e| {
						let v = self.scene.visual(e);
						(e.id, (v.x, v.y))
					})
					.collect();
				let simulation = ForceLayout::new(&self.visible, &self.config.force, &positions);
				let placed: HashMap<NodeId, (f64, f64)> = simulation
					.positions()
					.into_iter()
					.map(|(id, x, y)| (id, (x, y)))
					.collect();
				let targets = self.targets(|node| {
					let (x, y) = placed.get(&node).copied().unwrap_or_default();
					let radius = simulation.node_radius(node).unwrap_or_default();
					Visual::at(x, y, radius)
				});
				self.scene.update(&targets, 0.0);
				self.simulation = Some(simulation);
			}
			_ => {
				let placements = radial::layout(&self.visible, &self.config.radial);
				let (tree, sizes) = (&self.tree, &self.config.radial);
				let targets = self.targets(|node| {
					let p = placements.get(&node).copied();
					let radius = tree.get(node).map_or(0.0, |n| sizes.node_radius(n.kind));
					p.map_or(Visual::at(0.0, 0.0, radius), |p| Visual::at(p.x, p.y, radius))
				});
				self.scene.update(&targets, self.config.radial.transition_ms);
			}
		}

		if let Some(hovered) = self.hover.node.filter(|id| !self.visible.contains(*id)) {
			debug!("Hovered node {} is no longer visible", hovered);
			self.set_hover(None);
		}
	}

	fn targets(&self, mut visual: impl FnMut(NodeId) -> Visual) -> Vec<Target> {
		self.visible
			.nodes
			.iter()
			.map(|n| Target {
				id: n.id,
				parent: n.parent,
				visual: visual(n.id),
				expanded: n.expanded,
			})
			.collect()
	}

	pub fn screen_to_graph(&self, sx: f64, sy: f64) -> (f64, f64) {
		(
			(sx - self.transform.x) / self.transform.k,
			(sy - self.transform.y) / self.transform.k,
		)
	}

	pub fn node_at_position(&self, sx: f64, sy: f64) -> Option<NodeId> {
		let (gx, gy) = self.screen_to_graph(sx, sy);
		self.scene.element_at(gx, gy, HIT_SLOP)
	}

	pub fn set_hover(&mut self, node: Option<NodeId>) {
		if self.hover.node == node {
			return;
		}
		self.hover.node = node;
		self.hover.neighbors.clear();
		let Some(id) = node else {
			return;
		};
		let relations = self.visible.relations.iter().map(|r| (r.from, r.to));
		for (a, b) in self.visible.links.iter().copied().chain(relations) {
			if a == id {
				self.hover.neighbors.insert(b);
			} else if b == id {
				self.hover.neighbors.insert(a);
			}
		}
	}

	pub fn is_highlighted(&self, id: NodeId) -> bool {
		self.hover.node == Some(id) || self.hover.neighbors.contains(&id)
	}

	pub fn has_active_highlight(&self) -> bool {
		self.hover.node.is_some() && self.hover.highlight_t > 0.01
	}

	/// Records a press on a node; it becomes a click or a drag on release.
	pub fn press(&mut self, node: NodeId, sx: f64, sy: f64) {
		self.drag = DragState {
			active: true,
			node: Some(node),
			moved: false,
			start_x: sx,
			start_y: sy,
		};
	}

	/// Follows the pointer while a node is pressed. Only the force layout
	/// lets nodes be moved; the radial layout keeps them on their rings.
	pub fn drag_to(&mut self, sx: f64, sy: f64) {
		let Some(node) = self.drag.node.filter(|_| self.drag.active) else {
			return;
		};
		let (dx, dy) = (sx - self.drag.start_x, sy - self.drag.start_y);
		if !self.drag.moved && (dx * dx + dy * dy).sqrt() < DRAG_THRESHOLD {
			return;
		}
		self.drag.moved = true;
		let (gx, gy) = self.screen_to_graph(sx, sy);
		if let Some(simulation) = self.simulation.as_mut() {
			simulation.pin(node, gx, gy);
			self.scene.move_to(node, gx, gy);
		}
	}

	/// Ends a press. Returns the node when the press was a click rather than a drag.
	pub fn release(&mut self) -> Option<NodeId> {
		let drag = std::mem::take(&mut self.drag);
		let node = drag.node.filter(|_| drag.active)?;
		if !drag.moved {
			return Some(node);
		}
		if let Some(simulation) = self.simulation.as_mut() {
			simulation.release(node);
		}
		None
	}

	pub fn tick(&mut self, dt_ms: f64) {
		self.scene.advance(dt_ms);
		if let Some(simulation) = self.simulation.as_mut() {
			let was_running = simulation.is_running();
			if simulation.step((dt_ms / 1000.0) as f32) {
				for (id, x, y) in simulation.positions() {
					self.scene.move_to(id, x, y);
				}
			} else if was_running {
				debug!("Force layout settled at alpha {:.4}", simulation.alpha());
			}
		}

		let dt = dt_ms / 1000.0;
		self.flow_time += dt;
		let (target, speed) = if self.hover.node.is_some() {
			(1.0, 1.8)
		} else {
			(0.0, 1.26)
		};
		self.hover.highlight_t += (target - self.hover.highlight_t) * (speed * dt).min(1.0);
		if self.hover.node.is_none() && self.hover.highlight_t < 0.01 {
			self.hover.highlight_t = 0.0;
		}
	}

	pub fn resize(&mut self, width: f64, height: f64) {
		self.transform.x += (width - self.width) / 2.0;
		self.transform.y += (height - self.height) / 2.0;
		self.width = width;
		self.height = height;
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;
	use crate::components::knowledge_graph::normalize::normalize;
	use crate::components::knowledge_graph::scene::Phase;

	fn nested() -> KnowledgeTree {
		normalize(&json!({
			"root_name": "Course",
			"children": [
				{"name": "Ch1", "flag": "0", "grandchildren": []},
				{"name": "Ch2", "resource_path": ["data/ch2.pdf", "https://cdn.example.org/ch2.m3u8"],
				 "grandchildren": [{"name": "S2.1"}, {"name": "S2.2"}]}
			]
		}))
	}

	fn flat() -> KnowledgeTree {
		normalize(&json!({
			"mocKgNodeDtoList": [
				{"id": 1, "parentId": -1, "nodeName": "Root"},
				{"id": 2, "parentId": 1, "nodeName": "A"},
				{"id": 3, "parentId": 1, "nodeName": "B"},
				{"id": 4, "parentId": 3, "nodeName": "B1"}
			],
			"mocKgRelationDtoList": [{"fromNodeId": 2, "toNodeId": 3, "relationType": "prerequisite"}]
		}))
	}

	fn click(state: &mut KnowledgeGraphState, id: NodeId, notify: impl FnOnce(NodeSelection)) -> Toggle {
		if let Some(selection) = state.select(id) {
			notify(selection);
		}
		state.toggle(id)
	}

	fn id(state: &KnowledgeGraphState, name: &str) -> NodeId {
		state.tree().iter().find(|n| n.name == name).unwrap().id
	}

	#[test]
	fn clicking_a_leaf_chapter_selects_without_expanding() {
		let mut state = KnowledgeGraphState::new(nested(), &GraphConfig::default(), 800.0, 600.0);
		let ch1 = id(&state, "Ch1");
		let mut seen = Vec::new();
		let outcome = click(&mut state, ch1, |selection| seen.push(selection));

		assert_eq!(outcome, Toggle::Leaf);
		assert_eq!(seen.len(), 1);
		assert_eq!(seen[0].name, "Ch1");
		assert_eq!(seen[0].kind, NodeKind::Chapter);
		assert!(seen[0].resources.is_empty());
		assert!(!state.view().is_expanded(ch1));
		assert_eq!(state.view().selected(), Some(ch1));
	}

	#[test]
	fn click_selects_and_expands_with_animation() {
		let mut state = KnowledgeGraphState::new(nested(), &GraphConfig::default(), 800.0, 600.0);
		assert_eq!(state.mode(), LayoutMode::Radial);
		state.tick(500.0);
		let ch2 = id(&state, "Ch2");

		let mut resources = Vec::new();
		let outcome = click(&mut state, ch2, |selection| resources = selection.resources);
		assert_eq!(outcome, Toggle::Expanded);
		assert_eq!(resources.len(), 2);
		assert_eq!(resources[0].path, "data/ch2.pdf");

		assert_eq!(state.stats(), GraphStats { visible: 5, total: 5 });
		let s21 = id(&state, "S2.1");
		assert_eq!(state.scene().get(s21).unwrap().phase, Phase::Entering);
		assert!(state.scene().is_animating());
		state.tick(250.0);
		assert!(!state.scene().is_animating());

		assert_eq!(click(&mut state, ch2, |_| {}), Toggle::Collapsed);
		assert_eq!(state.scene().get(s21).unwrap().phase, Phase::Exiting);
		state.tick(250.0);
		assert!(state.scene().get(s21).is_none());
	}

	#[test]
	fn selecting_leaves_the_layout_untouched() {
		let mut state = KnowledgeGraphState::new(nested(), &GraphConfig::default(), 800.0, 600.0);
		let ch2 = id(&state, "Ch2");
		let selection = state.select(ch2).unwrap();
		assert_eq!(selection.name, "Ch2");
		assert!(selection.has_children);
		assert_eq!(state.view().selected(), Some(ch2));
		assert!(!state.view().is_expanded(ch2));
		assert_eq!(state.stats().visible, 3);
		assert!(state.select(NodeId(999)).is_none());
	}

	#[test]
	fn flat_payload_runs_force_layout_and_relayout_restarts_it() {
		let mut state = KnowledgeGraphState::new(flat(), &GraphConfig::default(), 800.0, 600.0);
		assert_eq!(state.mode(), LayoutMode::Force);
		assert!(state.simulation().unwrap().is_running());
		for _ in 0..400 {
			state.tick(16.0);
		}
		assert!(!state.simulation().unwrap().is_running());

		assert_eq!(state.toggle(NodeId(3)), Toggle::Expanded);
		let simulation = state.simulation().unwrap();
		assert!(simulation.is_running());
		assert_eq!(simulation.alpha(), 1.0);
		assert!(state.scene().get(NodeId(4)).is_some());
		assert_eq!(state.visible().relations.len(), 1);
	}

	#[test]
	fn expand_all_and_collapse_all_relayout() {
		let mut state = KnowledgeGraphState::new(nested(), &GraphConfig::default(), 800.0, 600.0);
		state.expand_all();
		assert_eq!(state.stats().visible, 5);
		state.collapse_all();
		assert_eq!(state.stats().visible, 3);
	}

	#[test]
	fn press_without_movement_is_a_click() {
		let mut state = KnowledgeGraphState::new(flat(), &GraphConfig::default(), 800.0, 600.0);
		state.press(NodeId(2), 10.0, 10.0);
		state.drag_to(11.0, 10.0);
		assert_eq!(state.release(), Some(NodeId(2)));

		state.press(NodeId(2), 10.0, 10.0);
		state.drag_to(60.0, 10.0);
		assert_eq!(state.release(), None);
		assert!(!state.drag.active);
	}

	#[test]
	fn hover_collects_visible_neighbours() {
		let mut state = KnowledgeGraphState::new(flat(), &GraphConfig::default(), 800.0, 600.0);
		state.set_hover(Some(NodeId(2)));
		assert!(state.is_highlighted(NodeId(1)));
		assert!(state.is_highlighted(NodeId(3)));
		assert!(!state.is_highlighted(NodeId(4)));
	}

	#[test]
	fn empty_tree_renders_nothing() {
		let state = KnowledgeGraphState::new(
			KnowledgeTree::default(),
			&GraphConfig::default(),
			800.0,
			600.0,
		);
		assert!(state.scene().elements().is_empty());
		assert_eq!(state.stats(), GraphStats::default());
	}
}
