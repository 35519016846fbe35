//! Tunables for the knowledge graph view.
//!
//! Every field has a default, so a host page can override just the values it
//! cares about from a JSON snippet:
//!
//! ```
//! use knowledge_graph_explorer::config::GraphConfig;
//!
//! let config = GraphConfig::from_json(r#"{"radial": {"transition_ms": 150}}"#).unwrap();
//! assert_eq!(config.radial.transition_ms, 150.0);
//! assert_eq!(config.endpoint, "/api/knowledge-graph");
//! ```

use serde::Deserialize;

use crate::components::knowledge_graph::{NodeKind, PayloadShape};

/// Which layout strategy drives the graph.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutMode {
	/// Radial tree for nested payloads, force simulation for flat ones.
	#[default]
	Auto,
	Radial,
	Force,
}

impl LayoutMode {
	pub fn resolve(self, shape: PayloadShape) -> LayoutMode {
		match (self, shape) {
			(LayoutMode::Auto, PayloadShape::Nested) => LayoutMode::Radial,
			(LayoutMode::Auto, PayloadShape::Flat) => LayoutMode::Force,
			(mode, _) => mode,
		}
	}
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct RadialConfig {
	/// Ring radius per level; deeper levels continue with the last step.
	pub band_radii: Vec<f64>,
	/// Fraction of a parent's angular slice shared by its children.
	pub sector_damping: f64,
	pub transition_ms: f64,
	pub root_radius: f64,
	pub chapter_radius: f64,
	pub section_radius: f64,
	pub point_radius: f64,
}

impl Default for RadialConfig {
	fn default() -> Self {
		Self {
			band_radii: vec![0.0, 180.0, 340.0, 480.0],
			sector_damping: 0.95,
			transition_ms: 200.0,
			root_radius: 40.0,
			chapter_radius: 22.0,
			section_radius: 15.0,
			point_radius: 9.0,
		}
	}
}

impl RadialConfig {
	pub fn band_radius(&self, level: usize) -> f64 {
		match self.band_radii.as_slice() {
			[] => 0.0,
			radii if level < radii.len() => radii[level],
			[.., prev, last] => last + (last - prev) * (level + 1 - self.band_radii.len()) as f64,
			[only] => *only,
		}
	}

	pub fn node_radius(&self, kind: NodeKind) -> f64 {
		match kind {
			NodeKind::Root => self.root_radius,
			NodeKind::Chapter => self.chapter_radius,
			NodeKind::Section => self.section_radius,
			NodeKind::Point => self.point_radius,
		}
	}
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ForceConfig {
	/// Target ring of level 1; each further level adds `level_spacing`.
	pub first_ring: f64,
	pub level_spacing: f64,
	pub radial_strength: f64,
	pub link_distance: f64,
	pub link_strength: f64,
	/// Repulsion handed to the `force_graph` integrator.
	pub charge: f32,
	/// Spring stiffness handed to the `force_graph` integrator.
	pub spring: f32,
	pub collision_padding: f64,
	pub collision_strength: f64,
	pub center_strength: f64,
	pub base_radius: f64,
	pub min_radius: f64,
	pub alpha_decay: f64,
	pub alpha_min: f64,
	/// Alpha held while a node is being dragged.
	pub drag_alpha_target: f64,
}

impl Default for ForceConfig {
	fn default() -> Self {
		Self {
			first_ring: 280.0,
			level_spacing: 250.0,
			radial_strength: 0.8,
			link_distance: 120.0,
			link_strength: 0.3,
			charge: 300.0,
			spring: 0.05,
			collision_padding: 20.0,
			collision_strength: 0.9,
			center_strength: 0.05,
			base_radius: 70.0,
			min_radius: 18.0,
			alpha_decay: 0.02,
			alpha_min: 0.001,
			drag_alpha_target: 0.3,
		}
	}
}

impl ForceConfig {
	pub fn target_radius(&self, level: usize) -> f64 {
		if level == 0 {
			0.0
		} else {
			self.first_ring + self.level_spacing * (level - 1) as f64
		}
	}

	/// Shrinks geometrically with depth down to `min_radius`.
	pub fn node_radius(&self, level: usize) -> f64 {
		(self.base_radius / 1.5f64.powi(level as i32)).max(self.min_radius)
	}
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
	/// URL the knowledge graph payload is fetched from.
	pub endpoint: String,
	pub layout: LayoutMode,
	pub radial: RadialConfig,
	pub force: ForceConfig,
	/// Draw prerequisite relations on load.
	pub show_relations: bool,
}

impl Default for GraphConfig {
	fn default() -> Self {
		Self {
			endpoint: "/api/knowledge-graph".into(),
			layout: LayoutMode::Auto,
			radial: RadialConfig::default(),
			force: ForceConfig::default(),
			show_relations: true,
		}
	}
}

impl GraphConfig {
	pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
		serde_json::from_str(text)
	}
}
