//! Conversion of backend knowledge-graph payloads into a [`KnowledgeTree`].
//!
//! Two payload shapes are accepted:
//!
//! * nested: `{root_name, children: [{name, flag, resource_path, grandchildren: [...]}]}`
//!   with a fixed chapter/section/point depth;
//! * flat: `{mocKgNodeDtoList: [{id, parentId, nodeName, ...}], mocKgRelationDtoList: [...]}`
//!   with parent pointers and optional cross-cutting relations.
//!
//! Shape problems never fail: missing optional fields take defaults, bad list
//! entries are skipped and a payload without a root becomes an empty tree.

use std::collections::{HashMap, HashSet};

use log::{debug, warn};
use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;

use super::types::{
	KnowledgeNode, KnowledgeTree, NodeId, NodeKind, PayloadShape, Relation, Resource,
};

const FLAT_NODES_KEY: &str = "mocKgNodeDtoList";
const NO_PARENT: i64 = -1;

#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
	#[error("knowledge graph payload is not valid JSON: {0}")]
	Json(#[from] serde_json::Error),
}

impl KnowledgeTree {
	/// Parses and normalizes a payload body. Only non-JSON text is an error.
	pub fn from_json_str(text: &str) -> Result<Self, PayloadError> {
		let value: Value = serde_json::from_str(text)?;
		Ok(normalize(&value))
	}
}

/// Normalizes either payload shape, picking the flat one when the node list key is present.
pub fn normalize(payload: &Value) -> KnowledgeTree {
	if payload.get(FLAT_NODES_KEY).is_some() {
		normalize_flat(payload)
	} else {
		normalize_nested(payload)
	}
}

#[derive(Deserialize)]
struct NestedPayload {
	#[serde(default)]
	root_name: Option<String>,
	#[serde(default)]
	name: Option<String>,
	#[serde(default, deserialize_with = "lenient_list")]
	children: Vec<NestedEntry>,
}

#[derive(Deserialize)]
struct NestedEntry {
	#[serde(default)]
	name: String,
	#[serde(default)]
	flag: Value,
	#[serde(default)]
	resource_path: Value,
	#[serde(default, deserialize_with = "lenient_list")]
	grandchildren: Vec<NestedEntry>,
	#[serde(
		default,
		rename = "great-grandchildren",
		alias = "greatGrandchildren",
		deserialize_with = "lenient_list"
	)]
	great_grandchildren: Vec<NestedEntry>,
}

#[derive(Deserialize)]
struct FlatPayload {
	#[serde(rename = "mocKgNodeDtoList", default, deserialize_with = "lenient_list")]
	nodes: Vec<FlatNode>,
	#[serde(rename = "mocKgRelationDtoList", default, deserialize_with = "lenient_list")]
	relations: Vec<FlatRelation>,
}

#[derive(Deserialize)]
struct FlatNode {
	#[serde(deserialize_with = "node_id")]
	id: i64,
	#[serde(rename = "parentId", default, deserialize_with = "optional_node_id")]
	parent_id: Option<i64>,
	#[serde(rename = "nodeName", default)]
	node_name: String,
	#[serde(default)]
	flag: Value,
	#[serde(default)]
	description: Option<String>,
	#[serde(default)]
	resource_path: Value,
	#[serde(rename = "mocKgNodeAvgStatisticsDto", default)]
	statistics: Option<FlatStatistics>,
}

#[derive(Deserialize)]
struct FlatStatistics {
	#[serde(default)]
	flag: Value,
}

#[derive(Deserialize)]
struct FlatRelation {
	#[serde(rename = "fromNodeId", deserialize_with = "node_id")]
	from: i64,
	#[serde(rename = "toNodeId", deserialize_with = "node_id")]
	to: i64,
	#[serde(rename = "relationType", default)]
	relation_type: String,
}

/// Accepts anything for a list field and keeps only the entries that parse.
fn lenient_list<'de, D, T>(de: D) -> Result<Vec<T>, D::Error>
where
	D: Deserializer<'de>,
	T: DeserializeOwned,
{
	let Some(Value::Array(items)) = Option::<Value>::deserialize(de)? else {
		return Ok(Vec::new());
	};
	Ok(items
		.into_iter()
		.filter_map(|item| match serde_json::from_value(item) {
			Ok(entry) => Some(entry),
			Err(e) => {
				warn!("Skipping malformed knowledge graph entry: {}", e);
				None
			}
		})
		.collect())
}

fn id_from_value(value: &Value) -> Option<i64> {
	match value {
		Value::Number(n) => n.as_i64(),
		Value::String(s) => s.trim().parse().ok(),
		_ => None,
	}
}

fn node_id<'de, D: Deserializer<'de>>(de: D) -> Result<i64, D::Error> {
	let value = Value::deserialize(de)?;
	id_from_value(&value)
		.ok_or_else(|| serde::de::Error::custom(format!("invalid node id {}", value)))
}

fn optional_node_id<'de, D: Deserializer<'de>>(de: D) -> Result<Option<i64>, D::Error> {
	let value = Value::deserialize(de)?;
	Ok(id_from_value(&value))
}

/// `"1"`, `1` and `true` mark a completed node.
pub fn is_completed(flag: &Value) -> bool {
	match flag {
		Value::Bool(b) => *b,
		Value::Number(n) => n.as_f64() == Some(1.0),
		Value::String(s) => {
			let s = s.trim();
			s == "1" || s.eq_ignore_ascii_case("true")
		}
		_ => false,
	}
}

/// A resource field may be one string or a list of strings. Blank entries are dropped.
pub fn normalize_resources(raw: &Value) -> Vec<Resource> {
	let entries: Vec<&str> = match raw {
		Value::String(s) => vec![s.as_str()],
		Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
		_ => Vec::new(),
	};
	entries
		.into_iter()
		.map(str::trim)
		.filter(|s| !s.is_empty())
		.map(Resource::classify)
		.collect()
}

fn normalize_nested(payload: &Value) -> KnowledgeTree {
	let mut tree = KnowledgeTree::empty(PayloadShape::Nested);
	let parsed = match NestedPayload::deserialize(payload) {
		Ok(parsed) => parsed,
		Err(e) => {
			warn!("Knowledge graph payload has no usable shape: {}", e);
			return tree;
		}
	};
	let Some(root_name) = parsed
		.root_name
		.or(parsed.name)
		.filter(|name| !name.trim().is_empty())
	else {
		warn!("Knowledge graph payload has no root; rendering an empty graph");
		return tree;
	};

	let root = NodeId(0);
	let mut next = 1;
	tree.push(KnowledgeNode {
		id: root,
		name: root_name,
		level: 0,
		kind: NodeKind::Root,
		completed: true,
		resources: Vec::new(),
		description: None,
		children: Vec::new(),
		parent: None,
	});
	let children = parsed
		.children
		.iter()
		.map(|chapter| push_nested(&mut tree, chapter, root, 1, &mut next))
		.collect();
	if let Some(node) = tree.get_mut(root) {
		node.children = children;
	}
	debug!("Normalized nested knowledge graph with {} nodes", tree.len());
	tree
}

fn push_nested(
	tree: &mut KnowledgeTree,
	entry: &NestedEntry,
	parent: NodeId,
	level: usize,
	next: &mut i64,
) -> NodeId {
	let id = NodeId(*next);
	*next += 1;
	tree.push(KnowledgeNode {
		id,
		name: entry.name.clone(),
		level,
		kind: NodeKind::from_level(level),
		completed: is_completed(&entry.flag),
		resources: normalize_resources(&entry.resource_path),
		description: None,
		children: Vec::new(),
		parent: Some(parent),
	});

	let nested: &[NestedEntry] = match level {
		1 => &entry.grandchildren,
		2 => &entry.great_grandchildren,
		_ => &[],
	};
	let children = nested
		.iter()
		.map(|child| push_nested(tree, child, id, level + 1, next))
		.collect();
	if let Some(node) = tree.get_mut(id) {
		node.children = children;
	}
	id
}

fn normalize_flat(payload: &Value) -> KnowledgeTree {
	let mut tree = KnowledgeTree::empty(PayloadShape::Flat);
	let parsed = match FlatPayload::deserialize(payload) {
		Ok(parsed) => parsed,
		Err(e) => {
			warn!("Flat knowledge graph payload is malformed: {}", e);
			return tree;
		}
	};

	let mut seen = HashSet::new();
	let mut by_id: HashMap<i64, &FlatNode> = HashMap::new();
	let mut children_of: HashMap<i64, Vec<i64>> = HashMap::new();
	for node in &parsed.nodes {
		if !seen.insert(node.id) {
			warn!("Dropping duplicate knowledge graph node id {}", node.id);
			continue;
		}
		by_id.insert(node.id, node);
		children_of
			.entry(node.parent_id.unwrap_or(NO_PARENT))
			.or_default()
			.push(node.id);
	}

	let roots = children_of.get(&NO_PARENT).cloned().unwrap_or_default();
	let Some(&root) = roots.first() else {
		warn!("Flat knowledge graph payload has no root node; rendering an empty graph");
		return tree;
	};
	if roots.len() > 1 {
		warn!("Flat knowledge graph payload has {} roots; keeping node {}", roots.len(), root);
	}

	let mut visited = HashSet::new();
	push_flat(&mut tree, &by_id, &children_of, root, None, 0, &mut visited);
	let dropped = by_id.len() - visited.len();
	if dropped > 0 {
		warn!("Dropping {} knowledge graph nodes unreachable from a root", dropped);
	}

	tree.relations = parsed
		.relations
		.into_iter()
		.map(|r| Relation {
			from: NodeId(r.from),
			to: NodeId(r.to),
			relation_type: r.relation_type,
		})
		.filter(|r| tree.contains(r.from) && tree.contains(r.to))
		.collect();
	debug!(
		"Normalized flat knowledge graph with {} nodes and {} relations",
		tree.len(),
		tree.relations.len()
	);
	tree
}

fn push_flat(
	tree: &mut KnowledgeTree,
	by_id: &HashMap<i64, &FlatNode>,
	children_of: &HashMap<i64, Vec<i64>>,
	id: i64,
	parent: Option<NodeId>,
	level: usize,
	visited: &mut HashSet<i64>,
) {
	let Some(raw) = by_id.get(&id) else {
		return;
	};
	if !visited.insert(id) {
		return;
	}
	let flag = match (&raw.flag, &raw.statistics) {
		(Value::Null, Some(stats)) => &stats.flag,
		(flag, _) => flag,
	};
	let children: Vec<i64> = children_of
		.get(&id)
		.map(|c| c.iter().copied().filter(|c| !visited.contains(c)).collect())
		.unwrap_or_default();

	tree.push(KnowledgeNode {
		id: NodeId(id),
		name: raw.node_name.clone(),
		level,
		kind: NodeKind::from_level(level),
		completed: is_completed(flag),
		resources: normalize_resources(&raw.resource_path),
		description: raw.description.clone().filter(|d| !d.trim().is_empty()),
		children: Vec::new(),
		parent,
	});
	let mut kept = Vec::with_capacity(children.len());
	for child in children {
		if visited.contains(&child) {
			continue;
		}
		push_flat(tree, by_id, children_of, child, Some(NodeId(id)), level + 1, visited);
		kept.push(NodeId(child));
	}
	if let Some(node) = tree.get_mut(NodeId(id)) {
		node.children = kept;
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;
	use crate::components::knowledge_graph::types::ResourceKind;

	fn course() -> Value {
		json!({
			"root_name": "Operating Systems",
			"children": [
				{
					"name": "Processes",
					"flag": "1",
					"resource_path": ["data/ch1.pdf", "  ", "https://cdn.example.org/ch1/index.m3u8"],
					"grandchildren": [
						{
							"name": "Scheduling",
							"flag": "0",
							"great-grandchildren": [
								{"name": "Round robin", "flag": 1},
								{"name": "Priority", "flag": "0", "resource_path": "data/prio.pdf"}
							]
						},
						{"name": "Threads"}
					]
				},
				{"name": "Memory", "flag": "0"}
			]
		})
	}

	#[test]
	fn node_count_matches_payload_and_order_is_preserved() {
		let tree = normalize(&course());
		// root + 2 chapters + 2 sections + 2 points
		assert_eq!(tree.len(), 7);

		let root = tree.root().unwrap();
		assert_eq!(root.kind, NodeKind::Root);
		assert!(root.completed);
		let chapters: Vec<_> = tree.children(root.id).map(|n| n.name.as_str()).collect();
		assert_eq!(chapters, ["Processes", "Memory"]);

		let processes = tree.children(root.id).next().unwrap();
		let sections: Vec<_> = tree.children(processes.id).map(|n| n.name.as_str()).collect();
		assert_eq!(sections, ["Scheduling", "Threads"]);

		let scheduling = tree.children(processes.id).next().unwrap();
		let points: Vec<_> = tree.children(scheduling.id).collect();
		assert_eq!(points[0].name, "Round robin");
		assert_eq!(points[0].kind, NodeKind::Point);
		assert_eq!(points[0].level, 3);
		assert!(points[0].completed);
		assert_eq!(points[1].parent, Some(scheduling.id));
	}

	#[test]
	fn resources_are_always_sequences_without_blanks() {
		let tree = normalize(&course());
		let processes = tree.children(NodeId(0)).next().unwrap();
		let kinds: Vec<_> = processes.resources.iter().map(|r| r.kind).collect();
		assert_eq!(kinds, [ResourceKind::Document, ResourceKind::Stream]);
		assert_eq!(processes.resources[0].path, "data/ch1.pdf");

		let priority = tree.iter().find(|n| n.name == "Priority").unwrap();
		assert_eq!(priority.resources, vec![Resource::classify("data/prio.pdf")]);

		let threads = tree.iter().find(|n| n.name == "Threads").unwrap();
		assert!(threads.resources.is_empty());
		assert!(!threads.completed);
	}

	#[test]
	fn single_chapter_without_sections() {
		let tree = normalize(&json!({
			"root_name": "Course",
			"children": [{"name": "Ch1", "flag": "0", "grandchildren": []}]
		}));
		assert_eq!(tree.len(), 2);
		let ch1 = tree.children(NodeId(0)).next().unwrap();
		assert_eq!(ch1.name, "Ch1");
		assert!(!ch1.has_children());
		assert!(ch1.resources.is_empty());
	}

	#[test]
	fn https_stream_is_not_a_document() {
		let tree = normalize(&json!({
			"root_name": "Course",
			"children": [{"name": "Intro", "resource_path": ["https://videos.example.org/intro/video.m3u8"]}]
		}));
		let intro = tree.children(NodeId(0)).next().unwrap();
		assert_eq!(intro.resources[0].kind, ResourceKind::Stream);
	}

	#[test]
	fn missing_root_degrades_to_empty_tree() {
		assert!(normalize(&json!({"children": [{"name": "orphan"}]})).is_empty());
		assert!(normalize(&json!([1, 2, 3])).is_empty());
		assert!(normalize(&json!({})).is_empty());
		assert!(normalize(&json!({"mocKgNodeDtoList": []})).is_empty());
	}

	#[test]
	fn name_is_accepted_in_place_of_root_name() {
		let tree = normalize(&json!({"name": "Course", "children": "not a list"}));
		assert_eq!(tree.len(), 1);
		assert_eq!(tree.root().unwrap().name, "Course");
	}

	#[test]
	fn malformed_entries_are_skipped_individually() {
		let tree = normalize(&json!({
			"root_name": "Course",
			"children": [42, {"name": "Kept"}, {"name": 7}]
		}));
		let names: Vec<_> = tree.iter().map(|n| n.name.as_str()).collect();
		assert_eq!(names, ["Course", "Kept"]);
	}

	#[test]
	fn invalid_json_text_is_an_error() {
		assert!(matches!(
			KnowledgeTree::from_json_str("<html>502</html>"),
			Err(PayloadError::Json(_))
		));
		let tree = KnowledgeTree::from_json_str(r#"{"root_name":"Course"}"#).unwrap();
		assert_eq!(tree.len(), 1);
	}

	#[test]
	fn flat_payload_builds_parent_pointer_tree() {
		let tree = normalize(&json!({
			"mocKgNodeDtoList": [
				{"id": 1, "parentId": -1, "nodeName": "Algebra"},
				{"id": 2, "parentId": 1, "nodeName": "Groups", "flag": 1, "description": "Sets with an operation"},
				{"id": 3, "parentId": 1, "nodeName": "Rings", "mocKgNodeAvgStatisticsDto": {"flag": 1}},
				{"id": "4", "parentId": "2", "nodeName": "Subgroups"},
				{"id": 5, "parentId": 99, "nodeName": "Orphan"},
				{"id": 2, "parentId": 1, "nodeName": "Duplicate"}
			],
			"mocKgRelationDtoList": [
				{"fromNodeId": 2, "toNodeId": 3, "relationType": "prerequisite"},
				{"fromNodeId": 5, "toNodeId": 3, "relationType": "prerequisite"}
			]
		}));

		assert_eq!(tree.shape, PayloadShape::Flat);
		assert_eq!(tree.len(), 4);
		assert_eq!(tree.root_id(), Some(NodeId(1)));
		let groups = tree.get(NodeId(2)).unwrap();
		assert_eq!(groups.name, "Groups");
		assert!(groups.completed);
		assert_eq!(groups.description.as_deref(), Some("Sets with an operation"));
		assert_eq!(groups.kind, NodeKind::Chapter);
		assert!(tree.get(NodeId(3)).unwrap().completed);
		assert_eq!(tree.get(NodeId(4)).unwrap().level, 2);
		assert_eq!(tree.get(NodeId(1)).unwrap().children, vec![NodeId(2), NodeId(3)]);
		assert!(!tree.contains(NodeId(5)));
		assert_eq!(tree.relations.len(), 1);
		assert_eq!(tree.relations[0].from, NodeId(2));
	}

	#[test]
	fn flat_payload_keeps_only_the_first_root() {
		let tree = normalize(&json!({
			"mocKgNodeDtoList": [
				{"id": 10, "parentId": -1, "nodeName": "First"},
				{"id": 11, "parentId": 10, "nodeName": "Child"},
				{"id": 20, "nodeName": "Second"},
				{"id": 21, "parentId": 20, "nodeName": "Other child"}
			]
		}));
		assert_eq!(tree.root_id(), Some(NodeId(10)));
		assert_eq!(tree.len(), 2);
		assert!(!tree.contains(NodeId(20)));
	}

	#[test]
	fn flag_variants() {
		assert!(is_completed(&json!("1")));
		assert!(is_completed(&json!(1)));
		assert!(is_completed(&json!(true)));
		assert!(!is_completed(&json!("0")));
		assert!(!is_completed(&json!(0)));
		assert!(!is_completed(&Value::Null));
	}
}
