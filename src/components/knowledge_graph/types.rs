use std::collections::HashMap;
use std::fmt;

/// Stable node identifier. Flat payloads keep the backend id, nested payloads
/// are numbered in pre-order from 0.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub i64);

impl fmt::Display for NodeId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Position of a node in the course hierarchy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
	Root,
	Chapter,
	Section,
	Point,
}

impl NodeKind {
	pub fn from_level(level: usize) -> Self {
		match level {
			0 => Self::Root,
			1 => Self::Chapter,
			2 => Self::Section,
			_ => Self::Point,
		}
	}

	pub fn label(self) -> &'static str {
		match self {
			Self::Root => "course",
			Self::Chapter => "chapter",
			Self::Section => "section",
			Self::Point => "knowledge point",
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceKind {
	/// Absolute `http(s)://` URL, played as a video stream.
	Stream,
	/// Server-relative document path.
	Document,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resource {
	pub path: String,
	pub kind: ResourceKind,
}

impl Resource {
	pub fn classify(path: impl Into<String>) -> Self {
		let path = path.into();
		let kind = if path.starts_with("http://") || path.starts_with("https://") {
			ResourceKind::Stream
		} else {
			ResourceKind::Document
		};
		Self { path, kind }
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct KnowledgeNode {
	pub id: NodeId,
	pub name: String,
	pub level: usize,
	pub kind: NodeKind,
	pub completed: bool,
	pub resources: Vec<Resource>,
	pub description: Option<String>,
	pub children: Vec<NodeId>,
	pub parent: Option<NodeId>,
}

impl KnowledgeNode {
	pub fn has_children(&self) -> bool {
		!self.children.is_empty()
	}
}

/// Cross-cutting edge between two nodes, e.g. a prerequisite.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Relation {
	pub from: NodeId,
	pub to: NodeId,
	pub relation_type: String,
}

/// Which payload shape a tree was built from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PayloadShape {
	#[default]
	Nested,
	Flat,
}

/// Arena of normalized nodes. Parents own their children through the id
/// lists; `parent` is a lookup back-reference only.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct KnowledgeTree {
	nodes: Vec<KnowledgeNode>,
	index: HashMap<NodeId, usize>,
	root: Option<NodeId>,
	pub relations: Vec<Relation>,
	pub shape: PayloadShape,
}

impl KnowledgeTree {
	pub fn empty(shape: PayloadShape) -> Self {
		Self {
			shape,
			..Self::default()
		}
	}

	/// Appends a node. The caller keeps ids unique and links children itself.
	pub(crate) fn push(&mut self, node: KnowledgeNode) {
		if node.parent.is_none() && self.root.is_none() {
			self.root = Some(node.id);
		}
		self.index.insert(node.id, self.nodes.len());
		self.nodes.push(node);
	}

	pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut KnowledgeNode> {
		let i = *self.index.get(&id)?;
		self.nodes.get_mut(i)
	}

	pub fn root(&self) -> Option<&KnowledgeNode> {
		self.root.and_then(|id| self.get(id))
	}

	pub fn root_id(&self) -> Option<NodeId> {
		self.root
	}

	pub fn get(&self, id: NodeId) -> Option<&KnowledgeNode> {
		self.index.get(&id).map(|&i| &self.nodes[i])
	}

	pub fn contains(&self, id: NodeId) -> bool {
		self.index.contains_key(&id)
	}

	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	pub fn children(&self, id: NodeId) -> impl Iterator<Item = &KnowledgeNode> {
		self.get(id)
			.into_iter()
			.flat_map(|n| n.children.iter())
			.filter_map(|c| self.get(*c))
	}

	/// Pre-order walk of the subtree under `id`, `id` included.
	pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
		let mut out = Vec::new();
		let mut stack = vec![id];
		while let Some(cur) = stack.pop() {
			let Some(node) = self.get(cur) else {
				continue;
			};
			out.push(cur);
			stack.extend(node.children.iter().rev().copied());
		}
		out
	}

	pub fn iter(&self) -> impl Iterator<Item = &KnowledgeNode> {
		self.nodes.iter()
	}
}
