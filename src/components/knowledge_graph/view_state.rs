use std::collections::HashSet;

use super::types::{KnowledgeTree, NodeId, Relation};

/// Outcome of clicking a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Toggle {
	Expanded,
	Collapsed,
	/// The node has no children; nothing changed.
	Leaf,
}

/// One entry of the visible projection, in pre-order.
#[derive(Clone, Debug, PartialEq)]
pub struct VisibleNode {
	pub id: NodeId,
	pub parent: Option<NodeId>,
	pub level: usize,
	/// Position among the parent's children.
	pub index: usize,
	/// Number of children the parent shows.
	pub siblings: usize,
	pub expanded: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct VisibleGraph {
	pub nodes: Vec<VisibleNode>,
	/// `(parent, child)` hierarchy links.
	pub links: Vec<(NodeId, NodeId)>,
	/// Relations whose endpoints are both visible.
	pub relations: Vec<Relation>,
}

impl VisibleGraph {
	#[cfg(test)]
	pub fn ids(&self) -> Vec<NodeId> {
		self.nodes.iter().map(|n| n.id).collect()
	}

	pub fn get(&self, id: NodeId) -> Option<&VisibleNode> {
		self.nodes.iter().find(|n| n.id == id)
	}

	pub fn contains(&self, id: NodeId) -> bool {
		self.get(id).is_some()
	}
}

/// Expansion and selection state for one mounted graph.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GraphViewState {
	expanded: HashSet<NodeId>,
	selected: Option<NodeId>,
}

impl GraphViewState {
	/// Starts with only the root expanded.
	pub fn new(tree: &KnowledgeTree) -> Self {
		let mut state = Self::default();
		state.reset_to_root(tree);
		state
	}

	pub fn is_expanded(&self, id: NodeId) -> bool {
		self.expanded.contains(&id)
	}

	#[cfg(test)]
	pub fn expanded(&self) -> &HashSet<NodeId> {
		&self.expanded
	}

	pub fn selected(&self) -> Option<NodeId> {
		self.selected
	}

	pub fn select(&mut self, id: NodeId) {
		self.selected = Some(id);
	}

	/// Expands a collapsed node, or collapses an expanded one together with
	/// every descendant.
	pub fn toggle(&mut self, tree: &KnowledgeTree, id: NodeId) -> Toggle {
		let Some(node) = tree.get(id).filter(|n| n.has_children()) else {
			return Toggle::Leaf;
		};
		if self.expanded.remove(&node.id) {
			for descendant in tree.descendants(node.id) {
				self.expanded.remove(&descendant);
			}
			Toggle::Collapsed
		} else {
			self.expanded.insert(node.id);
			Toggle::Expanded
		}
	}

	pub fn expand_all(&mut self, tree: &KnowledgeTree) {
		let Some(root) = tree.root_id() else {
			return;
		};
		self.expanded.extend(
			tree.descendants(root)
				.into_iter()
				.filter(|id| tree.get(*id).is_some_and(|n| n.has_children())),
		);
	}

	pub fn collapse_all(&mut self, tree: &KnowledgeTree) {
		self.reset_to_root(tree);
	}

	fn reset_to_root(&mut self, tree: &KnowledgeTree) {
		self.expanded.clear();
		if let Some(root) = tree.root().filter(|r| r.has_children()) {
			self.expanded.insert(root.id);
		}
	}

	/// Projects the tree onto what the current expansion shows.
	pub fn visible(&self, tree: &KnowledgeTree) -> VisibleGraph {
		let mut graph = VisibleGraph::default();
		let Some(root) = tree.root_id() else {
			return graph;
		};

		// (id, parent, index, siblings)
		let mut stack = vec![(root, None, 0, 1)];
		while let Some((id, parent, index, siblings)) = stack.pop() {
			let Some(node) = tree.get(id) else {
				continue;
			};
			let expanded = self.is_expanded(id) && node.has_children();
			graph.nodes.push(VisibleNode {
				id,
				parent,
				level: node.level,
				index,
				siblings,
				expanded,
			});
			if let Some(p) = parent {
				graph.links.push((p, id));
			}
			if expanded {
				let count = node.children.len();
				for (i, child) in node.children.iter().enumerate().rev() {
					stack.push((*child, Some(id), i, count));
				}
			}
		}

		graph.relations = tree
			.relations
			.iter()
			.filter(|r| graph.contains(r.from) && graph.contains(r.to))
			.cloned()
			.collect();
		graph
	}
}
