use super::types::{KnowledgeTree, NodeId, NodeKind};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KindProgress {
	pub completed: usize,
	pub total: usize,
}

impl KindProgress {
	pub fn percent(&self) -> f64 {
		if self.total == 0 {
			0.0
		} else {
			self.completed as f64 * 100.0 / self.total as f64
		}
	}
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProgressSummary {
	pub chapters: KindProgress,
	pub sections: KindProgress,
	pub points: KindProgress,
}

/// The step a learner is on within its siblings.
#[derive(Clone, Debug, PartialEq)]
pub struct CurrentStep {
	pub id: NodeId,
	pub name: String,
	/// Zero-based position among siblings; also the number finished before it.
	pub index: usize,
	pub total: usize,
}

impl CurrentStep {
	pub fn percent(&self) -> f64 {
		if self.total == 0 {
			0.0
		} else {
			self.index as f64 * 100.0 / self.total as f64
		}
	}
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CurrentPosition {
	pub chapter: Option<CurrentStep>,
	pub section: Option<CurrentStep>,
	pub point: Option<CurrentStep>,
}

pub fn summarize(tree: &KnowledgeTree) -> ProgressSummary {
	let mut summary = ProgressSummary::default();
	for node in tree.iter() {
		let bucket = match node.kind {
			NodeKind::Root => continue,
			NodeKind::Chapter => &mut summary.chapters,
			NodeKind::Section => &mut summary.sections,
			NodeKind::Point => &mut summary.points,
		};
		bucket.total += 1;
		if node.completed {
			bucket.completed += 1;
		}
	}
	summary
}

/// First incomplete child of `parent`, if any.
fn first_incomplete(tree: &KnowledgeTree, parent: NodeId) -> Option<CurrentStep> {
	let total = tree.get(parent)?.children.len();
	tree.children(parent)
		.enumerate()
		.find(|(_, n)| !n.completed)
		.map(|(index, n)| CurrentStep {
			id: n.id,
			name: n.name.clone(),
			index,
			total,
		})
}

/// First incomplete chapter, then the first incomplete section inside it and
/// the first incomplete point inside that section. Without an incomplete
/// section the point search covers every section of the chapter. With every
/// chapter done, the first chapter is reported and the section and point
/// searches run across all chapters instead.
pub fn current_position(tree: &KnowledgeTree) -> CurrentPosition {
	let Some(root) = tree.root_id() else {
		return CurrentPosition::default();
	};
	let chapter = first_incomplete(tree, root);
	let scope: Vec<NodeId> = match &chapter {
		Some(chapter) => vec![chapter.id],
		None => tree.get(root).map_or_else(Vec::new, |r| r.children.clone()),
	};

	let section = scope.iter().find_map(|&c| first_incomplete(tree, c));
	let point = match &section {
		Some(section) => first_incomplete(tree, section.id),
		None => scope
			.iter()
			.flat_map(|&c| tree.children(c))
			.find_map(|s| first_incomplete(tree, s.id)),
	};
	let chapter = chapter.or_else(|| {
		let total = tree.get(root).map_or(0, |r| r.children.len());
		tree.children(root).next().map(|first| CurrentStep {
			id: first.id,
			name: first.name.clone(),
			index: 0,
			total,
		})
	});
	CurrentPosition {
		chapter,
		section,
		point,
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;
	use crate::components::knowledge_graph::normalize::normalize;

	fn tree() -> KnowledgeTree {
		normalize(&json!({
			"root_name": "Course",
			"children": [
				{"name": "Ch1", "flag": "1", "grandchildren": [{"name": "S1.1", "flag": "1"}]},
				{"name": "Ch2", "flag": "0", "grandchildren": [
					{"name": "S2.1", "flag": "1"},
					{"name": "S2.2", "flag": "0", "great-grandchildren": [
						{"name": "P1", "flag": "1"},
						{"name": "P2", "flag": "0"}
					]}
				]},
				{"name": "Ch3", "flag": "0"}
			]
		}))
	}

	#[test]
	fn counts_per_kind() {
		let summary = summarize(&tree());
		assert_eq!(summary.chapters, KindProgress { completed: 1, total: 3 });
		assert_eq!(summary.sections, KindProgress { completed: 2, total: 3 });
		assert_eq!(summary.points, KindProgress { completed: 1, total: 2 });
		assert_eq!(summary.points.percent(), 50.0);
		assert_eq!(KindProgress::default().percent(), 0.0);
	}

	#[test]
	fn finds_current_chapter_section_and_point() {
		let position = current_position(&tree());
		let chapter = position.chapter.unwrap();
		assert_eq!((chapter.name.as_str(), chapter.index, chapter.total), ("Ch2", 1, 3));
		let section = position.section.unwrap();
		assert_eq!((section.name.as_str(), section.index, section.total), ("S2.2", 1, 2));
		assert_eq!(section.percent(), 50.0);
		assert_eq!(position.point.unwrap().name, "P2");
	}

	#[test]
	fn finished_course_reports_first_chapter() {
		let tree = normalize(&json!({
			"root_name": "Course",
			"children": [{"name": "Ch1", "flag": "1"}, {"name": "Ch2", "flag": "1"}]
		}));
		let position = current_position(&tree);
		assert_eq!(position.chapter.unwrap().name, "Ch1");
		assert!(position.section.is_none());
		assert!(position.point.is_none());
		assert_eq!(current_position(&KnowledgeTree::default()), CurrentPosition::default());
	}

	#[test]
	fn finished_chapters_still_point_at_open_sections() {
		let tree = normalize(&json!({
			"root_name": "Course",
			"children": [
				{"name": "Ch1", "flag": "1", "grandchildren": [{"name": "S1.1", "flag": "1"}]},
				{"name": "Ch2", "flag": "1", "grandchildren": [
					{"name": "S2.1", "flag": "0", "great-grandchildren": [
						{"name": "P1", "flag": "1"},
						{"name": "P2", "flag": "0"}
					]}
				]}
			]
		}));
		let position = current_position(&tree);
		assert_eq!(position.chapter.unwrap().name, "Ch1");
		assert_eq!(position.section.unwrap().name, "S2.1");
		assert_eq!(position.point.unwrap().name, "P2");
	}

	#[test]
	fn point_search_covers_finished_sections_of_the_current_chapter() {
		let tree = normalize(&json!({
			"root_name": "Course",
			"children": [
				{"name": "Ch1", "flag": "0", "grandchildren": [
					{"name": "S1.1", "flag": "1", "great-grandchildren": [{"name": "P1", "flag": "0"}]}
				]}
			]
		}));
		let position = current_position(&tree);
		assert!(position.section.is_none());
		let point = position.point.unwrap();
		assert_eq!((point.name.as_str(), point.index, point.total), ("P1", 0, 1));
	}
}
