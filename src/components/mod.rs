pub mod knowledge_graph;
pub mod resource_panel;
