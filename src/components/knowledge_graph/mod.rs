mod component;
mod force;
mod normalize;
mod progress;
mod radial;
mod render;
mod scene;
mod state;
mod types;
mod view_state;

pub use component::KnowledgeGraphCanvas;
pub use normalize::PayloadError;
pub use progress::{current_position, summarize, CurrentStep, KindProgress};
pub use state::{GraphStats, NodeSelection};
pub use types::{KnowledgeTree, NodeKind, PayloadShape, Resource, ResourceKind};
