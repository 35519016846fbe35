//! Backend access for the course payload.

use gloo_net::http::Request;
use log::debug;
use thiserror::Error;

use crate::components::knowledge_graph::{KnowledgeTree, PayloadError};

/// Why a course payload could not be loaded.
#[derive(Debug, Error)]
pub enum FetchError {
	/// The request never produced a response.
	#[error("request failed: {0}")]
	Network(#[from] gloo_net::Error),
	/// The server answered with a non-success status.
	#[error("server responded with status {0}")]
	Status(u16),
	/// The body was not a JSON document.
	#[error(transparent)]
	Payload(#[from] PayloadError),
}

/// Fetches and normalizes the knowledge graph served at `url`. Either payload
/// shape is accepted; a shape the normalizer cannot use gives an empty tree.
pub async fn fetch_knowledge_graph(url: &str) -> Result<KnowledgeTree, FetchError> {
	let response = Request::get(url).send().await?;
	if !response.ok() {
		return Err(FetchError::Status(response.status()));
	}
	let body = response.text().await?;
	let tree = KnowledgeTree::from_json_str(&body)?;
	debug!("Fetched {} nodes from {}", tree.len(), url);
	Ok(tree)
}
