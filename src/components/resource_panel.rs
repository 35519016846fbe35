use leptos::prelude::*;

use crate::components::knowledge_graph::{NodeSelection, Resource, ResourceKind};

/// Short badge text: streams are numbered, documents show their file stem.
pub fn badge_label(resource: &Resource, index: usize) -> String {
	match resource.kind {
		ResourceKind::Stream => format!("Video {}", index + 1),
		ResourceKind::Document => {
			let file = resource.path.rsplit('/').next().unwrap_or(&resource.path);
			let stem = file
				.len()
				.checked_sub(4)
				.filter(|&cut| file.is_char_boundary(cut) && file[cut..].eq_ignore_ascii_case(".pdf"))
				.map_or(file, |cut| &file[..cut]);
			format!("{}. {}", index + 1, stem)
		}
	}
}

/// Lists the selected node's resources in payload order. The first one is
/// active whenever the selection changes.
#[component]
pub fn ResourcePanel(#[prop(into)] selection: Signal<Option<NodeSelection>>) -> impl IntoView {
	let active = RwSignal::new(0usize);
	Effect::new(move |_| {
		selection.track();
		active.set(0);
	});

	let current = move || {
		selection.with(|s| {
			s.as_ref()
				.and_then(|s| s.resources.get(active.get()).cloned())
		})
	};

	view! {
		<aside class="resource-panel">
			{move || match selection.get() {
				None => view! { <p class="resource-empty">"Click a node to see its resources."</p> }.into_any(),
				Some(node) => {
					let badges = node
						.resources
						.iter()
						.enumerate()
						.map(|(i, resource)| {
							let label = badge_label(resource, i);
							view! {
								<button
									class="resource-badge"
									class:active=move || active.get() == i
									on:click=move |_| active.set(i)
								>
									{label}
								</button>
							}
						})
						.collect_view();
					view! {
						<header>
							<h2>{node.name.clone()}</h2>
							<span class="node-kind">{node.kind.label()}</span>
							{node.completed.then(|| view! { <span class="node-done">"Learned"</span> })}
						</header>
						{node.description.clone().map(|d| view! { <p class="node-description">{d}</p> })}
						<div class="resource-list">{badges}</div>
					}
						.into_any()
				}
			}}
			{move || match current() {
				Some(resource) if resource.kind == ResourceKind::Stream => view! {
					<div class="resource-view">
						<span>"Video stream"</span>
						<a href=resource.path.clone() target="_blank">{resource.path.clone()}</a>
					</div>
				}
					.into_any(),
				Some(resource) => view! {
					<div class="resource-view">
						<span>"Document"</span>
						<code>{resource.path.clone()}</code>
					</div>
				}
					.into_any(),
				None if selection.with(|s| s.is_some()) => {
					view! { <p class="resource-empty">"This node has no resources yet."</p> }.into_any()
				}
				None => ().into_any(),
			}}
		</aside>
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn streams_are_numbered_and_documents_show_their_stem() {
		let video = Resource::classify("https://cdn.example.org/os/ch1.m3u8");
		assert_eq!(badge_label(&video, 0), "Video 1");
		let pdf = Resource::classify("data/RAG_files/Process Scheduling.PDF");
		assert_eq!(badge_label(&pdf, 2), "3. Process Scheduling");
		let notes = Resource::classify("notes.md");
		assert_eq!(badge_label(&notes, 0), "1. notes.md");
		assert_eq!(badge_label(&Resource::classify("a.pdf"), 0), "1. a");
	}
}
