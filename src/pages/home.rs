use leptos::prelude::*;
use leptos::task::spawn_local;
use log::{debug, error, info};

use crate::api::fetch_knowledge_graph;
use crate::components::knowledge_graph::{
	current_position, summarize, CurrentStep, GraphStats, KindProgress, KnowledgeGraphCanvas,
	KnowledgeTree, NodeSelection,
};
use crate::components::resource_panel::ResourcePanel;
use crate::config::GraphConfig;
use crate::gate::LoadGate;

fn progress_line(label: &'static str, progress: KindProgress) -> impl IntoView {
	view! {
		<li>
			{format!(
				"{label}: {}/{} ({:.0}%)",
				progress.completed,
				progress.total,
				progress.percent(),
			)}
		</li>
	}
}

fn step_line(label: &'static str, step: Option<CurrentStep>) -> impl IntoView {
	step.map(|step| {
		view! {
			<li>
				{format!(
					"{label}: {} ({} of {}, {:.0}% done)",
					step.name,
					step.index + 1,
					step.total,
					step.percent(),
				)}
			</li>
		}
	})
}

/// Course map page: loads the graph once and pairs it with the resource panel.
#[component]
pub fn Home() -> impl IntoView {
	let config = GraphConfig::default();
	let tree = RwSignal::new(None::<KnowledgeTree>);
	let load_error = RwSignal::new(None::<String>);
	let selection = RwSignal::new(None::<NodeSelection>);
	let stats = RwSignal::new(GraphStats::default());

	let gate = LoadGate::new();
	on_cleanup({
		let gate = gate.clone();
		move || gate.close()
	});

	let endpoint = config.endpoint.clone();
	spawn_local(async move {
		let fetched = fetch_knowledge_graph(&endpoint).await;
		let Some(result) = gate.accept(fetched) else {
			debug!("Discarding knowledge graph response after unmount");
			return;
		};
		match result {
			Ok(loaded) => {
				info!("Knowledge graph loaded with {} nodes", loaded.len());
				tree.set(Some(loaded));
			}
			Err(e) => {
				error!("Failed to load knowledge graph from {}: {}", endpoint, e);
				load_error.set(Some(e.to_string()));
			}
		}
	});

	let summary = Memo::new(move |_| tree.with(|t| t.as_ref().map(summarize)));
	let position = Memo::new(move |_| tree.with(|t| t.as_ref().map(current_position)));

	view! {
		<div class="course-page">
			<header class="course-progress">
				{move || {
					summary
						.get()
						.map(|s| {
							view! {
								<ul class="progress-summary">
									{progress_line("Chapters", s.chapters)}
									{progress_line("Sections", s.sections)}
									{progress_line("Knowledge points", s.points)}
								</ul>
							}
						})
				}}
				{move || {
					position
						.get()
						.map(|p| {
							view! {
								<ul class="current-position">
									{step_line("Chapter", p.chapter)}
									{step_line("Section", p.section)}
									{step_line("Point", p.point)}
								</ul>
							}
						})
				}}
				<span class="graph-stats">
					{move || {
						let s = stats.get();
						format!("{} of {} nodes shown", s.visible, s.total)
					}}
				</span>
				{move || load_error.get().map(|e| view! { <p class="load-error">{e}</p> })}
			</header>
			<main class="course-map" style="display: flex; height: calc(100vh - 120px);">
				<div class="graph-area" style="flex: 1; min-width: 0;">
					<KnowledgeGraphCanvas
						tree=tree
						config=config
						on_select=move |picked: NodeSelection| selection.set(Some(picked))
						on_stats=Callback::new(move |s: GraphStats| stats.set(s))
					/>
				</div>
				<ResourcePanel selection=selection />
			</main>
		</div>
	}
}
