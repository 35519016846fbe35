use std::cell::{Cell, RefCell};
use std::rc::Rc;

use leptos::prelude::*;
use log::{debug, error};
use wasm_bindgen::prelude::*;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, MouseEvent, WheelEvent, Window};

use super::render;
use super::state::{GraphStats, KnowledgeGraphState, NodeSelection};
use super::types::{KnowledgeTree, NodeId};
use crate::config::GraphConfig;
use crate::gate::LoadGate;

type SharedState = Rc<RefCell<Option<KnowledgeGraphState>>>;
type FrameCallback = Rc<RefCell<Option<Closure<dyn FnMut()>>>>;

/// Longest frame step fed to the layout, so a backgrounded tab does not
/// resume with one huge jump.
const MAX_FRAME_MS: f64 = 100.0;

fn window_size(window: &Window) -> Option<(f64, f64)> {
	Some((
		window.inner_width().ok()?.as_f64()?,
		window.inner_height().ok()?.as_f64()?,
	))
}

fn context_2d(canvas: &HtmlCanvasElement) -> Option<CanvasRenderingContext2d> {
	canvas.get_context("2d").ok().flatten()?.dyn_into().ok()
}

fn pointer(canvas_ref: NodeRef<leptos::html::Canvas>, ev: &MouseEvent) -> Option<(f64, f64)> {
	let canvas: HtmlCanvasElement = canvas_ref.get()?.into();
	let rect = canvas.get_bounding_client_rect();
	Some((
		ev.client_x() as f64 - rect.left(),
		ev.client_y() as f64 - rect.top(),
	))
}

fn cursor_for(hovered: Option<NodeId>) -> &'static str {
	if hovered.is_some() { "pointer" } else { "grab" }
}

/// Resolves a click in two borrows: `notify` sees the selection while the old
/// layout is still in place, then the node is toggled and relaid out.
fn click_node(
	shared: &SharedState,
	node: NodeId,
	notify: impl FnOnce(NodeSelection),
) -> Option<GraphStats> {
	let selection = shared.borrow_mut().as_mut()?.select(node)?;
	notify(selection);
	let mut guard = shared.borrow_mut();
	let s = guard.as_mut()?;
	s.toggle(node);
	Some(s.stats())
}

/// Advances one frame. Once the gate has closed the state is released and
/// the loop must not reschedule.
fn advance_frame(gate: &LoadGate, shared: &SharedState, dt_ms: f64) -> bool {
	if !gate.is_open() {
		shared.borrow_mut().take();
		return false;
	}
	if let Some(ref mut s) = *shared.borrow_mut() {
		s.tick(dt_ms.clamp(0.0, MAX_FRAME_MS));
	}
	true
}

/// Interactive course map drawn on a canvas. A click on a node reports it
/// through `on_select` and expands or collapses it.
#[component]
pub fn KnowledgeGraphCanvas(
	#[prop(into)] tree: Signal<Option<KnowledgeTree>>,
	#[prop(optional)] config: GraphConfig,
	#[prop(into)] on_select: Callback<NodeSelection>,
	#[prop(optional)] on_stats: Option<Callback<GraphStats>>,
	#[prop(default = false)] fullscreen: bool,
	#[prop(default = None)] width: Option<f64>,
	#[prop(default = None)] height: Option<f64>,
) -> impl IntoView {
	let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
	let state: SharedState = Rc::new(RefCell::new(None));
	let animate: FrameCallback = Rc::new(RefCell::new(None));
	let resize_cb: FrameCallback = Rc::new(RefCell::new(None));
	let gate = LoadGate::new();

	on_cleanup({
		let gate = gate.clone();
		move || gate.close()
	});

	let report = move |stats: GraphStats| {
		if let Some(on_stats) = on_stats {
			on_stats.run(stats);
		}
	};

	let (state_init, animate_init, resize_init) = (state.clone(), animate.clone(), resize_cb.clone());
	Effect::new(move |_| {
		let data = tree.get();
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		let canvas: HtmlCanvasElement = canvas.into();
		let Some(window) = web_sys::window() else {
			error!("No window available for the knowledge graph canvas");
			return;
		};

		let (w, h) = if fullscreen {
			window_size(&window).unwrap_or((800.0, 600.0))
		} else {
			let parent = canvas.parent_element();
			(
				width.unwrap_or_else(|| parent.as_ref().map_or(800.0, |p| p.client_width() as f64)),
				height.unwrap_or_else(|| parent.as_ref().map_or(600.0, |p| p.client_height() as f64)),
			)
		};
		canvas.set_width(w as u32);
		canvas.set_height(h as u32);

		let stats = data.map(|tree| {
			let graph = KnowledgeGraphState::new(tree, &config, w, h);
			let stats = graph.stats();
			*state_init.borrow_mut() = Some(graph);
			stats
		});
		if let Some(stats) = stats {
			report(stats);
		}

		if animate_init.borrow().is_some() {
			return;
		}
		let Some(ctx) = context_2d(&canvas) else {
			error!("Canvas 2d context unavailable");
			return;
		};

		if fullscreen {
			let (state_resize, canvas_resize) = (state_init.clone(), canvas.clone());
			*resize_init.borrow_mut() = Some(Closure::new(move || {
				let Some((nw, nh)) = web_sys::window().as_ref().and_then(window_size) else {
					return;
				};
				canvas_resize.set_width(nw as u32);
				canvas_resize.set_height(nh as u32);
				if let Some(ref mut s) = *state_resize.borrow_mut() {
					s.resize(nw, nh);
				}
			}));
			if let Some(ref cb) = *resize_init.borrow() {
				let _ = window.add_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
			}
		}

		let (state_anim, animate_inner, resize_inner) =
			(state_init.clone(), animate_init.clone(), resize_init.clone());
		let (gate, last_frame) = (gate.clone(), Rc::new(Cell::new(js_sys::Date::now())));
		*animate_init.borrow_mut() = Some(Closure::new(move || {
			let Some(window) = web_sys::window() else {
				return;
			};
			let now = js_sys::Date::now();
			if !advance_frame(&gate, &state_anim, now - last_frame.replace(now)) {
				debug!("Knowledge graph unmounted, stopping frame loop");
				if let Some(cb) = resize_inner.borrow_mut().take() {
					let _ = window
						.remove_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
				}
				return;
			}
			if let Some(ref s) = *state_anim.borrow() {
				render::render(s, &ctx);
			}
			if let Some(ref cb) = *animate_inner.borrow() {
				let _ = window.request_animation_frame(cb.as_ref().unchecked_ref());
			}
		}));
		if let Some(ref cb) = *animate_init.borrow() {
			let _ = window.request_animation_frame(cb.as_ref().unchecked_ref());
		}
	});

	let state_md = state.clone();
	let on_mousedown = move |ev: MouseEvent| {
		let Some((x, y)) = pointer(canvas_ref, &ev) else {
			return;
		};
		if let Some(ref mut s) = *state_md.borrow_mut() {
			if let Some(node) = s.node_at_position(x, y) {
				s.press(node, x, y);
			} else {
				s.pan.active = true;
				s.pan.start_x = x;
				s.pan.start_y = y;
				s.pan.transform_start_x = s.transform.x;
				s.pan.transform_start_y = s.transform.y;
			}
		}
	};

	let state_mm = state.clone();
	let on_mousemove = move |ev: MouseEvent| {
		let Some((x, y)) = pointer(canvas_ref, &ev) else {
			return;
		};
		if let Some(ref mut s) = *state_mm.borrow_mut() {
			if s.drag.active {
				s.drag_to(x, y);
			} else {
				let hovered = s.node_at_position(x, y);
				s.set_hover(hovered);
				if let Some(canvas) = canvas_ref.get() {
					let style = web_sys::HtmlElement::style(&canvas);
					let _ = style.set_property("cursor", cursor_for(hovered));
				}
				if s.pan.active {
					s.transform.x = s.pan.transform_start_x + (x - s.pan.start_x);
					s.transform.y = s.pan.transform_start_y + (y - s.pan.start_y);
				}
			}
		}
	};

	let state_mu = state.clone();
	let on_mouseup = move |_: MouseEvent| {
		let clicked = state_mu.borrow_mut().as_mut().and_then(|s| {
			s.pan.active = false;
			s.release()
		});
		let Some(node) = clicked else {
			return;
		};
		if let Some(stats) = click_node(&state_mu, node, |selection| on_select.run(selection)) {
			report(stats);
		}
	};

	let state_ml = state.clone();
	let on_mouseleave = move |_: MouseEvent| {
		if let Some(ref mut s) = *state_ml.borrow_mut() {
			let _ = s.release();
			s.pan.active = false;
			s.set_hover(None);
		}
	};

	let state_wh = state.clone();
	let on_wheel = move |ev: WheelEvent| {
		ev.prevent_default();
		let Some((x, y)) = pointer(canvas_ref, &ev) else {
			return;
		};
		if let Some(ref mut s) = *state_wh.borrow_mut() {
			let factor = if ev.delta_y() > 0.0 { 0.9 } else { 1.1 };
			let new_k = (s.transform.k * factor).clamp(0.1, 10.0);
			let ratio = new_k / s.transform.k;
			s.transform.x = x - (x - s.transform.x) * ratio;
			s.transform.y = y - (y - s.transform.y) * ratio;
			s.transform.k = new_k;
		}
	};

	let act = move |shared: SharedState, action: fn(&mut KnowledgeGraphState)| {
		move |_: MouseEvent| {
			let stats = shared.borrow_mut().as_mut().map(|s| {
				action(s);
				s.stats()
			});
			if let Some(stats) = stats {
				report(stats);
			}
		}
	};
	let on_expand_all = act(state.clone(), |s| s.expand_all());
	let on_collapse_all = act(state.clone(), |s| s.collapse_all());
	let on_toggle_relations = act(state, |s| s.show_relations = !s.show_relations);

	let container_style = if fullscreen {
		"position: fixed; inset: 0;"
	} else {
		"position: relative; width: 100%; height: 100%;"
	};

	view! {
		<div class="knowledge-graph" style=container_style>
			<canvas
				node_ref=canvas_ref
				class="knowledge-graph-canvas"
				on:mousedown=on_mousedown
				on:mousemove=on_mousemove
				on:mouseup=on_mouseup
				on:mouseleave=on_mouseleave
				on:wheel=on_wheel
				style="display: block; cursor: grab;"
			/>
			<div class="graph-controls" style="position: absolute; top: 12px; right: 12px; display: flex; gap: 6px;">
				<button on:click=on_expand_all>"Expand all"</button>
				<button on:click=on_collapse_all>"Collapse all"</button>
				<button on:click=on_toggle_relations>"Relations"</button>
			</div>
		</div>
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;
	use crate::components::knowledge_graph::normalize::normalize;

	fn shared() -> SharedState {
		let tree = normalize(&json!({
			"root_name": "Course",
			"children": [
				{"name": "Ch1"},
				{"name": "Ch2", "grandchildren": [{"name": "S2.1"}, {"name": "S2.2"}]}
			]
		}));
		Rc::new(RefCell::new(Some(KnowledgeGraphState::new(
			tree,
			&GraphConfig::default(),
			800.0,
			600.0,
		))))
	}

	fn id(shared: &SharedState, name: &str) -> NodeId {
		let guard = shared.borrow();
		guard.as_ref().unwrap().tree().iter().find(|n| n.name == name).unwrap().id
	}

	#[test]
	fn host_sees_the_selection_before_the_relayout() {
		let shared = shared();
		let ch2 = id(&shared, "Ch2");
		let mut visible_when_notified = None;
		let stats = click_node(&shared, ch2, |selection| {
			assert_eq!(selection.name, "Ch2");
			visible_when_notified = shared.borrow().as_ref().map(|s| s.stats().visible);
		})
		.unwrap();

		assert_eq!(visible_when_notified, Some(3));
		assert_eq!(stats, GraphStats { visible: 5, total: 5 });
	}

	#[test]
	fn clicking_an_unknown_node_notifies_nobody() {
		let shared = shared();
		let mut notified = false;
		assert!(click_node(&shared, NodeId(404), |_| notified = true).is_none());
		assert!(!notified);
	}

	#[test]
	fn frame_loop_stops_and_releases_state_after_teardown() {
		let (gate, shared) = (LoadGate::new(), shared());
		assert!(advance_frame(&gate, &shared, 16.0));
		assert!(advance_frame(&gate, &shared, 5_000.0));
		assert!(shared.borrow().is_some());

		gate.clone().close();
		assert!(!advance_frame(&gate, &shared, 16.0));
		assert!(shared.borrow().is_none());
	}

	#[test]
	fn cursor_follows_hover() {
		assert_eq!(cursor_for(Some(NodeId(1))), "pointer");
		assert_eq!(cursor_for(None), "grab");
	}
}
