use std::f64::consts::PI;

use wasm_bindgen::JsValue;
use web_sys::CanvasRenderingContext2d;

use super::scene::{ease_out_cubic, Phase, Visual};
use super::state::KnowledgeGraphState;
use super::types::NodeId;

const LEVEL_COLORS: &[&str] = &[
	"#3b82f6", "#8b5cf6", "#f472b6", "#f59e0b", "#10b981", "#06b6d4", "#f43f5e",
];
const COMPLETED_STROKE: &str = "#48bb78";
const SELECTED_STROKE: &str = "#a5cbff";
const LABEL_CHARS: usize = 18;

fn level_color(level: usize) -> &'static str {
	LEVEL_COLORS[level.min(LEVEL_COLORS.len() - 1)]
}

/// Shortens a label to `max` characters, ending in an ellipsis when cut.
pub fn truncate_label(name: &str, max: usize) -> String {
	if name.chars().count() <= max {
		return name.to_string();
	}
	let mut out: String = name.chars().take(max.saturating_sub(1)).collect();
	out.push('…');
	out
}

pub fn render(state: &KnowledgeGraphState, ctx: &CanvasRenderingContext2d) {
	ctx.set_fill_style_str("#1a1a2e");
	ctx.fill_rect(0.0, 0.0, state.width, state.height);
	ctx.save();
	let _ = ctx.translate(state.transform.x, state.transform.y);
	let _ = ctx.scale(state.transform.k, state.transform.k);
	draw_links(state, ctx);
	if state.show_relations {
		draw_relations(state, ctx);
	}
	draw_nodes(state, ctx);
	ctx.restore();
}

fn visual_of(state: &KnowledgeGraphState, id: NodeId) -> Option<Visual> {
	let scene = state.scene();
	scene.get(id).map(|e| scene.visual(e))
}

fn draw_links(state: &KnowledgeGraphState, ctx: &CanvasRenderingContext2d) {
	let t = ease_out_cubic(state.hover.highlight_t);
	let scene = state.scene();
	ctx.set_line_width(2.0 / state.transform.k);
	for element in scene.elements() {
		let Some(parent) = element.parent else {
			continue;
		};
		let (Some(from), to) = (visual_of(state, parent), scene.visual(element)) else {
			continue;
		};
		let highlighted = state.is_highlighted(parent) && state.is_highlighted(element.id);
		let emphasis = if highlighted { 0.6 + 0.3 * t } else { 0.6 - 0.45 * t };
		let alpha = emphasis * to.opacity.min(from.opacity);
		ctx.set_stroke_style_str(&format!("rgba(160, 174, 192, {})", alpha));
		ctx.begin_path();
		ctx.move_to(from.x, from.y);
		ctx.line_to(to.x, to.y);
		ctx.stroke();
	}
}

fn draw_relations(state: &KnowledgeGraphState, ctx: &CanvasRenderingContext2d) {
	let k = state.transform.k;
	let (line_width, dash, gap, arrow_size) = (1.5 / k, 8.0 / k, 4.0 / k, 8.0 / k);
	let dash_offset = -(state.flow_time * 30.0) % (dash + gap);

	for relation in &state.visible().relations {
		let (Some(from), Some(to)) = (visual_of(state, relation.from), visual_of(state, relation.to))
		else {
			continue;
		};
		let (dx, dy) = (to.x - from.x, to.y - from.y);
		let dist = (dx * dx + dy * dy).sqrt();
		if dist < 0.001 {
			continue;
		}
		let alpha = 0.8 * from.opacity.min(to.opacity);
		let (ux, uy) = (dx / dist, dy / dist);

		ctx.set_stroke_style_str(&format!("rgba(168, 85, 247, {})", alpha));
		ctx.set_line_width(line_width);
		let _ = ctx.set_line_dash(&js_sys::Array::of2(
			&JsValue::from_f64(dash),
			&JsValue::from_f64(gap),
		));
		ctx.set_line_dash_offset(dash_offset);
		ctx.begin_path();
		ctx.move_to(from.x + ux * from.radius, from.y + uy * from.radius);
		ctx.line_to(
			to.x - ux * (to.radius + arrow_size),
			to.y - uy * (to.radius + arrow_size),
		);
		ctx.stroke();

		let _ = ctx.set_line_dash(&js_sys::Array::new());
		ctx.set_fill_style_str(&format!("rgba(168, 85, 247, {})", alpha));
		let (tip_x, tip_y) = (to.x - ux * to.radius, to.y - uy * to.radius);
		let (back_x, back_y) = (tip_x - ux * arrow_size, tip_y - uy * arrow_size);
		let (px, py) = (-uy * arrow_size * 0.5, ux * arrow_size * 0.5);
		ctx.begin_path();
		ctx.move_to(tip_x, tip_y);
		ctx.line_to(back_x + px, back_y + py);
		ctx.line_to(back_x - px, back_y - py);
		ctx.close_path();
		ctx.fill();

		if !relation.relation_type.is_empty() {
			ctx.set_font(&format!("{}px sans-serif", 10.0 / k.max(0.5)));
			let _ = ctx.fill_text(
				&relation.relation_type,
				(from.x + to.x) / 2.0,
				(from.y + to.y) / 2.0 - 5.0 / k,
			);
		}
	}
	let _ = ctx.set_line_dash(&js_sys::Array::new());
}

fn draw_nodes(state: &KnowledgeGraphState, ctx: &CanvasRenderingContext2d) {
	let (has_highlight, t, k) = (
		state.has_active_highlight(),
		ease_out_cubic(state.hover.highlight_t),
		state.transform.k,
	);
	let selected = state.view().selected();
	let scene = state.scene();

	for element in scene.elements() {
		let Some(node) = state.tree().get(element.id) else {
			continue;
		};
		let v = scene.visual(element);
		if v.radius <= 0.0 || v.opacity <= 0.0 {
			continue;
		}
		let dimmed = has_highlight && !state.is_highlighted(element.id);
		let alpha = v.opacity * if dimmed { 1.0 - 0.7 * t } else { 1.0 };
		let hovered = state.hover.node == Some(element.id);

		if hovered && t > 0.01 {
			if let Ok(gradient) =
				ctx.create_radial_gradient(v.x, v.y, v.radius * 0.3, v.x, v.y, v.radius * (1.8 + 1.2 * t))
			{
				let _ = gradient.add_color_stop(0.0, &format!("rgba(255, 255, 255, {})", 0.35 * t));
				let _ = gradient.add_color_stop(0.6, &format!("rgba(200, 220, 255, {})", 0.1 * t));
				let _ = gradient.add_color_stop(1.0, "rgba(255, 255, 255, 0)");
				ctx.begin_path();
				let _ = ctx.arc(v.x, v.y, v.radius * (1.8 + 1.2 * t), 0.0, 2.0 * PI);
				#[allow(deprecated)]
				ctx.set_fill_style(&gradient);
				ctx.fill();
			}
		}

		ctx.set_global_alpha(alpha);
		ctx.begin_path();
		let _ = ctx.arc(v.x, v.y, v.radius, 0.0, 2.0 * PI);
		ctx.set_fill_style_str(level_color(node.level));
		ctx.fill();

		let (stroke, width) = if selected == Some(node.id) {
			(SELECTED_STROKE, 5.0)
		} else if node.completed {
			(COMPLETED_STROKE, 4.0)
		} else {
			("#ffffff", 2.0)
		};
		ctx.set_stroke_style_str(stroke);
		ctx.set_line_width(width / k);
		ctx.stroke();

		if node.has_children() && element.phase != Phase::Exiting {
			let (ix, iy, ir) = (v.x + v.radius * 0.7, v.y - v.radius * 0.7, (v.radius * 0.3).max(5.0));
			ctx.begin_path();
			let _ = ctx.arc(ix, iy, ir, 0.0, 2.0 * PI);
			ctx.set_fill_style_str(if element.expanded { "#10b981" } else { "#f59e0b" });
			ctx.fill();
			ctx.set_fill_style_str("#ffffff");
			ctx.set_font(&format!("bold {}px sans-serif", ir * 1.4));
			ctx.set_text_align("center");
			ctx.set_text_baseline("middle");
			let _ = ctx.fill_text(if element.expanded { "−" } else { "+" }, ix, iy);
		}

		ctx.set_fill_style_str("white");
		ctx.set_font(&format!(
			"{}{}px sans-serif",
			if node.completed { "bold " } else { "" },
			12.0 / k.max(0.5)
		));
		ctx.set_text_align("left");
		ctx.set_text_baseline("middle");
		let _ = ctx.fill_text(&truncate_label(&node.name, LABEL_CHARS), v.x + v.radius + 4.0, v.y);
		ctx.set_global_alpha(1.0);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn labels_are_cut_on_char_boundaries() {
		assert_eq!(truncate_label("Threads", 18), "Threads");
		assert_eq!(truncate_label("Virtual memory and paging", 10), "Virtual m…");
		assert_eq!(truncate_label("操作系统进程调度算法", 5), "操作系统…");
	}

	#[test]
	fn deep_levels_reuse_last_color() {
		assert_eq!(level_color(0), "#3b82f6");
		assert_eq!(level_color(42), "#f43f5e");
	}
}
