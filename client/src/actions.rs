use std::sync::Arc;

use banana_shared::{
    AspectRatio, CanvasScene, Layer, PlacedImage, Point, Stroke, Tool, BACKGROUND_COLOR,
};

use crate::geometry::{clamp_bounds, fit_upload, image_at, normalize_point, Bounds};
use crate::history::Snapshot;
use crate::state::{
    CanvasState, DrawMode, DEFAULT_BRUSH_SIZE, DEFAULT_COLOR, DEFAULT_ERASER_SIZE,
};

pub const MAX_STROKE_POINTS: usize = 5000;
pub const MIN_TOOL_SIZE: f32 = 1.0;
pub const MAX_TOOL_SIZE: f32 = 60.0;

pub fn sanitize_color(mut color: String) -> String {
    if color.trim().is_empty() {
        return DEFAULT_COLOR.to_string();
    }
    if color.len() > 32 {
        let mut end = 32;
        while !color.is_char_boundary(end) {
            end -= 1;
        }
        color.truncate(end);
    }
    color
}

pub fn sanitize_size(size: f32, fallback: f32) -> f32 {
    let size = if size.is_finite() { size } else { fallback };
    size.clamp(MIN_TOOL_SIZE, MAX_TOOL_SIZE)
}

pub fn set_tool(state: &mut CanvasState, tool: Tool) {
    if state.is_drawing() {
        end_stroke(state);
    }
    if tool != Tool::Select {
        state.selected_image = None;
    }
    state.tool = tool;
}

pub fn set_color(state: &mut CanvasState, color: String) {
    state.current_color = sanitize_color(color);
}

pub fn set_brush_size(state: &mut CanvasState, size: f32) {
    state.brush_size = sanitize_size(size, DEFAULT_BRUSH_SIZE);
}

pub fn set_eraser_size(state: &mut CanvasState, size: f32) {
    state.eraser_size = sanitize_size(size, DEFAULT_ERASER_SIZE);
}

/// Presets switch to their fixed size; `custom` keeps the current one.
pub fn set_aspect_ratio(state: &mut CanvasState, ratio: AspectRatio) {
    if let Some(dimensions) = ratio.dimensions() {
        state.canvas_width = dimensions.width;
        state.canvas_height = dimensions.height;
    }
    state.aspect_ratio = ratio;
}

pub fn set_canvas_size(state: &mut CanvasState, width: u32, height: u32) {
    state.aspect_ratio = AspectRatio::Custom;
    state.canvas_width = width.max(1);
    state.canvas_height = height.max(1);
}

pub fn begin_stroke(state: &mut CanvasState, id: String, point: Point) -> bool {
    if !state.tool.draws() {
        return false;
    }
    let Some(point) = normalize_point(point) else {
        return false;
    };
    if state.is_drawing() {
        end_stroke(state);
    }
    let (color, size) = match state.tool {
        Tool::Eraser => (BACKGROUND_COLOR.to_string(), state.eraser_size),
        _ => (state.current_color.clone(), state.brush_size),
    };
    state.strokes.push(Stroke {
        id: id.clone(),
        tool: state.tool,
        color,
        size,
        points: vec![point],
    });
    state.mode = DrawMode::Drawing { id };
    true
}

/// Returns the segment end points to paint incrementally, if the point was kept.
pub fn extend_stroke(state: &mut CanvasState, point: Point) -> Option<(Point, Point)> {
    let point = normalize_point(point)?;
    let DrawMode::Drawing { id } = &state.mode else {
        return None;
    };
    let stroke = state.strokes.iter_mut().find(|stroke| &stroke.id == id)?;
    if stroke.points.len() >= MAX_STROKE_POINTS {
        return None;
    }
    let from = stroke.points.last().copied().unwrap_or(point);
    stroke.points.push(point);
    Some((from, point))
}

pub fn end_stroke(state: &mut CanvasState) -> bool {
    if !state.is_drawing() {
        return false;
    }
    state.mode = DrawMode::Idle;
    record_snapshot(state);
    true
}

pub fn place_image(state: &mut CanvasState, id: String, source: String, bounds: Bounds) -> bool {
    let Some(bounds) = clamp_bounds(bounds) else {
        return false;
    };
    state.images.push(PlacedImage {
        id,
        source,
        x: bounds.x,
        y: bounds.y,
        width: bounds.width,
        height: bounds.height,
    });
    record_snapshot(state);
    true
}

pub fn place_upload(
    state: &mut CanvasState,
    id: String,
    source: String,
    natural_width: f64,
    natural_height: f64,
    index: usize,
) -> bool {
    let bounds = fit_upload(natural_width, natural_height, index, state.dimensions());
    place_image(state, id, source, bounds)
}

/// Live drag feedback; no snapshot until `transform_image`.
pub fn preview_image_bounds(state: &mut CanvasState, id: &str, bounds: Bounds) -> bool {
    let Some(bounds) = clamp_bounds(bounds) else {
        return false;
    };
    let Some(image) = state.images.iter_mut().find(|image| image.id == id) else {
        return false;
    };
    image.x = bounds.x;
    image.y = bounds.y;
    image.width = bounds.width;
    image.height = bounds.height;
    true
}

pub fn transform_image(state: &mut CanvasState, id: &str, bounds: Bounds) -> bool {
    if !preview_image_bounds(state, id, bounds) {
        return false;
    }
    record_snapshot(state);
    true
}

pub fn delete_image(state: &mut CanvasState, id: &str) -> bool {
    let Some(index) = state.images.iter().position(|image| image.id == id) else {
        return false;
    };
    state.images.remove(index);
    if state.selected_image.as_deref() == Some(id) {
        state.selected_image = None;
    }
    record_snapshot(state);
    true
}

pub fn delete_selected(state: &mut CanvasState) -> bool {
    match state.selected_image.clone() {
        Some(id) => delete_image(state, &id),
        None => false,
    }
}

pub fn select_image_at(state: &mut CanvasState, point: Point) -> Option<String> {
    let id = image_at(&state.images, point).map(|image| image.id.clone());
    state.selected_image = id.clone();
    id
}

pub fn clear(state: &mut CanvasState) {
    state.strokes.clear();
    state.images.clear();
    state.selected_image = None;
    state.mode = DrawMode::Idle;
    record_snapshot(state);
}

/// Captures the current scene. Encoding failures are logged and skipped.
pub fn record_snapshot(state: &mut CanvasState) {
    match Snapshot::capture(&state.scene()) {
        Ok(snapshot) => add_to_history(state, Arc::new(snapshot)),
        Err(error) => log::warn!("skipping canvas snapshot: {error}"),
    }
}

pub fn add_to_history(state: &mut CanvasState, snapshot: Arc<Snapshot>) {
    state.history.append(snapshot);
}

pub fn undo(state: &mut CanvasState) -> bool {
    if state.is_drawing() {
        return false;
    }
    let Some(snapshot) = state.history.undo() else {
        return false;
    };
    if restore_scene(state, &snapshot) {
        true
    } else {
        state.history.redo();
        false
    }
}

pub fn redo(state: &mut CanvasState) -> bool {
    if state.is_drawing() {
        return false;
    }
    let Some(snapshot) = state.history.redo() else {
        return false;
    };
    if restore_scene(state, &snapshot) {
        true
    } else {
        state.history.undo();
        false
    }
}

fn restore_scene(state: &mut CanvasState, snapshot: &Snapshot) -> bool {
    match snapshot.restore() {
        Ok(CanvasScene { strokes, images, .. }) => {
            state.strokes = strokes;
            state.images = images;
            let still_placed = state
                .selected_image
                .as_deref()
                .is_some_and(|selected| state.images.iter().any(|image| image.id == selected));
            if !still_placed {
                state.selected_image = None;
            }
            true
        }
        Err(error) => {
            log::error!("failed to restore canvas snapshot: {error}");
            false
        }
    }
}

pub fn add_layer(state: &mut CanvasState, id: String, name: String) {
    state.layers.push(Layer {
        id: id.clone(),
        name,
        visible: true,
        opacity: 1.0,
        locked: false,
    });
    state.active_layer_id = Some(id);
}

pub fn remove_layer(state: &mut CanvasState, id: &str) -> bool {
    let Some(index) = state.layers.iter().position(|layer| layer.id == id) else {
        return false;
    };
    state.layers.remove(index);
    if state.active_layer_id.as_deref() == Some(id) {
        state.active_layer_id = state.layers.first().map(|layer| layer.id.clone());
    }
    true
}

pub fn set_active_layer(state: &mut CanvasState, id: &str) -> bool {
    if !state.layers.iter().any(|layer| layer.id == id) {
        return false;
    }
    state.active_layer_id = Some(id.to_string());
    true
}

#[derive(Default)]
pub struct LayerUpdate {
    pub name: Option<String>,
    pub visible: Option<bool>,
    pub opacity: Option<f32>,
    pub locked: Option<bool>,
}

pub fn update_layer(state: &mut CanvasState, id: &str, update: LayerUpdate) -> bool {
    let Some(layer) = state.layers.iter_mut().find(|layer| layer.id == id) else {
        return false;
    };
    if let Some(name) = update.name {
        layer.name = name;
    }
    if let Some(visible) = update.visible {
        layer.visible = visible;
    }
    if let Some(opacity) = update.opacity.filter(|value| value.is_finite()) {
        layer.opacity = opacity.clamp(0.0, 1.0);
    }
    if let Some(locked) = update.locked {
        layer.locked = locked;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use banana_shared::Dimensions;

    fn bounds(x: f64, y: f64, width: f64, height: f64) -> Bounds {
        Bounds {
            x,
            y,
            width,
            height,
        }
    }

    fn draw(state: &mut CanvasState, id: &str) {
        assert!(begin_stroke(state, id.into(), Point::new(1.0, 1.0)));
        extend_stroke(state, Point::new(5.0, 5.0));
        assert!(end_stroke(state));
    }

    #[test]
    fn strokes_snapshot_on_end_only() {
        let mut state = CanvasState::default();
        begin_stroke(&mut state, "s1".into(), Point::new(0.0, 0.0));
        let segment = extend_stroke(&mut state, Point::new(3.0, 4.0));
        assert_eq!(segment, Some((Point::new(0.0, 0.0), Point::new(3.0, 4.0))));
        assert!(state.history.is_empty());
        end_stroke(&mut state);
        assert_eq!(state.history.len(), 1);
        assert_eq!(state.strokes[0].points.len(), 2);
        assert!(!end_stroke(&mut state));
    }

    #[test]
    fn select_tool_does_not_draw() {
        let mut state = CanvasState::default();
        set_tool(&mut state, Tool::Select);
        assert!(!begin_stroke(&mut state, "s".into(), Point::new(0.0, 0.0)));
        assert!(extend_stroke(&mut state, Point::new(1.0, 1.0)).is_none());
        assert!(state.strokes.is_empty());
    }

    #[test]
    fn eraser_paints_background_with_eraser_size() {
        let mut state = CanvasState::default();
        set_tool(&mut state, Tool::Eraser);
        set_eraser_size(&mut state, 24.0);
        begin_stroke(&mut state, "e".into(), Point::new(2.0, 2.0));
        let stroke = &state.strokes[0];
        assert_eq!(stroke.color, BACKGROUND_COLOR);
        assert_eq!(stroke.size, 24.0);
        assert_eq!(stroke.tool, Tool::Eraser);
    }

    #[test]
    fn non_finite_points_are_dropped() {
        let mut state = CanvasState::default();
        assert!(!begin_stroke(&mut state, "s".into(), Point::new(f32::NAN, 0.0)));
        begin_stroke(&mut state, "s".into(), Point::new(0.0, 0.0));
        assert!(extend_stroke(&mut state, Point::new(0.0, f32::INFINITY)).is_none());
        assert_eq!(state.strokes[0].points.len(), 1);
    }

    #[test]
    fn tool_settings_are_sanitized() {
        let mut state = CanvasState::default();
        set_brush_size(&mut state, 500.0);
        assert_eq!(state.brush_size, MAX_TOOL_SIZE);
        set_brush_size(&mut state, f32::NAN);
        assert_eq!(state.brush_size, DEFAULT_BRUSH_SIZE);
        set_color(&mut state, String::new());
        assert_eq!(state.current_color, DEFAULT_COLOR);
        set_color(&mut state, "x".repeat(40));
        assert_eq!(state.current_color.len(), 32);
    }

    #[test]
    fn aspect_ratio_presets_resize_and_custom_keeps_size() {
        let mut state = CanvasState::default();
        set_aspect_ratio(&mut state, AspectRatio::Wide);
        assert_eq!((state.canvas_width, state.canvas_height), (1344, 768));
        set_aspect_ratio(&mut state, AspectRatio::Custom);
        assert_eq!(state.aspect_ratio, AspectRatio::Custom);
        assert_eq!((state.canvas_width, state.canvas_height), (1344, 768));
        set_aspect_ratio(&mut state, AspectRatio::Square);
        set_canvas_size(&mut state, 640, 0);
        assert_eq!(state.aspect_ratio, AspectRatio::Custom);
        assert_eq!(state.dimensions(), Dimensions::new(640, 1));
    }

    #[test]
    fn image_lifecycle_snapshots_each_step() {
        let mut state = CanvasState::default();
        assert!(place_image(&mut state, "img".into(), "data:".into(), bounds(0.0, 0.0, 2.0, 80.0)));
        assert_eq!(state.images[0].width, 5.0);
        assert!(transform_image(&mut state, "img", bounds(10.0, 20.0, 1.0, 1.0)));
        assert_eq!((state.images[0].width, state.images[0].height), (5.0, 5.0));
        assert!(!transform_image(&mut state, "missing", bounds(0.0, 0.0, 10.0, 10.0)));
        assert!(delete_image(&mut state, "img"));
        assert_eq!(state.history.len(), 3);
        assert!(state.images.is_empty());
    }

    #[test]
    fn uploads_are_laid_out_by_index() {
        let mut state = CanvasState::default();
        place_upload(&mut state, "u0".into(), "data:".into(), 400.0, 200.0, 0);
        place_upload(&mut state, "u1".into(), "data:".into(), 400.0, 200.0, 1);
        assert_eq!((state.images[0].x, state.images[0].width), (50.0, 200.0));
        assert_eq!((state.images[1].x, state.images[1].y), (80.0, 80.0));
    }

    #[test]
    fn undo_and_redo_restore_scene() {
        let mut state = CanvasState::default();
        record_snapshot(&mut state);
        draw(&mut state, "a");
        draw(&mut state, "b");
        assert_eq!(state.strokes.len(), 2);

        assert!(undo(&mut state));
        assert_eq!(state.strokes.len(), 1);
        assert!(undo(&mut state));
        assert!(state.strokes.is_empty());
        assert!(!undo(&mut state));

        assert!(redo(&mut state));
        assert_eq!(state.strokes[0].id, "a");
        assert!(redo(&mut state));
        assert!(!redo(&mut state));
        assert_eq!(state.strokes.len(), 2);
    }

    #[test]
    fn undo_keeps_live_state_when_snapshot_is_corrupt() {
        let mut state = CanvasState::default();
        add_to_history(&mut state, Arc::new(Snapshot::from_bytes(vec![1, 2, 3])));
        draw(&mut state, "a");
        assert!(!undo(&mut state));
        assert_eq!(state.strokes.len(), 1);
        assert_eq!(state.history.index(), 1);
    }

    #[test]
    fn clear_appends_blank_snapshot() {
        let mut state = CanvasState::default();
        draw(&mut state, "a");
        place_image(&mut state, "i".into(), "data:".into(), bounds(0.0, 0.0, 10.0, 10.0));
        state.selected_image = Some("i".into());
        clear(&mut state);
        assert!(state.scene().is_empty());
        assert!(state.selected_image.is_none());
        assert_eq!(state.history.len(), 3);
        assert!(state.history.current().unwrap().restore().unwrap().is_empty());
    }

    #[test]
    fn selection_hits_topmost_and_clears_on_miss() {
        let mut state = CanvasState::default();
        place_image(&mut state, "a".into(), "data:".into(), bounds(0.0, 0.0, 100.0, 100.0));
        place_image(&mut state, "b".into(), "data:".into(), bounds(50.0, 50.0, 100.0, 100.0));
        assert_eq!(select_image_at(&mut state, Point::new(75.0, 75.0)).as_deref(), Some("b"));
        assert!(delete_selected(&mut state));
        assert_eq!(state.images.len(), 1);
        assert!(select_image_at(&mut state, Point::new(500.0, 500.0)).is_none());
        assert!(!delete_selected(&mut state));
    }

    #[test]
    fn layers_retarget_active_on_remove() {
        let mut state = CanvasState::default();
        add_layer(&mut state, "ink".into(), "Ink".into());
        assert_eq!(state.active_layer_id.as_deref(), Some("ink"));
        update_layer(
            &mut state,
            "ink",
            LayerUpdate {
                opacity: Some(3.0),
                visible: Some(false),
                ..Default::default()
            },
        );
        assert_eq!(state.layers[1].opacity, 1.0);
        assert!(!state.layers[1].visible);
        assert!(remove_layer(&mut state, "ink"));
        assert_eq!(state.active_layer_id.as_deref(), Some("background"));
        assert!(!set_active_layer(&mut state, "ink"));
    }
}
