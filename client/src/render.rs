use std::collections::HashMap;

use js_sys::Function;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{CanvasRenderingContext2d, Document, HtmlCanvasElement, HtmlImageElement};

use banana_shared::{CanvasScene, Dimensions, PlacedImage, Point, Stroke, BACKGROUND_COLOR};

use crate::geometry::{Bounds, HANDLE_SIZE};
use crate::state::CanvasState;

/// Decoded `<img>` elements keyed by the id of the placed image they show.
pub struct ImageCache<E = HtmlImageElement> {
    images: HashMap<String, E>,
}

impl<E> Default for ImageCache<E> {
    fn default() -> Self {
        Self {
            images: HashMap::new(),
        }
    }
}

impl<E> ImageCache<E> {
    /// Drops elements of images that are no longer on the canvas.
    pub fn retain_placed(&mut self, placed: &[PlacedImage]) {
        self.images
            .retain(|id, _| placed.iter().any(|image| image.id == *id));
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.images.len()
    }

    fn insert(&mut self, id: &str, element: E) {
        self.images.insert(id.to_string(), element);
    }
}

impl ImageCache<HtmlImageElement> {
    /// The element if it has finished loading; starts loading otherwise.
    pub fn ready(&mut self, image: &PlacedImage, on_load: &Function) -> Option<HtmlImageElement> {
        if let Some(element) = self.images.get(&image.id) {
            return (element.complete() && element.natural_width() > 0).then(|| element.clone());
        }
        let element = HtmlImageElement::new().ok()?;
        element.set_onload(Some(on_load));
        element.set_src(&image.source);
        self.insert(&image.id, element);
        None
    }
}

pub fn draw_dot(ctx: &CanvasRenderingContext2d, point: Point, color: &str, size: f32) {
    ctx.set_fill_style_str(color);
    ctx.begin_path();
    let _ = ctx.arc(
        point.x as f64,
        point.y as f64,
        size as f64 / 2.0,
        0.0,
        std::f64::consts::PI * 2.0,
    );
    ctx.fill();
}

pub fn draw_segment(ctx: &CanvasRenderingContext2d, from: Point, to: Point, color: &str, size: f32) {
    ctx.set_stroke_style_str(color);
    ctx.set_line_width(size as f64);
    ctx.set_line_cap("round");
    ctx.set_line_join("round");
    ctx.begin_path();
    ctx.move_to(from.x as f64, from.y as f64);
    ctx.line_to(to.x as f64, to.y as f64);
    ctx.stroke();
}

pub fn draw_stroke(ctx: &CanvasRenderingContext2d, stroke: &Stroke) {
    match stroke.points.as_slice() {
        [] => {}
        [point] => draw_dot(ctx, *point, &stroke.color, stroke.size),
        points => {
            for pair in points.windows(2) {
                draw_segment(ctx, pair[0], pair[1], &stroke.color, stroke.size);
            }
        }
    }
}

fn draw_image(
    ctx: &CanvasRenderingContext2d,
    image: &PlacedImage,
    cache: &mut ImageCache,
    on_load: &Function,
) {
    if let Some(element) = cache.ready(image, on_load) {
        let _ = ctx.draw_image_with_html_image_element_and_dw_and_dh(
            &element,
            image.x,
            image.y,
            image.width,
            image.height,
        );
    }
}

/// Paints background, images, then strokes, in scene coordinates.
pub fn draw_scene(
    ctx: &CanvasRenderingContext2d,
    scene: &CanvasScene,
    dimensions: Dimensions,
    cache: &mut ImageCache,
    on_load: &Function,
) {
    ctx.set_fill_style_str(BACKGROUND_COLOR);
    ctx.fill_rect(0.0, 0.0, dimensions.width as f64, dimensions.height as f64);
    for image in &scene.images {
        draw_image(ctx, image, cache, on_load);
    }
    for stroke in &scene.strokes {
        draw_stroke(ctx, stroke);
    }
}

pub fn redraw(
    ctx: &CanvasRenderingContext2d,
    state: &CanvasState,
    cache: &mut ImageCache,
    on_load: &Function,
) {
    draw_scene(ctx, &state.scene(), state.dimensions(), cache, on_load);
    if let Some(image) = state.selected() {
        draw_selection(ctx, Bounds::of(image));
    }
}

fn draw_selection(ctx: &CanvasRenderingContext2d, bounds: Bounds) {
    ctx.save();
    ctx.set_line_width(2.0);
    ctx.set_stroke_style_str("rgba(245, 158, 11, 0.9)");
    let _ = ctx.set_line_dash(&js_sys::Array::of2(&6.into(), &4.into()));
    ctx.stroke_rect(bounds.x, bounds.y, bounds.width, bounds.height);
    let _ = ctx.set_line_dash(&js_sys::Array::new());
    let half = HANDLE_SIZE / 2.0;
    ctx.set_fill_style_str("rgba(245, 158, 11, 0.95)");
    ctx.fill_rect(
        bounds.right() - half,
        bounds.bottom() - half,
        HANDLE_SIZE,
        HANDLE_SIZE,
    );
    ctx.restore();
}

/// Renders a scene onto a detached canvas and returns it as a PNG data URL.
pub fn scene_to_data_url(
    document: &Document,
    scene: &CanvasScene,
    dimensions: Dimensions,
    cache: &mut ImageCache,
    on_load: &Function,
) -> Result<String, JsValue> {
    let canvas: HtmlCanvasElement = document.create_element("canvas")?.dyn_into()?;
    canvas.set_width(dimensions.width);
    canvas.set_height(dimensions.height);
    let ctx: CanvasRenderingContext2d = canvas
        .get_context("2d")?
        .ok_or_else(|| JsValue::from_str("2d context unavailable"))?
        .dyn_into()?;
    draw_scene(&ctx, scene, dimensions, cache, on_load);
    canvas.to_data_url()
}
