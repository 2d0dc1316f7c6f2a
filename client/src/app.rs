use std::cell::RefCell;
use std::rc::Rc;

use js_sys::Function;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    CanvasRenderingContext2d, Document, Element, Event, File, FileReader, HtmlButtonElement,
    HtmlCanvasElement, HtmlElement, HtmlImageElement, HtmlInputElement, HtmlSelectElement,
    HtmlTextAreaElement, KeyboardEvent, PointerEvent, ProgressEvent, Window,
};

use banana_shared::{AspectRatio, Point, TagCategory, Tool};

use crate::actions;
use crate::dom::{
    closest_with_attribute, create_child, download_url, event_to_point, get_element, listen,
    set_canvas_cursor, set_hidden, set_status, set_tool_button,
};
use crate::geometry::{hit_resize_handle, resize_to, translate, Bounds};
use crate::handle::CanvasHandle;
use crate::net;
use crate::persistence::{Persistence, StorageFlavour};
use crate::prompt::{PromptSource, PromptStyle, MAX_PROMPT_CHARS};
use crate::render::{draw_segment, redraw, scene_to_data_url, ImageCache};
use crate::session::{AppState, CategoryFilter, GenerationBlocked};
use crate::util::{download_name, make_id};

enum Gesture {
    Idle,
    Drawing,
    Moving { id: String, start: Point, origin: Bounds },
    Resizing { id: String, origin: Bounds },
}

struct Ui {
    window: Window,
    document: Document,
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
    status: Element,
    brush_button: HtmlButtonElement,
    eraser_button: HtmlButtonElement,
    select_button: HtmlButtonElement,
    undo_button: HtmlButtonElement,
    redo_button: HtmlButtonElement,
    delete_button: HtmlButtonElement,
    analyze_button: HtmlButtonElement,
    generate_button: HtmlButtonElement,
    revert_button: HtmlButtonElement,
    aspect_select: HtmlSelectElement,
    size_input: HtmlInputElement,
    upload_input: HtmlInputElement,
    prompt_input: HtmlTextAreaElement,
    prompt_count: Element,
    categories_el: Element,
    tags_el: Element,
    uploads_el: Element,
    gallery_el: Element,
    images: RefCell<ImageCache>,
    on_image_load: Function,
}

impl Ui {
    fn alert(&self, message: &str) {
        let _ = self.window.alert_with_message(message);
    }

    /// Rendered canvas as a PNG data URL; `None` when nothing is drawn.
    fn capture(&self, handle: &CanvasHandle, without_uploads: bool) -> Option<String> {
        let (scene, dimensions) = handle.read(|state| {
            let scene = if without_uploads {
                state.canvas.scene_without(&state.images.upload_ids())
            } else {
                state.canvas.scene()
            };
            (scene, state.canvas.dimensions())
        });
        if scene.is_empty() {
            return None;
        }
        let mut images = self.images.borrow_mut();
        match scene_to_data_url(&self.document, &scene, dimensions, &mut images, &self.on_image_load) {
            Ok(url) => Some(url),
            Err(error) => {
                log::warn!("canvas capture failed: {error:?}");
                None
            }
        }
    }
}

fn render_canvas(ui: &Ui, state: &AppState) {
    let canvas = &state.canvas;
    let dimensions = canvas.dimensions();
    if ui.canvas.width() != dimensions.width || ui.canvas.height() != dimensions.height {
        ui.canvas.set_width(dimensions.width);
        ui.canvas.set_height(dimensions.height);
    }
    let mut images = ui.images.borrow_mut();
    images.retain_placed(&canvas.images);
    redraw(&ui.ctx, canvas, &mut images, &ui.on_image_load);
    drop(images);

    set_tool_button(&ui.brush_button, canvas.tool == Tool::Brush);
    set_tool_button(&ui.eraser_button, canvas.tool == Tool::Eraser);
    set_tool_button(&ui.select_button, canvas.tool == Tool::Select);
    set_canvas_cursor(&ui.canvas, canvas.tool);
    ui.undo_button.set_disabled(!canvas.can_undo());
    ui.redo_button.set_disabled(!canvas.can_redo());
    ui.delete_button.set_disabled(canvas.selected_image.is_none());
    ui.size_input.set_value(&format!("{}", canvas.active_size()));
    ui.aspect_select.set_value(canvas.aspect_ratio.as_str());
    render_prompt(ui, state);
}

fn render_prompt(ui: &Ui, state: &AppState) {
    ui.prompt_count.set_text_content(Some(&format!(
        "{}/{}",
        state.prompt.char_count(),
        MAX_PROMPT_CHARS
    )));
    set_hidden(
        ui.revert_button.unchecked_ref::<HtmlElement>(),
        state.prompt.source != PromptSource::Modified,
    );
    ui.generate_button
        .set_disabled(state.is_generating || state.prompt.is_blank());
    ui.generate_button.set_text_content(Some(if state.is_generating {
        "Generating..."
    } else {
        "Generate"
    }));
}

fn render_panels(ui: &Ui, state: &AppState) {
    render_categories(ui, state);
    render_tags(ui, state);
    render_uploads(ui, state);
    render_gallery(ui, state);
    render_prompt(ui, state);
}

fn render_categories(ui: &Ui, state: &AppState) {
    ui.categories_el.set_inner_html("");
    let entries = std::iter::once(("all", CategoryFilter::All)).chain(
        TagCategory::ALL
            .iter()
            .map(|category| (category.as_str(), CategoryFilter::Only(*category))),
    );
    for (name, filter) in entries {
        let Ok(button) = create_child(&ui.document, &ui.categories_el, "button", "category") else {
            continue;
        };
        let _ = button.set_attribute("type", "button");
        let _ = button.set_attribute("data-category", name);
        let pressed = if state.category == filter { "true" } else { "false" };
        let _ = button.set_attribute("aria-pressed", pressed);
        button.set_text_content(Some(name));
    }
}

fn render_tags(ui: &Ui, state: &AppState) {
    ui.tags_el.set_inner_html("");
    let selected = state.selected_tag.as_ref().map(|tag| tag.id);
    for tag in state.filtered_tags() {
        let class = if selected == Some(tag.id) { "tag active" } else { "tag" };
        let Ok(card) = create_child(&ui.document, &ui.tags_el, "button", class) else {
            continue;
        };
        let _ = card.set_attribute("type", "button");
        let _ = card.set_attribute("data-tag-id", &tag.id.to_string());
        let _ = card.set_attribute("title", &tag.description);
        card.set_text_content(Some(&format!("{} {}", tag.emoji, tag.label)));
    }
}

fn render_uploads(ui: &Ui, state: &AppState) {
    ui.uploads_el.set_inner_html("");
    ui.upload_input.set_disabled(state.images.is_full());
    let selected = state.images.selected().map(|image| image.id.clone());
    for upload in state.images.uploads() {
        let mut class = String::from("upload");
        if selected.as_deref() == Some(upload.id.as_str()) {
            class.push_str(" active");
        }
        if !state.upload_is_placed(&upload.id) {
            class.push_str(" unplaced");
        }
        let Ok(item) = create_child(&ui.document, &ui.uploads_el, "div", &class) else {
            continue;
        };
        if let Ok(thumb) = create_child(&ui.document, &item, "img", "thumb") {
            let _ = thumb.set_attribute("src", &upload.preview);
            let _ = thumb.set_attribute("alt", &upload.file_name);
            let _ = thumb.set_attribute("data-select-upload", &upload.id);
        }
        if let Ok(remove) = create_child(&ui.document, &item, "button", "remove") {
            let _ = remove.set_attribute("type", "button");
            let _ = remove.set_attribute("data-upload-id", &upload.id);
            remove.set_text_content(Some("×"));
        }
    }
}

fn render_gallery(ui: &Ui, state: &AppState) {
    ui.gallery_el.set_inner_html("");
    let latest = state.images.generated();
    for record in &state.gallery {
        let class = if latest == Some(record.url.as_str()) {
            "record latest"
        } else {
            "record"
        };
        let Ok(item) = create_child(&ui.document, &ui.gallery_el, "figure", class) else {
            continue;
        };
        if let Ok(image) = create_child(&ui.document, &item, "img", "thumb") {
            let _ = image.set_attribute("src", &record.url);
            let _ = image.set_attribute("title", &record.prompt);
            let _ = image.set_attribute("data-action", "place");
            let _ = image.set_attribute("data-record-id", &record.id);
        }
        if let Ok(save) = create_child(&ui.document, &item, "button", "download") {
            let _ = save.set_attribute("type", "button");
            let _ = save.set_attribute("data-action", "download");
            let _ = save.set_attribute("data-record-id", &record.id);
            save.set_text_content(Some("↓"));
        }
        if let Ok(remove) = create_child(&ui.document, &item, "button", "remove") {
            let _ = remove.set_attribute("type", "button");
            let _ = remove.set_attribute("data-action", "delete");
            let _ = remove.set_attribute("data-record-id", &record.id);
            remove.set_text_content(Some("×"));
        }
    }
}

fn refresh_panels(ui: &Ui, handle: &CanvasHandle) {
    handle.read(|state| render_panels(ui, state));
}

fn read_upload(ui: Rc<Ui>, handle: CanvasHandle, file: File) -> Result<(), JsValue> {
    let reader = FileReader::new()?;
    let reader_cb = reader.clone();
    let file_name = file.name();
    let mime_type = file.type_();
    let onload = Closure::once_into_js(move |_: ProgressEvent| {
        let Some(preview) = reader_cb.result().ok().and_then(|value| value.as_string()) else {
            log::warn!("could not read {file_name}");
            return;
        };
        let Ok(image) = HtmlImageElement::new() else {
            return;
        };
        let image_cb = image.clone();
        let source = preview.clone();
        let onimage = Closure::once_into_js(move |_: Event| {
            let width = image_cb.natural_width() as f64;
            let height = image_cb.natural_height() as f64;
            let result =
                handle.update(|state| state.add_upload(file_name, mime_type, preview, width, height));
            if let Err(error) = result {
                ui.alert(&error.to_string());
            }
            refresh_panels(&ui, &handle);
        });
        image.set_onload(Some(onimage.unchecked_ref()));
        image.set_src(&source);
    });
    reader.set_onload(Some(onload.unchecked_ref()));
    reader.read_as_data_url(&file)
}

fn start_analysis(ui: Rc<Ui>, handle: CanvasHandle) {
    let capture = ui.capture(&handle, false);
    let images = handle.read(|state| state.analysis_images(capture));
    if images.is_empty() {
        set_status(&ui.status, "idle", "Draw or upload something first");
        return;
    }
    ui.analyze_button.set_disabled(true);
    set_status(&ui.status, "busy", "Analyzing...");
    wasm_bindgen_futures::spawn_local(async move {
        match net::analyze(images).await {
            Ok(response) => {
                if response.is_mock == Some(true) {
                    let message = response.message.clone().unwrap_or_default();
                    set_status(&ui.status, "warn", &message);
                } else {
                    set_status(&ui.status, "idle", "Pick an idea");
                }
                handle.update(|state| state.set_tags(response.tags));
                refresh_panels(&ui, &handle);
            }
            Err(error) => {
                set_status(&ui.status, "error", &error.to_string());
                ui.alert(&error.user_message());
            }
        }
        ui.analyze_button.set_disabled(false);
    });
}

fn start_generation(ui: Rc<Ui>, handle: CanvasHandle) {
    let capture = ui.capture(&handle, true);
    let (ticket, request) = match handle.update(|state| state.begin_generation(capture.as_deref())) {
        Ok(pending) => pending,
        Err(GenerationBlocked::InProgress) => return,
        Err(error) => {
            set_status(&ui.status, "error", &error.to_string());
            return;
        }
    };
    set_status(&ui.status, "busy", "Generating...");
    wasm_bindgen_futures::spawn_local(async move {
        match net::generate(&request).await {
            Ok(response) => {
                let landed = handle.update(|state| state.finish_generation(ticket, &response));
                match (landed, response.text.as_deref()) {
                    (None, _) => set_status(&ui.status, "idle", "Ready"),
                    (Some(_), Some(text)) => set_status(&ui.status, "info", text),
                    (Some(_), None) => set_status(&ui.status, "idle", "Done"),
                }
                refresh_panels(&ui, &handle);
            }
            Err(error) => {
                handle.update(|state| state.fail_generation(ticket, &error.to_string()));
                set_status(&ui.status, "error", &error.to_string());
                ui.alert(&error.user_message());
            }
        }
    });
}

fn on_pointer_down(ui: &Ui, handle: &CanvasHandle, gesture: &RefCell<Gesture>, event: &PointerEvent) {
    let Some(point) = event_to_point(&ui.canvas, event) else {
        return;
    };
    let next = match handle.read(|state| state.canvas.tool) {
        Tool::Brush | Tool::Eraser => {
            let started =
                handle.update(|state| actions::begin_stroke(&mut state.canvas, make_id(), point));
            if started {
                Gesture::Drawing
            } else {
                Gesture::Idle
            }
        }
        Tool::Select => handle.update(|state| {
            if let Some(image) = state.canvas.selected() {
                let bounds = Bounds::of(image);
                if hit_resize_handle(bounds, point) {
                    return Gesture::Resizing {
                        id: image.id.clone(),
                        origin: bounds,
                    };
                }
            }
            match actions::select_image_at(&mut state.canvas, point) {
                Some(id) => match state.canvas.selected().map(Bounds::of) {
                    Some(origin) => Gesture::Moving {
                        id,
                        start: point,
                        origin,
                    },
                    None => Gesture::Idle,
                },
                None => Gesture::Idle,
            }
        }),
    };
    if !matches!(next, Gesture::Idle) {
        let _ = ui.canvas.set_pointer_capture(event.pointer_id());
    }
    *gesture.borrow_mut() = next;
}

fn on_pointer_move(ui: &Ui, handle: &CanvasHandle, gesture: &RefCell<Gesture>, event: &PointerEvent) {
    let Some(point) = event_to_point(&ui.canvas, event) else {
        return;
    };
    match &*gesture.borrow() {
        Gesture::Idle => {}
        Gesture::Drawing => {
            let painted = handle.update_quiet(|state| {
                let segment = actions::extend_stroke(&mut state.canvas, point)?;
                let stroke = state.canvas.strokes.last()?;
                Some((segment, stroke.color.clone(), stroke.size))
            });
            if let Some(((from, to), color, size)) = painted {
                draw_segment(&ui.ctx, from, to, &color, size);
            }
        }
        Gesture::Moving { id, start, origin } => {
            let dx = (point.x - start.x) as f64;
            let dy = (point.y - start.y) as f64;
            let bounds = translate(*origin, dx, dy);
            handle.update(|state| actions::preview_image_bounds(&mut state.canvas, id, bounds));
        }
        Gesture::Resizing { id, origin } => {
            let bounds = resize_to(*origin, point);
            handle.update(|state| actions::preview_image_bounds(&mut state.canvas, id, bounds));
        }
    }
}

fn on_pointer_up(handle: &CanvasHandle, gesture: &RefCell<Gesture>) {
    let finished = std::mem::replace(&mut *gesture.borrow_mut(), Gesture::Idle);
    match finished {
        Gesture::Idle => {}
        Gesture::Drawing => {
            handle.update(|state| actions::end_stroke(&mut state.canvas));
        }
        Gesture::Moving { id, origin, .. } | Gesture::Resizing { id, origin } => {
            handle.update(|state| {
                let bounds = state
                    .canvas
                    .images
                    .iter()
                    .find(|image| image.id == id)
                    .map(Bounds::of);
                if let Some(bounds) = bounds.filter(|bounds| *bounds != origin) {
                    actions::transform_image(&mut state.canvas, &id, bounds);
                }
            });
        }
    }
}

fn on_key_down(handle: &CanvasHandle, event: &KeyboardEvent) {
    let typing = event
        .target()
        .and_then(|target| target.dyn_into::<Element>().ok())
        .is_some_and(|element| matches!(element.tag_name().as_str(), "TEXTAREA" | "INPUT" | "SELECT"));
    if typing {
        return;
    }
    let modifier = event.ctrl_key() || event.meta_key();
    match event.key().as_str() {
        "z" | "Z" if modifier && event.shift_key() => {
            event.prevent_default();
            handle.redo();
        }
        "z" | "Z" if modifier => {
            event.prevent_default();
            handle.undo();
        }
        "y" if modifier => {
            event.prevent_default();
            handle.redo();
        }
        "Delete" | "Backspace" => {
            if handle.delete_selected() {
                event.prevent_default();
            }
        }
        _ => {}
    }
}

#[wasm_bindgen]
pub fn run() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    let _ = console_log::init_with_level(log::Level::Info);

    let window = web_sys::window().ok_or_else(|| JsValue::from_str("No window"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("No document"))?;
    let canvas: HtmlCanvasElement = get_element(&document, "canvas")?;
    let ctx: CanvasRenderingContext2d = canvas
        .get_context("2d")?
        .ok_or_else(|| JsValue::from_str("No 2d context"))?
        .dyn_into()?;

    let flavour = StorageFlavour::parse(
        document
            .body()
            .and_then(|body| body.get_attribute("data-storage"))
            .as_deref(),
    );
    let handle = CanvasHandle::new(AppState::new(Persistence::open(flavour)));

    let on_image_load = {
        let handle = handle.clone();
        let callback = Closure::<dyn FnMut()>::new(move || handle.notify());
        let function: Function = callback.as_ref().unchecked_ref::<Function>().clone();
        callback.forget();
        function
    };

    let ui = Rc::new(Ui {
        status: get_element(&document, "status")?,
        brush_button: get_element(&document, "tool-brush")?,
        eraser_button: get_element(&document, "tool-eraser")?,
        select_button: get_element(&document, "tool-select")?,
        undo_button: get_element(&document, "undo")?,
        redo_button: get_element(&document, "redo")?,
        delete_button: get_element(&document, "delete")?,
        analyze_button: get_element(&document, "analyze")?,
        generate_button: get_element(&document, "generate")?,
        revert_button: get_element(&document, "revert")?,
        aspect_select: get_element(&document, "aspect")?,
        size_input: get_element(&document, "size")?,
        upload_input: get_element(&document, "upload")?,
        prompt_input: get_element(&document, "prompt")?,
        prompt_count: get_element(&document, "prompt-count")?,
        categories_el: get_element(&document, "categories")?,
        tags_el: get_element(&document, "tags")?,
        uploads_el: get_element(&document, "uploads")?,
        gallery_el: get_element(&document, "gallery")?,
        images: RefCell::new(ImageCache::default()),
        on_image_load,
        window: window.clone(),
        document: document.clone(),
        canvas,
        ctx,
    });

    {
        let ui = ui.clone();
        handle.subscribe(move |state| render_canvas(&ui, state));
    }

    let gesture = Rc::new(RefCell::new(Gesture::Idle));
    {
        let ui_cb = ui.clone();
        let handle = handle.clone();
        let gesture = gesture.clone();
        listen(&ui.canvas, "pointerdown", move |event: PointerEvent| {
            event.prevent_default();
            on_pointer_down(&ui_cb, &handle, &gesture, &event);
        })?;
    }
    {
        let ui_cb = ui.clone();
        let handle = handle.clone();
        let gesture = gesture.clone();
        listen(&ui.canvas, "pointermove", move |event: PointerEvent| {
            on_pointer_move(&ui_cb, &handle, &gesture, &event);
        })?;
    }
    for name in ["pointerup", "pointercancel"] {
        let handle = handle.clone();
        let gesture = gesture.clone();
        listen(&ui.canvas, name, move |_: PointerEvent| {
            on_pointer_up(&handle, &gesture);
        })?;
    }
    {
        let handle = handle.clone();
        listen(&window, "keydown", move |event: KeyboardEvent| {
            on_key_down(&handle, &event);
        })?;
    }

    for (button, tool) in [
        (&ui.brush_button, Tool::Brush),
        (&ui.eraser_button, Tool::Eraser),
        (&ui.select_button, Tool::Select),
    ] {
        let handle = handle.clone();
        listen(button, "click", move |_: Event| handle.set_tool(tool))?;
    }
    {
        let handle = handle.clone();
        listen(&ui.undo_button, "click", move |_: Event| {
            handle.undo();
        })?;
    }
    {
        let handle = handle.clone();
        listen(&ui.redo_button, "click", move |_: Event| {
            handle.redo();
        })?;
    }
    {
        let handle = handle.clone();
        let clear_button: HtmlButtonElement = get_element(&document, "clear")?;
        listen(&clear_button, "click", move |_: Event| handle.clear())?;
    }
    {
        let ui_cb = ui.clone();
        let handle = handle.clone();
        listen(&ui.delete_button, "click", move |_: Event| {
            if handle.delete_selected() {
                refresh_panels(&ui_cb, &handle);
            }
        })?;
    }
    {
        let ui_cb = ui.clone();
        let handle = handle.clone();
        listen(&ui.aspect_select, "change", move |_: Event| {
            match AspectRatio::parse(&ui_cb.aspect_select.value()) {
                Some(ratio) => handle.set_aspect_ratio(ratio),
                None => log::warn!("unknown aspect ratio {}", ui_cb.aspect_select.value()),
            }
        })?;
    }
    {
        let handle = handle.clone();
        let color_input: HtmlInputElement = get_element(&document, "color")?;
        let color_cb = color_input.clone();
        listen(&color_input, "input", move |_: Event| {
            let color = color_cb.value();
            handle.update(|state| actions::set_color(&mut state.canvas, color));
        })?;
    }
    {
        let ui_cb = ui.clone();
        let handle = handle.clone();
        listen(&ui.size_input, "change", move |_: Event| {
            let size = ui_cb.size_input.value().parse::<f32>().unwrap_or(f32::NAN);
            handle.update(|state| match state.canvas.tool {
                Tool::Eraser => actions::set_eraser_size(&mut state.canvas, size),
                _ => actions::set_brush_size(&mut state.canvas, size),
            });
        })?;
    }
    {
        let ui_cb = ui.clone();
        let handle = handle.clone();
        listen(&ui.upload_input, "change", move |_: Event| {
            let upload_cb = &ui_cb.upload_input;
            let Some(files) = upload_cb.files() else {
                return;
            };
            for index in 0..files.length() {
                let Some(file) = files.get(index) else {
                    continue;
                };
                if let Err(error) = read_upload(ui_cb.clone(), handle.clone(), file) {
                    log::error!("failed to read upload: {error:?}");
                }
            }
            upload_cb.set_value("");
        })?;
    }
    {
        let ui_cb = ui.clone();
        let handle = handle.clone();
        listen(&ui.uploads_el, "click", move |event: Event| {
            if let Some((_, id)) = closest_with_attribute(&event, "data-upload-id") {
                handle.update(|state| state.remove_upload(&id));
            } else if let Some((_, id)) = closest_with_attribute(&event, "data-select-upload") {
                handle.update(|state| state.select_upload(&id));
            } else {
                return;
            }
            refresh_panels(&ui_cb, &handle);
        })?;
    }
    {
        let ui_cb = ui.clone();
        let handle = handle.clone();
        listen(&ui.analyze_button, "click", move |_: Event| {
            start_analysis(ui_cb.clone(), handle.clone());
        })?;
    }
    {
        let ui_cb = ui.clone();
        let handle = handle.clone();
        listen(&ui.categories_el, "click", move |event: Event| {
            let Some((_, name)) = closest_with_attribute(&event, "data-category") else {
                return;
            };
            handle.update(|state| state.set_category(CategoryFilter::parse(&name)));
            refresh_panels(&ui_cb, &handle);
        })?;
    }
    {
        let ui_cb = ui.clone();
        let handle = handle.clone();
        listen(&ui.tags_el, "click", move |event: Event| {
            let Some(id) = closest_with_attribute(&event, "data-tag-id")
                .and_then(|(_, id)| id.parse::<u32>().ok())
            else {
                return;
            };
            let prompt = handle.update(|state| {
                state
                    .select_tag(id)
                    .is_some()
                    .then(|| state.prompt.current.clone())
            });
            if let Some(prompt) = prompt {
                ui_cb.prompt_input.set_value(&prompt);
            }
            refresh_panels(&ui_cb, &handle);
        })?;
    }
    {
        let ui_cb = ui.clone();
        let handle = handle.clone();
        listen(&ui.prompt_input, "input", move |_: Event| {
            let text = ui_cb.prompt_input.value();
            let stored = handle.update_quiet(|state| {
                state.prompt.set_current(&text);
                state.prompt.current.clone()
            });
            if stored != text {
                ui_cb.prompt_input.set_value(&stored);
            }
            handle.read(|state| render_prompt(&ui_cb, state));
        })?;
    }
    {
        let styles_el: Element = get_element(&document, "styles")?;
        for style in PromptStyle::ALL {
            let chip = create_child(&document, &styles_el, "button", "style")?;
            chip.set_attribute("type", "button")?;
            chip.set_attribute("data-style", style.as_str())?;
            chip.set_text_content(Some(style.label()));
        }
        let ui_cb = ui.clone();
        let handle = handle.clone();
        listen(&styles_el, "click", move |event: Event| {
            let Some(style) = closest_with_attribute(&event, "data-style")
                .and_then(|(_, value)| PromptStyle::parse(&value))
            else {
                return;
            };
            let prompt = handle.update_quiet(|state| {
                state.prompt.append_style(style);
                state.prompt.current.clone()
            });
            ui_cb.prompt_input.set_value(&prompt);
            handle.read(|state| render_prompt(&ui_cb, state));
        })?;
    }
    {
        let ui_cb = ui.clone();
        let handle = handle.clone();
        listen(&ui.revert_button, "click", move |_: Event| {
            let reverted = handle.update_quiet(|state| {
                state.prompt.revert().then(|| state.prompt.current.clone())
            });
            if let Some(prompt) = reverted {
                ui_cb.prompt_input.set_value(&prompt);
            }
            handle.read(|state| render_prompt(&ui_cb, state));
        })?;
    }
    {
        let ui_cb = ui.clone();
        let handle = handle.clone();
        listen(&ui.generate_button, "click", move |_: Event| {
            start_generation(ui_cb.clone(), handle.clone());
        })?;
    }
    {
        let ui_cb = ui.clone();
        let handle = handle.clone();
        listen(&ui.gallery_el, "click", move |event: Event| {
            let Some((element, action)) = closest_with_attribute(&event, "data-action") else {
                return;
            };
            let Some(id) = element.get_attribute("data-record-id") else {
                return;
            };
            match action.as_str() {
                "download" => {
                    let target = handle.read(|state| {
                        state
                            .gallery
                            .iter()
                            .find(|record| record.id == id)
                            .map(|record| (record.url.clone(), download_name(record.timestamp)))
                    });
                    if let Some((url, file_name)) = target {
                        if let Err(error) = download_url(&ui_cb.document, &url, &file_name) {
                            log::warn!("download failed: {error:?}");
                        }
                    }
                    return;
                }
                "delete" => {
                    handle.update(|state| state.delete_record(&id));
                }
                "place" => {
                    handle.update(|state| {
                        let Some(url) = state
                            .gallery
                            .iter()
                            .find(|record| record.id == id)
                            .map(|record| record.url.clone())
                        else {
                            return;
                        };
                        let dimensions = state.canvas.dimensions();
                        actions::place_image(
                            &mut state.canvas,
                            make_id(),
                            url,
                            Bounds {
                                x: 0.0,
                                y: 0.0,
                                width: dimensions.width as f64,
                                height: dimensions.height as f64,
                            },
                        );
                    });
                }
                _ => return,
            }
            refresh_panels(&ui_cb, &handle);
        })?;
    }
    {
        let ui_cb = ui.clone();
        let handle = handle.clone();
        let clear_gallery: HtmlButtonElement = get_element(&document, "clear-gallery")?;
        listen(&clear_gallery, "click", move |_: Event| {
            handle.update(|state| state.clear_gallery());
            refresh_panels(&ui_cb, &handle);
        })?;
    }
    {
        let ui_cb = ui.clone();
        let handle = handle.clone();
        let reset_button: HtmlButtonElement = get_element(&document, "reset")?;
        listen(&reset_button, "click", move |_: Event| {
            handle.update(|state| state.reset());
            ui_cb.prompt_input.set_value("");
            refresh_panels(&ui_cb, &handle);
        })?;
    }

    handle.notify();
    refresh_panels(&ui, &handle);
    set_status(&ui.status, "idle", "Ready");
    log::info!("editor ready");
    Ok(())
}
