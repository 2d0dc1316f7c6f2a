use banana_shared::{
    GenerateRequest, GenerateResponse, ImageMetadata, ImageRecord, Tag, TagCategory,
};

use crate::actions;
use crate::geometry::Bounds;
use crate::persistence::{ImageStorage, MAX_RECORDS};
use crate::prompt::{ComposeError, ComposeInput, PromptComposer, PromptDraft};
use crate::state::CanvasState;
use crate::store::{HistoryItem, ImageStore, UploadError, UploadedImage};
use crate::util::{make_id, now_millis};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(TagCategory),
}

impl CategoryFilter {
    pub fn parse(value: &str) -> Self {
        TagCategory::parse(value).map_or(CategoryFilter::All, CategoryFilter::Only)
    }

    pub fn admits(self, tag: &Tag) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(category) => tag.category == category,
        }
    }
}

/// Identifies one `/generate` round trip.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GenerationTicket(u64);

#[derive(Debug, thiserror::Error)]
pub enum GenerationBlocked {
    #[error("a generation is already running")]
    InProgress,
    #[error(transparent)]
    Compose(#[from] ComposeError),
}

/// Everything the editor page mutates. Owned by a `CanvasHandle`.
pub struct AppState {
    pub canvas: CanvasState,
    pub images: ImageStore,
    pub tags: Vec<Tag>,
    pub selected_tag: Option<Tag>,
    pub category: CategoryFilter,
    pub prompt: PromptDraft,
    pub is_generating: bool,
    pub gallery: Vec<ImageRecord>,
    /// Request whose result may still land on the canvas. Cleared by `reset`
    /// so a late reply is dropped, while `is_generating` keeps blocking new
    /// requests until that reply arrives.
    current_generation: Option<GenerationTicket>,
    next_generation: u64,
    composer: PromptComposer,
    storage: Box<dyn ImageStorage>,
}

impl AppState {
    pub fn new(storage: Box<dyn ImageStorage>) -> Self {
        let gallery = storage.get_images(None).unwrap_or_else(|error| {
            log::error!("failed to load saved images: {error}");
            Vec::new()
        });
        let mut canvas = CanvasState::default();
        actions::record_snapshot(&mut canvas);
        Self {
            canvas,
            images: ImageStore::new(),
            tags: Vec::new(),
            selected_tag: None,
            category: CategoryFilter::All,
            prompt: PromptDraft::default(),
            is_generating: false,
            gallery,
            current_generation: None,
            next_generation: 0,
            composer: PromptComposer::new(),
            storage,
        }
    }

    /// Stores the upload and lays it out on the canvas.
    pub fn add_upload(
        &mut self,
        file_name: String,
        mime_type: String,
        preview: String,
        natural_width: f64,
        natural_height: f64,
    ) -> Result<String, UploadError> {
        let id = make_id();
        let index = self.images.uploads().len();
        self.images.add_upload(UploadedImage {
            id: id.clone(),
            file_name,
            mime_type,
            preview: preview.clone(),
        })?;
        actions::place_upload(
            &mut self.canvas,
            id.clone(),
            preview,
            natural_width,
            natural_height,
            index,
        );
        Ok(id)
    }

    pub fn remove_upload(&mut self, id: &str) -> bool {
        if self.images.remove_upload(id).is_none() {
            return false;
        }
        if self.canvas.images.iter().any(|image| image.id == id) {
            actions::delete_image(&mut self.canvas, id);
        }
        true
    }

    /// Marks an upload as the selected one, on the strip and on the canvas.
    pub fn select_upload(&mut self, id: &str) -> bool {
        if !self.images.select(id) {
            return false;
        }
        if self.canvas.images.iter().any(|image| image.id == id) {
            self.canvas.selected_image = Some(id.to_string());
        }
        true
    }

    /// Whether the upload's placement is still on the canvas; undo can take it off.
    pub fn upload_is_placed(&self, id: &str) -> bool {
        self.canvas.images.iter().any(|image| image.id == id)
    }

    /// Previews of the uploads still placed on the canvas.
    pub fn placed_upload_previews(&self) -> Vec<String> {
        self.images
            .uploads()
            .iter()
            .filter(|upload| self.upload_is_placed(&upload.id))
            .map(|upload| upload.preview.clone())
            .collect()
    }

    /// Images sent for tag analysis: uploads, or the canvas when nothing was uploaded.
    pub fn analysis_images(&self, canvas_capture: Option<String>) -> Vec<String> {
        let previews = self.placed_upload_previews();
        if previews.is_empty() {
            canvas_capture.into_iter().collect()
        } else {
            previews
        }
    }

    pub fn set_tags(&mut self, tags: Vec<Tag>) {
        self.tags = tags;
        self.selected_tag = None;
    }

    pub fn select_tag(&mut self, id: u32) -> Option<&Tag> {
        let tag = self.tags.iter().find(|tag| tag.id == id)?.clone();
        self.prompt.fill_from_tag(&tag);
        self.selected_tag = Some(tag);
        self.selected_tag.as_ref()
    }

    pub fn set_category(&mut self, category: CategoryFilter) {
        self.category = category;
    }

    pub fn filtered_tags(&self) -> Vec<&Tag> {
        self.tags
            .iter()
            .filter(|tag| self.category.admits(tag))
            .collect()
    }

    /// `canvas_capture` is the rendered canvas without the uploaded images,
    /// which travel as their own references.
    pub fn begin_generation(
        &mut self,
        canvas_capture: Option<&str>,
    ) -> Result<(GenerationTicket, GenerateRequest), GenerationBlocked> {
        if self.is_generating {
            return Err(GenerationBlocked::InProgress);
        }
        let uploads = self.placed_upload_previews();
        let composed = self.composer.compose(ComposeInput {
            user_text: &self.prompt.current,
            canvas_snapshot: canvas_capture,
            uploads: &uploads,
            aspect_ratio: self.canvas.aspect_ratio,
            dimensions: self.canvas.dimensions(),
        })?;
        log::info!(
            "generating with {} reference image(s), template {:?}",
            composed.reference_images.len(),
            composed.template
        );
        let ticket = GenerationTicket(self.next_generation);
        self.next_generation += 1;
        self.is_generating = true;
        self.current_generation = Some(ticket);
        Ok((ticket, composed.into_request()))
    }

    /// Lands the result of `ticket`. Replies to a request made before the last
    /// `reset` only release the guard and return `None`.
    pub fn finish_generation(
        &mut self,
        ticket: GenerationTicket,
        response: &GenerateResponse,
    ) -> Option<ImageRecord> {
        self.is_generating = false;
        if self.current_generation.take() != Some(ticket) {
            log::info!("dropping result of a generation made before reset");
            return None;
        }
        let id = make_id();
        let timestamp = now_millis();
        let dimensions = self.canvas.dimensions();

        self.images.set_generated(Some(response.image_url.clone()));
        self.images.push_history(HistoryItem {
            id: id.clone(),
            timestamp,
            original_image: self.images.selected().map(|image| image.preview.clone()),
            generated_image: response.image_url.clone(),
            prompt: self.prompt.current.clone(),
            tag: self.selected_tag.clone(),
        });
        actions::place_image(
            &mut self.canvas,
            id.clone(),
            response.image_url.clone(),
            Bounds {
                x: 0.0,
                y: 0.0,
                width: dimensions.width as f64,
                height: dimensions.height as f64,
            },
        );

        let record = ImageRecord {
            id,
            url: response.image_url.clone(),
            prompt: self.prompt.current.clone(),
            timestamp,
            user_id: None,
            metadata: Some(ImageMetadata {
                width: Some(dimensions.width),
                height: Some(dimensions.height),
                aspect_ratio: Some(self.canvas.aspect_ratio),
                model: response.model.clone(),
            }),
        };
        if let Err(error) = self.storage.save_image(record.clone()) {
            log::error!("failed to save generated image: {error}");
        }
        self.gallery.insert(0, record.clone());
        self.gallery.truncate(MAX_RECORDS);
        Some(record)
    }

    pub fn fail_generation(&mut self, ticket: GenerationTicket, message: &str) {
        self.is_generating = false;
        if self.current_generation == Some(ticket) {
            self.current_generation = None;
        }
        log::warn!("generation failed: {message}");
    }

    pub fn delete_record(&mut self, id: &str) -> bool {
        let Some(index) = self.gallery.iter().position(|record| record.id == id) else {
            return false;
        };
        self.gallery.remove(index);
        if let Err(error) = self.storage.delete_image(id) {
            log::error!("failed to delete saved image {id}: {error}");
        }
        true
    }

    pub fn clear_gallery(&mut self) {
        self.gallery.clear();
        if let Err(error) = self.storage.clear_all() {
            log::error!("failed to clear saved images: {error}");
        }
    }

    /// Back to a blank editor; the gallery and session generations stay.
    /// A pending generation keeps `is_generating` set until its reply arrives.
    pub fn reset(&mut self) {
        let history = std::mem::take(&mut self.images);
        self.images = ImageStore::new();
        for item in history.history().iter().rev() {
            self.images.push_history(item.clone());
        }
        self.tags.clear();
        self.selected_tag = None;
        self.category = CategoryFilter::All;
        self.prompt = PromptDraft::default();
        self.current_generation = None;
        self.canvas = CanvasState::default();
        actions::record_snapshot(&mut self.canvas);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{MemoryBackend, RecordStorage};
    use crate::prompt::PromptSource;
    use banana_shared::{GenerationMode, ReferenceKind};

    fn state() -> AppState {
        AppState::new(Box::new(RecordStorage::new(MemoryBackend::new())))
    }

    fn tag(id: u32, category: TagCategory) -> Tag {
        Tag {
            id,
            category,
            label: format!("tag {id}"),
            emoji: "✨".into(),
            description: "d".into(),
            prompt: format!("prompt {id}"),
            keywords: vec![],
        }
    }

    fn response(url: &str) -> GenerateResponse {
        GenerateResponse {
            success: true,
            image_url: url.into(),
            prompt: "p".into(),
            timestamp: "2026-01-01T00:00:00.000Z".into(),
            mode: GenerationMode::Generate,
            text: None,
            model: Some("painter".into()),
        }
    }

    #[test]
    fn starts_with_a_baseline_snapshot() {
        let state = state();
        assert_eq!(state.canvas.history.len(), 1);
        assert!(!state.canvas.can_undo());
    }

    #[test]
    fn uploads_are_placed_and_removed_together() {
        let mut state = state();
        let id = state
            .add_upload("a.png".into(), "image/png".into(), "data:a".into(), 400.0, 200.0)
            .unwrap();
        assert_eq!(state.canvas.images.len(), 1);
        assert_eq!(state.canvas.images[0].id, id);
        assert!(state.canvas.can_undo());
        assert!(state.remove_upload(&id));
        assert!(state.canvas.images.is_empty());
        assert!(state.images.uploads().is_empty());
    }

    #[test]
    fn selecting_a_tag_fills_the_prompt() {
        let mut state = state();
        state.set_tags(vec![tag(1, TagCategory::Art), tag(2, TagCategory::Fun)]);
        assert!(state.select_tag(2).is_some());
        assert_eq!(state.prompt.current, "prompt 2");
        assert_eq!(state.prompt.source, PromptSource::Ai);
        assert!(state.select_tag(9).is_none());

        state.set_category(CategoryFilter::parse("art"));
        let visible: Vec<_> = state.filtered_tags().iter().map(|tag| tag.id).collect();
        assert_eq!(visible, vec![1]);
        state.set_category(CategoryFilter::parse("all"));
        assert_eq!(state.filtered_tags().len(), 2);
    }

    #[test]
    fn generation_guard_blocks_overlap_and_empty_prompts() {
        let mut state = state();
        assert!(matches!(
            state.begin_generation(None),
            Err(GenerationBlocked::Compose(ComposeError::EmptyPrompt))
        ));
        assert!(!state.is_generating);

        state.prompt.set_current("a banana boat");
        let (ticket, request) = state.begin_generation(None).unwrap();
        assert_eq!(request.reference_images.len(), 1);
        assert_eq!(request.reference_images[0].kind, ReferenceKind::AspectRatio);
        assert!(state.is_generating);
        assert!(matches!(
            state.begin_generation(None),
            Err(GenerationBlocked::InProgress)
        ));

        state.fail_generation(ticket, "boom");
        assert!(!state.is_generating);
        assert!(state.begin_generation(None).is_ok());
    }

    #[test]
    fn finished_generation_lands_everywhere() {
        let mut state = state();
        state.prompt.set_current("a banana boat");
        let (ticket, _) = state.begin_generation(None).unwrap();
        let record = state
            .finish_generation(ticket, &response("data:image/png;base64,OUT"))
            .unwrap();

        assert!(!state.is_generating);
        assert_eq!(state.images.generated(), Some("data:image/png;base64,OUT"));
        assert_eq!(state.images.history().len(), 1);
        assert_eq!(state.gallery[0].id, record.id);
        let placed = state.canvas.images.last().unwrap();
        assert_eq!((placed.width, placed.height), (864.0, 1184.0));
        let metadata = record.metadata.unwrap();
        assert_eq!(metadata.width, Some(864));
        assert_eq!(metadata.model.as_deref(), Some("painter"));
        assert_eq!(state.storage.get_images(None).unwrap().len(), 1);
    }

    #[test]
    fn gallery_survives_reset_and_reload() {
        let mut state = state();
        state.prompt.set_current("x");
        let (ticket, _) = state.begin_generation(None).unwrap();
        let record = state.finish_generation(ticket, &response("data:one")).unwrap();
        state.add_upload("a.png".into(), "image/png".into(), "data:a".into(), 1.0, 1.0).unwrap();
        state.reset();

        assert!(state.canvas.scene().is_empty());
        assert!(state.images.uploads().is_empty());
        assert!(state.prompt.is_blank());
        assert_eq!(state.gallery.len(), 1);
        assert_eq!(state.images.history().len(), 1);

        assert!(state.delete_record(&record.id));
        assert!(state.gallery.is_empty());
        assert!(state.storage.get_images(None).unwrap().is_empty());
    }

    #[test]
    fn reset_keeps_a_pending_generation_exclusive() {
        let mut state = state();
        state.prompt.set_current("a banana boat");
        let (stale, _) = state.begin_generation(None).unwrap();
        state.reset();

        state.prompt.set_current("a new idea");
        assert!(state.is_generating);
        assert!(matches!(
            state.begin_generation(None),
            Err(GenerationBlocked::InProgress)
        ));

        assert!(state.finish_generation(stale, &response("data:late")).is_none());
        assert!(!state.is_generating);
        assert!(state.canvas.scene().is_empty());
        assert!(state.gallery.is_empty());
        assert!(state.images.history().is_empty());
        assert!(state.storage.get_images(None).unwrap().is_empty());

        let (fresh, _) = state.begin_generation(None).unwrap();
        assert_ne!(fresh, stale);
        assert!(state.finish_generation(fresh, &response("data:new")).is_some());
        assert_eq!(state.gallery.len(), 1);
    }

    #[test]
    fn undone_uploads_stop_being_references() {
        let mut state = state();
        state.prompt.set_current("make it golden");
        let id = state
            .add_upload("a.png".into(), "image/png".into(), "data:a".into(), 10.0, 10.0)
            .unwrap();
        assert_eq!(state.placed_upload_previews(), vec!["data:a"]);

        assert!(actions::undo(&mut state.canvas));
        assert!(!state.upload_is_placed(&id));
        assert_eq!(state.images.uploads().len(), 1);
        let (ticket, request) = state.begin_generation(None).unwrap();
        assert_eq!(request.reference_images.len(), 1);
        assert_eq!(request.reference_images[0].kind, ReferenceKind::AspectRatio);
        state.fail_generation(ticket, "cancelled");

        assert!(actions::redo(&mut state.canvas));
        let (_, request) = state.begin_generation(None).unwrap();
        assert_eq!(request.reference_images.len(), 2);
        assert_eq!(request.reference_images[0].kind, ReferenceKind::Upload);
    }

    #[test]
    fn selecting_an_upload_selects_its_placement() {
        let mut state = state();
        let first = state
            .add_upload("a.png".into(), "image/png".into(), "data:a".into(), 10.0, 10.0)
            .unwrap();
        state
            .add_upload("b.png".into(), "image/png".into(), "data:b".into(), 10.0, 10.0)
            .unwrap();
        assert!(state.select_upload(&first));
        assert_eq!(state.images.selected().unwrap().id, first);
        assert_eq!(state.canvas.selected_image.as_deref(), Some(first.as_str()));
        assert!(!state.select_upload("missing"));
    }

    #[test]
    fn analysis_prefers_uploads_over_canvas() {
        let mut state = state();
        assert_eq!(state.analysis_images(Some("data:canvas".into())), vec!["data:canvas"]);
        state.add_upload("a.png".into(), "image/png".into(), "data:a".into(), 1.0, 1.0).unwrap();
        assert_eq!(state.analysis_images(Some("data:canvas".into())), vec!["data:a"]);
    }
}
