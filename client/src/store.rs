use banana_shared::Tag;

pub const MAX_UPLOADS: usize = 5;
pub const MAX_SESSION_HISTORY: usize = 20;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("at most {0} images can be uploaded")]
    LimitReached(usize),
    #[error("{0} is not an image")]
    NotAnImage(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct UploadedImage {
    pub id: String,
    pub file_name: String,
    pub mime_type: String,
    pub preview: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HistoryItem {
    pub id: String,
    pub timestamp: i64,
    pub original_image: Option<String>,
    pub generated_image: String,
    pub prompt: String,
    pub tag: Option<Tag>,
}

/// Uploads, the latest generated image, and this session's generations.
#[derive(Debug, Default)]
pub struct ImageStore {
    uploads: Vec<UploadedImage>,
    selected_id: Option<String>,
    generated: Option<String>,
    history: Vec<HistoryItem>,
}

impl ImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_upload(&mut self, image: UploadedImage) -> Result<&UploadedImage, UploadError> {
        if self.uploads.len() >= MAX_UPLOADS {
            return Err(UploadError::LimitReached(MAX_UPLOADS));
        }
        if !image.mime_type.starts_with("image/") {
            return Err(UploadError::NotAnImage(image.file_name));
        }
        self.selected_id = Some(image.id.clone());
        self.uploads.push(image);
        Ok(&self.uploads[self.uploads.len() - 1])
    }

    pub fn remove_upload(&mut self, id: &str) -> Option<UploadedImage> {
        let index = self.uploads.iter().position(|image| image.id == id)?;
        let removed = self.uploads.remove(index);
        if self.selected_id.as_deref() == Some(id) {
            self.selected_id = self.uploads.first().map(|image| image.id.clone());
        }
        Some(removed)
    }

    pub fn select(&mut self, id: &str) -> bool {
        if !self.uploads.iter().any(|image| image.id == id) {
            return false;
        }
        self.selected_id = Some(id.to_string());
        true
    }

    pub fn clear_all(&mut self) {
        self.uploads.clear();
        self.selected_id = None;
    }

    pub fn uploads(&self) -> &[UploadedImage] {
        &self.uploads
    }

    pub fn upload_ids(&self) -> Vec<String> {
        self.uploads.iter().map(|image| image.id.clone()).collect()
    }

    pub fn is_full(&self) -> bool {
        self.uploads.len() >= MAX_UPLOADS
    }

    pub fn selected(&self) -> Option<&UploadedImage> {
        let id = self.selected_id.as_deref()?;
        self.uploads.iter().find(|image| image.id == id)
    }

    pub fn set_generated(&mut self, url: Option<String>) {
        self.generated = url;
    }

    pub fn generated(&self) -> Option<&str> {
        self.generated.as_deref()
    }

    pub fn push_history(&mut self, item: HistoryItem) {
        self.history.insert(0, item);
        self.history.truncate(MAX_SESSION_HISTORY);
    }

    pub fn history(&self) -> &[HistoryItem] {
        &self.history
    }
}
