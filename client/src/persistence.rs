use std::collections::BTreeMap;

use banana_shared::ImageRecord;
use wasm_bindgen::{JsCast, JsValue};

pub const IMAGES_KEY: &str = "peel-a-banana-images";
pub const RECORD_PREFIX: &str = "PeelABananaDB/images/";
pub const MAX_RECORDS: usize = 50;
pub const MAX_WRITE_ATTEMPTS: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage quota exceeded")]
    QuotaExceeded,
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("failed to encode records: {0}")]
    Encode(#[from] serde_json::Error),
}

pub trait KeyValueBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&mut self, key: &str) -> Result<(), StorageError>;
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

/// Size an entry occupies in a UTF-16 browser store.
fn entry_size(key: &str, value: &str) -> usize {
    (key.len() + value.len()) * 2
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: BTreeMap<String, String>,
    quota: Option<usize>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            quota: Some(quota),
        }
    }

    fn used(&self) -> usize {
        self.entries
            .iter()
            .map(|(key, value)| entry_size(key, value))
            .sum()
    }
}

impl KeyValueBackend for MemoryBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        if let Some(quota) = self.quota {
            let replaced = self
                .entries
                .get(key)
                .map_or(0, |old| entry_size(key, old));
            if self.used() - replaced + entry_size(key, value) > quota {
                return Err(StorageError::QuotaExceeded);
            }
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.entries.keys().cloned().collect())
    }
}

/// `window.localStorage`.
pub struct BrowserStorage {
    storage: web_sys::Storage,
}

impl BrowserStorage {
    pub fn from_window() -> Result<Self, StorageError> {
        let window = web_sys::window()
            .ok_or_else(|| StorageError::Unavailable("no window".to_string()))?;
        let storage = window
            .local_storage()
            .map_err(storage_error)?
            .ok_or_else(|| StorageError::Unavailable("localStorage disabled".to_string()))?;
        Ok(Self { storage })
    }
}

fn is_quota_error(error: &JsValue) -> bool {
    error
        .dyn_ref::<web_sys::DomException>()
        .is_some_and(|exception| {
            matches!(exception.code(), 22 | 1014)
                || matches!(
                    exception.name().as_str(),
                    "QuotaExceededError" | "NS_ERROR_DOM_QUOTA_REACHED"
                )
        })
}

fn storage_error(error: JsValue) -> StorageError {
    if is_quota_error(&error) {
        return StorageError::QuotaExceeded;
    }
    StorageError::Unavailable(error.as_string().unwrap_or_else(|| format!("{error:?}")))
}

impl KeyValueBackend for BrowserStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.storage.get_item(key).map_err(storage_error)
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.storage.set_item(key, value).map_err(storage_error)
    }

    fn remove_item(&mut self, key: &str) -> Result<(), StorageError> {
        self.storage.remove_item(key).map_err(storage_error)
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let length = self.storage.length().map_err(storage_error)?;
        let mut keys = Vec::with_capacity(length as usize);
        for index in 0..length {
            if let Some(key) = self.storage.key(index).map_err(storage_error)? {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}

fn is_image_key(key: &str) -> bool {
    key == IMAGES_KEY || key.starts_with(RECORD_PREFIX)
}

fn evict_largest<B: KeyValueBackend>(backend: &mut B) -> Result<bool, StorageError> {
    let mut largest: Option<(String, usize)> = None;
    for key in backend.keys()? {
        if is_image_key(&key) {
            continue;
        }
        let size = backend
            .get_item(&key)?
            .map_or(0, |value| entry_size(&key, &value));
        if largest.as_ref().map_or(true, |(_, best)| size > *best) {
            largest = Some((key, size));
        }
    }
    match largest {
        Some((key, size)) => {
            log::warn!("storage full, evicting {key} ({size} bytes)");
            backend.remove_item(&key)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Writes `value`, evicting the largest unrelated entry on quota errors.
pub fn set_with_fallback<B: KeyValueBackend>(
    backend: &mut B,
    key: &str,
    value: &str,
) -> Result<(), StorageError> {
    for attempt in 1..=MAX_WRITE_ATTEMPTS {
        match backend.set_item(key, value) {
            Ok(()) => return Ok(()),
            Err(StorageError::QuotaExceeded) => {
                log::warn!("quota exceeded writing {key} (attempt {attempt}/{MAX_WRITE_ATTEMPTS})");
                if attempt == MAX_WRITE_ATTEMPTS || !evict_largest(backend)? {
                    break;
                }
            }
            Err(error) => return Err(error),
        }
    }
    Err(StorageError::QuotaExceeded)
}

pub trait ImageStorage {
    fn save_image(&mut self, record: ImageRecord) -> Result<(), StorageError>;
    fn save_all(&mut self, records: Vec<ImageRecord>) -> Result<(), StorageError>;
    /// Newest first.
    fn get_images(&self, user_id: Option<&str>) -> Result<Vec<ImageRecord>, StorageError>;
    fn delete_image(&mut self, id: &str) -> Result<(), StorageError>;
    fn clear_all(&mut self) -> Result<(), StorageError>;
}

fn keep_last(mut records: Vec<ImageRecord>) -> Vec<ImageRecord> {
    if records.len() > MAX_RECORDS {
        records.drain(..records.len() - MAX_RECORDS);
    }
    records
}

fn newest_first(records: &mut [ImageRecord]) {
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

fn matches_user(record: &ImageRecord, user_id: Option<&str>) -> bool {
    user_id.map_or(true, |user| record.user_id.as_deref() == Some(user))
}

/// All records as one JSON array under `IMAGES_KEY`, oldest first.
pub struct ListStorage<B> {
    backend: B,
}

impl<B: KeyValueBackend> ListStorage<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    fn read_all(&self) -> Result<Vec<ImageRecord>, StorageError> {
        let Some(text) = self.backend.get_item(IMAGES_KEY)? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&text) {
            Ok(records) => Ok(records),
            Err(error) => {
                log::warn!("discarding unreadable image list: {error}");
                Ok(Vec::new())
            }
        }
    }

    fn write_all(&mut self, records: Vec<ImageRecord>) -> Result<(), StorageError> {
        let payload = serde_json::to_string(&keep_last(records))?;
        set_with_fallback(&mut self.backend, IMAGES_KEY, &payload)
    }
}

impl<B: KeyValueBackend> ImageStorage for ListStorage<B> {
    fn save_image(&mut self, record: ImageRecord) -> Result<(), StorageError> {
        let mut records = self.read_all()?;
        match records.iter_mut().find(|existing| existing.id == record.id) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
        self.write_all(records)
    }

    fn save_all(&mut self, records: Vec<ImageRecord>) -> Result<(), StorageError> {
        self.write_all(records)
    }

    fn get_images(&self, user_id: Option<&str>) -> Result<Vec<ImageRecord>, StorageError> {
        let mut records: Vec<_> = self
            .read_all()?
            .into_iter()
            .filter(|record| matches_user(record, user_id))
            .collect();
        newest_first(&mut records);
        Ok(records)
    }

    fn delete_image(&mut self, id: &str) -> Result<(), StorageError> {
        let mut records = self.read_all()?;
        records.retain(|record| record.id != id);
        self.write_all(records)
    }

    fn clear_all(&mut self) -> Result<(), StorageError> {
        self.backend.remove_item(IMAGES_KEY)
    }
}

/// One JSON entry per record under `RECORD_PREFIX<id>`.
pub struct RecordStorage<B> {
    backend: B,
}

impl<B: KeyValueBackend> RecordStorage<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    fn record_keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self
            .backend
            .keys()?
            .into_iter()
            .filter(|key| key.starts_with(RECORD_PREFIX))
            .collect())
    }

    fn read_records(&self) -> Result<Vec<ImageRecord>, StorageError> {
        let mut records = Vec::new();
        for key in self.record_keys()? {
            let Some(text) = self.backend.get_item(&key)? else {
                continue;
            };
            match serde_json::from_str::<ImageRecord>(&text) {
                Ok(record) => records.push(record),
                Err(error) => log::warn!("skipping unreadable record {key}: {error}"),
            }
        }
        newest_first(&mut records);
        Ok(records)
    }

    fn write_record(&mut self, record: &ImageRecord) -> Result<(), StorageError> {
        let payload = serde_json::to_string(record)?;
        set_with_fallback(&mut self.backend, &format!("{RECORD_PREFIX}{}", record.id), &payload)
    }

    fn evict_overflow(&mut self) -> Result<(), StorageError> {
        let records = self.read_records()?;
        for stale in records.iter().skip(MAX_RECORDS) {
            self.backend.remove_item(&format!("{RECORD_PREFIX}{}", stale.id))?;
        }
        Ok(())
    }
}

impl<B: KeyValueBackend> ImageStorage for RecordStorage<B> {
    fn save_image(&mut self, record: ImageRecord) -> Result<(), StorageError> {
        self.write_record(&record)?;
        self.evict_overflow()
    }

    fn save_all(&mut self, records: Vec<ImageRecord>) -> Result<(), StorageError> {
        self.clear_all()?;
        for record in keep_last(records) {
            self.write_record(&record)?;
        }
        Ok(())
    }

    fn get_images(&self, user_id: Option<&str>) -> Result<Vec<ImageRecord>, StorageError> {
        Ok(self
            .read_records()?
            .into_iter()
            .filter(|record| matches_user(record, user_id))
            .collect())
    }

    fn delete_image(&mut self, id: &str) -> Result<(), StorageError> {
        self.backend.remove_item(&format!("{RECORD_PREFIX}{id}"))
    }

    fn clear_all(&mut self) -> Result<(), StorageError> {
        for key in self.record_keys()? {
            self.backend.remove_item(&key)?;
        }
        Ok(())
    }
}

/// Which `ImageStorage` layout the page asked for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StorageFlavour {
    List,
    #[default]
    Records,
}

impl StorageFlavour {
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("local") | Some("list") => StorageFlavour::List,
            _ => StorageFlavour::Records,
        }
    }
}

pub struct Persistence;

impl Persistence {
    pub fn open(flavour: StorageFlavour) -> Box<dyn ImageStorage> {
        match flavour {
            StorageFlavour::List => Self::local(),
            StorageFlavour::Records => Self::structured(),
        }
    }

    /// Whole list under one key in `localStorage`.
    pub fn local() -> Box<dyn ImageStorage> {
        match BrowserStorage::from_window() {
            Ok(backend) => Box::new(ListStorage::new(backend)),
            Err(error) => {
                log::warn!("falling back to in-memory storage: {error}");
                Box::new(ListStorage::new(MemoryBackend::new()))
            }
        }
    }

    /// One entry per record in `localStorage`.
    pub fn structured() -> Box<dyn ImageStorage> {
        match BrowserStorage::from_window() {
            Ok(backend) => Box::new(RecordStorage::new(backend)),
            Err(error) => {
                log::warn!("falling back to in-memory storage: {error}");
                Box::new(RecordStorage::new(MemoryBackend::new()))
            }
        }
    }

    pub fn in_memory() -> Box<dyn ImageStorage> {
        Box::new(RecordStorage::new(MemoryBackend::new()))
    }
}
