use std::sync::Arc;

use crate::config::ModelSettings;
use crate::upstream::ModelClient;

#[derive(Clone)]
pub struct AppState {
    pub model: Arc<dyn ModelClient>,
    pub analyze: ModelSettings,
    pub generate: ModelSettings,
    /// Answer analysis failures with 500 instead of the fallback tags.
    pub analyze_strict: bool,
}
