use serde::{Deserialize, Serialize};

use crate::{AspectRatio, Dimensions};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TagCategory {
    Character,
    Fun,
    Scene,
    Art,
    Effect,
}

impl TagCategory {
    pub const ALL: [TagCategory; 5] = [
        TagCategory::Character,
        TagCategory::Fun,
        TagCategory::Scene,
        TagCategory::Art,
        TagCategory::Effect,
    ];

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "character" => Some(TagCategory::Character),
            "fun" => Some(TagCategory::Fun),
            "scene" => Some(TagCategory::Scene),
            "art" => Some(TagCategory::Art),
            "effect" => Some(TagCategory::Effect),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TagCategory::Character => "character",
            TagCategory::Fun => "fun",
            TagCategory::Scene => "scene",
            TagCategory::Art => "art",
            TagCategory::Effect => "effect",
        }
    }
}

/// An AI-suggested editing idea. Immutable once built; selecting one copies its
/// prompt into the editor.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Tag {
    pub id: u32,
    pub category: TagCategory,
    pub label: String,
    pub emoji: String,
    pub description: String,
    pub prompt: String,
    pub keywords: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ReferenceKind {
    Canvas,
    Upload,
    AspectRatio,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ReferenceImage {
    pub data: String,
    #[serde(rename = "type")]
    pub kind: ReferenceKind,
    pub description: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    pub tags: Vec<Tag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_mock: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub reference_images: Vec<ReferenceImage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    Edit,
    Generate,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub success: bool,
    pub image_url: String,
    pub prompt: String,
    pub timestamp: String,
    pub mode: GenerationMode,
    /// Text the model sent alongside (or instead of) an image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Upstream model that produced the image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<AspectRatio>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// A persisted generation result.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    pub id: String,
    pub url: String,
    pub prompt: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ImageMetadata>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_request_accepts_camel_case_body() {
        let body = r#"{
            "prompt": "a banana",
            "referenceImages": [{"data": "data:image/png;base64,AA", "type": "aspect-ratio", "description": "Figure 1"}],
            "dimensions": {"width": 1344, "height": 768}
        }"#;
        let request: GenerateRequest = serde_json::from_str(body).unwrap();
        assert_eq!(request.reference_images.len(), 1);
        assert_eq!(request.reference_images[0].kind, ReferenceKind::AspectRatio);
        assert_eq!(request.dimensions, Some(Dimensions::new(1344, 768)));
    }

    #[test]
    fn missing_prompt_deserializes_as_empty() {
        let request: GenerateRequest = serde_json::from_str("{}").unwrap();
        assert!(request.prompt.is_empty());
        assert!(request.reference_images.is_empty());
    }

    #[test]
    fn error_body_omits_absent_retry_hint() {
        let body = ErrorBody {
            error: "upstream".into(),
            message: "boom".into(),
            retry_after: None,
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(!json.contains("retryAfter"));
    }
}
