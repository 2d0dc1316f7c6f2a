use banana_shared::{data_url, GenerateRequest, GenerateResponse, GenerationMode};
use chrono::{SecondsFormat, Utc};
use tracing::{info, warn};

use crate::config::ModelSettings;
use crate::error::ApiError;
use crate::upstream::{
    truncate, ChatMessage, ChatRequest, ContentPart, MessageContent, Modality, ModelClient,
    ResponseMessage,
};

const PLACEHOLDER_TEXT_CHARS: usize = 200;

pub async fn generate_image(
    client: &dyn ModelClient,
    settings: &ModelSettings,
    request: GenerateRequest,
) -> Result<GenerateResponse, ApiError> {
    let prompt = request.prompt.trim().to_string();
    if prompt.is_empty() {
        return Err(ApiError::BadRequest("No prompt provided".to_string()));
    }
    let mode = if request.reference_images.is_empty() {
        GenerationMode::Generate
    } else {
        GenerationMode::Edit
    };
    info!(
        mode = ?mode,
        references = request.reference_images.len(),
        dimensions = ?request.dimensions,
        "generating image"
    );
    for (index, reference) in request.reference_images.iter().enumerate() {
        info!(
            "reference {}/{}: {:?} - {} ({} chars)",
            index + 1,
            request.reference_images.len(),
            reference.kind,
            reference.description,
            reference.data.len()
        );
    }

    let chat = build_request(settings, &request);
    let response = client.complete(&chat).await?;
    let message = response
        .into_message()
        .ok_or_else(|| ApiError::Internal("No message in response".to_string()))?;
    let extracted = extract_image(message);

    let image_url = match extracted.image_url {
        Some(url) => url,
        None => {
            warn!(
                "model returned no image, text: {}",
                extracted.text.as_deref().map(|t| truncate(t, 200)).unwrap_or("<none>")
            );
            placeholder_image(extracted.text.as_deref())
        }
    };

    Ok(GenerateResponse {
        success: true,
        image_url,
        prompt,
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        mode,
        text: extracted.text.filter(|text| !text.trim().is_empty()),
        model: Some(settings.model.clone()),
    })
}

pub fn build_request(settings: &ModelSettings, request: &GenerateRequest) -> ChatRequest {
    let mut content = Vec::with_capacity(request.reference_images.len() + 1);
    content.push(ContentPart::text(request.prompt.trim()));
    content.extend(
        request
            .reference_images
            .iter()
            .map(|reference| ContentPart::image(reference.data.clone())),
    );
    ChatRequest {
        model: settings.model.clone(),
        messages: vec![ChatMessage::user(content)],
        modalities: Some(vec![Modality::Image, Modality::Text]),
        temperature: settings.temperature,
        max_tokens: settings.max_tokens,
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct ExtractedReply {
    pub image_url: Option<String>,
    pub text: Option<String>,
}

/// Looks for the image in `message.images` first, then in mixed content parts.
pub fn extract_image(message: ResponseMessage) -> ExtractedReply {
    let mut image_url = message.images.and_then(|images| {
        images.into_iter().find_map(|part| {
            if part.kind == "image_url" {
                part.image_url.map(|image| image.url).filter(|url| !url.is_empty())
            } else {
                None
            }
        })
    });

    let mut text = None;
    match message.content {
        Some(MessageContent::Text(content)) => text = Some(content),
        Some(MessageContent::Parts(parts)) => {
            for part in parts {
                match part.kind.as_str() {
                    "image_url" if image_url.is_none() => {
                        if let Some(image) = part.image_url {
                            if data_url::is_data_url(&image.url) {
                                image_url = Some(image.url);
                            }
                        }
                    }
                    "text" => {
                        if let Some(part_text) = part.text {
                            text = Some(part_text);
                        }
                    }
                    _ => {}
                }
            }
        }
        None => {}
    }

    ExtractedReply { image_url, text }
}

/// SVG stand-in used when the model answers with text only.
pub fn placeholder_image(text: Option<&str>) -> String {
    let text = text.map(str::trim).filter(|text| !text.is_empty());
    let subtitle = if text.is_some() {
        "模型返回了文本描述"
    } else {
        "等待图像生成"
    };
    let excerpt = text
        .map(|text| {
            let excerpt = truncate(text, PLACEHOLDER_TEXT_CHARS);
            format!("{}...", escape_xml(excerpt))
        })
        .unwrap_or_default();
    let svg = format!(
        r##"<svg width="1024" height="1024" xmlns="http://www.w3.org/2000/svg">
  <defs>
    <linearGradient id="bg" x1="0%" y1="0%" x2="100%" y2="100%">
      <stop offset="0%" style="stop-color:#FFD700;stop-opacity:1" />
      <stop offset="100%" style="stop-color:#FFA500;stop-opacity:1" />
    </linearGradient>
  </defs>
  <rect width="1024" height="1024" fill="url(#bg)"/>
  <text x="50%" y="45%" font-family="Arial, sans-serif" font-size="32" fill="white" text-anchor="middle">🎨 AI 响应</text>
  <text x="50%" y="50%" font-family="Arial, sans-serif" font-size="18" fill="white" text-anchor="middle" opacity="0.9">{subtitle}</text>
  <foreignObject x="10%" y="60%" width="80%" height="30%">
    <div xmlns="http://www.w3.org/1999/xhtml" style="color: white; font-size: 14px; text-align: center; opacity: 0.8;">{excerpt}</div>
  </foreignObject>
</svg>"##
    );
    data_url::encode("image/svg+xml", svg.as_bytes())
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::{ChatResponse, UpstreamError};
    use async_trait::async_trait;
    use banana_shared::{ReferenceImage, ReferenceKind};
    use serde_json::json;
    use std::sync::Mutex;

    fn message(value: serde_json::Value) -> ResponseMessage {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn images_array_wins_over_content_parts() {
        let reply = extract_image(message(json!({
            "content": [
                {"type": "text", "text": "here"},
                {"type": "image_url", "image_url": {"url": "data:image/png;base64,BBBB"}}
            ],
            "images": [{"type": "image_url", "image_url": {"url": "data:image/png;base64,AAAA"}}]
        })));
        assert_eq!(reply.image_url.as_deref(), Some("data:image/png;base64,AAAA"));
        assert_eq!(reply.text.as_deref(), Some("here"));
    }

    #[test]
    fn inline_parts_need_data_urls() {
        let reply = extract_image(message(json!({
            "content": [
                {"type": "image_url", "image_url": {"url": "https://cdn/x.png"}},
                {"type": "image_url", "image_url": {"url": "data:image/webp;base64,CCCC"}}
            ]
        })));
        assert_eq!(reply.image_url.as_deref(), Some("data:image/webp;base64,CCCC"));
    }

    #[test]
    fn text_only_reply_has_no_image() {
        let reply = extract_image(message(json!({"content": "I can only describe it."})));
        assert_eq!(reply.image_url, None);
        assert_eq!(reply.text.as_deref(), Some("I can only describe it."));
    }

    #[test]
    fn placeholder_escapes_and_truncates_text() {
        let long = format!("<b>{}</b>", "x".repeat(400));
        let url = placeholder_image(Some(&long));
        let (mime, bytes) = data_url::decode(&url).unwrap();
        assert_eq!(mime, "image/svg+xml");
        let svg = String::from_utf8(bytes).unwrap();
        assert!(svg.contains("&lt;b&gt;"));
        assert!(!svg.contains("<b>"));
        assert!(svg.contains("模型返回了文本描述"));
        assert!(!svg.contains(&"x".repeat(250)));
    }

    struct Recorder {
        reply: serde_json::Value,
        seen: Mutex<Option<ChatRequest>>,
    }

    #[async_trait]
    impl ModelClient for Recorder {
        async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, UpstreamError> {
            *self.seen.lock().unwrap() = Some(request.clone());
            Ok(serde_json::from_value(self.reply.clone()).unwrap())
        }
    }

    fn settings() -> ModelSettings {
        ModelSettings {
            model: "painter".into(),
            temperature: 0.9,
            max_tokens: 8192,
        }
    }

    #[tokio::test]
    async fn text_only_generation_returns_placeholder() {
        let client = Recorder {
            reply: json!({"choices": [{"message": {"content": "Sorry, text only."}}]}),
            seen: Mutex::new(None),
        };
        let request = GenerateRequest {
            prompt: "a banana".into(),
            reference_images: vec![ReferenceImage {
                data: "data:image/png;base64,AAAA".into(),
                kind: ReferenceKind::AspectRatio,
                description: "Figure 1".into(),
            }],
            dimensions: None,
        };
        let response = generate_image(&client, &settings(), request).await.unwrap();
        assert!(response.image_url.starts_with("data:image/svg+xml;base64,"));
        assert_eq!(response.text.as_deref(), Some("Sorry, text only."));
        assert_eq!(response.mode, GenerationMode::Edit);
        assert_eq!(response.model.as_deref(), Some("painter"));

        let seen = client.seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen.image_count(), 1);
        assert_eq!(seen.modalities, Some(vec![Modality::Image, Modality::Text]));
    }

    #[tokio::test]
    async fn blank_prompt_is_rejected_before_calling_upstream() {
        let client = Recorder {
            reply: json!({}),
            seen: Mutex::new(None),
        };
        let error = generate_image(&client, &settings(), GenerateRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(error, ApiError::BadRequest(_)));
        assert!(client.seen.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_message_is_an_internal_error() {
        let client = Recorder {
            reply: json!({"choices": []}),
            seen: Mutex::new(None),
        };
        let request = GenerateRequest {
            prompt: "a banana".into(),
            ..Default::default()
        };
        let error = generate_image(&client, &settings(), request).await.unwrap_err();
        assert!(matches!(error, ApiError::Internal(_)));
    }
}
