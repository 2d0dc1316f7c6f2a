use banana_shared::{Tag, TagCategory};
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::ModelSettings;
use crate::upstream::{truncate, ChatMessage, ChatRequest, ContentPart, MessageContent, ModelClient};

const BLOCK_MARKER: &str = "标签#";
const SUGGESTION_COUNT: usize = 6;

const DEFAULT_LABEL: &str = "创意效果";
const DEFAULT_EMOJI: &str = "✨";
const DEFAULT_DESCRIPTION: &str = "有趣的图片效果";
const DEFAULT_PROMPT: &str = "Creative image transformation";
const DEFAULT_KEYWORDS: [&str; 3] = ["创意", "效果", "转换"];

/// Result of reading the vision model's reply.
#[derive(Debug, PartialEq)]
pub enum ParsedTags {
    Parsed(Vec<Tag>),
    Malformed(String),
}

#[derive(Debug)]
pub struct AnalysisOutcome {
    pub tags: Vec<Tag>,
    /// Set when `tags` is the fixed fallback list.
    pub fallback_reason: Option<String>,
}

pub async fn analyze_images(
    client: &dyn ModelClient,
    settings: &ModelSettings,
    images: &[String],
) -> AnalysisOutcome {
    let request = build_request(settings, images);
    let reason = match client.complete(&request).await {
        Ok(response) => {
            let text = response
                .into_message()
                .and_then(|message| message.content)
                .map(content_text)
                .unwrap_or_default();
            info!("analysis reply: {}", truncate(&text, 500));
            match parse_reply(&text) {
                ParsedTags::Parsed(tags) => {
                    return AnalysisOutcome {
                        tags,
                        fallback_reason: None,
                    }
                }
                ParsedTags::Malformed(reason) => reason,
            }
        }
        Err(error) => error.to_string(),
    };
    warn!("analysis failed, returning fallback tags: {reason}");
    AnalysisOutcome {
        tags: fallback_tags(),
        fallback_reason: Some(reason),
    }
}

pub fn build_request(settings: &ModelSettings, images: &[String]) -> ChatRequest {
    let mut content = Vec::with_capacity(images.len() + 1);
    content.push(ContentPart::text(instruction_text(images.len())));
    content.extend(images.iter().map(|image| ContentPart::image(image.clone())));
    ChatRequest {
        model: settings.model.clone(),
        messages: vec![ChatMessage::user(content)],
        modalities: None,
        temperature: settings.temperature,
        max_tokens: settings.max_tokens,
    }
}

fn instruction_text(image_count: usize) -> String {
    let subject = if image_count > 1 { "这些图片" } else { "这张图片" };
    let mut text = format!(
        "分析{subject}，为用户生成{SUGGESTION_COUNT}个有趣的AI图片编辑创意。\n\n\
         首先简要描述你看到的内容。\n\n\
         然后生成{SUGGESTION_COUNT}个创意编辑方案，每个方案用以下格式：\n\n\
         标签#N:\n\
         类别: character/fun/scene/art/effect之一\n\
         名称: 2-4个中文字\n\
         表情: 一个emoji\n\
         描述: 基于图片内容的创意描述\n\
         提示词: [英文提示词]\n\
         关键词: 3个词\n\n\
         重要信息：\n\
         - 这些提示词将被图像生成模型使用\n\
         - 该模型擅长理解详细的叙事描述，能融合多张图片，保持角色一致性，理解艺术风格和摄影术语\n\
         - 不要只是简单地\"transform\"某物，而是创造有故事性、有氛围、有细节的场景\n"
    );
    if image_count > 1 {
        text.push_str(&format!(
            "\n特别注意：你收到了{image_count}张图片，请创造性地利用它们之间的关系。\
             可以融合它们的元素、创建故事序列、组合不同特征，或者发现它们之间有趣的联系。\n"
        ));
    }
    text.push_str("\n发挥你的想象力，根据图片具体内容生成独特有趣的提示词。每个提示词都应该充满细节和创意，让生成的图片富有视觉冲击力。");
    text
}

fn content_text(content: MessageContent) -> String {
    match content {
        MessageContent::Text(text) => text,
        MessageContent::Parts(parts) => parts
            .into_iter()
            .filter_map(|part| part.text)
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// JSON with a `tags` array is tried first, then `标签#N:` blocks.
pub fn parse_reply(text: &str) -> ParsedTags {
    if text.trim().is_empty() {
        return ParsedTags::Malformed("empty reply".to_string());
    }
    let mut drafts = if text.contains("\"tags\"") {
        parse_json_tags(text).unwrap_or_default()
    } else {
        Vec::new()
    };
    if drafts.is_empty() {
        drafts = parse_tag_blocks(text);
    }
    if drafts.is_empty() {
        return ParsedTags::Malformed("no parseable tags in reply".to_string());
    }
    ParsedTags::Parsed(
        drafts
            .into_iter()
            .enumerate()
            .map(|(index, draft)| draft.into_tag(index as u32 + 1))
            .collect(),
    )
}

#[derive(Deserialize, Default, Debug)]
struct TagDraft {
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    emoji: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    keywords: Option<Keywords>,
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum Keywords {
    List(Vec<String>),
    Text(String),
}

impl TagDraft {
    fn into_tag(self, id: u32) -> Tag {
        let field = |value: Option<String>, default: &str| {
            value
                .map(|value| clean_markdown(&value))
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let keywords = match self.keywords {
            Some(Keywords::List(list)) => list.iter().map(|k| clean_markdown(k)).collect(),
            Some(Keywords::Text(text)) => split_keywords(&text),
            None => Vec::new(),
        };
        let keywords: Vec<String> = keywords.into_iter().filter(|k| !k.is_empty()).collect();
        Tag {
            id,
            category: self
                .category
                .as_deref()
                .and_then(|value| TagCategory::parse(&clean_markdown(value)))
                .unwrap_or(TagCategory::Fun),
            label: field(self.label, DEFAULT_LABEL),
            emoji: field(self.emoji, DEFAULT_EMOJI),
            description: field(self.description, DEFAULT_DESCRIPTION),
            prompt: field(self.prompt, DEFAULT_PROMPT),
            keywords: if keywords.is_empty() {
                DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect()
            } else {
                keywords
            },
        }
    }
}

fn parse_json_tags(text: &str) -> Option<Vec<TagDraft>> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    let value: serde_json::Value = serde_json::from_str(&text[start..=end]).ok()?;
    let tags = value.get("tags")?.as_array()?;
    Some(
        tags.iter()
            .filter_map(|tag| serde_json::from_value::<TagDraft>(tag.clone()).ok())
            .collect(),
    )
}

fn parse_tag_blocks(text: &str) -> Vec<TagDraft> {
    let mut drafts = Vec::new();
    for block in text.split(BLOCK_MARKER).skip(1) {
        let digits = block.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits == 0 {
            continue;
        }
        let rest = &block[digits..];
        if !(rest.starts_with(':') || rest.starts_with('：')) {
            continue;
        }
        let draft = TagDraft {
            category: block_field(rest, "类别").map(|value| {
                value
                    .split_whitespace()
                    .next()
                    .unwrap_or_default()
                    .chars()
                    .filter(|c| c.is_alphanumeric())
                    .collect()
            }),
            label: block_field(rest, "名称"),
            emoji: block_field(rest, "表情"),
            description: block_field(rest, "描述"),
            prompt: block_field(rest, "提示词").map(|value| strip_brackets(&value)),
            keywords: block_field(rest, "关键词").map(Keywords::Text),
        };
        if draft.label.is_some() && draft.description.is_some() {
            drafts.push(draft);
        }
    }
    drafts
}

/// Value following `key:` (or `key：`) on the first line that carries it.
fn block_field(block: &str, key: &str) -> Option<String> {
    block.lines().find_map(|line| {
        let line = clean_markdown(line);
        let index = line.find(key)?;
        let after = line[index + key.len()..].trim_start();
        let value = after
            .strip_prefix(':')
            .or_else(|| after.strip_prefix('：'))?
            .trim();
        if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        }
    })
}

fn strip_brackets(value: &str) -> String {
    value
        .strip_prefix('[')
        .and_then(|inner| inner.strip_suffix(']'))
        .unwrap_or(value)
        .trim()
        .to_string()
}

fn split_keywords(text: &str) -> Vec<String> {
    text.split([',', '，', '、'])
        .map(clean_markdown)
        .filter(|keyword| !keyword.is_empty())
        .collect()
}

/// Drops markdown emphasis, strike-through and code markers.
pub fn clean_markdown(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, '*' | '_' | '~' | '`'))
        .collect::<String>()
        .trim()
        .to_string()
}

pub fn fallback_tags() -> Vec<Tag> {
    vec![
        Tag {
            id: 1,
            category: TagCategory::Fun,
            label: "卡通化".to_string(),
            emoji: "🎨".to_string(),
            description: "将您的图片变成卡通风格".to_string(),
            prompt: "Transform your image into cartoon style with vibrant colors and smooth textures"
                .to_string(),
            keywords: vec!["卡通".into(), "动画".into(), "趣味".into()],
        },
        Tag {
            id: 2,
            category: TagCategory::Art,
            label: "油画".to_string(),
            emoji: "🖼️".to_string(),
            description: "将您的图片变成油画风格".to_string(),
            prompt: "Transform your image into oil painting style with visible brush strokes"
                .to_string(),
            keywords: vec!["油画".into(), "艺术".into(), "经典".into()],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::{ChatResponse, UpstreamError};
    use async_trait::async_trait;

    const BLOCK_REPLY: &str = "图片里是一只坐在窗台上的橘猫。\n\n\
        标签#1:\n\
        类别: **scene**\n\
        名称: **星空猫咪**\n\
        表情: 🌌\n\
        描述: 猫咪坐在银河下的屋顶\n\
        提示词: [A ginger cat sitting on a rooftop under the milky way]\n\
        关键词: 星空，夜晚、猫\n\n\
        标签#2：\n\
        类别：art\n\
        名称：浮世绘\n\
        描述：日本浮世绘风格\n\
        提示词：Ukiyo-e woodblock print of a cat\n\n\
        标签#3:\n\
        名称: 只有名称\n";

    #[test]
    fn parses_tag_blocks_and_strips_markdown() {
        let ParsedTags::Parsed(tags) = parse_reply(BLOCK_REPLY) else {
            panic!("expected tags");
        };
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].id, 1);
        assert_eq!(tags[0].category, TagCategory::Scene);
        assert_eq!(tags[0].label, "星空猫咪");
        assert_eq!(
            tags[0].prompt,
            "A ginger cat sitting on a rooftop under the milky way"
        );
        assert_eq!(tags[0].keywords, vec!["星空", "夜晚", "猫"]);
        assert_eq!(tags[1].category, TagCategory::Art);
        assert_eq!(tags[1].emoji, DEFAULT_EMOJI);
        assert_eq!(tags[1].keywords.len(), 3);
    }

    #[test]
    fn json_reply_takes_precedence() {
        let reply = "Here you go:\n```json\n{\"tags\": [{\"category\": \"effect\", \"label\": \"**霓虹**\", \"keywords\": [\"光\", \"`夜`\"]}, 42]}\n```";
        let ParsedTags::Parsed(tags) = parse_reply(reply) else {
            panic!("expected tags");
        };
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].category, TagCategory::Effect);
        assert_eq!(tags[0].label, "霓虹");
        assert_eq!(tags[0].description, DEFAULT_DESCRIPTION);
        assert_eq!(tags[0].keywords, vec!["光", "夜"]);
    }

    #[test]
    fn unknown_category_defaults_to_fun() {
        let reply = "标签#1:\n类别: sculpture\n名称: 雕塑\n描述: 大理石雕像";
        let ParsedTags::Parsed(tags) = parse_reply(reply) else {
            panic!("expected tags");
        };
        assert_eq!(tags[0].category, TagCategory::Fun);
    }

    #[test]
    fn malformed_text_is_reported_not_raised() {
        assert!(matches!(
            parse_reply("I cannot help with that."),
            ParsedTags::Malformed(_)
        ));
        assert!(matches!(parse_reply("{\"tags\": oops"), ParsedTags::Malformed(_)));
        assert!(matches!(parse_reply("   "), ParsedTags::Malformed(_)));
    }

    #[test]
    fn instruction_mentions_multiple_images() {
        let settings = ModelSettings {
            model: "vision".into(),
            temperature: 0.7,
            max_tokens: 2000,
        };
        let request = build_request(&settings, &["a".into(), "b".into()]);
        assert_eq!(request.image_count(), 2);
        assert!(request.modalities.is_none());
        match &request.messages[0].content[0] {
            ContentPart::Text { text } => assert!(text.contains("你收到了2张图片")),
            other => panic!("unexpected first part: {other:?}"),
        }
    }

    struct Reply(Result<&'static str, u16>);

    #[async_trait]
    impl ModelClient for Reply {
        async fn complete(&self, _: &ChatRequest) -> Result<ChatResponse, UpstreamError> {
            match self.0 {
                Ok(text) => Ok(serde_json::from_value(serde_json::json!({
                    "choices": [{"message": {"content": text}}]
                }))
                .unwrap()),
                Err(status) => Err(UpstreamError::Status {
                    status,
                    body: String::new(),
                }),
            }
        }
    }

    fn settings() -> ModelSettings {
        ModelSettings {
            model: "vision".into(),
            temperature: 0.7,
            max_tokens: 2000,
        }
    }

    #[tokio::test]
    async fn malformed_reply_yields_fallback_list() {
        let outcome =
            analyze_images(&Reply(Ok("no tags here")), &settings(), &["img".into()]).await;
        assert_eq!(outcome.tags, fallback_tags());
        assert!(outcome.fallback_reason.is_some());
    }

    #[tokio::test]
    async fn transport_failure_yields_fallback_list() {
        let outcome = analyze_images(&Reply(Err(500)), &settings(), &["img".into()]).await;
        assert_eq!(outcome.tags.len(), 2);
        assert!(outcome.fallback_reason.is_some());
    }

    #[tokio::test]
    async fn parsed_reply_is_returned_as_is() {
        let outcome = analyze_images(&Reply(Ok(BLOCK_REPLY)), &settings(), &["img".into()]).await;
        assert!(outcome.fallback_reason.is_none());
        assert_eq!(outcome.tags.len(), 2);
    }
}
