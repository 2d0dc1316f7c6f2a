use std::collections::HashMap;

use banana_shared::{AspectRatio, Dimensions, GenerateRequest, ReferenceImage, ReferenceKind, Tag};

use crate::raster::{self, RasterError};

pub const MAX_PROMPT_CHARS: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    #[error("prompt is empty")]
    EmptyPrompt,
    #[error("failed to build the blank reference image: {0}")]
    BlankReference(#[from] RasterError),
}

pub struct ComposeInput<'a> {
    pub user_text: &'a str,
    /// PNG data URL of the canvas, if one was captured.
    pub canvas_snapshot: Option<&'a str>,
    /// Preview data URLs in upload order.
    pub uploads: &'a [String],
    pub aspect_ratio: AspectRatio,
    pub dimensions: Dimensions,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PromptTemplate {
    TextOnly,
    SingleImage,
    MultiImage,
}

impl PromptTemplate {
    fn for_content(count: usize) -> Self {
        match count {
            0 => PromptTemplate::TextOnly,
            1 => PromptTemplate::SingleImage,
            _ => PromptTemplate::MultiImage,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ComposedPrompt {
    pub prompt: String,
    pub reference_images: Vec<ReferenceImage>,
    pub template: PromptTemplate,
    pub dimensions: Dimensions,
}

impl ComposedPrompt {
    pub fn into_request(self) -> GenerateRequest {
        GenerateRequest {
            prompt: self.prompt,
            reference_images: self.reference_images,
            dimensions: Some(self.dimensions),
        }
    }
}

pub fn aspect_ratio_hint(ratio: AspectRatio) -> Option<&'static str> {
    match ratio {
        AspectRatio::Square => Some("Generate a square image with 1:1 aspect ratio."),
        AspectRatio::Wide => Some("Generate a wide landscape image with 16:9 aspect ratio."),
        AspectRatio::Tall => Some("Generate a tall portrait image with 9:16 aspect ratio."),
        AspectRatio::Landscape => Some("Generate a landscape image with 4:3 aspect ratio."),
        AspectRatio::Portrait => Some("Generate a portrait image with 3:4 aspect ratio."),
        AspectRatio::Custom => None,
    }
}

/// Whether a captured canvas carries enough drawn pixels to send along.
pub fn canvas_has_content(snapshot: &str) -> bool {
    match raster::data_url_is_blank(snapshot) {
        Ok(blank) => !blank,
        Err(error) => {
            log::warn!("ignoring unreadable canvas snapshot: {error}");
            false
        }
    }
}

/// Builds generation requests and caches blank frames per output size.
#[derive(Default)]
pub struct PromptComposer {
    blanks: HashMap<Dimensions, String>,
}

impl PromptComposer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compose(&mut self, input: ComposeInput<'_>) -> Result<ComposedPrompt, ComposeError> {
        let text = input.user_text.trim();
        if text.is_empty() {
            return Err(ComposeError::EmptyPrompt);
        }

        let mut references = Vec::with_capacity(input.uploads.len() + 2);
        if let Some(snapshot) = input.canvas_snapshot.filter(|url| canvas_has_content(url)) {
            references.push(ReferenceImage {
                data: snapshot.to_string(),
                kind: ReferenceKind::Canvas,
                description: "Figure 1: content to transform".to_string(),
            });
        }
        for (upload_index, preview) in input.uploads.iter().enumerate() {
            references.push(ReferenceImage {
                data: preview.clone(),
                kind: ReferenceKind::Upload,
                description: format!(
                    "Figure {}: reference image {}",
                    references.len() + 1,
                    upload_index + 1
                ),
            });
        }

        let content = references.len();
        let frame = content + 1;
        references.push(ReferenceImage {
            data: self.blank_reference(input.dimensions)?,
            kind: ReferenceKind::AspectRatio,
            description: format!(
                "Figure {frame}: blank {} canvas ({}x{})",
                input.aspect_ratio, input.dimensions.width, input.dimensions.height
            ),
        });

        let template = PromptTemplate::for_content(content);
        let prompt = render_template(
            template,
            text,
            &references[..content],
            aspect_ratio_hint(input.aspect_ratio),
        );
        Ok(ComposedPrompt {
            prompt,
            reference_images: references,
            template,
            dimensions: input.dimensions,
        })
    }

    fn blank_reference(&mut self, dimensions: Dimensions) -> Result<String, RasterError> {
        if let Some(url) = self.blanks.get(&dimensions) {
            return Ok(url.clone());
        }
        let url = raster::blank_reference_data_url(dimensions)?;
        self.blanks.insert(dimensions, url.clone());
        Ok(url)
    }
}

fn figure_role(reference: &ReferenceImage, figure: usize) -> String {
    match reference.kind {
        ReferenceKind::Canvas => format!("Figure {figure} is a hand-drawn sketch, the content to transform"),
        _ => format!("Figure {figure} is a reference image"),
    }
}

fn render_template(
    template: PromptTemplate,
    text: &str,
    content: &[ReferenceImage],
    hint: Option<&str>,
) -> String {
    let text = text.trim_end_matches(['.', '。']);
    let hint = hint.map(|hint| format!("{hint} ")).unwrap_or_default();
    let frame = content.len() + 1;
    let fill = format!(
        "Figure {frame} is a blank white canvas that sets the output frame: draw the result on \
         Figure {frame} and fill its entire frame edge to edge, with no white borders or empty margins."
    );
    match template {
        PromptTemplate::TextOnly => format!("{text}. {hint}{fill}"),
        PromptTemplate::SingleImage => format!(
            "{}. Redraw the content of Figure 1 onto Figure 2 following this instruction: {text}. {hint}{fill}",
            figure_role(&content[0], 1)
        ),
        PromptTemplate::MultiImage => {
            let roles = content
                .iter()
                .enumerate()
                .map(|(index, reference)| figure_role(reference, index + 1))
                .collect::<Vec<_>>()
                .join("; ");
            format!(
                "{roles}. Combine the content of Figures 1 to {} and redraw it onto Figure {frame} \
                 following this instruction: {text}. {hint}{fill}",
                content.len()
            )
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PromptSource {
    Ai,
    #[default]
    Custom,
    Modified,
}

/// Editable prompt text, remembering the tag prompt it was seeded from.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PromptDraft {
    pub current: String,
    pub original: String,
    pub source: PromptSource,
}

/// Quick style chips offered under the prompt box.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PromptStyle {
    Realistic,
    Cartoon,
    OilPainting,
    Cyberpunk,
}

impl PromptStyle {
    pub const ALL: [PromptStyle; 4] = [
        PromptStyle::Realistic,
        PromptStyle::Cartoon,
        PromptStyle::OilPainting,
        PromptStyle::Cyberpunk,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PromptStyle::Realistic => "realistic",
            PromptStyle::Cartoon => "cartoon",
            PromptStyle::OilPainting => "oil-painting",
            PromptStyle::Cyberpunk => "cyberpunk",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|style| style.as_str() == value)
    }

    pub fn label(self) -> &'static str {
        match self {
            PromptStyle::Realistic => "写实风格",
            PromptStyle::Cartoon => "卡通风格",
            PromptStyle::OilPainting => "油画风格",
            PromptStyle::Cyberpunk => "赛博朋克",
        }
    }

    pub fn phrase(self) -> &'static str {
        match self {
            PromptStyle::Realistic => "photorealistic, highly detailed, professional photography",
            PromptStyle::Cartoon => "cartoon style, animated, colorful, cute",
            PromptStyle::OilPainting => "oil painting style, artistic, textured brushstrokes",
            PromptStyle::Cyberpunk => "cyberpunk style, neon lights, futuristic, high-tech",
        }
    }
}

pub fn truncate_prompt(text: &str) -> String {
    text.chars().take(MAX_PROMPT_CHARS).collect()
}

impl PromptDraft {
    pub fn fill_from_tag(&mut self, tag: &Tag) {
        let prompt = truncate_prompt(&tag.prompt);
        self.current = prompt.clone();
        self.original = prompt;
        self.source = PromptSource::Ai;
    }

    pub fn set_current(&mut self, text: &str) {
        self.current = truncate_prompt(text);
        if self.original.is_empty() {
            self.source = PromptSource::Custom;
        } else if self.current != self.original {
            self.source = PromptSource::Modified;
        }
    }

    /// Appends the style phrase, comma-separated from any existing text.
    pub fn append_style(&mut self, style: PromptStyle) {
        let text = if self.current.is_empty() {
            style.phrase().to_string()
        } else {
            format!("{}, {}", self.current, style.phrase())
        };
        self.set_current(&text);
    }

    pub fn revert(&mut self) -> bool {
        if self.original.is_empty() {
            return false;
        }
        self.current = self.original.clone();
        self.source = PromptSource::Ai;
        true
    }

    pub fn char_count(&self) -> usize {
        self.current.chars().count()
    }

    pub fn is_blank(&self) -> bool {
        self.current.trim().is_empty()
    }
}
