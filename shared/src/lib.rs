use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

pub mod api;
pub mod data_url;
pub mod snapshot_format;

pub use api::*;
pub use snapshot_format::{
    decode_snapshot, encode_snapshot, CanvasScene, SnapshotDecodeError, SnapshotEncodeError,
};

pub const BACKGROUND_COLOR: &str = "#ffffff";

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    Brush,
    Eraser,
    Select,
}

impl Tool {
    pub fn draws(self) -> bool {
        matches!(self, Tool::Brush | Tool::Eraser)
    }
}

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq)]
pub struct Stroke {
    pub id: String,
    pub tool: Tool,
    pub color: String,
    pub size: f32,
    pub points: Vec<Point>,
}

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Debug, PartialEq)]
pub struct PlacedImage {
    pub id: String,
    /// Data URL of the image pixels.
    pub source: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PlacedImage {
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
    }
}

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

#[derive(Serialize, Deserialize, Encode, Decode, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AspectRatio {
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "3:4")]
    Portrait,
    #[serde(rename = "4:3")]
    Landscape,
    #[serde(rename = "9:16")]
    Tall,
    #[serde(rename = "16:9")]
    Wide,
    #[serde(rename = "custom")]
    Custom,
}

impl AspectRatio {
    pub const PRESETS: [AspectRatio; 5] = [
        AspectRatio::Square,
        AspectRatio::Portrait,
        AspectRatio::Landscape,
        AspectRatio::Tall,
        AspectRatio::Wide,
    ];

    /// Fixed output size for a preset ratio; `None` for `custom`.
    pub fn dimensions(self) -> Option<Dimensions> {
        match self {
            AspectRatio::Square => Some(Dimensions::new(1024, 1024)),
            AspectRatio::Portrait => Some(Dimensions::new(864, 1184)),
            AspectRatio::Landscape => Some(Dimensions::new(1184, 864)),
            AspectRatio::Tall => Some(Dimensions::new(768, 1344)),
            AspectRatio::Wide => Some(Dimensions::new(1344, 768)),
            AspectRatio::Custom => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Portrait => "3:4",
            AspectRatio::Landscape => "4:3",
            AspectRatio::Tall => "9:16",
            AspectRatio::Wide => "16:9",
            AspectRatio::Custom => "custom",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "1:1" => Some(AspectRatio::Square),
            "3:4" => Some(AspectRatio::Portrait),
            "4:3" => Some(AspectRatio::Landscape),
            "9:16" => Some(AspectRatio::Tall),
            "16:9" => Some(AspectRatio::Wide),
            "custom" => Some(AspectRatio::Custom),
            _ => None,
        }
    }
}

impl std::fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Layer {
    pub id: String,
    pub name: String,
    pub visible: bool,
    pub opacity: f32,
    pub locked: bool,
}

impl Layer {
    pub fn background() -> Self {
        Self {
            id: "background".to_string(),
            name: "背景".to_string(),
            visible: true,
            opacity: 1.0,
            locked: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_dimensions_match_ratio_table() {
        assert_eq!(AspectRatio::Wide.dimensions(), Some(Dimensions::new(1344, 768)));
        assert_eq!(AspectRatio::Tall.dimensions(), Some(Dimensions::new(768, 1344)));
        assert_eq!(AspectRatio::Custom.dimensions(), None);
        for ratio in AspectRatio::PRESETS {
            assert_eq!(AspectRatio::parse(ratio.as_str()), Some(ratio));
        }
    }

    #[test]
    fn aspect_ratio_uses_colon_names_on_the_wire() {
        let json = serde_json::to_string(&AspectRatio::Wide).unwrap();
        assert_eq!(json, "\"16:9\"");
        let parsed: AspectRatio = serde_json::from_str("\"custom\"").unwrap();
        assert_eq!(parsed, AspectRatio::Custom);
    }

    #[test]
    fn placed_image_contains_its_edges() {
        let image = PlacedImage {
            id: "a".into(),
            source: String::new(),
            x: 10.0,
            y: 10.0,
            width: 20.0,
            height: 5.0,
        };
        assert!(image.contains(10.0, 15.0));
        assert!(image.contains(30.0, 12.0));
        assert!(!image.contains(31.0, 12.0));
    }
}
