use banana_shared::{AspectRatio, CanvasScene, Dimensions, Layer, PlacedImage, Stroke, Tool};

use crate::history::History;

pub const DEFAULT_COLOR: &str = "#000000";
pub const DEFAULT_BRUSH_SIZE: f32 = 5.0;
pub const DEFAULT_ERASER_SIZE: f32 = 10.0;
pub const DEFAULT_ASPECT_RATIO: AspectRatio = AspectRatio::Portrait;

pub enum DrawMode {
    Idle,
    Drawing { id: String },
}

pub struct CanvasState {
    pub aspect_ratio: AspectRatio,
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub tool: Tool,
    pub brush_size: f32,
    pub current_color: String,
    pub eraser_size: f32,
    pub layers: Vec<Layer>,
    pub active_layer_id: Option<String>,
    pub strokes: Vec<Stroke>,
    pub images: Vec<PlacedImage>,
    pub selected_image: Option<String>,
    pub mode: DrawMode,
    pub history: History,
}

impl Default for CanvasState {
    fn default() -> Self {
        let dimensions = DEFAULT_ASPECT_RATIO
            .dimensions()
            .unwrap_or(Dimensions::new(864, 1184));
        let background = Layer::background();
        Self {
            aspect_ratio: DEFAULT_ASPECT_RATIO,
            canvas_width: dimensions.width,
            canvas_height: dimensions.height,
            tool: Tool::Brush,
            brush_size: DEFAULT_BRUSH_SIZE,
            current_color: DEFAULT_COLOR.to_string(),
            eraser_size: DEFAULT_ERASER_SIZE,
            active_layer_id: Some(background.id.clone()),
            layers: vec![background],
            strokes: Vec::new(),
            images: Vec::new(),
            selected_image: None,
            mode: DrawMode::Idle,
            history: History::new(),
        }
    }
}

impl CanvasState {
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.canvas_width, self.canvas_height)
    }

    pub fn scene(&self) -> CanvasScene {
        CanvasScene {
            dimensions: Some(self.dimensions()),
            strokes: self.strokes.clone(),
            images: self.images.clone(),
        }
    }

    /// The scene minus the given placed images.
    pub fn scene_without(&self, excluded: &[String]) -> CanvasScene {
        CanvasScene {
            dimensions: Some(self.dimensions()),
            strokes: self.strokes.clone(),
            images: self
                .images
                .iter()
                .filter(|image| !excluded.contains(&image.id))
                .cloned()
                .collect(),
        }
    }

    pub fn is_drawing(&self) -> bool {
        matches!(self.mode, DrawMode::Drawing { .. })
    }

    pub fn selected(&self) -> Option<&PlacedImage> {
        let id = self.selected_image.as_deref()?;
        self.images.iter().find(|image| image.id == id)
    }

    pub fn active_size(&self) -> f32 {
        match self.tool {
            Tool::Eraser => self.eraser_size,
            _ => self.brush_size,
        }
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_is_a_blank_portrait_canvas() {
        let state = CanvasState::default();
        assert_eq!(state.aspect_ratio, AspectRatio::Portrait);
        assert_eq!(state.dimensions(), Dimensions::new(864, 1184));
        assert_eq!(state.tool, Tool::Brush);
        assert_eq!(state.brush_size, 5.0);
        assert_eq!(state.eraser_size, 10.0);
        assert_eq!(state.current_color, "#000000");
        assert_eq!(state.layers.len(), 1);
        assert_eq!(state.active_layer_id.as_deref(), Some("background"));
        assert_eq!(state.history.index(), -1);
        assert!(state.scene().is_empty());
    }

    #[test]
    fn scene_without_skips_excluded_images() {
        let mut state = CanvasState::default();
        for id in ["a", "b"] {
            state.images.push(PlacedImage {
                id: id.into(),
                source: String::new(),
                x: 0.0,
                y: 0.0,
                width: 10.0,
                height: 10.0,
            });
        }
        let scene = state.scene_without(&["a".to_string()]);
        assert_eq!(scene.images.len(), 1);
        assert_eq!(scene.images[0].id, "b");
    }
}
