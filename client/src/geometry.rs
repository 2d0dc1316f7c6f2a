use banana_shared::{Dimensions, PlacedImage, Point};

pub const MIN_IMAGE_SIZE: f64 = 5.0;
pub const UPLOAD_BOX: f64 = 200.0;
pub const UPLOAD_ORIGIN: f64 = 50.0;
pub const UPLOAD_STEP: f64 = 30.0;
pub const UPLOAD_MARGIN: f64 = 50.0;
pub const HANDLE_SIZE: f64 = 14.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub fn of(image: &PlacedImage) -> Self {
        Self {
            x: image.x,
            y: image.y,
            width: image.width,
            height: image.height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
}

pub fn normalize_point(point: Point) -> Option<Point> {
    if !point.is_finite() {
        return None;
    }
    Some(point)
}

/// Rejects non-finite bounds and enforces the minimum image size.
pub fn clamp_bounds(bounds: Bounds) -> Option<Bounds> {
    let values = [bounds.x, bounds.y, bounds.width, bounds.height];
    if values.iter().any(|value| !value.is_finite()) {
        return None;
    }
    Some(Bounds {
        x: bounds.x,
        y: bounds.y,
        width: bounds.width.max(MIN_IMAGE_SIZE),
        height: bounds.height.max(MIN_IMAGE_SIZE),
    })
}

/// Layout for the `index`-th upload: fit into the upload box, then cascade
/// from the top-left corner while staying inside the canvas margin.
pub fn fit_upload(natural_width: f64, natural_height: f64, index: usize, canvas: Dimensions) -> Bounds {
    let ratio = if natural_width > 0.0 && natural_height > 0.0 {
        natural_width / natural_height
    } else {
        1.0
    };
    let (width, height) = if ratio > 1.0 {
        (UPLOAD_BOX, UPLOAD_BOX / ratio)
    } else {
        (UPLOAD_BOX * ratio, UPLOAD_BOX)
    };
    let offset = UPLOAD_ORIGIN + UPLOAD_STEP * index as f64;
    let x = offset.min(canvas.width as f64 - width - UPLOAD_MARGIN).max(0.0);
    let y = offset.min(canvas.height as f64 - height - UPLOAD_MARGIN).max(0.0);
    Bounds {
        x,
        y,
        width: width.max(MIN_IMAGE_SIZE),
        height: height.max(MIN_IMAGE_SIZE),
    }
}

/// Top-most image under the point.
pub fn image_at(images: &[PlacedImage], point: Point) -> Option<&PlacedImage> {
    images
        .iter()
        .rev()
        .find(|image| image.contains(point.x as f64, point.y as f64))
}

pub fn hit_resize_handle(bounds: Bounds, point: Point) -> bool {
    let half = HANDLE_SIZE / 2.0;
    let x = point.x as f64;
    let y = point.y as f64;
    x >= bounds.right() - half
        && x <= bounds.right() + half
        && y >= bounds.bottom() - half
        && y <= bounds.bottom() + half
}

pub fn translate(bounds: Bounds, dx: f64, dy: f64) -> Bounds {
    Bounds {
        x: bounds.x + dx,
        y: bounds.y + dy,
        ..bounds
    }
}

/// Moves the bottom-right corner to `corner`, keeping the top-left fixed.
pub fn resize_to(bounds: Bounds, corner: Point) -> Bounds {
    Bounds {
        width: (corner.x as f64 - bounds.x).max(MIN_IMAGE_SIZE),
        height: (corner.y as f64 - bounds.y).max(MIN_IMAGE_SIZE),
        ..bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(id: &str, x: f64, y: f64, size: f64) -> PlacedImage {
        PlacedImage {
            id: id.into(),
            source: String::new(),
            x,
            y,
            width: size,
            height: size,
        }
    }

    #[test]
    fn rejects_non_finite_points() {
        assert!(normalize_point(Point::new(f32::NAN, 1.0)).is_none());
        assert!(normalize_point(Point::new(1.0, f32::INFINITY)).is_none());
        assert_eq!(normalize_point(Point::new(1.0, 2.0)), Some(Point::new(1.0, 2.0)));
    }

    #[test]
    fn clamp_enforces_minimum_size() {
        let clamped = clamp_bounds(Bounds {
            x: 3.0,
            y: 4.0,
            width: 1.0,
            height: -20.0,
        })
        .unwrap();
        assert_eq!(clamped.width, MIN_IMAGE_SIZE);
        assert_eq!(clamped.height, MIN_IMAGE_SIZE);
        assert!(clamp_bounds(Bounds {
            x: f64::NAN,
            y: 0.0,
            width: 10.0,
            height: 10.0
        })
        .is_none());
    }

    #[test]
    fn uploads_fit_box_and_cascade() {
        let canvas = Dimensions::new(864, 1184);
        let wide = fit_upload(400.0, 100.0, 0, canvas);
        assert_eq!((wide.width, wide.height), (200.0, 50.0));
        assert_eq!((wide.x, wide.y), (50.0, 50.0));

        let tall = fit_upload(100.0, 400.0, 2, canvas);
        assert_eq!((tall.width, tall.height), (50.0, 200.0));
        assert_eq!((tall.x, tall.y), (110.0, 110.0));
    }

    #[test]
    fn uploads_stay_inside_small_canvases() {
        let placed = fit_upload(100.0, 100.0, 4, Dimensions::new(320, 320));
        assert_eq!(placed.x, 70.0);
        assert_eq!(placed.y, 70.0);

        let tiny = fit_upload(100.0, 100.0, 0, Dimensions::new(100, 100));
        assert_eq!((tiny.x, tiny.y), (0.0, 0.0));
    }

    #[test]
    fn hit_test_prefers_topmost_image() {
        let images = vec![image("under", 0.0, 0.0, 100.0), image("over", 50.0, 50.0, 100.0)];
        assert_eq!(image_at(&images, Point::new(60.0, 60.0)).unwrap().id, "over");
        assert_eq!(image_at(&images, Point::new(10.0, 10.0)).unwrap().id, "under");
        assert!(image_at(&images, Point::new(400.0, 10.0)).is_none());
    }

    #[test]
    fn resize_keeps_origin_and_minimum() {
        let bounds = Bounds {
            x: 10.0,
            y: 10.0,
            width: 50.0,
            height: 50.0,
        };
        assert!(hit_resize_handle(bounds, Point::new(61.0, 59.0)));
        let resized = resize_to(bounds, Point::new(12.0, 100.0));
        assert_eq!((resized.x, resized.y), (10.0, 10.0));
        assert_eq!((resized.width, resized.height), (MIN_IMAGE_SIZE, 90.0));
        let moved = translate(bounds, 5.0, -5.0);
        assert_eq!((moved.x, moved.y), (15.0, 5.0));
    }
}
