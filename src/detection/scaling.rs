//! Mapping model-space boxes onto a preview surface

use super::BoundingBox;

/// Image dimensions after applying `rotation_degrees`
#[must_use]
pub const fn rotated_size(width: u32, height: u32, rotation_degrees: u16) -> (u32, u32) {
    match rotation_degrees % 360 {
        90 | 270 => (height, width),
        _ => (width, height),
    }
}

/// Per-axis factors from upright image space to preview space
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn scale_factors(
    preview_width: u32,
    preview_height: u32,
    image_width: u32,
    image_height: u32,
) -> (f32, f32) {
    if image_width == 0 || image_height == 0 {
        return (1.0, 1.0);
    }
    (
        preview_width as f32 / image_width as f32,
        preview_height as f32 / image_height as f32,
    )
}

/// Rotate a box clockwise within an image of `width` x `height`
///
/// Rotations other than multiples of 90 degrees leave the box unchanged.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn rotate_box(b: &BoundingBox, width: u32, height: u32, rotation_degrees: u16) -> BoundingBox {
    let (w, h) = (width as f32, height as f32);
    match rotation_degrees % 360 {
        90 => BoundingBox::new(h - b.bottom, b.left, h - b.top, b.right),
        180 => BoundingBox::new(w - b.right, h - b.bottom, w - b.left, h - b.top),
        270 => BoundingBox::new(b.top, w - b.right, b.bottom, w - b.left),
        _ => *b,
    }
}

/// Map a box from raw image pixels to preview pixels
#[must_use]
pub fn to_preview(
    b: &BoundingBox,
    image_width: u32,
    image_height: u32,
    rotation_degrees: u16,
    preview_width: u32,
    preview_height: u32,
) -> BoundingBox {
    let upright = rotate_box(b, image_width, image_height, rotation_degrees);
    let (w, h) = rotated_size(image_width, image_height, rotation_degrees);
    let (sx, sy) = scale_factors(preview_width, preview_height, w, h);
    upright.scale(sx, sy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quarter_turn_swaps_axes() {
        assert_eq!(rotated_size(640, 480, 90), (480, 640));
        assert_eq!(rotated_size(640, 480, 180), (640, 480));
    }

    #[test]
    fn rotations_compose_to_identity() {
        let b = BoundingBox::new(10.0, 20.0, 110.0, 70.0);
        let once = rotate_box(&b, 640, 480, 90);
        let twice = rotate_box(&once, 480, 640, 90);
        let thrice = rotate_box(&twice, 640, 480, 90);
        let full = rotate_box(&thrice, 480, 640, 90);
        assert_eq!(full, b);
        assert_eq!(twice, rotate_box(&b, 640, 480, 180));
    }

    #[test]
    fn quarter_turn_keeps_box_in_bounds() {
        let b = BoundingBox::new(0.0, 0.0, 100.0, 50.0);
        let r = rotate_box(&b, 640, 480, 90);
        assert_eq!(r, BoundingBox::new(430.0, 0.0, 480.0, 100.0));
    }

    #[test]
    fn preview_scaling() {
        let b = BoundingBox::new(100.0, 100.0, 200.0, 200.0);
        let p = to_preview(&b, 400, 400, 0, 800, 200);
        assert_eq!(p, BoundingBox::new(200.0, 50.0, 400.0, 100.0));
        assert_eq!(scale_factors(100, 100, 0, 10), (1.0, 1.0));
    }
}
