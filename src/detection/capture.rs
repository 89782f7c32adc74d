//! Saving analyzed frames with their detections outlined

use std::path::{Path, PathBuf};

use image::{Rgba, RgbaImage};

use super::scaling::{rotate_box, rotated_size};
use super::{BoundingBox, DetectionSet};
use crate::{Error, Result};

const OUTLINE: Rgba<u8> = Rgba([255, 48, 48, 255]);

/// Outline thickness in pixels
const STROKE: u32 = 2;

/// Decode the set's frame, turn it upright and outline every detection
///
/// # Errors
///
/// Returns error if the set carries no frame or the frame cannot be decoded
pub fn render(set: &DetectionSet) -> Result<RgbaImage> {
    let frame = set
        .frame
        .as_deref()
        .ok_or_else(|| Error::Capture("no analyzed frame to capture".to_string()))?;
    let decoded = image::load_from_memory(&frame.data)?;
    let (width, height) = (decoded.width(), decoded.height());

    let upright = match set.rotation_degrees % 360 {
        90 => decoded.rotate90(),
        180 => decoded.rotate180(),
        270 => decoded.rotate270(),
        _ => decoded,
    };
    let mut canvas = upright.into_rgba8();
    debug_assert_eq!(
        canvas.dimensions(),
        rotated_size(width, height, set.rotation_degrees)
    );

    for detection in &set.detections {
        let b = rotate_box(&detection.bounding_box, width, height, set.rotation_degrees);
        outline(&mut canvas, &b);
    }
    Ok(canvas)
}

/// Render the set and write it as a PNG into `dir`
///
/// The file is named after the frame timestamp.
///
/// # Errors
///
/// Returns error if rendering fails or the file cannot be written
pub fn save(set: &DetectionSet, dir: &Path) -> Result<PathBuf> {
    let canvas = render(set)?;
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!(
        "sense8-{}.png",
        set.timestamp.format("%Y%m%d-%H%M%S%.3f")
    ));
    canvas.save(&path)?;
    tracing::info!(
        path = %path.display(),
        objects = set.detections.len(),
        "capture saved"
    );
    Ok(path)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn outline(canvas: &mut RgbaImage, b: &BoundingBox) {
    let (w, h) = canvas.dimensions();
    if w == 0 || h == 0 {
        return;
    }
    let clamp = |v: f32, max: u32| (v.max(0.0) as u32).min(max - 1);
    let (left, right) = (clamp(b.left, w), clamp(b.right, w));
    let (top, bottom) = (clamp(b.top, h), clamp(b.bottom, h));

    for s in 0..STROKE {
        for x in left..=right {
            put(canvas, x, top + s);
            put(canvas, x, bottom.saturating_sub(s));
        }
        for y in top..=bottom {
            put(canvas, left + s, y);
            put(canvas, right.saturating_sub(s), y);
        }
    }
}

fn put(canvas: &mut RgbaImage, x: u32, y: u32) {
    if x < canvas.width() && y < canvas.height() {
        canvas.put_pixel(x, y, OUTLINE);
    }
}
