use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::{ImageFormat, Rgb, RgbImage};

use crate::engine::EngineError;
use crate::types::ScalingConfig;

/// Side-length bound for an image of the given size.
///
/// Small scans keep a 960 px bound, mid-sized ones 1500 px, anything larger
/// is held to 2000 px.
pub fn target_side_len(width: u32, height: u32) -> u32 {
    let max_wh = width.max(height);
    if max_wh < 960 {
        960
    } else if max_wh < 1500 {
        1500
    } else {
        2000
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizePlan {
    pub width: u32,
    pub height: u32,
    /// original / resized, per axis
    pub ratio_w: f64,
    pub ratio_h: f64,
}

/// Works out whether an image must be rescaled before recognition.
///
/// Returns `None` when the image already fits between `min_side_len` and the
/// effective upper bound. Resized dimensions are multiples of 32.
pub fn plan_resize(width: u32, height: u32, cfg: &ScalingConfig) -> Option<ResizePlan> {
    if !cfg.enabled || width == 0 || height == 0 {
        return None;
    }

    let bound = target_side_len(width, height).min(cfg.max_side_len) as f64;
    let (ori_w, ori_h) = (width as f64, height as f64);
    let (mut w, mut h) = (ori_w, ori_h);
    let mut changed = false;

    if w.max(h) > bound {
        let ratio = bound / w.max(h);
        w = round_to_32(w * ratio);
        h = round_to_32(h * ratio);
        changed = true;
    }

    let min_side_len = cfg.min_side_len as f64;
    if w.min(h) < min_side_len {
        let ratio = min_side_len / w.min(h);
        w = round_to_32(w * ratio);
        h = round_to_32(h * ratio);
        changed = true;
    }

    changed.then(|| ResizePlan {
        width: w as u32,
        height: h as u32,
        ratio_w: ori_w / w,
        ratio_h: ori_h / h,
    })
}

fn round_to_32(v: f64) -> f64 {
    // truncate first, then snap to the nearest multiple of 32
    ((v.trunc() / 32.0).round() * 32.0).max(32.0)
}

/// Rescales `path` according to `plan` and writes the result as PNG into `out_dir`.
pub fn prescale(path: &Path, plan: &ResizePlan, out_dir: &Path) -> Result<PathBuf, EngineError> {
    let img = image::open(path).map_err(|e| EngineError::Image(e.to_string()))?;
    let resized = img.resize_exact(plan.width, plan.height, FilterType::Triangle);

    let out = out_dir.join("prescaled.png");
    resized
        .save_with_format(&out, ImageFormat::Png)
        .map_err(|e| EngineError::Image(e.to_string()))?;
    Ok(out)
}

/// Reads pixel dimensions without decoding the whole image.
pub fn image_dimensions(path: &Path) -> Result<(u32, u32), EngineError> {
    image::image_dimensions(path).map_err(|e| EngineError::Image(e.to_string()))
}

/// Writes the blank white page used to probe an engine.
pub fn write_probe_image(dir: &Path) -> Result<PathBuf, EngineError> {
    let img = RgbImage::from_pixel(100, 50, Rgb([255, 255, 255]));
    let out = dir.join("probe.png");
    img.save_with_format(&out, ImageFormat::Png)
        .map_err(|e| EngineError::Image(e.to_string()))?;
    Ok(out)
}
