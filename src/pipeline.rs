use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;

use crate::engine::EngineError;
use crate::geometry::map_polygons_to_original;
use crate::orientation::{Orientation, OrientationTally, OrientationThresholds};
use crate::postprocess::{first_page, Detection};
use crate::preprocess::{image_dimensions, plan_resize, prescale};
use crate::registry::EngineRegistry;
use crate::types::{ScalingConfig, Settings};

/// One text block of a page report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockReport {
    pub text: String,
    pub confidence: Option<f32>,
    pub polygon: Vec<[f64; 2]>,
    pub orientation: Orientation,
}

/// Recognized text of one page with its orientation analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageReport {
    pub text: String,
    pub blocks: Vec<BlockReport>,
    pub orientation: OrientationTally,
    pub has_vertical_text: bool,
    pub has_rotated_text: bool,
}

impl PageReport {
    pub fn from_detections(detections: Vec<Detection>, thresholds: &OrientationThresholds) -> Self {
        let blocks: Vec<BlockReport> = detections
            .into_iter()
            .map(|det| BlockReport {
                orientation: thresholds.classify(&det.polygon),
                polygon: det.polygon.to_pairs(),
                text: det.text,
                confidence: det.confidence,
            })
            .collect();

        let tally: OrientationTally = blocks.iter().map(|b| b.orientation).collect();
        let text = blocks
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        Self {
            text,
            blocks,
            has_vertical_text: tally.has_vertical(),
            has_rotated_text: tally.has_rotated(),
            orientation: tally,
        }
    }
}

pub struct PageRun {
    pub report: PageReport,
    pub raw: Value,
    pub tier: String,
    pub elapse: f64,
}

/// Runs one uploaded page through scaling, recognition and classification.
pub struct OcrPipeline {
    registry: Arc<EngineRegistry>,
    scaling: ScalingConfig,
    thresholds: OrientationThresholds,
    text_score: f32,
}

impl OcrPipeline {
    pub fn new(settings: &Settings, registry: Arc<EngineRegistry>) -> Self {
        Self {
            registry,
            scaling: settings.scaling.clone(),
            thresholds: settings.orientation,
            text_score: settings.engine.text_score,
        }
    }

    pub fn registry(&self) -> &EngineRegistry {
        &self.registry
    }

    pub fn thresholds(&self) -> &OrientationThresholds {
        &self.thresholds
    }

    /// `scratch` receives intermediate files and should be removed by the caller.
    pub async fn run(&self, image: &Path, language: &str, scratch: &Path) -> Result<PageRun, EngineError> {
        let active = self.registry.engine(language).await?;

        let is_pdf = image
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));

        let mut input = image.to_path_buf();
        let mut resized = None;
        if !is_pdf {
            let (ori_w, ori_h) = image_dimensions(image)?;
            if let Some(plan) = plan_resize(ori_w, ori_h, &self.scaling) {
                tracing::debug!(ori_w, ori_h, w = plan.width, h = plan.height, "prescaling input");
                let (src, dir) = (image.to_path_buf(), scratch.to_path_buf());
                input = tokio::task::spawn_blocking(move || prescale(&src, &plan, &dir))
                    .await
                    .map_err(|e| EngineError::Image(format!("prescale task failed: {e}")))??;
                resized = Some((plan, ori_w, ori_h));
            }
        }

        let start = Instant::now();
        let raw = active.engine.recognize(&input).await?;
        let elapse = start.elapsed().as_secs_f64();

        let mut detections = first_page(&raw)?;
        if let Some((plan, ori_w, ori_h)) = resized {
            map_polygons_to_original(
                detections.iter_mut().map(|d| &mut d.polygon),
                plan.ratio_w,
                plan.ratio_h,
                ori_w,
                ori_h,
            );
        }

        let detections = self.filter_by_score(detections);
        let report = PageReport::from_detections(detections, &self.thresholds);
        tracing::info!(
            language,
            tier = %active.tier,
            blocks = report.blocks.len(),
            vertical = report.orientation.vertical,
            rotated = report.orientation.rotated,
            elapse,
            "page recognized"
        );

        Ok(PageRun {
            report,
            raw,
            tier: active.tier.clone(),
            elapse,
        })
    }

    /// Blocks without a score are always kept.
    fn filter_by_score(&self, detections: Vec<Detection>) -> Vec<Detection> {
        if self.text_score <= 0.0 {
            return detections;
        }
        detections
            .into_iter()
            .enumerate()
            .filter_map(|(idx, det)| match det.confidence {
                Some(score) if score < self.text_score => {
                    tracing::debug!(idx, score, text = %det.text, "block rejected");
                    None
                }
                _ => Some(det),
            })
            .collect()
    }
}
