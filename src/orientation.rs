//! Text-orientation classification of detected regions.
//!
//! Every detected block is labelled horizontal, vertical or rotated from the
//! shape of its bounding polygon alone, and a page's labels are tallied so a
//! response can flag pages that carry vertical or rotated text.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::{BoundingPolygon, GeometryError};

/// Layout direction of a text block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Horizontal,
    Vertical,
    Rotated,
}

impl Orientation {
    pub const ALL: [Orientation; 3] = [
        Orientation::Horizontal,
        Orientation::Vertical,
        Orientation::Rotated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Horizontal => "horizontal",
            Orientation::Vertical => "vertical",
            Orientation::Rotated => "rotated",
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decision thresholds of the classifier.
///
/// The defaults were tuned by hand against scanned documents; treat them as
/// starting points and validate against real detections before relying on
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrientationThresholds {
    /// `height / width` above which a box is vertical whatever its angle.
    pub strong_vertical_ratio: f64,
    /// Lower bound (exclusive) of the top-edge angle, in degrees, for rotated text.
    pub rotated_min_angle: f64,
    /// Upper bound (exclusive) of the top-edge angle, in degrees, for rotated text.
    pub rotated_max_angle: f64,
    /// `height / width` above which an unrotated box is vertical.
    pub vertical_ratio: f64,
}

impl Default for OrientationThresholds {
    fn default() -> Self {
        Self {
            strong_vertical_ratio: 2.5,
            rotated_min_angle: 25.0,
            rotated_max_angle: 155.0,
            vertical_ratio: 1.8,
        }
    }
}

impl OrientationThresholds {
    /// Classifies one polygon. Never fails: unmeasurable geometry is
    /// reported as horizontal.
    pub fn classify(&self, polygon: &BoundingPolygon) -> Orientation {
        match self.try_classify(polygon) {
            Ok(orientation) => orientation,
            Err(err) => {
                tracing::debug!(%err, points = polygon.len(), "falling back to horizontal");
                Orientation::Horizontal
            }
        }
    }

    fn try_classify(&self, polygon: &BoundingPolygon) -> Result<Orientation, GeometryError> {
        // Angle first so that short polygons fail before the width check.
        let angle = polygon.top_edge_angle()?;
        let extent = polygon.extent()?;

        let width = extent.width();
        if width <= 0.0 {
            return Ok(Orientation::Vertical);
        }
        let aspect_ratio = extent.height() / width;

        // Elongation outranks a measured angle: small angles are mostly scan skew.
        if aspect_ratio > self.strong_vertical_ratio {
            Ok(Orientation::Vertical)
        } else if angle > self.rotated_min_angle && angle < self.rotated_max_angle {
            Ok(Orientation::Rotated)
        } else if aspect_ratio > self.vertical_ratio {
            Ok(Orientation::Vertical)
        } else {
            Ok(Orientation::Horizontal)
        }
    }

    /// Tallies the orientation of every polygon on a page.
    pub fn aggregate<'a, I>(&self, polygons: I) -> OrientationTally
    where
        I: IntoIterator<Item = &'a BoundingPolygon>,
    {
        polygons.into_iter().map(|p| self.classify(p)).collect()
    }
}

/// Classifies with the default thresholds.
pub fn classify(polygon: &BoundingPolygon) -> Orientation {
    OrientationThresholds::default().classify(polygon)
}

/// Aggregates with the default thresholds.
pub fn aggregate<'a, I>(polygons: I) -> OrientationTally
where
    I: IntoIterator<Item = &'a BoundingPolygon>,
{
    OrientationThresholds::default().aggregate(polygons)
}

/// Per-orientation block counts for one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrientationTally {
    pub horizontal: usize,
    pub vertical: usize,
    pub rotated: usize,
}

impl OrientationTally {
    pub fn record(&mut self, orientation: Orientation) {
        *self.slot(orientation) += 1;
    }

    pub fn get(&self, orientation: Orientation) -> usize {
        match orientation {
            Orientation::Horizontal => self.horizontal,
            Orientation::Vertical => self.vertical,
            Orientation::Rotated => self.rotated,
        }
    }

    pub fn total(&self) -> usize {
        self.horizontal + self.vertical + self.rotated
    }

    pub fn has_vertical(&self) -> bool {
        self.vertical > 0
    }

    pub fn has_rotated(&self) -> bool {
        self.rotated > 0
    }

    fn slot(&mut self, orientation: Orientation) -> &mut usize {
        match orientation {
            Orientation::Horizontal => &mut self.horizontal,
            Orientation::Vertical => &mut self.vertical,
            Orientation::Rotated => &mut self.rotated,
        }
    }
}

impl Extend<Orientation> for OrientationTally {
    fn extend<I: IntoIterator<Item = Orientation>>(&mut self, iter: I) {
        for orientation in iter {
            self.record(orientation);
        }
    }
}

impl FromIterator<Orientation> for OrientationTally {
    fn from_iter<I: IntoIterator<Item = Orientation>>(iter: I) -> Self {
        let mut tally = Self::default();
        tally.extend(iter);
        tally
    }
}
