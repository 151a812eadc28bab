use serde::{Deserialize, Serialize};

/// A point in image pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned extent of a polygon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// Geometry that cannot be measured.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("polygon needs at least {needed} points, got {got}")]
    TooFewPoints { needed: usize, got: usize },

    #[error("polygon has a non-finite coordinate")]
    NonFinite,
}

/// Detected text region, in the engine's detection order
/// (usually top-left, top-right, bottom-right, bottom-left).
///
/// Construction never validates: degenerate and short polygons are legal
/// and are handled by the measuring methods.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoundingPolygon(Vec<Point>);

impl BoundingPolygon {
    pub fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    pub fn points(&self) -> &[Point] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Axis-aligned extent of all points.
    pub fn extent(&self) -> Result<Extent, GeometryError> {
        let first = self.0.first().ok_or(GeometryError::TooFewPoints {
            needed: 1,
            got: 0,
        })?;

        let mut ext = Extent {
            min_x: first.x,
            min_y: first.y,
            max_x: first.x,
            max_y: first.y,
        };
        for p in &self.0 {
            if !p.x.is_finite() || !p.y.is_finite() {
                return Err(GeometryError::NonFinite);
            }
            ext.min_x = ext.min_x.min(p.x);
            ext.min_y = ext.min_y.min(p.y);
            ext.max_x = ext.max_x.max(p.x);
            ext.max_y = ext.max_y.max(p.y);
        }
        Ok(ext)
    }

    /// Direction of the first edge in degrees, folded into [0, 180).
    pub fn top_edge_angle(&self) -> Result<f64, GeometryError> {
        let (p0, p1) = match self.0.as_slice() {
            [p0, p1, ..] => (p0, p1),
            pts => {
                return Err(GeometryError::TooFewPoints {
                    needed: 2,
                    got: pts.len(),
                })
            }
        };

        let angle = (p1.y - p0.y).atan2(p1.x - p0.x).to_degrees().abs();
        if !angle.is_finite() {
            return Err(GeometryError::NonFinite);
        }
        // atan2 yields exactly 180 for a leftward edge; fold it onto 0
        Ok(if angle >= 180.0 { angle - 180.0 } else { angle })
    }

    /// `[[x, y], ...]` as engines and JSON clients expect it.
    pub fn to_pairs(&self) -> Vec<[f64; 2]> {
        self.0.iter().map(|p| [p.x, p.y]).collect()
    }

    /// Builds the quad of an axis-aligned `[x1, y1, x2, y2]` box.
    pub fn from_rect(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self(vec![
            Point::new(x1, y1),
            Point::new(x2, y1),
            Point::new(x2, y2),
            Point::new(x1, y2),
        ])
    }
}

impl From<Vec<Point>> for BoundingPolygon {
    fn from(points: Vec<Point>) -> Self {
        Self(points)
    }
}

impl FromIterator<Point> for BoundingPolygon {
    fn from_iter<I: IntoIterator<Item = Point>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Maps polygons detected on a rescaled image back onto the original one.
///
/// `ratio_w`/`ratio_h` are `original / resized` per axis. Coordinates are
/// clamped to the original image bounds.
pub fn map_polygons_to_original<'a, I>(
    polygons: I,
    ratio_w: f64,
    ratio_h: f64,
    ori_w: u32,
    ori_h: u32,
) where
    I: IntoIterator<Item = &'a mut BoundingPolygon>,
{
    let (max_x, max_y) = (ori_w as f64, ori_h as f64);
    for poly in polygons {
        for p in poly.0.iter_mut() {
            p.x = (p.x * ratio_w).clamp(0.0, max_x);
            p.y = (p.y * ratio_h).clamp(0.0, max_y);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poly(pts: &[(f64, f64)]) -> BoundingPolygon {
        pts.iter().copied().map(Point::from).collect()
    }

    #[test]
    fn test_extent_covers_all_points() {
        let p = poly(&[(0.0, 0.0), (70.0, 70.0), (40.0, 100.0), (-30.0, 30.0)]);
        let ext = p.extent().unwrap();
        assert_eq!(ext.width(), 100.0);
        assert_eq!(ext.height(), 100.0);
    }

    #[test]
    fn test_extent_rejects_nan() {
        let p = poly(&[(0.0, 0.0), (f64::NAN, 1.0)]);
        assert_eq!(p.extent(), Err(GeometryError::NonFinite));
    }

    #[test]
    fn test_top_edge_angle_folds_leftward_edge() {
        let p = poly(&[(100.0, 0.0), (0.0, 0.0), (0.0, 20.0), (100.0, 20.0)]);
        assert_eq!(p.top_edge_angle().unwrap(), 0.0);

        let p = poly(&[(0.0, 0.0), (10.0, -10.0)]);
        assert!((p.top_edge_angle().unwrap() - 45.0).abs() < 1e-9);
    }

    #[test]
    fn test_top_edge_angle_needs_two_points() {
        let p = poly(&[(1.0, 1.0)]);
        assert_eq!(
            p.top_edge_angle(),
            Err(GeometryError::TooFewPoints { needed: 2, got: 1 })
        );
    }

    #[test]
    fn test_map_polygons_scales_and_clamps() {
        let mut polys = vec![poly(&[(10.0, 10.0), (600.0, 10.0), (600.0, 50.0), (-5.0, 50.0)])];
        map_polygons_to_original(&mut polys, 2.0, 2.0, 1000, 500);
        assert_eq!(
            polys[0].to_pairs(),
            vec![[20.0, 20.0], [1000.0, 20.0], [1000.0, 100.0], [0.0, 100.0]]
        );
    }
}
