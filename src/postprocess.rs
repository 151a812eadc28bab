//! Normalization of raw engine output.
//!
//! PaddleOCR-style engines answer in different shapes depending on the call
//! convention and version:
//!
//! - line lists: `[[ [[x, y], ...], ["text", 0.98] ], ...]` per page,
//!   wrapped in a page array, `null` for an empty page;
//! - named arrays: `{"rec_texts": [...], "rec_scores": [...], "rec_polys": [...]}`
//!   per page, optionally under `"res"`, with `dt_polys` or `rec_boxes`
//!   standing in for `rec_polys`;
//! - records: `[{"text": ..., "confidence": ..., "polygon": ...}, ...]`.
//!
//! Everything past this module only sees [`Detection`]s.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::engine::EngineError;
use crate::geometry::{BoundingPolygon, Point};

/// One recognized text block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub polygon: BoundingPolygon,
    pub text: String,
    /// `None` when the engine reported no score for the block.
    pub confidence: Option<f32>,
}

/// Detections per page, in page order.
pub fn normalize(raw: &Value) -> Result<Vec<Vec<Detection>>, EngineError> {
    match raw {
        Value::Null => Ok(Vec::new()),
        Value::Object(map) => Ok(vec![named_page(map)?]),
        Value::Array(items) => {
            let Some(first) = items.iter().find(|v| !v.is_null()) else {
                return Ok(items.iter().map(|_| Vec::new()).collect());
            };

            // A single page that was not wrapped in a page array.
            if is_line(first) {
                return Ok(vec![line_page(items)]);
            }
            if is_record(first) {
                return Ok(vec![record_page(items)]);
            }

            items.iter().map(page).collect()
        }
        other => Err(unrecognized(other)),
    }
}

/// Detections of the first page; empty when the engine found nothing.
pub fn first_page(raw: &Value) -> Result<Vec<Detection>, EngineError> {
    Ok(normalize(raw)?.into_iter().next().unwrap_or_default())
}

fn page(value: &Value) -> Result<Vec<Detection>, EngineError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Object(map) => named_page(map),
        Value::Array(items) => match items.iter().find(|v| !v.is_null()) {
            None => Ok(Vec::new()),
            Some(first) if is_line(first) => Ok(line_page(items)),
            Some(first) if is_record(first) => Ok(record_page(items)),
            Some(other) => Err(unrecognized(other)),
        },
        other => Err(unrecognized(other)),
    }
}

fn unrecognized(value: &Value) -> EngineError {
    let mut shown = value.to_string();
    if shown.len() > 120 {
        let cut = (0..=120).rev().find(|&i| shown.is_char_boundary(i)).unwrap_or(0);
        shown.truncate(cut);
        shown.push_str("...");
    }
    EngineError::UnrecognizedOutput(shown)
}

fn is_line(value: &Value) -> bool {
    match value.as_array().map(Vec::as_slice) {
        Some([poly, rec, ..]) => {
            parse_points(poly).is_some()
                && rec.as_array().and_then(|r| r.first()).is_some_and(Value::is_string)
        }
        _ => false,
    }
}

fn is_record(value: &Value) -> bool {
    value.as_object().is_some_and(|m| m.contains_key("text"))
}

fn line_page(lines: &[Value]) -> Vec<Detection> {
    lines
        .iter()
        .enumerate()
        .filter_map(|(idx, line)| {
            let det = parse_line(line);
            if det.is_none() && !line.is_null() {
                tracing::warn!(idx, "skipping malformed engine line");
            }
            det
        })
        .collect()
}

fn parse_line(line: &Value) -> Option<Detection> {
    let [poly, rec, ..] = line.as_array()?.as_slice() else {
        return None;
    };
    let polygon = parse_points(poly)?;
    let (text, confidence) = match rec.as_array()?.as_slice() {
        [text, score, ..] => (text.as_str()?, Some(score.as_f64()?)),
        [text] => (text.as_str()?, None),
        [] => return None,
    };

    Some(Detection {
        polygon,
        text: text.to_string(),
        confidence: confidence.map(|c| c as f32),
    })
}

fn record_page(records: &[Value]) -> Vec<Detection> {
    records
        .iter()
        .enumerate()
        .filter_map(|(idx, rec)| {
            let det = parse_record(rec);
            if det.is_none() {
                tracing::warn!(idx, "skipping malformed engine record");
            }
            det
        })
        .collect()
}

fn parse_record(record: &Value) -> Option<Detection> {
    let map = record.as_object()?;
    let text = map.get("text")?.as_str()?;
    let confidence = ["confidence", "score"]
        .iter()
        .find_map(|k| map.get(*k))
        .and_then(Value::as_f64);
    let polygon = ["polygon", "points", "box"]
        .iter()
        .find_map(|k| map.get(*k))
        .and_then(|v| parse_points(v).or_else(|| parse_rect(v)))?;

    Some(Detection {
        polygon,
        text: text.to_string(),
        confidence: confidence.map(|c| c as f32),
    })
}

fn named_page(map: &Map<String, Value>) -> Result<Vec<Detection>, EngineError> {
    if let Some(Value::Object(inner)) = map.get("res") {
        return named_page(inner);
    }

    let texts = map
        .get("rec_texts")
        .and_then(Value::as_array)
        .ok_or_else(|| EngineError::UnrecognizedOutput("object without rec_texts".into()))?;
    let scores = map.get("rec_scores").and_then(Value::as_array);

    let polygons: Vec<Option<BoundingPolygon>> = if let Some(polys) = ["rec_polys", "dt_polys"]
        .iter()
        .find_map(|k| map.get(*k).and_then(Value::as_array))
    {
        polys.iter().map(parse_points).collect()
    } else if let Some(boxes) = map.get("rec_boxes").and_then(Value::as_array) {
        boxes.iter().map(parse_rect).collect()
    } else {
        return Err(EngineError::UnrecognizedOutput(
            "rec_texts without rec_polys, dt_polys or rec_boxes".into(),
        ));
    };

    if polygons.len() != texts.len() {
        tracing::warn!(
            texts = texts.len(),
            polygons = polygons.len(),
            "engine returned mismatched text and polygon counts"
        );
    }

    let mut detections = Vec::with_capacity(texts.len());
    for (idx, (text, polygon)) in texts.iter().zip(polygons).enumerate() {
        let (Some(text), Some(polygon)) = (text.as_str(), polygon) else {
            tracing::warn!(idx, "skipping malformed engine entry");
            continue;
        };
        let confidence = scores
            .and_then(|s| s.get(idx))
            .and_then(Value::as_f64);
        detections.push(Detection {
            polygon,
            text: text.to_string(),
            confidence: confidence.map(|c| c as f32),
        });
    }
    Ok(detections)
}

/// `[[x, y], ...]`
fn parse_points(value: &Value) -> Option<BoundingPolygon> {
    let items = value.as_array()?;
    if items.is_empty() {
        return None;
    }
    items
        .iter()
        .map(|pt| match pt.as_array()?.as_slice() {
            [x, y, ..] => Some(Point::new(x.as_f64()?, y.as_f64()?)),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()
        .map(BoundingPolygon::new)
}

/// `[x1, y1, x2, y2]`
fn parse_rect(value: &Value) -> Option<BoundingPolygon> {
    match value.as_array()?.as_slice() {
        [x1, y1, x2, y2] => Some(BoundingPolygon::from_rect(
            x1.as_f64()?,
            y1.as_f64()?,
            x2.as_f64()?,
            y2.as_f64()?,
        )),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn quad() -> Value {
        json!([[0, 0], [100, 0], [100, 20], [0, 20]])
    }

    fn expected() -> Vec<Detection> {
        vec![Detection {
            polygon: BoundingPolygon::from_rect(0.0, 0.0, 100.0, 20.0),
            text: "Factura".to_string(),
            confidence: Some(0.5),
        }]
    }

    #[test]
    fn test_line_list_pages() {
        let raw = json!([[[quad(), ["Factura", 0.5]]]]);
        assert_eq!(normalize(&raw).unwrap(), vec![expected()]);
    }

    #[test]
    fn test_bare_line_list() {
        let raw = json!([[quad(), ["Factura", 0.5]]]);
        assert_eq!(normalize(&raw).unwrap(), vec![expected()]);
    }

    #[test]
    fn test_null_page_is_empty() {
        assert_eq!(normalize(&json!([null])).unwrap(), vec![Vec::<Detection>::new()]);
        assert!(first_page(&json!([null])).unwrap().is_empty());
        assert!(first_page(&Value::Null).unwrap().is_empty());
        assert!(first_page(&json!([])).unwrap().is_empty());
    }

    #[test]
    fn test_named_arrays_match_line_list() {
        let line_list = json!([[[quad(), ["Factura", 0.5]]]]);
        let named = json!([{
            "res": {
                "rec_texts": ["Factura"],
                "rec_scores": [0.5],
                "rec_polys": [quad()],
            }
        }]);
        assert_eq!(normalize(&named).unwrap(), normalize(&line_list).unwrap());
    }

    #[test]
    fn test_named_arrays_with_rect_boxes() {
        let raw = json!({
            "rec_texts": ["Factura"],
            "rec_scores": [0.5],
            "rec_boxes": [[0, 0, 100, 20]],
        });
        assert_eq!(first_page(&raw).unwrap(), expected());
    }

    #[test]
    fn test_named_arrays_need_polygons() {
        let raw = json!({"rec_texts": ["a"], "rec_scores": [1.0]});
        assert!(matches!(normalize(&raw), Err(EngineError::UnrecognizedOutput(_))));
    }

    #[test]
    fn test_missing_scores_stay_unknown() {
        let raw = json!({"rec_texts": ["Factura"], "rec_polys": [quad()]});
        assert_eq!(first_page(&raw).unwrap()[0].confidence, None);

        let raw = json!([[[quad(), ["Factura"]]]]);
        assert_eq!(first_page(&raw).unwrap()[0].confidence, None);

        let raw = json!([{"text": "Factura", "polygon": quad()}]);
        assert_eq!(first_page(&raw).unwrap()[0].confidence, None);
    }

    #[test]
    fn test_records() {
        let raw = json!([{"text": "Factura", "score": 0.5, "polygon": quad()}]);
        assert_eq!(first_page(&raw).unwrap(), expected());
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let raw = json!([[
            [quad(), ["Factura", 0.5]],
            [[[0, 0]], [42, 0.9]],
            "garbage",
        ]]);
        assert_eq!(first_page(&raw).unwrap(), expected());
    }

    #[test]
    fn test_short_polygons_are_kept() {
        let raw = json!([[[[[1, 2]], ["x", 0.7]]]]);
        let page = first_page(&raw).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].polygon.len(), 1);
    }

    #[test]
    fn test_unrecognized_shapes() {
        assert!(matches!(normalize(&json!("text")), Err(EngineError::UnrecognizedOutput(_))));
        assert!(matches!(normalize(&json!([[1, 2, 3]])), Err(EngineError::UnrecognizedOutput(_))));
    }
}
