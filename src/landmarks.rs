//! Hand landmark input: 21 (x, y, z) points from an external hand tracker.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GestureError, Result};

pub const LANDMARK_COUNT: usize = 21;
pub const LANDMARK_FEATURE_LEN: usize = LANDMARK_COUNT * 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LandmarkPoint {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

/// Ordered set of exactly [`LANDMARK_COUNT`] points.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    points: Vec<LandmarkPoint>,
}

impl LandmarkSet {
    pub fn new(points: Vec<LandmarkPoint>) -> Result<Self> {
        if points.len() != LANDMARK_COUNT {
            return Err(GestureError::InvalidLandmarks(format!(
                "expected {LANDMARK_COUNT} points, got {}",
                points.len()
            )));
        }
        if let Some(idx) = points
            .iter()
            .position(|p| !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()))
        {
            return Err(GestureError::InvalidLandmarks(format!(
                "point {idx} has a non-finite coordinate"
            )));
        }
        Ok(Self { points })
    }

    /// Parse landmarks from JSON.
    ///
    /// Accepts a bare array or an object wrapping it under `landmarks` or
    /// `points`. Each point is either `{"x":..,"y":..,"z":..}` or
    /// `[x, y]` / `[x, y, z]`; a missing or null `z` becomes 0.0.
    pub fn from_json(value: &Value) -> Result<Self> {
        let list = match value {
            Value::Array(items) => items,
            Value::Object(map) => match map.get("landmarks").or_else(|| map.get("points")) {
                Some(Value::Array(items)) => items,
                _ => {
                    return Err(GestureError::InvalidLandmarks(
                        "expected a `landmarks` array".to_string(),
                    ));
                }
            },
            _ => {
                return Err(GestureError::InvalidLandmarks(
                    "expected an array of points".to_string(),
                ));
            }
        };

        let points = list
            .iter()
            .enumerate()
            .map(|(idx, item)| parse_point(idx, item))
            .collect::<Result<Vec<_>>>()?;
        Self::new(points)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| GestureError::InvalidLandmarks(format!("not valid JSON: {e}")))?;
        Self::from_json(&value)
    }

    pub fn points(&self) -> &[LandmarkPoint] {
        &self.points
    }

    /// Compact `[x, y, z]` triples, the on-disk record format.
    pub fn to_triples(&self) -> Vec<[f32; 3]> {
        self.points.iter().map(|p| [p.x, p.y, p.z]).collect()
    }
}

fn parse_point(idx: usize, item: &Value) -> Result<LandmarkPoint> {
    match item {
        Value::Object(map) => Ok(LandmarkPoint {
            x: required_coord(idx, "x", map.get("x"))?,
            y: required_coord(idx, "y", map.get("y"))?,
            z: optional_coord(idx, "z", map.get("z"))?,
        }),
        Value::Array(coords) if coords.len() == 2 || coords.len() == 3 => Ok(LandmarkPoint {
            x: required_coord(idx, "x", coords.first())?,
            y: required_coord(idx, "y", coords.get(1))?,
            z: optional_coord(idx, "z", coords.get(2))?,
        }),
        Value::Array(coords) => Err(GestureError::InvalidLandmarks(format!(
            "point {idx} has {} coordinates, expected 2 or 3",
            coords.len()
        ))),
        _ => Err(GestureError::InvalidLandmarks(format!(
            "point {idx} is neither an object nor an array"
        ))),
    }
}

fn required_coord(idx: usize, axis: &str, value: Option<&Value>) -> Result<f32> {
    match value {
        None | Some(Value::Null) => Err(GestureError::InvalidLandmarks(format!(
            "point {idx} is missing `{axis}`"
        ))),
        Some(v) => numeric(idx, axis, v),
    }
}

fn optional_coord(idx: usize, axis: &str, value: Option<&Value>) -> Result<f32> {
    match value {
        None | Some(Value::Null) => Ok(0.0),
        Some(v) => numeric(idx, axis, v),
    }
}

fn numeric(idx: usize, axis: &str, value: &Value) -> Result<f32> {
    value
        .as_f64()
        .map(|v| v as f32)
        .filter(|v| v.is_finite())
        .ok_or_else(|| {
            GestureError::InvalidLandmarks(format!("point {idx} has a non-numeric `{axis}`"))
        })
}
