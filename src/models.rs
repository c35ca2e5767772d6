use serde::{ser::SerializeMap, Deserialize, Serialize, Serializer};

use crate::error::ServiceError;
use crate::labels::ClassLabels;

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub image64: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct ModelLinks {
    pub classes: String,
    pub predict: String,
    pub labels: Vec<String>,
}

/// Label → percentage string, serialized as a JSON object in label order.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionScores(Vec<(String, String)>);

impl PredictionScores {
    pub fn new(labels: &ClassLabels, scores: &[f32]) -> Result<Self, ServiceError> {
        if labels.len() != scores.len() {
            return Err(ServiceError::Inference(anyhow::anyhow!(
                "model returned {} scores for {} labels",
                scores.len(),
                labels.len()
            )));
        }

        let entries = labels
            .iter()
            .zip(scores)
            .map(|(label, &score)| (label.to_string(), format_percent(score)))
            .collect();
        Ok(Self(entries))
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| v.as_str())
    }
}

impl Serialize for PredictionScores {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (label, value) in &self.0 {
            map.serialize_entry(label, value)?;
        }
        map.end()
    }
}

fn format_percent(score: f32) -> String {
    format!("{:.2}", f64::from(score) * 100.0)
}

/// Accepts only a strictly positive integer id.
pub fn parse_image_id(raw: Option<&str>) -> Result<i64, ServiceError> {
    let raw = raw
        .filter(|s| !s.is_empty())
        .ok_or(ServiceError::BadRequest("Image id not provided"))?;
    if !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ServiceError::BadRequest("Image id must be a positive integer"));
    }

    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ServiceError::BadRequest("Image id must be a positive integer")),
    }
}
