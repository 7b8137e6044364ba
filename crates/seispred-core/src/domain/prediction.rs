use serde::{Deserialize, Serialize};

use super::{ATTRIBUTE_COUNT, GeoAttribute, GeoVector, NA_VALUE, RayType};

/// The computed answer for one request. Attribute values are stored densely
/// by ordinal; kinds that were never requested (or could not be computed)
/// read back as [`NA_VALUE`] rather than being absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub observation_id: i64,
    values: [f64; ATTRIBUTE_COUNT],
    ray_type: RayType,
    error_message: String,
    pub model_name: String,
    pub predictor_name: String,
    /// Geometric ray path from source to receiver, empty when the provider
    /// does not produce one.
    pub ray_path: Vec<GeoVector>,
}

impl PredictionResult {
    pub fn new(
        observation_id: i64,
        ray_type: RayType,
        model_name: impl Into<String>,
        predictor_name: impl Into<String>,
    ) -> Self {
        Self {
            observation_id,
            values: [NA_VALUE; ATTRIBUTE_COUNT],
            ray_type,
            error_message: String::new(),
            model_name: model_name.into(),
            predictor_name: predictor_name.into(),
            ray_path: Vec::new(),
        }
    }

    /// A failed prediction. The message is never allowed to be empty so a
    /// caller inspecting an error ray always has something to report.
    pub fn error(
        observation_id: i64,
        model_name: impl Into<String>,
        predictor_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let mut message = message.into();
        if message.trim().is_empty() {
            message = "unspecified prediction failure".to_string();
        }
        let mut result = Self::new(observation_id, RayType::Error, model_name, predictor_name);
        result.error_message = message;
        result
    }

    /// The designed short-circuit for non-defining requests: invalid ray,
    /// every value NA, no message, physical model untouched.
    pub fn invalid(
        observation_id: i64,
        model_name: impl Into<String>,
        predictor_name: impl Into<String>,
    ) -> Self {
        Self::new(observation_id, RayType::Invalid, model_name, predictor_name)
    }

    pub fn set_value(&mut self, attribute: GeoAttribute, value: f64) {
        self.values[attribute.ordinal()] = value;
    }

    pub fn value(&self, attribute: GeoAttribute) -> f64 {
        self.values[attribute.ordinal()]
    }

    pub fn has_value(&self, attribute: GeoAttribute) -> bool {
        self.values[attribute.ordinal()] != NA_VALUE
    }

    pub fn ray_type(&self) -> RayType {
        self.ray_type
    }

    pub fn is_valid(&self) -> bool {
        self.ray_type.is_valid()
    }

    pub fn error_message(&self) -> &str {
        &self.error_message
    }
}
