use crate::dispatch::{DEFAULT_CHUNK_SIZE, DispatchConfig};
use crate::domain::{ParserResult, PredictError};
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_predictor() -> String {
    "tabular".to_string()
}

fn default_max_processors() -> usize {
    std::thread::available_parallelism()
        .map(|count| count.get())
        .unwrap_or(1)
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

/// Scalars consumed by the engine: provider and uncertainty selection plus
/// dispatch sizing. Loaded from an external configuration source and
/// validated on the way in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionSettings {
    #[serde(default = "default_predictor")]
    pub predictor: String,
    /// Name of the uncertainty table to chain first; empty selects none.
    #[serde(default)]
    pub uncertainty_type: String,
    #[serde(default = "default_max_processors")]
    pub max_processors: usize,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl PredictionSettings {
    pub fn from_json_file(path: &Path) -> ParserResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| {
            PredictError::io_system(
                "IO.SETTINGS_READ",
                format!("failed to read settings '{}': {}", path.display(), source),
            )
        })?;
        let settings: Self = serde_json::from_str(&text).map_err(|source| {
            PredictError::input_validation(
                "INPUT.SETTINGS_PARSE",
                format!("failed to parse settings '{}': {}", path.display(), source),
            )
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> ParserResult<()> {
        if self.predictor.trim().is_empty() {
            return Err(PredictError::input_validation(
                "INPUT.SETTINGS_PREDICTOR",
                "predictor selection must not be empty",
            ));
        }
        if self.max_processors == 0 {
            return Err(PredictError::input_validation(
                "INPUT.SETTINGS_PROCESSORS",
                "max_processors must be at least 1",
            ));
        }
        if self.chunk_size == 0 {
            return Err(PredictError::input_validation(
                "INPUT.SETTINGS_CHUNK",
                "chunk_size must be at least 1",
            ));
        }
        Ok(())
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig::new(self.max_processors, self.chunk_size)
    }
}

impl Default for PredictionSettings {
    fn default() -> Self {
        Self {
            predictor: default_predictor(),
            uncertainty_type: String::new(),
            max_processors: default_max_processors(),
            chunk_size: default_chunk_size(),
        }
    }
}
