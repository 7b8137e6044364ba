use crate::domain::{ParserResult, PredictError, SeismicPhase};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// On-disk travel-time model: one rectangular distance/depth table per
/// phase, times in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TravelTimeTableFile {
    pub model_name: String,
    pub phases: Vec<PhaseTable>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseTable {
    pub phase: SeismicPhase,
    /// Strictly increasing, degrees.
    pub distances_deg: Vec<f64>,
    /// Strictly increasing, km.
    pub depths_km: Vec<f64>,
    /// Row per depth, column per distance.
    pub travel_times: Vec<Vec<f64>>,
}

pub fn read_table_file(path: &Path) -> ParserResult<TravelTimeTableFile> {
    let text = std::fs::read_to_string(path).map_err(|source| {
        PredictError::io_system(
            "IO.MODEL_READ",
            format!(
                "failed to read travel-time model '{}': {}",
                path.display(),
                source
            ),
        )
    })?;
    let file: TravelTimeTableFile = serde_json::from_str(&text).map_err(|source| {
        PredictError::input_validation(
            "INPUT.MODEL_PARSE",
            format!(
                "failed to parse travel-time model '{}': {}",
                path.display(),
                source
            ),
        )
    })?;
    validate_table_file(&file)?;
    Ok(file)
}

pub fn validate_table_file(file: &TravelTimeTableFile) -> ParserResult<()> {
    if file.model_name.trim().is_empty() {
        return Err(PredictError::input_validation(
            "INPUT.MODEL_NAME",
            "travel-time model name must not be empty",
        ));
    }
    if file.phases.is_empty() {
        return Err(PredictError::input_validation(
            "INPUT.MODEL_PHASES",
            format!("model '{}' defines no phase tables", file.model_name),
        ));
    }
    for table in &file.phases {
        validate_phase_table(&file.model_name, table)?;
    }
    Ok(())
}

fn validate_phase_table(model_name: &str, table: &PhaseTable) -> ParserResult<()> {
    if table.distances_deg.len() < 2 || table.depths_km.len() < 2 {
        return Err(PredictError::input_validation(
            "INPUT.MODEL_GRID",
            format!(
                "model '{}' phase {} needs at least 2 distances and 2 depths",
                model_name, table.phase
            ),
        ));
    }
    ensure_strictly_increasing(model_name, table.phase, "distances_deg", &table.distances_deg)?;
    ensure_strictly_increasing(model_name, table.phase, "depths_km", &table.depths_km)?;

    if table.travel_times.len() != table.depths_km.len() {
        return Err(PredictError::input_validation(
            "INPUT.MODEL_SHAPE",
            format!(
                "model '{}' phase {} has {} travel-time rows for {} depths",
                model_name,
                table.phase,
                table.travel_times.len(),
                table.depths_km.len()
            ),
        ));
    }
    for (row_index, row) in table.travel_times.iter().enumerate() {
        if row.len() != table.distances_deg.len() {
            return Err(PredictError::input_validation(
                "INPUT.MODEL_SHAPE",
                format!(
                    "model '{}' phase {} row {} has {} columns for {} distances",
                    model_name,
                    table.phase,
                    row_index,
                    row.len(),
                    table.distances_deg.len()
                ),
            ));
        }
        for (column_index, value) in row.iter().enumerate() {
            if !value.is_finite() || *value < 0.0 {
                return Err(PredictError::input_validation(
                    "INPUT.MODEL_VALUE",
                    format!(
                        "model '{}' phase {} has invalid travel time {} at row {} column {}",
                        model_name, table.phase, value, row_index, column_index
                    ),
                ));
            }
        }
    }
    Ok(())
}

fn ensure_strictly_increasing(
    model_name: &str,
    phase: SeismicPhase,
    field: &str,
    values: &[f64],
) -> ParserResult<()> {
    for window in values.windows(2) {
        if !window[0].is_finite() || !window[1].is_finite() || window[1] <= window[0] {
            return Err(PredictError::input_validation(
                "INPUT.MODEL_GRID",
                format!(
                    "model '{}' phase {} field '{}' must be finite and strictly increasing",
                    model_name, phase, field
                ),
            ));
        }
    }
    Ok(())
}
