use crate::domain::{
    AttributeFamily, GeoAttribute, LookupIndexes, NA_VALUE, ParserResult, PredictError, Receiver,
    RequestRecord, SeismicPhase,
};
use crate::lookup::{AttributeIndex, IndexKey};
use crate::predictors::UncertaintyProvider;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// One flat-table row: per-family model uncertainties for a
/// (receiver, phase) pair. `NA_VALUE` marks families the row does not cover.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UncertaintyRow {
    pub receiver_id: i64,
    pub phase: SeismicPhase,
    pub travel_time: f64,
    pub azimuth: f64,
    pub slowness: f64,
}

impl UncertaintyRow {
    pub fn new(
        receiver_id: i64,
        phase: SeismicPhase,
        travel_time: f64,
        azimuth: f64,
        slowness: f64,
    ) -> Self {
        Self {
            receiver_id,
            phase,
            travel_time,
            azimuth,
            slowness,
        }
    }

    fn value_for_family(&self, family: AttributeFamily) -> f64 {
        match family {
            AttributeFamily::TravelTime => self.travel_time,
            AttributeFamily::Azimuth => self.azimuth,
            AttributeFamily::Slowness => self.slowness,
        }
    }
}

/// Flat-table uncertainty provider. Rows are indexed by (receiver, phase)
/// in insertion order so row positions double as lookup indexes.
#[derive(Debug)]
pub struct TableUncertainty {
    name: String,
    rows: Vec<UncertaintyRow>,
    row_index: HashMap<(i64, SeismicPhase), usize>,
    claims: AttributeIndex,
}

impl TableUncertainty {
    pub fn new(name: impl Into<String>, rows: Vec<UncertaintyRow>) -> Self {
        let mut row_index = HashMap::new();
        let mut claims = AttributeIndex::new();
        for (position, row) in rows.iter().enumerate() {
            row_index
                .entry((row.receiver_id, row.phase))
                .or_insert(position);
            for family in AttributeFamily::ALL {
                if row.value_for_family(family) == NA_VALUE {
                    continue;
                }
                let attribute = match family {
                    AttributeFamily::TravelTime => GeoAttribute::TtModelUncertainty,
                    AttributeFamily::Azimuth => GeoAttribute::AzimuthModelUncertainty,
                    AttributeFamily::Slowness => GeoAttribute::SlownessModelUncertainty,
                };
                claims.add_entry(vec![
                    IndexKey::Receiver(row.receiver_id),
                    IndexKey::Phase(row.phase),
                    IndexKey::Attribute(attribute),
                ]);
            }
        }
        Self {
            name: name.into(),
            rows,
            row_index,
            claims,
        }
    }

    /// Load rows from a JSON array on disk.
    pub fn from_json_file(name: impl Into<String>, path: &Path) -> ParserResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| {
            PredictError::io_system(
                "IO.UNCERTAINTY_TABLE_READ",
                format!(
                    "failed to read uncertainty table '{}': {}",
                    path.display(),
                    source
                ),
            )
        })?;
        let rows: Vec<UncertaintyRow> = serde_json::from_str(&text).map_err(|source| {
            PredictError::input_validation(
                "INPUT.UNCERTAINTY_TABLE_PARSE",
                format!(
                    "failed to parse uncertainty table '{}': {}",
                    path.display(),
                    source
                ),
            )
        })?;
        Ok(Self::new(name, rows))
    }

    fn row_for(&self, receiver_id: i64, phase: SeismicPhase) -> Option<&UncertaintyRow> {
        self.row_index
            .get(&(receiver_id, phase))
            .map(|position| &self.rows[*position])
    }
}

impl UncertaintyProvider for TableUncertainty {
    fn uncertainty_name(&self) -> &str {
        &self.name
    }

    fn is_supported(
        &self,
        receiver: &Receiver,
        phase: SeismicPhase,
        attribute: GeoAttribute,
    ) -> bool {
        attribute.is_uncertainty()
            && self.claims.is_supported(&[
                IndexKey::Receiver(receiver.receiver_id),
                IndexKey::Phase(phase),
                IndexKey::Attribute(attribute),
            ])
    }

    fn uncertainty(&self, request: &RequestRecord, attribute: GeoAttribute) -> f64 {
        if !attribute.is_uncertainty() {
            return NA_VALUE;
        }
        let Some(family) = attribute.family() else {
            return NA_VALUE;
        };
        self.row_for(request.receiver.receiver_id, request.phase)
            .map(|row| row.value_for_family(family))
            .unwrap_or(NA_VALUE)
    }

    fn uncertainty_by_index(&self, lookup_index: i32, attribute: GeoAttribute) -> f64 {
        if !attribute.is_uncertainty() || lookup_index < 0 {
            return NA_VALUE;
        }
        let Some(family) = attribute.family() else {
            return NA_VALUE;
        };
        self.rows
            .get(lookup_index as usize)
            .map(|row| row.value_for_family(family))
            .unwrap_or(NA_VALUE)
    }

    fn lookup_index(&self, receiver: &Receiver, phase: SeismicPhase) -> i32 {
        self.row_index
            .get(&(receiver.receiver_id, phase))
            .map(|position| *position as i32)
            .unwrap_or(LookupIndexes::UNSET)
    }

    fn claimed_observations(&self) -> &AttributeIndex {
        &self.claims
    }
}
