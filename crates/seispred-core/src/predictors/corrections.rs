use crate::domain::{
    AttributeFamily, GeoAttribute, LookupIndexes, NA_VALUE, ParserResult, PredictError, Receiver,
    RequestRecord, SeismicPhase,
};
use crate::lookup::{AttributeIndex, IndexKey};
use crate::predictors::PathCorrectionProvider;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Additive path corrections for one (receiver, phase) pair, one value per
/// attribute family. `NA_VALUE` marks families without a correction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionRow {
    pub receiver_id: i64,
    pub phase: SeismicPhase,
    pub travel_time: f64,
    pub azimuth: f64,
    pub slowness: f64,
}

impl CorrectionRow {
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

/// Flat-table path-correction provider; row positions double as lookup
/// indexes, matching the uncertainty tables.
pub struct TableCorrections {
    name: String,
    rows: Vec<CorrectionRow>,
    row_index: HashMap<(i64, SeismicPhase), usize>,
    claims: AttributeIndex,
}

impl TableCorrections {
    pub fn new(name: impl Into<String>, rows: Vec<CorrectionRow>) -> Self {
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
                    AttributeFamily::TravelTime => GeoAttribute::TtPathCorrection,
                    AttributeFamily::Azimuth => GeoAttribute::AzimuthPathCorrection,
                    AttributeFamily::Slowness => GeoAttribute::SlownessPathCorrection,
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

    pub fn from_json_file(name: impl Into<String>, path: &Path) -> ParserResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| {
            PredictError::io_system(
                "IO.CORRECTION_TABLE_READ",
                format!(
                    "failed to read correction table '{}': {}",
                    path.display(),
                    source
                ),
            )
        })?;
        let rows: Vec<CorrectionRow> = serde_json::from_str(&text).map_err(|source| {
            PredictError::input_validation(
                "INPUT.CORRECTION_TABLE_PARSE",
                format!(
                    "failed to parse correction table '{}': {}",
                    path.display(),
                    source
                ),
            )
        })?;
        Ok(Self::new(name, rows))
    }
}

impl PathCorrectionProvider for TableCorrections {
    fn correction_name(&self) -> &str {
        &self.name
    }

    fn is_supported(
        &self,
        receiver: &Receiver,
        phase: SeismicPhase,
        attribute: GeoAttribute,
    ) -> bool {
        attribute.is_path_correction()
            && self.claims.is_supported(&[
                IndexKey::Receiver(receiver.receiver_id),
                IndexKey::Phase(phase),
                IndexKey::Attribute(attribute),
            ])
    }

    fn correction(&self, request: &RequestRecord, attribute: GeoAttribute) -> f64 {
        let index = self.lookup_index(&request.receiver, request.phase);
        self.correction_by_index(index, attribute)
    }

    fn correction_by_index(&self, lookup_index: i32, attribute: GeoAttribute) -> f64 {
        if !attribute.is_path_correction() || lookup_index < 0 {
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
