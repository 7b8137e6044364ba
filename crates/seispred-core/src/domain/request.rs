use serde::{Deserialize, Serialize};

use super::{
    AttributeFamily, AttributeSet, FAMILY_COUNT, PredictError, PredictResult, Receiver,
    SeismicPhase, Source, UNSET_ID,
};

/// Which flavor of flat-table lookup a cached index refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LookupKind {
    Value,
    PathCorrection,
    Uncertainty,
}

pub const LOOKUP_KIND_COUNT: usize = 3;

impl LookupKind {
    pub const ALL: [LookupKind; LOOKUP_KIND_COUNT] =
        [Self::Value, Self::PathCorrection, Self::Uncertainty];

    pub const fn ordinal(self) -> usize {
        self as usize
    }
}

/// The nine per-request lookup-index caches: one per attribute family and
/// lookup kind. Providers that back attributes with flat tables resolve
/// these once and reuse them on every later query for the same request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupIndexes {
    slots: [[i32; LOOKUP_KIND_COUNT]; FAMILY_COUNT],
}

impl LookupIndexes {
    pub const UNSET: i32 = -1;

    pub const fn unset() -> Self {
        Self {
            slots: [[Self::UNSET; LOOKUP_KIND_COUNT]; FAMILY_COUNT],
        }
    }

    pub fn get(&self, family: AttributeFamily, kind: LookupKind) -> i32 {
        self.slots[family.ordinal()][kind.ordinal()]
    }

    pub fn set(&mut self, family: AttributeFamily, kind: LookupKind, index: i32) {
        self.slots[family.ordinal()][kind.ordinal()] = index;
    }

    pub fn is_resolved(&self, family: AttributeFamily, kind: LookupKind) -> bool {
        self.get(family, kind) != Self::UNSET
    }
}

impl Default for LookupIndexes {
    fn default() -> Self {
        Self::unset()
    }
}

/// One prediction request: a source, a receiver, a phase and the set of
/// attributes the caller wants computed.
///
/// A record is processed by exactly one worker at a time; the dispatcher
/// partitions batches instead of sharing them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub observation_id: i64,
    pub source: Source,
    pub receiver: Receiver,
    pub phase: SeismicPhase,
    pub requested: AttributeSet,
    pub defining: bool,
    #[serde(default)]
    lookup: LookupIndexes,
    #[serde(default)]
    lookup_populated: bool,
}

impl RequestRecord {
    pub fn new(
        source: Source,
        receiver: Receiver,
        phase: SeismicPhase,
        requested: AttributeSet,
        defining: bool,
    ) -> Self {
        Self {
            observation_id: UNSET_ID,
            source,
            receiver,
            phase,
            requested,
            defining,
            lookup: LookupIndexes::unset(),
            lookup_populated: false,
        }
    }

    pub fn with_observation_id(mut self, observation_id: i64) -> Self {
        self.observation_id = observation_id;
        self
    }

    pub fn lookup_indexes(&self) -> &LookupIndexes {
        &self.lookup
    }

    pub fn lookup_populated(&self) -> bool {
        self.lookup_populated
    }

    /// Install the provider-resolved lookup indexes. The caches are written
    /// exactly once per owning provider; a second population attempt is a
    /// provider bug and is rejected.
    pub fn set_lookup_indexes(&mut self, indexes: LookupIndexes) -> PredictResult<()> {
        if self.lookup_populated {
            return Err(PredictError::internal(
                "REQUEST.LOOKUP_REPOPULATED",
                format!(
                    "lookup indexes for observation {} were already populated",
                    self.observation_id
                ),
            ));
        }
        self.lookup = indexes;
        self.lookup_populated = true;
        Ok(())
    }

    /// Clear the caches when the record is handed to a different provider.
    /// The indexes are provider-specific and must be re-resolved.
    pub fn reset_lookup_indexes(&mut self) {
        self.lookup = LookupIndexes::unset();
        self.lookup_populated = false;
    }
}

#[cfg(test)]
mod tests {
    use super::{LookupIndexes, LookupKind, RequestRecord};
    use crate::domain::{
        AttributeFamily, AttributeSet, GeoAttribute, GeoVector, PredictErrorCategory, Receiver,
        SeismicPhase, Source, UNSET_ID,
    };

    fn sample_request() -> RequestRecord {
        RequestRecord::new(
            Source::new(1, 1, GeoVector::new(10.0, 20.0, 30.0), 1.0e9),
            Receiver::new(7, "MKAR", GeoVector::new(46.79, 82.29, 0.0), 0.0, 2.0e9),
            SeismicPhase::Pn,
            AttributeSet::of(&[GeoAttribute::TravelTime]),
            true,
        )
    }

    #[test]
    fn new_record_has_unresolved_caches_and_unset_id() {
        let request = sample_request();
        assert_eq!(request.observation_id, UNSET_ID);
        assert!(!request.lookup_populated());
        for family in AttributeFamily::ALL {
            for kind in LookupKind::ALL {
                assert!(!request.lookup_indexes().is_resolved(family, kind));
                assert_eq!(
                    request.lookup_indexes().get(family, kind),
                    LookupIndexes::UNSET
                );
            }
        }
    }

    #[test]
    fn lookup_indexes_populate_exactly_once() {
        let mut request = sample_request().with_observation_id(42);

        let mut indexes = LookupIndexes::unset();
        indexes.set(AttributeFamily::TravelTime, LookupKind::PathCorrection, 5);
        request
            .set_lookup_indexes(indexes)
            .expect("first population should succeed");

        assert!(request.lookup_populated());
        assert_eq!(
            request
                .lookup_indexes()
                .get(AttributeFamily::TravelTime, LookupKind::PathCorrection),
            5
        );

        let error = request
            .set_lookup_indexes(LookupIndexes::unset())
            .expect_err("second population should be rejected");
        assert_eq!(error.category(), PredictErrorCategory::Internal);
        assert_eq!(error.code(), "REQUEST.LOOKUP_REPOPULATED");
    }

    #[test]
    fn provider_reassignment_resets_caches_for_repopulation() {
        let mut request = sample_request();
        let mut indexes = LookupIndexes::unset();
        indexes.set(AttributeFamily::Azimuth, LookupKind::Uncertainty, 3);
        request
            .set_lookup_indexes(indexes)
            .expect("population should succeed");

        request.reset_lookup_indexes();
        assert!(!request.lookup_populated());

        request
            .set_lookup_indexes(LookupIndexes::unset())
            .expect("repopulation after reset should succeed");
    }
}
