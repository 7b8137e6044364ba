//! Ordered uncertainty fallback chain. The chain borrows its providers and
//! only orders lookups; each provider stays independently owned and
//! configured by its creator.

mod table;

pub use table::{TableUncertainty, UncertaintyRow};

use crate::domain::{
    GeoAttribute, LookupIndexes, LookupKind, NA_VALUE, Receiver, RequestRecord, SeismicPhase,
};
use crate::lookup::IndexKey;
use crate::predictors::UncertaintyProvider;
use std::sync::Arc;

/// Ordered, fixed-size sequence of uncertainty providers. The first provider
/// that declares support for a (receiver, phase, attribute) combination
/// answers the query.
#[derive(Clone, Default)]
pub struct UncertaintyChain {
    providers: Vec<Arc<dyn UncertaintyProvider>>,
}

impl UncertaintyChain {
    pub fn new(providers: Vec<Arc<dyn UncertaintyProvider>>) -> Self {
        Self { providers }
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn is_supported(
        &self,
        receiver: &Receiver,
        phase: SeismicPhase,
        attribute: GeoAttribute,
    ) -> bool {
        self.providers
            .iter()
            .any(|provider| provider.is_supported(receiver, phase, attribute))
    }

    /// Uncertainty for the request, or `NA_VALUE` when no provider covers it.
    ///
    /// When the request carries a resolved uncertainty lookup index for the
    /// attribute's family, the first provider is queried through its flat
    /// table directly. A resolved index on the first provider is not
    /// authoritative for every request, so an NA fast-path answer falls
    /// through to a full scan that starts again from the first provider.
    pub fn uncertainty(&self, request: &RequestRecord, attribute: GeoAttribute) -> f64 {
        let Some(family) = attribute.family() else {
            return NA_VALUE;
        };

        if let Some(first) = self.providers.first()
            && request
                .lookup_indexes()
                .is_resolved(family, LookupKind::Uncertainty)
        {
            let index = request.lookup_indexes().get(family, LookupKind::Uncertainty);
            let value = first.uncertainty_by_index(index, attribute);
            if value != NA_VALUE {
                return value;
            }
        }

        for provider in &self.providers {
            if provider.is_supported(&request.receiver, request.phase, attribute) {
                return provider.uncertainty(request, attribute);
            }
        }

        NA_VALUE
    }

    /// Flat-table index on the first provider for a (receiver, phase) pair,
    /// used to populate request lookup caches.
    pub fn first_lookup_index(&self, receiver: &Receiver, phase: SeismicPhase) -> i32 {
        self.providers
            .first()
            .map(|provider| provider.lookup_index(receiver, phase))
            .unwrap_or(LookupIndexes::UNSET)
    }

    /// Union of every provider's claimed observations, by concatenation in
    /// chain order. Duplicate tuples across providers are preserved so each
    /// provider's slot numbering stays stable.
    pub fn claimed_observations(&self) -> Vec<Vec<IndexKey>> {
        let mut combined = Vec::new();
        for provider in &self.providers {
            for tuple in provider.claimed_observations().entries() {
                combined.push(tuple.to_vec());
            }
        }
        combined
    }
}

#[cfg(test)]
mod tests {
    use super::{TableUncertainty, UncertaintyChain, UncertaintyRow};
    use crate::domain::{
        AttributeSet, GeoAttribute, GeoVector, LookupIndexes, LookupKind, NA_VALUE, Receiver,
        RequestRecord, SeismicPhase, Source,
    };
    use std::sync::Arc;

    fn receiver(id: i64) -> Receiver {
        Receiver::new(id, format!("ST{id:02}"), GeoVector::new(40.0, 70.0, 0.0), 0.0, 1.0e10)
    }

    fn request_for(receiver_id: i64, phase: SeismicPhase) -> RequestRecord {
        RequestRecord::new(
            Source::new(1, 1, GeoVector::new(20.0, 60.0, 15.0), 0.0),
            receiver(receiver_id),
            phase,
            AttributeSet::of(&[GeoAttribute::TtModelUncertainty]),
            true,
        )
        .with_observation_id(1)
    }

    fn provider(name: &str, rows: Vec<UncertaintyRow>) -> Arc<TableUncertainty> {
        Arc::new(TableUncertainty::new(name, rows))
    }

    #[test]
    fn first_supporting_provider_answers() {
        let first = provider(
            "first",
            vec![UncertaintyRow::new(1, SeismicPhase::Pn, 1.1, NA_VALUE, NA_VALUE)],
        );
        let second = provider(
            "second",
            vec![UncertaintyRow::new(1, SeismicPhase::Pn, 9.9, NA_VALUE, NA_VALUE)],
        );
        let chain = UncertaintyChain::new(vec![first, second]);

        let request = request_for(1, SeismicPhase::Pn);
        assert_eq!(
            chain.uncertainty(&request, GeoAttribute::TtModelUncertainty),
            1.1
        );
    }

    #[test]
    fn fallback_reaches_later_providers() {
        let first = provider(
            "first",
            vec![UncertaintyRow::new(2, SeismicPhase::Sn, 0.5, NA_VALUE, NA_VALUE)],
        );
        let second = provider(
            "second",
            vec![UncertaintyRow::new(1, SeismicPhase::Pn, 2.25, NA_VALUE, NA_VALUE)],
        );
        let chain = UncertaintyChain::new(vec![first, second]);

        let request = request_for(1, SeismicPhase::Pn);
        assert!(chain.is_supported(
            &request.receiver,
            SeismicPhase::Pn,
            GeoAttribute::TtModelUncertainty
        ));
        assert_eq!(
            chain.uncertainty(&request, GeoAttribute::TtModelUncertainty),
            2.25
        );
    }

    #[test]
    fn unsupported_combinations_return_na_without_raising() {
        let first = provider(
            "first",
            vec![UncertaintyRow::new(2, SeismicPhase::Sn, 0.5, NA_VALUE, NA_VALUE)],
        );
        let chain = UncertaintyChain::new(vec![first]);

        let request = request_for(1, SeismicPhase::Pn);
        assert!(!chain.is_supported(
            &request.receiver,
            SeismicPhase::Pn,
            GeoAttribute::TtModelUncertainty
        ));
        assert_eq!(
            chain.uncertainty(&request, GeoAttribute::TtModelUncertainty),
            NA_VALUE
        );
    }

    #[test]
    fn resolved_fast_path_short_circuits_on_the_first_provider() {
        let first = provider(
            "first",
            vec![
                UncertaintyRow::new(9, SeismicPhase::Lg, 7.0, NA_VALUE, NA_VALUE),
                UncertaintyRow::new(1, SeismicPhase::Pn, 3.5, NA_VALUE, NA_VALUE),
            ],
        );
        let chain = UncertaintyChain::new(vec![first]);

        let mut request = request_for(1, SeismicPhase::Pn);
        let mut indexes = LookupIndexes::unset();
        let resolved = chain.first_lookup_index(&request.receiver, request.phase);
        assert_eq!(resolved, 1);
        indexes.set(
            crate::domain::AttributeFamily::TravelTime,
            LookupKind::Uncertainty,
            resolved,
        );
        request
            .set_lookup_indexes(indexes)
            .expect("lookup indexes should populate");

        assert_eq!(
            chain.uncertainty(&request, GeoAttribute::TtModelUncertainty),
            3.5
        );
    }

    #[test]
    fn na_fast_path_still_scans_remaining_providers() {
        // The first provider covers (1, Pn) for travel time only; its table
        // answers NA for azimuth uncertainty even though the index resolves.
        let first = provider(
            "first",
            vec![UncertaintyRow::new(1, SeismicPhase::Pn, 1.0, NA_VALUE, NA_VALUE)],
        );
        let second = provider(
            "second",
            vec![UncertaintyRow::new(1, SeismicPhase::Pn, NA_VALUE, 0.125, NA_VALUE)],
        );
        let chain = UncertaintyChain::new(vec![first, second]);

        let mut request = request_for(1, SeismicPhase::Pn);
        let mut indexes = LookupIndexes::unset();
        indexes.set(
            crate::domain::AttributeFamily::Azimuth,
            LookupKind::Uncertainty,
            chain.first_lookup_index(&request.receiver, request.phase),
        );
        request
            .set_lookup_indexes(indexes)
            .expect("lookup indexes should populate");

        assert_eq!(
            chain.uncertainty(&request, GeoAttribute::AzimuthModelUncertainty),
            0.125
        );
    }

    #[test]
    fn claimed_observations_concatenate_without_dedup() {
        let shared_row = UncertaintyRow::new(1, SeismicPhase::Pn, 1.0, NA_VALUE, NA_VALUE);
        let first = provider("first", vec![shared_row.clone()]);
        let second = provider("second", vec![shared_row]);
        let chain = UncertaintyChain::new(vec![first, second]);

        let combined = chain.claimed_observations();
        assert_eq!(combined.len(), 2);
        assert_eq!(combined[0], combined[1]);
    }

    #[test]
    fn family_free_attributes_are_never_supported() {
        let first = provider(
            "first",
            vec![UncertaintyRow::new(1, SeismicPhase::Pn, 1.0, 2.0, 3.0)],
        );
        let chain = UncertaintyChain::new(vec![first]);

        let request = request_for(1, SeismicPhase::Pn);
        assert_eq!(chain.uncertainty(&request, GeoAttribute::Distance), NA_VALUE);
    }
}
