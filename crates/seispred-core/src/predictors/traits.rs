use crate::domain::{
    AttributeSet, GeoAttribute, PredictResult, PredictionResult, Receiver, RequestRecord,
    SeismicPhase,
};
use crate::lookup::AttributeIndex;

/// A physical prediction provider: turns one request into one result.
///
/// Evaluation mutates per-call state, so a single instance is never
/// evaluated from two workers at once; a caller that wants to run requests
/// on several workers obtains an independent copy per worker via
/// [`Predictor::clone_predictor`].
pub trait Predictor: Send + Sync {
    fn predictor_name(&self) -> &str;

    fn model_name(&self) -> &str;

    /// Whether this provider claims the given combination, with the
    /// receiver's validity window checked against `epoch_time`.
    fn is_supported(
        &self,
        receiver: &Receiver,
        phase: SeismicPhase,
        attribute: GeoAttribute,
        epoch_time: f64,
    ) -> bool;

    fn supported_attributes(&self) -> AttributeSet;

    /// The (receiver, phase, attribute) combinations this provider declares
    /// it will answer, independent of generic phase-based routing.
    fn claimed_observations(&self) -> AttributeIndex;

    /// Evaluate one request. Computation failures surface as errors here;
    /// batch entry points convert them to error-ray results instead of
    /// propagating.
    fn predict(&mut self, request: &mut RequestRecord) -> PredictResult<PredictionResult>;

    /// An independently configured copy suitable for another worker.
    fn clone_predictor(&self) -> PredictResult<Box<dyn Predictor>>;

    /// Evaluate one request, converting every failure mode into data.
    ///
    /// Non-defining requests short-circuit to an invalid-ray result without
    /// touching the physical model. Errors from [`Predictor::predict`] become
    /// error-ray results carrying the rendered error as their message. This
    /// never fails and is the per-request building block of every batch path.
    fn predict_contained(&mut self, request: &mut RequestRecord) -> PredictionResult {
        if !request.defining {
            return PredictionResult::invalid(
                request.observation_id,
                self.model_name(),
                self.predictor_name(),
            );
        }

        let observation_id = request.observation_id;
        match self.predict(request) {
            Ok(result) => result,
            Err(error) => PredictionResult::error(
                observation_id,
                self.model_name(),
                self.predictor_name(),
                error.to_string(),
            ),
        }
    }

    /// Sequential batch evaluation: one result per request, in input order.
    /// Concurrent batch evaluation lives in the dispatcher, which applies
    /// the same containment per chunk.
    fn predict_batch(&mut self, requests: &mut [RequestRecord]) -> Vec<PredictionResult> {
        requests
            .iter_mut()
            .map(|request| self.predict_contained(request))
            .collect()
    }
}

/// Source of model-uncertainty values for predicted attributes.
///
/// Implementations are shared read-only across workers; the chain only
/// orders lookups and never takes ownership.
pub trait UncertaintyProvider: Send + Sync {
    fn uncertainty_name(&self) -> &str;

    fn is_supported(
        &self,
        receiver: &Receiver,
        phase: SeismicPhase,
        attribute: GeoAttribute,
    ) -> bool;

    /// Uncertainty for the request's combination, or `NA_VALUE` when this
    /// provider does not cover it.
    fn uncertainty(&self, request: &RequestRecord, attribute: GeoAttribute) -> f64;

    /// Fast-path lookup against a previously resolved flat-table index.
    fn uncertainty_by_index(&self, lookup_index: i32, attribute: GeoAttribute) -> f64;

    /// Resolve the flat-table index for a (receiver, phase) pair, or
    /// [`crate::domain::LookupIndexes::UNSET`] when uncovered.
    fn lookup_index(&self, receiver: &Receiver, phase: SeismicPhase) -> i32;

    fn claimed_observations(&self) -> &AttributeIndex;
}

/// Source of additive path corrections applied on top of base-model values.
pub trait PathCorrectionProvider: Send + Sync {
    fn correction_name(&self) -> &str;

    fn is_supported(
        &self,
        receiver: &Receiver,
        phase: SeismicPhase,
        attribute: GeoAttribute,
    ) -> bool;

    /// Correction for the request's combination, or `NA_VALUE` when this
    /// provider does not cover it.
    fn correction(&self, request: &RequestRecord, attribute: GeoAttribute) -> f64;

    /// Fast-path lookup against a previously resolved flat-table index.
    fn correction_by_index(&self, lookup_index: i32, attribute: GeoAttribute) -> f64;

    /// Resolve the flat-table index for a (receiver, phase) pair, or
    /// [`crate::domain::LookupIndexes::UNSET`] when uncovered.
    fn lookup_index(&self, receiver: &Receiver, phase: SeismicPhase) -> i32;

    fn claimed_observations(&self) -> &AttributeIndex;
}
