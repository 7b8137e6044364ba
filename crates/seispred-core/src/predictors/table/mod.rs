mod model;
mod parser;

pub use model::{RAY_PATH_SEGMENTS, RaySolution, TravelTimeModel, synthesize_ray_path};
pub use parser::{PhaseTable, TravelTimeTableFile, read_table_file, validate_table_file};

use crate::domain::{
    AttributeFamily, AttributeSet, FAMILY_COUNT, GeoAttribute, GeoVector, LookupIndexes,
    LookupKind, NA_VALUE, PredictError, PredictResult, PredictionResult, Receiver, RequestRecord,
    SeismicPhase,
};
use crate::geodesy;
use crate::lookup::{AttributeIndex, IndexKey};
use crate::predictors::{PathCorrectionProvider, Predictor};
use crate::uncertainty::UncertaintyChain;
use std::path::Path;
use std::sync::Arc;

const DERIVATIVE_STEP_DEG: f64 = 0.01;

/// Per-call scratch geometry, memoized across attribute families within a
/// single prediction. Kept stack-local so the predictor instance itself
/// carries no cross-call mutable state.
struct WorkingGeometry {
    distance_deg: f64,
    azimuth_rad: Option<f64>,
    back_azimuth_rad: Option<f64>,
}

impl WorkingGeometry {
    fn compute(source: &GeoVector, receiver: &GeoVector) -> Self {
        Self {
            distance_deg: geodesy::angular_distance(source, receiver).to_degrees(),
            azimuth_rad: geodesy::azimuth(source, receiver),
            back_azimuth_rad: geodesy::back_azimuth(source, receiver),
        }
    }
}

/// Reference provider backed by a 1-D travel-time table model, with optional
/// path corrections and a model-uncertainty chain.
pub struct TablePredictor {
    model: Arc<TravelTimeModel>,
    corrections: Option<Arc<dyn PathCorrectionProvider>>,
    uncertainty: UncertaintyChain,
    correction_in_derivatives: [bool; FAMILY_COUNT],
}

impl TablePredictor {
    pub fn new(model: Arc<TravelTimeModel>) -> Self {
        Self {
            model,
            corrections: None,
            uncertainty: UncertaintyChain::default(),
            correction_in_derivatives: [false; FAMILY_COUNT],
        }
    }

    pub fn load(path: &Path) -> PredictResult<Self> {
        let file = read_table_file(path)?;
        Ok(Self::new(Arc::new(TravelTimeModel::from_file(file))))
    }

    pub fn with_corrections(mut self, corrections: Arc<dyn PathCorrectionProvider>) -> Self {
        self.corrections = Some(corrections);
        self
    }

    pub fn with_uncertainty(mut self, uncertainty: UncertaintyChain) -> Self {
        self.uncertainty = uncertainty;
        self
    }

    /// Fold the family's path correction into its derivative attributes as
    /// well as the base value.
    pub fn with_correction_in_derivatives(mut self, family: AttributeFamily, enabled: bool) -> Self {
        self.correction_in_derivatives[family.ordinal()] = enabled;
        self
    }

    pub fn uncertainty_chain(&self) -> &UncertaintyChain {
        &self.uncertainty
    }

    fn base_attributes() -> AttributeSet {
        AttributeSet::of(&[
            GeoAttribute::TravelTime,
            GeoAttribute::DttDlat,
            GeoAttribute::DttDlon,
            GeoAttribute::DttDr,
            GeoAttribute::Azimuth,
            GeoAttribute::DazDlat,
            GeoAttribute::DazDlon,
            GeoAttribute::DazDr,
            GeoAttribute::Slowness,
            GeoAttribute::DshDlat,
            GeoAttribute::DshDlon,
            GeoAttribute::DshDr,
            GeoAttribute::Backazimuth,
            GeoAttribute::Distance,
            GeoAttribute::TurningDepth,
        ])
    }

    fn resolve_lookup_indexes(&self, request: &mut RequestRecord) -> PredictResult<()> {
        if request.lookup_populated() {
            return Ok(());
        }
        let value_slot = self
            .model
            .phase_slot(request.phase)
            .map(|slot| slot as i32)
            .unwrap_or(LookupIndexes::UNSET);
        let correction_slot = self
            .corrections
            .as_ref()
            .map(|provider| provider.lookup_index(&request.receiver, request.phase))
            .unwrap_or(LookupIndexes::UNSET);
        let uncertainty_slot = self
            .uncertainty
            .first_lookup_index(&request.receiver, request.phase);

        let mut indexes = LookupIndexes::unset();
        for family in AttributeFamily::ALL {
            indexes.set(family, LookupKind::Value, value_slot);
            indexes.set(family, LookupKind::PathCorrection, correction_slot);
            indexes.set(family, LookupKind::Uncertainty, uncertainty_slot);
        }
        request.set_lookup_indexes(indexes)
    }

    /// Path correction for an attribute through the request's cached index,
    /// or `NA_VALUE` when no correction is resolved.
    fn correction_value(&self, request: &RequestRecord, attribute: GeoAttribute) -> f64 {
        let Some(provider) = self.corrections.as_ref() else {
            return NA_VALUE;
        };
        let Some(family) = attribute.family() else {
            return NA_VALUE;
        };
        let index = request
            .lookup_indexes()
            .get(family, LookupKind::PathCorrection);
        provider.correction_by_index(index, attribute)
    }

    fn fold_correction(&self, base: f64, correction: f64) -> f64 {
        if correction == NA_VALUE { base } else { base + correction }
    }

    fn assemble(
        &self,
        request: &RequestRecord,
        geometry: &WorkingGeometry,
        solution: &RaySolution,
    ) -> PredictionResult {
        let requested = request.requested;
        let mut result = PredictionResult::new(
            request.observation_id,
            solution.ray_type,
            self.model.model_name(),
            self.predictor_name(),
        );

        self.assemble_travel_time(request, geometry, solution, requested, &mut result);
        self.assemble_azimuth(request, geometry, requested, &mut result);
        self.assemble_slowness(request, geometry, solution, requested, &mut result);

        if requested.contains(GeoAttribute::Backazimuth)
            && let Some(back_azimuth) = geometry.back_azimuth_rad
        {
            result.set_value(GeoAttribute::Backazimuth, back_azimuth);
        }
        if requested.contains(GeoAttribute::Distance) {
            result.set_value(GeoAttribute::Distance, geometry.distance_deg);
        }
        if requested.contains(GeoAttribute::TurningDepth) {
            result.set_value(GeoAttribute::TurningDepth, solution.turning_depth_km);
        }

        for attribute in [
            GeoAttribute::TtModelUncertainty,
            GeoAttribute::AzimuthModelUncertainty,
            GeoAttribute::SlownessModelUncertainty,
        ] {
            if requested.contains(attribute) {
                let value = self.uncertainty.uncertainty(request, attribute);
                if value != NA_VALUE {
                    result.set_value(attribute, value);
                }
            }
        }

        result.ray_path =
            synthesize_ray_path(&request.source.position, &request.receiver.position, solution.turning_depth_km);
        result
    }

    fn assemble_travel_time(
        &self,
        request: &RequestRecord,
        geometry: &WorkingGeometry,
        solution: &RaySolution,
        requested: AttributeSet,
        result: &mut PredictionResult,
    ) {
        let correction = self.correction_value(request, GeoAttribute::TtPathCorrection);
        if requested.contains(GeoAttribute::TravelTime) {
            result.set_value(
                GeoAttribute::TravelTime,
                self.fold_correction(solution.travel_time, correction),
            );
        }
        if requested.contains(GeoAttribute::TtPathCorrection) && correction != NA_VALUE {
            result.set_value(GeoAttribute::TtPathCorrection, correction);
        }

        let wants_horizontal = requested.contains(GeoAttribute::DttDlat)
            || requested.contains(GeoAttribute::DttDlon);
        if wants_horizontal && let Some(azimuth) = geometry.azimuth_rad {
            let mut slowness = solution.slowness_s_per_deg;
            if self.correction_in_derivatives[AttributeFamily::TravelTime.ordinal()] {
                let slowness_correction =
                    self.correction_value(request, GeoAttribute::SlownessPathCorrection);
                slowness = self.fold_correction(slowness, slowness_correction);
            }
            // Horizontal gradient of travel time at the source: moving the
            // source along the ray azimuth shortens the path.
            let slowness_s_per_rad = slowness.to_degrees();
            if requested.contains(GeoAttribute::DttDlat) {
                result.set_value(GeoAttribute::DttDlat, -slowness_s_per_rad * azimuth.cos());
            }
            if requested.contains(GeoAttribute::DttDlon) {
                let lat_rad = request.source.position.lat_deg.to_radians();
                result.set_value(
                    GeoAttribute::DttDlon,
                    -slowness_s_per_rad * azimuth.sin() * lat_rad.cos(),
                );
            }
        }
        if requested.contains(GeoAttribute::DttDr) {
            // Radius grows upward, depth downward.
            result.set_value(GeoAttribute::DttDr, -solution.dtt_ddepth_s_per_km);
        }
    }

    fn assemble_azimuth(
        &self,
        request: &RequestRecord,
        geometry: &WorkingGeometry,
        requested: AttributeSet,
        result: &mut PredictionResult,
    ) {
        let Some(azimuth) = geometry.azimuth_rad else {
            return;
        };
        let correction = self.correction_value(request, GeoAttribute::AzimuthPathCorrection);
        if requested.contains(GeoAttribute::Azimuth) {
            let corrected = self.fold_correction(azimuth, correction);
            result.set_value(GeoAttribute::Azimuth, geodesy::wrap_azimuth(corrected));
        }
        if requested.contains(GeoAttribute::AzimuthPathCorrection) && correction != NA_VALUE {
            result.set_value(GeoAttribute::AzimuthPathCorrection, correction);
        }

        let wants_horizontal = requested.contains(GeoAttribute::DazDlat)
            || requested.contains(GeoAttribute::DazDlon);
        if wants_horizontal {
            let source = request.source.position;
            let receiver = request.receiver.position;
            if requested.contains(GeoAttribute::DazDlat) {
                let shifted =
                    GeoVector::new(source.lat_deg + DERIVATIVE_STEP_DEG, source.lon_deg, source.depth_km);
                if let Some(perturbed) = geodesy::azimuth(&shifted, &receiver) {
                    let delta = wrap_signed(perturbed - azimuth);
                    result.set_value(
                        GeoAttribute::DazDlat,
                        delta / DERIVATIVE_STEP_DEG.to_radians(),
                    );
                }
            }
            if requested.contains(GeoAttribute::DazDlon) {
                let shifted =
                    GeoVector::new(source.lat_deg, source.lon_deg + DERIVATIVE_STEP_DEG, source.depth_km);
                if let Some(perturbed) = geodesy::azimuth(&shifted, &receiver) {
                    let delta = wrap_signed(perturbed - azimuth);
                    result.set_value(
                        GeoAttribute::DazDlon,
                        delta / DERIVATIVE_STEP_DEG.to_radians(),
                    );
                }
            }
        }
        if requested.contains(GeoAttribute::DazDr) {
            // Receiver-to-source bearing does not change with event depth.
            result.set_value(GeoAttribute::DazDr, 0.0);
        }
    }

    fn assemble_slowness(
        &self,
        request: &RequestRecord,
        geometry: &WorkingGeometry,
        solution: &RaySolution,
        requested: AttributeSet,
        result: &mut PredictionResult,
    ) {
        let correction = self.correction_value(request, GeoAttribute::SlownessPathCorrection);
        if requested.contains(GeoAttribute::Slowness) {
            result.set_value(
                GeoAttribute::Slowness,
                self.fold_correction(solution.slowness_s_per_deg, correction),
            );
        }
        if requested.contains(GeoAttribute::SlownessPathCorrection) && correction != NA_VALUE {
            result.set_value(GeoAttribute::SlownessPathCorrection, correction);
        }

        let wants_horizontal = requested.contains(GeoAttribute::DshDlat)
            || requested.contains(GeoAttribute::DshDlon);
        let wants_radial = requested.contains(GeoAttribute::DshDr);
        if !wants_horizontal && !wants_radial {
            return;
        }

        let phase = request.phase;
        let depth = request.source.position.depth_km;
        let distance = geometry.distance_deg;

        if wants_horizontal && let Some(azimuth) = geometry.azimuth_rad {
            let lower = self.model.solve(phase, distance - DERIVATIVE_STEP_DEG, depth);
            let upper = self.model.solve(phase, distance + DERIVATIVE_STEP_DEG, depth);
            if let (Some(lower), Some(upper)) = (lower, upper) {
                let dsh_ddistance = (upper.slowness_s_per_deg - lower.slowness_s_per_deg)
                    / (2.0 * DERIVATIVE_STEP_DEG);
                let dsh_ddistance_rad = dsh_ddistance.to_degrees();
                if requested.contains(GeoAttribute::DshDlat) {
                    result.set_value(GeoAttribute::DshDlat, -dsh_ddistance_rad * azimuth.cos());
                }
                if requested.contains(GeoAttribute::DshDlon) {
                    let lat_rad = request.source.position.lat_deg.to_radians();
                    result.set_value(
                        GeoAttribute::DshDlon,
                        -dsh_ddistance_rad * azimuth.sin() * lat_rad.cos(),
                    );
                }
            }
        }
        if wants_radial {
            let step_km = 1.0;
            let shallow = self.model.solve(phase, distance, (depth - step_km).max(0.0));
            let deep = self.model.solve(phase, distance, depth + step_km);
            if let (Some(shallow), Some(deep)) = (shallow, deep) {
                let dsh_ddepth =
                    (deep.slowness_s_per_deg - shallow.slowness_s_per_deg) / (2.0 * step_km);
                result.set_value(GeoAttribute::DshDr, -dsh_ddepth);
            }
        }
    }
}

/// Wrap an angle difference into (-pi, pi].
fn wrap_signed(delta: f64) -> f64 {
    let wrapped = geodesy::wrap_azimuth(delta);
    if wrapped > std::f64::consts::PI {
        wrapped - std::f64::consts::TAU
    } else {
        wrapped
    }
}

impl Predictor for TablePredictor {
    fn predictor_name(&self) -> &str {
        "tabular"
    }

    fn model_name(&self) -> &str {
        self.model.model_name()
    }

    fn is_supported(
        &self,
        receiver: &Receiver,
        phase: SeismicPhase,
        attribute: GeoAttribute,
        epoch_time: f64,
    ) -> bool {
        if !receiver.is_valid_at(epoch_time) || !self.model.supports_phase(phase) {
            return false;
        }
        if attribute.is_uncertainty() {
            return self.uncertainty.is_supported(receiver, phase, attribute);
        }
        if attribute.is_path_correction() {
            return self
                .corrections
                .as_ref()
                .is_some_and(|provider| provider.is_supported(receiver, phase, attribute));
        }
        Self::base_attributes().contains(attribute)
    }

    fn supported_attributes(&self) -> AttributeSet {
        let mut attributes = Self::base_attributes();
        if self.corrections.is_some() {
            attributes.insert(GeoAttribute::TtPathCorrection);
            attributes.insert(GeoAttribute::AzimuthPathCorrection);
            attributes.insert(GeoAttribute::SlownessPathCorrection);
        }
        if !self.uncertainty.is_empty() {
            attributes.insert(GeoAttribute::TtModelUncertainty);
            attributes.insert(GeoAttribute::AzimuthModelUncertainty);
            attributes.insert(GeoAttribute::SlownessModelUncertainty);
        }
        attributes
    }

    fn claimed_observations(&self) -> AttributeIndex {
        let mut claims = AttributeIndex::new();
        let mut phases: Vec<_> = self.model.phases().collect();
        phases.sort_by_key(|phase| phase.ordinal());
        for phase in phases {
            claims.add_entry(vec![IndexKey::Phase(phase)]);
        }
        if let Some(provider) = self.corrections.as_ref() {
            for tuple in provider.claimed_observations().entries() {
                claims.add_entry(tuple.to_vec());
            }
        }
        for tuple in self.uncertainty.claimed_observations() {
            claims.add_entry(tuple);
        }
        claims
    }

    fn predict(&mut self, request: &mut RequestRecord) -> PredictResult<PredictionResult> {
        self.resolve_lookup_indexes(request)?;

        if !request
            .receiver
            .is_valid_at(request.source.origin_time)
        {
            return Err(PredictError::computation(
                "RUN.RECEIVER_WINDOW",
                format!(
                    "receiver '{}' is not operational at origin time {}",
                    request.receiver.station, request.source.origin_time
                ),
            ));
        }

        let geometry =
            WorkingGeometry::compute(&request.source.position, &request.receiver.position);
        let solution = self
            .model
            .solve(
                request.phase,
                geometry.distance_deg,
                request.source.position.depth_km,
            )
            .ok_or_else(|| {
                PredictError::computation(
                    "RUN.OUTSIDE_MODEL",
                    format!(
                        "phase {} at distance {:.3} deg, depth {:.1} km is outside model '{}'",
                        request.phase,
                        geometry.distance_deg,
                        request.source.position.depth_km,
                        self.model.model_name()
                    ),
                )
            })?;

        Ok(self.assemble(request, &geometry, &solution))
    }

    fn clone_predictor(&self) -> PredictResult<Box<dyn Predictor>> {
        Ok(Box::new(Self {
            model: Arc::clone(&self.model),
            corrections: self.corrections.clone(),
            uncertainty: self.uncertainty.clone(),
            correction_in_derivatives: self.correction_in_derivatives,
        }))
    }
}
