use super::parser::{PhaseTable, TravelTimeTableFile};
use crate::domain::{GeoVector, RayType, SeismicPhase};
use crate::geodesy;
use std::collections::HashMap;

/// Number of great-circle segments in a synthesized ray path.
pub const RAY_PATH_SEGMENTS: usize = 20;

const MAX_TURNING_DEPTH_KM: f64 = 660.0;
const DIFFRACTION_DISTANCE_DEG: f64 = 98.0;

/// The base-model answer for one (phase, distance, depth) evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaySolution {
    pub travel_time: f64,
    pub slowness_s_per_deg: f64,
    pub dtt_ddepth_s_per_km: f64,
    pub ray_type: RayType,
    pub turning_depth_km: f64,
}

/// In-memory 1-D travel-time model: rectangular distance/depth tables with
/// bilinear interpolation, one table per phase.
#[derive(Debug, Clone)]
pub struct TravelTimeModel {
    model_name: String,
    tables: Vec<PhaseTable>,
    phase_slots: HashMap<SeismicPhase, usize>,
}

impl TravelTimeModel {
    pub fn from_file(file: TravelTimeTableFile) -> Self {
        let mut phase_slots = HashMap::new();
        for (slot, table) in file.phases.iter().enumerate() {
            phase_slots.entry(table.phase).or_insert(slot);
        }
        Self {
            model_name: file.model_name,
            tables: file.phases,
            phase_slots,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn supports_phase(&self, phase: SeismicPhase) -> bool {
        self.phase_slots.contains_key(&phase)
    }

    /// Table slot for a phase, usable as a flat-table lookup index.
    pub fn phase_slot(&self, phase: SeismicPhase) -> Option<usize> {
        self.phase_slots.get(&phase).copied()
    }

    pub fn phases(&self) -> impl Iterator<Item = SeismicPhase> + '_ {
        self.phase_slots.keys().copied()
    }

    /// Interpolated travel time in seconds, or None outside the table hull.
    pub fn travel_time(
        &self,
        phase: SeismicPhase,
        distance_deg: f64,
        depth_km: f64,
    ) -> Option<f64> {
        let table = &self.tables[self.phase_slot(phase)?];
        bilinear(table, distance_deg, depth_km)
    }

    /// Full base-model evaluation: time, horizontal slowness, radial
    /// derivative and ray classification.
    pub fn solve(
        &self,
        phase: SeismicPhase,
        distance_deg: f64,
        depth_km: f64,
    ) -> Option<RaySolution> {
        let table = &self.tables[self.phase_slot(phase)?];
        let travel_time = bilinear(table, distance_deg, depth_km)?;

        let distance_step = grid_step(&table.distances_deg);
        let lower_distance = (distance_deg - distance_step).max(table.distances_deg[0]);
        let upper_distance =
            (distance_deg + distance_step).min(*table.distances_deg.last().expect("validated"));
        let slowness_s_per_deg = match (
            bilinear(table, lower_distance, depth_km),
            bilinear(table, upper_distance, depth_km),
        ) {
            (Some(lower), Some(upper)) if upper_distance > lower_distance => {
                (upper - lower) / (upper_distance - lower_distance)
            }
            _ => return None,
        };

        let depth_step = grid_step(&table.depths_km);
        let lower_depth = (depth_km - depth_step).max(table.depths_km[0]);
        let upper_depth = (depth_km + depth_step).min(*table.depths_km.last().expect("validated"));
        let dtt_ddepth_s_per_km = match (
            bilinear(table, distance_deg, lower_depth),
            bilinear(table, distance_deg, upper_depth),
        ) {
            (Some(shallow), Some(deep)) if upper_depth > lower_depth => {
                (deep - shallow) / (upper_depth - lower_depth)
            }
            _ => return None,
        };

        Some(RaySolution {
            travel_time,
            slowness_s_per_deg,
            dtt_ddepth_s_per_km,
            ray_type: classify_ray(phase, distance_deg),
            turning_depth_km: turning_depth(distance_deg, depth_km),
        })
    }
}

fn classify_ray(phase: SeismicPhase, distance_deg: f64) -> RayType {
    match phase {
        SeismicPhase::PcP => RayType::Reflection,
        SeismicPhase::P | SeismicPhase::S if distance_deg >= DIFFRACTION_DISTANCE_DEG => {
            RayType::Diffraction
        }
        _ => RayType::Refraction,
    }
}

fn turning_depth(distance_deg: f64, source_depth_km: f64) -> f64 {
    (source_depth_km + distance_deg * 4.0).min(MAX_TURNING_DEPTH_KM)
}

fn grid_step(values: &[f64]) -> f64 {
    let span = values.last().expect("validated") - values[0];
    (span / (values.len() as f64 - 1.0) / 4.0).max(1.0e-3)
}

fn bilinear(table: &PhaseTable, distance_deg: f64, depth_km: f64) -> Option<f64> {
    let (column, column_fraction) = bracket(&table.distances_deg, distance_deg)?;
    let (row, row_fraction) = bracket(&table.depths_km, depth_km)?;

    let t00 = table.travel_times[row][column];
    let t01 = table.travel_times[row][column + 1];
    let t10 = table.travel_times[row + 1][column];
    let t11 = table.travel_times[row + 1][column + 1];

    let shallow = t00 + column_fraction * (t01 - t00);
    let deep = t10 + column_fraction * (t11 - t10);
    Some(shallow + row_fraction * (deep - shallow))
}

/// Bracketing interval and interior fraction for a strictly increasing grid.
fn bracket(grid: &[f64], value: f64) -> Option<(usize, f64)> {
    let first = grid[0];
    let last = *grid.last().expect("validated");
    if value < first || value > last {
        return None;
    }
    let upper = grid.partition_point(|edge| *edge < value).max(1);
    let index = (upper - 1).min(grid.len() - 2);
    let fraction = (value - grid[index]) / (grid[index + 1] - grid[index]);
    Some((index, fraction))
}

/// Synthesize a great-circle ray path from source to receiver with a
/// quadratic depth profile reaching the turning depth at mid path.
pub fn synthesize_ray_path(
    source: &GeoVector,
    receiver: &GeoVector,
    turning_depth_km: f64,
) -> Vec<GeoVector> {
    let mut path = Vec::with_capacity(RAY_PATH_SEGMENTS + 1);
    let mean_endpoint_depth = (source.depth_km + receiver.depth_km) / 2.0;
    let bulge = turning_depth_km.max(mean_endpoint_depth) - mean_endpoint_depth;
    for step in 0..=RAY_PATH_SEGMENTS {
        let fraction = step as f64 / RAY_PATH_SEGMENTS as f64;
        let mut point = geodesy::great_circle_point(source, receiver, fraction);
        point.depth_km += 4.0 * fraction * (1.0 - fraction) * bulge;
        path.push(point);
    }
    path
}
