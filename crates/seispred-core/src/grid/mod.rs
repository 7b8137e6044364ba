//! Tomography grid support: a regular lat/lon/depth grid, an optional
//! active-region polygon, and projection of ray paths onto sparse
//! (node index, weight) contributions.

use crate::domain::{EARTH_RADIUS_KM, GeoVector, ParserResult, PredictError};
use crate::geodesy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Regular grid over latitude, longitude and depth. Node indexes are dense,
/// ordered depth-major then latitude then longitude.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TomographyGrid {
    pub grid_name: String,
    pub lat_min_deg: f64,
    pub lat_max_deg: f64,
    pub lat_step_deg: f64,
    pub lon_min_deg: f64,
    pub lon_max_deg: f64,
    pub lon_step_deg: f64,
    pub depth_min_km: f64,
    pub depth_max_km: f64,
    pub depth_step_km: f64,
}

impl TomographyGrid {
    pub fn from_json_file(path: &Path) -> ParserResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| {
            PredictError::io_system(
                "IO.GRID_READ",
                format!("failed to read tomography grid '{}': {}", path.display(), source),
            )
        })?;
        let grid: Self = serde_json::from_str(&text).map_err(|source| {
            PredictError::input_validation(
                "INPUT.GRID_PARSE",
                format!("failed to parse tomography grid '{}': {}", path.display(), source),
            )
        })?;
        grid.validate()?;
        Ok(grid)
    }

    pub fn validate(&self) -> ParserResult<()> {
        let axes = [
            ("lat", self.lat_min_deg, self.lat_max_deg, self.lat_step_deg),
            ("lon", self.lon_min_deg, self.lon_max_deg, self.lon_step_deg),
            ("depth", self.depth_min_km, self.depth_max_km, self.depth_step_km),
        ];
        for (axis, min, max, step) in axes {
            if !min.is_finite() || !max.is_finite() || max <= min {
                return Err(PredictError::input_validation(
                    "INPUT.GRID_AXIS",
                    format!("grid '{}' axis '{}' has invalid range [{min}, {max}]", self.grid_name, axis),
                ));
            }
            if !step.is_finite() || step <= 0.0 {
                return Err(PredictError::input_validation(
                    "INPUT.GRID_AXIS",
                    format!("grid '{}' axis '{}' has invalid step {step}", self.grid_name, axis),
                ));
            }
        }
        Ok(())
    }

    fn axis_bins(min: f64, max: f64, step: f64) -> usize {
        (((max - min) / step).ceil() as usize).max(1)
    }

    pub fn lat_bins(&self) -> usize {
        Self::axis_bins(self.lat_min_deg, self.lat_max_deg, self.lat_step_deg)
    }

    pub fn lon_bins(&self) -> usize {
        Self::axis_bins(self.lon_min_deg, self.lon_max_deg, self.lon_step_deg)
    }

    pub fn depth_bins(&self) -> usize {
        Self::axis_bins(self.depth_min_km, self.depth_max_km, self.depth_step_km)
    }

    pub fn node_count(&self) -> usize {
        self.lat_bins() * self.lon_bins() * self.depth_bins()
    }

    /// Dense node index for a position, or None outside the grid volume.
    pub fn node_index(&self, position: &GeoVector) -> Option<usize> {
        let lat_bin = bin(position.lat_deg, self.lat_min_deg, self.lat_max_deg, self.lat_step_deg, self.lat_bins())?;
        let lon_bin = bin(position.lon_deg, self.lon_min_deg, self.lon_max_deg, self.lon_step_deg, self.lon_bins())?;
        let depth_bin = bin(position.depth_km, self.depth_min_km, self.depth_max_km, self.depth_step_km, self.depth_bins())?;
        Some((depth_bin * self.lat_bins() + lat_bin) * self.lon_bins() + lon_bin)
    }
}

fn bin(value: f64, min: f64, max: f64, step: f64, bins: usize) -> Option<usize> {
    if value < min || value > max {
        return None;
    }
    Some((((value - min) / step) as usize).min(bins - 1))
}

/// Closed lat/lon polygon bounding an active region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveRegion {
    /// Vertices as (lat, lon) degree pairs; the closing edge is implicit.
    pub vertices: Vec<(f64, f64)>,
}

impl ActiveRegion {
    pub fn from_json_file(path: &Path) -> ParserResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| {
            PredictError::io_system(
                "IO.POLYGON_READ",
                format!("failed to read polygon '{}': {}", path.display(), source),
            )
        })?;
        let region: Self = serde_json::from_str(&text).map_err(|source| {
            PredictError::input_validation(
                "INPUT.POLYGON_PARSE",
                format!("failed to parse polygon '{}': {}", path.display(), source),
            )
        })?;
        if region.vertices.len() < 3 {
            return Err(PredictError::input_validation(
                "INPUT.POLYGON_SHAPE",
                format!("polygon '{}' needs at least 3 vertices", path.display()),
            ));
        }
        Ok(region)
    }

    /// Even-odd ray-casting containment in the lat/lon plane.
    pub fn contains(&self, lat_deg: f64, lon_deg: f64) -> bool {
        let mut inside = false;
        let count = self.vertices.len();
        let mut previous = count - 1;
        for current in 0..count {
            let (lat_a, lon_a) = self.vertices[current];
            let (lat_b, lon_b) = self.vertices[previous];
            let crosses = (lat_a > lat_deg) != (lat_b > lat_deg);
            if crosses {
                let intersection = (lon_b - lon_a) * (lat_deg - lat_a) / (lat_b - lat_a) + lon_a;
                if lon_deg < intersection {
                    inside = !inside;
                }
            }
            previous = current;
        }
        inside
    }
}

/// Sparse per-ray grid contribution: parallel node-index and weight arrays.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GridWeights {
    pub node_indexes: Vec<usize>,
    pub weights: Vec<f64>,
}

impl GridWeights {
    pub fn is_empty(&self) -> bool {
        self.node_indexes.is_empty()
    }

    pub fn total_weight(&self) -> f64 {
        self.weights.iter().sum()
    }
}

/// Project a ray path onto the grid. Each segment contributes its length in
/// km to the node containing its midpoint. Segments whose midpoint falls
/// outside the grid, or outside the active region when one is configured,
/// contribute nothing.
pub fn project_ray_path(
    grid: &TomographyGrid,
    region: Option<&ActiveRegion>,
    path: &[GeoVector],
) -> GridWeights {
    let mut accumulated: BTreeMap<usize, f64> = BTreeMap::new();
    for segment in path.windows(2) {
        let start = &segment[0];
        let end = &segment[1];
        let midpoint = geodesy::great_circle_point(start, end, 0.5);

        if let Some(region) = region
            && !region.contains(midpoint.lat_deg, midpoint.lon_deg)
        {
            continue;
        }
        let Some(node) = grid.node_index(&midpoint) else {
            continue;
        };

        let mid_radius = EARTH_RADIUS_KM - midpoint.depth_km;
        let horizontal = geodesy::angular_distance(start, end) * mid_radius;
        let vertical = end.depth_km - start.depth_km;
        let length = (horizontal * horizontal + vertical * vertical).sqrt();
        if length > 0.0 {
            *accumulated.entry(node).or_insert(0.0) += length;
        }
    }

    let mut weights = GridWeights::default();
    for (node, weight) in accumulated {
        weights.node_indexes.push(node);
        weights.weights.push(weight);
    }
    weights
}
