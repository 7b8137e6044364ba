//! Distributable task envelope: a serializable sub-batch of requests plus
//! model file references, executed on a remote worker, returning per-request
//! results and sparse tomography grid-weight contributions.

mod cache;

pub use cache::{MAX_LOAD_ATTEMPTS, ModelCache, RETRY_DELAY, process_cache};

use crate::domain::{PredictResult, PredictionResult, RequestRecord};
use crate::grid::{ActiveRegion, GridWeights, TomographyGrid, project_ray_path};
use crate::predictors::table::{TablePredictor, TravelTimeModel};
use crate::predictors::Predictor;
use serde::{Deserialize, Serialize};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Request side of the wire shape: the sub-batch plus file references. Path
/// strings may be empty; an empty tomography path disables weighting and an
/// empty polygon path disables region masking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionTask {
    pub requests: Vec<RequestRecord>,
    pub model_path: String,
    pub tomography_path: String,
    pub polygon_path: String,
}

impl PredictionTask {
    pub fn new(requests: Vec<RequestRecord>, model_path: impl Into<String>) -> Self {
        Self {
            requests,
            model_path: model_path.into(),
            tomography_path: String::new(),
            polygon_path: String::new(),
        }
    }

    pub fn with_tomography(mut self, tomography_path: impl Into<String>) -> Self {
        self.tomography_path = tomography_path.into();
        self
    }

    pub fn with_polygon(mut self, polygon_path: impl Into<String>) -> Self {
        self.polygon_path = polygon_path.into();
        self
    }
}

/// One per-request response record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResultEntry {
    pub result: PredictionResult,
    /// Index of the originating request within the task's sub-batch.
    pub request_index: usize,
    pub computed: bool,
    pub valid: bool,
    pub weights: GridWeights,
}

/// Response side of the wire shape. Always well-formed: failures during
/// setup or evaluation land in `exception`, never as a raised error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub host_name: String,
    pub results: Vec<TaskResultEntry>,
    pub calc_time_millis: i64,
    pub profiler: Option<serde_json::Value>,
    pub exception: Option<String>,
}

impl TaskEnvelope {
    fn empty(host_name: String, exception: Option<String>, calc_time_millis: i64) -> Self {
        Self {
            host_name,
            results: Vec::new(),
            calc_time_millis,
            profiler: None,
            exception,
        }
    }
}

fn host_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}

/// File-path strings arrive from foreign hosts; normalize separators before
/// touching the filesystem.
fn resolve_path(raw: &str) -> PathBuf {
    PathBuf::from(raw.replace('\\', "/"))
}

/// Execute a task against the process-wide model cache. This is the remote
/// worker entry point; it always returns an envelope.
pub fn execute(mut task: PredictionTask) -> TaskEnvelope {
    execute_with_cache(&mut task, process_cache())
}

/// Execute against an explicit cache (tests use private caches to keep the
/// process-wide slot deterministic).
pub fn execute_with_cache(task: &mut PredictionTask, cache: &ModelCache) -> TaskEnvelope {
    let started = Instant::now();
    let host = host_name();

    let outcome = catch_unwind(AssertUnwindSafe(|| run_task(task, cache)));
    let calc_time_millis = started.elapsed().as_millis() as i64;

    match outcome {
        Ok(Ok(results)) => TaskEnvelope {
            host_name: host,
            results,
            calc_time_millis,
            profiler: None,
            exception: None,
        },
        Ok(Err(error)) => TaskEnvelope::empty(host, Some(error.to_string()), calc_time_millis),
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|text| (*text).to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "task evaluation panicked".to_string());
            TaskEnvelope::empty(host, Some(format!("panic: {message}")), calc_time_millis)
        }
    }
}

fn run_task(
    task: &mut PredictionTask,
    cache: &ModelCache,
) -> PredictResult<Vec<TaskResultEntry>> {
    debug!(requests = task.requests.len(), "resolving task paths");
    let model_path = resolve_path(&task.model_path);
    let grid_path = (!task.tomography_path.is_empty()).then(|| resolve_path(&task.tomography_path));
    let polygon_path = (!task.polygon_path.is_empty()).then(|| resolve_path(&task.polygon_path));

    let model: Arc<TravelTimeModel> = cache.model(&model_path)?;
    let grid: Option<Arc<TomographyGrid>> = match &grid_path {
        Some(path) => Some(cache.grid(path)?),
        None => None,
    };
    let region: Option<ActiveRegion> = match &polygon_path {
        Some(path) => Some(ActiveRegion::from_json_file(path)?),
        None => None,
    };
    debug!(model = model.model_name(), weighting = grid.is_some(), "model ready, evaluating");

    let mut predictor = TablePredictor::new(model);
    let mut entries = Vec::with_capacity(task.requests.len());
    for (request_index, request) in task.requests.iter_mut().enumerate() {
        // Every request in the sub-batch is evaluated; defining/non-defining
        // filtering happened upstream and non-defining records still produce
        // invalid-ray entries here.
        let result = predictor.predict_contained(request);
        let valid = result.is_valid();
        let weights = match (&grid, valid && !result.ray_path.is_empty()) {
            (Some(grid), true) => project_ray_path(grid, region.as_ref(), &result.ray_path),
            _ => GridWeights::default(),
        };
        entries.push(TaskResultEntry {
            computed: true,
            valid,
            weights,
            request_index,
            result,
        });
    }
    debug!(results = entries.len(), "task completed");
    Ok(entries)
}
