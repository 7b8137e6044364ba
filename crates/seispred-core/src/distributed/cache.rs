use crate::domain::{PredictErrorCategory, PredictResult};
use crate::grid::TomographyGrid;
use crate::predictors::table::{TravelTimeModel, read_table_file};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;
use tracing::warn;

pub const MAX_LOAD_ATTEMPTS: u32 = 3;
pub const RETRY_DELAY: Duration = Duration::from_millis(250);

/// Single-slot cache keyed by path: the cached entry is replaced only when a
/// different path is requested. The check-and-replace runs under one
/// exclusive section so an entry is never read while being swapped.
struct Slot<T> {
    entry: Mutex<Option<(PathBuf, Arc<T>)>>,
}

impl<T> Slot<T> {
    const fn new() -> Self {
        Self {
            entry: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<(PathBuf, Arc<T>)>> {
        self.entry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn get_or_load(
        &self,
        path: &Path,
        loader: impl Fn(&Path) -> PredictResult<T>,
    ) -> PredictResult<Arc<T>> {
        let mut entry = self.lock();
        if let Some((cached_path, cached)) = entry.as_ref()
            && cached_path == path
        {
            return Ok(Arc::clone(cached));
        }
        let loaded = Arc::new(load_with_retry(path, loader)?);
        *entry = Some((path.to_path_buf(), Arc::clone(&loaded)));
        Ok(loaded)
    }
}

/// Retry transient read failures with a fixed delay; validation failures
/// are not retried.
fn load_with_retry<T>(
    path: &Path,
    loader: impl Fn(&Path) -> PredictResult<T>,
) -> PredictResult<T> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match loader(path) {
            Ok(value) => return Ok(value),
            Err(error)
                if error.category() == PredictErrorCategory::IoSystem
                    && attempt < MAX_LOAD_ATTEMPTS =>
            {
                warn!(
                    path = %path.display(),
                    attempt,
                    error = %error,
                    "model read failed, retrying"
                );
                thread::sleep(RETRY_DELAY);
            }
            Err(error) => return Err(error),
        }
    }
}

/// Process-wide caches for the worker-side physical and tomography models.
pub struct ModelCache {
    model: Slot<TravelTimeModel>,
    grid: Slot<TomographyGrid>,
}

impl ModelCache {
    pub const fn new() -> Self {
        Self {
            model: Slot::new(),
            grid: Slot::new(),
        }
    }

    pub fn model(&self, path: &Path) -> PredictResult<Arc<TravelTimeModel>> {
        self.model.get_or_load(path, |path| {
            read_table_file(path).map(TravelTimeModel::from_file)
        })
    }

    pub fn grid(&self, path: &Path) -> PredictResult<Arc<TomographyGrid>> {
        self.grid.get_or_load(path, TomographyGrid::from_json_file)
    }
}

impl Default for ModelCache {
    fn default() -> Self {
        Self::new()
    }
}

static PROCESS_CACHE: LazyLock<ModelCache> = LazyLock::new(ModelCache::new);

/// The cache shared by every task executed in this process.
pub fn process_cache() -> &'static ModelCache {
    &PROCESS_CACHE
}

#[cfg(test)]
mod tests {
    use super::{MAX_LOAD_ATTEMPTS, ModelCache, load_with_retry};
    use crate::domain::{PredictError, PredictErrorCategory};
    use crate::predictors::table::{PhaseTable, TravelTimeTableFile};
    use crate::domain::SeismicPhase;
    use std::fs;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;

    fn write_model(path: &std::path::Path, name: &str) {
        let file = TravelTimeTableFile {
            model_name: name.to_string(),
            phases: vec![PhaseTable {
                phase: SeismicPhase::Pn,
                distances_deg: vec![0.0, 10.0],
                depths_km: vec![0.0, 100.0],
                travel_times: vec![vec![0.0, 140.0], vec![8.0, 146.0]],
            }],
        };
        fs::write(
            path,
            serde_json::to_string(&file).expect("model should serialize"),
        )
        .expect("model file should write");
    }

    #[test]
    fn repeated_loads_of_the_same_path_share_one_instance() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("model.json");
        write_model(&path, "cached");

        let cache = ModelCache::new();
        let first = cache.model(&path).expect("first load should succeed");
        let second = cache.model(&path).expect("second load should hit cache");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn a_different_path_replaces_the_cached_entry() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path_a = temp.path().join("a.json");
        let path_b = temp.path().join("b.json");
        write_model(&path_a, "model-a");
        write_model(&path_b, "model-b");

        let cache = ModelCache::new();
        let first = cache.model(&path_a).expect("model-a should load");
        let second = cache.model(&path_b).expect("model-b should load");
        assert_eq!(first.model_name(), "model-a");
        assert_eq!(second.model_name(), "model-b");

        let third = cache.model(&path_b).expect("model-b should hit cache");
        assert!(Arc::ptr_eq(&second, &third));
    }

    #[test]
    fn io_failures_are_retried_up_to_the_attempt_bound() {
        let attempts = AtomicU32::new(0);
        let error = load_with_retry(std::path::Path::new("missing.json"), |_| {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(PredictError::io_system("IO.MODEL_READ", "transient"))
        })
        .expect_err("exhausted retries should fail");

        assert_eq!(attempts.load(Ordering::SeqCst), MAX_LOAD_ATTEMPTS);
        assert_eq!(error.category(), PredictErrorCategory::IoSystem);
    }

    #[test]
    fn validation_failures_are_not_retried() {
        let attempts = AtomicU32::new(0);
        load_with_retry(std::path::Path::new("broken.json"), |_| {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(PredictError::input_validation("INPUT.MODEL_PARSE", "bad"))
        })
        .expect_err("parse failure should fail immediately");

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn missing_model_files_error_after_retries() {
        let temp = TempDir::new().expect("tempdir should be created");
        let cache = ModelCache::new();
        let error = cache
            .model(&temp.path().join("absent.json"))
            .expect_err("missing model should fail");
        assert_eq!(error.category(), PredictErrorCategory::IoSystem);
    }
}
