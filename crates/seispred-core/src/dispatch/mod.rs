//! Concurrent batch dispatch: partitions a request batch into chunks, runs
//! them across a bounded worker pool backed by pooled predictor clones, and
//! reassembles results in input order.

use crate::domain::{PredictError, PredictResult, PredictionResult, RequestRecord};
use crate::predictors::Predictor;
use std::sync::mpsc;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use tracing::debug;

pub const DEFAULT_CHUNK_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Bounded worker count. Values below 2 select the sequential path.
    pub max_concurrency: usize,
    /// Requests per chunk.
    pub chunk_size: usize,
}

impl DispatchConfig {
    pub fn new(max_concurrency: usize, chunk_size: usize) -> Self {
        Self {
            max_concurrency,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn sequential() -> Self {
        Self::new(1, DEFAULT_CHUNK_SIZE)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        let max_concurrency = thread::available_parallelism()
            .map(|count| count.get())
            .unwrap_or(1);
        Self::new(max_concurrency, DEFAULT_CHUNK_SIZE)
    }
}

/// Batch dispatcher with a thread-safe pool of spare predictor clones. The
/// pool outlives individual batches so clone cost is amortized across runs.
pub struct ConcurrentDispatcher {
    config: DispatchConfig,
    pool: Mutex<Vec<Box<dyn Predictor>>>,
}

impl ConcurrentDispatcher {
    pub fn new(config: DispatchConfig) -> Self {
        Self {
            config,
            pool: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> DispatchConfig {
        self.config
    }

    /// Spare clones currently parked in the pool.
    pub fn pooled_count(&self) -> usize {
        self.lock_pool().len()
    }

    fn lock_pool(&self) -> MutexGuard<'_, Vec<Box<dyn Predictor>>> {
        self.pool
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Pop a spare instance, cloning the canonical provider only when the
    /// pool is empty.
    fn acquire(&self, canonical: &dyn Predictor) -> PredictResult<Box<dyn Predictor>> {
        if let Some(spare) = self.lock_pool().pop() {
            return Ok(spare);
        }
        canonical.clone_predictor()
    }

    fn release(&self, instance: Box<dyn Predictor>) {
        self.lock_pool().push(instance);
    }

    /// Evaluate a batch against the canonical provider, one result per
    /// request in input order. Per-request failures come back as error-ray
    /// results; only setup failures (a clone that cannot be built) error out
    /// of this call.
    pub fn predict_batch(
        &self,
        canonical: &dyn Predictor,
        requests: &mut [RequestRecord],
    ) -> PredictResult<Vec<PredictionResult>> {
        let total = requests.len();
        if total == 0 {
            return Ok(Vec::new());
        }

        // Shrink chunks below the configured size when the batch is large
        // enough to occupy every worker, so no fewer chunks than the
        // configured parallelism exist.
        let chunk_size = self
            .config
            .chunk_size
            .min(total.div_ceil(self.config.max_concurrency.max(1)))
            .max(1);
        let chunk_count = total.div_ceil(chunk_size);
        if self.config.max_concurrency < 2 || chunk_count < 2 {
            let mut worker = self.acquire(canonical)?;
            let results = worker.predict_batch(requests);
            self.release(worker);
            return Ok(results);
        }

        let worker_count = self.config.max_concurrency.min(chunk_count);
        debug!(
            requests = total,
            chunks = chunk_count,
            workers = worker_count,
            "dispatching batch across worker pool"
        );

        // Chunks carry their start offset so completion order is free while
        // assembly order stays fixed.
        let mut queue: Vec<(usize, &mut [RequestRecord])> = Vec::with_capacity(chunk_count);
        for (chunk_index, chunk) in requests.chunks_mut(chunk_size).enumerate() {
            queue.push((chunk_index * chunk_size, chunk));
        }
        queue.reverse();
        let queue = Mutex::new(queue);

        let (sender, receiver) = mpsc::channel::<PredictResult<(usize, Vec<PredictionResult>)>>();

        thread::scope(|scope| {
            for _ in 0..worker_count {
                let sender = sender.clone();
                let queue = &queue;
                scope.spawn(move || {
                    loop {
                        let next = queue
                            .lock()
                            .unwrap_or_else(|poisoned| poisoned.into_inner())
                            .pop();
                        let Some((start, chunk)) = next else {
                            break;
                        };
                        let mut worker = match self.acquire(canonical) {
                            Ok(worker) => worker,
                            Err(error) => {
                                let _ = sender.send(Err(error));
                                break;
                            }
                        };
                        let results = worker.predict_batch(chunk);
                        self.release(worker);
                        if sender.send(Ok((start, results))).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(sender);

            let mut assembled: Vec<Option<PredictionResult>> =
                (0..total).map(|_| None).collect();
            let mut failure: Option<PredictError> = None;
            for outcome in receiver {
                match outcome {
                    Ok((start, chunk_results)) => {
                        for (offset, result) in chunk_results.into_iter().enumerate() {
                            assembled[start + offset] = Some(result);
                        }
                    }
                    Err(error) => failure = Some(failure.take().unwrap_or(error)),
                }
            }

            if let Some(error) = failure {
                return Err(PredictError::internal(
                    "DISPATCH.WORKER_SETUP",
                    format!("failed to provision a predictor clone: {error}"),
                ));
            }

            let mut results = Vec::with_capacity(total);
            for (position, slot) in assembled.into_iter().enumerate() {
                match slot {
                    Some(result) => results.push(result),
                    None => {
                        return Err(PredictError::internal(
                            "DISPATCH.MISSING_RESULT",
                            format!("no result assembled for request position {position}"),
                        ));
                    }
                }
            }
            Ok(results)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{ConcurrentDispatcher, DispatchConfig};
    use crate::domain::{
        AttributeSet, GeoAttribute, GeoVector, RayType, Receiver, RequestRecord, SeismicPhase,
        Source,
    };
    use crate::predictors::stubs::CountingPredictor;
    use std::sync::atomic::Ordering;

    fn batch(size: usize) -> Vec<RequestRecord> {
        (0..size)
            .map(|index| {
                RequestRecord::new(
                    Source::new(1, 1, GeoVector::new(0.0, 0.0, 10.0), 0.0),
                    Receiver::new(1, "GERES", GeoVector::new(48.8, 13.7, 0.0), 0.0, 1.0e10),
                    SeismicPhase::P,
                    AttributeSet::of(&[GeoAttribute::TravelTime]),
                    true,
                )
                .with_observation_id(index as i64)
            })
            .collect()
    }

    #[test]
    fn all_parallelism_levels_yield_identical_ordered_output() {
        let total = 37;
        let expected: Vec<i64> = (0..total as i64).collect();

        for max_concurrency in [1, total / 2, total, total * 2] {
            let dispatcher =
                ConcurrentDispatcher::new(DispatchConfig::new(max_concurrency.max(1), 5));
            let predictor = CountingPredictor::new();
            let mut requests = batch(total);

            let results = dispatcher
                .predict_batch(&predictor, &mut requests)
                .expect("batch should dispatch");

            assert_eq!(results.len(), total);
            let ids: Vec<i64> = results.iter().map(|result| result.observation_id).collect();
            assert_eq!(
                ids, expected,
                "order should be preserved at concurrency {max_concurrency}"
            );
            for result in &results {
                assert_eq!(result.ray_type(), RayType::Refraction);
            }
        }
    }

    #[test]
    fn sequential_and_parallel_paths_are_observably_equivalent() {
        let mut sequential_requests = batch(23);
        let mut parallel_requests = batch(23);

        let sequential = ConcurrentDispatcher::new(DispatchConfig::sequential())
            .predict_batch(&CountingPredictor::new(), &mut sequential_requests)
            .expect("sequential batch should dispatch");
        let parallel = ConcurrentDispatcher::new(DispatchConfig::new(8, 3))
            .predict_batch(&CountingPredictor::new(), &mut parallel_requests)
            .expect("parallel batch should dispatch");

        assert_eq!(sequential.len(), parallel.len());
        for (left, right) in sequential.iter().zip(&parallel) {
            assert_eq!(left.observation_id, right.observation_id);
            assert_eq!(
                left.value(GeoAttribute::TravelTime),
                right.value(GeoAttribute::TravelTime)
            );
        }
    }

    #[test]
    fn pool_reuse_bounds_clone_count_across_batches() {
        let dispatcher = ConcurrentDispatcher::new(DispatchConfig::new(4, 10));
        let predictor = CountingPredictor::new();

        let mut first = batch(100);
        dispatcher
            .predict_batch(&predictor, &mut first)
            .expect("first batch should dispatch");

        let mut second = batch(100);
        dispatcher
            .predict_batch(&predictor, &mut second)
            .expect("second batch should dispatch");

        let clones = predictor.clones_created.load(Ordering::SeqCst);
        assert!(clones <= 4, "expected at most 4 clones, saw {clones}");
        assert!(dispatcher.pooled_count() >= 1);
        assert!(dispatcher.pooled_count() <= 4);
    }

    #[test]
    fn per_request_failures_stay_contained_in_parallel_runs() {
        let dispatcher = ConcurrentDispatcher::new(DispatchConfig::new(4, 2));
        let predictor = CountingPredictor::failing_on(3);
        let mut requests = batch(5);

        let results = dispatcher
            .predict_batch(&predictor, &mut requests)
            .expect("batch should dispatch despite per-request failure");

        assert_eq!(results.len(), 5);
        for result in &results {
            if result.observation_id == 3 {
                assert_eq!(result.ray_type(), RayType::Error);
                assert!(!result.error_message().is_empty());
            } else {
                assert_eq!(result.ray_type(), RayType::Refraction);
            }
        }
    }

    #[test]
    fn non_defining_requests_never_reach_the_model_under_dispatch() {
        let dispatcher = ConcurrentDispatcher::new(DispatchConfig::new(4, 2));
        let predictor = CountingPredictor::new();
        let mut requests = batch(10);
        for request in &mut requests {
            request.defining = false;
        }

        let results = dispatcher
            .predict_batch(&predictor, &mut requests)
            .expect("batch should dispatch");

        assert_eq!(predictor.predict_calls.load(Ordering::SeqCst), 0);
        assert!(results.iter().all(|result| result.ray_type() == RayType::Invalid));
    }

    #[test]
    fn empty_batches_return_empty_results() {
        let dispatcher = ConcurrentDispatcher::new(DispatchConfig::default());
        let mut requests = Vec::new();
        let results = dispatcher
            .predict_batch(&CountingPredictor::new(), &mut requests)
            .expect("empty batch should dispatch");
        assert!(results.is_empty());
    }

    #[test]
    fn single_request_batches_use_the_sequential_path() {
        let dispatcher = ConcurrentDispatcher::new(DispatchConfig::new(8, 100));
        let predictor = CountingPredictor::new();
        let mut requests = batch(1);

        let results = dispatcher
            .predict_batch(&predictor, &mut requests)
            .expect("single-request batch should dispatch");

        assert_eq!(results.len(), 1);
        assert_eq!(predictor.clones_created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn large_batches_spread_across_all_configured_workers() {
        // Chunk size 100 would produce a single chunk for 40 requests; the
        // dispatcher subdivides so every worker has a chunk to claim.
        let dispatcher = ConcurrentDispatcher::new(DispatchConfig::new(4, 100));
        let predictor = CountingPredictor::new();
        let mut requests = batch(40);

        let results = dispatcher
            .predict_batch(&predictor, &mut requests)
            .expect("batch should dispatch");

        assert_eq!(results.len(), 40);
        let ids: Vec<i64> = results.iter().map(|result| result.observation_id).collect();
        assert_eq!(ids, (0..40).collect::<Vec<i64>>());
        let clones = predictor.clones_created.load(Ordering::SeqCst);
        assert!((1..=4).contains(&clones));
    }
}
