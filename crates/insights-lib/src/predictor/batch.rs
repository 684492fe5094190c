//! Batch prediction
//!
//! Fans records out over blocking worker tasks with bounded concurrency
//! and reassembles the results in input order. A failing record only
//! affects its own slot.

use super::pipeline::Pipeline;
use crate::error::{PipelineError, Result};
use crate::models::{BatchEntry, BatchItemError, BatchResult, RawRecord, UserId};
use crate::observability::PipelineMetrics;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Default number of records predicted at once
pub const DEFAULT_BATCH_CONCURRENCY: usize = 8;

/// Default wall-time bound for a whole batch
pub const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for batch execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    /// Maximum records in flight
    pub concurrency: usize,
    /// Whole-batch timeout; `None` waits indefinitely
    pub timeout: Option<Duration>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_BATCH_CONCURRENCY,
            timeout: Some(DEFAULT_BATCH_TIMEOUT),
        }
    }
}

/// A batch slot before prediction: a parsed record or an intake failure
type BatchInput = std::result::Result<RawRecord, BatchItemError>;

/// Runs batches against a shared [`Pipeline`]
#[derive(Clone)]
pub struct BatchCoordinator {
    pipeline: Arc<Pipeline>,
    config: BatchConfig,
    metrics: PipelineMetrics,
}

impl BatchCoordinator {
    pub fn new(pipeline: Arc<Pipeline>, config: BatchConfig) -> Self {
        Self {
            pipeline,
            config,
            metrics: PipelineMetrics::new(),
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Predict churn and LTV for every record.
    ///
    /// `results[i]` always corresponds to `records[i]`. Only a timeout
    /// fails the batch as a whole.
    pub async fn run_batch(&self, records: Vec<RawRecord>) -> Result<BatchResult> {
        self.run_inputs(records.into_iter().map(Ok).collect()).await
    }

    /// Like [`run_batch`](Self::run_batch), parsing each JSON element on its
    /// own so a malformed element fails only its slot
    pub async fn run_batch_json(&self, values: Vec<serde_json::Value>) -> Result<BatchResult> {
        let inputs = values
            .iter()
            .enumerate()
            .map(|(index, value)| {
                RawRecord::from_json(value).map_err(|e| BatchItemError {
                    index,
                    user_id: RawRecord::user_id_of(value),
                    error: e.to_string(),
                })
            })
            .collect();
        self.run_inputs(inputs).await
    }

    async fn run_inputs(&self, inputs: Vec<BatchInput>) -> Result<BatchResult> {
        let total = inputs.len();
        let start = Instant::now();

        let results = match self.config.timeout {
            Some(limit) => tokio::time::timeout(limit, self.execute(inputs))
                .await
                .map_err(|_| {
                    warn!(records = total, timeout_secs = limit.as_secs(), "Batch timed out");
                    PipelineError::BatchTimeout {
                        records: total,
                        timeout_secs: limit.as_secs(),
                    }
                })?,
            None => self.execute(inputs).await,
        };

        let result = BatchResult { results };
        self.metrics.observe_batch(total, result.failed());
        self.pipeline
            .logger()
            .log_batch_completed(&result, start.elapsed().as_millis());
        Ok(result)
    }

    async fn execute(&self, inputs: Vec<BatchInput>) -> Vec<BatchEntry> {
        let mut slots: Vec<Option<BatchEntry>> = (0..inputs.len()).map(|_| None).collect();
        let mut user_ids: Vec<Option<UserId>> = vec![None; inputs.len()];
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for (index, input) in inputs.into_iter().enumerate() {
            let record = match input {
                Ok(record) => record,
                Err(item) => {
                    self.pipeline.logger().log_batch_item_failed(
                        index,
                        item.user_id.as_ref(),
                        &item.error,
                    );
                    slots[index] = Some(BatchEntry::Failure(item));
                    continue;
                }
            };

            user_ids[index] = record.user_id.clone();

            // The semaphore is never closed, so this only fails if it is dropped
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            let pipeline = Arc::clone(&self.pipeline);
            tasks.spawn_blocking(move || {
                let _permit = permit;
                (index, pipeline.predict_entry(index, &record))
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, entry)) => slots[index] = Some(entry),
                Err(e) => warn!(error = %e, "Batch worker task failed"),
            }
        }

        debug!(records = slots.len(), "Batch workers finished");

        fill_unfinished(slots, user_ids)
    }
}

/// A panicked worker leaves its slot empty; report it in place
fn fill_unfinished(
    slots: Vec<Option<BatchEntry>>,
    user_ids: Vec<Option<UserId>>,
) -> Vec<BatchEntry> {
    slots
        .into_iter()
        .zip(user_ids)
        .enumerate()
        .map(|(index, (slot, user_id))| {
            slot.unwrap_or_else(|| {
                BatchEntry::Failure(BatchItemError {
                    index,
                    user_id,
                    error: "prediction task did not complete".to_string(),
                })
            })
        })
        .collect()
}
