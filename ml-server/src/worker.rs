//! Scoring worker pool
//!
//! Scoring and explanation are CPU-bound: they run on the blocking pool.
//! Classification and explanation use separate semaphores, so an explanation
//! that overruns never holds a classification slot. Explanation has its own
//! wall-clock timeout, also passed down as the engine budget.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use neuroshield_core::logic::explain::Explanation;
use neuroshield_core::logic::pipeline::aggregate;
use neuroshield_core::{FeatureVector, PipelineContext, PredictionResult, RawInput};

use crate::{AppError, AppResult};

#[derive(Clone)]
pub struct Worker {
    context: Arc<PipelineContext>,
    permits: Arc<Semaphore>,
    explain_permits: Arc<Semaphore>,
    explain_timeout: Duration,
}

impl Worker {
    pub fn new(context: Arc<PipelineContext>, pool_size: usize, explain_timeout: Duration) -> Self {
        Self {
            context,
            permits: Arc::new(Semaphore::new(pool_size.max(1))),
            explain_permits: Arc::new(Semaphore::new(pool_size.max(1))),
            explain_timeout,
        }
    }

    pub fn context(&self) -> &PipelineContext {
        &self.context
    }

    async fn acquire(&self) -> AppResult<OwnedSemaphorePermit> {
        self.permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| AppError::Internal("worker pool closed".to_string()))
    }

    /// Score, then explain within the timeout. Only classification errors surface.
    pub async fn score(&self, raw: RawInput) -> AppResult<PredictionResult> {
        let permit = self.acquire().await?;
        let context = self.context.clone();
        let (prepared, scored) = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let prepared = context.prepare(&raw);
            let scored = context.classify(prepared.vector());
            (prepared, scored)
        })
        .await?;
        let scored = scored?;

        let explanation = if self.context.is_explainer_enabled() {
            self.explain(prepared.vector().clone()).await
        } else {
            None
        };

        Ok(aggregate(scored, explanation, prepared.diagnostics()))
    }

    /// Best effort: skipped when every explanation slot is busy
    async fn explain(&self, vector: FeatureVector) -> Option<Explanation> {
        let started = Instant::now();
        let permit = match self.explain_permits.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                tracing::debug!("Explanation skipped: all explanation slots busy");
                return None;
            }
        };

        // The engine stops itself at the same deadline
        let budget = self.explain_timeout;
        let context = self.context.clone();
        let task = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            context.explain_within(&vector, budget)
        });

        let remaining = self.explain_timeout.saturating_sub(started.elapsed());
        match tokio::time::timeout(remaining, task).await {
            Ok(Ok(Ok(explanation))) => Some(explanation),
            Ok(Ok(Err(e))) => {
                tracing::warn!("Explanation failed: {}", e);
                None
            }
            Ok(Err(e)) => {
                tracing::error!("Explanation task panicked: {}", e);
                None
            }
            Err(_) => {
                tracing::warn!("Explanation timed out after {:?}", self.explain_timeout);
                None
            }
        }
    }
}
