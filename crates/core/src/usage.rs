//! Usage accounting for pipelines that call paid backends.

use std::sync::Mutex;

use thiserror::Error;

use crate::provider::ChatUsage;

/// The running cost of a job passed its ceiling.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("cost limit exceeded: spent ${spent:.4}, limit ${limit:.4}")]
pub struct CostLimitExceeded {
    pub spent: f64,
    pub limit: f64,
}

/// Receives usage after every billable call of a pipeline.
///
/// Pipelines report each call as soon as it returns, so the spend survives a
/// later failure or cancellation. An `Err` stops the pipeline before the next call.
pub trait UsageRecorder: Send + Sync {
    fn record(&self, usage: &ChatUsage) -> Result<(), CostLimitExceeded>;
}

/// Sums usage with no ceiling.
#[derive(Debug, Default)]
pub struct UsageTally(Mutex<ChatUsage>);

impl UsageTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> ChatUsage {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl UsageRecorder for UsageTally {
    fn record(&self, usage: &ChatUsage) -> Result<(), CostLimitExceeded> {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).add(usage);
        Ok(())
    }
}
