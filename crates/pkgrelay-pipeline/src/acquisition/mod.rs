//! Source acquisition.
//!
//! An [`AcquisitionChain`] tries its strategies in fixed priority order and
//! stops at the first one that yields a stream. Strategies never return
//! errors: anything that goes wrong is an [`AcquisitionResult::Unavailable`]
//! with a reason, which the chain records and moves past.

mod local;
mod remote;

use std::sync::Arc;

use async_trait::async_trait;

use pkgrelay_core::{AcquisitionResult, AssetRequest, StrategyAttempt};

pub use local::LocalExtractionStrategy;
pub use remote::RemoteFetchStrategy;

/// One way of obtaining an asset's bytes.
#[async_trait]
pub trait AcquisitionStrategy: Send + Sync {
    /// Short name used in logs and failure detail.
    fn name(&self) -> &'static str;

    /// Try to open a stream for `request`.
    async fn acquire(&self, request: &AssetRequest) -> AcquisitionResult;
}

/// A stream produced by the chain.
#[derive(Debug)]
pub struct Acquired {
    /// Strategy that produced the stream.
    pub strategy: &'static str,
    /// The available result (never `Unavailable`).
    pub result: AcquisitionResult,
    /// Strategies tried before this one.
    pub skipped: Vec<StrategyAttempt>,
}

/// Ordered set of acquisition strategies.
#[derive(Clone)]
pub struct AcquisitionChain {
    strategies: Vec<Arc<dyn AcquisitionStrategy>>,
}

impl AcquisitionChain {
    /// Primary then fallback.
    pub fn new(primary: Arc<dyn AcquisitionStrategy>, fallback: Arc<dyn AcquisitionStrategy>) -> Self {
        Self {
            strategies: vec![primary, fallback],
        }
    }

    /// Any number of strategies in priority order.
    pub const fn from_strategies(strategies: Vec<Arc<dyn AcquisitionStrategy>>) -> Self {
        Self { strategies }
    }

    /// Strategy names in priority order.
    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Run strategies in order until one produces a stream.
    ///
    /// Later strategies are not attempted once one succeeds. On exhaustion
    /// the per-strategy reasons are returned in chain order.
    pub async fn run(&self, request: &AssetRequest) -> Result<Acquired, Vec<StrategyAttempt>> {
        let mut attempts = Vec::with_capacity(self.strategies.len());

        for strategy in &self.strategies {
            let name = strategy.name();
            tracing::debug!(target: "pkgrelay.acquire", strategy = name, request = %request, "Trying strategy");

            match strategy.acquire(request).await {
                AcquisitionResult::Unavailable(reason) => {
                    tracing::warn!(
                        target: "pkgrelay.acquire",
                        strategy = name,
                        asset_id = %request.asset_id,
                        reason = %reason,
                        "Strategy unavailable"
                    );
                    attempts.push(StrategyAttempt {
                        strategy: name.to_string(),
                        reason,
                    });
                }
                result => {
                    tracing::info!(target: "pkgrelay.acquire", strategy = name, asset_id = %request.asset_id, "Source acquired");
                    return Ok(Acquired {
                        strategy: name,
                        result,
                        skipped: attempts,
                    });
                }
            }
        }

        Err(attempts)
    }
}
