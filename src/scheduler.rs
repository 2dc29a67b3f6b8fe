//! Periodic flush of expired gift-sub batches.
//!
//! The scheduler ticks at a fixed cadence independent of event-delivery
//! activity, drains every batch whose idle window has elapsed and emits each
//! as a single [`GiftSubBatch`] domain event. Emission happens after the
//! store lock is released, so consumer handlers never block appends.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::aggregator::GiftSubAggregator;
use crate::config::BridgeConfig;
use crate::dispatch::Dispatcher;
use crate::event::{GiftSubBatch, StreamEvent};

/// Handle for the background flush task.
pub struct FlushScheduler {
    cancel_token: CancellationToken,
    handle: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl FlushScheduler {
    /// Spawn the flush task. Must be called from within a tokio runtime.
    pub fn spawn(
        aggregator: Arc<GiftSubAggregator>,
        dispatcher: Arc<Dispatcher>,
        config: &BridgeConfig,
        cancel_token: CancellationToken,
    ) -> Self {
        let idle_threshold = Duration::from_millis(config.idle_threshold_ms);
        let tick_interval = Duration::from_millis(config.tick_interval_ms);

        let token = cancel_token.clone();
        let handle = tokio::spawn(async move {
            run_flush_loop(aggregator, dispatcher, idle_threshold, tick_interval, token).await;
        });

        Self {
            cancel_token,
            handle: parking_lot::Mutex::new(Some(handle)),
        }
    }

    /// Stop the scheduler and wait for the flush task to exit.
    ///
    /// Batches drained before cancellation is observed are still emitted.
    /// Batches still open in the store are NOT flushed; callers needing a
    /// final flush must drain the aggregator explicitly before stopping.
    pub async fn stop(&self) {
        self.cancel_token.cancel();
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

async fn run_flush_loop(
    aggregator: Arc<GiftSubAggregator>,
    dispatcher: Arc<Dispatcher>,
    idle_threshold: Duration,
    tick_interval: Duration,
    cancel_token: CancellationToken,
) {
    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;

            _ = cancel_token.cancelled() => break,

            _ = interval.tick() => {
                flush_expired(&aggregator, &dispatcher, idle_threshold);
            }
        }
    }
}

/// Drain expired batches and emit one `GiftBatch` event per batch.
fn flush_expired(
    aggregator: &GiftSubAggregator,
    dispatcher: &Dispatcher,
    idle_threshold: Duration,
) {
    match aggregator.drain_expired(idle_threshold, Instant::now()) {
        Ok(batches) => {
            for batch in batches {
                tracing::debug!(
                    gifter = ?batch.gifter,
                    recipients = batch.recipients.len(),
                    "emitting gift-sub batch"
                );
                dispatcher.dispatch(StreamEvent::GiftBatch(GiftSubBatch {
                    gifter: batch.gifter,
                    recipients: batch.recipients,
                    tier: batch.tier,
                }));
            }
        }
        Err(e) => {
            // Programming-error class; skip this tick rather than crash.
            tracing::error!(error = %e, "gift-sub drain failed");
        }
    }
}
