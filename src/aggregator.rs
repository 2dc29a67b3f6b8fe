//! Gift-subscription aggregation.
//!
//! The platform delivers one low-level notification per gifted-subscription
//! recipient, with no terminator marking a batch as complete. The aggregator
//! reconstructs logical batches (one gifter, one tier, N recipients) by
//! accumulating recipients per gifter key across a sliding idle window:
//! a batch is considered complete once no gift for its key has arrived for
//! the idle threshold.
//!
//! Anonymous gifts all share the `None` key, so distinct anonymous gifters
//! active within the same window collapse into one batch. No stronger
//! correlation signal is available from the platform; this is accepted
//! behavior.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::event::SubscriptionTier;

/// An open batch of gift-subscription recipients for one gifter key.
#[derive(Debug)]
struct GiftBatch {
    /// Refreshed to now on every append for this key
    last_received_at: Instant,
    /// Set on the first append, constant for the batch's lifetime
    tier: SubscriptionTier,
    /// Recipients in arrival order; append-only while the batch is open
    recipients: Vec<String>,
}

/// A batch removed from the store by [`GiftSubAggregator::drain_expired`],
/// ready for emission as a single domain event.
#[derive(Debug, Clone, PartialEq)]
pub struct DrainedBatch {
    /// Gifter display name, or `None` for the anonymous bucket
    pub gifter: Option<String>,
    /// Tier of the gifted subscriptions
    pub tier: SubscriptionTier,
    /// Recipients in arrival order
    pub recipients: Vec<String>,
}

/// Concurrency-safe keyed store accumulating gift-sub recipients per gifter.
///
/// All store access happens under a single mutex scoped to the map only;
/// event emission for drained batches is the caller's job and runs outside
/// the lock, so consumer handlers never block concurrent appends.
#[derive(Debug, Default)]
pub struct GiftSubAggregator {
    batches: Mutex<HashMap<Option<String>, GiftBatch>>,
}

impl GiftSubAggregator {
    /// Create a new, empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one gifted-subscription recipient for `gifter`.
    ///
    /// Creates the batch on the first occurrence of a key; otherwise appends
    /// the recipient and refreshes the idle timer. Safe under concurrent
    /// invocation; never blocks on the flush scheduler.
    pub fn append(&self, gifter: Option<&str>, tier: SubscriptionTier, recipient: &str) {
        let key = gifter.map(str::to_owned);
        let now = Instant::now();

        let mut batches = self.batches.lock();
        let batch = batches.entry(key).or_insert_with(|| GiftBatch {
            last_received_at: now,
            tier,
            recipients: Vec::new(),
        });
        batch.last_received_at = now;
        batch.recipients.push(recipient.to_owned());
    }

    /// Atomically remove and return every batch idle for longer than
    /// `idle_threshold` as of `now`.
    ///
    /// Batches still inside the idle window are neither returned nor
    /// mutated. Scan and removal happen under one lock acquisition, so a
    /// batch can never be observed by two concurrent drains.
    pub fn drain_expired(
        &self,
        idle_threshold: Duration,
        now: Instant,
    ) -> Result<Vec<DrainedBatch>> {
        let mut batches = self.batches.lock();

        let expired: Vec<Option<String>> = batches
            .iter()
            .filter(|(_, batch)| now.saturating_duration_since(batch.last_received_at) > idle_threshold)
            .map(|(key, _)| key.clone())
            .collect();

        let mut drained = Vec::with_capacity(expired.len());
        for key in expired {
            let batch = batches
                .remove(&key)
                .ok_or_else(|| Error::Concurrency(format!("expired batch vanished: {key:?}")))?;
            if batch.recipients.is_empty() {
                // Open batches always hold at least the recipient that
                // created them; an empty one indicates a lost update.
                return Err(Error::Concurrency(format!("empty open batch: {key:?}")));
            }
            drained.push(DrainedBatch {
                gifter: key,
                tier: batch.tier,
                recipients: batch.recipients,
            });
        }

        Ok(drained)
    }

    /// Number of currently open batches.
    pub fn len(&self) -> usize {
        self.batches.lock().len()
    }

    /// Whether no batch is currently open.
    pub fn is_empty(&self) -> bool {
        self.batches.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const IDLE: Duration = Duration::from_millis(1000);

    #[test]
    fn test_append_creates_batch_on_first_occurrence() {
        let agg = GiftSubAggregator::new();
        assert!(agg.is_empty());

        agg.append(Some("bob"), SubscriptionTier::Tier1, "r0");
        assert_eq!(agg.len(), 1);
    }

    #[test]
    fn test_append_preserves_arrival_order() {
        let agg = GiftSubAggregator::new();
        for i in 0..5 {
            agg.append(Some("bob"), SubscriptionTier::Tier1, &format!("r{i}"));
        }

        let now = Instant::now() + Duration::from_secs(2);
        let drained = agg.drain_expired(IDLE, now).unwrap();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].recipients, vec!["r0", "r1", "r2", "r3", "r4"]);
        assert_eq!(drained[0].gifter.as_deref(), Some("bob"));
        assert_eq!(drained[0].tier, SubscriptionTier::Tier1);
    }

    #[test]
    fn test_anonymous_gifters_collapse_into_one_batch() {
        let agg = GiftSubAggregator::new();
        // Two distinct real users, both marked anonymous by the platform.
        agg.append(None, SubscriptionTier::Tier1, "r0");
        agg.append(None, SubscriptionTier::Tier1, "r1");
        assert_eq!(agg.len(), 1);

        let now = Instant::now() + Duration::from_secs(2);
        let drained = agg.drain_expired(IDLE, now).unwrap();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].gifter, None);
        assert_eq!(drained[0].recipients, vec!["r0", "r1"]);
    }

    #[test]
    fn test_distinct_keys_get_distinct_batches() {
        let agg = GiftSubAggregator::new();
        agg.append(Some("alice"), SubscriptionTier::Tier2, "r0");
        agg.append(Some("bob"), SubscriptionTier::Tier1, "r1");
        agg.append(None, SubscriptionTier::Tier1, "r2");
        assert_eq!(agg.len(), 3);
    }

    // Paused clock so the append's timestamp is exactly `now`.
    #[tokio::test(start_paused = true)]
    async fn test_drain_skips_batches_inside_window() {
        let agg = GiftSubAggregator::new();
        agg.append(Some("bob"), SubscriptionTier::Tier1, "r0");
        let appended = Instant::now();

        // Idle for exactly the threshold is not expired (strictly greater).
        let drained = agg.drain_expired(IDLE, appended + IDLE).unwrap();
        assert!(drained.is_empty());
        assert_eq!(agg.len(), 1);

        let drained = agg
            .drain_expired(IDLE, appended + IDLE + Duration::from_millis(1))
            .unwrap();
        assert_eq!(drained.len(), 1);
        assert!(agg.is_empty());
    }

    #[test]
    fn test_drain_removes_emitted_batches_exactly_once() {
        let agg = GiftSubAggregator::new();
        agg.append(Some("bob"), SubscriptionTier::Tier1, "r0");

        let now = Instant::now() + Duration::from_secs(2);
        assert_eq!(agg.drain_expired(IDLE, now).unwrap().len(), 1);
        assert!(agg.drain_expired(IDLE, now).unwrap().is_empty());
    }

    #[test]
    fn test_late_gift_after_drain_starts_fresh_batch() {
        let agg = GiftSubAggregator::new();
        agg.append(Some("bob"), SubscriptionTier::Tier1, "r0");

        let now = Instant::now() + Duration::from_secs(2);
        let first = agg.drain_expired(IDLE, now).unwrap();
        assert_eq!(first[0].recipients, vec!["r0"]);

        agg.append(Some("bob"), SubscriptionTier::Tier1, "r1");
        let second = agg
            .drain_expired(IDLE, Instant::now() + Duration::from_secs(2))
            .unwrap();
        assert_eq!(second[0].recipients, vec!["r1"]);
    }

    #[test]
    fn test_no_lost_updates_under_concurrent_appends() {
        let agg = GiftSubAggregator::new();

        std::thread::scope(|scope| {
            for i in 0..100 {
                let agg = &agg;
                scope.spawn(move || {
                    agg.append(Some("bob"), SubscriptionTier::Tier1, &format!("r{i}"));
                });
            }
        });

        let now = Instant::now() + Duration::from_secs(2);
        let drained = agg.drain_expired(IDLE, now).unwrap();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].recipients.len(), 100);

        let unique: std::collections::HashSet<_> = drained[0].recipients.iter().collect();
        assert_eq!(unique.len(), 100);
    }

    #[test]
    fn test_concurrent_appends_across_keys() {
        let agg = GiftSubAggregator::new();

        std::thread::scope(|scope| {
            for i in 0..50 {
                let agg = &agg;
                scope.spawn(move || {
                    let gifter = format!("gifter{}", i % 5);
                    agg.append(Some(&gifter), SubscriptionTier::Tier1, &format!("r{i}"));
                });
            }
        });

        let now = Instant::now() + Duration::from_secs(2);
        let drained = agg.drain_expired(IDLE, now).unwrap();
        assert_eq!(drained.len(), 5);
        let total: usize = drained.iter().map(|b| b.recipients.len()).sum();
        assert_eq!(total, 50);
    }

    proptest! {
        #[test]
        fn prop_drain_returns_all_recipients_in_arrival_order(
            recipients in prop::collection::vec("[a-z0-9_]{1,12}", 1..40)
        ) {
            let agg = GiftSubAggregator::new();
            for recipient in &recipients {
                agg.append(Some("gifter"), SubscriptionTier::Tier1, recipient);
            }

            let now = Instant::now() + Duration::from_secs(2);
            let drained = agg.drain_expired(IDLE, now).unwrap();
            prop_assert_eq!(drained.len(), 1);
            prop_assert_eq!(&drained[0].recipients, &recipients);
        }
    }
}
