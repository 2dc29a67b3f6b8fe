//! Twitch-events: typed event bridge for live-stream chat with
//! gift-subscription coalescing.
//!
//! The platform delivers one notification per gifted-subscription recipient
//! with no signal marking a batch as complete. This crate reconstructs
//! logical gift batches (one gifter, one tier, N recipients) by accumulating
//! recipients per gifter across a sliding idle window, and exposes all chat
//! activity as immutable typed domain events for downstream consumers (bots,
//! overlays, dashboards).
//!
//! ## Core Types
//!
//! - [`StreamBridge`] - connection owner, callback translation, pub/sub
//! - [`GiftSubAggregator`] - concurrency-safe keyed batch store
//! - [`FlushScheduler`] - periodic drain of expired batches
//! - [`StreamEvent`] / [`EventKind`] - typed domain events
//! - [`PlatformClient`] - trait for the underlying chat/pubsub transport
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use twitch_events::{BridgeConfig, EventKind, StreamBridge, StreamEvent};
//! # use twitch_events::PlatformClient;
//! # async fn example(client: Arc<dyn PlatformClient>) -> twitch_events::Result<()> {
//! let bridge = StreamBridge::new(client, BridgeConfig::default());
//! bridge.initialize("channel-id", "bot", "oauth:token").await?;
//!
//! bridge.on_event(EventKind::GiftBatch, |event| {
//!     if let StreamEvent::GiftBatch(batch) = event {
//!         println!("{:?} gifted {} subs", batch.gifter, batch.recipients.len());
//!     }
//!     Ok(())
//! });
//! # Ok(())
//! # }
//! ```

pub mod aggregator;
pub mod bridge;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod scheduler;

pub use aggregator::{DrainedBatch, GiftSubAggregator};
pub use bridge::{ConnectionInfo, StreamBridge};
pub use client::{ClientConnection, Credentials, PlatformClient, RawEvent};
pub use config::BridgeConfig;
pub use dispatch::{Dispatcher, EventSubscription};
pub use error::{Error, HandlerError, Result};
pub use event::{
    Bits, ChatMessage, EventKind, Follow, GiftSubBatch, Host, Raid, StreamEvent, Subscription,
    SubscriptionTier,
};
pub use scheduler::FlushScheduler;
