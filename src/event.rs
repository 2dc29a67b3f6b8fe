//! Typed domain events emitted by the bridge.
//!
//! Each variant of [`StreamEvent`] is an immutable, single-occurrence fact.
//! Gift subscriptions are the exception: individual gift notifications are
//! never emitted directly, they are coalesced into a [`GiftSubBatch`] by the
//! aggregator first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Subscription tier/plan associated with a (gifted) subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    /// Prime subscription
    Prime,
    /// Entry tier
    Tier1,
    /// Second tier
    Tier2,
    /// Third tier
    Tier3,
}

impl Default for SubscriptionTier {
    fn default() -> Self {
        Self::Tier1
    }
}

/// Kind discriminant for [`StreamEvent`], used for handler registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Chat message
    Chat,
    /// New follower
    Follow,
    /// Bits/cheer
    Bits,
    /// New subscription or resubscription
    Subscription,
    /// Coalesced gift-subscription batch
    GiftBatch,
    /// Incoming raid
    Raid,
    /// Incoming host
    Host,
}

/// A chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Platform-assigned message ID
    pub id: String,
    /// Display name of the sender
    pub username: String,
    /// Whether the sender is a channel moderator
    pub is_moderator: bool,
    /// Message content
    pub content: String,
    /// Timestamp when the message was received
    pub timestamp: DateTime<Utc>,
}

/// A new follower.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Follow {
    /// Display name of the follower
    pub username: String,
}

/// A bits/cheer donation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bits {
    /// Display name of the donor
    pub username: String,
    /// Number of bits used
    pub amount: u64,
}

/// A new subscription or resubscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Display name of the subscriber
    pub username: String,
    /// Optional resub message
    pub message: Option<String>,
    /// Total months subscribed
    pub cumulative_months: u32,
    /// Current consecutive-month streak
    pub streak_months: u32,
    /// Subscription tier
    pub tier: SubscriptionTier,
}

/// A coalesced gift-subscription batch: one gifter, one tier, N recipients.
///
/// `gifter` is `None` for anonymous gifts. All anonymous gifters active
/// within the same idle window collapse into a single batch; the platform
/// offers no signal to tell them apart, so this is accepted behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiftSubBatch {
    /// Display name of the gifter, or `None` if anonymous
    pub gifter: Option<String>,
    /// Recipients in arrival order
    pub recipients: Vec<String>,
    /// Tier of the gifted subscriptions
    pub tier: SubscriptionTier,
}

/// An incoming raid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Raid {
    /// Display name of the raiding streamer
    pub username: String,
    /// Number of raiders
    pub party_size: u32,
}

/// An incoming host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    /// Name of the hosting channel
    pub channel: String,
}

/// A typed domain event emitted by the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Chat(ChatMessage),
    Follow(Follow),
    Bits(Bits),
    Subscription(Subscription),
    GiftBatch(GiftSubBatch),
    Raid(Raid),
    Host(Host),
}

impl StreamEvent {
    /// Get the kind discriminant for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Chat(_) => EventKind::Chat,
            Self::Follow(_) => EventKind::Follow,
            Self::Bits(_) => EventKind::Bits,
            Self::Subscription(_) => EventKind::Subscription,
            Self::GiftBatch(_) => EventKind::GiftBatch,
            Self::Raid(_) => EventKind::Raid,
            Self::Host(_) => EventKind::Host,
        }
    }
}
