//! Platform client trait and raw callback types.
//!
//! Defines the seam between the bridge and the underlying chat/pubsub
//! transport. The transport itself (IRC connection management, pubsub topic
//! subscriptions, authentication) lives outside this crate; implementations
//! of [`PlatformClient`] adapt it to the raw event stream consumed by the
//! bridge.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::event::SubscriptionTier;

/// Credentials for connecting to the platform chat.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Bot/streamer account username
    pub username: String,
    /// OAuth token
    pub token: String,
}

impl Credentials {
    /// Create new credentials.
    pub fn new(username: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            token: token.into(),
        }
    }
}

/// A raw platform callback, one variant per low-level notification.
///
/// Numeric fields the platform delivers as text (raid party size, resub month
/// counts) stay text here; the bridge parses them at its boundary so that a
/// malformed value drops only the single originating event.
#[derive(Debug, Clone)]
pub enum RawEvent {
    /// Chat message received
    Chat {
        id: String,
        username: String,
        is_moderator: bool,
        content: String,
    },
    /// New follower
    Follow { username: String },
    /// Bits/cheer received
    Bits { username: String, amount: u64 },
    /// New subscription or resubscription
    Subscription {
        username: String,
        message: Option<String>,
        cumulative_months: String,
        streak_months: String,
        tier: SubscriptionTier,
    },
    /// One gifted-subscription recipient notification. The platform sends one
    /// of these per recipient with no batch terminator; `gifter` is `None`
    /// when the gift is marked anonymous.
    GiftSub {
        gifter: Option<String>,
        recipient: String,
        tier: SubscriptionTier,
    },
    /// Incoming raid
    Raid {
        username: String,
        party_size: String,
    },
    /// Incoming host
    Host { channel: String },
}

/// Connection handle for an active platform chat session.
#[derive(Debug)]
pub struct ClientConnection {
    /// Unique connection ID
    pub id: String,
    /// Channel being listened to
    pub channel_id: String,
    /// Whether the connection is active
    pub is_connected: bool,
    /// Connection start time
    pub connected_at: DateTime<Utc>,
}

impl ClientConnection {
    /// Create a new connection handle.
    pub fn new(id: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            channel_id: channel_id.into(),
            is_connected: false,
            connected_at: Utc::now(),
        }
    }

    /// Mark the connection as connected.
    pub fn set_connected(&mut self) {
        self.is_connected = true;
        self.connected_at = Utc::now();
    }

    /// Mark the connection as disconnected.
    pub fn set_disconnected(&mut self) {
        self.is_connected = false;
    }
}

/// Trait for platform-specific chat/event clients.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Get the platform name this client handles.
    fn platform(&self) -> &str;

    /// Connect to the chat/event stream for a channel.
    async fn connect(
        &self,
        channel_id: &str,
        credentials: &Credentials,
    ) -> Result<ClientConnection>;

    /// Disconnect from the chat/event stream.
    async fn disconnect(&self, connection: &mut ClientConnection) -> Result<()>;

    /// Receive the next raw event.
    /// Returns `Ok(None)` if no event is currently available.
    async fn receive(&self, connection: &ClientConnection) -> Result<Option<RawEvent>>;
}
