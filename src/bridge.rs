//! Stream event bridge.
//!
//! [`StreamBridge`] owns the live platform connection and translates each
//! raw callback into exactly one typed domain event. Gift-subscription
//! notifications are the exception: they are forwarded into the
//! [`GiftSubAggregator`] and surface later as a single coalesced
//! [`GiftSubBatch`](crate::event::GiftSubBatch) event per gifter, emitted by
//! the flush scheduler.
//!
//! The bridge is an explicit handle: every instance carries its own
//! aggregator, scheduler and handler registry, so independent bridges can
//! coexist and tests can tear one down cleanly via [`StreamBridge::shutdown`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::aggregator::GiftSubAggregator;
use crate::client::{ClientConnection, Credentials, PlatformClient, RawEvent};
use crate::config::BridgeConfig;
use crate::dispatch::{Dispatcher, EventSubscription};
use crate::error::{Error, HandlerError, Result};
use crate::event::{
    Bits, ChatMessage, EventKind, Follow, Host, Raid, StreamEvent, Subscription, SubscriptionTier,
};
use crate::scheduler::FlushScheduler;

/// Metadata for the active platform connection.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    /// Underlying connection ID
    pub id: String,
    /// Channel being listened to
    pub channel_id: String,
    /// Platform identifier
    pub platform: String,
    /// Connection start time
    pub connected_at: DateTime<Utc>,
}

/// Bridge between a platform chat/event client and typed domain events.
pub struct StreamBridge {
    client: Arc<dyn PlatformClient>,
    dispatcher: Arc<Dispatcher>,
    aggregator: Arc<GiftSubAggregator>,
    scheduler: FlushScheduler,
    /// Claimed by the first `initialize` call
    initialized: AtomicBool,
    connection: parking_lot::Mutex<Option<ConnectionInfo>>,
    receive_task: parking_lot::Mutex<Option<JoinHandle<()>>>,
    cancel_token: CancellationToken,
}

impl StreamBridge {
    /// Create a new bridge around a platform client.
    ///
    /// The flush scheduler starts ticking immediately; call
    /// [`initialize`](Self::initialize) to connect to the platform. Must be
    /// called from within a tokio runtime.
    pub fn new(client: Arc<dyn PlatformClient>, config: BridgeConfig) -> Self {
        let dispatcher = Dispatcher::new(config.event_buffer_size);
        let aggregator = Arc::new(GiftSubAggregator::new());
        let cancel_token = CancellationToken::new();
        let scheduler = FlushScheduler::spawn(
            Arc::clone(&aggregator),
            Arc::clone(&dispatcher),
            &config,
            cancel_token.child_token(),
        );

        Self {
            client,
            dispatcher,
            aggregator,
            scheduler,
            initialized: AtomicBool::new(false),
            connection: parking_lot::Mutex::new(None),
            receive_task: parking_lot::Mutex::new(None),
            cancel_token,
        }
    }

    /// Connect to the platform and start translating raw callbacks.
    ///
    /// Must be called exactly once; a second call fails with
    /// [`Error::AlreadyInitialized`].
    pub async fn initialize(
        &self,
        channel_id: &str,
        username: &str,
        credential: &str,
    ) -> Result<()> {
        if self
            .initialized
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            let channel = self
                .connection
                .lock()
                .as_ref()
                .map(|info| info.channel_id.clone())
                .unwrap_or_else(|| channel_id.to_string());
            return Err(Error::AlreadyInitialized(channel));
        }

        let credentials = Credentials::new(username, credential);
        let connection = match self.client.connect(channel_id, &credentials).await {
            Ok(connection) => connection,
            Err(e) => {
                // Leave the bridge usable for a retry.
                self.initialized.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };

        *self.connection.lock() = Some(ConnectionInfo {
            id: connection.id.clone(),
            channel_id: connection.channel_id.clone(),
            platform: self.client.platform().to_string(),
            connected_at: connection.connected_at,
        });

        let handle = tokio::spawn(run_receive_loop(
            Arc::clone(&self.client),
            Arc::clone(&self.dispatcher),
            Arc::clone(&self.aggregator),
            connection,
            self.cancel_token.child_token(),
        ));
        *self.receive_task.lock() = Some(handle);

        Ok(())
    }

    /// Register a handler for one domain event kind.
    ///
    /// Handlers for a kind run in registration order; a failing handler is
    /// logged and isolated from the others. The returned subscription handle
    /// revokes the handler on `unsubscribe`.
    pub fn on_event<F>(&self, kind: EventKind, handler: F) -> EventSubscription
    where
        F: Fn(&StreamEvent) -> std::result::Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.dispatcher.register(kind, handler)
    }

    /// Subscribe to all domain events via a broadcast channel.
    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.dispatcher.subscribe()
    }

    /// Feed a synthetic gift-subscription event into the aggregator.
    ///
    /// Works without a live connection; used for deterministic testing of
    /// the coalescing behavior.
    pub fn inject_gift(&self, gifter: Option<&str>, recipient: &str, tier: SubscriptionTier) {
        self.aggregator.append(gifter, tier, recipient);
    }

    /// Metadata for the live connection.
    ///
    /// Fails with [`Error::Uninitialized`] before `initialize` completes.
    pub fn connection(&self) -> Result<ConnectionInfo> {
        self.connection.lock().clone().ok_or(Error::Uninitialized)
    }

    /// Number of gift-sub batches currently open in the aggregator.
    pub fn open_batches(&self) -> usize {
        self.aggregator.len()
    }

    /// Stop the receive loop and the flush scheduler and release the
    /// connection.
    ///
    /// Gift-sub batches still open in the aggregator are not flushed; a
    /// caller needing a final flush must wait out the idle window before
    /// shutting down. Idempotent.
    pub async fn shutdown(&self) {
        self.cancel_token.cancel();

        let receive_task = self.receive_task.lock().take();
        if let Some(handle) = receive_task {
            let _ = handle.await;
        }
        self.scheduler.stop().await;

        *self.connection.lock() = None;
    }
}

/// Receive raw callbacks until cancelled or the client fails.
async fn run_receive_loop(
    client: Arc<dyn PlatformClient>,
    dispatcher: Arc<Dispatcher>,
    aggregator: Arc<GiftSubAggregator>,
    mut connection: ClientConnection,
    cancel_token: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;

            _ = cancel_token.cancelled() => {
                let _ = client.disconnect(&mut connection).await;
                break;
            }

            result = client.receive(&connection) => {
                match result {
                    Ok(Some(raw)) => translate(&dispatcher, &aggregator, raw),
                    Ok(None) => {
                        // No event available, wait a bit
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "platform receive failed, stopping");
                        let _ = client.disconnect(&mut connection).await;
                        break;
                    }
                }
            }
        }
    }
}

/// Translate one raw callback into at most one domain event.
///
/// Gift subscriptions go into the aggregator instead of being emitted per
/// recipient. A textual numeric field that fails to parse drops the single
/// originating event with a diagnostic; the loop is unaffected.
fn translate(dispatcher: &Dispatcher, aggregator: &GiftSubAggregator, raw: RawEvent) {
    match raw {
        RawEvent::Chat {
            id,
            username,
            is_moderator,
            content,
        } => {
            dispatcher.dispatch(StreamEvent::Chat(ChatMessage {
                id,
                username,
                is_moderator,
                content,
                timestamp: Utc::now(),
            }));
        }
        RawEvent::Follow { username } => {
            dispatcher.dispatch(StreamEvent::Follow(Follow { username }));
        }
        RawEvent::Bits { username, amount } => {
            dispatcher.dispatch(StreamEvent::Bits(Bits { username, amount }));
        }
        RawEvent::Subscription {
            username,
            message,
            cumulative_months,
            streak_months,
            tier,
        } => {
            let cumulative = parse_u32("cumulative_months", &cumulative_months);
            let streak = parse_u32("streak_months", &streak_months);
            match (cumulative, streak) {
                (Ok(cumulative_months), Ok(streak_months)) => {
                    dispatcher.dispatch(StreamEvent::Subscription(Subscription {
                        username,
                        message,
                        cumulative_months,
                        streak_months,
                        tier,
                    }));
                }
                (Err(e), _) | (_, Err(e)) => {
                    tracing::warn!(username = %username, error = %e, "dropping subscription event");
                }
            }
        }
        RawEvent::GiftSub {
            gifter,
            recipient,
            tier,
        } => {
            aggregator.append(gifter.as_deref(), tier, &recipient);
        }
        RawEvent::Raid {
            username,
            party_size,
        } => match parse_u32("party_size", &party_size) {
            Ok(party_size) => {
                dispatcher.dispatch(StreamEvent::Raid(Raid {
                    username,
                    party_size,
                }));
            }
            Err(e) => {
                tracing::warn!(username = %username, error = %e, "dropping raid event");
            }
        },
        RawEvent::Host { channel } => {
            dispatcher.dispatch(StreamEvent::Host(Host { channel }));
        }
    }
}

fn parse_u32(field: &'static str, value: &str) -> Result<u32> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::malformed_field(field, value))
}
