//! Bridge configuration.

/// Configuration for a [`StreamBridge`](crate::bridge::StreamBridge).
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Idle window for gift-sub coalescing in milliseconds. A gifter's batch
    /// is emitted once no gift for that gifter has arrived for this long.
    pub idle_threshold_ms: u64,
    /// Flush scheduler tick interval in milliseconds.
    pub tick_interval_ms: u64,
    /// Buffer size for the broadcast event channel.
    pub event_buffer_size: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            idle_threshold_ms: 1000,
            tick_interval_ms: 1000,
            event_buffer_size: 256,
        }
    }
}
