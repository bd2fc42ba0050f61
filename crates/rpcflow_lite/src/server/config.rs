use std::time::Duration;

/// Configuration for the RPC router.
#[derive(Debug, Clone)]
pub struct RpcRouterConfig {
    /// Capacity of the per-call queue between the inbound feed and a
    /// streaming handler.
    pub feed_buffer: usize,

    /// Deadline applied to calls whose header carries none.
    pub default_deadline: Option<Duration>,
}

impl Default for RpcRouterConfig {
    fn default() -> Self {
        Self {
            feed_buffer: 16,
            default_deadline: None,
        }
    }
}

impl RpcRouterConfig {
    /// Set the feed queue capacity.
    pub fn with_feed_buffer(mut self, capacity: usize) -> Self {
        self.feed_buffer = capacity;
        self
    }

    /// Set the deadline applied when a call specifies none.
    pub fn with_default_deadline(mut self, deadline: Duration) -> Self {
        self.default_deadline = Some(deadline);
        self
    }
}
