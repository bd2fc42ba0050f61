use std::time::Duration;

/// Per-call options on the caller side.
#[derive(Debug, Clone)]
pub struct CallOptions {
    /// Time budget for the call; the server arms a timer and cancels the
    /// call when it elapses.
    pub deadline: Option<Duration>,

    /// Capacity of each direction's frame channel.
    pub channel_capacity: usize,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            deadline: None,
            channel_capacity: 16,
        }
    }
}

impl CallOptions {
    /// Set the call deadline.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set the frame channel capacity.
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }
}
