use std::time::Duration;

/// Timers and limits of the negotiation state machine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Delay before the first offer retry; doubles per attempt.
    pub offer_retry_base: Duration,
    pub max_offer_attempts: u32,
    /// Deadline for a fresh link to reach `connected`.
    pub connect_timeout: Duration,
    /// Minimum wait before restarting a `disconnected` link.
    pub disconnect_grace: Duration,
    pub restart_base: Duration,
    pub restart_max_delay: Duration,
    pub max_restart_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            offer_retry_base: Duration::from_secs(2),
            max_offer_attempts: 3,
            connect_timeout: Duration::from_secs(15),
            disconnect_grace: Duration::from_secs(3),
            restart_base: Duration::from_secs(1),
            restart_max_delay: Duration::from_secs(30),
            max_restart_attempts: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchConfig {
    /// Quiet period after the last queued candidate before it is flushed.
    pub candidate_debounce: Duration,
    pub max_batch: usize,
    /// Window in which flushes for different recipients of one room share a request.
    pub coalesce_window: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            candidate_debounce: Duration::from_millis(50),
            max_batch: 10,
            coalesce_window: Duration::from_millis(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub base_url: String,
    pub token: String,
    /// Join is re-posted at this interval to renew presence. Keep it below the server TTL.
    pub heartbeat_interval: Duration,
}

impl SessionConfig {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            heartbeat_interval: Duration::from_secs(20),
        }
    }
}
