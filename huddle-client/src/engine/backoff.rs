use crate::{EngineConfig, RestartReason};
use std::time::Duration;

const MAX_SHIFT: u32 = 16;

impl EngineConfig {
    /// Wait before offer retry number `attempts + 1`.
    pub fn offer_retry_delay(&self, attempts: u32) -> Duration {
        self.offer_retry_base
            .saturating_mul(1u32 << attempts.min(MAX_SHIFT))
    }

    /// Wait before restart number `attempts + 1`. The first restart after a
    /// failure is immediate; a disconnected link always gets the grace period.
    pub fn restart_delay(&self, reason: RestartReason, attempts: u32) -> Duration {
        let backoff = match attempts {
            0 => Duration::ZERO,
            n => self
                .restart_base
                .saturating_mul(1u32 << (n - 1).min(MAX_SHIFT))
                .min(self.restart_max_delay),
        };

        match reason {
            RestartReason::Failed | RestartReason::Timeout => backoff,
            RestartReason::Disconnected => backoff.max(self.disconnect_grace),
        }
    }
}
