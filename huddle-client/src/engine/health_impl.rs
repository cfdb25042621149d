use crate::engine::peer_task::PeerTask;
use crate::engine::{Health, RestartReason, TimerKind};
use crate::{LinkEvent, LinkState};
use huddle_core::SignalEvent;
use tracing::{debug, info, warn};

impl PeerTask {
    pub(super) async fn on_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::LocalCandidate(candidate) => {
                self.ctx.send(self.remote, SignalEvent::Candidate { candidate });
            }
            LinkEvent::AudioLevel(level) => {
                let changed = self.ctx.roster.borrow_mut().apply_level(self.remote, level);
                if let Some(speaking) = changed {
                    debug!("User {} speaking: {}", self.remote, speaking);
                }
            }
            LinkEvent::StateChanged(state) => self.on_link_state(state).await,
        }
    }

    async fn on_link_state(&mut self, state: LinkState) {
        match state {
            LinkState::New | LinkState::Connecting => {}
            LinkState::Connected => self.on_connected(),
            LinkState::Disconnected => {
                self.record.health = Health::Disconnected;
                self.schedule_restart(RestartReason::Disconnected).await;
            }
            LinkState::Failed | LinkState::Closed => {
                self.record.health = Health::Failed;
                self.schedule_restart(RestartReason::Failed).await;
            }
        }
    }

    fn on_connected(&mut self) {
        info!(
            "Connected to user {} in room {}",
            self.remote, self.ctx.room_id
        );
        self.record.health = Health::Connected;
        self.record.restart_attempts = 0;
        self.record.offer_attempts = 0;
        self.record.offers_exhausted = false;
        self.record.unreachable = false;
        self.disarm(TimerKind::ConnectDeadline);
        self.disarm(TimerKind::OfferRetry);
        self.disarm(TimerKind::Restart);
    }

    pub(super) async fn on_connect_deadline(&mut self) {
        if self.record.health == Health::Connected {
            return;
        }
        warn!(
            "Link to user {} not connected after {:?}",
            self.remote, self.ctx.config.connect_timeout
        );
        self.schedule_restart(RestartReason::Timeout).await;
    }

    pub(super) async fn schedule_restart(&mut self, reason: RestartReason) {
        if self.record.unreachable || self.record.closed {
            return;
        }
        if self.record.restart_attempts >= self.ctx.config.max_restart_attempts {
            self.give_up().await;
            return;
        }
        // A pending restart already covers a disconnect.
        if reason == RestartReason::Disconnected && self.record.restart.is_some() {
            return;
        }

        let delay = self
            .ctx
            .config
            .restart_delay(reason, self.record.restart_attempts);
        debug!(
            "Restart of link to user {} ({:?}) in {:?}",
            self.remote, reason, delay
        );
        self.arm(TimerKind::Restart, delay);
    }

    pub(super) async fn on_restart(&mut self) {
        if self.record.health == Health::Connected {
            return;
        }
        self.record.restart_attempts += 1;
        info!(
            "Restarting link to user {} (attempt {}/{})",
            self.remote, self.record.restart_attempts, self.ctx.config.max_restart_attempts
        );
        self.renew_link().await;
    }

    /// Fresh link with no timers, no queued candidates and a new tie-break.
    async fn renew_link(&mut self) {
        self.record.clear_timers();
        self.record.pending_candidates.clear();
        self.record.offer_attempts = 0;
        self.record.offers_exhausted = false;
        self.close_link().await;
        self.record.health = Health::Pending;
        if self.open_link().await {
            self.begin_negotiation().await;
        }
    }

    async fn give_up(&mut self) {
        warn!(
            "User {} unreachable after {} restarts",
            self.remote, self.record.restart_attempts
        );
        self.record.unreachable = true;
        self.record.clear_timers();
        self.record.pending_candidates.clear();
        self.close_link().await;
        self.record.health = Health::Failed;
    }

    /// Runs on every participant update that still lists this user.
    pub(super) async fn reevaluate(&mut self) {
        if !self.record.started {
            self.start().await;
            return;
        }
        let stalled = self.record.offers_exhausted && self.record.health != Health::Connected;
        if !self.record.unreachable && !stalled {
            return;
        }

        info!("Retrying user {} after participant update", self.remote);
        self.record.unreachable = false;
        self.record.restart_attempts = 0;
        self.renew_link().await;
    }
}
