use crate::engine::peer_task::PeerTask;
use crate::engine::{Health, RestartReason, SignalingState, TimerKind};
use crate::{LinkEvents, SdpKind};
use huddle_core::{IceCandidate, SignalEvent};
use tracing::{debug, info, warn};

impl PeerTask {
    /// The lower id of a pair makes the first offer and wins collisions.
    pub(super) fn is_initiator(&self) -> bool {
        self.ctx.local_id < self.remote
    }

    pub(super) async fn start(&mut self) {
        if self.record.started {
            return;
        }
        self.record.started = true;

        // Already answering an offer that arrived before the participant list.
        if self.record.link.is_some()
            && (self.record.negotiated || self.record.signaling != SignalingState::Stable)
        {
            return;
        }
        if self.ensure_link().await {
            self.begin_negotiation().await;
        }
    }

    pub(super) async fn begin_negotiation(&mut self) {
        if self.is_initiator() {
            info!(
                "Offering to user {} in room {}",
                self.remote, self.ctx.room_id
            );
            self.send_offer().await;
        }
        self.arm_offer_retry();
    }

    fn arm_offer_retry(&mut self) {
        let delay = self.ctx.config.offer_retry_delay(self.record.offer_attempts);
        self.arm(TimerKind::OfferRetry, delay);
    }

    pub(super) async fn on_offer_retry(&mut self) {
        if self.record.negotiated {
            return;
        }
        self.record.offer_attempts += 1;
        if self.record.offer_attempts > self.ctx.config.max_offer_attempts {
            self.record.offers_exhausted = true;
            info!(
                "No answer from user {} after {} offer retries, waiting for the next participant update",
                self.remote, self.ctx.config.max_offer_attempts
            );
            return;
        }

        match self.record.signaling {
            SignalingState::HaveRemoteOffer => {
                self.arm_offer_retry();
                return;
            }
            SignalingState::HaveLocalOffer => {
                if !self.roll_back().await {
                    return;
                }
            }
            SignalingState::Stable => {}
        }

        debug!(
            "Offer retry {} to user {}",
            self.record.offer_attempts, self.remote
        );
        self.send_offer().await;
        self.arm_offer_retry();
    }

    async fn send_offer(&mut self) {
        if !self.ensure_link().await {
            return;
        }
        let result = match &self.record.link {
            Some(link) => link.create_offer().await,
            None => return,
        };
        match result {
            Ok(sdp) => {
                self.record.signaling = SignalingState::HaveLocalOffer;
                self.ctx.send(self.remote, SignalEvent::Offer { sdp });
            }
            Err(e) => warn!("Could not create offer for user {}: {}", self.remote, e),
        }
    }

    pub(super) async fn on_signal(&mut self, event: SignalEvent) {
        match event {
            SignalEvent::Offer { sdp } => self.on_remote_offer(sdp).await,
            SignalEvent::Answer { sdp } => self.on_remote_answer(sdp).await,
            SignalEvent::Candidate { candidate } => self.on_remote_candidate(candidate).await,
        }
    }

    async fn on_remote_offer(&mut self, sdp: String) {
        match self.record.signaling {
            SignalingState::HaveLocalOffer if self.is_initiator() => {
                debug!(
                    "Offer collision with user {}, keeping our own offer",
                    self.remote
                );
                return;
            }
            SignalingState::HaveLocalOffer => {
                info!(
                    "Offer collision with user {}, rolling back our offer",
                    self.remote
                );
                if !self.roll_back().await {
                    return;
                }
            }
            SignalingState::HaveRemoteOffer => {
                debug!("Duplicate offer from user {} ignored", self.remote);
                return;
            }
            SignalingState::Stable if self.record.negotiated => {
                info!(
                    "User {} started a new negotiation, replacing the link",
                    self.remote
                );
                if !self.replace_link().await {
                    return;
                }
            }
            SignalingState::Stable => {}
        }

        self.accept_offer(sdp).await;
    }

    async fn accept_offer(&mut self, sdp: String) {
        if !self.ensure_link().await {
            return;
        }
        let applied = match &self.record.link {
            Some(link) => link.set_remote_description(SdpKind::Offer, &sdp).await,
            None => return,
        };
        if let Err(e) = applied {
            warn!("Could not apply offer from user {}: {}", self.remote, e);
            return;
        }
        self.record.signaling = SignalingState::HaveRemoteOffer;
        self.record.remote_description_set = true;
        self.record.remote_ufrag = sdp_ufrag(&sdp).map(str::to_string);
        self.flush_candidates().await;

        let answer = match &self.record.link {
            Some(link) => link.create_answer().await,
            None => return,
        };
        match answer {
            Ok(sdp) => {
                self.record.signaling = SignalingState::Stable;
                self.record.negotiated = true;
                self.disarm(TimerKind::OfferRetry);
                self.ctx.send(self.remote, SignalEvent::Answer { sdp });
            }
            Err(e) => warn!("Could not answer user {}: {}", self.remote, e),
        }
    }

    async fn on_remote_answer(&mut self, sdp: String) {
        if self.record.signaling != SignalingState::HaveLocalOffer {
            debug!(
                "Answer from user {} out of turn ({:?}) ignored",
                self.remote, self.record.signaling
            );
            return;
        }
        let applied = match &self.record.link {
            Some(link) => link.set_remote_description(SdpKind::Answer, &sdp).await,
            None => return,
        };
        if let Err(e) = applied {
            warn!("Could not apply answer from user {}: {}", self.remote, e);
            return;
        }
        self.record.signaling = SignalingState::Stable;
        self.record.remote_description_set = true;
        self.record.remote_ufrag = sdp_ufrag(&sdp).map(str::to_string);
        self.record.negotiated = true;
        self.disarm(TimerKind::OfferRetry);
        self.flush_candidates().await;
    }

    async fn on_remote_candidate(&mut self, candidate: IceCandidate) {
        if !self.belongs_to_current_link(&candidate) {
            self.record.pending_candidates.push_back(candidate);
            debug!(
                "Queued candidate from user {} ({} waiting)",
                self.remote,
                self.record.pending_candidates.len()
            );
            return;
        }
        self.apply_candidate(candidate).await;
    }

    fn belongs_to_current_link(&self, candidate: &IceCandidate) -> bool {
        if !self.record.remote_description_set || self.record.link.is_none() {
            return false;
        }
        if let (Some(theirs), Some(current)) =
            (candidate_ufrag(candidate), self.record.remote_ufrag.as_deref())
        {
            return theirs == current;
        }
        // Once the link has settled, an unlabelled candidate may be the
        // first of the peer's next session, racing its offer.
        !(self.record.negotiated && self.record.health != Health::Pending)
    }

    async fn flush_candidates(&mut self) {
        while let Some(candidate) = self.record.pending_candidates.pop_front() {
            if let (Some(theirs), Some(current)) =
                (candidate_ufrag(&candidate), self.record.remote_ufrag.as_deref())
            {
                if theirs != current {
                    debug!(
                        "Dropped candidate from an earlier session of user {}",
                        self.remote
                    );
                    continue;
                }
            }
            self.apply_candidate(candidate).await;
        }
    }

    async fn apply_candidate(&mut self, candidate: IceCandidate) {
        let Some(link) = &self.record.link else {
            return;
        };
        if let Err(e) = link.add_ice_candidate(&candidate).await {
            warn!("Could not add candidate from user {}: {}", self.remote, e);
        }
    }

    /// Drops our pending offer. Links that cannot roll back are replaced,
    /// keeping the queued remote candidates.
    async fn roll_back(&mut self) -> bool {
        let result = match &self.record.link {
            Some(link) => link.rollback().await,
            None => Ok(()),
        };
        match result {
            Ok(()) => {
                self.record.signaling = SignalingState::Stable;
                true
            }
            Err(e) => {
                debug!("{} for user {}, replacing the link", e, self.remote);
                self.replace_link().await
            }
        }
    }

    async fn replace_link(&mut self) -> bool {
        self.close_link().await;
        self.open_link().await
    }

    pub(super) async fn close_link(&mut self) {
        if let Some(link) = self.record.link.take() {
            link.close().await;
        }
        self.record.signaling = SignalingState::Stable;
        self.record.remote_description_set = false;
        self.record.remote_ufrag = None;
        self.record.negotiated = false;
    }

    pub(super) async fn ensure_link(&mut self) -> bool {
        if self.record.link.is_some() {
            return true;
        }
        self.open_link().await
    }

    pub(super) async fn open_link(&mut self) -> bool {
        self.record.epoch += 1;
        let epoch = self.record.epoch;
        let events = LinkEvents::new(self.tx.clone(), epoch);

        let created = self.ctx.factory.create(self.remote, events).await;
        match created {
            Ok(link) => {
                if self.ctx.muted.get() {
                    if let Err(e) = link.set_audio_enabled(false).await {
                        warn!("Could not mute new link to user {}: {}", self.remote, e);
                    }
                }
                self.record.link = Some(link);
                self.record.health = Health::Pending;
                if self.record.connect_deadline.is_none() {
                    self.arm(TimerKind::ConnectDeadline, self.ctx.config.connect_timeout);
                }
                debug!("Opened link #{} to user {}", epoch, self.remote);
                true
            }
            Err(e) => {
                warn!("Could not open link to user {}: {}", self.remote, e);
                self.schedule_restart(RestartReason::Failed).await;
                false
            }
        }
    }
}

fn sdp_ufrag(sdp: &str) -> Option<&str> {
    sdp.lines()
        .find_map(|line| line.trim().strip_prefix("a=ice-ufrag:"))
        .map(str::trim)
}

/// The candidate's ICE username fragment, from its own field or the
/// `ufrag` extension of the candidate line.
fn candidate_ufrag(candidate: &IceCandidate) -> Option<&str> {
    if let Some(ufrag) = candidate.username_fragment.as_deref() {
        return Some(ufrag);
    }
    let mut parts = candidate.candidate.split_whitespace();
    parts.find(|part| *part == "ufrag")?;
    parts.next()
}
