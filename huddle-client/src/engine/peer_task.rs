use crate::Timer;
use crate::engine::{ArmedTimer, PeerConnectionRecord, PeerContext, PeerEvent, PeerStatus, TimerKind};
use futures::StreamExt;
use futures::channel::mpsc;
use huddle_core::UserId;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, warn};

/// State machine of one remote user. Handles its queue strictly in order,
/// awaiting every link operation before taking the next event.
pub(crate) struct PeerTask {
    pub(super) remote: UserId,
    pub(super) ctx: Rc<PeerContext>,
    pub(super) tx: mpsc::UnboundedSender<PeerEvent>,
    pub(super) record: PeerConnectionRecord,
    status: Rc<RefCell<PeerStatus>>,
    next_seq: u64,
}

impl PeerTask {
    pub(crate) fn spawn(
        ctx: Rc<PeerContext>,
        remote: UserId,
    ) -> (mpsc::UnboundedSender<PeerEvent>, Rc<RefCell<PeerStatus>>) {
        let (tx, rx) = mpsc::unbounded();
        let status = Rc::new(RefCell::new(PeerStatus::default()));
        let task = PeerTask {
            remote,
            ctx: ctx.clone(),
            tx: tx.clone(),
            record: PeerConnectionRecord::new(),
            status: status.clone(),
            next_seq: 0,
        };
        ctx.runtime.spawn(Box::pin(task.run(rx)));
        (tx, status)
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<PeerEvent>) {
        while let Some(event) = rx.next().await {
            self.handle(event).await;
            *self.status.borrow_mut() = self.record.status();
            if self.record.closed {
                break;
            }
        }
        debug!(
            "Peer task for user {} in room {} finished",
            self.remote, self.ctx.room_id
        );
    }

    async fn handle(&mut self, event: PeerEvent) {
        match event {
            PeerEvent::Start => self.start().await,
            PeerEvent::Reevaluate => self.reevaluate().await,
            PeerEvent::Signal(signal) => self.on_signal(signal).await,
            PeerEvent::Link { epoch, event } => {
                if epoch != self.record.epoch || self.record.link.is_none() {
                    debug!("Dropping event from stale link #{} to user {}", epoch, self.remote);
                    return;
                }
                self.on_link_event(event).await;
            }
            PeerEvent::Timer { seq, kind } => {
                if !self.record.take_timer(kind, seq) {
                    return;
                }
                match kind {
                    TimerKind::ConnectDeadline => self.on_connect_deadline().await,
                    TimerKind::OfferRetry => self.on_offer_retry().await,
                    TimerKind::Restart => self.on_restart().await,
                }
            }
            PeerEvent::SetMuted(muted) => {
                if let Some(link) = &self.record.link {
                    if let Err(e) = link.set_audio_enabled(!muted).await {
                        warn!("Could not change audio on link to user {}: {}", self.remote, e);
                    }
                }
            }
            PeerEvent::Close => self.close().await,
        }
    }

    pub(super) fn arm(&mut self, kind: TimerKind, delay: Duration) {
        self.next_seq += 1;
        let seq = self.next_seq;
        let tx = self.tx.clone();
        let timer = Timer::start(&self.ctx.runtime, delay, move || {
            let _ = tx.unbounded_send(PeerEvent::Timer { seq, kind });
        });
        *self.record.timer_slot(kind) = Some(ArmedTimer { seq, _timer: timer });
    }

    pub(super) fn disarm(&mut self, kind: TimerKind) {
        *self.record.timer_slot(kind) = None;
    }

    async fn close(&mut self) {
        self.record.clear_timers();
        self.record.pending_candidates.clear();
        if let Some(link) = self.record.link.take() {
            link.close().await;
        }
        self.record.closed = true;
        debug!("Closed peer {} in room {}", self.remote, self.ctx.room_id);
    }
}
