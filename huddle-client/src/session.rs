use crate::{
    EngineConfig, LinkFactory, NegotiationEngine, RoomApi, RosterEntry, SessionConfig,
    SharedRuntime, SignalBatcher, TransportError,
};
use futures::future::{AbortHandle, Abortable};
use huddle_core::utils::room_channel;
use huddle_core::{PushFrame, RoomId, RoomMessage, RoomSummary, UserId};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Joined,
    Left,
    Kicked,
    /// The server refused to renew our presence.
    Rejected,
}

struct SessionInner {
    state: SessionState,
    room: Option<RoomSummary>,
    engine: Option<NegotiationEngine>,
    heartbeat: Option<AbortHandle>,
}

/// The local user's presence in one room: join, heartbeat, push handling
/// and leave, driving a [`NegotiationEngine`] for the peer links.
pub struct RoomSession {
    local_id: UserId,
    api: Rc<dyn RoomApi>,
    factory: Rc<dyn LinkFactory>,
    batcher: SignalBatcher,
    runtime: SharedRuntime,
    config: SessionConfig,
    engine_config: EngineConfig,
    inner: Rc<RefCell<SessionInner>>,
}

impl RoomSession {
    pub fn new(
        local_id: UserId,
        api: Rc<dyn RoomApi>,
        factory: Rc<dyn LinkFactory>,
        batcher: SignalBatcher,
        runtime: SharedRuntime,
        config: SessionConfig,
        engine_config: EngineConfig,
    ) -> Self {
        Self {
            local_id,
            api,
            factory,
            batcher,
            runtime,
            config,
            engine_config,
            inner: Rc::new(RefCell::new(SessionInner {
                state: SessionState::Idle,
                room: None,
                engine: None,
                heartbeat: None,
            })),
        }
    }

    pub fn state(&self) -> SessionState {
        self.inner.borrow().state
    }

    pub fn room(&self) -> Option<RoomSummary> {
        self.inner.borrow().room.clone()
    }

    pub fn engine(&self) -> Option<NegotiationEngine> {
        self.inner.borrow().engine.clone()
    }

    pub fn roster(&self) -> Vec<RosterEntry> {
        self.engine().map(|engine| engine.roster()).unwrap_or_default()
    }

    /// Joins `room` (id or slug) and starts negotiating with everyone present.
    /// Joining again while joined only renews presence.
    pub async fn join(&self, room: &str) -> Result<RoomSummary, TransportError> {
        let summary = self.api.join(room).await?;

        if let Some(engine) = self.engine() {
            if engine.room_id() == summary.id {
                engine.handle_participants(&summary.active_participants);
                self.inner.borrow_mut().room = Some(summary.clone());
                return Ok(summary);
            }
            self.teardown(SessionState::Left);
        }

        let engine = NegotiationEngine::new(
            summary.id,
            self.local_id,
            self.engine_config.clone(),
            self.runtime.clone(),
            self.factory.clone(),
            self.batcher.clone(),
        );
        engine.handle_participants(&summary.active_participants);
        let heartbeat = self.spawn_heartbeat(summary.id);

        info!(
            "Joined room {} with {} participant(s)",
            summary.id,
            summary.active_participants.len()
        );
        let mut inner = self.inner.borrow_mut();
        inner.state = SessionState::Joined;
        inner.room = Some(summary.clone());
        inner.engine = Some(engine);
        inner.heartbeat = Some(heartbeat);
        Ok(summary)
    }

    fn spawn_heartbeat(&self, room_id: RoomId) -> AbortHandle {
        let (handle, registration) = AbortHandle::new_pair();
        let api = self.api.clone();
        let runtime = self.runtime.clone();
        let inner = self.inner.clone();
        let interval = self.config.heartbeat_interval;

        let beat = async move {
            let key = room_id.to_string();
            loop {
                runtime.sleep(interval).await;
                match api.join(&key).await {
                    Ok(summary) => {
                        let engine = inner.borrow().engine.clone();
                        if let Some(engine) = engine {
                            engine.handle_participants(&summary.active_participants);
                        }
                    }
                    Err(e) if e.is_client_error() => {
                        warn!("Heartbeat for room {} rejected, leaving: {}", room_id, e);
                        teardown(&inner, SessionState::Rejected);
                        return;
                    }
                    Err(e) => warn!("Heartbeat for room {} failed: {}", room_id, e),
                }
            }
        };
        self.runtime.spawn(Box::pin(async move {
            let _ = Abortable::new(beat, registration).await;
        }));
        handle
    }

    /// Stops the heartbeat, closes every peer and tells the server.
    pub async fn leave(&self) -> Result<(), TransportError> {
        let Some(room_id) = self.teardown(SessionState::Left) else {
            return Ok(());
        };
        self.api.leave(room_id).await
    }

    /// Feeds one push frame. Frames for other channels are ignored.
    pub fn handle_push(&self, frame: &PushFrame) {
        let Some(engine) = self.engine() else {
            return;
        };
        if frame.channel != room_channel(engine.room_id()) {
            return;
        }
        let message: RoomMessage = match serde_json::from_value(frame.data.clone()) {
            Ok(message) => message,
            Err(e) => {
                debug!("Ignoring push on {}: {}", frame.channel, e);
                return;
            }
        };

        if let RoomMessage::Kicked { room_id } = message {
            warn!("Removed from room {}", room_id);
            self.teardown(SessionState::Kicked);
            return;
        }
        engine.handle_message(&message);
    }

    pub fn set_muted(&self, muted: bool) {
        if let Some(engine) = self.engine() {
            engine.set_muted(muted);
        }
    }

    fn teardown(&self, next: SessionState) -> Option<RoomId> {
        teardown(&self.inner, next)
    }
}

fn teardown(inner: &RefCell<SessionInner>, next: SessionState) -> Option<RoomId> {
    let (engine, room_id) = {
        let mut inner = inner.borrow_mut();
        if let Some(heartbeat) = inner.heartbeat.take() {
            heartbeat.abort();
        }
        inner.state = next;
        (inner.engine.take(), inner.room.take().map(|room| room.id))
    };
    if let Some(engine) = engine {
        engine.shutdown();
    }
    room_id
}
