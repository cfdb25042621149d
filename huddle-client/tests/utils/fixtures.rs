use crate::utils::{LoopbackNetwork, MockLinkFactory, MockTransport};
use huddle_client::{BatchConfig, EngineConfig, NegotiationEngine, SignalBatcher, TokioRuntime};
use huddle_core::{Participant, RoomId};
use serde_json::{Value, json};
use std::rc::Rc;
use std::time::Duration;

pub const ROOM: RoomId = RoomId(42);

pub fn participants(ids: &[u64]) -> Vec<Participant> {
    ids.iter()
        .map(|id| Participant::new(*id, format!("user{}", id)))
        .collect()
}

pub fn candidate(tag: &str) -> Value {
    json!({ "type": "candidate", "candidate": { "candidate": tag, "sdpMid": "0", "sdpMLineIndex": 0 } })
}

/// Lets queued events, batch windows and sends run to completion.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

pub fn batcher(transport: &MockTransport) -> SignalBatcher {
    SignalBatcher::new(
        TokioRuntime::shared(),
        Rc::new(transport.clone()),
        BatchConfig::default(),
    )
}

/// Engine for user `id` whose outbound signals land in `transport`.
pub fn solo_engine(
    id: u64,
    config: EngineConfig,
    links: &MockLinkFactory,
    transport: &MockTransport,
) -> NegotiationEngine {
    NegotiationEngine::new(
        ROOM,
        id.into(),
        config,
        TokioRuntime::shared(),
        Rc::new(links.clone()),
        batcher(transport),
    )
}

/// Engine for user `id` wired into `network`.
pub fn networked_engine(
    network: &Rc<LoopbackNetwork>,
    id: u64,
    config: EngineConfig,
    links: &MockLinkFactory,
) -> NegotiationEngine {
    let batcher = SignalBatcher::new(
        TokioRuntime::shared(),
        Rc::new(network.transport(id)),
        BatchConfig::default(),
    );
    let engine = NegotiationEngine::new(
        ROOM,
        id.into(),
        config,
        TokioRuntime::shared(),
        Rc::new(links.clone()),
        batcher,
    );
    network.attach(engine.clone());
    engine
}
