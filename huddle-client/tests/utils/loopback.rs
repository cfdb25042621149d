use async_trait::async_trait;
use huddle_client::{NegotiationEngine, SignalTransport, TransportError};
use huddle_core::{RoomId, SignalEvent, SignalPayload, UserId};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

/// In-process relay between engines. While the gate is closed deliveries
/// are held back, which lets a test line up colliding offers.
pub struct LoopbackNetwork {
    engines: RefCell<HashMap<UserId, NegotiationEngine>>,
    gate_open: Cell<bool>,
    held: RefCell<Vec<(UserId, UserId, Value)>>,
    log: RefCell<Vec<(UserId, UserId, SignalEvent)>>,
}

impl LoopbackNetwork {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            engines: RefCell::new(HashMap::new()),
            gate_open: Cell::new(true),
            held: RefCell::new(Vec::new()),
            log: RefCell::new(Vec::new()),
        })
    }

    pub fn transport(self: &Rc<Self>, from: u64) -> LoopbackTransport {
        LoopbackTransport {
            from: UserId(from),
            network: self.clone(),
        }
    }

    pub fn attach(&self, engine: NegotiationEngine) {
        self.engines.borrow_mut().insert(engine.local_id(), engine);
    }

    pub fn close_gate(&self) {
        self.gate_open.set(false);
    }

    pub fn open_gate(&self) {
        self.gate_open.set(true);
        let held = std::mem::take(&mut *self.held.borrow_mut());
        for (from, to, data) in held {
            self.deliver(from, to, &data);
        }
    }

    pub fn held(&self) -> usize {
        self.held.borrow().len()
    }

    /// Events sent by `from`, in send order.
    pub fn sent_by(&self, from: u64) -> Vec<SignalEvent> {
        self.log
            .borrow()
            .iter()
            .filter(|(sender, _, _)| *sender == UserId(from))
            .map(|(_, _, event)| event.clone())
            .collect()
    }

    fn deliver(&self, from: UserId, to: UserId, data: &Value) {
        if let Some(engine) = self.engines.borrow().get(&to) {
            engine.handle_signal(from, data);
        }
    }
}

pub struct LoopbackTransport {
    from: UserId,
    network: Rc<LoopbackNetwork>,
}

#[async_trait(?Send)]
impl SignalTransport for LoopbackTransport {
    async fn send(&self, _room_id: RoomId, payload: SignalPayload) -> Result<(), TransportError> {
        for (to, data) in payload.into_deliveries() {
            if let Ok(event) = data.to_event() {
                self.network.log.borrow_mut().push((self.from, to, event));
            }
            let data = data.into_value();
            if self.network.gate_open.get() {
                self.network.deliver(self.from, to, &data);
            } else {
                self.network.held.borrow_mut().push((self.from, to, data));
            }
        }
        Ok(())
    }
}
