use async_trait::async_trait;
use huddle_client::{RoomApi, TransportError};
use huddle_core::{IceServerConfig, Participant, RoomId, RoomSummary};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Room API answering joins with a configurable participant list.
#[derive(Clone)]
pub struct MockRoomApi {
    room: RoomSummary,
    participants: Rc<RefCell<Vec<Participant>>>,
    joins: Rc<Cell<usize>>,
    join_error: Rc<RefCell<Option<TransportError>>>,
    leaves: Rc<RefCell<Vec<RoomId>>>,
}

impl MockRoomApi {
    pub fn new(room_id: RoomId, participants: Vec<Participant>) -> Self {
        Self {
            room: RoomSummary {
                id: room_id,
                name: "Watercooler".into(),
                slug: "watercooler".into(),
                description: None,
                public: true,
                max_participants: None,
                member_count: 0,
                active_participants: Vec::new(),
            },
            participants: Rc::new(RefCell::new(participants)),
            joins: Rc::new(Cell::new(0)),
            join_error: Rc::new(RefCell::new(None)),
            leaves: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn set_participants(&self, participants: Vec<Participant>) {
        *self.participants.borrow_mut() = participants;
    }

    /// Every later join fails with `err`.
    pub fn fail_joins(&self, err: TransportError) {
        *self.join_error.borrow_mut() = Some(err);
    }

    pub fn joins(&self) -> usize {
        self.joins.get()
    }

    pub fn leaves(&self) -> Vec<RoomId> {
        self.leaves.borrow().clone()
    }
}

#[async_trait(?Send)]
impl RoomApi for MockRoomApi {
    async fn join(&self, room: &str) -> Result<RoomSummary, TransportError> {
        if room != self.room.slug && room != self.room.id.to_string() {
            return Err(TransportError::Rejected {
                status: 404,
                message: "not found".into(),
            });
        }
        self.joins.set(self.joins.get() + 1);
        if let Some(err) = self.join_error.borrow().clone() {
            return Err(err);
        }
        let mut summary = self.room.clone();
        summary.active_participants = self.participants.borrow().clone();
        Ok(summary)
    }

    async fn leave(&self, room_id: RoomId) -> Result<(), TransportError> {
        self.leaves.borrow_mut().push(room_id);
        Ok(())
    }

    async fn participants(&self, _room_id: RoomId) -> Result<Vec<Participant>, TransportError> {
        Ok(self.participants.borrow().clone())
    }

    async fn ice_servers(&self) -> Result<Vec<IceServerConfig>, TransportError> {
        Ok(Vec::new())
    }
}
