//! Signal request bodies.
//!
//! Clients post signaling events in one of three shapes:
//!
//! * a single inline event with an explicit recipient
//!   (`{"recipient_id": 7, "type": "offer", "sdp": "..."}`),
//! * one recipient with a nested event list
//!   (`{"recipient_id": 7, "events": [...]}`),
//! * a list of per-recipient groups
//!   (`{"messages": [{"recipient_id": 7, "events": [...]}, ...]}`).
//!
//! Containers may also arrive as maps keyed by indices (`{"0": .., "1": ..}`),
//! which is what form encoders produce for arrays. [`SignalPayload::from_value`]
//! coerces all of them into one ordered representation.

use crate::model::signaling::SignalEvent;
use crate::model::user::UserId;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value, json};
use std::cmp::Ordering;
use thiserror::Error;

/// Fields the relay forwards. Everything else in an event object is dropped.
const EVENT_FIELDS: [&str; 4] = ["type", "sdp", "candidate", "metadata"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("signal payload carries no deliverable events")]
    Empty,
}

/// Opaque event object as relayed: only the recognized fields survive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventData(Map<String, Value>);

impl EventData {
    /// Keeps the recognized event fields of `value`; `None` if nothing is left.
    pub fn from_value(value: &Value) -> Option<Self> {
        let Value::Object(map) = value else {
            return None;
        };

        let fields: Map<String, Value> = map
            .iter()
            .filter(|(key, value)| EVENT_FIELDS.contains(&key.as_str()) && !is_blank(value))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        (!fields.is_empty()).then_some(Self(fields))
    }

    pub fn from_event(event: &SignalEvent) -> Self {
        match serde_json::to_value(event) {
            Ok(Value::Object(map)) => Self(map),
            _ => Self(Map::new()),
        }
    }

    pub fn kind(&self) -> Option<&str> {
        self.0.get("type").and_then(Value::as_str)
    }

    pub fn to_event(&self) -> Result<SignalEvent, serde_json::Error> {
        serde_json::from_value(Value::Object(self.0.clone()))
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalGroup {
    pub recipient_id: UserId,
    pub events: Vec<EventData>,
}

/// A signal request body in one of the three accepted shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalPayload {
    Single {
        recipient_id: UserId,
        event: EventData,
    },
    Batch {
        recipient_id: UserId,
        events: Vec<EventData>,
    },
    Groups(Vec<SignalGroup>),
}

enum EventSource {
    Nested,
    Inline,
}

impl SignalPayload {
    pub fn single(recipient_id: UserId, event: &SignalEvent) -> Self {
        Self::Single {
            recipient_id,
            event: EventData::from_event(event),
        }
    }

    /// Picks the narrowest shape able to carry `groups`.
    pub fn from_groups(mut groups: Vec<SignalGroup>) -> Option<Self> {
        groups.retain(|group| !group.events.is_empty());

        match groups.len() {
            0 => None,
            1 => {
                let SignalGroup {
                    recipient_id,
                    mut events,
                } = groups.remove(0);
                if events.len() == 1 {
                    Some(Self::Single {
                        recipient_id,
                        event: events.remove(0),
                    })
                } else {
                    Some(Self::Batch {
                        recipient_id,
                        events,
                    })
                }
            }
            _ => Some(Self::Groups(groups)),
        }
    }

    /// Normalizes an arbitrary JSON body into a payload.
    ///
    /// Groups without a positive recipient or without events are skipped.
    /// A top-level recipient with neither `events` nor `messages` is read as
    /// one inline event. Fails only when nothing deliverable remains.
    pub fn from_value(raw: &Value) -> Result<Self, NormalizeError> {
        let root = match raw {
            Value::Object(map) => map,
            Value::Array(_) => {
                let groups = parse_groups(Some(raw));
                if groups.is_empty() {
                    return Err(NormalizeError::Empty);
                }
                return Ok(Self::Groups(groups));
            }
            _ => return Err(NormalizeError::Empty),
        };

        let mut groups = parse_groups(root.get("messages"));
        let batched = !groups.is_empty();

        if let Some(recipient_id) = recipient(root.get("recipient_id")) {
            let (events, source) = extract_events(root);
            if !events.is_empty() {
                if !batched {
                    return Ok(match source {
                        EventSource::Nested => Self::Batch {
                            recipient_id,
                            events,
                        },
                        EventSource::Inline => Self::Single {
                            recipient_id,
                            event: events.into_iter().next().ok_or(NormalizeError::Empty)?,
                        },
                    });
                }
                groups.push(SignalGroup {
                    recipient_id,
                    events,
                });
            }
        }

        if groups.is_empty() {
            return Err(NormalizeError::Empty);
        }
        Ok(Self::Groups(groups))
    }

    pub fn into_groups(self) -> Vec<SignalGroup> {
        match self {
            Self::Single {
                recipient_id,
                event,
            } => vec![SignalGroup {
                recipient_id,
                events: vec![event],
            }],
            Self::Batch {
                recipient_id,
                events,
            } => vec![SignalGroup {
                recipient_id,
                events,
            }],
            Self::Groups(groups) => groups,
        }
    }

    /// Flattened `(recipient, event)` pairs in request order.
    pub fn into_deliveries(self) -> Vec<(UserId, EventData)> {
        self.into_groups()
            .into_iter()
            .flat_map(|group| {
                let recipient_id = group.recipient_id;
                group
                    .events
                    .into_iter()
                    .map(move |event| (recipient_id, event))
            })
            .collect()
    }

    pub fn event_count(&self) -> usize {
        match self {
            Self::Single { .. } => 1,
            Self::Batch { events, .. } => events.len(),
            Self::Groups(groups) => groups.iter().map(|g| g.events.len()).sum(),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Single {
                recipient_id,
                event,
            } => {
                let mut map = event.as_map().clone();
                map.insert("recipient_id".into(), json!(recipient_id));
                Value::Object(map)
            }
            Self::Batch {
                recipient_id,
                events,
            } => json!({ "recipient_id": recipient_id, "events": events }),
            Self::Groups(groups) => json!({ "messages": groups }),
        }
    }
}

impl Serialize for SignalPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SignalPayload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Self::from_value(&raw).map_err(D::Error::custom)
    }
}

fn parse_groups(raw: Option<&Value>) -> Vec<SignalGroup> {
    collection(raw, |map| map.contains_key("recipient_id"))
        .into_iter()
        .filter_map(|value| {
            let Value::Object(map) = value else {
                return None;
            };
            let recipient_id = recipient(map.get("recipient_id"))?;
            let (events, _) = extract_events(map);
            (!events.is_empty()).then_some(SignalGroup {
                recipient_id,
                events,
            })
        })
        .collect()
}

fn extract_events(container: &Map<String, Value>) -> (Vec<EventData>, EventSource) {
    let nested: Vec<EventData> = collection(container.get("events"), looks_like_event)
        .into_iter()
        .filter_map(EventData::from_value)
        .collect();

    if !nested.is_empty() {
        return (nested, EventSource::Nested);
    }

    let inline = EventData::from_value(&Value::Object(container.clone()));
    (inline.into_iter().collect(), EventSource::Inline)
}

/// Coerces a container into an ordered list. Objects that already look like
/// one item are wrapped; other objects are index-keyed maps ordered by key.
fn collection(raw: Option<&Value>, is_item: fn(&Map<String, Value>) -> bool) -> Vec<&Value> {
    let Some(value) = raw else {
        return Vec::new();
    };

    match value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) if is_item(map) => vec![value],
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| index_order(a, b));
            entries.into_iter().map(|(_, value)| value).collect()
        }
        _ if is_blank(value) => Vec::new(),
        _ => vec![value],
    }
}

fn looks_like_event(map: &Map<String, Value>) -> bool {
    EVENT_FIELDS.iter().any(|field| map.contains_key(*field))
}

fn index_order(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

fn recipient(value: Option<&Value>) -> Option<UserId> {
    let id = match value? {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => s.trim().parse::<u64>().ok()?,
        _ => return None,
    };
    (id > 0).then_some(UserId(id))
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
