use crate::store::{StreamId, StreamVersion};
use chrono::{DateTime, Utc};
use nutype::nutype;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Trait implemented by domain event types.
///
/// An event is an immutable fact: a type tag plus an opaque payload. The
/// store never sees the domain type itself, only the tag returned by
/// [`Event::event_type_name`] and the map returned by [`Event::data`].
/// Reading goes the other way through [`Event::from_recorded`].
///
/// # Forward compatibility
///
/// `from_recorded` returns `None` for a tag the type does not know. Readers
/// skip such events instead of failing, so a stream may carry event types
/// written by newer code without breaking older projections.
pub trait Event: fmt::Debug + Clone + Send + Sync + 'static {
    /// The type tag persisted alongside the payload.
    fn event_type_name(&self) -> &'static str;

    /// The associated payload.
    fn data(&self) -> EventData;

    /// Rebuild a domain event from its persisted tag and payload.
    ///
    /// Returns `None` when the tag is not recognized.
    fn from_recorded(event_type: &EventTypeName, data: &EventData) -> Option<Self>;
}

/// Event type tag domain type.
///
/// Non-empty after trimming and at most 255 characters.
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 255),
    derive(
        Debug,
        Clone,
        PartialEq,
        Eq,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct EventTypeName(String);

/// A globally unique event identifier using UUIDv7 format.
///
/// UUIDv7 values sort by creation time, which keeps identifiers of events
/// appended in sequence monotonic.
#[nutype(
    validate(predicate = |id: &Uuid| id.get_version() == Some(uuid::Version::SortRand)),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Hash,
        AsRef,
        Deref,
        Display,
        Serialize,
        Deserialize
    )
)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new `EventId` with the current timestamp.
    pub fn new() -> Self {
        Self::try_new(Uuid::now_v7()).expect("Uuid::now_v7() should always return a valid v7 UUID")
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

/// Opaque payload carried by an event.
///
/// Always a JSON object. Consumers read the keys they understand and ignore
/// the rest, so new fields can be added without breaking old readers. A
/// stored payload that is not an object deserializes as an empty payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub struct EventData(Map<String, Value>);

impl EventData {
    /// Creates an empty payload.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builds a payload from an arbitrary JSON value.
    ///
    /// Anything other than an object yields an empty payload.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::new(),
        }
    }

    /// Adds a field, returning the payload for chaining.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let _ = self.0.insert(key.into(), value.into());
        self
    }

    /// Inserts a field, returning the previous value under that key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Looks up a field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when the payload carries no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Converts the payload into a JSON value.
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for EventData {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<Value> for EventData {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

impl From<EventData> for Value {
    fn from(data: EventData) -> Self {
        data.into_value()
    }
}

/// An event as persisted in a stream.
///
/// Positions are 1-based: the first event appended to a stream is at
/// position 1, and a stream's [`StreamVersion`] equals the position of its
/// last event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedEvent {
    event_id: EventId,
    stream_id: StreamId,
    position: StreamVersion,
    event_type: EventTypeName,
    data: EventData,
    recorded_at: DateTime<Utc>,
}

impl RecordedEvent {
    /// Assemble a recorded event. Called by event store implementations.
    pub fn new(
        event_id: EventId,
        stream_id: StreamId,
        position: StreamVersion,
        event_type: EventTypeName,
        data: EventData,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id,
            stream_id,
            position,
            event_type,
            data,
            recorded_at,
        }
    }

    /// Unique identifier assigned when the event was appended.
    pub fn event_id(&self) -> EventId {
        self.event_id
    }

    /// Stream the event belongs to.
    pub fn stream_id(&self) -> &StreamId {
        &self.stream_id
    }

    /// 1-based position within the stream.
    pub fn position(&self) -> StreamVersion {
        self.position
    }

    /// Type tag the event was recorded under.
    pub fn event_type(&self) -> &EventTypeName {
        &self.event_type
    }

    /// Payload as stored.
    pub fn data(&self) -> &EventData {
        &self.data
    }

    /// When the store accepted the event.
    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }

    /// Decode into a domain event, or `None` if `E` does not recognize the type.
    pub fn decode<E: Event>(&self) -> Option<E> {
        E::from_recorded(&self.event_type, &self.data)
    }
}
