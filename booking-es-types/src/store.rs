use crate::event::{Event, EventTypeName, RecordedEvent};
use crate::validation::no_glob_metacharacters;
use crate::EventData;
use nutype::nutype;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Collection of events to write, organized by stream.
///
/// Every stream touched by a write must first be registered with the
/// version the writer expects it to be at. The store checks all
/// expectations before writing anything, so a batch either lands whole or
/// not at all.
#[derive(Debug)]
pub struct StreamWrites {
    entries: Vec<StreamWriteEntry>,
    expected_versions: HashMap<StreamId, ExpectedVersion>,
}

/// A single event waiting to be appended.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamWriteEntry {
    /// Stream the event is appended to.
    pub stream_id: StreamId,
    /// Type tag recorded with the event.
    pub event_type: EventTypeName,
    /// Event payload.
    pub data: EventData,
}

impl StreamWrites {
    /// Create a new empty collection of stream writes.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            expected_versions: HashMap::new(),
        }
    }

    /// Register a stream and its expected version prior to appending events.
    ///
    /// Registering the same stream twice is allowed only when both
    /// registrations carry the same expectation.
    pub fn register_stream(
        self,
        stream_id: StreamId,
        expected_version: ExpectedVersion,
    ) -> Result<Self, EventStoreError> {
        use std::collections::hash_map::Entry;

        let mut writes = self;

        match writes.expected_versions.entry(stream_id.clone()) {
            Entry::Vacant(entry) => {
                let _ = entry.insert(expected_version);
                Ok(writes)
            }
            Entry::Occupied(entry) => {
                let first_version = *entry.get();

                if first_version == expected_version {
                    Ok(writes)
                } else {
                    Err(EventStoreError::ConflictingExpectedVersions {
                        stream_id,
                        first_version,
                        second_version: expected_version,
                    })
                }
            }
        }
    }

    /// Append an event to a previously registered stream using builder pattern.
    ///
    /// Returns [`EventStoreError::UndeclaredStream`] if the stream has not
    /// been registered, and [`EventStoreError::SerializationFailed`] if the
    /// event's type tag is not a valid [`EventTypeName`].
    pub fn append<E: Event>(self, stream_id: &StreamId, event: E) -> Result<Self, EventStoreError> {
        let mut writes = self;

        if !writes.expected_versions.contains_key(stream_id) {
            return Err(EventStoreError::UndeclaredStream {
                stream_id: stream_id.clone(),
            });
        }

        let event_type = EventTypeName::try_new(event.event_type_name()).map_err(|error| {
            EventStoreError::SerializationFailed {
                stream_id: stream_id.clone(),
                detail: error.to_string(),
            }
        })?;

        writes.entries.push(StreamWriteEntry {
            stream_id: stream_id.clone(),
            event_type,
            data: event.data(),
        });

        Ok(writes)
    }

    /// Expected version registered for each stream in the batch.
    pub fn expected_versions(&self) -> &HashMap<StreamId, ExpectedVersion> {
        &self.expected_versions
    }

    /// Number of events queued across all streams.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when no events have been queued.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consumes the batch, yielding its events in append order.
    pub fn into_entries(self) -> Vec<StreamWriteEntry> {
        self.entries
    }
}

impl Default for StreamWrites {
    fn default() -> Self {
        Self::new()
    }
}

/// Trait defining the contract for event store implementations.
///
/// Event stores provide two core operations:
/// 1. Read the events of one stream for state reconstruction
/// 2. Atomically append events to streams with version checking
///
/// Streams are append-only. Events are never mutated or removed, so readers
/// need no locking; only the append path has to serialize writers.
pub trait EventStore {
    /// Read all events from a stream.
    ///
    /// Events are returned in append order (oldest to newest). Reading a
    /// stream that has never been written returns an empty reader at
    /// version 0; it is not an error.
    fn read_stream(
        &self,
        stream_id: StreamId,
    ) -> impl Future<Output = Result<EventStreamReader, EventStoreError>> + Send;

    /// Atomically append events to one or more streams.
    ///
    /// # Optimistic Concurrency Control
    ///
    /// Each registered stream carries an [`ExpectedVersion`]. The store
    /// verifies every expectation before writing. On the first mismatch
    /// the operation fails with [`EventStoreError::VersionConflict`] and
    /// nothing is written. [`ExpectedVersion::Any`] skips the check and
    /// appends unconditionally.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let writes = StreamWrites::new()
    ///     .register_stream(stream_id.clone(), ExpectedVersion::Exact(reader.version()))
    ///     .and_then(|writes| writes.append(&stream_id, event))?;
    ///
    /// match store.append_events(writes).await {
    ///     Ok(slice) => println!("appended {} events", slice.len()),
    ///     Err(EventStoreError::VersionConflict { .. }) => println!("concurrent modification"),
    ///     Err(other) => return Err(other),
    /// }
    /// ```
    fn append_events(
        &self,
        writes: StreamWrites,
    ) -> impl Future<Output = Result<EventStreamSlice, EventStoreError>> + Send;
}

/// Stream identifier domain type.
///
/// StreamId uniquely identifies an event stream within the event store.
/// All stream IDs are:
/// - Non-empty (trimmed strings with at least 1 character)
/// - Within reasonable length (max 255 characters)
/// - Free of glob metacharacters (*, ?, [, ])
#[nutype(
    sanitize(trim),
    validate(not_empty, len_char_max = 255, predicate = no_glob_metacharacters),
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
pub struct StreamId(String);

/// Stream version domain type.
///
/// StreamVersion is the number of events in a stream. Versions start at 0
/// (empty stream) and increment with each appended event.
#[nutype(derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Debug,
    Display,
    Serialize,
    Deserialize
))]
pub struct StreamVersion(usize);

impl StreamVersion {
    /// Increment the version by 1.
    #[must_use]
    pub fn increment(self) -> Self {
        Self::new(self.into_inner() + 1)
    }
}

/// The version a writer expects a stream to be at when appending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpectedVersion {
    /// Append regardless of the stream's current version.
    Any,
    /// Append only if the stream is exactly at this version.
    Exact(StreamVersion),
}

impl ExpectedVersion {
    /// Whether a stream currently at `current` satisfies this expectation.
    pub fn is_satisfied_by(self, current: StreamVersion) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(expected) => expected == current,
        }
    }
}

impl fmt::Display for ExpectedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "any"),
            Self::Exact(version) => write!(f, "{version}"),
        }
    }
}

/// Identifies the event store operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Reading events from a stream.
    ReadStream,
    /// Appending events to streams.
    AppendEvents,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadStream => write!(f, "read_stream"),
            Self::AppendEvents => write!(f, "append_events"),
        }
    }
}

/// Error type returned by event store operations.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum EventStoreError {
    /// Returned when a stream is assigned two different expected versions
    /// within the same write batch.
    #[error(
        "conflicting expected versions for stream {stream_id}: first={first_version}, second={second_version}"
    )]
    ConflictingExpectedVersions {
        stream_id: StreamId,
        first_version: ExpectedVersion,
        second_version: ExpectedVersion,
    },

    /// Returned when events are appended to a stream that was not
    /// registered with an expected version.
    #[error("stream {stream_id} must be registered before appending events")]
    UndeclaredStream { stream_id: StreamId },

    /// Returned when an event cannot be turned into its persisted form.
    #[error("failed to serialize event for stream {stream_id}: {detail}")]
    SerializationFailed { stream_id: StreamId, detail: String },

    /// Returned when stored events cannot be read back.
    #[error("failed to deserialize event for stream {stream_id}: {detail}")]
    DeserializationFailed { stream_id: StreamId, detail: String },

    /// Infrastructure failure surfaced by the backing store (connection drops, poisoned state).
    #[error("{operation} operation failed")]
    StoreFailure { operation: Operation },

    /// Version conflict during optimistic concurrency control.
    ///
    /// The stream moved between the writer's read and its append.
    #[error("version conflict on stream {stream_id}: expected={expected}, actual={actual}")]
    VersionConflict {
        stream_id: StreamId,
        expected: ExpectedVersion,
        actual: StreamVersion,
    },
}

/// The events of one stream as of the moment it was read.
#[derive(Debug, Clone)]
pub struct EventStreamReader {
    stream_id: StreamId,
    version: StreamVersion,
    events: Vec<RecordedEvent>,
}

impl EventStreamReader {
    /// Wraps the events read from a stream at the given version.
    pub fn new(stream_id: StreamId, version: StreamVersion, events: Vec<RecordedEvent>) -> Self {
        Self {
            stream_id,
            version,
            events,
        }
    }

    /// A reader for a stream that has never been written.
    pub fn empty(stream_id: StreamId) -> Self {
        Self::new(stream_id, StreamVersion::new(0), Vec::new())
    }

    /// The stream that was read.
    pub fn stream_id(&self) -> &StreamId {
        &self.stream_id
    }

    /// The stream's version at read time.
    ///
    /// Writers pass this back as [`ExpectedVersion::Exact`] to detect
    /// concurrent modification.
    pub fn version(&self) -> StreamVersion {
        self.version
    }

    /// Returns the number of events in the stream.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true if the stream contains no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Returns the first event in the stream, if any.
    pub fn first(&self) -> Option<&RecordedEvent> {
        self.events.first()
    }

    /// Returns an iterator over the recorded events in append order.
    pub fn iter(&self) -> impl Iterator<Item = &RecordedEvent> {
        self.events.iter()
    }

    /// Decodes the events `E` recognizes, skipping any other type.
    pub fn decode<E: Event>(&self) -> impl Iterator<Item = E> + '_ {
        self.events.iter().filter_map(RecordedEvent::decode::<E>)
    }
}

impl IntoIterator for EventStreamReader {
    type Item = RecordedEvent;
    type IntoIter = std::vec::IntoIter<RecordedEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

/// The events persisted by one successful append, in append order.
#[derive(Debug, Clone, Default)]
pub struct EventStreamSlice {
    events: Vec<RecordedEvent>,
}

impl EventStreamSlice {
    /// Wraps the events written by an append.
    pub fn new(events: Vec<RecordedEvent>) -> Self {
        Self { events }
    }

    /// Number of events written.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true when the append wrote nothing.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Iterates over the written events in append order.
    pub fn iter(&self) -> impl Iterator<Item = &RecordedEvent> {
        self.events.iter()
    }

    /// The last event written, if any.
    pub fn last(&self) -> Option<&RecordedEvent> {
        self.events.last()
    }
}

impl IntoIterator for EventStreamSlice {
    type Item = RecordedEvent;
    type IntoIter = std::vec::IntoIter<RecordedEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

/// Blanket implementation allowing EventStore trait to work with references.
///
/// Lets an aggregate borrow a store (`Booking::new(&store)`) instead of
/// taking ownership of it.
impl<T: EventStore + Sync> EventStore for &T {
    async fn read_stream(&self, stream_id: StreamId) -> Result<EventStreamReader, EventStoreError> {
        (*self).read_stream(stream_id).await
    }

    async fn append_events(
        &self,
        writes: StreamWrites,
    ) -> Result<EventStreamSlice, EventStoreError> {
        (*self).append_events(writes).await
    }
}

/// Shared ownership of one store across tasks.
impl<T: EventStore + Send + Sync> EventStore for Arc<T> {
    async fn read_stream(&self, stream_id: StreamId) -> Result<EventStreamReader, EventStoreError> {
        (**self).read_stream(stream_id).await
    }

    async fn append_events(
        &self,
        writes: StreamWrites,
    ) -> Result<EventStreamSlice, EventStoreError> {
        (**self).append_events(writes).await
    }
}
