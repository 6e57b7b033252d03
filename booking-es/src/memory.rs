//! In-memory event store for development and tests.

use booking_es_types::{
    EventId, EventStore, EventStoreError, EventStreamReader, EventStreamSlice, Operation,
    RecordedEvent, StreamId, StreamVersion, StreamWrites,
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, instrument};

/// Thread-safe in-memory event store.
///
/// One mutex guards every stream, so all version checks of an append and
/// the writes that follow happen without interleaving. Clones share the
/// same storage.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventStore {
    streams: Arc<Mutex<HashMap<StreamId, Vec<RecordedEvent>>>>,
}

impl InMemoryEventStore {
    /// Create a new empty in-memory event store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventStore for InMemoryEventStore {
    #[instrument(skip(self), fields(stream_id = %stream_id))]
    async fn read_stream(&self, stream_id: StreamId) -> Result<EventStreamReader, EventStoreError> {
        let streams = self
            .streams
            .lock()
            .map_err(|_| EventStoreError::StoreFailure {
                operation: Operation::ReadStream,
            })?;

        let events = streams.get(&stream_id).cloned().unwrap_or_default();
        drop(streams);

        let version = StreamVersion::new(events.len());
        debug!(version = %version, "read stream");
        Ok(EventStreamReader::new(stream_id, version, events))
    }

    #[instrument(skip_all, fields(events = writes.len()))]
    async fn append_events(
        &self,
        writes: StreamWrites,
    ) -> Result<EventStreamSlice, EventStoreError> {
        let mut streams = self
            .streams
            .lock()
            .map_err(|_| EventStoreError::StoreFailure {
                operation: Operation::AppendEvents,
            })?;

        for (stream_id, expected) in writes.expected_versions() {
            let actual = StreamVersion::new(streams.get(stream_id).map_or(0, Vec::len));
            if !expected.is_satisfied_by(actual) {
                debug!(stream_id = %stream_id, %expected, %actual, "version conflict");
                return Err(EventStoreError::VersionConflict {
                    stream_id: stream_id.clone(),
                    expected: *expected,
                    actual,
                });
            }
        }

        let recorded_at = Utc::now();
        let mut appended = Vec::with_capacity(writes.len());
        for entry in writes.into_entries() {
            let stream = streams.entry(entry.stream_id.clone()).or_default();
            let event = RecordedEvent::new(
                EventId::new(),
                entry.stream_id,
                StreamVersion::new(stream.len() + 1),
                entry.event_type,
                entry.data,
                recorded_at,
            );
            stream.push(event.clone());
            appended.push(event);
        }
        drop(streams);

        debug!(appended = appended.len(), "appended events");
        Ok(EventStreamSlice::new(appended))
    }
}
