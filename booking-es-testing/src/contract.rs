//! Behavioral contract for [`EventStore`] implementations.
//!
//! Each `test_*` function builds its own store from `make_store`, uses
//! freshly named streams, and reports the first broken expectation as a
//! [`ContractTestFailure`]. Use [`event_store_contract_tests!`] to run the
//! whole suite against a store constructor.
//!
//! [`event_store_contract_tests!`]: crate::event_store_contract_tests

use booking_es_types::{
    Event, EventData, EventStore, EventStoreError, EventTypeName, ExpectedVersion, StreamId,
    StreamVersion, StreamWrites,
};
use std::fmt;

use uuid::Uuid;

/// A broken contract expectation, tagged with the scenario that found it.
#[derive(Debug)]
pub struct ContractTestFailure {
    scenario: &'static str,
    detail: String,
}

impl ContractTestFailure {
    fn new(scenario: &'static str, detail: impl Into<String>) -> Self {
        Self {
            scenario,
            detail: detail.into(),
        }
    }

    fn builder_error(scenario: &'static str, phase: &'static str, error: EventStoreError) -> Self {
        Self::new(scenario, format!("builder failure during {phase}: {error}"))
    }

    fn store_error(
        scenario: &'static str,
        operation: &'static str,
        error: EventStoreError,
    ) -> Self {
        Self::new(
            scenario,
            format!("{operation} operation returned unexpected error: {error}"),
        )
    }

    fn assertion(scenario: &'static str, detail: impl Into<String>) -> Self {
        Self::new(scenario, detail)
    }
}

impl fmt::Display for ContractTestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.scenario, self.detail)
    }
}

impl std::error::Error for ContractTestFailure {}

/// Outcome of one contract scenario.
pub type ContractTestResult = Result<(), ContractTestFailure>;

/// The event the contract suite writes. Its payload records a sequence
/// number so ordering can be checked on read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractTestEvent {
    data: EventData,
}

impl ContractTestEvent {
    const TYPE_NAME: &'static str = "ContractTestEvent";

    /// An event carrying `sequence` in its payload.
    pub fn new(sequence: u64) -> Self {
        Self {
            data: EventData::new().with("sequence", sequence),
        }
    }

    /// The sequence number this event was created with.
    pub fn sequence(&self) -> Option<u64> {
        self.data.get("sequence").and_then(serde_json::Value::as_u64)
    }
}

impl Event for ContractTestEvent {
    fn event_type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn data(&self) -> EventData {
        self.data.clone()
    }

    fn from_recorded(event_type: &EventTypeName, data: &EventData) -> Option<Self> {
        (event_type.as_str() == Self::TYPE_NAME).then(|| Self { data: data.clone() })
    }
}

fn contract_stream_id(
    scenario: &'static str,
    label: &str,
) -> Result<StreamId, ContractTestFailure> {
    // Unique per run so scenarios can share one backing store.
    let raw = format!("contract::{scenario}::{label}::{}", Uuid::now_v7());

    StreamId::try_new(raw.clone()).map_err(|error| {
        ContractTestFailure::assertion(
            scenario,
            format!("unable to construct stream id `{raw}`: {error}"),
        )
    })
}

fn builder_step(
    scenario: &'static str,
    phase: &'static str,
    result: Result<StreamWrites, EventStoreError>,
) -> Result<StreamWrites, ContractTestFailure> {
    result.map_err(|error| ContractTestFailure::builder_error(scenario, phase, error))
}

fn register_contract_stream(
    scenario: &'static str,
    writes: StreamWrites,
    stream_id: &StreamId,
    expected_version: ExpectedVersion,
) -> Result<StreamWrites, ContractTestFailure> {
    builder_step(
        scenario,
        "register_stream",
        writes.register_stream(stream_id.clone(), expected_version),
    )
}

fn append_contract_event(
    scenario: &'static str,
    writes: StreamWrites,
    stream_id: &StreamId,
    sequence: u64,
) -> Result<StreamWrites, ContractTestFailure> {
    builder_step(
        scenario,
        "append",
        writes.append(stream_id, ContractTestEvent::new(sequence)),
    )
}

fn exact(version: usize) -> ExpectedVersion {
    ExpectedVersion::Exact(StreamVersion::new(version))
}

async fn single_append<S: EventStore>(
    scenario: &'static str,
    store: &S,
    stream_id: &StreamId,
    expected_version: ExpectedVersion,
    sequence: u64,
) -> ContractTestResult {
    let writes =
        register_contract_stream(scenario, StreamWrites::new(), stream_id, expected_version)?;
    let writes = append_contract_event(scenario, writes, stream_id, sequence)?;

    let _ = store
        .append_events(writes)
        .await
        .map_err(|error| ContractTestFailure::store_error(scenario, "append_events", error))?;

    Ok(())
}

async fn stream_len<S: EventStore>(
    scenario: &'static str,
    store: &S,
    stream_id: &StreamId,
) -> Result<usize, ContractTestFailure> {
    store
        .read_stream(stream_id.clone())
        .await
        .map(|reader| reader.len())
        .map_err(|error| ContractTestFailure::store_error(scenario, "read_stream", error))
}

/// One append to a fresh stream is read back at position and version 1.
pub async fn test_basic_read_write<F, S>(make_store: F) -> ContractTestResult
where
    F: Fn() -> S + Send + Sync + Clone + 'static,
    S: EventStore + Send + Sync + 'static,
{
    const SCENARIO: &str = "basic_read_write";

    let store = make_store();
    let stream_id = contract_stream_id(SCENARIO, "single")?;

    single_append(SCENARIO, &store, &stream_id, exact(0), 1).await?;

    let reader = store
        .read_stream(stream_id.clone())
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "read_stream", error))?;

    if reader.is_empty() {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            "expected stream to contain events but it was empty",
        ));
    }

    let len = reader.len();
    if len != 1 {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            format!("expected stream to contain exactly one event, observed len={len}"),
        ));
    }

    if reader.version() != StreamVersion::new(1) {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            format!("expected stream version 1, observed {}", reader.version()),
        ));
    }

    match reader.first() {
        Some(event)
            if event.position() == StreamVersion::new(1) && event.stream_id() == &stream_id =>
        {
            Ok(())
        }
        Some(event) => Err(ContractTestFailure::assertion(
            SCENARIO,
            format!(
                "expected first event at position 1 of {stream_id}, observed position {} of {}",
                event.position(),
                event.stream_id()
            ),
        )),
        None => Err(ContractTestFailure::assertion(
            SCENARIO,
            "reader reported events but yielded none",
        )),
    }
}

/// Reading a stream nobody wrote is an empty success at version 0.
pub async fn test_missing_stream_reads<F, S>(make_store: F) -> ContractTestResult
where
    F: Fn() -> S + Send + Sync + Clone + 'static,
    S: EventStore + Send + Sync + 'static,
{
    const SCENARIO: &str = "missing_stream_reads";

    let store = make_store();
    let stream_id = contract_stream_id(SCENARIO, "ghost")?;

    let reader = store
        .read_stream(stream_id.clone())
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "read_stream", error))?;

    if !reader.is_empty() {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            "expected read_stream to succeed with no events for an untouched stream",
        ));
    }

    if reader.version() != StreamVersion::new(0) {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            format!(
                "expected untouched stream at version 0, observed {}",
                reader.version()
            ),
        ));
    }

    Ok(())
}

/// A stale exact expectation is rejected with the stream's actual version.
pub async fn test_concurrent_version_conflicts<F, S>(make_store: F) -> ContractTestResult
where
    F: Fn() -> S + Send + Sync + Clone + 'static,
    S: EventStore + Send + Sync + 'static,
{
    const SCENARIO: &str = "concurrent_version_conflicts";

    let store = make_store();
    let stream_id = contract_stream_id(SCENARIO, "shared")?;

    single_append(SCENARIO, &store, &stream_id, exact(0), 1).await?;

    let conflicting_writes =
        register_contract_stream(SCENARIO, StreamWrites::new(), &stream_id, exact(0))?;
    let conflicting_writes = append_contract_event(SCENARIO, conflicting_writes, &stream_id, 2)?;

    match store.append_events(conflicting_writes).await {
        Err(EventStoreError::VersionConflict {
            stream_id: conflicted,
            expected,
            actual,
        }) => {
            if conflicted != stream_id || expected != exact(0) || actual != StreamVersion::new(1) {
                return Err(ContractTestFailure::assertion(
                    SCENARIO,
                    format!(
                        "conflict reported stream={conflicted} expected={expected} actual={actual}, \
                         wanted stream={stream_id} expected=0 actual=1"
                    ),
                ));
            }
        }
        Err(error) => {
            return Err(ContractTestFailure::store_error(
                SCENARIO,
                "append_events",
                error,
            ));
        }
        Ok(_) => {
            return Err(ContractTestFailure::assertion(
                SCENARIO,
                "expected version conflict but append succeeded",
            ));
        }
    }

    let len = stream_len(SCENARIO, &store, &stream_id).await?;
    if len != 1 {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            format!("rejected append must not write, observed len={len}"),
        ));
    }

    Ok(())
}

/// `ExpectedVersion::Any` appends no matter how far the stream has moved.
pub async fn test_any_version_appends_unconditionally<F, S>(make_store: F) -> ContractTestResult
where
    F: Fn() -> S + Send + Sync + Clone + 'static,
    S: EventStore + Send + Sync + 'static,
{
    const SCENARIO: &str = "any_version_appends_unconditionally";

    let store = make_store();
    let stream_id = contract_stream_id(SCENARIO, "unchecked")?;

    single_append(SCENARIO, &store, &stream_id, ExpectedVersion::Any, 1).await?;
    single_append(SCENARIO, &store, &stream_id, ExpectedVersion::Any, 2).await?;

    let len = stream_len(SCENARIO, &store, &stream_id).await?;
    if len != 2 {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            format!("expected both unconditional appends to land, observed len={len}"),
        ));
    }

    Ok(())
}

/// A batch touching two streams leaves each with only its own events.
pub async fn test_stream_isolation<F, S>(make_store: F) -> ContractTestResult
where
    F: Fn() -> S + Send + Sync + Clone + 'static,
    S: EventStore + Send + Sync + 'static,
{
    const SCENARIO: &str = "stream_isolation";

    let store = make_store();
    let left_stream = contract_stream_id(SCENARIO, "left")?;
    let right_stream = contract_stream_id(SCENARIO, "right")?;

    let writes = register_contract_stream(SCENARIO, StreamWrites::new(), &left_stream, exact(0))?;
    let writes = register_contract_stream(SCENARIO, writes, &right_stream, exact(0))?;
    let writes = append_contract_event(SCENARIO, writes, &left_stream, 1)?;
    let writes = append_contract_event(SCENARIO, writes, &right_stream, 2)?;

    let _ = store
        .append_events(writes)
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "append_events", error))?;

    for (label, stream_id) in [("left", &left_stream), ("right", &right_stream)] {
        let reader = store
            .read_stream(stream_id.clone())
            .await
            .map_err(|error| ContractTestFailure::store_error(SCENARIO, "read_stream", error))?;

        let len = reader.len();
        if len != 1 {
            return Err(ContractTestFailure::assertion(
                SCENARIO,
                format!("{label} stream expected exactly one event but observed {len}"),
            ));
        }

        if reader.iter().any(|event| event.stream_id() != stream_id) {
            return Err(ContractTestFailure::assertion(
                SCENARIO,
                format!("{label} stream read events belonging to another stream"),
            ));
        }
    }

    Ok(())
}

/// One stale stream in a batch rejects the whole batch.
pub async fn test_conflict_preserves_atomicity<F, S>(make_store: F) -> ContractTestResult
where
    F: Fn() -> S + Send + Sync + Clone + 'static,
    S: EventStore + Send + Sync + 'static,
{
    const SCENARIO: &str = "conflict_preserves_atomicity";

    let store = make_store();
    let left_stream = contract_stream_id(SCENARIO, "left")?;
    let right_stream = contract_stream_id(SCENARIO, "right")?;

    // Seed one event per stream so a single-stream conflict can be introduced.
    let writes = register_contract_stream(SCENARIO, StreamWrites::new(), &left_stream, exact(0))?;
    let writes = register_contract_stream(SCENARIO, writes, &right_stream, exact(0))?;
    let writes = append_contract_event(SCENARIO, writes, &left_stream, 1)?;
    let writes = append_contract_event(SCENARIO, writes, &right_stream, 2)?;

    let _ = store
        .append_events(writes)
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "append_events", error))?;

    // Left is stale, right is current.
    let writes = register_contract_stream(SCENARIO, StreamWrites::new(), &left_stream, exact(0))?;
    let writes = register_contract_stream(SCENARIO, writes, &right_stream, exact(1))?;
    let writes = append_contract_event(SCENARIO, writes, &left_stream, 3)?;
    let writes = append_contract_event(SCENARIO, writes, &right_stream, 4)?;

    match store.append_events(writes).await {
        Err(EventStoreError::VersionConflict { .. }) => {}
        Err(error) => {
            return Err(ContractTestFailure::store_error(
                SCENARIO,
                "append_events",
                error,
            ));
        }
        Ok(_) => {
            return Err(ContractTestFailure::assertion(
                SCENARIO,
                "expected conflicting batch to fail but it succeeded",
            ));
        }
    }

    for (label, stream_id) in [("left", &left_stream), ("right", &right_stream)] {
        let len = stream_len(SCENARIO, &store, stream_id).await?;
        if len != 1 {
            return Err(ContractTestFailure::assertion(
                SCENARIO,
                format!("{label} stream changed by a rejected batch, observed len={len}"),
            ));
        }
    }

    Ok(())
}

/// Events come back in the order they were appended, at consecutive positions.
pub async fn test_append_order_preserved<F, S>(make_store: F) -> ContractTestResult
where
    F: Fn() -> S + Send + Sync + Clone + 'static,
    S: EventStore + Send + Sync + 'static,
{
    const SCENARIO: &str = "append_order_preserved";
    const SEQUENCES: [u64; 4] = [1, 2, 3, 4];

    let store = make_store();
    let stream_id = contract_stream_id(SCENARIO, "ordered")?;

    // Two events in one batch, then two single appends.
    let writes = register_contract_stream(SCENARIO, StreamWrites::new(), &stream_id, exact(0))?;
    let writes = append_contract_event(SCENARIO, writes, &stream_id, SEQUENCES[0])?;
    let writes = append_contract_event(SCENARIO, writes, &stream_id, SEQUENCES[1])?;
    let _ = store
        .append_events(writes)
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "append_events", error))?;
    single_append(SCENARIO, &store, &stream_id, exact(2), SEQUENCES[2]).await?;
    single_append(SCENARIO, &store, &stream_id, exact(3), SEQUENCES[3]).await?;

    let reader = store
        .read_stream(stream_id.clone())
        .await
        .map_err(|error| ContractTestFailure::store_error(SCENARIO, "read_stream", error))?;

    let positions: Vec<usize> = reader
        .iter()
        .map(|event| event.position().into_inner())
        .collect();
    if positions != [1, 2, 3, 4] {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            format!("expected positions [1, 2, 3, 4], observed {positions:?}"),
        ));
    }

    let sequences: Vec<Option<u64>> = reader
        .decode::<ContractTestEvent>()
        .map(|event| event.sequence())
        .collect();
    let expected: Vec<Option<u64>> = SEQUENCES.iter().copied().map(Some).collect();
    if sequences != expected {
        return Err(ContractTestFailure::assertion(
            SCENARIO,
            format!("expected payload order {expected:?}, observed {sequences:?}"),
        ));
    }

    Ok(())
}

/// Generate a `#[tokio::test]` per contract scenario for one store.
///
/// ```ignore
/// event_store_contract_tests! {
///     suite = in_memory,
///     make_store = booking_es::InMemoryEventStore::new,
/// }
/// ```
#[macro_export]
macro_rules! event_store_contract_tests {
    (suite = $suite:ident, make_store = $make_store:expr $(,)?) => {
        #[allow(non_snake_case)]
        mod $suite {
            use $crate::contract::{
                test_any_version_appends_unconditionally, test_append_order_preserved,
                test_basic_read_write, test_concurrent_version_conflicts,
                test_conflict_preserves_atomicity, test_missing_stream_reads,
                test_stream_isolation,
            };

            #[tokio::test(flavor = "multi_thread")]
            async fn basic_read_write_contract() {
                test_basic_read_write($make_store)
                    .await
                    .expect("event store contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            async fn missing_stream_reads_contract() {
                test_missing_stream_reads($make_store)
                    .await
                    .expect("event store contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            async fn concurrent_version_conflicts_contract() {
                test_concurrent_version_conflicts($make_store)
                    .await
                    .expect("event store contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            async fn any_version_appends_unconditionally_contract() {
                test_any_version_appends_unconditionally($make_store)
                    .await
                    .expect("event store contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            async fn stream_isolation_contract() {
                test_stream_isolation($make_store)
                    .await
                    .expect("event store contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            async fn conflict_preserves_atomicity_contract() {
                test_conflict_preserves_atomicity($make_store)
                    .await
                    .expect("event store contract failed");
            }

            #[tokio::test(flavor = "multi_thread")]
            async fn append_order_preserved_contract() {
                test_append_order_preserved($make_store)
                    .await
                    .expect("event store contract failed");
            }
        }
    };
}

pub use event_store_contract_tests;
