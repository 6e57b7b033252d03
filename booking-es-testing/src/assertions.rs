//! Assertions about what a stream has published.

use booking_es_types::{EventStore, EventStoreError, StreamId};

/// The type tags of every event in `stream_id`, in append order.
pub async fn published_event_types<S>(
    store: &S,
    stream_id: &StreamId,
) -> Result<Vec<String>, EventStoreError>
where
    S: EventStore,
{
    let reader = store.read_stream(stream_id.clone()).await?;

    Ok(reader
        .iter()
        .map(|event| event.event_type().to_string())
        .collect())
}

/// Assert that `stream_id` holds exactly `expected` event types, in order.
///
/// # Panics
///
/// Panics when the stream cannot be read or its event types differ.
pub async fn assert_published<S>(store: &S, stream_id: &StreamId, expected: &[&str])
where
    S: EventStore,
{
    let published = published_event_types(store, stream_id)
        .await
        .unwrap_or_else(|error| panic!("failed to read stream {stream_id}: {error}"));

    assert_eq!(
        published, expected,
        "stream {stream_id} published {published:?}, expected {expected:?}"
    );
}
