//! Concurrent commands against one booking.
//!
//! `RaceStore` holds the first two reads at a barrier so both commands
//! observe the same empty stream before either appends, which is the
//! interleaving that makes a double confirm possible.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use booking_es::config::{MaxAttempts, StoreTimeoutMs};
use booking_es::{
    Booking, BookingConfig, BookingEvent, BookingId, CommandError, ConcurrencyControl, EventStore,
    EventStoreError, EventStreamReader, EventStreamSlice, ExpectedVersion, InMemoryEventStore,
    LifecycleState, Operation, RetryConfig, StreamId, StreamWrites,
};
use booking_es_testing::assert_published;
use tokio::sync::Barrier;

struct RaceStore {
    inner: InMemoryEventStore,
    barrier: Barrier,
    reads: AtomicUsize,
}

impl RaceStore {
    fn new(inner: InMemoryEventStore) -> Self {
        Self {
            inner,
            barrier: Barrier::new(2),
            reads: AtomicUsize::new(0),
        }
    }
}

impl EventStore for RaceStore {
    async fn read_stream(&self, stream_id: StreamId) -> Result<EventStreamReader, EventStoreError> {
        let reader = self.inner.read_stream(stream_id).await;
        if self.reads.fetch_add(1, Ordering::SeqCst) < 2 {
            let _ = self.barrier.wait().await;
        }
        reader
    }

    async fn append_events(
        &self,
        writes: StreamWrites,
    ) -> Result<EventStreamSlice, EventStoreError> {
        self.inner.append_events(writes).await
    }
}

/// Lets another writer confirm the booking right before the first append.
struct InterferingStore {
    inner: InMemoryEventStore,
    interfered: AtomicUsize,
}

impl EventStore for InterferingStore {
    async fn read_stream(&self, stream_id: StreamId) -> Result<EventStreamReader, EventStoreError> {
        self.inner.read_stream(stream_id).await
    }

    async fn append_events(
        &self,
        writes: StreamWrites,
    ) -> Result<EventStreamSlice, EventStoreError> {
        if self.interfered.fetch_add(1, Ordering::SeqCst) == 0 {
            if let Some(stream_id) = writes.expected_versions().keys().next() {
                let competing = StreamWrites::new()
                    .register_stream(stream_id.clone(), ExpectedVersion::Any)
                    .and_then(|competing| competing.append(stream_id, BookingEvent::confirmed()))?;
                let _ = self.inner.append_events(competing).await?;
            }
        }
        self.inner.append_events(writes).await
    }
}

/// Never answers reads within any reasonable limit.
struct SlowStore;

impl EventStore for SlowStore {
    async fn read_stream(&self, stream_id: StreamId) -> Result<EventStreamReader, EventStoreError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(EventStreamReader::empty(stream_id))
    }

    async fn append_events(
        &self,
        _writes: StreamWrites,
    ) -> Result<EventStreamSlice, EventStoreError> {
        Ok(EventStreamSlice::default())
    }
}

/// Reads normally but never finishes an append within any reasonable limit.
struct StallingAppendStore {
    inner: InMemoryEventStore,
}

impl EventStore for StallingAppendStore {
    async fn read_stream(&self, stream_id: StreamId) -> Result<EventStreamReader, EventStoreError> {
        self.inner.read_stream(stream_id).await
    }

    async fn append_events(
        &self,
        writes: StreamWrites,
    ) -> Result<EventStreamSlice, EventStoreError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        self.inner.append_events(writes).await
    }
}

fn retrying(attempts: u32) -> RetryConfig {
    RetryConfig::default()
        .with_max_attempts(MaxAttempts::try_new(attempts).expect("valid attempt count"))
}

#[tokio::test]
async fn unchecked_appends_let_a_double_confirm_through() {
    let store = RaceStore::new(InMemoryEventStore::new());
    let id = BookingId::generate();
    let config = BookingConfig::default().with_concurrency(ConcurrencyControl::Unchecked);
    let first = Booking::with_id(id.clone(), &store).with_config(config);
    let second = Booking::with_id(id, &store).with_config(config);

    let (a, b) = tokio::join!(first.confirm(), second.confirm());

    // Both commands decided against the empty stream they read.
    assert_eq!((a, b), (Ok(()), Ok(())));
    assert_published(&store.inner, first.stream_id(), &["Confirmed", "Confirmed"]).await;
}

#[tokio::test]
async fn optimistic_appends_reject_the_losing_confirm() {
    let store = RaceStore::new(InMemoryEventStore::new());
    let id = BookingId::generate();
    let first = Booking::with_id(id.clone(), &store);
    let second = Booking::with_id(id, &store);

    let (a, b) = tokio::join!(first.confirm(), second.confirm());

    let results = [a, b];
    let winners = results.iter().filter(|result| result.is_ok()).count();
    let losers: Vec<_> = results.into_iter().filter_map(Result::err).collect();
    assert_eq!(winners, 1);
    assert!(
        matches!(
            losers.as_slice(),
            [CommandError::ConcurrentModification { .. }]
        ),
        "unexpected losers: {losers:?}"
    );
    assert!(losers[0].is_retriable());
    assert_published(&store.inner, first.stream_id(), &["Confirmed"]).await;
}

#[tokio::test]
async fn retried_loser_sees_the_winner_and_is_rejected() {
    let store = RaceStore::new(InMemoryEventStore::new());
    let id = BookingId::generate();
    let config = BookingConfig::default().with_retry(retrying(2));
    let first = Booking::with_id(id.clone(), &store).with_config(config);
    let second = Booking::with_id(id, &store).with_config(config);

    let (a, b) = tokio::join!(first.confirm(), second.confirm());

    let mut errors: Vec<_> = [a, b].into_iter().filter_map(Result::err).collect();
    assert_eq!(
        errors.pop(),
        Some(CommandError::InvalidTransition {
            command: booking_es::BookingCommand::Confirm,
            state: LifecycleState::Confirmed,
        })
    );
    assert!(errors.is_empty());
    assert_published(&store.inner, first.stream_id(), &["Confirmed"]).await;
}

#[tokio::test]
async fn retry_reloads_state_and_succeeds_when_still_allowed() {
    let store = InterferingStore {
        inner: InMemoryEventStore::new(),
        interfered: AtomicUsize::new(0),
    };
    let booking =
        Booking::new(&store).with_config(BookingConfig::default().with_retry(retrying(3)));

    booking
        .cancel()
        .await
        .expect("cancel is still allowed after the competing confirm");

    assert_published(&store.inner, booking.stream_id(), &["Confirmed", "Canceled"]).await;
    assert_eq!(booking.state().await, Ok(LifecycleState::Canceled));
}

#[tokio::test]
async fn without_retry_interference_surfaces_as_concurrent_modification() {
    let store = InterferingStore {
        inner: InMemoryEventStore::new(),
        interfered: AtomicUsize::new(0),
    };
    let booking = Booking::new(&store);

    let result = booking.cancel().await;

    assert!(matches!(
        result,
        Err(CommandError::ConcurrentModification { ref stream_id, .. })
            if stream_id == booking.stream_id()
    ));
    assert_published(&store.inner, booking.stream_id(), &["Confirmed"]).await;
}

#[tokio::test]
async fn slow_store_operations_time_out() {
    let limit = StoreTimeoutMs::try_new(20).expect("valid timeout");
    let booking =
        Booking::new(SlowStore).with_config(BookingConfig::default().with_store_timeout(limit));

    let result = booking.confirm().await;

    assert_eq!(
        result,
        Err(CommandError::Timeout {
            operation: Operation::ReadStream,
            limit: Duration::from_millis(20),
        })
    );
}

#[tokio::test]
async fn stalled_appends_time_out_without_publishing() {
    let store = StallingAppendStore {
        inner: InMemoryEventStore::new(),
    };
    let limit = StoreTimeoutMs::try_new(20).expect("valid timeout");
    let booking =
        Booking::new(&store).with_config(BookingConfig::default().with_store_timeout(limit));

    let result = booking.confirm().await;

    assert_eq!(
        result,
        Err(CommandError::Timeout {
            operation: Operation::AppendEvents,
            limit: Duration::from_millis(20),
        })
    );
    assert_published(&store.inner, booking.stream_id(), &[]).await;
}

#[tokio::test]
async fn bookings_can_be_driven_from_spawned_tasks() {
    let store = std::sync::Arc::new(InMemoryEventStore::new());
    let booking = Booking::new(store.clone());
    let stream_id = booking.stream_id().clone();

    tokio::spawn(async move { booking.confirm().await })
        .await
        .expect("task completes")
        .expect("confirm succeeds");

    assert_published(&store, &stream_id, &["Confirmed"]).await;
}
