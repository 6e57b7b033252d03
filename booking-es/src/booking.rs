//! The booking aggregate.
//!
//! A [`Booking`] holds nothing but its identity, the store it was handed,
//! and its configuration. Every command reloads the stream, projects the
//! current [`LifecycleState`], asks [`decide`] whether the command is
//! allowed, and appends the resulting event.

use crate::config::{BookingConfig, ConcurrencyControl};
use crate::errors::CommandError;
use crate::events::BookingEvent;
use crate::identity::BookingId;
use crate::projection::{project_recorded, LifecycleState};
use crate::retry::retry_on_conflict;
use booking_es_types::{
    EventStore, EventStoreError, EventStreamReader, EventStreamSlice, ExpectedVersion,
    Operation, StreamId, StreamWrites,
};
use std::fmt;
use std::future::Future;
use tracing::{debug, info, instrument, warn};

/// Commands a booking accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BookingCommand {
    /// Confirm an inquiry.
    Confirm,
    /// Cancel an inquiry or a confirmed booking.
    Cancel,
}

impl BookingCommand {
    /// The state this command leads to, as used in rejection messages.
    pub const fn outcome(self) -> &'static str {
        match self {
            Self::Confirm => "confirmed",
            Self::Cancel => "canceled",
        }
    }
}

impl fmt::Display for BookingCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Confirm => write!(f, "confirm"),
            Self::Cancel => write!(f, "cancel"),
        }
    }
}

/// Decide which event `command` produces from `state`.
///
/// ```text
/// Inquiry   --confirm--> Confirmed
/// Inquiry   --cancel---> Canceled
/// Confirmed --cancel---> Canceled
/// ```
///
/// Every other pair is an [`CommandError::InvalidTransition`].
pub fn decide(
    state: LifecycleState,
    command: BookingCommand,
) -> Result<BookingEvent, CommandError> {
    match command {
        BookingCommand::Confirm if state.can_confirm() => Ok(BookingEvent::confirmed()),
        BookingCommand::Cancel if state.can_cancel() => Ok(BookingEvent::canceled()),
        _ => Err(CommandError::InvalidTransition { command, state }),
    }
}

/// An event-sourced booking bound to an injected event store.
///
/// The aggregate keeps no state between commands. Construct one per
/// request or keep it around; either way each command sees the stream as
/// it is when the command starts.
#[derive(Debug, Clone)]
pub struct Booking<S> {
    id: BookingId,
    stream_id: StreamId,
    store: S,
    config: BookingConfig,
}

impl<S> Booking<S>
where
    S: EventStore + Sync,
{
    /// A booking with a freshly generated identity.
    pub fn new(store: S) -> Self {
        Self::with_id(BookingId::generate(), store)
    }

    /// A booking for an existing identity.
    pub fn with_id(id: BookingId, store: S) -> Self {
        let stream_id = id.stream_id();
        Self {
            id,
            stream_id,
            store,
            config: BookingConfig::default(),
        }
    }

    /// Replace the default configuration.
    #[must_use]
    pub fn with_config(mut self, config: BookingConfig) -> Self {
        self.config = config;
        self
    }

    /// This booking's identity.
    pub fn id(&self) -> &BookingId {
        &self.id
    }

    /// The key of this booking's stream: `"booking-" + id`.
    pub fn stream_id(&self) -> &StreamId {
        &self.stream_id
    }

    /// The configuration commands run with.
    pub fn config(&self) -> &BookingConfig {
        &self.config
    }

    /// The current lifecycle state. Reads only; never appends.
    #[instrument(skip_all, fields(booking_id = %self.id))]
    pub async fn state(&self) -> Result<LifecycleState, CommandError> {
        let reader = self.load().await?;
        Ok(project_recorded(reader.iter()))
    }

    /// Confirm the booking. Allowed only from [`LifecycleState::Inquiry`].
    pub async fn confirm(&self) -> Result<(), CommandError> {
        let _ = self.execute(BookingCommand::Confirm).await?;
        Ok(())
    }

    /// Cancel the booking. Allowed from `Inquiry` and `Confirmed`.
    pub async fn cancel(&self) -> Result<(), CommandError> {
        let _ = self.execute(BookingCommand::Cancel).await?;
        Ok(())
    }

    /// Load, project, decide and append, returning the appended events.
    ///
    /// A rejected command appends nothing. Under
    /// [`ConcurrencyControl::Optimistic`] a concurrent append fails the
    /// attempt with [`CommandError::ConcurrentModification`]; it is retried
    /// against fresh state while `config.retry.max_attempts` allows.
    #[instrument(skip_all, fields(booking_id = %self.id, command = %command))]
    pub async fn execute(&self, command: BookingCommand) -> Result<EventStreamSlice, CommandError> {
        retry_on_conflict(&self.config.retry, || self.attempt(command)).await
    }

    async fn attempt(&self, command: BookingCommand) -> Result<EventStreamSlice, CommandError> {
        let reader = self.load().await?;
        let state = project_recorded(reader.iter());
        debug!(
            stream_id = %self.stream_id,
            version = %reader.version(),
            events = reader.len(),
            state = %state,
            "projected booking state"
        );

        let event = decide(state, command).inspect_err(|error| {
            warn!(state = %state, error = %error, "rejected booking command");
        })?;

        let expected_version = match self.config.concurrency {
            ConcurrencyControl::Optimistic => ExpectedVersion::Exact(reader.version()),
            ConcurrencyControl::Unchecked => ExpectedVersion::Any,
        };
        let writes = StreamWrites::new()
            .register_stream(self.stream_id.clone(), expected_version)
            .and_then(|writes| writes.append(&self.stream_id, event))?;

        let appended = self
            .bounded(Operation::AppendEvents, self.store.append_events(writes))
            .await?;
        if let Some(last) = appended.last() {
            info!(
                event_type = %last.event_type(),
                position = %last.position(),
                expected_version = %expected_version,
                "appended booking event"
            );
        }

        Ok(appended)
    }

    async fn load(&self) -> Result<EventStreamReader, CommandError> {
        self.bounded(
            Operation::ReadStream,
            self.store.read_stream(self.stream_id.clone()),
        )
        .await
    }

    async fn bounded<T>(
        &self,
        operation: Operation,
        future: impl Future<Output = Result<T, EventStoreError>>,
    ) -> Result<T, CommandError> {
        let Some(limit) = self.config.store_timeout.map(|timeout| timeout.as_duration()) else {
            return future.await.map_err(CommandError::from);
        };

        match tokio::time::timeout(limit, future).await {
            Ok(result) => result.map_err(CommandError::from),
            Err(_elapsed) => {
                warn!(%operation, ?limit, "event store operation timed out");
                Err(CommandError::Timeout { operation, limit })
            }
        }
    }
}
