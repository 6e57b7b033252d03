//! `booking-es` - an event-sourced booking aggregate.
//!
//! A booking's state is never stored. It is derived every time by folding
//! the booking's event stream, validated against the incoming command, and
//! extended by appending the resulting event. The event store is handed to
//! the aggregate explicitly; nothing here reaches for a global client.
//!
//! ```ignore
//! use booking_es::{Booking, InMemoryEventStore, LifecycleState};
//!
//! let store = InMemoryEventStore::new();
//! let booking = Booking::new(&store);
//!
//! booking.confirm().await?;
//! assert_eq!(booking.state().await?, LifecycleState::Confirmed);
//!
//! // Confirming twice is rejected and writes nothing.
//! assert!(booking.confirm().await.is_err());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod booking;
pub mod config;
mod errors;
mod events;
mod identity;
mod memory;
mod projection;
mod retry;

pub use booking::{decide, Booking, BookingCommand};
pub use config::{BookingConfig, ConcurrencyControl, RetryConfig};
pub use errors::CommandError;
pub use events::BookingEvent;
pub use identity::{BookingId, STREAM_PREFIX};
pub use memory::InMemoryEventStore;
pub use projection::{project, project_recorded, LifecycleState};
pub use retry::retry_on_conflict;

pub use booking_es_types::{
    Event, EventData, EventId, EventStore, EventStoreError, EventStreamReader, EventStreamSlice,
    EventTypeName, ExpectedVersion, Operation, RecordedEvent, StreamId, StreamVersion,
    StreamWrites,
};
