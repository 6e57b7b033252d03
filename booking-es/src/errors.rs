//! Error types for booking commands.
//!
//! [`CommandError`] separates the failures a caller handles differently:
//!
//! - **InvalidTransition**: the booking's current state forbids the
//!   command. Nothing was written. Show the message to the user.
//! - **ConcurrentModification**: another writer appended between this
//!   command's read and its append. Nothing was written. Retrying
//!   reloads fresh state.
//! - **Timeout**: a store operation exceeded the configured limit.
//! - **EventStore**: any other store failure, passed through unchanged.

use crate::booking::BookingCommand;
use crate::projection::LifecycleState;
use booking_es_types::{EventStoreError, ExpectedVersion, Operation, StreamId, StreamVersion};
use std::time::Duration;
use thiserror::Error;

/// Errors returned by [`Booking`](crate::Booking) commands.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    /// The command is not allowed from the booking's current state.
    #[error("Booking cannot be {}", .command.outcome())]
    InvalidTransition {
        /// The rejected command.
        command: BookingCommand,
        /// The state the booking was in when the command was decided.
        state: LifecycleState,
    },

    /// The stream changed between read and append.
    #[error(
        "booking stream {stream_id} was modified concurrently: expected version {expected}, found {actual}"
    )]
    ConcurrentModification {
        /// The contended stream.
        stream_id: StreamId,
        /// The version the command read.
        expected: ExpectedVersion,
        /// The version the store held at append time.
        actual: StreamVersion,
    },

    /// A store operation did not finish within the configured limit.
    #[error("{operation} timed out after {limit:?}")]
    Timeout {
        /// The operation that timed out.
        operation: Operation,
        /// The configured limit.
        limit: Duration,
    },

    /// Any other event store failure.
    #[error("event store error: {0}")]
    EventStore(EventStoreError),
}

impl CommandError {
    /// Whether retrying the command against fresh state may succeed.
    ///
    /// Only concurrent modification qualifies. A rejected transition stays
    /// rejected and store failures are surfaced to the caller.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::ConcurrentModification { .. })
    }
}

impl From<EventStoreError> for CommandError {
    fn from(error: EventStoreError) -> Self {
        match error {
            EventStoreError::VersionConflict {
                stream_id,
                expected,
                actual,
            } => Self::ConcurrentModification {
                stream_id,
                expected,
                actual,
            },
            other => Self::EventStore(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream_id() -> StreamId {
        StreamId::try_new("booking-errors").expect("valid stream id")
    }

    #[test]
    fn invalid_transition_messages_name_the_outcome() {
        let confirm = CommandError::InvalidTransition {
            command: BookingCommand::Confirm,
            state: LifecycleState::Confirmed,
        };
        let cancel = CommandError::InvalidTransition {
            command: BookingCommand::Cancel,
            state: LifecycleState::Canceled,
        };

        assert_eq!(confirm.to_string(), "Booking cannot be confirmed");
        assert_eq!(cancel.to_string(), "Booking cannot be canceled");
    }

    #[test]
    fn version_conflicts_become_concurrent_modification() {
        let error = CommandError::from(EventStoreError::VersionConflict {
            stream_id: stream_id(),
            expected: ExpectedVersion::Exact(StreamVersion::new(0)),
            actual: StreamVersion::new(1),
        });

        assert_eq!(
            error,
            CommandError::ConcurrentModification {
                stream_id: stream_id(),
                expected: ExpectedVersion::Exact(StreamVersion::new(0)),
                actual: StreamVersion::new(1),
            }
        );
        assert!(error.is_retriable());
    }

    #[test]
    fn other_store_errors_pass_through_unchanged() {
        let store_error = EventStoreError::StoreFailure {
            operation: Operation::ReadStream,
        };

        let error = CommandError::from(store_error.clone());

        assert_eq!(error, CommandError::EventStore(store_error));
        assert!(!error.is_retriable());
    }

    #[test]
    fn rejections_and_timeouts_are_not_retriable() {
        let rejected = CommandError::InvalidTransition {
            command: BookingCommand::Confirm,
            state: LifecycleState::Canceled,
        };
        let timed_out = CommandError::Timeout {
            operation: Operation::AppendEvents,
            limit: Duration::from_millis(50),
        };

        assert!(!rejected.is_retriable());
        assert!(!timed_out.is_retriable());
        assert_eq!(timed_out.to_string(), "append_events timed out after 50ms");
    }
}
