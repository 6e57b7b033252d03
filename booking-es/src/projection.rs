//! State projection for bookings.
//!
//! A booking's lifecycle state is a pure fold over its event stream: start
//! at [`LifecycleState::Inquiry`] and let each event overwrite the state in
//! append order. Unrecognized events are skipped.

use crate::events::BookingEvent;
use booking_es_types::RecordedEvent;
use std::fmt;

/// Where a booking is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LifecycleState {
    /// No decision yet. The state of every empty stream.
    #[default]
    Inquiry,
    /// Confirmed; may still be canceled.
    Confirmed,
    /// Canceled; accepts no further commands.
    Canceled,
}

impl LifecycleState {
    /// Fold one event into the state. Later events win by position.
    #[must_use]
    pub const fn apply(self, event: &BookingEvent) -> Self {
        match event {
            BookingEvent::Confirmed { .. } => Self::Confirmed,
            BookingEvent::Canceled { .. } => Self::Canceled,
        }
    }

    /// Only an inquiry can be confirmed.
    pub const fn can_confirm(self) -> bool {
        matches!(self, Self::Inquiry)
    }

    /// Inquiries and confirmed bookings can be canceled.
    pub const fn can_cancel(self) -> bool {
        matches!(self, Self::Inquiry | Self::Confirmed)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inquiry => write!(f, "inquiry"),
            Self::Confirmed => write!(f, "confirmed"),
            Self::Canceled => write!(f, "canceled"),
        }
    }
}

/// Derive the lifecycle state from typed events in append order.
pub fn project<'a>(events: impl IntoIterator<Item = &'a BookingEvent>) -> LifecycleState {
    events
        .into_iter()
        .fold(LifecycleState::default(), LifecycleState::apply)
}

/// Derive the lifecycle state from recorded events, skipping unknown types.
pub fn project_recorded<'a>(events: impl IntoIterator<Item = &'a RecordedEvent>) -> LifecycleState {
    events
        .into_iter()
        .filter_map(RecordedEvent::decode::<BookingEvent>)
        .fold(LifecycleState::default(), |state, event| state.apply(&event))
}
