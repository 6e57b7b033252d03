use booking_es_types::{Event, EventData, EventTypeName};

/// Facts recorded in a booking's stream.
///
/// Each variant carries an [`EventData`] payload. Bookings currently write
/// empty payloads; readers ignore any fields they do not understand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingEvent {
    /// The booking was confirmed.
    Confirmed { data: EventData },
    /// The booking was canceled.
    Canceled { data: EventData },
}

impl BookingEvent {
    /// Type tag of [`BookingEvent::Confirmed`].
    pub const CONFIRMED: &'static str = "Confirmed";
    /// Type tag of [`BookingEvent::Canceled`].
    pub const CANCELED: &'static str = "Canceled";

    /// A `Confirmed` event with an empty payload.
    pub fn confirmed() -> Self {
        Self::Confirmed {
            data: EventData::new(),
        }
    }

    /// A `Canceled` event with an empty payload.
    pub fn canceled() -> Self {
        Self::Canceled {
            data: EventData::new(),
        }
    }
}

impl Event for BookingEvent {
    fn event_type_name(&self) -> &'static str {
        match self {
            Self::Confirmed { .. } => Self::CONFIRMED,
            Self::Canceled { .. } => Self::CANCELED,
        }
    }

    fn data(&self) -> EventData {
        match self {
            Self::Confirmed { data } | Self::Canceled { data } => data.clone(),
        }
    }

    fn from_recorded(event_type: &EventTypeName, data: &EventData) -> Option<Self> {
        let data = data.clone();
        match event_type.as_str() {
            Self::CONFIRMED => Some(Self::Confirmed { data }),
            Self::CANCELED => Some(Self::Canceled { data }),
            _ => None,
        }
    }
}
