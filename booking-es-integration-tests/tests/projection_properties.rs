//! Property tests for projecting booking streams.
//!
//! Streams are generated as sequences of known and unknown event types,
//! written through the in-memory store, read back, and folded.

use booking_es::{
    project, project_recorded, BookingEvent, EventData, EventStore, EventTypeName,
    ExpectedVersion, InMemoryEventStore, LifecycleState, RecordedEvent, StreamId, StreamWrites,
};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Generated {
    Known(BookingEvent),
    Unknown(&'static str),
}

/// Adapter so generated unknown types can be appended like any event.
#[derive(Debug, Clone)]
struct Foreign(&'static str);

impl booking_es::Event for Foreign {
    fn event_type_name(&self) -> &'static str {
        self.0
    }

    fn data(&self) -> EventData {
        EventData::new().with("source", "property-test")
    }

    fn from_recorded(_event_type: &EventTypeName, _data: &EventData) -> Option<Self> {
        None
    }
}

fn known_event() -> impl Strategy<Value = BookingEvent> {
    prop_oneof![
        Just(BookingEvent::confirmed()),
        Just(BookingEvent::canceled()),
    ]
}

fn generated_event() -> impl Strategy<Value = Generated> {
    prop_oneof![
        3 => known_event().prop_map(Generated::Known),
        1 => prop_oneof![
            Just("Rescheduled"),
            Just("GuestCountChanged"),
            Just("confirmed"),
        ]
        .prop_map(Generated::Unknown),
    ]
}

fn expected_state(history: &[Generated]) -> LifecycleState {
    history
        .iter()
        .rev()
        .find_map(|event| match event {
            Generated::Known(BookingEvent::Confirmed { .. }) => Some(LifecycleState::Confirmed),
            Generated::Known(BookingEvent::Canceled { .. }) => Some(LifecycleState::Canceled),
            Generated::Unknown(_) => None,
        })
        .unwrap_or(LifecycleState::Inquiry)
}

fn record(history: &[Generated]) -> Vec<RecordedEvent> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime builds");

    runtime.block_on(async {
        let store = InMemoryEventStore::new();
        let stream_id = StreamId::try_new("booking-property").expect("valid stream id");

        for event in history {
            let writes = StreamWrites::new()
                .register_stream(stream_id.clone(), ExpectedVersion::Any)
                .and_then(|writes| match event {
                    Generated::Known(known) => writes.append(&stream_id, known.clone()),
                    Generated::Unknown(tag) => writes.append(&stream_id, Foreign(*tag)),
                })
                .expect("valid writes");
            let _ = store.append_events(writes).await.expect("append succeeds");
        }

        store
            .read_stream(stream_id)
            .await
            .expect("read succeeds")
            .into_iter()
            .collect()
    })
}

proptest! {
    #[test]
    fn stored_history_projects_to_the_last_known_event(
        history in prop::collection::vec(generated_event(), 0..24)
    ) {
        let recorded = record(&history);

        prop_assert_eq!(recorded.len(), history.len());
        prop_assert_eq!(project_recorded(&recorded), expected_state(&history));
    }

    #[test]
    fn replaying_a_stream_is_deterministic(
        history in prop::collection::vec(generated_event(), 0..24)
    ) {
        let recorded = record(&history);

        prop_assert_eq!(project_recorded(&recorded), project_recorded(&recorded));
    }

    #[test]
    fn unknown_events_do_not_change_the_projection(
        known in prop::collection::vec(known_event(), 0..16)
    ) {
        let interleaved: Vec<Generated> = known
            .iter()
            .cloned()
            .flat_map(|event| [Generated::Unknown("Rescheduled"), Generated::Known(event)])
            .collect();

        let recorded = record(&interleaved);

        prop_assert_eq!(project_recorded(&recorded), project(&known));
    }

    #[test]
    fn positions_are_consecutive_from_one(
        history in prop::collection::vec(generated_event(), 1..24)
    ) {
        let recorded = record(&history);
        let positions: Vec<usize> = recorded
            .iter()
            .map(|event| event.position().into_inner())
            .collect();

        prop_assert_eq!(positions, (1..=history.len()).collect::<Vec<_>>());
    }
}
