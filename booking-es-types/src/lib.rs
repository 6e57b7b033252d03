#![forbid(
    dead_code,
    invalid_value,
    overflowing_literals,
    unconditional_recursion,
    unreachable_pub,
    unused_allocation,
    unsafe_code
)]
#![deny(
    bad_style,
    clippy::allow_attributes,
    deprecated,
    meta_variable_misuse,
    non_ascii_idents,
    non_camel_case_types,
    non_snake_case,
    non_upper_case_globals,
    rust_2018_idioms,
    rust_2021_compatibility,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_code,
    unused_assignments,
    unused_attributes,
    unused_extern_crates,
    unused_imports,
    unused_must_use,
    unused_mut,
    unused_parens,
    unused_qualifications,
    unused_results,
    unused_variables
)]

//! Shared vocabulary types and traits for the booking-es event sourcing crates.
//!
//! This crate holds the contract between an aggregate and the event store it
//! is handed: how streams are addressed, how events are tagged and carried,
//! and how reads and appends behave. Aggregates depend on these types;
//! event store implementations (the in-memory store in `booking-es`, or any
//! remote client) implement [`EventStore`] against them.
//!
//! # Overview
//!
//! - Traits: [`Event`], [`EventStore`]
//! - Stream types: [`StreamId`], [`StreamVersion`], [`ExpectedVersion`], [`StreamWrites`]
//! - Event types: [`EventId`], [`EventTypeName`], [`EventData`], [`RecordedEvent`]
//! - Read/append results: [`EventStreamReader`], [`EventStreamSlice`]
//! - Errors: [`EventStoreError`], [`Operation`]

mod event;
mod store;
mod validation;

pub use event::{Event, EventData, EventId, EventTypeName, RecordedEvent};
pub use store::{
    EventStore, EventStoreError, EventStreamReader, EventStreamSlice, ExpectedVersion, Operation,
    StreamId, StreamVersion, StreamWriteEntry, StreamWrites,
};
