//! Integration tests for `booking-es`
//!
//! This crate contains integration tests that verify the booking aggregate
//! together with the in-memory store and the shared test tooling.

// This is a test-only crate
#![cfg(test)]
