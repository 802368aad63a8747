//! saslib-test-harness: Test utilities and mock transports for saslib.
//!
//! This crate provides [`MockTransport`] for deterministic unit testing of
//! the SAS protocol engine without a gaming machine on the line.

pub mod mock_serial;

pub use mock_serial::{MockProbe, MockTransport};
