//! saslib-core: Core traits, types, and error definitions for saslib.
//!
//! This crate defines the device-agnostic abstractions the SAS protocol
//! engine is built on. Applications that only need to name errors or
//! implement a custom line driver depend on these types without pulling in
//! the serial stack.
//!
//! # Key types
//!
//! - [`Transport`] -- byte-level half-duplex channel with line control
//! - [`LineSettings`] -- the parity/stop-bit/timeout profiles used on the SAS line
//! - [`DeviceAddress`] -- the EGM address discovered during the handshake
//! - [`Error`] / [`Result`] -- error handling

pub mod error;
pub mod transport;
pub mod types;

pub use error::{Error, Result};
pub use transport::Transport;
pub use types::*;
