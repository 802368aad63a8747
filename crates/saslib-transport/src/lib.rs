//! Transport implementations for saslib.
//!
//! This crate provides [`SerialTransport`], the concrete implementation of
//! the [`Transport`](saslib_core::Transport) trait from `saslib-core` for
//! RS-232 and USB virtual COM ports wired to a gaming machine's SAS port.
//!
//! # Example
//!
//! ```no_run
//! use saslib_core::transport::Transport;
//! use saslib_transport::SerialTransport;
//! use std::time::Duration;
//!
//! # async fn example() -> saslib_core::Result<()> {
//! let mut transport = SerialTransport::open("/dev/ttyUSB0").await?;
//!
//! // Wait for the machine to announce its address
//! let mut buf = [0u8; 1];
//! let n = transport.receive(&mut buf, Duration::from_secs(1)).await?;
//! # Ok(())
//! # }
//! ```

pub mod serial;

pub use saslib_core::types::{Parity, StopBits};
pub use serial::{DataBits, FlowControl, SerialConfig, SerialTransport};
