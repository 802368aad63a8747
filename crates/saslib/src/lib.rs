//! # saslib -- SAS Host Library for Electronic Gaming Machines
//!
//! `saslib` is an asynchronous Rust library for the master (host) side of the
//! SAS (Slot Accounting System) serial protocol. It discovers a gaming
//! machine's address on the line, issues long polls to control the machine
//! and read its meters, and runs general polls to collect exceptions.
//!
//! ## Quick Start
//!
//! Add `saslib` to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! saslib = "0.1"
//! tokio = { version = "1", features = ["full"] }
//! ```
//!
//! Connect to a machine and read its meters:
//!
//! ```no_run
//! use saslib::SasBuilder;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = SasBuilder::new()
//!         .serial_port("/dev/ttyUSB0")
//!         .denomination(0.01)
//!         .build()
//!         .await?;
//!
//!     let address = client.start().await?;
//!     println!("machine at {}", address);
//!
//!     if let Some(meters) = client.send_meters_10_15(true).await? {
//!         println!("coin in: {}", meters.total_in);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! | Crate                 | Purpose                                          |
//! |-----------------------|--------------------------------------------------|
//! | `saslib-core`         | [`Transport`] trait, line settings, errors       |
//! | `saslib-transport`    | Serial port transport with SAS parity handling   |
//! | `saslib-protocol`     | CRC, framing, commands, decoders, [`SasClient`]  |
//! | `saslib-test-harness` | Scripted mock transport for tests                |
//! | **`saslib`**          | This facade crate -- re-exports everything       |
//!
//! ## Result conventions
//!
//! Control commands return `Ok(true)` when the machine echoed its address,
//! `Ok(false)` otherwise. Read commands return `Ok(None)` when the line
//! failed and `Err` when the machine answered with a malformed frame. A
//! general poll ([`SasClient::events_poll`]) reports a repeated exception as
//! [`PollEvent::NoActivity`]. Once real-time event reporting is enabled,
//! [`SasClient::realtime_events_poll`] returns each [`RealtimeEvent`] with
//! its data.

pub use saslib_core::*;

pub use saslib_protocol::{
    GameMeters, LongPollDescriptor, LongPollLookup, MachineIdentity, MachineInfo,
    MeterSnapshot, MeterValue, PollEvent, PollType, RealtimeEvent, SasBuilder, SasClient,
    SasConfig,
};

/// Wire-level building blocks: CRC, framing and long-poll builders.
///
/// Most applications only need [`SasClient`]. These modules are exposed for
/// tooling that inspects or synthesizes SAS traffic.
pub mod protocol {
    pub use saslib_protocol::{commands, crc, frame, gpoll, long_poll, meters, realtime};
}

/// Serial transport backend.
pub mod transport {
    pub use saslib_transport::*;
}
