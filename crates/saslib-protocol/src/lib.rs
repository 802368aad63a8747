//! SAS (Slot Accounting System) protocol engine for saslib.
//!
//! This crate implements the master side of the SAS serial protocol used to
//! poll electronic gaming machines. It provides:
//!
//! - **CRC-16** ([`crc`]) -- the table-driven checksum carried by every frame.
//! - **Framing** ([`frame`]) -- long-poll frame encoding, wake-up pre-amble,
//!   response validation and BCD field helpers.
//! - **Command builders** ([`commands`]) -- the long polls this crate speaks,
//!   with their response sizes and checksum requirements.
//! - **Decoders** ([`meters`], [`gpoll`]) -- meter snapshots, game meters,
//!   machine identification and general-poll exception codes.
//! - **Real-time events** ([`realtime`]) -- framed events reported once
//!   real-time event reporting is enabled.
//! - **Long-poll table** ([`long_poll`]) -- poll type and description for
//!   every documented long-poll opcode.
//! - **SasClient** ([`client`], [`catalog`]) -- the connection: address
//!   handshake, exclusive long-poll and general-poll exchanges over a
//!   [`Transport`](saslib_core::Transport), and the typed command catalog.
//! - **SasBuilder** ([`builder`]) -- fluent construction from a site
//!   configuration.
//!
//! # Example
//!
//! ```
//! use saslib_protocol::commands::cmd_shutdown;
//! use saslib_protocol::frame::{build_frame, wire_bytes};
//! use saslib_protocol::long_poll::LongPollLookup;
//!
//! // Shutdown addressed to machine 0x0C, CRC appended
//! let poll = cmd_shutdown();
//! let frame = build_frame(0x0C, &poll.command, poll.crc_need);
//! assert_eq!(frame, vec![0x0C, 0x01, 0x29, 0xB8]);
//!
//! // The address goes out in the wake-up pre-amble, the rest after it
//! assert_eq!(wire_bytes(&frame), &[0x01, 0x29, 0xB8]);
//!
//! assert_eq!(LongPollLookup::event("01"), "Shutdown (lock out player)");
//! ```

pub mod builder;
pub mod catalog;
pub mod client;
pub mod commands;
pub mod crc;
pub mod frame;
pub mod gpoll;
pub mod long_poll;
pub mod meters;
pub mod realtime;

pub use builder::{MachineIdentity, SasBuilder, SasConfig};
pub use client::SasClient;
pub use gpoll::PollEvent;
pub use long_poll::{LongPollDescriptor, LongPollLookup, PollType};
pub use meters::{GameMeters, MachineInfo, MeterSnapshot, MeterValue};
pub use realtime::RealtimeEvent;
