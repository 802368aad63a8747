//! Real-time event reporting.
//!
//! Once real-time event reporting is switched on with long poll 0x0E, the
//! machine answers a general poll with a framed event instead of a bare
//! exception byte:
//!
//! ```text
//! [address] [0xFF] [event code] [event data...] [crc_lo] [crc_hi]
//! ```
//!
//! Most events carry no data. Game started (0x7E), game ended (0x7F) and
//! game selected (0x8C) carry the fields decoded into [`RealtimeEvent`].
//! Events are queued by the machine and never repeated, so no repeat
//! suppression is applied.

use std::fmt;

use saslib_core::{Error, Result};

use crate::crc;
use crate::frame::bcd_to_u64;
use crate::gpoll::describe;

/// Second byte of every real-time event frame.
pub const RTE_MARKER: u8 = 0xFF;

/// Address, marker and event code.
pub const RTE_HEADER_SIZE: usize = 3;

pub const EVENT_GAME_STARTED: u8 = 0x7E;
pub const EVENT_GAME_ENDED: u8 = 0x7F;
pub const EVENT_GAME_SELECTED: u8 = 0x8C;

/// Number of data bytes following the event code.
pub fn data_len(code: u8) -> usize {
    match code {
        EVENT_GAME_STARTED => 8,
        EVENT_GAME_ENDED => 4,
        EVENT_GAME_SELECTED => 2,
        _ => 0,
    }
}

/// One event reported in real-time mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RealtimeEvent {
    /// A game was started.
    GameStarted {
        credits_wagered: u64,
        /// Total coin-in meter after the wager, in credits.
        total_coin_in: u64,
        wager_type: u8,
        progressive_group: u8,
    },
    /// A game ended; `game_win` is in credits.
    GameEnded { game_win: u64 },
    GameSelected { game: u16 },
    /// Any other exception, reported without data.
    Exception { code: u8, description: &'static str },
}

impl RealtimeEvent {
    /// Decode the data of event `code`.
    ///
    /// # Errors
    ///
    /// - [`Error::BadGeneralPollResponse`] for an unknown event code
    /// - [`Error::Protocol`] if `data` has the wrong length or a bad BCD digit
    pub fn decode(code: u8, data: &[u8]) -> Result<Self> {
        let description = describe(code).ok_or(Error::BadGeneralPollResponse(code))?;
        if data.len() != data_len(code) {
            return Err(Error::Protocol(format!(
                "event 0x{code:02X} carries {} data bytes, expected {}",
                data.len(),
                data_len(code)
            )));
        }
        Ok(match code {
            EVENT_GAME_STARTED => RealtimeEvent::GameStarted {
                credits_wagered: bcd_to_u64(&data[0..2])?,
                total_coin_in: bcd_to_u64(&data[2..6])?,
                wager_type: data[6],
                progressive_group: data[7],
            },
            EVENT_GAME_ENDED => RealtimeEvent::GameEnded {
                game_win: bcd_to_u64(data)?,
            },
            // Four BCD digits never exceed 9999.
            EVENT_GAME_SELECTED => RealtimeEvent::GameSelected {
                game: bcd_to_u64(data)? as u16,
            },
            _ => RealtimeEvent::Exception { code, description },
        })
    }

    /// Check and decode a complete event frame from the machine at `address`.
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`] if the frame is not a real-time event frame
    /// - [`Error::BadCrc`] if the checksum does not match
    /// - any error of [`decode`](Self::decode)
    pub fn decode_frame(frame: &[u8], address: u8) -> Result<Self> {
        if frame.len() < RTE_HEADER_SIZE || frame[0] != address || frame[1] != RTE_MARKER {
            return Err(Error::Protocol(format!(
                "not a real-time event frame from 0x{address:02X}: {frame:02X?}"
            )));
        }
        // Marker, code and data remain once the address and CRC are stripped.
        let body = crc::validate(frame)?;
        let code = body[1];
        Self::decode(code, &body[2..])
    }

    pub fn code(&self) -> u8 {
        match self {
            RealtimeEvent::GameStarted { .. } => EVENT_GAME_STARTED,
            RealtimeEvent::GameEnded { .. } => EVENT_GAME_ENDED,
            RealtimeEvent::GameSelected { .. } => EVENT_GAME_SELECTED,
            RealtimeEvent::Exception { code, .. } => *code,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RealtimeEvent::Exception { description, .. } => description,
            other => describe(other.code()).unwrap_or_default(),
        }
    }
}

impl fmt::Display for RealtimeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RealtimeEvent::GameStarted {
                credits_wagered,
                total_coin_in,
                wager_type,
                ..
            } => write!(
                f,
                "{}: {credits_wagered} credits wagered, coin in {total_coin_in}, wager type {wager_type}",
                self.description()
            ),
            RealtimeEvent::GameEnded { game_win } => {
                write!(f, "{}: win {game_win}", self.description())
            }
            RealtimeEvent::GameSelected { game } => {
                write!(f, "{}: game {game}", self.description())
            }
            RealtimeEvent::Exception { description, .. } => f.write_str(description),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GAME_STARTED: [u8; 13] = [
        0x0C, 0xFF, 0x7E, 0x00, 0x05, 0x00, 0x00, 0x12, 0x34, 0x01, 0x00, 0x0B, 0x20,
    ];

    #[test]
    fn game_started_frame() {
        let event = RealtimeEvent::decode_frame(&GAME_STARTED, 0x0C).unwrap();
        assert_eq!(
            event,
            RealtimeEvent::GameStarted {
                credits_wagered: 5,
                total_coin_in: 1234,
                wager_type: 1,
                progressive_group: 0,
            }
        );
        assert_eq!(event.code(), 0x7E);
        assert_eq!(event.description(), "Game has started");
        assert_eq!(
            event.to_string(),
            "Game has started: 5 credits wagered, coin in 1234, wager type 1"
        );
    }

    #[test]
    fn game_ended_and_selected_frames() {
        let ended = [0x0C, 0xFF, 0x7F, 0x00, 0x00, 0x02, 0x50, 0x8A, 0x52];
        assert_eq!(
            RealtimeEvent::decode_frame(&ended, 0x0C).unwrap(),
            RealtimeEvent::GameEnded { game_win: 250 }
        );

        let selected = [0x0C, 0xFF, 0x8C, 0x00, 0x03, 0x36, 0x29];
        assert_eq!(
            RealtimeEvent::decode_frame(&selected, 0x0C).unwrap(),
            RealtimeEvent::GameSelected { game: 3 }
        );
    }

    #[test]
    fn dataless_event() {
        let frame = [0x0C, 0xFF, 0x11, 0x6B, 0x5B];
        let event = RealtimeEvent::decode_frame(&frame, 0x0C).unwrap();
        assert_eq!(event.code(), 0x11);
        assert_eq!(event.to_string(), "Slot door was opened");
    }

    #[test]
    fn corrupted_frame_is_bad_crc() {
        let mut frame = GAME_STARTED;
        frame[5] ^= 0x10;
        assert!(matches!(
            RealtimeEvent::decode_frame(&frame, 0x0C),
            Err(Error::BadCrc(_))
        ));
    }

    #[test]
    fn foreign_or_unmarked_frame_is_rejected() {
        assert!(matches!(
            RealtimeEvent::decode_frame(&GAME_STARTED, 0x0D),
            Err(Error::Protocol(_))
        ));
        assert!(matches!(
            RealtimeEvent::decode_frame(&[0x0C, 0x11], 0x0C),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn unknown_code_and_wrong_length() {
        assert!(matches!(
            RealtimeEvent::decode(0xFE, &[]),
            Err(Error::BadGeneralPollResponse(0xFE))
        ));
        assert!(matches!(
            RealtimeEvent::decode(EVENT_GAME_ENDED, &[0x00, 0x01]),
            Err(Error::Protocol(_))
        ));
    }
}
