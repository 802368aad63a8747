//! SAS long-poll command builders.
//!
//! Each builder returns a [`LongPoll`]: the opcode and parameters plus the
//! framing properties the exchange needs (whether a checksum is appended,
//! whether the answer is a bare address echo, and how many bytes to read).
//! The device address and checksum are added by the client at send time,
//! so builders are pure and address-independent.

use std::time::Duration;

use saslib_core::Result;

use crate::frame::u16_to_bcd;

// ---------------------------------------------------------------
// Long-poll opcodes
// ---------------------------------------------------------------

pub const LP_SHUTDOWN: u8 = 0x01;
pub const LP_STARTUP: u8 = 0x02;
pub const LP_SOUND_OFF: u8 = 0x03;
pub const LP_SOUND_ON: u8 = 0x04;
pub const LP_REEL_SOUNDS_OFF: u8 = 0x05;
pub const LP_ENABLE_BILL_ACCEPTOR: u8 = 0x06;
pub const LP_DISABLE_BILL_ACCEPTOR: u8 = 0x07;
pub const LP_CONFIGURE_BILL_DENOMS: u8 = 0x08;
pub const LP_ENABLE_DISABLE_GAME: u8 = 0x09;
pub const LP_ENTER_MAINTENANCE: u8 = 0x0A;
pub const LP_EXIT_MAINTENANCE: u8 = 0x0B;
pub const LP_REALTIME_EVENTS: u8 = 0x0E;
pub const LP_METERS_10_15: u8 = 0x0F;
pub const LP_TOTAL_CANCELLED_CREDITS: u8 = 0x10;
pub const LP_TOTAL_COIN_IN: u8 = 0x11;
pub const LP_TOTAL_COIN_OUT: u8 = 0x12;
pub const LP_TOTAL_DROP: u8 = 0x13;
pub const LP_TOTAL_JACKPOT: u8 = 0x14;
pub const LP_GAMES_PLAYED: u8 = 0x15;
pub const LP_CURRENT_CREDITS: u8 = 0x1A;
pub const LP_MACHINE_ID: u8 = 0x1F;
pub const LP_GAMES_IMPLEMENTED: u8 = 0x51;
pub const LP_GAME_N_METERS: u8 = 0x52;
pub const LP_SELECTED_GAME: u8 = 0x55;

// ---------------------------------------------------------------
// Response sizes (address echo through CRC)
// ---------------------------------------------------------------

/// A control command is acknowledged by a single address byte.
pub const ACK_RESPONSE_SIZE: usize = 1;
pub const METERS_10_15_RESPONSE_SIZE: usize = 28;
/// Address, opcode, 4-byte BCD meter, CRC.
pub const SINGLE_METER_RESPONSE_SIZE: usize = 8;
pub const MACHINE_ID_RESPONSE_SIZE: usize = 24;
/// Address, opcode, 2-byte BCD game number, CRC.
pub const GAME_NUMBER_RESPONSE_SIZE: usize = 6;
pub const GAME_N_METERS_RESPONSE_SIZE: usize = 22;

/// Bill acceptor action flag for [`cmd_configure_bill_denominations`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillAcceptorAction {
    /// Disable the acceptor after each accepted bill.
    DisableAfterEachBill = 0x00,
    /// Keep the acceptor enabled after each accepted bill.
    KeepEnabled = 0x01,
}

/// A long poll ready to be framed and sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LongPoll {
    /// Opcode followed by parameters.
    pub command: Vec<u8>,
    /// The response is a bare address echo rather than a data frame.
    pub no_response: bool,
    /// Append a CRC-16 to the outgoing frame.
    pub crc_need: bool,
    /// Number of response bytes to read.
    pub response_size: usize,
    /// Overrides the connection timeout for this exchange.
    pub timeout: Option<Duration>,
}

impl LongPoll {
    /// A control command acknowledged by an address echo.
    pub fn ack(command: Vec<u8>) -> Self {
        LongPoll {
            command,
            no_response: true,
            crc_need: true,
            response_size: ACK_RESPONSE_SIZE,
            timeout: None,
        }
    }

    /// A read command answered by a data frame of `response_size` bytes.
    pub fn read(command: Vec<u8>, crc_need: bool, response_size: usize) -> Self {
        LongPoll {
            command,
            no_response: false,
            crc_need,
            response_size,
            timeout: None,
        }
    }

    /// Use `timeout` instead of the connection timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The opcode byte.
    pub fn opcode(&self) -> u8 {
        self.command.first().copied().unwrap_or_default()
    }
}

// ---------------------------------------------------------------
// Control commands
// ---------------------------------------------------------------

pub fn cmd_shutdown() -> LongPoll {
    LongPoll::ack(vec![LP_SHUTDOWN])
}

pub fn cmd_startup() -> LongPoll {
    LongPoll::ack(vec![LP_STARTUP])
}

pub fn cmd_sound_off() -> LongPoll {
    LongPoll::ack(vec![LP_SOUND_OFF])
}

pub fn cmd_sound_on() -> LongPoll {
    LongPoll::ack(vec![LP_SOUND_ON])
}

/// Silence reel-spin and game-play sounds only.
pub fn cmd_reel_sounds_off() -> LongPoll {
    LongPoll::ack(vec![LP_REEL_SOUNDS_OFF])
}

pub fn cmd_enable_bill_acceptor() -> LongPoll {
    LongPoll::ack(vec![LP_ENABLE_BILL_ACCEPTOR])
}

pub fn cmd_disable_bill_acceptor() -> LongPoll {
    LongPoll::ack(vec![LP_DISABLE_BILL_ACCEPTOR])
}

/// Select which bill denominations the acceptor takes.
///
/// `denominations` is the 3-byte enable bitmap, lowest denomination in the
/// least significant bit of the first byte. The frame carries a leading
/// zero byte ahead of the bitmap.
pub fn cmd_configure_bill_denominations(
    denominations: [u8; 3],
    action: BillAcceptorAction,
) -> LongPoll {
    LongPoll::ack(vec![
        LP_CONFIGURE_BILL_DENOMS,
        0x00,
        denominations[0],
        denominations[1],
        denominations[2],
        action as u8,
    ])
}

/// Enable or disable game `game` (0 addresses the gaming machine as a whole).
///
/// # Errors
///
/// Returns [`Error::InvalidParameter`](saslib_core::Error::InvalidParameter)
/// if `game` does not fit in four BCD digits.
pub fn cmd_enable_disable_game(game: u16, enable: bool) -> Result<LongPoll> {
    let [hi, lo] = u16_to_bcd(game)?;
    // 0x00 enables, 0x01 disables.
    Ok(LongPoll::ack(vec![
        LP_ENABLE_DISABLE_GAME,
        hi,
        lo,
        u8::from(!enable),
    ]))
}

pub fn cmd_enter_maintenance_mode() -> LongPoll {
    LongPoll::ack(vec![LP_ENTER_MAINTENANCE])
}

pub fn cmd_exit_maintenance_mode() -> LongPoll {
    LongPoll::ack(vec![LP_EXIT_MAINTENANCE])
}

pub fn cmd_realtime_event_reporting(enable: bool) -> LongPoll {
    LongPoll::ack(vec![LP_REALTIME_EVENTS, u8::from(enable)])
}

// ---------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------

/// Meters 10 through 15 in one frame.
pub fn cmd_send_meters_10_15() -> LongPoll {
    LongPoll::read(vec![LP_METERS_10_15], false, METERS_10_15_RESPONSE_SIZE)
}

/// One of the single-meter reads 0x10-0x15 or current credits (0x1A).
pub fn cmd_single_meter(opcode: u8) -> LongPoll {
    LongPoll::read(vec![opcode], false, SINGLE_METER_RESPONSE_SIZE)
}

pub fn cmd_gaming_machine_id() -> LongPoll {
    LongPoll::read(vec![LP_MACHINE_ID], false, MACHINE_ID_RESPONSE_SIZE)
}

pub fn cmd_total_games_implemented() -> LongPoll {
    LongPoll::read(vec![LP_GAMES_IMPLEMENTED], false, GAME_NUMBER_RESPONSE_SIZE)
}

/// Meters for game `game`. Unlike the other reads this one carries a CRC.
pub fn cmd_game_n_meters(game: u16) -> Result<LongPoll> {
    let [hi, lo] = u16_to_bcd(game)?;
    Ok(LongPoll::read(
        vec![LP_GAME_N_METERS, hi, lo],
        true,
        GAME_N_METERS_RESPONSE_SIZE,
    ))
}

pub fn cmd_selected_game_number() -> LongPoll {
    LongPoll::read(vec![LP_SELECTED_GAME], false, GAME_NUMBER_RESPONSE_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::build_frame;
    use saslib_core::Error;

    fn framed(poll: &LongPoll, address: u8) -> Vec<u8> {
        build_frame(address, &poll.command, poll.crc_need)
    }

    #[test]
    fn simple_control_frames_for_address_0c() {
        let cases = [
            (cmd_shutdown(), [0x01, 0x29, 0xB8]),
            (cmd_startup(), [0x02, 0xB2, 0x8A]),
            (cmd_sound_off(), [0x03, 0x3B, 0x9B]),
            (cmd_sound_on(), [0x04, 0x84, 0xEF]),
            (cmd_reel_sounds_off(), [0x05, 0x0D, 0xFE]),
            (cmd_enable_bill_acceptor(), [0x06, 0x96, 0xCC]),
            (cmd_disable_bill_acceptor(), [0x07, 0x1F, 0xDD]),
            (cmd_enter_maintenance_mode(), [0x0A, 0xFA, 0x06]),
            (cmd_exit_maintenance_mode(), [0x0B, 0x73, 0x17]),
        ];
        for (poll, wire) in cases {
            let frame = framed(&poll, 0x0C);
            assert_eq!(frame[0], 0x0C);
            assert_eq!(&frame[1..], &wire, "opcode 0x{:02X}", poll.opcode());
            assert!(poll.no_response);
            assert_eq!(poll.response_size, ACK_RESPONSE_SIZE);
        }
    }

    #[test]
    fn simple_control_frames_for_address_01() {
        let cases = [
            (cmd_shutdown(), [0x51, 0x08]),
            (cmd_startup(), [0xCA, 0x3A]),
            (cmd_sound_off(), [0x43, 0x2B]),
            (cmd_sound_on(), [0xFC, 0x5F]),
            (cmd_reel_sounds_off(), [0x75, 0x4E]),
            (cmd_enable_bill_acceptor(), [0xEE, 0x7C]),
            (cmd_disable_bill_acceptor(), [0x67, 0x6D]),
            (cmd_enter_maintenance_mode(), [0x82, 0xB6]),
            (cmd_exit_maintenance_mode(), [0x0B, 0xA7]),
        ];
        for (poll, crc) in cases {
            let frame = framed(&poll, 0x01);
            assert_eq!(&frame[2..], &crc, "opcode 0x{:02X}", poll.opcode());
        }
    }

    #[test]
    fn realtime_event_reporting_frames() {
        assert_eq!(
            framed(&cmd_realtime_event_reporting(true), 0x0C),
            vec![0x0C, 0x0E, 0x01, 0x3A, 0x2E]
        );
        assert_eq!(
            framed(&cmd_realtime_event_reporting(false), 0x0C),
            vec![0x0C, 0x0E, 0x00, 0xB3, 0x3F]
        );
    }

    #[test]
    fn enable_disable_game_frames() {
        let enable = cmd_enable_disable_game(1, true).unwrap();
        assert_eq!(
            framed(&enable, 0x0C),
            vec![0x0C, 0x09, 0x00, 0x01, 0x00, 0x8B, 0x97]
        );

        let disable = cmd_enable_disable_game(12, false).unwrap();
        assert_eq!(
            framed(&disable, 0x0C),
            vec![0x0C, 0x09, 0x00, 0x12, 0x01, 0xFB, 0x39]
        );
    }

    #[test]
    fn enable_disable_game_rejects_large_numbers() {
        assert!(matches!(
            cmd_enable_disable_game(10_000, true),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn configure_bill_denominations_frame() {
        let poll =
            cmd_configure_bill_denominations([0xFF, 0xFF, 0xFF], BillAcceptorAction::KeepEnabled);
        assert_eq!(
            poll.command,
            vec![0x08, 0x00, 0xFF, 0xFF, 0xFF, 0x01]
        );
        assert_eq!(
            framed(&poll, 0x0C),
            vec![0x0C, 0x08, 0x00, 0xFF, 0xFF, 0xFF, 0x01, 0xAA, 0x7D]
        );
    }

    #[test]
    fn meters_10_15_has_no_crc() {
        let poll = cmd_send_meters_10_15();
        assert!(!poll.no_response);
        assert!(!poll.crc_need);
        assert_eq!(poll.response_size, 28);
        assert_eq!(framed(&poll, 0x0C), vec![0x0C, 0x0F]);
    }

    #[test]
    fn read_command_shapes() {
        assert_eq!(cmd_single_meter(LP_TOTAL_COIN_IN).command, vec![0x11]);
        assert_eq!(cmd_single_meter(LP_CURRENT_CREDITS).response_size, 8);
        assert_eq!(cmd_gaming_machine_id().response_size, 24);
        assert_eq!(cmd_total_games_implemented().command, vec![0x51]);
        assert_eq!(cmd_selected_game_number().response_size, 6);
        for poll in [
            cmd_single_meter(LP_GAMES_PLAYED),
            cmd_gaming_machine_id(),
            cmd_total_games_implemented(),
            cmd_selected_game_number(),
        ] {
            assert!(!poll.crc_need);
            assert!(!poll.no_response);
        }
    }

    #[test]
    fn game_n_meters_frame() {
        let poll = cmd_game_n_meters(1).unwrap();
        assert!(poll.crc_need);
        assert_eq!(poll.response_size, 22);
        assert_eq!(
            framed(&poll, 0x0C),
            vec![0x0C, 0x52, 0x00, 0x01, 0xE6, 0xB0]
        );
    }

    #[test]
    fn with_timeout_overrides() {
        let poll = cmd_shutdown().with_timeout(Duration::from_millis(50));
        assert_eq!(poll.timeout, Some(Duration::from_millis(50)));
        assert_eq!(cmd_shutdown().timeout, None);
    }
}
