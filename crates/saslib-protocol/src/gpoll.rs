//! General-poll exception decoding.
//!
//! A general poll asks the gaming machine for its oldest pending exception.
//! The machine answers with a single exception code, which this module maps
//! to a description. Machines repeat an exception until it is cleared, so
//! [`GeneralPollState`] suppresses a code that matches the previous one and
//! reports [`PollEvent::NoActivity`] instead.

use std::fmt;

use saslib_core::{Error, Result};

/// Text reported for a repeated exception.
pub const NO_ACTIVITY: &str = "No Activity";

static EXCEPTIONS: &[(u8, &str)] = &[
    (0x00, "No activity"),
    (0x11, "Slot door was opened"),
    (0x12, "Slot door was closed"),
    (0x13, "Drop door was opened"),
    (0x14, "Drop door was closed"),
    (0x15, "Card cage was opened"),
    (0x16, "Card cage was closed"),
    (0x17, "AC power was applied to gaming machine"),
    (0x18, "AC power was lost from gaming machine"),
    (0x19, "Cashbox door was opened"),
    (0x1A, "Cashbox door was closed"),
    (0x1B, "Cashbox was removed"),
    (0x1C, "Cashbox was installed"),
    (0x1D, "Belly door was opened"),
    (0x1E, "Belly door was closed"),
    (0x1F, "No activity and waiting for player input"),
    (0x20, "General tilt"),
    (0x21, "Coin in tilt"),
    (0x22, "Coin out tilt"),
    (0x23, "Hopper empty detected"),
    (0x24, "Extra coin paid"),
    (0x25, "Diverter malfunction"),
    (0x27, "Cashbox full detected"),
    (0x28, "Bill jam"),
    (0x29, "Bill acceptor hardware failure"),
    (0x2A, "Reverse bill detected"),
    (0x2B, "Bill rejected"),
    (0x2C, "Counterfeit bill detected"),
    (0x2D, "Reverse coin in detected"),
    (0x2E, "Cashbox near full detected"),
    (0x31, "CMOS RAM error (data recovered from EEPROM)"),
    (0x32, "CMOS RAM error (no data recovered from EEPROM)"),
    (0x33, "CMOS RAM error (bad device)"),
    (0x34, "EEPROM error (data error)"),
    (0x35, "EEPROM error (bad device)"),
    (0x36, "EPROM error (different checksum - version changed)"),
    (0x37, "EPROM error (bad checksum compare)"),
    (0x38, "Partitioned EPROM error (checksum - version changed)"),
    (0x39, "Partitioned EPROM error (bad checksum compare)"),
    (0x3A, "Memory error reset (operator used self test switch)"),
    (0x3B, "Low backup battery detected"),
    (0x3C, "Operator changed options"),
    (0x3D, "A cash out ticket has been printed"),
    (0x3E, "A handpay has been validated"),
    (0x3F, "Validation ID not configured"),
    (0x40, "Reel tilt (which reel is not specified)"),
    (0x41, "Reel 1 tilt"),
    (0x42, "Reel 2 tilt"),
    (0x43, "Reel 3 tilt"),
    (0x44, "Reel 4 tilt"),
    (0x45, "Reel 5 tilt"),
    (0x46, "Reel mechanism disconnected"),
    (0x47, "$1.00 bill accepted"),
    (0x48, "$5.00 bill accepted"),
    (0x49, "$10.00 bill accepted"),
    (0x4A, "$20.00 bill accepted"),
    (0x4B, "$50.00 bill accepted"),
    (0x4C, "$100.00 bill accepted"),
    (0x4D, "$2.00 bill accepted"),
    (0x4E, "$500.00 bill accepted"),
    (0x4F, "Bill accepted"),
    (0x50, "$200.00 bill accepted"),
    (0x51, "Handpay is pending"),
    (0x52, "Handpay was reset"),
    (0x53, "No progressive information has been received for 5 seconds"),
    (0x54, "Progressive win"),
    (0x55, "Player has cancelled the handpay request"),
    (0x56, "SAS progressive level hit"),
    (0x57, "System validation request"),
    (0x60, "Printer communication error"),
    (0x61, "Printer paper out error"),
    (0x66, "Cash out button pressed"),
    (0x67, "Ticket has been inserted"),
    (0x68, "Ticket transfer complete"),
    (0x69, "AFT transfer complete"),
    (0x6A, "AFT request for host cashout"),
    (0x6B, "AFT request for host to cash out win"),
    (0x6C, "AFT request to register"),
    (0x6D, "AFT registration acknowledged"),
    (0x6E, "AFT registration cancelled"),
    (0x6F, "Game locked"),
    (0x70, "Exception buffer overflow"),
    (0x71, "Change lamp on"),
    (0x72, "Change lamp off"),
    (0x74, "Printer paper low"),
    (0x75, "Printer power off"),
    (0x76, "Printer power on"),
    (0x77, "Replace printer ribbon"),
    (0x78, "Printer carriage jammed"),
    (0x79, "Coin in lockout malfunction"),
    (0x7A, "Gaming machine soft (lifetime-to-date) meters reset to zero"),
    (0x7B, "Bill validator (period) totals have been reset by an attendant"),
    (0x7C, "A legacy bonus pay awarded and/or a multiplied jackpot occurred"),
    (0x7E, "Game has started"),
    (0x7F, "Game has ended"),
    (0x80, "Hopper full detected"),
    (0x81, "Hopper level low detected"),
    (0x82, "Display meters or attendant menu has been entered"),
    (0x83, "Display meters or attendant menu has been exited"),
    (0x84, "Self test or operator menu has been entered"),
    (0x85, "Self test or operator menu has been exited"),
    (0x86, "Gaming machine is out of service (by attendant)"),
    (0x87, "Player has requested draw cards"),
    (0x88, "Reel N has stopped"),
    (0x89, "Coin/credit wagered"),
    (0x8A, "Game recall entry has been displayed"),
    (0x8B, "Card held/not held"),
    (0x8C, "Game selected"),
    (0x8E, "Component list changed"),
    (0x8F, "Authentication complete"),
    (0x98, "Power off card cage access"),
    (0x99, "Power off slot door access"),
    (0x9A, "Power off cashbox door access"),
    (0x9B, "Power off drop door access"),
];

/// Look up the description of a general-poll exception code.
pub fn describe(code: u8) -> Option<&'static str> {
    EXCEPTIONS
        .binary_search_by_key(&code, |&(c, _)| c)
        .ok()
        .map(|i| EXCEPTIONS[i].1)
}

/// Result of one general poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEvent {
    /// The machine repeated the previously reported exception.
    NoActivity,
    /// A new exception.
    Event { code: u8, description: &'static str },
}

impl PollEvent {
    /// The exception code, if this is a new event.
    pub fn code(&self) -> Option<u8> {
        match self {
            PollEvent::NoActivity => None,
            PollEvent::Event { code, .. } => Some(*code),
        }
    }
}

impl fmt::Display for PollEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollEvent::NoActivity => f.write_str(NO_ACTIVITY),
            PollEvent::Event { description, .. } => f.write_str(description),
        }
    }
}

/// Last exception seen on a connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeneralPollState {
    last_event: Option<u8>,
}

impl GeneralPollState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last exception code reported as a new event.
    pub fn last_event(&self) -> Option<u8> {
        self.last_event
    }

    /// Decode `code` and apply the repeat suppression.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadGeneralPollResponse`] for an unknown code; the
    /// state is left unchanged.
    pub fn observe(&mut self, code: u8) -> Result<PollEvent> {
        let description = describe(code).ok_or(Error::BadGeneralPollResponse(code))?;
        if self.last_event == Some(code) {
            return Ok(PollEvent::NoActivity);
        }
        self.last_event = Some(code);
        Ok(PollEvent::Event { code, description })
    }

    /// Forget the last exception.
    pub fn reset(&mut self) {
        self.last_event = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_sorted_and_unique() {
        assert!(EXCEPTIONS.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn describe_known_and_unknown() {
        assert_eq!(describe(0x11), Some("Slot door was opened"));
        assert_eq!(describe(0x7E), Some("Game has started"));
        assert_eq!(describe(0x9B), Some("Power off drop door access"));
        assert_eq!(describe(0x26), None);
        assert_eq!(describe(0xFF), None);
    }

    #[test]
    fn repeat_is_no_activity() {
        let mut state = GeneralPollState::new();
        let first = state.observe(0x11).unwrap();
        assert_eq!(
            first,
            PollEvent::Event {
                code: 0x11,
                description: "Slot door was opened"
            }
        );
        assert_eq!(state.observe(0x11).unwrap(), PollEvent::NoActivity);
        assert_eq!(state.last_event(), Some(0x11));
    }

    #[test]
    fn different_code_updates_state() {
        let mut state = GeneralPollState::new();
        state.observe(0x11).unwrap();
        let next = state.observe(0x12).unwrap();
        assert_eq!(next.code(), Some(0x12));
        assert_eq!(next.to_string(), "Slot door was closed");
        assert_eq!(state.last_event(), Some(0x12));

        // A code seen before but not most recently is new again.
        assert_eq!(state.observe(0x11).unwrap().code(), Some(0x11));
    }

    #[test]
    fn unknown_code_leaves_state() {
        let mut state = GeneralPollState::new();
        state.observe(0x7F).unwrap();
        assert!(matches!(
            state.observe(0xFE),
            Err(Error::BadGeneralPollResponse(0xFE))
        ));
        assert_eq!(state.last_event(), Some(0x7F));
        assert_eq!(state.observe(0x7F).unwrap(), PollEvent::NoActivity);
    }

    #[test]
    fn no_activity_display_and_reset() {
        assert_eq!(PollEvent::NoActivity.to_string(), "No Activity");
        assert_eq!(PollEvent::NoActivity.code(), None);

        let mut state = GeneralPollState::new();
        state.observe(0x00).unwrap();
        state.reset();
        assert_eq!(state.last_event(), None);
        assert_eq!(state.observe(0x00).unwrap().code(), Some(0x00));
    }
}
