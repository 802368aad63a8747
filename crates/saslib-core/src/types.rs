//! Core types used throughout saslib.
//!
//! Line-level settings for the SAS serial link and the small value types
//! that describe a connection to one gaming machine.

use std::fmt;
use std::time::Duration;

use crate::error::{Error, Result};

/// Baud rate mandated by the SAS protocol.
pub const SAS_BAUD_RATE: u32 = 19_200;

/// Parity mode of the serial line.
///
/// SAS signals the start of a long poll by sending the address byte with
/// the ninth (parity) bit set, which is why [`Parity::Mark`] and
/// [`Parity::Space`] are first-class here even though few UART drivers
/// expose them directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Odd,
    Even,
    /// Parity bit always 1 (the SAS wake-up bit).
    Mark,
    /// Parity bit always 0 (the data phase of a long poll).
    Space,
}

/// Number of stop bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopBits {
    One,
    Two,
}

/// A complete line profile: parity, stop bits and the read timeout that
/// goes with them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSettings {
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub timeout: Duration,
}

impl LineSettings {
    /// Profile applied before sending a long poll: MARK parity, 1 stop bit.
    pub fn command_port(timeout: Duration) -> Self {
        Self {
            parity: Parity::Mark,
            stop_bits: StopBits::One,
            timeout,
        }
    }

    /// Profile applied before a general poll: no parity, 2 stop bits.
    pub fn event_port(timeout: Duration) -> Self {
        Self {
            parity: Parity::None,
            stop_bits: StopBits::Two,
            timeout,
        }
    }
}

/// Address of a gaming machine on the SAS line, in `0..=127`.
///
/// Discovered once per connection by the handshake and echoed by the
/// machine in every long-poll response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceAddress(u8);

impl DeviceAddress {
    /// Highest valid SAS address.
    pub const MAX: u8 = 0x7F;

    /// Create an address, rejecting values above [`DeviceAddress::MAX`].
    pub fn new(value: u8) -> Result<Self> {
        if value > Self::MAX {
            return Err(Error::InvalidParameter(format!(
                "SAS address 0x{value:02X} out of range 0x00-0x7F"
            )));
        }
        Ok(DeviceAddress(value))
    }

    /// The raw address byte.
    pub fn value(&self) -> u8 {
        self.0
    }

    /// Two-digit lowercase hex form, e.g. `"0c"` for address 12.
    pub fn hex(&self) -> String {
        format!("{:02x}", self.0)
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

impl TryFrom<u8> for DeviceAddress {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        DeviceAddress::new(value)
    }
}

/// Lifecycle state of a connection to one gaming machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No handshake has completed, or the connection was closed.
    #[default]
    Closed,
    /// Waiting for the machine to announce its address.
    Handshaking,
    /// The device address is known and commands can be sent.
    Open,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Closed => write!(f, "closed"),
            ConnectionState::Handshaking => write!(f, "handshaking"),
            ConnectionState::Open => write!(f, "open"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_port_profile() {
        let s = LineSettings::command_port(Duration::from_millis(200));
        assert_eq!(s.parity, Parity::Mark);
        assert_eq!(s.stop_bits, StopBits::One);
        assert_eq!(s.timeout, Duration::from_millis(200));
    }

    #[test]
    fn event_port_profile() {
        let s = LineSettings::event_port(Duration::from_secs(1));
        assert_eq!(s.parity, Parity::None);
        assert_eq!(s.stop_bits, StopBits::Two);
        assert_eq!(s.timeout, Duration::from_secs(1));
    }

    #[test]
    fn device_address_range() {
        assert_eq!(DeviceAddress::new(0).unwrap().value(), 0);
        assert_eq!(DeviceAddress::new(0x7F).unwrap().value(), 0x7F);
        assert!(matches!(
            DeviceAddress::new(0x80),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn device_address_hex_and_display() {
        let addr = DeviceAddress::try_from(12).unwrap();
        assert_eq!(addr.hex(), "0c");
        assert_eq!(addr.to_string(), "0x0C");
    }

    #[test]
    fn connection_state_default_is_closed() {
        assert_eq!(ConnectionState::default(), ConnectionState::Closed);
        assert_eq!(ConnectionState::Handshaking.to_string(), "handshaking");
    }
}
