//! SAS long-poll frame encoding and response validation.
//!
//! A long poll is addressed to one gaming machine:
//!
//! ```text
//! [address] [opcode] [params...] [crc_lo] [crc_hi]
//! ```
//!
//! The checksum covers the address byte, but the address itself is
//! transmitted separately in the MARK-parity wake-up pre-amble, so only
//! [`wire_bytes`] of the frame go out in the SPACE-parity data phase.
//!
//! Responses to data commands echo the address and opcode and end with their
//! own checksum; responses to control commands are a bare address echo.
//!
//! Numeric fields in SAS payloads are packed BCD: the byte `0x12` means
//! twelve, and `[0x00, 0x00, 0x25, 0x00]` means 2500.

use bytes::{BufMut, BytesMut};
use saslib_core::{Error, Result};

use crate::crc;

/// Default address a SAS master uses for the wake-up pre-amble.
pub const DEFAULT_POLL_ADDRESS: u8 = 0x82;

/// Offset added to the device address to form its general-poll byte.
pub const GENERAL_POLL_BASE: u8 = 0x80;

/// Encode a long-poll frame for `address`.
///
/// `command` is the opcode followed by its parameters. When `crc_need` is
/// set, the CRC-16 of `[address] ++ command` is appended.
pub fn build_frame(address: u8, command: &[u8], crc_need: bool) -> Vec<u8> {
    let capacity = 1 + command.len() + if crc_need { 2 } else { 0 };
    let mut buf = BytesMut::with_capacity(capacity);
    buf.put_u8(address);
    buf.put_slice(command);
    if crc_need {
        let crc = crc::calculate(&buf);
        buf.put_slice(&crc);
    }
    buf.to_vec()
}

/// The part of a frame sent in the data phase (everything but the address).
pub fn wire_bytes(frame: &[u8]) -> &[u8] {
    frame.get(1..).unwrap_or(&[])
}

/// The two-byte wake-up pre-amble sent under MARK parity.
pub fn preamble(poll_address: u8, address: u8) -> [u8; 2] {
    [poll_address, address]
}

/// The byte that general-polls the machine at `address`.
pub fn general_poll_byte(address: u8) -> u8 {
    GENERAL_POLL_BASE.wrapping_add(address)
}

/// Interpret an acknowledgement response as an integer.
///
/// The bytes are read as one big-endian number, so a single-byte echo
/// `[0x0C]` yields 12. Returns `None` when nothing was received or the
/// response is too long to be an echo.
pub fn parse_echo(response: &[u8]) -> Option<u32> {
    if response.is_empty() || response.len() > 4 {
        return None;
    }
    Some(
        response
            .iter()
            .fold(0u32, |acc, &byte| (acc << 8) | u32::from(byte)),
    )
}

/// Check that `response` answers `frame` and strip its framing.
///
/// The first response byte must echo the device address and the second the
/// opcode. The trailing checksum is then verified with [`crc::validate`].
/// The returned payload starts with the opcode echo.
///
/// # Errors
///
/// - [`Error::NoConnection`] if `response` is empty
/// - [`Error::BadCommandIsRunning`] if the address or opcode echo differs
/// - [`Error::BadCrc`] if the checksum does not match
pub fn validate_response<'a>(response: &'a [u8], frame: &[u8]) -> Result<&'a [u8]> {
    if response.is_empty() {
        return Err(Error::NoConnection);
    }
    if response.get(..2) != frame.get(..2) {
        return Err(Error::BadCommandIsRunning {
            command: frame.to_vec(),
            response: response.to_vec(),
        });
    }
    crc::validate(response)
}

/// Check that every nibble of `data` is a decimal digit.
pub fn validate_bcd(data: &[u8]) -> Result<()> {
    for &byte in data {
        if byte >> 4 > 9 || byte & 0x0F > 9 {
            return Err(Error::Protocol(format!(
                "invalid BCD digit in byte 0x{byte:02X} of {data:02X?}"
            )));
        }
    }
    Ok(())
}

/// Decode a big-endian packed BCD field.
pub fn bcd_to_u64(data: &[u8]) -> Result<u64> {
    validate_bcd(data)?;
    Ok(data.iter().fold(0u64, |acc, &byte| {
        acc * 100 + u64::from(byte >> 4) * 10 + u64::from(byte & 0x0F)
    }))
}

/// Encode `value` as a two-byte big-endian packed BCD field.
///
/// # Errors
///
/// Returns [`Error::InvalidParameter`] if `value` exceeds 9999.
pub fn u16_to_bcd(value: u16) -> Result<[u8; 2]> {
    if value > 9999 {
        return Err(Error::InvalidParameter(format!(
            "{value} does not fit in four BCD digits"
        )));
    }
    let digit = |n: u16| (n % 10) as u8;
    Ok([
        (digit(value / 1000) << 4) | digit(value / 100),
        (digit(value / 10) << 4) | digit(value),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_frame_with_crc() {
        assert_eq!(build_frame(0x0C, &[0x01], true), vec![0x0C, 0x01, 0x29, 0xB8]);
        assert_eq!(
            build_frame(0x0C, &[0x0E, 0x01], true),
            vec![0x0C, 0x0E, 0x01, 0x3A, 0x2E]
        );
    }

    #[test]
    fn build_frame_without_crc() {
        assert_eq!(build_frame(0x0C, &[0x0F], false), vec![0x0C, 0x0F]);
    }

    #[test]
    fn wire_bytes_drop_address() {
        let frame = build_frame(0x01, &[0x02], true);
        assert_eq!(wire_bytes(&frame), &[0x02, 0xCA, 0x3A]);
        assert!(wire_bytes(&[]).is_empty());
    }

    #[test]
    fn preamble_and_general_poll_byte() {
        assert_eq!(preamble(DEFAULT_POLL_ADDRESS, 0x0C), [0x82, 0x0C]);
        assert_eq!(general_poll_byte(0x0C), 0x8C);
        assert_eq!(general_poll_byte(0x01), 0x81);
    }

    #[test]
    fn parse_echo_values() {
        assert_eq!(parse_echo(&[0x0C]), Some(12));
        assert_eq!(parse_echo(&[0x01]), Some(1));
        assert_eq!(parse_echo(&[0x01, 0x00]), Some(256));
        assert_eq!(parse_echo(&[]), None);
        assert_eq!(parse_echo(&[0; 5]), None);
    }

    #[test]
    fn validate_response_strips_framing() {
        let frame = build_frame(0x0C, &[0x55], false);
        let response = [0x0C, 0x55, 0x00, 0x03, 0xF1, 0x1F];
        assert_eq!(
            validate_response(&response, &frame).unwrap(),
            &[0x55, 0x00, 0x03]
        );
    }

    #[test]
    fn validate_response_empty() {
        let frame = build_frame(0x0C, &[0x55], false);
        assert!(matches!(
            validate_response(&[], &frame),
            Err(Error::NoConnection)
        ));
    }

    #[test]
    fn validate_response_wrong_address() {
        let frame = build_frame(0x0C, &[0x55], false);
        let response = [0x0D, 0x55, 0x00, 0x03, 0xF1, 0x1F];
        match validate_response(&response, &frame) {
            Err(Error::BadCommandIsRunning { command, response }) => {
                assert_eq!(command, vec![0x0C, 0x55]);
                assert_eq!(response[0], 0x0D);
            }
            other => panic!("expected BadCommandIsRunning, got {other:?}"),
        }
    }

    #[test]
    fn validate_response_wrong_opcode() {
        let frame = build_frame(0x0C, &[0x51], false);
        let response = [0x0C, 0x55, 0x00, 0x03, 0xF1, 0x1F];
        assert!(matches!(
            validate_response(&response, &frame),
            Err(Error::BadCommandIsRunning { .. })
        ));
    }

    #[test]
    fn validate_response_single_byte_echo() {
        // An ACK arriving where data was expected is out of step.
        let frame = build_frame(0x0C, &[0x55], false);
        assert!(matches!(
            validate_response(&[0x0C], &frame),
            Err(Error::BadCommandIsRunning { .. })
        ));
    }

    #[test]
    fn validate_response_bad_crc() {
        let frame = build_frame(0x0C, &[0x55], false);
        let response = [0x0C, 0x55, 0x00, 0x03, 0xF1, 0x1E];
        assert!(matches!(
            validate_response(&response, &frame),
            Err(Error::BadCrc(_))
        ));
    }

    #[test]
    fn bcd_decoding() {
        assert_eq!(bcd_to_u64(&[0x00, 0x00, 0x25, 0x00]).unwrap(), 2500);
        assert_eq!(bcd_to_u64(&[0x12, 0x34, 0x56, 0x78]).unwrap(), 12_345_678);
        assert_eq!(bcd_to_u64(&[0x99, 0x99, 0x99, 0x99]).unwrap(), 99_999_999);
        assert_eq!(bcd_to_u64(&[]).unwrap(), 0);
    }

    #[test]
    fn bcd_rejects_hex_digits() {
        assert!(matches!(bcd_to_u64(&[0x00, 0x0A]), Err(Error::Protocol(_))));
        assert!(matches!(bcd_to_u64(&[0xF0]), Err(Error::Protocol(_))));
    }

    #[test]
    fn u16_to_bcd_values() {
        assert_eq!(u16_to_bcd(1).unwrap(), [0x00, 0x01]);
        assert_eq!(u16_to_bcd(12).unwrap(), [0x00, 0x12]);
        assert_eq!(u16_to_bcd(1234).unwrap(), [0x12, 0x34]);
        assert_eq!(u16_to_bcd(9999).unwrap(), [0x99, 0x99]);
        assert!(matches!(u16_to_bcd(10_000), Err(Error::InvalidParameter(_))));
    }
}
