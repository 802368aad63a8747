//! CRC-16 used to checksum every SAS frame.
//!
//! SAS uses the reflected CCITT polynomial (`0x8408`, i.e. `0x1021` bit
//! reversed) with an initial value of zero and no final XOR, computed with
//! a 256-entry lookup table. The checksum travels low byte first.
//!
//! # Example
//!
//! ```
//! use saslib_protocol::crc;
//!
//! // Shutdown (0x01) addressed to machine 0x01
//! assert_eq!(crc::calculate(&[0x01, 0x01]), [0x51, 0x08]);
//!
//! let frame = [0x01, 0x01, 0x51, 0x08];
//! assert_eq!(crc::validate(&frame).unwrap(), &[0x01]);
//! ```

use saslib_core::{Error, Result};

/// Reflected polynomial the lookup table is generated from.
pub const SEED: u16 = 0x8408;

static TABLE: [u16; 256] = build_table();

const fn build_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut val = i as u16;
        let mut bit = 0;
        while bit < 8 {
            val = if val & 0x0001 != 0 {
                (val >> 1) ^ SEED
            } else {
                val >> 1
            };
            bit += 1;
        }
        table[i] = val;
        i += 1;
    }
    table
}

/// Byte order of the two checksum bytes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endianness {
    /// Low byte first. This is what gaming machines send and expect.
    #[default]
    Little,
    /// High byte first.
    Big,
}

/// Raw 16-bit checksum of `payload` starting from `init`.
pub fn checksum(payload: &[u8], init: u16) -> u16 {
    payload.iter().fold(init, |crc, &byte| {
        (crc >> 8) ^ TABLE[((crc ^ byte as u16) & 0x00FF) as usize]
    })
}

/// Checksum of `payload` as two wire bytes in the given order.
pub fn calculate_with(payload: &[u8], init: u16, endianness: Endianness) -> [u8; 2] {
    let crc = checksum(payload, init);
    match endianness {
        Endianness::Little => crc.to_le_bytes(),
        Endianness::Big => crc.to_be_bytes(),
    }
}

/// Checksum of `payload` with the production defaults (init 0, low byte first).
pub fn calculate(payload: &[u8]) -> [u8; 2] {
    calculate_with(payload, 0, Endianness::Little)
}

/// Verify the trailing checksum of `frame` and strip the framing.
///
/// The checksum covers everything but the last two bytes. On success the
/// frame is returned without its leading address byte and without the
/// checksum.
///
/// # Errors
///
/// - [`Error::NoConnection`] if `frame` is empty
/// - [`Error::BadCrc`] if the checksum does not match or the frame is too
///   short to carry one
pub fn validate_with(frame: &[u8], init: u16, endianness: Endianness) -> Result<&[u8]> {
    if frame.is_empty() {
        return Err(Error::NoConnection);
    }
    if frame.len() < 2 {
        return Err(Error::BadCrc(frame.to_vec()));
    }

    let (body, received) = frame.split_at(frame.len() - 2);
    if calculate_with(body, init, endianness) != received {
        return Err(Error::BadCrc(frame.to_vec()));
    }
    Ok(body.get(1..).unwrap_or(&[]))
}

/// [`validate_with`] using the production defaults.
pub fn validate(frame: &[u8]) -> Result<&[u8]> {
    validate_with(frame, 0, Endianness::Little)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_crc(payload: &[u8]) -> Vec<u8> {
        let mut frame = payload.to_vec();
        frame.extend_from_slice(&calculate(payload));
        frame
    }

    #[test]
    fn table_spot_checks() {
        assert_eq!(TABLE[0], 0x0000);
        assert_eq!(TABLE[1], 0x1189);
        assert_eq!(TABLE[128], 0x8408);
        assert_eq!(TABLE[255], 0x0F78);
    }

    #[test]
    fn check_value_123456789() {
        // CRC-16/KERMIT check value.
        assert_eq!(checksum(b"123456789", 0), 0x2189);
        assert_eq!(calculate(b"123456789"), [0x89, 0x21]);
    }

    #[test]
    fn big_endian_swaps_bytes() {
        assert_eq!(
            calculate_with(b"123456789", 0, Endianness::Big),
            [0x21, 0x89]
        );
    }

    #[test]
    fn empty_payload_is_zero() {
        assert_eq!(calculate(&[]), [0x00, 0x00]);
    }

    #[test]
    fn init_value_changes_result() {
        assert_ne!(
            calculate_with(&[0x01, 0x01], 0xFFFF, Endianness::Little),
            calculate(&[0x01, 0x01])
        );
    }

    #[test]
    fn shutdown_frames() {
        assert_eq!(calculate(&[0x01, 0x01]), [0x51, 0x08]);
        assert_eq!(calculate(&[0x0C, 0x01]), [0x29, 0xB8]);
        assert_eq!(calculate(&[0x0C, 0x02]), [0xB2, 0x8A]);
    }

    #[test]
    fn validate_strips_address_and_crc() {
        let frame = with_crc(&[0x0C, 0x1A, 0x00, 0x00, 0x25, 0x00]);
        assert_eq!(validate(&frame).unwrap(), &[0x1A, 0x00, 0x00, 0x25, 0x00]);
    }

    #[test]
    fn round_trip_returns_payload_without_address() {
        let payloads: [&[u8]; 5] = [
            &[0x01],
            &[0x0C, 0x0F],
            &[0x7F, 0x00, 0xFF, 0x80, 0x01],
            b"123456789",
            &[0x00; 25],
        ];
        for payload in payloads {
            let frame = with_crc(payload);
            assert_eq!(validate(&frame).unwrap(), &payload[1..]);
        }
    }

    #[test]
    fn round_trip_with_big_endian() {
        let payload = [0x0C, 0x55, 0x00, 0x03];
        let mut frame = payload.to_vec();
        frame.extend_from_slice(&calculate_with(&payload, 0, Endianness::Big));
        assert_eq!(
            validate_with(&frame, 0, Endianness::Big).unwrap(),
            &payload[1..]
        );
        assert!(matches!(validate(&frame), Err(Error::BadCrc(_))));
    }

    #[test]
    fn single_bit_flip_is_detected() {
        let payloads: [&[u8]; 3] = [
            &[0x0C, 0x01],
            &[0x0C, 0x0F, 0x00, 0x00, 0x00, 0x01],
            &[0x01, 0x1F, 0x41, 0x54, 0x30, 0x30, 0x30],
        ];
        for payload in payloads {
            let frame = with_crc(payload);
            for byte in 0..frame.len() {
                for bit in 0..8 {
                    let mut corrupted = frame.clone();
                    corrupted[byte] ^= 1 << bit;
                    assert!(
                        matches!(validate(&corrupted), Err(Error::BadCrc(_))),
                        "flip of bit {bit} in byte {byte} of {frame:02X?} went undetected"
                    );
                }
            }
        }
    }

    #[test]
    fn validate_empty_is_no_connection() {
        assert!(matches!(validate(&[]), Err(Error::NoConnection)));
    }

    #[test]
    fn validate_single_byte_is_bad_crc() {
        assert!(matches!(validate(&[0x0C]), Err(Error::BadCrc(_))));
    }

    #[test]
    fn validate_wrong_crc() {
        let result = validate(&[0x0C, 0x01, 0x00, 0x00]);
        match result {
            Err(Error::BadCrc(frame)) => assert_eq!(frame, vec![0x0C, 0x01, 0x00, 0x00]),
            other => panic!("expected BadCrc, got {other:?}"),
        }
    }
}
