//! Decoders for meter and identification payloads.
//!
//! Every decoder takes the payload returned by
//! [`validate_response`](crate::frame::validate_response), which still
//! starts with the echoed opcode; field offsets below are relative to it.
//!
//! Credit meters can be reported raw or scaled to currency. Scaling
//! multiplies the raw credit count by the machine denomination and rounds to
//! cents, so with a denomination of `0.01` a raw meter of 250 becomes `2.5`.
//! Games-played counters are never scaled.

use std::collections::BTreeMap;
use std::fmt;

use saslib_core::{Error, Result};

use crate::frame::bcd_to_u64;

/// A meter reading, raw or scaled by the denomination.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MeterValue {
    /// Raw credit or event count.
    Count(u64),
    /// Currency amount rounded to two decimal places.
    Amount(f64),
}

impl MeterValue {
    /// Build from a raw meter, scaling when a denomination is given.
    pub fn from_raw(raw: u64, denomination: Option<f64>) -> Self {
        match denomination {
            Some(denom) => MeterValue::Amount((raw as f64 * denom * 100.0).round() / 100.0),
            None => MeterValue::Count(raw),
        }
    }

    /// The reading as a float, whichever form it is in.
    pub fn as_f64(&self) -> f64 {
        match *self {
            MeterValue::Count(n) => n as f64,
            MeterValue::Amount(a) => a,
        }
    }
}

impl fmt::Display for MeterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeterValue::Count(n) => write!(f, "{n}"),
            MeterValue::Amount(a) => write!(f, "{a:.2}"),
        }
    }
}

fn field(payload: &[u8], start: usize, len: usize) -> Result<&[u8]> {
    payload.get(start..start + len).ok_or_else(|| {
        Error::Protocol(format!(
            "payload of {} bytes too short for field at {start}..{}",
            payload.len(),
            start + len
        ))
    })
}

fn bcd_field(payload: &[u8], start: usize, len: usize) -> Result<u64> {
    bcd_to_u64(field(payload, start, len)?)
}

fn ascii_field(payload: &[u8], start: usize, len: usize) -> Result<String> {
    let bytes = field(payload, start, len)?;
    Ok(String::from_utf8_lossy(bytes)
        .trim_end_matches(['\0', ' '])
        .to_string())
}

/// Decode a single 4-byte BCD meter (long polls 0x10-0x15, 0x1A).
pub fn decode_single_meter(payload: &[u8]) -> Result<u64> {
    bcd_field(payload, 1, 4)
}

/// Decode a 2-byte BCD game number (long polls 0x51, 0x55).
pub fn decode_game_number(payload: &[u8]) -> Result<u16> {
    // Four BCD digits never exceed 9999.
    Ok(bcd_field(payload, 1, 2)? as u16)
}

/// Meters 10 through 15 as reported by long poll 0x0F.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeterSnapshot {
    pub total_cancelled_credits: MeterValue,
    pub total_in: MeterValue,
    pub total_out: MeterValue,
    pub total_drop: MeterValue,
    pub total_jackpot: MeterValue,
    pub games_played: u64,
}

impl MeterSnapshot {
    /// Decode the payload of a meters-10-15 response.
    ///
    /// Fields are six 4-byte BCD meters following the opcode echo:
    /// cancelled credits, coin in, coin out, drop, jackpot, games played.
    pub fn decode(payload: &[u8], denomination: Option<f64>) -> Result<Self> {
        let meter = |start| -> Result<MeterValue> {
            Ok(MeterValue::from_raw(bcd_field(payload, start, 4)?, denomination))
        };
        Ok(MeterSnapshot {
            total_cancelled_credits: meter(1)?,
            total_in: meter(5)?,
            total_out: meter(9)?,
            total_drop: meter(13)?,
            total_jackpot: meter(17)?,
            games_played: bcd_field(payload, 21, 4)?,
        })
    }

    /// The snapshot keyed by the meter column names used for persistence.
    pub fn to_map(&self) -> BTreeMap<&'static str, MeterValue> {
        BTreeMap::from([
            ("total_cancelled_credits_meter", self.total_cancelled_credits),
            ("total_in_meter", self.total_in),
            ("total_out_meter", self.total_out),
            ("total_drop_meter", self.total_drop),
            ("total_jackpot_meter", self.total_jackpot),
            ("games_played_meter", MeterValue::Count(self.games_played)),
        ])
    }
}

/// Per-game meters reported by long poll 0x52.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GameMeters {
    pub game_number: u16,
    pub coin_in: MeterValue,
    pub coin_out: MeterValue,
    pub jackpot: MeterValue,
    pub games_played: u64,
}

impl GameMeters {
    pub fn decode(payload: &[u8], denomination: Option<f64>) -> Result<Self> {
        let meter = |start| -> Result<MeterValue> {
            Ok(MeterValue::from_raw(bcd_field(payload, start, 4)?, denomination))
        };
        Ok(GameMeters {
            game_number: bcd_field(payload, 1, 2)? as u16,
            coin_in: meter(3)?,
            coin_out: meter(7)?,
            jackpot: meter(11)?,
            games_played: bcd_field(payload, 15, 4)?,
        })
    }
}

/// Gaming machine identification reported by long poll 0x1F.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineInfo {
    /// Two-character game ID.
    pub game_id: String,
    /// Three-character additional ID.
    pub additional_id: String,
    /// SAS denomination code of the machine.
    pub denomination_code: u8,
    pub max_bet: u8,
    pub progressive_group: u8,
    /// Game options bitfield.
    pub game_options: u16,
    pub paytable_id: String,
    /// Theoretical payback percentage as sent, e.g. `"9500"` for 95.00%.
    pub base_percentage: String,
}

impl MachineInfo {
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let options = field(payload, 9, 2)?;
        Ok(MachineInfo {
            game_id: ascii_field(payload, 1, 2)?,
            additional_id: ascii_field(payload, 3, 3)?,
            denomination_code: field(payload, 6, 1)?[0],
            max_bet: bcd_field(payload, 7, 1)? as u8,
            progressive_group: field(payload, 8, 1)?[0],
            game_options: u16::from_be_bytes([options[0], options[1]]),
            paytable_id: ascii_field(payload, 11, 6)?,
            base_percentage: ascii_field(payload, 17, 4)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meters_payload(values: [[u8; 4]; 6]) -> Vec<u8> {
        let mut payload = vec![0x0F];
        for v in values {
            payload.extend_from_slice(&v);
        }
        payload
    }

    fn one_through_six() -> Vec<u8> {
        meters_payload([
            [0, 0, 0, 0x01],
            [0, 0, 0, 0x02],
            [0, 0, 0, 0x03],
            [0, 0, 0, 0x04],
            [0, 0, 0, 0x05],
            [0, 0, 0, 0x06],
        ])
    }

    #[test]
    fn snapshot_scaled_by_denomination() {
        let snap = MeterSnapshot::decode(&one_through_six(), Some(0.01)).unwrap();
        assert_eq!(snap.total_cancelled_credits, MeterValue::Amount(0.01));
        assert_eq!(snap.total_in, MeterValue::Amount(0.02));
        assert_eq!(snap.total_out, MeterValue::Amount(0.03));
        assert_eq!(snap.total_drop, MeterValue::Amount(0.04));
        assert_eq!(snap.total_jackpot, MeterValue::Amount(0.05));
        assert_eq!(snap.games_played, 6);
    }

    #[test]
    fn snapshot_unscaled() {
        let snap = MeterSnapshot::decode(&one_through_six(), None).unwrap();
        assert_eq!(snap.total_cancelled_credits, MeterValue::Count(1));
        assert_eq!(snap.total_in, MeterValue::Count(2));
        assert_eq!(snap.total_out, MeterValue::Count(3));
        assert_eq!(snap.total_drop, MeterValue::Count(4));
        assert_eq!(snap.total_jackpot, MeterValue::Count(5));
        assert_eq!(snap.games_played, 6);
    }

    #[test]
    fn snapshot_multi_digit_bcd() {
        let payload = meters_payload([
            [0x00, 0x00, 0x12, 0x34],
            [0x00, 0x01, 0x00, 0x00],
            [0x00, 0x00, 0x99, 0x99],
            [0x00, 0x00, 0x00, 0x00],
            [0x00, 0x00, 0x50, 0x00],
            [0x00, 0x00, 0x10, 0x00],
        ]);
        let snap = MeterSnapshot::decode(&payload, Some(0.01)).unwrap();
        assert_eq!(snap.total_cancelled_credits, MeterValue::Amount(12.34));
        assert_eq!(snap.total_in, MeterValue::Amount(100.0));
        assert_eq!(snap.total_out, MeterValue::Amount(99.99));
        assert_eq!(snap.total_drop, MeterValue::Amount(0.0));
        assert_eq!(snap.total_jackpot, MeterValue::Amount(50.0));
        assert_eq!(snap.games_played, 1000);
    }

    #[test]
    fn snapshot_quarter_denomination() {
        let payload = meters_payload([[0, 0, 0, 0x03]; 6]);
        let snap = MeterSnapshot::decode(&payload, Some(0.25)).unwrap();
        assert_eq!(snap.total_in, MeterValue::Amount(0.75));
        assert_eq!(snap.games_played, 3);
    }

    #[test]
    fn snapshot_short_payload() {
        let payload = &one_through_six()[..20];
        assert!(matches!(
            MeterSnapshot::decode(payload, None),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn snapshot_bad_bcd() {
        let mut payload = one_through_six();
        payload[4] = 0x0B;
        assert!(matches!(
            MeterSnapshot::decode(&payload, None),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn snapshot_map_is_fresh_per_call() {
        let a = MeterSnapshot::decode(&one_through_six(), Some(0.01)).unwrap();
        let b = MeterSnapshot::decode(&one_through_six(), None).unwrap();

        let map_a = a.to_map();
        let map_b = b.to_map();
        assert_eq!(map_a.len(), 6);
        assert_eq!(map_a["total_in_meter"], MeterValue::Amount(0.02));
        assert_eq!(map_a["games_played_meter"], MeterValue::Count(6));
        assert_eq!(map_b["total_in_meter"], MeterValue::Count(2));
    }

    #[test]
    fn meter_value_display() {
        assert_eq!(MeterValue::Count(42).to_string(), "42");
        assert_eq!(MeterValue::Amount(2.5).to_string(), "2.50");
        assert_eq!(MeterValue::Amount(0.05).as_f64(), 0.05);
    }

    #[test]
    fn single_meter_and_game_number() {
        assert_eq!(
            decode_single_meter(&[0x1A, 0x00, 0x00, 0x25, 0x00]).unwrap(),
            2500
        );
        assert_eq!(decode_game_number(&[0x55, 0x00, 0x03]).unwrap(), 3);
        assert_eq!(decode_game_number(&[0x51, 0x00, 0x12]).unwrap(), 12);
        assert!(decode_game_number(&[0x55]).is_err());
    }

    #[test]
    fn game_meters() {
        let payload = [
            0x52, 0x00, 0x01, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x05, 0x00, 0x00, 0x00, 0x00,
            0x50, 0x00, 0x00, 0x00, 0x42,
        ];
        let meters = GameMeters::decode(&payload, Some(0.01)).unwrap();
        assert_eq!(meters.game_number, 1);
        assert_eq!(meters.coin_in, MeterValue::Amount(10.0));
        assert_eq!(meters.coin_out, MeterValue::Amount(5.0));
        assert_eq!(meters.jackpot, MeterValue::Amount(0.5));
        assert_eq!(meters.games_played, 42);
    }

    #[test]
    fn machine_info() {
        let mut payload = vec![0x1F];
        payload.extend_from_slice(b"AT");
        payload.extend_from_slice(b"000");
        payload.extend_from_slice(&[0x01, 0x05, 0x00, 0x00, 0x00]);
        payload.extend_from_slice(b"AB1234");
        payload.extend_from_slice(b"9500");

        let info = MachineInfo::decode(&payload).unwrap();
        assert_eq!(info.game_id, "AT");
        assert_eq!(info.additional_id, "000");
        assert_eq!(info.denomination_code, 0x01);
        assert_eq!(info.max_bet, 5);
        assert_eq!(info.progressive_group, 0);
        assert_eq!(info.game_options, 0);
        assert_eq!(info.paytable_id, "AB1234");
        assert_eq!(info.base_percentage, "9500");
    }

    #[test]
    fn machine_info_short_payload() {
        assert!(matches!(
            MachineInfo::decode(&[0x1F, b'A', b'T']),
            Err(Error::Protocol(_))
        ));
    }
}
