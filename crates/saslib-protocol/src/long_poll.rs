//! Reference table of SAS long-poll opcodes.
//!
//! Every documented long poll has a poll type and a short description. The
//! table is used for logging and for classifying opcodes; it does not drive
//! any exchange. Lookups by string key accept `"1f"`, `"1F"` and `"0x1F"`
//! alike and never fail: unknown keys produce fallback text.

use std::fmt;

/// Classification of a long poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PollType {
    /// Set or action command (`S`).
    Set,
    /// Multi-game command addressing a game number (`M`).
    MultiGame,
    /// Read or report command (`R`).
    Read,
    /// Group poll (`G`).
    Group,
    /// Listed as both set and group (`S/G`).
    SetGroup,
    /// No classification is published for the opcode.
    Unclassified,
}

impl PollType {
    /// The letter code used in SAS documentation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PollType::Set => "S",
            PollType::MultiGame => "M",
            PollType::Read => "R",
            PollType::Group => "G",
            PollType::SetGroup => "S/G",
            PollType::Unclassified => "",
        }
    }
}

impl fmt::Display for PollType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the long-poll table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LongPollDescriptor {
    pub opcode: u8,
    pub poll_type: PollType,
    pub description: &'static str,
}

const fn lp(opcode: u8, poll_type: PollType, description: &'static str) -> LongPollDescriptor {
    LongPollDescriptor {
        opcode,
        poll_type,
        description,
    }
}

static LONG_POLLS: &[LongPollDescriptor] = &[
    lp(0x01, PollType::Set, "Shutdown (lock out player)"),
    lp(0x02, PollType::Set, "Startup (enable play)"),
    lp(0x03, PollType::Set, "Sound Off (all sounds disabled)"),
    lp(0x04, PollType::Set, "Sound on (all sounds enabled)"),
    lp(0x05, PollType::Set, "Reel spin or game play sounds disabled"),
    lp(0x06, PollType::Set, "Enable bill acceptor"),
    lp(0x07, PollType::Set, "Disable bill acceptor"),
    lp(0x08, PollType::Set, "Configure bill denominations"),
    lp(0x09, PollType::MultiGame, "Enable/disable game n"),
    lp(0x0A, PollType::Set, "Enter maintenance mode"),
    lp(0x0B, PollType::Set, "Exit maintenance mode"),
    lp(0x0E, PollType::Set, "Enable/disable real time event reporting"),
    lp(0x0F, PollType::Read, "Send Meters 10 through 15"),
    lp(0x10, PollType::Read, "Send total cancelled credits meter"),
    lp(0x11, PollType::Read, "Send total coin in meter"),
    lp(0x12, PollType::Read, "Send total coin out meter"),
    lp(0x13, PollType::Read, "Send total drop meter"),
    lp(0x14, PollType::Read, "Send total jackpot meter"),
    lp(0x15, PollType::Read, "Send games played meter"),
    lp(0x16, PollType::Read, "Send games won meter"),
    lp(0x17, PollType::Read, "Send games lost meter"),
    lp(0x18, PollType::Read, "Send games since last power up and games since last door closure"),
    lp(0x19, PollType::Read, "Send meters 11 through 15"),
    lp(0x1A, PollType::Read, "Send current credits"),
    lp(0x1B, PollType::Read, "Send handpay information"),
    lp(0x1C, PollType::Read, "Send meters"),
    lp(0x1E, PollType::Read, "Send total bill meters (# of bills)"),
    lp(0x1F, PollType::Read, "Send gaming machine ID & information"),
    lp(0x20, PollType::Read, "Send total dollar value of bills meter"),
    lp(0x21, PollType::Set, "ROM signature verification"),
    lp(0x2A, PollType::Read, "Send true coin in"),
    lp(0x2B, PollType::Read, "Send true coin out"),
    lp(0x2C, PollType::Read, "Send current hopper level"),
    lp(0x2D, PollType::MultiGame, "Send total hand paid cancelled credits"),
    lp(0x2E, PollType::Set, "Delay game"),
    lp(0x2F, PollType::MultiGame, "Send selected meters for game n"),
    lp(0x31, PollType::Read, "Send $1.00 bills in meter"),
    lp(0x32, PollType::Read, "Send $2.00 bills in meter"),
    lp(0x33, PollType::Read, "Send $5.00 bills in meter"),
    lp(0x34, PollType::Read, "Send $10.00 bills in meter"),
    lp(0x35, PollType::Read, "Send $20.00 bills in meter"),
    lp(0x36, PollType::Read, "Send $50.00 bills in meter"),
    lp(0x37, PollType::Read, "Send $100.00 bills in meter"),
    lp(0x38, PollType::Read, "Send $500.00 bills in meter"),
    lp(0x39, PollType::Read, "Send $1,000.00 bills in meter"),
    lp(0x3A, PollType::Read, "Send $200.00 bills in meter"),
    lp(0x3B, PollType::Read, "Send $25.00 bills in meter"),
    lp(0x3C, PollType::Read, "Send $2,000.00 bills in meter"),
    lp(0x3D, PollType::Read, "Send cash out ticket information"),
    lp(0x3E, PollType::Read, "Send $2,500.00 bills in meter"),
    lp(0x3F, PollType::Read, "Send $5,000.00 bills in meter"),
    lp(0x40, PollType::Read, "Send $10,000.00 bills in meter"),
    lp(0x41, PollType::Read, "Send $20,000.00 bills in meter"),
    lp(0x42, PollType::Read, "Send $25,000.00 bills in meter"),
    lp(0x43, PollType::Read, "Send $50,000.00 bills in meter"),
    lp(0x44, PollType::Read, "Send $100,000.00 bills in meter"),
    lp(0x45, PollType::Read, "Send $250.00 bills in meter"),
    lp(0x46, PollType::Read, "Send credit amount of all bills accepted"),
    lp(0x47, PollType::Read, "Send coin amount accepted from an external coin acceptor"),
    lp(0x48, PollType::Read, "Send last accepted bill information"),
    lp(0x49, PollType::Read, "Send number of bills currently in the stacker"),
    lp(0x4A, PollType::Read, "Send total credit amount of all bills currently in the stacker"),
    lp(0x4C, PollType::Set, "Set secure enhanced validation ID"),
    lp(0x4D, PollType::Set, "Send enhanced validation information"),
    lp(0x4F, PollType::Read, "Send current hopper status"),
    lp(0x50, PollType::Set, "Send validation meters"),
    lp(0x51, PollType::Read, "Send total number of games implemented"),
    lp(0x52, PollType::MultiGame, "Send game n meters"),
    lp(0x53, PollType::MultiGame, "Send game n configuration"),
    lp(0x54, PollType::Read, "Send SAS version ID and gaming machine serial number"),
    lp(0x55, PollType::Read, "Send selected game number"),
    lp(0x56, PollType::Read, "Send enabled game numbers"),
    lp(0x57, PollType::Read, "Send pending cashout information"),
    lp(0x58, PollType::Set, "Receive validation number"),
    lp(0x59, PollType::Read, "Send enabled currency codes"),
    lp(0x5A, PollType::Set, "Send supported bills"),
    lp(0x5B, PollType::Set, "Send bill meters"),
    lp(0x5C, PollType::Set, "Foreign bill reporting mode"),
    lp(0x5D, PollType::Read, "Send Non-SAS progressive win data"),
    lp(0x5E, PollType::Read, "Send configured progressive controllers"),
    lp(0x5F, PollType::Set, "Send progressive broadcast values"),
    lp(0x6E, PollType::Set, "Send authentication info"),
    lp(0x6F, PollType::MultiGame, "Send extended meters for game n"),
    lp(0x70, PollType::Read, "Send ticket validation data"),
    lp(0x71, PollType::Set, "Redeem ticket"),
    lp(0x72, PollType::Set, "AFT transfer funds"),
    lp(0x73, PollType::Set, "AFT register gaming machine"),
    lp(0x74, PollType::Set, "AFT game lock and status request"),
    lp(0x75, PollType::SetGroup, "Set AFT receipt data"),
    lp(0x76, PollType::Set, "Set custom AFT ticket data"),
    lp(0x77, PollType::Read, "Send progressive accounting data"),
    lp(0x7A, PollType::SetGroup, "Extended progressive broadcast"),
    lp(0x7B, PollType::SetGroup, "Extended validation status"),
    lp(0x7C, PollType::SetGroup, "Set extended ticket data"),
    lp(0x7D, PollType::SetGroup, "Set ticket data"),
    lp(0x7E, PollType::Read, "Send current date and time"),
    lp(0x7F, PollType::SetGroup, "Receive date and time"),
    lp(0x80, PollType::SetGroup, "Receive progressive amount"),
    lp(0x83, PollType::MultiGame, "Send cumulative progressive wins"),
    lp(0x84, PollType::Read, "Send progressive win amount"),
    lp(0x85, PollType::Read, "Send SAS progressive win amount"),
    lp(0x86, PollType::SetGroup, "Receive multiple progressive levels"),
    lp(0x87, PollType::Read, "Send multiple SAS progressive win amounts"),
    lp(0x8A, PollType::Set, "Initiate a legacy bonus pay"),
    lp(0x8B, PollType::Set, "Initiate multiplied jackpot mode (obsolete)"),
    lp(0x8C, PollType::MultiGame, "Enter/exit tournament mode"),
    lp(0x8E, PollType::Read, "Send card information"),
    lp(0x8F, PollType::Read, "Send physical reel stop information"),
    lp(0x90, PollType::Read, "Send legacy bonus win amount"),
    lp(0x94, PollType::Set, "Remote handpay reset"),
    lp(0x95, PollType::MultiGame, "Send tournament games played"),
    lp(0x96, PollType::MultiGame, "Send tournament games won"),
    lp(0x97, PollType::MultiGame, "Send tournament credits wagered"),
    lp(0x98, PollType::MultiGame, "Send tournament credits won"),
    lp(0x99, PollType::MultiGame, "Send meters 95 through 98"),
    lp(0x9A, PollType::MultiGame, "Send legacy bonus meters"),
    lp(0xA0, PollType::MultiGame, "Send enabled features"),
    lp(0xA4, PollType::MultiGame, "Send cash out limit"),
    lp(0xA8, PollType::Set, "Enable jackpot handpay reset method"),
    lp(0xAA, PollType::Set, "Enable/disable game auto rebet"),
    lp(0xAF, PollType::MultiGame, "Send extended meters for game n (alternate)"),
    lp(0xB0, PollType::Set, "Multi-denom preamble"),
    lp(0xB1, PollType::Read, "Send current player denomination"),
    lp(0xB2, PollType::Read, "Send enabled player denominations"),
    lp(0xB3, PollType::Read, "Send token denomination"),
    lp(0xB4, PollType::MultiGame, "Send wager category information"),
    lp(0xB5, PollType::MultiGame, "Send extended game n information"),
    lp(0xB6, PollType::Set, "Meter collect status"),
    lp(0xB7, PollType::Set, "Set machine numbers"),
    lp(0xEB, PollType::Unclassified, "Reserved"),
    lp(0xFF, PollType::Set, "Event response to long poll"),
];

/// Poll type reported for an unknown key.
pub const UNKNOWN_POLL_TYPE: &str = "N/A";

/// Look up the descriptor for `opcode`.
pub fn descriptor(opcode: u8) -> Option<&'static LongPollDescriptor> {
    LONG_POLLS
        .binary_search_by_key(&opcode, |d| d.opcode)
        .ok()
        .map(|i| &LONG_POLLS[i])
}

/// All known long polls in opcode order.
pub fn all() -> &'static [LongPollDescriptor] {
    LONG_POLLS
}

fn parse_key(key: &str) -> Option<u8> {
    let key = key.trim();
    let digits = key
        .strip_prefix("0x")
        .or_else(|| key.strip_prefix("0X"))
        .unwrap_or(key);
    if digits.is_empty() || digits.len() > 2 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    u8::from_str_radix(digits, 16).ok()
}

/// String-keyed access to the long-poll table.
#[derive(Debug, Clone, Copy, Default)]
pub struct LongPollLookup;

impl LongPollLookup {
    /// Descriptor for a hex key such as `"1F"`.
    pub fn get(key: &str) -> Option<&'static LongPollDescriptor> {
        parse_key(key).and_then(descriptor)
    }

    /// Poll type letter code for `key`, or `"N/A"` when unknown.
    pub fn poll_type(key: &str) -> String {
        match Self::get(key) {
            Some(d) => d.poll_type.as_str().to_string(),
            None => UNKNOWN_POLL_TYPE.to_string(),
        }
    }

    /// Description for `key`, or `"Unknown key: <key>"` when unknown.
    pub fn event(key: &str) -> String {
        match Self::get(key) {
            Some(d) => d.description.to_string(),
            None => format!("Unknown key: {key}"),
        }
    }
}
