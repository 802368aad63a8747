// Simulated gaming machine for --mock runs. Scripts a MockTransport with
// the bytes a real machine at SIM_ADDRESS would put on the line for the
// selected command, so the whole client path (handshake, framing, CRC,
// decoding) runs without hardware.

use saslib::protocol::commands::{self, LongPoll};
use saslib::protocol::frame::{build_frame, general_poll_byte, preamble, u16_to_bcd, wire_bytes};
use saslib::protocol::realtime::RTE_MARKER;
use saslib_test_harness::MockTransport;

use crate::{Command, ControlAction, MeterKind};

/// Address the simulated machine announces during the handshake.
pub const SIM_ADDRESS: u8 = 0x01;

/// Exceptions the simulated machine reports, one per general poll.
const SIM_EXCEPTIONS: &[u8] = &[0x7E, 0x7E, 0x7F, 0x11, 0x12];

/// Real-time events the simulated machine reports: a game played for five
/// credits that wins 250, then the slot door opening.
const SIM_REALTIME_EVENTS: &[(u8, &[u8])] = &[
    (0x7E, &[0x00, 0x05, 0x00, 0x00, 0x12, 0x34, 0x01, 0x00]),
    (0x7F, &[0x00, 0x00, 0x02, 0x50]),
    (0x11, &[]),
];

/// Polls scripted for `events --count 0`, which runs until the script is
/// exhausted instead of until Ctrl-C.
pub const SIM_UNBOUNDED_POLLS: u32 = 50;

const SIM_METER: [u8; 4] = [0x00, 0x00, 0x12, 0x34];

const SIM_SELECTED_GAME: u16 = 1;

struct Script {
    mock: MockTransport,
    poll_address: u8,
}

impl Script {
    fn new(poll_address: u8) -> Self {
        let mut mock = MockTransport::new();
        mock.queue_read(&[SIM_ADDRESS]);
        Script { mock, poll_address }
    }

    /// The machine acknowledges by echoing its address.
    fn ack(&mut self, poll: LongPoll) {
        let frame = build_frame(SIM_ADDRESS, &poll.command, poll.crc_need);
        self.mock
            .expect_silent(&preamble(self.poll_address, SIM_ADDRESS));
        self.mock.expect(wire_bytes(&frame), &[SIM_ADDRESS]);
    }

    /// The machine answers with address, opcode, `payload` and a CRC.
    fn read(&mut self, poll: LongPoll, payload: &[u8]) {
        let frame = build_frame(SIM_ADDRESS, &poll.command, poll.crc_need);
        let mut body = vec![poll.opcode()];
        body.extend_from_slice(payload);
        let response = build_frame(SIM_ADDRESS, &body, true);
        self.mock
            .expect_silent(&preamble(self.poll_address, SIM_ADDRESS));
        self.mock.expect(wire_bytes(&frame), &response);
    }

    fn general_poll(&mut self, answer: &[u8]) {
        self.mock.expect_silent(&[self.poll_address]);
        self.mock.expect(&[general_poll_byte(SIM_ADDRESS)], answer);
    }

    /// The machine answers with address, `0xFF`, event code, data and a CRC.
    fn realtime_event(&mut self, code: u8, data: &[u8]) {
        let mut body = vec![RTE_MARKER, code];
        body.extend_from_slice(data);
        self.general_poll(&build_frame(SIM_ADDRESS, &body, true));
    }

    fn selected_game(&mut self) -> anyhow::Result<()> {
        self.read(
            commands::cmd_selected_game_number(),
            &u16_to_bcd(SIM_SELECTED_GAME)?,
        );
        Ok(())
    }
}

fn repeat_meter(count: usize) -> Vec<u8> {
    SIM_METER.repeat(count)
}

fn machine_id_payload() -> Vec<u8> {
    let mut payload = Vec::with_capacity(20);
    payload.extend_from_slice(b"AT");
    payload.extend_from_slice(b"001");
    payload.push(0x01); // denomination code
    payload.push(0x05); // max bet
    payload.push(0x00); // progressive group
    payload.extend_from_slice(&[0x00, 0x03]);
    payload.extend_from_slice(b"PT0001");
    payload.extend_from_slice(b"9500");
    payload
}

/// Number of general polls the simulated machine answers for `count`.
pub fn scripted_polls(count: u32) -> u32 {
    if count == 0 {
        SIM_UNBOUNDED_POLLS
    } else {
        count
    }
}

/// Build a mock transport scripted for `command`, woken with `poll_address`.
pub fn machine_for(command: &Command, poll_address: u8) -> anyhow::Result<MockTransport> {
    let mut script = Script::new(poll_address);

    match command {
        Command::Address | Command::Lookup { .. } | Command::Table => {}
        Command::Meters { .. } => {
            script.read(commands::cmd_send_meters_10_15(), &repeat_meter(6));
        }
        Command::Meter { kind, .. } => {
            script.read(commands::cmd_single_meter(kind.opcode()), &SIM_METER);
        }
        Command::GameMeters { game, .. } => {
            let mut payload = u16_to_bcd(*game)?.to_vec();
            payload.extend(repeat_meter(4));
            script.read(commands::cmd_game_n_meters(*game)?, &payload);
        }
        Command::MachineId => {
            script.read(commands::cmd_gaming_machine_id(), &machine_id_payload());
        }
        Command::Games => {
            script.read(commands::cmd_total_games_implemented(), &[0x00, 0x03]);
            script.selected_game()?;
        }
        Command::Control { action } => script.ack(action.poll()),
        Command::Game { game, disable } => {
            let game = match game {
                Some(game) => *game,
                None => {
                    script.selected_game()?;
                    SIM_SELECTED_GAME
                }
            };
            script.ack(commands::cmd_enable_disable_game(game, !disable)?);
        }
        Command::Bills {
            denominations,
            keep_enabled,
        } => {
            script.ack(commands::cmd_configure_bill_denominations(
                crate::denomination_bitmap(*denominations),
                crate::bill_action(*keep_enabled),
            ));
        }
        Command::Events {
            count, realtime, ..
        } => {
            let polls = scripted_polls(*count) as usize;
            if *realtime {
                for (code, data) in SIM_REALTIME_EVENTS.iter().cycle().take(polls) {
                    script.realtime_event(*code, data);
                }
            } else {
                for code in SIM_EXCEPTIONS.iter().cycle().take(polls) {
                    script.general_poll(&[*code]);
                }
            }
        }
    }

    Ok(script.mock)
}

impl ControlAction {
    pub fn poll(self) -> LongPoll {
        match self {
            ControlAction::Shutdown => commands::cmd_shutdown(),
            ControlAction::Startup => commands::cmd_startup(),
            ControlAction::SoundOff => commands::cmd_sound_off(),
            ControlAction::SoundOn => commands::cmd_sound_on(),
            ControlAction::ReelSoundsOff => commands::cmd_reel_sounds_off(),
            ControlAction::BillsOn => commands::cmd_enable_bill_acceptor(),
            ControlAction::BillsOff => commands::cmd_disable_bill_acceptor(),
            ControlAction::MaintenanceOn => commands::cmd_enter_maintenance_mode(),
            ControlAction::MaintenanceOff => commands::cmd_exit_maintenance_mode(),
            ControlAction::EventsOn => commands::cmd_realtime_event_reporting(true),
            ControlAction::EventsOff => commands::cmd_realtime_event_reporting(false),
        }
    }
}

impl MeterKind {
    pub fn opcode(self) -> u8 {
        match self {
            MeterKind::Cancelled => commands::LP_TOTAL_CANCELLED_CREDITS,
            MeterKind::CoinIn => commands::LP_TOTAL_COIN_IN,
            MeterKind::CoinOut => commands::LP_TOTAL_COIN_OUT,
            MeterKind::Drop => commands::LP_TOTAL_DROP,
            MeterKind::Jackpot => commands::LP_TOTAL_JACKPOT,
            MeterKind::GamesPlayed => commands::LP_GAMES_PLAYED,
            MeterKind::Credits => commands::LP_CURRENT_CREDITS,
        }
    }
}
