// saslib test application -- CLI tool for exercising the SAS host library
// against a gaming machine on a serial port, or against a simulated machine
// on a mock transport.
//
// Usage:
//   saslib-test-app --port /dev/ttyUSB0 address
//   saslib-test-app --port /dev/ttyUSB0 meters
//   saslib-test-app --port /dev/ttyUSB0 meter coin-in --raw
//   saslib-test-app --port /dev/ttyUSB0 control shutdown
//   saslib-test-app --port /dev/ttyUSB0 game --disable
//   saslib-test-app --port /dev/ttyUSB0 events --count 20 --interval-ms 200
//   saslib-test-app --port /dev/ttyUSB0 events --realtime
//   saslib-test-app --mock machine-id
//   saslib-test-app lookup 0x1F
//   saslib-test-app table

mod sim;

use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use saslib::protocol::commands::BillAcceptorAction;
use saslib::protocol::frame::DEFAULT_POLL_ADDRESS;
use saslib::protocol::long_poll;
use saslib::{Error, LongPollLookup, PollEvent, SasBuilder, SasClient};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// saslib test application -- polls a gaming machine from the command line.
#[derive(Parser)]
#[command(name = "saslib-test-app", version, about)]
struct Cli {
    /// Serial port path (e.g. /dev/ttyUSB0, COM3).
    /// Required unless --mock is used.
    #[arg(long)]
    port: Option<String>,

    /// Read timeout for long polls and the handshake, in milliseconds.
    #[arg(long, default_value_t = 2000)]
    timeout_ms: u64,

    /// Wake-up pre-amble address (hex, e.g. 0x82).
    #[arg(long, value_parser = parse_hex_u8)]
    poll_address: Option<u8>,

    /// Value of one credit, used to scale money meters.
    #[arg(long, default_value_t = 0.01)]
    denomination: f64,

    /// Give up on the address handshake after this many seconds.
    #[arg(long, default_value_t = 30)]
    handshake_secs: u64,

    /// Talk to a simulated gaming machine on a mock transport.
    #[arg(long)]
    mock: bool,

    #[command(subcommand)]
    command: Command,
}

/// Parse a hex string like "0x82" or "82" into a u8.
fn parse_hex_u8(s: &str) -> std::result::Result<u8, String> {
    let s = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u8::from_str_radix(s, 16).map_err(|e| format!("invalid hex byte: {e}"))
}

#[derive(Subcommand)]
enum Command {
    /// Run the address handshake and print the machine address.
    Address,

    /// Read meters 10-15 in one exchange.
    Meters {
        /// Report raw credit counts instead of money amounts.
        #[arg(long)]
        raw: bool,
    },

    /// Read a single meter.
    Meter {
        kind: MeterKind,
        /// Report the raw credit count instead of a money amount.
        #[arg(long)]
        raw: bool,
    },

    /// Read the meters of one game.
    GameMeters {
        game: u16,
        #[arg(long)]
        raw: bool,
    },

    /// Read the gaming machine ID and information.
    MachineId,

    /// Print the number of games implemented and the selected game.
    Games,

    /// Send a control command.
    Control { action: ControlAction },

    /// Enable or disable a game.
    Game {
        /// Game number; defaults to the currently selected game.
        #[arg(long)]
        game: Option<u16>,
        #[arg(long)]
        disable: bool,
    },

    /// Configure the bill denominations the acceptor takes.
    Bills {
        /// 24-bit enable bitmap (hex), lowest denomination in bit 0.
        #[arg(value_parser = parse_hex_u32)]
        denominations: u32,
        /// Keep the acceptor enabled after each accepted bill.
        #[arg(long)]
        keep_enabled: bool,
    },

    /// General-poll the machine and print exceptions as they arrive.
    Events {
        /// Number of polls (0 = until Ctrl-C).
        #[arg(long, default_value_t = 10)]
        count: u32,
        #[arg(long, default_value_t = 200)]
        interval_ms: u64,
        /// Read real-time event frames (enable them with `control events-on`).
        #[arg(long)]
        realtime: bool,
    },

    /// Look up a long poll by its hex opcode.
    Lookup { key: String },

    /// List every documented long poll.
    Table,
}

#[derive(Clone, Copy, ValueEnum)]
enum MeterKind {
    Cancelled,
    CoinIn,
    CoinOut,
    Drop,
    Jackpot,
    GamesPlayed,
    Credits,
}

#[derive(Clone, Copy, ValueEnum)]
enum ControlAction {
    Shutdown,
    Startup,
    SoundOff,
    SoundOn,
    ReelSoundsOff,
    BillsOn,
    BillsOff,
    MaintenanceOn,
    MaintenanceOff,
    EventsOn,
    EventsOff,
}

fn parse_hex_u32(s: &str) -> std::result::Result<u32, String> {
    let s = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    let value = u32::from_str_radix(s, 16).map_err(|e| format!("invalid hex bitmap: {e}"))?;
    if value > 0x00FF_FFFF {
        return Err("bitmap must fit in 24 bits".into());
    }
    Ok(value)
}

/// Split a 24-bit bitmap into the three wire bytes, low byte first.
fn denomination_bitmap(bits: u32) -> [u8; 3] {
    let [b0, b1, b2, _] = bits.to_le_bytes();
    [b0, b1, b2]
}

fn bill_action(keep_enabled: bool) -> BillAcceptorAction {
    if keep_enabled {
        BillAcceptorAction::KeepEnabled
    } else {
        BillAcceptorAction::DisableAfterEachBill
    }
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

async fn connect(cli: &Cli) -> Result<SasClient> {
    let mut builder = SasBuilder::new()
        .timeout(Duration::from_millis(cli.timeout_ms))
        .denomination(cli.denomination);
    if let Some(addr) = cli.poll_address {
        builder = builder.poll_address(addr);
    }

    let client = if cli.mock {
        let poll_address = cli.poll_address.unwrap_or(DEFAULT_POLL_ADDRESS);
        let mock = sim::machine_for(&cli.command, poll_address)?;
        let client = builder
            .build_with_transport(Box::new(mock))
            .await
            .context("failed to build SasClient with mock transport")?;
        println!(
            "Simulated gaming machine at address {:02x}",
            sim::SIM_ADDRESS
        );
        client
    } else {
        let port = cli
            .port
            .as_deref()
            .context("--port is required when not using --mock")?;
        builder
            .serial_port(port)
            .build()
            .await
            .with_context(|| format!("failed to open serial port {port}"))?
    };

    let cancel = CancellationToken::new();
    let deadline = cancel.clone();
    let handshake = Duration::from_secs(cli.handshake_secs);
    tokio::spawn(async move {
        tokio::time::sleep(handshake).await;
        deadline.cancel();
    });

    match client.start_with_cancel(&cancel).await {
        Ok(address) => {
            info!(%address, "handshake complete");
            Ok(client)
        }
        Err(Error::Cancelled) => bail!(
            "no gaming machine announced itself within {} s",
            cli.handshake_secs
        ),
        Err(e) => Err(e).context("address handshake failed"),
    }
}

// ---------------------------------------------------------------------------
// Command implementations
// ---------------------------------------------------------------------------

async fn cmd_address(client: &SasClient) -> Result<()> {
    let address = client.address().await.context("no address after handshake")?;
    println!("Gaming machine");
    println!("  Address:        {}", address);
    println!(
        "  Hex:            {}",
        client.machine_hex().await.unwrap_or_default()
    );
    println!("  State:          {}", client.state().await);
    Ok(())
}

async fn cmd_meters(client: &SasClient, raw: bool) -> Result<()> {
    let meters = client
        .send_meters_10_15(!raw)
        .await?
        .context("meters 10-15: no response")?;
    println!("Meters 10-15");
    for (name, value) in meters.to_map() {
        println!("  {:<32}{}", name, value);
    }
    Ok(())
}

async fn cmd_meter(client: &SasClient, kind: MeterKind, raw: bool) -> Result<()> {
    let denom = !raw;
    let value = match kind {
        MeterKind::Cancelled => client.total_cancelled_credits(denom).await?,
        MeterKind::CoinIn => client.total_coin_in(denom).await?,
        MeterKind::CoinOut => client.total_coin_out(denom).await?,
        MeterKind::Drop => client.total_drop(denom).await?,
        MeterKind::Jackpot => client.total_jackpot(denom).await?,
        MeterKind::Credits => client.current_credits(denom).await?,
        MeterKind::GamesPlayed => {
            let games = client.games_played().await?.context("no response")?;
            println!("{games}");
            return Ok(());
        }
    };
    let value = value.context("no response")?;
    println!("{value}");
    Ok(())
}

async fn cmd_game_meters(client: &SasClient, game: u16, raw: bool) -> Result<()> {
    let meters = client
        .game_meters(game, !raw)
        .await?
        .with_context(|| format!("game {game} meters: no response"))?;
    println!("Game {}", meters.game_number);
    println!("  Coin in:        {}", meters.coin_in);
    println!("  Coin out:       {}", meters.coin_out);
    println!("  Jackpot:        {}", meters.jackpot);
    println!("  Games played:   {}", meters.games_played);
    Ok(())
}

async fn cmd_machine_id(client: &SasClient) -> Result<()> {
    let info = client
        .gaming_machine_id()
        .await?
        .context("machine ID: no response")?;
    println!("Gaming machine information");
    println!("  Game ID:        {}", info.game_id);
    println!("  Additional ID:  {}", info.additional_id);
    println!("  Denomination:   {:#04x}", info.denomination_code);
    println!("  Max bet:        {}", info.max_bet);
    println!("  Progressive:    {}", info.progressive_group);
    println!("  Game options:   {:#06x}", info.game_options);
    println!("  Paytable:       {}", info.paytable_id);
    println!("  Base percent:   {}", info.base_percentage);
    Ok(())
}

async fn cmd_games(client: &SasClient) -> Result<()> {
    let total = client.total_games_implemented().await?;
    let selected = client.selected_game_number().await?;
    let show = |v: Option<u16>| v.map_or_else(|| "no response".to_string(), |g| g.to_string());
    println!("Games implemented:  {}", show(total));
    println!("Selected game:      {}", show(selected));
    Ok(())
}

fn report_ack(what: &str, acked: bool) -> Result<()> {
    if acked {
        println!("{what}: acknowledged");
        Ok(())
    } else {
        bail!("{what}: not acknowledged")
    }
}

async fn cmd_control(client: &SasClient, action: ControlAction) -> Result<()> {
    let acked = match action {
        ControlAction::Shutdown => client.shutdown().await?,
        ControlAction::Startup => client.startup().await?,
        ControlAction::SoundOff => client.sound_off().await?,
        ControlAction::SoundOn => client.sound_on().await?,
        ControlAction::ReelSoundsOff => client.disable_reel_sounds().await?,
        ControlAction::BillsOn => client.enable_bill_acceptor().await?,
        ControlAction::BillsOff => client.disable_bill_acceptor().await?,
        ControlAction::MaintenanceOn => client.enter_maintenance_mode().await?,
        ControlAction::MaintenanceOff => client.exit_maintenance_mode().await?,
        ControlAction::EventsOn => client.toggle_realtime_event_reporting(true).await?,
        ControlAction::EventsOff => client.toggle_realtime_event_reporting(false).await?,
    };
    let name = action
        .to_possible_value()
        .map(|v| v.get_name().to_string())
        .unwrap_or_default();
    report_ack(&name, acked)
}

async fn cmd_events(
    client: &SasClient,
    count: u32,
    interval: Duration,
    realtime: bool,
) -> Result<()> {
    println!("General polling (Ctrl-C to stop)...");
    let mut polled = 0u32;
    loop {
        if count > 0 && polled >= count {
            break;
        }
        polled += 1;

        let result = if realtime {
            client
                .realtime_events_poll()
                .await
                .map(|event| println!("[event] {:#04x} {event}", event.code()))
        } else {
            client.events_poll().await.map(|event| {
                if let PollEvent::Event { code, description } = event {
                    println!("[event] {code:#04x} {description}");
                }
            })
        };

        match result {
            Ok(()) => {}
            Err(Error::NoConnection) => warn!("no answer to general poll"),
            Err(Error::BadGeneralPollResponse(code)) => {
                warn!(code, "unknown exception code");
            }
            Err(Error::BadCrc(data)) => warn!(?data, "corrupt event frame"),
            Err(e) => return Err(e).context("general poll failed"),
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
    client.close().await?;
    Ok(())
}

fn cmd_lookup(key: &str) -> Result<()> {
    if LongPollLookup::get(key).is_none() {
        bail!("no long poll for key {key:?}");
    }
    println!("Type:   {}", LongPollLookup::poll_type(key));
    println!("Event:  {}", LongPollLookup::event(key));
    Ok(())
}

fn cmd_table() -> Result<()> {
    println!("{:<6}{:<6}{}", "Code", "Type", "Description");
    for poll in long_poll::all() {
        println!(
            "{:<6}{:<6}{}",
            format!("{:02X}", poll.opcode),
            poll.poll_type.as_str(),
            poll.description
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    // Table lookups do not need a gaming machine.
    match &cli.command {
        Command::Lookup { key } => return cmd_lookup(key),
        Command::Table => return cmd_table(),
        _ => {}
    }

    if cli.mock && cli.port.is_some() {
        bail!("--mock and --port are mutually exclusive");
    }

    let client = connect(&cli).await?;

    match &cli.command {
        Command::Address => cmd_address(&client).await,
        Command::Meters { raw } => cmd_meters(&client, *raw).await,
        Command::Meter { kind, raw } => cmd_meter(&client, *kind, *raw).await,
        Command::GameMeters { game, raw } => cmd_game_meters(&client, *game, *raw).await,
        Command::MachineId => cmd_machine_id(&client).await,
        Command::Games => cmd_games(&client).await,
        Command::Control { action } => cmd_control(&client, *action).await,
        Command::Game { game, disable } => {
            let acked = client.enable_disable_game(*game, !disable).await?;
            let verb = if *disable { "disable game" } else { "enable game" };
            report_ack(verb, acked)
        }
        Command::Bills {
            denominations,
            keep_enabled,
        } => {
            let acked = client
                .configure_bill_denominations(
                    denomination_bitmap(*denominations),
                    bill_action(*keep_enabled),
                )
                .await?;
            report_ack("configure bill denominations", acked)
        }
        Command::Events {
            count,
            interval_ms,
            realtime,
        } => {
            // The simulated machine only answers the polls it was scripted for.
            let count = if cli.mock {
                sim::scripted_polls(*count)
            } else {
                *count
            };
            cmd_events(&client, count, Duration::from_millis(*interval_ms), *realtime).await
        }
        Command::Lookup { .. } | Command::Table => unreachable!("handled above"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use saslib::RealtimeEvent;

    #[test]
    fn bitmap_is_low_byte_first() {
        assert_eq!(denomination_bitmap(0x00_FF_01), [0x01, 0xFF, 0x00]);
        assert_eq!(denomination_bitmap(0xFF_FF_FF), [0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn hex_bitmap_limited_to_24_bits() {
        assert_eq!(parse_hex_u32("0xFFFFFF"), Ok(0xFF_FFFF));
        assert!(parse_hex_u32("1000000").is_err());
        assert!(parse_hex_u32("zz").is_err());
    }

    #[test]
    fn hex_byte_accepts_prefix() {
        assert_eq!(parse_hex_u8("0x82"), Ok(0x82));
        assert_eq!(parse_hex_u8("82"), Ok(0x82));
    }

    async fn mock_client(command: &Command) -> SasClient {
        mock_client_at(command, DEFAULT_POLL_ADDRESS).await
    }

    async fn mock_client_at(command: &Command, poll_address: u8) -> SasClient {
        let mock = sim::machine_for(command, poll_address).unwrap();
        let client = SasBuilder::new()
            .poll_address(poll_address)
            .build_with_transport(Box::new(mock))
            .await
            .unwrap();
        client.start().await.unwrap();
        client
    }

    #[tokio::test]
    async fn simulated_machine_answers_meters() {
        let client = mock_client(&Command::Meters { raw: true }).await;
        let meters = client.send_meters_10_15(false).await.unwrap().unwrap();
        assert_eq!(meters.games_played, 1234);
        assert_eq!(meters.total_in.as_f64(), 1234.0);
    }

    #[tokio::test]
    async fn simulated_machine_acks_game_toggle() {
        let command = Command::Game {
            game: None,
            disable: true,
        };
        let client = mock_client(&command).await;
        assert!(client.enable_disable_game(None, false).await.unwrap());
    }

    #[tokio::test]
    async fn simulated_machine_reports_events() {
        let client = mock_client(&Command::Events {
            count: 3,
            interval_ms: 0,
            realtime: false,
        })
        .await;
        assert_eq!(client.events_poll().await.unwrap().code(), Some(0x7E));
        assert_eq!(client.events_poll().await.unwrap(), PollEvent::NoActivity);
        assert_eq!(client.events_poll().await.unwrap().code(), Some(0x7F));
    }

    #[tokio::test]
    async fn simulated_machine_answers_unbounded_event_run() {
        let command = Command::Events {
            count: 0,
            interval_ms: 0,
            realtime: false,
        };
        let client = mock_client(&command).await;
        let polls = sim::scripted_polls(0);
        assert!(polls > 0);
        for _ in 0..polls {
            client.events_poll().await.unwrap();
        }
        // The script is exhausted after exactly that many polls.
        assert!(client.events_poll().await.is_err());
    }

    #[tokio::test]
    async fn simulated_machine_reports_realtime_events() {
        let client = mock_client(&Command::Events {
            count: 4,
            interval_ms: 0,
            realtime: true,
        })
        .await;
        assert_eq!(
            client.realtime_events_poll().await.unwrap(),
            RealtimeEvent::GameStarted {
                credits_wagered: 5,
                total_coin_in: 1234,
                wager_type: 1,
                progressive_group: 0,
            }
        );
        assert_eq!(
            client.realtime_events_poll().await.unwrap(),
            RealtimeEvent::GameEnded { game_win: 250 }
        );
        assert_eq!(client.realtime_events_poll().await.unwrap().code(), 0x11);
        assert_eq!(client.realtime_events_poll().await.unwrap().code(), 0x7E);
    }

    #[tokio::test]
    async fn simulated_machine_follows_poll_address() {
        let client = mock_client_at(&Command::Meters { raw: true }, 0x81).await;
        let meters = client.send_meters_10_15(false).await.unwrap().unwrap();
        assert_eq!(meters.games_played, 1234);
    }

    #[tokio::test]
    async fn simulated_machine_identifies() {
        let client = mock_client(&Command::MachineId).await;
        let info = client.gaming_machine_id().await.unwrap().unwrap();
        assert_eq!(info.game_id, "AT");
        assert_eq!(info.paytable_id, "PT0001");
        assert_eq!(info.base_percentage, "9500");
    }
}
