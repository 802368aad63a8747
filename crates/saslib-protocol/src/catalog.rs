//! Typed SAS operations on [`SasClient`].
//!
//! Control commands return `Ok(true)` only when the gaming machine echoes
//! its address; silence or a wrong echo is `Ok(false)`. Read commands
//! return `Ok(None)` when the exchange did not complete and decode the
//! payload otherwise.
//!
//! Read commands that take a `denom` flag report credit meters as currency
//! when it is set, using the client's configured denomination.

use tracing::{debug, warn};

use saslib_core::Result;

use crate::client::SasClient;
use crate::commands::{self, BillAcceptorAction, LongPoll};
use crate::meters::{
    decode_game_number, decode_single_meter, GameMeters, MachineInfo, MeterSnapshot, MeterValue,
};

impl SasClient {
    fn scale(&self, denom: bool) -> Option<f64> {
        denom.then_some(self.settings.denomination)
    }

    async fn read_meter(&self, poll: LongPoll, denom: bool) -> Result<Option<MeterValue>> {
        match self.send_read(poll).await? {
            Some(payload) => Ok(Some(MeterValue::from_raw(
                decode_single_meter(&payload)?,
                self.scale(denom),
            ))),
            None => Ok(None),
        }
    }

    async fn read_game_number(&self, poll: LongPoll) -> Result<Option<u16>> {
        match self.send_read(poll).await? {
            Some(payload) => Ok(Some(decode_game_number(&payload)?)),
            None => Ok(None),
        }
    }

    // ---------------------------------------------------------------
    // Control
    // ---------------------------------------------------------------

    /// Lock out the player (long poll 0x01).
    pub async fn shutdown(&self) -> Result<bool> {
        self.send_ack(commands::cmd_shutdown()).await
    }

    /// Re-enable play (long poll 0x02).
    pub async fn startup(&self) -> Result<bool> {
        self.send_ack(commands::cmd_startup()).await
    }

    pub async fn sound_off(&self) -> Result<bool> {
        self.send_ack(commands::cmd_sound_off()).await
    }

    pub async fn sound_on(&self) -> Result<bool> {
        self.send_ack(commands::cmd_sound_on()).await
    }

    /// Disable reel-spin and game-play sounds (long poll 0x05).
    pub async fn disable_reel_sounds(&self) -> Result<bool> {
        self.send_ack(commands::cmd_reel_sounds_off()).await
    }

    pub async fn enable_bill_acceptor(&self) -> Result<bool> {
        self.send_ack(commands::cmd_enable_bill_acceptor()).await
    }

    pub async fn disable_bill_acceptor(&self) -> Result<bool> {
        self.send_ack(commands::cmd_disable_bill_acceptor()).await
    }

    /// Configure which bill denominations are accepted (long poll 0x08).
    pub async fn configure_bill_denominations(
        &self,
        denominations: [u8; 3],
        action: BillAcceptorAction,
    ) -> Result<bool> {
        self.send_ack(commands::cmd_configure_bill_denominations(
            denominations,
            action,
        ))
        .await
    }

    /// Enable or disable a game (long poll 0x09).
    ///
    /// With `game` of `None` the currently selected game is queried first;
    /// if that query does not complete, nothing is sent and the result is
    /// `Ok(false)`.
    pub async fn enable_disable_game(&self, game: Option<u16>, enable: bool) -> Result<bool> {
        let game = match game {
            Some(game) => game,
            None => match self.selected_game_number().await? {
                Some(game) => game,
                None => {
                    warn!("selected game unknown, enable/disable game not sent");
                    return Ok(false);
                }
            },
        };
        debug!(game, enable, "enable/disable game");
        self.send_ack(commands::cmd_enable_disable_game(game, enable)?)
            .await
    }

    pub async fn enter_maintenance_mode(&self) -> Result<bool> {
        self.send_ack(commands::cmd_enter_maintenance_mode()).await
    }

    pub async fn exit_maintenance_mode(&self) -> Result<bool> {
        self.send_ack(commands::cmd_exit_maintenance_mode()).await
    }

    /// Turn real-time event reporting on or off (long poll 0x0E).
    pub async fn toggle_realtime_event_reporting(&self, enable: bool) -> Result<bool> {
        self.send_ack(commands::cmd_realtime_event_reporting(enable))
            .await
    }

    // ---------------------------------------------------------------
    // Meters
    // ---------------------------------------------------------------

    /// Read meters 10 through 15 in one exchange (long poll 0x0F).
    pub async fn send_meters_10_15(&self, denom: bool) -> Result<Option<MeterSnapshot>> {
        match self.send_read(commands::cmd_send_meters_10_15()).await? {
            Some(payload) => Ok(Some(MeterSnapshot::decode(&payload, self.scale(denom))?)),
            None => Ok(None),
        }
    }

    pub async fn total_cancelled_credits(&self, denom: bool) -> Result<Option<MeterValue>> {
        self.read_meter(
            commands::cmd_single_meter(commands::LP_TOTAL_CANCELLED_CREDITS),
            denom,
        )
        .await
    }

    pub async fn total_coin_in(&self, denom: bool) -> Result<Option<MeterValue>> {
        self.read_meter(commands::cmd_single_meter(commands::LP_TOTAL_COIN_IN), denom)
            .await
    }

    pub async fn total_coin_out(&self, denom: bool) -> Result<Option<MeterValue>> {
        self.read_meter(commands::cmd_single_meter(commands::LP_TOTAL_COIN_OUT), denom)
            .await
    }

    pub async fn total_drop(&self, denom: bool) -> Result<Option<MeterValue>> {
        self.read_meter(commands::cmd_single_meter(commands::LP_TOTAL_DROP), denom)
            .await
    }

    pub async fn total_jackpot(&self, denom: bool) -> Result<Option<MeterValue>> {
        self.read_meter(commands::cmd_single_meter(commands::LP_TOTAL_JACKPOT), denom)
            .await
    }

    /// Games played since the last RAM clear. Never scaled.
    pub async fn games_played(&self) -> Result<Option<u64>> {
        match self
            .send_read(commands::cmd_single_meter(commands::LP_GAMES_PLAYED))
            .await?
        {
            Some(payload) => Ok(Some(decode_single_meter(&payload)?)),
            None => Ok(None),
        }
    }

    /// Credits currently on the credit meter (long poll 0x1A).
    pub async fn current_credits(&self, denom: bool) -> Result<Option<MeterValue>> {
        self.read_meter(
            commands::cmd_single_meter(commands::LP_CURRENT_CREDITS),
            denom,
        )
        .await
    }

    /// Meters for one game (long poll 0x52).
    pub async fn game_meters(&self, game: u16, denom: bool) -> Result<Option<GameMeters>> {
        match self.send_read(commands::cmd_game_n_meters(game)?).await? {
            Some(payload) => Ok(Some(GameMeters::decode(&payload, self.scale(denom))?)),
            None => Ok(None),
        }
    }

    // ---------------------------------------------------------------
    // Machine information
    // ---------------------------------------------------------------

    /// Gaming machine ID and information (long poll 0x1F).
    pub async fn gaming_machine_id(&self) -> Result<Option<MachineInfo>> {
        match self.send_read(commands::cmd_gaming_machine_id()).await? {
            Some(payload) => Ok(Some(MachineInfo::decode(&payload)?)),
            None => Ok(None),
        }
    }

    pub async fn total_games_implemented(&self) -> Result<Option<u16>> {
        self.read_game_number(commands::cmd_total_games_implemented())
            .await
    }

    pub async fn selected_game_number(&self) -> Result<Option<u16>> {
        self.read_game_number(commands::cmd_selected_game_number())
            .await
    }
}
