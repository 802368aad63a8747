//! SasClient -- one master-side connection to a gaming machine.
//!
//! The client owns the [`Transport`] and drives both poll sequences over it:
//!
//! - **Long poll**: the address pre-amble is sent under MARK parity, the
//!   line switches to SPACE, and the rest of the frame follows. The answer
//!   is read up to its declared size within the operation's timeout.
//! - **General poll**: under no parity and two stop bits, the poll address
//!   and `0x80 + address` are sent and a single exception byte is read.
//!
//! Before any poll can be sent the device address must be learned with
//! [`SasClient::start`], which listens for the machine to announce itself.
//!
//! The transport and all connection state sit behind one async mutex whose
//! guard is held for a whole round trip, so concurrent callers are
//! serialized and never interleave bytes on the line.

use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use saslib_core::error::{Error, Result};
use saslib_core::transport::Transport;
use saslib_core::types::{ConnectionState, DeviceAddress, LineSettings, Parity};

use crate::builder::MachineIdentity;
use crate::commands::LongPoll;
use crate::frame::{self, build_frame, general_poll_byte, parse_echo, preamble, wire_bytes};
use crate::gpoll::{describe, GeneralPollState, PollEvent};
use crate::realtime::{self, RealtimeEvent, RTE_HEADER_SIZE, RTE_MARKER};

/// Validated settings a client runs with. Produced by
/// [`SasBuilder`](crate::builder::SasBuilder).
#[derive(Debug, Clone)]
pub(crate) struct ClientSettings {
    pub poll_address: u8,
    pub timeout: Duration,
    pub poll_timeout: Duration,
    pub wake_up_delay: Duration,
    pub handshake_backoff: Duration,
    pub perpetual: bool,
    pub denomination: f64,
    pub identity: MachineIdentity,
}

/// Everything that changes over the life of a connection.
struct Link {
    transport: Box<dyn Transport>,
    address: Option<DeviceAddress>,
    machine_hex: Option<String>,
    state: ConnectionState,
    gpoll: GeneralPollState,
}

impl Link {
    fn require_address(&self) -> Result<DeviceAddress> {
        self.address.ok_or(Error::NotConnected)
    }
}

/// Resets a handshake left unfinished when `start` is dropped mid-loop:
/// the port is released and the connection returns to closed.
struct HandshakeGuard<'a> {
    link: MutexGuard<'a, Link>,
    finished: bool,
}

impl Drop for HandshakeGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.link.transport.release();
            self.link.state = ConnectionState::Closed;
        }
    }
}

/// A raw long-poll round trip: the frame as built (address first) and
/// whatever came back.
struct Exchange {
    frame: Vec<u8>,
    response: Vec<u8>,
}

/// A master-side SAS connection to one gaming machine.
///
/// Constructed via [`SasBuilder`](crate::builder::SasBuilder). The command
/// catalog (`shutdown`, `send_meters_10_15`, ...) is implemented on this
/// type in the [`catalog`](crate::catalog) module.
pub struct SasClient {
    link: Mutex<Link>,
    pub(crate) settings: ClientSettings,
}

impl SasClient {
    pub(crate) fn new(transport: Box<dyn Transport>, settings: ClientSettings) -> Self {
        SasClient {
            link: Mutex::new(Link {
                transport,
                address: None,
                machine_hex: None,
                state: ConnectionState::Closed,
                gpoll: GeneralPollState::new(),
            }),
            settings,
        }
    }

    // ---------------------------------------------------------------
    // Handshake
    // ---------------------------------------------------------------

    /// Discover the device address.
    ///
    /// Listens on the command-port profile until the gaming machine sends
    /// a byte, retrying after the handshake backoff while the line is
    /// silent. On success the transport is closed, the connection becomes
    /// [`ConnectionState::Open`] and the address is returned.
    ///
    /// This loops until an address arrives; wrap it in
    /// [`tokio::time::timeout`] or use [`start_with_cancel`](Self::start_with_cancel)
    /// to bound it.
    ///
    /// # Errors
    ///
    /// [`Error::Open`] if the port cannot be opened and the client is not
    /// configured as perpetual.
    pub async fn start(&self) -> Result<DeviceAddress> {
        self.start_with_cancel(&CancellationToken::new()).await
    }

    /// [`start`](Self::start), abandoning the handshake with
    /// [`Error::Cancelled`] once `cancel` fires.
    pub async fn start_with_cancel(&self, cancel: &CancellationToken) -> Result<DeviceAddress> {
        let mut guard = HandshakeGuard {
            link: self.link.lock().await,
            finished: false,
        };
        guard.link.state = ConnectionState::Handshaking;
        info!("connecting to gaming machine");

        loop {
            if cancel.is_cancelled() {
                return self.abandon_handshake(&mut guard).await;
            }

            match self.handshake_attempt(&mut guard.link).await {
                Ok(Some(byte)) => match DeviceAddress::new(byte) {
                    Ok(address) => {
                        let link = &mut guard.link;
                        if let Err(e) = link.transport.close().await {
                            warn!(error = %e, "failed to close transport after handshake");
                        }
                        link.address = Some(address);
                        link.machine_hex = Some(address.hex());
                        link.state = ConnectionState::Open;
                        link.gpoll.reset();
                        guard.finished = true;
                        info!(%address, "address recognized");
                        return Ok(address);
                    }
                    Err(_) => warn!(byte, "unrecognized address byte during handshake"),
                },
                Ok(None) => warn!("no SAS connection"),
                Err(Error::Open(reason)) => {
                    if !self.settings.perpetual {
                        error!(%reason, "SAS port could not be opened");
                        guard.link.state = ConnectionState::Closed;
                        guard.finished = true;
                        return Err(Error::Open(reason));
                    }
                    error!(%reason, "no SAS port, retrying");
                }
                Err(e) => warn!(error = %e, "handshake read failed"),
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    return self.abandon_handshake(&mut guard).await;
                }
                _ = tokio::time::sleep(self.settings.handshake_backoff) => {}
            }
        }
    }

    async fn abandon_handshake(&self, guard: &mut HandshakeGuard<'_>) -> Result<DeviceAddress> {
        debug!("handshake cancelled");
        if let Err(e) = guard.link.transport.close().await {
            warn!(error = %e, "failed to close transport after cancelled handshake");
        }
        guard.link.state = ConnectionState::Closed;
        guard.finished = true;
        Err(Error::Cancelled)
    }

    /// One listen for the address byte. `Ok(None)` means the line was silent.
    async fn handshake_attempt(&self, link: &mut Link) -> Result<Option<u8>> {
        let transport = &mut link.transport;
        transport.apply(&LineSettings::command_port(self.settings.timeout))?;
        transport.open().await?;
        transport.clear_buffers().await?;

        let mut buf = [0u8; 1];
        match transport.receive(&mut buf, self.settings.timeout).await {
            Ok(0) | Err(Error::Timeout) => Ok(None),
            Ok(_) => Ok(Some(buf[0])),
            Err(e) => Err(e),
        }
    }

    // ---------------------------------------------------------------
    // Long polls
    // ---------------------------------------------------------------

    /// Frame, send and read one long poll while holding the line.
    ///
    /// Transport failures are logged and reported as `Ok(None)`.
    async fn exchange(&self, poll: &LongPoll) -> Result<Option<Exchange>> {
        let mut link = self.link.lock().await;
        let address = link.require_address()?;
        let frame = build_frame(address.value(), &poll.command, poll.crc_need);
        let timeout = poll.timeout.unwrap_or(self.settings.timeout);

        match self.transmit(&mut link, &frame, poll.response_size, timeout).await {
            Ok(response) => {
                if response.is_empty() {
                    error!(
                        %address,
                        opcode = poll.opcode(),
                        "received empty response from gaming machine"
                    );
                }
                Ok(Some(Exchange { frame, response }))
            }
            Err(e) => {
                error!(%address, opcode = poll.opcode(), error = %e, "long poll failed");
                Ok(None)
            }
        }
    }

    async fn transmit(
        &self,
        link: &mut Link,
        frame: &[u8],
        response_size: usize,
        timeout: Duration,
    ) -> Result<Vec<u8>> {
        let address = frame[0];
        let transport = &mut link.transport;

        transport.open().await?;
        transport.flush().await?;
        transport.apply(&LineSettings::command_port(timeout))?;
        transport.clear_buffers().await?;
        link.state = ConnectionState::Open;

        let transport = &mut link.transport;
        debug!(
            poll_address = self.settings.poll_address,
            address, "sending wake-up pre-amble"
        );
        transport
            .send(&preamble(self.settings.poll_address, address))
            .await?;
        transport.flush().await?;

        transport.set_parity(Parity::Space)?;
        if !self.settings.wake_up_delay.is_zero() {
            tokio::time::sleep(self.settings.wake_up_delay).await;
        }

        let data = wire_bytes(frame);
        debug!(data = ?data, "sending long poll");
        transport.send(data).await?;

        let response = read_response(&mut **transport, response_size, timeout).await?;
        trace!(bytes = response.len(), data = ?response, "long poll response");
        Ok(response)
    }

    /// Send a control command and report whether the machine acknowledged.
    ///
    /// The acknowledgement is the machine echoing its own address. Anything
    /// else, including no answer at all, is `Ok(false)`.
    pub async fn send_ack(&self, poll: LongPoll) -> Result<bool> {
        let Some(exchange) = self.exchange(&poll).await? else {
            return Ok(false);
        };
        let address = u32::from(exchange.frame[0]);
        match parse_echo(&exchange.response) {
            Some(echo) => Ok(echo == address),
            None => {
                error!(command = ?wire_bytes(&exchange.frame), "no SAS response");
                Ok(false)
            }
        }
    }

    /// Send a read command and return the validated payload.
    ///
    /// The payload starts with the echoed opcode. `Ok(None)` means the
    /// exchange did not complete on the transport, or the machine only
    /// echoed its address because it is busy with another command.
    ///
    /// # Errors
    ///
    /// - [`Error::NoConnection`] if the machine sent nothing
    /// - [`Error::BadCommandIsRunning`] if the response answers another command
    /// - [`Error::BadCrc`] if the response is corrupt
    pub async fn send_read(&self, poll: LongPoll) -> Result<Option<Vec<u8>>> {
        let Some(exchange) = self.exchange(&poll).await? else {
            return Ok(None);
        };
        if exchange.response.len() == 1 {
            error!(
                address = exchange.frame[0],
                opcode = poll.opcode(),
                response = ?exchange.response,
                "gaming machine busy, no data returned"
            );
            return Ok(None);
        }
        let payload = frame::validate_response(&exchange.response, &exchange.frame)?;
        debug!(payload = ?payload, "SAS response");
        Ok(Some(payload.to_vec()))
    }

    // ---------------------------------------------------------------
    // General poll
    // ---------------------------------------------------------------

    /// General-poll the machine for its next exception.
    ///
    /// Returns [`PollEvent::NoActivity`] when the machine repeats the
    /// exception reported by the previous poll.
    ///
    /// # Errors
    ///
    /// - [`Error::NoConnection`] if no byte arrives within the poll timeout
    /// - [`Error::BadGeneralPollResponse`] for an unknown exception code
    pub async fn events_poll(&self) -> Result<PollEvent> {
        let mut link = self.link.lock().await;
        let address = link.require_address()?;
        self.begin_general_poll(&mut link, address).await?;

        let mut buf = [0u8; 1];
        let code = match link.transport.receive(&mut buf, self.settings.poll_timeout).await {
            Ok(n) if n > 0 => buf[0],
            Ok(_) | Err(Error::Timeout) => return Err(Error::NoConnection),
            Err(e) => return Err(e),
        };
        trace!(%address, code, "general poll response");
        link.gpoll.observe(code)
    }

    /// General-poll a machine that has real-time event reporting enabled.
    ///
    /// The answer is a framed event (address, `0xFF`, event code, event
    /// data, CRC). Game started, game ended and game selected events are
    /// decoded with their data. A machine that still answers with a bare
    /// exception byte yields [`RealtimeEvent::Exception`]. Every event is
    /// returned, repeats included.
    ///
    /// # Errors
    ///
    /// - [`Error::NoConnection`] if no byte arrives within the poll timeout
    /// - [`Error::Protocol`] if the answer is neither an event frame nor a
    ///   single exception byte, or is truncated
    /// - [`Error::BadCrc`] if the event frame is corrupt
    /// - [`Error::BadGeneralPollResponse`] for an unknown event code
    pub async fn realtime_events_poll(&self) -> Result<RealtimeEvent> {
        let mut link = self.link.lock().await;
        let address = link.require_address()?;
        self.begin_general_poll(&mut link, address).await?;

        let poll_timeout = self.settings.poll_timeout;
        let transport = &mut *link.transport;
        let mut response = read_response(transport, RTE_HEADER_SIZE, poll_timeout).await?;
        trace!(%address, data = ?response, "real-time poll response");

        match response.as_slice() {
            [] => return Err(Error::NoConnection),
            [code] => {
                let description = describe(*code).ok_or(Error::BadGeneralPollResponse(*code))?;
                return Ok(RealtimeEvent::Exception {
                    code: *code,
                    description,
                });
            }
            [addr, marker, _, ..] if *addr == address.value() && *marker == RTE_MARKER => {}
            _ => {
                return Err(Error::Protocol(format!(
                    "unexpected real-time poll response {response:02X?}"
                )));
            }
        }

        // Event data, then the CRC.
        let rest = realtime::data_len(response[2]) + 2;
        let tail = read_response(transport, rest, poll_timeout).await?;
        if tail.len() < rest {
            return Err(Error::Protocol(format!(
                "real-time event 0x{:02X} truncated after {} bytes",
                response[2],
                response.len() + tail.len()
            )));
        }
        response.extend_from_slice(&tail);

        let event = RealtimeEvent::decode_frame(&response, address.value())?;
        debug!(%address, code = event.code(), %event, "real-time event");
        Ok(event)
    }

    /// Switch to the event profile and send the poll address followed by
    /// `0x80 + address`.
    async fn begin_general_poll(&self, link: &mut Link, address: DeviceAddress) -> Result<()> {
        let transport = &mut link.transport;
        transport.open().await?;
        transport.flush().await?;
        transport.apply(&LineSettings::event_port(self.settings.poll_timeout))?;
        transport.clear_buffers().await?;
        link.state = ConnectionState::Open;

        let transport = &mut link.transport;
        transport.send(&[self.settings.poll_address]).await?;
        transport
            .send(&[general_poll_byte(address.value())])
            .await
    }

    // ---------------------------------------------------------------
    // Connection passthroughs
    // ---------------------------------------------------------------

    /// Drain pending output. Does nothing while the port is closed.
    pub async fn flush(&self) -> Result<()> {
        let mut link = self.link.lock().await;
        if !link.transport.is_connected() {
            return Ok(());
        }
        link.transport.flush().await
    }

    /// Discard both the input and output buffers. Does nothing while the
    /// port is closed.
    pub async fn flush_hard(&self) -> Result<()> {
        let mut link = self.link.lock().await;
        if !link.transport.is_connected() {
            return Ok(());
        }
        link.transport.clear_buffers().await
    }

    /// Open the transport if it is not already open.
    pub async fn open(&self) -> Result<()> {
        let mut link = self.link.lock().await;
        link.transport.open().await?;
        if link.address.is_some() {
            link.state = ConnectionState::Open;
        }
        Ok(())
    }

    /// Close the transport.
    ///
    /// The device address is kept; the next poll reopens the port.
    pub async fn close(&self) -> Result<()> {
        let mut link = self.link.lock().await;
        link.state = ConnectionState::Closed;
        link.transport.close().await
    }

    /// Whether the transport is open.
    pub async fn is_open(&self) -> bool {
        self.link.lock().await.transport.is_connected()
    }

    pub async fn state(&self) -> ConnectionState {
        self.link.lock().await.state
    }

    /// The address learned by the last handshake.
    pub async fn address(&self) -> Option<DeviceAddress> {
        self.link.lock().await.address
    }

    /// The address as a two-digit lowercase hex string, e.g. `"0c"`.
    pub async fn machine_hex(&self) -> Option<String> {
        self.link.lock().await.machine_hex.clone()
    }

    /// Machine denomination used when scaling meters.
    pub fn denomination(&self) -> f64 {
        self.settings.denomination
    }

    /// Site identity carried for the host application.
    pub fn identity(&self) -> &MachineIdentity {
        &self.settings.identity
    }
}

/// Read up to `size` bytes, accumulating chunks until the size is reached
/// or `timeout` has elapsed. A short or empty result is not an error.
async fn read_response(
    transport: &mut dyn Transport,
    size: usize,
    timeout: Duration,
) -> Result<Vec<u8>> {
    let deadline = Instant::now() + timeout;
    let mut response = Vec::with_capacity(size);
    let mut buf = vec![0u8; size];

    while response.len() < size {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        let wanted = size - response.len();
        match transport.receive(&mut buf[..wanted], remaining).await {
            Ok(0) | Err(Error::Timeout) => break,
            Ok(n) => response.extend_from_slice(&buf[..n]),
            Err(e) => return Err(e),
        }
    }
    Ok(response)
}
