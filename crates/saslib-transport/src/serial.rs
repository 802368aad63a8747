//! Serial port transport for SAS communication.
//!
//! This module provides [`SerialTransport`], which implements the
//! [`Transport`] trait for the RS-232 link between a host and a gaming
//! machine. SAS runs at 19200 baud, 8 data bits, with the parity bit
//! repurposed as a "wake-up" flag on the first byte of every long poll.
//!
//! # MARK and SPACE parity
//!
//! `tokio-serial` only exposes NONE/ODD/EVEN parity. MARK and SPACE are
//! produced on transmit by choosing EVEN or ODD per byte so that the
//! generated parity bit has the required value. While idle or receiving
//! under MARK the port runs with no parity and two stop bits: a parity bit
//! that is always 1 looks exactly like an extra stop bit to the receiver.
//!
//! # Example
//!
//! ```no_run
//! use saslib_core::transport::Transport;
//! use saslib_core::types::Parity;
//! use saslib_transport::SerialTransport;
//!
//! # async fn example() -> saslib_core::Result<()> {
//! let mut transport = SerialTransport::open("/dev/ttyUSB0").await?;
//!
//! // Wake-up byte with the ninth bit set, then the data phase
//! transport.set_parity(Parity::Mark)?;
//! transport.send(&[0x01]).await?;
//! transport.set_parity(Parity::Space)?;
//! transport.send(&[0x01, 0xCF, 0x0F]).await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use saslib_core::error::{Error, Result};
use saslib_core::transport::Transport;
use saslib_core::types::{Parity, SAS_BAUD_RATE, StopBits};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{ClearBuffer, SerialPort, SerialPortBuilderExt, SerialStream};

/// Serial port configuration.
///
/// Defaults match the SAS command-port profile:
/// - 19200 baud
/// - 8 data bits
/// - 1 stop bit
/// - MARK parity
/// - No flow control
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Baud rate (SAS mandates 19200)
    pub baud_rate: u32,
    /// Number of data bits (always 8 for SAS)
    pub data_bits: DataBits,
    /// Number of stop bits
    pub stop_bits: StopBits,
    /// Parity mode
    pub parity: Parity,
    /// Flow control (SAS uses none)
    pub flow_control: FlowControl,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: SAS_BAUD_RATE,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::Mark,
            flow_control: FlowControl::None,
        }
    }
}

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataBits {
    Seven,
    Eight,
}

impl From<DataBits> for tokio_serial::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Seven => tokio_serial::DataBits::Seven,
            DataBits::Eight => tokio_serial::DataBits::Eight,
        }
    }
}

/// Flow control mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowControl {
    None,
    Software,
    Hardware,
}

impl From<FlowControl> for tokio_serial::FlowControl {
    fn from(flow: FlowControl) -> Self {
        match flow {
            FlowControl::None => tokio_serial::FlowControl::None,
            FlowControl::Software => tokio_serial::FlowControl::Software,
            FlowControl::Hardware => tokio_serial::FlowControl::Hardware,
        }
    }
}

fn hardware_stop_bits(bits: StopBits) -> tokio_serial::StopBits {
    match bits {
        StopBits::One => tokio_serial::StopBits::One,
        StopBits::Two => tokio_serial::StopBits::Two,
    }
}

/// Hardware settings used while idle or receiving under `parity`.
fn idle_line(parity: Parity, stop_bits: StopBits) -> (tokio_serial::Parity, tokio_serial::StopBits) {
    match parity {
        Parity::None => (tokio_serial::Parity::None, hardware_stop_bits(stop_bits)),
        Parity::Odd => (tokio_serial::Parity::Odd, hardware_stop_bits(stop_bits)),
        Parity::Even => (tokio_serial::Parity::Even, hardware_stop_bits(stop_bits)),
        Parity::Mark => (tokio_serial::Parity::None, tokio_serial::StopBits::Two),
        Parity::Space => (tokio_serial::Parity::None, hardware_stop_bits(stop_bits)),
    }
}

/// EVEN/ODD setting that makes the UART emit `parity_bit` after `byte`.
///
/// With EVEN parity the generated bit is 1 exactly when the byte has an odd
/// number of set bits; ODD parity is the complement.
pub(crate) fn parity_for_bit(byte: u8, parity_bit: bool) -> tokio_serial::Parity {
    let odd_ones = byte.count_ones() % 2 == 1;
    if odd_ones == parity_bit {
        tokio_serial::Parity::Even
    } else {
        tokio_serial::Parity::Odd
    }
}

fn map_io_error(e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::BrokenPipe || e.kind() == std::io::ErrorKind::NotConnected
    {
        Error::Transport(format!("serial link lost: {e}"))
    } else {
        Error::Io(e)
    }
}

/// Serial port transport for SAS communication.
///
/// The port may be closed and reopened any number of times; parity and
/// stop-bit changes made while closed are applied on the next open.
pub struct SerialTransport {
    /// The underlying serial port stream, `None` while closed
    port: Option<SerialStream>,
    /// Port name for opening and logging
    port_name: String,
    config: SerialConfig,
}

impl SerialTransport {
    /// Create a transport for `port` without opening it.
    pub fn new(port: &str, config: SerialConfig) -> Self {
        Self {
            port: None,
            port_name: port.to_string(),
            config,
        }
    }

    /// Open a serial port with the default SAS settings.
    ///
    /// # Arguments
    ///
    /// * `port` - Serial port path (e.g., "/dev/ttyUSB0" on Linux, "COM3" on Windows)
    pub async fn open(port: &str) -> Result<Self> {
        Self::open_with_config(port, SerialConfig::default()).await
    }

    /// Open a serial port with full configuration control.
    pub async fn open_with_config(port: &str, config: SerialConfig) -> Result<Self> {
        let mut transport = Self::new(port, config);
        Transport::open(&mut transport).await?;
        Ok(transport)
    }

    /// Get the name of the serial port.
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Push the configured parity/stop bits to the open port.
    fn apply_line(&mut self) -> Result<()> {
        let (parity, stop_bits) = idle_line(self.config.parity, self.config.stop_bits);
        if let Some(port) = self.port.as_mut() {
            port.set_parity(parity)
                .map_err(|e| Error::Transport(format!("failed to set parity: {e}")))?;
            port.set_stop_bits(stop_bits)
                .map_err(|e| Error::Transport(format!("failed to set stop bits: {e}")))?;
        }
        Ok(())
    }

    /// Write `data` one byte at a time with a forced parity bit.
    async fn send_with_parity_bit(&mut self, data: &[u8], parity_bit: bool) -> Result<()> {
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;
        port.set_stop_bits(hardware_stop_bits(self.config.stop_bits))
            .map_err(|e| Error::Transport(format!("failed to set stop bits: {e}")))?;
        for &byte in data {
            port.set_parity(parity_for_bit(byte, parity_bit))
                .map_err(|e| Error::Transport(format!("failed to set parity: {e}")))?;
            port.write_all(&[byte]).await.map_err(map_io_error)?;
            // The byte must leave the UART before the parity changes again.
            port.flush().await.map_err(map_io_error)?;
        }
        self.apply_line()
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn open(&mut self) -> Result<()> {
        if self.port.is_some() {
            return Ok(());
        }

        tracing::debug!(
            port = %self.port_name,
            baud_rate = self.config.baud_rate,
            data_bits = ?self.config.data_bits,
            stop_bits = ?self.config.stop_bits,
            parity = ?self.config.parity,
            "Opening serial port"
        );

        let (parity, stop_bits) = idle_line(self.config.parity, self.config.stop_bits);
        let stream = tokio_serial::new(&self.port_name, self.config.baud_rate)
            .data_bits(self.config.data_bits.into())
            .stop_bits(stop_bits)
            .parity(parity)
            .flow_control(self.config.flow_control.into())
            .open_native_async()
            .map_err(|e| {
                tracing::error!(port = %self.port_name, error = %e, "Failed to open serial port");
                Error::Open(format!("{}: {}", self.port_name, e))
            })?;

        tracing::info!(port = %self.port_name, "Serial port opened successfully");
        self.port = Some(stream);
        Ok(())
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        tracing::trace!(
            port = %self.port_name,
            bytes = data.len(),
            data = ?data,
            parity = ?self.config.parity,
            "Sending data"
        );

        match self.config.parity {
            Parity::Mark => self.send_with_parity_bit(data, true).await,
            Parity::Space => self.send_with_parity_bit(data, false).await,
            _ => {
                let port = self.port.as_mut().ok_or(Error::NotConnected)?;
                port.write_all(data).await.map_err(|e| {
                    tracing::error!(port = %self.port_name, error = %e, "Failed to send data");
                    map_io_error(e)
                })?;
                port.flush().await.map_err(map_io_error)
            }
        }
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;

        match tokio::time::timeout(timeout, port.read(buf)).await {
            Ok(Ok(n)) => {
                tracing::trace!(
                    port = %self.port_name,
                    bytes = n,
                    data = ?&buf[..n],
                    "Received data"
                );
                Ok(n)
            }
            Ok(Err(e)) => {
                tracing::error!(port = %self.port_name, error = %e, "Failed to receive data");
                Err(map_io_error(e))
            }
            Err(_) => {
                tracing::trace!(
                    port = %self.port_name,
                    timeout_ms = timeout.as_millis(),
                    "Timeout waiting for data"
                );
                Err(Error::Timeout)
            }
        }
    }

    async fn flush(&mut self) -> Result<()> {
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;
        port.flush().await.map_err(map_io_error)
    }

    async fn clear_buffers(&mut self) -> Result<()> {
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;
        port.clear(ClearBuffer::All)
            .map_err(|e| Error::Transport(format!("failed to clear buffers: {e}")))
    }

    fn set_parity(&mut self, parity: Parity) -> Result<()> {
        self.config.parity = parity;
        self.apply_line()
    }

    fn set_stop_bits(&mut self, stop_bits: StopBits) -> Result<()> {
        self.config.stop_bits = stop_bits;
        self.apply_line()
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut port) = self.port.take() {
            tracing::debug!(port = %self.port_name, "Closing serial port");
            if let Err(e) = port.flush().await {
                tracing::warn!(
                    port = %self.port_name,
                    error = %e,
                    "Failed to flush before closing (continuing anyway)"
                );
            }
            tracing::info!(port = %self.port_name, "Serial port closed");
        }
        Ok(())
    }

    fn release(&mut self) {
        if self.port.take().is_some() {
            tracing::debug!(port = %self.port_name, "Serial port released");
        }
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_config_default() {
        let config = SerialConfig::default();
        assert_eq!(config.baud_rate, 19_200);
        assert_eq!(config.data_bits, DataBits::Eight);
        assert_eq!(config.stop_bits, StopBits::One);
        assert_eq!(config.parity, Parity::Mark);
        assert_eq!(config.flow_control, FlowControl::None);
    }

    #[test]
    fn test_mark_parity_bit() {
        // 0x01 has one set bit: EVEN parity already emits a 1.
        assert_eq!(parity_for_bit(0x01, true), tokio_serial::Parity::Even);
        // 0x03 has two set bits: ODD parity is needed to emit a 1.
        assert_eq!(parity_for_bit(0x03, true), tokio_serial::Parity::Odd);
        assert_eq!(parity_for_bit(0x00, true), tokio_serial::Parity::Odd);
    }

    #[test]
    fn test_space_parity_bit() {
        assert_eq!(parity_for_bit(0x01, false), tokio_serial::Parity::Odd);
        assert_eq!(parity_for_bit(0x03, false), tokio_serial::Parity::Even);
        assert_eq!(parity_for_bit(0xFF, false), tokio_serial::Parity::Even);
    }

    #[test]
    fn test_idle_line_mark_is_two_stop_bits() {
        let (parity, stop) = idle_line(Parity::Mark, StopBits::One);
        assert_eq!(parity, tokio_serial::Parity::None);
        assert_eq!(stop, tokio_serial::StopBits::Two);
    }

    #[test]
    fn test_idle_line_event_port() {
        let (parity, stop) = idle_line(Parity::None, StopBits::Two);
        assert_eq!(parity, tokio_serial::Parity::None);
        assert_eq!(stop, tokio_serial::StopBits::Two);
    }

    #[test]
    fn test_new_is_closed() {
        let transport = SerialTransport::new("/dev/null-sas", SerialConfig::default());
        assert!(!transport.is_connected());
        assert_eq!(transport.port_name(), "/dev/null-sas");
    }

    #[test]
    fn test_line_changes_while_closed_are_kept() {
        let mut transport = SerialTransport::new("/dev/null-sas", SerialConfig::default());
        transport.set_parity(Parity::None).unwrap();
        transport.set_stop_bits(StopBits::Two).unwrap();
        assert_eq!(transport.config.parity, Parity::None);
        assert_eq!(transport.config.stop_bits, StopBits::Two);
    }

    #[tokio::test]
    async fn test_send_while_closed_is_not_connected() {
        let mut transport = SerialTransport::new("/dev/null-sas", SerialConfig::default());
        let result = transport.send(&[0x01]).await;
        assert!(matches!(result, Err(Error::NotConnected)));
    }

    #[tokio::test]
    async fn test_open_missing_port_fails_with_open_error() {
        let mut transport =
            SerialTransport::new("/dev/saslib-no-such-port", SerialConfig::default());
        let result = Transport::open(&mut transport).await;
        assert!(matches!(result, Err(Error::Open(_))));
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn test_close_when_closed_is_noop() {
        let mut transport = SerialTransport::new("/dev/null-sas", SerialConfig::default());
        transport.close().await.unwrap();
        assert!(!transport.is_connected());
    }
}
