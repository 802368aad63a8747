//! SasBuilder -- fluent builder for constructing [`SasClient`] instances.
//!
//! Configuration is split from construction so that the values a site
//! configuration supplies ([`SasConfig`]) can be loaded by the application
//! in whatever format it likes and handed over as plain data, with the
//! line-tuning knobs layered on top.
//!
//! # Example
//!
//! ```no_run
//! use saslib_protocol::builder::SasBuilder;
//! use std::time::Duration;
//!
//! # async fn example() -> saslib_core::Result<()> {
//! let client = SasBuilder::new()
//!     .serial_port("/dev/ttyUSB0")
//!     .timeout(Duration::from_millis(200))
//!     .denomination(0.01)
//!     .build()
//!     .await?;
//!
//! let address = client.start().await?;
//! println!("gaming machine at {address}");
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use tracing::{error, info};

use saslib_core::error::{Error, Result};
use saslib_core::transport::Transport;
use saslib_core::types::SAS_BAUD_RATE;
use saslib_transport::{SerialConfig, SerialTransport};

use crate::client::{ClientSettings, SasClient};
use crate::frame::DEFAULT_POLL_ADDRESS;

/// Site identity of a gaming machine.
///
/// Carried with the connection for the host application; none of the
/// operations in this crate put these values on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineIdentity {
    pub asset_number: String,
    pub reg_key: String,
    pub pos_id: String,
    pub security_key: String,
}

impl Default for MachineIdentity {
    fn default() -> Self {
        MachineIdentity {
            asset_number: "01000000".to_string(),
            reg_key: "0".repeat(40),
            pos_id: "B374A402".to_string(),
            security_key: "44".to_string(),
        }
    }
}

/// Connection settings supplied by the host application's configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SasConfig {
    pub serial_port: String,
    /// Read timeout for long polls and the handshake.
    pub timeout: Duration,
    /// Address used in the wake-up pre-amble.
    pub poll_address: u8,
    /// Value of one credit, e.g. `0.01` for a penny machine.
    pub denomination: f64,
    pub identity: MachineIdentity,
    /// Keep retrying when the port cannot be opened instead of failing.
    pub perpetual: bool,
}

impl Default for SasConfig {
    fn default() -> Self {
        SasConfig {
            serial_port: String::new(),
            timeout: Duration::from_secs(2),
            poll_address: DEFAULT_POLL_ADDRESS,
            denomination: 0.01,
            identity: MachineIdentity::default(),
            perpetual: false,
        }
    }
}

/// Fluent builder for [`SasClient`].
///
/// ```ignore
/// let client = SasBuilder::new()
///     .serial_port("/dev/ttyUSB0")
///     .build()
///     .await?;
/// ```
pub struct SasBuilder {
    config: SasConfig,
    baud_rate: u32,
    poll_timeout: Option<Duration>,
    wake_up_delay: Duration,
    handshake_backoff: Duration,
}

impl SasBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self::from_config(SasConfig::default())
    }

    /// Create a builder from a loaded configuration.
    pub fn from_config(config: SasConfig) -> Self {
        SasBuilder {
            config,
            baud_rate: SAS_BAUD_RATE,
            poll_timeout: None,
            wake_up_delay: Duration::ZERO,
            handshake_backoff: Duration::from_secs(1),
        }
    }

    /// Set the serial port path (e.g. `/dev/ttyUSB0` or `COM3`).
    pub fn serial_port(mut self, port: &str) -> Self {
        self.config.serial_port = port.to_string();
        self
    }

    /// Set the read timeout for long polls and the handshake (default: 2s).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the pre-amble poll address (default: 0x82).
    pub fn poll_address(mut self, addr: u8) -> Self {
        self.config.poll_address = addr;
        self
    }

    /// Set the machine denomination used for meter scaling (default: 0.01).
    pub fn denomination(mut self, denomination: f64) -> Self {
        self.config.denomination = denomination;
        self
    }

    pub fn asset_number(mut self, asset_number: &str) -> Self {
        self.config.identity.asset_number = asset_number.to_string();
        self
    }

    pub fn reg_key(mut self, reg_key: &str) -> Self {
        self.config.identity.reg_key = reg_key.to_string();
        self
    }

    pub fn pos_id(mut self, pos_id: &str) -> Self {
        self.config.identity.pos_id = pos_id.to_string();
        self
    }

    pub fn security_key(mut self, security_key: &str) -> Self {
        self.config.identity.security_key = security_key.to_string();
        self
    }

    /// Retry forever when the port cannot be opened (default: false).
    pub fn perpetual(mut self, enabled: bool) -> Self {
        self.config.perpetual = enabled;
        self
    }

    /// Override the baud rate. SAS lines run at 19200.
    pub fn baud_rate(mut self, baud: u32) -> Self {
        self.baud_rate = baud;
        self
    }

    /// Set the read timeout for general polls (default: same as `timeout`).
    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = Some(timeout);
        self
    }

    /// Pause between the wake-up pre-amble and the frame body (default: none).
    ///
    /// Some machines need a short gap after the parity switch before they
    /// accept the data phase.
    pub fn wake_up_delay(mut self, delay: Duration) -> Self {
        self.wake_up_delay = delay;
        self
    }

    /// Pause between handshake and port-open attempts (default: 1s).
    pub fn handshake_backoff(mut self, backoff: Duration) -> Self {
        self.handshake_backoff = backoff;
        self
    }

    fn settings(&self) -> Result<ClientSettings> {
        let denomination = self.config.denomination;
        if !denomination.is_finite() || denomination <= 0.0 {
            return Err(Error::InvalidParameter(format!(
                "denomination must be a positive amount, got {denomination}"
            )));
        }
        let poll_timeout = self.poll_timeout.unwrap_or(self.config.timeout);
        if self.config.timeout.is_zero() || poll_timeout.is_zero() {
            return Err(Error::InvalidParameter(
                "timeouts must be non-zero".into(),
            ));
        }
        if self.baud_rate == 0 {
            return Err(Error::InvalidParameter("baud_rate must be non-zero".into()));
        }

        Ok(ClientSettings {
            poll_address: self.config.poll_address,
            timeout: self.config.timeout,
            poll_timeout,
            wake_up_delay: self.wake_up_delay,
            handshake_backoff: self.handshake_backoff,
            perpetual: self.config.perpetual,
            denomination,
            identity: self.config.identity.clone(),
        })
    }

    /// Build a [`SasClient`] with a caller-provided transport.
    ///
    /// The transport is not touched until the first operation. This is the
    /// entry point for testing (pass a `MockTransport` from
    /// `saslib-test-harness`) and for custom line drivers.
    pub async fn build_with_transport(self, transport: Box<dyn Transport>) -> Result<SasClient> {
        let settings = self.settings()?;
        Ok(SasClient::new(transport, settings))
    }

    /// Build a [`SasClient`] on a serial port and open it.
    ///
    /// Requires that [`serial_port()`](Self::serial_port) has been called.
    /// If the port cannot be opened, a perpetual client keeps retrying
    /// after the handshake backoff; otherwise [`Error::Open`] is returned.
    pub async fn build(self) -> Result<SasClient> {
        if self.config.serial_port.is_empty() {
            return Err(Error::InvalidParameter(
                "serial_port is required for build()".into(),
            ));
        }
        let settings = self.settings()?;
        let port = self.config.serial_port.as_str();

        let mut transport = SerialTransport::new(
            port,
            SerialConfig {
                baud_rate: self.baud_rate,
                ..SerialConfig::default()
            },
        );
        loop {
            match Transport::open(&mut transport).await {
                Ok(()) => break,
                Err(e) if settings.perpetual => {
                    error!(port, error = %e, "SAS port could not be opened, retrying");
                    tokio::time::sleep(settings.handshake_backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
        info!(port, "SAS port ready");

        Ok(SasClient::new(Box::new(transport), settings))
    }
}

impl Default for SasBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use saslib_core::ConnectionState;
    use saslib_test_harness::MockTransport;

    #[tokio::test]
    async fn builder_defaults() {
        let mock = MockTransport::new();
        let probe = mock.probe();
        let client = SasBuilder::new()
            .build_with_transport(Box::new(mock))
            .await
            .unwrap();

        assert_eq!(client.settings.poll_address, 0x82);
        assert_eq!(client.settings.poll_timeout, client.settings.timeout);
        assert_eq!(client.settings.wake_up_delay, Duration::ZERO);
        assert_eq!(client.settings.handshake_backoff, Duration::from_secs(1));
        assert!(!client.settings.perpetual);
        assert_eq!(client.denomination(), 0.01);
        assert_eq!(client.state().await, ConnectionState::Closed);
        assert_eq!(client.address().await, None);
        // Building does not touch the line.
        assert_eq!(probe.open_calls(), 0);
    }

    #[tokio::test]
    async fn builder_default_identity() {
        let client = SasBuilder::new()
            .build_with_transport(Box::new(MockTransport::new()))
            .await
            .unwrap();
        let identity = client.identity();
        assert_eq!(identity.asset_number, "01000000");
        assert_eq!(identity.reg_key, "0000000000000000000000000000000000000000");
        assert_eq!(identity.pos_id, "B374A402");
        assert_eq!(identity.security_key, "44");
    }

    #[tokio::test]
    async fn builder_fluent_chain() {
        let client = SasBuilder::new()
            .serial_port("/dev/ttyUSB0")
            .timeout(Duration::from_millis(300))
            .poll_timeout(Duration::from_millis(100))
            .poll_address(0x80)
            .denomination(0.25)
            .asset_number("00001234")
            .reg_key("ABCD")
            .pos_id("POS1")
            .security_key("99")
            .perpetual(true)
            .baud_rate(19_200)
            .wake_up_delay(Duration::from_millis(5))
            .handshake_backoff(Duration::from_millis(10))
            .build_with_transport(Box::new(MockTransport::new()))
            .await
            .unwrap();

        assert_eq!(client.settings.poll_address, 0x80);
        assert_eq!(client.settings.timeout, Duration::from_millis(300));
        assert_eq!(client.settings.poll_timeout, Duration::from_millis(100));
        assert_eq!(client.settings.wake_up_delay, Duration::from_millis(5));
        assert!(client.settings.perpetual);
        assert_eq!(client.denomination(), 0.25);
        assert_eq!(client.identity().asset_number, "00001234");
        assert_eq!(client.identity().security_key, "99");
    }

    #[tokio::test]
    async fn builder_from_config() {
        let config = SasConfig {
            serial_port: "COM3".to_string(),
            timeout: Duration::from_secs(1),
            denomination: 1.0,
            ..SasConfig::default()
        };
        let client = SasBuilder::from_config(config)
            .build_with_transport(Box::new(MockTransport::new()))
            .await
            .unwrap();
        assert_eq!(client.denomination(), 1.0);
        assert_eq!(client.settings.poll_timeout, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn builder_rejects_bad_denomination() {
        for denom in [0.0, -0.01, f64::NAN, f64::INFINITY] {
            let result = SasBuilder::new()
                .denomination(denom)
                .build_with_transport(Box::new(MockTransport::new()))
                .await;
            assert!(matches!(result, Err(Error::InvalidParameter(_))));
        }
    }

    #[tokio::test]
    async fn builder_rejects_zero_timeouts() {
        let result = SasBuilder::new()
            .timeout(Duration::ZERO)
            .build_with_transport(Box::new(MockTransport::new()))
            .await;
        assert!(matches!(result, Err(Error::InvalidParameter(_))));

        let result = SasBuilder::new()
            .poll_timeout(Duration::ZERO)
            .build_with_transport(Box::new(MockTransport::new()))
            .await;
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    #[tokio::test]
    async fn builder_serial_port_required_for_build() {
        let result = SasBuilder::new().build().await;
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
    }

    #[tokio::test]
    async fn builder_missing_port_fails_without_perpetual() {
        let result = SasBuilder::new()
            .serial_port("/dev/nonexistent_sas_port_12345")
            .build()
            .await;
        assert!(matches!(result, Err(Error::Open(_))));
    }
}
