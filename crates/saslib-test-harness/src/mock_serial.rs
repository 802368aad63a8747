//! Mock transport for deterministic testing of the SAS protocol engine.
//!
//! [`MockTransport`] implements the [`Transport`] trait with pre-loaded
//! request/response pairs and a queue of unsolicited reads. A SAS long poll
//! is two writes (the MARK-parity address pre-amble, then the SPACE-parity
//! frame) followed by one read, so a typical exchange is scripted as:
//!
//! ```
//! use saslib_test_harness::MockTransport;
//!
//! let mut mock = MockTransport::new();
//! mock.expect_silent(&[0x82, 0x0C]);   // pre-amble: poll address, device address
//! mock.expect(&[0x01, 0x29, 0xB8], &[0x0C]); // shutdown frame + CRC, address echo
//! ```
//!
//! The handshake reads without writing first; script it with
//! [`MockTransport::queue_read`] and [`MockTransport::queue_silence`].
//!
//! Once the mock is boxed into a client it can no longer be borrowed, so
//! [`MockTransport::probe`] hands out a cloneable [`MockProbe`] that reads
//! the shared state.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use saslib_core::error::{Error, Result};
use saslib_core::transport::Transport;
use saslib_core::types::{Parity, StopBits};

/// A pre-loaded request/response pair for the mock transport.
#[derive(Debug, Clone)]
struct Expectation {
    /// The exact bytes we expect to be sent.
    request: Vec<u8>,
    /// The bytes made available to `receive()` once the request is sent.
    response: Vec<u8>,
}

#[derive(Debug)]
struct MockState {
    /// Ordered queue of expected request/response pairs.
    expectations: VecDeque<Expectation>,
    /// Reads served when no response is pending; `None` is a silent read.
    unsolicited: VecDeque<Option<Vec<u8>>>,
    /// Response bytes not yet consumed by `receive()`.
    pending: VecDeque<u8>,
    connected: bool,
    /// Number of upcoming `open()` calls that fail.
    open_failures: u32,
    parity: Parity,
    stop_bits: StopBits,
    /// Log of all bytes sent, one entry per `send()`.
    sent_log: Vec<Vec<u8>>,
    /// Parity in effect for each entry of `sent_log`.
    sent_parity: Vec<Parity>,
    open_calls: usize,
    receive_calls: usize,
    /// Timeout passed to each `receive()`.
    receive_timeouts: Vec<Duration>,
    clear_calls: usize,
}

/// A mock [`Transport`] for testing protocol engines without hardware.
///
/// Expectations are consumed in order. When `send()` is called, the sent
/// data is recorded and matched against the next expectation; its response
/// becomes readable by subsequent `receive()` calls. When nothing is
/// pending, `receive()` serves the unsolicited queue, and times out once
/// that is empty too.
///
/// The mock starts closed, like a freshly created serial transport.
#[derive(Debug)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

/// Read-only view of a [`MockTransport`] that outlives moving the mock.
#[derive(Debug, Clone)]
pub struct MockProbe {
    state: Arc<Mutex<MockState>>,
}

fn lock(state: &Arc<Mutex<MockState>>) -> MutexGuard<'_, MockState> {
    // A panicking test thread poisons the lock; the data is still usable.
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockTransport {
    /// Create a new, closed mock transport.
    pub fn new() -> Self {
        MockTransport {
            state: Arc::new(Mutex::new(MockState {
                expectations: VecDeque::new(),
                unsolicited: VecDeque::new(),
                pending: VecDeque::new(),
                connected: false,
                open_failures: 0,
                parity: Parity::None,
                stop_bits: StopBits::One,
                sent_log: Vec::new(),
                sent_parity: Vec::new(),
                open_calls: 0,
                receive_calls: 0,
                receive_timeouts: Vec::new(),
                clear_calls: 0,
            })),
        }
    }

    /// Add an expected request/response pair.
    pub fn expect(&mut self, request: &[u8], response: &[u8]) {
        lock(&self.state).expectations.push_back(Expectation {
            request: request.to_vec(),
            response: response.to_vec(),
        });
    }

    /// Add an expected request that produces no response bytes.
    pub fn expect_silent(&mut self, request: &[u8]) {
        self.expect(request, &[]);
    }

    /// Queue bytes for a `receive()` that is not preceded by a request.
    pub fn queue_read(&mut self, data: &[u8]) {
        lock(&self.state).unsolicited.push_back(Some(data.to_vec()));
    }

    /// Queue a `receive()` that times out.
    pub fn queue_silence(&mut self) {
        lock(&self.state).unsolicited.push_back(None);
    }

    /// Make the next `n` calls to `open()` fail with [`Error::Open`].
    pub fn fail_opens(&mut self, n: u32) {
        lock(&self.state).open_failures = n;
    }

    /// Get a probe for inspecting this mock after it has been moved.
    pub fn probe(&self) -> MockProbe {
        MockProbe {
            state: Arc::clone(&self.state),
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProbe {
    /// All data sent through the transport, one element per `send()`.
    pub fn sent_data(&self) -> Vec<Vec<u8>> {
        lock(&self.state).sent_log.clone()
    }

    /// The parity in effect for each element of [`sent_data`](Self::sent_data).
    pub fn sent_parity(&self) -> Vec<Parity> {
        lock(&self.state).sent_parity.clone()
    }

    /// Number of expectations that have not yet been consumed.
    pub fn remaining_expectations(&self) -> usize {
        lock(&self.state).expectations.len()
    }

    /// Number of queued unsolicited reads not yet served.
    pub fn remaining_reads(&self) -> usize {
        lock(&self.state).unsolicited.len()
    }

    /// Number of `receive()` calls made so far.
    pub fn receive_calls(&self) -> usize {
        lock(&self.state).receive_calls
    }

    /// The timeout of every `receive()` call, in call order.
    pub fn receive_timeouts(&self) -> Vec<Duration> {
        lock(&self.state).receive_timeouts.clone()
    }

    /// Number of `open()` calls made so far, including failed ones.
    pub fn open_calls(&self) -> usize {
        lock(&self.state).open_calls
    }

    /// Number of `clear_buffers()` calls made so far.
    pub fn clear_calls(&self) -> usize {
        lock(&self.state).clear_calls
    }

    /// Whether the transport is currently open.
    pub fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }

    /// Current parity setting.
    pub fn parity(&self) -> Parity {
        lock(&self.state).parity
    }

    /// Current stop-bit setting.
    pub fn stop_bits(&self) -> StopBits {
        lock(&self.state).stop_bits
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(&mut self) -> Result<()> {
        let mut state = lock(&self.state);
        state.open_calls += 1;
        if state.connected {
            return Ok(());
        }
        if state.open_failures > 0 {
            state.open_failures -= 1;
            return Err(Error::Open("mock port unavailable".into()));
        }
        state.connected = true;
        Ok(())
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let mut state = lock(&self.state);
        if !state.connected {
            return Err(Error::NotConnected);
        }

        let parity = state.parity;
        state.sent_log.push(data.to_vec());
        state.sent_parity.push(parity);

        match state.expectations.pop_front() {
            Some(expectation) => {
                if data != expectation.request.as_slice() {
                    return Err(Error::Protocol(format!(
                        "unexpected send data: expected {:02X?}, got {:02X?}",
                        expectation.request, data
                    )));
                }
                state.pending.extend(expectation.response);
                Ok(())
            }
            None => Err(Error::Protocol(
                "no more expectations in mock transport".into(),
            )),
        }
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let mut state = lock(&self.state);
        if !state.connected {
            return Err(Error::NotConnected);
        }
        state.receive_calls += 1;
        state.receive_timeouts.push(timeout);

        if state.pending.is_empty() {
            match state.unsolicited.pop_front() {
                Some(Some(data)) => state.pending.extend(data),
                Some(None) | None => return Err(Error::Timeout),
            }
        }

        let n = state.pending.len().min(buf.len());
        for (slot, byte) in buf.iter_mut().zip(state.pending.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    async fn flush(&mut self) -> Result<()> {
        if !lock(&self.state).connected {
            return Err(Error::NotConnected);
        }
        Ok(())
    }

    async fn clear_buffers(&mut self) -> Result<()> {
        // Queued responses model bytes that arrive after the clear, so they
        // are kept.
        let mut state = lock(&self.state);
        if !state.connected {
            return Err(Error::NotConnected);
        }
        state.clear_calls += 1;
        Ok(())
    }

    fn set_parity(&mut self, parity: Parity) -> Result<()> {
        lock(&self.state).parity = parity;
        Ok(())
    }

    fn set_stop_bits(&mut self, stop_bits: StopBits) -> Result<()> {
        lock(&self.state).stop_bits = stop_bits;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let mut state = lock(&self.state);
        state.connected = false;
        state.pending.clear();
        Ok(())
    }

    fn release(&mut self) {
        let mut state = lock(&self.state);
        state.connected = false;
        state.pending.clear();
    }

    fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }
}
