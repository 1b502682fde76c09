//! A single request/response exchange with a device
//!
//! A `Session` finds the device, opens it, sends the payload and then polls for the response
//! until the sentinel arrives or the timeout elapses. The transport is closed on every path out.

use std::borrow::Cow;
use std::fs;
use std::path::Path;
use std::str;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, info, trace, warn};

use crate::console::{select_port, Console};
use crate::port::{discover_candidates, PortDescriptor, PortEnumerator};
use crate::transport::{send_payload, Connect, Transport, TransportGuard};
use crate::Error;

/// The baud rate used by the example sketches
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// The string the device sends once it has finished responding
pub const DEFAULT_SENTINEL: &str = "end";

/// The default match substring for finding the device
pub const DEFAULT_SUBSTRING: &str = "arduino";

/// How long to sleep between checks for new input
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Source of time for the read loop.
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// The real wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration)
    }
}

/// How received bytes are turned into text.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum DecodeMode {
    /// Invalid UTF-8 is an error
    Strict,
    /// Invalid UTF-8 is replaced with U+FFFD
    Lossy,
}

impl DecodeMode {
    /// Decodes `bytes` as UTF-8.
    ///
    /// In strict mode a multi-byte sequence that is merely cut off at the end of `bytes` is not
    /// an error, since the rest of it may arrive with the next read. The pending character is
    /// returned as U+FFFD so the text never ends with what precedes it.
    pub fn decode(self, bytes: &[u8]) -> Result<Cow<'_, str>, Error> {
        match self {
            DecodeMode::Lossy => Ok(String::from_utf8_lossy(bytes)),
            DecodeMode::Strict => match str::from_utf8(bytes) {
                Ok(text) => Ok(Cow::Borrowed(text)),
                Err(err) if err.error_len().is_none() => {
                    let complete = str::from_utf8(&bytes[..err.valid_up_to()])?;

                    Ok(Cow::Owned(format!(
                        "{}{}",
                        complete,
                        char::REPLACEMENT_CHARACTER
                    )))
                }
                Err(err) => Err(Error::DecodeError(err)),
            },
        }
    }
}

/// Settings for one transfer.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SessionConfig {
    /// Must match the rate the firmware passes to `Serial.begin`
    pub baud_rate: u32,
    /// Case-insensitive substring used to find the device
    pub substring: String,
    /// Give up waiting for the sentinel after this long. `None` waits forever
    pub timeout: Option<Duration>,
    pub decode_mode: DecodeMode,
    pub sentinel: String,
    pub poll_interval: Duration,
    /// How many times to ask the user to pick a port before giving up
    pub max_selection_attempts: usize,
    /// Skips discovery and opens this device directly
    pub device: Option<String>,
    /// Prints every enumerated port before filtering
    pub show_all_ports: bool,
}

impl Default for SessionConfig {
    fn default() -> SessionConfig {
        SessionConfig {
            baud_rate: DEFAULT_BAUD_RATE,
            substring: DEFAULT_SUBSTRING.to_owned(),
            timeout: Some(Duration::from_secs(3)),
            decode_mode: DecodeMode::Lossy,
            sentinel: DEFAULT_SENTINEL.to_owned(),
            poll_interval: POLL_INTERVAL,
            max_selection_attempts: 3,
            device: None,
            show_all_ports: false,
        }
    }
}

impl SessionConfig {
    /// Settings that wait forever for the sentinel and reject invalid UTF-8.
    pub fn basic() -> SessionConfig {
        SessionConfig {
            timeout: None,
            decode_mode: DecodeMode::Strict,
            show_all_ports: true,
            ..SessionConfig::default()
        }
    }
}

/// Why the read loop stopped.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum EndReason {
    SentinelMatched,
    TimedOut,
}

/// The result of a completed exchange.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Outcome {
    pub reason: EndReason,
    /// Every byte received during the session
    pub data: Vec<u8>,
}

impl Outcome {
    pub fn sentinel_matched(&self) -> bool {
        self.reason == EndReason::SentinelMatched
    }

    /// Returns the received data as text, replacing invalid UTF-8.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }
}

/// The lifecycle of a session.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum State {
    Idle,
    Discovering,
    Selecting,
    Opening,
    Writing,
    Reading,
    Closed,
    Failed,
}

/// Reads the payload file as raw bytes.
pub fn load_payload<P: AsRef<Path>>(path: P) -> Result<Vec<u8>, Error> {
    let path = path.as_ref();

    fs::read(path).map_err(|source| Error::PayloadError {
        path: path.to_path_buf(),
        source,
    })
}

pub struct Session<K: Clock, C: Console> {
    config: SessionConfig,
    clock: K,
    console: C,
    state: State,
}

impl<K: Clock, C: Console> Session<K, C> {
    pub fn new(config: SessionConfig, clock: K, console: C) -> Session<K, C> {
        Session {
            config,
            clock,
            console,
            state: State::Idle,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn console(&self) -> &C {
        &self.console
    }

    pub fn clock(&self) -> &K {
        &self.clock
    }

    fn transition(&mut self, next: State) {
        trace!("Session state {:?} -> {:?}", self.state, next);

        self.state = next;
    }

    fn print(&mut self, line: &str) -> Result<(), Error> {
        self.console.print_line(line).map_err(Error::ConsoleError)
    }

    /// Runs the whole exchange: discover, select, open, write, read and close.
    ///
    /// A session can only be run once.
    pub fn run<B>(&mut self, backend: &B, payload: &[u8]) -> Result<Outcome, Error>
    where
        B: PortEnumerator + Connect,
    {
        if self.state != State::Idle {
            return Err(Error::SessionReused);
        }

        let result = self.run_inner(backend, payload);

        match result {
            Ok(_) => self.transition(State::Closed),
            Err(ref err) => {
                debug!("Session failed: {}", err);
                self.transition(State::Failed);
            }
        }

        result
    }

    fn run_inner<B>(&mut self, backend: &B, payload: &[u8]) -> Result<Outcome, Error>
    where
        B: PortEnumerator + Connect,
    {
        let port = match self.config.device.clone() {
            Some(device) => {
                info!("Using serial device {:?}", device);
                PortDescriptor::new(device)
            }
            None => {
                let candidates = self.discover(backend)?;

                self.transition(State::Selecting);
                select_port(
                    candidates,
                    &self.config.substring,
                    &mut self.console,
                    self.config.max_selection_attempts,
                )?
            }
        };

        let mut transport = self.open_transport(backend, &port)?;
        let exchange = self.exchange(&mut *transport, payload);

        if let Err(err) = self.print("Closing port") {
            warn!("{}", err);
        }

        match (exchange, transport.close()) {
            (Ok(outcome), Ok(())) => Ok(outcome),
            (Ok(outcome), Err(err)) => {
                error!("{}", err);
                Ok(outcome)
            }
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(close_err)) => {
                error!("{}", close_err);
                Err(err)
            }
        }
    }

    fn discover<E: PortEnumerator>(&mut self, enumerator: &E) -> Result<Vec<PortDescriptor>, Error> {
        self.transition(State::Discovering);

        let ports = enumerator.available_ports()?;

        debug!("Found {} serial ports", ports.len());

        if self.config.show_all_ports {
            self.print("All ports:")?;

            for (i, port) in ports.iter().enumerate() {
                self.print(&format!("{}. {}", i + 1, port.details()))?;
            }

            self.print("")?;
        }

        Ok(discover_candidates(&ports, &self.config.substring))
    }

    /// Opens `port` at the configured baud rate.
    pub fn open_transport<O: Connect>(
        &mut self,
        connector: &O,
        port: &PortDescriptor,
    ) -> Result<TransportGuard<O::Transport>, Error> {
        self.transition(State::Opening);

        let transport = connector
            .open(&port.device, self.config.baud_rate)
            .map_err(|err| Error::PortOpenError(port.device.clone(), err))?;

        info!(
            "Opened {} at {} baud",
            port.device, self.config.baud_rate
        );

        Ok(TransportGuard::new(transport))
    }

    fn exchange<T: Transport>(&mut self, transport: &mut T, payload: &[u8]) -> Result<Outcome, Error> {
        self.transition(State::Writing);
        send_payload(transport, payload)?;

        self.receive_until_sentinel_or_timeout(transport)
    }

    /// Polls `transport` until the received text ends with the sentinel, or until the timeout
    /// elapses when one is configured.
    ///
    /// Without a timeout this only returns once the sentinel arrives or an error occurs.
    pub fn receive_until_sentinel_or_timeout<T: Transport>(
        &mut self,
        transport: &mut T,
    ) -> Result<Outcome, Error> {
        self.transition(State::Reading);

        let start = self.clock.now();
        let mut data: Vec<u8> = Vec::new();

        loop {
            self.clock.sleep(self.config.poll_interval);

            let received = drain(transport, &mut data)?;

            if received > 0 {
                trace!("Received {} bytes ({} total)", received, data.len());

                let text = self.config.decode_mode.decode(&data)?;
                let matched = text.ends_with(self.config.sentinel.as_str());
                let chunk = String::from_utf8_lossy(&data[data.len() - received..]).into_owned();

                self.print("Received:")?;
                self.print(&chunk)?;

                if matched {
                    debug!("Sentinel {:?} received", self.config.sentinel);

                    return Ok(Outcome {
                        reason: EndReason::SentinelMatched,
                        data,
                    });
                }
            }

            if let Some(timeout) = self.config.timeout {
                if self.clock.now().duration_since(start) >= timeout {
                    warn!("No {:?} received within {:?}", self.config.sentinel, timeout);

                    return Ok(Outcome {
                        reason: EndReason::TimedOut,
                        data,
                    });
                }
            }
        }
    }
}

/// Reads everything currently buffered in `transport` into `data` and returns how many bytes
/// were read.
fn drain<T: Transport + ?Sized>(transport: &mut T, data: &mut Vec<u8>) -> Result<usize, Error> {
    let mut total = 0;

    loop {
        let available = transport.bytes_available().map_err(Error::ReadError)?;

        if available == 0 {
            break;
        }

        let mut buf = vec![0u8; available];
        let count = transport
            .read_available(&mut buf)
            .map_err(Error::ReadError)?;

        if count == 0 {
            break;
        }

        data.extend_from_slice(&buf[..count]);
        total += count;
    }

    Ok(total)
}
