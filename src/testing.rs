//! In-memory stand-ins for the serial hardware, the clock and the user

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::console::Console;
use crate::port::{PortDescriptor, PortEnumerator};
use crate::session::Clock;
use crate::transport::{Connect, Transport};
use crate::Error;

#[derive(Debug, Default)]
struct TransportState {
    /// Chunks that arrive one per poll
    arrivals: VecDeque<Vec<u8>>,
    /// Bytes that have arrived but not been read
    rx: VecDeque<u8>,
    written: Vec<u8>,
    flushes: usize,
    max_read: Option<usize>,
    fail_writes: bool,
    fail_reads: bool,
    fail_close: bool,
}

/// A transport that delivers a scripted sequence of chunks.
///
/// Whenever the reader finds the receive buffer empty the next chunk is staged, so each chunk
/// becomes visible on the following poll. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct FakeTransport {
    state: Rc<RefCell<TransportState>>,
    closes: Rc<Cell<usize>>,
}

impl FakeTransport {
    /// A device that never answers.
    pub fn silent() -> FakeTransport {
        FakeTransport::default()
    }

    pub fn with_arrivals(chunks: &[&[u8]]) -> FakeTransport {
        let transport = FakeTransport::default();

        transport
            .state
            .borrow_mut()
            .arrivals
            .extend(chunks.iter().map(|chunk| chunk.to_vec()));

        transport
    }

    /// Limits every read to at most `max` bytes regardless of what is available.
    pub fn max_read(self, max: usize) -> FakeTransport {
        self.state.borrow_mut().max_read = Some(max);
        self
    }

    pub fn failing_writes(self) -> FakeTransport {
        self.state.borrow_mut().fail_writes = true;
        self
    }

    pub fn failing_reads(self) -> FakeTransport {
        self.state.borrow_mut().fail_reads = true;
        self
    }

    pub fn failing_close(self) -> FakeTransport {
        self.state.borrow_mut().fail_close = true;
        self
    }

    pub fn written(&self) -> Vec<u8> {
        self.state.borrow().written.clone()
    }

    pub fn flushes(&self) -> usize {
        self.state.borrow().flushes
    }

    pub fn close_counter(&self) -> Rc<Cell<usize>> {
        Rc::clone(&self.closes)
    }
}

impl Transport for FakeTransport {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut state = self.state.borrow_mut();

        if state.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device removed"));
        }

        state.written.extend_from_slice(bytes);

        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.state.borrow_mut().flushes += 1;

        Ok(())
    }

    fn bytes_available(&mut self) -> io::Result<usize> {
        let mut state = self.state.borrow_mut();

        if state.rx.is_empty() {
            if let Some(chunk) = state.arrivals.pop_front() {
                state.rx.extend(chunk);
            }

            return Ok(0);
        }

        Ok(state.rx.len())
    }

    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.borrow_mut();

        if state.fail_reads {
            return Err(io::Error::new(io::ErrorKind::Other, "framing error"));
        }

        let limit = state.max_read.unwrap_or(usize::MAX);
        let count = buf.len().min(state.rx.len()).min(limit);

        for (slot, byte) in buf.iter_mut().zip(state.rx.drain(..count)) {
            *slot = byte;
        }

        Ok(count)
    }

    fn close(&mut self) -> io::Result<()> {
        self.closes.set(self.closes.get() + 1);

        if self.state.borrow().fail_close {
            return Err(io::Error::new(io::ErrorKind::Other, "close failed"));
        }

        Ok(())
    }
}

/// Port enumeration and opening backed by fixed data.
#[derive(Debug, Default)]
pub struct FakeBackend {
    pub ports: Vec<PortDescriptor>,
    pub transport: FakeTransport,
    pub fail_open: bool,
    pub opened: RefCell<Vec<(String, u32)>>,
}

impl FakeBackend {
    pub fn new(ports: Vec<PortDescriptor>, transport: FakeTransport) -> FakeBackend {
        FakeBackend {
            ports,
            transport,
            ..Default::default()
        }
    }
}

impl PortEnumerator for FakeBackend {
    fn available_ports(&self) -> Result<Vec<PortDescriptor>, Error> {
        Ok(self.ports.clone())
    }
}

impl Connect for FakeBackend {
    type Transport = FakeTransport;

    fn open(&self, device: &str, baud_rate: u32) -> io::Result<FakeTransport> {
        if self.fail_open {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "permission denied",
            ));
        }

        self.opened.borrow_mut().push((device.to_owned(), baud_rate));

        Ok(self.transport.clone())
    }
}

/// A clock that only moves when slept on.
#[derive(Debug)]
pub struct FakeClock {
    pub start: Instant,
    now: Cell<Instant>,
    pub sleeps: Cell<usize>,
}

impl FakeClock {
    pub fn new() -> FakeClock {
        let start = Instant::now();

        FakeClock {
            start,
            now: Cell::new(start),
            sleeps: Cell::new(0),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.now.get() - self.start
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.now.get()
    }

    fn sleep(&self, duration: Duration) {
        self.now.set(self.now.get() + duration);
        self.sleeps.set(self.sleeps.get() + 1);
    }
}

/// A console with scripted input that records its output.
#[derive(Debug, Default)]
pub struct FakeConsole {
    inputs: VecDeque<String>,
    pub output: Vec<String>,
    pub prompts: usize,
}

impl FakeConsole {
    pub fn new(inputs: &[&str]) -> FakeConsole {
        FakeConsole {
            inputs: inputs.iter().map(|input| format!("{}\n", input)).collect(),
            ..Default::default()
        }
    }
}

impl Console for FakeConsole {
    fn print_line(&mut self, line: &str) -> io::Result<()> {
        self.output.push(line.to_owned());

        Ok(())
    }

    fn read_line(&mut self, _prompt: &str) -> io::Result<Option<String>> {
        self.prompts += 1;

        Ok(self.inputs.pop_front())
    }
}
