//! Byte transports to the device and the `serialport` backed implementation

use std::fmt;
use std::io::{self, Read, Write};
use std::ops::{Deref, DerefMut};
use std::time::Duration;

use log::{debug, error, trace};
use serialport::{DataBits, FlowControl, Parity, StopBits};

use crate::port::{PortDescriptor, PortEnumerator};
use crate::Error;

/// Read timeout for the underlying port. Reads are only issued once data is known to be
/// buffered, so this only matters if the device disappears mid-read.
const READ_TIMEOUT: Duration = Duration::from_millis(500);

/// An open, byte-oriented duplex connection to a device.
pub trait Transport {
    /// Writes every byte in `bytes`.
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Blocks until all buffered output has been handed to the device.
    fn flush(&mut self) -> io::Result<()>;

    /// Returns the number of bytes that can be read without blocking.
    fn bytes_available(&mut self) -> io::Result<usize>;

    /// Reads buffered input into `buf`, returning how many bytes were read. This may be fewer
    /// than `bytes_available` reported.
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Releases the connection.
    fn close(&mut self) -> io::Result<()>;
}

/// Opens transports to devices.
pub trait Connect {
    type Transport: Transport;

    /// Opens `device` at `baud_rate` with 8 data bits, no parity and one stop bit.
    fn open(&self, device: &str, baud_rate: u32) -> io::Result<Self::Transport>;
}

/// Writes `bytes` to `transport` and flushes it.
pub fn send_payload<T: Transport + ?Sized>(transport: &mut T, bytes: &[u8]) -> Result<(), Error> {
    trace!("Writing {} bytes", bytes.len());

    transport.write_all(bytes).map_err(Error::WriteError)?;
    transport.flush().map_err(Error::WriteError)?;

    debug!("Wrote and flushed {} bytes", bytes.len());

    Ok(())
}

/// Owns an open transport and guarantees that it is closed exactly once.
///
/// Call `close` to observe the result of closing. If the guard is dropped without it, e.g. while
/// unwinding, the transport is closed on drop and any error is logged.
pub struct TransportGuard<T: Transport> {
    transport: T,
    closed: bool,
}

impl<T: Transport> TransportGuard<T> {
    pub fn new(transport: T) -> TransportGuard<T> {
        TransportGuard {
            transport,
            closed: false,
        }
    }

    /// Closes the transport and consumes the guard.
    pub fn close(mut self) -> Result<(), Error> {
        self.closed = true;
        self.transport.close().map_err(Error::CloseError)
    }
}

impl<T: Transport> Deref for TransportGuard<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.transport
    }
}

impl<T: Transport> DerefMut for TransportGuard<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.transport
    }
}

impl<T: Transport> Drop for TransportGuard<T> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }

        self.closed = true;

        if let Err(err) = self.transport.close() {
            error!("Error when closing serial port: {}", err);
        }
    }
}

/// Serial connection with an open serial port.
pub struct SerialTransport {
    inner_port: Option<Box<dyn serialport::SerialPort>>,
}

impl fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let port = self.inner_port.as_ref();

        f.debug_struct("SerialTransport")
            .field("name", &port.and_then(|port| port.name()))
            .field("baud_rate", &port.and_then(|port| port.baud_rate().ok()))
            .finish()
    }
}

impl SerialTransport {
    /// Opens the given `device` as a `SerialTransport` with the given `baud_rate`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use arduino_csv::SerialTransport;
    ///
    /// let port = SerialTransport::open("/dev/ttyACM0", 115_200)?;
    ///
    /// # Ok::<(), std::io::Error>(())
    /// ```
    pub fn open(device: &str, baud_rate: u32) -> io::Result<SerialTransport> {
        debug!("Opening serial port {:?} at {} baud", device, baud_rate);

        let port = serialport::new(device, baud_rate)
            .data_bits(DataBits::Eight)
            .flow_control(FlowControl::None)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(READ_TIMEOUT)
            .open()?;

        Ok(SerialTransport {
            inner_port: Some(port),
        })
    }

    fn port(&mut self) -> io::Result<&mut Box<dyn serialport::SerialPort>> {
        self.inner_port
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "serial port is closed"))
    }
}

impl Transport for SerialTransport {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.port()?.write_all(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port()?.flush()
    }

    fn bytes_available(&mut self) -> io::Result<usize> {
        Ok(self.port()?.bytes_to_read()? as usize)
    }

    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port()?.read(buf)
    }

    fn close(&mut self) -> io::Result<()> {
        // The file descriptor is released when the port is dropped
        if self.inner_port.take().is_some() {
            debug!("Closed serial port");
        }

        Ok(())
    }
}

/// The operating system's serial ports.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSerial;

impl PortEnumerator for SystemSerial {
    fn available_ports(&self) -> Result<Vec<PortDescriptor>, Error> {
        let ports = serialport::available_ports()
            .map_err(|err| Error::EnumerationError(err.into()))?;

        Ok(ports.into_iter().map(PortDescriptor::from).collect())
    }
}

impl Connect for SystemSerial {
    type Transport = SerialTransport;

    fn open(&self, device: &str, baud_rate: u32) -> io::Result<SerialTransport> {
        SerialTransport::open(device, baud_rate)
    }
}
