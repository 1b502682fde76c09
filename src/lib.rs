//! Send a CSV file to an Arduino-class board over serial and collect its response.
//!
//! The board is found by matching a substring against the serial ports the operating system
//! reports. The payload is written verbatim, after which the response is read until the board
//! sends `"end"` or, optionally, a timeout elapses.

pub mod console;
mod error;
pub mod port;
pub mod session;
pub mod transport;

#[cfg(test)]
mod testing;

pub use error::Error;

pub use console::{select_port, Console, StdConsole};
pub use port::{discover_candidates, PortDescriptor, PortEnumerator};
pub use session::{
    load_payload, Clock, DecodeMode, EndReason, Outcome, Session, SessionConfig, State,
    SystemClock,
};
pub use transport::{send_payload, Connect, SerialTransport, SystemSerial, Transport, TransportGuard};

pub use serialport;
