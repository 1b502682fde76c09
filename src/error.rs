use std::io;
use std::path::PathBuf;
use std::str::Utf8Error;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("No serial port matching {:?} was found", _0)]
    DeviceNotFound(String),
    #[error("Invalid port selection {:?} - expected a number between 1 and {}", input, count)]
    InvalidSelection { input: String, count: usize },
    #[error("Error when opening serial port {}: {}", _0, _1)]
    PortOpenError(String, #[source] io::Error),
    #[error("Error when writing to serial port: {}", _0)]
    WriteError(#[source] io::Error),
    #[error("Error when reading from serial port: {}", _0)]
    ReadError(#[source] io::Error),
    #[error("Received data is not valid UTF-8: {}", _0)]
    DecodeError(#[from] Utf8Error),
    #[error("Error when closing serial port: {}", _0)]
    CloseError(#[source] io::Error),
    #[error("Could not enumerate serial ports: {}", _0)]
    EnumerationError(#[source] io::Error),
    #[error("Console I/O error: {}", _0)]
    ConsoleError(#[source] io::Error),
    #[error("Could not read payload file {}: {}", path.display(), source)]
    PayloadError { path: PathBuf, source: io::Error },
    #[error("A session can only be run once")]
    SessionReused,
}
