use std::path::PathBuf;
use std::time::Duration;

use arduino_csv::{DecodeMode, SessionConfig};
use structopt::StructOpt;

fn parse_positive_u32(src: &str) -> Result<u32, String> {
    match src.parse::<u32>() {
        Ok(0) => Err("must be greater than zero".to_owned()),
        Ok(value) => Ok(value),
        Err(err) => Err(err.to_string()),
    }
}

fn parse_positive_u64(src: &str) -> Result<u64, String> {
    match src.parse::<u64>() {
        Ok(0) => Err("must be greater than zero".to_owned()),
        Ok(value) => Ok(value),
        Err(err) => Err(err.to_string()),
    }
}

fn parse_sentinel(src: &str) -> Result<String, String> {
    if src.is_empty() {
        return Err("must not be empty".to_owned());
    }

    Ok(src.to_owned())
}

/// Sends a CSV file to an Arduino over serial, then prints the response until the board sends
/// "end".
///
/// Use `--all-ports` to see which substring identifies your board.
#[derive(StructOpt, Debug)]
#[structopt(name = "arduino-csv")]
pub struct Opts {
    /// CSV file to send through serial
    #[structopt(long = "csv", parse(from_os_str))]
    pub csv: PathBuf,

    /// The serial baud rate to use. This must match "Serial.begin(<BAUD>);" in the Arduino code
    #[structopt(
        env = "BAUD_RATE",
        short = "b",
        long = "baudrate",
        default_value = "115200",
        parse(try_from_str = parse_positive_u32)
    )]
    pub baud_rate: u32,

    /// String to match in the USB device description, used to find the Arduino/ESP port
    #[structopt(short = "s", long = "substring", default_value = "arduino")]
    pub substring: String,

    /// How many seconds to wait for a response before exiting
    #[structopt(
        short = "t",
        long = "timeout",
        default_value = "3",
        parse(try_from_str = parse_positive_u64)
    )]
    pub timeout: u64,

    /// Wait for the end marker forever instead of timing out
    #[structopt(long = "no-timeout")]
    pub no_timeout: bool,

    /// Fail on received data that isn't valid UTF-8 instead of replacing it
    #[structopt(long = "strict-utf8")]
    pub strict_utf8: bool,

    /// The marker that ends the response
    #[structopt(
        long = "sentinel",
        default_value = "end",
        parse(try_from_str = parse_sentinel)
    )]
    pub sentinel: String,

    /// The serial device to connect to, skipping port discovery
    #[structopt(env = "SERIAL_PORT", short = "p", long = "port")]
    pub serial_port: Option<String>,

    /// Print every serial port found before matching
    #[structopt(long = "all-ports")]
    pub all_ports: bool,
}

impl Opts {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            baud_rate: self.baud_rate,
            substring: self.substring.clone(),
            timeout: if self.no_timeout {
                None
            } else {
                Some(Duration::from_secs(self.timeout))
            },
            decode_mode: if self.strict_utf8 {
                DecodeMode::Strict
            } else {
                DecodeMode::Lossy
            },
            sentinel: self.sentinel.clone(),
            device: self.serial_port.clone(),
            show_all_ports: self.all_ports,
            ..SessionConfig::default()
        }
    }
}
