//! User interaction: progress output and interactive port selection

use std::io::{self, BufRead, Write};

use log::{debug, warn};

use crate::port::PortDescriptor;
use crate::Error;

/// Line-oriented access to the user.
pub trait Console {
    /// Prints a single line of output.
    fn print_line(&mut self, line: &str) -> io::Result<()>;

    /// Shows `prompt` and reads one line of input, returning `None` at end of input.
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>>;
}

/// Console backed by the process' stdin and stdout.
#[derive(Debug, Default)]
pub struct StdConsole;

impl StdConsole {
    pub fn new() -> StdConsole {
        StdConsole
    }
}

impl Console for StdConsole {
    fn print_line(&mut self, line: &str) -> io::Result<()> {
        let stdout = io::stdout();
        let mut stdout = stdout.lock();

        writeln!(stdout, "{}", line)
    }

    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        {
            let stdout = io::stdout();
            let mut stdout = stdout.lock();

            write!(stdout, "{}", prompt)?;
            stdout.flush()?;
        }

        let mut input = String::new();
        let stdin = io::stdin();

        if stdin.lock().read_line(&mut input)? == 0 {
            return Ok(None);
        }

        Ok(Some(input))
    }
}

fn print_line<C: Console>(console: &mut C, line: &str) -> Result<(), Error> {
    console.print_line(line).map_err(Error::ConsoleError)
}

/// Parses a 1-indexed `input` selection for a list of `count` entries and returns the 0-based
/// index on success.
pub fn parse_selection(input: &str, count: usize) -> Result<usize, Error> {
    let invalid = || Error::InvalidSelection {
        input: input.trim().to_owned(),
        count,
    };

    let selection: usize = input.trim().parse().map_err(|_| invalid())?;

    if selection == 0 || selection > count {
        return Err(invalid());
    }

    Ok(selection - 1)
}

/// Picks exactly one port out of `candidates`.
///
/// A single candidate is returned without asking. With several candidates the user is asked
/// for a number up to `max_attempts` times before giving up with `Error::InvalidSelection`.
pub fn select_port<C: Console>(
    mut candidates: Vec<PortDescriptor>,
    substring: &str,
    console: &mut C,
    max_attempts: usize,
) -> Result<PortDescriptor, Error> {
    match candidates.len() {
        0 => Err(Error::DeviceNotFound(substring.to_owned())),
        1 => {
            let port = candidates.remove(0);

            print_line(console, "A single matching port was found and will be used")?;
            print_line(console, &port.to_string())?;

            Ok(port)
        }
        count => {
            print_line(console, "Multiple matching ports were found:")?;

            for (i, port) in candidates.iter().enumerate() {
                print_line(console, &format!("  {}. {}", i + 1, port.details()))?;
            }

            let mut last_error = None;

            for attempt in 1..=max_attempts.max(1) {
                let input = match console
                    .read_line("\nSelect the port to use\n> ")
                    .map_err(Error::ConsoleError)?
                {
                    Some(input) => input,
                    None => {
                        return Err(Error::InvalidSelection {
                            input: String::new(),
                            count,
                        })
                    }
                };

                match parse_selection(&input, count) {
                    Ok(index) => {
                        debug!("Selected port {} of {}", index + 1, count);

                        return Ok(candidates.swap_remove(index));
                    }
                    Err(err) => {
                        warn!("Selection attempt {} failed: {}", attempt, err);
                        print_line(console, &err.to_string())?;

                        last_error = Some(err);
                    }
                }
            }

            Err(last_error.unwrap_or(Error::InvalidSelection {
                input: String::new(),
                count,
            }))
        }
    }
}
