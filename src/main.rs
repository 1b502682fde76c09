use anyhow::Context;
use log::debug;
use structopt::StructOpt;

use arduino_csv::{EndReason, Session, StdConsole, SystemClock, SystemSerial};

mod cli;

fn main() -> Result<(), anyhow::Error> {
    // Create a logger with a timestamp, filtered through RUST_LOG
    pretty_env_logger::init_timed();

    // Parse the command-line arguments
    let opts = cli::Opts::from_args();
    let config = opts.session_config();

    debug!("Using {:?}", config);

    println!("Reading CSV file {}", opts.csv.display());

    let payload = arduino_csv::load_payload(&opts.csv)
        .with_context(|| format!("Failed to read CSV file '{}'", opts.csv.display()))?;

    let mut session = Session::new(config, SystemClock, StdConsole::new());
    let outcome = session
        .run(&SystemSerial, &payload)
        .with_context(|| "Failed to transfer CSV file")?;

    match outcome.reason {
        EndReason::SentinelMatched => {
            println!("Received {} bytes", outcome.data.len());
        }
        EndReason::TimedOut => {
            println!(
                "Timed out waiting for {:?} after receiving {} bytes",
                session.config().sentinel,
                outcome.data.len()
            );
        }
    }

    Ok(())
}
