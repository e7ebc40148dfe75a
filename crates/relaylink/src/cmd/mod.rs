use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Args, Subcommand};

use crate::exit::{CliError, CliResult, INTERNAL};
use crate::output::OutputFormat;

pub mod circuit;
pub mod link;
pub mod ports;
pub mod run;
pub mod simulate;
pub mod status;
pub mod version;
pub mod watch;

pub use link::LinkArgs;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Read the state of every circuit.
    Status(StatusArgs),
    /// Energize one circuit.
    Open(CircuitArgs),
    /// Release one circuit.
    Close(CircuitArgs),
    /// Toggle one circuit.
    Flip(CircuitArgs),
    /// Energize every circuit.
    OpenAll(AllArgs),
    /// Release every circuit.
    CloseAll(AllArgs),
    /// Set every circuit from a bit string, highest circuit first.
    Run(RunArgs),
    /// Poll the board and print circuit changes until interrupted.
    Watch(WatchArgs),
    /// List serial ports.
    Ports,
    /// Act as a relay board on a serial port.
    Simulate(SimulateArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Status(args) => status::run(args, format),
        Command::Open(args) => circuit::run(circuit::Action::Open, args, format),
        Command::Close(args) => circuit::run(circuit::Action::Close, args, format),
        Command::Flip(args) => circuit::run(circuit::Action::Flip, args, format),
        Command::OpenAll(args) => run::all(true, args, format),
        Command::CloseAll(args) => run::all(false, args, format),
        Command::Run(args) => run::run(args, format),
        Command::Watch(args) => watch::run(args, format),
        Command::Ports => ports::run(format),
        Command::Simulate(args) => simulate::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub link: LinkArgs,
}

#[derive(Args, Debug)]
pub struct CircuitArgs {
    /// Circuit number, starting at 1.
    pub circuit: u8,
    /// Send the no-reply variant and return right after writing.
    #[arg(long)]
    pub no_reply: bool,
    #[command(flatten)]
    pub link: LinkArgs,
}

#[derive(Args, Debug)]
pub struct AllArgs {
    /// Send the no-reply variant and return right after writing.
    #[arg(long)]
    pub no_reply: bool,
    #[command(flatten)]
    pub link: LinkArgs,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// One `0`/`1` per circuit, highest circuit first (`_` separators allowed).
    pub bits: String,
    /// Send the no-reply variant and return right after writing.
    #[arg(long)]
    pub no_reply: bool,
    #[command(flatten)]
    pub link: LinkArgs,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Poll interval (e.g. 1s, 250ms).
    #[arg(long, default_value = "1s")]
    pub interval: String,
    #[command(flatten)]
    pub link: LinkArgs,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Serial port to serve on.
    pub port: String,
    /// Line speed.
    #[arg(long, default_value_t = relaylink_transport::DEFAULT_BAUD_RATE)]
    pub baud: u32,
    /// Board address to answer to.
    #[arg(long, default_value_t = 1)]
    pub address: u8,
    /// Number of circuits on the simulated board.
    #[arg(long, default_value_t = 8)]
    pub circuits: u8,
    /// Delay before each reply (e.g. 50ms).
    #[arg(long)]
    pub reply_delay: Option<String>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Flag flipped to false on Ctrl-C.
pub(crate) fn install_ctrlc_handler() -> CliResult<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        flag.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))?;
    Ok(running)
}
