use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use relaylink_session::{CircuitStatus, Session, SessionError};
use tracing::{info, warn};

use crate::cmd::link::{board_ref, connect, parse_duration};
use crate::cmd::{install_ctrlc_handler, WatchArgs};
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{print_changes, print_status, BoardRef, OutputFormat};

const SLEEP_STEP: Duration = Duration::from_millis(50);

pub fn run(args: WatchArgs, format: OutputFormat) -> CliResult<i32> {
    let interval = parse_duration(&args.interval)?;
    let config = args.link.board_config()?;
    let board = board_ref(&config);
    let session = connect(config)?;
    let running = install_ctrlc_handler()?;

    watch(&session, &board, interval, &running, format)?;
    Ok(SUCCESS)
}

fn watch(
    session: &Session,
    board: &BoardRef,
    interval: Duration,
    running: &AtomicBool,
    format: OutputFormat,
) -> CliResult<()> {
    let mut last: Option<CircuitStatus> = None;

    while running.load(Ordering::SeqCst) {
        let started = Instant::now();
        match session.read_status() {
            Ok(status) => {
                match &last {
                    Some(previous) => print_changes(board, previous, &status, format),
                    None => print_status(board, "watch", &status, format),
                }
                last = Some(status);
            }
            // The link recovers on its own; keep polling.
            Err(err @ (SessionError::Timeout(_) | SessionError::NotConnected)) => {
                warn!(error = %err, "status poll failed");
            }
            Err(err) => return Err(session_error("watch", err)),
        }
        sleep_while(running, interval.saturating_sub(started.elapsed()));
    }

    info!("watch stopped");
    Ok(())
}

fn sleep_while(running: &AtomicBool, total: Duration) {
    let deadline = Instant::now() + total;
    while running.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep(SLEEP_STEP.min(deadline - now));
    }
}
