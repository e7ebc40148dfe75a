use relaylink_session::BoardSimulator;
use relaylink_transport::{open, SerialPortConfig};

use crate::cmd::link::parse_duration;
use crate::cmd::{install_ctrlc_handler, SimulateArgs};
use crate::exit::{session_error, transport_error, CliResult, SUCCESS};
use crate::output::{print_status, BoardRef, OutputFormat};

pub fn run(args: SimulateArgs, format: OutputFormat) -> CliResult<i32> {
    let mut simulator = BoardSimulator::new(args.address, args.circuits)
        .map_err(|err| session_error("invalid board", err))?;
    if let Some(delay) = &args.reply_delay {
        simulator = simulator.with_reply_delay(parse_duration(delay)?);
    }

    let stream = open(&SerialPortConfig {
        baud_rate: args.baud,
        ..SerialPortConfig::new(&args.port)
    })
    .map_err(|err| transport_error(&format!("open {}", args.port), err))?;

    let running = install_ctrlc_handler()?;
    simulator
        .serve_while(stream, &running)
        .map_err(|err| session_error("simulate", err))?;

    let board = BoardRef {
        port: args.port,
        address: args.address,
        circuits: args.circuits,
    };
    print_status(&board, "simulate", &simulator.state(), format);
    Ok(SUCCESS)
}
