use relaylink_frame::check_circuit;

use crate::cmd::link::{board_ref, connect};
use crate::cmd::CircuitArgs;
use crate::exit::{frame_error, session_error, CliResult, SUCCESS};
use crate::output::{print_circuit, OutputFormat};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Action {
    Open,
    Close,
    Flip,
}

impl Action {
    fn name(self) -> &'static str {
        match self {
            Action::Open => "open",
            Action::Close => "close",
            Action::Flip => "flip",
        }
    }
}

pub fn run(action: Action, args: CircuitArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.link.board_config()?;
    check_circuit(args.circuit, config.circuit_count)
        .map_err(|err| frame_error(action.name(), err))?;

    let board = board_ref(&config);
    let session = connect(config)?;
    let circuit = args.circuit;

    let result = if args.no_reply {
        let sent = match action {
            Action::Open => session.open_one_no_return(circuit),
            Action::Close => session.close_one_no_return(circuit),
            Action::Flip => session.flip_one_no_return(circuit),
        };
        sent.map(|()| None)
    } else {
        let state = match action {
            Action::Open => session.open_one(circuit),
            // close_one reports whether the circuit was released.
            Action::Close => session.close_one(circuit).map(|released| !released),
            Action::Flip => session.flip_one(circuit),
        };
        state.map(Some)
    };
    let open = result.map_err(|err| session_error(action.name(), err))?;

    print_circuit(&board, action.name(), circuit, open, format);
    Ok(SUCCESS)
}
