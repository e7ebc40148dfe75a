use crate::cmd::link::{board_ref, connect};
use crate::cmd::StatusArgs;
use crate::exit::{session_error, CliResult, SUCCESS};
use crate::output::{print_status, OutputFormat};

pub fn run(args: StatusArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.link.board_config()?;
    let board = board_ref(&config);
    let session = connect(config)?;

    let status = session
        .read_status()
        .map_err(|err| session_error("read status", err))?;
    print_status(&board, "status", &status, format);
    Ok(SUCCESS)
}
