use relaylink_frame::FrameError;

use crate::cmd::link::{board_ref, connect};
use crate::cmd::{AllArgs, RunArgs};
use crate::exit::{frame_error, session_error, CliError, CliResult, SUCCESS};
use crate::output::{print_sent, print_status, OutputFormat};

/// `open-all` / `close-all`.
pub fn all(open: bool, args: AllArgs, format: OutputFormat) -> CliResult<i32> {
    let command = if open { "open-all" } else { "close-all" };
    let config = args.link.board_config()?;
    let board = board_ref(&config);
    let session = connect(config)?;

    if args.no_reply {
        let sent = if open {
            session.open_all_no_return()
        } else {
            session.close_all_no_return()
        };
        sent.map_err(|err| session_error(command, err))?;
        print_sent(&board, command, format);
        return Ok(SUCCESS);
    }

    let status = if open {
        session.open_all()
    } else {
        session.close_all()
    }
    .map_err(|err| session_error(command, err))?;
    print_status(&board, command, &status, format);
    Ok(SUCCESS)
}

/// `run <bits>`.
pub fn run(args: RunArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.link.board_config()?;
    let values = parse_wire_bits(&args.bits)?;
    if values.len() != usize::from(config.circuit_count) {
        return Err(frame_error(
            "run",
            FrameError::LengthMismatch {
                expected: usize::from(config.circuit_count),
                actual: values.len(),
            },
        ));
    }

    let board = board_ref(&config);
    let session = connect(config)?;

    if args.no_reply {
        session
            .run_bitmask_no_return(&values)
            .map_err(|err| session_error("run", err))?;
        print_sent(&board, "run", format);
        return Ok(SUCCESS);
    }

    let status = session
        .run_bitmask(&values)
        .map_err(|err| session_error("run", err))?;
    print_status(&board, "run", &status, format);
    Ok(SUCCESS)
}

/// Parse a `0`/`1` string in wire order. `_` and spaces are ignored.
pub fn parse_wire_bits(input: &str) -> CliResult<Vec<bool>> {
    input
        .chars()
        .filter(|c| *c != '_' && !c.is_whitespace())
        .map(|c| match c {
            '0' => Ok(false),
            '1' => Ok(true),
            other => Err(CliError::usage(format!(
                "invalid circuit bit '{other}' in {input:?}; expected 0 or 1"
            ))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit::USAGE;

    #[test]
    fn parses_bits_with_separators() {
        let bits = parse_wire_bits("1000_0001").unwrap();
        assert_eq!(bits.len(), 8);
        assert!(bits[0]);
        assert!(bits[7]);
        assert!(!bits[3]);
    }

    #[test]
    fn rejects_other_characters() {
        let err = parse_wire_bits("10x1").unwrap_err();
        assert_eq!(err.code, USAGE);
    }
}
