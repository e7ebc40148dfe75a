mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "relaylink", version, about = "Drive addressable serial relay boards")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        default_value = "warn",
        env = "RELAYLINK_LOG_LEVEL",
        global = true
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_open_with_link_flags() {
        let cli = Cli::try_parse_from([
            "relaylink",
            "open",
            "3",
            "--port",
            "/dev/ttyUSB1",
            "--address",
            "2",
            "--circuits",
            "16",
            "--no-reply",
        ])
        .expect("open args should parse");

        match cli.command {
            Command::Open(args) => {
                assert_eq!(args.circuit, 3);
                assert!(args.no_reply);
                assert_eq!(args.link.port.as_deref(), Some("/dev/ttyUSB1"));
                assert_eq!(args.link.address, Some(2));
                assert_eq!(args.link.circuits, Some(16));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_format_after_subcommand() {
        let cli = Cli::try_parse_from(["relaylink", "status", "--format", "json"])
            .expect("status args should parse");
        assert_eq!(cli.format, Some(OutputFormat::Json));
        assert!(matches!(cli.command, Command::Status(_)));
    }

    #[test]
    fn rejects_out_of_range_circuit_number() {
        let err = Cli::try_parse_from(["relaylink", "flip", "300"])
            .expect_err("circuit above 255 should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn parses_run_and_watch() {
        let cli = Cli::try_parse_from(["relaylink", "run", "1000_0001", "--reply-timeout", "2s"])
            .expect("run args should parse");
        assert!(matches!(cli.command, Command::Run(_)));

        let cli = Cli::try_parse_from(["relaylink", "watch", "--interval", "250ms"])
            .expect("watch args should parse");
        match cli.command {
            Command::Watch(args) => assert_eq!(args.interval, "250ms"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn simulate_requires_port() {
        let err = Cli::try_parse_from(["relaylink", "simulate"])
            .expect_err("simulate without port should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }
}
