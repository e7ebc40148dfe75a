use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use relaylink_session::{BoardConfig, Session};

use crate::exit::{session_error, CliError, CliResult};
use crate::output::BoardRef;

/// How to reach the board. Flags override values from `--config`.
#[derive(Args, Debug, Clone, Default)]
pub struct LinkArgs {
    /// Board config file (JSON).
    #[arg(long, value_name = "FILE", env = "RELAYLINK_CONFIG")]
    pub config: Option<PathBuf>,
    /// Serial port, e.g. /dev/ttyUSB0 or COM3.
    #[arg(long, short = 'p', env = "RELAYLINK_PORT")]
    pub port: Option<String>,
    /// Line speed.
    #[arg(long)]
    pub baud: Option<u32>,
    /// Board address (1-255).
    #[arg(long, short = 'a')]
    pub address: Option<u8>,
    /// Number of circuits on the board (8, 16, 24 or 32).
    #[arg(long, short = 'n')]
    pub circuits: Option<u8>,
    /// Serial read timeout (e.g. 200ms).
    #[arg(long, value_name = "DURATION")]
    pub read_timeout: Option<String>,
    /// How long to wait for each reply (e.g. 1s, 500ms).
    #[arg(long, value_name = "DURATION")]
    pub reply_timeout: Option<String>,
}

impl LinkArgs {
    /// Resolve the effective board configuration without touching the port.
    pub fn board_config(&self) -> CliResult<BoardConfig> {
        let mut config = match &self.config {
            Some(path) => BoardConfig::from_json_file(path)
                .map_err(|err| session_error("load config", err))?,
            None => BoardConfig::default(),
        };

        if let Some(port) = &self.port {
            config.port = port.clone();
        }
        if let Some(baud) = self.baud {
            config.baud_rate = baud;
        }
        if let Some(address) = self.address {
            config.address = address;
        }
        if let Some(circuits) = self.circuits {
            config.circuit_count = circuits;
        }
        if let Some(timeout) = &self.read_timeout {
            config.read_timeout = parse_duration(timeout)?;
        }
        if let Some(timeout) = &self.reply_timeout {
            config.reply_timeout = parse_duration(timeout)?;
        }

        config
            .validate()
            .map_err(|err| session_error("invalid board config", err))?;
        Ok(config)
    }
}

pub fn connect(config: BoardConfig) -> CliResult<Session> {
    let port = config.port.clone();
    Session::connect(config).map_err(|err| session_error(&format!("connect {port}"), err))
}

pub fn board_ref(config: &BoardConfig) -> BoardRef {
    BoardRef {
        port: config.port.clone(),
        address: config.address,
        circuits: config.circuit_count,
    }
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::usage("duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .trim()
        .parse()
        .map_err(|_| CliError::usage(format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::usage("duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

#[cfg(test)]
mod tests {
    use crate::exit::USAGE;

    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn flags_override_defaults() {
        let args = LinkArgs {
            port: Some("/dev/ttyS1".to_string()),
            address: Some(7),
            circuits: Some(24),
            reply_timeout: Some("250ms".to_string()),
            ..LinkArgs::default()
        };
        let config = args.board_config().expect("config should resolve");
        assert_eq!(config.port, "/dev/ttyS1");
        assert_eq!(config.address, 7);
        assert_eq!(config.circuit_count, 24);
        assert_eq!(config.reply_timeout, Duration::from_millis(250));
        assert_eq!(config.baud_rate, 9600);
    }

    #[test]
    fn invalid_board_is_a_usage_error() {
        let args = LinkArgs {
            circuits: Some(12),
            ..LinkArgs::default()
        };
        assert_eq!(args.board_config().unwrap_err().code, USAGE);

        let args = LinkArgs {
            address: Some(0),
            ..LinkArgs::default()
        };
        assert_eq!(args.board_config().unwrap_err().code, USAGE);
    }

    #[test]
    fn config_file_is_loaded_then_overridden() {
        let path = std::env::temp_dir().join(format!(
            "relaylink-link-{}-{}.json",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::write(&path, r#"{ "port": "/dev/ttyACM0", "address": 3, "circuit_count": 16 }"#)
            .expect("config should be writable");

        let args = LinkArgs {
            config: Some(path.clone()),
            address: Some(4),
            ..LinkArgs::default()
        };
        let config = args.board_config().expect("config should resolve");
        assert_eq!(config.port, "/dev/ttyACM0");
        assert_eq!(config.address, 4);
        assert_eq!(config.circuit_count, 16);

        let _ = std::fs::remove_file(&path);
    }
}
