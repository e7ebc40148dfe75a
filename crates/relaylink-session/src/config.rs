use std::path::Path;
use std::time::Duration;

use relaylink_frame::{validate_circuit_count, FrameConfig, FrameError};
use relaylink_transport::{SerialPortConfig, DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionError};

/// Default bound on waiting for a reply.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(1);

#[cfg(windows)]
const DEFAULT_PORT: &str = "COM1";
#[cfg(not(windows))]
const DEFAULT_PORT: &str = "/dev/ttyUSB0";

/// Everything needed to open a session with one board.
///
/// Fixed for the lifetime of the session. Loadable from JSON; missing
/// fields take their defaults and timeouts are given in milliseconds:
///
/// ```json
/// { "port": "/dev/ttyUSB0", "address": 1, "circuit_count": 16, "reply_timeout_ms": 500 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BoardConfig {
    /// Serial port name.
    pub port: String,
    /// Line speed.
    pub baud_rate: u32,
    /// Board address, 1-255.
    pub address: u8,
    /// Number of circuits: 8, 16, 24 or 32.
    pub circuit_count: u8,
    /// Upper bound on one blocking transport read.
    #[serde(rename = "read_timeout_ms", with = "millis")]
    pub read_timeout: Duration,
    /// Upper bound on waiting for a command's reply.
    #[serde(rename = "reply_timeout_ms", with = "millis")]
    pub reply_timeout: Duration,
    /// Drop inbound frames whose header byte is not 0x22.
    pub enforce_header: bool,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            address: 1,
            circuit_count: 8,
            read_timeout: DEFAULT_READ_TIMEOUT,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            enforce_header: false,
        }
    }
}

impl BoardConfig {
    /// Config for a board on `port` with default timings.
    pub fn new(port: impl Into<String>, address: u8, circuit_count: u8) -> Self {
        Self {
            port: port.into(),
            address,
            circuit_count,
            ..Self::default()
        }
    }

    /// Load a config from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SessionError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Parse a config from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check address, circuit count and timings.
    pub fn validate(&self) -> Result<()> {
        if self.address == 0 {
            return Err(FrameError::InvalidAddress.into());
        }
        validate_circuit_count(self.circuit_count)?;
        if self.read_timeout.is_zero() {
            return Err(SessionError::Config(
                "read timeout must be greater than zero".to_string(),
            ));
        }
        if self.reply_timeout.is_zero() {
            return Err(SessionError::Config(
                "reply timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Transport settings for [`relaylink_transport::open`].
    pub fn serial_config(&self) -> SerialPortConfig {
        SerialPortConfig {
            port_name: self.port.clone(),
            baud_rate: self.baud_rate,
            read_timeout: self.read_timeout,
        }
    }

    /// Reassembler settings.
    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            read_timeout: Some(self.read_timeout),
            enforce_header: self.enforce_header,
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = BoardConfig::default();
        config.validate().unwrap();
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.reply_timeout, Duration::from_secs(1));
    }

    #[test]
    fn parses_partial_json() {
        let config = BoardConfig::from_json_str(
            r#"{ "port": "/dev/ttyS3", "address": 4, "circuit_count": 24, "reply_timeout_ms": 250 }"#,
        )
        .unwrap();

        assert_eq!(config.port, "/dev/ttyS3");
        assert_eq!(config.address, 4);
        assert_eq!(config.circuit_count, 24);
        assert_eq!(config.reply_timeout, Duration::from_millis(250));
        assert_eq!(config.read_timeout, DEFAULT_READ_TIMEOUT);
    }

    #[test]
    fn rejects_unknown_fields() {
        let err = BoardConfig::from_json_str(r#"{ "circuits": 8 }"#).unwrap_err();
        assert!(matches!(err, SessionError::Json(_)));
    }

    #[test]
    fn rejects_invalid_board() {
        let err = BoardConfig::from_json_str(r#"{ "address": 0 }"#).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Frame(FrameError::InvalidAddress)
        ));

        let err = BoardConfig::from_json_str(r#"{ "circuit_count": 12 }"#).unwrap_err();
        assert!(matches!(
            err,
            SessionError::Frame(FrameError::InvalidCircuitCount(12))
        ));

        let err = BoardConfig::from_json_str(r#"{ "reply_timeout_ms": 0 }"#).unwrap_err();
        assert!(matches!(err, SessionError::Config(_)));
    }

    #[test]
    fn json_roundtrip_keeps_millis() {
        let config = BoardConfig::new("COM7", 2, 32);
        let text = serde_json::to_string(&config).unwrap();
        assert!(text.contains("\"read_timeout_ms\":200"));
        assert_eq!(BoardConfig::from_json_str(&text).unwrap(), config);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = BoardConfig::from_json_file("/nonexistent/relaylink.json").unwrap_err();
        assert!(matches!(err, SessionError::ConfigRead { .. }));
    }

    #[test]
    fn derived_configs() {
        let config = BoardConfig::new("/dev/ttyUSB1", 3, 16);
        let serial = config.serial_config();
        assert_eq!(serial.port_name, "/dev/ttyUSB1");
        assert_eq!(serial.read_timeout, config.read_timeout);

        let frame = config.frame_config();
        assert_eq!(frame.read_timeout, Some(config.read_timeout));
        assert!(!frame.enforce_header);
    }
}
