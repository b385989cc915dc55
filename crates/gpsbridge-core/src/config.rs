//! Bridge configuration.
//!
//! The configuration is a camelCase JSON document. Every section has defaults
//! matching the reference BeagleBone deployment, so an empty object `{}` is a
//! valid configuration.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Errors that can occur while loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    ReadError(String),
    /// Configuration data could not be parsed.
    InvalidData(String),
    /// A value is out of range or inconsistent.
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(msg) => write!(f, "Read error: {}", msg),
            ConfigError::InvalidData(msg) => write!(f, "Invalid data: {}", msg),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Top-level bridge configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BridgeConfig {
    /// Serial GPS receiver.
    pub serial: SerialSettings,

    /// Pins muxed before the serial port is opened.
    pub pins: Vec<PinAssignment>,

    /// Program invoked as `<program> <pin> <mode>` for each pin.
    pub pin_program: String,

    /// HTTP(S) and WebSocket listener.
    pub server: ServerSettings,

    /// Periodic upload to the time-series endpoint.
    pub telemetry: TelemetrySettings,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            serial: SerialSettings::default(),
            pins: vec![
                PinAssignment::new("P9_11", "uart"),
                PinAssignment::new("P9_13", "uart"),
            ],
            pin_program: "config-pin".to_string(),
            server: ServerSettings::default(),
            telemetry: TelemetrySettings::default(),
        }
    }
}

impl BridgeConfig {
    /// Load and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&contents)
    }

    /// Parse and validate a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::InvalidData(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.serial.port.trim().is_empty() {
            return Err(ConfigError::InvalidValue("serial.port is empty".to_string()));
        }
        if self.serial.baud_rate == 0 {
            return Err(ConfigError::InvalidValue(
                "serial.baudRate must be positive".to_string(),
            ));
        }
        let tag = &self.serial.gga_tag;
        if tag.len() != 6 || !tag.starts_with('$') || !tag.ends_with("GGA") {
            return Err(ConfigError::InvalidValue(format!(
                "serial.ggaTag {:?} is not a GGA sentence tag",
                tag
            )));
        }
        if self.telemetry.interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "telemetry.intervalSecs must be positive".to_string(),
            ));
        }
        if self.telemetry.enabled && self.telemetry.endpoint.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "telemetry.endpoint is empty".to_string(),
            ));
        }
        if let Some(pin) = self.pins.iter().find(|p| p.pin.is_empty() || p.mode.is_empty()) {
            return Err(ConfigError::InvalidValue(format!(
                "incomplete pin assignment {:?}",
                pin
            )));
        }
        Ok(())
    }
}

/// Serial receiver settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SerialSettings {
    /// Device path.
    pub port: String,

    /// Line speed.
    pub baud_rate: u32,

    /// The only GGA sentence tag turned into locations.
    pub gga_tag: String,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: "/dev/ttyO4".to_string(),
            baud_rate: 9600,
            gga_tag: "$GNGGA".to_string(),
        }
    }
}

/// A header pin and the mode it must be switched to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinAssignment {
    pub pin: String,
    pub mode: String,
}

impl PinAssignment {
    pub fn new(pin: &str, mode: &str) -> Self {
        Self {
            pin: pin.to_string(),
            mode: mode.to_string(),
        }
    }
}

/// Listener settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Address for the HTTPS page and the WebSocket stream.
    pub bind_addr: SocketAddr,

    /// Directory with `index.html` and other static assets.
    pub public_dir: PathBuf,

    /// Certificate and key. Plain HTTP/WS when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsSettings>,

    /// Outbound queue depth per WebSocket subscriber.
    pub subscriber_queue: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3001)),
            public_dir: PathBuf::from("public"),
            tls: Some(TlsSettings::default()),
            subscriber_queue: 64,
        }
    }
}

/// PEM certificate and private key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TlsSettings {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

impl Default for TlsSettings {
    fn default() -> Self {
        Self {
            cert_path: PathBuf::from("certs/ca.crt"),
            key_path: PathBuf::from("certs/ca.key"),
        }
    }
}

/// Telemetry uploader settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TelemetrySettings {
    /// Run the uploader at all.
    pub enabled: bool,

    /// Update endpoint, queried with `api_key`, `field1` and `field2`.
    pub endpoint: String,

    /// Write API key. The uploader stays idle without one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Seconds between upload cycles.
    pub interval_secs: u64,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://api.thingspeak.com/update".to_string(),
            api_key: None,
            interval_secs: 15,
            timeout_secs: 10,
        }
    }
}
