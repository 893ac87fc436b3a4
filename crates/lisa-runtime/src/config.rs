//! Bridge configuration
//!
//! Layered with figment: struct defaults, then `lisa.toml`, then
//! `LISA_*` environment variables. A double underscore nests:
//!
//! ```text
//! lisa.toml:   [room]
//!              room_name = "demo"
//!
//! env var:     LISA_ROOM__ROOM_NAME=demo
//! ```

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use lisa_core::{LisaError, LisaResult};
use lisa_gesture::DEFAULT_MIN_INTERVAL_MS;
use lisa_transport::UdpTransportOptions;
use serde::{Deserialize, Serialize};

use crate::SessionSettings;

/// Config file read when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "lisa.toml";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub room: RoomConfig,
    #[serde(default)]
    pub gesture: GestureConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[room]`: where to get a token and what to join
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Token server root; `/token` is appended
    #[serde(default = "default_token_url")]
    pub token_url: String,
    /// Room URL handed to the transport
    #[serde(default = "default_server_url")]
    pub server_url: String,
    #[serde(default = "default_room_name")]
    pub room_name: String,
    #[serde(default = "default_participant_name")]
    pub participant_name: String,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            token_url: default_token_url(),
            server_url: default_server_url(),
            room_name: default_room_name(),
            participant_name: default_participant_name(),
        }
    }
}

/// `[gesture]`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GestureConfig {
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: i64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: default_min_interval_ms(),
        }
    }
}

/// `[transport]`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    #[serde(default = "default_join_timeout_ms")]
    pub join_timeout_ms: u64,
    #[serde(default = "default_token_timeout_ms")]
    pub token_timeout_ms: u64,
    /// Wait for one data ack before resending
    #[serde(default = "default_ack_timeout_ms")]
    pub ack_timeout_ms: u64,
    #[serde(default = "default_send_attempts")]
    pub send_attempts: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            join_timeout_ms: default_join_timeout_ms(),
            token_timeout_ms: default_token_timeout_ms(),
            ack_timeout_ms: default_ack_timeout_ms(),
            send_attempts: default_send_attempts(),
        }
    }
}

/// `[logging]`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
    /// Filter directives used when `RUST_LOG` is unset
    #[serde(default)]
    pub filter: Option<String>,
}

fn default_token_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_server_url() -> String {
    SessionSettings::default().server_url
}

fn default_room_name() -> String {
    "lisa-room".to_string()
}

fn default_participant_name() -> String {
    "user".to_string()
}

fn default_min_interval_ms() -> i64 {
    DEFAULT_MIN_INTERVAL_MS
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 0))
}

fn default_ack_timeout_ms() -> u64 {
    250
}

fn default_send_attempts() -> u32 {
    3
}

fn default_join_timeout_ms() -> u64 {
    5_000
}

fn default_token_timeout_ms() -> u64 {
    10_000
}

/// Build a figment that layers: defaults → config file → LISA_* env vars.
///
/// A missing config file is not an error; the file layer is simply empty.
pub fn load_config(path: Option<&Path>) -> Figment {
    let file = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
    Figment::from(Serialized::defaults(BridgeConfig::default()))
        .merge(Toml::file(file))
        .merge(Env::prefixed("LISA_").split("__"))
}

impl BridgeConfig {
    pub fn load(path: Option<&Path>) -> LisaResult<Self> {
        let config: BridgeConfig = load_config(path)
            .extract()
            .map_err(|e| LisaError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> LisaResult<()> {
        if self.gesture.min_interval_ms < 0 {
            return Err(LisaError::Config(format!(
                "gesture.min_interval_ms must not be negative (got {})",
                self.gesture.min_interval_ms
            )));
        }
        if self.transport.send_attempts == 0 {
            return Err(LisaError::Config(
                "transport.send_attempts must be at least 1".into(),
            ));
        }
        if self.room.room_name.trim().is_empty() {
            return Err(LisaError::Config("room.room_name is empty".into()));
        }
        if self.room.participant_name.trim().is_empty() {
            return Err(LisaError::Config("room.participant_name is empty".into()));
        }
        Ok(())
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            server_url: self.room.server_url.clone(),
            room_name: self.room.room_name.clone(),
            participant_name: self.room.participant_name.clone(),
        }
    }

    pub fn udp_options(&self) -> UdpTransportOptions {
        UdpTransportOptions {
            room_name: self.room.room_name.clone(),
            participant_name: self.room.participant_name.clone(),
            join_timeout: Duration::from_millis(self.transport.join_timeout_ms),
            ack_timeout: Duration::from_millis(self.transport.ack_timeout_ms),
            send_attempts: self.transport.send_attempts,
        }
    }

    pub fn token_timeout(&self) -> Duration {
        Duration::from_millis(self.transport.token_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.room.token_url, "http://localhost:8000");
        assert_eq!(config.room.room_name, "lisa-room");
        assert_eq!(config.room.participant_name, "user");
        assert_eq!(config.gesture.min_interval_ms, 2000);
        assert_eq!(config.udp_options().join_timeout, Duration::from_secs(5));
        assert_eq!(config.udp_options().ack_timeout, Duration::from_millis(250));
        assert_eq!(config.udp_options().send_attempts, 3);
        assert!(!config.logging.json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        Jail::expect_with(|jail| {
            let path = jail.directory().join("absent.toml");
            let config = BridgeConfig::load(Some(path.as_path())).unwrap();
            assert_eq!(config, BridgeConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_file_then_env_layering() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "lisa.toml",
                r#"
                [room]
                room_name = "kitchen"
                participant_name = "ada"

                [gesture]
                min_interval_ms = 1500
                "#,
            )?;
            jail.set_env("LISA_ROOM__PARTICIPANT_NAME", "grace");
            jail.set_env("LISA_LOGGING__JSON", "true");

            let config = BridgeConfig::load(None).unwrap();
            assert_eq!(config.room.room_name, "kitchen");
            assert_eq!(config.room.participant_name, "grace");
            assert_eq!(config.room.token_url, "http://localhost:8000");
            assert_eq!(config.gesture.min_interval_ms, 1500);
            assert!(config.logging.json);

            let settings = config.session_settings();
            assert_eq!(settings.room_name, "kitchen");
            assert_eq!(settings.participant_name, "grace");
            Ok(())
        });
    }

    #[test]
    fn test_invalid_values_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("lisa.toml", "[gesture]\nmin_interval_ms = -5\n")?;
            assert!(matches!(
                BridgeConfig::load(None),
                Err(LisaError::Config(_))
            ));

            jail.create_file("lisa.toml", "[transport]\njoin_timeout_ms = \"soon\"\n")?;
            assert!(matches!(
                BridgeConfig::load(None),
                Err(LisaError::Config(_))
            ));

            jail.create_file("lisa.toml", "[transport]\nsend_attempts = 0\n")?;
            assert!(matches!(
                BridgeConfig::load(None),
                Err(LisaError::Config(_))
            ));
            Ok(())
        });
    }
}
