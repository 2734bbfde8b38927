//! Bridge configuration model and loader

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};
use vdcd_client::{ClientConfig, DEFAULT_DIAL_RETRIES, DEFAULT_PORT};
use vdcd_topic_proxy::{MqttSettings, DEFAULT_MQTT_PORT};

const DEFAULT_NAME: &str = "vdcd-bridge";

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

fn default_dial_retries() -> u32 {
    DEFAULT_DIAL_RETRIES
}

fn default_dial_backoff_ms() -> u64 {
    1000
}

fn default_mqtt_port() -> u16 {
    DEFAULT_MQTT_PORT
}

/// Top-level bridge configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Controller host
    #[serde(default)]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_name")]
    pub model_name: String,

    #[serde(default = "default_name")]
    pub vendor_name: String,

    #[serde(default)]
    pub dry_mode: bool,

    #[serde(default = "default_dial_retries")]
    pub dial_retries: u32,

    #[serde(default = "default_dial_backoff_ms")]
    pub dial_backoff_ms: u64,

    /// Broker used by device adapters, absent when no adapter needs one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mqtt: Option<MqttConfig>,
}

/// MQTT broker section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MqttConfig {
    pub host: String,

    #[serde(default = "default_mqtt_port")]
    pub port: u16,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

impl MqttConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_MQTT_PORT,
            username: None,
            password: None,
            client_id: None,
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_port(),
            model_name: default_name(),
            vendor_name: default_name(),
            dry_mode: false,
            dial_retries: default_dial_retries(),
            dial_backoff_ms: default_dial_backoff_ms(),
            mqtt: None,
        }
    }
}

/// Read and parse a YAML configuration file
///
/// Environment overrides and validation are separate steps, see
/// [`BridgeConfig::apply_env`] and [`BridgeConfig::validate`].
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<BridgeConfig> {
    let path = path.as_ref();
    debug!("Loading configuration file: {:?}", path);

    let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    // An empty file is a valid, all-defaults configuration
    if content.trim().is_empty() {
        return Ok(BridgeConfig::default());
    }

    serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseYaml {
        path: path.to_path_buf(),
        source: e,
    })
}

impl BridgeConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// Override fields from the process environment
    pub fn apply_env(&mut self) -> ConfigResult<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Override fields from `lookup`, which maps a variable name to its value
    pub fn apply_env_from<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("VDCD_HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("VDCD_PORT") {
            self.port = parse_port("VDCD_PORT", &port)?;
        }
        if let Some(model_name) = lookup("VDCD_MODEL_NAME") {
            self.model_name = model_name;
        }
        if let Some(vendor_name) = lookup("VDCD_VENDOR_NAME") {
            self.vendor_name = vendor_name;
        }
        if let Some(dry_mode) = lookup("VDCD_DRY_MODE") {
            self.dry_mode = parse_bool("VDCD_DRY_MODE", &dry_mode)?;
        }

        if let Some(host) = lookup("MQTT_HOST") {
            match &mut self.mqtt {
                Some(mqtt) => mqtt.host = host,
                None => self.mqtt = Some(MqttConfig::new(host)),
            }
        }
        if let Some(mqtt) = &mut self.mqtt {
            if let Some(username) = lookup("MQTT_USERNAME") {
                mqtt.username = Some(username);
            }
            if let Some(password) = lookup("MQTT_PASSWORD") {
                mqtt.password = Some(password);
            }
        }

        Ok(())
    }

    /// Normalize and check the configuration
    ///
    /// String fields are trimmed in place. Empty credentials are treated as
    /// absent.
    pub fn validate(&mut self) -> ConfigResult<()> {
        self.host = self.host.trim().to_string();
        self.model_name = self.model_name.trim().to_string();
        self.vendor_name = self.vendor_name.trim().to_string();

        if self.host.is_empty() {
            return Err(invalid("host", "must not be empty"));
        }
        if self.port == 0 {
            return Err(invalid("port", "must not be 0"));
        }
        if self.dial_retries == 0 {
            return Err(invalid("dial_retries", "must be at least 1"));
        }

        if let Some(mqtt) = &mut self.mqtt {
            mqtt.host = mqtt.host.trim().to_string();
            if mqtt.host.is_empty() {
                return Err(invalid("mqtt.host", "must not be empty"));
            }
            if mqtt.port == 0 {
                return Err(invalid("mqtt.port", "must not be 0"));
            }
            mqtt.username = trimmed(mqtt.username.take());
            mqtt.password = trimmed(mqtt.password.take());
            mqtt.client_id = trimmed(mqtt.client_id.take());
        }

        info!(
            host = %self.host,
            port = self.port,
            dry_mode = self.dry_mode,
            mqtt = self.mqtt.is_some(),
            "Configuration validated"
        );
        Ok(())
    }

    /// Settings for the protocol client
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(
            self.host.clone(),
            self.port,
            self.model_name.clone(),
            self.vendor_name.clone(),
            self.dry_mode,
        )
        .with_dial_retries(self.dial_retries)
        .with_dial_backoff(Duration::from_millis(self.dial_backoff_ms))
    }

    /// Settings for the MQTT transport, if a broker is configured
    pub fn mqtt_settings(&self) -> Option<MqttSettings> {
        self.mqtt.as_ref().map(|mqtt| {
            let mut settings = MqttSettings::new(mqtt.host.clone());
            settings.port = mqtt.port;
            settings.username = mqtt.username.clone();
            settings.password = mqtt.password.clone();
            settings.client_id = mqtt.client_id.clone();
            settings
        })
    }
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_port(key: &str, value: &str) -> ConfigResult<u16> {
    value
        .trim()
        .parse()
        .map_err(|e: std::num::ParseIntError| invalid(key, &e.to_string()))
}

fn parse_bool(key: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(invalid(key, &format!("'{}' is not a boolean", other))),
    }
}
