// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Adapter configuration file.
//!
//! ```toml
//! polling_interval_ms = 60000
//!
//! [device]
//! username = "user@example.com"
//! password = "secret"
//!
//! [mqtt]
//! broker = "tcp://localhost:1883"
//! topic_root = "indego"
//! qos = 1
//!
//! [ifttt]
//! maker_key = "abcdef"
//! receiver_port = 8761
//! receiver_secret = "s3cr3t"
//!
//! [ifttt.events]
//! state_change = "indego_state"
//! error = "indego_error"
//! ```
//!
//! The file is read and validated once at startup; the resulting values are
//! immutable.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::bridge::IftttEvents;
use crate::client::ClientConfig;
use crate::engine::EngineConfig;
use crate::error::ConfigError;

/// Top-level configuration of a bridge process.
#[derive(Debug, Clone, Deserialize)]
pub struct AdapterConfig {
    #[serde(default = "default_polling_interval_ms")]
    pub polling_interval_ms: u64,
    pub device: DeviceSection,
    #[serde(default)]
    pub mqtt: Option<MqttSection>,
    #[serde(default)]
    pub ifttt: Option<IftttSection>,
}

/// `[device]`: the Indego account.
#[derive(Clone, Deserialize)]
pub struct DeviceSection {
    #[serde(default)]
    pub base_url: Option<String>,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub min_refresh_interval_ms: Option<u64>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// `[mqtt]`: the broker to mirror the state to.
#[derive(Clone, Deserialize)]
pub struct MqttSection {
    pub broker: String,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_topic_root")]
    pub topic_root: String,
    #[serde(default = "default_qos")]
    pub qos: u8,
}

/// `[ifttt]`: the Maker webhook service and the command receiver.
#[derive(Debug, Clone, Deserialize)]
pub struct IftttSection {
    #[serde(default)]
    pub maker_key: String,
    /// 0 disables the command receiver.
    #[serde(default)]
    pub receiver_port: u16,
    #[serde(default)]
    pub receiver_secret: Option<String>,
    #[serde(default)]
    pub ignore_server_certificate: bool,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub events: IftttEvents,
}

fn default_polling_interval_ms() -> u64 {
    60_000
}

fn default_topic_root() -> String {
    "indego".to_string()
}

fn default_qos() -> u8 {
    1
}

impl AdapterConfig {
    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, is not valid TOML
    /// or fails [`validate`](Self::validate).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "Loading configuration");
        let raw = std::fs::read_to_string(path)?;
        raw.parse()
    }

    /// Checks values that deserialization alone does not catch.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.polling_interval_ms == 0 {
            return Err(ConfigError::invalid(
                "polling_interval_ms",
                "must be greater than 0",
            ));
        }
        if self.device.username.is_empty() {
            return Err(ConfigError::invalid("device.username", "must not be empty"));
        }
        if self.device.password.is_empty() {
            return Err(ConfigError::invalid("device.password", "must not be empty"));
        }

        if let Some(mqtt) = &self.mqtt {
            if mqtt.qos > 2 {
                return Err(ConfigError::invalid("mqtt.qos", "must be 0, 1 or 2"));
            }
            if mqtt.broker.is_empty() {
                return Err(ConfigError::invalid("mqtt.broker", "must not be empty"));
            }
        }

        if let Some(ifttt) = &self.ifttt {
            if ifttt.maker_key.is_empty() {
                return Err(ConfigError::invalid("ifttt.maker_key", "must not be empty"));
            }
            let secret_missing = ifttt.receiver_secret.as_deref().is_none_or(str::is_empty);
            if ifttt.receiver_port != 0 && secret_missing {
                return Err(ConfigError::invalid(
                    "ifttt.receiver_secret",
                    "required when receiver_port is set",
                ));
            }
            if ifttt
                .receiver_secret
                .as_deref()
                .is_some_and(|s| s.contains('/'))
            {
                return Err(ConfigError::invalid(
                    "ifttt.receiver_secret",
                    "must not contain '/'",
                ));
            }
        }
        Ok(())
    }

    /// Returns the polling interval.
    #[must_use]
    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms)
    }

    /// Builds the device client configuration.
    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        let device = &self.device;
        let mut config = ClientConfig::new(&device.username, &device.password);
        if let Some(url) = &device.base_url {
            config = config.with_base_url(url);
        }
        if let Some(ms) = device.min_refresh_interval_ms {
            config = config.with_min_refresh_interval(Duration::from_millis(ms));
        }
        if let Some(ms) = device.timeout_ms {
            config = config.with_timeout(Duration::from_millis(ms));
        }
        config
    }

    /// Builds the polling engine configuration.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::new(self.polling_interval())
    }

    /// Builds the MQTT sink configuration, if an `[mqtt]` section exists.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the broker address cannot be parsed.
    #[cfg(feature = "mqtt")]
    pub fn mqtt_config(&self) -> Result<Option<crate::bridge::MqttSinkConfig>, ConfigError> {
        use rumqttc::QoS;

        let Some(mqtt) = &self.mqtt else {
            return Ok(None);
        };
        let qos = match mqtt.qos {
            0 => QoS::AtMostOnce,
            1 => QoS::AtLeastOnce,
            2 => QoS::ExactlyOnce,
            _ => return Err(ConfigError::invalid("mqtt.qos", "must be 0, 1 or 2")),
        };

        let mut config = crate::bridge::MqttSinkConfig::from_broker_url(&mqtt.broker)?
            .with_topic_root(&mqtt.topic_root)
            .with_qos(qos);
        if let Some(id) = mqtt.client_id.as_deref().filter(|id| !id.is_empty()) {
            config = config.with_client_id(id);
        }
        if let Some(username) = mqtt.username.as_deref().filter(|u| !u.is_empty()) {
            config = config.with_credentials(username, mqtt.password.as_deref().unwrap_or_default());
        }
        Ok(Some(config))
    }

    /// Builds the webhook sink configuration, if an `[ifttt]` section exists.
    #[cfg(feature = "ifttt")]
    #[must_use]
    pub fn ifttt_config(&self) -> Option<crate::bridge::IftttConfig> {
        let ifttt = self.ifttt.as_ref()?;
        let mut config = crate::bridge::IftttConfig::new(&ifttt.maker_key)
            .with_events(ifttt.events.clone())
            .with_ignore_server_certificate(ifttt.ignore_server_certificate);
        if let Some(url) = &ifttt.base_url {
            config = config.with_base_url(url);
        }
        Some(config)
    }
}

impl std::str::FromStr for AdapterConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}

impl std::fmt::Debug for DeviceSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSection")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("min_refresh_interval_ms", &self.min_refresh_interval_ms)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl std::fmt::Debug for MqttSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttSection")
            .field("broker", &self.broker)
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("topic_root", &self.topic_root)
            .field("qos", &self.qos)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEVICE: &str = r#"
        [device]
        username = "user@example.com"
        password = "secret"
    "#;

    fn parse(extra: &str) -> Result<AdapterConfig, ConfigError> {
        format!("{extra}\n{DEVICE}").parse()
    }

    #[test]
    fn minimal() {
        let config = parse("").unwrap();
        assert_eq!(config.polling_interval(), Duration::from_secs(60));
        assert!(config.mqtt.is_none());
        assert!(config.ifttt.is_none());

        let client = config.client_config();
        assert_eq!(client.base_url(), ClientConfig::DEFAULT_BASE_URL);
        assert_eq!(client.username(), "user@example.com");
    }

    #[test]
    fn device_overrides() {
        let config: AdapterConfig = r#"
            polling_interval_ms = 5000
            [device]
            username = "u"
            password = "p"
            base_url = "http://localhost:8080/api/v1"
            min_refresh_interval_ms = 1000
        "#
        .parse()
        .unwrap();
        let client = config.client_config();
        assert_eq!(client.base_url(), "http://localhost:8080/api/v1/");
        assert_eq!(client.min_refresh_interval(), Duration::from_secs(1));
        assert_eq!(config.engine_config().poll_interval(), Duration::from_secs(5));
    }

    #[test]
    fn zero_interval_rejected() {
        let err = parse("polling_interval_ms = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "polling_interval_ms"));
    }

    #[test]
    fn empty_password_rejected() {
        let err: ConfigError = "[device]\nusername = \"u\"\npassword = \"\""
            .parse::<AdapterConfig>()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "device.password"));
    }

    #[test]
    fn missing_device_section() {
        let err = "polling_interval_ms = 100".parse::<AdapterConfig>().unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn qos_out_of_range() {
        let err = parse("[mqtt]\nbroker = \"tcp://localhost:1883\"\nqos = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "mqtt.qos"));
    }

    #[test]
    fn receiver_needs_secret() {
        let err = parse("[ifttt]\nmaker_key = \"k\"\nreceiver_port = 8080").unwrap_err();
        assert!(
            matches!(err, ConfigError::Invalid { ref field, .. } if field == "ifttt.receiver_secret")
        );
    }

    #[test]
    fn maker_key_required() {
        let err = parse("[ifttt]\nreceiver_port = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "ifttt.maker_key"));
    }

    #[cfg(feature = "ifttt")]
    #[test]
    fn ifttt_events() {
        let config = parse(
            r#"
            [ifttt]
            maker_key = "k"
            base_url = "http://localhost:9999/"
            [ifttt.events]
            offline = "indego_offline"
            error_cleared = "indego_ok"
            "#,
        )
        .unwrap();
        let ifttt = config.ifttt_config().unwrap();
        assert_eq!(ifttt.base_url(), "http://localhost:9999");
        assert_eq!(ifttt.events().offline.as_deref(), Some("indego_offline"));
        assert_eq!(ifttt.events().online, None);
        assert_eq!(ifttt.events().error_cleared.as_deref(), Some("indego_ok"));
    }

    #[cfg(feature = "mqtt")]
    #[test]
    fn mqtt_section() {
        let config = parse(
            r#"
            [mqtt]
            broker = "tcp://broker.local:1884"
            topic_root = "garden/indego/"
            qos = 2
            username = "bridge"
            password = "pw"
            "#,
        )
        .unwrap();
        let mqtt = config.mqtt_config().unwrap().unwrap();
        assert_eq!(mqtt.host(), "broker.local");
        assert_eq!(mqtt.port(), 1884);
        assert_eq!(mqtt.topic_root(), "garden/indego");
        assert_eq!(mqtt.qos(), rumqttc::QoS::ExactlyOnce);
    }

    #[test]
    fn debug_hides_passwords() {
        let config = parse("[mqtt]\nbroker = \"b\"\npassword = \"mqtt-pw\"").unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret"));
        assert!(!rendered.contains("mqtt-pw"));
    }
}
