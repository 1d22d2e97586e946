use std::path::Path;
use std::time::Duration;

use mqtt_cmd_messaging_mqtt::MqttBusOptions;
use mqtt_cmd_router::RouterConfig;
use serde::Deserialize;

use crate::error::Error;

const fn default_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "mqtt-cmd".to_string()
}

const fn default_keepalive() -> u64 {
    60
}

/// Broker connection settings.
#[derive(Clone, Debug, Deserialize)]
pub struct MqttConfig {
    /// Broker host.
    pub host: String,

    /// Broker port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Client identifier.
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Keep-alive interval in seconds.
    #[serde(default = "default_keepalive")]
    pub keepalive: u64,

    /// Username, if the broker requires authentication.
    pub username: Option<String>,

    /// Password for `username`.
    pub password: Option<String>,
}

impl MqttConfig {
    /// Options for [`mqtt_cmd_messaging_mqtt::MqttBus`].
    pub fn bus_options(&self) -> MqttBusOptions {
        let options = MqttBusOptions::new(&self.host, self.port, &self.client_id)
            .with_keep_alive(Duration::from_secs(self.keepalive));
        match &self.username {
            Some(username) => {
                options.with_credentials(username, self.password.clone().unwrap_or_default())
            }
            None => options,
        }
    }
}

/// The configuration file.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// Broker connection.
    pub mqtt: MqttConfig,

    /// Default log filter, e.g. `info` or `debug`.
    #[serde(default)]
    pub log_level: Option<String>,

    /// Topics, templates and routing options.
    #[serde(flatten)]
    pub router: RouterConfig,
}

impl Config {
    /// Reads and parses a YAML configuration file.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text).map_err(|source| Error::ParseConfig {
            path: path.to_path_buf(),
            source,
        })
    }

    fn parse(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }
}
