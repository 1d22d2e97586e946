use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that stop the process.
#[derive(Debug, Error)]
pub enum Error {
    /// The configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    ReadConfig {
        /// Path of the configuration file.
        path: PathBuf,
        /// The I/O error.
        #[source]
        source: io::Error,
    },

    /// The configuration file is not valid YAML or has the wrong shape.
    #[error("failed to parse {path}: {source}")]
    ParseConfig {
        /// Path of the configuration file.
        path: PathBuf,
        /// The parse error.
        #[source]
        source: serde_yaml::Error,
    },

    /// `--check` found problems.
    #[error("configuration has {0} problem(s)")]
    InvalidConfig(usize),

    /// The log filter or subscriber could not be set up.
    #[error("failed to set up logging: {0}")]
    Logging(String),

    /// MQTT client error.
    #[error(transparent)]
    Mqtt(#[from] mqtt_cmd_messaging_mqtt::Error),
}
