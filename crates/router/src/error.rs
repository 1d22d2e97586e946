use std::fmt;
use std::io;
use std::time::Duration;

use mqtt_cmd_messaging::BusHandlerError;
use mqtt_cmd_messaging::topic::Error as TopicError;
use thiserror::Error;

/// Result type for routing operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors found while turning configuration into handlers and actions.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Both extraction mechanisms were configured.
    #[error("jq_query and jinja_query can't be both specified at the same time")]
    ConflictingExtraction,

    /// `jq_query` needs a parsed payload.
    #[error("load_json can't be false when using jq_query")]
    JqWithoutJson,

    /// The jq program does not parse or references unknown definitions.
    #[error("invalid jq query `{query}`: {reason}")]
    InvalidQuery {
        /// The offending query.
        query: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The topic filter is malformed.
    #[error("invalid topic filter: {0}")]
    InvalidFilter(#[from] TopicError),

    /// An action entry is not a mapping with exactly one key.
    #[error("an action must have exactly one kind, found {0}")]
    MalformedAction(usize),

    /// The action kind is not one of `request`, `command` or `template`.
    #[error("unknown action kind `{0}`")]
    UnknownActionKind(String),

    /// The action's fields do not deserialize.
    #[error("invalid `{kind}` action: {source}")]
    InvalidAction {
        /// The action kind.
        kind: &'static str,
        /// The deserialization failure.
        #[source]
        source: serde_json::Error,
    },

    /// `shell: true` with a list of arguments.
    #[error("args must be a string when running with shell")]
    ShellArgsNotString,

    /// `shell: false` with something other than a list of strings.
    #[error("args must be a list of strings when not running with shell")]
    ExecArgsNotList,

    /// `shell: false` with an empty list.
    #[error("args must name the program to run")]
    EmptyArgs,

    /// Timeouts must be finite and positive.
    #[error("invalid timeout {0}, expected a positive number of seconds")]
    InvalidTimeout(f64),

    /// A template action without a `name`.
    #[error("template action requires a string `name`")]
    MissingTemplateName,

    /// A template action referencing a template that does not exist.
    #[error("unknown template `{0}`")]
    UnknownTemplate(String),
}

/// A configuration error together with where it was found.
#[derive(Debug)]
pub struct ConfigIssue {
    /// Path of the offending entry, e.g. `topics[0]."a/+".patterns."on"[1]`.
    pub location: String,

    /// What is wrong with it.
    pub error: ConfigError,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.error)
    }
}

/// Errors computing the value to match for one handler and one message.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// `load_json` is set and the payload is not JSON.
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The jq query failed on this payload.
    #[error("jq query `{query}` failed: {reason}")]
    Query {
        /// The query.
        query: String,
        /// The failure reported by jq.
        reason: String,
    },

    /// The `jinja_query` template failed to render.
    #[error("failed to render jinja_query: {0}")]
    Render(#[source] minijinja::Error),
}

/// Errors running a single action.
#[derive(Debug, Error)]
pub enum ActionError {
    /// A templated field failed to render.
    #[error("failed to render {field}: {source}")]
    Render {
        /// The field being rendered.
        field: String,
        /// The template error.
        #[source]
        source: minijinja::Error,
    },

    /// The rendered method is not a valid HTTP method.
    #[error("invalid HTTP method `{0}`")]
    InvalidMethod(String),

    /// The request could not be performed.
    #[error("{method} {url} failed: {source}")]
    Request {
        /// The rendered method.
        method: String,
        /// The rendered URL.
        url: String,
        /// The transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The process could not be started.
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        /// The program.
        program: String,
        /// The OS error.
        #[source]
        source: io::Error,
    },

    /// Writing stdin or collecting the exit status failed.
    #[error("i/o error while running `{program}`: {source}")]
    Io {
        /// The program.
        program: String,
        /// The OS error.
        #[source]
        source: io::Error,
    },

    /// The process outlived its timeout and was killed.
    #[error("`{program}` timed out after {timeout:?}")]
    Timeout {
        /// The program.
        program: String,
        /// The configured timeout.
        timeout: Duration,
    },

    /// A template action referenced a missing template.
    #[error("unknown template `{0}`")]
    UnknownTemplate(String),

    /// Templates referenced each other too deeply (likely a cycle).
    #[error("template `{name}` nested deeper than {limit} levels")]
    TooDeep {
        /// The template that would have been entered.
        name: String,
        /// The nesting limit.
        limit: usize,
    },

    /// The action behind a template failed.
    #[error("template `{name}` failed: {source}")]
    Template {
        /// The template name.
        name: String,
        /// The failure of the referenced action.
        #[source]
        source: Box<ActionError>,
    },
}

/// Errors surfaced by the router.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Extraction error.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// Action error.
    #[error(transparent)]
    Action(#[from] ActionError),
}

impl BusHandlerError for Error {}
