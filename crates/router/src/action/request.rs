use std::time::Duration;

use indexmap::IndexMap;
use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{ActionEnv, fields, timeout_from_secs};
use crate::context::Context;
use crate::error::{ActionError, ConfigError};

fn default_method() -> String {
    "GET".to_string()
}

const fn default_timeout() -> f64 {
    60.0
}

#[derive(Deserialize)]
struct RequestFields {
    #[serde(default = "default_method")]
    method: String,
    url: String,
    #[serde(default, alias = "body")]
    post_data: Option<String>,
    #[serde(default)]
    headers: IndexMap<String, String>,
    #[serde(default = "default_timeout")]
    timeout: f64,
}

/// Sends an HTTP request.
///
/// Method, URL, body and header values are templates. Any response status
/// counts as success; only transport failures are errors.
#[derive(Clone, Debug)]
pub struct RequestAction {
    method: String,
    url: String,
    body: Option<String>,
    headers: IndexMap<String, String>,
    timeout: Duration,
}

impl RequestAction {
    pub(crate) fn from_config(config: Value) -> Result<Self, ConfigError> {
        let fields: RequestFields = fields("request", config)?;

        Ok(Self {
            method: fields.method,
            url: fields.url,
            body: fields.post_data,
            headers: fields.headers,
            timeout: timeout_from_secs(fields.timeout)?,
        })
    }

    /// The per-request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    pub(crate) async fn execute(&self, context: &Context, env: &ActionEnv) -> Result<(), ActionError> {
        let method = env.render("method", &self.method, context)?;
        let url = env.render("url", &self.url, context)?;
        let parsed = Method::from_bytes(method.trim().to_uppercase().as_bytes())
            .map_err(|_| ActionError::InvalidMethod(method.clone()))?;

        let mut request = env.http().request(parsed, url.as_str()).timeout(self.timeout);
        for (name, value) in &self.headers {
            let value = env.render(&format!("headers.{name}"), value, context)?;
            request = request.header(name.as_str(), value);
        }
        if let Some(body) = &self.body {
            request = request.body(env.render("post_data", body, context)?);
        }

        debug!(%method, %url, "sending request");
        let response = request.send().await.map_err(|source| ActionError::Request {
            method: method.clone(),
            url: url.clone(),
            source,
        })?;

        let status = response.status();
        if status.is_success() {
            debug!(%method, %url, %status, "request completed");
        } else {
            debug!(%method, %url, %status, "request completed with unsuccessful status");
        }
        Ok(())
    }
}
