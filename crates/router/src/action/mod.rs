mod command;
mod request;
mod template;

pub use command::{CommandAction, Invocation};
pub use request::RequestAction;
pub use template::{TemplateAction, TemplateLibrary};

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::RawAction;
use crate::context::Context;
use crate::error::{ActionError, ConfigError};
use crate::render::Renderer;

/// How many template actions may be nested inside each other.
pub const MAX_TEMPLATE_DEPTH: usize = 8;

/// A configured action.
#[derive(Clone, Debug)]
pub enum ActionSpec {
    /// HTTP request.
    Request(RequestAction),

    /// Local process.
    Command(CommandAction),

    /// Indirection through a named template.
    Template(TemplateAction),
}

impl ActionSpec {
    /// Parses a single-key action entry such as `{command: {args: [...]}}`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the entry does not have exactly one key,
    /// names an unknown kind, or carries invalid fields.
    pub fn from_raw(raw: &RawAction) -> Result<Self, ConfigError> {
        let (kind, config) = match raw.first() {
            Some(entry) if raw.len() == 1 => entry,
            _ => return Err(ConfigError::MalformedAction(raw.len())),
        };

        match kind.as_str() {
            "request" => RequestAction::from_config(config.clone()).map(Self::Request),
            "command" => CommandAction::from_config(config.clone()).map(Self::Command),
            "template" => TemplateAction::from_config(config.clone()).map(Self::Template),
            other => Err(ConfigError::UnknownActionKind(other.to_string())),
        }
    }

    /// The configuration key of this action kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Request(_) => "request",
            Self::Command(_) => "command",
            Self::Template(_) => "template",
        }
    }

    /// The referenced template, for template actions.
    #[must_use]
    pub fn template_name(&self) -> Option<&str> {
        match self {
            Self::Template(action) => Some(action.name()),
            _ => None,
        }
    }

    /// Renders the action's fields against `context` and runs it.
    pub fn execute<'a>(
        &'a self,
        context: &'a Context,
        env: &'a ActionEnv,
    ) -> BoxFuture<'a, Result<(), ActionError>> {
        async move {
            match self {
                Self::Request(action) => action.execute(context, env).await,
                Self::Command(action) => action.execute(context, env).await,
                Self::Template(action) => action.execute(context, env).await,
            }
        }
        .boxed()
    }
}

/// Shared services available to running actions.
#[derive(Clone, Debug)]
pub struct ActionEnv {
    renderer: Renderer,
    http: reqwest::Client,
    templates: Arc<TemplateLibrary>,
    depth: usize,
}

impl ActionEnv {
    /// Creates a top-level environment.
    #[must_use]
    pub const fn new(renderer: Renderer, http: reqwest::Client, templates: Arc<TemplateLibrary>) -> Self {
        Self {
            renderer,
            http,
            templates,
            depth: 0,
        }
    }

    pub(crate) fn render(
        &self,
        field: &str,
        template: &str,
        context: &Context,
    ) -> Result<String, ActionError> {
        self.renderer
            .render(template, context)
            .map_err(|source| ActionError::Render {
                field: field.to_string(),
                source,
            })
    }

    pub(crate) const fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn templates(&self) -> &TemplateLibrary {
        &self.templates
    }

    pub(crate) const fn depth(&self) -> usize {
        self.depth
    }

    fn nested(&self) -> Self {
        Self {
            depth: self.depth + 1,
            ..self.clone()
        }
    }
}

fn fields<T>(kind: &'static str, config: Value) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    serde_json::from_value(config).map_err(|source| ConfigError::InvalidAction { kind, source })
}

fn timeout_from_secs(seconds: f64) -> Result<Duration, ConfigError> {
    if seconds > 0.0 {
        Duration::try_from_secs_f64(seconds).map_err(|_| ConfigError::InvalidTimeout(seconds))
    } else {
        Err(ConfigError::InvalidTimeout(seconds))
    }
}
