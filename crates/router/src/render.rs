use std::fmt;
use std::sync::Arc;

use minijinja::Environment;

use crate::context::Context;

/// Renders Jinja templates against a message [`Context`].
///
/// Templates are compiled on every call; configuration strings are small and
/// most of them are plain text.
#[derive(Clone)]
pub struct Renderer {
    env: Arc<Environment<'static>>,
}

impl Renderer {
    /// Creates a renderer with the default Jinja environment (lenient
    /// undefined variables, trailing newline stripped).
    #[must_use]
    pub fn new() -> Self {
        Self {
            env: Arc::new(Environment::new()),
        }
    }

    /// Renders `template` with the bindings of `context`.
    ///
    /// # Errors
    ///
    /// Returns the template engine's error if `template` does not parse or
    /// fails to evaluate.
    pub fn render(&self, template: &str, context: &Context) -> Result<String, minijinja::Error> {
        self.env.render_str(template, context)
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Renderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use mqtt_cmd_messaging::{Message, QoS};
    use serde_json::json;

    fn context() -> Context {
        let message = Message::new("home/door", r#"{"state":"open"}"#, QoS::AtMostOnce);
        Context::for_message(&message, "router", json!({"state": "open"}))
    }

    #[test]
    fn test_render_context_fields() {
        let renderer = Renderer::new();

        let rendered = renderer
            .render(
                "{{ mqtt.client_id }} {{ topic }} {{ value.state }} {{ qos }}",
                &context(),
            )
            .unwrap();

        assert_eq!(rendered, "router home/door open 0");
    }

    #[test]
    fn test_render_plain_text_unchanged() {
        let renderer = Renderer::new();

        assert_eq!(
            renderer.render("http://localhost/plain", &context()).unwrap(),
            "http://localhost/plain"
        );
    }

    #[test]
    fn test_render_undefined_is_empty() {
        let renderer = Renderer::new();

        assert_eq!(renderer.render("[{{ missing }}]", &context()).unwrap(), "[]");
    }

    #[test]
    fn test_render_syntax_error() {
        let renderer = Renderer::new();

        assert!(renderer.render("{{ topic ", &context()).is_err());
    }
}
