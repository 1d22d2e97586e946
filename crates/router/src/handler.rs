use serde_json::Value;

use crate::action::{ActionSpec, TemplateLibrary};
use crate::config::{TopicConfig, describe_pattern};
use crate::error::{ConfigError, ConfigIssue};
use crate::query::Query;

/// How the value to match is computed from a message.
#[derive(Clone, Debug)]
pub enum Extraction {
    /// The decoded payload text.
    Payload,

    /// First output of a jq program run on the parsed payload.
    Query(Query),

    /// A Jinja template rendered with the message context.
    Template(String),
}

/// A validated handler: how to extract a value and what to run for it.
#[derive(Clone, Debug)]
pub struct HandlerSpec {
    load_json: bool,
    extraction: Extraction,
    patterns: Vec<(Value, Vec<ActionSpec>)>,
}

impl HandlerSpec {
    /// Validates a handler configuration.
    ///
    /// Invalid actions are left out and pushed to `issues` with a location
    /// below `location`; the rest of the handler stays usable.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the extraction options conflict or the
    /// jq program is invalid. The handler is unusable then.
    pub fn from_config(
        config: &TopicConfig,
        templates: &TemplateLibrary,
        location: &str,
        issues: &mut Vec<ConfigIssue>,
    ) -> Result<Self, ConfigError> {
        let extraction = match (&config.jq_query, &config.jinja_query) {
            (Some(_), Some(_)) => return Err(ConfigError::ConflictingExtraction),
            (Some(_), None) if config.load_json == Some(false) => {
                return Err(ConfigError::JqWithoutJson);
            }
            (Some(query), None) => Extraction::Query(Query::compile(query.as_str())?),
            (None, Some(template)) => Extraction::Template(template.clone()),
            (None, None) => Extraction::Payload,
        };
        let load_json = config
            .load_json
            .unwrap_or(matches!(extraction, Extraction::Query(_)));

        let mut patterns = Vec::with_capacity(config.patterns.len());
        for (pattern, raw_actions) in config.patterns.iter() {
            let mut actions = Vec::with_capacity(raw_actions.len());
            for (index, raw) in raw_actions.iter().enumerate() {
                let action = ActionSpec::from_raw(raw)
                    .and_then(|action| templates.check(&action).map(|()| action));
                match action {
                    Ok(action) => actions.push(action),
                    Err(error) => issues.push(ConfigIssue {
                        location: format!(
                            "{location}.patterns.{}[{index}]",
                            describe_pattern(pattern)
                        ),
                        error,
                    }),
                }
            }
            patterns.push((pattern.clone(), actions));
        }

        Ok(Self {
            load_json,
            extraction,
            patterns,
        })
    }

    /// Whether the payload is parsed as JSON.
    #[must_use]
    pub const fn load_json(&self) -> bool {
        self.load_json
    }

    /// How the value to match is computed.
    #[must_use]
    pub const fn extraction(&self) -> &Extraction {
        &self.extraction
    }

    /// Patterns and their actions, in declaration order.
    #[must_use]
    pub fn patterns(&self) -> &[(Value, Vec<ActionSpec>)] {
        &self.patterns
    }
}
