use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::debug;

use super::{ActionEnv, ActionSpec, MAX_TEMPLATE_DEPTH};
use crate::config::RawAction;
use crate::context::Context;
use crate::error::{ActionError, ConfigError, ConfigIssue};

/// Runs a named action from the [`TemplateLibrary`].
///
/// Every field besides `name` becomes a variable of the template's context.
/// String variables are rendered first, then overlaid by the runtime
/// context, so `topic`, `payload` and friends can't be shadowed.
#[derive(Clone, Debug)]
pub struct TemplateAction {
    name: String,
    vars: Map<String, Value>,
}

impl TemplateAction {
    pub(crate) fn from_config(config: Value) -> Result<Self, ConfigError> {
        let Value::Object(mut vars) = config else {
            return Err(ConfigError::MissingTemplateName);
        };
        let Some(Value::String(name)) = vars.remove("name") else {
            return Err(ConfigError::MissingTemplateName);
        };
        Ok(Self { name, vars })
    }

    /// The referenced template.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) async fn execute(&self, context: &Context, env: &ActionEnv) -> Result<(), ActionError> {
        if env.depth() >= MAX_TEMPLATE_DEPTH {
            return Err(ActionError::TooDeep {
                name: self.name.clone(),
                limit: MAX_TEMPLATE_DEPTH,
            });
        }
        let action = env
            .templates()
            .get(&self.name)
            .ok_or_else(|| ActionError::UnknownTemplate(self.name.clone()))?;

        let mut vars = Map::with_capacity(self.vars.len());
        for (key, value) in &self.vars {
            vars.insert(key.clone(), render_value(key, value, context, env)?);
        }
        let context = Context::layered(vars, context);

        debug!(template = %self.name, kind = action.kind(), "expanding template");
        action
            .execute(&context, &env.nested())
            .await
            .map_err(|source| ActionError::Template {
                name: self.name.clone(),
                source: Box::new(source),
            })
    }
}

fn render_value(
    field: &str,
    value: &Value,
    context: &Context,
    env: &ActionEnv,
) -> Result<Value, ActionError> {
    match value {
        Value::String(template) => env.render(field, template, context).map(Value::String),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| render_value(&format!("{field}[{index}]"), item, context, env))
            .collect::<Result<_, _>>()
            .map(Value::Array),
        Value::Object(entries) => entries
            .iter()
            .map(|(key, item)| {
                render_value(&format!("{field}.{key}"), item, context, env)
                    .map(|rendered| (key.clone(), rendered))
            })
            .collect::<Result<_, _>>()
            .map(Value::Object),
        other => Ok(other.clone()),
    }
}

/// Named actions, shared read-only by every message.
#[derive(Clone, Debug, Default)]
pub struct TemplateLibrary {
    actions: IndexMap<String, ActionSpec>,
}

impl TemplateLibrary {
    /// Parses every template, dropping (and reporting) the invalid ones.
    ///
    /// A template referencing a missing template is invalid too; dropping
    /// it may in turn invalidate templates referencing it.
    pub fn from_config(templates: &IndexMap<String, RawAction>, issues: &mut Vec<ConfigIssue>) -> Self {
        let mut actions = IndexMap::with_capacity(templates.len());
        for (name, raw) in templates {
            match ActionSpec::from_raw(raw) {
                Ok(action) => {
                    actions.insert(name.clone(), action);
                }
                Err(error) => issues.push(ConfigIssue {
                    location: format!("templates.{name}"),
                    error,
                }),
            }
        }

        loop {
            let dangling: Vec<(String, String)> = actions
                .iter()
                .filter_map(|(name, action)| {
                    action
                        .template_name()
                        .filter(|target| !actions.contains_key(*target))
                        .map(|target| (name.clone(), target.to_string()))
                })
                .collect();
            if dangling.is_empty() {
                break;
            }
            for (name, target) in dangling {
                actions.shift_remove(&name);
                issues.push(ConfigIssue {
                    location: format!("templates.{name}"),
                    error: ConfigError::UnknownTemplate(target),
                });
            }
        }

        Self { actions }
    }

    /// Looks up a template.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ActionSpec> {
        self.actions.get(name)
    }

    /// Whether `name` is defined.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    /// Template names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }

    /// Number of templates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the library is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Checks that `action`, if it is a template action, references a
    /// defined template.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownTemplate`] for dangling references.
    pub fn check(&self, action: &ActionSpec) -> Result<(), ConfigError> {
        match action.template_name() {
            Some(name) if !self.contains(name) => Err(ConfigError::UnknownTemplate(name.to_string())),
            _ => Ok(()),
        }
    }
}
