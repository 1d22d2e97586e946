use std::sync::Arc;

use mqtt_cmd_messaging::TopicFilter;
use tracing::{error, info};

use crate::action::TemplateLibrary;
use crate::config::RouterConfig;
use crate::error::{ConfigError, ConfigIssue};
use crate::handler::HandlerSpec;

/// Handlers registered for one topic filter.
#[derive(Clone, Debug)]
pub struct TopicSubscription {
    filter: TopicFilter,
    handlers: Vec<HandlerSpec>,
}

impl TopicSubscription {
    /// The filter subscribed to.
    #[must_use]
    pub const fn filter(&self) -> &TopicFilter {
        &self.filter
    }

    /// Handlers in configuration order.
    #[must_use]
    pub fn handlers(&self) -> &[HandlerSpec] {
        &self.handlers
    }
}

/// Validated routing table built from a [`RouterConfig`].
#[derive(Clone, Debug, Default)]
pub struct Registry {
    subscriptions: Vec<TopicSubscription>,
    templates: Arc<TemplateLibrary>,
}

impl Registry {
    /// Builds the registry, logging and skipping invalid entries.
    #[must_use]
    pub fn build(config: &RouterConfig) -> Self {
        let (registry, issues) = Self::assemble(config);
        for issue in &issues {
            error!(location = %issue.location, "ignoring invalid configuration: {}", issue.error);
        }
        info!(
            subscriptions = registry.subscriptions.len(),
            templates = registry.templates.len(),
            "routing table ready"
        );
        registry
    }

    /// Returns every problem `config` has, without logging.
    #[must_use]
    pub fn validate(config: &RouterConfig) -> Vec<ConfigIssue> {
        Self::assemble(config).1
    }

    fn assemble(config: &RouterConfig) -> (Self, Vec<ConfigIssue>) {
        let mut issues = Vec::new();
        let templates = TemplateLibrary::from_config(&config.templates, &mut issues);
        let mut subscriptions: Vec<TopicSubscription> = Vec::new();

        for (index, entry) in config.topics.iter().enumerate() {
            for (filter, topic_config) in entry {
                let location = format!("topics[{index}].{filter:?}");
                let handler = TopicFilter::new(filter.as_str())
                    .map_err(ConfigError::from)
                    .and_then(|filter| {
                        HandlerSpec::from_config(topic_config, &templates, &location, &mut issues)
                            .map(|handler| (filter, handler))
                    });

                match handler {
                    Ok((filter, handler)) => {
                        match subscriptions.iter_mut().find(|s| s.filter == filter) {
                            Some(subscription) => subscription.handlers.push(handler),
                            None => subscriptions.push(TopicSubscription {
                                filter,
                                handlers: vec![handler],
                            }),
                        }
                    }
                    Err(error) => issues.push(ConfigIssue { location, error }),
                }
            }
        }

        let registry = Self {
            subscriptions,
            templates: Arc::new(templates),
        };
        (registry, issues)
    }

    /// Subscriptions in order of first appearance, one per unique filter.
    #[must_use]
    pub fn subscriptions(&self) -> &[TopicSubscription] {
        &self.subscriptions
    }

    /// Subscriptions whose filter matches `topic`, in registration order.
    pub fn matching<'a>(&'a self, topic: &'a str) -> impl Iterator<Item = &'a TopicSubscription> + 'a {
        self.subscriptions
            .iter()
            .filter(move |subscription| subscription.filter.matches(topic))
    }

    /// The template library shared with actions.
    #[must_use]
    pub const fn templates(&self) -> &Arc<TemplateLibrary> {
        &self.templates
    }
}
