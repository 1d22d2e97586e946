use std::panic::AssertUnwindSafe;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use futures::FutureExt;
use mqtt_cmd_messaging::{Bus, BusHandler, Message};
use tracing::{debug, error, info, warn};

use crate::action::{ActionEnv, ActionSpec};
use crate::config::{ExtractionFailurePolicy, RouterConfig};
use crate::context::Context;
use crate::dispatch::dispatch;
use crate::error::{Error, Result};
use crate::extract::extract;
use crate::registry::Registry;
use crate::render::Renderer;

/// Counters describing how one message was handled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RouteReport {
    /// Handlers whose filter matched the topic.
    pub handlers: usize,

    /// Handlers skipped because their value could not be extracted.
    pub skipped_handlers: usize,

    /// Actions started.
    pub actions: usize,

    /// Actions that failed or panicked.
    pub failed_actions: usize,
}

#[derive(Debug)]
struct Inner {
    config: RouterConfig,
    registry: OnceLock<Registry>,
    renderer: Renderer,
    http: reqwest::Client,
}

/// Routes bus messages to the configured actions.
///
/// The routing table is built on the first connection and kept for the
/// router's lifetime; reconnections only subscribe again.
#[derive(Clone, Debug)]
pub struct Router {
    inner: Arc<Inner>,
}

impl Router {
    /// Creates a router with a default HTTP client.
    #[must_use]
    pub fn new(config: RouterConfig) -> Self {
        Self::with_http_client(config, reqwest::Client::new())
    }

    /// Creates a router sending requests through `http`.
    #[must_use]
    pub fn with_http_client(config: RouterConfig, http: reqwest::Client) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                registry: OnceLock::new(),
                renderer: Renderer::new(),
                http,
            }),
        }
    }

    /// The routing table, built on first use.
    pub fn registry(&self) -> &Registry {
        self.inner
            .registry
            .get_or_init(|| Registry::build(&self.inner.config))
    }

    /// Subscribes `bus` to every filter of the routing table and returns
    /// how many subscriptions succeeded.
    pub async fn subscribe_all<B: Bus>(&self, bus: &B) -> usize {
        let mut subscribed = 0;
        for subscription in self.registry().subscriptions() {
            match bus.subscribe(subscription.filter()).await {
                Ok(()) => subscribed += 1,
                Err(e) => warn!(filter = %subscription.filter(), "failed to subscribe: {e}"),
            }
        }
        subscribed
    }

    /// Runs every handler whose filter matches the message topic.
    ///
    /// Failing handlers and actions are logged and counted, and never stop
    /// the remaining ones.
    ///
    /// # Errors
    ///
    /// Only with [`ExtractionFailurePolicy::AbortMessage`], when a handler
    /// fails to extract its value.
    pub async fn route(&self, client_id: &str, message: &Message) -> Result<RouteReport> {
        let registry = self.registry();
        let env = ActionEnv::new(
            self.inner.renderer.clone(),
            self.inner.http.clone(),
            registry.templates().clone(),
        );
        let topic = message.topic.as_str();
        let mut report = RouteReport::default();

        for subscription in registry.matching(topic) {
            for handler in subscription.handlers() {
                report.handlers += 1;

                let extracted = match extract(handler, message, client_id, &self.inner.renderer) {
                    Ok(extracted) => extracted,
                    Err(e) => {
                        warn!(%topic, filter = %subscription.filter(), "failed to extract value: {e}");
                        report.skipped_handlers += 1;
                        match self.inner.config.on_extraction_error {
                            ExtractionFailurePolicy::SkipHandler => continue,
                            ExtractionFailurePolicy::AbortMessage => return Err(Error::from(e)),
                        }
                    }
                };

                let actions = dispatch(handler, &extracted.target);
                if actions.is_empty() {
                    debug!(%topic, target = %extracted.target, "no pattern matched");
                    continue;
                }

                let context = Context::for_message(message, client_id, extracted.value);
                for action in actions {
                    report.actions += 1;
                    if !run_action(action, &context, &env, topic).await {
                        report.failed_actions += 1;
                    }
                }
            }
        }

        Ok(report)
    }
}

async fn run_action(action: &ActionSpec, context: &Context, env: &ActionEnv, topic: &str) -> bool {
    let kind = action.kind();
    debug!(%topic, kind, "running action");
    match AssertUnwindSafe(action.execute(context, env)).catch_unwind().await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!(%topic, kind, "action failed: {e}");
            false
        }
        Err(_) => {
            error!(%topic, kind, "action panicked");
            false
        }
    }
}

#[async_trait]
impl<B: Bus> BusHandler<B> for Router {
    type Error = Error;

    async fn on_connect(&self, bus: &B) -> Result<()> {
        let subscribed = self.subscribe_all(bus).await;
        info!(client_id = bus.client_id(), "subscribed to {subscribed} topic filter(s)");
        Ok(())
    }

    async fn on_message(&self, bus: &B, message: Message) -> Result<()> {
        let report = self.route(bus.client_id(), &message).await?;
        debug!(topic = %message.topic, ?report, "message routed");
        Ok(())
    }
}
