use std::collections::HashMap;
use std::net::SocketAddr;

use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::action::TemplateLibrary;
use crate::config::TopicConfig;
use crate::error::ConfigIssue;
use crate::handler::HandlerSpec;

/// A request received by the recorder.
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: String,
}

/// Starts an HTTP server on an ephemeral port that reports every request.
///
/// Paths starting with `/missing` are answered with 404, everything else
/// with 200.
pub async fn spawn_recorder() -> (SocketAddr, mpsc::UnboundedReceiver<RecordedRequest>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let app = axum::Router::new().fallback(record).with_state(sender);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, receiver)
}

async fn record(
    State(sender): State<mpsc::UnboundedSender<RecordedRequest>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> StatusCode {
    let path = uri.path().to_string();
    let status = if path.starts_with("/missing") {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::OK
    };
    let headers = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.to_string(), value.to_string()))
        })
        .collect();
    let _ = sender.send(RecordedRequest {
        method: method.to_string(),
        path,
        headers,
        body,
    });
    status
}

/// Builds a handler from YAML, returning the action issues it collected.
pub fn handler_with_issues(yaml: &str, templates: &TemplateLibrary) -> (HandlerSpec, Vec<ConfigIssue>) {
    let config: TopicConfig = serde_yaml::from_str(yaml).unwrap();
    let mut issues = Vec::new();
    let handler = HandlerSpec::from_config(&config, templates, "test", &mut issues).unwrap();
    (handler, issues)
}

/// Builds a handler from YAML, failing on any issue.
pub fn handler(yaml: &str) -> HandlerSpec {
    let (handler, issues) = handler_with_issues(yaml, &TemplateLibrary::default());
    assert!(issues.is_empty(), "unexpected issues: {issues:?}");
    handler
}
