use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use mqtt_cmd_messaging::Bus;
use mqtt_cmd_messaging_memory::{MemoryBroker, MemoryBus, MemoryBusOptions};
use mqtt_cmd_router::{Router, RouterConfig};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;

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

pub async fn connect_router(broker: &MemoryBroker, yaml: &str) -> MemoryBus {
    let config: RouterConfig = serde_yaml::from_str(yaml).unwrap();
    MemoryBus::connect(
        MemoryBusOptions {
            broker: broker.clone(),
            client_id: "router".to_string(),
        },
        Router::new(config),
    )
    .await
    .unwrap()
}

pub async fn next_request(receiver: &mut mpsc::UnboundedReceiver<RecordedRequest>) -> RecordedRequest {
    timeout(Duration::from_secs(2), receiver.recv())
        .await
        .unwrap()
        .unwrap()
}

pub async fn next_path(receiver: &mut mpsc::UnboundedReceiver<RecordedRequest>) -> String {
    next_request(receiver).await.path
}

pub async fn assert_idle(receiver: &mut mpsc::UnboundedReceiver<RecordedRequest>) {
    if let Ok(Some(request)) = timeout(Duration::from_millis(300), receiver.recv()).await {
        panic!("unexpected request to {}", request.path);
    }
}
