use mqtt_cmd_messaging::Message;
use serde_json::Value;

use crate::context::Context;
use crate::error::ExtractionError;
use crate::handler::{Extraction, HandlerSpec};
use crate::render::Renderer;

/// Outcome of extraction for one handler and one message.
#[derive(Clone, Debug, PartialEq)]
pub struct Extracted {
    /// The value compared against the handler's patterns.
    pub target: Value,

    /// The value exposed to actions as `value`: the parsed payload when
    /// `load_json` is set, the decoded text otherwise.
    pub value: Value,
}

/// Computes the value to match for `handler`.
///
/// # Errors
///
/// Fails if the payload must be JSON and isn't, or if the query or template
/// fails on this message.
pub fn extract(
    handler: &HandlerSpec,
    message: &Message,
    client_id: &str,
    renderer: &Renderer,
) -> Result<Extracted, ExtractionError> {
    let text = message.payload_text();
    let value = if handler.load_json() {
        serde_json::from_str(&text)?
    } else {
        Value::String(text.clone())
    };

    let target = match handler.extraction() {
        Extraction::Query(query) => query.first(&value)?,
        Extraction::Template(template) => {
            let context = Context::for_message(message, client_id, value.clone());
            let rendered = renderer
                .render(template, &context)
                .map_err(ExtractionError::Render)?;
            Value::String(rendered)
        }
        Extraction::Payload => Value::String(text),
    };

    Ok(Extracted { target, value })
}

#[cfg(test)]
mod tests {
    use super::*;

    use bytes::Bytes;
    use mqtt_cmd_messaging::QoS;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use crate::test_support::handler;

    fn message(payload: &'static str) -> Message {
        Message::new("home/door", payload, QoS::AtMostOnce)
    }

    #[test]
    fn test_raw_payload() {
        let extracted = extract(&handler("{}"), &message("on"), "router", &Renderer::new()).unwrap();

        assert_eq!(
            extracted,
            Extracted {
                target: json!("on"),
                value: json!("on"),
            }
        );
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let message = Message::new("a", Bytes::from_static(b"o\xffn"), QoS::AtMostOnce);

        let extracted = extract(&handler("{}"), &message, "router", &Renderer::new()).unwrap();

        assert_eq!(extracted.target, json!("o\u{fffd}n"));
    }

    #[test]
    fn test_json_without_query_matches_text() {
        let extracted = extract(
            &handler("{load_json: true}"),
            &message(r#"{"x": 1}"#),
            "router",
            &Renderer::new(),
        )
        .unwrap();

        assert_eq!(extracted.target, json!(r#"{"x": 1}"#));
        assert_eq!(extracted.value, json!({"x": 1}));
    }

    #[test]
    fn test_jq_query_keeps_type() {
        let extracted = extract(
            &handler("{jq_query: .x}"),
            &message(r#"{"x": 1}"#),
            "router",
            &Renderer::new(),
        )
        .unwrap();

        assert_eq!(extracted.target, json!(1));
    }

    #[test]
    fn test_jinja_query() {
        let extracted = extract(
            &handler(r#"{load_json: true, jinja_query: "{{ mqtt.client_id }}:{{ value.state }}"}"#),
            &message(r#"{"state": "open"}"#),
            "router",
            &Renderer::new(),
        )
        .unwrap();

        assert_eq!(extracted.target, json!("router:open"));
    }

    #[test]
    fn test_invalid_json() {
        let result = extract(
            &handler("{load_json: true}"),
            &message("not json"),
            "router",
            &Renderer::new(),
        );

        assert!(matches!(result, Err(ExtractionError::Json(_))));
    }

    #[test]
    fn test_query_failure() {
        let result = extract(
            &handler("{jq_query: .x}"),
            &message(r#""text""#),
            "router",
            &Renderer::new(),
        );

        assert!(matches!(result, Err(ExtractionError::Query { .. })));
    }
}
