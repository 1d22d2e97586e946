use mqtt_cmd_messaging::Message;
use serde::Serialize;
use serde_json::{Map, Value, json};

/// Variables visible to templates while handling one message.
///
/// Holds `mqtt.client_id`, `topic`, `payload`, `qos`, `properties` and
/// `value`. A context is never modified once built; template indirection
/// derives a new one with [`Context::layered`].
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Context(Map<String, Value>);

impl Context {
    /// Builds the context for an inbound message.
    #[must_use]
    pub fn for_message(message: &Message, client_id: &str, value: Value) -> Self {
        let mut vars = Map::new();
        vars.insert("mqtt".to_string(), json!({ "client_id": client_id }));
        vars.insert("topic".to_string(), Value::String(message.topic.clone()));
        vars.insert("payload".to_string(), Value::String(message.payload_text()));
        vars.insert("qos".to_string(), Value::from(u8::from(message.qos)));
        let properties = message
            .properties
            .iter()
            .map(|(key, value)| (key.clone(), Value::String(value.clone())))
            .collect();
        vars.insert("properties".to_string(), Value::Object(properties));
        vars.insert("value".to_string(), value);
        Self(vars)
    }

    /// Builds a context whose bindings are `base` overlaid by `overlay`.
    ///
    /// Keys present in `overlay` always win.
    #[must_use]
    pub fn layered(base: Map<String, Value>, overlay: &Self) -> Self {
        let mut vars = base;
        vars.extend(overlay.0.iter().map(|(key, value)| (key.clone(), value.clone())));
        Self(vars)
    }

    /// Looks up a top-level binding.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// All bindings.
    #[must_use]
    pub const fn vars(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for Context {
    fn from(vars: Map<String, Value>) -> Self {
        Self(vars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use mqtt_cmd_messaging::{Properties, QoS};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_for_message() {
        let message = Message::new("home/door", "open", QoS::AtLeastOnce).with_properties(
            Properties::from([("content-type".to_string(), "text/plain".to_string())]),
        );

        let context = Context::for_message(&message, "router", json!({"state": "open"}));

        assert_eq!(
            Value::Object(context.vars().clone()),
            json!({
                "mqtt": {"client_id": "router"},
                "topic": "home/door",
                "payload": "open",
                "qos": 1,
                "properties": {"content-type": "text/plain"},
                "value": {"state": "open"},
            })
        );
    }

    #[test]
    fn test_layered_overlay_wins() {
        let message = Message::new("real/topic", "on", QoS::AtMostOnce);
        let runtime = Context::for_message(&message, "router", json!("on"));

        let mut vars = Map::new();
        vars.insert("topic".to_string(), json!("fake"));
        vars.insert("room".to_string(), json!("kitchen"));

        let layered = Context::layered(vars, &runtime);

        assert_eq!(layered.get("topic"), Some(&json!("real/topic")));
        assert_eq!(layered.get("room"), Some(&json!("kitchen")));
        assert_eq!(runtime.get("room"), None);
    }
}
