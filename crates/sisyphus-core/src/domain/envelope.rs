//! Streaming bus messages.
//!
//! Bus payloads are JSON objects. The `event` field is reserved: the value
//! `GLOBAL_SHUTDOWN` is a control signal and never reaches application code.

use serde_json::Value;

/// Reserved event that stops every agent listening on the bus.
pub const GLOBAL_SHUTDOWN: &str = "GLOBAL_SHUTDOWN";

/// A decoded message and the topic it arrived on.
#[derive(Debug, Clone, PartialEq)]
pub struct BusMessage {
    pub topic: String,
    pub body: Value,
}

impl BusMessage {
    pub fn new(topic: impl Into<String>, body: Value) -> Self {
        Self {
            topic: topic.into(),
            body,
        }
    }

    pub fn event(&self) -> Option<&str> {
        self.body.get("event").and_then(Value::as_str)
    }

    pub fn is_shutdown(&self) -> bool {
        self.event() == Some(GLOBAL_SHUTDOWN)
    }
}

/// What the consumer loop should do with one record.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Empty or falsy payload.
    Skip,
    Shutdown,
    Deliver(BusMessage),
}

impl Inbound {
    pub fn decode(topic: &str, payload: &[u8]) -> Result<Self, serde_json::Error> {
        if payload.iter().all(u8::is_ascii_whitespace) {
            return Ok(Inbound::Skip);
        }
        let body: Value = serde_json::from_slice(payload)?;
        if is_falsy(&body) {
            return Ok(Inbound::Skip);
        }
        let message = BusMessage::new(topic, body);
        if message.is_shutdown() {
            Ok(Inbound::Shutdown)
        } else {
            Ok(Inbound::Deliver(message))
        }
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
    }
}
