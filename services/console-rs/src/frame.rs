use serde_json::Value;

use crate::error::{ConsoleError, Result};
use crate::event::Event;

/// Key the feed uses when it reflects a client message back.
pub const ECHO_KEY: &str = "echo";

/// What a single inbound text frame turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Event(Event),
    Echo,
}

/// Decodes one text frame. `received_at` is the receipt time in epoch seconds.
pub fn decode_frame(text: &str, received_at: f64) -> Result<Frame> {
    let value: Value = serde_json::from_str(text)?;
    let fields = match value {
        Value::Object(fields) => fields,
        other => {
            return Err(ConsoleError::Decode(format!(
                "expected a JSON object, got {}",
                kind_of(&other)
            )))
        }
    };

    if fields.get(ECHO_KEY).is_some_and(is_truthy) {
        return Ok(Frame::Echo);
    }
    Ok(Frame::Event(Event::from_payload(fields, received_at)))
}

// JavaScript-style truthiness; `{"echo": ""}` is not an echo.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
