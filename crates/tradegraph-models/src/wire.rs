//! Canonical JSON and Server-Sent-Events encoding for analysis state and
//! stream events.
//!
//! Encoding never fails. Rules, applied at every depth:
//! - null fields of a mapping are omitted
//! - primitives pass through (non-finite floats become strings)
//! - sequences and mappings recurse element-wise
//! - message-like values become `{type, content, name?, role?, tool_calls?}`
//! - opaque objects are expanded through their field view, or rendered with
//!   their string description when that fails
//! - containers nested deeper than [`MAX_NESTING_DEPTH`] become strings

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::{Map, Number, Value};

use crate::event::StreamEvent;
use crate::state::{AnalysisState, MessageLike, StateObject, StateValue};

/// Containers (sequences, mappings, opaque objects) nested deeper than this
/// are rendered as strings.
pub const MAX_NESTING_DEPTH: usize = 32;

/// Exact transport encoding of one SSE frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireFrame(String);

impl WireFrame {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for WireFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<WireFrame> for String {
    fn from(frame: WireFrame) -> Self {
        frame.0
    }
}

/// Serialize a full analysis state into a JSON object.
pub fn serialize_state(state: &AnalysisState) -> Value {
    Encoder::default().entries(state.iter())
}

/// Serialize a single state value. A bare null stays `null`; nulls are only
/// dropped where they are mapping fields.
pub fn serialize_value(value: &StateValue) -> Value {
    Encoder::default().value(value)
}

/// Encode an event as `data: <json>\n\n` with null fields stripped.
pub fn serialize(event: &StreamEvent) -> WireFrame {
    let value = serde_json::to_value(event).unwrap_or_else(|e| {
        serde_json::json!({
            "kind": "error",
            "sequence_number": event.sequence_number,
            "payload": {"message": format!("event encoding failed: {e}")},
        })
    });
    let json = serde_json::to_string(&prune_nulls(value)).unwrap_or_else(|_| "{}".to_string());
    WireFrame(format!("data: {json}\n\n"))
}

/// Encode an SSE comment frame, used as a keep-alive marker.
pub fn keep_alive(text: &str) -> WireFrame {
    WireFrame(format!(": {text}\n"))
}

/// Drop null-valued fields from every object in the tree.
pub fn prune_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, prune_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(prune_nulls).collect()),
        other => other,
    }
}

/// Tracks the opaque objects currently being expanded so that a cyclic
/// object graph terminates, and the container depth so that a deep one does.
#[derive(Default)]
struct Encoder {
    path: Vec<*const ()>,
    depth: usize,
}

impl Encoder {
    fn value(&mut self, value: &StateValue) -> Value {
        match value {
            StateValue::Null => Value::Null,
            StateValue::Bool(b) => Value::Bool(*b),
            StateValue::Int(i) => Value::Number((*i).into()),
            StateValue::Float(f) => float(*f),
            StateValue::Text(s) => Value::String(s.clone()),
            StateValue::Sequence(items) if self.depth >= MAX_NESTING_DEPTH => {
                Value::String(format!("<sequence of {}>", items.len()))
            }
            StateValue::Sequence(items) => {
                self.depth += 1;
                let out = Value::Array(items.iter().map(|item| self.value(item)).collect());
                self.depth -= 1;
                out
            }
            StateValue::Mapping(map) if self.depth >= MAX_NESTING_DEPTH => {
                Value::String(format!("<mapping of {}>", map.len()))
            }
            StateValue::Mapping(map) => {
                self.depth += 1;
                let out = self.entries(map.iter());
                self.depth -= 1;
                out
            }
            StateValue::Message(message) => message_record(message),
            StateValue::Opaque(object) => self.object(object),
        }
    }

    fn entries<'a, I>(&mut self, entries: I) -> Value
    where
        I: IntoIterator<Item = (&'a String, &'a StateValue)>,
    {
        let mut out = Map::new();
        for (key, value) in entries {
            if value.is_null() {
                continue;
            }
            out.insert(key.clone(), self.value(value));
        }
        Value::Object(out)
    }

    fn object(&mut self, object: &Arc<dyn StateObject>) -> Value {
        let id = Arc::as_ptr(object) as *const ();
        if self.path.contains(&id) || self.depth >= MAX_NESTING_DEPTH {
            return Value::String(describe(object.as_ref()));
        }

        let fields = match catch_unwind(AssertUnwindSafe(|| object.fields())) {
            Ok(Ok(fields)) => fields,
            _ => return Value::String(describe(object.as_ref())),
        };

        self.path.push(id);
        self.depth += 1;
        let out = self.entries(fields.iter().map(|(k, v)| (k, v)));
        self.depth -= 1;
        self.path.pop();
        out
    }
}

fn message_record(message: &MessageLike) -> Value {
    let mut record = Map::new();
    record.insert(
        "type".to_string(),
        Value::String(message.kind.type_name().to_string()),
    );
    record.insert("content".to_string(), Value::String(message.content_text()));
    if let Some(name) = message.name.as_deref().filter(|n| !n.is_empty()) {
        record.insert("name".to_string(), Value::String(name.to_string()));
    }
    if let Some(role) = &message.role {
        record.insert("role".to_string(), Value::String(role.clone()));
    }
    if !message.tool_calls.is_empty() {
        let calls = message
            .tool_calls
            .iter()
            .map(|call| {
                serde_json::json!({
                    "name": call.name,
                    "args": prune_nulls(call.args.clone()),
                })
            })
            .collect();
        record.insert("tool_calls".to_string(), Value::Array(calls));
    }
    Value::Object(record)
}

fn float(f: f64) -> Value {
    Number::from_f64(f)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(f.to_string()))
}

fn describe(object: &dyn StateObject) -> String {
    catch_unwind(AssertUnwindSafe(|| object.describe()))
        .unwrap_or_else(|_| format!("<{}>", object.type_name()))
}
