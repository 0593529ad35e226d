use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::reflect::to_state_value;

/// The evolving state of one analysis run. Different agents populate
/// different fields, so values are untyped.
pub type AnalysisState = BTreeMap<String, StateValue>;

/// A single value inside an [`AnalysisState`].
#[derive(Debug, Clone, Default)]
pub enum StateValue {
    /// Absence. Dropped from mappings on serialization.
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Sequence(Vec<StateValue>),
    Mapping(BTreeMap<String, StateValue>),
    Message(MessageLike),
    /// An application object the graph knows nothing about.
    Opaque(Arc<dyn StateObject>),
}

impl StateValue {
    pub fn is_null(&self) -> bool {
        matches!(self, StateValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            StateValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[StateValue]> {
        match self {
            StateValue::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn opaque<T: StateObject + 'static>(object: T) -> Self {
        StateValue::Opaque(Arc::new(object))
    }

    pub fn mapping<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, StateValue)>,
    {
        StateValue::Mapping(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl From<&str> for StateValue {
    fn from(value: &str) -> Self {
        StateValue::Text(value.to_string())
    }
}

impl From<String> for StateValue {
    fn from(value: String) -> Self {
        StateValue::Text(value)
    }
}

impl From<bool> for StateValue {
    fn from(value: bool) -> Self {
        StateValue::Bool(value)
    }
}

impl From<i64> for StateValue {
    fn from(value: i64) -> Self {
        StateValue::Int(value)
    }
}

impl From<f64> for StateValue {
    fn from(value: f64) -> Self {
        StateValue::Float(value)
    }
}

impl From<MessageLike> for StateValue {
    fn from(value: MessageLike) -> Self {
        StateValue::Message(value)
    }
}

impl<T: Into<StateValue>> From<Option<T>> for StateValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(StateValue::Null)
    }
}

impl<T: Into<StateValue>> From<Vec<T>> for StateValue {
    fn from(value: Vec<T>) -> Self {
        StateValue::Sequence(value.into_iter().map(Into::into).collect())
    }
}

impl From<serde_json::Value> for StateValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => StateValue::Null,
            serde_json::Value::Bool(b) => StateValue::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => StateValue::Int(i),
                None => StateValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => StateValue::Text(s),
            serde_json::Value::Array(items) => {
                StateValue::Sequence(items.into_iter().map(StateValue::from).collect())
            }
            serde_json::Value::Object(map) => StateValue::Mapping(
                map.into_iter()
                    .map(|(k, v)| (k, StateValue::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Runtime type of a message-like value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    Human,
    Ai,
    System,
    Tool,
    Other(String),
}

impl MessageKind {
    pub fn type_name(&self) -> &str {
        match self {
            MessageKind::Human => "HumanMessage",
            MessageKind::Ai => "AIMessage",
            MessageKind::System => "SystemMessage",
            MessageKind::Tool => "ToolMessage",
            MessageKind::Other(name) => name,
        }
    }
}

/// A structured tool invocation attached to a message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub name: String,
    pub args: serde_json::Value,
}

/// A chat-message-shaped value: content plus optional name, role and tool calls.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageLike {
    pub kind: MessageKind,
    /// Usually a string; agents occasionally emit structured content blocks.
    pub content: Option<serde_json::Value>,
    pub name: Option<String>,
    pub role: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl MessageLike {
    pub fn new(kind: MessageKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: Some(serde_json::Value::String(content.into())),
            name: None,
            role: None,
            tool_calls: Vec::new(),
        }
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self::new(MessageKind::Human, content)
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self::new(MessageKind::Ai, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageKind::System, content)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_tool_call(mut self, name: impl Into<String>, args: serde_json::Value) -> Self {
        self.tool_calls.push(ToolCall {
            name: name.into(),
            args,
        });
        self
    }

    /// Content as plain text; structured content is rendered as compact JSON.
    /// Falsy content (missing, null, empty, zero, false) renders as "".
    pub fn content_text(&self) -> String {
        match &self.content {
            None | Some(serde_json::Value::Null) | Some(serde_json::Value::Bool(false)) => {
                String::new()
            }
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Array(a)) if a.is_empty() => String::new(),
            Some(serde_json::Value::Object(o)) if o.is_empty() => String::new(),
            Some(serde_json::Value::Number(n)) if n.as_f64() == Some(0.0) => String::new(),
            Some(other) => other.to_string(),
        }
    }
}

#[derive(Debug, Error)]
#[error("reflection failed: {0}")]
pub struct ReflectError(pub String);

/// An opaque application object stored in the state.
///
/// Implementors expose a field view when they can; the serializer falls back
/// to [`StateObject::describe`] when [`StateObject::fields`] fails.
pub trait StateObject: fmt::Debug + Send + Sync {
    fn type_name(&self) -> &str;

    fn fields(&self) -> Result<Vec<(String, StateValue)>, ReflectError>;

    fn describe(&self) -> String {
        format!("{self:?}")
    }
}

/// Wraps any `Serialize` type so it can live in the state as an opaque object.
/// Its serde representation doubles as the field view. Non-finite floats are
/// kept as floats.
pub struct Reflected<T> {
    inner: T,
    type_name: &'static str,
}

impl<T> Reflected<T> {
    pub fn new(inner: T) -> Self {
        let full = std::any::type_name::<T>();
        let short = full.rsplit("::").next().unwrap_or(full);
        Self {
            inner,
            type_name: short,
        }
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: fmt::Debug> fmt::Debug for Reflected<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.fmt(f)
    }
}

impl<T> StateObject for Reflected<T>
where
    T: Serialize + fmt::Debug + Send + Sync,
{
    fn type_name(&self) -> &str {
        self.type_name
    }

    fn fields(&self) -> Result<Vec<(String, StateValue)>, ReflectError> {
        match to_state_value(&self.inner)? {
            StateValue::Mapping(map) => Ok(map.into_iter().collect()),
            other => Err(ReflectError(format!(
                "{} has no fields (serializes as {})",
                self.type_name,
                value_kind(&other)
            ))),
        }
    }
}

fn value_kind(value: &StateValue) -> &'static str {
    match value {
        StateValue::Null => "null",
        StateValue::Bool(_) => "bool",
        StateValue::Int(_) | StateValue::Float(_) => "number",
        StateValue::Text(_) => "string",
        StateValue::Sequence(_) => "sequence",
        StateValue::Mapping(_) => "mapping",
        StateValue::Message(_) => "message",
        StateValue::Opaque(_) => "object",
    }
}
