pub mod config;
pub mod event;
mod reflect;
pub mod request;
pub mod state;
pub mod thread;
pub mod wire;

pub use config::{GraphConfig, NodeConfig, ServerConfig, StoreConfig, TradegraphConfig};
pub use event::{EventKind, StreamEvent};
pub use request::{AnalysisRequest, ConversationTurn, TurnRole};
pub use state::{
    AnalysisState, MessageKind, MessageLike, ReflectError, Reflected, StateObject, StateValue,
    ToolCall,
};
pub use thread::{ChatMessage, Thread};
pub use wire::{serialize, serialize_state, WireFrame};
