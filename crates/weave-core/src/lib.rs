// Conversation reconciliation without transport or UI dependencies

pub mod agent_state;
pub mod matching;
pub mod message;
pub mod reducer;
pub mod tracer;
pub mod types;

pub use agent_state::{
    AgentState, CompletedPermissionRequest, CompletedStatus, PermissionDecision,
    PermissionRequest,
};
pub use message::{Message, MessageId, PermissionStatus, ToolCall, ToolPermission, ToolState};
pub use reducer::{ReducerState, Rejection, reduce};
pub use tracer::{TracedMessage, TracerState, trace_messages};
pub use types::{AgentContent, AgentContentKind, AgentEvent, NormalizedMessage, Usage};
