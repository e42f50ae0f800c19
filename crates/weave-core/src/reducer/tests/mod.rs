//! Reducer tests.
//!
//! - Scenario tests: hand-written conversations covering permission linkage,
//!   deduplication and sidechain nesting
//! - Property tests: proptest-driven invariants over random batches

mod property;

use serde_json::{Value, json};

use crate::agent_state::{AgentState, CompletedPermissionRequest, CompletedStatus};
use crate::message::{Message, ToolCall};
use crate::reducer::{ReducerMessage, ReducerState};
use crate::types::{AgentContent, NormalizedMessage, TASK_TOOL_NAME};

pub(super) fn ls() -> Value {
    json!({ "command": "ls" })
}

pub(super) fn tool_call_message(
    id: &str,
    created_at: u64,
    tool_id: &str,
    name: &str,
    input: Value,
) -> NormalizedMessage {
    NormalizedMessage::agent(
        id,
        created_at,
        vec![AgentContent::tool_call(format!("{id}-uuid"), tool_id, name, input)],
    )
}

pub(super) fn bash_call(id: &str, created_at: u64, tool_id: &str) -> NormalizedMessage {
    tool_call_message(id, created_at, tool_id, "Bash", ls())
}

pub(super) fn tool_result_message(
    id: &str,
    created_at: u64,
    tool_use_id: &str,
    content: Value,
) -> NormalizedMessage {
    NormalizedMessage::agent(
        id,
        created_at,
        vec![AgentContent::tool_result(
            format!("{id}-uuid"),
            tool_use_id,
            content,
            false,
        )],
    )
}

pub(super) fn task_call(id: &str, created_at: u64, tool_id: &str, prompt: &str) -> NormalizedMessage {
    tool_call_message(
        id,
        created_at,
        tool_id,
        TASK_TOOL_NAME,
        json!({ "prompt": prompt, "description": "delegate" }),
    )
}

pub(super) fn sidechain_root(id: &str, created_at: u64, uuid: &str, prompt: &str) -> NormalizedMessage {
    NormalizedMessage::agent(id, created_at, vec![AgentContent::sidechain(uuid, prompt)]).sidechain()
}

pub(super) fn sidechain_text(
    id: &str,
    created_at: u64,
    uuid: &str,
    parent: &str,
    text: &str,
) -> NormalizedMessage {
    NormalizedMessage::agent(
        id,
        created_at,
        vec![AgentContent::text(uuid, text).with_parent(parent)],
    )
    .sidechain()
}

/// A `Bash` call issued inside the sidechain below `parent`.
pub(super) fn sidechain_bash_call(
    id: &str,
    created_at: u64,
    uuid: &str,
    parent: &str,
    tool_id: &str,
    input: Value,
) -> NormalizedMessage {
    NormalizedMessage::agent(
        id,
        created_at,
        vec![AgentContent::tool_call(uuid, tool_id, "Bash", input).with_parent(parent)],
    )
    .sidechain()
}

pub(super) fn completed(created_at: u64, status: CompletedStatus) -> CompletedPermissionRequest {
    CompletedPermissionRequest::new("Bash", ls(), created_at, status)
}

pub(super) fn approved_state(entries: &[(&str, u64)]) -> AgentState {
    entries.iter().fold(AgentState::default(), |state, (id, created_at)| {
        state.with_completed(*id, completed(*created_at, CompletedStatus::Approved))
    })
}

pub(super) fn top_level_tools(state: &ReducerState) -> Vec<&ReducerMessage> {
    state.top_level().filter(|m| m.tool().is_some()).collect()
}

pub(super) fn tool_of(message: &Message) -> &ToolCall {
    match message.tool() {
        Some(tool) => tool,
        None => panic!("expected tool-call message, got {message:?}"),
    }
}
