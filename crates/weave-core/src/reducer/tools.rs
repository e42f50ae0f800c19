//! Phases 2 and 3: tool calls and their results.

use serde_json::Value;
use tracing::{debug, trace};

use super::permissions::{apply_completed, take_deferred};
use super::state::{ReducerContent, ReducerMessage, ReducerRole, ReducerState, TodoSnapshot};
use super::{Pass, Rejection};
use crate::matching::same_invocation;
use crate::message::{MessageId, PermissionStatus, ToolCall, ToolPermission, ToolState};
use crate::tracer::TracedMessage;
use crate::types::{
    AgentContentKind, NormalizedMessage, PermissionOutcome, TODO_WRITE_TOOL_NAME,
    ToolResultPermission,
};

/// One `tool-call` block together with the message that carried it.
pub(super) struct CallSite<'a> {
    pub message: &'a NormalizedMessage,
    pub tool_id: &'a str,
    pub name: &'a str,
    pub input: &'a Value,
    pub description: Option<&'a String>,
    pub sidechain_id: Option<&'a str>,
}

/// One `tool-result` block together with the message that carried it.
pub(super) struct ResultSite<'a> {
    pub message: &'a NormalizedMessage,
    pub tool_use_id: &'a str,
    pub content: &'a Value,
    pub is_error: bool,
    pub permissions: Option<&'a ToolResultPermission>,
}

pub(super) fn apply_calls(state: &mut ReducerState, main_line: &[TracedMessage], pass: &mut Pass) {
    for traced in main_line {
        let message = &traced.message;
        for block in message.agent_content() {
            if let AgentContentKind::ToolCall {
                id,
                name,
                input,
                description,
            } = &block.kind
            {
                apply_call(
                    state,
                    pass,
                    &CallSite {
                        message,
                        tool_id: id,
                        name,
                        input,
                        description: description.as_ref(),
                        sidechain_id: None,
                    },
                );
            }
        }
    }
}

pub(super) fn apply_results(
    state: &mut ReducerState,
    main_line: &[TracedMessage],
    pass: &mut Pass,
) {
    for traced in main_line {
        let message = &traced.message;
        for block in message.agent_content() {
            if let AgentContentKind::ToolResult {
                tool_use_id,
                content,
                is_error,
                permissions,
            } = &block.kind
            {
                apply_result(
                    state,
                    pass,
                    &ResultSite {
                        message,
                        tool_use_id,
                        content,
                        is_error: *is_error,
                        permissions: permissions.as_ref(),
                    },
                );
            }
        }
    }
}

/// Creates or links the record for a tool call. A tool id is only ever
/// materialized once.
pub(super) fn apply_call(state: &mut ReducerState, pass: &mut Pass, call: &CallSite<'_>) {
    if state.tool_id_to_message_id.contains_key(call.tool_id) {
        trace!(
            target: "weave::reducer::tools",
            rejection = %Rejection::Duplicate,
            tool_id = %call.tool_id,
            "Tool call already mapped"
        );
        return;
    }

    track_todos(state, call);

    if let Some((message_id, permission_id)) = newest_placeholder(state, call.name, call.input) {
        if let Some(record) = state.messages.get_mut(&message_id) {
            record.real_id = Some(call.message.id.clone());
            if let Some(tool) = record.tool_mut() {
                tool.started_at = Some(call.message.created_at);
                if call.description.is_some() {
                    tool.description = call.description.cloned();
                }
            }
        }
        state.map_tool(call.tool_id, &message_id);
        state
            .permission_id_to_tool_id
            .insert(permission_id.clone(), call.tool_id.to_string());
        match call.sidechain_id {
            // Permissions of nested calls surface at the top level first;
            // the record follows its call into the sidechain.
            Some(sidechain_id) => {
                state.move_into_sidechain(&message_id, sidechain_id);
                pass.touch_moved(state, &message_id);
            }
            None => pass.touch(state, &message_id),
        }
        debug!(
            target: "weave::reducer::tools",
            tool_id = %call.tool_id,
            permission_id = %permission_id,
            message_id = %message_id,
            sidechain_id = ?call.sidechain_id,
            "Linked tool call to permission record"
        );
        return;
    }

    let mut tool = ToolCall {
        started_at: Some(call.message.created_at),
        description: call.description.cloned(),
        ..ToolCall::running(call.name, call.input.clone(), call.message.created_at)
    };

    let deferred = take_deferred(pass, call.name, call.input);
    if let Some((permission_id, completed)) = &deferred {
        apply_completed(&mut tool, permission_id, completed);
    }

    let id = state.allocate_id();
    state.insert(ReducerMessage {
        id: id.clone(),
        real_id: Some(call.message.id.clone()),
        local_id: None,
        created_at: call.message.created_at,
        role: ReducerRole::Agent,
        sidechain_id: call.sidechain_id.map(str::to_string),
        content: ReducerContent::Tool(tool),
    });
    state.map_tool(call.tool_id, &id);
    if let Some((permission_id, _)) = deferred {
        state.link_permission(&permission_id, &id, Some(call.tool_id));
    }
    pass.touch(state, &id);
}

/// Completes a running tool. Results for unknown or finished tools are dropped.
pub(super) fn apply_result(state: &mut ReducerState, pass: &mut Pass, result: &ResultSite<'_>) {
    let Some(message_id) = state.tool_id_to_message_id.get(result.tool_use_id).cloned() else {
        trace!(
            target: "weave::reducer::tools",
            rejection = %Rejection::UnmatchedResult,
            tool_use_id = %result.tool_use_id,
            "Result for unknown tool call"
        );
        return;
    };
    let Some(tool) = state.messages.get_mut(&message_id).and_then(|m| m.tool_mut()) else {
        return;
    };
    if tool.state != ToolState::Running {
        trace!(
            target: "weave::reducer::tools",
            rejection = %Rejection::UnmatchedResult,
            tool_use_id = %result.tool_use_id,
            state = %tool.state,
            "Result for finished tool call"
        );
        return;
    }

    tool.state = if result.is_error {
        ToolState::Error
    } else {
        ToolState::Completed
    };
    tool.result = Some(result.content.clone());
    tool.completed_at = Some(result.message.created_at);
    if let Some(permissions) = result.permissions {
        record_result_permission(tool, result.tool_use_id, permissions);
    }
    pass.touch(state, &message_id);
}

/// The agent reports the decision it acted on alongside the result; keep it
/// unless the snapshot already delivered a final one.
fn record_result_permission(tool: &mut ToolCall, tool_use_id: &str, reported: &ToolResultPermission) {
    let status = match reported.result {
        PermissionOutcome::Approved => PermissionStatus::Approved,
        PermissionOutcome::Denied => PermissionStatus::Denied,
    };
    let permission = tool
        .permission
        .get_or_insert_with(|| ToolPermission::pending(tool_use_id));
    if permission.status == PermissionStatus::Pending {
        permission.status = status;
    }
    if permission.date.is_none() {
        permission.date = reported.date;
    }
    if permission.mode.is_none() {
        permission.mode.clone_from(&reported.mode);
    }
    if permission.allowed_tools.is_none() {
        permission.allowed_tools.clone_from(&reported.allowed_tools);
    }
    if permission.decision.is_none() {
        permission.decision = reported.decision;
    }
}

/// Newest permission-created record for this invocation that no tool call
/// has claimed yet.
fn newest_placeholder(
    state: &ReducerState,
    name: &str,
    input: &Value,
) -> Option<(MessageId, String)> {
    let candidates: Vec<(&ReducerMessage, &ToolPermission, u64)> = state
        .messages
        .values()
        .filter(|m| m.sidechain_id.is_none())
        .filter_map(|m| {
            let tool = m.tool()?;
            let permission = tool.permission.as_ref()?;
            Some((m, tool, permission))
        })
        .filter(|(_, _, permission)| {
            state.permission_id_to_message_id.contains_key(&permission.id)
                && !state.is_permission_tool_linked(&permission.id)
        })
        .filter(|(_, tool, _)| same_invocation(&tool.name, &tool.input, name, input))
        .map(|(m, tool, permission)| (m, permission, tool.created_at))
        .collect();

    let newest = candidates.iter().map(|(_, _, created_at)| *created_at).max()?;
    let mut tied = candidates.iter().filter(|(_, _, created_at)| *created_at == newest);
    let (message, permission, _) = tied.next_back()?;
    if candidates.len() > 1 {
        debug!(
            target: "weave::reducer::tools",
            rejection = %Rejection::AmbiguousMatch,
            candidates = candidates.len(),
            permission_id = %permission.id,
            "Several permissions match tool call, taking the newest"
        );
    }
    Some((message.id.clone(), permission.id.clone()))
}

fn track_todos(state: &mut ReducerState, call: &CallSite<'_>) {
    if call.name != TODO_WRITE_TOOL_NAME {
        return;
    }
    let Some(todos) = call.input.get("todos").filter(|t| t.is_array()) else {
        return;
    };
    let timestamp = call.message.created_at;
    if state
        .latest_todos
        .as_ref()
        .is_some_and(|latest| latest.timestamp > timestamp)
    {
        return;
    }
    state.latest_todos = Some(TodoSnapshot {
        todos: todos.clone(),
        timestamp,
    });
}
