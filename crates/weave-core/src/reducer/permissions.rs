//! Phase 0: folding the permission snapshot into tool records.

use serde_json::{Value, json};
use tracing::{debug, trace};

use super::state::{ReducerContent, ReducerMessage, ReducerRole, ReducerState};
use super::{Pass, Rejection};
use crate::agent_state::{AgentState, CompletedPermissionRequest, CompletedStatus};
use crate::matching::same_invocation;
use crate::message::{MessageId, PermissionStatus, ToolCall, ToolPermission, ToolState};
use crate::tracer::TracedMessage;

pub(super) fn reconcile(
    state: &mut ReducerState,
    agent_state: &AgentState,
    main_line: &[TracedMessage],
    sidechain: &[TracedMessage],
    pass: &mut Pass,
) {
    for (permission_id, request) in agent_state.pending() {
        if agent_state.is_completed(permission_id) {
            continue;
        }
        // Once linked, a pending snapshot carries nothing new; an approval is
        // never downgraded back to pending.
        if state.permission_id_to_message_id.contains_key(permission_id) {
            continue;
        }

        if let Some(message_id) =
            find_unclaimed_tool(state, &request.tool, &request.arguments, true)
        {
            let tool_id = state.tool_id_of(&message_id);
            if let Some(tool) = state.messages.get_mut(&message_id).and_then(|m| m.tool_mut()) {
                tool.permission = Some(ToolPermission::pending(permission_id.clone()));
            }
            state.link_permission(permission_id, &message_id, tool_id.as_deref());
            pass.touch(state, &message_id);
            debug!(
                target: "weave::reducer::permissions",
                permission_id = %permission_id,
                message_id = %message_id,
                "Attached pending permission to existing tool"
            );
            continue;
        }

        let tool = ToolCall {
            permission: Some(ToolPermission::pending(permission_id.clone())),
            ..ToolCall::running(&request.tool, request.arguments.clone(), request.created_at)
        };
        synthesize(state, permission_id, tool, pass);
    }

    for (permission_id, completed) in agent_state.completed() {
        if let Some(message_id) = state.permission_id_to_message_id.get(permission_id).cloned() {
            update_linked(state, permission_id, &message_id, completed, pass);
            continue;
        }

        if let Some(message_id) =
            find_unclaimed_tool(state, &completed.tool, &completed.arguments, false)
        {
            let tool_id = state.tool_id_of(&message_id);
            if let Some(tool) = state.messages.get_mut(&message_id).and_then(|m| m.tool_mut()) {
                apply_completed(tool, permission_id, completed);
            }
            state.link_permission(permission_id, &message_id, tool_id.as_deref());
            pass.touch(state, &message_id);
            continue;
        }

        // The tool call of this permission is in the current batch: let the
        // tool-call phase create the record with the call's own timestamp.
        if batch_has_unmapped_call(state, main_line, &completed.tool, &completed.arguments)
            || batch_has_unmapped_call(state, sidechain, &completed.tool, &completed.arguments)
        {
            trace!(
                target: "weave::reducer::permissions",
                permission_id = %permission_id,
                "Deferring completed permission to its tool call"
            );
            pass.deferred
                .insert(permission_id.clone(), completed.clone());
            continue;
        }

        let tool = completed_placeholder(permission_id, completed);
        synthesize(state, permission_id, tool, pass);
    }
}

/// Creates records for deferred permissions no tool call claimed.
pub(super) fn materialize_deferred(state: &mut ReducerState, pass: &mut Pass) {
    let deferred = std::mem::take(&mut pass.deferred);
    for (permission_id, completed) in deferred {
        let tool = completed_placeholder(&permission_id, &completed);
        synthesize(state, &permission_id, tool, pass);
    }
}

/// Removes and returns the newest deferred permission matching a tool call.
pub(super) fn take_deferred(
    pass: &mut Pass,
    name: &str,
    input: &Value,
) -> Option<(String, CompletedPermissionRequest)> {
    let index = pass
        .deferred
        .iter()
        .enumerate()
        .filter(|(_, (_, completed))| {
            same_invocation(name, input, &completed.tool, &completed.arguments)
        })
        .max_by_key(|(_, (_, completed))| completed.created_at)
        .map(|(index, _)| index)?;
    pass.deferred.shift_remove_index(index)
}

/// Writes a completed decision onto `tool`. A tool that already finished
/// keeps its state and result; only the permission record is filled in.
pub(super) fn apply_completed(
    tool: &mut ToolCall,
    permission_id: &str,
    completed: &CompletedPermissionRequest,
) {
    tool.permission = Some(ToolPermission {
        id: permission_id.to_string(),
        status: completed.status.into(),
        reason: completed.reason.clone(),
        mode: completed.mode.clone(),
        allowed_tools: completed.allowed_tools.clone(),
        decision: completed.decision,
        date: completed.completed_at,
    });

    if tool.state.is_terminal() {
        return;
    }

    match completed.status {
        CompletedStatus::Approved => {}
        CompletedStatus::Denied | CompletedStatus::Canceled => {
            let reason = completed.reason.clone().unwrap_or_else(|| {
                if completed.status == CompletedStatus::Denied {
                    "Permission denied".to_string()
                } else {
                    "Permission canceled".to_string()
                }
            });
            tool.state = ToolState::Error;
            tool.completed_at = Some(completed.completed_at.unwrap_or(completed.created_at));
            tool.result = Some(json!({ "error": reason }));
        }
    }
}

fn completed_placeholder(permission_id: &str, completed: &CompletedPermissionRequest) -> ToolCall {
    let mut tool = ToolCall::running(
        &completed.tool,
        completed.arguments.clone(),
        completed.created_at,
    );
    apply_completed(&mut tool, permission_id, completed);
    tool
}

fn synthesize(state: &mut ReducerState, permission_id: &str, tool: ToolCall, pass: &mut Pass) {
    let id = state.allocate_id();
    debug!(
        target: "weave::reducer::permissions",
        permission_id = %permission_id,
        message_id = %id,
        status = ?tool.permission.as_ref().map(|p| p.status),
        "Synthesized tool record from permission"
    );
    state.insert(ReducerMessage {
        id: id.clone(),
        real_id: None,
        local_id: None,
        created_at: tool.created_at,
        role: ReducerRole::Agent,
        sidechain_id: None,
        content: ReducerContent::Tool(tool),
    });
    state.link_permission(permission_id, &id, None);
    pass.touch(state, &id);
}

fn update_linked(
    state: &mut ReducerState,
    permission_id: &str,
    message_id: &MessageId,
    completed: &CompletedPermissionRequest,
    pass: &mut Pass,
) {
    let Some(tool) = state.messages.get_mut(message_id).and_then(|m| m.tool_mut()) else {
        return;
    };

    if tool.state.is_terminal() {
        trace!(
            target: "weave::reducer::permissions",
            rejection = %Rejection::StalePermissionUpdate,
            permission_id = %permission_id,
            state = %tool.state,
            "Ignoring permission update for finished tool"
        );
        return;
    }

    let status = PermissionStatus::from(completed.status);
    let unchanged = tool.permission.as_ref().is_some_and(|p| {
        p.status == status
            && p.reason == completed.reason
            && p.mode == completed.mode
            && p.allowed_tools == completed.allowed_tools
            && p.decision == completed.decision
    });
    if unchanged {
        return;
    }

    apply_completed(tool, permission_id, completed);
    pass.touch(state, message_id);
}

/// A tool record is unclaimed while no snapshot permission is linked to it.
fn is_unclaimed(state: &ReducerState, message: &ReducerMessage) -> bool {
    message.tool().is_some_and(|tool| match &tool.permission {
        None => true,
        Some(permission) => !state.permission_id_to_message_id.contains_key(&permission.id),
    })
}

/// Finds the tool record a permission describes: running tools first, then the
/// newest by creation time.
fn find_unclaimed_tool(
    state: &ReducerState,
    name: &str,
    arguments: &Value,
    running_only: bool,
) -> Option<MessageId> {
    state
        .messages
        .values()
        .filter(|m| is_unclaimed(state, m))
        .filter_map(|m| m.tool().map(|tool| (m, tool)))
        .filter(|(_, tool)| !running_only || tool.state == ToolState::Running)
        .filter(|(_, tool)| same_invocation(&tool.name, &tool.input, name, arguments))
        .max_by_key(|(_, tool)| (tool.state == ToolState::Running, tool.created_at))
        .map(|(m, _)| m.id.clone())
}

fn batch_has_unmapped_call(
    state: &ReducerState,
    batch: &[TracedMessage],
    name: &str,
    arguments: &Value,
) -> bool {
    batch.iter().any(|traced| {
        traced.message.tool_calls().any(|(tool_id, call_name, input)| {
            !state.tool_id_to_message_id.contains_key(tool_id)
                && same_invocation(call_name, input, name, arguments)
        })
    })
}
