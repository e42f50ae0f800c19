//! Phase 4: records nested under a `Task` tool call.

use tracing::trace;

use super::state::{ReducerContent, ReducerMessage, ReducerRole, ReducerState};
use super::tools::{CallSite, ResultSite, apply_call, apply_result};
use super::{Pass, Rejection};
use crate::message::MessageId;
use crate::tracer::TracedMessage;
use crate::types::{AgentContentKind, MessageBody, NormalizedMessage};

pub(super) fn apply(state: &mut ReducerState, sidechain: &[TracedMessage], pass: &mut Pass) {
    for traced in sidechain {
        let Some(sidechain_id) = traced.sidechain_id.as_deref() else {
            continue;
        };
        let message = &traced.message;
        if state.message_ids.contains_key(&message.id) {
            trace!(
                target: "weave::reducer::sidechain",
                rejection = %Rejection::Duplicate,
                id = %message.id,
                "Sidechain message already absorbed"
            );
            continue;
        }

        let mut created = Vec::new();
        match &message.body {
            MessageBody::User { content, meta } => {
                created.push(push_record(
                    state,
                    message,
                    sidechain_id,
                    ReducerRole::User,
                    ReducerContent::Text {
                        text: content.text.clone(),
                        meta: meta.clone(),
                    },
                ));
            }
            MessageBody::Agent { content, .. } => {
                for block in content {
                    match &block.kind {
                        AgentContentKind::Sidechain { prompt } => {
                            created.push(push_record(
                                state,
                                message,
                                sidechain_id,
                                ReducerRole::User,
                                ReducerContent::Text {
                                    text: prompt.clone(),
                                    meta: None,
                                },
                            ));
                        }
                        AgentContentKind::Text { text } => {
                            created.push(push_record(
                                state,
                                message,
                                sidechain_id,
                                ReducerRole::Agent,
                                ReducerContent::Text {
                                    text: text.clone(),
                                    meta: None,
                                },
                            ));
                        }
                        AgentContentKind::ToolCall {
                            id,
                            name,
                            input,
                            description,
                        } => apply_call(
                            state,
                            pass,
                            &CallSite {
                                message,
                                tool_id: id,
                                name,
                                input,
                                description: description.as_ref(),
                                sidechain_id: Some(sidechain_id),
                            },
                        ),
                        AgentContentKind::ToolResult {
                            tool_use_id,
                            content,
                            is_error,
                            permissions,
                        } => apply_result(
                            state,
                            pass,
                            &ResultSite {
                                message,
                                tool_use_id,
                                content,
                                is_error: *is_error,
                                permissions: permissions.as_ref(),
                            },
                        ),
                        AgentContentKind::Summary { .. } => {}
                    }
                }
            }
            MessageBody::Event { content } => {
                created.push(push_record(
                    state,
                    message,
                    sidechain_id,
                    ReducerRole::Agent,
                    ReducerContent::Event(content.clone()),
                ));
            }
        }

        state.mark_seen(&message.id, created.clone());
        for id in &created {
            pass.touch(state, id);
        }
    }
}

fn push_record(
    state: &mut ReducerState,
    message: &NormalizedMessage,
    sidechain_id: &str,
    role: ReducerRole,
    content: ReducerContent,
) -> MessageId {
    let id = state.allocate_id();
    state.insert(ReducerMessage {
        id,
        real_id: Some(message.id.clone()),
        local_id: None,
        created_at: message.created_at,
        role,
        sidechain_id: Some(sidechain_id.to_string()),
        content,
    })
}
