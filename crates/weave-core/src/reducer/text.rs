//! Phase 1: user messages and agent text blocks.

use tracing::trace;

use super::state::{ReducerContent, ReducerMessage, ReducerRole, ReducerState, UsageSnapshot};
use super::{Pass, Rejection};
use crate::tracer::TracedMessage;
use crate::types::{AgentContentKind, MessageBody, NormalizedMessage, Usage};

pub(super) fn apply(state: &mut ReducerState, main_line: &[TracedMessage], pass: &mut Pass) {
    for traced in main_line {
        let message = &traced.message;
        match &message.body {
            MessageBody::User { content, meta } => {
                if is_duplicate_user(state, message) {
                    continue;
                }
                let id = state.allocate_id();
                state.insert(ReducerMessage {
                    id: id.clone(),
                    real_id: Some(message.id.clone()),
                    local_id: message.local_id.clone(),
                    created_at: message.created_at,
                    role: ReducerRole::User,
                    sidechain_id: None,
                    content: ReducerContent::Text {
                        text: content.text.clone(),
                        meta: meta.clone(),
                    },
                });
                if let Some(local_id) = &message.local_id {
                    state.local_ids.insert(local_id.clone(), id.clone());
                }
                state.mark_seen(&message.id, vec![id.clone()]);
                pass.touch(state, &id);
            }
            MessageBody::Agent { content, usage } => {
                if state.message_ids.contains_key(&message.id) {
                    trace!(
                        target: "weave::reducer::text",
                        rejection = %Rejection::Duplicate,
                        id = %message.id,
                        "Agent message already absorbed"
                    );
                    continue;
                }

                let mut created = Vec::new();
                for block in content {
                    if let AgentContentKind::Text { text } = &block.kind {
                        let id = state.allocate_id();
                        state.insert(ReducerMessage {
                            id: id.clone(),
                            real_id: Some(message.id.clone()),
                            local_id: None,
                            created_at: message.created_at,
                            role: ReducerRole::Agent,
                            sidechain_id: None,
                            content: ReducerContent::Text {
                                text: text.clone(),
                                meta: None,
                            },
                        });
                        pass.touch(state, &id);
                        created.push(id);
                    }
                }
                state.mark_seen(&message.id, created);

                if let Some(usage) = usage {
                    record_usage(state, *usage, message.created_at);
                }
            }
            MessageBody::Event { .. } => {}
        }
    }
}

fn is_duplicate_user(state: &ReducerState, message: &NormalizedMessage) -> bool {
    let by_local = message
        .local_id
        .as_ref()
        .is_some_and(|local_id| state.local_ids.contains_key(local_id));
    let duplicate = by_local || state.message_ids.contains_key(&message.id);
    if duplicate {
        trace!(
            target: "weave::reducer::text",
            rejection = %Rejection::Duplicate,
            id = %message.id,
            local_id = ?message.local_id,
            "User message already absorbed"
        );
    }
    duplicate
}

fn record_usage(state: &mut ReducerState, usage: Usage, timestamp: u64) {
    if state
        .latest_usage
        .is_some_and(|latest| latest.timestamp > timestamp)
    {
        return;
    }
    state.latest_usage = Some(UsageSnapshot {
        usage,
        context_size: usage.context_size(),
        timestamp,
    });
}
