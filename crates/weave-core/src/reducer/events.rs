//! Phase 5: main-line agent events.

use tracing::trace;

use super::state::{ReducerContent, ReducerMessage, ReducerRole, ReducerState};
use super::{Pass, Rejection};
use crate::tracer::TracedMessage;
use crate::types::MessageBody;

pub(super) fn apply(state: &mut ReducerState, main_line: &[TracedMessage], pass: &mut Pass) {
    for traced in main_line {
        let message = &traced.message;
        let MessageBody::Event { content } = &message.body else {
            continue;
        };
        if state.message_ids.contains_key(&message.id) {
            trace!(
                target: "weave::reducer::events",
                rejection = %Rejection::Duplicate,
                id = %message.id,
                "Event already absorbed"
            );
            continue;
        }

        let id = state.allocate_id();
        state.insert(ReducerMessage {
            id: id.clone(),
            real_id: Some(message.id.clone()),
            local_id: None,
            created_at: message.created_at,
            role: ReducerRole::Agent,
            sidechain_id: None,
            content: ReducerContent::Event(content.clone()),
        });
        state.mark_seen(&message.id, vec![id.clone()]);
        pass.touch(state, &id);
    }
}
