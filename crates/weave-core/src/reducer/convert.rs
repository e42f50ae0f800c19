//! Materializes display messages from reducer records.

use std::collections::HashSet;

use indexmap::IndexSet;

use super::state::{ReducerContent, ReducerMessage, ReducerRole, ReducerState};
use crate::message::{Message, MessageId};

pub(super) fn collect(state: &ReducerState, changed: &IndexSet<MessageId>) -> Vec<Message> {
    changed
        .iter()
        .filter_map(|id| state.messages.get(id))
        .map(|record| to_message(state, record, &mut HashSet::new()))
        .collect()
}

/// Converts one record. `visiting` holds the tool records on the current
/// path so a self-referencing sidechain terminates.
pub(crate) fn to_message<'a>(
    state: &'a ReducerState,
    record: &'a ReducerMessage,
    visiting: &mut HashSet<&'a MessageId>,
) -> Message {
    match &record.content {
        ReducerContent::Text { text, meta } => match record.role {
            ReducerRole::User => Message::UserText {
                id: record.id.clone(),
                local_id: record.local_id.clone(),
                created_at: record.created_at,
                text: text.clone(),
                meta: meta.clone(),
            },
            ReducerRole::Agent => Message::AgentText {
                id: record.id.clone(),
                created_at: record.created_at,
                text: text.clone(),
            },
        },
        ReducerContent::Tool(tool) => {
            let mut children = Vec::new();
            if record.is_task() && visiting.insert(&record.id) {
                let nested = record
                    .real_id
                    .as_ref()
                    .and_then(|real_id| state.sidechains.get(real_id))
                    .into_iter()
                    .flatten()
                    .filter_map(|id| state.messages.get(id));
                for child in nested {
                    children.push(to_message(state, child, visiting));
                }
                visiting.remove(&record.id);
            }
            Message::ToolCall {
                id: record.id.clone(),
                created_at: record.created_at,
                tool: tool.clone(),
                children,
            }
        }
        ReducerContent::Event(event) => Message::AgentEvent {
            id: record.id.clone(),
            created_at: record.created_at,
            event: event.clone(),
        },
    }
}

impl ReducerState {
    /// Every top-level record as a display message, in creation order.
    pub fn display_messages(&self) -> Vec<Message> {
        self.top_level()
            .map(|record| to_message(self, record, &mut HashSet::new()))
            .collect()
    }
}
