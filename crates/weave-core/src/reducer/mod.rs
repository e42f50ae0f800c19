//! The reconciliation state machine.
//!
//! [`reduce`] folds a batch of normalized messages and an optional permission
//! snapshot into the conversation's [`ReducerState`] and returns the display
//! messages created or mutated by this call. Each call runs six fixed phases:
//!
//! 0. permission reconciliation against the snapshot
//! 1. user and agent text
//! 2. tool calls
//! 3. tool results
//! 4. sidechain records
//! 5. agent events
//!
//! Nothing here fails: duplicates, unmatched results and stale permission
//! updates are dropped and only logged.

mod convert;
mod events;
mod permissions;
mod sidechain;
pub mod state;
mod text;
mod tools;

#[cfg(test)]
mod tests;

use std::collections::HashSet;

use indexmap::{IndexMap, IndexSet};
use strum_macros::Display;
use tracing::debug;

use crate::agent_state::{AgentState, CompletedPermissionRequest};
use crate::message::{Message, MessageId};
use crate::tracer::{TracedMessage, trace_messages};
use crate::types::NormalizedMessage;

pub use state::{
    ReducerContent, ReducerMessage, ReducerRole, ReducerState, TodoSnapshot, UsageSnapshot,
};

/// Input the reducer recognizes and deliberately drops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum Rejection {
    /// Already absorbed by local id, wire id or tool id.
    Duplicate,
    /// Tool result without a live, running tool call.
    UnmatchedResult,
    /// Permission update for a tool that already finished.
    StalePermissionUpdate,
    /// Several equally good pairings; the newest one was taken.
    AmbiguousMatch,
}

/// Scratch space for a single [`reduce`] call.
#[derive(Debug, Default)]
pub(crate) struct Pass {
    changed: IndexSet<MessageId>,
    /// Completed permissions whose tool call arrives in this batch.
    deferred: IndexMap<String, CompletedPermissionRequest>,
}

impl Pass {
    /// Records a mutation. Sidechain records surface through the tool
    /// message(s) owning their sidechain, never on their own.
    pub(crate) fn touch(&mut self, state: &ReducerState, id: &MessageId) {
        let mut pending = vec![id.clone()];
        let mut seen = HashSet::new();

        while let Some(id) = pending.pop() {
            if !seen.insert(id.clone()) {
                continue;
            }
            match state
                .messages
                .get(&id)
                .and_then(|m| m.sidechain_id.as_deref())
            {
                Some(sidechain_id) => {
                    pending.extend(state.owner_of_sidechain(sidechain_id).iter().cloned());
                }
                None => {
                    self.changed.insert(id);
                }
            }
        }
    }

    /// Re-records a record that just moved into a sidechain: it leaves the
    /// top-level delta and surfaces through its new owner instead.
    pub(crate) fn touch_moved(&mut self, state: &ReducerState, id: &MessageId) {
        self.changed.shift_remove(id);
        self.touch(state, id);
    }
}

/// Reduces one batch into `state`, returning the changed display messages.
///
/// Safe to call repeatedly with overlapping input: once everything has been
/// absorbed, further calls with the same arguments return an empty delta.
pub fn reduce(
    state: &mut ReducerState,
    messages: Vec<NormalizedMessage>,
    agent_state: Option<&AgentState>,
) -> Vec<Message> {
    let traced = trace_messages(&mut state.tracer, messages);
    let (sidechain, main_line): (Vec<TracedMessage>, Vec<TracedMessage>) =
        traced.into_iter().partition(|t| t.sidechain_id.is_some());

    let mut pass = Pass::default();

    if let Some(agent_state) = agent_state {
        permissions::reconcile(state, agent_state, &main_line, &sidechain, &mut pass);
    }
    text::apply(state, &main_line, &mut pass);
    tools::apply_calls(state, &main_line, &mut pass);
    tools::apply_results(state, &main_line, &mut pass);
    sidechain::apply(state, &sidechain, &mut pass);
    permissions::materialize_deferred(state, &mut pass);
    events::apply(state, &main_line, &mut pass);

    let delta = convert::collect(state, &pass.changed);
    debug!(
        target: "weave::reducer",
        main_line = main_line.len(),
        sidechain = sidechain.len(),
        changed = delta.len(),
        "Reduced batch"
    );
    delta
}
