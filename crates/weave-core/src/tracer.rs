//! Sidechain classification.
//!
//! The tracer splits each incoming batch into main-line messages and messages
//! that belong to a nested conversation spawned by a `Task` tool call. Sidechain
//! membership is reconstructed from `uuid`/`parent_uuid` links, which may arrive
//! in any order: a message whose parent has not been seen yet is held back as
//! an orphan and released once the parent resolves.

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use tracing::{debug, trace};

use crate::types::{AgentContentKind, NormalizedMessage, TASK_TOOL_NAME};

#[derive(Debug, Clone, PartialEq)]
pub struct TracedMessage {
    pub message: NormalizedMessage,
    /// Wire id of the `Task` message owning the sidechain, if any.
    pub sidechain_id: Option<String>,
}

impl TracedMessage {
    fn main_line(message: NormalizedMessage) -> Self {
        Self {
            message,
            sidechain_id: None,
        }
    }

    fn in_sidechain(message: NormalizedMessage, sidechain_id: String) -> Self {
        Self {
            message,
            sidechain_id: Some(sidechain_id),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TracerState {
    /// Task prompt text -> wire id of the message that issued it.
    task_prompts: HashMap<String, String>,
    /// Content uuid -> sidechain id it was resolved to.
    resolved_uuids: HashMap<String, String>,
    /// Parent uuid -> messages waiting for it, in arrival order.
    orphans: HashMap<String, Vec<NormalizedMessage>>,
    /// Wire ids currently held in `orphans`.
    buffered: HashSet<String>,
    processed: HashSet<String>,
}

impl TracerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_processed(&self, message_id: &str) -> bool {
        self.processed.contains(message_id)
    }

    pub fn orphan_count(&self) -> usize {
        self.buffered.len()
    }

    pub fn sidechain_for_uuid(&self, uuid: &str) -> Option<&str> {
        self.resolved_uuids.get(uuid).map(String::as_str)
    }

    fn register_task_prompts(&mut self, message: &NormalizedMessage) {
        for (_, name, input) in message.tool_calls() {
            if name != TASK_TOOL_NAME {
                continue;
            }
            if let Some(Value::String(prompt)) = input.get("prompt") {
                if let Some(previous) = self.task_prompts.insert(prompt.clone(), message.id.clone())
                    && previous != message.id
                {
                    debug!(
                        target: "weave::tracer",
                        previous = %previous,
                        current = %message.id,
                        "Task prompt re-registered, newest Task claims the sidechain"
                    );
                }
            }
        }
    }

    fn root_sidechain(&self, message: &NormalizedMessage) -> Option<String> {
        message.agent_content().iter().find_map(|block| match &block.kind {
            AgentContentKind::Sidechain { prompt } => self.task_prompts.get(prompt).cloned(),
            _ => None,
        })
    }

    fn resolve(&mut self, message: &NormalizedMessage, sidechain_id: &str) {
        for block in message.agent_content() {
            self.resolved_uuids
                .insert(block.uuid.clone(), sidechain_id.to_string());
        }
    }

    /// Emits `message` tagged with `sidechain_id`, then every orphan that
    /// transitively hangs off it, depth-first in arrival order.
    fn release(
        &mut self,
        message: NormalizedMessage,
        sidechain_id: String,
        out: &mut Vec<TracedMessage>,
    ) {
        let mut stack = vec![(message, sidechain_id)];

        while let Some((message, sidechain_id)) = stack.pop() {
            self.resolve(&message, &sidechain_id);
            self.processed.insert(message.id.clone());

            let mut waiting = Vec::new();
            for block in message.agent_content() {
                if let Some(bucket) = self.orphans.remove(&block.uuid) {
                    waiting.extend(bucket);
                }
            }
            out.push(TracedMessage::in_sidechain(message, sidechain_id.clone()));

            for orphan in waiting.into_iter().rev() {
                self.buffered.remove(&orphan.id);
                trace!(target: "weave::tracer", id = %orphan.id, "Releasing orphan");
                stack.push((orphan, sidechain_id.clone()));
            }
        }
    }
}

/// Classifies a batch, updating `state` incrementally.
///
/// Messages already emitted by an earlier call are skipped. Sidechain messages
/// whose parent is unknown are withheld until a later call resolves it.
pub fn trace_messages(
    state: &mut TracerState,
    messages: Vec<NormalizedMessage>,
) -> Vec<TracedMessage> {
    let mut out = Vec::with_capacity(messages.len());

    for message in messages {
        if state.processed.contains(&message.id) || state.buffered.contains(&message.id) {
            trace!(target: "weave::tracer", id = %message.id, "Skipping already traced message");
            continue;
        }

        state.register_task_prompts(&message);

        if !message.is_sidechain {
            state.processed.insert(message.id.clone());
            out.push(TracedMessage::main_line(message));
            continue;
        }

        if let Some(sidechain_id) = state.root_sidechain(&message) {
            debug!(
                target: "weave::tracer",
                id = %message.id,
                sidechain_id = %sidechain_id,
                "Sidechain root matched Task prompt"
            );
            state.release(message, sidechain_id, &mut out);
            continue;
        }

        let parent_uuid = message
            .agent_content()
            .first()
            .and_then(|block| block.parent_uuid.clone());

        match parent_uuid {
            Some(parent_uuid) => {
                if let Some(sidechain_id) = state.resolved_uuids.get(&parent_uuid).cloned() {
                    state.release(message, sidechain_id, &mut out);
                } else {
                    trace!(
                        target: "weave::tracer",
                        id = %message.id,
                        parent_uuid = %parent_uuid,
                        "Buffering orphaned sidechain message"
                    );
                    state.buffered.insert(message.id.clone());
                    state.orphans.entry(parent_uuid).or_default().push(message);
                }
            }
            None => {
                state.processed.insert(message.id.clone());
                out.push(TracedMessage::main_line(message));
            }
        }
    }

    out
}
