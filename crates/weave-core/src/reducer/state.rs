use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::Display;

use crate::message::{MessageId, ToolCall};
use crate::tracer::TracerState;
use crate::types::{AgentEvent, MessageMeta, TASK_TOOL_NAME, Usage};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ReducerRole {
    User,
    Agent,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReducerContent {
    Text {
        text: String,
        meta: Option<MessageMeta>,
    },
    Tool(ToolCall),
    Event(AgentEvent),
}

/// Canonical, identity-stable record behind one display message.
///
/// Records are only ever mutated in place; `created_at` is fixed when the
/// record is allocated.
#[derive(Debug, Clone, PartialEq)]
pub struct ReducerMessage {
    pub id: MessageId,
    /// Last wire id that touched this record.
    pub real_id: Option<String>,
    pub local_id: Option<String>,
    pub created_at: u64,
    pub role: ReducerRole,
    /// Owning sidechain for nested records, `None` for top-level ones.
    pub sidechain_id: Option<String>,
    pub content: ReducerContent,
}

impl ReducerMessage {
    pub fn tool(&self) -> Option<&ToolCall> {
        match &self.content {
            ReducerContent::Tool(tool) => Some(tool),
            _ => None,
        }
    }

    /// True for delegation tool records, the only ones that own a sidechain.
    pub fn is_task(&self) -> bool {
        self.tool().is_some_and(|tool| tool.name == TASK_TOOL_NAME)
    }

    pub fn tool_mut(&mut self) -> Option<&mut ToolCall> {
        match &mut self.content {
            ReducerContent::Tool(tool) => Some(tool),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodoSnapshot {
    pub todos: Value,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub usage: Usage,
    pub context_size: u64,
    pub timestamp: u64,
}

/// Per-conversation reducer state. One instance per conversation; never shared.
#[derive(Debug, Clone, Default)]
pub struct ReducerState {
    pub(crate) messages: IndexMap<MessageId, ReducerMessage>,
    pub(crate) tool_id_to_message_id: HashMap<String, MessageId>,
    message_id_to_tool_id: HashMap<MessageId, String>,
    pub(crate) permission_id_to_message_id: HashMap<String, MessageId>,
    pub(crate) permission_id_to_tool_id: HashMap<String, String>,
    pub(crate) local_ids: HashMap<String, MessageId>,
    /// Wire id -> records created from it (possibly none).
    pub(crate) message_ids: HashMap<String, Vec<MessageId>>,
    pub(crate) sidechains: HashMap<String, Vec<MessageId>>,
    /// Wire id of a Task call -> the Task records it issued.
    task_owners: HashMap<String, Vec<MessageId>>,
    pub(crate) tracer: TracerState,
    pub(crate) latest_todos: Option<TodoSnapshot>,
    pub(crate) latest_usage: Option<UsageSnapshot>,
    next_id: u64,
}

impl ReducerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> impl Iterator<Item = &ReducerMessage> {
        self.messages.values()
    }

    /// Records outside any sidechain, in creation order.
    pub fn top_level(&self) -> impl Iterator<Item = &ReducerMessage> {
        self.messages.values().filter(|m| m.sidechain_id.is_none())
    }

    pub fn message(&self, id: &MessageId) -> Option<&ReducerMessage> {
        self.messages.get(id)
    }

    pub fn message_for_tool(&self, tool_id: &str) -> Option<&ReducerMessage> {
        self.tool_id_to_message_id
            .get(tool_id)
            .and_then(|id| self.messages.get(id))
    }

    pub fn message_for_permission(&self, permission_id: &str) -> Option<&ReducerMessage> {
        self.permission_id_to_message_id
            .get(permission_id)
            .and_then(|id| self.messages.get(id))
    }

    pub fn tool_for_permission(&self, permission_id: &str) -> Option<&str> {
        self.permission_id_to_tool_id
            .get(permission_id)
            .map(String::as_str)
    }

    pub fn permission_tool_links(&self) -> impl Iterator<Item = (&str, &str)> {
        self.permission_id_to_tool_id
            .iter()
            .map(|(perm, tool)| (perm.as_str(), tool.as_str()))
    }

    pub fn has_local_id(&self, local_id: &str) -> bool {
        self.local_ids.contains_key(local_id)
    }

    pub fn has_message_id(&self, message_id: &str) -> bool {
        self.message_ids.contains_key(message_id)
    }

    /// Nested records of the sidechain opened by the Task message `wire_id`.
    pub fn sidechain(&self, wire_id: &str) -> Vec<&ReducerMessage> {
        self.sidechains
            .get(wire_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.messages.get(id))
            .collect()
    }

    pub fn tracer(&self) -> &TracerState {
        &self.tracer
    }

    pub fn latest_todos(&self) -> Option<&TodoSnapshot> {
        self.latest_todos.as_ref()
    }

    pub fn latest_usage(&self) -> Option<&UsageSnapshot> {
        self.latest_usage.as_ref()
    }

    pub(crate) fn allocate_id(&mut self) -> MessageId {
        self.next_id += 1;
        MessageId::from_string(format!("msg-{}", self.next_id))
    }

    pub(crate) fn insert(&mut self, message: ReducerMessage) -> MessageId {
        let id = message.id.clone();
        if let Some(sidechain_id) = &message.sidechain_id {
            self.sidechains
                .entry(sidechain_id.clone())
                .or_default()
                .push(id.clone());
        }
        self.messages.insert(id.clone(), message);
        id
    }

    /// Links `permission_id` to `message_id` and, when known, to `tool_id`.
    pub(crate) fn link_permission(
        &mut self,
        permission_id: &str,
        message_id: &MessageId,
        tool_id: Option<&str>,
    ) {
        self.permission_id_to_message_id
            .insert(permission_id.to_string(), message_id.clone());
        if let Some(tool_id) = tool_id {
            self.permission_id_to_tool_id
                .insert(permission_id.to_string(), tool_id.to_string());
        }
    }

    /// Maps a tool id onto the record holding its call. Task records also
    /// become owners of the sidechain named by their `real_id`.
    pub(crate) fn map_tool(&mut self, tool_id: &str, message_id: &MessageId) {
        self.tool_id_to_message_id
            .insert(tool_id.to_string(), message_id.clone());
        self.message_id_to_tool_id
            .insert(message_id.clone(), tool_id.to_string());

        let Some(record) = self.messages.get(message_id) else {
            return;
        };
        if record.is_task()
            && let Some(real_id) = record.real_id.clone()
        {
            let owners = self.task_owners.entry(real_id).or_default();
            if !owners.contains(message_id) {
                owners.push(message_id.clone());
            }
        }
    }

    /// Moves a top-level record under `sidechain_id`, keeping its identity
    /// and `created_at`.
    pub(crate) fn move_into_sidechain(&mut self, message_id: &MessageId, sidechain_id: &str) {
        let Some(record) = self.messages.get_mut(message_id) else {
            return;
        };
        if record.sidechain_id.is_some() {
            return;
        }
        record.sidechain_id = Some(sidechain_id.to_string());
        self.sidechains
            .entry(sidechain_id.to_string())
            .or_default()
            .push(message_id.clone());
    }

    pub(crate) fn mark_seen(&mut self, wire_id: &str, created: Vec<MessageId>) {
        self.message_ids.insert(wire_id.to_string(), created);
    }

    /// Tool id whose call is held by `message_id`.
    pub(crate) fn tool_id_of(&self, message_id: &MessageId) -> Option<String> {
        self.message_id_to_tool_id.get(message_id).cloned()
    }

    pub(crate) fn is_permission_tool_linked(&self, permission_id: &str) -> bool {
        self.permission_id_to_tool_id.contains_key(permission_id)
    }

    /// `Task` records issued by the wire message `sidechain_id`.
    pub(crate) fn owner_of_sidechain(&self, sidechain_id: &str) -> &[MessageId] {
        self.task_owners
            .get(sidechain_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}
