//! Display messages handed to rendering code.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::Display;

use crate::agent_state::{CompletedStatus, PermissionDecision};
use crate::types::{AgentEvent, MessageMeta};

/// Reducer-allocated identifier of a canonical message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn from_string(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ToolState {
    Running,
    Completed,
    Error,
}

impl ToolState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ToolState::Completed | ToolState::Error)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PermissionStatus {
    Pending,
    Approved,
    Denied,
    Canceled,
}

impl From<CompletedStatus> for PermissionStatus {
    fn from(status: CompletedStatus) -> Self {
        match status {
            CompletedStatus::Approved => PermissionStatus::Approved,
            CompletedStatus::Denied => PermissionStatus::Denied,
            CompletedStatus::Canceled => PermissionStatus::Canceled,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolPermission {
    pub id: String,
    pub status: PermissionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_tools: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<PermissionDecision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<u64>,
}

impl ToolPermission {
    pub fn pending(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: PermissionStatus::Pending,
            reason: None,
            mode: None,
            allowed_tools: None,
            decision: None,
            date: None,
        }
    }
}

/// A tool invocation as displayed: call, permission gate and outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub name: String,
    pub state: ToolState,
    pub input: Value,
    pub created_at: u64,
    pub started_at: Option<u64>,
    pub completed_at: Option<u64>,
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission: Option<ToolPermission>,
}

impl ToolCall {
    pub fn running(name: impl Into<String>, input: Value, created_at: u64) -> Self {
        Self {
            name: name.into(),
            state: ToolState::Running,
            input,
            created_at,
            started_at: None,
            completed_at: None,
            description: None,
            result: None,
            permission: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Message {
    UserText {
        id: MessageId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        local_id: Option<String>,
        created_at: u64,
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        meta: Option<MessageMeta>,
    },
    AgentText {
        id: MessageId,
        created_at: u64,
        text: String,
    },
    ToolCall {
        id: MessageId,
        created_at: u64,
        tool: ToolCall,
        children: Vec<Message>,
    },
    AgentEvent {
        id: MessageId,
        created_at: u64,
        event: AgentEvent,
    },
}

impl Message {
    pub fn id(&self) -> &MessageId {
        match self {
            Message::UserText { id, .. }
            | Message::AgentText { id, .. }
            | Message::ToolCall { id, .. }
            | Message::AgentEvent { id, .. } => id,
        }
    }

    pub fn created_at(&self) -> u64 {
        match self {
            Message::UserText { created_at, .. }
            | Message::AgentText { created_at, .. }
            | Message::ToolCall { created_at, .. }
            | Message::AgentEvent { created_at, .. } => *created_at,
        }
    }

    pub fn tool(&self) -> Option<&ToolCall> {
        match self {
            Message::ToolCall { tool, .. } => Some(tool),
            _ => None,
        }
    }

    pub fn children(&self) -> &[Message] {
        match self {
            Message::ToolCall { children, .. } => children,
            _ => &[],
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Message::UserText { text, .. } | Message::AgentText { text, .. } => Some(text),
            _ => None,
        }
    }
}
