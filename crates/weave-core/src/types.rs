//! Normalized input messages.
//!
//! These are the values handed to the tracer and reducer. They are produced by
//! a separate normalization layer from raw wire records; this crate accepts them
//! in their serde form and never inspects the raw records.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name of the delegation tool whose prompt opens a sidechain.
pub const TASK_TOOL_NAME: &str = "Task";

/// Name of the tool whose input carries the agent's todo list.
pub const TODO_WRITE_TOOL_NAME: &str = "TodoWrite";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NormalizedMessage {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_id: Option<String>,
    pub created_at: u64,
    #[serde(default)]
    pub is_sidechain: bool,
    #[serde(flatten)]
    pub body: MessageBody,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum MessageBody {
    User {
        content: UserText,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        meta: Option<MessageMeta>,
    },
    Agent {
        content: Vec<AgentContent>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<Usage>,
    },
    Event {
        content: AgentEvent,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserText {
    pub text: String,
}

/// Client-side metadata attached to a user message when it was sent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MessageMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_from: Option<String>,
    /// Text to show instead of the literal prompt (e.g. for slash commands).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentContent {
    pub uuid: String,
    #[serde(default)]
    pub parent_uuid: Option<String>,
    #[serde(flatten)]
    pub kind: AgentContentKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AgentContentKind {
    Text {
        text: String,
    },
    ToolCall {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    ToolResult {
        tool_use_id: String,
        #[serde(default)]
        content: Value,
        #[serde(default)]
        is_error: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        permissions: Option<ToolResultPermission>,
    },
    Summary {
        summary: String,
    },
    Sidechain {
        prompt: String,
    },
}

/// Permission decision reported by the agent together with a tool result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResultPermission {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<u64>,
    pub result: PermissionOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_tools: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<crate::agent_state::PermissionDecision>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PermissionOutcome {
    Approved,
    Denied,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_creation_input_tokens: u64,
    #[serde(default)]
    pub cache_read_input_tokens: u64,
}

impl Usage {
    /// Tokens occupying the model context for this turn.
    pub fn context_size(&self) -> u64 {
        self.input_tokens
            .saturating_add(self.cache_creation_input_tokens)
            .saturating_add(self.cache_read_input_tokens)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AgentEvent {
    Switch { mode: String },
    Message { message: String },
    LimitReached { ends_at: u64 },
    Ready,
}

impl NormalizedMessage {
    pub fn user(id: impl Into<String>, created_at: u64, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            local_id: None,
            created_at,
            is_sidechain: false,
            body: MessageBody::User {
                content: UserText { text: text.into() },
                meta: None,
            },
        }
    }

    pub fn agent(id: impl Into<String>, created_at: u64, content: Vec<AgentContent>) -> Self {
        Self {
            id: id.into(),
            local_id: None,
            created_at,
            is_sidechain: false,
            body: MessageBody::Agent {
                content,
                usage: None,
            },
        }
    }

    pub fn event(id: impl Into<String>, created_at: u64, event: AgentEvent) -> Self {
        Self {
            id: id.into(),
            local_id: None,
            created_at,
            is_sidechain: false,
            body: MessageBody::Event { content: event },
        }
    }

    pub fn with_local_id(mut self, local_id: impl Into<String>) -> Self {
        self.local_id = Some(local_id.into());
        self
    }

    pub fn with_usage(mut self, value: Usage) -> Self {
        if let MessageBody::Agent { usage, .. } = &mut self.body {
            *usage = Some(value);
        }
        self
    }

    pub fn sidechain(mut self) -> Self {
        self.is_sidechain = true;
        self
    }

    /// Agent content blocks, empty for user and event messages.
    pub fn agent_content(&self) -> &[AgentContent] {
        match &self.body {
            MessageBody::Agent { content, .. } => content,
            MessageBody::User { .. } | MessageBody::Event { .. } => &[],
        }
    }

    /// Tool calls carried by this message as `(id, name, input)`.
    pub fn tool_calls(&self) -> impl Iterator<Item = (&str, &str, &Value)> {
        self.agent_content().iter().filter_map(|block| match &block.kind {
            AgentContentKind::ToolCall {
                id, name, input, ..
            } => Some((id.as_str(), name.as_str(), input)),
            _ => None,
        })
    }
}

impl AgentContent {
    pub fn new(uuid: impl Into<String>, kind: AgentContentKind) -> Self {
        Self {
            uuid: uuid.into(),
            parent_uuid: None,
            kind,
        }
    }

    pub fn text(uuid: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(uuid, AgentContentKind::Text { text: text.into() })
    }

    pub fn tool_call(
        uuid: impl Into<String>,
        id: impl Into<String>,
        name: impl Into<String>,
        input: Value,
    ) -> Self {
        Self::new(
            uuid,
            AgentContentKind::ToolCall {
                id: id.into(),
                name: name.into(),
                input,
                description: None,
            },
        )
    }

    pub fn tool_result(
        uuid: impl Into<String>,
        tool_use_id: impl Into<String>,
        content: Value,
        is_error: bool,
    ) -> Self {
        Self::new(
            uuid,
            AgentContentKind::ToolResult {
                tool_use_id: tool_use_id.into(),
                content,
                is_error,
                permissions: None,
            },
        )
    }

    pub fn sidechain(uuid: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self::new(
            uuid,
            AgentContentKind::Sidechain {
                prompt: prompt.into(),
            },
        )
    }

    pub fn with_parent(mut self, parent_uuid: impl Into<String>) -> Self {
        self.parent_uuid = Some(parent_uuid.into());
        self
    }
}
