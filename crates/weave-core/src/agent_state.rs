//! Permission snapshot supplied by the authorization subsystem.
//!
//! An [`AgentState`] is always the complete current view, never a diff. The
//! same permission id may move from `requests` to `completed_requests` between
//! snapshots, or show up completed without ever having been seen pending.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::Display;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AgentState {
    #[serde(default)]
    pub requests: Option<IndexMap<String, PermissionRequest>>,
    #[serde(default)]
    pub completed_requests: Option<IndexMap<String, CompletedPermissionRequest>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PermissionRequest {
    pub tool: String,
    #[serde(default)]
    pub arguments: Value,
    #[serde(default)]
    pub created_at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletedPermissionRequest {
    pub tool: String,
    #[serde(default)]
    pub arguments: Value,
    #[serde(default)]
    pub created_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<u64>,
    pub status: CompletedStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_tools: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<PermissionDecision>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CompletedStatus {
    Approved,
    Denied,
    Canceled,
}

/// How the user answered a permission prompt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PermissionDecision {
    Approved,
    ApprovedForSession,
    Denied,
    Abort,
}

impl AgentState {
    /// Pending requests, treating a missing map as empty.
    pub fn pending(&self) -> impl Iterator<Item = (&String, &PermissionRequest)> {
        self.requests.iter().flat_map(IndexMap::iter)
    }

    /// Completed requests, treating a missing map as empty.
    pub fn completed(&self) -> impl Iterator<Item = (&String, &CompletedPermissionRequest)> {
        self.completed_requests.iter().flat_map(IndexMap::iter)
    }

    pub fn is_completed(&self, permission_id: &str) -> bool {
        self.completed_requests
            .as_ref()
            .is_some_and(|completed| completed.contains_key(permission_id))
    }

    pub fn with_request(mut self, id: impl Into<String>, request: PermissionRequest) -> Self {
        self.requests
            .get_or_insert_with(IndexMap::new)
            .insert(id.into(), request);
        self
    }

    pub fn with_completed(
        mut self,
        id: impl Into<String>,
        request: CompletedPermissionRequest,
    ) -> Self {
        self.completed_requests
            .get_or_insert_with(IndexMap::new)
            .insert(id.into(), request);
        self
    }
}

impl PermissionRequest {
    pub fn new(tool: impl Into<String>, arguments: Value, created_at: u64) -> Self {
        Self {
            tool: tool.into(),
            arguments,
            created_at,
        }
    }
}

impl CompletedPermissionRequest {
    pub fn new(
        tool: impl Into<String>,
        arguments: Value,
        created_at: u64,
        status: CompletedStatus,
    ) -> Self {
        Self {
            tool: tool.into(),
            arguments,
            created_at,
            completed_at: None,
            status,
            reason: None,
            mode: None,
            allowed_tools: None,
            decision: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_completed_at(mut self, completed_at: u64) -> Self {
        self.completed_at = Some(completed_at);
        self
    }
}
