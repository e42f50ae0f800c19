//! One actor task per conversation.
//!
//! The actor owns the conversation's [`ReducerState`] and a merged view of
//! every display message produced so far. Handles talk to it over a bounded
//! command channel, so calls on one conversation are applied strictly in
//! order while different conversations proceed independently.

use indexmap::IndexMap;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};
use weave_core::agent_state::AgentState;
use weave_core::message::{Message, MessageId};
use weave_core::reducer::{ReducerState, TodoSnapshot, UsageSnapshot, reduce};
use weave_core::types::NormalizedMessage;

use crate::error::SessionError;
use crate::session_id::SessionId;

/// Point-in-time view of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    /// Display messages ordered by `created_at`, ties in arrival order.
    pub messages: Vec<Message>,
    pub is_loaded: bool,
    pub latest_todos: Option<TodoSnapshot>,
    pub latest_usage: Option<UsageSnapshot>,
}

/// Change notification fanned out to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    Messages {
        session_id: SessionId,
        messages: Vec<Message>,
    },
    Loaded {
        session_id: SessionId,
    },
}

enum SessionCmd {
    ApplyMessages {
        messages: Vec<NormalizedMessage>,
        reply: oneshot::Sender<Vec<Message>>,
    },
    ApplyAgentState {
        state: Box<AgentState>,
        reply: oneshot::Sender<Vec<Message>>,
    },
    EchoLocalText {
        local_id: String,
        text: String,
        created_at: u64,
        reply: oneshot::Sender<Vec<Message>>,
    },
    MarkLoaded {
        reply: oneshot::Sender<()>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Subscribe {
        reply: oneshot::Sender<broadcast::Receiver<SessionUpdate>>,
    },
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct SessionHandle {
    session_id: SessionId,
    cmd_tx: mpsc::Sender<SessionCmd>,
}

impl SessionHandle {
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// True once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.cmd_tx.is_closed()
    }

    /// Reduces a network batch against the latest permission snapshot.
    pub async fn apply_messages(
        &self,
        messages: Vec<NormalizedMessage>,
    ) -> Result<Vec<Message>, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SessionCmd::ApplyMessages {
            messages,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| SessionError::ChannelClosed)
    }

    /// Stores a new permission snapshot and reconciles it.
    pub async fn apply_agent_state(&self, state: AgentState) -> Result<Vec<Message>, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SessionCmd::ApplyAgentState {
            state: Box::new(state),
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| SessionError::ChannelClosed)
    }

    /// Shows text the user just sent before the server echoes it back. The
    /// server copy carries the same `local_id` and is suppressed.
    pub async fn echo_local_text(
        &self,
        local_id: impl Into<String>,
        text: impl Into<String>,
        created_at: u64,
    ) -> Result<Vec<Message>, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SessionCmd::EchoLocalText {
            local_id: local_id.into(),
            text: text.into(),
            created_at,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| SessionError::ChannelClosed)
    }

    /// Records that the history load for this conversation finished.
    pub async fn mark_loaded(&self) -> Result<(), SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SessionCmd::MarkLoaded { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| SessionError::ChannelClosed)
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SessionCmd::Snapshot { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| SessionError::ChannelClosed)
    }

    pub async fn subscribe(&self) -> Result<broadcast::Receiver<SessionUpdate>, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SessionCmd::Subscribe { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| SessionError::ChannelClosed)
    }

    pub fn shutdown(&self) {
        let _ = self.cmd_tx.try_send(SessionCmd::Shutdown);
    }

    async fn send(&self, cmd: SessionCmd) -> Result<(), SessionError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| SessionError::ChannelClosed)
    }
}

struct SessionActor {
    session_id: SessionId,
    reducer: ReducerState,
    agent_state: Option<AgentState>,
    messages: IndexMap<MessageId, Message>,
    is_loaded: bool,
    updates: broadcast::Sender<SessionUpdate>,
}

impl SessionActor {
    fn new(session_id: SessionId, update_buffer: usize) -> Self {
        let (updates, _) = broadcast::channel(update_buffer);
        Self {
            session_id,
            reducer: ReducerState::new(),
            agent_state: None,
            messages: IndexMap::new(),
            is_loaded: false,
            updates,
        }
    }

    async fn run(mut self, mut cmd_rx: mpsc::Receiver<SessionCmd>) {
        while let Some(cmd) = cmd_rx.recv().await {
            match cmd {
                SessionCmd::ApplyMessages { messages, reply } => {
                    let delta = self.apply(messages);
                    let _ = reply.send(delta);
                }
                SessionCmd::ApplyAgentState { state, reply } => {
                    self.agent_state = Some(*state);
                    let delta = self.apply(Vec::new());
                    let _ = reply.send(delta);
                }
                SessionCmd::EchoLocalText {
                    local_id,
                    text,
                    created_at,
                    reply,
                } => {
                    let echo = NormalizedMessage::user(local_id.clone(), created_at, text)
                        .with_local_id(local_id);
                    let delta = self.apply(vec![echo]);
                    let _ = reply.send(delta);
                }
                SessionCmd::MarkLoaded { reply } => {
                    if !self.is_loaded {
                        self.is_loaded = true;
                        let _ = self.updates.send(SessionUpdate::Loaded {
                            session_id: self.session_id,
                        });
                    }
                    let _ = reply.send(());
                }
                SessionCmd::Snapshot { reply } => {
                    let _ = reply.send(self.snapshot());
                }
                SessionCmd::Subscribe { reply } => {
                    let _ = reply.send(self.updates.subscribe());
                }
                SessionCmd::Shutdown => break,
            }
        }

        tracing::debug!(session_id = %self.session_id, "Session actor stopped");
    }

    fn apply(&mut self, batch: Vec<NormalizedMessage>) -> Vec<Message> {
        let batch_len = batch.len();
        let delta = reduce(&mut self.reducer, batch, self.agent_state.as_ref());

        for message in &delta {
            forget_nested(&mut self.messages, message.children());
            self.messages.insert(message.id().clone(), message.clone());
        }
        tracing::debug!(
            session_id = %self.session_id,
            batch = batch_len,
            changed = delta.len(),
            total = self.messages.len(),
            "Applied batch"
        );

        if !delta.is_empty() {
            let _ = self.updates.send(SessionUpdate::Messages {
                session_id: self.session_id,
                messages: delta.clone(),
            });
        }
        delta
    }

    fn snapshot(&self) -> SessionSnapshot {
        let mut messages: Vec<Message> = self.messages.values().cloned().collect();
        messages.sort_by_key(Message::created_at);

        SessionSnapshot {
            session_id: self.session_id,
            messages,
            is_loaded: self.is_loaded,
            latest_todos: self.reducer.latest_todos().cloned(),
            latest_usage: self.reducer.latest_usage().copied(),
        }
    }
}

/// Drops top-level entries for records that now live inside a sidechain.
fn forget_nested(view: &mut IndexMap<MessageId, Message>, children: &[Message]) {
    for child in children {
        view.shift_remove(child.id());
        forget_nested(view, child.children());
    }
}

/// Spawns the actor for `session_id` on the current tokio runtime.
pub fn spawn_session(
    session_id: SessionId,
    command_buffer: usize,
    update_buffer: usize,
) -> SessionHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(command_buffer);

    let actor = SessionActor::new(session_id, update_buffer);
    tokio::spawn(actor.run(cmd_rx));

    tracing::debug!(session_id = %session_id, "Session actor started");
    SessionHandle { session_id, cmd_tx }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use weave_core::agent_state::{CompletedPermissionRequest, CompletedStatus, PermissionRequest};
    use weave_core::message::{PermissionStatus, ToolState};
    use weave_core::types::AgentContent;

    fn spawn() -> SessionHandle {
        spawn_session(SessionId::new(), 8, 16)
    }

    fn bash_call(id: &str, created_at: u64, tool_id: &str) -> NormalizedMessage {
        NormalizedMessage::agent(
            id,
            created_at,
            vec![AgentContent::tool_call(
                "uuid",
                tool_id,
                "Bash",
                json!({ "command": "ls" }),
            )],
        )
    }

    #[tokio::test]
    async fn apply_messages_returns_delta_and_merges_snapshot() {
        let handle = spawn();

        let delta = handle
            .apply_messages(vec![
                NormalizedMessage::user("u1", 1000, "hi"),
                bash_call("m1", 1100, "t1"),
            ])
            .await
            .expect("apply messages");
        assert_eq!(delta.len(), 2);

        let snapshot = handle.snapshot().await.expect("snapshot");
        assert_eq!(snapshot.messages, delta);
        assert!(!snapshot.is_loaded);
    }

    #[tokio::test]
    async fn local_echo_suppresses_server_copy() {
        let handle = spawn();

        let echoed = handle
            .echo_local_text("local-1", "hello", 1000)
            .await
            .expect("echo");
        assert_eq!(echoed.len(), 1);

        let server = handle
            .apply_messages(vec![
                NormalizedMessage::user("server-1", 1005, "hello").with_local_id("local-1"),
            ])
            .await
            .expect("apply messages");
        assert!(server.is_empty());

        let snapshot = handle.snapshot().await.expect("snapshot");
        assert_eq!(snapshot.messages.len(), 1);
        assert_eq!(snapshot.messages[0].text(), Some("hello"));
    }

    #[tokio::test]
    async fn stored_agent_state_is_used_for_later_batches() {
        let handle = spawn();
        let pending = AgentState::default().with_request(
            "p1",
            PermissionRequest::new("Bash", json!({ "command": "ls" }), 900),
        );

        let synthesized = handle.apply_agent_state(pending).await.expect("agent state");
        assert_eq!(synthesized.len(), 1);

        let linked = handle
            .apply_messages(vec![bash_call("m1", 1000, "t1")])
            .await
            .expect("apply messages");
        assert_eq!(linked.len(), 1);
        assert_eq!(linked[0].id(), synthesized[0].id());

        let approved = AgentState::default().with_completed(
            "p1",
            CompletedPermissionRequest::new(
                "Bash",
                json!({ "command": "ls" }),
                900,
                CompletedStatus::Approved,
            ),
        );
        handle.apply_agent_state(approved).await.expect("agent state");

        let snapshot = handle.snapshot().await.expect("snapshot");
        assert_eq!(snapshot.messages.len(), 1);
        let tool = snapshot.messages[0].tool().expect("tool message");
        assert_eq!(tool.state, ToolState::Running);
        assert_eq!(
            tool.permission.as_ref().map(|p| p.status),
            Some(PermissionStatus::Approved)
        );
    }

    #[tokio::test]
    async fn permission_record_moved_into_sidechain_leaves_top_level() {
        let handle = spawn();
        let pending = AgentState::default().with_request(
            "p1",
            PermissionRequest::new("Bash", json!({ "command": "ls" }), 900),
        );
        handle.apply_agent_state(pending).await.expect("agent state");

        handle
            .apply_messages(vec![
                NormalizedMessage::agent(
                    "task",
                    1000,
                    vec![AgentContent::tool_call(
                        "t-uuid",
                        "t1",
                        "Task",
                        json!({ "prompt": "Investigate" }),
                    )],
                ),
                NormalizedMessage::agent(
                    "s-root",
                    1100,
                    vec![AgentContent::sidechain("s1", "Investigate")],
                )
                .sidechain(),
                NormalizedMessage::agent(
                    "s-call",
                    1200,
                    vec![
                        AgentContent::tool_call("s2", "inner", "Bash", json!({ "command": "ls" }))
                            .with_parent("s1"),
                    ],
                )
                .sidechain(),
            ])
            .await
            .expect("apply messages");

        let snapshot = handle.snapshot().await.expect("snapshot");
        assert_eq!(snapshot.messages.len(), 1);
        let task = &snapshot.messages[0];
        assert_eq!(task.tool().map(|t| t.name.as_str()), Some("Task"));
        let inner = task.children().iter().find_map(Message::tool).expect("nested tool");
        assert_eq!(
            inner.permission.as_ref().map(|p| p.status),
            Some(PermissionStatus::Pending)
        );
    }

    #[tokio::test]
    async fn snapshot_is_ordered_by_creation_time() {
        let handle = spawn();
        handle
            .apply_messages(vec![NormalizedMessage::user("late", 2000, "second")])
            .await
            .expect("apply");
        handle
            .apply_messages(vec![NormalizedMessage::user("early", 1000, "first")])
            .await
            .expect("apply");

        let snapshot = handle.snapshot().await.expect("snapshot");
        let texts: Vec<_> = snapshot.messages.iter().filter_map(Message::text).collect();
        assert_eq!(texts, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn subscribers_receive_deltas_and_load_marker() {
        let handle = spawn();
        let mut updates = handle.subscribe().await.expect("subscribe");

        handle
            .apply_messages(vec![NormalizedMessage::user("u1", 1000, "hi")])
            .await
            .expect("apply");
        handle.mark_loaded().await.expect("mark loaded");

        let first = updates.recv().await.expect("messages update");
        assert!(matches!(first, SessionUpdate::Messages { ref messages, .. } if messages.len() == 1));
        let second = updates.recv().await.expect("loaded update");
        assert_eq!(
            second,
            SessionUpdate::Loaded {
                session_id: handle.session_id()
            }
        );
        assert!(handle.snapshot().await.expect("snapshot").is_loaded);
    }

    #[tokio::test]
    async fn calls_after_shutdown_report_closed_channel() {
        let handle = spawn();
        handle.shutdown();

        let result = handle.snapshot().await;

        assert!(matches!(result, Err(SessionError::ChannelClosed)));
    }
}
