use std::fmt::Write;

use weave_core::message::Message;
use weave_core::types::AgentEvent;
use weave_session::SessionSnapshot;

/// Renders a snapshot as an indented outline, one message per line, with
/// sidechain children nested under their Task call.
pub fn render_outline(snapshot: &SessionSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "session {} ({} messages{})",
        snapshot.session_id,
        snapshot.messages.len(),
        if snapshot.is_loaded { ", loaded" } else { "" }
    );
    for message in &snapshot.messages {
        write_message(&mut out, message, 1);
    }
    if let Some(usage) = &snapshot.latest_usage {
        let _ = writeln!(
            out,
            "context: {} tokens at {}",
            usage.context_size, usage.timestamp
        );
    }
    if let Some(todos) = &snapshot.latest_todos {
        let count = todos.todos.as_array().map_or(0, Vec::len);
        let _ = writeln!(out, "todos: {} items at {}", count, todos.timestamp);
    }
    out
}

fn write_message(out: &mut String, message: &Message, depth: usize) {
    let indent = "  ".repeat(depth);
    let _ = match message {
        Message::UserText { created_at, text, .. } => {
            writeln!(out, "{indent}[{created_at}] user: {}", first_line(text))
        }
        Message::AgentText { created_at, text, .. } => {
            writeln!(out, "{indent}[{created_at}] agent: {}", first_line(text))
        }
        Message::ToolCall {
            created_at, tool, ..
        } => {
            let permission = tool
                .permission
                .as_ref()
                .map(|p| format!(" permission={}", p.status))
                .unwrap_or_default();
            writeln!(
                out,
                "{indent}[{created_at}] tool {} ({}){permission}",
                tool.name, tool.state
            )
        }
        Message::AgentEvent {
            created_at, event, ..
        } => writeln!(out, "{indent}[{created_at}] event: {}", describe_event(event)),
    };

    for child in message.children() {
        write_message(out, child, depth + 1);
    }
}

fn describe_event(event: &AgentEvent) -> String {
    match event {
        AgentEvent::Switch { mode } => format!("switched to {mode}"),
        AgentEvent::Message { message } => first_line(message).to_string(),
        AgentEvent::LimitReached { ends_at } => format!("limit reached until {ends_at}"),
        AgentEvent::Ready => "ready".to_string(),
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use weave_core::message::{MessageId, ToolCall, ToolState};
    use weave_session::SessionId;

    #[test]
    fn nests_sidechain_children_under_tool() {
        let mut tool = ToolCall::running("Task", json!({ "prompt": "look" }), 1000);
        tool.state = ToolState::Completed;
        let snapshot = SessionSnapshot {
            session_id: SessionId::new(),
            messages: vec![Message::ToolCall {
                id: MessageId::from_string("msg-1"),
                created_at: 1000,
                tool,
                children: vec![Message::AgentText {
                    id: MessageId::from_string("msg-2"),
                    created_at: 1100,
                    text: "found it\nmore".to_string(),
                }],
            }],
            is_loaded: true,
            latest_todos: None,
            latest_usage: None,
        };

        let outline = render_outline(&snapshot);
        let lines: Vec<_> = outline.lines().skip(1).collect();

        assert_eq!(
            lines,
            vec!["  [1000] tool Task (completed)", "    [1100] agent: found it"]
        );
    }
}
