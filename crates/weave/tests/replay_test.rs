use std::io::Write;

use weave::cli::OutputFormat;
use weave::commands::replay::ReplayCommand;
use weave::error::Error;
use weave::render::render_outline;
use weave_core::message::{Message, PermissionStatus, ToolState};
use weave_session::StorePreferences;

const RECORDING: &str = r#"
{"type":"local_echo","local_id":"local-1","text":"investigate the build","created_at":1000}
{"type":"messages","messages":[{"id":"srv-1","local_id":"local-1","created_at":1001,"role":"user","content":{"text":"investigate the build"}}]}
{"type":"agent_state","state":{"requests":{"perm-1":{"tool":"Bash","arguments":{"command":"cargo build"},"created_at":1100}},"completed_requests":null}}
{"type":"messages","messages":[{"id":"a-1","created_at":1200,"role":"agent","content":[{"type":"tool-call","uuid":"c1","id":"tool-1","name":"Bash","input":{"command":"cargo build"}},{"type":"tool-call","uuid":"c1","id":"tool-2","name":"Task","input":{"prompt":"read the logs"}}]}]}
{"type":"messages","messages":[{"id":"s-2","created_at":1400,"is_sidechain":true,"role":"agent","content":[{"type":"text","uuid":"s2","parent_uuid":"s1","text":"logs look clean"}]}]}
{"type":"messages","messages":[{"id":"s-1","created_at":1300,"is_sidechain":true,"role":"agent","content":[{"type":"sidechain","uuid":"s1","prompt":"read the logs"}]}]}
{"type":"agent_state","state":{"requests":null,"completed_requests":{"perm-1":{"tool":"Bash","arguments":{"command":"cargo build"},"created_at":1100,"completed_at":1250,"status":"approved"}}}}
{"type":"messages","messages":[{"id":"a-2","created_at":1500,"role":"agent","content":[{"type":"tool-result","uuid":"r1","tool_use_id":"tool-1","content":"ok","is_error":false}]}]}
"#;

fn write_recording(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(contents.as_bytes()).expect("write recording");
    file
}

fn command(file: &tempfile::NamedTempFile) -> ReplayCommand {
    ReplayCommand {
        file: file.path().to_path_buf(),
        session: None,
        format: OutputFormat::Json,
        preferences: StorePreferences::default(),
    }
}

#[tokio::test]
async fn replay_reconciles_a_full_conversation() {
    let file = write_recording(RECORDING);

    let snapshot = command(&file).run().await.expect("replay");

    assert!(snapshot.is_loaded);
    assert_eq!(snapshot.messages.len(), 3);
    assert!(matches!(
        &snapshot.messages[0],
        Message::UserText { local_id: Some(local_id), .. } if local_id == "local-1"
    ));

    let bash = snapshot.messages[1].tool().expect("bash tool");
    assert_eq!(snapshot.messages[1].created_at(), 1100);
    assert_eq!(bash.started_at, Some(1200));
    assert_eq!(bash.state, ToolState::Completed);
    assert_eq!(
        bash.permission.as_ref().map(|p| p.status),
        Some(PermissionStatus::Approved)
    );

    let task = &snapshot.messages[2];
    assert_eq!(task.tool().map(|t| t.name.as_str()), Some("Task"));
    let children: Vec<_> = task.children().iter().filter_map(Message::text).collect();
    assert_eq!(children, vec!["read the logs", "logs look clean"]);
}

#[tokio::test]
async fn replay_outline_nests_sidechain() {
    let file = write_recording(RECORDING);

    let snapshot = command(&file).run().await.expect("replay");
    let outline = render_outline(&snapshot);

    assert!(outline.contains("  [1200] tool Task (running)\n    [1300] user: read the logs\n"));
    assert!(outline.contains("[1100] tool Bash (completed) permission=approved"));
}

#[tokio::test]
async fn replay_into_named_session() {
    let file = write_recording(RECORDING);
    let mut replay = command(&file);
    replay.session = Some("01890a5d-ac96-774b-bcce-b302099a8057".to_string());

    let snapshot = replay.run().await.expect("replay");

    assert_eq!(
        snapshot.session_id.to_string(),
        "01890a5d-ac96-774b-bcce-b302099a8057"
    );
}

#[tokio::test]
async fn replay_rejects_invalid_session_id() {
    let file = write_recording(RECORDING);
    let mut replay = command(&file);
    replay.session = Some("nope".to_string());

    let result = replay.run().await;

    assert!(matches!(result, Err(Error::SessionId(id)) if id == "nope"));
}

#[tokio::test]
async fn replay_reports_malformed_line() {
    let file = write_recording("{\"type\":\"messages\",\"messages\":[]}\n{\"type\":\"unknown\"}\n");

    let result = command(&file).run().await;

    assert!(matches!(result, Err(Error::Recording { line: 2, .. })));
}
