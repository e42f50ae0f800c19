//! JSON Lines conversation recordings.
//!
//! Every non-blank line holds one record, applied to the session in file
//! order:
//!
//! ```text
//! {"type":"messages","messages":[...]}
//! {"type":"agent_state","state":{"requests":{...},"completed_requests":{...}}}
//! {"type":"local_echo","local_id":"l1","text":"hi","created_at":1000}
//! ```

use std::io::BufRead;
use std::path::Path;

use serde::{Deserialize, Serialize};
use weave_core::agent_state::AgentState;
use weave_core::types::NormalizedMessage;
use weave_session::{SessionHandle, SessionSnapshot};

use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecordingEntry {
    Messages {
        messages: Vec<NormalizedMessage>,
    },
    AgentState {
        state: AgentState,
    },
    LocalEcho {
        local_id: String,
        text: String,
        created_at: u64,
    },
}

pub fn read_recording(path: &Path) -> Result<Vec<RecordingEntry>, Error> {
    let file = std::fs::File::open(path)?;
    parse_recording(std::io::BufReader::new(file))
}

pub fn parse_recording(reader: impl BufRead) -> Result<Vec<RecordingEntry>, Error> {
    let mut entries = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let entry = serde_json::from_str(&line).map_err(|source| Error::Recording {
            line: index + 1,
            source,
        })?;
        entries.push(entry);
    }
    Ok(entries)
}

/// Applies `entries` in order and returns the resulting snapshot. The session
/// is marked loaded once the whole recording went through.
pub async fn replay(
    handle: &SessionHandle,
    entries: Vec<RecordingEntry>,
) -> Result<SessionSnapshot, Error> {
    for (index, entry) in entries.into_iter().enumerate() {
        let delta = match entry {
            RecordingEntry::Messages { messages } => handle.apply_messages(messages).await?,
            RecordingEntry::AgentState { state } => handle.apply_agent_state(state).await?,
            RecordingEntry::LocalEcho {
                local_id,
                text,
                created_at,
            } => handle.echo_local_text(local_id, text, created_at).await?,
        };
        tracing::debug!(
            target: "weave::recording",
            session_id = %handle.session_id(),
            entry = index,
            changed = delta.len(),
            "Replayed entry"
        );
    }

    handle.mark_loaded().await?;
    Ok(handle.snapshot().await?)
}
