use std::collections::HashSet;

use proptest::prelude::*;
use serde_json::json;

use super::*;
use crate::agent_state::{AgentState, CompletedStatus, PermissionRequest};
use crate::reducer::reduce;
use crate::types::NormalizedMessage;

fn arb_command() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(json!({ "command": "ls" })),
        Just(json!({ "command": "pwd" })),
        Just(json!({ "command": "cat a.txt", "timeout": 30 })),
    ]
}

fn arb_message() -> impl Strategy<Value = NormalizedMessage> {
    prop_oneof![
        (0u8..4, 0u8..3, 0u64..5_000, "[a-z]{1,8}").prop_map(|(n, local, ts, text)| {
            let message = NormalizedMessage::user(format!("user-{n}"), ts, text);
            if local == 0 {
                message
            } else {
                message.with_local_id(format!("local-{local}"))
            }
        }),
        (0u8..6, 0u8..6, 0u64..5_000, arb_command()).prop_map(|(n, tool, ts, input)| {
            tool_call_message(&format!("call-{n}"), ts, &format!("tool-{tool}"), "Bash", input)
        }),
        (0u8..6, 0u8..6, 0u64..5_000).prop_map(|(n, tool, ts)| {
            tool_result_message(&format!("result-{n}"), ts, &format!("tool-{tool}"), json!("ok"))
        }),
        (0u8..2, 0u64..5_000).prop_map(|(n, ts)| {
            task_call(&format!("task-{n}"), ts, &format!("task-tool-{n}"), &format!("prompt-{n}"))
        }),
        (0u8..2, 0u64..5_000).prop_map(|(n, ts)| {
            sidechain_root(&format!("root-{n}"), ts, &format!("root-uuid-{n}"), &format!("prompt-{n}"))
        }),
        (0u8..4, 0u8..2, 0u8..6, 0u64..5_000, arb_command()).prop_map(
            |(n, root, tool, ts, input)| {
                sidechain_bash_call(
                    &format!("side-call-{n}"),
                    ts,
                    &format!("side-uuid-{n}"),
                    &format!("root-uuid-{root}"),
                    &format!("tool-{tool}"),
                    input,
                )
            }
        ),
    ]
}

fn arb_batch() -> impl Strategy<Value = Vec<NormalizedMessage>> {
    prop::collection::vec(arb_message(), 0..8)
}

fn arb_agent_state() -> impl Strategy<Value = AgentState> {
    prop::collection::vec((0u8..5, 0u8..4, 0u64..5_000, arb_command()), 0..5).prop_map(
        |entries| {
            entries
                .into_iter()
                .fold(AgentState::default(), |state, (n, status, ts, input)| {
                    let id = format!("perm-{n}");
                    match status {
                        0 => state.with_request(id, PermissionRequest::new("Bash", input, ts)),
                        1 => state.with_completed(
                            id,
                            CompletedPermissionRequest::new("Bash", input, ts, CompletedStatus::Approved),
                        ),
                        2 => state.with_completed(
                            id,
                            CompletedPermissionRequest::new("Bash", input, ts, CompletedStatus::Denied),
                        ),
                        _ => state.with_completed(
                            id,
                            CompletedPermissionRequest::new("Bash", input, ts, CompletedStatus::Canceled),
                        ),
                    }
                })
        },
    )
}

fn arb_step() -> impl Strategy<Value = (Vec<NormalizedMessage>, Option<AgentState>)> {
    (arb_batch(), prop::option::of(arb_agent_state()))
}

fn run(state: &mut ReducerState, steps: &[(Vec<NormalizedMessage>, Option<AgentState>)]) {
    for (batch, agent_state) in steps {
        reduce(state, batch.clone(), agent_state.as_ref());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_repeated_call_is_a_no_op(
        history in prop::collection::vec(arb_step(), 0..4),
        (batch, agent_state) in arb_step(),
    ) {
        let mut state = ReducerState::new();
        run(&mut state, &history);

        reduce(&mut state, batch.clone(), agent_state.as_ref());
        let snapshot = state.display_messages();
        let second = reduce(&mut state, batch, agent_state.as_ref());

        prop_assert!(second.is_empty(), "second call produced {:?}", second);
        prop_assert_eq!(state.display_messages(), snapshot);
    }

    #[test]
    fn prop_each_tool_is_linked_to_one_permission(
        steps in prop::collection::vec(arb_step(), 1..6),
    ) {
        let mut state = ReducerState::new();
        run(&mut state, &steps);

        let mut tools = HashSet::new();
        for (permission_id, tool_id) in state.permission_tool_links() {
            prop_assert!(
                tools.insert(tool_id.to_string()),
                "tool {} linked twice (again by {})",
                tool_id,
                permission_id
            );
        }
    }

    #[test]
    fn prop_tool_ids_map_to_distinct_records(
        steps in prop::collection::vec(arb_step(), 1..6),
    ) {
        let mut state = ReducerState::new();
        run(&mut state, &steps);

        let records: HashSet<_> = state.tool_id_to_message_id.values().collect();
        prop_assert_eq!(records.len(), state.tool_id_to_message_id.len());
    }

    #[test]
    fn prop_records_never_move_back_in_time(
        steps in prop::collection::vec(arb_step(), 1..6),
    ) {
        let mut state = ReducerState::new();
        let mut first_seen = std::collections::HashMap::new();

        for (batch, agent_state) in &steps {
            reduce(&mut state, batch.clone(), agent_state.as_ref());
            for record in state.messages() {
                let created_at = *first_seen.entry(record.id.clone()).or_insert(record.created_at);
                prop_assert_eq!(created_at, record.created_at);
            }
        }
    }

    #[test]
    fn prop_finished_tools_stay_finished(
        steps in prop::collection::vec(arb_step(), 1..6),
    ) {
        let mut state = ReducerState::new();
        let mut finished = std::collections::HashMap::new();

        for (batch, agent_state) in &steps {
            reduce(&mut state, batch.clone(), agent_state.as_ref());
            for record in state.messages() {
                let Some(tool) = record.tool() else { continue };
                if let Some((status, result)) = finished.get(&record.id) {
                    prop_assert_eq!(&tool.state, status);
                    prop_assert_eq!(&tool.result, result);
                } else if tool.state.is_terminal() {
                    finished.insert(record.id.clone(), (tool.state, tool.result.clone()));
                }
            }
        }
    }
}
