//! History Sanitizer
//!
//! Repairs turn ordering before every provider request. Runs on a borrowed
//! history and returns the retained turns unchanged; it never edits a turn.

use crate::message::{Role, Turn};

/// Return the subset of `turns` that satisfies the ordering invariants.
///
/// * malformed turns are dropped
/// * a tool-call turn survives only if the very next turn is a well-formed
///   result turn with one result per call
/// * a result turn survives only directly after a surviving call turn
/// * a trailing unanswered call turn is dropped
/// * if the first survivor is not a user turn the result is empty and the
///   caller must reseed
///
/// Idempotent: `sanitize(&sanitize(h)) == sanitize(h)`.
pub fn sanitize(turns: &[Turn]) -> Vec<Turn> {
    let mut kept: Vec<Turn> = Vec::with_capacity(turns.len());

    for (idx, turn) in turns.iter().enumerate() {
        if !turn.is_well_formed() {
            tracing::debug!(index = idx, role = %turn.role, "Dropping malformed turn");
            continue;
        }

        if turn.has_tool_calls() {
            if answered_by(turn, turns.get(idx + 1)) {
                kept.push(turn.clone());
            } else {
                tracing::debug!(index = idx, "Dropping orphaned tool-call turn");
            }
            continue;
        }

        if turn.has_tool_results() {
            if kept.last().is_some_and(Turn::has_tool_calls) {
                kept.push(turn.clone());
            } else {
                tracing::debug!(index = idx, "Dropping tool-result turn without a call");
            }
            continue;
        }

        kept.push(turn.clone());
    }

    while kept.last().is_some_and(Turn::has_tool_calls) {
        kept.pop();
    }

    if kept.first().is_some_and(|t| t.role != Role::User) {
        tracing::debug!("History does not start on a user turn; discarding");
        return Vec::new();
    }

    kept
}

/// Whether `next` is the result turn for `call_turn`
fn answered_by(call_turn: &Turn, next: Option<&Turn>) -> bool {
    next.is_some_and(|next| {
        next.role == Role::User
            && next.is_well_formed()
            && next.has_tool_results()
            && next.tool_responses().count() == call_turn.tool_calls().count()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Part;
    use crate::tool::{ToolCall, ToolResponse};
    use serde_json::json;

    fn call(name: &str) -> ToolCall {
        ToolCall::new(name, json!({}))
    }

    fn result(name: &str) -> ToolResponse {
        ToolResponse {
            name: name.into(),
            response: json!({"success": true}),
        }
    }

    fn valid_history() -> Vec<Turn> {
        vec![
            Turn::user_text("list files"),
            Turn::model_calls(vec![call("listDirectory"), call("readFile")]),
            Turn::tool_results(vec![result("listDirectory"), result("readFile")]),
            Turn::model_text("Here they are"),
            Turn::user_text("thanks"),
        ]
    }

    #[test]
    fn test_valid_history_untouched() {
        let history = valid_history();
        assert_eq!(sanitize(&history), history);
    }

    #[test]
    fn test_trailing_unanswered_call_removed() {
        let mut history = valid_history();
        history.push(Turn::model_calls(vec![call("writeFile")]));

        let sanitized = sanitize(&history);
        assert_eq!(sanitized.len(), history.len() - 1);
        assert_eq!(sanitized, history[..history.len() - 1]);
    }

    #[test]
    fn test_orphaned_call_in_middle_removed() {
        let history = vec![
            Turn::user_text("a"),
            Turn::model_calls(vec![call("readFile")]),
            Turn::user_text("b"),
            Turn::model_text("c"),
        ];

        let sanitized = sanitize(&history);
        assert_eq!(sanitized.len(), 3);
        assert!(!sanitized.iter().any(Turn::has_tool_calls));
    }

    #[test]
    fn test_result_count_mismatch_drops_pair() {
        let history = vec![
            Turn::user_text("a"),
            Turn::model_calls(vec![call("readFile"), call("readFile")]),
            Turn::tool_results(vec![result("readFile")]),
        ];

        assert_eq!(sanitize(&history), vec![history[0].clone()]);
    }

    #[test]
    fn test_must_start_with_user() {
        let history = vec![Turn::model_text("hello"), Turn::user_text("hi")];
        assert!(sanitize(&history).is_empty());

        let leading_results = vec![
            Turn::tool_results(vec![result("readFile")]),
            Turn::model_text("ok"),
        ];
        assert!(sanitize(&leading_results).is_empty());
    }

    #[test]
    fn test_empty_parts_dropped() {
        let history = vec![
            Turn::new(Role::User, vec![]),
            Turn::user_text("a"),
            Turn::new(Role::Model, vec![Part::Text("b".into())]),
        ];
        assert_eq!(sanitize(&history).len(), 2);
    }

    #[test]
    fn test_idempotent() {
        let histories = vec![
            valid_history(),
            vec![
                Turn::user_text("a"),
                Turn::model_calls(vec![call("x")]),
                Turn::new(Role::User, vec![]),
                Turn::tool_results(vec![result("x")]),
                Turn::model_text("b"),
            ],
            vec![
                Turn::user_text("a"),
                Turn::tool_results(vec![result("x")]),
                Turn::model_calls(vec![call("y")]),
            ],
            vec![Turn::model_calls(vec![call("x")]), Turn::tool_results(vec![result("x")])],
        ];

        for history in histories {
            let once = sanitize(&history);
            assert_eq!(sanitize(&once), once);
        }
    }
}
