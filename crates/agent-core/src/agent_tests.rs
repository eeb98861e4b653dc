use super::*;
use crate::events::NotificationLog;
use crate::gate::FixedAnswer;
use crate::message::Role;
use crate::session::SessionId;
use crate::testing::{ScriptedProvider, Step};
use crate::tool::{ParamType, ParameterSchema, Tool, ToolSchema};
use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "echo".into(),
            description: "Echo a message".into(),
            parameters: vec![ParameterSchema::required("message", ParamType::String, "Text")],
            destructive: false,
        }
    }

    async fn execute(&self, _ctx: &ToolContext, call: &ToolCall) -> Result<ToolResult> {
        Ok(ToolResult::success().with("message", call.require_str("message")?))
    }
}

/// Destructive tool counting its executions
struct WriteTool(Arc<AtomicUsize>);

#[async_trait]
impl Tool for WriteTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "write".into(),
            description: "Write a file".into(),
            parameters: vec![],
            destructive: true,
        }
    }

    async fn execute(&self, _ctx: &ToolContext, _call: &ToolCall) -> Result<ToolResult> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(ToolResult::success())
    }
}

struct FailingTool;

#[async_trait]
impl Tool for FailingTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "fail".into(),
            description: "Always errors".into(),
            parameters: vec![],
            destructive: false,
        }
    }

    async fn execute(&self, _ctx: &ToolContext, _call: &ToolCall) -> Result<ToolResult> {
        Err(AgentError::ToolExecution("disk full".into()))
    }
}

struct PanicTool;

#[async_trait]
impl Tool for PanicTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "explode".into(),
            description: "Panics".into(),
            parameters: vec![],
            destructive: false,
        }
    }

    async fn execute(&self, _ctx: &ToolContext, _call: &ToolCall) -> Result<ToolResult> {
        panic!("tool bug");
    }
}

struct Fixture {
    agent: Agent,
    provider: Arc<ScriptedProvider>,
    writes: Arc<AtomicUsize>,
}

fn fixture_with(provider: ScriptedProvider, configure: impl FnOnce(AgentBuilder) -> AgentBuilder) -> Fixture {
    let provider = Arc::new(provider);
    let writes = Arc::new(AtomicUsize::new(0));
    let builder = AgentBuilder::new()
        .provider(provider.clone())
        .tool(EchoTool)
        .tool(WriteTool(writes.clone()))
        .tool(FailingTool)
        .tool(PanicTool);
    let agent = configure(builder).build().unwrap();
    Fixture {
        agent,
        provider,
        writes,
    }
}

fn fixture(steps: Vec<Step>) -> Fixture {
    fixture_with(ScriptedProvider::new(steps), |b| b)
}

fn new_session() -> Session {
    Session::new(SessionId::new(), ".", Mode::ApplyFix)
}

async fn submit(agent: &Agent, session: &mut Session, text: &str) -> (Outcome, NotificationLog) {
    let log = NotificationLog::new();
    let cancel = CancellationToken::new();
    let ctx = ToolContext::new(".");
    let run = Submission {
        ctx: &ctx,
        cancel: &cancel,
        observer: &log,
    };
    let outcome = agent.submit(session, text, &run).await;
    (outcome, log)
}

async fn review(agent: &Agent, session: &mut Session, text: &str, answer: bool) -> (Outcome, NotificationLog) {
    let log = NotificationLog::new();
    let cancel = CancellationToken::new();
    let ctx = ToolContext::new(".");
    let gate = InteractionGate::new(Arc::new(FixedAnswer(answer)));
    let run = Submission {
        ctx: &ctx,
        cancel: &cancel,
        observer: &log,
    };
    let outcome = agent.review(session, text, &gate, &run).await;
    (outcome, log)
}

fn terminal_count(log: &NotificationLog) -> usize {
    log.entries().iter().filter(|n| n.is_terminal()).count()
}

#[tokio::test]
async fn test_plain_text_reply() {
    let f = fixture(vec![Step::text("Hello there.")]);
    let mut session = new_session();

    let (outcome, log) = submit(&f.agent, &mut session, "  hi  ").await;

    assert_eq!(outcome, Outcome::Completed);
    assert_eq!(log.texts(), vec!["Hello there."]);
    assert_eq!(log.entries().last(), Some(&Notification::Done));
    assert_eq!(terminal_count(&log), 1);

    let turns = session.conversation.turns();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].text(), "hi");
    assert_eq!(turns[1].role, Role::Model);

    let request = &f.provider.requests()[0];
    assert_eq!(request.system_instruction, f.agent.config().system_prompt);
    assert_eq!(request.tools.len(), 4);
}

#[tokio::test]
async fn test_calls_produce_one_call_turn_and_one_result_turn() {
    let f = fixture(vec![
        Step::Calls(vec![
            ToolCall::new("echo", json!({"message": "first"})),
            ToolCall::new("fail", json!({})),
            ToolCall::new("explode", json!({})),
            ToolCall::new("missing", json!({})),
            ToolCall::new("echo", json!({})),
        ]),
        Step::text("All done."),
    ]);
    let mut session = new_session();

    let (outcome, log) = submit(&f.agent, &mut session, "run things").await;
    assert_eq!(outcome, Outcome::Completed);

    let turns = session.conversation.turns();
    assert_eq!(turns.len(), 4);
    assert_eq!(turns[1].tool_calls().count(), 5);

    let responses: Vec<_> = turns[2].tool_responses().collect();
    let names: Vec<_> = responses.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["echo", "fail", "explode", "missing", "echo"]);

    assert_eq!(responses[0].response, json!({"success": true, "message": "first"}));
    assert_eq!(responses[1].response["success"], false);
    assert!(responses[1].response["error"].as_str().unwrap().contains("disk full"));
    assert!(responses[2].response["error"].as_str().unwrap().contains("failed unexpectedly"));
    assert!(responses[3].response["error"].as_str().unwrap().contains("Tool not found"));
    assert!(responses[4].response["error"].as_str().unwrap().contains("message"));

    let events = log
        .entries()
        .iter()
        .filter(|n| matches!(n, Notification::ToolEvent { .. }))
        .count();
    assert_eq!(events, 5);

    // The follow-up request carries the complete exchange
    let second = &f.provider.requests()[1];
    assert_eq!(second.history.len(), 3);
    assert!(second.history[2].has_tool_results());
}

#[tokio::test]
async fn test_dry_run_withholds_destructive_tools() {
    let f = fixture_with(
        ScriptedProvider::new(vec![Step::call("write", json!({})), Step::text("Not written.")]),
        |b| b.chat_mode(Mode::DryRun),
    );
    let mut session = Session::new(SessionId::new(), ".", f.agent.config().chat_mode);

    let (outcome, _log) = submit(&f.agent, &mut session, "write it").await;

    assert_eq!(outcome, Outcome::Completed);
    assert_eq!(f.writes.load(Ordering::SeqCst), 0);
    let response = session.conversation.turns()[2].tool_responses().next().unwrap().clone();
    assert_eq!(response.response["success"], false);
    assert!(response.response["error"].as_str().unwrap().contains("confirmation required"));
}

#[tokio::test]
async fn test_turn_budget_stops_dispatch() {
    let f = fixture_with(
        ScriptedProvider::new(vec![]).with_fallback(Step::call("echo", json!({"message": "again"}))),
        |b| b.max_tool_cycles(3),
    );
    let mut session = new_session();

    let (outcome, log) = submit(&f.agent, &mut session, "loop forever").await;

    assert_eq!(outcome, Outcome::TurnLimit);
    assert_eq!(f.provider.call_count(), 4);
    let texts = log.texts();
    assert_eq!(texts.len(), 1);
    assert!(texts[0].contains("3 tool rounds"));
    assert_eq!(log.terminal(), Some(Notification::Done));

    // The undispatched calls never reach history
    let turns = session.conversation.turns();
    assert_eq!(turns.len(), 7);
    assert!(turns[6].has_tool_results());
}

#[tokio::test]
async fn test_state_error_resets_then_gives_up() {
    let f = fixture(vec![
        Step::Error(ErrorKind::State, "bad ordering".into()),
        Step::Error(ErrorKind::State, "bad ordering".into()),
        Step::Error(ErrorKind::State, "bad ordering".into()),
    ]);
    let mut session = new_session();
    session.conversation.push(Turn::user_text("earlier"));
    session.conversation.push(Turn::model_text("earlier answer"));

    let (outcome, log) = submit(&f.agent, &mut session, "now").await;

    assert_eq!(outcome, Outcome::Failed(ErrorKind::State));
    let requests = f.provider.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[0].history.len(), 3);
    for request in &requests[1..] {
        assert_eq!(request.history.len(), 1);
        assert_eq!(request.history[0].text(), "now");
    }
    assert!(matches!(
        log.terminal(),
        Some(Notification::Error { kind: ErrorKind::State, .. })
    ));
    assert_eq!(terminal_count(&log), 1);
}

#[tokio::test]
async fn test_state_error_recovers_after_reset() {
    let f = fixture(vec![
        Step::Error(ErrorKind::State, "bad ordering".into()),
        Step::text("Recovered."),
    ]);
    let mut session = new_session();
    session.conversation.push(Turn::user_text("earlier"));
    session.conversation.push(Turn::model_text("earlier answer"));

    let (outcome, log) = submit(&f.agent, &mut session, "now").await;

    assert_eq!(outcome, Outcome::Completed);
    assert_eq!(log.texts(), vec!["Recovered."]);
    let turns = session.conversation.turns();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].text(), "now");
}

#[tokio::test]
async fn test_network_error_is_not_retried() {
    let f = fixture(vec![Step::Error(ErrorKind::Network, "connection refused".into())]);
    let mut session = new_session();

    let (outcome, log) = submit(&f.agent, &mut session, "hello").await;

    assert_eq!(outcome, Outcome::Failed(ErrorKind::Network));
    assert_eq!(f.provider.call_count(), 1);
    assert!(matches!(
        log.terminal(),
        Some(Notification::Error { kind: ErrorKind::Network, .. })
    ));
}

#[tokio::test]
async fn test_empty_reply_ends_quietly() {
    let f = fixture(vec![Step::text("   ")]);
    let mut session = new_session();

    let (outcome, log) = submit(&f.agent, &mut session, "hello").await;

    assert_eq!(outcome, Outcome::Completed);
    assert_eq!(log.entries(), vec![Notification::Done]);
    assert_eq!(session.conversation.len(), 1);
}

#[tokio::test]
async fn test_cancel_stops_pending_call_and_session_stays_usable() {
    let f = fixture(vec![Step::Hang, Step::text("Second answer.")]);
    let mut session = new_session();

    let log = NotificationLog::new();
    let cancel = CancellationToken::new();
    let ctx = ToolContext::new(".");
    let run = Submission {
        ctx: &ctx,
        cancel: &cancel,
        observer: &log,
    };

    let (outcome, ()) = tokio::join!(f.agent.submit(&mut session, "slow", &run), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();
    });

    assert_eq!(outcome, Outcome::Stopped);
    assert_eq!(log.entries(), vec![Notification::Stopped]);

    let (outcome, log) = submit(&f.agent, &mut session, "again").await;
    assert_eq!(outcome, Outcome::Completed);
    assert_eq!(log.texts(), vec!["Second answer."]);
}

#[tokio::test]
async fn test_history_carries_across_submissions() {
    let f = fixture(vec![Step::text("Noted: 42."), Step::text("It was 42.")]);
    let mut session = new_session();

    submit(&f.agent, &mut session, "remember 42").await;
    submit(&f.agent, &mut session, "what number?").await;

    let second = &f.provider.requests()[1];
    let texts: Vec<_> = second.history.iter().map(Turn::text).collect();
    assert_eq!(texts, vec!["remember 42", "Noted: 42.", "what number?"]);
}

#[tokio::test]
async fn test_history_stays_bounded() {
    let f = fixture_with(
        ScriptedProvider::new(vec![]).with_fallback(Step::text("ok")),
        |b| b.max_history_turns(4),
    );
    let mut session = new_session();

    for i in 0..6 {
        submit(&f.agent, &mut session, &format!("message {i}")).await;
    }

    for request in f.provider.requests() {
        assert!(request.history.len() <= 4);
        assert_eq!(request.history[0].role, Role::User);
    }
    let last = f.provider.requests().pop().unwrap();
    assert_eq!(last.history.last().unwrap().text(), "message 5");
}

#[tokio::test]
async fn test_review_declined() {
    let f = fixture(vec![
        Step::call("write", json!({})),
        Step::text("Line 3 divides by zero. Would you like me to fix it?"),
    ]);
    let mut session = new_session();

    let (outcome, log) = review(&f.agent, &mut session, "review main.rs", false).await;

    assert_eq!(outcome, Outcome::Declined);
    assert_eq!(f.writes.load(Ordering::SeqCst), 0);
    assert_eq!(session.mode, Mode::DryRun);
    assert_eq!(log.terminal(), Some(Notification::Done));
    assert_eq!(f.provider.requests()[0].system_instruction, f.agent.config().review_prompt);
}

#[tokio::test]
async fn test_review_approved_applies_fix() {
    let f = fixture(vec![
        Step::text("Line 3 divides by zero. Would you like me to fix it?"),
        Step::call("write", json!({})),
        Step::text("The fix has been applied."),
    ]);
    let mut session = new_session();

    let (outcome, log) = review(&f.agent, &mut session, "review main.rs", true).await;

    assert_eq!(outcome, Outcome::Completed);
    assert_eq!(f.writes.load(Ordering::SeqCst), 1);
    assert_eq!(session.mode, Mode::ApplyFix);
    assert_eq!(log.texts().len(), 2);

    let second = &f.provider.requests()[1];
    assert_eq!(
        second.history.last().unwrap().text(),
        f.agent.config().proceed_instruction
    );
}

#[tokio::test]
async fn test_chat_after_declined_review_applies_again() {
    let f = fixture(vec![
        Step::text("Line 3 divides by zero. Would you like me to fix it?"),
        Step::call("write", json!({})),
        Step::text("Written."),
    ]);
    let mut session = new_session();

    let (outcome, _log) = review(&f.agent, &mut session, "review main.rs", false).await;
    assert_eq!(outcome, Outcome::Declined);

    let (outcome, _log) = submit(&f.agent, &mut session, "just write the file").await;
    assert_eq!(outcome, Outcome::Completed);
    assert_eq!(session.mode, Mode::ApplyFix);
    assert_eq!(f.writes.load(Ordering::SeqCst), 1);
    let response = session.conversation.turns().iter().rev().find_map(|t| t.tool_responses().next().cloned());
    assert_eq!(response.unwrap().response["success"], true);
}

#[tokio::test]
async fn test_approved_review_keeps_instruction_through_truncation() {
    let mut steps = vec![
        Step::call("echo", json!({"message": "reading"})),
        Step::call("echo", json!({"message": "reading more"})),
        Step::text("Found a bug. Would you like me to apply this fix?"),
    ];
    steps.extend((0..12).map(|_| Step::call("write", json!({}))));
    steps.push(Step::text("The fix has been applied."));
    let f = fixture(steps);
    let mut session = new_session();

    let (outcome, _log) = review(&f.agent, &mut session, "review main.rs", true).await;

    assert_eq!(outcome, Outcome::Completed);
    assert_eq!(f.writes.load(Ordering::SeqCst), 12);
    let requests = f.provider.requests();
    assert_eq!(requests.len(), 16);
    for request in &requests {
        assert!(request.history.len() <= f.agent.config().max_history_turns);
        assert_eq!(request.history[0].text(), "review main.rs");
    }
}

#[tokio::test]
async fn test_state_retry_budget_is_per_streak() {
    let f = fixture(vec![
        Step::Error(ErrorKind::State, "bad ordering".into()),
        Step::call("echo", json!({"message": "hi"})),
        Step::Error(ErrorKind::State, "bad ordering".into()),
        Step::Error(ErrorKind::State, "bad ordering".into()),
        Step::text("Recovered twice."),
    ]);
    let mut session = new_session();

    let (outcome, log) = submit(&f.agent, &mut session, "now").await;

    assert_eq!(outcome, Outcome::Completed);
    assert_eq!(f.provider.call_count(), 5);
    assert_eq!(log.texts(), vec!["Recovered twice."]);
}

#[tokio::test]
async fn test_review_without_question_completes() {
    let f = fixture(vec![Step::text("No issues found in main.rs.")]);
    let mut session = new_session();

    let (outcome, _log) = review(&f.agent, &mut session, "review main.rs", true).await;

    assert_eq!(outcome, Outcome::Completed);
    assert_eq!(f.provider.call_count(), 1);
}

#[test]
fn test_builder_requires_provider() {
    let result = AgentBuilder::new().tool(EchoTool).build();
    assert!(matches!(result, Err(AgentError::Config(_))));
}
