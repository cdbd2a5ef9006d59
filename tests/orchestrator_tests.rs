use agentrelay::event::{EventHandler, OrchestratorEvent};
use agentrelay::function_map::{FunctionMap, FunctionSpec};
use agentrelay::reply::{DefaultAutoReply, ReplyFn, ReplyGenerator, ReplyRequest};
use agentrelay::{
    Agent, AgentRelayConfig, Chat, FunctionCall, Message, Orchestrator, OrchestratorError,
};
use async_trait::async_trait;
use serde_json::json;
use std::error::Error;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Replies with a fixed message after an optional delay.
struct MockGenerator {
    response: Message,
    delay: Duration,
}

impl MockGenerator {
    fn new(response: impl Into<Message>) -> Self {
        Self {
            response: response.into(),
            delay: Duration::from_millis(0),
        }
    }

    fn delayed(response: impl Into<Message>, millis: u64) -> Self {
        Self {
            response: response.into(),
            delay: Duration::from_millis(millis),
        }
    }
}

#[async_trait]
impl ReplyGenerator for MockGenerator {
    async fn generate_reply(
        &self,
        _request: ReplyRequest<'_>,
    ) -> Result<Message, Box<dyn Error + Send + Sync>> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.response.clone())
    }
}

struct FailingGenerator;

#[async_trait]
impl ReplyGenerator for FailingGenerator {
    async fn generate_reply(
        &self,
        _request: ReplyRequest<'_>,
    ) -> Result<Message, Box<dyn Error + Send + Sync>> {
        Err("model unavailable".into())
    }
}

#[derive(Default)]
struct RecordingHandler {
    events: Mutex<Vec<OrchestratorEvent>>,
}

#[async_trait]
impl EventHandler for RecordingHandler {
    async fn on_orchestrator_event(&self, event: &OrchestratorEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

fn agent(name: &str, reply: impl Into<Message>) -> Arc<Agent> {
    Arc::new(Agent::new(name, Arc::new(MockGenerator::new(reply))))
}

fn admin() -> Arc<Agent> {
    Arc::new(Agent::new("Admin", Arc::new(DefaultAutoReply)))
}

fn reviewer(reply: &str) -> Arc<Agent> {
    Arc::new(
        Agent::new("Reviewer", Arc::new(MockGenerator::new(reply))).with_default_termination(),
    )
}

fn run_sql_call() -> Message {
    Message::function_call(FunctionCall::new("run_sql", json!({"sql": "SELECT * FROM jobs"})))
}

fn analyst(output: &'static str) -> Arc<Agent> {
    Arc::new(
        Agent::new("Analyst", Arc::new(MockGenerator::new(run_sql_call()))).with_function_map(
            FunctionMap::new().with_function(
                FunctionSpec::new("run_sql", "Run a SQL query"),
                Arc::new(move |_| Ok(output.to_string())),
            ),
        ),
    )
}

#[test]
fn test_construction_requires_two_agents() {
    let err = Orchestrator::new("lonely", vec![admin()]).unwrap_err();
    assert!(matches!(err, OrchestratorError::ConfigurationError(_)));

    let orchestrator = Orchestrator::new("pair", vec![admin(), agent("Engineer", "x")]).unwrap();
    assert_eq!(orchestrator.total_agents(), 2);
    assert_eq!(orchestrator.get_cost_and_tokens(), (0.0, 0));
}

#[tokio::test]
async fn test_sequential_approved() {
    let mut orchestrator = Orchestrator::new(
        "sql-team",
        vec![admin(), agent("Engineer", "SELECT 1"), reviewer("APPROVED")],
    )
    .unwrap();

    let result = orchestrator.sequential_conversation("do the task").await;

    assert!(result.success);
    assert!(result.error_message.is_empty());
    assert_eq!(
        result.messages,
        vec![
            Message::plain("do the task"),
            Message::plain("SELECT 1"),
            Message::plain("APPROVED"),
        ]
    );
    assert_eq!(
        result.chats,
        vec![
            Chat::new("Admin", "Engineer", "do the task"),
            Chat::new("Engineer", "Reviewer", "SELECT 1"),
        ]
    );
    assert_eq!(result.last_message, "APPROVED");
}

#[tokio::test]
async fn test_sequential_without_approval_fails() {
    let mut orchestrator = Orchestrator::new(
        "sql-team",
        vec![admin(), agent("Engineer", "SELECT 1"), reviewer("Needs a WHERE clause")],
    )
    .unwrap();

    let result = orchestrator.sequential_conversation("do the task").await;

    assert!(!result.success);
    assert!(result.error_message.is_empty());
    assert_eq!(result.messages.len(), 3);
    assert_eq!(result.messages[0], Message::plain("do the task"));
}

#[tokio::test]
async fn test_sequential_executes_function_calls() {
    let mut orchestrator = Orchestrator::new(
        "analytics",
        vec![admin(), analyst("5 rows"), reviewer("APPROVED")],
    )
    .unwrap();

    let result = orchestrator.sequential_conversation("list jobs").await;

    assert!(result.success, "{}", result.error_message);
    assert_eq!(
        result.messages,
        vec![
            Message::plain("list jobs"),
            run_sql_call(),
            Message::content("5 rows"),
            Message::plain("APPROVED"),
        ]
    );
    let routes: Vec<(&str, &str)> = result
        .chats
        .iter()
        .map(|c| (c.from_name.as_str(), c.to_name.as_str()))
        .collect();
    assert_eq!(
        routes,
        vec![
            ("Admin", "Analyst"),
            ("Analyst", "Analyst"),
            ("Analyst", "Reviewer")
        ]
    );
    assert_eq!(result.chats[2].message, "5 rows");
}

#[tokio::test]
async fn test_function_chat_forwards_function_output() {
    let mut orchestrator =
        Orchestrator::new("analytics", vec![analyst("5 rows"), reviewer("APPROVED")]).unwrap();
    orchestrator.add_message(run_sql_call());
    assert!(orchestrator.last_message_is_func_call());

    let latest = orchestrator.latest_message().cloned().unwrap();
    let reply = orchestrator
        .function_chat("Analyst", "Reviewer", latest)
        .await
        .unwrap();

    assert_eq!(reply, Message::plain("APPROVED"));
    let last_chat = orchestrator.chats().last().unwrap();
    assert_eq!(last_chat, &Chat::new("Analyst", "Reviewer", "5 rows"));
}

#[tokio::test]
async fn test_empty_function_output_is_a_protocol_violation() {
    let mut orchestrator = Orchestrator::new(
        "analytics",
        vec![admin(), analyst(""), reviewer("APPROVED")],
    )
    .unwrap();

    let result = orchestrator.sequential_conversation("list jobs").await;

    assert!(!result.success);
    assert!(result.error_message.starts_with("Protocol violation"));
    assert_eq!(result.messages.len(), 3);
}

#[tokio::test]
async fn test_structured_reply_without_call_stalls() {
    let mut orchestrator = Orchestrator::new(
        "sql-team",
        vec![
            admin(),
            agent("Engineer", Message::content("here is some content")),
            reviewer("APPROVED"),
        ],
    )
    .unwrap();

    let result = orchestrator.sequential_conversation("do the task").await;

    assert!(!result.success);
    assert!(result.error_message.starts_with("Stalled conversation"));
    assert_eq!(result.messages.len(), 2);
    assert_eq!(result.chats.len(), 1);
}

#[tokio::test]
async fn test_function_call_without_function_map_stalls() {
    let mut orchestrator = Orchestrator::new(
        "sql-team",
        vec![admin(), agent("Engineer", run_sql_call()), reviewer("APPROVED")],
    )
    .unwrap();

    let result = orchestrator.sequential_conversation("do the task").await;

    assert!(!result.success);
    assert!(result.error_message.contains("Stalled"));
}

#[tokio::test]
async fn test_reply_failure_is_reported_verbatim() {
    let mut orchestrator = Orchestrator::new(
        "sql-team",
        vec![
            admin(),
            Arc::new(Agent::new("Engineer", Arc::new(FailingGenerator))),
            reviewer("APPROVED"),
        ],
    )
    .unwrap();

    let result = orchestrator.sequential_conversation("do the task").await;

    assert!(!result.success);
    assert!(result.error_message.contains("model unavailable"));
    assert!(result.error_message.contains("Engineer"));
    assert_eq!(result.messages, vec![Message::plain("do the task")]);
}

#[tokio::test]
async fn test_broadcast_reaches_every_recipient_in_order() {
    let mut orchestrator = Orchestrator::new(
        "writers",
        vec![
            admin(),
            Arc::new(Agent::new(
                "Writer1",
                Arc::new(MockGenerator::delayed("text report", 40)),
            )),
            Arc::new(Agent::new(
                "Writer2",
                Arc::new(MockGenerator::delayed("json report", 20)),
            )),
            agent("Writer3", "yaml report"),
        ],
    )
    .unwrap();

    let result = orchestrator.broadcast_conversation("payload").await;

    assert!(result.success);
    assert_eq!(result.chats.len(), 3);
    for (chat, to) in result.chats.iter().zip(&["Writer1", "Writer2", "Writer3"]) {
        assert_eq!(chat.from_name, "Admin");
        assert_eq!(chat.to_name, *to);
        assert_eq!(chat.message, "payload");
    }
    assert_eq!(
        result.messages,
        vec![
            Message::plain("payload"),
            Message::plain("text report"),
            Message::plain("json report"),
            Message::plain("yaml report"),
        ]
    );
}

#[tokio::test]
async fn test_broadcast_runs_recipient_functions() {
    let mut orchestrator = Orchestrator::new(
        "reports",
        vec![admin(), analyst("5 rows"), agent("Writer", "done")],
    )
    .unwrap();

    let result = orchestrator.broadcast_conversation("payload").await;

    assert!(result.success);
    let routes: Vec<(&str, &str)> = result
        .chats
        .iter()
        .map(|c| (c.from_name.as_str(), c.to_name.as_str()))
        .collect();
    assert_eq!(
        routes,
        vec![
            ("Admin", "Analyst"),
            ("Analyst", "Analyst"),
            ("Analyst", "Admin"),
            ("Admin", "Writer"),
        ]
    );
    assert_eq!(result.chats[2].message, "5 rows");
}

#[tokio::test]
async fn test_broadcast_failure_keeps_other_replies() {
    let mut orchestrator = Orchestrator::new(
        "writers",
        vec![
            admin(),
            Arc::new(Agent::new("Broken", Arc::new(FailingGenerator))),
            agent("Writer", "report"),
        ],
    )
    .unwrap();

    let result = orchestrator.broadcast_conversation("payload").await;

    assert!(!result.success);
    assert!(result.error_message.contains("model unavailable"));
    assert_eq!(result.chats.len(), 2);
    assert_eq!(result.last_message, "report");
}

#[tokio::test]
async fn test_classification_is_idempotent() {
    let mut orchestrator =
        Orchestrator::new("pair", vec![admin(), agent("Engineer", "x")]).unwrap();

    orchestrator.add_message("plain text");
    for _ in 0..3 {
        assert!(orchestrator.last_message_is_string());
        assert!(!orchestrator.last_message_is_func_call());
        assert!(!orchestrator.last_message_is_structured());
    }

    orchestrator.add_message(Message::Structured {
        content: Some("running".to_string()),
        function_call: Some(FunctionCall::new("run_sql", json!({}))),
    });
    for _ in 0..3 {
        assert!(orchestrator.last_message_is_structured());
        assert!(orchestrator.last_message_is_func_call());
        assert!(orchestrator.last_message_is_content());
        assert!(!orchestrator.last_message_is_string());
    }
}

#[tokio::test]
async fn test_cost_and_tokens_never_decrease() {
    let mut orchestrator = Orchestrator::new("pair", vec![admin(), agent("Engineer", "x")])
        .unwrap()
        .with_config(AgentRelayConfig {
            price_per_1k_tokens: 0.06,
            ..AgentRelayConfig::default()
        });

    let mut previous = orchestrator.get_cost_and_tokens();
    assert_eq!(previous, (0.0, 0));

    for message in &["a", "", "SELECT * FROM users WHERE id = 1", "APPROVED"] {
        orchestrator.add_message(*message);
        let current = orchestrator.get_cost_and_tokens();
        assert!(current.1 >= previous.1);
        assert!(current.0 >= previous.0);
        previous = current;
    }
    assert!(previous.1 > 0);
}

#[tokio::test]
async fn test_result_reports_usage() {
    let mut orchestrator = Orchestrator::new(
        "sql-team",
        vec![admin(), agent("Engineer", "SELECT 1"), reviewer("APPROVED")],
    )
    .unwrap();

    let result = orchestrator.sequential_conversation("do the task").await;

    // "do the task" + "SELECT 1" + "APPROVED" = 27 characters -> 7 tokens
    assert_eq!(result.tokens, 7);
    assert!((result.cost - 7.0 / 1000.0 * 0.06).abs() < 1e-12);
    assert_eq!(orchestrator.get_cost_and_tokens(), (result.cost, result.tokens));
}

#[tokio::test]
async fn test_runs_reset_state() {
    let mut orchestrator = Orchestrator::new(
        "sql-team",
        vec![admin(), agent("Engineer", "SELECT 1"), reviewer("APPROVED")],
    )
    .unwrap();

    let first = orchestrator.sequential_conversation("first task").await;
    let second = orchestrator.sequential_conversation("second task").await;

    assert_eq!(first.messages.len(), 3);
    assert_eq!(second.messages.len(), 3);
    assert_eq!(second.messages[0], Message::plain("second task"));
    assert_eq!(second.chats.len(), 2);
}

#[tokio::test]
async fn test_basic_chat_rejects_unknown_agents() {
    let mut orchestrator =
        Orchestrator::new("pair", vec![admin(), agent("Engineer", "x")]).unwrap();

    let err = orchestrator
        .basic_chat("Admin", "Ghost", "hello")
        .await
        .unwrap_err();
    assert_eq!(err, OrchestratorError::AgentNotFound("Ghost".to_string()));
    assert!(orchestrator.chats().is_empty());
}

#[tokio::test]
async fn test_threads_are_kept_per_pair() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_by_generator = Arc::clone(&seen);
    let listener = Arc::new(Agent::new(
        "Listener",
        Arc::new(ReplyFn::new(move |request| {
            seen_by_generator
                .lock()
                .unwrap()
                .push((request.sender.to_string(), request.history.len()));
            Ok(Message::plain("noted"))
        })),
    ));
    let mut orchestrator =
        Orchestrator::new("threads", vec![admin(), agent("Other", "x"), listener]).unwrap();

    orchestrator.basic_chat("Admin", "Listener", "one").await.unwrap();
    orchestrator.basic_chat("Admin", "Listener", "two").await.unwrap();
    orchestrator.basic_chat("Other", "Listener", "three").await.unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            ("Admin".to_string(), 1),
            ("Admin".to_string(), 3),
            ("Other".to_string(), 1)
        ]
    );
}

#[tokio::test]
async fn test_events_follow_the_run() {
    let handler = Arc::new(RecordingHandler::default());
    let mut orchestrator = Orchestrator::new(
        "analytics",
        vec![admin(), analyst("5 rows"), reviewer("APPROVED")],
    )
    .unwrap()
    .with_event_handler(handler.clone());

    let result = orchestrator.sequential_conversation("list jobs").await;
    assert!(result.success);

    let events = handler.events.lock().unwrap();
    assert!(matches!(
        events.first(),
        Some(OrchestratorEvent::RunStarted {
            protocol: "sequential",
            agent_count: 3,
            ..
        })
    ));
    let delivered = events
        .iter()
        .filter(|e| matches!(e, OrchestratorEvent::ChatDelivered { .. }))
        .count();
    assert_eq!(delivered, 3);
    assert!(events.iter().any(|e| matches!(
        e,
        OrchestratorEvent::FunctionExecuted { function_name, .. } if function_name == "run_sql"
    )));
    match events.last() {
        Some(OrchestratorEvent::RunCompleted {
            success,
            message_count,
            ..
        }) => {
            assert!(*success);
            assert_eq!(*message_count, 4);
        }
        other => panic!("unexpected last event: {:?}", other),
    }
}

#[tokio::test]
async fn test_calls_from_other_agents_are_not_executed() {
    let handler = Arc::new(RecordingHandler::default());
    let executed = Arc::new(Mutex::new(0usize));
    let executed_by_function = Arc::clone(&executed);
    let worker = Arc::new(
        Agent::new("Worker", Arc::new(MockGenerator::new("received"))).with_function_map(
            FunctionMap::new().with_function(
                FunctionSpec::new("run_sql", "Run a SQL query"),
                Arc::new(move |_| {
                    *executed_by_function.lock().unwrap() += 1;
                    Ok("ran".to_string())
                }),
            ),
        ),
    );
    let mut orchestrator = Orchestrator::new("fan-out", vec![admin(), worker])
        .unwrap()
        .with_event_handler(handler.clone());

    let result = orchestrator.broadcast_conversation(run_sql_call()).await;

    assert!(result.success);
    assert_eq!(result.messages, vec![run_sql_call(), Message::plain("received")]);
    assert_eq!(result.chats.len(), 1);
    assert_eq!(*executed.lock().unwrap(), 0);
    assert!(!handler
        .events
        .lock()
        .unwrap()
        .iter()
        .any(|e| matches!(e, OrchestratorEvent::FunctionExecuted { .. })));
}

#[tokio::test]
async fn test_failed_delivery_still_reports_the_chat() {
    let handler = Arc::new(RecordingHandler::default());
    let mut orchestrator = Orchestrator::new(
        "sql-team",
        vec![
            admin(),
            Arc::new(Agent::new("Engineer", Arc::new(FailingGenerator))),
            reviewer("APPROVED"),
        ],
    )
    .unwrap()
    .with_event_handler(handler.clone());

    let result = orchestrator.sequential_conversation("do the task").await;
    assert!(!result.success);

    let events = handler.events.lock().unwrap();
    let delivered: Vec<(&str, &str)> = events
        .iter()
        .filter_map(|e| match e {
            OrchestratorEvent::ChatDelivered {
                from_name, to_name, ..
            } => Some((from_name.as_str(), to_name.as_str())),
            _ => None,
        })
        .collect();
    assert_eq!(delivered, vec![("Admin", "Engineer")]);
    assert_eq!(result.chats.len(), delivered.len());
}

struct PanickingGenerator;

#[async_trait]
impl ReplyGenerator for PanickingGenerator {
    async fn generate_reply(
        &self,
        _request: ReplyRequest<'_>,
    ) -> Result<Message, Box<dyn Error + Send + Sync>> {
        panic!("generator crashed")
    }
}

#[tokio::test]
async fn test_panicking_recipient_keeps_its_delivery_record() {
    let mut orchestrator = Orchestrator::new(
        "writers",
        vec![
            admin(),
            Arc::new(Agent::new("Crasher", Arc::new(PanickingGenerator))),
            agent("Writer", "report"),
        ],
    )
    .unwrap();

    let result = orchestrator.broadcast_conversation("payload").await;

    assert!(!result.success);
    assert!(result.error_message.starts_with("Execution failed"));
    assert_eq!(
        result.chats,
        vec![
            Chat::new("Admin", "Crasher", "payload"),
            Chat::new("Admin", "Writer", "payload"),
        ]
    );
    assert_eq!(
        result.messages,
        vec![Message::plain("payload"), Message::plain("report")]
    );
}
