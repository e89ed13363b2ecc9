use std::future::ready;
use std::sync::{Arc, LazyLock, Mutex};

use hotel_agent_model::{ErrorKind, ModelMessage};
use hotel_agent_test_model::{
    PresetEvent, PresetFailure, PresetResponse, TestModelProvider,
};
use serde_json::{Map, Value, json};

use crate::tool::{Error, Tool, ToolOutput, ToolResult};
use crate::{AgentBuilder, AgentEvent, FinalAnswerMode, SessionError};

static SCHEMA: LazyLock<Value> =
    LazyLock::new(|| json!({ "type": "object", "properties": {} }));

/// Remembers its arguments and reports what it has seen so far.
struct RememberTool;

impl Tool for RememberTool {
    type Input = Map<String, Value>;

    fn name(&self) -> &str {
        "remember"
    }

    fn description(&self) -> &str {
        "Stores the arguments."
    }

    fn parameter_schema(&self) -> &Value {
        &SCHEMA
    }

    fn execute(
        &self,
        input: Self::Input,
        params: Map<String, Value>,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        ready(Ok(ToolOutput::new(Value::Object(params)).with_updates(input)))
    }
}

/// Renders a summary, or fails when asked to.
struct SummaryTool;

impl Tool for SummaryTool {
    type Input = Map<String, Value>;

    fn name(&self) -> &str {
        "summarize"
    }

    fn description(&self) -> &str {
        "Summarizes."
    }

    fn parameter_schema(&self) -> &Value {
        &SCHEMA
    }

    fn execute(
        &self,
        input: Self::Input,
        _params: Map<String, Value>,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        if input.contains_key("fail") {
            return ready(Err(Error::execution_error().with_reason("boom")));
        }
        ready(Ok(ToolOutput::new(json!({ "status": "found" }))
            .with_display("Found 2 hotels:\n1. A\n2. B")))
    }
}

fn assistant_turn(calls: &[(&str, &str, &str)]) -> PresetResponse {
    PresetResponse::with_events(
        calls
            .iter()
            .map(|(id, name, args)| PresetEvent::tool_call(id, name, args))
            .collect::<Vec<_>>(),
    )
}

#[tokio::test]
async fn test_plain_answer() {
    let mut provider = TestModelProvider::default();
    provider.add_assistant_turn(PresetResponse::with_text("Hello there"));

    let agent = AgentBuilder::with_model_provider(provider.clone())
        .with_system_prompt("You find hotels.")
        .with_tool(RememberTool)
        .build();
    let outcome = agent.ask("  Hi  ").await;

    assert_eq!(outcome.result, Ok("Hello there".to_owned()));
    assert_eq!(
        outcome.conversation.messages(),
        &[
            ModelMessage::System("You find hotels.".to_owned()),
            ModelMessage::User("Hi".to_owned()),
            ModelMessage::assistant_text("Hello there"),
        ]
    );

    let requests = provider.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].tools.len(), 1);
    assert_eq!(requests[0].tools[0].name, "remember");
}

#[tokio::test]
async fn test_tool_results_follow_call_order() {
    let mut provider = TestModelProvider::default();
    provider.add_assistant_turn(assistant_turn(&[
        ("call_b", "remember", r#"{"latitude":10}"#),
        ("call_a", "remember", r#"{"longitude":20}"#),
        ("call_c", "delete_everything", "{}"),
    ]));
    provider.add_assistant_turn(PresetResponse::with_text("Done"));

    let agent = AgentBuilder::with_model_provider(provider.clone())
        .with_tool(RememberTool)
        .build();
    let outcome = agent.ask("Find hotels").await;
    assert_eq!(outcome.result, Ok("Done".to_owned()));

    let results: Vec<_> = outcome.conversation.tool_results().collect();
    let ids: Vec<_> = results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, ["call_b", "call_a", "call_c"]);
    // Each call sees what the previous ones merged.
    assert_eq!(results[1].content, r#"{"latitude":10}"#);
    assert_eq!(
        results[2].content,
        r#"{"error":"unknown function: delete_everything"}"#
    );
    assert_eq!(
        Value::Object(outcome.parameters),
        json!({ "latitude": 10, "longitude": 20 })
    );

    // The second request carries the whole history.
    let requests = provider.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].messages.len(), 5);
    let ModelMessage::Assistant(assistant) = &requests[1].messages[1] else {
        panic!("expected the assistant tool request");
    };
    assert_eq!(assistant.content, None);
    assert_eq!(assistant.tool_calls.len(), 3);
}

#[tokio::test]
async fn test_backend_failures_are_fatal() {
    for (failure, kind) in [
        (PresetFailure::Unavailable, ErrorKind::Unavailable),
        (PresetFailure::Protocol, ErrorKind::Protocol),
        (PresetFailure::Authentication, ErrorKind::Authentication),
        (PresetFailure::RateLimited, ErrorKind::RateLimited),
    ] {
        let mut provider = TestModelProvider::default();
        provider.add_assistant_turn(PresetResponse::with_failure(failure));
        let agent = AgentBuilder::with_model_provider(provider.clone()).build();

        let outcome = agent.ask("Hotels in Nice").await;
        let Err(SessionError::Backend { kind: got, .. }) = &outcome.result
        else {
            panic!("expected a backend error, got {:?}", outcome.result);
        };
        assert_eq!(*got, kind);
        // No retry.
        assert_eq!(provider.requests().len(), 1);
        assert_eq!(
            outcome.conversation.last_assistant_text(),
            Some(outcome.reply().as_str())
        );
        assert!(outcome.reply().starts_with("Error: "));
    }
}

#[tokio::test]
async fn test_empty_reply_is_fatal_at_once() {
    let mut provider = TestModelProvider::default();
    provider.add_assistant_turn(PresetResponse::with_events(Vec::<PresetEvent>::new()));
    provider.add_assistant_turn(PresetResponse::with_text("never reached"));

    let agent = AgentBuilder::with_model_provider(provider.clone()).build();
    let outcome = agent.ask("Hotels?").await;

    assert_eq!(outcome.result, Err(SessionError::EmptyReply));
    assert_eq!(provider.requests().len(), 1);
    assert_eq!(
        outcome.reply(),
        "Error: The assistant returned neither an answer nor a tool request."
    );
}

#[tokio::test]
async fn test_round_limit() {
    let mut provider = TestModelProvider::default();
    for idx in 0..5 {
        let id = format!("call_{idx}");
        provider.add_assistant_turn(assistant_turn(&[(id.as_str(), "remember", "{}")]));
    }

    let agent = AgentBuilder::with_model_provider(provider.clone())
        .with_tool(RememberTool)
        .with_max_rounds(3)
        .build();
    let outcome = agent.ask("Loop forever").await;

    assert_eq!(outcome.result, Err(SessionError::TooManyRounds(3)));
    assert_eq!(provider.requests().len(), 3);
    assert_eq!(outcome.conversation.tool_results().count(), 3);
}

#[tokio::test]
async fn test_direct_answer_mode() {
    let script = || {
        let mut provider = TestModelProvider::default();
        provider.add_assistant_turn(assistant_turn(&[(
            "c1",
            "summarize",
            r#"{"fail":true}"#,
        )]));
        provider.add_assistant_turn(assistant_turn(&[("c2", "summarize", "{}")]));
        provider.add_assistant_turn(PresetResponse::with_text("Two hotels."));
        provider
    };

    let provider = script();
    let agent = AgentBuilder::with_model_provider(provider.clone())
        .with_tool(SummaryTool)
        .with_final_answer_mode(FinalAnswerMode::Direct)
        .build();
    let outcome = agent.ask("Hotels in Lyon").await;
    // A failed call doesn't end the session, the rendered one does.
    assert_eq!(outcome.result, Ok("Found 2 hotels:\n1. A\n2. B".to_owned()));
    assert_eq!(provider.requests().len(), 2);

    let provider = script();
    let agent = AgentBuilder::with_model_provider(provider.clone())
        .with_tool(SummaryTool)
        .build();
    let outcome = agent.ask("Hotels in Lyon").await;
    assert_eq!(outcome.result, Ok("Two hotels.".to_owned()));
    assert_eq!(provider.requests().len(), 3);
}

#[tokio::test]
async fn test_events() {
    let mut provider = TestModelProvider::default();
    provider.add_assistant_turn(assistant_turn(&[("c1", "remember", "{}")]));
    provider.add_assistant_turn(PresetResponse::with_text("Done"));

    let events = Arc::new(Mutex::new(vec![]));
    let agent = AgentBuilder::with_model_provider(provider)
        .with_tool(RememberTool)
        .on_event({
            let events = Arc::clone(&events);
            move |event| events.lock().unwrap().push(event.clone())
        })
        .build();
    agent.ask("Hi").await;

    assert_eq!(
        *events.lock().unwrap(),
        [
            AgentEvent::ModelRequested { round: 1 },
            AgentEvent::ToolCallStarted {
                name: "remember".to_owned(),
                arguments: "{}".to_owned(),
            },
            AgentEvent::ToolCallFinished {
                name: "remember".to_owned(),
                succeeded: true,
            },
            AgentEvent::ModelRequested { round: 2 },
        ]
    );
}

#[tokio::test]
async fn test_empty_question() {
    let provider = TestModelProvider::default();
    let agent = AgentBuilder::with_model_provider(provider.clone()).build();
    let outcome = agent.ask("   ").await;
    assert_eq!(outcome.result, Err(SessionError::EmptyQuestion));
    assert!(provider.requests().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_sessions_are_isolated() {
    let mut provider = TestModelProvider::default();
    provider.add_assistant_turn(assistant_turn(&[(
        "c1",
        "remember",
        r#"{"city":"Paris"}"#,
    )]));
    provider.add_assistant_turn(PresetResponse::with_text("Done"));

    let agent = Arc::new(
        AgentBuilder::with_model_provider(provider)
            .with_tool(RememberTool)
            .build(),
    );
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let agent = Arc::clone(&agent);
            tokio::spawn(async move { agent.ask("Hotels in Paris").await })
        })
        .collect();

    for handle in handles {
        let outcome = handle.await.unwrap();
        assert_eq!(outcome.result, Ok("Done".to_owned()));
        // Each session starts from an empty accumulator.
        assert_eq!(outcome.conversation.tool_results().next().unwrap().content, "{}");
        assert_eq!(Value::Object(outcome.parameters), json!({ "city": "Paris" }));
    }
}
