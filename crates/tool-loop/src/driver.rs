//! Owns the agent loop: stream → parse/collect tool calls → execute →
//! inject results → repeat (§4.F, "the heart of the core").

use crate::executor::ToolExecutor;
use crate::xml;
use agw_backends::traits::{Backend, ChatConfig};
use agw_domain::stream::StreamEvent;
use agw_domain::tool::{Message, ToolCall};
use agw_events::{AgentEvent, RunOutcome};
use futures_util::StreamExt;
use serde_json::Value;
use std::sync::Arc;

const MAX_CONSECUTIVE_FAILURES: u32 = 3;

/// One run of the tool-calling loop, bound to a single backend and tool set.
pub struct ToolLoop {
    backend: Arc<dyn Backend>,
    tool_executor: Arc<dyn ToolExecutor>,
    tools: Vec<agw_domain::tool::ToolDefinition>,
    max_tool_calls: u32,
    worker_id: Option<String>,
    model_override: Option<String>,
    extra: Value,
}

impl ToolLoop {
    /// `max_tool_calls` must already be resolved and clamped by the caller
    /// (see [`crate::limits::WorkerToolLimits::resolve`]).
    pub fn new(
        backend: Arc<dyn Backend>,
        tool_executor: Arc<dyn ToolExecutor>,
        tools: Vec<agw_domain::tool::ToolDefinition>,
        max_tool_calls: u32,
        worker_id: Option<String>,
        model_override: Option<String>,
        extra: Value,
    ) -> Self {
        Self { backend, tool_executor, tools, max_tool_calls, worker_id, model_override, extra }
    }

    /// Run to completion, yielding UI events as they're produced. The
    /// returned stream is lazy: nothing happens until it's polled, and
    /// dropping it mid-run aborts in-flight backend streaming without
    /// executing further tool calls.
    pub fn run(
        self,
        thread_id: String,
        run_id: String,
        mut messages: Vec<Message>,
        temperature: Option<f32>,
        max_tokens: Option<u32>,
    ) -> agw_domain::stream::BoxStream<'static, AgentEvent> {
        let span = tracing::info_span!("tool_loop_run", %thread_id, %run_id, worker_id = self.worker_id.as_deref().unwrap_or(""));
        Box::pin(async_stream::stream! {
            let _enter = span.enter();
            yield AgentEvent::RunStarted { thread_id: thread_id.clone(), run_id: run_id.clone(), parent_run_id: None, input: None };

            let mut consecutive_failures = 0u32;
            let mut tool_call_count = 0u32;

            'outer: loop {
                let config = ChatConfig {
                    model: self.model_override.clone(),
                    temperature,
                    max_tokens,
                    tools: self.tools.clone(),
                    extra: self.extra.clone(),
                };

                let mut inner = match self.backend.stream_chat(&messages, &config).await {
                    Ok(s) => s,
                    Err(e) => {
                        yield AgentEvent::RunError { message: e.to_string(), code: Some("backend_stream_error".into()) };
                        consecutive_failures += 1;
                        if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                            yield terminal(&thread_id, &run_id, "max_failures");
                            return;
                        }
                        continue 'outer;
                    }
                };

                let message_id = format!("msg_{}", uuid::Uuid::new_v4().simple());
                let mut message_started = false;
                let mut clean_text = String::new();
                let mut xml_buffer = String::new();
                let mut native_calls: Vec<ToolCall> = Vec::new();
                let mut xml_calls: Vec<ToolCall> = Vec::new();
                let mut stop_reason: Option<String> = None;
                let mut errored = false;

                while let Some(event) = inner.next().await {
                    match event {
                        Ok(StreamEvent::Delta { text }) => {
                            if self.backend.supports_native_tools() {
                                clean_text.push_str(&text);
                                if !message_started {
                                    yield AgentEvent::TextMessageStart { message_id: message_id.clone(), role: "assistant".into() };
                                    message_started = true;
                                }
                                yield AgentEvent::TextMessageContent { message_id: message_id.clone(), delta: text };
                            } else {
                                xml_buffer.push_str(&text);
                                if !xml::has_partial_tool_call(&xml_buffer) {
                                    let (clean, calls) = xml::extract(&xml_buffer);
                                    xml_calls.extend(calls);
                                    xml_buffer.clear();
                                    if !clean.is_empty() {
                                        clean_text.push_str(&clean);
                                        clean_text.push(' ');
                                        if !message_started {
                                            yield AgentEvent::TextMessageStart { message_id: message_id.clone(), role: "assistant".into() };
                                            message_started = true;
                                        }
                                        yield AgentEvent::TextMessageContent { message_id: message_id.clone(), delta: clean };
                                    }
                                }
                            }
                        }
                        Ok(StreamEvent::ToolCall { id, name, arguments }) => {
                            native_calls.push(ToolCall { id, name, arguments, provider: self.backend.name().to_string(), raw: None });
                        }
                        Ok(StreamEvent::Done { stop_reason: reason, .. }) => {
                            stop_reason = reason;
                            break;
                        }
                        Ok(StreamEvent::Error { message, code }) => {
                            yield AgentEvent::RunError { message, code };
                            consecutive_failures += 1;
                            errored = true;
                            break;
                        }
                        Err(e) => {
                            yield AgentEvent::RunError { message: e.to_string(), code: Some("backend_stream_error".into()) };
                            consecutive_failures += 1;
                            errored = true;
                            break;
                        }
                    }
                }

                if errored {
                    if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                        if message_started {
                            yield AgentEvent::TextMessageEnd { message_id: message_id.clone() };
                        }
                        yield terminal(&thread_id, &run_id, "max_failures");
                        return;
                    }
                    continue 'outer;
                }
                consecutive_failures = 0;

                // final flush: even an unterminated XML buffer is drained rather than dropped.
                if !xml_buffer.is_empty() {
                    let (clean, calls) = xml::extract(&xml_buffer);
                    xml_calls.extend(calls);
                    if !clean.is_empty() {
                        clean_text.push_str(&clean);
                    }
                }

                let mut all_calls = native_calls;
                all_calls.extend(xml_calls);

                let clean_text = clean_text.trim().to_string();

                if all_calls.is_empty() {
                    messages.push(Message::assistant(clean_text));
                    if message_started {
                        yield AgentEvent::TextMessageEnd { message_id: message_id.clone() };
                    }
                    yield terminal_with_reason(&thread_id, &run_id, stop_reason.unwrap_or_else(|| "end_turn".into()));
                    return;
                }

                tool_call_count += all_calls.len() as u32;
                if self.max_tool_calls > 0 && tool_call_count > self.max_tool_calls {
                    yield AgentEvent::RunError { message: "tool call budget exceeded".into(), code: Some("tool_limit_exceeded".into()) };
                    messages.push(Message::assistant("Tool call limit reached."));
                    if message_started {
                        yield AgentEvent::TextMessageEnd { message_id: message_id.clone() };
                    }
                    yield terminal(&thread_id, &run_id, "tool_limit");
                    return;
                }

                messages.push(Message::assistant_with_tool_calls(clean_text, all_calls.clone()));
                if message_started {
                    yield AgentEvent::TextMessageEnd { message_id: message_id.clone() };
                }

                for call in all_calls {
                    yield AgentEvent::ToolCallStart {
                        tool_call_id: call.id.clone(),
                        tool_call_name: call.name.clone(),
                        parent_message_id: Some(message_id.clone()),
                    };
                    yield AgentEvent::ToolCallArgs {
                        tool_call_id: call.id.clone(),
                        delta: call.arguments.to_string(),
                    };
                    yield AgentEvent::ToolCallEnd { tool_call_id: call.id.clone() };

                    let mut result = self.tool_executor.call(&call.name, call.arguments.clone()).await;
                    result.id = call.id.clone();
                    result.name = call.name.clone();

                    yield AgentEvent::ToolCallResult {
                        tool_call_id: call.id.clone(),
                        content: result.render_content(),
                        role: "tool".into(),
                    };

                    if let Some(obj) = result.pending_interrupt() {
                        let payload = Value::Object(obj.clone());
                        yield AgentEvent::clarification_request(payload.clone());
                        yield AgentEvent::RunFinished {
                            thread_id: thread_id.clone(),
                            run_id: run_id.clone(),
                            outcome: RunOutcome::Interrupt,
                            result: None,
                            interrupt: Some(payload),
                        };
                        return;
                    }

                    messages.push(Message::tool_result(call.id.clone(), result.render_content()));
                }
            }
        })
    }
}

fn terminal(thread_id: &str, run_id: &str, stop_reason: &str) -> AgentEvent {
    terminal_with_reason(thread_id, run_id, stop_reason.to_string())
}

fn terminal_with_reason(thread_id: &str, run_id: &str, stop_reason: String) -> AgentEvent {
    AgentEvent::RunFinished {
        thread_id: thread_id.to_string(),
        run_id: run_id.to_string(),
        outcome: RunOutcome::Success,
        result: Some(serde_json::json!({ "stop_reason": stop_reason })),
        interrupt: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::test_support::ScriptedExecutor;
    use agw_domain::error::Result;
    use agw_domain::tool::ToolResult;
    use async_trait::async_trait;

    struct ScriptedBackend {
        native: bool,
        turns: std::sync::Mutex<Vec<Vec<StreamEvent>>>,
    }

    #[async_trait]
    impl Backend for ScriptedBackend {
        fn name(&self) -> &str {
            "scripted"
        }
        fn supports_native_tools(&self) -> bool {
            self.native
        }
        fn default_model(&self) -> &str {
            "scripted-model"
        }
        async fn stream_chat(
            &self,
            _messages: &[Message],
            _config: &ChatConfig,
        ) -> Result<agw_domain::stream::BoxStream<'static, Result<StreamEvent>>> {
            let turn = self.turns.lock().unwrap().remove(0);
            Ok(Box::pin(futures_util::stream::iter(turn.into_iter().map(Ok))))
        }
        async fn health(&self) -> agw_backends::traits::Health {
            agw_backends::traits::Health::ok()
        }
    }

    async fn collect(stream: agw_domain::stream::BoxStream<'static, AgentEvent>) -> Vec<AgentEvent> {
        stream.collect::<Vec<_>>().await
    }

    #[tokio::test]
    async fn pure_chat_no_tools_ends_with_end_turn() {
        let backend = Arc::new(ScriptedBackend {
            native: true,
            turns: std::sync::Mutex::new(vec![vec![
                StreamEvent::Delta { text: "Hello".into() },
                StreamEvent::Done { stop_reason: Some("end_turn".into()), usage: None },
            ]]),
        });
        let executor = Arc::new(ScriptedExecutor::new(vec![]));
        let tool_loop = ToolLoop::new(backend, executor, vec![], 10, None, None, Value::Null);
        let events = collect(tool_loop.run("t1".into(), "r1".into(), vec![Message::user("hi")], None, None)).await;

        assert!(matches!(events[0], AgentEvent::RunStarted { .. }));
        assert!(events.iter().any(|e| matches!(e, AgentEvent::TextMessageContent { delta, .. } if delta == "Hello")));
        let last = events.last().unwrap();
        match last {
            AgentEvent::RunFinished { outcome: RunOutcome::Success, result, .. } => {
                assert_eq!(result.as_ref().unwrap()["stop_reason"], "end_turn");
            }
            other => panic!("unexpected terminal event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn native_tool_call_executes_and_continues() {
        let backend = Arc::new(ScriptedBackend {
            native: true,
            turns: std::sync::Mutex::new(vec![
                vec![
                    StreamEvent::ToolCall { id: "c1".into(), name: "list_files".into(), arguments: serde_json::json!({"path": "."}) },
                    StreamEvent::Done { stop_reason: Some("tool_use".into()), usage: None },
                ],
                vec![
                    StreamEvent::Delta { text: "a, b, c".into() },
                    StreamEvent::Done { stop_reason: Some("end_turn".into()), usage: None },
                ],
            ]),
        });
        let executor = Arc::new(ScriptedExecutor::new(vec![ToolResult::ok("", "list_files", serde_json::json!("a\nb\nc"))]));
        let tool_loop = ToolLoop::new(backend, executor, vec![], 10, None, None, Value::Null);
        let events = collect(tool_loop.run("t1".into(), "r1".into(), vec![Message::user("list files")], None, None)).await;

        assert!(events.iter().any(|e| matches!(e, AgentEvent::ToolCallStart { tool_call_id, .. } if tool_call_id == "c1")));
        assert!(events.iter().any(|e| matches!(e, AgentEvent::ToolCallResult { .. })));
        assert!(events.iter().any(|e| matches!(e, AgentEvent::TextMessageContent { delta, .. } if delta == "a, b, c")));
    }

    #[tokio::test]
    async fn xml_tool_call_suppressed_until_complete() {
        let backend = Arc::new(ScriptedBackend {
            native: false,
            turns: std::sync::Mutex::new(vec![
                vec![
                    StreamEvent::Delta { text: "Let me check. ".into() },
                    StreamEvent::Delta { text: "<tool_call><name>read_file".into() },
                    StreamEvent::Delta { text: "</name><arguments>{\"path\":\"README\"}</arguments></tool_call>".into() },
                    StreamEvent::Done { stop_reason: Some("tool_use".into()), usage: None },
                ],
                vec![
                    StreamEvent::Delta { text: "it's empty".into() },
                    StreamEvent::Done { stop_reason: Some("end_turn".into()), usage: None },
                ],
            ]),
        });
        let executor = Arc::new(ScriptedExecutor::new(vec![ToolResult::ok("", "read_file", serde_json::json!("contents"))]));
        let tool_loop = ToolLoop::new(backend, executor, vec![], 10, None, None, Value::Null);
        let events = collect(tool_loop.run("t1".into(), "r1".into(), vec![Message::user("check readme")], None, None)).await;

        for e in &events {
            if let AgentEvent::TextMessageContent { delta, .. } = e {
                assert!(!delta.contains("tool_call"), "leaked xml: {delta}");
            }
        }
        assert!(events.iter().any(|e| matches!(e, AgentEvent::ToolCallStart { tool_call_name, .. } if tool_call_name == "read_file")));
    }

    #[tokio::test]
    async fn tool_limit_terminates_without_executing_extra_calls() {
        let backend = Arc::new(ScriptedBackend {
            native: true,
            turns: std::sync::Mutex::new(vec![
                vec![
                    StreamEvent::ToolCall { id: "c1".into(), name: "t".into(), arguments: serde_json::json!({}) },
                    StreamEvent::Done { stop_reason: Some("tool_use".into()), usage: None },
                ],
                vec![
                    StreamEvent::ToolCall { id: "c2".into(), name: "t".into(), arguments: serde_json::json!({}) },
                    StreamEvent::Done { stop_reason: Some("tool_use".into()), usage: None },
                ],
                vec![
                    StreamEvent::ToolCall { id: "c3".into(), name: "t".into(), arguments: serde_json::json!({}) },
                    StreamEvent::Done { stop_reason: Some("tool_use".into()), usage: None },
                ],
            ]),
        });
        let executor = Arc::new(ScriptedExecutor::new(vec![ToolResult::ok("", "t", Value::Null)]));
        let tool_loop = ToolLoop::new(backend, executor, vec![], 2, None, None, Value::Null);
        let events = collect(tool_loop.run("t1".into(), "r1".into(), vec![Message::user("go")], None, None)).await;

        let tool_starts = events.iter().filter(|e| matches!(e, AgentEvent::ToolCallStart { .. })).count();
        assert_eq!(tool_starts, 2);
        assert!(events.iter().any(|e| matches!(e, AgentEvent::RunError { code, .. } if code.as_deref() == Some("tool_limit_exceeded"))));
        let last = events.last().unwrap();
        match last {
            AgentEvent::RunFinished { result, .. } => assert_eq!(result.as_ref().unwrap()["stop_reason"], "tool_limit"),
            other => panic!("unexpected terminal event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn pending_interrupt_halts_run_with_clarification_request() {
        let backend = Arc::new(ScriptedBackend {
            native: true,
            turns: std::sync::Mutex::new(vec![vec![
                StreamEvent::ToolCall { id: "c1".into(), name: "ask_user".into(), arguments: serde_json::json!({}) },
                StreamEvent::Done { stop_reason: Some("tool_use".into()), usage: None },
            ]]),
        });
        let executor = Arc::new(ScriptedExecutor::new(vec![ToolResult::ok(
            "",
            "ask_user",
            serde_json::json!({"pending": true, "question": "which file?"}),
        )]));
        let tool_loop = ToolLoop::new(backend, executor, vec![], 10, None, None, Value::Null);
        let events = collect(tool_loop.run("t1".into(), "r1".into(), vec![Message::user("go")], None, None)).await;

        assert!(events.iter().any(|e| matches!(e, AgentEvent::Custom { name, .. } if name == "clarification_request")));
        let last = events.last().unwrap();
        assert!(matches!(last, AgentEvent::RunFinished { outcome: RunOutcome::Interrupt, .. }));
    }

    #[tokio::test]
    async fn backend_errors_terminate_after_three_consecutive_failures() {
        let backend = Arc::new(ScriptedBackend {
            native: true,
            turns: std::sync::Mutex::new(vec![
                vec![StreamEvent::Error { message: "boom1".into(), code: None }],
                vec![StreamEvent::Error { message: "boom2".into(), code: None }],
                vec![StreamEvent::Error { message: "boom3".into(), code: None }],
            ]),
        });
        let executor = Arc::new(ScriptedExecutor::new(vec![]));
        let tool_loop = ToolLoop::new(backend, executor, vec![], 10, None, None, Value::Null);
        let events = collect(tool_loop.run("t1".into(), "r1".into(), vec![Message::user("go")], None, None)).await;

        let errors = events.iter().filter(|e| matches!(e, AgentEvent::RunError { .. })).count();
        assert_eq!(errors, 3);
        let last = events.last().unwrap();
        match last {
            AgentEvent::RunFinished { result, .. } => assert_eq!(result.as_ref().unwrap()["stop_reason"], "max_failures"),
            other => panic!("unexpected terminal event: {other:?}"),
        }
    }
}
