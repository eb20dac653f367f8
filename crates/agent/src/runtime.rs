//! The bounded selection/invocation/observation loop.
//!
//! Each iteration asks the backend to pick the next capability (streaming
//! its reasoning tokens out as it goes), invokes that capability, and feeds
//! the observation back into the next selection. The loop ends with a final
//! answer, a hard failure, or the iteration cap; whichever comes first is
//! reported as the run's single terminal event. One unusable selection is
//! recovered by re-prompting with the parse error as the observation; a
//! second one fails the run.

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use minuteman_core::deadline::UNRESOLVED_SENTINEL;
use minuteman_db::repositories::{MeetingRepository, PreferenceRepository, TodoRepository};

use crate::capability::{Capability, CapabilityRegistry};
use crate::error::AgentError;
use crate::events::{AgentEvent, EventSink};
use crate::extractor::{CapabilityOutput, StructuredExtractor};
use crate::llm::LlmClient;
use crate::prompts;
use crate::reconcile::PreferenceReconciler;
use crate::session::{AgentSessionState, AgentStep};

/// Shared services a runtime instance is built from.
#[derive(Clone)]
pub struct AgentDeps {
    pub llm: Arc<dyn LlmClient>,
    pub meetings: Arc<dyn MeetingRepository>,
    pub todos: Arc<dyn TodoRepository>,
    pub preferences: Arc<dyn PreferenceRepository>,
}

/// One user request. `reference_now` anchors relative deadline language in
/// the todo extraction prompt; callers pass the wall clock, tests pass a
/// fixed instant.
#[derive(Clone, Debug)]
pub struct RunRequest {
    pub user_id: i64,
    pub query: String,
    pub meeting_text: Option<String>,
    pub reference_now: NaiveDateTime,
}

pub struct AgentRuntime {
    llm: Arc<dyn LlmClient>,
    meetings: Arc<dyn MeetingRepository>,
    todos: Arc<dyn TodoRepository>,
    preferences: Arc<dyn PreferenceRepository>,
    registry: CapabilityRegistry,
    extractor: StructuredExtractor,
    reconciler: PreferenceReconciler,
    max_iterations: u32,
}

impl AgentRuntime {
    pub fn new(deps: AgentDeps, max_iterations: u32) -> Self {
        let extractor = StructuredExtractor::new(deps.llm.clone());
        let reconciler = PreferenceReconciler::new(deps.llm.clone(), deps.preferences.clone());
        Self {
            llm: deps.llm,
            meetings: deps.meetings,
            todos: deps.todos,
            preferences: deps.preferences,
            registry: CapabilityRegistry::standard(),
            extractor,
            reconciler,
            max_iterations: max_iterations.max(1),
        }
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Drive one request to completion, emitting the run's events into
    /// `sink`. Always terminates the sink with exactly one terminal event
    /// and returns the session transcript for the caller to inspect.
    pub async fn run(&self, request: &RunRequest, sink: EventSink) -> AgentSessionState {
        let run_id = Uuid::new_v4();
        info!(%run_id, user_id = request.user_id, "agent run started");

        let mut session = AgentSessionState::default();
        match self.drive(request, &sink, &mut session).await {
            Ok(answer) => {
                info!(%run_id, iterations = session.iterations, "agent run completed");
                session.final_answer = Some(answer.clone());
                sink.finish(AgentEvent::Done(answer)).await;
            }
            Err(AgentError::Cancelled) => {
                // The consumer is gone; finish is a no-op send but keeps the
                // terminal invariant uniform.
                info!(%run_id, iterations = session.iterations, "agent run cancelled");
                sink.finish(AgentEvent::Failed(AgentError::Cancelled.to_string())).await;
            }
            Err(error) => {
                warn!(%run_id, iterations = session.iterations, %error, "agent run failed");
                sink.finish(AgentEvent::Failed(error.to_string())).await;
            }
        }
        session
    }

    async fn drive(
        &self,
        request: &RunRequest,
        sink: &EventSink,
        session: &mut AgentSessionState,
    ) -> Result<String, AgentError> {
        let mut recovered = false;

        while session.iterations < self.max_iterations {
            if sink.is_closed() {
                return Err(AgentError::Cancelled);
            }
            session.iterations += 1;

            let prompt = prompts::react_prompt(
                &self.registry,
                &request.query,
                request.meeting_text.as_deref(),
                &session.scratchpad(),
            );
            let raw = self.stream_selection(&prompt, sink).await?;

            let selection = parse_step(&raw).and_then(|parsed| match parsed {
                ParsedStep::Final { answer } => Ok(Selection::Final(answer)),
                ParsedStep::Action { thought, name, arguments } => {
                    let descriptor = self.registry.resolve(&name)?;
                    Ok(Selection::Invoke { thought, capability: descriptor.capability, arguments })
                }
            });

            match selection {
                Ok(Selection::Final(answer)) => return Ok(answer),
                Ok(Selection::Invoke { thought, capability, arguments }) => {
                    sink.emit(AgentEvent::Status { capability: capability.name().to_string() })
                        .await?;
                    let result = self.invoke(capability, &arguments, request).await?;
                    sink.emit(AgentEvent::Observation {
                        capability: capability.name().to_string(),
                        result: result.clone(),
                    })
                    .await?;
                    session.record_step(AgentStep {
                        thought,
                        capability: capability.name().to_string(),
                        arguments,
                        observation: result.to_string(),
                    });
                }
                Err(error) if error.is_recoverable_selection() && !recovered => {
                    recovered = true;
                    warn!(%error, "unusable capability selection, re-prompting once");
                    session.record_step(AgentStep {
                        thought: raw.trim().to_string(),
                        capability: "invalid_selection".to_string(),
                        arguments: Value::Null,
                        observation: format!(
                            "{error}。请严格按照 Thought/Action/Action Input 格式重新选择工具。"
                        ),
                    });
                }
                Err(error) => return Err(error),
            }
        }

        Err(AgentError::IterationCapExceeded(self.max_iterations))
    }

    /// One streaming selection call. Token fragments are forwarded into the
    /// event stream as they arrive; the full completion is returned for
    /// parsing once the backend finishes.
    async fn stream_selection(
        &self,
        prompt: &str,
        sink: &EventSink,
    ) -> Result<String, AgentError> {
        let (token_tx, mut token_rx) = mpsc::channel(32);
        let forwarder_sink = sink.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(fragment) = token_rx.recv().await {
                if forwarder_sink.emit(AgentEvent::Stream(fragment)).await.is_err() {
                    break;
                }
            }
        });

        let raw = self.llm.complete_streaming(prompts::REACT_SYSTEM, prompt, token_tx).await;
        // The forwarder ends once the backend drops its sender.
        let _ = forwarder.await;
        raw
    }

    async fn invoke(
        &self,
        capability: Capability,
        arguments: &Value,
        request: &RunRequest,
    ) -> Result<Value, AgentError> {
        // The selection step passes the relevant slice as `text`; fall back
        // to the transcript, then the bare query.
        let text = arguments
            .get("text")
            .and_then(Value::as_str)
            .or(request.meeting_text.as_deref())
            .unwrap_or(&request.query);

        let output = match capability {
            Capability::ExtractBasicInfo => {
                CapabilityOutput::BasicInfo(self.extractor.basic_info(text).await?)
            }
            Capability::ParseAgendaConclusion => {
                CapabilityOutput::Agendas(self.extractor.agendas(text).await?)
            }
            Capability::GenerateTodos => {
                CapabilityOutput::Todos(self.extractor.todos(text, request.reference_now).await?)
            }
            Capability::MarkFollowUps => {
                CapabilityOutput::FollowUps(self.extractor.follow_ups(text).await?)
            }
            Capability::GetUserContext => return self.user_context(request.user_id).await,
            Capability::GeneratePreferences => {
                let reconciled = self.reconciler.reconcile(request.user_id, text).await?;
                return Ok(json!({ "preferences": reconciled }));
            }
        };
        Ok(output.into_observation())
    }

    async fn user_context(&self, user_id: i64) -> Result<Value, AgentError> {
        let meetings = self.meetings.list_for_user(user_id).await?;
        let todos = self.todos.list_for_user(user_id).await?;
        let preferences = self.preferences.map_for_user(user_id).await?;

        let meetings: Vec<Value> = meetings
            .iter()
            .map(|meeting| {
                json!({
                    "id": meeting.id,
                    "subject": meeting.subject,
                    "start_time": meeting.start_time.format("%Y-%m-%d %H:%M").to_string(),
                })
            })
            .collect();
        let todos: Vec<Value> = todos
            .iter()
            .map(|todo| {
                json!({
                    "id": todo.id,
                    "owner": todo.owner,
                    "task": todo.task,
                    "deadline": todo
                        .deadline
                        .map(|deadline| deadline.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_else(|| UNRESOLVED_SENTINEL.to_string()),
                    "status": todo.status.as_str(),
                })
            })
            .collect();

        Ok(json!({"meetings": meetings, "todos": todos, "preferences": preferences}))
    }
}

enum Selection {
    Final(String),
    Invoke { thought: String, capability: Capability, arguments: Value },
}

enum ParsedStep {
    Final { answer: String },
    Action { thought: String, name: String, arguments: Value },
}

/// Parse one selection completion. `Final Answer:` wins over any `Action:`
/// text; an action needs both a name and an input to count.
fn parse_step(raw: &str) -> Result<ParsedStep, AgentError> {
    const FINAL_MARKER: &str = "Final Answer:";
    const ACTION_MARKER: &str = "Action:";
    const INPUT_MARKER: &str = "Action Input:";

    if let Some(index) = raw.find(FINAL_MARKER) {
        return Ok(ParsedStep::Final {
            answer: raw[index + FINAL_MARKER.len()..].trim().to_string(),
        });
    }

    let action_index = raw
        .find(ACTION_MARKER)
        .ok_or_else(|| AgentError::SelectionParse(excerpt(raw)))?;
    let after_action = &raw[action_index + ACTION_MARKER.len()..];
    let input_index = after_action
        .find(INPUT_MARKER)
        .ok_or_else(|| AgentError::SelectionParse(excerpt(raw)))?;

    let name = after_action[..input_index].trim().trim_matches('`').trim().to_string();
    if name.is_empty() {
        return Err(AgentError::SelectionParse(excerpt(raw)));
    }

    // Cut at a leaked Observation line in case the stop sequence was missed.
    let input_raw = &after_action[input_index + INPUT_MARKER.len()..];
    let input_raw = input_raw.split("\nObservation").next().unwrap_or(input_raw).trim();
    let arguments =
        serde_json::from_str(input_raw).unwrap_or_else(|_| json!({ "text": input_raw }));

    let thought = raw[..action_index].trim().trim_start_matches("Thought:").trim().to_string();
    Ok(ParsedStep::Action { thought, name, arguments })
}

fn excerpt(raw: &str) -> String {
    const LIMIT: usize = 120;
    let trimmed = raw.trim();
    if trimmed.chars().count() <= LIMIT {
        trimmed.to_string()
    } else {
        let mut cut: String = trimmed.chars().take(LIMIT).collect();
        cut.push('…');
        cut
    }
}
