//! One schema-constrained backend call per extraction capability.
//!
//! The backend's JSON is decoded strictly into the declared payload type:
//! missing required fields, unknown fields, or an out-of-contract deadline
//! all fail the whole call. Nothing is partially accepted or defaulted.

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use minuteman_core::deadline;
use minuteman_core::{AgendaConclusion, BasicInfo, FollowUp, TodoItem};

use crate::error::AgentError;
use crate::llm::LlmClient;
use crate::prompts;

#[derive(Clone, Debug, PartialEq)]
pub enum CapabilityOutput {
    BasicInfo(BasicInfo),
    Agendas(Vec<AgendaConclusion>),
    Todos(Vec<TodoItem>),
    FollowUps(Vec<FollowUp>),
}

impl CapabilityOutput {
    /// Shape of the observation fed back into the selection loop and
    /// published on the event stream; matches the declared output contract
    /// of the producing capability.
    pub fn into_observation(self) -> Value {
        match self {
            Self::BasicInfo(info) => serde_json::json!(info),
            Self::Agendas(items) => serde_json::json!({ "items": items }),
            Self::Todos(todos) => serde_json::json!({ "todos": todos }),
            Self::FollowUps(follow_ups) => serde_json::json!({ "follow_ups": follow_ups }),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AgendaList {
    items: Vec<AgendaConclusion>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TodoList {
    todos: Vec<TodoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FollowUpList {
    follow_ups: Vec<FollowUp>,
}

pub struct StructuredExtractor {
    llm: Arc<dyn LlmClient>,
}

impl StructuredExtractor {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// Strict decode of a backend payload into the capability's declared
    /// type. A mismatch is a validation failure, never an empty default.
    fn decode<T: DeserializeOwned>(payload: Value) -> Result<T, AgentError> {
        serde_json::from_value(payload).map_err(|error| {
            AgentError::SchemaValidation(format!("payload does not match schema: {error}"))
        })
    }

    pub async fn basic_info(&self, text: &str) -> Result<BasicInfo, AgentError> {
        let payload = self.llm.complete_json(prompts::BASIC_INFO_SYSTEM, text).await?;
        Self::decode(payload)
    }

    pub async fn agendas(&self, text: &str) -> Result<Vec<AgendaConclusion>, AgentError> {
        let payload = self.llm.complete_json(prompts::AGENDA_SYSTEM, text).await?;
        let list: AgendaList = Self::decode(payload)?;
        Ok(list.items)
    }

    /// Todo extraction additionally applies the deterministic deadline
    /// post-validation: every returned deadline must be an absolute
    /// timestamp or the exact unresolved sentinel.
    pub async fn todos(
        &self,
        text: &str,
        reference_now: NaiveDateTime,
    ) -> Result<Vec<TodoItem>, AgentError> {
        let system = prompts::todo_system(reference_now);
        let payload = self.llm.complete_json(&system, text).await?;
        let list: TodoList = Self::decode(payload)?;

        for todo in &list.todos {
            deadline::validate(&todo.deadline).map_err(|error| {
                AgentError::SchemaValidation(format!(
                    "todo `{}` has an out-of-contract deadline: {error}",
                    todo.task
                ))
            })?;
        }

        Ok(list.todos)
    }

    pub async fn follow_ups(&self, text: &str) -> Result<Vec<FollowUp>, AgentError> {
        let payload = self.llm.complete_json(prompts::FOLLOW_UP_SYSTEM, text).await?;
        let list: FollowUpList = Self::decode(payload)?;
        Ok(list.follow_ups)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;

    use crate::testing::ScriptedLlm;

    use super::StructuredExtractor;

    fn reference() -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 10).unwrap().and_hms_opt(9, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn basic_info_decodes_a_conforming_payload() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            r#"{"attendees": ["张三", "李四"], "time": "2024-06-10 14:00", "subject": "评审", "duration": "60"}"#,
        ]));
        let extractor = StructuredExtractor::new(llm);

        let info = extractor.basic_info("开场白……").await.expect("extract");
        assert_eq!(info.attendees, vec!["张三", "李四"]);
        assert_eq!(info.subject, "评审");
    }

    #[tokio::test]
    async fn missing_required_field_is_a_validation_failure() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            r#"{"attendees": [], "subject": "评审", "duration": "60"}"#,
        ]));
        let extractor = StructuredExtractor::new(llm);

        let result = extractor.basic_info("开场白……").await;
        assert!(matches!(result, Err(crate::AgentError::SchemaValidation(_))));
    }

    #[tokio::test]
    async fn unknown_field_is_rejected_not_ignored() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            r#"{"items": [{"agenda": "预算", "conclusion": "通过"}], "summary": "多余"}"#,
        ]));
        let extractor = StructuredExtractor::new(llm);

        let result = extractor.agendas("讨论……").await;
        assert!(matches!(result, Err(crate::AgentError::SchemaValidation(_))));
    }

    #[tokio::test]
    async fn todo_with_sentinel_deadline_passes_post_validation() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            r#"{"todos": [{"owner": "张三", "task": "整理纪要", "deadline": "2024-06-11 18:00"},
                          {"owner": "李四", "task": "确认预算", "deadline": "待确认"}]}"#,
        ]));
        let extractor = StructuredExtractor::new(llm);

        let todos = extractor.todos("任务分配……", reference()).await.expect("extract");
        assert_eq!(todos.len(), 2);
        assert_eq!(todos[1].deadline, "待确认");
    }

    #[tokio::test]
    async fn one_unresolved_relative_deadline_fails_the_whole_payload() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            r#"{"todos": [{"owner": "张三", "task": "整理纪要", "deadline": "2024-06-11 18:00"},
                          {"owner": "李四", "task": "确认预算", "deadline": "明天"}]}"#,
        ]));
        let extractor = StructuredExtractor::new(llm);

        let result = extractor.todos("任务分配……", reference()).await;
        assert!(matches!(result, Err(crate::AgentError::SchemaValidation(_))));
    }

    #[test]
    fn observations_match_the_declared_output_contracts() {
        use minuteman_core::AgendaConclusion;

        let output = super::CapabilityOutput::Agendas(vec![AgendaConclusion {
            agenda: "预算".to_string(),
            conclusion: "通过".to_string(),
        }]);
        let observation = output.into_observation();
        assert_eq!(observation["items"][0]["agenda"], "预算");
    }

    #[tokio::test]
    async fn backend_failure_is_surfaced_not_swallowed() {
        let llm = Arc::new(ScriptedLlm::new(vec![]));
        let extractor = StructuredExtractor::new(llm);

        let result = extractor.follow_ups("争议……").await;
        assert!(matches!(result, Err(crate::AgentError::Backend(_))));
    }
}
