//! Assembles a [`MeetingRecord`] out of the observations a run produced.
//!
//! The orchestration loop invokes extraction capabilities in whatever order
//! the selection step chooses; the builder folds each observation into the
//! record-in-progress and the caller decides when the run has seen enough to
//! persist. Repeated invocations of the same capability overwrite (basic
//! info) or append (list-shaped outputs).

use serde::de::DeserializeOwned;
use serde_json::Value;

use minuteman_core::{
    AgendaConclusion, BasicInfo, DomainError, FollowUp, MeetingRecord, TodoItem,
};

use crate::capability::Capability;
use crate::error::AgentError;

#[derive(Debug, Default)]
pub struct MeetingRecordBuilder {
    basic_info: Option<BasicInfo>,
    agendas: Vec<AgendaConclusion>,
    todos: Vec<TodoItem>,
    follow_ups: Vec<FollowUp>,
}

impl MeetingRecordBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one capability observation into the record. Observations from
    /// capabilities that do not contribute to the record (user context,
    /// preferences) are ignored. The values come from the extractor, which
    /// already validated them against the capability's schema.
    pub fn observe(&mut self, capability: Capability, result: &Value) {
        match capability {
            Capability::ExtractBasicInfo => {
                if let Ok(info) = serde_json::from_value(result.clone()) {
                    self.basic_info = Some(info);
                }
            }
            Capability::ParseAgendaConclusion => {
                self.agendas.extend(decode_list::<AgendaConclusion>(&result["items"]));
            }
            Capability::GenerateTodos => {
                self.todos.extend(decode_list::<TodoItem>(&result["todos"]));
            }
            Capability::MarkFollowUps => {
                self.follow_ups.extend(decode_list::<FollowUp>(&result["follow_ups"]));
            }
            Capability::GetUserContext | Capability::GeneratePreferences => {}
        }
    }

    /// A record can only be persisted once its header exists; the children
    /// may legitimately be empty.
    pub fn has_basic_info(&self) -> bool {
        self.basic_info.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.basic_info.is_none()
            && self.agendas.is_empty()
            && self.todos.is_empty()
            && self.follow_ups.is_empty()
    }

    pub fn build(self, user_id: i64, raw_text: &str) -> Result<MeetingRecord, AgentError> {
        let basic_info = self.basic_info.ok_or_else(|| {
            DomainError::InvariantViolation(
                "meeting record requires extracted basic info".to_string(),
            )
        })?;
        Ok(MeetingRecord {
            basic_info,
            agendas: self.agendas,
            todos: self.todos,
            follow_ups: self.follow_ups,
            raw_text: raw_text.to_string(),
            user_id,
        })
    }
}

fn decode_list<T: DeserializeOwned>(value: &Value) -> Vec<T> {
    serde_json::from_value(value.clone()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::capability::Capability;

    use super::MeetingRecordBuilder;

    #[test]
    fn observations_accumulate_into_a_record() {
        let mut builder = MeetingRecordBuilder::new();
        builder.observe(
            Capability::ExtractBasicInfo,
            &json!({"attendees": ["张三"], "time": "2024-06-10 14:00", "subject": "评审", "duration": "60"}),
        );
        builder.observe(
            Capability::ParseAgendaConclusion,
            &json!({"items": [{"agenda": "预算", "conclusion": "通过"}]}),
        );
        builder.observe(
            Capability::GenerateTodos,
            &json!({"todos": [{"owner": "张三", "task": "整理纪要", "deadline": "待确认"}]}),
        );
        builder.observe(
            Capability::MarkFollowUps,
            &json!({"follow_ups": [{"topic": "排期", "reason": "尚有分歧"}]}),
        );

        let record = builder.build(7, "……转录……").expect("build");
        assert_eq!(record.basic_info.subject, "评审");
        assert_eq!(record.agendas.len(), 1);
        assert_eq!(record.todos.len(), 1);
        assert_eq!(record.follow_ups.len(), 1);
        assert_eq!(record.user_id, 7);
    }

    #[test]
    fn repeated_list_observations_append() {
        let mut builder = MeetingRecordBuilder::new();
        builder.observe(
            Capability::GenerateTodos,
            &json!({"todos": [{"owner": "张三", "task": "整理纪要", "deadline": "待确认"}]}),
        );
        builder.observe(
            Capability::GenerateTodos,
            &json!({"todos": [{"owner": "李四", "task": "确认预算", "deadline": "2024-06-11 18:00"}]}),
        );
        assert!(!builder.is_empty());
        assert!(!builder.has_basic_info());
    }

    #[test]
    fn missing_basic_info_blocks_the_build() {
        let builder = MeetingRecordBuilder::new();
        let result = builder.build(1, "……");
        assert!(matches!(result, Err(crate::AgentError::Domain(_))));
    }

    #[test]
    fn context_observations_do_not_touch_the_record() {
        let mut builder = MeetingRecordBuilder::new();
        builder.observe(Capability::GetUserContext, &json!({"meetings": [], "todos": []}));
        assert!(builder.is_empty());
    }
}
