use serde_json::Value;

/// One completed loop iteration: what the model thought, which capability
/// it chose with which arguments, and what came back.
#[derive(Clone, Debug, PartialEq)]
pub struct AgentStep {
    pub thought: String,
    pub capability: String,
    pub arguments: Value,
    pub observation: String,
}

/// Accumulating transcript of one orchestration run. Owned by that run and
/// discarded when it ends; never persisted.
#[derive(Clone, Debug, Default)]
pub struct AgentSessionState {
    pub steps: Vec<AgentStep>,
    pub iterations: u32,
    pub final_answer: Option<String>,
}

impl AgentSessionState {
    pub fn record_step(&mut self, step: AgentStep) {
        self.steps.push(step);
    }

    /// Render past steps in the format the selection prompt expects; the
    /// prompt itself appends the trailing `Thought:` for the next step.
    pub fn scratchpad(&self) -> String {
        let mut rendered = String::new();
        for step in &self.steps {
            rendered.push_str(&format!(
                " {}\nAction: {}\nAction Input: {}\nObservation: {}\nThought:",
                step.thought, step.capability, step.arguments, step.observation
            ));
        }
        // Hand the trailing `Thought:` back to the prompt template.
        rendered.strip_suffix("Thought:").map(str::to_string).unwrap_or(rendered)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{AgentSessionState, AgentStep};

    #[test]
    fn empty_session_renders_an_empty_scratchpad() {
        assert_eq!(AgentSessionState::default().scratchpad(), "");
    }

    #[test]
    fn scratchpad_replays_steps_in_order() {
        let mut session = AgentSessionState::default();
        session.record_step(AgentStep {
            thought: "先提取基础信息".to_string(),
            capability: "extract_meeting_basic_info".to_string(),
            arguments: json!({"text": "开场白"}),
            observation: "{\"subject\":\"评审\"}".to_string(),
        });
        session.record_step(AgentStep {
            thought: "再提取待办".to_string(),
            capability: "generate_meeting_todo".to_string(),
            arguments: json!({"text": "任务分配"}),
            observation: "{\"todos\":[]}".to_string(),
        });

        let scratchpad = session.scratchpad();
        let first = scratchpad.find("extract_meeting_basic_info").expect("first step");
        let second = scratchpad.find("generate_meeting_todo").expect("second step");
        assert!(first < second);
        assert!(scratchpad.contains("Observation: {\"subject\":\"评审\"}"));
        assert!(!scratchpad.ends_with("Thought:"));
    }
}
