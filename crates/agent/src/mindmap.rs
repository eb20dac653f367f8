//! Markdown mindmap outlines generated from saved meeting conclusions.
//!
//! Unlike the orchestrated extraction loop this is a single plain
//! completion: conclusions in, an outline out. Frontends feed the outline
//! to whatever mindmap renderer they use.

use std::sync::Arc;

use crate::error::AgentError;
use crate::llm::LlmClient;
use crate::prompts;

pub struct MindmapGenerator {
    llm: Arc<dyn LlmClient>,
}

impl MindmapGenerator {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// One completion over the conclusion text. The backend is asked for
    /// bare Markdown; a wrapping code fence is stripped if it adds one
    /// anyway.
    pub async fn generate(&self, conclusion: &str) -> Result<String, AgentError> {
        let raw = self
            .llm
            .complete(prompts::MINDMAP_SYSTEM, &prompts::mindmap_prompt(conclusion))
            .await?;
        let outline = strip_fence(&raw);
        if outline.is_empty() {
            return Err(AgentError::Backend("backend returned an empty outline".to_string()));
        }
        Ok(outline.to_string())
    }
}

fn strip_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("markdown").or_else(|| rest.strip_prefix("md")).unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::testing::ScriptedLlm;

    use super::MindmapGenerator;

    #[tokio::test]
    async fn outline_is_returned_verbatim() {
        let llm = ScriptedLlm::new(vec!["# Q3 规划评审\n- 发布窗口\n  - 定在七月第一周"]);
        let generator = MindmapGenerator::new(Arc::new(llm));

        let outline = generator.generate("发布窗口定在七月第一周").await.expect("generate");
        assert!(outline.starts_with("# Q3 规划评审"));
        assert!(outline.contains("- 发布窗口"));
    }

    #[tokio::test]
    async fn a_wrapping_code_fence_is_stripped() {
        let llm = ScriptedLlm::new(vec!["```markdown\n# 主题\n- 结论\n```"]);
        let generator = MindmapGenerator::new(Arc::new(llm));

        let outline = generator.generate("结论").await.expect("generate");
        assert_eq!(outline, "# 主题\n- 结论");
    }

    #[tokio::test]
    async fn an_empty_completion_is_a_backend_error() {
        let llm = ScriptedLlm::new(vec!["   "]);
        let generator = MindmapGenerator::new(Arc::new(llm));

        assert!(generator.generate("结论").await.is_err());
    }
}
