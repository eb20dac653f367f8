//! Prompt text for the selection loop and the per-capability extraction
//! calls. Wording mirrors the production prompts; the structural rules
//! (deadline format, sentinel, category reuse) are re-enforced in code.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use minuteman_core::deadline::UNRESOLVED_SENTINEL;

use crate::capability::CapabilityRegistry;

pub const REACT_SYSTEM: &str = "你是一个严谨的会议纪要助手，按照给定格式逐步思考并调用工具。";

/// The ReAct selection prompt: capability catalog, interaction format,
/// optional meeting transcript, the user question, and the accumulated
/// scratchpad of previous steps.
pub fn react_prompt(
    registry: &CapabilityRegistry,
    query: &str,
    meeting: Option<&str>,
    scratchpad: &str,
) -> String {
    let names = registry.names().join(", ");
    let meeting_block = match meeting {
        Some(text) => format!("会议记录：\n{text}\n\n"),
        None => String::new(),
    };

    format!(
        "回答以下问题。你可以使用这些工具：\n\n{catalog}\n\n使用以下格式：\n\n\
         Question: 需要回答的问题\n\
         Thought: 你的思考过程\n\
         Action: 要使用的工具名，必须是 [{names}] 之一\n\
         Action Input: 工具输入，JSON 对象，如 {{\"text\": \"...\"}}\n\
         Observation: 工具返回的结果\n\
         ...（Thought/Action/Action Input/Observation 可重复多次）\n\
         Thought: 我已经知道最终答案\n\
         Final Answer: 对原始问题的最终回答\n\n\
         开始！\n\n{meeting_block}Question: {query}\n{scratchpad}Thought:",
        catalog = registry.render_catalog(),
    )
}

pub const BASIC_INFO_SYSTEM: &str = "从会议文本中提取参会人、时间、主题和时长，时间需转换为ISO格式。\
     以 JSON 输出：{\"attendees\": [...], \"time\": \"...\", \"subject\": \"...\", \"duration\": \"...\"}";

pub const AGENDA_SYSTEM: &str = "你是一个会议记录员。请基于关键讨论内容，提取所有核心议题及其对应结论。\
     以 JSON 输出：{\"items\": [{\"agenda\": \"...\", \"conclusion\": \"...\"}]}，\
     议题确无结论时 conclusion 填空字符串，不可省略该字段。";

pub const FOLLOW_UP_SYSTEM: &str = "你是一个风险控制专家。请从关键句中识别出尚未解决、存在争议或需要进一步核实的点。\
     以 JSON 输出：{\"follow_ups\": [{\"topic\": \"...\", \"reason\": \"...\"}]}";

/// The todo prompt carries the reference time and the deterministic
/// deadline rules that `minuteman_core::deadline` re-checks afterwards.
pub fn todo_system(reference_now: NaiveDateTime) -> String {
    format!(
        "你是一个项目经理。请从提供的关键句中识别待办事项，确保包含负责人和具体任务。\
         当前时间为 {now}。deadline 必须为 YYYY-MM-DD HH:MM 格式的绝对时间：\
         相对时间（如明天、下周）基于当前时间换算；只提到日期没有具体时间的，默认当天 18:00；\
         完全未提及截止时间的，deadline 填写\"{sentinel}\"。\
         以 JSON 输出：{{\"todos\": [{{\"owner\": \"...\", \"task\": \"...\", \"deadline\": \"...\"}}]}}",
        now = reference_now.format("%Y-%m-%d %H:%M"),
        sentinel = UNRESOLVED_SENTINEL,
    )
}

pub const MINDMAP_SYSTEM: &str = "你是一个信息架构师。请把给定的会议结论整理为 Markdown 思维导图大纲：\
     第一行为 `# 会议主题`，其下用多级无序列表展开议题、结论和要点，层级不超过四级。\
     只输出 Markdown 大纲本身，不要附加任何解释。";

pub fn mindmap_prompt(conclusion: &str) -> String {
    format!("会议结论：\n{conclusion}")
}

/// The reconciliation prompt supplies the user's full existing category set
/// and the normalization rules: reuse an existing name verbatim when the
/// semantics match, otherwise mint a concise new label.
pub fn preference_system(existing: &BTreeMap<String, String>) -> String {
    let existing_rendered = if existing.is_empty() {
        "（暂无）".to_string()
    } else {
        existing.keys().cloned().collect::<Vec<_>>().join("、")
    };

    format!(
        "你是一个用户体验设计师，你需要从用户文本中提取偏好，并直接输出标准化结果：\n\
         1. 若新类别与现有类别（{existing_rendered}）语义相同（如\"所在部门\"和\"部门\"），必须原样沿用现有类别名称\n\
         2. 若为新类别，需简化名称（如\"我希望的称呼方式\"→\"称呼\"）\n\
         以 JSON 输出：{{\"preferences\": [{{\"category\": \"...\", \"preference\": \"...\"}}]}}"
    )
}
