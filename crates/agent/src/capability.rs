//! The closed set of extraction/action capabilities the orchestrator may
//! invoke. Registration is static: the registry is built once at process
//! start and read-only for every session.

use std::fmt;

use crate::error::AgentError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    ExtractBasicInfo,
    ParseAgendaConclusion,
    GenerateTodos,
    MarkFollowUps,
    GetUserContext,
    GeneratePreferences,
}

impl Capability {
    pub const ALL: [Capability; 6] = [
        Capability::ExtractBasicInfo,
        Capability::ParseAgendaConclusion,
        Capability::GenerateTodos,
        Capability::MarkFollowUps,
        Capability::GetUserContext,
        Capability::GeneratePreferences,
    ];

    /// Stable string identifier the selection step resolves against.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ExtractBasicInfo => "extract_meeting_basic_info",
            Self::ParseAgendaConclusion => "parse_meeting_agenda_conclusion",
            Self::GenerateTodos => "generate_meeting_todo",
            Self::MarkFollowUps => "mark_meeting_follow_up",
            Self::GetUserContext => "get_user_info",
            Self::GeneratePreferences => "generate_user_preferences",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything the selection prompt knows about one capability. The guidance
/// text is the *only* signal the selection step receives, so overlapping
/// capabilities (todo vs follow-up) state mutually exclusive triggers.
#[derive(Clone, Copy, Debug)]
pub struct CapabilityDescriptor {
    pub capability: Capability,
    pub guidance: &'static str,
    pub input_contract: &'static str,
    pub output_shape: &'static str,
}

impl CapabilityDescriptor {
    pub fn name(&self) -> &'static str {
        self.capability.name()
    }
}

const DESCRIPTORS: [CapabilityDescriptor; 6] = [
    CapabilityDescriptor {
        capability: Capability::ExtractBasicInfo,
        guidance: "从会议的背景、自我介绍或开场白片段中提取元数据。仅当需要填充会议纪要头部的基础信息时使用。",
        input_contract: "包含会议背景或开场白的关键语句，而非全量转录文本",
        output_shape: "{attendees: [姓名], time: ISO 时间, subject: 主题, duration: 时长}",
    },
    CapabilityDescriptor {
        capability: Capability::ParseAgendaConclusion,
        guidance: "分析实质性讨论内容，总结每个核心议题及其达成的结论。仅当讨论已有定论或共识时使用。",
        input_contract: "经过初步筛选、包含实质性讨论内容的关键句集合",
        output_shape: "{items: [{agenda: 议题, conclusion: 结论}]}",
    },
    CapabilityDescriptor {
        capability: Capability::GenerateTodos,
        guidance: "从任务分配语句中提取待办事项。仅当语句明确指派了负责人和任务时使用；若事项尚未定论或存在争议，改用 mark_meeting_follow_up。",
        input_contract: "涉及任务分配、责任归属、截止日期要求的关键语句",
        output_shape: "{todos: [{owner: 负责人, task: 任务, deadline: YYYY-MM-DD HH:MM 或 待确认}]}",
    },
    CapabilityDescriptor {
        capability: Capability::MarkFollowUps,
        guidance: "识别意见分歧、不确定或需要会后再议的未决事项。仅当事项没有明确负责人或结论时使用；若已明确指派任务，改用 generate_meeting_todo。",
        input_contract: "表现出意见分歧、不确定性或需要会后再议的关键描述",
        output_shape: "{follow_ups: [{topic: 争议点, reason: 跟进原因}]}",
    },
    CapabilityDescriptor {
        capability: Capability::GetUserContext,
        guidance: "查询当前用户的历史会议、待办和偏好设置。仅当回答需要用户既有数据时使用。",
        input_contract: "无需输入，基于当前用户",
        output_shape: "{meetings: [...], todos: [...], preferences: {类别: 偏好值}}",
    },
    CapabilityDescriptor {
        capability: Capability::GeneratePreferences,
        guidance: "从用户明确表达的喜好、习惯或特定需求中提取个性化偏好并持久化。仅当输入是用户自述而非会议讨论时使用。",
        input_contract: "用户明确表达喜好、习惯或特定需求的描述",
        output_shape: "{preferences: [{category: 类别, preference: 偏好值, persisted: 存储状态}]}",
    },
];

/// Ordered, immutable capability catalog. `resolve` fails closed: unknown
/// names are an error, never a fuzzy match.
#[derive(Clone, Debug, Default)]
pub struct CapabilityRegistry;

impl CapabilityRegistry {
    pub fn standard() -> Self {
        Self
    }

    pub fn list(&self) -> &'static [CapabilityDescriptor] {
        &DESCRIPTORS
    }

    pub fn resolve(&self, name: &str) -> Result<&'static CapabilityDescriptor, AgentError> {
        let wanted = name.trim();
        DESCRIPTORS
            .iter()
            .find(|descriptor| descriptor.name() == wanted)
            .ok_or_else(|| AgentError::CapabilityNotFound(wanted.to_string()))
    }

    /// Catalog rendered for the selection prompt: one line per capability.
    pub fn render_catalog(&self) -> String {
        DESCRIPTORS
            .iter()
            .map(|descriptor| {
                format!(
                    "- {}: {} 输入: {} 输出: {}",
                    descriptor.name(),
                    descriptor.guidance,
                    descriptor.input_contract,
                    descriptor.output_shape
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn names(&self) -> Vec<&'static str> {
        DESCRIPTORS.iter().map(CapabilityDescriptor::name).collect()
    }
}
