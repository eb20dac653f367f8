//! Renders a saved meeting's conclusions as a Markdown mindmap outline.

use std::sync::Arc;

use minuteman_agent::{MindmapGenerator, OpenAiCompatibleClient};
use minuteman_core::config::{AppConfig, LoadOptions};
use minuteman_core::MeetingRecord;
use minuteman_db::repositories::{
    MeetingRepository, SqlMeetingRepository, SqlUserRepository, UserRepository,
};
use minuteman_db::{connect, migrations};

use crate::commands::CommandResult;

pub struct MindmapArgs {
    pub username: String,
    pub meeting_id: i64,
}

type MindmapError = (&'static str, String, u8);

pub fn run(args: MindmapArgs) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "mindmap",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "mindmap",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    match runtime.block_on(generate(&config, &args)) {
        Ok(outline) => {
            println!("{outline}\n");
            CommandResult::success("mindmap", format!("mindmap for meeting #{}", args.meeting_id))
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("mindmap", error_class, message, exit_code)
        }
    }
}

async fn generate(config: &AppConfig, args: &MindmapArgs) -> Result<String, MindmapError> {
    let pool = connect(&config.database)
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
    migrations::run_pending(&pool)
        .await
        .map_err(|error| ("migration", error.to_string(), 5u8))?;

    let llm = OpenAiCompatibleClient::new(&config.llm)
        .map_err(|error| ("backend_init", error.to_string(), 6u8))?;

    let users = SqlUserRepository::new(pool.clone());
    let account = users
        .find_by_username(&args.username)
        .await
        .map_err(|error| ("user_lookup", error.to_string(), 7u8))?
        .ok_or_else(|| ("user_lookup", format!("unknown user `{}`", args.username), 7u8))?;

    let meetings = SqlMeetingRepository::new(pool.clone());
    let record = meetings
        .load_record(args.meeting_id, account.id)
        .await
        .map_err(|error| ("meeting_lookup", error.to_string(), 8u8))?
        .ok_or_else(|| {
            ("meeting_lookup", format!("meeting #{} not found for this user", args.meeting_id), 8u8)
        })?;

    let conclusion = render_conclusions(&record);
    if conclusion.is_empty() {
        pool.close().await;
        return Err(("meeting_lookup", "meeting has no recorded conclusions".to_string(), 8u8));
    }

    let generator = MindmapGenerator::new(Arc::new(llm));
    let outline = generator
        .generate(&conclusion)
        .await
        .map_err(|error| ("generation", error.to_string(), 10u8))?;
    pool.close().await;
    Ok(outline)
}

/// Source text for the outline: the subject plus every agenda that reached
/// a conclusion. Undecided agendas carry no information worth branching on.
fn render_conclusions(record: &MeetingRecord) -> String {
    let decided: Vec<String> = record
        .agendas
        .iter()
        .filter(|item| !item.conclusion.is_empty())
        .map(|item| format!("议题：{}\n结论：{}", item.agenda, item.conclusion))
        .collect();

    if decided.is_empty() {
        return String::new();
    }
    format!("会议主题：{}\n\n{}", record.basic_info.subject, decided.join("\n\n"))
}

#[cfg(test)]
mod tests {
    use minuteman_core::{AgendaConclusion, BasicInfo, MeetingRecord};

    use super::render_conclusions;

    fn record(agendas: Vec<AgendaConclusion>) -> MeetingRecord {
        MeetingRecord {
            basic_info: BasicInfo {
                attendees: vec!["张三".to_string()],
                time: "2024-06-10 14:00".to_string(),
                subject: "Q3 规划评审".to_string(),
                duration: "90".to_string(),
            },
            agendas,
            todos: vec![],
            follow_ups: vec![],
            raw_text: String::new(),
            user_id: 1,
        }
    }

    #[test]
    fn undecided_agendas_are_left_out() {
        let text = render_conclusions(&record(vec![
            AgendaConclusion {
                agenda: "发布窗口".to_string(),
                conclusion: "定在七月第一周".to_string(),
            },
            AgendaConclusion { agenda: "预算".to_string(), conclusion: String::new() },
        ]));

        assert!(text.starts_with("会议主题：Q3 规划评审"));
        assert!(text.contains("议题：发布窗口"));
        assert!(!text.contains("预算"));
    }

    #[test]
    fn a_meeting_without_conclusions_renders_nothing() {
        let text = render_conclusions(&record(vec![AgendaConclusion {
            agenda: "预算".to_string(),
            conclusion: String::new(),
        }]));
        assert!(text.is_empty());
    }
}
