//! Interactive agent session over stdin. Each utterance runs one bounded
//! agent loop; generation tokens and capability lifecycle are printed as
//! they stream. Extraction observations accumulate into a meeting record
//! that is persisted once the run produced a usable header.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use tracing::info;

use minuteman_agent::{
    AgentDeps, AgentEvent, AgentRuntime, CapabilityRegistry, EventSink, MeetingRecordBuilder,
    OpenAiCompatibleClient, RunRequest,
};
use minuteman_core::config::{AppConfig, LoadOptions, LogFormat};
use minuteman_db::repositories::{
    MeetingRepository, SqlMeetingRepository, SqlPreferenceRepository, SqlTodoRepository,
    SqlUserRepository, UserRepository,
};
use minuteman_db::{connect, migrations};

use crate::commands::CommandResult;

pub struct ChatArgs {
    pub username: String,
    pub transcript: Option<PathBuf>,
}

type ChatError = (&'static str, String, u8);

pub fn run(args: ChatArgs) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    init_logging(&config);

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    match runtime.block_on(chat_loop(config, args)) {
        Ok(()) => CommandResult::success("chat", "session ended"),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("chat", error_class, message, exit_code)
        }
    }
}

fn init_logging(config: &AppConfig) {
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    match config.logging.format {
        LogFormat::Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        LogFormat::Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

async fn chat_loop(config: AppConfig, args: ChatArgs) -> Result<(), ChatError> {
    let pool = connect(&config.database)
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
    migrations::run_pending(&pool)
        .await
        .map_err(|error| ("migration", error.to_string(), 5u8))?;

    let llm = OpenAiCompatibleClient::new(&config.llm)
        .map_err(|error| ("backend_init", error.to_string(), 6u8))?;

    let users = SqlUserRepository::new(pool.clone());
    let meetings: Arc<dyn MeetingRepository> = Arc::new(SqlMeetingRepository::new(pool.clone()));
    let deps = AgentDeps {
        llm: Arc::new(llm),
        meetings: meetings.clone(),
        todos: Arc::new(SqlTodoRepository::new(pool.clone())),
        preferences: Arc::new(SqlPreferenceRepository::new(pool.clone())),
    };
    let agent = AgentRuntime::new(deps, config.agent.max_iterations);

    let user_id = ensure_user(&users, &args.username)
        .await
        .map_err(|error| ("user_lookup", error, 7u8))?;
    info!(user_id, username = %args.username, "chat session started");

    let transcript = match &args.transcript {
        Some(path) => Some(
            std::fs::read_to_string(path)
                .map_err(|error| ("transcript_read", format!("{}: {error}", path.display()), 8u8))?,
        ),
        None => None,
    };

    let stdin = io::stdin();
    loop {
        print!("you> ");
        let _ = io::stdout().flush();

        let mut line = String::new();
        let read = stdin.lock().read_line(&mut line).map_err(|error| {
            ("stdin_read", error.to_string(), 9u8)
        })?;
        if read == 0 {
            break;
        }
        let utterance = line.trim();
        if utterance.is_empty() {
            continue;
        }
        if matches!(utterance, "exit" | "quit" | "退出") {
            break;
        }

        let request = RunRequest {
            user_id,
            query: utterance.to_string(),
            meeting_text: transcript.clone(),
            reference_now: Local::now().naive_local(),
        };
        let (sink, rx) = EventSink::channel(64);
        let mut builder = MeetingRecordBuilder::new();
        let (_, ()) = tokio::join!(
            agent.run(&request, sink),
            render_events(rx, agent.registry(), &mut builder, config.agent.verbose),
        );

        if builder.has_basic_info() {
            let raw_text = transcript.as_deref().unwrap_or(utterance);
            match builder.build(user_id, raw_text) {
                Ok(record) => match meetings.save_record(&record).await {
                    Ok(meeting_id) => println!("(已保存会议记录 #{meeting_id})"),
                    Err(error) => println!("(会议记录保存失败: {error})"),
                },
                Err(error) => println!("(会议记录不完整: {error})"),
            }
        }
    }

    pool.close().await;
    Ok(())
}

async fn ensure_user(users: &SqlUserRepository, username: &str) -> Result<i64, String> {
    match users.find_by_username(username).await {
        Ok(Some(account)) => Ok(account.id),
        // Local sessions have no password flow; store a fixed marker.
        Ok(None) => users.create(username, "local-session").await.map_err(|e| e.to_string()),
        Err(error) => Err(error.to_string()),
    }
}

async fn render_events(
    mut rx: tokio::sync::mpsc::Receiver<AgentEvent>,
    registry: &CapabilityRegistry,
    builder: &mut MeetingRecordBuilder,
    verbose: bool,
) {
    while let Some(event) = rx.recv().await {
        match event {
            AgentEvent::Stream(fragment) => {
                print!("{fragment}");
                let _ = io::stdout().flush();
            }
            AgentEvent::Status { capability } => {
                println!("\n[{capability}] 调用中……");
            }
            AgentEvent::Observation { capability, result } => {
                if let Ok(descriptor) = registry.resolve(&capability) {
                    builder.observe(descriptor.capability, &result);
                }
                if verbose {
                    println!("[{capability}] {result}");
                }
            }
            AgentEvent::Done(answer) => {
                println!("\n\nagent> {answer}");
            }
            AgentEvent::Failed(message) => {
                println!("\n\nagent> (运行未完成: {message})");
            }
        }
    }
}
