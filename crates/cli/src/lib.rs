pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "minuteman",
    about = "Minuteman meeting-minutes agent CLI",
    long_about = "Apply database migrations, inspect effective configuration, chat with the transcript extraction agent, and render saved meetings as mindmap outlines.",
    after_help = "Examples:\n  minuteman migrate\n  minuteman config\n  minuteman chat --user zhangsan --transcript meeting.txt\n  minuteman mindmap --user zhangsan --meeting 3"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Interactive agent session over stdin with streamed output")]
    Chat {
        #[arg(long = "user", help = "Username to chat as; created on first use")]
        user: String,
        #[arg(long, help = "Meeting transcript file that grounds the session")]
        transcript: Option<PathBuf>,
    },
    #[command(about = "Render a saved meeting's conclusions as a Markdown mindmap outline")]
    Mindmap {
        #[arg(long = "user", help = "Username that owns the meeting")]
        user: String,
        #[arg(long, help = "Meeting id as reported when a chat session saves a record")]
        meeting: i64,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Chat { user, transcript } => {
            commands::chat::run(commands::chat::ChatArgs { username: user, transcript })
        }
        Command::Mindmap { user, meeting } => commands::mindmap::run(
            commands::mindmap::MindmapArgs { username: user, meeting_id: meeting },
        ),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
