use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use minuteman_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let file_path = config_file_path.as_deref();
    let doc = config_file_doc.as_ref();

    let api_key = if config.llm.api_key.is_some() { "<redacted>" } else { "<unset>" };

    let entries: Vec<(&str, String, Option<&str>)> = vec![
        ("database.url", config.database.url.clone(), Some("MINUTEMAN_DATABASE_URL")),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            Some("MINUTEMAN_DATABASE_MAX_CONNECTIONS"),
        ),
        ("database.timeout_secs", config.database.timeout_secs.to_string(), None),
        ("database.busy_timeout_ms", config.database.busy_timeout_ms.to_string(), None),
        ("llm.base_url", config.llm.base_url.clone(), Some("MINUTEMAN_LLM_BASE_URL")),
        ("llm.model", config.llm.model.clone(), Some("MINUTEMAN_LLM_MODEL")),
        ("llm.api_key", api_key.to_string(), Some("MINUTEMAN_LLM_API_KEY")),
        ("llm.temperature", config.llm.temperature.to_string(), None),
        ("llm.timeout_secs", config.llm.timeout_secs.to_string(), None),
        ("llm.max_retries", config.llm.max_retries.to_string(), None),
        (
            "agent.max_iterations",
            config.agent.max_iterations.to_string(),
            Some("MINUTEMAN_MAX_ITERATIONS"),
        ),
        ("agent.verbose", config.agent.verbose.to_string(), Some("MINUTEMAN_VERBOSE")),
        ("logging.level", config.logging.level.clone(), Some("MINUTEMAN_LOG_LEVEL")),
        ("logging.format", format!("{:?}", config.logging.format), Some("MINUTEMAN_LOG_FORMAT")),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_key) in entries {
        lines.push(render_line(key, &value, field_source(key, env_key, doc, file_path)));
    }
    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("minuteman.toml");
    root.exists().then_some(root)
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(doc: &Value, key_path: &str) -> bool {
    let mut current = doc;
    for segment in key_path.split('.') {
        match current.get(segment) {
            Some(value) => current = value,
            None => return false,
        }
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("  {key} = {value}  [{source}]")
}
