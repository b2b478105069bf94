use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use orderly_core::config::{AppConfig, LoadOptions};
use toml::Value;

const CONFIG_CANDIDATES: [&str; 2] = ["orderly.toml", "config/orderly.toml"];

/// One reported setting: dotted key, display value, env variables that can set it.
struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(fields(&config).into_iter().map(|field| {
        let source = field_source(&field, config_file_doc.as_ref(), config_file_path.as_deref());
        format!("- {} = {} (source: {source})", field.key, field.value)
    }));
    lines.join("\n")
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let redacted_key = if config.llm.api_key.is_some() { "<redacted>" } else { "<unset>" };
    vec![
        Field {
            key: "database.url",
            value: config.database.url.clone(),
            env_keys: &["ORDERLY_DATABASE_URL"],
        },
        Field {
            key: "database.max_connections",
            value: config.database.max_connections.to_string(),
            env_keys: &["ORDERLY_DATABASE_MAX_CONNECTIONS"],
        },
        Field {
            key: "database.timeout_secs",
            value: config.database.timeout_secs.to_string(),
            env_keys: &["ORDERLY_DATABASE_TIMEOUT_SECS"],
        },
        Field {
            key: "llm.provider",
            value: format!("{:?}", config.llm.provider),
            env_keys: &["ORDERLY_LLM_PROVIDER"],
        },
        Field { key: "llm.model", value: config.llm.model.clone(), env_keys: &["ORDERLY_LLM_MODEL"] },
        Field {
            key: "llm.base_url",
            value: config.llm.base_url.clone().unwrap_or_else(|| "<unset>".to_string()),
            env_keys: &["ORDERLY_LLM_BASE_URL"],
        },
        Field {
            key: "llm.api_key",
            value: redacted_key.to_string(),
            env_keys: &["ORDERLY_LLM_API_KEY"],
        },
        Field {
            key: "llm.renderer",
            value: format!("{:?}", config.llm.renderer),
            env_keys: &["ORDERLY_LLM_RENDERER"],
        },
        Field {
            key: "server.bind_address",
            value: config.server.bind_address.clone(),
            env_keys: &["ORDERLY_SERVER_BIND_ADDRESS"],
        },
        Field {
            key: "server.port",
            value: config.server.port.to_string(),
            env_keys: &["ORDERLY_SERVER_PORT"],
        },
        Field {
            key: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["ORDERLY_LOGGING_LEVEL", "ORDERLY_LOG_LEVEL"],
        },
        Field {
            key: "logging.format",
            value: format!("{:?}", config.logging.format),
            env_keys: &["ORDERLY_LOGGING_FORMAT", "ORDERLY_LOG_FORMAT"],
        },
        Field {
            key: "validation.max_suggestions",
            value: config.validation.max_suggestions.to_string(),
            env_keys: &["ORDERLY_VALIDATION_MAX_SUGGESTIONS"],
        },
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    CONFIG_CANDIDATES.iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    field: &Field,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = field.env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if config_file_doc.is_some_and(|doc| contains_path(doc, field.key)) {
        let file_path = config_file_path
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "config file".to_string());
        return format!("file ({file_path})");
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    key_path.split('.').try_fold(root, |current, key| current.get(key)).is_some()
}
