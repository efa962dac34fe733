use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub engine: EngineConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String, // "DEBUG", "INFO", "WARN", "ERROR"
    pub log_to_console: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            log_to_console: true,
        }
    }
}

/// Defaults for the per-request `ai_config` fields; callers of the Task
/// Engine may override any of these per request.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EngineConfig {
    /// 0 means unbounded.
    pub max_iterations: u32,
    pub max_context_tokens: u64,
    pub soft_threshold_pct: f64,
    pub hard_threshold_pct: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_iterations: 999,
            max_context_tokens: 128_000,
            soft_threshold_pct: 0.80,
            hard_threshold_pct: 0.95,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_host: String,
    pub bind_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_host: "127.0.0.1".to_string(),
            bind_port: 0,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            engine: EngineConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

/// Get the config directory path
pub fn get_config_dir() -> PathBuf {
    if let Some(proj_dirs) = directories::ProjectDirs::from("dev", "codeagent", "core") {
        let config_dir = proj_dirs.config_dir().to_path_buf();
        fs::create_dir_all(&config_dir).ok();
        config_dir
    } else {
        PathBuf::from(".")
    }
}

/// Get the config file path
pub fn get_config_path() -> PathBuf {
    get_config_dir().join("config.toml")
}

/// Get the logs directory path
pub fn get_logs_dir() -> PathBuf {
    if let Some(proj_dirs) = directories::ProjectDirs::from("dev", "codeagent", "core") {
        let logs_dir = proj_dirs.data_dir().join("logs");
        fs::create_dir_all(&logs_dir).ok();
        logs_dir
    } else {
        let logs_dir = std::env::temp_dir().join("code_agent_core_logs");
        fs::create_dir_all(&logs_dir).ok();
        logs_dir
    }
}

/// Generate a timestamped log file path for this session
pub fn get_log_file_path() -> PathBuf {
    let logs_dir = get_logs_dir();
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    logs_dir.join(format!("code_agent_core_{}.log", timestamp))
}

/// Load configuration from file, or create default if not exists
pub fn load_config() -> AppConfig {
    let config_path = get_config_path();

    if config_path.exists() {
        if let Ok(content) = fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<AppConfig>(&content) {
                return config;
            }
        }
    }

    let default_config = AppConfig::default();
    let toml_content = r#"# code-agent-core configuration

[logging]
# Log level: "DEBUG", "INFO", "WARN", "ERROR"
level = "INFO"
log_to_console = true

[engine]
# 0 = unbounded
max_iterations = 999
max_context_tokens = 128000
soft_threshold_pct = 0.80
hard_threshold_pct = 0.95

[server]
bind_host = "127.0.0.1"
bind_port = 0
"#;

    fs::write(&config_path, toml_content).ok();
    default_config
}
