use crate::config::{get_config_path, get_log_file_path, get_logs_dir, load_config};
use log::LevelFilter;
use simplelog::*;
use std::fs::File;

/// Initialize the logging system based on config file settings.
/// Creates a new timestamped log file for each process run.
///
/// Two layers, matching the teacher's split between plain `log` macros
/// (config loading, server access logging) and `tracing` instrumentation
/// (engine/coordinator/context modules): `simplelog` backs the `log`
/// facade below, and a `tracing-subscriber` `fmt` layer is installed
/// separately so `RUST_LOG` governs `tracing::*` call sites directly,
/// falling back to the config-driven level when the variable is unset.
pub fn init_logging() {
    let config = load_config();
    let log_path = get_log_file_path();

    let level = match config.logging.level.to_uppercase().as_str() {
        "DEBUG" => LevelFilter::Debug,
        "INFO" => LevelFilter::Info,
        "WARN" | "WARNING" => LevelFilter::Warn,
        "ERROR" => LevelFilter::Error,
        "TRACE" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    };

    let log_config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Error)
        .set_location_level(LevelFilter::Debug)
        .set_thread_level(LevelFilter::Off)
        .build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();

    if config.logging.log_to_console {
        loggers.push(TermLogger::new(
            level,
            log_config.clone(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ));
    }

    if let Ok(file) = File::create(&log_path) {
        loggers.push(WriteLogger::new(level, log_config.clone(), file));
    }

    if !loggers.is_empty() {
        CombinedLogger::init(loggers).ok();
    }

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.logging.level.to_lowercase()));
    let _ = tracing_subscriber::fmt().with_env_filter(env_filter).try_init();

    log::info!("========================================");
    log::info!("code-agent-core - session started");
    log::info!("========================================");
    log::info!("Log level: {:?}", level);
    log::info!("Log file: {:?}", log_path);
    log::info!("Config file: {:?}", get_config_path());
    log::info!("Logs directory: {:?}", get_logs_dir());
}
