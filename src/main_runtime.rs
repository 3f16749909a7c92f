use tracing_subscriber::EnvFilter;

use topup::config::LoggingConfig;

/// Load `ENV_FILE_PATH` (or `.env`) into the process environment.
pub fn load_env_file() {
    match std::env::var("ENV_FILE_PATH") {
        Ok(path) => {
            if let Err(e) = dotenvy::from_path(&path) {
                eprintln!("Warning: could not load env file {}: {}", path, e);
            }
        }
        Err(_) => {
            let _ = dotenvy::dotenv();
        }
    }
}

fn default_filter(level: &str) -> EnvFilter {
    let level = level.trim();
    if level.is_empty() || level.eq_ignore_ascii_case("info") {
        EnvFilter::new("info,topup=debug")
    } else {
        EnvFilter::new(level)
    }
}

pub fn init_logging(logging: &LoggingConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::Layer;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(&logging.level));

    // File logging is opt-in via TOPUP_LOG_DIR.
    let log_dir = std::env::var("TOPUP_LOG_DIR").ok();

    // `tracing_appender::rolling::daily` panics if it can't create the initial
    // log file, so check writability first.
    let file_layer = log_dir.as_deref().and_then(|dir| {
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!(
                "Warning: Could not create log directory {} ({}), file logging disabled",
                dir, e
            );
            return None;
        }
        let test_path = std::path::Path::new(dir).join(".topup_write_test");
        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&test_path)
        {
            Ok(_) => {
                let _ = std::fs::remove_file(&test_path);
                let file_appender = tracing_appender::rolling::daily(dir, "topup.log");
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
                // Process exits right after the run; keep the writer alive until then.
                Box::leak(Box::new(guard));
                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true),
                )
            }
            Err(e) => {
                eprintln!(
                    "Warning: Could not write to log directory {} ({}), file logging disabled",
                    dir, e
                );
                None
            }
        }
    });

    let console_layer = if logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .with_writer(std::io::stderr)
            .boxed()
    };

    let file_logging_enabled = file_layer.is_some();
    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if let (true, Some(dir)) = (file_logging_enabled, log_dir) {
        eprintln!("Logging to: {}/topup.log", dir);
    }
}

pub fn init_logging_simple() {
    // Minimal logging for read-only commands
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_writer(std::io::stderr)
        .try_init();
}
