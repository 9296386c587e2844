use tracing_subscriber::EnvFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable naming the log file.
pub const LOG_PATH_ENV: &str = "COMPONENT_STORE_LOG";

/// Initialize tracing with optional file output.
///
/// Logging is disabled unless `COMPONENT_STORE_LOG` names a file path.
///
/// Log files are created with unique names to prevent conflicts when
/// multiple processes run simultaneously: `{path}.{timestamp}.{pid}`
pub fn init_tracing() {
    let Some(log_path) = std::env::var(LOG_PATH_ENV).ok() else {
        return;
    };

    let pid = std::process::id();
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let unique_path = format!("{}.{}.{}", log_path, timestamp, pid);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let Ok(file) = std::fs::File::create(&unique_path) else {
        eprintln!("Warning: Failed to create log file: {}", unique_path);
        return;
    };

    let file_layer = fmt::layer()
        .with_writer(file)
        .with_ansi(false)
        .with_target(true)
        .with_level(true);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .try_init();
}

/// Install a stderr subscriber, e.g. for test binaries.
///
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init_stderr_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_test_writer()
        .try_init();
}
