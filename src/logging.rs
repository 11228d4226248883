use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Log file created inside the configured log directory.
pub const LOG_FILE_NAME: &str = "xml-mcp-server.log";

/// Install the global subscriber.
///
/// Events go to stderr (stdout carries protocol traffic) and, when the log
/// directory can be created, are appended to [`LOG_FILE_NAME`] there.
/// `RUST_LOG` controls the filter; the default level is `info`.
///
/// Returns the log file path, or the reason it could not be opened.
pub fn init(log_dir: &Path) -> Result<PathBuf, std::io::Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let (file_layer, outcome) = match open_log_file(log_dir) {
        Ok((path, file)) => {
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file));
            (Some(layer), Ok(path))
        }
        Err(e) => (None, Err(e)),
    };

    // A subscriber may already be installed (tests); keep it.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init();

    outcome
}

fn open_log_file(log_dir: &Path) -> Result<(PathBuf, std::fs::File), std::io::Error> {
    std::fs::create_dir_all(log_dir)?;
    let path = log_dir.join(LOG_FILE_NAME);
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    Ok((path, file))
}
