//! Logging initialization

use std::path::PathBuf;

/// Initialize logging based on debug flag
/// Returns the log file path if debug logging is enabled
pub fn init_logging(debug: bool) -> Option<PathBuf> {
    if !debug {
        // Silent by default; the TUI owns the terminal
        return None;
    }

    // Named temp file that outlives this function; the OS cleans it up
    let log_path = tempfile::Builder::new()
        .prefix("kodo-")
        .suffix(".log")
        .tempfile()
        .map(|f| {
            let path = f.path().to_path_buf();
            std::mem::forget(f);
            path
        })
        .unwrap_or_else(|_| std::env::temp_dir().join(format!("kodo-{}.log", std::process::id())));

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!(
                "Could not open log file {}: {}; continuing without logs",
                log_path.display(),
                e
            );
            return None;
        }
    };

    let installed = tracing_subscriber::fmt()
        .with_writer(file)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .try_init();

    match installed {
        Ok(()) => Some(log_path),
        Err(e) => {
            eprintln!("Could not install log subscriber: {}", e);
            None
        }
    }
}
