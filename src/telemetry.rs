//! Logging setup.
//!
//! Installs a `tracing` registry with two layers sharing one `EnvFilter`
//! (`RUST_LOG`, default `info`):
//!
//! - a compact stderr layer with ANSI colours when attached to a terminal;
//! - a plain-text layer appending to `<log_dir>/crag.log`.
//!
//! The file layer is skipped (with a warning) when the log file cannot be
//! opened, so logging never prevents startup.

use std::fs::OpenOptions;
use std::io::IsTerminal;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Result;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

pub const LOG_FILE_NAME: &str = "crag.log";

/// RFC3339 UTC timestamps without fractional seconds.
#[derive(Clone, Debug, Default)]
struct Rfc3339Utc;

impl FormatTime for Rfc3339Utc {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = chrono::Utc::now();
        w.write_str(&now.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
    }
}

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Initialise global logging. Calling it twice is harmless; the second
/// call returns an error from `try_init` which is ignored.
pub fn init(log_dir: Option<&Path>) -> Result<()> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(Rfc3339Utc)
        .with_target(true)
        .with_ansi(std::io::stderr().is_terminal())
        .compact();

    let mut file_error = None;
    let file_layer = log_dir.and_then(|dir| {
        let opened = std::fs::create_dir_all(dir).and_then(|_| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join(LOG_FILE_NAME))
        });
        match opened {
            Ok(file) => Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_timer(Rfc3339Utc)
                    .with_ansi(false)
                    .with_target(true)
                    .boxed(),
            ),
            Err(e) => {
                file_error = Some(e);
                None
            }
        }
    });

    let _ = tracing_subscriber::registry()
        .with(env_filter("info"))
        .with(stderr_layer)
        .with(file_layer)
        .try_init();

    if let Some(e) = file_error {
        tracing::warn!(error = %e, "file logging disabled");
    }
    Ok(())
}
