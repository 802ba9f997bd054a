//! Command implementations for the insight CLI.

pub mod analyze;
pub mod index;
pub mod query;
pub mod status;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use insight_core::IndexingStatus;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Spinner shown while waiting on a remote service
pub(crate) fn spinner(message: impl Into<String>) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})") {
        bar.set_style(style);
    }
    bar.set_message(message.into());
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

/// Colored label for an indexing status
pub(crate) fn status_label(status: IndexingStatus) -> String {
    match status {
        IndexingStatus::Completed => status.as_str().green().to_string(),
        IndexingStatus::Error => status.as_str().red().to_string(),
        IndexingStatus::NotStarted => status.as_str().dimmed().to_string(),
        IndexingStatus::Submitted | IndexingStatus::Indexing => status.as_str().yellow().to_string(),
    }
}

/// Token fired when the user presses Ctrl-C
pub(crate) fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let fired = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            fired.cancel();
        }
    });
    token
}
