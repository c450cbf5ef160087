//! Spinner display for long-running build stages.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Create a spinner for a slow external-process stage (bootstrapper download,
/// wheel building). Hidden automatically when stderr is not a terminal.
#[allow(clippy::unwrap_used)]
pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner} {msg}")
            .unwrap()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", " "]),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Clear the spinner before the next log line is printed
pub fn finish(pb: ProgressBar) {
    pb.finish_and_clear();
}
