//! Spinner utilities for commands that issue many requests

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

fn spinner_style(template: &str) -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Spinner on stderr, so stdout only ever carries the command result
pub fn create_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
    spinner.set_style(spinner_style("{spinner:.cyan} {msg}").tick_chars(TICK_CHARS));
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Finish an optional spinner with a ✓ or ✗ line
pub fn finish(spinner: Option<ProgressBar>, success: bool, message: &str) {
    let Some(spinner) = spinner else {
        return;
    };

    let (template, mark) = if success {
        ("{prefix:.green} {msg}", "✓")
    } else {
        ("{prefix:.red} {msg}", "✗")
    };
    spinner.set_style(spinner_style(template));
    spinner.set_prefix(mark);
    spinner.finish_with_message(message.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_spinner() {
        let spinner = create_spinner("Searching...");
        assert!(!spinner.is_finished());
        spinner.finish();
        assert!(spinner.is_finished());
    }

    #[test]
    fn test_finish_without_spinner_is_noop() {
        finish(None, true, "Done");

        let spinner = create_spinner("Removing fields...");
        finish(Some(spinner.clone()), false, "Failed");
        assert!(spinner.is_finished());
    }
}
