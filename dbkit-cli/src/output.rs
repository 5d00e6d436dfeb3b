//! Styled terminal output.

use std::time::Duration;

use dbkit_core::{LogLevel, SpinnerBackend};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;

/// Symbol printed in front of a line of `level`.
pub fn symbol(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Debug => "›",
        LogLevel::Info => "ℹ",
        LogLevel::Success => "✔",
        LogLevel::Warn => "⚠",
        LogLevel::Error | LogLevel::Fail => "✖",
    }
}

/// Print a line of `level`; errors go to stderr.
pub fn line(level: LogLevel, text: &str) {
    let symbol = symbol(level);
    match level {
        LogLevel::Debug => println!("{} {}", symbol.dimmed(), text.dimmed()),
        LogLevel::Info => println!("{} {}", symbol.blue().bold(), text),
        LogLevel::Success => println!("{} {}", symbol.green().bold(), text.green()),
        LogLevel::Warn => println!("{} {}", symbol.yellow().bold(), text.yellow()),
        LogLevel::Error | LogLevel::Fail => eprintln!("{} {}", symbol.red().bold(), text.red()),
    }
}

/// Print an error message
pub fn error(text: &str) {
    line(LogLevel::Error, text);
}

/// Spinner drawn with indicatif.
///
/// Hidden automatically when stderr is not a terminal.
#[derive(Default)]
pub struct TerminalSpinner {
    bar: Option<ProgressBar>,
}

impl SpinnerBackend for TerminalSpinner {
    fn start(&mut self, text: &str) {
        self.stop();

        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(text.to_string());
        bar.enable_steady_tick(Duration::from_millis(80));
        self.bar = Some(bar);
    }

    fn stop(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }

    fn persist(&mut self, level: LogLevel, text: &str) {
        self.stop();
        line(level, text);
    }
}
