//! Human-facing output with a progress spinner.
//!
//! Every component of an invocation shares one [`Logger`] handle. The handle
//! owns the spinner state and a [`SpinnerBackend`] that renders it; log lines
//! interrupt the spinner, and [`Logger::keep_spinner`] puts it back afterwards
//! so a long-running operation keeps its progress indicator.

use std::error::Error as StdError;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Log levels, ordered from most to least verbose.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Diagnostic output, hidden by default.
    Debug,
    /// Informational output.
    #[default]
    Info,
    /// Completed step.
    Success,
    /// Warning.
    Warn,
    /// Error.
    Error,
    /// Failed step.
    Fail,
}

impl LogLevel {
    /// Name of the level.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Success => "success",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Fail => "fail",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "success" => Ok(Self::Success),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            "fail" => Ok(Self::Fail),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

/// Renders the spinner and persisted lines.
pub trait SpinnerBackend: Send {
    /// Show the spinner with `text`, replacing the previous one.
    fn start(&mut self, text: &str);

    /// Hide the spinner without printing anything.
    fn stop(&mut self);

    /// Hide the spinner and print `line` tagged with the symbol of `level`.
    fn persist(&mut self, level: LogLevel, line: &str);
}

/// Backend that discards everything.
#[derive(Debug, Default)]
pub struct SilentSpinner;

impl SpinnerBackend for SilentSpinner {
    fn start(&mut self, _text: &str) {}

    fn stop(&mut self) {}

    fn persist(&mut self, _level: LogLevel, _line: &str) {}
}

/// Snapshot of the logger state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggerState {
    /// Minimum level that gets printed.
    pub verbosity: LogLevel,
    /// Whether the spinner is currently shown.
    pub spinner_active: bool,
    /// Text of the last started spinner.
    pub spinner_text: String,
}

impl Default for LoggerState {
    fn default() -> Self {
        Self {
            verbosity: LogLevel::default(),
            spinner_active: false,
            spinner_text: String::new(),
        }
    }
}

struct Inner {
    state: LoggerState,
    backend: Box<dyn SpinnerBackend>,
}

impl Inner {
    fn start(&mut self, text: String) {
        self.backend.start(&text);
        self.state.spinner_active = true;
        self.state.spinner_text = text;
    }

    fn stop(&mut self) {
        if self.state.spinner_active {
            self.backend.stop();
            self.state.spinner_active = false;
        }
    }

    fn persist(&mut self, level: LogLevel, line: &str) {
        self.backend.persist(level, line);
        self.state.spinner_active = false;
    }
}

/// Shared logging handle.
#[derive(Clone)]
pub struct Logger {
    inner: Arc<Mutex<Inner>>,
}

impl Logger {
    /// Create a logger rendering through `backend`.
    pub fn new(backend: impl SpinnerBackend + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: LoggerState::default(),
                backend: Box::new(backend),
            })),
        }
    }

    /// Create a logger that prints nothing.
    pub fn silent() -> Self {
        Self::new(SilentSpinner)
    }

    /// Set the verbosity; `None` restores the default level.
    pub fn set_verbosity(&self, verbosity: Option<LogLevel>) {
        self.inner.lock().state.verbosity = verbosity.unwrap_or_default();
    }

    /// Current verbosity.
    pub fn verbosity(&self) -> LogLevel {
        self.inner.lock().state.verbosity
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> LoggerState {
        self.inner.lock().state.clone()
    }

    /// Whether the spinner is shown.
    pub fn is_spinning(&self) -> bool {
        self.inner.lock().state.spinner_active
    }

    /// Run `f`, restarting the spinner afterwards if `f` stopped it.
    ///
    /// The spinner is restored with the text it had before `f` ran. If it was
    /// not spinning before, nothing is restarted whatever `f` did.
    pub fn keep_spinner<T>(&self, f: impl FnOnce() -> T) -> T {
        let saved = {
            let inner = self.inner.lock();
            inner
                .state
                .spinner_active
                .then(|| inner.state.spinner_text.clone())
        };

        let _restore = SpinnerRestore {
            logger: self,
            saved,
        };

        f()
    }

    /// Start the spinner.
    pub fn spin(&self, message: impl Into<String>) {
        self.inner.lock().start(message.into());
    }

    /// Stop the spinner, printing `message` as a completed step.
    pub fn succeed(&self, message: impl AsRef<str>) {
        self.inner.lock().persist(LogLevel::Success, message.as_ref());
    }

    /// Stop the spinner, printing `message` as a failed step.
    pub fn fail(&self, message: impl AsRef<str>) {
        self.inner.lock().persist(LogLevel::Fail, message.as_ref());
    }

    /// Stop the spinner without output.
    pub fn stop(&self) {
        self.inner.lock().stop();
    }

    /// Log at debug level.
    pub fn debug(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Debug, message.as_ref());
    }

    /// Log at info level.
    pub fn info(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Info, message.as_ref());
    }

    /// Log at warn level.
    pub fn warn(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Warn, message.as_ref());
    }

    /// Log at error level.
    pub fn error(&self, message: impl fmt::Display) {
        self.log(LogLevel::Error, &message.to_string());
    }

    /// Log an error followed by its chain of sources.
    pub fn error_chain(&self, err: &(dyn StdError + 'static)) {
        let mut message = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            message.push_str(&format!("\n  caused by: {}", cause));
            source = cause.source();
        }
        self.log(LogLevel::Error, &message);
    }

    /// Log `message` line by line, keeping the spinner alive.
    pub fn log(&self, level: LogLevel, message: &str) {
        if level < self.verbosity() {
            return;
        }

        self.keep_spinner(|| {
            let mut inner = self.inner.lock();
            for line in message.split('\n') {
                inner.persist(level, line);
            }
        });
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("state", &self.inner.lock().state)
            .finish()
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::silent()
    }
}

struct SpinnerRestore<'a> {
    logger: &'a Logger,
    saved: Option<String>,
}

impl Drop for SpinnerRestore<'_> {
    fn drop(&mut self) {
        if let Some(text) = self.saved.take() {
            let mut inner = self.logger.inner.lock();
            if !inner.state.spinner_active {
                inner.start(text);
            }
        }
    }
}

/// Stops the spinner when dropped.
pub(crate) struct StopSpinner(pub(crate) Logger);

impl Drop for StopSpinner {
    fn drop(&mut self) {
        self.0.stop();
    }
}
