//! Query logging routed through the [`Logger`].

use std::fmt;
use std::time::Duration;

use crate::config::{LoggingOptions, QueryLogLevel};
use crate::connection::SqlParam;
use crate::logger::{LogLevel, Logger};

/// Maps a connection's `logging` option onto logger calls.
#[derive(Debug, Clone)]
pub struct QueryLogger {
    options: LoggingOptions,
    logger: Logger,
}

impl QueryLogger {
    /// Create a query logger.
    pub fn new(options: LoggingOptions, logger: Logger) -> Self {
        Self { options, logger }
    }

    /// Logging options in effect.
    pub fn options(&self) -> &LoggingOptions {
        &self.options
    }

    /// Whether `level` is enabled.
    pub fn has_level(&self, level: QueryLogLevel) -> bool {
        self.options.has_level(level)
    }

    /// An executed query, at debug level.
    pub fn log_query(&self, query: &str, parameters: &[SqlParam]) {
        if self.has_level(QueryLogLevel::Query) {
            self.logger.debug(with_parameters(query, parameters));
        }
    }

    /// A failed query, as two failure lines.
    pub fn log_query_error(&self, error: &dyn fmt::Display, query: &str, parameters: &[SqlParam]) {
        if self.has_level(QueryLogLevel::Error) {
            let sql = with_parameters(query, parameters);
            self.logger.keep_spinner(|| {
                self.logger.fail(sql);
                self.logger.fail(error.to_string());
            });
        }
    }

    /// A query slower than the connection's threshold.
    pub fn log_query_slow(&self, time: Duration, query: &str, parameters: &[SqlParam]) {
        self.logger.warn(with_parameters(query, parameters));
        self.logger.warn(format!("{} ms", time.as_millis()));
    }

    /// A schema build message.
    pub fn log_schema_build(&self, message: &str) {
        if self.has_level(QueryLogLevel::Schema) {
            self.logger.debug(message);
        }
    }

    /// A migration message.
    pub fn log_migration(&self, message: &str) {
        if self.has_level(QueryLogLevel::Migration) {
            self.logger.debug(message);
        }
    }

    /// A generic connection message; `level` is one of `log`, `info`, `warn`.
    pub fn log(&self, level: QueryLogLevel, message: &str) {
        if !self.has_level(level) {
            return;
        }

        match level {
            QueryLogLevel::Info => self.logger.log(LogLevel::Info, message),
            QueryLogLevel::Warn => self.logger.log(LogLevel::Warn, message),
            _ => self.logger.log(LogLevel::Debug, message),
        }
    }
}

fn with_parameters(query: &str, parameters: &[SqlParam]) -> String {
    if parameters.is_empty() {
        return query.to_string();
    }

    let rendered = serde_json::to_string(parameters).unwrap_or_default();
    format!("{} -- PARAMETERS: {}", query, rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingSpinner;

    fn logger(options: LoggingOptions) -> (QueryLogger, RecordingSpinner) {
        let backend = RecordingSpinner::default();
        let logger = Logger::new(backend.clone());
        logger.set_verbosity(Some(LogLevel::Debug));
        (QueryLogger::new(options, logger), backend)
    }

    #[test]
    fn test_query_with_parameters() {
        let (query_logger, backend) = logger(LoggingOptions::Flag(true));
        query_logger.log_query(
            "select 1 where a = $1",
            &[SqlParam::Text("x".to_string()), SqlParam::Int(2)],
        );

        assert_eq!(
            backend.lines(),
            vec![(
                LogLevel::Debug,
                r#"select 1 where a = $1 -- PARAMETERS: ["x",2]"#.to_string()
            )]
        );
    }

    #[test]
    fn test_query_error_keeps_spinner() {
        let (query_logger, backend) = logger(LoggingOptions::Named("all".to_string()));
        query_logger.logger.spin("Migrating database test ...");
        query_logger.log_query_error(&"relation does not exist", "select * from t", &[]);

        assert!(query_logger.logger.is_spinning());
        assert_eq!(
            backend.lines(),
            vec![
                (LogLevel::Fail, "select * from t".to_string()),
                (LogLevel::Fail, "relation does not exist".to_string()),
            ]
        );
    }

    #[test]
    fn test_disabled_levels_are_silent() {
        let (query_logger, backend) = logger(LoggingOptions::Levels(vec![QueryLogLevel::Info]));
        query_logger.log_query("select 1", &[]);
        query_logger.log_schema_build("creating table");
        query_logger.log(QueryLogLevel::Warn, "careful");
        query_logger.log(QueryLogLevel::Info, "hello");

        assert_eq!(backend.lines(), vec![(LogLevel::Info, "hello".to_string())]);
    }

    #[test]
    fn test_slow_query_always_warns() {
        let (query_logger, backend) = logger(LoggingOptions::default());
        query_logger.log_query_slow(Duration::from_millis(1500), "select pg_sleep(1)", &[]);

        assert_eq!(
            backend.lines(),
            vec![
                (LogLevel::Warn, "select pg_sleep(1)".to_string()),
                (LogLevel::Warn, "1500 ms".to_string()),
            ]
        );
    }
}
