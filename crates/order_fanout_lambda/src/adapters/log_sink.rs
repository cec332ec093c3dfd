use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// Structured log destination handed to every handler.
///
/// One sink lives for the whole process and is shared by every invocation.
pub trait LogSink: Send + Sync {
    fn emit(&self, level: LogLevel, component: &str, event: &str, details: Value);

    fn info(&self, component: &str, event: &str, details: Value) {
        self.emit(LogLevel::Info, component, event, details);
    }

    fn warn(&self, component: &str, event: &str, details: Value) {
        self.emit(LogLevel::Warn, component, event, details);
    }

    fn error(&self, component: &str, event: &str, details: Value) {
        self.emit(LogLevel::Error, component, event, details);
    }
}

/// Forwards entries to the process-wide `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn emit(&self, level: LogLevel, component: &str, event: &str, details: Value) {
        match level {
            LogLevel::Info => tracing::info!(component, event, %details, "{event}"),
            LogLevel::Warn => tracing::warn!(component, event, %details, "{event}"),
            LogLevel::Error => tracing::error!(component, event, %details, "{event}"),
        }
    }
}

/// Installs the JSON `tracing` subscriber used by the Lambda binaries.
/// `RUST_LOG` overrides the default `info` filter.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_target(false)
        .with_current_span(false)
        .without_time()
        .init();
}
