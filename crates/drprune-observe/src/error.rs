use thiserror::Error;

/// Failure to set up the process logger.
#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("unknown log format {0:?}, expected text, json or journald")]
    InvalidFormat(String),

    #[error("journald output needs a linux build with the `journald` feature")]
    JournaldNotSupported,

    #[error("a global logger is already installed")]
    AlreadyInitialized,

    #[error("logger setup failed: {0}")]
    InitializationFailed(String),

    #[error("invalid log directive {directive:?}: {reason}")]
    InvalidLogLevel { directive: String, reason: String },
}

impl LoggerError {
    pub(crate) fn invalid_level(directive: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidLogLevel {
            directive: directive.into(),
            reason: reason.to_string(),
        }
    }

    /// Classify a `try_init` failure. The subscriber crate only reports a second
    /// installation through its message.
    pub(crate) fn from_init(e: impl std::fmt::Display) -> Self {
        let msg = e.to_string();
        if msg.contains("already") {
            Self::AlreadyInitialized
        } else {
            Self::InitializationFailed(msg)
        }
    }
}
