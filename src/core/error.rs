use thiserror::Error;

/// Errors surfaced by the monitoring engine and its bootstrap code.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A history window outside the fixed 1/5/10/15/30/60 minute table was requested
    #[error("Unsupported history period: {minutes} minutes")]
    UnsupportedHistoryPeriod {
        /// The requested window length
        minutes: u32,
    },

    /// The named endpoint instance is not known
    #[error("Endpoint not found: {0}")]
    EndpointNotFound(String),

    /// Logging subscriber could not be installed
    #[error("Logging initialization error: {0}")]
    Logging(String),

    /// Underlying IO failure (config file reads)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, MonitorError>;

impl MonitorError {
    /// Creates a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new logging error
    pub fn logging<S: Into<String>>(msg: S) -> Self {
        Self::Logging(msg.into())
    }

    /// Returns true when the caller supplied bad input rather than the process failing.
    ///
    /// The HTTP layer maps these to client errors.
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Self::UnsupportedHistoryPeriod { .. } | Self::EndpointNotFound(_))
    }

    /// Returns the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) | Self::UnsupportedHistoryPeriod { .. } => "config",
            Self::EndpointNotFound(_) => "not_found",
            Self::Logging(_) => "logging",
            Self::Io(_) => "io",
        }
    }
}
