use serde::Serialize;
use std::fmt;

/// Classification attached to every failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    Configuration,
    NotFound,
    PermissionDenied,
    Malformed,
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Configuration => "Configuration",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::PermissionDenied => "PermissionDenied",
            ErrorKind::Malformed => "Malformed",
            ErrorKind::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

/// Errors raised while configuring a run or talking to the store.
///
/// `Configuration` is the only fatal variant: it aborts the run before any
/// table is probed. Every other variant is recorded against a single table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// Missing or invalid configuration (base address, credential, limits).
    Configuration(String),
    /// The table or relation does not exist.
    NotFound(String),
    /// The credential is not allowed to read or write the table.
    PermissionDenied(String),
    /// The backend answered with something that could not be decoded.
    Malformed(String),
    /// Anything else, including transport failures and timeouts.
    Unknown(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<ProbeError>,
        /// Additional context message.
        context: String,
    },
}

impl ProbeError {
    /// Classification of the innermost error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProbeError::Configuration(_) => ErrorKind::Configuration,
            ProbeError::NotFound(_) => ErrorKind::NotFound,
            ProbeError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            ProbeError::Malformed(_) => ErrorKind::Malformed,
            ProbeError::Unknown(_) => ErrorKind::Unknown,
            ProbeError::WithContext { source, .. } => source.kind(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            ProbeError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ProbeError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            ProbeError::Malformed(msg) => write!(f, "Malformed response: {}", msg),
            ProbeError::Unknown(msg) => write!(f, "{}", msg),
            ProbeError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for ProbeError {}

impl From<reqwest::Error> for ProbeError {
    /// Timeouts and transport failures are `Unknown`; body decoding failures
    /// are `Malformed`.
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProbeError::Unknown(format!("request timed out: {}", err))
        } else if err.is_decode() {
            ProbeError::Malformed(err.to_string())
        } else {
            ProbeError::Unknown(format!("request failed: {}", err))
        }
    }
}

impl From<serde_json::Error> for ProbeError {
    fn from(err: serde_json::Error) -> Self {
        ProbeError::Malformed(err.to_string())
    }
}

/// Prefixes a failed store call with what was being attempted.
///
/// The wrapped error keeps its `ErrorKind`, so a decode failure reported as
/// "decoding sample of teams: Malformed response: ..." still counts as `Malformed`.
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T, ProbeError>;

    /// Like `context`, but the message is only built on failure.
    fn with_context<F>(self, f: F) -> Result<T, ProbeError>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T, ProbeError> {
    fn context(self, context: impl Into<String>) -> Result<T, ProbeError> {
        self.map_err(|e| ProbeError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, ProbeError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| ProbeError::WithContext {
            source: Box::new(e),
            context: f(),
        })
    }
}
