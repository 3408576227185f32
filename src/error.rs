use std::fmt;

use serde::Serialize;

/// Structured error type for the application layer, so `--json` output can
/// match on error codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", content = "detail")]
pub enum AppError {
    Io { message: String },
    Json { message: String },
    /// The settings file is readable but describes an impossible target.
    Settings { message: String },
    /// A file compiled with errors; the diagnostics are reported separately.
    Compile { file: String, count: usize },
    InvalidInput { message: String },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Io { message } => write!(f, "I/O error: {message}"),
            AppError::Json { message } => write!(f, "JSON error: {message}"),
            AppError::Settings { message } => write!(f, "Invalid settings: {message}"),
            AppError::Compile { file, count } => {
                let plural = if *count == 1 { "" } else { "s" };
                write!(f, "{file}: {count} error{plural}")
            }
            AppError::InvalidInput { message } => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    pub fn settings(message: impl Into<String>) -> Self {
        AppError::Settings {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Io {
            message: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Json {
            message: e.to_string(),
        }
    }
}

impl From<crate::project::ProjectError> for AppError {
    fn from(e: crate::project::ProjectError) -> Self {
        match e {
            crate::project::ProjectError::Io(io_err) => io_err.into(),
            crate::project::ProjectError::Json(json_err) => json_err.into(),
            crate::project::ProjectError::InvalidProject(message) => AppError::InvalidInput { message },
        }
    }
}
