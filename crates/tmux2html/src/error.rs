use thiserror::Error;
use tmux2html_core::LayoutError;

pub type Result<T> = std::result::Result<T, Tmux2HtmlError>;

#[derive(Debug, Error)]
pub enum Tmux2HtmlError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid tmux layout: {0}")]
    Layout(#[from] LayoutError),

    #[error("missing dependency command: {command}")]
    MissingCommand { command: String },

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("conflicting options: {message}")]
    OptionConflict { message: String },

    #[error("external command failed: {command} (exit={exit_code}){}", stderr_suffix(.stderr))]
    ExternalCommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("external command timed out: {command} ({seconds}s)")]
    ExternalCommandTimedOut { command: String, seconds: u64 },

    #[error("window not found: {window}")]
    WindowNotFound { window: String },

    #[error("pane index {index} out of range ({count} panes)")]
    PaneNotFound { index: usize, count: usize },
}

fn stderr_suffix(stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

impl Tmux2HtmlError {
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ExternalCommandFailed { exit_code, .. } => *exit_code,
            _ => 1,
        }
    }

    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::OptionConflict {
            message: message.into(),
        }
    }
}
