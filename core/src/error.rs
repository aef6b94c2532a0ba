//! Error types shared by every part of the core.
//!
//! # Design
//! Four failure kinds cover the whole crate: bad caller input
//! (`Validation`), a failed or non-2xx exchange (`Transport`), malformed
//! JSON or key text (`Format`) and key decoding or signing (`Crypto`).
//! Every variant names the operation that failed and carries enough
//! context (parameter, address, truncated input) to diagnose the failure
//! without re-running the call.

use std::fmt;

use thiserror::Error;

/// Longest input excerpt carried inside a `Format` error.
pub const SNIPPET_LIMIT: usize = 200;

/// What kind of text failed to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatKind {
    Json,
    Key,
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatKind::Json => write!(f, "JSON"),
            FormatKind::Key => write!(f, "key text"),
        }
    }
}

/// Errors returned by core operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RestError {
    /// A caller-supplied argument was rejected before any work began.
    #[error("{operation}: invalid `{parameter}`: {reason}")]
    Validation {
        operation: &'static str,
        parameter: String,
        reason: String,
    },

    /// The exchange failed or returned a non-2xx status. `status` is
    /// `None` when no response was received at all.
    #[error("{operation}: {} from {url}: {body}", describe_status(.status))]
    Transport {
        operation: &'static str,
        status: Option<u16>,
        url: String,
        body: String,
    },

    /// Text could not be parsed, or a parsed tree had the wrong shape.
    #[error("{operation}: malformed {kind}: {reason} (input: {snippet:?})")]
    Format {
        kind: FormatKind,
        operation: &'static str,
        reason: String,
        snippet: String,
    },

    /// Key decoding or signing failed.
    #[error("{operation}: {reason}")]
    Crypto {
        operation: &'static str,
        reason: String,
    },
}

impl RestError {
    pub fn validation(operation: &'static str, parameter: &str, reason: impl Into<String>) -> Self {
        RestError::Validation {
            operation,
            parameter: parameter.to_string(),
            reason: reason.into(),
        }
    }

    /// A JSON format error carrying a truncated excerpt of `input`.
    pub fn json(operation: &'static str, reason: impl Into<String>, input: &str) -> Self {
        RestError::Format {
            kind: FormatKind::Json,
            operation,
            reason: reason.into(),
            snippet: snippet(input),
        }
    }

    /// A key-text format error. The snippet is always empty so key
    /// material never ends up in a diagnostic.
    pub fn key(operation: &'static str, reason: impl Into<String>) -> Self {
        RestError::Format {
            kind: FormatKind::Key,
            operation,
            reason: reason.into(),
            snippet: String::new(),
        }
    }

    pub fn crypto(operation: &'static str, reason: impl Into<String>) -> Self {
        RestError::Crypto {
            operation,
            reason: reason.into(),
        }
    }

    pub fn transport(
        operation: &'static str,
        status: Option<u16>,
        url: &str,
        body: impl Into<String>,
    ) -> Self {
        RestError::Transport {
            operation,
            status,
            url: url.to_string(),
            body: body.into(),
        }
    }

    /// The operation that produced this error.
    pub fn operation(&self) -> &'static str {
        match self {
            RestError::Validation { operation, .. }
            | RestError::Transport { operation, .. }
            | RestError::Format { operation, .. }
            | RestError::Crypto { operation, .. } => operation,
        }
    }
}

/// Truncate `input` to at most [`SNIPPET_LIMIT`] characters.
pub fn snippet(input: &str) -> String {
    match input.char_indices().nth(SNIPPET_LIMIT) {
        Some((end, _)) => input[..end].to_string(),
        None => input.to_string(),
    }
}

fn describe_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!("HTTP {code}"),
        None => "no response".to_string(),
    }
}

/// Crate-wide result alias.
pub type Result<T, E = RestError> = std::result::Result<T, E>;
