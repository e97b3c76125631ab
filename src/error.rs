//! Diagnostic error types for the vitagraph core.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text. Nothing in the pipeline itself is fatal:
//! grammar mismatches, unresolved relation references, and malformed stream
//! frames are all absorbed silently. The errors here cover the seams where
//! failure is real: the network call and misuse of the session API.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for vitagraph.
///
/// Each variant wraps a subsystem-specific error, preserving the full
/// diagnostic chain (error codes, help text) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum VitaError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Session(#[from] SessionError),
}

// ---------------------------------------------------------------------------
// LLM / transport errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum LlmError {
    #[error("no API key configured")]
    #[diagnostic(
        code(vita::llm::missing_key),
        help("Pass --api-key or set the VITA_API_KEY environment variable.")
    )]
    MissingApiKey,

    #[error("chat completion request failed: {message}")]
    #[diagnostic(
        code(vita::llm::request_failed),
        help("Check your API key, the endpoint URL, and your network connection.")
    )]
    RequestFailed { message: String },

    #[error("chat completion endpoint returned HTTP {status}")]
    #[diagnostic(
        code(vita::llm::http_status),
        help(
            "The server rejected the request. A 401 usually means a bad API key; \
             a 429 means you are rate limited; wait and retry."
        )
    )]
    HttpStatus { status: u16 },

    #[error("stream read error: {source}")]
    #[diagnostic(
        code(vita::llm::stream_read),
        help(
            "The connection dropped mid-answer. Triples merged so far are kept; \
             re-ask the question to continue."
        )
    )]
    StreamRead {
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Session errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum SessionError {
    #[error("no answer is currently streaming")]
    #[diagnostic(
        code(vita::session::no_active_answer),
        help(
            "Deltas can only be applied between begin_answer() and \
             finish_answer()/abort_answer(). Start a turn first."
        )
    )]
    NoActiveAnswer,
}

/// Convenience alias for functions returning vitagraph results.
pub type VitaResult<T> = std::result::Result<T, VitaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn llm_error_converts_to_vita_error() {
        let err = LlmError::HttpStatus { status: 401 };
        let vita: VitaError = err.into();
        assert!(matches!(
            vita,
            VitaError::Llm(LlmError::HttpStatus { status: 401 })
        ));
    }

    #[test]
    fn session_error_converts_to_vita_error() {
        let vita: VitaError = SessionError::NoActiveAnswer.into();
        assert!(matches!(vita, VitaError::Session(SessionError::NoActiveAnswer)));
    }

    #[test]
    fn error_display_messages_are_descriptive() {
        let err = LlmError::RequestFailed {
            message: "connection refused".into(),
        };
        assert!(format!("{err}").contains("connection refused"));
    }
}
