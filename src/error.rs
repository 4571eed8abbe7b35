//! Error types for the multimodal-rag-demo library.
//!
//! Every user action (Process, Search) returns `Result<_, RagDemoError>`.
//! A failed action never commits partial session state: the caller shows the
//! message and the session keeps whatever it had before the action started.
//!
//! Variants are grouped by where the failure happens:
//!
//! * **Input**: rejected before any external call is made (missing key,
//!   bad page range, empty query). These correspond to controls a UI would
//!   keep disabled.
//! * **Engine**: the RAG library/service failed or could not be reached.
//! * **Rendering**: a returned record could not be displayed.
//! * **I/O**: the temporary upload file could not be written.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the multimodal-rag-demo library.
#[derive(Debug, Error)]
pub enum RagDemoError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// No API key was supplied.
    #[error("Please enter your OpenAI API key to proceed.")]
    MissingApiKey,

    /// Page range is not `1 <= start <= end`.
    #[error("Invalid page range {start}-{end}: start must be >= 1 and end must be >= start")]
    InvalidPageRange { start: usize, end: usize },

    /// The search query is empty or whitespace only.
    #[error("Query must not be empty")]
    EmptyQuery,

    /// `top_k` outside the accepted range.
    #[error("Number of results must be between {min} and {max}, got {got}")]
    InvalidTopK { got: usize, min: usize, max: usize },

    /// The upload could not be read from disk.
    #[error("Failed to read upload '{path}': {source}")]
    UploadUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Search was requested before any document was processed.
    #[error("No processed document in this session.\nProcess a PDF before searching.")]
    NoDocument,

    // ── Engine errors ─────────────────────────────────────────────────────
    /// The RAG service could not be reached.
    #[error("RAG service unavailable at '{endpoint}': {reason}")]
    EngineUnavailable { endpoint: String, reason: String },

    /// The RAG service did not answer within the configured timeout.
    #[error("RAG service call '{operation}' timed out after {secs}s")]
    EngineTimeout { operation: String, secs: u64 },

    /// The RAG service rejected the API key (401/403).
    #[error("Authentication rejected by RAG service: {detail}\nCheck your API key.")]
    AuthError { detail: String },

    /// The RAG service returned a non-success status.
    #[error("RAG service error ({status}): {message}")]
    EngineApi { status: u16, message: String },

    /// The RAG service answered with a body that does not match the contract.
    #[error("Malformed response from RAG service for '{operation}': {detail}")]
    MalformedResponse { operation: String, detail: String },

    // ── Rendering errors ──────────────────────────────────────────────────
    /// Image record content is not valid base64.
    #[error("Record '{id}': image content is not valid base64: {detail}")]
    InvalidBase64 { id: String, detail: String },

    /// Image record bytes could not be decoded as an image.
    #[error("Record '{id}': cannot decode image: {detail}")]
    ImageDecode { id: String, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the temporary upload file.
    #[error("Failed to write temporary upload file: {source}")]
    TempFile {
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RagDemoError {
    /// `true` for failures that a UI would have prevented by disabling the
    /// action (missing key, bad range, empty query, no document yet).
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            RagDemoError::MissingApiKey
                | RagDemoError::InvalidPageRange { .. }
                | RagDemoError::EmptyQuery
                | RagDemoError::InvalidTopK { .. }
                | RagDemoError::UploadUnreadable { .. }
                | RagDemoError::NoDocument
        )
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = RagDemoError> = std::result::Result<T, E>;
