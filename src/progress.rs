//! Progress-callback trait for action lifecycle events.
//!
//! Ingestion can take minutes and a QA query several seconds; the session
//! fires these hooks so the host can show a busy indicator for exactly as
//! long as an action is running. Inject an [`Arc<dyn ActionProgressCallback>`]
//! via [`crate::config::DemoConfigBuilder::progress_callback`].
//!
//! # Example
//!
//! ```rust
//! use multimodal_rag_demo::{Action, ActionProgressCallback, DemoConfig};
//! use std::sync::Arc;
//!
//! struct Log;
//!
//! impl ActionProgressCallback for Log {
//!     fn on_action_start(&self, action: Action) {
//!         eprintln!("{}", action.busy_message());
//!     }
//! }
//!
//! let config = DemoConfig::builder()
//!     .progress_callback(Arc::new(Log) as Arc<dyn ActionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The two user-triggered transitions of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Build an engine and ingest the uploaded PDF.
    Process,
    /// Raw retrieval or question answering against the ingested PDF.
    Search,
}

impl Action {
    /// Text shown next to the spinner while the action runs.
    pub fn busy_message(&self) -> &'static str {
        match self {
            Action::Process => "Processing PDF...",
            Action::Search => "Searching...",
        }
    }
}

/// Called by [`crate::session::Session`] around each action.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ActionProgressCallback: Send + Sync {
    /// Called once before the engine is contacted.
    fn on_action_start(&self, action: Action) {
        let _ = action;
    }

    /// Called when the action succeeded.
    fn on_action_complete(&self, action: Action, elapsed_ms: u64) {
        let _ = (action, elapsed_ms);
    }

    /// Called when the action failed; `error` is the message shown to the user.
    fn on_action_error(&self, action: Action, error: &str) {
        let _ = (action, error);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ActionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::DemoConfig`].
pub type ProgressCallback = Arc<dyn ActionProgressCallback>;
