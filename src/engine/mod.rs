//! The boundary to the multimodal RAG library.
//!
//! Everything substantive (PDF element extraction, summarisation, embedding,
//! vector search, answer synthesis) happens behind [`RagEngine`]. The session
//! only needs three calls and a way to build a fresh engine from an API key.
//!
//! ```text
//! RagEngineFactory::connect(api_key) ──▶ Box<dyn RagEngine>
//!                                          ├─ process_pdf(path, file_name, range)
//!                                          ├─ query(text, top_k)              ──▶ RetrievalBatch
//!                                          └─ answer_user_query(text, top_k)  ──▶ QaAnswer
//! ```
//!
//! [`http`] provides the JSON-over-HTTP implementation used by the CLI.

pub mod http;

use crate::config::PageRange;
use crate::error::Result;
use crate::record::{QaAnswer, RetrievalBatch};
use async_trait::async_trait;
use std::path::Path;

pub use http::{HttpRagEngine, HttpRagEngineFactory};

/// A handle on one ingested document collection.
///
/// An engine is owned by a single session and is never called concurrently.
#[async_trait]
pub trait RagEngine: Send + Sync {
    /// Ingest pages `range` of the PDF at `pdf_path`. May run for minutes.
    ///
    /// `pdf_path` is a temporary copy; `file_name` is the name the user
    /// uploaded it under.
    async fn process_pdf(
        &mut self,
        pdf_path: &Path,
        file_name: &str,
        range: PageRange,
    ) -> Result<()>;

    /// Retrieve the `top_k` records most relevant to `text`.
    async fn query(&self, text: &str, top_k: usize) -> Result<RetrievalBatch>;

    /// Answer `text` from the ingested content, returning the records used.
    async fn answer_user_query(&self, text: &str, top_k: usize) -> Result<QaAnswer>;

    /// Short name for logs.
    fn name(&self) -> &str {
        "rag-engine"
    }
}

/// Builds engines. Construction fails for an unusable API key.
pub trait RagEngineFactory: Send + Sync {
    fn connect(&self, api_key: &str) -> Result<Box<dyn RagEngine>>;
}
