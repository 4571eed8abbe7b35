//! # multimodal-rag-demo
//!
//! Upload a PDF to a multimodal retrieval-augmented-generation (RAG) engine,
//! then query it: either raw retrieval of the most relevant text, table and
//! image records, or question answering with the images the answer drew on.
//!
//! The engine itself (element extraction, embeddings, vector search, answer
//! synthesis) is an external collaborator behind [`RagEngine`]. This crate
//! owns the session around it: input gating, the temporary upload file, the
//! Process/Search transitions, and turning returned records into something
//! a person can look at.
//!
//! ## Flow
//!
//! ```text
//! API key + PDF + page range
//!  │
//!  ├─ Process  connect engine → write temp .pdf → ingest → session Ready
//!  │
//!  └─ Search   Raw: query(text, k)              → "Result 1..k" sections
//!              QA:  answer_user_query(text, k)  → answer + image sections
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use multimodal_rag_demo::{
//!     DemoConfig, HttpRagEngineFactory, PageRange, ProcessRequest, SearchMode,
//!     SearchRequest, Session, Upload,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DemoConfig::builder().endpoint("http://localhost:8000").build()?;
//!     let factory = HttpRagEngineFactory::new(&config)?;
//!     let mut session = Session::new(config);
//!
//!     let upload = Upload::from_path("report.pdf").await?;
//!     let request = ProcessRequest::new("sk-...", upload, PageRange::new(1, 5)?)?;
//!     session.process(&factory, request).await?;
//!
//!     let view = session
//!         .search(&SearchRequest::new("What drove revenue?", 3, SearchMode::Qa)?)
//!         .await?;
//!     println!("{}", serde_json::to_string_pretty(&view)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `mmrag` binary (clap + anyhow + indicatif + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod engine;
pub mod error;
pub mod present;
pub mod progress;
pub mod record;
pub mod render;
pub mod session;
pub mod upload;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{DemoConfig, DemoConfigBuilder, PageRange, SearchMode, DEFAULT_TOP_K, TOP_K_MAX, TOP_K_MIN};
pub use engine::{HttpRagEngine, HttpRagEngineFactory, RagEngine, RagEngineFactory};
pub use error::RagDemoError;
pub use present::Presenter;
pub use progress::{Action, ActionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use record::{Metadata, QaAnswer, RecordKind, RetrievalBatch, RetrievalRecord};
pub use render::{render, Block, RenderedImage, Section, Table};
pub use session::{ProcessReport, ProcessRequest, SearchRequest, SearchView, Session};
pub use upload::{materialize, TempPdf, Upload};
