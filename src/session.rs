//! Session state and the two user actions, Process and Search.
//!
//! ## State machine
//!
//! ```text
//!            Process ok                      Process ok (engine replaced)
//!  Empty ─────────────────▶ Ready ◀──────────────────────┐
//!    │  Process err          │ │ Search (ok or err)      │
//!    └──▶ Empty              │ └──────────▶ Ready ────────┘
//!                            └─ Process err ──▶ Ready (unchanged)
//! ```
//!
//! A session starts empty. Only a successful Process changes it, and it
//! replaces both the engine and the processed file name together. Failed
//! actions leave the session exactly as it was. Search never mutates it.

use crate::config::{validate_top_k, DemoConfig, PageRange, SearchMode};
use crate::engine::{RagEngine, RagEngineFactory};
use crate::error::{RagDemoError, Result};
use crate::progress::Action;
use crate::record::RetrievalRecord;
use crate::render::{render, Section};
use crate::upload::{materialize, Upload};
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Inputs for a Process action, validated on construction.
#[derive(Clone)]
pub struct ProcessRequest {
    api_key: String,
    upload: Upload,
    range: PageRange,
}

impl ProcessRequest {
    /// Fails on an empty API key. The range is already valid by type.
    pub fn new(api_key: impl Into<String>, upload: Upload, range: PageRange) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(RagDemoError::MissingApiKey);
        }
        Ok(Self {
            api_key,
            upload,
            range,
        })
    }

    pub fn upload(&self) -> &Upload {
        &self.upload
    }

    pub fn range(&self) -> PageRange {
        self.range
    }
}

impl std::fmt::Debug for ProcessRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessRequest")
            .field("api_key", &"<redacted>")
            .field("upload", &self.upload)
            .field("range", &self.range)
            .finish()
    }
}

/// Outcome of a successful Process.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessReport {
    pub file_name: String,
    pub page_range: PageRange,
    pub elapsed_ms: u64,
}

/// Inputs for a Search action, validated on construction.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    query: String,
    top_k: usize,
    mode: SearchMode,
}

impl SearchRequest {
    /// Fails on an empty query or a `top_k` outside `1..=10`.
    pub fn new(query: impl Into<String>, top_k: usize, mode: SearchMode) -> Result<Self> {
        let query = query.into();
        if query.trim().is_empty() {
            return Err(RagDemoError::EmptyQuery);
        }
        let top_k = validate_top_k(top_k)?;
        Ok(Self { query, top_k, mode })
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn mode(&self) -> SearchMode {
        self.mode
    }
}

/// What a Search produced, ready to display.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum SearchView {
    /// Every retrieved record, labelled "Result 1", "Result 2", … in rank order.
    Raw { sections: Vec<Section> },
    /// The answer text plus the retrieved image records only.
    Qa { answer: String, images: Vec<Section> },
}

impl SearchView {
    pub fn sections(&self) -> &[Section] {
        match self {
            SearchView::Raw { sections } => sections,
            SearchView::Qa { images, .. } => images,
        }
    }
}

/// Per-user session: the active engine and the name of the processed file.
pub struct Session {
    config: DemoConfig,
    engine: Option<Box<dyn RagEngine>>,
    processed_file: Option<String>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("engine", &self.engine.as_ref().map(|e| e.name().to_string()))
            .field("processed_file", &self.processed_file)
            .finish()
    }
}

impl Session {
    /// A fresh session with no engine and no processed file.
    pub fn new(config: DemoConfig) -> Self {
        Self {
            config,
            engine: None,
            processed_file: None,
        }
    }

    pub fn config(&self) -> &DemoConfig {
        &self.config
    }

    /// Name of the currently processed file, if any.
    pub fn processed_file(&self) -> Option<&str> {
        self.processed_file.as_deref()
    }

    pub fn has_engine(&self) -> bool {
        self.engine.is_some()
    }

    /// Search is only available once both fields are set.
    pub fn is_ready(&self) -> bool {
        self.engine.is_some() && self.processed_file.is_some()
    }

    /// Build a new engine, ingest the upload, and on success make it current.
    ///
    /// The temporary PDF is removed on every path. On error the session is
    /// left untouched.
    pub async fn process(
        &mut self,
        factory: &dyn RagEngineFactory,
        request: ProcessRequest,
    ) -> Result<ProcessReport> {
        let start = Instant::now();
        self.notify_start(Action::Process);

        match self.ingest(factory, &request).await {
            Ok(engine) => {
                let file_name = request.upload.name().to_string();
                self.engine = Some(engine);
                self.processed_file = Some(file_name.clone());

                let elapsed_ms = start.elapsed().as_millis() as u64;
                info!(
                    "Processed '{}' pages {} in {}ms",
                    file_name, request.range, elapsed_ms
                );
                self.notify_complete(Action::Process, elapsed_ms);
                Ok(ProcessReport {
                    file_name,
                    page_range: request.range,
                    elapsed_ms,
                })
            }
            Err(e) => {
                warn!("Processing '{}' failed: {}", request.upload.name(), e);
                self.notify_error(Action::Process, &e);
                Err(e)
            }
        }
    }

    async fn ingest(
        &self,
        factory: &dyn RagEngineFactory,
        request: &ProcessRequest,
    ) -> Result<Box<dyn RagEngine>> {
        let mut engine = factory.connect(&request.api_key)?;

        if !request.upload.looks_like_pdf() {
            debug!(
                "Upload '{}' does not start with %PDF; passing it through anyway",
                request.upload.name()
            );
        }
        let temp = materialize(request.upload.bytes(), self.config.temp_dir.as_deref())?;

        let result = engine
            .process_pdf(temp.path(), request.upload.name(), request.range)
            .await;
        temp.release();
        result?;

        Ok(engine)
    }

    /// Run a search against the current engine and render the results.
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchView> {
        let start = Instant::now();
        self.notify_start(Action::Search);

        let result = self.run_search(request).await;
        match &result {
            Ok(view) => {
                let elapsed_ms = start.elapsed().as_millis() as u64;
                debug!(
                    "{} for {:?} returned {} sections in {}ms",
                    request.mode.label(),
                    request.query,
                    view.sections().len(),
                    elapsed_ms
                );
                self.notify_complete(Action::Search, elapsed_ms);
            }
            Err(e) => {
                warn!("Search failed: {}", e);
                self.notify_error(Action::Search, e);
            }
        }
        result
    }

    async fn run_search(&self, request: &SearchRequest) -> Result<SearchView> {
        let engine = match (&self.engine, &self.processed_file) {
            (Some(engine), Some(_)) => engine,
            _ => return Err(RagDemoError::NoDocument),
        };

        match request.mode {
            SearchMode::Raw => {
                let batch = engine.query(&request.query, request.top_k).await?;
                let sections = batch
                    .into_records()
                    .iter()
                    .enumerate()
                    .map(|(i, record)| section(format!("Result {}", i + 1), record))
                    .collect::<Result<Vec<_>>>()?;
                Ok(SearchView::Raw { sections })
            }
            SearchMode::Qa => {
                let qa = engine.answer_user_query(&request.query, request.top_k).await?;
                let images = qa
                    .retrieved
                    .into_records()
                    .iter()
                    .filter(|r| r.is_image())
                    .map(|record| section("Image".to_string(), record))
                    .collect::<Result<Vec<_>>>()?;
                Ok(SearchView::Qa {
                    answer: qa.answer,
                    images,
                })
            }
        }
    }

    fn notify_start(&self, action: Action) {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_action_start(action);
        }
    }

    fn notify_complete(&self, action: Action, elapsed_ms: u64) {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_action_complete(action, elapsed_ms);
        }
    }

    fn notify_error(&self, action: Action, error: &RagDemoError) {
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_action_error(action, &error.to_string());
        }
    }
}

fn section(label: String, record: &RetrievalRecord) -> Result<Section> {
    Ok(Section {
        label,
        record_id: record.id.clone(),
        block: render(record)?,
    })
}
