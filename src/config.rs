//! Configuration and user-input value types.
//!
//! [`DemoConfig`] holds everything that stays fixed for a session (where the
//! RAG service lives, timeouts, the progress hook). The per-action inputs a
//! user edits between clicks ([`PageRange`], [`SearchMode`], `top_k`) are
//! separate small types whose constructors enforce the same constraints the
//! original UI widgets did.

use crate::error::RagDemoError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Smallest accepted `top_k`.
pub const TOP_K_MIN: usize = 1;
/// Largest accepted `top_k`.
pub const TOP_K_MAX: usize = 10;
/// `top_k` used when the user does not choose one.
pub const DEFAULT_TOP_K: usize = 3;
/// Default distance between start and end page (`end = start + 10`).
pub const DEFAULT_PAGE_SPAN: usize = 10;
/// Default RAG service endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8000";

/// Configuration shared by every action in a session.
///
/// Built via [`DemoConfig::builder()`] or [`DemoConfig::default()`].
///
/// # Example
/// ```rust
/// use multimodal_rag_demo::DemoConfig;
///
/// let config = DemoConfig::builder()
///     .endpoint("http://localhost:9000")
///     .default_top_k(5)
///     .build()
///     .unwrap();
/// assert_eq!(config.default_top_k, 5);
/// ```
#[derive(Clone)]
pub struct DemoConfig {
    /// Base URL of the multimodal RAG service. Default: `http://127.0.0.1:8000`.
    pub endpoint: String,

    /// Per-request timeout in seconds. Default: 600.
    ///
    /// Ingestion summarises every image and table in the selected pages and
    /// routinely runs for minutes, so the default is generous.
    pub request_timeout_secs: u64,

    /// `top_k` used when a search does not specify one. Default: 3.
    pub default_top_k: usize,

    /// Directory for temporary upload files. Default: system temp dir.
    pub temp_dir: Option<PathBuf>,

    /// Busy-indicator hooks fired around Process and Search.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout_secs: 600,
            default_top_k: DEFAULT_TOP_K,
            temp_dir: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for DemoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DemoConfig")
            .field("endpoint", &self.endpoint)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("default_top_k", &self.default_top_k)
            .field("temp_dir", &self.temp_dir)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ActionProgressCallback>"),
            )
            .finish()
    }
}

impl DemoConfig {
    /// Create a new builder for `DemoConfig`.
    pub fn builder() -> DemoConfigBuilder {
        DemoConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`DemoConfig`].
#[derive(Debug)]
pub struct DemoConfigBuilder {
    config: DemoConfig,
}

impl DemoConfigBuilder {
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn default_top_k(mut self, k: usize) -> Self {
        self.config.default_top_k = k;
        self
    }

    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.temp_dir = Some(dir.into());
        self
    }

    /// Register a callback for action start/finish events.
    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<DemoConfig, RagDemoError> {
        let c = &self.config;
        let endpoint = c.endpoint.trim();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(RagDemoError::InvalidConfig(format!(
                "endpoint must be an http:// or https:// URL, got '{}'",
                c.endpoint
            )));
        }
        if reqwest::Url::parse(endpoint).is_err() {
            return Err(RagDemoError::InvalidConfig(format!(
                "endpoint is not a valid URL: '{}'",
                c.endpoint
            )));
        }
        if c.request_timeout_secs == 0 {
            return Err(RagDemoError::InvalidConfig(
                "request timeout must be ≥ 1 second".into(),
            ));
        }
        validate_top_k(c.default_top_k)?;
        Ok(self.config)
    }
}

/// Check `k` against `TOP_K_MIN..=TOP_K_MAX`.
pub fn validate_top_k(k: usize) -> Result<usize, RagDemoError> {
    if (TOP_K_MIN..=TOP_K_MAX).contains(&k) {
        Ok(k)
    } else {
        Err(RagDemoError::InvalidTopK {
            got: k,
            min: TOP_K_MIN,
            max: TOP_K_MAX,
        })
    }
}

// ── Value types ──────────────────────────────────────────────────────────

/// Inclusive, 1-indexed page range passed to ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPageRange")]
pub struct PageRange {
    start: usize,
    end: usize,
}

#[derive(Deserialize)]
struct RawPageRange {
    start: usize,
    end: usize,
}

impl TryFrom<RawPageRange> for PageRange {
    type Error = RagDemoError;

    fn try_from(raw: RawPageRange) -> Result<Self, Self::Error> {
        Self::new(raw.start, raw.end)
    }
}

impl PageRange {
    /// Create a range, rejecting `start < 1` and `end < start`.
    pub fn new(start: usize, end: usize) -> Result<Self, RagDemoError> {
        if start < 1 || end < start {
            return Err(RagDemoError::InvalidPageRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Range starting at `start` with the default span (`start + 10`).
    pub fn with_default_end(start: usize) -> Result<Self, RagDemoError> {
        Self::new(start, start.saturating_add(DEFAULT_PAGE_SPAN))
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    /// Number of pages covered (both ends inclusive).
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    /// Always `false`; a valid range covers at least one page.
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl Default for PageRange {
    fn default() -> Self {
        Self {
            start: 1,
            end: 1 + DEFAULT_PAGE_SPAN,
        }
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Which library entry point a search goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Raw retrieval: every returned record is shown, ranked. (default)
    #[default]
    Raw,
    /// Question answering: the synthesised answer plus retrieved images.
    Qa,
}

impl SearchMode {
    /// Label as shown in the mode selector.
    pub fn label(&self) -> &'static str {
        match self {
            SearchMode::Raw => "Raw Search",
            SearchMode::Qa => "QA Search",
        }
    }
}

impl std::str::FromStr for SearchMode {
    type Err = RagDemoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "raw" | "raw search" => Ok(SearchMode::Raw),
            "qa" | "qa search" => Ok(SearchMode::Qa),
            other => Err(RagDemoError::InvalidConfig(format!(
                "unknown search mode '{other}' (expected raw or qa)"
            ))),
        }
    }
}
