//! Retrieval records as returned by the RAG library.
//!
//! The library answers with parallel sequences (`ids`, `content`,
//! `metadata`). [`RetrievalBatch`] mirrors that wire shape;
//! [`RetrievalBatch::into_records`] zips it into [`RetrievalRecord`]s and
//! classifies each one exactly once, so nothing downstream re-parses id
//! prefixes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// Record metadata: an arbitrary string-keyed JSON object.
pub type Metadata = Map<String, Value>;

const IMAGE_PREFIX: &str = "image_";
const TABLE_PREFIX: &str = "table_";

/// Content type of a retrieved record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// `content` is a base64-encoded image.
    Image,
    /// `content` is comma/newline separated rows.
    Table,
    /// `content` is plain text.
    Text,
}

impl RecordKind {
    /// Classify by id prefix: `image_*`, `table_*`, anything else is text.
    pub fn from_id(id: &str) -> Self {
        if id.starts_with(IMAGE_PREFIX) {
            RecordKind::Image
        } else if id.starts_with(TABLE_PREFIX) {
            RecordKind::Table
        } else {
            RecordKind::Text
        }
    }
}

/// One retrieved unit of content. `kind` is always derived from `id`,
/// including when deserialising.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawRecord")]
pub struct RetrievalRecord {
    pub id: String,
    pub kind: RecordKind,
    pub content: String,
    pub metadata: Metadata,
}

#[derive(Deserialize)]
struct RawRecord {
    id: String,
    content: String,
    #[serde(default)]
    metadata: Metadata,
}

impl From<RawRecord> for RetrievalRecord {
    fn from(raw: RawRecord) -> Self {
        Self::new(raw.id, raw.content, raw.metadata)
    }
}

impl RetrievalRecord {
    pub fn new(id: impl Into<String>, content: impl Into<String>, metadata: Metadata) -> Self {
        let id = id.into();
        Self {
            kind: RecordKind::from_id(&id),
            id,
            content: content.into(),
            metadata,
        }
    }

    /// `metadata["summary"]` as display text. Non-string values are shown
    /// as their JSON rendering; `null` counts as absent.
    pub fn summary(&self) -> Option<String> {
        match self.metadata.get("summary")? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    pub fn is_image(&self) -> bool {
        self.kind == RecordKind::Image
    }
}

/// Parallel-sequence result of a retrieval call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalBatch {
    #[serde(default)]
    pub ids: Vec<String>,
    #[serde(default)]
    pub content: Vec<String>,
    #[serde(default)]
    pub metadata: Vec<Option<Metadata>>,
}

impl RetrievalBatch {
    /// Zip the three sequences into records, keeping input order.
    ///
    /// Stops at the shortest sequence when lengths differ.
    pub fn into_records(self) -> Vec<RetrievalRecord> {
        let (n_ids, n_content, n_meta) = (self.ids.len(), self.content.len(), self.metadata.len());
        if n_ids != n_content || n_ids != n_meta {
            warn!(
                "Retrieval result has mismatched lengths (ids={}, content={}, metadata={}); truncating",
                n_ids, n_content, n_meta
            );
        }
        self.ids
            .into_iter()
            .zip(self.content)
            .zip(self.metadata)
            .map(|((id, content), meta)| RetrievalRecord::new(id, content, meta.unwrap_or_default()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.ids.len().min(self.content.len()).min(self.metadata.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<RetrievalRecord> for RetrievalBatch {
    fn from_iter<I: IntoIterator<Item = RetrievalRecord>>(iter: I) -> Self {
        let mut batch = RetrievalBatch::default();
        for r in iter {
            batch.ids.push(r.id);
            batch.content.push(r.content);
            batch.metadata.push(Some(r.metadata));
        }
        batch
    }
}

/// Result of a question-answering call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QaAnswer {
    pub answer: String,
    #[serde(default)]
    pub retrieved: RetrievalBatch,
}
