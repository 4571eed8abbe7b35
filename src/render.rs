//! Turn a [`RetrievalRecord`] into a displayable [`Block`].
//!
//! Dispatch is on [`RecordKind`], decided once when the record was built:
//!
//! | Kind  | Rendering |
//! |-------|-----------|
//! | Image | base64 → bytes → decoded image, plus its summary |
//! | Table | lines → comma-split cells; raw text if that fails |
//! | Text  | raw text |
//!
//! Only the table branch recovers from bad content. A broken image is an
//! error for the whole action, the same as any other engine failure.

use crate::error::{RagDemoError, Result};
use crate::record::{RecordKind, RetrievalRecord};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use tracing::debug;

/// Shown when an image record has no `summary` metadata.
pub const NO_SUMMARY: &str = "No summary available";
/// Caption above tables (and above the raw fallback).
pub const TABLE_CAPTION: &str = "Table Content:";
/// Caption above plain-text records.
pub const TEXT_CAPTION: &str = "Text Content:";

/// A decoded image ready for display.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedImage {
    /// Lower-case format name, e.g. `png`.
    pub format: String,
    pub width: u32,
    pub height: u32,
    /// The decoded (not base64) bytes, for saving to disk.
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

/// Rows of cells. Rows keep their own length; nothing is padded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Table {
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Widest row.
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn is_ragged(&self) -> bool {
        let n = self.column_count();
        self.rows.iter().any(|r| r.len() != n)
    }
}

/// Why table content could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableParseError {
    /// Content is empty or whitespace only.
    Empty,
}

/// Display-ready form of a record.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Block {
    Image {
        image: RenderedImage,
        summary: String,
    },
    Table {
        caption: &'static str,
        table: Table,
    },
    Text {
        caption: &'static str,
        content: String,
    },
}

impl Block {
    pub fn is_image(&self) -> bool {
        matches!(self, Block::Image { .. })
    }
}

/// A block inside a labelled, collapsible container ("Result 3", "Image").
#[derive(Debug, Clone, Serialize)]
pub struct Section {
    pub label: String,
    pub record_id: String,
    pub block: Block,
}

/// Render a single record.
pub fn render(record: &RetrievalRecord) -> Result<Block> {
    match record.kind {
        RecordKind::Image => render_image(record),
        RecordKind::Table => Ok(render_table(record)),
        RecordKind::Text => Ok(Block::Text {
            caption: TEXT_CAPTION,
            content: record.content.clone(),
        }),
    }
}

fn render_image(record: &RetrievalRecord) -> Result<Block> {
    let bytes = decode_base64(&record.content).map_err(|e| RagDemoError::InvalidBase64 {
        id: record.id.clone(),
        detail: e.to_string(),
    })?;

    let format = image::guess_format(&bytes).map_err(|e| RagDemoError::ImageDecode {
        id: record.id.clone(),
        detail: e.to_string(),
    })?;
    let decoded =
        image::load_from_memory_with_format(&bytes, format).map_err(|e| RagDemoError::ImageDecode {
            id: record.id.clone(),
            detail: e.to_string(),
        })?;

    debug!(
        "Decoded {} as {:?} {}x{}",
        record.id,
        format,
        decoded.width(),
        decoded.height()
    );

    Ok(Block::Image {
        image: RenderedImage {
            format: format!("{format:?}").to_lowercase(),
            width: decoded.width(),
            height: decoded.height(),
            bytes,
        },
        summary: record.summary().unwrap_or_else(|| NO_SUMMARY.to_string()),
    })
}

/// Base64 with embedded whitespace (line-wrapped payloads) tolerated.
fn decode_base64(content: &str) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    let compact: String = content.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD.decode(compact)
}

fn render_table(record: &RetrievalRecord) -> Block {
    match parse_table(&record.content) {
        Ok(table) => Block::Table {
            caption: TABLE_CAPTION,
            table,
        },
        Err(e) => {
            debug!("Table {} not parseable ({:?}); showing raw text", record.id, e);
            Block::Text {
                caption: TABLE_CAPTION,
                content: record.content.clone(),
            }
        }
    }
}

/// Split on `\n` into rows, trim each row, split on `,` into cells.
///
/// No quoting rules: a comma always separates cells.
pub fn parse_table(content: &str) -> std::result::Result<Table, TableParseError> {
    if content.trim().is_empty() {
        return Err(TableParseError::Empty);
    }
    let rows = content
        .split('\n')
        .map(|line| line.trim().split(',').map(str::to_string).collect())
        .collect();
    Ok(Table { rows })
}
