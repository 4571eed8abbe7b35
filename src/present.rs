//! Plain-text presentation of rendered blocks for a terminal.
//!
//! Terminals cannot show images inline, so an image block becomes a one-line
//! descriptor and, when an output directory is configured, a file on disk.

use crate::render::{Block, RenderedImage, Section, Table};
use crate::session::SearchView;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Formats search views; optionally saves images under `image_dir`.
#[derive(Debug, Clone, Default)]
pub struct Presenter {
    image_dir: Option<PathBuf>,
}

impl Presenter {
    pub fn new(image_dir: Option<PathBuf>) -> Self {
        Self { image_dir }
    }

    /// Format a whole search view.
    pub fn format_view(&self, view: &SearchView) -> String {
        let mut out = String::new();
        match view {
            SearchView::Raw { sections } => {
                out.push_str("## Search Results\n\n");
                if sections.is_empty() {
                    out.push_str("(no results)\n");
                }
                for s in sections {
                    out.push_str(&self.format_section(s));
                }
            }
            SearchView::Qa { answer, images } => {
                out.push_str("## AI Response\n\n");
                out.push_str(answer);
                if !answer.ends_with('\n') {
                    out.push('\n');
                }
                out.push_str("\n## Retrieved Images\n\n");
                if images.is_empty() {
                    out.push_str("(no images retrieved)\n");
                }
                for s in images {
                    out.push_str(&self.format_section(s));
                }
            }
        }
        out
    }

    /// `▸ label` followed by the indented block. A failed image save is
    /// logged and noted in the descriptor; the section is still printed.
    pub fn format_section(&self, section: &Section) -> String {
        let body = match &section.block {
            Block::Image { image, summary } => {
                let descriptor = match self.image_dir {
                    Some(ref dir) => match save_image(image, dir, &section.record_id) {
                        Ok(path) => describe_image(image, Some(path.as_path())),
                        Err(e) => {
                            warn!("Could not save image '{}': {}", section.record_id, e);
                            format!("{} (not saved: {e})", describe_image(image, None))
                        }
                    },
                    None => describe_image(image, None),
                };
                format!("{descriptor}\nImage Summary: {summary}\n")
            }
            other => format_block(other),
        };

        let mut out = format!("▸ {}\n", section.label);
        for line in body.lines() {
            if line.is_empty() {
                out.push('\n');
            } else {
                let _ = writeln!(out, "  {line}");
            }
        }
        out.push('\n');
        out
    }
}

/// Format a non-image block; images get a descriptor without saving.
pub fn format_block(block: &Block) -> String {
    match block {
        Block::Image { image, summary } => {
            format!("{}\nImage Summary: {}\n", describe_image(image, None), summary)
        }
        Block::Table { caption, table } => format!("{caption}\n{}", format_table(table)),
        Block::Text { caption, content } => {
            let mut s = format!("{caption}\n{content}");
            if !s.ends_with('\n') {
                s.push('\n');
            }
            s
        }
    }
}

/// Column-aligned rows separated by `│`. Short rows are not padded with
/// extra cells; they just end early.
pub fn format_table(table: &Table) -> String {
    let mut widths = vec![0usize; table.column_count()];
    for row in &table.rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let mut out = String::new();
    for row in &table.rows {
        let last = row.len().saturating_sub(1);
        for (i, cell) in row.iter().enumerate() {
            if i < last {
                let pad = widths[i] - cell.chars().count();
                let _ = write!(out, "{}{} │ ", cell, " ".repeat(pad));
            } else {
                out.push_str(cell);
            }
        }
        out.push('\n');
    }
    out
}

fn describe_image(image: &RenderedImage, saved: Option<&Path>) -> String {
    let mut s = format!(
        "[image: {} {}x{}, {} bytes]",
        image.format,
        image.width,
        image.height,
        image.bytes.len()
    );
    if let Some(p) = saved {
        let _ = write!(s, " saved to {}", p.display());
    }
    s
}

/// Write the decoded image to `dir/<record id>.<format>`.
pub fn save_image(image: &RenderedImage, dir: &Path, record_id: &str) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let stem: String = record_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    let ext = match image.format.as_str() {
        "jpeg" => "jpg",
        other => other,
    };
    let path = dir.join(format!("{stem}.{ext}"));
    std::fs::write(&path, &image.bytes)?;
    debug!("Saved image to {}", path.display());
    Ok(path)
}
