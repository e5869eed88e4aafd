//! PDF rendering for the report exports.
//!
//! Rows are first laid out on a text grid in millimetres, then drawn with the
//! configured TrueType font. The font has to carry Thai glyphs; text is not shaped.

use crate::error::ErrorCode;
use crate::export::Cell;
use anyhow::Context;
use printpdf::{Mm, PdfDocument};
use serde_json::json;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

const MARGIN_MM: f32 = 14.0;
const TITLE_PT: f32 = 16.0;
const BODY_PT: f32 = 11.0;
const PT_TO_MM: f32 = 25.4 / 72.0;
const LINE_SPACING: f32 = 1.4;
/// Average advance of one base glyph, in em.
const GLYPH_EM: f32 = 0.5;
const CELL_PAD_MM: f32 = 1.5;
const MIN_COLUMN_UNITS: usize = 4;
const MAX_COLUMN_UNITS: usize = 36;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl Orientation {
    /// A4 width and height in millimetres.
    pub fn page_size(self) -> (f32, f32) {
        match self {
            Orientation::Portrait => (210.0, 297.0),
            Orientation::Landscape => (297.0, 210.0),
        }
    }
}

/// A block of rows that starts on a fresh page.
#[derive(Debug, Clone)]
pub struct Section {
    pub title: Option<String>,
    pub rows: Vec<Vec<Cell>>,
    /// Leading rows repeated at the top of every overflow page.
    pub header_rows: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum PdfFontError {
    #[error("no PDF font configured; set SCOREBOARD_PDF_FONT to a Thai TrueType font")]
    NotConfigured,
    #[error("cannot read PDF font {path}")]
    Unreadable { path: String, reason: String },
    #[error("PDF font {path} is not a usable TrueType font")]
    Invalid { path: String, reason: String },
}

impl ErrorCode for PdfFontError {
    fn code(&self) -> &'static str {
        match self {
            PdfFontError::NotConfigured | PdfFontError::Unreadable { .. } => "pdf_font_missing",
            PdfFontError::Invalid { .. } => "pdf_font_invalid",
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            PdfFontError::NotConfigured => None,
            PdfFontError::Unreadable { path, reason } | PdfFontError::Invalid { path, reason } => {
                Some(json!({ "path": path, "reason": reason }))
            }
        }
    }
}

/// A font file read and checked once per export request.
#[derive(Debug, Clone)]
pub struct PdfFont {
    path: PathBuf,
    bytes: Vec<u8>,
}

impl PdfFont {
    pub fn load(path: Option<&Path>) -> Result<Self, PdfFontError> {
        let path = path.ok_or(PdfFontError::NotConfigured)?;
        let shown = path.display().to_string();
        let bytes = std::fs::read(path).map_err(|e| PdfFontError::Unreadable {
            path: shown.clone(),
            reason: e.to_string(),
        })?;
        PdfDocument::empty("font check")
            .add_external_font(bytes.as_slice())
            .map_err(|e| PdfFontError::Invalid {
                path: shown,
                reason: format!("{:?}", e),
            })?;
        Ok(Self {
            path: path.to_path_buf(),
            bytes,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Placed {
    x: f32,
    y: f32,
    size: f32,
    text: String,
}

#[derive(Debug, Clone, Default)]
struct PageLayout {
    items: Vec<Placed>,
}

/// Thai vowel and tone marks sit on the preceding glyph and take no width.
fn is_combining(c: char) -> bool {
    matches!(c, '\u{0E31}' | '\u{0E34}'..='\u{0E3A}' | '\u{0E47}'..='\u{0E4E}')
}

fn display_units(s: &str) -> usize {
    s.chars().filter(|c| !is_combining(*c)).count()
}

fn line_height(size: f32) -> f32 {
    size * PT_TO_MM * LINE_SPACING
}

fn units_for(width_mm: f32, size: f32) -> usize {
    ((width_mm - 2.0 * CELL_PAD_MM) / (size * PT_TO_MM * GLYPH_EM)).floor().max(1.0) as usize
}

fn cell_text(cell: &Cell) -> String {
    match cell {
        Cell::Text(t) => t.clone(),
        Cell::Number(n) if n.fract() == 0.0 => format!("{:.0}", n),
        Cell::Number(n) => n.to_string(),
        Cell::Blank => String::new(),
    }
}

/// Greedy word wrap. Words wider than a line are split before a base glyph.
fn wrap(text: &str, max_units: usize) -> Vec<String> {
    let max_units = max_units.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut used = 0;
    for word in text.split_whitespace() {
        let width = display_units(word);
        let sep = usize::from(!current.is_empty());
        if used + sep + width <= max_units {
            if sep == 1 {
                current.push(' ');
            }
            current.push_str(word);
            used += sep + width;
            continue;
        }
        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
            used = 0;
        }
        for c in word.chars() {
            if !is_combining(c) {
                if used == max_units {
                    lines.push(std::mem::take(&mut current));
                    used = 0;
                }
                used += 1;
            }
            current.push(c);
        }
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// Widths follow the widest cell per column, clamped. One-cell rows span the page
/// and do not count.
fn column_widths(rows: &[Vec<Cell>], avail: f32) -> Vec<f32> {
    let grid_rows = || rows.iter().filter(|r| r.len() > 1);
    let columns = grid_rows().map(|r| r.len()).max().unwrap_or(1);
    let mut units = vec![MIN_COLUMN_UNITS; columns];
    for row in grid_rows() {
        for (i, cell) in row.iter().enumerate() {
            let wanted = display_units(&cell_text(cell)).min(MAX_COLUMN_UNITS);
            units[i] = units[i].max(wanted);
        }
    }
    let total: usize = units.iter().sum();
    units
        .iter()
        .map(|u| avail * (*u as f32) / (total as f32))
        .collect()
}

/// One row, wrapped into its cells.
struct RowBlock {
    size: f32,
    cells: Vec<(f32, Vec<String>)>,
    height: f32,
}

impl RowBlock {
    fn new(row: &[Cell], widths: &[f32], avail: f32, size: f32) -> Self {
        let mut cells = Vec::with_capacity(row.len());
        if row.len() == 1 {
            cells.push((0.0, wrap(&cell_text(&row[0]), units_for(avail, size))));
        } else {
            let mut offset = 0.0;
            for (cell, width) in row.iter().zip(widths) {
                cells.push((offset, wrap(&cell_text(cell), units_for(*width, size))));
                offset += width;
            }
        }
        let lines = cells.iter().map(|(_, l)| l.len()).max().unwrap_or(1).max(1);
        Self {
            size,
            cells,
            height: lines as f32 * line_height(size),
        }
    }
}

struct Cursor {
    pages: Vec<PageLayout>,
    y: f32,
    top: f32,
    bottom: f32,
}

impl Cursor {
    fn new(page_height: f32) -> Self {
        Self {
            pages: Vec::new(),
            y: page_height - MARGIN_MM,
            top: page_height - MARGIN_MM,
            bottom: MARGIN_MM,
        }
    }

    fn break_page(&mut self) {
        self.pages.push(PageLayout::default());
        self.y = self.top;
    }

    fn at_top(&self) -> bool {
        self.y >= self.top
    }

    fn fits(&self, height: f32) -> bool {
        self.y - height >= self.bottom
    }

    fn place(&mut self, block: &RowBlock) {
        let lh = line_height(block.size);
        let baseline = self.y - block.size * PT_TO_MM;
        if let Some(page) = self.pages.last_mut() {
            for (offset, lines) in &block.cells {
                for (k, text) in lines.iter().enumerate() {
                    if text.is_empty() {
                        continue;
                    }
                    page.items.push(Placed {
                        x: MARGIN_MM + offset + CELL_PAD_MM,
                        y: baseline - (k as f32) * lh,
                        size: block.size,
                        text: text.clone(),
                    });
                }
            }
        }
        self.y -= block.height;
    }
}

fn layout(orientation: Orientation, sections: &[Section]) -> Vec<PageLayout> {
    let (width, height) = orientation.page_size();
    let avail = width - 2.0 * MARGIN_MM;
    let mut cursor = Cursor::new(height);
    for section in sections {
        cursor.break_page();
        if let Some(title) = &section.title {
            let block = RowBlock::new(&[Cell::from(title.as_str())], &[], avail, TITLE_PT);
            cursor.place(&block);
            cursor.y -= line_height(BODY_PT) / 2.0;
        }
        let widths = column_widths(&section.rows, avail);
        let header_rows = section.header_rows.min(section.rows.len());
        for (i, row) in section.rows.iter().enumerate() {
            let block = RowBlock::new(row, &widths, avail, BODY_PT);
            if !cursor.fits(block.height) && !cursor.at_top() {
                cursor.break_page();
                if i >= header_rows {
                    for header in &section.rows[..header_rows] {
                        cursor.place(&RowBlock::new(header, &widths, avail, BODY_PT));
                    }
                }
            }
            cursor.place(&block);
        }
    }
    cursor.pages
}

/// Writes the sections to `path` and returns the page count.
pub fn render(
    path: &Path,
    title: &str,
    orientation: Orientation,
    font: &PdfFont,
    sections: &[Section],
) -> anyhow::Result<usize> {
    let pages = layout(orientation, sections);
    let (width, height) = orientation.page_size();
    let (doc, first_page, first_layer) =
        PdfDocument::new(title, Mm(width), Mm(height), "content");
    let font_ref = doc
        .add_external_font(font.bytes.as_slice())
        .map_err(|e| anyhow::anyhow!("embed font {}: {:?}", font.path.display(), e))?;

    for (idx, page) in pages.iter().enumerate() {
        let (page_idx, layer_idx) = if idx == 0 {
            (first_page, first_layer)
        } else {
            doc.add_page(Mm(width), Mm(height), "content")
        };
        let layer = doc.get_page(page_idx).get_layer(layer_idx);
        for item in &page.items {
            layer.use_text(item.text.as_str(), item.size, Mm(item.x), Mm(item.y), &font_ref);
        }
    }

    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    doc.save(&mut BufWriter::new(file))
        .map_err(|e| anyhow::anyhow!("write {}: {:?}", path.display(), e))?;
    Ok(pages.len().max(1))
}
