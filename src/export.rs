//! Book export: ownership checks, block assembly and rendering.
//!
//! A book becomes a front section (optional cover page and title page) and
//! one section per chapter, each chapter on its own page. The sections are
//! handed to the renderer for the requested format on a blocking task.

use crate::config::Config;
use crate::db::Database;
use crate::error::{AppError, Result};
use crate::formats::{ChapterSection, ExportFormat, Sections, load_cover};
use crate::layout::{BlockKind, CoverImage, LayoutBlock, StyleKind, Typography, walk};
use crate::library::{Book, Chapter};
use crate::markdown::tokenize;
use std::path::PathBuf;

/// A finished export ready to be sent or written.
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    /// Document bytes.
    pub bytes: Vec<u8>,
    /// Suggested download name.
    pub filename: String,
    /// MIME type of `bytes`.
    pub mime: &'static str,
}

/// Inputs an export needs besides the book itself.
#[derive(Debug, Clone, Default)]
pub struct ExportSettings {
    /// Directory uploaded covers live in.
    pub uploads_dir: PathBuf,
    /// Cover references containing any of these are not embedded.
    pub placeholder_markers: Vec<String>,
}

impl ExportSettings {
    /// Take export settings from the application config.
    pub fn from_config(config: &Config) -> Self {
        Self {
            uploads_dir: config.uploads.dir.clone(),
            placeholder_markers: config.export.placeholder_markers.clone(),
        }
    }
}

/// Download name for a book: title with non-alphanumerics replaced by `_`.
pub fn export_filename(book: &Book, format: ExportFormat) -> String {
    format!("{}.{}", book.file_stem(), format.extension())
}

/// Export `book_id` on behalf of `user_id`.
///
/// Fails with `NotFound` or `Forbidden` before any rendering starts.
pub async fn export_for_user(
    db: &Database,
    settings: &ExportSettings,
    user_id: &str,
    book_id: &str,
    format: ExportFormat,
) -> Result<ExportArtifact> {
    let book = db
        .get_book(book_id)?
        .ok_or_else(|| AppError::NotFound(format!("Book not found: {}", book_id)))?;

    if !book.is_owned_by(user_id) {
        return Err(AppError::Forbidden(format!(
            "Not allowed to export book: {}",
            book_id
        )));
    }

    tracing::info!(
        book_id = %book.id,
        format = format.extension(),
        chapters = book.chapters.len(),
        "Exporting book"
    );

    let settings = settings.clone();
    tokio::task::spawn_blocking(move || render_book(&book, &settings, format))
        .await
        .map_err(|e| AppError::RenderFailure(format!("Export task failed: {}", e)))?
}

/// Resolve the cover, build blocks and render synchronously.
pub fn render_book(
    book: &Book,
    settings: &ExportSettings,
    format: ExportFormat,
) -> Result<ExportArtifact> {
    let start = std::time::Instant::now();

    let cover = load_cover(
        book.cover_image.as_deref(),
        &settings.uploads_dir,
        &settings.placeholder_markers,
    );
    let sections = build_sections(book, cover, &format.typography());
    let bytes = format.render(&sections)?;

    tracing::info!(
        book_id = %book.id,
        blocks = sections.block_count(),
        bytes = bytes.len(),
        elapsed = ?start.elapsed(),
        "Export rendered"
    );

    Ok(ExportArtifact {
        bytes,
        filename: export_filename(book, format),
        mime: format.mime_type(),
    })
}

/// Front matter and chapter sections for a book.
pub fn build_sections(
    book: &Book,
    cover: Option<CoverImage>,
    typography: &Typography,
) -> Sections {
    let block = |kind: BlockKind, style: StyleKind| LayoutBlock::new(kind, typography.style(style));
    let mut front = Vec::new();

    if let Some(image) = cover {
        front.push(block(BlockKind::Cover(image), StyleKind::Cover));
        front.push(block(BlockKind::PageBreak, StyleKind::Body));
    }

    // Title page
    front.push(block(BlockKind::Title(book.title.clone()), StyleKind::Title));
    if let Some(subtitle) = book.subtitle_text() {
        front.push(block(
            BlockKind::Subtitle(subtitle.to_string()),
            StyleKind::Subtitle,
        ));
    }
    let author = book.author.trim();
    if !author.is_empty() {
        front.push(block(
            BlockKind::AuthorLine(format!("by {}", author)),
            StyleKind::Author,
        ));
    }
    front.push(block(BlockKind::Rule, StyleKind::Rule));
    front.push(block(BlockKind::PageBreak, StyleKind::Body));

    let chapters = book
        .chapters
        .iter()
        .enumerate()
        .map(|(index, chapter)| {
            let mut blocks = Vec::new();
            if index > 0 {
                blocks.push(block(BlockKind::PageBreak, StyleKind::Body));
            }
            blocks.push(block(
                BlockKind::ChapterTitle(chapter.title.clone()),
                StyleKind::ChapterTitle,
            ));
            blocks.extend(chapter_blocks(chapter, typography));
            ChapterSection {
                id: chapter.id.clone(),
                blocks,
            }
        })
        .collect();

    Sections { front, chapters }
}

fn chapter_blocks(chapter: &Chapter, typography: &Typography) -> Vec<LayoutBlock> {
    if chapter.content.trim().is_empty() {
        return Vec::new();
    }

    let tokens = tokenize(&chapter.content);
    let blocks = walk(&tokens, typography);
    tracing::debug!(
        chapter_id = %chapter.id,
        tokens = tokens.len(),
        blocks = blocks.len(),
        "Laid out chapter"
    );
    blocks
}
