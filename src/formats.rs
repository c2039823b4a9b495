mod cover;
mod docx;
mod metrics;
mod pdf;

pub use cover::{UPLOADS_PREFIX, encode_cover, load_cover};
pub use docx::DocxRenderer;
pub use pdf::PdfRenderer;

use crate::error::{AppError, Result};
use crate::layout::{LayoutBlock, Typography};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::str::FromStr;

/// A backend that turns layout blocks into a finished document.
///
/// A renderer instance belongs to exactly one export.
pub trait Renderer {
    /// Append one block to the document.
    fn render(&mut self, block: &LayoutBlock) -> Result<()>;

    /// Append blocks in order.
    fn render_all(&mut self, blocks: &[LayoutBlock]) -> Result<()> {
        for block in blocks {
            self.render(block)?;
        }
        Ok(())
    }

    /// Serialize the document into `out` and flush it.
    ///
    /// Sink failures surface as [`AppError::RenderFailure`].
    fn finish<W: Write>(self, out: &mut W) -> Result<()>
    where
        Self: Sized;
}

/// Blocks of one export, split where rendering may fail independently.
#[derive(Debug, Clone, Default)]
pub struct Sections {
    /// Cover and title page. A failure here aborts the export.
    pub front: Vec<LayoutBlock>,
    /// One section per chapter, in book order.
    pub chapters: Vec<ChapterSection>,
}

/// Blocks of a single chapter.
#[derive(Debug, Clone)]
pub struct ChapterSection {
    /// Chapter id, for logging.
    pub id: String,
    /// Leading page break (if any), chapter title and body.
    pub blocks: Vec<LayoutBlock>,
}

impl Sections {
    /// Total number of blocks.
    pub fn block_count(&self) -> usize {
        self.front.len() + self.chapters.iter().map(|c| c.blocks.len()).sum::<usize>()
    }

    /// Flatten into one block stream.
    pub fn into_blocks(self) -> Vec<LayoutBlock> {
        let mut blocks = self.front;
        for chapter in self.chapters {
            blocks.extend(chapter.blocks);
        }
        blocks
    }
}

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Paginated PDF.
    #[default]
    Pdf,
    /// Office Open XML word processing document.
    Docx,
}

impl ExportFormat {
    /// MIME type of the produced file.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Pdf => "application/pdf",
            ExportFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
        }
    }

    /// File extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Pdf => "pdf",
            ExportFormat::Docx => "docx",
        }
    }

    /// Style table used by this format's renderer.
    pub fn typography(&self) -> Typography {
        match self {
            ExportFormat::Pdf => Typography::pdf(),
            ExportFormat::Docx => Typography::docx(),
        }
    }

    /// Render sections with this format's renderer into a byte buffer.
    pub fn render(&self, sections: &Sections) -> Result<Vec<u8>> {
        match self {
            ExportFormat::Pdf => render_to_vec(PdfRenderer::new(self.typography()), sections),
            ExportFormat::Docx => render_to_vec(DocxRenderer::new(self.typography()), sections),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "pdf" => Ok(ExportFormat::Pdf),
            "docx" => Ok(ExportFormat::Docx),
            other => Err(AppError::InvalidFormat(format!(
                "Unsupported export format: {}",
                other
            ))),
        }
    }
}

/// Render every section, then finish.
///
/// A chapter whose blocks fail to render is logged and the export moves on to
/// the next chapter; blocks it rendered before the failure stay in the
/// document.
fn render_to_vec<R: Renderer>(mut renderer: R, sections: &Sections) -> Result<Vec<u8>> {
    renderer.render_all(&sections.front)?;

    for chapter in &sections.chapters {
        if let Err(e) = renderer.render_all(&chapter.blocks) {
            tracing::warn!(
                chapter_id = %chapter.id,
                error = %e,
                "Failed to render chapter, continuing with the next one"
            );
        }
    }

    let mut out = Vec::new();
    renderer.finish(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{BlockKind, StyleKind};
    use crate::markdown::{InlineSpan, plain_text};

    #[test]
    fn test_format_metadata() {
        assert_eq!(ExportFormat::Pdf.mime_type(), "application/pdf");
        assert_eq!(ExportFormat::Docx.extension(), "docx");
        assert_eq!(
            ExportFormat::Docx.mime_type(),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        );
        assert_eq!(ExportFormat::default(), ExportFormat::Pdf);
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("pdf".parse::<ExportFormat>().unwrap(), ExportFormat::Pdf);
        assert_eq!(" DOCX ".parse::<ExportFormat>().unwrap(), ExportFormat::Docx);
        assert!(matches!(
            "epub".parse::<ExportFormat>(),
            Err(AppError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_render_magic_bytes() {
        let pdf = ExportFormat::Pdf.render(&Sections::default()).unwrap();
        assert!(pdf.starts_with(b"%PDF"));

        let docx = ExportFormat::Docx.render(&Sections::default()).unwrap();
        assert!(docx.starts_with(b"PK"));
    }

    /// Records chapter titles and fails on paragraphs containing "boom".
    #[derive(Default)]
    struct Recorder {
        seen: Vec<String>,
    }

    impl Renderer for Recorder {
        fn render(&mut self, block: &LayoutBlock) -> Result<()> {
            match &block.kind {
                BlockKind::ChapterTitle(title) | BlockKind::Title(title) => {
                    self.seen.push(title.clone());
                    Ok(())
                }
                BlockKind::Paragraph { spans, .. } if plain_text(spans).contains("boom") => {
                    Err(AppError::RenderFailure("boom".to_string()))
                }
                BlockKind::Paragraph { spans, .. } => {
                    self.seen.push(plain_text(spans));
                    Ok(())
                }
                _ => Ok(()),
            }
        }

        fn finish<W: Write>(self, out: &mut W) -> Result<()> {
            out.write_all(self.seen.join("|").as_bytes())
                .map_err(|e| AppError::RenderFailure(e.to_string()))
        }
    }

    fn chapter(id: &str, body: &[&str]) -> ChapterSection {
        let style = Typography::pdf().style(StyleKind::Body);
        let mut blocks = vec![LayoutBlock::new(
            BlockKind::ChapterTitle(id.to_string()),
            style,
        )];
        blocks.extend(body.iter().map(|text| {
            LayoutBlock::new(
                BlockKind::Paragraph {
                    spans: vec![InlineSpan::plain(*text)],
                    in_list: false,
                },
                style,
            )
        }));
        ChapterSection {
            id: id.to_string(),
            blocks,
        }
    }

    #[test]
    fn test_failing_chapter_is_skipped() {
        let sections = Sections {
            front: vec![LayoutBlock::new(
                BlockKind::Title("Book".to_string()),
                Typography::pdf().style(StyleKind::Title),
            )],
            chapters: vec![
                chapter("one", &["first"]),
                chapter("two", &["before", "boom", "after"]),
                chapter("three", &["last"]),
            ],
        };

        let out = render_to_vec(Recorder::default(), &sections).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Book|one|first|two|before|three|last"
        );
    }

    #[test]
    fn test_failing_front_matter_aborts() {
        let sections = Sections {
            front: chapter("front", &["boom"]).blocks,
            chapters: vec![chapter("one", &["first"])],
        };
        assert!(matches!(
            render_to_vec(Recorder::default(), &sections),
            Err(AppError::RenderFailure(_))
        ));
    }
}
