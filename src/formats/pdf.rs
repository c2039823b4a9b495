//! Paginated PDF output assembled directly with `lopdf`.
//!
//! Positions are tracked as a distance from the top of the page and flipped
//! into PDF user space when operators are emitted. A page is only broken
//! when something has already been drawn on it, so a block that fits on a
//! page never causes an empty page.

use super::Renderer;
use super::metrics::{Face, encode_win_ansi};
use crate::error::{AppError, Result};
use crate::layout::{
    Align, BlockKind, BlockStyle, CoverImage, LayoutBlock, ListMarker, Rgb, Typography,
};
use crate::markdown::{InlineSpan, SpanKind};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream, StringFormat, dictionary};
use std::io::Write;

/// A4 page width in points.
pub const PAGE_WIDTH: f32 = 595.28;
/// A4 page height in points.
pub const PAGE_HEIGHT: f32 = 841.89;
/// Margin on every side, in points.
pub const MARGIN: f32 = 72.0;

const PRINTABLE_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;
const BOTTOM: f32 = PAGE_HEIGHT - MARGIN;

const HEADING_HEADROOM: f32 = 100.0;
const PARAGRAPH_HEADROOM: f32 = 100.0;
const CODE_HEADROOM: f32 = 150.0;

const LIST_INDENT: f32 = 20.0;
const COVER_BOX: (f32, f32) = (400.0, 550.0);
const LINE_SPACING: f32 = 1.2;
const ASCENT: f32 = 0.8;
const CODE_PADDING: f32 = 6.0;
const CODE_INSET: f32 = 10.0;

#[derive(Debug, Clone, PartialEq)]
struct Run {
    text: String,
    face: Face,
    color: Rgb,
}

/// One laid-out line of runs with its measured width.
#[derive(Debug, Default)]
struct Line {
    runs: Vec<Run>,
    width: f32,
}

impl Line {
    fn single(text: &str, face: Face, color: Rgb, size: f32) -> Self {
        let mut line = Line::default();
        line.push(text, face, color, size);
        line
    }

    fn push(&mut self, text: &str, face: Face, color: Rgb, size: f32) {
        self.width += face.text_width(text, size);
        if let Some(last) = self.runs.last_mut()
            && last.face == face
            && last.color == color
        {
            last.text.push_str(text);
            return;
        }
        self.runs.push(Run {
            text: text.to_string(),
            face,
            color,
        });
    }

    fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

/// A whitespace-delimited word, possibly spanning several styles.
#[derive(Debug, Default)]
struct Word {
    fragments: Vec<Run>,
    /// Style of the whitespace that preceded the word.
    gap: Option<(Face, Rgb)>,
}

impl Word {
    fn push(&mut self, ch: char, face: Face, color: Rgb) {
        match self.fragments.last_mut() {
            Some(last) if last.face == face && last.color == color => last.text.push(ch),
            _ => self.fragments.push(Run {
                text: ch.to_string(),
                face,
                color,
            }),
        }
    }

    fn width(&self, size: f32) -> f32 {
        self.fragments
            .iter()
            .map(|f| f.face.text_width(&f.text, size))
            .sum()
    }
}

/// PDF renderer state for a single export.
pub struct PdfRenderer {
    typography: Typography,
    pages: Vec<Vec<Operation>>,
    current: Vec<Operation>,
    /// Distance from the top edge of the current page.
    y: f32,
    /// Something has been drawn on the current page.
    dirty: bool,
    images: Vec<CoverImage>,
    title: Option<String>,
}

impl Default for PdfRenderer {
    fn default() -> Self {
        Self::new(Typography::pdf())
    }
}

impl PdfRenderer {
    /// Create a renderer with the given style table.
    pub fn new(typography: Typography) -> Self {
        Self {
            typography,
            pages: Vec::new(),
            current: Vec::new(),
            y: MARGIN,
            dirty: false,
            images: Vec::new(),
            title: None,
        }
    }

    fn new_page(&mut self) {
        let finished = std::mem::take(&mut self.current);
        self.pages.push(finished);
        self.y = MARGIN;
        self.dirty = false;
    }

    /// Break the page when fewer than `height` points remain above the bottom margin.
    fn ensure_space(&mut self, height: f32) {
        if self.dirty && self.y + height > BOTTOM {
            self.new_page();
        }
    }

    fn gap_before(&mut self, style: &BlockStyle) {
        if self.dirty {
            self.y += style.space_before;
        }
    }

    fn op(&mut self, operator: &str, operands: Vec<Object>) {
        self.current.push(Operation::new(operator, operands));
        self.dirty = true;
    }

    fn span_face(&self, kind: SpanKind, style: &BlockStyle) -> (Face, Rgb) {
        let fonts = &self.typography.fonts;
        match kind {
            SpanKind::Plain => (Face::from_font_name(style.font), style.color),
            SpanKind::Bold => (Face::from_font_name(fonts.bold), style.color),
            SpanKind::Italic => (Face::from_font_name(fonts.italic), style.color),
            SpanKind::Code => (
                Face::from_font_name(fonts.code),
                self.typography.inline_code_color,
            ),
        }
    }

    /// Break spans into lines no wider than `width`.
    fn wrap(&self, spans: &[InlineSpan], style: &BlockStyle, width: f32) -> Vec<Line> {
        let mut words = Vec::new();
        let mut word = Word::default();

        for span in spans {
            let (face, color) = self.span_face(span.kind, style);
            for ch in span.text.chars() {
                if ch.is_whitespace() {
                    if !word.fragments.is_empty() {
                        words.push(std::mem::take(&mut word));
                    }
                    word.gap.get_or_insert((face, color));
                } else {
                    word.push(ch, face, color);
                }
            }
        }
        if !word.fragments.is_empty() {
            words.push(word);
        }

        let size = style.size;
        let mut lines = Vec::new();
        let mut line = Line::default();

        for word in words {
            let Some(first) = word.fragments.first() else {
                continue;
            };
            if !line.is_empty() {
                let (face, color) = word.gap.unwrap_or((first.face, first.color));
                let space = face.text_width(" ", size);
                if line.width + space + word.width(size) > width {
                    lines.push(std::mem::take(&mut line));
                } else {
                    line.push(" ", face, color, size);
                }
            }
            for fragment in &word.fragments {
                line.push(&fragment.text, fragment.face, fragment.color, size);
            }
        }
        if !line.is_empty() {
            lines.push(line);
        }

        lines
    }

    /// Emit one line of text whose top edge sits at `top`.
    fn draw_line(&mut self, line: &Line, x: f32, top: f32, size: f32) {
        let baseline = PAGE_HEIGHT - top - size * ASCENT;
        self.op("BT", vec![]);
        self.op("Td", vec![x.into(), baseline.into()]);

        let mut active: Option<(Face, Rgb)> = None;
        for run in &line.runs {
            if active.map(|(face, _)| face) != Some(run.face) {
                self.op(
                    "Tf",
                    vec![Object::Name(run.face.resource().into()), size.into()],
                );
            }
            if active.map(|(_, color)| color) != Some(run.color) {
                let [r, g, b] = run.color.components();
                self.op("rg", vec![r.into(), g.into(), b.into()]);
            }
            active = Some((run.face, run.color));
            self.op(
                "Tj",
                vec![Object::String(
                    encode_win_ansi(&run.text),
                    StringFormat::Literal,
                )],
            );
        }

        self.op("ET", vec![]);
    }

    /// Lay out and draw wrapped text, breaking pages between lines as needed.
    fn flow(&mut self, spans: &[InlineSpan], style: &BlockStyle, x: f32, width: f32) {
        let height = style.size * LINE_SPACING;
        for line in self.wrap(spans, style, width) {
            self.ensure_space(height);
            let x = match style.align {
                Align::Center => x + ((width - line.width) / 2.0).max(0.0),
                Align::Left | Align::Justified => x,
            };
            self.draw_line(&line, x, self.y, style.size);
            self.y += height;
        }
    }

    fn text_block(&mut self, text: &str, style: &BlockStyle) {
        self.flow(&[InlineSpan::plain(text)], style, MARGIN, PRINTABLE_WIDTH);
        self.y += style.space_after;
    }

    fn cover(&mut self, image: &CoverImage) {
        let (width, height) = image.fit_within(COVER_BOX.0, COVER_BOX.1);
        if width <= 0.0 || height <= 0.0 {
            return;
        }
        if self.dirty {
            self.new_page();
        }

        self.images.push(image.clone());
        let name = format!("Im{}", self.images.len());
        let x = (PAGE_WIDTH - width) / 2.0;
        let bottom = (PAGE_HEIGHT - height) / 2.0;

        self.op("q", vec![]);
        self.op(
            "cm",
            vec![
                width.into(),
                0.into(),
                0.into(),
                height.into(),
                x.into(),
                bottom.into(),
            ],
        );
        self.op("Do", vec![Object::Name(name.into_bytes())]);
        self.op("Q", vec![]);
    }

    fn rule(&mut self, style: &BlockStyle) {
        self.gap_before(style);
        self.ensure_space(self.typography.rule_width);

        let [r, g, b] = style.color.components();
        let y = PAGE_HEIGHT - self.y;
        self.op("RG", vec![r.into(), g.into(), b.into()]);
        self.op("w", vec![self.typography.rule_width.into()]);
        self.op("m", vec![MARGIN.into(), y.into()]);
        self.op("l", vec![(PAGE_WIDTH - MARGIN).into(), y.into()]);
        self.op("S", vec![]);

        self.y += self.typography.rule_width + style.space_after;
    }

    fn list_item(&mut self, marker: ListMarker, spans: &[InlineSpan], style: &BlockStyle) {
        self.ensure_space(PARAGRAPH_HEADROOM);
        self.gap_before(style);

        let face = Face::from_font_name(style.font);
        let label = marker.label();
        let marker_width = face.text_width(&label, style.size);
        let x = MARGIN + LIST_INDENT;
        let width = PRINTABLE_WIDTH - LIST_INDENT - marker_width;
        let height = style.size * LINE_SPACING;

        for (index, line) in self.wrap(spans, style, width).into_iter().enumerate() {
            self.ensure_space(height);
            if index == 0 {
                let marker_line = Line::single(&label, face, style.color, style.size);
                self.draw_line(&marker_line, x, self.y, style.size);
            }
            self.draw_line(&line, x + marker_width, self.y, style.size);
            self.y += height;
        }

        self.y += style.space_after;
    }

    fn code_line(
        &mut self,
        text: &str,
        language: Option<&str>,
        first: bool,
        last: bool,
        style: &BlockStyle,
    ) {
        if first {
            self.ensure_space(CODE_HEADROOM);
            if let Some(language) = language {
                let size = self.typography.code_label_size;
                let label = Line::single(
                    &format!("Language: {language}"),
                    Face::Regular,
                    self.typography.code_label_color,
                    size,
                );
                self.draw_line(&label, MARGIN + CODE_INSET, self.y, size);
                self.y += size * LINE_SPACING + 2.0;
            }
        }

        let face = Face::from_font_name(style.font);
        let height = style.size + CODE_PADDING;
        let glyph = face.text_width("M", style.size).max(1.0);
        let columns = ((PRINTABLE_WIDTH - 4.0 * CODE_INSET) / glyph).floor().max(1.0) as usize;
        let [r, g, b] = self.typography.code_background.components();

        for segment in wrap_columns(text, columns) {
            self.ensure_space(height);

            self.op("rg", vec![r.into(), g.into(), b.into()]);
            self.op(
                "re",
                vec![
                    (MARGIN + CODE_INSET).into(),
                    (PAGE_HEIGHT - self.y - height).into(),
                    (PRINTABLE_WIDTH - 2.0 * CODE_INSET).into(),
                    height.into(),
                ],
            );
            self.op("f", vec![]);

            let line = Line::single(&segment, face, style.color, style.size);
            self.draw_line(
                &line,
                MARGIN + 2.0 * CODE_INSET,
                self.y + CODE_PADDING / 2.0,
                style.size,
            );
            self.y += height;
        }

        if last {
            self.y += style.size;
        }
    }

    fn into_document(mut self) -> Result<Document> {
        if self.dirty || self.pages.is_empty() {
            let page = std::mem::take(&mut self.current);
            self.pages.push(page);
        }

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut fonts = Dictionary::new();
        for face in Face::ALL {
            let font_id = doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => face.base_font(),
                "Encoding" => "WinAnsiEncoding",
            });
            fonts.set(face.resource(), Object::Reference(font_id));
        }

        let mut xobjects = Dictionary::new();
        for (index, image) in self.images.into_iter().enumerate() {
            let image_stream = Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => i64::from(image.width),
                    "Height" => i64::from(image.height),
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8,
                    "Filter" => "DCTDecode",
                },
                image.jpeg,
            );
            let image_id = doc.add_object(image_stream);
            xobjects.set(format!("Im{}", index + 1), Object::Reference(image_id));
        }

        let resources_id = doc.add_object(dictionary! {
            "Font" => fonts,
            "XObject" => xobjects,
        });

        let mut kids = Vec::with_capacity(self.pages.len());
        for operations in self.pages {
            let content = Content { operations }.encode()?;
            let content_id = doc.add_object(Stream::new(dictionary! {}, content));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => Object::Reference(pages_id),
                "Contents" => Object::Reference(content_id),
            });
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => Object::Reference(resources_id),
                "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut info = dictionary! {
            "Producer" => Object::string_literal("ebook-studio"),
        };
        if let Some(title) = self.title {
            info.set(
                "Title",
                Object::String(encode_win_ansi(&title), StringFormat::Literal),
            );
        }
        let info_id = doc.add_object(info);
        doc.trailer.set("Info", Object::Reference(info_id));

        Ok(doc)
    }
}

impl Renderer for PdfRenderer {
    fn render(&mut self, block: &LayoutBlock) -> Result<()> {
        let style = block.style;
        match &block.kind {
            BlockKind::Cover(image) => self.cover(image),
            BlockKind::Title(text) => {
                if self.title.is_none() {
                    self.title = Some(text.clone());
                }
                self.y += style.space_before;
                self.text_block(text, &style);
            }
            BlockKind::Subtitle(text) | BlockKind::AuthorLine(text) => {
                self.gap_before(&style);
                self.text_block(text, &style);
            }
            BlockKind::ChapterTitle(text) | BlockKind::Heading { text, .. } => {
                self.ensure_space(HEADING_HEADROOM);
                self.gap_before(&style);
                self.text_block(text, &style);
            }
            BlockKind::Paragraph { spans, in_list } => {
                self.ensure_space(PARAGRAPH_HEADROOM);
                self.gap_before(&style);
                let indent = if *in_list { LIST_INDENT } else { 0.0 };
                self.flow(spans, &style, MARGIN + indent, PRINTABLE_WIDTH - indent);
                self.y += style.space_after;
            }
            BlockKind::ListItem { marker, spans } => self.list_item(*marker, spans, &style),
            BlockKind::CodeLine {
                text,
                language,
                index,
                count,
            } => self.code_line(
                text,
                language.as_deref(),
                *index == 0,
                *index + 1 >= *count,
                &style,
            ),
            BlockKind::Spacer => self.y += style.space_after,
            BlockKind::Rule => self.rule(&style),
            BlockKind::PageBreak => {
                if self.dirty {
                    self.new_page();
                }
            }
        }
        Ok(())
    }

    fn finish<W: Write>(self, out: &mut W) -> Result<()> {
        let mut doc = self.into_document()?;
        doc.save_to(out)
            .map_err(|e| AppError::RenderFailure(format!("Failed to write PDF: {}", e)))?;
        out.flush()
            .map_err(|e| AppError::RenderFailure(format!("Failed to flush PDF: {}", e)))
    }
}

/// Split a line into chunks of at most `columns` characters.
fn wrap_columns(text: &str, columns: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return vec![String::new()];
    }
    chars
        .chunks(columns.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect()
}
