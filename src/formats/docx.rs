//! WordprocessingML (DOCX) output.
//!
//! Blocks become a flat list of paragraphs; Word does the pagination. The
//! package is assembled in memory and written to the sink in one go.

use super::Renderer;
use crate::error::{AppError, Result};
use crate::layout::{
    Align, BlockKind, BlockStyle, CoverImage, LayoutBlock, ListMarker, Rgb, StyleKind, Typography,
};
use crate::markdown::{InlineSpan, SpanKind};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const NS_W: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_WP: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_PIC: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";
const NS_PKG_RELS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const REL_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
const REL_CORE: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties";
const REL_STYLES: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";
const REL_IMAGE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

/// Cover bounding box in pixels.
const COVER_BOX: (f32, f32) = (400.0, 550.0);
/// English Metric Units per pixel at 96 DPI.
const EMU_PER_PIXEL: f32 = 9525.0;
/// Page margin in twips (one inch).
const PAGE_MARGIN: &str = "1440";
/// A4 in twips.
const PAGE_SIZE: (&str, &str) = ("11906", "16838");
/// 1.5 line spacing, in 240ths of a line.
const BODY_LINE: u32 = 360;
/// List indentation in twips.
const LIST_LEFT: u32 = 720;
const LIST_HANGING: u32 = 360;

#[derive(Debug, Clone)]
struct RunProps {
    font: &'static str,
    size: f32,
    color: Rgb,
    bold: bool,
    italic: bool,
}

#[derive(Debug, Clone)]
enum Inline {
    Text(String, RunProps),
    Image { index: usize, cx: u64, cy: u64 },
}

#[derive(Debug, Clone, Default)]
struct ParagraphProps {
    style: Option<&'static str>,
    keep_next: bool,
    page_break_before: bool,
    border_bottom: Option<(Rgb, u32)>,
    shade: Option<Rgb>,
    before: f32,
    after: f32,
    line: Option<u32>,
    indent: Option<(u32, u32)>,
    align: Option<Align>,
}

#[derive(Debug, Clone, Default)]
struct Paragraph {
    props: ParagraphProps,
    content: Vec<Inline>,
}

impl Paragraph {
    fn is_page_break(&self) -> bool {
        self.props.page_break_before && self.content.is_empty()
    }
}

/// DOCX renderer state for a single export.
pub struct DocxRenderer {
    typography: Typography,
    paragraphs: Vec<Paragraph>,
    media: Vec<CoverImage>,
    title: Option<String>,
    creator: Option<String>,
}

impl Default for DocxRenderer {
    fn default() -> Self {
        Self::new(Typography::docx())
    }
}

impl DocxRenderer {
    /// Create a renderer with the given style table.
    pub fn new(typography: Typography) -> Self {
        Self {
            typography,
            paragraphs: Vec::new(),
            media: Vec::new(),
            title: None,
            creator: None,
        }
    }

    fn block_props(style: &BlockStyle) -> ParagraphProps {
        ParagraphProps {
            before: style.space_before,
            after: style.space_after,
            align: Some(style.align),
            ..ParagraphProps::default()
        }
    }

    fn base_run(style: &BlockStyle) -> RunProps {
        RunProps {
            font: style.font,
            size: style.size,
            color: style.color,
            bold: false,
            italic: false,
        }
    }

    fn span_runs(&self, spans: &[InlineSpan], style: &BlockStyle) -> Vec<Inline> {
        let fonts = &self.typography.fonts;
        spans
            .iter()
            .map(|span| {
                let mut props = Self::base_run(style);
                match span.kind {
                    SpanKind::Plain => {}
                    SpanKind::Bold => {
                        props.font = fonts.bold;
                        props.bold = true;
                    }
                    SpanKind::Italic => {
                        props.font = fonts.italic;
                        props.italic = true;
                    }
                    SpanKind::Code => {
                        props.font = fonts.code;
                        props.color = self.typography.inline_code_color;
                    }
                }
                Inline::Text(span.text.clone(), props)
            })
            .collect()
    }

    fn text_paragraph(&mut self, text: &str, style: &BlockStyle, bold: bool, keep_next: bool) {
        let mut run = Self::base_run(style);
        run.bold = bold;
        let mut props = Self::block_props(style);
        props.keep_next = keep_next;
        self.paragraphs.push(Paragraph {
            props,
            content: vec![Inline::Text(text.to_string(), run)],
        });
    }

    fn cover(&mut self, image: &CoverImage) {
        let (width, height) = image.fit_within(COVER_BOX.0, COVER_BOX.1);
        if width <= 0.0 || height <= 0.0 {
            return;
        }
        self.media.push(image.clone());
        self.paragraphs.push(Paragraph {
            props: ParagraphProps {
                before: 10.0,
                after: 20.0,
                align: Some(Align::Center),
                ..ParagraphProps::default()
            },
            content: vec![Inline::Image {
                index: self.media.len(),
                cx: (width * EMU_PER_PIXEL).round() as u64,
                cy: (height * EMU_PER_PIXEL).round() as u64,
            }],
        });
    }

    /// Nothing to break away from at the start or right after another break.
    fn page_break(&mut self) {
        if self.paragraphs.last().is_none_or(Paragraph::is_page_break) {
            return;
        }
        self.paragraphs.push(Paragraph {
            props: ParagraphProps {
                page_break_before: true,
                ..ParagraphProps::default()
            },
            content: Vec::new(),
        });
    }

    fn list_item(&mut self, marker: ListMarker, spans: &[InlineSpan], style: &BlockStyle) {
        let mut content = vec![Inline::Text(marker.label(), Self::base_run(style))];
        content.extend(self.span_runs(spans, style));

        let mut props = Self::block_props(style);
        props.indent = Some((LIST_LEFT, LIST_HANGING));
        props.line = Some(BODY_LINE);
        self.paragraphs.push(Paragraph { props, content });
    }

    fn code_line(
        &mut self,
        text: &str,
        language: Option<&str>,
        first: bool,
        last: bool,
        style: &BlockStyle,
    ) {
        if first && let Some(language) = language {
            let label = RunProps {
                font: self.typography.fonts.body,
                size: self.typography.code_label_size,
                color: self.typography.code_label_color,
                bold: false,
                italic: false,
            };
            self.paragraphs.push(Paragraph {
                props: ParagraphProps {
                    before: 5.0,
                    keep_next: true,
                    ..ParagraphProps::default()
                },
                content: vec![Inline::Text(format!("Language: {language}"), label)],
            });
        }

        let mut props = Self::block_props(style);
        props.shade = Some(self.typography.code_background);
        props.keep_next = !last;
        if last {
            props.after = style.size;
        }
        self.paragraphs.push(Paragraph {
            props,
            content: vec![Inline::Text(text.to_string(), Self::base_run(style))],
        });
    }

    fn document_xml(&self) -> Vec<u8> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        write_decl(&mut writer);

        let mut root = BytesStart::new("w:document");
        root.push_attribute(("xmlns:w", NS_W));
        root.push_attribute(("xmlns:r", NS_R));
        root.push_attribute(("xmlns:wp", NS_WP));
        root.push_attribute(("xmlns:a", NS_A));
        root.push_attribute(("xmlns:pic", NS_PIC));
        let _ = writer.write_event(Event::Start(root));
        start(&mut writer, "w:body", &[]);

        for paragraph in &self.paragraphs {
            write_paragraph(&mut writer, paragraph);
        }

        start(&mut writer, "w:sectPr", &[]);
        empty(&mut writer, "w:pgSz", &[("w:w", PAGE_SIZE.0), ("w:h", PAGE_SIZE.1)]);
        empty(
            &mut writer,
            "w:pgMar",
            &[
                ("w:top", PAGE_MARGIN),
                ("w:right", PAGE_MARGIN),
                ("w:bottom", PAGE_MARGIN),
                ("w:left", PAGE_MARGIN),
                ("w:header", "708"),
                ("w:footer", "708"),
                ("w:gutter", "0"),
            ],
        );
        end(&mut writer, "w:sectPr");

        end(&mut writer, "w:body");
        end(&mut writer, "w:document");
        writer.into_inner().into_inner()
    }

    fn styles_xml(&self) -> Vec<u8> {
        let typography = &self.typography;
        let body = typography.style(StyleKind::Body);
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        write_decl(&mut writer);

        let mut root = BytesStart::new("w:styles");
        root.push_attribute(("xmlns:w", NS_W));
        let _ = writer.write_event(Event::Start(root));

        start(&mut writer, "w:docDefaults", &[]);
        start(&mut writer, "w:rPrDefault", &[]);
        start(&mut writer, "w:rPr", &[]);
        write_fonts(&mut writer, body.font);
        let body_size = half_points(body.size);
        empty(&mut writer, "w:sz", &[("w:val", body_size.as_str())]);
        empty(&mut writer, "w:szCs", &[("w:val", body_size.as_str())]);
        end(&mut writer, "w:rPr");
        end(&mut writer, "w:rPrDefault");
        end(&mut writer, "w:docDefaults");

        let mut normal = BytesStart::new("w:style");
        normal.push_attribute(("w:type", "paragraph"));
        normal.push_attribute(("w:default", "1"));
        normal.push_attribute(("w:styleId", "Normal"));
        let _ = writer.write_event(Event::Start(normal));
        empty(&mut writer, "w:name", &[("w:val", "Normal")]);
        empty(&mut writer, "w:qFormat", &[]);
        end(&mut writer, "w:style");

        for level in 1..=3u8 {
            let style = typography.style(StyleKind::heading(level));
            let id = format!("Heading{level}");
            let name = format!("heading {level}");
            let outline = (level - 1).to_string();
            let size = half_points(style.size);
            let color = style.color.to_hex();

            let mut elem = BytesStart::new("w:style");
            elem.push_attribute(("w:type", "paragraph"));
            elem.push_attribute(("w:styleId", id.as_str()));
            let _ = writer.write_event(Event::Start(elem));
            empty(&mut writer, "w:name", &[("w:val", name.as_str())]);
            empty(&mut writer, "w:basedOn", &[("w:val", "Normal")]);
            empty(&mut writer, "w:next", &[("w:val", "Normal")]);
            empty(&mut writer, "w:qFormat", &[]);
            start(&mut writer, "w:pPr", &[]);
            empty(&mut writer, "w:keepNext", &[]);
            empty(&mut writer, "w:outlineLvl", &[("w:val", outline.as_str())]);
            end(&mut writer, "w:pPr");
            start(&mut writer, "w:rPr", &[]);
            write_fonts(&mut writer, style.font);
            empty(&mut writer, "w:b", &[]);
            empty(&mut writer, "w:color", &[("w:val", color.as_str())]);
            empty(&mut writer, "w:sz", &[("w:val", size.as_str())]);
            empty(&mut writer, "w:szCs", &[("w:val", size.as_str())]);
            end(&mut writer, "w:rPr");
            end(&mut writer, "w:style");
        }

        end(&mut writer, "w:styles");
        writer.into_inner().into_inner()
    }

    fn content_types_xml(&self) -> Vec<u8> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        write_decl(&mut writer);

        let mut root = BytesStart::new("Types");
        root.push_attribute((
            "xmlns",
            "http://schemas.openxmlformats.org/package/2006/content-types",
        ));
        let _ = writer.write_event(Event::Start(root));
        empty(
            &mut writer,
            "Default",
            &[
                ("Extension", "rels"),
                ("ContentType", "application/vnd.openxmlformats-package.relationships+xml"),
            ],
        );
        empty(
            &mut writer,
            "Default",
            &[("Extension", "xml"), ("ContentType", "application/xml")],
        );
        if !self.media.is_empty() {
            empty(
                &mut writer,
                "Default",
                &[("Extension", "jpeg"), ("ContentType", "image/jpeg")],
            );
        }
        for (part, content_type) in [
            (
                "/word/document.xml",
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml",
            ),
            (
                "/word/styles.xml",
                "application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml",
            ),
            (
                "/docProps/core.xml",
                "application/vnd.openxmlformats-package.core-properties+xml",
            ),
        ] {
            empty(
                &mut writer,
                "Override",
                &[("PartName", part), ("ContentType", content_type)],
            );
        }
        end(&mut writer, "Types");
        writer.into_inner().into_inner()
    }

    fn package_rels_xml() -> Vec<u8> {
        relationships_xml(&[
            ("rId1", REL_DOCUMENT, "word/document.xml".to_string()),
            ("rId2", REL_CORE, "docProps/core.xml".to_string()),
        ])
    }

    fn document_rels_xml(&self) -> Vec<u8> {
        let ids: Vec<String> = (1..=self.media.len()).map(image_rel_id).collect();
        let mut rels = vec![("rId1", REL_STYLES, "styles.xml".to_string())];
        for (index, id) in ids.iter().enumerate() {
            rels.push((id.as_str(), REL_IMAGE, format!("media/{}", media_name(index + 1))));
        }
        relationships_xml(&rels)
    }

    fn core_xml(&self) -> Vec<u8> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        write_decl(&mut writer);

        let mut root = BytesStart::new("cp:coreProperties");
        root.push_attribute((
            "xmlns:cp",
            "http://schemas.openxmlformats.org/package/2006/metadata/core-properties",
        ));
        root.push_attribute(("xmlns:dc", "http://purl.org/dc/elements/1.1/"));
        root.push_attribute(("xmlns:dcterms", "http://purl.org/dc/terms/"));
        root.push_attribute(("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"));
        let _ = writer.write_event(Event::Start(root));

        if let Some(title) = &self.title {
            write_text_element(&mut writer, "dc:title", title);
        }
        if let Some(creator) = &self.creator {
            write_text_element(&mut writer, "dc:creator", creator);
        }
        let now = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
        for name in ["dcterms:created", "dcterms:modified"] {
            let mut elem = BytesStart::new(name);
            elem.push_attribute(("xsi:type", "dcterms:W3CDTF"));
            let _ = writer.write_event(Event::Start(elem));
            let _ = writer.write_event(Event::Text(BytesText::new(&now)));
            end(&mut writer, name);
        }

        end(&mut writer, "cp:coreProperties");
        writer.into_inner().into_inner()
    }

    fn package(&self) -> Result<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

        let parts = [
            ("[Content_Types].xml", self.content_types_xml()),
            ("_rels/.rels", Self::package_rels_xml()),
            ("docProps/core.xml", self.core_xml()),
            ("word/document.xml", self.document_xml()),
            ("word/styles.xml", self.styles_xml()),
            ("word/_rels/document.xml.rels", self.document_rels_xml()),
        ];
        for (name, data) in parts {
            zip.start_file(name, deflated)?;
            zip.write_all(&data)?;
        }

        for (index, image) in self.media.iter().enumerate() {
            zip.start_file(format!("word/media/{}", media_name(index + 1)), stored)?;
            zip.write_all(&image.jpeg)?;
        }

        Ok(zip.finish()?.into_inner())
    }
}

impl Renderer for DocxRenderer {
    fn render(&mut self, block: &LayoutBlock) -> Result<()> {
        let style = block.style;
        match &block.kind {
            BlockKind::Cover(image) => self.cover(image),
            BlockKind::Title(text) => {
                if self.title.is_none() {
                    self.title = Some(text.clone());
                }
                self.text_paragraph(text, &style, true, false);
            }
            BlockKind::Subtitle(text) => self.text_paragraph(text, &style, false, false),
            BlockKind::AuthorLine(text) => {
                if self.creator.is_none() {
                    self.creator = Some(text.strip_prefix("by ").unwrap_or(text).to_string());
                }
                self.text_paragraph(text, &style, false, false);
            }
            BlockKind::Rule => {
                let mut props = Self::block_props(&style);
                let size = (self.typography.rule_width * 8.0).round() as u32;
                props.border_bottom = Some((style.color, size));
                self.paragraphs.push(Paragraph {
                    props,
                    content: Vec::new(),
                });
            }
            BlockKind::ChapterTitle(text) => self.text_paragraph(text, &style, true, true),
            BlockKind::Heading { level, text } => {
                let mut run = Self::base_run(&style);
                run.bold = true;
                let mut props = Self::block_props(&style);
                props.style = Some(match *level {
                    1 => "Heading1",
                    2 => "Heading2",
                    _ => "Heading3",
                });
                props.keep_next = true;
                self.paragraphs.push(Paragraph {
                    props,
                    content: vec![Inline::Text(text.clone(), run)],
                });
            }
            BlockKind::Paragraph { spans, in_list } => {
                let mut props = Self::block_props(&style);
                props.line = Some(BODY_LINE);
                if *in_list {
                    props.indent = Some((LIST_LEFT, 0));
                }
                let content = self.span_runs(spans, &style);
                self.paragraphs.push(Paragraph { props, content });
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
            BlockKind::Spacer => self.paragraphs.push(Paragraph {
                props: ParagraphProps {
                    after: style.space_after,
                    ..ParagraphProps::default()
                },
                content: Vec::new(),
            }),
            BlockKind::PageBreak => self.page_break(),
        }
        Ok(())
    }

    fn finish<W: Write>(self, out: &mut W) -> Result<()> {
        let bytes = self.package()?;
        out.write_all(&bytes)
            .and_then(|_| out.flush())
            .map_err(|e| AppError::RenderFailure(format!("Failed to write DOCX: {}", e)))
    }
}

fn image_rel_id(index: usize) -> String {
    format!("rIdImage{index}")
}

fn media_name(index: usize) -> String {
    if index == 1 {
        "cover.jpeg".to_string()
    } else {
        format!("image{index}.jpeg")
    }
}

fn twips(points: f32) -> String {
    ((points * 20.0).round() as i64).to_string()
}

fn half_points(size: f32) -> String {
    ((size * 2.0).round() as i64).to_string()
}

fn write_decl<W: Write>(writer: &mut Writer<W>) {
    let _ = writer.write_event(Event::Decl(BytesDecl::new(
        "1.0",
        Some("UTF-8"),
        Some("yes"),
    )));
}

fn start<W: Write>(writer: &mut Writer<W>, name: &str, attrs: &[(&str, &str)]) {
    let mut elem = BytesStart::new(name);
    for attr in attrs {
        elem.push_attribute(*attr);
    }
    let _ = writer.write_event(Event::Start(elem));
}

fn empty<W: Write>(writer: &mut Writer<W>, name: &str, attrs: &[(&str, &str)]) {
    let mut elem = BytesStart::new(name);
    for attr in attrs {
        elem.push_attribute(*attr);
    }
    let _ = writer.write_event(Event::Empty(elem));
}

fn end<W: Write>(writer: &mut Writer<W>, name: &str) {
    let _ = writer.write_event(Event::End(BytesEnd::new(name)));
}

fn write_text_element<W: Write>(writer: &mut Writer<W>, name: &str, text: &str) {
    let _ = writer.write_event(Event::Start(BytesStart::new(name)));
    let _ = writer.write_event(Event::Text(BytesText::new(text)));
    let _ = writer.write_event(Event::End(BytesEnd::new(name)));
}

fn write_fonts<W: Write>(writer: &mut Writer<W>, font: &str) {
    empty(
        writer,
        "w:rFonts",
        &[("w:ascii", font), ("w:hAnsi", font), ("w:cs", font)],
    );
}

fn relationships_xml(rels: &[(&str, &str, String)]) -> Vec<u8> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    write_decl(&mut writer);

    let mut root = BytesStart::new("Relationships");
    root.push_attribute(("xmlns", NS_PKG_RELS));
    let _ = writer.write_event(Event::Start(root));
    for (id, kind, target) in rels {
        empty(
            &mut writer,
            "Relationship",
            &[("Id", *id), ("Type", *kind), ("Target", target.as_str())],
        );
    }
    end(&mut writer, "Relationships");
    writer.into_inner().into_inner()
}

fn write_paragraph<W: Write>(writer: &mut Writer<W>, paragraph: &Paragraph) {
    let props = &paragraph.props;
    start(writer, "w:p", &[]);
    start(writer, "w:pPr", &[]);

    if let Some(style) = props.style {
        empty(writer, "w:pStyle", &[("w:val", style)]);
    }
    if props.keep_next {
        empty(writer, "w:keepNext", &[]);
    }
    if props.page_break_before {
        empty(writer, "w:pageBreakBefore", &[]);
    }
    if let Some((color, size)) = props.border_bottom {
        let color = color.to_hex();
        let size = size.to_string();
        start(writer, "w:pBdr", &[]);
        empty(
            writer,
            "w:bottom",
            &[
                ("w:val", "single"),
                ("w:sz", size.as_str()),
                ("w:space", "1"),
                ("w:color", color.as_str()),
            ],
        );
        end(writer, "w:pBdr");
    }
    if let Some(fill) = props.shade {
        let fill = fill.to_hex();
        empty(
            writer,
            "w:shd",
            &[("w:val", "clear"), ("w:color", "auto"), ("w:fill", fill.as_str())],
        );
    }

    let before = twips(props.before);
    let after = twips(props.after);
    let line = props.line.map(|l| l.to_string());
    let mut spacing = vec![("w:before", before.as_str()), ("w:after", after.as_str())];
    if let Some(line) = &line {
        spacing.push(("w:line", line.as_str()));
        spacing.push(("w:lineRule", "auto"));
    }
    empty(writer, "w:spacing", &spacing);

    if let Some((left, hanging)) = props.indent {
        let left = left.to_string();
        let hanging_value = hanging.to_string();
        let mut ind = vec![("w:left", left.as_str())];
        if hanging > 0 {
            ind.push(("w:hanging", hanging_value.as_str()));
        }
        empty(writer, "w:ind", &ind);
    }
    if let Some(align) = props.align {
        let value = match align {
            Align::Left => "left",
            Align::Center => "center",
            Align::Justified => "both",
        };
        empty(writer, "w:jc", &[("w:val", value)]);
    }
    end(writer, "w:pPr");

    for inline in &paragraph.content {
        match inline {
            Inline::Text(text, run) => write_run(writer, text, run),
            Inline::Image { index, cx, cy } => write_image(writer, *index, *cx, *cy),
        }
    }

    end(writer, "w:p");
}

fn write_run<W: Write>(writer: &mut Writer<W>, text: &str, run: &RunProps) {
    start(writer, "w:r", &[]);
    start(writer, "w:rPr", &[]);
    write_fonts(writer, run.font);
    if run.bold {
        empty(writer, "w:b", &[]);
    }
    if run.italic {
        empty(writer, "w:i", &[]);
    }
    let color = run.color.to_hex();
    let size = half_points(run.size);
    empty(writer, "w:color", &[("w:val", color.as_str())]);
    empty(writer, "w:sz", &[("w:val", size.as_str())]);
    empty(writer, "w:szCs", &[("w:val", size.as_str())]);
    end(writer, "w:rPr");

    for (index, line) in text.split('\n').enumerate() {
        if index > 0 {
            empty(writer, "w:br", &[]);
        }
        let mut t = BytesStart::new("w:t");
        t.push_attribute(("xml:space", "preserve"));
        let _ = writer.write_event(Event::Start(t));
        let _ = writer.write_event(Event::Text(BytesText::new(line)));
        end(writer, "w:t");
    }

    end(writer, "w:r");
}

fn write_image<W: Write>(writer: &mut Writer<W>, index: usize, cx: u64, cy: u64) {
    let cx = cx.to_string();
    let cy = cy.to_string();
    let id = index.to_string();
    let rel_id = image_rel_id(index);
    let name = media_name(index);

    start(writer, "w:r", &[]);
    start(writer, "w:drawing", &[]);
    start(
        writer,
        "wp:inline",
        &[("distT", "0"), ("distB", "0"), ("distL", "0"), ("distR", "0")],
    );
    empty(writer, "wp:extent", &[("cx", cx.as_str()), ("cy", cy.as_str())]);
    empty(writer, "wp:docPr", &[("id", id.as_str()), ("name", "Cover")]);
    start(writer, "a:graphic", &[]);
    start(writer, "a:graphicData", &[("uri", NS_PIC)]);
    start(writer, "pic:pic", &[]);
    start(writer, "pic:nvPicPr", &[]);
    empty(writer, "pic:cNvPr", &[("id", "0"), ("name", name.as_str())]);
    empty(writer, "pic:cNvPicPr", &[]);
    end(writer, "pic:nvPicPr");
    start(writer, "pic:blipFill", &[]);
    empty(writer, "a:blip", &[("r:embed", rel_id.as_str())]);
    start(writer, "a:stretch", &[]);
    empty(writer, "a:fillRect", &[]);
    end(writer, "a:stretch");
    end(writer, "pic:blipFill");
    start(writer, "pic:spPr", &[]);
    start(writer, "a:xfrm", &[]);
    empty(writer, "a:off", &[("x", "0"), ("y", "0")]);
    empty(writer, "a:ext", &[("cx", cx.as_str()), ("cy", cy.as_str())]);
    end(writer, "a:xfrm");
    start(writer, "a:prstGeom", &[("prst", "rect")]);
    empty(writer, "a:avLst", &[]);
    end(writer, "a:prstGeom");
    end(writer, "pic:spPr");
    end(writer, "pic:pic");
    end(writer, "a:graphicData");
    end(writer, "a:graphic");
    end(writer, "wp:inline");
    end(writer, "w:drawing");
    end(writer, "w:r");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{StyleKind, walk};
    use crate::markdown::tokenize;
    use std::io::Read;
    use zip::ZipArchive;

    fn block(kind: BlockKind, style: StyleKind) -> LayoutBlock {
        LayoutBlock::new(kind, Typography::docx().style(style))
    }

    fn render(blocks: &[LayoutBlock]) -> ZipArchive<Cursor<Vec<u8>>> {
        let mut renderer = DocxRenderer::default();
        renderer.render_all(blocks).unwrap();
        let mut bytes = Vec::new();
        renderer.finish(&mut bytes).unwrap();
        ZipArchive::new(Cursor::new(bytes)).unwrap()
    }

    fn part(archive: &mut ZipArchive<Cursor<Vec<u8>>>, name: &str) -> String {
        let mut file = archive.by_name(name).unwrap();
        let mut content = String::new();
        file.read_to_string(&mut content).unwrap();
        content
    }

    /// Body of the run whose text is exactly `text`.
    fn run_with_text<'a>(document: &'a str, text: &str) -> &'a str {
        let needle = format!("<w:t xml:space=\"preserve\">{text}</w:t>");
        document
            .split("<w:r>")
            .find(|run| run.contains(&needle))
            .unwrap()
    }

    fn title_page() -> Vec<LayoutBlock> {
        vec![
            block(BlockKind::Title("My Book".to_string()), StyleKind::Title),
            block(BlockKind::AuthorLine("by Jane".to_string()), StyleKind::Author),
            block(BlockKind::Rule, StyleKind::Rule),
            block(BlockKind::PageBreak, StyleKind::Body),
        ]
    }

    #[test]
    fn test_package_parts() {
        let mut archive = render(&title_page());
        for name in [
            "[Content_Types].xml",
            "_rels/.rels",
            "docProps/core.xml",
            "word/document.xml",
            "word/styles.xml",
            "word/_rels/document.xml.rels",
        ] {
            assert!(archive.by_name(name).is_ok(), "missing {name}");
        }
        assert!(archive.by_name("word/media/cover.jpeg").is_err());

        let core = part(&mut archive, "docProps/core.xml");
        assert!(core.contains("<dc:title>My Book</dc:title>"));
        assert!(core.contains("<dc:creator>Jane</dc:creator>"));

        let styles = part(&mut archive, "word/styles.xml");
        assert!(styles.contains("w:styleId=\"Heading1\""));
        assert!(styles.contains("w:styleId=\"Heading3\""));
    }

    #[test]
    fn test_heading_and_styled_paragraph() {
        let mut blocks = title_page();
        blocks.push(block(
            BlockKind::ChapterTitle("Intro".to_string()),
            StyleKind::ChapterTitle,
        ));
        blocks.extend(walk(
            &tokenize("# Hello\n\nThis is **bold** and *italic* and `code`."),
            &Typography::docx(),
        ));

        let mut archive = render(&blocks);
        let document = part(&mut archive, "word/document.xml");

        assert!(document.contains("<w:pStyle w:val=\"Heading1\"/>"));
        assert!(run_with_text(&document, "My Book").contains("<w:b/>"));
        assert!(run_with_text(&document, "bold").contains("<w:b/>"));
        assert!(run_with_text(&document, "italic").contains("<w:i/>"));
        assert!(!run_with_text(&document, "This is ").contains("<w:b/>"));
        assert!(run_with_text(&document, "code").contains("w:ascii=\"Courier New\""));
        assert!(run_with_text(&document, "code").contains("<w:color w:val=\"d63384\"/>"));
        assert!(document.contains("<w:jc w:val=\"both\"/>"));
        assert!(document.contains("w:color=\"4f46e5\""));
        assert_eq!(document.matches("<w:pageBreakBefore/>").count(), 1);
    }

    #[test]
    fn test_lists_and_code() {
        let blocks = walk(
            &tokenize("1. first\n2. second\n\n```js\nlet x = 1;\n```\n"),
            &Typography::docx(),
        );
        let mut archive = render(&blocks);
        let document = part(&mut archive, "word/document.xml");

        assert!(document.contains(">1. </w:t>"));
        assert!(document.contains(">2. </w:t>"));
        assert!(document.contains("w:hanging=\"360\""));
        assert!(document.contains(">Language: js</w:t>"));
        assert!(document.contains("w:fill=\"f1f5f9\""));
        assert!(run_with_text(&document, "let x = 1;").contains("Courier New"));
    }

    #[test]
    fn test_text_is_escaped() {
        let blocks = vec![block(
            BlockKind::Paragraph {
                spans: vec![InlineSpan::plain("a < b & c")],
                in_list: false,
            },
            StyleKind::Body,
        )];
        let mut archive = render(&blocks);
        let document = part(&mut archive, "word/document.xml");
        assert!(document.contains("a &lt; b &amp; c"));
    }

    #[test]
    fn test_leading_and_repeated_page_breaks_collapse() {
        let blocks = vec![
            block(BlockKind::PageBreak, StyleKind::Body),
            block(BlockKind::Title("T".to_string()), StyleKind::Title),
            block(BlockKind::PageBreak, StyleKind::Body),
            block(BlockKind::PageBreak, StyleKind::Body),
        ];
        let mut archive = render(&blocks);
        let document = part(&mut archive, "word/document.xml");
        assert_eq!(document.matches("<w:pageBreakBefore/>").count(), 1);
    }

    #[test]
    fn test_cover_is_embedded() {
        let image = crate::formats::encode_cover(&{
            let img = image::RgbImage::from_pixel(800, 800, image::Rgb([1, 2, 3]));
            let mut data = Vec::new();
            img.write_to(&mut Cursor::new(&mut data), image::ImageFormat::Png)
                .unwrap();
            data
        })
        .unwrap();

        let mut blocks = vec![
            block(BlockKind::Cover(image), StyleKind::Cover),
            block(BlockKind::PageBreak, StyleKind::Body),
        ];
        blocks.extend(title_page());

        let mut archive = render(&blocks);
        assert!(archive.by_name("word/media/cover.jpeg").is_ok());

        let rels = part(&mut archive, "word/_rels/document.xml.rels");
        assert!(rels.contains("Target=\"media/cover.jpeg\""));

        let types = part(&mut archive, "[Content_Types].xml");
        assert!(types.contains("Extension=\"jpeg\""));

        let document = part(&mut archive, "word/document.xml");
        assert!(document.contains("r:embed=\"rIdImage1\""));
        // 400 px square at 9525 EMU per pixel.
        assert!(document.contains("cx=\"3810000\" cy=\"3810000\""));
    }
}
