//! Per-renderer style tables.

use super::block::{Align, BlockStyle, Rgb};

const INK: Rgb = Rgb::hex(0x1a202c);
const SLATE: Rgb = Rgb::hex(0x4a5568);
const GRAPHITE: Rgb = Rgb::hex(0x2d3748);
const INDIGO: Rgb = Rgb::hex(0x4f46e5);

const fn style(
    font: &'static str,
    size: f32,
    space_before: f32,
    space_after: f32,
    color: Rgb,
    align: Align,
) -> BlockStyle {
    BlockStyle {
        font,
        size,
        space_before,
        space_after,
        color,
        align,
    }
}

/// Style slot looked up by the layout walker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StyleKind {
    /// Cover page.
    Cover,
    /// Book title.
    Title,
    /// Book subtitle.
    Subtitle,
    /// Author line.
    Author,
    /// Title page rule.
    Rule,
    /// Chapter heading.
    ChapterTitle,
    /// Level 1 heading.
    H1,
    /// Level 2 heading.
    H2,
    /// Level 3 heading (and anything deeper).
    H3,
    /// Body paragraph.
    Body,
    /// Paragraph inside a list.
    ListBody,
    /// Code line.
    Code,
    /// Gap after a list.
    Spacer,
}

impl StyleKind {
    /// Heading slot for a markdown heading level.
    pub fn heading(level: u8) -> Self {
        match level {
            1 => StyleKind::H1,
            2 => StyleKind::H2,
            _ => StyleKind::H3,
        }
    }
}

/// Font families for each role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontRoles {
    /// Titles and headings.
    pub heading: &'static str,
    /// Running text.
    pub body: &'static str,
    /// Bold runs.
    pub bold: &'static str,
    /// Italic runs.
    pub italic: &'static str,
    /// Inline code and code blocks.
    pub code: &'static str,
}

/// Immutable style table for one export.
#[derive(Debug, Clone, PartialEq)]
pub struct Typography {
    /// Font families.
    pub fonts: FontRoles,
    /// Text color of inline code runs.
    pub inline_code_color: Rgb,
    /// Fill behind code block lines.
    pub code_background: Rgb,
    /// Size of the code block language label.
    pub code_label_size: f32,
    /// Color of the code block language label.
    pub code_label_color: Rgb,
    /// Stroke width of the title page rule.
    pub rule_width: f32,
    title: BlockStyle,
    subtitle: BlockStyle,
    author: BlockStyle,
    rule: BlockStyle,
    chapter_title: BlockStyle,
    h1: BlockStyle,
    h2: BlockStyle,
    h3: BlockStyle,
    body: BlockStyle,
    list_body: BlockStyle,
    code: BlockStyle,
    spacer: BlockStyle,
}

impl Typography {
    /// Paginated PDF preset using the standard Type 1 fonts.
    pub fn pdf() -> Self {
        let fonts = FontRoles {
            heading: "Helvetica-Bold",
            body: "Helvetica",
            bold: "Helvetica-Bold",
            italic: "Helvetica-Oblique",
            code: "Courier",
        };

        Self {
            fonts,
            inline_code_color: Rgb::hex(0xd63384),
            code_background: Rgb::hex(0x1e293b),
            code_label_size: 8.0,
            code_label_color: Rgb::hex(0x64748b),
            rule_width: 2.0,
            title: style(fonts.heading, 32.0, 160.0, 18.0, INK, Align::Center),
            subtitle: style(fonts.body, 20.0, 0.0, 14.0, SLATE, Align::Center),
            author: style(fonts.body, 16.0, 24.0, 14.0, GRAPHITE, Align::Center),
            rule: style(fonts.body, 11.0, 18.0, 18.0, INDIGO, Align::Center),
            chapter_title: style(fonts.heading, 24.0, 0.0, 22.0, INK, Align::Left),
            h1: style(fonts.heading, 18.0, 16.0, 8.0, INK, Align::Left),
            h2: style(fonts.heading, 16.0, 14.0, 6.0, INK, Align::Left),
            h3: style(fonts.heading, 14.0, 12.0, 6.0, INK, Align::Left),
            body: style(fonts.body, 11.0, 0.0, 8.0, INK, Align::Left),
            list_body: style(fonts.body, 11.0, 0.0, 4.0, INK, Align::Left),
            code: style(fonts.code, 9.0, 0.0, 0.0, Rgb::hex(0xe2e8f0), Align::Left),
            spacer: style(fonts.body, 11.0, 0.0, 8.0, INK, Align::Left),
        }
    }

    /// Flow DOCX preset. Spacing converts to twips at 20 per point.
    pub fn docx() -> Self {
        let fonts = FontRoles {
            heading: "Inter",
            body: "Charter",
            bold: "Charter",
            italic: "Charter",
            code: "Courier New",
        };

        Self {
            fonts,
            inline_code_color: Rgb::hex(0xd63384),
            code_background: Rgb::hex(0xf1f5f9),
            code_label_size: 8.0,
            code_label_color: Rgb::hex(0x64748b),
            rule_width: 1.5,
            title: style(fonts.heading, 32.0, 100.0, 20.0, INK, Align::Center),
            subtitle: style(fonts.heading, 20.0, 0.0, 20.0, SLATE, Align::Center),
            author: style(fonts.body, 18.0, 0.0, 10.0, GRAPHITE, Align::Center),
            rule: style(fonts.body, 12.0, 20.0, 0.0, INDIGO, Align::Center),
            chapter_title: style(fonts.heading, 24.0, 20.0, 15.0, INK, Align::Left),
            h1: style(fonts.heading, 20.0, 15.0, 7.5, INK, Align::Left),
            h2: style(fonts.heading, 18.0, 15.0, 7.5, INK, Align::Left),
            h3: style(fonts.heading, 16.0, 15.0, 7.5, INK, Align::Left),
            body: style(fonts.body, 12.0, 10.0, 10.0, INK, Align::Justified),
            list_body: style(fonts.body, 12.0, 5.0, 5.0, INK, Align::Left),
            code: style(fonts.code, 10.0, 0.0, 0.0, GRAPHITE, Align::Left),
            spacer: style(fonts.body, 12.0, 0.0, 10.0, INK, Align::Left),
        }
    }

    /// Look up the style for a slot.
    pub fn style(&self, kind: StyleKind) -> BlockStyle {
        match kind {
            StyleKind::Title => self.title,
            StyleKind::Subtitle => self.subtitle,
            StyleKind::Author => self.author,
            StyleKind::Rule => self.rule,
            StyleKind::ChapterTitle => self.chapter_title,
            StyleKind::H1 => self.h1,
            StyleKind::H2 => self.h2,
            StyleKind::H3 => self.h3,
            StyleKind::Body | StyleKind::Cover => self.body,
            StyleKind::ListBody => self.list_body,
            StyleKind::Code => self.code,
            StyleKind::Spacer => self.spacer,
        }
    }
}
