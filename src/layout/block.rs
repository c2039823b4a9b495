use crate::markdown::InlineSpan;

/// An sRGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Build a color from a `0xRRGGBB` literal.
    pub const fn hex(value: u32) -> Self {
        Self((value >> 16) as u8, (value >> 8) as u8, value as u8)
    }

    /// Lowercase `rrggbb` form used by WordprocessingML attributes.
    pub fn to_hex(self) -> String {
        format!("{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }

    /// Components scaled to `0.0..=1.0` for PDF color operators.
    pub fn components(self) -> [f32; 3] {
        [
            f32::from(self.0) / 255.0,
            f32::from(self.1) / 255.0,
            f32::from(self.2) / 255.0,
        ]
    }
}

/// Horizontal alignment of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    /// Flush left.
    Left,
    /// Centered between the margins.
    Center,
    /// Flush on both edges (flow renderers only).
    Justified,
}

/// Resolved presentation of a block.
///
/// Sizes and spacing are in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockStyle {
    /// Font family name for the block's base text.
    pub font: &'static str,
    /// Font size.
    pub size: f32,
    /// Space above the block.
    pub space_before: f32,
    /// Space below the block.
    pub space_after: f32,
    /// Base text color.
    pub color: Rgb,
    /// Horizontal alignment.
    pub align: Align,
}

/// A cover image ready for embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverImage {
    /// Baseline JPEG bytes.
    pub jpeg: Vec<u8>,
    /// Pixel width.
    pub width: u32,
    /// Pixel height.
    pub height: u32,
}

impl CoverImage {
    /// Scale the image to fit inside a box, keeping its aspect ratio.
    pub fn fit_within(&self, max_width: f32, max_height: f32) -> (f32, f32) {
        if self.width == 0 || self.height == 0 {
            return (0.0, 0.0);
        }
        let (width, height) = (self.width as f32, self.height as f32);
        let scale = (max_width / width).min(max_height / height);
        (width * scale, height * scale)
    }
}

/// Marker placed before a list item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMarker {
    /// Unordered list bullet.
    Bullet,
    /// Ordered list number, starting at 1.
    Ordinal(u32),
}

impl ListMarker {
    /// Text drawn before the item's spans.
    pub fn label(self) -> String {
        match self {
            ListMarker::Bullet => "\u{2022} ".to_string(),
            ListMarker::Ordinal(n) => format!("{n}. "),
        }
    }
}

/// What a layout block draws.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockKind {
    /// Full-page cover image.
    Cover(CoverImage),
    /// Book title.
    Title(String),
    /// Book subtitle.
    Subtitle(String),
    /// "by Author" line.
    AuthorLine(String),
    /// Horizontal rule closing the title page.
    Rule,
    /// Chapter heading.
    ChapterTitle(String),
    /// Section heading inside a chapter.
    Heading {
        /// Heading level, clamped to 1..=3.
        level: u8,
        /// Heading text with inline markers removed.
        text: String,
    },
    /// Body paragraph.
    Paragraph {
        /// Inline runs.
        spans: Vec<InlineSpan>,
        /// Continuation paragraph of a list item.
        in_list: bool,
    },
    /// First paragraph of a list item.
    ListItem {
        /// Bullet or ordinal.
        marker: ListMarker,
        /// Inline runs.
        spans: Vec<InlineSpan>,
    },
    /// One non-blank line of a code block.
    CodeLine {
        /// Line text, indentation preserved.
        text: String,
        /// Language hint from the fence info string.
        language: Option<String>,
        /// Position of the line within its block.
        index: usize,
        /// Number of lines in the block.
        count: usize,
    },
    /// Vertical gap after a list.
    Spacer,
    /// Forced page break.
    PageBreak,
}

/// A renderer-agnostic unit of output.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutBlock {
    /// What to draw.
    pub kind: BlockKind,
    /// How to draw it.
    pub style: BlockStyle,
}

impl LayoutBlock {
    /// Pair a kind with its style.
    pub fn new(kind: BlockKind, style: BlockStyle) -> Self {
        Self { kind, style }
    }
}
