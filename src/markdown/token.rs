//! Flat block token stream over `pulldown-cmark` events.

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Parser, Tag, TagEnd};
use std::ops::Range;

/// A structural unit of chapter markdown.
///
/// Open/inline/close triples form one logical block. `Inline` carries the raw
/// markdown source of the run so emphasis delimiters survive for the
/// inline segmenter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Heading start with its level (1-6).
    HeadingOpen(u8),
    /// Heading end.
    HeadingClose,
    /// Raw inline markdown of the enclosing heading or paragraph.
    Inline(String),
    /// Paragraph start.
    ParagraphOpen,
    /// Paragraph end.
    ParagraphClose,
    /// Unordered list start.
    BulletListOpen,
    /// Unordered list end.
    BulletListClose,
    /// Ordered list start.
    OrderedListOpen,
    /// Ordered list end.
    OrderedListClose,
    /// List item start.
    ListItemOpen,
    /// List item end.
    ListItemClose,
    /// Fenced or indented code block.
    Fence {
        /// Code text, newline separated.
        content: String,
        /// Info string after the opening fence, if any.
        info: Option<String>,
    },
    /// Block construct outside the supported grammar.
    Unsupported(&'static str),
}

/// Source range of the inline run being collected.
#[derive(Debug, Default)]
struct InlineRun {
    span: Option<Range<usize>>,
    /// Opened for a tight list item, which has no paragraph of its own.
    synthetic: bool,
}

impl InlineRun {
    fn synthetic() -> Self {
        Self {
            span: None,
            synthetic: true,
        }
    }

    fn extend(&mut self, range: Range<usize>) {
        self.span = Some(match self.span.take() {
            Some(span) => span.start.min(range.start)..span.end.max(range.end),
            None => range,
        });
    }

    fn text(&self, source: &str) -> String {
        let Some(span) = &self.span else {
            return String::new();
        };

        source
            .get(span.clone())
            .unwrap_or_default()
            .lines()
            .map(str::trim)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Tokenize chapter markdown.
pub fn tokenize(markdown: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut inline: Option<InlineRun> = None;
    let mut code: Option<(String, Option<String>)> = None;
    let mut item_depth = 0usize;

    for (event, range) in Parser::new(markdown).into_offset_iter() {
        if code.is_some() {
            match event {
                Event::Text(text) => {
                    if let Some((content, _)) = code.as_mut() {
                        content.push_str(&text);
                    }
                }
                Event::End(TagEnd::CodeBlock) => {
                    if let Some((content, info)) = code.take() {
                        tokens.push(Token::Fence { content, info });
                    }
                }
                _ => {}
            }
            continue;
        }

        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                close_synthetic(&mut tokens, &mut inline, markdown);
                tokens.push(Token::HeadingOpen(heading_level(level)));
                inline = Some(InlineRun::default());
            }
            Event::End(TagEnd::Heading { .. }) => {
                flush_inline(&mut tokens, &mut inline, markdown);
                tokens.push(Token::HeadingClose);
            }
            Event::Start(Tag::Paragraph) => {
                close_synthetic(&mut tokens, &mut inline, markdown);
                tokens.push(Token::ParagraphOpen);
                inline = Some(InlineRun::default());
            }
            Event::End(TagEnd::Paragraph) => {
                flush_inline(&mut tokens, &mut inline, markdown);
                tokens.push(Token::ParagraphClose);
            }
            Event::Start(Tag::List(start)) => {
                close_synthetic(&mut tokens, &mut inline, markdown);
                tokens.push(match start {
                    Some(_) => Token::OrderedListOpen,
                    None => Token::BulletListOpen,
                });
            }
            Event::End(TagEnd::List(ordered)) => {
                close_synthetic(&mut tokens, &mut inline, markdown);
                tokens.push(if ordered {
                    Token::OrderedListClose
                } else {
                    Token::BulletListClose
                });
            }
            Event::Start(Tag::Item) => {
                close_synthetic(&mut tokens, &mut inline, markdown);
                item_depth += 1;
                tokens.push(Token::ListItemOpen);
            }
            Event::End(TagEnd::Item) => {
                close_synthetic(&mut tokens, &mut inline, markdown);
                item_depth = item_depth.saturating_sub(1);
                tokens.push(Token::ListItemClose);
            }
            Event::Start(Tag::CodeBlock(kind)) => {
                close_synthetic(&mut tokens, &mut inline, markdown);
                let info = match kind {
                    CodeBlockKind::Fenced(info) => {
                        let info = info.trim();
                        (!info.is_empty()).then(|| info.to_string())
                    }
                    CodeBlockKind::Indented => None,
                };
                code = Some((String::new(), info));
            }
            Event::Start(Tag::BlockQuote { .. }) => {
                close_synthetic(&mut tokens, &mut inline, markdown);
                tokens.push(Token::Unsupported("blockquote_open"));
            }
            Event::End(TagEnd::BlockQuote { .. }) => {
                tokens.push(Token::Unsupported("blockquote_close"));
            }
            Event::Start(Tag::HtmlBlock) => {
                close_synthetic(&mut tokens, &mut inline, markdown);
                tokens.push(Token::Unsupported("html_block"));
            }
            Event::Start(Tag::Table { .. }) => {
                close_synthetic(&mut tokens, &mut inline, markdown);
                tokens.push(Token::Unsupported("table"));
            }
            Event::Rule => {
                close_synthetic(&mut tokens, &mut inline, markdown);
                tokens.push(Token::Unsupported("hr"));
            }
            event if is_inline_event(&event) => {
                if inline.is_none() && item_depth > 0 {
                    tokens.push(Token::ParagraphOpen);
                    inline = Some(InlineRun::synthetic());
                }
                if let Some(run) = inline.as_mut() {
                    run.extend(range);
                }
            }
            _ => {}
        }
    }

    close_synthetic(&mut tokens, &mut inline, markdown);
    tokens
}

fn heading_level(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

fn is_inline_event(event: &Event<'_>) -> bool {
    match event {
        Event::Text(_)
        | Event::Code(_)
        | Event::InlineHtml(_)
        | Event::SoftBreak
        | Event::HardBreak
        | Event::FootnoteReference(_)
        | Event::TaskListMarker(_) => true,
        Event::Start(tag) => matches!(
            tag,
            Tag::Emphasis
                | Tag::Strong
                | Tag::Strikethrough
                | Tag::Link { .. }
                | Tag::Image { .. }
        ),
        Event::End(tag) => matches!(
            tag,
            TagEnd::Emphasis
                | TagEnd::Strong
                | TagEnd::Strikethrough
                | TagEnd::Link { .. }
                | TagEnd::Image { .. }
        ),
        _ => false,
    }
}

fn flush_inline(tokens: &mut Vec<Token>, inline: &mut Option<InlineRun>, source: &str) {
    if let Some(run) = inline.take() {
        tokens.push(Token::Inline(run.text(source)));
    }
}

fn close_synthetic(tokens: &mut Vec<Token>, inline: &mut Option<InlineRun>, source: &str) {
    if inline.as_ref().is_some_and(|run| run.synthetic) {
        flush_inline(tokens, inline, source);
        tokens.push(Token::ParagraphClose);
    }
}
