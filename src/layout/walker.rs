//! Token stream to layout block conversion.
//!
//! The walker keeps one cursor into the token slice and a small list state.
//! Each handler consumes a variable number of tokens; a handler that finds an
//! unexpected shape reports it and the walk resumes one token further on.

use super::block::{BlockKind, LayoutBlock, ListMarker};
use super::typography::{StyleKind, Typography};
use crate::error::{AppError, Result};
use crate::markdown::{Token, plain_text, segment};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ListKind {
    #[default]
    None,
    Bullet,
    Ordered,
}

/// List state for a single walk.
#[derive(Debug, Default)]
struct ListState {
    inside: ListKind,
    counter: u32,
    /// A list item is open and has not produced its marker yet.
    item_open: bool,
}

struct Walker<'a> {
    tokens: &'a [Token],
    typography: &'a Typography,
    list: ListState,
    blocks: Vec<LayoutBlock>,
}

/// Convert a token stream into layout blocks.
///
/// The walk never fails: malformed shapes are logged and skipped.
pub fn walk(tokens: &[Token], typography: &Typography) -> Vec<LayoutBlock> {
    let mut walker = Walker {
        tokens,
        typography,
        list: ListState::default(),
        blocks: Vec::new(),
    };

    let mut cursor = 0;
    while cursor < tokens.len() {
        match walker.step(cursor) {
            Ok(consumed) => cursor += consumed.max(1),
            Err(err) => {
                tracing::warn!(cursor, error = %err, "Skipping malformed markdown token");
                cursor += 1;
            }
        }
    }

    walker.blocks
}

impl Walker<'_> {
    /// Handle the token at `cursor` and return how many tokens it consumed.
    fn step(&mut self, cursor: usize) -> Result<usize> {
        let tokens = self.tokens;
        match &tokens[cursor] {
            Token::HeadingOpen(level) => self.heading(cursor, *level),
            Token::ParagraphOpen => self.paragraph(cursor),
            Token::BulletListOpen => {
                self.list = ListState {
                    inside: ListKind::Bullet,
                    ..ListState::default()
                };
                Ok(1)
            }
            Token::OrderedListOpen => {
                self.list = ListState {
                    inside: ListKind::Ordered,
                    counter: 1,
                    item_open: false,
                };
                Ok(1)
            }
            Token::BulletListClose | Token::OrderedListClose => {
                self.list = ListState::default();
                self.push(BlockKind::Spacer, StyleKind::Spacer);
                Ok(1)
            }
            Token::ListItemOpen => {
                self.list.item_open = true;
                Ok(1)
            }
            Token::ListItemClose => {
                self.list.item_open = false;
                Ok(1)
            }
            Token::Fence { content, info } => {
                self.code_block(content, info.as_deref());
                Ok(1)
            }
            Token::Inline(_) => Err(AppError::MalformedInput(
                "inline run outside a heading or paragraph".to_string(),
            )),
            Token::Unsupported(kind) => {
                tracing::debug!(kind, "Ignoring unsupported markdown construct");
                Ok(1)
            }
            Token::HeadingClose | Token::ParagraphClose => Ok(1),
        }
    }

    fn heading(&mut self, cursor: usize, level: u8) -> Result<usize> {
        let tokens = self.tokens;
        let Some(Token::Inline(text)) = tokens.get(cursor + 1) else {
            return Err(AppError::MalformedInput(format!(
                "heading level {level} without inline content"
            )));
        };

        let text = plain_text(&segment(text));
        if !text.trim().is_empty() {
            let level = level.clamp(1, 3);
            self.push(BlockKind::Heading { level, text }, StyleKind::heading(level));
        }

        Ok(self.consumed_with_close(cursor, Token::HeadingClose))
    }

    fn paragraph(&mut self, cursor: usize) -> Result<usize> {
        let tokens = self.tokens;
        let Some(Token::Inline(text)) = tokens.get(cursor + 1) else {
            return Err(AppError::MalformedInput(
                "paragraph without inline content".to_string(),
            ));
        };

        let spans = segment(text);
        if spans.iter().any(|span| !span.text.trim().is_empty()) {
            if self.list.item_open {
                let marker = match self.list.inside {
                    ListKind::Ordered => {
                        let n = self.list.counter;
                        self.list.counter += 1;
                        ListMarker::Ordinal(n)
                    }
                    ListKind::Bullet | ListKind::None => ListMarker::Bullet,
                };
                self.list.item_open = false;
                self.push(BlockKind::ListItem { marker, spans }, StyleKind::ListBody);
            } else if self.list.inside != ListKind::None {
                self.push(
                    BlockKind::Paragraph {
                        spans,
                        in_list: true,
                    },
                    StyleKind::ListBody,
                );
            } else {
                self.push(
                    BlockKind::Paragraph {
                        spans,
                        in_list: false,
                    },
                    StyleKind::Body,
                );
            }
        }

        Ok(self.consumed_with_close(cursor, Token::ParagraphClose))
    }

    fn code_block(&mut self, content: &str, info: Option<&str>) {
        let language = info
            .and_then(|info| info.split_whitespace().next())
            .map(str::to_string);
        let lines: Vec<&str> = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .collect();
        let count = lines.len();

        for (index, line) in lines.into_iter().enumerate() {
            self.push(
                BlockKind::CodeLine {
                    text: line.trim_end().to_string(),
                    language: language.clone(),
                    index,
                    count,
                },
                StyleKind::Code,
            );
        }
    }

    /// Open + inline, plus the closing token when it is where it should be.
    fn consumed_with_close(&self, cursor: usize, close: Token) -> usize {
        if self.tokens.get(cursor + 2) == Some(&close) {
            3
        } else {
            tracing::warn!(cursor, "Block is missing its closing token");
            2
        }
    }

    fn push(&mut self, kind: BlockKind, style: StyleKind) {
        self.blocks
            .push(LayoutBlock::new(kind, self.typography.style(style)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::{InlineSpan, SpanKind, tokenize};

    fn layout(markdown: &str) -> Vec<BlockKind> {
        walk(&tokenize(markdown), &Typography::pdf())
            .into_iter()
            .map(|block| block.kind)
            .collect()
    }

    #[test]
    fn test_heading_and_paragraph() {
        let blocks = layout("# Hello\n\nThis is **bold** and *italic*.");
        assert_eq!(
            blocks,
            vec![
                BlockKind::Heading {
                    level: 1,
                    text: "Hello".to_string()
                },
                BlockKind::Paragraph {
                    spans: vec![
                        InlineSpan::plain("This is "),
                        InlineSpan::new("bold", SpanKind::Bold),
                        InlineSpan::plain(" and "),
                        InlineSpan::new("italic", SpanKind::Italic),
                        InlineSpan::plain("."),
                    ],
                    in_list: false,
                },
            ]
        );
    }

    #[test]
    fn test_heading_markers_are_stripped() {
        let blocks = layout("## The **big** `idea`\n\n##### Deep");
        assert_eq!(
            blocks,
            vec![
                BlockKind::Heading {
                    level: 2,
                    text: "The big idea".to_string()
                },
                BlockKind::Heading {
                    level: 3,
                    text: "Deep".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_heading_style_follows_level() {
        let typography = Typography::pdf();
        let blocks = walk(&tokenize("### Small"), &typography);
        assert_eq!(blocks[0].style, typography.style(StyleKind::H3));
    }

    #[test]
    fn test_ordered_list_counters_reset() {
        let blocks = layout("1. a\n2. b\n\npara\n\n1. c\n");
        let markers: Vec<ListMarker> = blocks
            .iter()
            .filter_map(|block| match block {
                BlockKind::ListItem { marker, .. } => Some(*marker),
                _ => None,
            })
            .collect();
        assert_eq!(
            markers,
            vec![
                ListMarker::Ordinal(1),
                ListMarker::Ordinal(2),
                ListMarker::Ordinal(1)
            ]
        );

        let spacers = blocks
            .iter()
            .filter(|block| matches!(block, BlockKind::Spacer))
            .count();
        assert_eq!(spacers, 2);
    }

    #[test]
    fn test_ordinals_ignore_source_numbers() {
        let blocks = layout("3. x\n7. y\n");
        assert!(matches!(
            blocks[0],
            BlockKind::ListItem {
                marker: ListMarker::Ordinal(1),
                ..
            }
        ));
        assert!(matches!(
            blocks[1],
            BlockKind::ListItem {
                marker: ListMarker::Ordinal(2),
                ..
            }
        ));
    }

    #[test]
    fn test_bullet_list_then_spacer() {
        let blocks = layout("- one\n- **two**\n");
        assert_eq!(
            blocks,
            vec![
                BlockKind::ListItem {
                    marker: ListMarker::Bullet,
                    spans: vec![InlineSpan::plain("one")],
                },
                BlockKind::ListItem {
                    marker: ListMarker::Bullet,
                    spans: vec![InlineSpan::new("two", SpanKind::Bold)],
                },
                BlockKind::Spacer,
            ]
        );
    }

    #[test]
    fn test_loose_item_second_paragraph_is_list_body() {
        let typography = Typography::pdf();
        let blocks = walk(&tokenize("- first\n\n  second\n\n- third\n"), &typography);
        assert!(matches!(blocks[0].kind, BlockKind::ListItem { .. }));
        assert!(matches!(
            blocks[1].kind,
            BlockKind::Paragraph { in_list: true, .. }
        ));
        assert_eq!(blocks[1].style, typography.style(StyleKind::ListBody));
        assert!(matches!(blocks[2].kind, BlockKind::ListItem { .. }));
    }

    #[test]
    fn test_code_block_drops_blank_lines() {
        let blocks = layout("```rust extra\nfn main() {\n\n    run();\n}\n```\n");
        assert_eq!(blocks.len(), 3);
        assert_eq!(
            blocks[1],
            BlockKind::CodeLine {
                text: "    run();".to_string(),
                language: Some("rust".to_string()),
                index: 1,
                count: 3,
            }
        );
    }

    #[test]
    fn test_empty_chapter_has_no_blocks() {
        assert!(layout("").is_empty());
        assert!(layout("\n\n   \n").is_empty());
    }

    #[test]
    fn test_malformed_tokens_are_skipped() {
        let tokens = vec![
            Token::HeadingOpen(2),
            Token::ParagraphOpen,
            Token::Inline("kept".to_string()),
            Token::ParagraphClose,
            Token::Inline("stray".to_string()),
            Token::Unsupported("table"),
            Token::ParagraphOpen,
        ];
        let blocks = walk(&tokens, &Typography::pdf());
        assert_eq!(blocks.len(), 1);
        assert_eq!(
            blocks[0].kind,
            BlockKind::Paragraph {
                spans: vec![InlineSpan::plain("kept")],
                in_list: false,
            }
        );
    }

    #[test]
    fn test_missing_close_still_emits() {
        let tokens = vec![
            Token::HeadingOpen(1),
            Token::Inline("Open".to_string()),
            Token::ParagraphOpen,
            Token::Inline("body".to_string()),
            Token::ParagraphClose,
        ];
        let blocks = walk(&tokens, &Typography::docx());
        assert_eq!(blocks.len(), 2);
    }
}
