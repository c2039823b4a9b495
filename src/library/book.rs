//! Book project model.

use crate::db::now_timestamp;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// A book project owned by one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    /// Unique identifier for the book.
    pub id: String,

    /// Owning user. Fixed at creation.
    pub owner_id: String,

    /// Book title.
    pub title: String,

    /// Optional subtitle shown under the title.
    pub subtitle: Option<String>,

    /// Author line as typed by the user.
    pub author: String,

    /// Cover reference: `/uploads/<file>` or an external URL.
    pub cover_image: Option<String>,

    /// Chapters in reading order.
    pub chapters: Vec<Chapter>,

    /// Creation timestamp.
    pub created_at: i64,

    /// Last update timestamp.
    pub updated_at: i64,
}

impl Book {
    /// Create an empty book for `owner_id`.
    pub fn new(owner_id: &str, title: &str, author: &str) -> Self {
        let now = now_timestamp();
        Self {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            title: title.to_string(),
            subtitle: None,
            author: author.to_string(),
            cover_image: None,
            chapters: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether `user_id` owns this book.
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.owner_id == user_id
    }

    /// Title reduced to ASCII letters and digits, everything else replaced by `_`.
    pub fn file_stem(&self) -> String {
        self.title
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect()
    }

    /// Subtitle, if set to something other than whitespace.
    pub fn subtitle_text(&self) -> Option<&str> {
        self.subtitle
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Give every chapter without an id a fresh one.
    pub fn assign_chapter_ids(&mut self) {
        for chapter in &mut self.chapters {
            chapter.ensure_id();
        }
    }

    /// First chapter id that appears more than once.
    pub fn duplicate_chapter_id(&self) -> Option<&str> {
        let mut seen = HashSet::new();
        self.chapters
            .iter()
            .map(|chapter| chapter.id.as_str())
            .find(|id| !seen.insert(*id))
    }
}

/// One chapter of a book.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Chapter {
    /// Stable chapter id. Empty until assigned.
    #[serde(default)]
    pub id: String,

    /// Chapter title.
    pub title: String,

    /// Outline text.
    #[serde(default)]
    pub description: Option<String>,

    /// Markdown body.
    #[serde(default)]
    pub content: String,
}

impl Chapter {
    /// Create a chapter with a fresh id.
    pub fn new(title: &str, content: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            description: None,
            content: content.to_string(),
        }
    }

    fn ensure_id(&mut self) {
        if self.id.trim().is_empty() {
            self.id = Uuid::new_v4().to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_chapter_id() {
        let mut book = Book::new("u1", "T", "A");
        book.chapters = vec![
            Chapter::new("One", ""),
            Chapter::new("Two", ""),
            Chapter::new("Three", ""),
        ];
        book.chapters[0].id = "c1".to_string();
        book.chapters[2].id = "c1".to_string();
        book.assign_chapter_ids();
        assert_eq!(book.duplicate_chapter_id(), Some("c1"));

        book.chapters[2].id = "c3".to_string();
        assert_eq!(book.duplicate_chapter_id(), None);
    }

    #[test]
    fn test_file_stem() {
        let mut book = Book::new("u1", "My Book: Vol 1!", "Ada");
        assert_eq!(book.file_stem(), "My_Book__Vol_1_");

        book.title = "Café".to_string();
        assert_eq!(book.file_stem(), "Caf_");
    }

    #[test]
    fn test_subtitle_text() {
        let mut book = Book::new("u1", "T", "A");
        assert_eq!(book.subtitle_text(), None);
        book.subtitle = Some("   ".to_string());
        assert_eq!(book.subtitle_text(), None);
        book.subtitle = Some(" Part two ".to_string());
        assert_eq!(book.subtitle_text(), Some("Part two"));
    }

    #[test]
    fn test_assign_chapter_ids() {
        let mut book = Book::new("u1", "T", "A");
        let kept = Chapter::new("One", "");
        let kept_id = kept.id.clone();
        book.chapters = vec![
            kept,
            Chapter {
                title: "Two".to_string(),
                ..Chapter::default()
            },
        ];

        book.assign_chapter_ids();
        assert_eq!(book.chapters[0].id, kept_id);
        assert!(!book.chapters[1].id.is_empty());
        assert_ne!(book.chapters[1].id, kept_id);
    }

    #[test]
    fn test_chapter_deserialize_defaults() {
        let chapter: Chapter = serde_json::from_str(r#"{"title": "Intro"}"#).unwrap();
        assert!(chapter.id.is_empty());
        assert!(chapter.content.is_empty());
        assert!(chapter.description.is_none());
    }
}
