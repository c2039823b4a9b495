//! Application state shared across handlers.

use crate::auth::AuthService;
use crate::config::Config;
use crate::db::{Database, User};
use crate::error::{AppError, Result};
use crate::export::ExportSettings;
use crate::formats::UPLOADS_PREFIX;
use crate::library::Book;
use std::path::PathBuf;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<Config>,
    /// Database connection.
    pub db: Database,
    /// Authentication service.
    pub auth: Arc<AuthService>,
}

impl AppState {
    /// Create new application state with database.
    pub fn new_with_db(config: Config, db: Database, auth: AuthService) -> Self {
        Self {
            config: Arc::new(config),
            db,
            auth: Arc::new(auth),
        }
    }

    /// Settings handed to every export.
    pub fn export_settings(&self) -> ExportSettings {
        ExportSettings::from_config(&self.config)
    }

    /// Load a book and check that `user` owns it.
    pub fn owned_book(&self, user: &User, book_id: &str) -> Result<Book> {
        let book = self
            .db
            .get_book(book_id)?
            .ok_or_else(|| AppError::NotFound(format!("Book not found: {}", book_id)))?;

        if !book.is_owned_by(&user.id) {
            return Err(AppError::Forbidden(format!(
                "Not allowed to access book: {}",
                book_id
            )));
        }

        Ok(book)
    }

    /// Path of a stored upload, or `None` for names that could leave the
    /// uploads directory.
    pub fn upload_path(&self, file_name: &str) -> Option<PathBuf> {
        let valid = !file_name.is_empty()
            && file_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
            && !file_name.starts_with('.');

        valid.then(|| self.config.uploads.dir.join(file_name))
    }

    /// Store cover bytes under a fresh name and return its `/uploads/` reference.
    pub fn store_cover(&self, data: &[u8], extension: &str) -> Result<String> {
        std::fs::create_dir_all(&self.config.uploads.dir)?;

        let file_name = format!("{}.{}", uuid::Uuid::new_v4(), extension);
        std::fs::write(self.config.uploads.dir.join(&file_name), data)?;

        Ok(format!("{}{}", UPLOADS_PREFIX, file_name))
    }

    /// Check a cover reference sent in a book body.
    ///
    /// An `/uploads/` reference is accepted only when it is already the book's
    /// cover; stored files are attached through the cover endpoint alone.
    pub fn check_cover_reference(
        &self,
        current: Option<&str>,
        requested: Option<&str>,
    ) -> Result<()> {
        match requested {
            Some(reference)
                if reference.starts_with(UPLOADS_PREFIX) && current != Some(reference) =>
            {
                Err(AppError::Validation(
                    "Uploaded covers must be set through the cover endpoint".to_string(),
                ))
            }
            _ => Ok(()),
        }
    }

    /// Remove a previously stored cover. External URLs are left alone.
    pub fn remove_cover(&self, reference: Option<&str>) {
        let Some(file_name) = reference.and_then(|r| r.strip_prefix(UPLOADS_PREFIX)) else {
            return;
        };

        if let Some(path) = self.upload_path(file_name)
            && let Err(e) = std::fs::remove_file(&path)
        {
            tracing::debug!(path = %path.display(), error = %e, "Failed to remove cover");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with_uploads(dir: &std::path::Path) -> AppState {
        let mut config = Config::default();
        config.uploads.dir = dir.to_path_buf();
        let db = Database::open_memory().unwrap();
        let auth = AuthService::new(db.clone(), 30, true);
        AppState::new_with_db(config, db, auth)
    }

    #[test]
    fn test_upload_path_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_with_uploads(dir.path());

        assert!(state.upload_path("cover.png").is_some());
        assert!(state.upload_path("../secret").is_none());
        assert!(state.upload_path("a/b.png").is_none());
        assert!(state.upload_path(".hidden").is_none());
        assert!(state.upload_path("").is_none());
    }

    #[test]
    fn test_store_and_remove_cover() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_with_uploads(dir.path());

        let reference = state.store_cover(b"img", "png").unwrap();
        assert!(reference.starts_with("/uploads/"));
        assert!(reference.ends_with(".png"));

        let file_name = reference.trim_start_matches("/uploads/");
        let path = dir.path().join(file_name);
        assert!(path.is_file());

        state.remove_cover(Some(&reference));
        assert!(!path.exists());

        // Remote references are not touched.
        state.remove_cover(Some("https://example.com/cover.png"));
    }

    #[test]
    fn test_foreign_upload_cannot_be_claimed() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_with_uploads(dir.path());

        let alice_cover = state.store_cover(b"img", "png").unwrap();
        let path = dir.path().join(alice_cover.trim_start_matches("/uploads/"));

        // Another book pointing at the stored file is refused.
        assert!(matches!(
            state.check_cover_reference(None, Some(&alice_cover)),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            state.check_cover_reference(Some("/uploads/mine.png"), Some(&alice_cover)),
            Err(AppError::Validation(_))
        ));
        assert!(path.is_file());

        // Keeping the current cover, clearing it or using a remote URL is fine.
        state
            .check_cover_reference(Some(&alice_cover), Some(&alice_cover))
            .unwrap();
        state.check_cover_reference(Some(&alice_cover), None).unwrap();
        state
            .check_cover_reference(None, Some("https://example.com/cover.png"))
            .unwrap();
    }
}
