//! ebook-studio: an eBook authoring server with PDF and DOCX export.
//!
//! Users write books as ordered markdown chapters through a JSON API and
//! export them as finished documents. Export runs through one shared
//! pipeline: markdown is tokenized, laid out into renderer-agnostic blocks,
//! and drawn by a paginating PDF renderer or a flowing DOCX renderer.
//!
//! # Features
//!
//! - User accounts with session tokens
//! - Book and chapter management
//! - Cover image uploads
//! - PDF export with pagination, code blocks and lists
//! - DOCX export with matching styling

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Authentication and user management.
pub mod auth;
/// Configuration and CLI.
pub mod config;
/// Database operations.
pub mod db;
/// Error types.
pub mod error;
/// Book export orchestration.
pub mod export;
/// Output formats and renderers.
pub mod formats;
/// Layout blocks and typography.
pub mod layout;
/// Book and chapter models.
pub mod library;
/// Markdown tokenizing and inline spans.
pub mod markdown;
/// HTTP server.
pub mod server;

#[cfg(test)]
mod tests;

pub use config::{Cli, Command, Config};
pub use db::Database;
pub use error::{AppError, Result};
pub use server::AppState;
