//! HTTP request handlers.

use crate::db::{User, now_timestamp};
use crate::error::{AppError, Result};
use crate::export::export_for_user;
use crate::formats::ExportFormat;
use crate::library::{Book, Chapter};
use crate::server::AppState;
use axum::{
    Json,
    body::{Body, Bytes},
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{Html, Response},
};
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use tokio_util::io::ReaderStream;

// ============================================================================
// WEB PAGES
// ============================================================================

/// Index page (simple HTML).
pub async fn index() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>ebook-studio</title>
</head>
<body>
    <h1>ebook-studio</h1>
    <ul>
        <li><code>POST /api/auth/register</code>, <code>POST /api/auth/login</code></li>
        <li><code>GET /api/books</code>, <code>POST /api/books</code></li>
        <li><code>GET /api/export/{book_id}?format=pdf|docx</code></li>
    </ul>
</body>
</html>"#,
    )
}

// ============================================================================
// AUTH API
// ============================================================================

/// Register request.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    name: String,
    email: String,
    password: String,
}

/// Login request.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

/// Session token plus the signed-in user.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    token: String,
    user: User,
}

/// Auth register.
pub async fn auth_register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let user = state.auth.register(&req.name, &req.email, &req.password)?;
    let (user, token) = state.auth.login(&user.email, &req.password)?;

    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

/// Auth login.
pub async fn auth_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    let (user, token) = state.auth.login(&req.email, &req.password)?;
    Ok(Json(AuthResponse { token, user }))
}

/// Auth logout.
pub async fn auth_logout(State(state): State<AppState>, headers: HeaderMap) -> Result<StatusCode> {
    if let Some(token) = extract_token(&headers) {
        state.auth.logout(&token)?;
    }
    Ok(StatusCode::OK)
}

/// Get current user info.
pub async fn auth_me(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<User>> {
    let user = get_authenticated_user(&state, &headers).await?;
    Ok(Json(user))
}

// ============================================================================
// PROFILE API
// ============================================================================

/// Profile update request.
#[derive(Debug, Deserialize)]
pub struct ProfileUpdateRequest {
    name: Option<String>,
    avatar: Option<String>,
}

/// Get the caller's profile.
pub async fn profile_get(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<User>> {
    let user = get_authenticated_user(&state, &headers).await?;
    Ok(Json(user))
}

/// Update the caller's name and/or avatar.
pub async fn profile_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ProfileUpdateRequest>,
) -> Result<Json<User>> {
    let user = get_authenticated_user(&state, &headers).await?;
    let updated = state
        .auth
        .update_profile(&user.id, req.name.as_deref(), req.avatar.as_deref())?;
    Ok(Json(updated))
}

// ============================================================================
// BOOKS API
// ============================================================================

/// Book list response.
#[derive(Debug, Serialize)]
pub struct BooksResponse {
    count: usize,
    books: Vec<Book>,
}

/// Create book request.
#[derive(Debug, Deserialize)]
pub struct CreateBookRequest {
    title: String,
    author: String,
    subtitle: Option<String>,
    cover_image: Option<String>,
    #[serde(default)]
    chapters: Vec<Chapter>,
}

/// Update book request. Absent fields are left unchanged.
#[derive(Debug, Deserialize)]
pub struct UpdateBookRequest {
    title: Option<String>,
    author: Option<String>,
    subtitle: Option<String>,
    cover_image: Option<String>,
    chapters: Option<Vec<Chapter>>,
    #[serde(default, alias = "user_id", alias = "userId")]
    owner_id: Option<serde_json::Value>,
}

/// List the caller's books, newest first.
pub async fn books_list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<BooksResponse>> {
    let user = get_authenticated_user(&state, &headers).await?;
    let books = state.db.list_user_books(&user.id)?;
    Ok(Json(BooksResponse {
        count: books.len(),
        books,
    }))
}

/// Create a book.
pub async fn books_create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateBookRequest>,
) -> Result<(StatusCode, Json<Book>)> {
    let user = get_authenticated_user(&state, &headers).await?;

    let title = required_field("title", &req.title)?;
    let author = required_field("author", &req.author)?;

    let mut book = Book::new(&user.id, &title, &author);
    book.subtitle = non_blank(req.subtitle);
    book.cover_image = non_blank(req.cover_image);
    state.check_cover_reference(None, book.cover_image.as_deref())?;
    book.chapters = req.chapters;
    book.assign_chapter_ids();
    check_chapter_ids(&book)?;

    state.db.create_book(&book)?;
    tracing::info!(book_id = %book.id, user_id = %user.id, "Created book");

    Ok((StatusCode::CREATED, Json(book)))
}

/// Get one of the caller's books.
pub async fn books_get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Book>> {
    let user = get_authenticated_user(&state, &headers).await?;
    Ok(Json(state.owned_book(&user, &id)?))
}

/// Update a book. A chapter list replaces the stored chapters wholesale.
pub async fn books_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<UpdateBookRequest>,
) -> Result<Json<Book>> {
    let user = get_authenticated_user(&state, &headers).await?;
    let mut book = state.owned_book(&user, &id)?;

    if req.owner_id.is_some() {
        return Err(AppError::Validation("Cannot change book owner".to_string()));
    }

    if let Some(title) = req.title {
        book.title = required_field("title", &title)?;
    }
    if let Some(author) = req.author {
        book.author = required_field("author", &author)?;
    }
    if let Some(subtitle) = req.subtitle {
        book.subtitle = non_blank(Some(subtitle));
    }

    let previous_cover = book.cover_image.clone();
    if let Some(cover_image) = req.cover_image {
        let cover_image = non_blank(Some(cover_image));
        state.check_cover_reference(previous_cover.as_deref(), cover_image.as_deref())?;
        book.cover_image = cover_image;
    }
    if let Some(chapters) = req.chapters {
        book.chapters = chapters;
        book.assign_chapter_ids();
        check_chapter_ids(&book)?;
    }
    book.updated_at = now_timestamp();

    if !state.db.update_book(&book)? {
        return Err(AppError::NotFound(format!("Book not found: {}", id)));
    }

    if previous_cover != book.cover_image {
        state.remove_cover(previous_cover.as_deref());
    }

    Ok(Json(book))
}

/// Delete a book and its stored cover.
pub async fn books_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let user = get_authenticated_user(&state, &headers).await?;
    let book = state.owned_book(&user, &id)?;

    state.db.delete_book(&book.id)?;
    state.remove_cover(book.cover_image.as_deref());
    tracing::info!(book_id = %book.id, "Deleted book");

    Ok(StatusCode::NO_CONTENT)
}

/// Upload a cover image (raw image body).
pub async fn books_upload_cover(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Book>> {
    let user = get_authenticated_user(&state, &headers).await?;
    let mut book = state.owned_book(&user, &id)?;

    let max = state.config.uploads.max_cover_bytes;
    if body.len() > max {
        return Err(AppError::TooLarge(format!("Cover exceeds {} bytes", max)));
    }

    let extension = cover_extension(&body)?;
    let reference = state.store_cover(&body, extension)?;
    state.db.set_book_cover(&book.id, Some(&reference))?;

    state.remove_cover(book.cover_image.as_deref());
    book.cover_image = Some(reference);

    Ok(Json(book))
}

/// Serve an uploaded cover.
pub async fn uploads_get(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> Result<Response<Body>> {
    let path = state
        .upload_path(&file)
        .ok_or_else(|| AppError::NotFound(format!("Upload not found: {}", file)))?;

    let handle = tokio::fs::File::open(&path)
        .await
        .map_err(|_| AppError::NotFound(format!("Upload not found: {}", file)))?;

    let content_type = ImageFormat::from_path(&path)
        .map(|f| f.to_mime_type())
        .unwrap_or("application/octet-stream");

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CACHE_CONTROL, "public, max-age=86400")
        .body(Body::from_stream(ReaderStream::new(handle)))
        .unwrap_or_else(|_| Response::default()))
}

// ============================================================================
// EXPORT API
// ============================================================================

/// Export query parameters.
#[derive(Debug, Deserialize)]
pub struct ExportParams {
    format: Option<String>,
}

/// Export a book as PDF (streamed) or DOCX.
pub async fn export_book(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(book_id): Path<String>,
    Query(params): Query<ExportParams>,
) -> Result<Response<Body>> {
    let user = get_authenticated_user(&state, &headers).await?;

    let format = match params.format.as_deref() {
        Some(value) => value.parse::<ExportFormat>()?,
        None => ExportFormat::default(),
    };

    let artifact = export_for_user(
        &state.db,
        &state.export_settings(),
        &user.id,
        &book_id,
        format,
    )
    .await?;

    let content_disposition = format!("attachment; filename=\"{}\"", artifact.filename);
    let builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, artifact.mime)
        .header(header::CONTENT_DISPOSITION, content_disposition);

    let response = match format {
        ExportFormat::Pdf => {
            let stream = ReaderStream::new(Cursor::new(artifact.bytes));
            builder.body(Body::from_stream(stream))
        }
        ExportFormat::Docx => builder
            .header(header::CONTENT_LENGTH, artifact.bytes.len())
            .body(Body::from(artifact.bytes)),
    };

    Ok(response.unwrap_or_else(|_| Response::default()))
}

// ============================================================================
// HELPERS
// ============================================================================

/// Extract token from Authorization header.
fn extract_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}

/// Get authenticated user from token.
async fn get_authenticated_user(state: &AppState, headers: &HeaderMap) -> Result<User> {
    let token = extract_token(headers)
        .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".to_string()))?;

    state
        .auth
        .validate_token(&token)?
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired token".to_string()))
}

fn required_field(name: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{} is required", name)));
    }
    Ok(value.to_string())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn check_chapter_ids(book: &Book) -> Result<()> {
    match book.duplicate_chapter_id() {
        Some(id) => Err(AppError::Validation(format!("Duplicate chapter id '{}'", id))),
        None => Ok(()),
    }
}

/// File extension for a supported cover image, sniffed from its bytes.
fn cover_extension(data: &[u8]) -> Result<&'static str> {
    if data.is_empty() {
        return Err(AppError::Validation("Cover image is empty".to_string()));
    }

    match image::guess_format(data) {
        Ok(ImageFormat::Jpeg) => Ok("jpg"),
        Ok(ImageFormat::Png) => Ok("png"),
        Ok(ImageFormat::WebP) => Ok("webp"),
        _ => Err(AppError::InvalidFormat(
            "Cover must be a JPEG, PNG or WebP image".to_string(),
        )),
    }
}
