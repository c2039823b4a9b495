//! HTTP server and routes.

mod handlers;
mod state;

pub use state::AppState;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/register", post(handlers::auth_register))
        .route("/login", post(handlers::auth_login))
        .route("/logout", post(handlers::auth_logout))
        .route("/me", get(handlers::auth_me));

    let cover_limit = state.config.uploads.max_cover_bytes.saturating_add(1024);

    let book_routes = Router::new()
        .route("/", get(handlers::books_list).post(handlers::books_create))
        .route(
            "/{id}",
            get(handlers::books_get)
                .put(handlers::books_update)
                .delete(handlers::books_delete),
        )
        .route(
            "/{id}/cover",
            put(handlers::books_upload_cover).layer(DefaultBodyLimit::max(cover_limit)),
        );

    Router::new()
        .route("/", get(handlers::index))
        .nest("/api/auth", auth_routes)
        .route(
            "/api/profile",
            get(handlers::profile_get).put(handlers::profile_update),
        )
        .nest("/api/books", book_routes)
        .route("/api/export/{book_id}", get(handlers::export_book))
        .route("/uploads/{file}", get(handlers::uploads_get))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
