use crate::auth::AuthService;
use crate::config::Config;
use crate::db::{Database, Session, User, now_timestamp};
use crate::error::AppError;
use crate::export::{ExportSettings, export_for_user};
use crate::formats::ExportFormat;
use crate::library::{Book, Chapter};
use std::io::Read;

fn test_db() -> Database {
    Database::open_memory().unwrap()
}

fn create_user(db: &Database, id: &str, email: &str) {
    let user = User {
        id: id.to_string(),
        email: email.to_string(),
        name: "Test".to_string(),
        password_hash: "hash".to_string(),
        avatar: None,
        is_pro: false,
        created_at: now_timestamp(),
        last_login: None,
    };
    db.create_user(&user).unwrap();
}

fn book_with_chapters(owner: &str, titles: &[&str]) -> Book {
    let mut book = Book::new(owner, "Test Book", "Tester");
    book.chapters = titles
        .iter()
        .map(|t| Chapter::new(t, &format!("Text of {}.", t)))
        .collect();
    book
}

fn chapter_titles(book: &Book) -> Vec<&str> {
    book.chapters.iter().map(|c| c.title.as_str()).collect()
}

// ========== USERS & SESSIONS ==========

#[test]
fn db_create_and_get_user() {
    let db = test_db();
    create_user(&db, "user-1", "alice@example.com");

    let by_email = db.get_user_by_email("alice@example.com").unwrap().unwrap();
    assert_eq!(by_email.id, "user-1");
    assert!(!by_email.is_pro);

    let by_id = db.get_user_by_id("user-1").unwrap().unwrap();
    assert_eq!(by_id.email, "alice@example.com");

    assert!(db.get_user_by_email("nobody@example.com").unwrap().is_none());
}

#[test]
fn db_duplicate_email_rejected() {
    let db = test_db();
    create_user(&db, "user-1", "alice@example.com");

    let duplicate = User {
        id: "user-2".to_string(),
        email: "alice@example.com".to_string(),
        name: "Other".to_string(),
        password_hash: "hash".to_string(),
        avatar: None,
        is_pro: false,
        created_at: now_timestamp(),
        last_login: None,
    };
    assert!(matches!(
        db.create_user(&duplicate),
        Err(AppError::Validation(_))
    ));
}

#[test]
fn db_update_profile_keeps_unset_fields() {
    let db = test_db();
    create_user(&db, "user-1", "alice@example.com");

    db.update_user_profile("user-1", None, Some("https://example.com/a.png"))
        .unwrap();
    let user = db.get_user_by_id("user-1").unwrap().unwrap();
    assert_eq!(user.name, "Test");
    assert_eq!(user.avatar.as_deref(), Some("https://example.com/a.png"));

    db.update_user_profile("user-1", Some("Alice"), None).unwrap();
    let user = db.get_user_by_id("user-1").unwrap().unwrap();
    assert_eq!(user.name, "Alice");
    assert_eq!(user.avatar.as_deref(), Some("https://example.com/a.png"));
}

#[test]
fn db_sessions_and_cleanup() {
    let db = test_db();
    create_user(&db, "user-1", "alice@example.com");

    db.create_session(&Session {
        token: "live".to_string(),
        user_id: "user-1".to_string(),
        expires_at: now_timestamp() + 3600,
    })
    .unwrap();
    db.create_session(&Session {
        token: "stale".to_string(),
        user_id: "user-1".to_string(),
        expires_at: now_timestamp() - 3600,
    })
    .unwrap();

    assert_eq!(db.cleanup_expired_sessions().unwrap(), 1);
    assert!(db.get_session("live").unwrap().is_some());
    assert!(db.get_session("stale").unwrap().is_none());

    db.delete_session("live").unwrap();
    assert!(db.get_session("live").unwrap().is_none());
}

// ========== BOOKS ==========

#[test]
fn db_book_round_trip_keeps_chapter_order() {
    let db = test_db();
    create_user(&db, "user-1", "alice@example.com");

    let mut book = book_with_chapters("user-1", &["One", "Two", "Three"]);
    book.subtitle = Some("Sub".to_string());
    db.create_book(&book).unwrap();

    let loaded = db.get_book(&book.id).unwrap().unwrap();
    assert_eq!(loaded.owner_id, "user-1");
    assert_eq!(loaded.subtitle.as_deref(), Some("Sub"));
    assert_eq!(chapter_titles(&loaded), vec!["One", "Two", "Three"]);
    assert_eq!(loaded.chapters[1].content, "Text of Two.");
}

#[test]
fn db_update_book_replaces_chapters() {
    let db = test_db();
    create_user(&db, "user-1", "alice@example.com");

    let mut book = book_with_chapters("user-1", &["One", "Two", "Three"]);
    db.create_book(&book).unwrap();

    // Reorder and drop a chapter.
    let three = book.chapters.remove(2);
    book.chapters.remove(0);
    book.chapters.insert(0, three);
    book.title = "Renamed".to_string();
    assert!(db.update_book(&book).unwrap());

    let loaded = db.get_book(&book.id).unwrap().unwrap();
    assert_eq!(loaded.title, "Renamed");
    assert_eq!(chapter_titles(&loaded), vec!["Three", "Two"]);
    assert_eq!(loaded.chapters[0].id, book.chapters[0].id);
}

#[test]
fn db_update_book_ignores_owner_change() {
    let db = test_db();
    create_user(&db, "user-1", "alice@example.com");
    create_user(&db, "user-2", "bob@example.com");

    let mut book = book_with_chapters("user-1", &["One"]);
    db.create_book(&book).unwrap();

    book.owner_id = "user-2".to_string();
    db.update_book(&book).unwrap();

    let loaded = db.get_book(&book.id).unwrap().unwrap();
    assert_eq!(loaded.owner_id, "user-1");
}

#[test]
fn db_update_missing_book() {
    let db = test_db();
    let book = book_with_chapters("user-1", &["One"]);
    assert!(!db.update_book(&book).unwrap());
}

#[test]
fn db_duplicate_chapter_ids_roll_back() {
    let db = test_db();
    create_user(&db, "user-1", "alice@example.com");

    let mut book = book_with_chapters("user-1", &["One", "Two"]);
    db.create_book(&book).unwrap();

    book.title = "Changed".to_string();
    book.chapters[1].id = book.chapters[0].id.clone();
    assert!(matches!(
        db.update_book(&book),
        Err(AppError::Validation(_))
    ));

    let loaded = db.get_book(&book.id).unwrap().unwrap();
    assert_eq!(loaded.title, "Test Book");
    assert_eq!(chapter_titles(&loaded), vec!["One", "Two"]);
}

#[test]
fn db_list_user_books_newest_first() {
    let db = test_db();
    create_user(&db, "user-1", "alice@example.com");
    create_user(&db, "user-2", "bob@example.com");

    let mut older = book_with_chapters("user-1", &[]);
    older.title = "Older".to_string();
    older.created_at -= 100;
    let mut newer = book_with_chapters("user-1", &["One"]);
    newer.title = "Newer".to_string();
    let other = book_with_chapters("user-2", &[]);

    db.create_book(&older).unwrap();
    db.create_book(&newer).unwrap();
    db.create_book(&other).unwrap();

    let books = db.list_user_books("user-1").unwrap();
    let titles: Vec<&str> = books.iter().map(|b| b.title.as_str()).collect();
    assert_eq!(titles, vec!["Newer", "Older"]);
    assert_eq!(books[0].chapters.len(), 1);
}

#[test]
fn db_delete_book_cascades_chapters() {
    let db = test_db();
    create_user(&db, "user-1", "alice@example.com");

    let book = book_with_chapters("user-1", &["One", "Two"]);
    db.create_book(&book).unwrap();

    assert!(db.delete_book(&book.id).unwrap());
    assert!(db.get_book(&book.id).unwrap().is_none());
    assert!(!db.delete_book(&book.id).unwrap());

    // Same chapter ids can be reused by a new book with the same id.
    db.create_book(&book).unwrap();
    assert_eq!(db.get_book(&book.id).unwrap().unwrap().chapters.len(), 2);
}

#[test]
fn db_delete_user_cascades_books() {
    let db = test_db();
    create_user(&db, "user-1", "alice@example.com");

    let book = book_with_chapters("user-1", &["One"]);
    db.create_book(&book).unwrap();

    assert!(db.delete_user("alice@example.com").unwrap());
    assert!(db.get_book(&book.id).unwrap().is_none());
}

#[test]
fn db_set_book_cover() {
    let db = test_db();
    create_user(&db, "user-1", "alice@example.com");
    let book = book_with_chapters("user-1", &[]);
    db.create_book(&book).unwrap();

    assert!(db.set_book_cover(&book.id, Some("/uploads/x.png")).unwrap());
    let loaded = db.get_book(&book.id).unwrap().unwrap();
    assert_eq!(loaded.cover_image.as_deref(), Some("/uploads/x.png"));

    assert!(!db.set_book_cover("missing", None).unwrap());
}

// ========== AUTH ==========

#[test]
fn auth_register_login_validate() {
    let db = test_db();
    let auth = AuthService::new(db, 30, true);

    let user = auth
        .register("Ada", "Ada@Example.com", "secret1")
        .unwrap();
    assert_eq!(user.email, "ada@example.com");

    let (logged_in, token) = auth.login("ada@example.com", "secret1").unwrap();
    assert_eq!(logged_in.id, user.id);

    let validated = auth.validate_token(&token).unwrap().unwrap();
    assert_eq!(validated.id, user.id);
    assert!(validated.last_login.is_some());

    auth.logout(&token).unwrap();
    assert!(auth.validate_token(&token).unwrap().is_none());
}

#[test]
fn auth_rejects_bad_credentials_and_input() {
    let db = test_db();
    let auth = AuthService::new(db, 30, true);
    auth.register("Ada", "ada@example.com", "secret1").unwrap();

    assert!(matches!(
        auth.login("ada@example.com", "wrong-password"),
        Err(AppError::Unauthorized(_))
    ));
    assert!(matches!(
        auth.login("nobody@example.com", "secret1"),
        Err(AppError::Unauthorized(_))
    ));
    assert!(matches!(
        auth.register("Ada", "not-an-email", "secret1"),
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        auth.register("Ada", "ada2@example.com", "short"),
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        auth.register("A", "ada3@example.com", "secret1"),
        Err(AppError::Validation(_))
    ));
}

#[test]
fn auth_registration_disabled() {
    let db = test_db();
    let auth = AuthService::new(db, 30, false);

    assert!(matches!(
        auth.register("Ada", "ada@example.com", "secret1"),
        Err(AppError::Forbidden(_))
    ));
    // Admin path still works.
    assert!(auth.create_user("Ada", "ada@example.com", "secret1").is_ok());
}

#[test]
fn auth_update_profile() {
    let db = test_db();
    let auth = AuthService::new(db, 30, true);
    let user = auth.register("Ada", "ada@example.com", "secret1").unwrap();

    assert!(matches!(
        auth.update_profile(&user.id, None, None),
        Err(AppError::Validation(_))
    ));

    let updated = auth
        .update_profile(&user.id, Some("  Ada Lovelace "), None)
        .unwrap();
    assert_eq!(updated.name, "Ada Lovelace");
}

#[test]
fn auth_change_password() {
    let db = test_db();
    let auth = AuthService::new(db, 30, true);
    auth.register("Ada", "ada@example.com", "secret1").unwrap();

    assert!(auth.change_password("ada@example.com", "better-secret").unwrap());
    assert!(auth.login("ada@example.com", "secret1").is_err());
    assert!(auth.login("ada@example.com", "better-secret").is_ok());
    assert!(!auth.change_password("nobody@example.com", "whatever").unwrap());
}

// ========== EXPORT ==========

fn settings_for(dir: &std::path::Path) -> ExportSettings {
    let mut config = Config::default();
    config.uploads.dir = dir.to_path_buf();
    ExportSettings::from_config(&config)
}

fn write_png(path: &std::path::Path) {
    let img = image::RgbImage::from_pixel(40, 60, image::Rgb([10, 120, 200]));
    img.save(path).unwrap();
}

#[test]
fn export_embeds_uploaded_cover_in_docx() {
    let dir = tempfile::tempdir().unwrap();
    write_png(&dir.path().join("cover.png"));

    let db = test_db();
    create_user(&db, "user-1", "alice@example.com");
    let mut book = book_with_chapters("user-1", &["One", "Two"]);
    book.cover_image = Some("/uploads/cover.png".to_string());
    db.create_book(&book).unwrap();

    let artifact = tokio_test::block_on(export_for_user(
        &db,
        &settings_for(dir.path()),
        "user-1",
        &book.id,
        ExportFormat::Docx,
    ))
    .unwrap();

    assert_eq!(artifact.filename, "Test_Book.docx");
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(artifact.bytes)).unwrap();
    assert!(archive.by_name("word/media/cover.jpeg").is_ok());

    let mut document = String::new();
    archive
        .by_name("word/document.xml")
        .unwrap()
        .read_to_string(&mut document)
        .unwrap();
    assert!(document.contains("Text of Two."));
    assert!(document.contains("by Tester"));
}

#[test]
fn export_pdf_with_cover_and_missing_cover() {
    let dir = tempfile::tempdir().unwrap();
    write_png(&dir.path().join("cover.png"));

    let db = test_db();
    create_user(&db, "user-1", "alice@example.com");
    let mut with_cover = book_with_chapters("user-1", &["One", "Two"]);
    with_cover.cover_image = Some("/uploads/cover.png".to_string());
    let mut missing_cover = book_with_chapters("user-1", &["One", "Two"]);
    missing_cover.cover_image = Some("/uploads/gone.png".to_string());
    db.create_book(&with_cover).unwrap();
    db.create_book(&missing_cover).unwrap();

    let settings = settings_for(dir.path());
    let export = |id: &str| {
        tokio_test::block_on(export_for_user(
            &db,
            &settings,
            "user-1",
            id,
            ExportFormat::Pdf,
        ))
        .unwrap()
    };

    // Cover, title page, two chapters.
    let pdf = lopdf::Document::load_mem(&export(&with_cover.id).bytes).unwrap();
    assert_eq!(pdf.get_pages().len(), 4);

    // Missing file: no cover page, export still succeeds.
    let pdf = lopdf::Document::load_mem(&export(&missing_cover.id).bytes).unwrap();
    assert_eq!(pdf.get_pages().len(), 3);
}

#[test]
fn export_checks_ownership_before_rendering() {
    let db = test_db();
    create_user(&db, "user-1", "alice@example.com");
    create_user(&db, "user-2", "bob@example.com");
    let book = book_with_chapters("user-1", &["One"]);
    db.create_book(&book).unwrap();

    let result = tokio_test::block_on(export_for_user(
        &db,
        &ExportSettings::default(),
        "user-2",
        &book.id,
        ExportFormat::Pdf,
    ));
    assert!(matches!(result, Err(AppError::Forbidden(_))));
}
