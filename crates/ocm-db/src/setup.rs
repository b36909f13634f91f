//! Database setup and initialization.
//!
//! Entry points call [`setup_database`] with the resolved database path, or
//! [`setup_memory_database`] when content must not outlive the process.

use std::path::Path;

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

/// Sets up the `SQLite` database connection and ensures the schema exists.
///
/// The parent directory and the database file are created when missing.
///
/// # Example
///
/// ```rust,no_run
/// use ocm_db::setup_database;
/// use std::path::Path;
///
/// # async fn example() -> anyhow::Result<()> {
/// let pool = setup_database(Path::new("/path/to/ocm.db")).await?;
/// # Ok(())
/// # }
/// ```
pub async fn setup_database(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }

    let pool = SqlitePool::connect_with(
        SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true),
    )
    .await
    .with_context(|| format!("opening {}", db_path.display()))?;

    create_schema(&pool).await?;
    tracing::info!(target: "ocm.db", path = %db_path.display(), "Content database ready");
    Ok(pool)
}

/// Sets up an in-memory `SQLite` database with the full schema.
///
/// Every connection to `sqlite::memory:` opens a distinct database, so the
/// pool holds exactly one connection that is never recycled.
pub async fn setup_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .min_connections(1)
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .context("opening in-memory database")?;
    create_schema(&pool).await?;
    Ok(pool)
}

/// Creates the complete database schema.
///
/// Safe to call multiple times as all operations use IF NOT EXISTS.
async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS menus (
            slug TEXT PRIMARY KEY NOT NULL,
            order_index INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sections (
            element_url TEXT PRIMARY KEY NOT NULL,
            menu_slug TEXT NOT NULL,
            order_index INTEGER NOT NULL,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sections_menu ON sections(menu_slug, order_index)")
        .execute(pool)
        .await?;

    // opens_path: content list the action navigates to.
    // content_path: content list that delivered the action.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS actions (
            identifier TEXT PRIMARY KEY NOT NULL,
            value TEXT NOT NULL,
            section_element_url TEXT,
            opens_path TEXT,
            content_path TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_actions_opens_path ON actions(opens_path)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS content_lists (
            path TEXT PRIMARY KEY NOT NULL,
            layout TEXT,
            content_version TEXT,
            expiration_date TEXT,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS elements (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            content_path TEXT NOT NULL,
            content_id TEXT NOT NULL,
            order_index INTEGER NOT NULL,
            value TEXT NOT NULL,
            UNIQUE (content_path, content_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_elements_path ON elements(content_path, order_index)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
