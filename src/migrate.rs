use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Create both databases and their schemas. Safe to run repeatedly.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let catalog = db::connect(&config.db.path).await?;
    migrate_catalog(&catalog).await?;
    catalog.close().await;

    let index = db::connect(&config.index.path).await?;
    migrate_index(&index).await?;
    index.close().await;

    Ok(())
}

/// Metadata catalog schema: documents and conversation logs.
pub async fn migrate_catalog(pool: &SqlitePool) -> Result<()> {
    // AUTOINCREMENT keeps file ids from being reused after deletes
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS document_store (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            filename TEXT NOT NULL,
            upload_timestamp INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS application_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id TEXT NOT NULL,
            seq INTEGER NOT NULL,
            user_query TEXT NOT NULL,
            gpt_response TEXT NOT NULL,
            model TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            UNIQUE(session_id, seq)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_document_store_uploaded ON document_store(upload_timestamp DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Vector index schema: one row per chunk with its embedding blob.
pub async fn migrate_index(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunk_vectors (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_id INTEGER NOT NULL,
            chunk_index INTEGER NOT NULL,
            text TEXT NOT NULL,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            embedding BLOB NOT NULL,
            dims INTEGER NOT NULL,
            hash TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunk_vectors_file_id ON chunk_vectors(file_id)")
        .execute(pool)
        .await?;

    Ok(())
}
