//! SQLite-backed [`Catalog`] and [`VectorIndex`] implementations.
//!
//! The catalog and the index each wrap their own [`SqlitePool`] pointing at
//! separate database files, so a failure in one never rolls back the other.
//! Every `sqlx` error is mapped into the core taxonomy with the name of the
//! operation that failed.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use docchat_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use docchat_core::models::{
    Chunk, ConversationTurn, Document, FileId, Metadata, NewTurn, SearchHit,
};
use docchat_core::store::{rank_hits, Catalog, VectorIndex};
use docchat_core::{Error, Result};

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

/// Metadata catalog over the `document_store` and `application_logs` tables.
pub struct SqliteCatalog {
    pool: SqlitePool,
}

impl SqliteCatalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Catalog for SqliteCatalog {
    async fn insert_document(&self, filename: &str) -> Result<FileId> {
        let now = Utc::now().timestamp_millis();
        let result =
            sqlx::query("INSERT INTO document_store (filename, upload_timestamp) VALUES (?, ?)")
                .bind(filename)
                .bind(now)
                .execute(&self.pool)
                .await
                .map_err(|e| Error::catalog("insert_document", e))?;
        Ok(result.last_insert_rowid())
    }

    async fn delete_document(&self, file_id: FileId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM document_store WHERE id = ?")
            .bind(file_id)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::catalog("delete_document", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_document(&self, file_id: FileId) -> Result<Option<Document>> {
        let row = sqlx::query("SELECT id, filename, upload_timestamp FROM document_store WHERE id = ?")
            .bind(file_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::catalog("get_document", e))?;

        Ok(row.map(|r| Document {
            file_id: r.get("id"),
            filename: r.get("filename"),
            upload_timestamp: from_millis(r.get("upload_timestamp")),
        }))
    }

    async fn get_documents(&self) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            "SELECT id, filename, upload_timestamp FROM document_store ORDER BY upload_timestamp DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::catalog("get_documents", e))?;

        Ok(rows
            .iter()
            .map(|r| Document {
                file_id: r.get("id"),
                filename: r.get("filename"),
                upload_timestamp: from_millis(r.get("upload_timestamp")),
            })
            .collect())
    }

    async fn append_turn(&self, turn: &NewTurn) -> Result<ConversationTurn> {
        let now = Utc::now().timestamp_millis();
        // Sequence assignment and insert happen in one statement so two
        // appends to the same session cannot observe the same MAX(seq).
        let row = sqlx::query(
            r#"
            INSERT INTO application_logs (session_id, seq, user_query, gpt_response, model, created_at)
            SELECT ?, COALESCE(MAX(seq), 0) + 1, ?, ?, ?, ?
            FROM application_logs WHERE session_id = ?
            RETURNING seq
            "#,
        )
        .bind(&turn.session_id)
        .bind(&turn.user_query)
        .bind(&turn.response)
        .bind(&turn.model)
        .bind(now)
        .bind(&turn.session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Error::catalog("append_turn", e))?;

        Ok(ConversationTurn {
            session_id: turn.session_id.clone(),
            seq: row.get("seq"),
            user_query: turn.user_query.clone(),
            response: turn.response.clone(),
            model: turn.model.clone(),
            created_at: from_millis(now),
        })
    }

    async fn get_turns(&self, session_id: &str) -> Result<Vec<ConversationTurn>> {
        let rows = sqlx::query(
            r#"
            SELECT session_id, seq, user_query, gpt_response, model, created_at
            FROM application_logs
            WHERE session_id = ?
            ORDER BY seq ASC
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::catalog("get_turns", e))?;

        Ok(rows
            .iter()
            .map(|r| ConversationTurn {
                session_id: r.get("session_id"),
                seq: r.get("seq"),
                user_query: r.get("user_query"),
                response: r.get("gpt_response"),
                model: r.get("model"),
                created_at: from_millis(r.get("created_at")),
            })
            .collect())
    }

    async fn count_turns(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM application_logs")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::catalog("count_turns", e))?;
        Ok(count as usize)
    }
}

/// Vector index over the `chunk_vectors` table with brute-force cosine search.
pub struct SqliteVectorIndex {
    pool: SqlitePool,
}

impl SqliteVectorIndex {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VectorIndex for SqliteVectorIndex {
    async fn insert(&self, chunks: &[Chunk]) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::index("insert", e))?;

        for chunk in chunks {
            let metadata_json =
                serde_json::to_string(&chunk.metadata).map_err(|e| Error::index("insert", e))?;
            sqlx::query(
                r#"
                INSERT INTO chunk_vectors (file_id, chunk_index, text, metadata_json, embedding, dims, hash)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(chunk.file_id)
            .bind(chunk.chunk_index)
            .bind(&chunk.text)
            .bind(&metadata_json)
            .bind(vec_to_blob(&chunk.embedding))
            .bind(chunk.embedding.len() as i64)
            .bind(&chunk.hash)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::index("insert", e))?;
        }

        tx.commit().await.map_err(|e| Error::index("insert", e))?;
        Ok(())
    }

    async fn search(
        &self,
        query: &[f32],
        k: usize,
        file_id: Option<FileId>,
    ) -> Result<Vec<SearchHit>> {
        let rows = sqlx::query(
            r#"
            SELECT file_id, chunk_index, text, metadata_json, embedding, hash
            FROM chunk_vectors
            WHERE (?1 IS NULL OR file_id = ?1)
            "#,
        )
        .bind(file_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::index("search", e))?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in &rows {
            let blob: Vec<u8> = row.get("embedding");
            let embedding = blob_to_vec(&blob);
            let metadata_json: String = row.get("metadata_json");
            let metadata: Metadata =
                serde_json::from_str(&metadata_json).map_err(|e| Error::index("search", e))?;

            hits.push(SearchHit {
                score: cosine_similarity(query, &embedding),
                chunk: Chunk {
                    file_id: row.get("file_id"),
                    chunk_index: row.get("chunk_index"),
                    text: row.get("text"),
                    embedding,
                    hash: row.get("hash"),
                    metadata,
                },
            });
        }

        rank_hits(&mut hits, k);
        Ok(hits)
    }

    async fn delete_by_file(&self, file_id: FileId) -> Result<usize> {
        let result = sqlx::query("DELETE FROM chunk_vectors WHERE file_id = ?")
            .bind(file_id)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::index("delete_by", e))?;
        Ok(result.rows_affected() as usize)
    }

    async fn count_for_file(&self, file_id: FileId) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunk_vectors WHERE file_id = ?")
            .bind(file_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::index("count", e))?;
        Ok(count as usize)
    }

    async fn file_ids(&self) -> Result<BTreeSet<FileId>> {
        let ids: Vec<i64> = sqlx::query_scalar("SELECT DISTINCT file_id FROM chunk_vectors")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::index("file_ids", e))?;
        Ok(ids.into_iter().collect())
    }

    async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunk_vectors")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::index("count", e))?;
        Ok(count as usize)
    }
}
