use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use super::models::{ChunkRow, DocumentRow};

pub struct DocumentQueries;

impl DocumentQueries {
    /// Remove every document and chunk
    #[inline]
    pub async fn truncate(conn: &mut SqliteConnection) -> Result<()> {
        let removed = sqlx::query("DELETE FROM chunks")
            .execute(&mut *conn)
            .await
            .context("Failed to delete chunks")?
            .rows_affected();

        sqlx::query("DELETE FROM documents")
            .execute(&mut *conn)
            .await
            .context("Failed to delete documents")?;

        debug!("Truncated index ({} chunks removed)", removed);
        Ok(())
    }

    #[inline]
    pub async fn create(
        conn: &mut SqliteConnection,
        filename: &str,
        embedding_model: &str,
        dimension: Option<i64>,
        indexed_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO documents (filename, embedding_model, dimension, indexed_at) VALUES (?, ?, ?, ?)",
        )
        .bind(filename)
        .bind(embedding_model)
        .bind(dimension)
        .bind(indexed_at)
        .execute(&mut *conn)
        .await
        .context("Failed to create document")?;
        Ok(())
    }

    /// Record the dimension of a document created without chunks
    #[inline]
    pub async fn set_dimension(
        conn: &mut SqliteConnection,
        filename: &str,
        dimension: i64,
    ) -> Result<()> {
        sqlx::query("UPDATE documents SET dimension = ? WHERE filename = ? AND dimension IS NULL")
            .bind(dimension)
            .bind(filename)
            .execute(&mut *conn)
            .await
            .context("Failed to record embedding dimension")?;
        Ok(())
    }

    #[inline]
    pub async fn active(conn: &mut SqliteConnection) -> Result<Option<DocumentRow>> {
        sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT d.filename, d.indexed_at, d.embedding_model, d.dimension,
                   (SELECT COUNT(*) FROM chunks c WHERE c.filename = d.filename) AS chunk_count
            FROM documents d
            ORDER BY d.indexed_at DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to get active document")
    }
}

pub struct ChunkQueries;

impl ChunkQueries {
    #[inline]
    pub async fn insert(conn: &mut SqliteConnection, row: &ChunkRow) -> Result<()> {
        sqlx::query(
            "INSERT INTO chunks (filename, chunk_index, page_number, text, embedding) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&row.filename)
        .bind(row.chunk_index)
        .bind(row.page_number)
        .bind(&row.text)
        .bind(&row.embedding)
        .execute(&mut *conn)
        .await
        .context("Failed to insert chunk")?;
        Ok(())
    }

    #[inline]
    pub async fn list_by_document(
        conn: &mut SqliteConnection,
        filename: &str,
    ) -> Result<Vec<ChunkRow>> {
        sqlx::query_as::<_, ChunkRow>(
            r#"
            SELECT filename, chunk_index, page_number, text, embedding
            FROM chunks WHERE filename = ?
            ORDER BY chunk_index
            "#,
        )
        .bind(filename)
        .fetch_all(&mut *conn)
        .await
        .context("Failed to list chunks")
    }
}
