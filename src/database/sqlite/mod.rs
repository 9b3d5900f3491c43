use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use tracing::{debug, info};

use super::{Chunk, DocumentSummary, VectorIndex, check_dimension, check_documents};
use crate::{RagError, Result};


pub mod models;
pub mod queries;

use models::{ChunkRow, DocumentRow};
use queries::{ChunkQueries, DocumentQueries};

pub type DbPool = Pool<Sqlite>;

/// Durable index backed by a SQLite file
#[derive(Debug, Clone)]
pub struct SqliteIndex {
    pool: DbPool,
}

fn database_error(error: anyhow::Error) -> RagError {
    RagError::Database(format!("{:#}", error))
}

fn is_unique_violation(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<sqlx::Error>()
        .and_then(sqlx::Error::as_database_error)
        .is_some_and(|e| e.is_unique_violation())
}

impl SqliteIndex {
    #[inline]
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                RagError::Database(format!(
                    "Failed to create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to create database connection pool")
            .map_err(database_error)?;

        let index = Self { pool };
        index.run_migrations().await?;

        Ok(index)
    }

    #[inline]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    #[inline]
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("src/database/sqlite/migrations")
            .run(&self.pool)
            .await
            .context("Failed to run schema migration")
            .map_err(database_error)?;

        debug!("Database migrations completed successfully");
        Ok(())
    }

    async fn connection(&self) -> Result<sqlx::pool::PoolConnection<Sqlite>> {
        self.pool
            .acquire()
            .await
            .context("Failed to acquire database connection")
            .map_err(database_error)
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    #[inline]
    async fn replace_all(
        &self,
        document: &str,
        embedding_model: &str,
        chunks: Vec<Chunk>,
    ) -> Result<()> {
        let dimension = check_documents(document, &chunks)?
            .map(i64::try_from)
            .transpose()
            .context("Embedding dimension out of range")
            .map_err(database_error)?;
        let rows = chunks
            .iter()
            .map(ChunkRow::from_chunk)
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(database_error)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")
            .map_err(database_error)?;

        DocumentQueries::truncate(&mut tx)
            .await
            .map_err(database_error)?;
        DocumentQueries::create(&mut tx, document, embedding_model, dimension, Utc::now())
            .await
            .map_err(database_error)?;
        for row in &rows {
            ChunkQueries::insert(&mut tx, row)
                .await
                .map_err(database_error)?;
        }

        tx.commit()
            .await
            .context("Failed to commit replacement")
            .map_err(database_error)?;

        info!("Stored {} chunks for {}", rows.len(), document);
        Ok(())
    }

    #[inline]
    async fn insert_incremental(&self, chunk: Chunk) -> Result<()> {
        let row = ChunkRow::from_chunk(&chunk).map_err(database_error)?;
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")
            .map_err(database_error)?;

        let active = DocumentQueries::active(&mut tx)
            .await
            .map_err(database_error)?
            .filter(|doc| doc.filename == chunk.document)
            .ok_or_else(|| {
                RagError::Input(format!(
                    "'{}' is not the active document; replace the index first",
                    chunk.document
                ))
            })?;

        match active.dimension {
            Some(expected) => {
                let expected = usize::try_from(expected)
                    .context("Invalid stored dimension")
                    .map_err(database_error)?;
                check_dimension(expected, &chunk)?;
            }
            None => {
                let dimension = i64::try_from(chunk.embedding.len())
                    .context("Embedding dimension out of range")
                    .map_err(database_error)?;
                DocumentQueries::set_dimension(&mut tx, &chunk.document, dimension)
                    .await
                    .map_err(database_error)?;
            }
        }

        ChunkQueries::insert(&mut tx, &row).await.map_err(|e| {
            if is_unique_violation(&e) {
                RagError::Input(format!(
                    "Chunk index {} is already stored for '{}'",
                    chunk.index, chunk.document
                ))
            } else {
                database_error(e)
            }
        })?;

        tx.commit()
            .await
            .context("Failed to commit chunk")
            .map_err(database_error)
    }

    #[inline]
    async fn fetch_all(&self, document: &str) -> Result<Vec<Chunk>> {
        let mut conn = self.connection().await?;
        let rows = ChunkQueries::list_by_document(&mut conn, document)
            .await
            .map_err(database_error)?;

        rows.into_iter()
            .map(ChunkRow::into_chunk)
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(database_error)
    }

    #[inline]
    async fn active_document(&self) -> Result<Option<DocumentSummary>> {
        let mut conn = self.connection().await?;
        DocumentQueries::active(&mut conn)
            .await
            .and_then(|row| row.map(DocumentRow::into_summary).transpose())
            .map_err(database_error)
    }
}
