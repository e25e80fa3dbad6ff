use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::FileRow;

const FILE_COLUMNS: &str = "id, filename, file_number, category, s3_key, content_type, \
                            size_bytes, uploaded_by, last_modified";

pub struct NewFile<'a> {
    pub id: Uuid,
    pub filename: &'a str,
    pub file_number: &'a str,
    pub category: &'a str,
    pub s3_key: &'a str,
    pub content_type: &'a str,
    pub size_bytes: i64,
    pub uploaded_by: Uuid,
}

/// File metadata keyed by the unique filename.
#[async_trait]
pub trait FileIndex: Send + Sync {
    /// `None` when the filename is already taken.
    async fn insert(&self, new: &NewFile<'_>) -> anyhow::Result<Option<FileRow>>;
    /// Files of one category, newest first.
    async fn list_by_category(&self, category: &str) -> anyhow::Result<Vec<FileRow>>;
    async fn find_by_filename(&self, filename: &str) -> anyhow::Result<Option<FileRow>>;
    async fn delete_by_filename(&self, filename: &str) -> anyhow::Result<Option<FileRow>>;
}

#[derive(Clone)]
pub struct PgFileIndex {
    db: PgPool,
}

impl PgFileIndex {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl FileIndex for PgFileIndex {
    async fn insert(&self, new: &NewFile<'_>) -> anyhow::Result<Option<FileRow>> {
        let row = sqlx::query_as::<_, FileRow>(&format!(
            r#"
            INSERT INTO files (id, filename, file_number, category, s3_key, content_type,
                               size_bytes, uploaded_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (filename) DO NOTHING
            RETURNING {FILE_COLUMNS}
            "#
        ))
        .bind(new.id)
        .bind(new.filename)
        .bind(new.file_number)
        .bind(new.category)
        .bind(new.s3_key)
        .bind(new.content_type)
        .bind(new.size_bytes)
        .bind(new.uploaded_by)
        .fetch_optional(&self.db)
        .await
        .context("insert file")?;
        Ok(row)
    }

    async fn list_by_category(&self, category: &str) -> anyhow::Result<Vec<FileRow>> {
        let rows = sqlx::query_as::<_, FileRow>(&format!(
            r#"
            SELECT {FILE_COLUMNS}
              FROM files
             WHERE category = $1
             ORDER BY last_modified DESC, filename ASC
            "#
        ))
        .bind(category)
        .fetch_all(&self.db)
        .await
        .context("list files by category")?;
        Ok(rows)
    }

    async fn find_by_filename(&self, filename: &str) -> anyhow::Result<Option<FileRow>> {
        let row = sqlx::query_as::<_, FileRow>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE filename = $1"
        ))
        .bind(filename)
        .fetch_optional(&self.db)
        .await
        .context("find file by filename")?;
        Ok(row)
    }

    async fn delete_by_filename(&self, filename: &str) -> anyhow::Result<Option<FileRow>> {
        let row = sqlx::query_as::<_, FileRow>(&format!(
            "DELETE FROM files WHERE filename = $1 RETURNING {FILE_COLUMNS}"
        ))
        .bind(filename)
        .fetch_optional(&self.db)
        .await
        .context("delete file")?;
        Ok(row)
    }
}

/// In-memory index used by tests and `AppState::fake`.
#[derive(Default)]
pub struct MemoryFileIndex {
    rows: Mutex<HashMap<String, FileRow>>,
}

impl MemoryFileIndex {
    fn rows(&self) -> anyhow::Result<std::sync::MutexGuard<'_, HashMap<String, FileRow>>> {
        self.rows
            .lock()
            .map_err(|_| anyhow::anyhow!("file index lock poisoned"))
    }
}

#[async_trait]
impl FileIndex for MemoryFileIndex {
    async fn insert(&self, new: &NewFile<'_>) -> anyhow::Result<Option<FileRow>> {
        let mut rows = self.rows()?;
        if rows.contains_key(new.filename) {
            return Ok(None);
        }
        let row = FileRow {
            id: new.id,
            filename: new.filename.to_string(),
            file_number: new.file_number.to_string(),
            category: new.category.to_string(),
            s3_key: new.s3_key.to_string(),
            content_type: new.content_type.to_string(),
            size_bytes: new.size_bytes,
            uploaded_by: Some(new.uploaded_by),
            last_modified: OffsetDateTime::now_utc(),
        };
        rows.insert(row.filename.clone(), row.clone());
        Ok(Some(row))
    }

    async fn list_by_category(&self, category: &str) -> anyhow::Result<Vec<FileRow>> {
        let mut out: Vec<FileRow> = self
            .rows()?
            .values()
            .filter(|r| r.category == category)
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            b.last_modified
                .cmp(&a.last_modified)
                .then_with(|| a.filename.cmp(&b.filename))
        });
        Ok(out)
    }

    async fn find_by_filename(&self, filename: &str) -> anyhow::Result<Option<FileRow>> {
        Ok(self.rows()?.get(filename).cloned())
    }

    async fn delete_by_filename(&self, filename: &str) -> anyhow::Result<Option<FileRow>> {
        Ok(self.rows()?.remove(filename))
    }
}
