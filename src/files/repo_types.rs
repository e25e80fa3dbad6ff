use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Row of the `files` table; the body lives in object storage under `s3_key`.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FileRow {
    pub id: Uuid,
    pub filename: String,
    pub file_number: String,
    pub category: String,
    pub s3_key: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub uploaded_by: Option<Uuid>,
    pub last_modified: OffsetDateTime,
}
