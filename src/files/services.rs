use anyhow::Context;
use bytes::Bytes;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use super::repo::NewFile;
use super::repo_types::FileRow;
use crate::state::AppState;

#[derive(Debug, Error)]
pub enum FileError {
    #[error("invalid upload: {0}")]
    Invalid(&'static str),
    #[error("file not found")]
    NotFound,
    #[error("a file with this name already exists")]
    Duplicate,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub struct UploadItem<'a> {
    pub filename: &'a str,
    pub file_number: &'a str,
    pub category: &'a str,
    pub body: Bytes,
    pub content_type: Option<&'a str>,
}

/// Filenames address files in URLs and response headers, so path separators,
/// dot-only names and control characters are refused.
pub fn validate_filename(name: &str) -> Result<&str, FileError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(FileError::Invalid("filename is required"));
    }
    if name.contains(|c: char| c == '/' || c == '\\') || name.chars().all(|c| c == '.') {
        return Err(FileError::Invalid("filename must not contain a path"));
    }
    if name.contains(char::is_control) {
        return Err(FileError::Invalid("filename must not contain control characters"));
    }
    Ok(name)
}

fn mime_from_ext(filename: &str) -> Option<&'static str> {
    let (_, ext) = filename.rsplit_once('.')?;
    match ext.to_ascii_lowercase().as_str() {
        "pdf" => Some("application/pdf"),
        "doc" => Some("application/msword"),
        "docx" => Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
        "xls" => Some("application/vnd.ms-excel"),
        "xlsx" => Some("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "txt" => Some("text/plain"),
        _ => None,
    }
}

fn resolve_content_type(filename: &str, declared: Option<&str>) -> String {
    declared
        .filter(|ct| !ct.is_empty() && *ct != "application/octet-stream")
        .or_else(|| mime_from_ext(filename))
        .unwrap_or("application/octet-stream")
        .to_string()
}

pub async fn upload_file(
    st: &AppState,
    user_id: Uuid,
    item: UploadItem<'_>,
) -> Result<FileRow, FileError> {
    let filename = validate_filename(item.filename)?;
    let file_number = item.file_number.trim();
    if file_number.is_empty() {
        return Err(FileError::Invalid("fileNumber is required"));
    }
    if item.body.is_empty() {
        return Err(FileError::Invalid("file is empty"));
    }

    let id = Uuid::new_v4();
    let key = format!("licenses/{}/{}", item.category, id);
    let content_type = resolve_content_type(filename, item.content_type);
    let size_bytes = item.body.len() as i64;

    st.storage
        .put_object(&key, item.body, &content_type)
        .await
        .with_context(|| format!("put_object {}", key))?;

    let new = NewFile {
        id,
        filename,
        file_number,
        category: item.category,
        s3_key: &key,
        content_type: &content_type,
        size_bytes,
        uploaded_by: user_id,
    };

    let inserted = st.files.insert(&new).await;

    match inserted {
        Ok(Some(row)) => {
            info!(file_id = %row.id, filename = %row.filename, %user_id, "file uploaded");
            Ok(row)
        }
        Ok(None) => {
            discard_object(st, &key).await;
            Err(FileError::Duplicate)
        }
        Err(e) => {
            discard_object(st, &key).await;
            Err(FileError::Other(e))
        }
    }
}

async fn discard_object(st: &AppState, key: &str) {
    if let Err(e) = st.storage.delete_object(key).await {
        warn!(error = %e, %key, "orphaned object after failed insert");
    }
}

pub async fn download_file(st: &AppState, filename: &str) -> Result<(FileRow, Bytes), FileError> {
    let row = st
        .files
        .find_by_filename(filename)
        .await?
        .ok_or(FileError::NotFound)?;
    let body = st
        .storage
        .get_object(&row.s3_key)
        .await
        .with_context(|| format!("get_object {}", row.s3_key))?;
    Ok((row, body))
}

/// Removes body then metadata; the row survives if the object delete fails.
pub async fn delete_file(st: &AppState, filename: &str) -> Result<FileRow, FileError> {
    let row = st
        .files
        .find_by_filename(filename)
        .await?
        .ok_or(FileError::NotFound)?;
    st.storage
        .delete_object(&row.s3_key)
        .await
        .with_context(|| format!("delete_object {}", row.s3_key))?;
    st.files
        .delete_by_filename(filename)
        .await?
        .ok_or(FileError::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_from_ext() {
        assert_eq!(mime_from_ext("a.pdf"), Some("application/pdf"));
        assert_eq!(mime_from_ext("A.PDF"), Some("application/pdf"));
        assert_eq!(mime_from_ext("scan.jpeg"), Some("image/jpeg"));
        assert_eq!(mime_from_ext("noext"), None);
        assert_eq!(mime_from_ext("weird.xyz"), None);
    }

    #[test]
    fn declared_content_type_wins_unless_generic() {
        assert_eq!(resolve_content_type("a.pdf", Some("text/plain")), "text/plain");
        assert_eq!(
            resolve_content_type("a.pdf", Some("application/octet-stream")),
            "application/pdf"
        );
        assert_eq!(resolve_content_type("a.pdf", None), "application/pdf");
        assert_eq!(resolve_content_type("blob", None), "application/octet-stream");
    }

    #[test]
    fn filename_validation() {
        assert_eq!(validate_filename("  Permit_A.docx ").unwrap(), "Permit_A.docx");
        assert!(matches!(validate_filename(""), Err(FileError::Invalid(_))));
        assert!(matches!(validate_filename("../etc/passwd"), Err(FileError::Invalid(_))));
        assert!(matches!(validate_filename("a\\b.pdf"), Err(FileError::Invalid(_))));
        assert!(matches!(validate_filename(".."), Err(FileError::Invalid(_))));
        assert!(validate_filename(".env").is_ok());
    }

    #[test]
    fn filename_with_control_characters_is_refused() {
        for name in ["Permit\nA.pdf", "a\rb.pdf", "tab\there.pdf", "nul\0.pdf"] {
            assert!(
                matches!(
                    validate_filename(name),
                    Err(FileError::Invalid("filename must not contain control characters"))
                ),
                "{name:?}"
            );
        }
        // surrounding whitespace is trimmed, not refused
        assert_eq!(validate_filename("\tPermit.pdf\n").unwrap(), "Permit.pdf");
    }

    fn item<'a>(filename: &'a str, body: &'static [u8]) -> UploadItem<'a> {
        UploadItem {
            filename,
            file_number: "045",
            category: "cantonment",
            body: Bytes::from_static(body),
            content_type: None,
        }
    }

    #[tokio::test]
    async fn upload_then_download_returns_body_and_metadata() {
        let state = AppState::fake();
        let user = Uuid::new_v4();

        let row = upload_file(&state, user, item("Permit_A.docx", b"docx body"))
            .await
            .unwrap();
        assert_eq!(row.filename, "Permit_A.docx");
        assert_eq!(row.file_number, "045");
        assert_eq!(row.size_bytes, 9);
        assert_eq!(row.uploaded_by, Some(user));
        assert_eq!(
            row.content_type,
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        );

        let (found, body) = download_file(&state, "Permit_A.docx").await.unwrap();
        assert_eq!(found.id, row.id);
        assert_eq!(&body[..], b"docx body");
    }

    #[tokio::test]
    async fn duplicate_upload_keeps_the_first_body() {
        let state = AppState::fake();
        upload_file(&state, Uuid::new_v4(), item("a.pdf", b"first"))
            .await
            .unwrap();

        let err = upload_file(&state, Uuid::new_v4(), item("a.pdf", b"second"))
            .await
            .unwrap_err();
        assert!(matches!(err, FileError::Duplicate));

        let (_, body) = download_file(&state, "a.pdf").await.unwrap();
        assert_eq!(&body[..], b"first");
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let state = AppState::fake();
        assert!(matches!(
            download_file(&state, "missing.pdf").await,
            Err(FileError::NotFound)
        ));
        assert!(matches!(
            delete_file(&state, "missing.pdf").await,
            Err(FileError::NotFound)
        ));
    }

    #[tokio::test]
    async fn delete_removes_row_and_object() {
        let state = AppState::fake();
        let row = upload_file(&state, Uuid::new_v4(), item("a.pdf", b"%PDF"))
            .await
            .unwrap();

        let deleted = delete_file(&state, "a.pdf").await.unwrap();
        assert_eq!(deleted.id, row.id);
        assert!(state.storage.get_object(&row.s3_key).await.is_err());
        assert!(matches!(
            download_file(&state, "a.pdf").await,
            Err(FileError::NotFound)
        ));
    }

    #[tokio::test]
    async fn upload_rejects_invalid_input_before_touching_storage() {
        let state = AppState::fake();
        let item = UploadItem {
            filename: "Permit.pdf",
            file_number: "  ",
            category: "cantonment",
            body: Bytes::from_static(b"%PDF"),
            content_type: None,
        };
        let err = upload_file(&state, Uuid::new_v4(), item).await.unwrap_err();
        assert!(matches!(err, FileError::Invalid("fileNumber is required")));

        let item = UploadItem {
            filename: "Permit.pdf",
            file_number: "1",
            category: "cantonment",
            body: Bytes::new(),
            content_type: None,
        };
        let err = upload_file(&state, Uuid::new_v4(), item).await.unwrap_err();
        assert!(matches!(err, FileError::Invalid("file is empty")));
    }
}
