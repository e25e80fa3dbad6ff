use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{delete, get},
    Json, Router,
};
use bytes::Bytes;
use tracing::{error, info, instrument, warn};

use super::dto::{CategoryQuery, FileRecord, DEFAULT_CATEGORY};
use super::presentation::FileTable;
use super::services::{delete_file, download_file, upload_file, FileError, UploadItem};
use crate::{
    auth::{AuthUser, Capability},
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/views/files", get(file_table))
        .route("/files/download/:filename", get(download))
}

pub fn write_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/files", get(list_files).post(upload_multipart))
        .route("/files/:filename", delete(remove_file))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

#[instrument(skip(state))]
pub async fn list_files(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(q): Query<CategoryQuery>,
) -> Result<Json<Vec<FileRecord>>, (StatusCode, String)> {
    let rows = state
        .files
        .list_by_category(q.category())
        .await
        .map_err(|e| internal(e.into()))?;
    Ok(Json(rows.into_iter().map(FileRecord::from).collect()))
}

/// Listing rendered for the caller's role: derived columns plus allowed actions.
#[instrument(skip(state))]
pub async fn file_table(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(q): Query<CategoryQuery>,
) -> Result<Json<FileTable>, (StatusCode, String)> {
    let rows = state
        .files
        .list_by_category(q.category())
        .await
        .map_err(|e| internal(e.into()))?;
    let records: Vec<FileRecord> = rows.into_iter().map(FileRecord::from).collect();
    Ok(Json(FileTable::build(&records, auth.role)))
}

/// POST /files (multipart)
/// Fields: `file` (body, its filename is used unless `filename` is given),
/// `fileNumber`, optional `category`.
#[instrument(skip(state, mp))]
pub async fn upload_multipart(
    State(state): State<AppState>,
    auth: AuthUser,
    mut mp: Multipart,
) -> Result<(StatusCode, Json<FileRecord>), (StatusCode, String)> {
    auth.require(Capability::Upload)?;

    let mut body: Option<Bytes> = None;
    let mut content_type: Option<String> = None;
    let mut filename: Option<String> = None;
    let mut file_number = String::new();
    let mut category = DEFAULT_CATEGORY.to_string();

    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                if filename.is_none() {
                    filename = field.file_name().map(str::to_string);
                }
                content_type = field.content_type().map(str::to_string);
                body = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?,
                );
            }
            Some("filename") => filename = Some(text(field).await?),
            Some("fileNumber") => file_number = text(field).await?,
            Some("category") => {
                let c = text(field).await?;
                if !c.trim().is_empty() {
                    category = c.trim().to_string();
                }
            }
            _ => {}
        }
    }

    let body = body.ok_or((StatusCode::BAD_REQUEST, "file is required".to_string()))?;
    let filename = filename.unwrap_or_default();

    let item = UploadItem {
        filename: &filename,
        file_number: &file_number,
        category: &category,
        body,
        content_type: content_type.as_deref(),
    };
    let row = upload_file(&state, auth.id, item).await.map_err(status)?;
    Ok((StatusCode::CREATED, Json(row.into())))
}

#[instrument(skip(state))]
pub async fn download(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    auth.require(Capability::Download)?;

    let (row, body) = download_file(&state, &filename).await.map_err(status)?;
    info!(file_id = %row.id, filename = %row.filename, user_id = %auth.id, "file downloaded");

    Ok((attachment_headers(&row.filename, &row.content_type), body))
}

/// `Content-Type` and `Content-Disposition: attachment` for a stored file.
/// Quote, backslash and non-visible characters in the name become `_`; an
/// unusable content type falls back to `application/octet-stream`.
fn attachment_headers(filename: &str, content_type: &str) -> [(header::HeaderName, HeaderValue); 2] {
    let safe: String = filename
        .chars()
        .map(|c| {
            if c == '"' || c == '\\' || c.is_control() || !c.is_ascii() {
                '_'
            } else {
                c
            }
        })
        .collect();
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", safe))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
    let content_type = HeaderValue::from_str(content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    [
        (header::CONTENT_TYPE, content_type),
        (header::CONTENT_DISPOSITION, disposition),
    ]
}

#[instrument(skip(state))]
pub async fn remove_file(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(filename): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    auth.require(Capability::Delete)?;

    let row = delete_file(&state, &filename).await.map_err(status)?;
    info!(file_id = %row.id, filename = %row.filename, admin_id = %auth.id, "file deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn text(field: axum::extract::multipart::Field<'_>) -> Result<String, (StatusCode, String)> {
    field
        .text()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))
}

fn status(e: FileError) -> (StatusCode, String) {
    match e {
        FileError::Invalid(msg) => {
            warn!(%msg, "rejected upload");
            (StatusCode::BAD_REQUEST, msg.to_string())
        }
        FileError::NotFound => (StatusCode::NOT_FOUND, "File not found".into()),
        FileError::Duplicate => (StatusCode::CONFLICT, e.to_string()),
        FileError::Other(_) => internal(e),
    }
}

fn internal(e: FileError) -> (StatusCode, String) {
    error!(error = %e, "file operation failed");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_errors_map_to_statuses() {
        let cases = [
            (FileError::Invalid("fileNumber is required"), StatusCode::BAD_REQUEST),
            (FileError::NotFound, StatusCode::NOT_FOUND),
            (FileError::Duplicate, StatusCode::CONFLICT),
            (
                FileError::Other(anyhow::anyhow!("s3 get_object")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(status(err).0, expected);
        }
        assert_eq!(
            status(FileError::Invalid("file is empty")).1,
            "file is empty"
        );
        assert_eq!(status(FileError::NotFound).1, "File not found");
    }

    #[test]
    fn attachment_headers_carry_type_and_filename() {
        let [(ct_name, ct), (cd_name, cd)] = attachment_headers("Permit_A.docx", "application/pdf");
        assert_eq!(ct_name, header::CONTENT_TYPE);
        assert_eq!(ct, "application/pdf");
        assert_eq!(cd_name, header::CONTENT_DISPOSITION);
        assert_eq!(cd, "attachment; filename=\"Permit_A.docx\"");
    }

    #[test]
    fn attachment_headers_neutralize_unsafe_names() {
        let [_, (_, cd)] = attachment_headers("a\"b\\c.pdf", "application/pdf");
        assert_eq!(cd, "attachment; filename=\"a_b_c.pdf\"");

        let [_, (_, cd)] = attachment_headers("line\nbreak.pdf", "application/pdf");
        assert_eq!(cd, "attachment; filename=\"line_break.pdf\"");

        let [_, (_, cd)] = attachment_headers("Café.pdf", "application/pdf");
        assert_eq!(cd, "attachment; filename=\"Caf_.pdf\"");

        let [(_, ct), _] = attachment_headers("a.pdf", "bad\ntype");
        assert_eq!(ct, "application/octet-stream");
    }
}
