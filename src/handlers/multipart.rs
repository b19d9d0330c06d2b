//! Helpers for pulling uploaded files out of `multipart/form-data` bodies.

use crate::errors::AppError;
use axum::extract::Multipart;
use bytes::Bytes;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// One uploaded file, fully buffered.
#[derive(Debug)]
pub struct FilePart {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// Read the first field named `field`, skipping any others.
pub async fn read_file_field(multipart: &mut Multipart, field: &str) -> Result<FilePart, AppError> {
    while let Some(part) = multipart.next_field().await? {
        if part.name() != Some(field) {
            continue;
        }
        return file_part(part).await;
    }
    Err(AppError::bad_request(format!("missing `{}` file field", field)))
}

pub async fn file_part(part: axum::extract::multipart::Field<'_>) -> Result<FilePart, AppError> {
    let file_name = part.file_name().unwrap_or_default().to_string();
    let content_type = part
        .content_type()
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string();
    let bytes = part.bytes().await?;
    Ok(FilePart {
        file_name,
        content_type,
        bytes,
    })
}
