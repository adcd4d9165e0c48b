//! Media upload handling.
//!
//! Multipart forms are collected into text fields plus saved file URLs.
//! Each non-empty file gets a collision-resistant name (UUID hex prefix on
//! the sanitized original filename) under the upload root and is exposed as
//! `/uploads/<name>`. Empty files and nameless parts are skipped. No
//! content-type validation or size limits beyond the request body cap.

use axum::extract::multipart::{Multipart, MultipartError};
use bytes::Bytes;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;
use uuid::Uuid;

/// URL prefix uploaded files are served under
pub const UPLOADS_ROUTE: &str = "/uploads";

/// A consumed multipart form: text fields plus saved file URLs keyed by the
/// form field they arrived under.
#[derive(Debug, Default)]
pub struct UploadForm {
    text: HashMap<String, String>,
    files: Vec<(String, String)>,
}

impl UploadForm {
    /// Trimmed text field value, empty string when absent.
    pub fn text(&self, name: &str) -> &str {
        self.text.get(name).map(|s| s.trim()).unwrap_or_default()
    }

    /// URLs of all saved files uploaded under `name`, in arrival order.
    pub fn urls(&self, name: &str) -> Vec<String> {
        self.files
            .iter()
            .filter(|(field, _)| field == name)
            .map(|(_, url)| url.clone())
            .collect()
    }

    /// URL of the first saved file uploaded under `name`.
    pub fn first_url(&self, name: &str) -> Option<&str> {
        self.files
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, url)| url.as_str())
    }
}

/// Drain a multipart request, persisting every non-empty file field.
///
/// Files are written before any record referencing them is saved; a crash
/// in between can orphan a file (accepted, uploads are never collected).
pub async fn collect_form(
    mut multipart: Multipart,
    upload_dir: &Path,
) -> Result<UploadForm, UploadError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let data = field.bytes().await?;
                if file_name.is_empty() || data.is_empty() {
                    continue;
                }
                let url = save_file(upload_dir, &file_name, data).await?;
                form.files.push((name, url));
            }
            None => {
                form.text.insert(name, field.text().await?);
            }
        }
    }

    Ok(form)
}

/// Persist one uploaded file and return its public URL.
pub async fn save_file(
    upload_dir: &Path,
    original_name: &str,
    data: Bytes,
) -> Result<String, UploadError> {
    let unique_name = format!(
        "{}_{}",
        Uuid::new_v4().simple(),
        sanitize_filename(original_name)
    );
    let path = upload_dir.join(&unique_name);
    tokio::fs::write(&path, &data).await?;

    debug!(file = %unique_name, bytes = data.len(), "Saved upload");

    Ok(format!("{UPLOADS_ROUTE}/{unique_name}"))
}

/// Reduce a client-supplied filename to a safe flat name: path separators
/// and anything outside [A-Za-z0-9._-] become underscores, leading dots are
/// stripped so the result can never be hidden or traverse upward.
fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Upload errors
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("invalid multipart payload: {0}")]
    Multipart(#[from] MultipartError),

    #[error("failed to write upload: {0}")]
    Io(#[from] std::io::Error),
}
