//! Profile image storage under the configured upload directory.

use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::ApiError;

/// URL prefix the upload directory is served under.
pub const UPLOAD_URL_PREFIX: &str = "/uploads";

const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];

/// An image received in a multipart form, not yet on disk.
#[derive(Debug)]
pub struct IncomingImage {
    pub field: String,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// A stored image: where it lives on disk and the path clients fetch it from.
#[derive(Debug, Clone)]
pub struct StoredImage {
    pub file_path: PathBuf,
    pub url: String,
}

fn image_mime(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [0x89, 0x50, 0x4E, 0x47, ..] => Some("image/png"),
        [0x47, 0x49, 0x46, 0x38, ..] => Some("image/gif"),
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Some("image/webp"),
        _ => None,
    }
}

fn extension_for(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "bin",
    }
}

/// Check name, size and content; returns the extension to store under.
pub fn check_image(image: &IncomingImage, max_bytes: usize) -> Result<&'static str, ApiError> {
    let field = image.field.as_str();
    let ext = image
        .file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();
    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(ApiError::field(
            field,
            "Unsupported file type. Allowed: JPEG, PNG, WebP, GIF.",
        ));
    }
    if image.bytes.is_empty() {
        return Err(ApiError::field(field, "Empty file"));
    }
    if image.bytes.len() > max_bytes {
        return Err(ApiError::field(
            field,
            format!("File too large. Maximum size is {} bytes.", max_bytes),
        ));
    }
    let mime = image_mime(&image.bytes).ok_or_else(|| {
        ApiError::field(field, "File content does not match an allowed image type.")
    })?;
    Ok(extension_for(mime))
}

/// Write the image under a fresh `<field>-<uuid>.<ext>` name.
pub async fn save_image(
    upload_dir: &Path,
    image: &IncomingImage,
    max_bytes: usize,
) -> Result<StoredImage, ApiError> {
    let ext = check_image(image, max_bytes)?;

    tokio::fs::create_dir_all(upload_dir)
        .await
        .map_err(|e| ApiError::Internal(format!("failed to create upload directory: {}", e)))?;

    let filename = format!("{}-{}.{}", image.field, Uuid::new_v4(), ext);
    let file_path = upload_dir.join(&filename);
    tokio::fs::write(&file_path, &image.bytes)
        .await
        .map_err(|e| ApiError::Internal(format!("failed to write upload: {}", e)))?;

    tracing::info!(file = %filename, size = image.bytes.len(), "image uploaded");

    Ok(StoredImage {
        file_path,
        url: format!("{}/{}", UPLOAD_URL_PREFIX, filename),
    })
}

/// Best-effort cleanup after a failed registration.
pub async fn discard_image(image: &StoredImage) {
    if let Err(e) = tokio::fs::remove_file(&image.file_path).await {
        tracing::warn!(path = %image.file_path.display(), error = %e, "failed to remove orphaned upload");
    }
}
