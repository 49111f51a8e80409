use bytes::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;

use super::EventForm;
use crate::backend::{ObjectStorage, UploadOptions};

pub const ALLOWED_IMAGE_TYPES: [&str; 4] = ["image/jpeg", "image/jpg", "image/png", "image/webp"];
pub const MAX_BANNER_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BannerError {
    #[error("Please select a valid image file (JPEG, PNG, or WebP)")]
    UnsupportedType(String),

    #[error("Image size must be less than 5MB")]
    TooLarge(usize),

    #[error("Failed to upload image. Please try again.")]
    UploadFailed,

    #[error("Failed to remove image. Please try again.")]
    RemoveFailed,
}

#[derive(Debug, Clone)]
pub struct BannerFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

pub fn validate_banner(content_type: &str, size: usize) -> Result<(), BannerError> {
    if !ALLOWED_IMAGE_TYPES.contains(&content_type) {
        return Err(BannerError::UnsupportedType(content_type.to_string()));
    }
    if size > MAX_BANNER_BYTES {
        return Err(BannerError::TooLarge(size));
    }
    Ok(())
}

/// `<unix millis>.<original extension>`
pub fn object_name(now: DateTime<Utc>, file_name: &str) -> String {
    let extension = file_name.rsplit('.').next().unwrap_or(file_name);
    format!("{}.{}", now.timestamp_millis(), extension)
}

/// Maps `.../public/<bucket>/<path>` back to `<path>`.
pub fn storage_path_from_public_url(url: &str) -> Option<String> {
    let (_, after_public) = url.split_once("/public/")?;
    let (_bucket, path) = after_public.split_once('/')?;
    (!path.is_empty()).then(|| path.to_string())
}

/// Validates, uploads and resolves the public URL. Nothing reaches storage
/// when validation fails.
pub async fn upload(
    storage: &dyn ObjectStorage,
    bucket: &str,
    file: BannerFile,
) -> Result<String, BannerError> {
    validate_banner(&file.content_type, file.bytes.len())?;

    let name = object_name(Utc::now(), &file.file_name);
    let options = UploadOptions::new(file.content_type);
    let stored = storage
        .upload(bucket, &name, file.bytes, &options)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, bucket, name = %name, "Error uploading image");
            BannerError::UploadFailed
        })?;

    tracing::info!(bucket, path = %stored.path, "Image uploaded");
    Ok(storage.public_url(bucket, &stored.path))
}

pub async fn remove(storage: &dyn ObjectStorage, bucket: &str, url: &str) -> Result<(), BannerError> {
    let path = storage_path_from_public_url(url).ok_or_else(|| {
        tracing::warn!(url, "Banner URL does not point into storage");
        BannerError::RemoveFailed
    })?;
    storage.remove(bucket, &[path]).await.map_err(|e| {
        tracing::error!(error = %e, url, "Error removing image");
        BannerError::RemoveFailed
    })
}

impl EventForm {
    pub async fn upload_banner(
        &mut self,
        storage: &dyn ObjectStorage,
        bucket: &str,
        file: BannerFile,
    ) -> Result<String, BannerError> {
        match upload(storage, bucket, file).await {
            Ok(url) => {
                self.errors.banner_image = None;
                self.banner_image = url.clone();
                Ok(url)
            }
            Err(e) => {
                self.errors.banner_image = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Deletes the uploaded object, then clears the field.
    pub async fn remove_banner(
        &mut self,
        storage: &dyn ObjectStorage,
        bucket: &str,
    ) -> Result<(), BannerError> {
        if self.banner_image.is_empty() {
            return Ok(());
        }
        match remove(storage, bucket, &self.banner_image).await {
            Ok(()) => {
                self.banner_image.clear();
                self.errors.banner_image = None;
                Ok(())
            }
            Err(e) => {
                self.errors.banner_image = Some(e.to_string());
                Err(e)
            }
        }
    }
}
