//! Turn a listed image into a URL its bytes can be fetched from.
//!
//! Two strategies exist and a run uses exactly one of them, see [`crate::config::Strategy`]:
//! - [`resolve_download`] asks the API for a short-lived direct href.
//! - [`resolve_public`] publishes the file and derives a direct URL from its public key.

use crate::api::{url, ApiError, Disk};

/// The links of a published file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicLink {
    /// The share link, e.g. `https://yadi.sk/i/KEY`.
    pub public_url: String,
    /// `https://downloader.disk.yandex.ru/disk/KEY`.
    pub direct_url: String,
}

/// Derive the direct download URL from the last path segment of `public_url`.
///
/// A trailing `/` is ignored. Returns `None` when there is no usable segment.
pub fn direct_url_from_public(public_url: &str) -> Option<String> {
    let key = public_url.trim_end_matches('/').rsplit('/').next()?;
    if key.is_empty() || key.contains(':') {
        return None;
    }
    Some(format!("{}/{key}", url::DIRECT_DOWNLOAD_BASE))
}

/// Request the direct download href of the file at `path`.
///
/// # Errors
///
/// If the API call fails or returns a non-success status.
pub async fn resolve_download(disk: &Disk, path: &str) -> Result<String, ApiError> {
    Ok(disk.download_link(path).await?.href)
}

/// Publish the file at `path`, read back its public URL and derive the direct one.
///
/// `Ok(None)` means the API answered but gave no usable public URL.
///
/// # Errors
///
/// If publishing or the metadata call fails.
pub async fn resolve_public(disk: &Disk, path: &str) -> Result<Option<PublicLink>, ApiError> {
    disk.publish(path).await?;
    let Some(public_url) = disk.public_url(path).await? else {
        return Ok(None);
    };
    Ok(direct_url_from_public(&public_url).map(|direct_url| PublicLink {
        public_url,
        direct_url,
    }))
}
