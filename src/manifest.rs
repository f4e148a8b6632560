//! The JSON documents a run leaves behind.
//!
//! Both [`Manifest`] and [`Summary`] are rebuilt from scratch on every run and overwrite
//! whatever was written before. Output is pretty printed UTF-8 with non-ASCII kept verbatim.

use std::borrow::Cow;
use std::path::Path;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs::create_dir_all;

use crate::api::data::field::Resource;
use crate::config::Strategy;

/// Writing an output document failed.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ManifestError {
    /// Creating the directory or writing the file failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// The value couldn't be serialized.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// One remote image observed in this run.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoRecord {
    /// Remote file name.
    pub name: String,
    /// Remote path, unique within one manifest.
    pub path: String,
    /// Bytes written locally, or the size the listing reported when nothing was downloaded.
    pub size: u64,
    /// Modification time as reported by the API, empty if unknown.
    #[serde(default)]
    pub modified: String,
    /// Empty if the API reported none.
    #[serde(default)]
    pub mime_type: String,
    /// Direct download URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Public share link, for viewing in a browser.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    /// File name relative to the output directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<String>,
    /// Checksum from the listing; a downloaded file has been verified against it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5: Option<String>,
}

impl From<&Resource> for PhotoRecord {
    fn from(item: &Resource) -> Self {
        Self {
            name: item.name.clone(),
            path: item.path.clone(),
            size: item.size.unwrap_or(0),
            modified: item.modified.clone().unwrap_or_default(),
            mime_type: item.mime_type.clone().unwrap_or_default(),
            url: None,
            preview_url: None,
            local_path: None,
            md5: item.md5.clone(),
        }
    }
}

impl PhotoRecord {
    /// Mark the record as downloaded to `local_path`, `size` being the bytes written.
    pub fn with_local_path(mut self, local_path: impl Into<String>, size: u64) -> Self {
        self.local_path = Some(local_path.into());
        self.size = size;
        self
    }

    /// Attach the direct URL and, if known, the public share link.
    pub fn with_urls(mut self, url: impl Into<String>, preview_url: Option<String>) -> Self {
        self.url = Some(url.into());
        self.preview_url = preview_url;
        self
    }

    /// Where the page should load the image from: the local copy if any, else the URL.
    ///
    /// `asset_prefix` leads from the page back to the output directory,
    /// see [`crate::config::Output::asset_prefix`]. URLs are returned as they are.
    pub fn image_src(&self, asset_prefix: &str) -> Option<Cow<'_, str>> {
        match (&self.local_path, &self.url) {
            (Some(local_path), _) => Some(Cow::Owned(format!("{asset_prefix}{local_path}"))),
            (None, Some(url)) => Some(Cow::Borrowed(url)),
            (None, None) => None,
        }
    }
}

/// Every image recorded in one run, in listing order.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// When the run finished collecting.
    pub last_updated: DateTime<Local>,
    /// The normalized folders that were scanned.
    pub folders: Vec<String>,
    /// Always `photos.len()`.
    pub total_count: usize,
    /// The records.
    pub photos: Vec<PhotoRecord>,
}

impl Manifest {
    /// `total_count` is derived from `photos`.
    pub fn new(last_updated: DateTime<Local>, folders: Vec<String>, photos: Vec<PhotoRecord>) -> Self {
        Self {
            last_updated,
            folders,
            total_count: photos.len(),
            photos,
        }
    }
}

/// Per folder counts of one run.
#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderReport {
    /// The normalized folder path.
    pub path: String,
    /// Items returned by the listing, 0 when the listing failed.
    pub listed: usize,
    /// Items that passed the image filter.
    pub images: usize,
    /// Records added to the manifest.
    pub recorded: usize,
}

impl FolderReport {
    /// All counts start at zero.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }
}

/// The rollup written next to the manifest.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    /// Same as [`Manifest::last_updated`].
    pub last_updated: DateTime<Local>,
    /// How links were resolved.
    pub strategy: Strategy,
    /// Same as [`Manifest::total_count`].
    pub total_count: usize,
    /// One report per scanned folder.
    pub folders: Vec<FolderReport>,
}

impl Summary {
    /// Roll up `manifest` with the per folder counts.
    pub fn new(manifest: &Manifest, strategy: Strategy, folders: Vec<FolderReport>) -> Self {
        Self {
            last_updated: manifest.last_updated,
            strategy,
            total_count: manifest.total_count,
            folders,
        }
    }
}

/// Serialize `value` and replace the file at `path`, creating parent directories.
pub async fn write_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<(), ManifestError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        create_dir_all(parent).await?;
    }
    let mut content = serde_json::to_vec_pretty(value)?;
    content.push(b'\n');
    tokio::fs::write(path, content).await?;
    Ok(())
}
