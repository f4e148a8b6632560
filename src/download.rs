//! Fetch image bytes into the output directory, one file at a time.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;
use thiserror::Error;
use tokio::fs::{create_dir_all, File};
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::filter::extension;
use crate::integrity::md5_matches;

/// Why a single fetch failed. The item is skipped, the rest of the run goes on.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum FetchError {
    /// Creating or writing the local file failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// Transport error, non-success status or timeout.
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    /// The response had no body.
    #[error("There is no content to download")]
    ZeroContentLength,
    /// The written file doesn't hash to the md5 from the listing.
    #[error("md5 mismatch, expected {expected}")]
    ChecksumMismatch {
        /// The md5 reported by the listing.
        expected: String,
    },
}

/// The local file name of the `index`-th saved photo: `photo_{index}.{ext}`.
///
/// `ext` is the lowercased extension of `remote_name`, `jpg` when it has none.
pub fn indexed_file_name(index: usize, remote_name: &str) -> PathBuf {
    let ext = extension(remote_name)
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map_or_else(|| String::from("jpg"), str::to_ascii_lowercase);
    PathBuf::from(format!("photo_{index}.{ext}"))
}

/// Downloads into a fixed directory with a per-request timeout.
pub struct Fetcher {
    client: Client,
    dir: PathBuf,
    timeout: Duration,
}

impl Fetcher {
    /// `client` must not carry the API token, see [`crate::api::api_client`].
    pub fn session(client: Client, dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            client,
            dir: dir.into(),
            timeout,
        }
    }

    /// Create the target directory if it doesn't exist.
    #[inline]
    pub async fn ensure(self) -> std::io::Result<Self> {
        create_dir_all(&self.dir).await?;
        Ok(self)
    }

    /// The directory files are written to.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Download `url` into `dir/filename` and return the number of bytes written.
    ///
    /// When `expected_md5` is given the written file must hash to it.
    /// On any error the partially written file is removed.
    pub async fn fetch(
        &self,
        url: &str,
        filename: impl AsRef<Path>,
        expected_md5: Option<&str>,
    ) -> Result<u64, FetchError> {
        let file_path = self.dir.join(filename);
        let result = self.fetch_into(url, &file_path, expected_md5).await;
        if result.is_err() {
            // the file may not exist yet
            let _ = tokio::fs::remove_file(&file_path).await;
        }
        result
    }

    async fn fetch_into(
        &self,
        url: &str,
        file_path: &Path,
        expected_md5: Option<&str>,
    ) -> Result<u64, FetchError> {
        let mut response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;
        if response.content_length() == Some(0) {
            return Err(FetchError::ZeroContentLength);
        }

        let mut file_buf = BufWriter::new(File::create(file_path).await?);
        let mut written: u64 = 0;
        while let Some(mut chunk) = response.chunk().await? {
            written += chunk.len() as u64;
            file_buf.write_all_buf(&mut chunk).await?;
        }
        file_buf.flush().await?;
        drop(file_buf);

        if written == 0 {
            return Err(FetchError::ZeroContentLength);
        }
        if let Some(expected) = expected_md5 {
            if !md5_matches(file_path, expected).await? {
                return Err(FetchError::ChecksumMismatch {
                    expected: expected.to_owned(),
                });
            }
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{fetch_client, MockServer, Route};

    const CONTENT: &[u8] = b"The quick brown fox jumps over the lazy dog";
    const MD5: &str = "9e107d9d372bb6826bd81d3542a419d6";

    #[test]
    fn test_indexed_file_name() {
        assert_eq!(indexed_file_name(0, "cat.JPG"), PathBuf::from("photo_0.jpg"));
        assert_eq!(indexed_file_name(3, "a.b.png"), PathBuf::from("photo_3.png"));
        assert_eq!(indexed_file_name(7, "scan"), PathBuf::from("photo_7.jpg"));
        assert_eq!(indexed_file_name(1, "odd.p/ng"), PathBuf::from("photo_1.jpg"));
    }

    async fn fetcher(temp_dir: &tempfile::TempDir) -> Fetcher {
        Fetcher::session(
            fetch_client(),
            temp_dir.path().join("out"),
            Duration::from_secs(5),
        )
        .ensure()
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch() {
        let server = MockServer::start(vec![Route::get("/img").bytes(CONTENT)]).await;
        let temp_dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher(&temp_dir).await;

        let written = fetcher
            .fetch(&server.url("/img"), "photo_0.jpg", Some(MD5))
            .await
            .expect("Download failed");
        assert_eq!(written, CONTENT.len() as u64);
        assert_eq!(std::fs::read(fetcher.dir().join("photo_0.jpg")).unwrap(), CONTENT);
        // the fetch client sends no token
        assert_eq!(server.hits()[0].authorization, None);

        temp_dir.close().unwrap();
    }

    #[tokio::test]
    async fn test_fetch_failures_leave_no_file() {
        let server = MockServer::start(vec![
            Route::get("/img").bytes(CONTENT),
            Route::get("/gone").status(404),
            Route::get("/empty").bytes(b""),
        ])
        .await;
        let temp_dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher(&temp_dir).await;

        let err = fetcher
            .fetch(&server.url("/gone"), "a.jpg", None)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Reqwest(_)));

        let err = fetcher
            .fetch(&server.url("/empty"), "b.jpg", None)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::ZeroContentLength));

        let err = fetcher
            .fetch(&server.url("/img"), "c.jpg", Some("00000000000000000000000000000000"))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::ChecksumMismatch { .. }));

        for name in ["a.jpg", "b.jpg", "c.jpg"] {
            assert!(!fetcher.dir().join(name).exists());
        }

        temp_dir.close().unwrap();
    }

    #[tokio::test]
    async fn test_fetch_timeout_leaves_no_file() {
        let server = MockServer::start(vec![Route::get("/slow")
            .bytes(CONTENT)
            .delay(Duration::from_secs(5))])
        .await;
        let temp_dir = tempfile::tempdir().unwrap();
        let fetcher = Fetcher::session(
            fetch_client(),
            temp_dir.path().join("out"),
            Duration::from_millis(200),
        )
        .ensure()
        .await
        .unwrap();

        let err = fetcher
            .fetch(&server.url("/slow"), "photo_0.jpg", None)
            .await
            .unwrap_err();
        assert!(matches!(&err, FetchError::Reqwest(e) if e.is_timeout()), "{err:?}");
        assert!(!fetcher.dir().join("photo_0.jpg").exists());

        temp_dir.close().unwrap();
    }
}
