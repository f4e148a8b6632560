//! Verify downloaded files against the md5 the listing reported.

use std::cmp::min;
use std::path::Path;

use digest::Digest;
use tokio::io::AsyncReadExt;

const DEFAULT_BUF_SIZE: usize = 2 * 1024 * 1024; // 2MB

/// Hash the file with `D` and return the lowercase hex digest.
///
/// Reading happens on the runtime, hashing each chunk on the rayon pool.
pub async fn hash_file<D: Digest + Send + 'static>(
    filepath: impl AsRef<Path>,
) -> std::io::Result<String> {
    let mut file = tokio::fs::File::open(filepath).await?;
    let file_size = usize::try_from(file.metadata().await?.len()).unwrap_or(usize::MAX);

    let mut hasher = D::new();
    let mut buf = vec![0u8; min(DEFAULT_BUF_SIZE, file_size)].into_boxed_slice();
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        (hasher, buf) = tokio_rayon::spawn(move || {
            hasher.update(&buf[..n]);
            (hasher, buf)
        })
        .await;
    }

    Ok(base16ct::lower::encode_string(&hasher.finalize()))
}

/// Whether the md5 of the file equals `expected` (hex, any case).
pub async fn md5_matches(filepath: impl AsRef<Path>, expected: &str) -> std::io::Result<bool> {
    let actual = hash_file::<md5::Md5>(filepath).await?;
    Ok(actual.eq_ignore_ascii_case(expected.trim()))
}
