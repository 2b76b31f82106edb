use crate::http::HttpClient;
use crate::release::Sha256Digest;
use crate::runtime::Runtime;
use anyhow::{Context, Result};
use log::info;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};

/// A downloaded file and the SHA-256 digest of exactly the bytes written to it.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadedArtifact {
    pub path: PathBuf,
    pub bytes: u64,
    pub sha256: Sha256Digest,
}

/// Writer that feeds every byte it forwards into a hasher.
struct HashingWriter<'a, W: Write> {
    inner: W,
    hasher: &'a mut Sha256,
}

impl<W: Write> Write for HashingWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.hasher.update(&buf[..written]);
        Ok(written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Downloads `url` to `dest`, hashing the stream as it is written.
#[tracing::instrument(skip(runtime, dest, http_client))]
pub async fn download_file<R: Runtime>(
    runtime: &R,
    url: &str,
    dest: &Path,
    http_client: &HttpClient,
) -> Result<DownloadedArtifact> {
    info!("Downloading {}...", url);

    let mut hasher = Sha256::new();
    let hasher_ref = &mut hasher;
    let bytes = http_client
        .download_file(url, move || {
            let file = runtime
                .create_file(dest)
                .with_context(|| format!("Failed to create download file at {:?}", dest))?;
            Ok(HashingWriter {
                inner: file,
                hasher: hasher_ref,
            })
        })
        .await?;

    let sha256 = Sha256Digest::from_hasher(hasher);
    info!("Download complete ({} bytes, sha256 {}).", bytes, sha256);

    Ok(DownloadedArtifact {
        path: dest.to_path_buf(),
        bytes,
        sha256,
    })
}
