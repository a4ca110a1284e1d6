//! Digest-addressed blob store
//!
//! Layout under the cache root:
//!
//! ```text
//! blobs/sha256/<digest>            blob bytes
//! origins/sha256/<sha256(url)>     JSON record: origin URL -> digest
//! tmp/<uuid>.part                  in-flight downloads
//! ```
//!
//! A blob only appears under its final name after its digest has been
//! verified, via rename from `tmp/` (same filesystem). Concurrent writers of
//! one digest write identical bytes, so the last rename wins harmlessly.

use crate::cache::opener::{DefaultOpener, UrlOpener};
use crate::digest::Sha256Digest;
use crate::error::{ReproError, ReproResult};
use crate::filespec::redact;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

const BLOBS_DIR: &str = "blobs/sha256";
const ORIGINS_DIR: &str = "origins/sha256";
const TMP_DIR: &str = "tmp";
const CHUNK_SIZE: usize = 64 * 1024;

/// Origin URL index record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OriginRecord {
    /// Redacted origin URL, for humans only
    pub url: String,
    pub sha256: Sha256Digest,
    pub imported_at: DateTime<Utc>,
}

/// A blob present in the cache
#[derive(Debug, Clone, Serialize)]
pub struct BlobInfo {
    pub sha256: Sha256Digest,
    pub size_bytes: u64,
    pub path: PathBuf,
}

/// Local content-addressed cache
pub struct Cache {
    root: PathBuf,
    opener: Arc<dyn UrlOpener>,
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache").field("root", &self.root).finish()
    }
}

impl Cache {
    /// Open (creating if needed) a cache rooted at `root`
    pub async fn open(root: impl Into<PathBuf>) -> ReproResult<Self> {
        Self::with_opener(root, Arc::new(DefaultOpener::new())).await
    }

    /// Open a cache that fetches through a custom opener
    pub async fn with_opener(
        root: impl Into<PathBuf>,
        opener: Arc<dyn UrlOpener>,
    ) -> ReproResult<Self> {
        let root = root.into();
        for dir in [BLOBS_DIR, ORIGINS_DIR, TMP_DIR] {
            let dir = root.join(dir);
            fs::create_dir_all(&dir).await.map_err(|e| {
                ReproError::io(format!("creating cache directory {}", dir.display()), e)
            })?;
        }
        let root = fs::canonicalize(&root).await.map_err(|e| {
            ReproError::io(format!("resolving cache root {}", root.display()), e)
        })?;
        debug!("Opened cache at {}", root.display());
        Ok(Self { root, opener })
    }

    /// Cache root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, sha256: &Sha256Digest) -> PathBuf {
        self.root.join(BLOBS_DIR).join(sha256.as_str())
    }

    fn origin_path(&self, url: &Url) -> PathBuf {
        let key = Sha256Digest::of_bytes(url.as_str().as_bytes());
        self.root.join(ORIGINS_DIR).join(key.as_str())
    }

    /// Whether a blob is stored under `sha256`. Never downloads.
    pub async fn cached(&self, sha256: &Sha256Digest) -> ReproResult<bool> {
        let path = self.blob_path(sha256);
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ReproError::io(format!("checking {}", path.display()), e)),
        }
    }

    /// Make `sha256` resident, fetching `url` if it is not already cached.
    ///
    /// The received bytes are hashed while streaming; on mismatch nothing is
    /// committed and `DigestMismatch` is returned.
    pub async fn ensure(
        &self,
        url: &Url,
        sha256: &Sha256Digest,
        cancel: &CancellationToken,
    ) -> ReproResult<()> {
        if self.cached(sha256).await? {
            debug!("{} is already cached", sha256);
            return Ok(());
        }
        let part = self.fetch(url, cancel).await?;
        if &part.sha256 != sha256 {
            return Err(ReproError::DigestMismatch {
                url: redact(url),
                expected: sha256.to_string(),
                actual: part.sha256.to_string(),
            });
        }
        self.commit(part).await?;
        Ok(())
    }

    /// Fetch `url` without knowing its digest, store the blob under the
    /// computed digest and remember the origin URL.
    pub async fn import_with_url(
        &self,
        url: &Url,
        cancel: &CancellationToken,
    ) -> ReproResult<Sha256Digest> {
        let part = self.fetch(url, cancel).await?;
        let sha256 = self.commit(part).await?;
        self.record_origin(url, &sha256).await?;
        info!("Imported {} as {}", redact(url), sha256);
        Ok(sha256)
    }

    /// Digest previously imported from `url`
    pub async fn sha256_by_origin_url(&self, url: &Url) -> ReproResult<Sha256Digest> {
        let path = self.origin_path(url);
        let content = match fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ReproError::OriginNotFound(redact(url)));
            }
            Err(e) => return Err(ReproError::io(format!("reading {}", path.display()), e)),
        };
        let record: OriginRecord = serde_json::from_str(&content)?;
        Ok(record.sha256)
    }

    /// Absolute path of a resident blob
    pub async fn blob_abs_path(&self, sha256: &Sha256Digest) -> ReproResult<PathBuf> {
        if !self.cached(sha256).await? {
            return Err(ReproError::BlobNotFound(sha256.to_string()));
        }
        Ok(self.blob_path(sha256))
    }

    /// All resident blobs, ordered by digest
    pub async fn list(&self) -> ReproResult<Vec<BlobInfo>> {
        let dir = self.root.join(BLOBS_DIR);
        let mut entries = fs::read_dir(&dir)
            .await
            .map_err(|e| ReproError::io(format!("listing {}", dir.display()), e))?;

        let mut blobs = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ReproError::io(format!("listing {}", dir.display()), e))?
        {
            let Some(sha256) = entry
                .file_name()
                .to_str()
                .and_then(|n| Sha256Digest::parse(n).ok())
            else {
                continue;
            };
            let meta = entry
                .metadata()
                .await
                .map_err(|e| ReproError::io(format!("stat {}", entry.path().display()), e))?;
            if !meta.is_file() {
                continue;
            }
            blobs.push(BlobInfo {
                sha256,
                size_bytes: meta.len(),
                path: entry.path(),
            });
        }
        blobs.sort_by(|a, b| a.sha256.cmp(&b.sha256));
        Ok(blobs)
    }

    /// Stream `url` into a temporary file, hashing as it goes
    async fn fetch(&self, url: &Url, cancel: &CancellationToken) -> ReproResult<PartialBlob> {
        let path = self
            .root
            .join(TMP_DIR)
            .join(format!("{}.part", Uuid::new_v4()));
        let opener = Arc::clone(&self.opener);
        let url_owned = url.clone();
        let token = cancel.clone();

        let task = tokio::task::spawn_blocking(move || {
            download_blocking(opener.as_ref(), &url_owned, path, &token)
        });

        tokio::select! {
            joined = task => {
                joined.map_err(|e| ReproError::Internal(format!("download task failed: {}", e)))?
            }
            _ = cancel.cancelled() => {
                // The blocking task notices the token at its next chunk and
                // drops its partial file.
                Err(ReproError::Cancelled)
            }
        }
    }

    /// Move a verified partial blob to its digest-keyed name
    async fn commit(&self, mut part: PartialBlob) -> ReproResult<Sha256Digest> {
        let dest = self.blob_path(&part.sha256);
        fs::rename(&part.path, &dest).await.map_err(|e| {
            ReproError::io(
                format!("moving {} to {}", part.path.display(), dest.display()),
                e,
            )
        })?;
        part.committed = true;
        debug!("Committed {} ({} bytes)", part.sha256, part.size_bytes);
        Ok(part.sha256.clone())
    }

    async fn record_origin(&self, url: &Url, sha256: &Sha256Digest) -> ReproResult<()> {
        let record = OriginRecord {
            url: redact(url),
            sha256: sha256.clone(),
            imported_at: Utc::now(),
        };
        let content = serde_json::to_string_pretty(&record)?;
        let tmp = self
            .root
            .join(TMP_DIR)
            .join(format!("{}.origin", Uuid::new_v4()));
        let dest = self.origin_path(url);
        fs::write(&tmp, content)
            .await
            .map_err(|e| ReproError::io(format!("writing {}", tmp.display()), e))?;
        fs::rename(&tmp, &dest)
            .await
            .map_err(|e| ReproError::io(format!("writing {}", dest.display()), e))
    }
}

/// Temporary download that is removed unless committed
struct PartialBlob {
    path: PathBuf,
    sha256: Sha256Digest,
    size_bytes: u64,
    committed: bool,
}

impl Drop for PartialBlob {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Removes the temp file if the download bails out before it is hashed
struct TempGuard(Option<PathBuf>);

impl Drop for TempGuard {
    fn drop(&mut self) {
        if let Some(path) = self.0.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}

fn download_blocking(
    opener: &dyn UrlOpener,
    url: &Url,
    path: PathBuf,
    cancel: &CancellationToken,
) -> ReproResult<PartialBlob> {
    if cancel.is_cancelled() {
        return Err(ReproError::Cancelled);
    }
    let mut reader = opener.open(url)?;
    let mut file =
        File::create(&path).map_err(|e| ReproError::io(format!("creating {}", path.display()), e))?;
    let mut guard = TempGuard(Some(path.clone()));

    let mut hasher = Sha256::new();
    let mut size_bytes = 0u64;
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        if cancel.is_cancelled() {
            return Err(ReproError::Cancelled);
        }
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(ReproError::Transport {
                    url: redact(url),
                    reason: e.to_string(),
                })
            }
        };
        hasher.update(&buf[..n]);
        file.write_all(&buf[..n])
            .map_err(|e| ReproError::io(format!("writing {}", path.display()), e))?;
        size_bytes += n as u64;
    }
    file.sync_all()
        .map_err(|e| ReproError::io(format!("syncing {}", path.display()), e))?;

    guard.0 = None;
    Ok(PartialBlob {
        path,
        sha256: Sha256Digest::from_hasher(hasher),
        size_bytes,
        committed: false,
    })
}
