use crate::error::{ErrorKind, Result};
use crate::key::CacheKey;
use crate::store::CacheStore;
use async_trait::async_trait;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use time::OffsetDateTime;
use tokio::fs;

/// Size of the expiry header: a big-endian `i128` of unix nanoseconds.
const HEADER_LEN: usize = 16;
const EXTENSION: &str = "entry";

/// Cache store on the local filesystem.
///
/// Each entry is one file, named by the BLAKE3 hash of its key and sharded
/// into two levels of directories (`ab/cd/abcd....entry`). A file holds the
/// expiry time followed by the raw value. Writes go to a temporary file that
/// is renamed over the entry, so readers never see half a value.
#[derive(Debug)]
pub struct FileCache {
    name: String,
    root: PathBuf,
    writes: AtomicU64,
}

impl FileCache {
    /// A cache rooted at `root`, which is created if missing.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(ErrorKind::from)?;
        Ok(Self {
            name: format!("file:{}", root.display()),
            root,
            writes: AtomicU64::new(0),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &CacheKey) -> PathBuf {
        let hash = blake3::hash(key.as_str().as_bytes()).to_hex();
        let hex = hash.as_str();
        self.root.join(&hex[0..2]).join(&hex[2..4]).join(format!("{hex}.{EXTENSION}"))
    }

    fn now() -> i128 {
        OffsetDateTime::now_utc().unix_timestamp_nanos()
    }
}

#[async_trait]
impl CacheStore for FileCache {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key);
        let mut bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == IoErrorKind::NotFound => return Ok(None),
            Err(err) => exn::bail!(ErrorKind::from(err)),
        };
        let header: [u8; HEADER_LEN] = bytes
            .get(..HEADER_LEN)
            .and_then(|h| h.try_into().ok())
            .ok_or_else(|| exn::Exn::from(ErrorKind::InvalidEntry("missing expiry header")))?;
        if i128::from_be_bytes(header) <= Self::now() {
            // Best effort: a failed cleanup just leaves the file for next time.
            _ = fs::remove_file(&path).await;
            return Ok(None);
        }
        Ok(Some(bytes.split_off(HEADER_LEN)))
    }

    async fn set(&self, key: &CacheKey, value: Vec<u8>, ttl: Duration) -> Result<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(ErrorKind::from)?;
        }
        let ttl = i128::try_from(ttl.as_nanos()).unwrap_or(i128::MAX);
        let expires_at = Self::now().saturating_add(ttl);
        let mut contents = Vec::with_capacity(HEADER_LEN + value.len());
        contents.extend_from_slice(&expires_at.to_be_bytes());
        contents.extend_from_slice(&value);

        let sequence = self.writes.fetch_add(1, Ordering::Relaxed);
        let temp = path.with_extension(format!("{}.{sequence}.tmp", std::process::id()));
        fs::write(&temp, &contents).await.map_err(ErrorKind::from)?;
        if let Err(err) = fs::rename(&temp, &path).await {
            _ = fs::remove_file(&temp).await;
            exn::bail!(ErrorKind::from(err));
        }
        Ok(())
    }

    async fn forget(&self, key: &CacheKey) -> Result<bool> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == IoErrorKind::NotFound => Ok(false),
            Err(err) => exn::bail!(ErrorKind::from(err)),
        }
    }
}
