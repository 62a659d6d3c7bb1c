use anyhow::{Result, bail};
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

use fushub_types::models::Bucket;

/// Largest accepted upload body.
pub const MAX_UPLOAD_SIZE: usize = 5 * 1024 * 1024;

/// On-disk object storage for uploaded images.
///
/// Objects live at `{dir}/{bucket}/{path}` and are served back read-only
/// under `{public_url}/public/{bucket}/{path}`.
pub struct Storage {
    dir: PathBuf,
    public_url: String,
}

impl Storage {
    pub async fn new(dir: PathBuf, public_url: impl Into<String>) -> Result<Self> {
        for bucket in Bucket::ALL {
            fs::create_dir_all(dir.join(bucket.as_str())).await?;
        }
        info!("Object storage directory: {}", dir.display());
        Ok(Self {
            dir,
            public_url: public_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn public_url(&self, bucket: Bucket, path: &str) -> String {
        format!("{}/public/{}/{}", self.public_url, bucket, path)
    }

    pub fn file_path(&self, bucket: Bucket, path: &str) -> Result<PathBuf> {
        if !is_safe_path(path) {
            bail!("Refusing object path outside the bucket: {}", path);
        }
        Ok(self.dir.join(bucket.as_str()).join(path))
    }

    /// Write an object, creating intermediate directories. Returns the
    /// hex SHA-256 of the stored bytes.
    pub async fn write(&self, bucket: Bucket, path: &str, data: &[u8]) -> Result<String> {
        let file = self.file_path(bucket, path)?;
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&file, data).await?;

        let mut hasher = Sha256::new();
        hasher.update(data);
        Ok(hex::encode(hasher.finalize()))
    }

    pub async fn delete(&self, bucket: Bucket, path: &str) -> Result<()> {
        let file = self.file_path(bucket, path)?;
        match fs::remove_file(&file).await {
            Ok(()) => {
                info!("Deleted object {}/{}", bucket, path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Object {}/{} already gone", bucket, path);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// File extension for the image types we accept, `None` for anything else.
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    let essence = content_type.split(';').next().unwrap_or("").trim();
    match essence.to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/avif" => Some("avif"),
        _ => None,
    }
}

/// Relative, non-empty, and free of `..` or root components.
pub fn is_safe_path(path: &str) -> bool {
    !path.is_empty()
        && !path.contains('\\')
        && Path::new(path)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}
