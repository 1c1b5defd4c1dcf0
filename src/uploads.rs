use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("invalid file name: {0}")]
    InvalidName(String),
    #[error("failed to read {name}: {source}")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Directory that holds images uploaded ahead of a job. Files are referenced by
/// name only; every name is sanitized before it touches the filesystem.
#[derive(Debug, Clone)]
pub struct UploadArea {
    root: PathBuf,
}

impl UploadArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_env() -> Self {
        let root = std::env::var("UPLOAD_FOLDER").unwrap_or_else(|_| "uploads".into());
        Self::new(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, name: &str) -> Result<PathBuf, UploadError> {
        let safe = secure_filename(name);
        if safe.is_empty() {
            return Err(UploadError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(safe))
    }

    pub async fn exists(&self, name: &str) -> bool {
        match self.path_for(name) {
            Ok(path) => tokio::fs::metadata(&path)
                .await
                .map(|meta| meta.is_file())
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    pub async fn read(&self, name: &str) -> Result<Vec<u8>, UploadError> {
        let path = self.path_for(name)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(UploadError::NotFound(secure_filename(name)))
            }
            Err(err) => Err(UploadError::Read {
                name: secure_filename(name),
                source: err,
            }),
        }
    }
}

/// Reduces a user-supplied name to a single path component made of ASCII
/// letters, digits, `.`, `_` and `-`, without leading dots.
pub fn secure_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let mapped: String = base
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
                ch
            } else if ch.is_whitespace() {
                '_'
            } else {
                '\0'
            }
        })
        .filter(|ch| *ch != '\0')
        .collect();
    mapped.trim_start_matches('.').to_string()
}

/// Filename without its last extension: `"a.b.png"` becomes `"a.b"`.
pub fn file_stem(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}
