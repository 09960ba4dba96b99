use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::io::AsyncRead;

/// Payload carried by a [`FileRecord`].
pub enum Content {
    /// Fully materialized bytes
    Buffer(Bytes),
    /// Open-ended source; the upload protocol only accepts buffers
    Stream(Pin<Box<dyn AsyncRead + Send>>),
    /// Entry with no contents
    Null,
    /// Directory entry, stands for a collection
    Directory,
}

impl fmt::Debug for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Content::Buffer(b) => f.debug_tuple("Buffer").field(&b.len()).finish(),
            Content::Stream(_) => f.write_str("Stream"),
            Content::Null => f.write_str("Null"),
            Content::Directory => f.write_str("Directory"),
        }
    }
}

/// One unit of work handed over by the file producer.
#[derive(Debug)]
pub struct FileRecord {
    /// Path relative to the producer's base directory
    pub relative: String,
    /// Local path the record was read from
    pub path: PathBuf,
    pub content: Content,
    /// Local modification time
    pub modified: Option<DateTime<Utc>>,
}

impl FileRecord {
    /// Record with materialized contents.
    pub fn buffer(relative: impl Into<String>, content: impl Into<Bytes>) -> Self {
        let relative = relative.into();
        Self {
            path: PathBuf::from(&relative),
            relative,
            content: Content::Buffer(content.into()),
            modified: None,
        }
    }

    /// Directory marker record.
    pub fn directory(relative: impl Into<String>) -> Self {
        let relative = relative.into();
        Self {
            path: PathBuf::from(&relative),
            relative,
            content: Content::Directory,
            modified: None,
        }
    }

    /// Record without contents.
    pub fn null(relative: impl Into<String>) -> Self {
        let relative = relative.into();
        Self {
            path: PathBuf::from(&relative),
            relative,
            content: Content::Null,
            modified: None,
        }
    }

    /// Record backed by an open reader.
    pub fn stream(relative: impl Into<String>, reader: impl AsyncRead + Send + 'static) -> Self {
        let relative = relative.into();
        Self {
            path: PathBuf::from(&relative),
            relative,
            content: Content::Stream(Box::pin(reader)),
            modified: None,
        }
    }

    pub fn with_modified(mut self, modified: DateTime<Utc>) -> Self {
        self.modified = Some(modified);
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    /// Load a record from disk. `relative` is derived from `base`.
    pub async fn load(base: &Path, path: &Path) -> std::io::Result<Self> {
        let meta = tokio::fs::metadata(path).await?;
        let rel = path.strip_prefix(base).unwrap_or(path);
        let relative = rel.to_string_lossy().replace('\\', "/");
        let modified = meta.modified().ok().map(DateTime::<Utc>::from);

        let content = if meta.is_dir() {
            Content::Directory
        } else if meta.len() == 0 {
            Content::Null
        } else {
            Content::Buffer(Bytes::from(tokio::fs::read(path).await?))
        };

        Ok(Self {
            relative,
            path: path.to_path_buf(),
            content,
            modified,
        })
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.content, Content::Directory)
    }

    pub fn is_stream(&self) -> bool {
        matches!(self.content, Content::Stream(_))
    }

    /// True when there is nothing to send (`Null` or an empty buffer).
    pub fn is_null(&self) -> bool {
        match &self.content {
            Content::Null => true,
            Content::Buffer(b) => b.is_empty(),
            _ => false,
        }
    }

    /// Materialized contents, if any.
    pub fn bytes(&self) -> Option<&Bytes> {
        match &self.content {
            Content::Buffer(b) => Some(b),
            _ => None,
        }
    }

    /// Last segment of the relative path.
    pub fn basename(&self) -> &str {
        self.relative
            .trim_end_matches(['/', '\\'])
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&self.relative)
    }

    /// Extension of the relative path including the dot (`.html`).
    pub fn extension(&self) -> Option<&str> {
        crate::path::extension(&self.relative)
    }
}
