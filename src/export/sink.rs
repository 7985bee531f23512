use crate::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Where a rendered document goes
#[async_trait]
pub trait DownloadSink: Send + Sync {
    /// Deliver the document under the given filename; returns where it ended up
    async fn deliver(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf>;
}

/// Saves documents into a directory, like a browser's download folder
///
/// An existing file is never overwritten; a numbered name such as `chat (1).pdf` is used instead.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    directory: PathBuf,
}

impl DirectorySink {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    async fn free_path(&self, filename: &str) -> Result<PathBuf> {
        let candidate = self.directory.join(filename);
        if !tokio::fs::try_exists(&candidate).await? {
            return Ok(candidate);
        }

        let (stem, extension) = match filename.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
            _ => (filename, None),
        };

        let mut n = 1;
        loop {
            let numbered = match extension {
                Some(ext) => format!("{} ({}).{}", stem, n, ext),
                None => format!("{} ({})", stem, n),
            };
            let candidate = self.directory.join(numbered);
            if !tokio::fs::try_exists(&candidate).await? {
                return Ok(candidate);
            }
            n += 1;
        }
    }
}

#[async_trait]
impl DownloadSink for DirectorySink {
    async fn deliver(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.directory).await?;
        let path = self.free_path(filename).await?;
        tokio::fs::write(&path, bytes).await?;

        log::info!("Saved {} bytes to {}", bytes.len(), path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("chat-export-sink-{}-{}", name, std::process::id()))
    }

    #[tokio::test]
    async fn test_writes_into_created_directory() {
        let dir = scratch_dir("create").join("nested");
        let sink = DirectorySink::new(&dir);

        let path = sink.deliver("chat.md", b"# hi").await.unwrap();

        assert_eq!(path, dir.join("chat.md"));
        assert_eq!(std::fs::read(&path).unwrap(), b"# hi");
        std::fs::remove_dir_all(scratch_dir("create")).unwrap();
    }

    #[tokio::test]
    async fn test_never_overwrites() {
        let dir = scratch_dir("numbered");
        let sink = DirectorySink::new(&dir);

        let first = sink.deliver("chat.pdf", b"1").await.unwrap();
        let second = sink.deliver("chat.pdf", b"2").await.unwrap();
        let third = sink.deliver("chat.pdf", b"3").await.unwrap();

        assert_eq!(first.file_name().unwrap(), "chat.pdf");
        assert_eq!(second.file_name().unwrap(), "chat (1).pdf");
        assert_eq!(third.file_name().unwrap(), "chat (2).pdf");
        assert_eq!(std::fs::read(&first).unwrap(), b"1");
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
