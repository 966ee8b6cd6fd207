use async_trait::async_trait;
use pkgnav_api::{ApiError, ApiResult, DirEntry, FileSystem, FileType, Url};
use std::path::PathBuf;

fn to_path(uri: &Url) -> ApiResult<PathBuf> {
    uri.to_file_path()
        .map_err(|_| ApiError::InvalidArgument(format!("not a local file URI: {uri}")))
}

fn map_io(uri: &Url, err: std::io::Error) -> ApiError {
    if err.kind() == std::io::ErrorKind::NotFound {
        ApiError::NotFound(uri.to_string())
    } else {
        ApiError::io(uri, err)
    }
}

/// `file:` URIs on the local disk. Directory listings report symlinks as
/// [`FileType::Other`], so a walk never enters a linked package (or a link
/// back to its own root).
#[derive(Debug, Default, Clone)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn stat(&self, uri: &Url) -> ApiResult<FileType> {
        let path = to_path(uri)?;
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| map_io(uri, e))?;
        Ok(if metadata.is_file() {
            FileType::File
        } else if metadata.is_dir() {
            FileType::Directory
        } else {
            FileType::Other
        })
    }

    /// Entries sorted by name, for a stable walk order across platforms.
    async fn read_directory(&self, uri: &Url) -> ApiResult<Vec<DirEntry>> {
        let path = to_path(uri)?;
        let mut reader = tokio::fs::read_dir(&path)
            .await
            .map_err(|e| map_io(uri, e))?;
        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await.map_err(|e| map_io(uri, e))? {
            let name = entry.file_name().to_string_lossy().into_owned();
            // file_type() does not follow symlinks
            let file_type = match entry.file_type().await {
                Ok(t) if t.is_file() => FileType::File,
                Ok(t) if t.is_dir() => FileType::Directory,
                _ => FileType::Other,
            };
            entries.push(DirEntry::new(name, file_type));
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn exists(&self, uri: &Url) -> bool {
        match to_path(uri) {
            Ok(path) => tokio::fs::try_exists(path).await.unwrap_or(false),
            Err(_) => false,
        }
    }
}
