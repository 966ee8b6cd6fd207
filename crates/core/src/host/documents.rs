use async_trait::async_trait;
use dashmap::DashMap;
use pkgnav_api::{ApiError, ApiResult, DocumentService, Url};

/// Open editor buffers layered over the disk.
#[derive(Debug, Default)]
pub struct DocumentStore {
    open: DashMap<Url, String>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, uri: Url, text: String) {
        self.open.insert(uri, text);
    }

    pub fn get(&self, uri: &Url) -> Option<String> {
        self.open.get(uri).map(|text| text.clone())
    }

    pub fn close(&self, uri: &Url) {
        self.open.remove(uri);
    }
}

#[async_trait]
impl DocumentService for DocumentStore {
    async fn open(&self, uri: &Url) -> ApiResult<String> {
        if let Some(text) = self.get(uri) {
            return Ok(text);
        }
        let path = uri
            .to_file_path()
            .map_err(|_| ApiError::InvalidArgument(format!("not a local file URI: {uri}")))?;
        tokio::fs::read_to_string(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ApiError::NotFound(uri.to_string())
            } else {
                ApiError::io(uri, e)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_overlay_wins_over_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.ts");
        std::fs::write(&path, "on disk").unwrap();
        let uri = Url::from_file_path(&path).unwrap();

        let store = DocumentStore::new();
        assert_eq!(store.open(&uri).await.unwrap(), "on disk");

        store.set(uri.clone(), "unsaved".to_string());
        assert_eq!(store.open(&uri).await.unwrap(), "unsaved");

        store.close(&uri);
        assert_eq!(store.open(&uri).await.unwrap(), "on disk");
    }
}
