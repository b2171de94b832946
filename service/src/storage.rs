use crate::models::StoredImport;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Import not found: {0}")]
    NotFound(String),
}

/// One directory per import, holding `import.json` and the uploaded file.
pub struct ImportStorage {
    base_path: PathBuf,
}

impl ImportStorage {
    pub fn new(base_path: impl AsRef<Path>) -> std::io::Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    pub fn create_import(&self) -> std::io::Result<String> {
        let import_id = Uuid::new_v4().to_string();
        fs::create_dir_all(self.import_path(&import_id))?;
        Ok(import_id)
    }

    pub fn import_path(&self, import_id: &str) -> PathBuf {
        self.base_path.join(import_id)
    }

    /// Ids come from URLs, so anything that is not a UUID is treated as absent.
    fn existing_path(&self, import_id: &str) -> Result<PathBuf, StorageError> {
        let path = Uuid::parse_str(import_id)
            .map(|id| self.import_path(&id.to_string()))
            .map_err(|_| StorageError::NotFound(import_id.to_string()))?;
        if path.is_dir() {
            Ok(path)
        } else {
            Err(StorageError::NotFound(import_id.to_string()))
        }
    }

    pub fn write_upload(&self, import_id: &str, data: &[u8]) -> Result<(), StorageError> {
        fs::write(self.import_path(import_id).join("upload.bin"), data)?;
        Ok(())
    }

    pub fn write_import(&self, stored: &StoredImport) -> Result<(), StorageError> {
        let path = self.import_path(&stored.import_id).join("import.json");
        let json = serde_json::to_string_pretty(stored)?;
        fs::write(&path, json)?;
        debug!("Wrote {}", path.display());
        Ok(())
    }

    pub fn read_import(&self, import_id: &str) -> Result<StoredImport, StorageError> {
        let path = self.existing_path(import_id)?.join("import.json");
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn delete_import(&self, import_id: &str) -> Result<(), StorageError> {
        let path = self.existing_path(import_id)?;
        fs::remove_dir_all(path)?;
        Ok(())
    }
}
