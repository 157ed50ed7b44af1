//! Whole-document JSON store. Every mutation loads the full document,
//! changes it, and writes the full document back. Saves go through a
//! temp file + rename so a crash mid-write never leaves a torn file.
//! Safe only under a single-writer assumption (one process).

use std::path::{Path, PathBuf};

use crate::document::Document;
use crate::error::{CourierError, Result};

/// File-backed store for the whole service document.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Create a store at the given file path, creating parent dirs.
    pub fn new(path: &Path) -> Self {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Default store path (~/.courier/store.json).
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".courier")
            .join("store.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document. A missing file is an empty document; a
    /// corrupt one is an error the caller decides about.
    pub fn load(&self) -> Result<Document> {
        if !self.path.exists() {
            return Ok(Document::default());
        }
        let json = std::fs::read_to_string(&self.path)
            .map_err(|e| CourierError::Store(format!("read {}: {e}", self.path.display())))?;
        serde_json::from_str(&json)
            .map_err(|e| CourierError::Store(format!("parse {}: {e}", self.path.display())))
    }

    /// Save the whole document atomically.
    pub fn save(&self, doc: &Document) -> Result<()> {
        let json = serde_json::to_string_pretty(doc)
            .map_err(|e| CourierError::Store(format!("serialize: {e}")))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)
            .map_err(|e| CourierError::Store(format!("write {}: {e}", tmp.display())))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| CourierError::Store(format!("rename {}: {e}", self.path.display())))?;
        tracing::debug!("💾 Saved document to {}", self.path.display());
        Ok(())
    }

    /// Whole-document read-modify-write. Concurrent callers can race;
    /// last save wins.
    pub fn update<F>(&self, mutate: F) -> Result<Document>
    where
        F: FnOnce(&mut Document),
    {
        let mut doc = self.load()?;
        mutate(&mut doc);
        self.save(&doc)?;
        Ok(doc)
    }
}
