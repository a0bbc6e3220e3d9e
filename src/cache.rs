//! Schema cache
//!
//! Caller-owned cache of compiled schemas keyed by path, with the file's
//! modification time stored alongside. An entry is replaced wholesale
//! when the file's mtime no longer matches; there is no other eviction.
//! Staleness is exposed through `is_stale`, so lifecycle and thread
//! safety stay under the caller's control.

use crate::error::{Result, SchemaError};
use crate::schema::Schema;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

/// A cached compiled schema with the source's modification time
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Modification time of the schema file when it was compiled
    pub mtime: SystemTime,
    /// The compiled schema
    pub schema: Arc<Schema>,
}

/// Cache of compiled schemas keyed by source path
#[derive(Debug, Default)]
pub struct SchemaCache {
    entries: HashMap<PathBuf, CacheEntry>,
}

impl SchemaCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an entry no longer matches the file's modification time
    pub fn is_stale(entry: &CacheEntry, current_mtime: SystemTime) -> bool {
        entry.mtime != current_mtime
    }

    /// Number of cached schemas
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a cached schema without compiling
    pub fn get(&self, path: impl AsRef<Path>) -> Option<&CacheEntry> {
        self.entries.get(path.as_ref())
    }

    /// Fetch the compiled schema for a path, compiling on a miss or when
    /// the file's modification time has changed
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<Arc<Schema>> {
        let path = path.as_ref();
        let mtime = Self::mtime_of(path)?;

        if let Some(entry) = self.entries.get(path) {
            if !Self::is_stale(entry, mtime) {
                return Ok(Arc::clone(&entry.schema));
            }
        }

        let schema = Arc::new(Schema::from_file(path)?);
        self.entries.insert(
            path.to_path_buf(),
            CacheEntry {
                mtime,
                schema: Arc::clone(&schema),
            },
        );

        Ok(schema)
    }

    fn mtime_of(path: &Path) -> Result<SystemTime> {
        let metadata = fs::metadata(path).map_err(|e| {
            SchemaError::new(format!("cannot stat schema file '{}': {}", path.display(), e))
        })?;
        metadata.modified().map_err(|e| {
            SchemaError::new(format!(
                "cannot read modification time of '{}': {}",
                path.display(),
                e
            ))
            .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SCHEMA: &str = r#"<?xml version="1.0"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="note" type="xs:string"/>
</xs:schema>"#;

    fn write_schema(dir: &Path) -> PathBuf {
        let path = dir.join("schema.xsd");
        fs::write(&path, SCHEMA).unwrap();
        path
    }

    #[test]
    fn test_load_compiles_and_caches() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_schema(dir.path());

        let mut cache = SchemaCache::new();
        let first = cache.load(&path).unwrap();
        let second = cache.load(&path).unwrap();

        // Same Arc: no recompilation happened
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_mtime_change_forces_recompilation() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_schema(dir.path());

        let mut cache = SchemaCache::new();
        let first = cache.load(&path).unwrap();

        // Rewrite with a different mtime
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(SCHEMA.as_bytes()).unwrap();
        drop(file);
        let old = fs::metadata(&path).unwrap().modified().unwrap();
        file_set_mtime(&path, old + std::time::Duration::from_secs(2));

        let second = cache.load(&path).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1); // replaced wholesale, not duplicated
    }

    #[test]
    fn test_missing_file_is_schema_error() {
        let mut cache = SchemaCache::new();
        let err = cache.load("/no/such/schema.xsd").unwrap_err();
        assert!(matches!(err, crate::error::Error::Schema(_)));
    }

    #[test]
    fn test_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_schema(dir.path());

        let mut cache = SchemaCache::new();
        cache.load(&path).unwrap();

        let entry = cache.get(&path).unwrap();
        assert!(!SchemaCache::is_stale(entry, entry.mtime));
        assert!(SchemaCache::is_stale(
            entry,
            entry.mtime + std::time::Duration::from_secs(1)
        ));
    }

    fn file_set_mtime(path: &Path, to: SystemTime) {
        let file = fs::OpenOptions::new().write(true).open(path).unwrap();
        file.set_modified(to).unwrap();
    }
}
