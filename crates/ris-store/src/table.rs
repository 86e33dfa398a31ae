use std::fs;
use std::path::Path;

use ris_core::{Codebook, export_table, import_table};

use crate::error::{Result, StoreError};
use crate::store::CodebookStore;

/// Read and validate a v1.0 codebook table file.
pub fn read_table_file(path: &Path) -> Result<Codebook> {
    let json = fs::read_to_string(path).map_err(|e| {
        StoreError::InvalidData(format!("failed to read {}: {e}", path.display()))
    })?;
    let codebook = import_table(&json)?;
    tracing::info!(
        "loaded codebook table {} ({} of {} rows usable)",
        path.display(),
        codebook.len(),
        codebook.total_combinations()
    );
    Ok(codebook)
}

/// Write a codebook as a v1.0 table file.
pub fn write_table_file(codebook: &Codebook, path: &Path) -> Result<()> {
    let json = export_table(codebook)
        .map_err(|e| StoreError::InvalidData(format!("table export failed: {e}")))?;
    fs::write(path, json).map_err(|e| {
        StoreError::InvalidData(format!("failed to write {}: {e}", path.display()))
    })
}

impl CodebookStore {
    /// Import a table file into the cache, replacing any codebook with the same key.
    pub fn import_table_file(&self, path: &Path) -> Result<Codebook> {
        let codebook = read_table_file(path)?;
        self.save(&codebook)?;
        Ok(codebook)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ris_core::{CodebookSource, PhaseStateSet, build_codebook};
    use tempfile::TempDir;

    #[test]
    fn test_write_then_import() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cb.json");
        let states = PhaseStateSet::new(vec![0.0, 180.0]).unwrap();
        let built = build_codebook(&states, 4, 0.6).unwrap();
        write_table_file(&built, &path).unwrap();

        let store = CodebookStore::open_in_memory().unwrap();
        let imported = store.import_table_file(&path).unwrap();
        assert_eq!(imported.source(), CodebookSource::Table);
        assert_eq!(imported.len(), 4);

        let cached = store.load(&imported.key()).unwrap().unwrap();
        assert_eq!(cached.source(), CodebookSource::Table);
        assert_eq!(cached.entries(), imported.entries());
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = read_table_file(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, StoreError::InvalidData(_)));
    }

    #[test]
    fn test_malformed_table_is_core_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, r#"{"elementCount": 0, "phaseStates": [0, 180], "entries": []}"#)
            .unwrap();
        assert!(matches!(read_table_file(&path), Err(StoreError::Core(_))));
    }
}
