use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};

use ris_core::{
    Codebook, CodebookEntry, CodebookKey, CodebookSource, PhaseStateSet, SincWeighting,
    build_codebook_with,
};

use crate::error::{Result, StoreError};
use crate::schema;

pub const DB_FILE_NAME: &str = "codebooks.db";

/// Summary row for a cached codebook.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedCodebook {
    pub key: String,
    pub element_count: usize,
    pub source: CodebookSource,
    pub retained: usize,
    pub total: usize,
    pub created_at: String,
}

/// SQLite-backed memo of built and imported codebooks, keyed by
/// (phase states, element count, threshold, weighting, source).
pub struct CodebookStore {
    conn: Connection,
}

impl CodebookStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::InvalidData(format!("failed to create {}: {e}", parent.display()))
            })?;
        }
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    /// Open `<base_dir>/codebooks.db`.
    pub fn open_in(base_dir: &Path) -> Result<Self> {
        Self::open(&base_dir.join(DB_FILE_NAME))
    }

    // --- Save ---

    /// Store a codebook, replacing any previous one with the same key.
    pub fn save(&self, codebook: &Codebook) -> Result<()> {
        let key = codebook.key();
        let id = key.id();
        let tx = self.conn.unchecked_transaction()?;

        tx.execute("DELETE FROM codebooks WHERE key = ?1", [&id])?;
        tx.execute(
            "INSERT INTO codebooks (key, element_count, phase_states, threshold, weighting, source, total)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                key.element_count as i64,
                to_json(&key.phase_states)?,
                key.threshold,
                to_json(&key.weighting)?,
                to_json(&codebook.source())?,
                codebook.total_combinations() as i64,
            ],
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO codebook_entries (codebook_key, idx, states, phase, magnitude)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for entry in codebook.entries() {
                stmt.execute(params![
                    id,
                    entry.index as i64,
                    to_json(&entry.states)?,
                    entry.phase,
                    entry.magnitude,
                ])?;
            }
        }

        tx.commit()?;
        tracing::debug!("cached codebook {id} ({} entries)", codebook.len());
        Ok(())
    }

    // --- Load ---

    pub fn load(&self, key: &CodebookKey) -> Result<Option<Codebook>> {
        let id = key.id();
        let header: Option<(String, i64)> = self
            .conn
            .query_row(
                "SELECT source, total FROM codebooks WHERE key = ?1",
                [&id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((source, total)) = header else {
            return Ok(None);
        };
        let source: CodebookSource = from_json(&source)?;
        if source != key.source {
            return Err(StoreError::InvalidData(format!(
                "cached codebook {id} is tagged {}",
                source.as_str()
            )));
        }

        let mut stmt = self.conn.prepare(
            "SELECT idx, states, phase, magnitude FROM codebook_entries
             WHERE codebook_key = ?1 ORDER BY idx",
        )?;
        let rows: Vec<(i64, String, f64, f64)> = stmt
            .query_map([&id], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?
            .collect::<std::result::Result<_, _>>()?;

        let entries = rows
            .into_iter()
            .map(|(idx, states, phase, magnitude)| {
                Ok(CodebookEntry {
                    index: idx as usize,
                    states: from_json(&states)?,
                    phase,
                    magnitude,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let codebook = Codebook::from_parts(key.clone(), total as usize, entries)?;
        Ok(Some(codebook))
    }

    /// Load the generated codebook for these parameters, building and
    /// caching it on a miss. Imported tables are never returned here.
    pub fn get_or_build(
        &self,
        phase_states: &PhaseStateSet,
        element_count: usize,
        threshold: f64,
        weighting: SincWeighting,
    ) -> Result<Codebook> {
        let key = CodebookKey {
            phase_states: phase_states.as_slice().to_vec(),
            element_count,
            threshold,
            weighting,
            source: CodebookSource::Generated,
        };
        if let Some(codebook) = self.load(&key)? {
            tracing::info!("codebook cache hit: {}", key.id());
            return Ok(codebook);
        }
        tracing::info!("building codebook {}", key.id());
        let codebook = build_codebook_with(phase_states, element_count, threshold, weighting)?;
        self.save(&codebook)?;
        Ok(codebook)
    }

    pub fn list(&self) -> Result<Vec<CachedCodebook>> {
        let mut stmt = self.conn.prepare(
            "SELECT c.key, c.element_count, c.source, c.total, c.created_at,
                    (SELECT COUNT(*) FROM codebook_entries e WHERE e.codebook_key = c.key)
             FROM codebooks c ORDER BY c.created_at, c.key",
        )?;
        let rows: Vec<(String, i64, String, i64, String, i64)> = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ))
            })?
            .collect::<std::result::Result<_, _>>()?;

        rows.into_iter()
            .map(|(key, element_count, source, total, created_at, retained)| {
                Ok(CachedCodebook {
                    key,
                    element_count: element_count as usize,
                    source: from_json(&source)?,
                    retained: retained as usize,
                    total: total as usize,
                    created_at,
                })
            })
            .collect()
    }

    /// Returns whether a row was deleted.
    pub fn remove(&self, key: &CodebookKey) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM codebooks WHERE key = ?1", [key.id()])?;
        Ok(removed > 0)
    }
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| StoreError::InvalidData(e.to_string()))
}

fn from_json<T: serde::de::DeserializeOwned>(text: &str) -> Result<T> {
    serde_json::from_str(text)
        .map_err(|e| StoreError::InvalidData(format!("corrupt cache column '{text}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ris_core::build_codebook;
    use tempfile::TempDir;

    fn binary() -> PhaseStateSet {
        PhaseStateSet::new(vec![0.0, 180.0]).unwrap()
    }

    #[test]
    fn test_save_then_load() {
        let store = CodebookStore::open_in_memory().unwrap();
        let cb = build_codebook(&binary(), 4, 0.6).unwrap();
        store.save(&cb).unwrap();
        let loaded = store.load(&cb.key()).unwrap().unwrap();
        assert_eq!(loaded, cb);
    }

    #[test]
    fn test_load_miss() {
        let store = CodebookStore::open_in_memory().unwrap();
        let cb = build_codebook(&binary(), 4, 0.6).unwrap();
        assert!(store.load(&cb.key()).unwrap().is_none());
    }

    #[test]
    fn test_get_or_build_memoizes() {
        let store = CodebookStore::open_in_memory().unwrap();
        let first = store
            .get_or_build(&binary(), 4, 0.6, SincWeighting::Unit)
            .unwrap();
        let second = store
            .get_or_build(&binary(), 4, 0.6, SincWeighting::Unit)
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_distinct_keys_are_distinct_rows() {
        let store = CodebookStore::open_in_memory().unwrap();
        store
            .get_or_build(&binary(), 4, 0.6, SincWeighting::Unit)
            .unwrap();
        store
            .get_or_build(&binary(), 4, 0.4, SincWeighting::Unit)
            .unwrap();
        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 2);
        let retained: Vec<usize> = listed.iter().map(|c| c.retained).collect();
        assert!(retained.contains(&4));
        assert!(retained.contains(&12));
    }

    #[test]
    fn test_empty_codebook_round_trips() {
        let store = CodebookStore::open_in_memory().unwrap();
        let cb = store
            .get_or_build(&binary(), 4, 0.9, SincWeighting::Unit)
            .unwrap();
        assert!(cb.is_empty());
        let loaded = store.load(&cb.key()).unwrap().unwrap();
        assert!(loaded.is_empty());
        assert_eq!(loaded.total_combinations(), 16);
    }

    #[test]
    fn test_save_replaces_existing() {
        let store = CodebookStore::open_in_memory().unwrap();
        let cb = build_codebook(&binary(), 4, 0.6).unwrap();
        store.save(&cb).unwrap();
        store.save(&cb).unwrap();
        assert_eq!(store.list().unwrap().len(), 1);
        assert_eq!(store.list().unwrap()[0].retained, 4);
    }

    #[test]
    fn test_remove() {
        let store = CodebookStore::open_in_memory().unwrap();
        let cb = build_codebook(&binary(), 4, 0.6).unwrap();
        store.save(&cb).unwrap();
        assert!(store.remove(&cb.key()).unwrap());
        assert!(!store.remove(&cb.key()).unwrap());
        assert!(store.load(&cb.key()).unwrap().is_none());
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let cb = build_codebook(&binary(), 4, 0.6).unwrap();
        {
            let store = CodebookStore::open_in(dir.path()).unwrap();
            store.save(&cb).unwrap();
        }
        let store = CodebookStore::open_in(dir.path()).unwrap();
        assert_eq!(store.load(&cb.key()).unwrap(), Some(cb));
    }

    #[test]
    fn test_imported_table_does_not_shadow_generated() {
        let store = CodebookStore::open_in_memory().unwrap();
        let table = Codebook::from_table(
            binary(),
            4,
            0.6,
            SincWeighting::Unit,
            vec![(vec![0.0, 180.0, 180.0, 0.0], 0.0, None)],
        )
        .unwrap();
        store.save(&table).unwrap();

        let generated = store
            .get_or_build(&binary(), 4, 0.6, SincWeighting::Unit)
            .unwrap();
        assert_eq!(generated.source(), CodebookSource::Generated);
        assert_eq!(generated.len(), 4);

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().any(|c| c.source == CodebookSource::Table && c.retained == 1));

        let reloaded = store.load(&table.key()).unwrap().unwrap();
        assert_eq!(reloaded.source(), CodebookSource::Table);
        assert_eq!(reloaded.len(), 1);
    }

    #[test]
    fn test_remove_only_touches_matching_source() {
        let store = CodebookStore::open_in_memory().unwrap();
        let generated = build_codebook(&binary(), 4, 0.6).unwrap();
        let mut key = generated.key();
        store.save(&generated).unwrap();
        key.source = CodebookSource::Table;
        assert!(!store.remove(&key).unwrap());
        assert!(store.load(&generated.key()).unwrap().is_some());
    }
}
