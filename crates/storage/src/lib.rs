//! Sqlite-backed persistence plus the filesystem collaborators around a manual library.

use std::cell::{Cell, RefCell};
use std::path::Path;

use anyhow::Context as _;
use manuals_core::{LearningState, ScanScope, Settings};
use rusqlite::{Connection, OptionalExtension as _};

pub mod files;
pub mod sidecar;

pub use files::{CollisionPolicy, list_pdfs_in, rename_file, scan, scan_roots};
pub use sidecar::{load_sidecar, read_sidecar, write_sidecar};

/// Where the learning state is read from on start and written to after every mutation.
pub trait LearningBackend {
    fn load_learning(&self) -> anyhow::Result<LearningState>;
    fn save_learning(&self, state: &LearningState) -> anyhow::Result<()>;
}

impl<T: LearningBackend + ?Sized> LearningBackend for &T {
    fn load_learning(&self) -> anyhow::Result<LearningState> {
        (**self).load_learning()
    }

    fn save_learning(&self, state: &LearningState) -> anyhow::Result<()> {
        (**self).save_learning(state)
    }
}

#[derive(Debug)]
pub struct Storage {
    conn: Connection,
}

impl Storage {
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("open sqlite db at {}", path.as_ref().display()))?;
        let storage = Self { conn };
        storage.migrate()?;
        Ok(storage)
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
        let storage = Self { conn };
        storage.migrate()?;
        Ok(storage)
    }

    fn migrate(&self) -> anyhow::Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                scan_scope TEXT NOT NULL,
                library_roots_json TEXT NOT NULL
            );
            INSERT OR IGNORE INTO settings (id, scan_scope, library_roots_json)
            VALUES (1, 'recursive', '[]');

            CREATE TABLE IF NOT EXISTS learning_state (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                state_json TEXT NOT NULL,
                updated_at INTEGER NOT NULL DEFAULT (unixepoch())
            );
            "#,
        )?;

        self.add_column_if_missing("settings", "signature TEXT NOT NULL DEFAULT ''")?;
        self.add_column_if_missing("settings", "word_weight_cap INTEGER")?;
        Ok(())
    }

    fn add_column_if_missing(&self, table: &str, column_def: &str) -> anyhow::Result<()> {
        match self
            .conn
            .execute(&format!("ALTER TABLE {table} ADD COLUMN {column_def}"), [])
        {
            Ok(_) => Ok(()),
            Err(err) => {
                let msg = err.to_string();
                if msg.contains("duplicate column name") {
                    Ok(())
                } else {
                    Err(err).with_context(|| format!("add {table} column `{column_def}`"))
                }
            }
        }
    }

    pub fn load_settings(&self) -> anyhow::Result<Settings> {
        let row = self
            .conn
            .query_row(
                "SELECT scan_scope, library_roots_json, signature, word_weight_cap FROM settings WHERE id = 1",
                [],
                |row| {
                    let scan_scope: String = row.get(0)?;
                    let library_roots_json: String = row.get(1)?;
                    let signature: String = row.get(2)?;
                    let word_weight_cap: Option<i64> = row.get(3)?;
                    Ok((scan_scope, library_roots_json, signature, word_weight_cap))
                },
            )
            .optional()?;

        let (scan_scope, library_roots_json, signature, word_weight_cap) = match row {
            Some(value) => value,
            None => ("recursive".to_string(), "[]".to_string(), String::new(), None),
        };

        let scan_scope = scan_scope.parse::<ScanScope>().unwrap_or(ScanScope::Recursive);
        let library_roots: Vec<String> =
            serde_json::from_str(&library_roots_json).unwrap_or_else(|_| Vec::new());
        let word_weight_cap = word_weight_cap.and_then(|cap| u32::try_from(cap).ok());

        let mut settings = Settings {
            library_roots,
            scan_scope,
            signature,
            word_weight_cap,
        };
        settings.normalize();
        Ok(settings)
    }

    pub fn save_settings(&self, settings: &Settings) -> anyhow::Result<()> {
        let mut settings = settings.clone();
        settings.normalize();
        let library_roots_json = serde_json::to_string(&settings.library_roots)?;

        self.conn.execute(
            "UPDATE settings SET scan_scope = ?, library_roots_json = ?, signature = ?, word_weight_cap = ? WHERE id = 1",
            (
                settings.scan_scope.as_str(),
                library_roots_json,
                &settings.signature,
                settings.word_weight_cap.map(i64::from),
            ),
        )?;
        Ok(())
    }
}

impl LearningBackend for Storage {
    fn load_learning(&self) -> anyhow::Result<LearningState> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT state_json FROM learning_state WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        match json {
            Some(json) => serde_json::from_str(&json).context("decode learning state"),
            None => Ok(LearningState::default()),
        }
    }

    fn save_learning(&self, state: &LearningState) -> anyhow::Result<()> {
        let json = serde_json::to_string(state).context("encode learning state")?;
        self.conn.execute(
            r#"
            INSERT INTO learning_state (id, state_json, updated_at) VALUES (1, ?, unixepoch())
            ON CONFLICT(id) DO UPDATE SET state_json = excluded.state_json, updated_at = excluded.updated_at
            "#,
            [json],
        )?;
        Ok(())
    }
}

/// Keeps the learning state in memory only; counts writes so tests can assert on them.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: RefCell<LearningState>,
    saves: Cell<usize>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: LearningState) -> Self {
        Self {
            state: RefCell::new(state),
            saves: Cell::new(0),
        }
    }

    pub fn saves(&self) -> usize {
        self.saves.get()
    }

    pub fn snapshot(&self) -> LearningState {
        self.state.borrow().clone()
    }
}

impl LearningBackend for MemoryBackend {
    fn load_learning(&self) -> anyhow::Result<LearningState> {
        Ok(self.state.borrow().clone())
    }

    fn save_learning(&self, state: &LearningState) -> anyhow::Result<()> {
        *self.state.borrow_mut() = state.clone();
        self.saves.set(self.saves.get() + 1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use manuals_core::Pattern;

    #[test]
    fn settings_roundtrip() -> anyhow::Result<()> {
        let storage = Storage::open_in_memory()?;
        let mut settings = storage.load_settings()?;
        assert_eq!(settings, Settings::default());

        settings.scan_scope = ScanScope::Direct;
        settings.library_roots = vec!["/tmp".to_string()];
        settings.signature = "Catalogued".to_string();
        settings.word_weight_cap = Some(25);
        storage.save_settings(&settings)?;

        let settings2 = storage.load_settings()?;
        assert_eq!(settings2.scan_scope, ScanScope::Direct);
        assert_eq!(settings2.library_roots, vec!["/tmp".to_string()]);
        assert_eq!(settings2.signature, "Catalogued");
        assert_eq!(settings2.word_weight_cap, Some(25));
        Ok(())
    }

    #[test]
    fn migrate_is_idempotent() -> anyhow::Result<()> {
        let storage = Storage::open_in_memory()?;
        storage.migrate()?;
        storage.migrate()?;
        assert_eq!(storage.load_settings()?, Settings::default());
        Ok(())
    }

    #[test]
    fn learning_state_roundtrip() -> anyhow::Result<()> {
        let storage = Storage::open_in_memory()?;
        assert!(storage.load_learning()?.is_empty());

        let mut state = LearningState::default();
        state.brand_patterns.insert(
            "honda".to_string(),
            Pattern {
                count: 2,
                original_value: "Honda".to_string(),
                ..Pattern::default()
            },
        );
        state.completion_stats.total_saved = 2;
        storage.save_learning(&state)?;
        storage.save_learning(&state)?;

        assert_eq!(storage.load_learning()?, state);
        Ok(())
    }

    #[test]
    fn memory_backend_counts_saves() -> anyhow::Result<()> {
        let backend = MemoryBackend::new();
        let mut state = backend.load_learning()?;
        state.completion_stats.total_saved = 1;
        (&backend).save_learning(&state)?;
        assert_eq!(backend.saves(), 1);
        assert_eq!(backend.snapshot().completion_stats.total_saved, 1);
        Ok(())
    }
}
