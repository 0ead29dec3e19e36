//! SQLite-backed match history and outcome log.
//!
//! Rows are append-only. Each row carries its full record as JSON alongside
//! the columns used for lookups, so schema changes to the records do not
//! require migrations.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, OptionalExtension, params};

use super::{MatchHistoryStore, OutcomeStore, StoreError};
use crate::{CollaborationOutcome, HistoryFilter, MatchHistoryEntry, ProfileId};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS match_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    subject_id TEXT NOT NULL,
    candidate_id TEXT NOT NULL,
    score INTEGER NOT NULL,
    computed_at TEXT NOT NULL,
    entry TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS match_history_pair
    ON match_history (subject_id, candidate_id, id);
CREATE TABLE IF NOT EXISTS collaboration_outcomes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    connection_id TEXT NOT NULL,
    success_rating INTEGER NOT NULL,
    recorded_at TEXT NOT NULL,
    payload TEXT NOT NULL
);
";

/// History and outcome store persisted in a SQLite database.
#[derive(Debug)]
pub struct SqliteMatchStore {
    connection: Mutex<Connection>,
}

impl SqliteMatchStore {
    /// Open (creating if needed) the database at `path`.
    ///
    /// # Errors
    /// Returns [`StoreError::Sqlite`] when the file cannot be opened or the
    /// schema cannot be created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let connection = Connection::open(path).map_err(|source| StoreError::Sqlite {
            operation: "open",
            source,
        })?;
        Self::with_connection(connection)
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    /// Returns [`StoreError::Sqlite`] when the schema cannot be created.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let connection = Connection::open_in_memory().map_err(|source| StoreError::Sqlite {
            operation: "open",
            source,
        })?;
        Self::with_connection(connection)
    }

    fn with_connection(connection: Connection) -> Result<Self, StoreError> {
        connection
            .execute_batch(SCHEMA)
            .map_err(|source| StoreError::Sqlite {
                operation: "create schema",
                source,
            })?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.connection
            .lock()
            .map_err(|_| StoreError::Poisoned { store: "sqlite" })
    }
}

fn decode_entry(json: &str) -> Result<MatchHistoryEntry, StoreError> {
    serde_json::from_str(json).map_err(|source| StoreError::Encode {
        what: "match history entry",
        source,
    })
}

impl MatchHistoryStore for SqliteMatchStore {
    fn latest(
        &self,
        subject: &ProfileId,
        candidate: &ProfileId,
    ) -> Result<Option<MatchHistoryEntry>, StoreError> {
        let connection = self.lock()?;
        let row: Option<String> = connection
            .query_row(
                "SELECT entry FROM match_history
                 WHERE subject_id = ?1 AND candidate_id = ?2
                 ORDER BY id DESC LIMIT 1",
                params![subject.as_str(), candidate.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|source| StoreError::Sqlite {
                operation: "select latest",
                source,
            })?;
        row.as_deref().map(decode_entry).transpose()
    }

    fn append(&self, entry: &MatchHistoryEntry) -> Result<(), StoreError> {
        let json = serde_json::to_string(entry).map_err(|source| StoreError::Encode {
            what: "match history entry",
            source,
        })?;
        let result = &entry.result;
        self.lock()?
            .execute(
                "INSERT INTO match_history
                 (subject_id, candidate_id, score, computed_at, entry)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    result.subject_id.as_str(),
                    result.candidate_id.as_str(),
                    result.score,
                    result.computed_at.to_rfc3339(),
                    json
                ],
            )
            .map_err(|source| StoreError::Sqlite {
                operation: "insert history",
                source,
            })?;
        Ok(())
    }

    fn history(
        &self,
        subject: &ProfileId,
        filter: &HistoryFilter,
    ) -> Result<Vec<MatchHistoryEntry>, StoreError> {
        let connection = self.lock()?;
        let mut statement = connection
            .prepare("SELECT entry FROM match_history WHERE subject_id = ?1 ORDER BY id DESC")
            .map_err(|source| StoreError::Sqlite {
                operation: "prepare history",
                source,
            })?;
        let rows = statement
            .query_map(params![subject.as_str()], |row| row.get::<_, String>(0))
            .map_err(|source| StoreError::Sqlite {
                operation: "select history",
                source,
            })?;
        let mut entries = Vec::new();
        for row in rows {
            let json = row.map_err(|source| StoreError::Sqlite {
                operation: "read history row",
                source,
            })?;
            entries.push(decode_entry(&json)?);
        }
        entries.sort_by(|a, b| b.result.computed_at.cmp(&a.result.computed_at));
        Ok(filter.apply(entries))
    }
}

impl OutcomeStore for SqliteMatchStore {
    fn append_outcome(&self, outcome: &CollaborationOutcome) -> Result<(), StoreError> {
        let json = serde_json::to_string(outcome).map_err(|source| StoreError::Encode {
            what: "collaboration outcome",
            source,
        })?;
        self.lock()?
            .execute(
                "INSERT INTO collaboration_outcomes
                 (connection_id, success_rating, recorded_at, payload)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    outcome.connection_id,
                    outcome.success_rating,
                    outcome.recorded_at.to_rfc3339(),
                    json
                ],
            )
            .map_err(|source| StoreError::Sqlite {
                operation: "insert outcome",
                source,
            })?;
        Ok(())
    }

    fn outcomes(&self) -> Result<Vec<CollaborationOutcome>, StoreError> {
        let connection = self.lock()?;
        let mut statement = connection
            .prepare("SELECT payload FROM collaboration_outcomes ORDER BY id")
            .map_err(|source| StoreError::Sqlite {
                operation: "prepare outcomes",
                source,
            })?;
        let rows = statement
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|source| StoreError::Sqlite {
                operation: "select outcomes",
                source,
            })?;
        let mut outcomes = Vec::new();
        for row in rows {
            let json = row.map_err(|source| StoreError::Sqlite {
                operation: "read outcome row",
                source,
            })?;
            outcomes.push(serde_json::from_str(&json).map_err(|source| {
                StoreError::Encode {
                    what: "collaboration outcome",
                    source,
                }
            })?);
        }
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{history_entry, outcome};
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[fixture]
    fn database() -> (TempDir, std::path::PathBuf) {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("tandem.db");
        (dir, path)
    }

    #[rstest]
    fn history_survives_reopening(database: (TempDir, std::path::PathBuf)) {
        let (_dir, path) = database;
        let entry = history_entry("s", "c", 72, 3);
        {
            let store = SqliteMatchStore::open(&path).expect("open store");
            store.append(&history_entry("s", "c", 60, 0)).expect("append");
            store.append(&entry).expect("append");
        }
        let store = SqliteMatchStore::open(&path).expect("reopen store");
        let latest = store
            .latest(&ProfileId::new("s"), &ProfileId::new("c"))
            .expect("read latest");
        assert_eq!(latest, Some(entry));

        let all = store
            .history(&ProfileId::new("s"), &HistoryFilter::default())
            .expect("read history");
        assert_eq!(all.iter().map(|e| e.result.score).collect::<Vec<_>>(), [72, 60]);
    }

    #[rstest]
    fn missing_pair_has_no_latest_entry() {
        let store = SqliteMatchStore::open_in_memory().expect("open store");
        let latest = store
            .latest(&ProfileId::new("s"), &ProfileId::new("nobody"))
            .expect("read latest");
        assert!(latest.is_none());
    }

    #[rstest]
    fn outcomes_round_trip_through_sqlite() {
        let store = SqliteMatchStore::open_in_memory().expect("open store");
        let recorded = outcome("conn-1", 5);
        store.append_outcome(&recorded).expect("append outcome");
        assert_eq!(store.outcomes().expect("read outcomes"), vec![recorded]);
    }
}
