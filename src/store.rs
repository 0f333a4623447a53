// ============================================================================
// Store : snapshot persistant (SQLite)
// ============================================================================
// Une table "snapshot" indexée par nom d'indicateur, payload JSON en texte.
// Chaque écriture remplace toute la table dans une seule transaction : un
// lecteur voit l'ancien snapshot ou le nouveau, jamais un mélange.
//
// Schéma :
// - snapshot : name (PK), payload (JSON de Value), error, position
// - snapshot_meta : clé/valeur (taken_at au format RFC 3339)
// ============================================================================

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::FetchError;
use crate::models::{Entry, Registry, Shape, Snapshot, Value};

const TAKEN_AT_KEY: &str = "taken_at";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode value for {name}: {source}")]
    Encode {
        name: String,
        source: serde_json::Error,
    },

    #[error("invalid snapshot timestamp '{0}'")]
    Timestamp(String),

    #[error("store connection poisoned")]
    Poisoned,
}

/// Store SQLite du dernier snapshot
///
/// CONCEPT RUST : Mutex<Connection>
/// - rusqlite::Connection n'est pas Sync
/// - Le Mutex permet de partager le store entre le worker et l'UI
pub struct SnapshotStore {
    conn: Mutex<Connection>,
}

impl SnapshotStore {
    /// Ouvre (ou crée) la base à `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        // WAL : les lectures ne bloquent pas pendant l'écriture du snapshot
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        info!(path = %path.display(), "Opened snapshot store");
        Self::init(conn)
    }

    /// Base en mémoire (tests)
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS snapshot (
                name TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                error TEXT,
                position INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS snapshot_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Remplace tout le snapshot stocké
    pub fn replace(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        // Encode avant d'ouvrir la transaction
        let rows = snapshot
            .iter()
            .enumerate()
            .map(|(position, (name, entry))| {
                let payload = entry.value.to_payload().map_err(|source| StoreError::Encode {
                    name: name.to_string(),
                    source,
                })?;
                Ok((name, payload, entry.error.as_deref(), position as i64))
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM snapshot", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO snapshot (name, payload, error, position) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(name) DO UPDATE SET payload = excluded.payload,
                     error = excluded.error, position = excluded.position",
            )?;
            for (name, payload, error, position) in &rows {
                stmt.execute(params![name, payload, error, position])?;
            }
        }
        tx.execute(
            "INSERT INTO snapshot_meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![TAKEN_AT_KEY, snapshot.taken_at.to_rfc3339()],
        )?;
        tx.commit()?;

        debug!(entries = rows.len(), "Snapshot persisted");
        Ok(())
    }

    /// Lit le snapshot stocké
    ///
    /// Date et lignes sont lues dans la même transaction : un `replace`
    /// concurrent (autre process sur le même fichier) est vu en entier ou
    /// pas du tout.
    ///
    /// Un payload illisible, ou d'une autre forme que celle attendue par le
    /// registre, devient le placeholder de la forme attendue (scalaire si
    /// l'indicateur est inconnu). Seules les erreurs SQLite remontent.
    pub fn load(&self, registry: &Registry) -> Result<Option<Snapshot>, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let Some(taken_at) = read_taken_at(&tx)? else {
            return Ok(None);
        };

        let rows = {
            let mut stmt = tx.prepare("SELECT name, payload, error FROM snapshot ORDER BY position, name")?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            })?;
            let collected = rows.collect::<Result<Vec<_>, _>>()?;
            collected
        };
        tx.commit()?;

        let mut snapshot = Snapshot::new(taken_at);
        for (name, payload, error) in rows {
            let expected = registry.get(&name).map(|i| i.shape());
            let entry = decode_entry(&name, &payload, error, expected);
            snapshot.insert(name, entry);
        }

        debug!(entries = snapshot.len(), "Snapshot loaded");
        Ok(Some(snapshot))
    }
}

fn read_taken_at(conn: &Connection) -> Result<Option<DateTime<Utc>>, StoreError> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM snapshot_meta WHERE key = ?1",
            params![TAKEN_AT_KEY],
            |row| row.get(0),
        )
        .optional()?;

    raw.map(|raw| {
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| StoreError::Timestamp(raw))
    })
    .transpose()
}

/// Payload stocké → entrée ; `expected` = forme du registre si connue
fn decode_entry(name: &str, payload: &str, error: Option<String>, expected: Option<Shape>) -> Entry {
    let shape = expected.unwrap_or(Shape::Scalar);
    match Value::from_payload(payload) {
        Ok(value) if expected.map_or(true, |shape| value.shape() == shape) => Entry { value, error },
        Ok(value) => {
            let e = FetchError::ShapeMismatch { expected: shape, actual: value.shape() };
            warn!(indicator = %name, error = %e, "Stored value has the wrong shape, using placeholder");
            Entry::failed(Value::placeholder(shape), format!("stale stored value: {}", e))
        }
        Err(e) => {
            warn!(indicator = %name, error = %e, "Corrupt stored payload, using placeholder");
            Entry::failed(Value::placeholder(shape), format!("corrupt stored value: {}", e))
        }
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, Indicator, Source};
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn registry() -> Registry {
        Registry::new(vec![
            Indicator::new("A", Category::Risk, Source::Quote { symbol: "A".to_string() }),
            Indicator::new("S&P", Category::Geo, Source::QuoteHistory { symbol: "^GSPC".to_string() }),
        ])
        .unwrap()
    }

    fn sample() -> Snapshot {
        let mut snapshot = Snapshot::new(Utc.with_ymd_and_hms(2025, 7, 19, 12, 0, 0).unwrap());
        snapshot.insert("A", Entry::ok(Value::scalar(5.0)));
        snapshot.insert("S&P", Entry::ok(Value::triple(Some(6268.56), Some(6296.79), None)));
        snapshot.insert("B", Entry::failed(Value::Scalar(None), "HTTP status 503"));
        snapshot
    }

    #[test]
    fn test_empty_store() {
        let store = SnapshotStore::open_in_memory().unwrap();
        assert!(store.load(&registry()).unwrap().is_none());
    }

    #[test]
    fn test_round_trip() {
        let store = SnapshotStore::open_in_memory().unwrap();
        let snapshot = sample();
        store.replace(&snapshot).unwrap();

        let loaded = store.load(&registry()).unwrap().unwrap();
        assert_eq!(loaded, snapshot);
    }

    #[test]
    fn test_replace_drops_previous_rows() {
        let store = SnapshotStore::open_in_memory().unwrap();
        store.replace(&sample()).unwrap();

        let mut next = Snapshot::new(Utc.with_ymd_and_hms(2025, 7, 19, 13, 0, 0).unwrap());
        next.insert("A", Entry::ok(Value::scalar(6.0)));
        store.replace(&next).unwrap();

        let loaded = store.load(&registry()).unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.value("A"), Some(&Value::scalar(6.0)));
        assert_eq!(loaded.taken_at, next.taken_at);
    }

    /// Écrit un payload brut, comme une ancienne version de l'app
    fn write_raw(store: &SnapshotStore, name: &str, payload: &str) {
        store
            .conn()
            .unwrap()
            .execute(
                "INSERT INTO snapshot (name, payload, error, position)
                 VALUES (?1, ?2, NULL, (SELECT COALESCE(MAX(position), -1) + 1 FROM snapshot))
                 ON CONFLICT(name) DO UPDATE SET payload = excluded.payload",
                params![name, payload],
            )
            .unwrap();
    }

    #[test]
    fn test_corrupt_payload_becomes_placeholder() {
        let store = SnapshotStore::open_in_memory().unwrap();
        store.replace(&sample()).unwrap();
        write_raw(&store, "S&P", "{legacy");
        write_raw(&store, "Unknown", "'nan'");

        let loaded = store.load(&registry()).unwrap().unwrap();
        assert_eq!(loaded.value("A"), Some(&Value::scalar(5.0)));
        assert_eq!(loaded.value("S&P"), Some(&Value::placeholder(Shape::Triple)));
        assert_eq!(loaded.value("Unknown"), Some(&Value::Scalar(None)));
        assert!(loaded.get("S&P").unwrap().error.is_some());
    }

    #[test]
    fn test_wrong_shape_becomes_placeholder() {
        let store = SnapshotStore::open_in_memory().unwrap();
        store.replace(&sample()).unwrap();
        // Scalaire stocké pour un indicateur devenu triplet, et l'inverse
        write_raw(&store, "S&P", "1.0");
        write_raw(&store, "A", "[1.0, 2.0, null]");
        write_raw(&store, "Unknown", "[1.0, 2.0, 3.0]");

        let loaded = store.load(&registry()).unwrap().unwrap();

        assert_eq!(loaded.value("S&P"), Some(&Value::placeholder(Shape::Triple)));
        assert!(loaded.get("S&P").unwrap().error.as_deref().unwrap().contains("Triple"));
        assert_eq!(loaded.value("A"), Some(&Value::Scalar(None)));
        // Pas de forme attendue hors registre : valeur gardée telle quelle
        assert_eq!(
            loaded.value("Unknown"),
            Some(&Value::triple(Some(1.0), Some(2.0), Some(3.0)))
        );
    }

    #[test]
    fn test_load_sees_whole_replace_from_other_connection() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("econ.db");
        let reader = SnapshotStore::open(&path).unwrap();
        let writer = SnapshotStore::open(&path).unwrap();

        writer.replace(&sample()).unwrap();
        let mut next = Snapshot::new(Utc.with_ymd_and_hms(2025, 7, 19, 13, 0, 0).unwrap());
        next.insert("A", Entry::ok(Value::scalar(6.0)));
        writer.replace(&next).unwrap();

        let loaded = reader.load(&registry()).unwrap().unwrap();
        assert_eq!(loaded, next);
    }

    #[test]
    fn test_reopen_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("econ.db");

        {
            let store = SnapshotStore::open(&path).unwrap();
            store.replace(&sample()).unwrap();
        }

        let store = SnapshotStore::open(&path).unwrap();
        let loaded = store.load(&registry()).unwrap().unwrap();
        assert_eq!(loaded, sample());
    }
}
