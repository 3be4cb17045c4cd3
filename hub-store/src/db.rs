//! One SQLite file, one writer connection guarded by a `Mutex` (matching
//! `pmoplaylist::PersistenceManager`) and a small fixed-size pool of
//! read-only connections so reads never queue behind the writer — spec.md
//! §9's "one writer pool and one reader pool to avoid SQLite writer
//! contention." Migrations are idempotent `CREATE TABLE IF NOT EXISTS`
//! statements run at open time against the writer connection.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Reader connections held under WAL, each with its own `Mutex` so readers
/// only contend with each other, never with the writer. `checkout` hands
/// back a guard round-robin rather than always racing for the first slot.
struct ReaderPool {
    conns: Vec<Mutex<Connection>>,
    next: AtomicUsize,
}

const READER_POOL_SIZE: usize = 4;

impl ReaderPool {
    fn open(open_one: impl Fn() -> Result<Connection>) -> Result<Self> {
        let mut conns = Vec::with_capacity(READER_POOL_SIZE);
        for _ in 0..READER_POOL_SIZE {
            conns.push(Mutex::new(open_one()?));
        }
        Ok(Self {
            conns,
            next: AtomicUsize::new(0),
        })
    }

    fn checkout(&self) -> std::sync::MutexGuard<'_, Connection> {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.conns.len();
        self.conns[idx].lock().unwrap()
    }
}

#[derive(Clone)]
pub struct Store {
    pub(crate) conn: Arc<Mutex<Connection>>,
    readers: Arc<ReaderPool>,
}

impl Store {
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(StoreError::Directory)?;
        }
        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", true)?;
        run_migrations(&conn)?;
        let readers = ReaderPool::open(|| {
            let reader = Connection::open(db_path)?;
            reader.pragma_update(None, "query_only", true)?;
            Ok(reader)
        })?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            readers: Arc::new(readers),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        // A private in-memory database is only visible through the
        // connection that created it, so the reader pool can't open its
        // own connections against the same file as `open` does. Tests use
        // this constructor and only ever exercise a single connection's
        // worth of concurrency, so the reader pool here simply shares the
        // writer connection under the same mutex rather than a second,
        // unreachable in-memory database.
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", true)?;
        run_migrations(&conn)?;
        let conn = Arc::new(Mutex::new(conn));
        Ok(Self {
            conn: conn.clone(),
            readers: Arc::new(ReaderPool {
                conns: Vec::new(),
                next: AtomicUsize::new(0),
            }),
        })
    }

    /// Checks out a connection for a read-only query. Falls back to the
    /// writer connection when the reader pool has no connections of its own
    /// (the in-memory constructor used by tests).
    pub(crate) fn read(&self) -> std::sync::MutexGuard<'_, Connection> {
        if self.readers.conns.is_empty() {
            self.conn.lock().unwrap()
        } else {
            self.readers.checkout()
        }
    }

    /// Checks out the single writer connection for inserts/updates/deletes.
    pub(crate) fn write(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }
}

fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS scenes (
            id TEXT PRIMARY KEY,
            body TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS scene_executions (
            id TEXT PRIMARY KEY,
            scene_id TEXT NOT NULL,
            idempotency_key TEXT,
            body TEXT NOT NULL,
            started_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_executions_scene ON scene_executions(scene_id);
        CREATE INDEX IF NOT EXISTS idx_executions_idem_key ON scene_executions(idempotency_key);

        CREATE TABLE IF NOT EXISTS routines (
            id TEXT PRIMARY KEY,
            body TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS jobs (
            id TEXT PRIMARY KEY,
            routine_id TEXT NOT NULL,
            scheduled_for INTEGER NOT NULL,
            status TEXT NOT NULL,
            body TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE(routine_id, scheduled_for)
        );
        CREATE INDEX IF NOT EXISTS idx_jobs_status_scheduled ON jobs(status, scheduled_for);
        CREATE INDEX IF NOT EXISTS idx_jobs_routine ON jobs(routine_id);

        CREATE TABLE IF NOT EXISTS holidays (
            id TEXT PRIMARY KEY,
            date TEXT NOT NULL,
            body TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_holidays_date ON holidays(date);

        CREATE TABLE IF NOT EXISTS music_sets (
            id TEXT PRIMARY KEY,
            body TEXT NOT NULL,
            deleted INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS cloud_tokens (
            provider TEXT PRIMARY KEY,
            body TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS seen_hosts (
            host TEXT PRIMARY KEY,
            last_seen_at INTEGER NOT NULL
        );
        ",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_in_memory_and_runs_migrations_twice() {
        let store = Store::open_in_memory().unwrap();
        // Re-running migrations against the same connection must be a no-op.
        run_migrations(&store.conn.lock().unwrap()).unwrap();
    }
}
