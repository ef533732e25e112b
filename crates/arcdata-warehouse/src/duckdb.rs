//! `DuckDB` connection pool management.
//!
//! Every pooled handle is cloned from a single root connection so all handles
//! share one database instance, which keeps `:memory:` stores coherent and
//! avoids opening the same file twice from one process.
//!
//! Writers are serialized through [`DuckDbConnectionManager::acquire_writer`].
//! `DuckDB` aborts overlapping write transactions on cloned handles with a
//! conflict error, so every statement that mutates the store runs while the
//! pool's single write lock is held. Readers never take it.

use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ::duckdb::Connection;

use crate::WarehouseError;

/// Path value that selects an in-memory database.
pub const IN_MEMORY: &str = ":memory:";

struct PoolInner {
    db_path: PathBuf,
    max_pool_size: usize,
    root: Mutex<Connection>,
    idle: Mutex<Vec<Connection>>,
    writer: Mutex<()>,
}

/// A connection pool manager for `DuckDB` connections.
#[derive(Clone)]
pub struct DuckDbConnectionManager {
    inner: Arc<PoolInner>,
}

impl DuckDbConnectionManager {
    /// Open the database at `path` and create the pool around it.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or configured.
    pub fn open(path: impl Into<PathBuf>, max_pool_size: usize) -> Result<Self, ::duckdb::Error> {
        let db_path = path.into();
        let root = if db_path.as_os_str() == IN_MEMORY {
            Connection::open_in_memory()?
        } else {
            Connection::open(db_path.as_path())?
        };
        configure_connection(&root)?;

        Ok(Self {
            inner: Arc::new(PoolInner {
                db_path,
                max_pool_size: max_pool_size.max(1),
                root: Mutex::new(root),
                idle: Mutex::new(Vec::new()),
                writer: Mutex::new(()),
            }),
        })
    }

    /// Acquire a connection from the pool.
    ///
    /// # Errors
    /// Returns an error if a fresh handle cannot be cloned from the root
    /// connection or a pool lock is poisoned.
    pub fn acquire(&self) -> Result<PooledConnection, WarehouseError> {
        let reused = self
            .inner
            .idle
            .lock()
            .map_err(|_| WarehouseError::PoolPoisoned("idle connections"))?
            .pop();

        let connection = match reused {
            Some(connection) => connection,
            None => {
                let root = self
                    .inner
                    .root
                    .lock()
                    .map_err(|_| WarehouseError::PoolPoisoned("root connection"))?;
                let connection = root.try_clone()?;
                drop(root);
                configure_connection(&connection)?;
                connection
            }
        };

        Ok(PooledConnection {
            pool: Arc::clone(&self.inner),
            connection: Some(connection),
        })
    }

    /// Acquire a connection that holds the pool's write lock until dropped.
    ///
    /// # Errors
    /// Returns an error if the write lock is poisoned or no connection can be acquired.
    pub fn acquire_writer(&self) -> Result<WriteConnection<'_>, WarehouseError> {
        let lock = self
            .inner
            .writer
            .lock()
            .map_err(|_| WarehouseError::PoolPoisoned("writer"))?;
        let connection = self.acquire()?;
        Ok(WriteConnection {
            connection,
            _lock: lock,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        self.inner.db_path.as_path()
    }

    /// Number of idle connections currently parked in the pool.
    #[must_use]
    pub fn idle_len(&self) -> usize {
        self.inner
            .idle
            .lock()
            .map_or(0, |idle| idle.len())
    }
}

/// A pooled connection that returns to the pool when dropped.
pub struct PooledConnection {
    pool: Arc<PoolInner>,
    connection: Option<Connection>,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        self.connection
            .as_ref()
            .expect("pooled connection unexpectedly missing")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.connection
            .as_mut()
            .expect("pooled connection unexpectedly missing")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };

        // A poisoned pool still hands out its parked handles.
        let mut idle = self
            .pool
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if idle.len() < self.pool.max_pool_size {
            idle.push(connection);
        }
    }
}

/// A pooled connection holding the write lock. Statements run through it
/// never overlap with another writer.
pub struct WriteConnection<'a> {
    connection: PooledConnection,
    _lock: MutexGuard<'a, ()>,
}

impl Deref for WriteConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        &self.connection
    }
}

fn configure_connection(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch("PRAGMA disable_progress_bar;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn released_connections_are_reused_up_to_the_pool_size() {
        let manager = DuckDbConnectionManager::open(IN_MEMORY, 1).expect("open");

        let first = manager.acquire().expect("first");
        let second = manager.acquire().expect("second");
        drop(first);
        drop(second);

        assert_eq!(manager.idle_len(), 1);
    }

    #[test]
    fn in_memory_handles_share_one_database() {
        let manager = DuckDbConnectionManager::open(IN_MEMORY, 2).expect("open");

        let writer = manager.acquire().expect("writer");
        writer
            .execute_batch("CREATE TABLE sample (id INTEGER); INSERT INTO sample VALUES (7);")
            .expect("create");

        let reader = manager.acquire().expect("reader");
        let id: i32 = reader
            .query_row("SELECT id FROM sample", [], |row| row.get(0))
            .expect("select");
        assert_eq!(id, 7);
    }

    #[test]
    fn writers_wait_for_each_other() {
        let manager = DuckDbConnectionManager::open(IN_MEMORY, 2).expect("open");
        let writer = manager.acquire_writer().expect("writer");

        assert!(manager.inner.writer.try_lock().is_err());
        let reader = manager.acquire().expect("readers are not blocked");
        drop(reader);

        drop(writer);
        assert!(manager.inner.writer.try_lock().is_ok());
    }

    #[test]
    fn poisoned_pool_reports_an_error_instead_of_panicking() {
        let manager = DuckDbConnectionManager::open(IN_MEMORY, 2).expect("open");
        let shared = manager.clone();
        let _ = std::thread::spawn(move || {
            let _idle = shared.inner.idle.lock().expect("idle");
            panic!("holder panics");
        })
        .join();

        let error = manager.acquire().err().expect("poisoned pool");
        assert!(matches!(error, WarehouseError::PoolPoisoned("idle connections")));
        assert_eq!(manager.idle_len(), 0);
    }
}
