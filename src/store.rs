use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::StoreError;
use crate::session::Session;

pub const CONFIG_KEY: &str = "config";
pub const SESSIONS_KEY: &str = "sessions";

/// Everything that outlives a single run: the settings and the session
/// history, oldest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppContext {
    pub config: Config,
    pub sessions: Vec<Session>,
}

/// Upsert `session` into the history keyed by its `start` timestamp. The
/// updated session always moves to the end. Sessions without a start are
/// not stored.
pub fn reconcile(mut ctx: AppContext, session: &Session) -> AppContext {
    let Some(start) = session.start else {
        return ctx;
    };
    ctx.sessions.retain(|s| s.start != Some(start));
    ctx.sessions.push(session.clone());
    ctx
}

/// Percentage of rows answered with the exact sum, rounded.
pub fn score(session: &Session) -> u32 {
    let total = session.questions.len();
    if total == 0 {
        return 0;
    }
    let correct = (0..total).filter(|&row| session.is_correct(row)).count();
    ((correct as f64 / total as f64) * 100.0).round() as u32
}

/// Minimal key-value persistence; values are JSON text.
pub trait KvStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    /// Write every entry or none of them.
    fn put_all(&mut self, entries: &[(&str, String)]) -> Result<(), StoreError>;
}

/// SQLite backed store, one row per key.
#[derive(Debug)]
pub struct SqliteKv {
    conn: Connection,
}

impl SqliteKv {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            "#,
            [],
        )?;
        Ok(Self { conn })
    }
}

impl KvStore for SqliteKv {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn put_all(&mut self, entries: &[(&str, String)]) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        for (key, value) in entries {
            tx.execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

/// In-process store for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryKv {
    entries: HashMap<String, String>,
}

impl KvStore for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn put_all(&mut self, entries: &[(&str, String)]) -> Result<(), StoreError> {
        for (key, value) in entries {
            self.entries.insert(key.to_string(), value.clone());
        }
        Ok(())
    }
}

fn read_or_default<T>(store: &dyn KvStore, key: &str) -> T
where
    T: Default + for<'de> Deserialize<'de>,
{
    match store.get(key) {
        Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|err| {
            warn!(key, %err, "stored value is malformed, using defaults");
            T::default()
        }),
        Ok(None) => T::default(),
        Err(err) => {
            warn!(key, %err, "could not read stored value, using defaults");
            T::default()
        }
    }
}

/// Open the SQLite state file, or keep state in memory for this run when
/// the file cannot be used (not a database, unwritable directory).
pub fn open_store_or_memory(path: &Path) -> Box<dyn KvStore> {
    match SqliteKv::open(path) {
        Ok(kv) => Box::new(kv),
        Err(err) => {
            warn!(path = %path.display(), %err, "state file unusable, nothing will be saved this run");
            Box::new(MemoryKv::default())
        }
    }
}

/// Read config and history, falling back to defaults for anything missing
/// or unreadable.
pub fn load_context(store: &dyn KvStore) -> AppContext {
    AppContext {
        config: read_or_default(store, CONFIG_KEY),
        sessions: read_or_default(store, SESSIONS_KEY),
    }
}

pub fn save_context(store: &mut dyn KvStore, ctx: &AppContext) -> Result<(), StoreError> {
    let config = serde_json::to_string(&ctx.config)?;
    let sessions = serde_json::to_string(&ctx.sessions)?;
    store.put_all(&[(CONFIG_KEY, config), (SESSIONS_KEY, sessions)])
}

/// Owns the app context and its store. `update` is the only way to change
/// the context and always writes the result through.
pub struct ContextHandle {
    ctx: AppContext,
    store: Box<dyn KvStore>,
}

impl ContextHandle {
    pub fn open(store: Box<dyn KvStore>) -> Self {
        let ctx = load_context(store.as_ref());
        debug!(sessions = ctx.sessions.len(), "loaded app context");
        Self { ctx, store }
    }

    pub fn snapshot(&self) -> &AppContext {
        &self.ctx
    }

    /// Apply `f` and persist. On a write failure the in-memory context keeps
    /// the new value so the next successful write catches up.
    pub fn update<F>(&mut self, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(AppContext) -> AppContext,
    {
        let next = f(std::mem::take(&mut self.ctx));
        self.ctx = next;
        save_context(self.store.as_mut(), &self.ctx).inspect_err(|err| {
            warn!(%err, "failed to persist app context");
        })
    }

    pub fn save_session(&mut self, session: &Session) -> Result<(), StoreError> {
        self.update(|ctx| reconcile(ctx, session))
    }
}
