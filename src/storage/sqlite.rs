//! SQLite FTS5 passage store.

use std::io::BufRead;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Deserialize;
use tracing::{debug, info};
use unicode_segmentation::UnicodeSegmentation;

use super::Collection;
use crate::error::{RetrievalError, StorageError};
use crate::retrieval::{Passage, Retriever};

const SCHEMA: &str = "
CREATE VIRTUAL TABLE IF NOT EXISTS passages USING fts5(
    collection UNINDEXED,
    text,
    tokenize = 'unicode61 remove_diacritics 2'
);
";

/// One line of an import file: either a bare string or an object with `text`.
#[derive(Deserialize)]
#[serde(untagged)]
enum ImportLine {
    Text(String),
    Record { text: String },
}

/// Turns free text into an FTS5 query of OR-ed quoted terms.
///
/// Returns `None` if the text contains no words.
fn fts_query(text: &str) -> Option<String> {
    let terms: Vec<String> = text
        .unicode_words()
        .map(|w| format!("\"{}\"", w.replace('"', "")))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

/// Passage store over a single SQLite connection.
pub struct CorpusStore {
    conn: Connection,
}

impl CorpusStore {
    /// Opens (or creates) a database file. Does not create the schema.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Database`] if the file cannot be opened.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    /// Opens an in-memory store with the schema created.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Database`] on SQLite failure.
    pub fn in_memory() -> Result<Self, StorageError> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.init()?;
        Ok(store)
    }

    /// Creates the schema if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Database`] on SQLite failure.
    pub fn init(&self) -> Result<(), StorageError> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Returns `true` if the schema exists.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Database`] on SQLite failure.
    pub fn is_initialized(&self) -> Result<bool, StorageError> {
        let found: Option<String> = self
            .conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'passages'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn ensure_initialized(&self) -> Result<(), StorageError> {
        if self.is_initialized()? {
            Ok(())
        } else {
            Err(StorageError::NotInitialized)
        }
    }

    /// Inserts one passage and returns its row id.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotInitialized`] or a database error.
    pub fn insert(&self, collection: Collection, text: &str) -> Result<i64, StorageError> {
        self.ensure_initialized()?;
        self.conn.execute(
            "INSERT INTO passages (collection, text) VALUES (?1, ?2)",
            params![collection.as_str(), text],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Imports JSON-lines passages in one transaction.
    ///
    /// Blank lines are skipped. Any malformed line aborts the import and
    /// nothing is written.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Import`] with the 1-based line number of the
    /// first bad line, or an I/O or database error.
    pub fn import_jsonl<R: BufRead>(
        &mut self,
        collection: Collection,
        reader: R,
    ) -> Result<usize, StorageError> {
        self.ensure_initialized()?;
        let tx = self.conn.transaction()?;
        let mut imported = 0;
        {
            let mut stmt = tx.prepare("INSERT INTO passages (collection, text) VALUES (?1, ?2)")?;
            for (idx, line) in reader.lines().enumerate() {
                let line = line?;
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let text = match serde_json::from_str::<ImportLine>(trimmed) {
                    Ok(ImportLine::Text(text) | ImportLine::Record { text }) => text,
                    Err(e) => {
                        return Err(StorageError::Import {
                            line: idx + 1,
                            message: e.to_string(),
                        });
                    }
                };
                if text.trim().is_empty() {
                    return Err(StorageError::Import {
                        line: idx + 1,
                        message: "passage text is empty".to_string(),
                    });
                }
                stmt.execute(params![collection.as_str(), text])?;
                imported += 1;
            }
        }
        tx.commit()?;
        info!(%collection, imported, "imported passages");
        Ok(imported)
    }

    /// Number of passages in a collection.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotInitialized`] or a database error.
    pub fn count(&self, collection: Collection) -> Result<usize, StorageError> {
        self.ensure_initialized()?;
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM passages WHERE collection = ?1",
            params![collection.as_str()],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(n).unwrap_or(0))
    }

    /// BM25 search within a collection, best match first.
    ///
    /// Scores are negated BM25 ranks, so higher is better.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotInitialized`] or a database error.
    pub fn search(
        &self,
        collection: Collection,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Passage>, StorageError> {
        self.ensure_initialized()?;
        let Some(fts) = fts_query(query) else {
            return Ok(Vec::new());
        };
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut stmt = self.conn.prepare(
            "SELECT text, bm25(passages) AS score
             FROM passages
             WHERE passages MATCH ?1 AND collection = ?2
             ORDER BY score
             LIMIT ?3",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![fts, collection.as_str(), limit], |row| {
            let text: String = row.get(0)?;
            let rank: f64 = row.get(1)?;
            Ok(Passage::new(text, -rank))
        })?;

        let passages = rows.collect::<Result<Vec<_>, _>>()?;
        debug!(%collection, hits = passages.len(), "fts search");
        Ok(passages)
    }
}

impl std::fmt::Debug for CorpusStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorpusStore")
            .field("path", &self.conn.path())
            .finish()
    }
}

/// [`Retriever`] over one collection of a shared [`CorpusStore`].
///
/// SQLite work runs on the blocking thread pool.
#[derive(Debug, Clone)]
pub struct SqliteRetriever {
    store: Arc<Mutex<CorpusStore>>,
    collection: Collection,
}

impl SqliteRetriever {
    /// Creates a retriever for `collection`.
    #[must_use]
    pub const fn new(store: Arc<Mutex<CorpusStore>>, collection: Collection) -> Self {
        Self { store, collection }
    }
}

fn backend_err(message: impl Into<String>) -> RetrievalError {
    RetrievalError::Backend {
        backend: "sqlite",
        message: message.into(),
    }
}

#[async_trait]
impl Retriever for SqliteRetriever {
    fn name(&self) -> &str {
        self.collection.as_str()
    }

    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Passage>, RetrievalError> {
        let store = Arc::clone(&self.store);
        let collection = self.collection;
        let query = query.to_string();

        tokio::task::spawn_blocking(move || {
            let guard = store
                .lock()
                .map_err(|_| backend_err("passage store lock poisoned"))?;
            guard
                .search(collection, &query, k)
                .map_err(RetrievalError::from)
        })
        .await
        .map_err(|e| backend_err(format!("search task failed: {e}")))?
    }
}
