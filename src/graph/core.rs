//! Core GraphStore struct, construction and statement execution.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{Connection, Params, params_from_iter, types::Value as SqlValue};

use crate::{
    cache::AdjacencyCache,
    config::GraphConfig,
    errors::GraphError,
    metrics::{GraphMetrics, GraphMetricsSnapshot},
    schema::ensure_schema,
    statement::SqlStatement,
    transaction::TransactionRegistry,
};

/// Embedded graph store: typed nodes and directed edges with JSON property
/// bags, persisted in two SQLite relations.
pub struct GraphStore {
    pub(crate) conn: Connection,
    pub(crate) cache: AdjacencyCache,
    pub(crate) metrics: GraphMetrics,
    pub(crate) transactions: Mutex<TransactionRegistry>,
    config: GraphConfig,
    file_backed: bool,
}

impl GraphStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GraphError> {
        Self::open_with_config(path, &GraphConfig::default())
    }

    pub fn open_with_config<P: AsRef<Path>>(
        path: P,
        config: &GraphConfig,
    ) -> Result<Self, GraphError> {
        let conn = Connection::open(path).map_err(|e| GraphError::connection(e.to_string()))?;
        Self::from_connection(conn, config.clone(), true)
    }

    pub fn open_in_memory() -> Result<Self, GraphError> {
        Self::open_in_memory_with_config(&GraphConfig::default())
    }

    pub fn open_in_memory_with_config(config: &GraphConfig) -> Result<Self, GraphError> {
        let conn =
            Connection::open_in_memory().map_err(|e| GraphError::connection(e.to_string()))?;
        Self::from_connection(conn, config.clone(), false)
    }

    fn from_connection(
        conn: Connection,
        config: GraphConfig,
        file_backed: bool,
    ) -> Result<Self, GraphError> {
        conn.set_prepared_statement_cache_capacity(config.statement_cache_capacity);
        ensure_schema(&conn)?;
        let store = Self {
            cache: AdjacencyCache::new(config.adjacency_cache),
            conn,
            metrics: GraphMetrics::default(),
            transactions: Mutex::new(TransactionRegistry::default()),
            config,
            file_backed,
        };
        if store.file_backed {
            store.configure_journal(&store.config.journal)?;
        } else {
            store.set_busy_timeout(store.config.journal.busy_timeout_ms)?;
        }
        Ok(store)
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn is_file_backed(&self) -> bool {
        self.file_backed
    }

    pub fn metrics_snapshot(&self) -> GraphMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn reset_metrics(&self) {
        self.metrics.reset();
    }

    /// Runs a parameterized statement and returns every row as raw SQLite values.
    pub fn execute(&self, statement: &SqlStatement) -> Result<Vec<Vec<SqlValue>>, GraphError> {
        self.query_statement(statement, |row| {
            let width = row.as_ref().column_count();
            (0..width).map(|idx| row.get::<_, SqlValue>(idx)).collect()
        })
    }

    pub(crate) fn query_statement<T, F>(
        &self,
        statement: &SqlStatement,
        mut map: F,
    ) -> Result<Vec<T>, GraphError>
    where
        F: FnMut(&rusqlite::Row<'_>) -> Result<T, rusqlite::Error>,
    {
        self.metrics.record_statement();
        let mut stmt = self
            .conn
            .prepare_cached(&statement.sql)
            .map_err(GraphError::sqlite)?;
        let rows = stmt
            .query_map(params_from_iter(statement.params.iter()), |row| map(row))
            .map_err(GraphError::sqlite)?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row.map_err(GraphError::sqlite)?);
        }
        Ok(result)
    }

    pub(crate) fn query_count(&self, statement: &SqlStatement) -> Result<u64, GraphError> {
        let counts = self.query_statement(statement, |row| row.get::<_, i64>(0))?;
        Ok(counts.first().copied().map_or(0, |c| u64::try_from(c).unwrap_or(0)))
    }

    /// Executes a write statement and returns the number of affected rows.
    pub(crate) fn run<P: Params>(&self, sql: &str, params: P) -> Result<usize, GraphError> {
        self.metrics.record_statement();
        self.conn
            .prepare_cached(sql)
            .and_then(|mut stmt| stmt.execute(params))
            .map_err(GraphError::sqlite)
    }

    /// Executes transaction-control SQL (BEGIN, SAVEPOINT, ...).
    pub(crate) fn run_control(&self, sql: &str) -> Result<(), GraphError> {
        self.metrics.record_statement();
        self.conn.execute_batch(sql).map_err(GraphError::sqlite)
    }

    pub(crate) fn set_busy_timeout(&self, millis: u64) -> Result<(), GraphError> {
        self.conn
            .busy_timeout(std::time::Duration::from_millis(millis))
            .map_err(|e| GraphError::connection(e.to_string()))
    }

    pub(crate) fn invalidate_caches(&self) {
        self.cache.clear();
    }

    pub fn node_count(&self) -> Result<u64, GraphError> {
        self.query_count(&SqlStatement::without_params(
            "SELECT COUNT(*) FROM graph_nodes",
        ))
    }

    pub fn edge_count(&self) -> Result<u64, GraphError> {
        self.query_count(&SqlStatement::without_params(
            "SELECT COUNT(*) FROM graph_edges",
        ))
    }
}
