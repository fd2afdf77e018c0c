use crate::{config::JournalConfig, errors::GraphError, graph::GraphStore};

impl GraphStore {
    /// Applies journal mode, durability level, auto-checkpoint threshold and
    /// busy timeout. Safe to call repeatedly. Returns the journal mode SQLite
    /// reports afterwards (`memory` for in-memory stores, which cannot use WAL).
    pub fn configure_journal(&self, config: &JournalConfig) -> Result<String, GraphError> {
        if self.in_transaction() {
            return Err(GraphError::transaction_state(
                "journal mode cannot change inside a transaction",
            ));
        }
        let mode: String = self
            .conn
            .pragma_update_and_check(None, "journal_mode", config.mode.as_pragma(), |row| {
                row.get(0)
            })
            .map_err(|e| GraphError::connection(format!("PRAGMA journal_mode: {e}")))?;
        self.apply_pragma("synchronous", config.synchronous.as_pragma())?;
        self.apply_pragma("wal_autocheckpoint", &config.wal_autocheckpoint_pages.to_string())?;
        self.set_busy_timeout(config.busy_timeout_ms)?;
        let mode = mode.to_lowercase();
        tracing::debug!(
            target: "relgraph::journal",
            requested = config.mode.as_pragma(),
            effective = %mode,
            synchronous = config.synchronous.as_pragma(),
            autocheckpoint = config.wal_autocheckpoint_pages,
            busy_timeout_ms = config.busy_timeout_ms,
            "journal configured"
        );
        Ok(mode)
    }

    /// Journal mode currently in effect.
    pub fn journal_mode(&self) -> Result<String, GraphError> {
        self.conn
            .pragma_query_value(None, "journal_mode", |row| row.get::<_, String>(0))
            .map(|mode| mode.to_lowercase())
            .map_err(GraphError::sqlite)
    }

    fn apply_pragma(&self, key: &str, value: &str) -> Result<(), GraphError> {
        match self.conn.execute_batch(&format!("PRAGMA {key} = {value}")) {
            Ok(()) | Err(rusqlite::Error::ExecuteReturnedResults) => Ok(()),
            Err(e) => Err(GraphError::connection(format!("PRAGMA {key} = {value}: {e}"))),
        }
    }
}
