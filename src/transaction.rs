//! Transactions with an explicit, validated savepoint stack.
//!
//! SQLite has no nested transactions, so only the outermost
//! [`GraphStore::transaction`] issues `BEGIN`/`COMMIT`/`ROLLBACK`; a nested call
//! runs inside an internal savepoint. User savepoints are tracked as a stack of
//! checkpoints with monotonic generation numbers, and the SQL savepoint name is
//! derived from the generation, never from the caller's name.

use crate::{errors::GraphError, graph::GraphStore};

/// Per-store transaction bookkeeping.
#[derive(Debug, Default)]
pub(crate) struct TransactionRegistry {
    depth: u32,
    next_generation: u64,
}

impl TransactionRegistry {
    fn allocate_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }
}

/// Identifies one savepoint instance. A handle outlives its savepoint: using it
/// after release or after an older rollback fails instead of touching a newer
/// savepoint that happens to share the name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SavepointHandle {
    name: String,
    generation: u64,
}

impl SavepointHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Scope {
    Root,
    Nested { generation: u64 },
}

/// Transaction context passed to [`GraphStore::transaction`] callbacks.
pub struct Transaction<'g> {
    graph: &'g GraphStore,
    scope: Scope,
    savepoints: Vec<SavepointHandle>,
    finalized: bool,
}

impl GraphStore {
    /// Runs `f` atomically. Returning `Ok` without finalizing commits; returning
    /// `Err` rolls back and re-raises. Inside another transaction this degrades
    /// to a savepoint, so only the outermost call commits to the store.
    pub fn transaction<T, F>(&self, f: F) -> Result<T, GraphError>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T, GraphError>,
    {
        let mut tx = Transaction::begin(self)?;
        match f(&mut tx) {
            Ok(value) => {
                if !tx.finalized {
                    tx.commit()?;
                }
                Ok(value)
            }
            Err(err) => {
                if !tx.finalized {
                    if let Err(rollback_err) = tx.rollback() {
                        tracing::warn!(
                            target: "relgraph::transaction",
                            error = %rollback_err,
                            "rollback after failed callback did not complete"
                        );
                    }
                }
                Err(err)
            }
        }
    }

    pub fn in_transaction(&self) -> bool {
        self.transactions.lock().depth > 0
    }

    /// Current nesting depth (0 outside any transaction).
    pub fn transaction_depth(&self) -> u32 {
        self.transactions.lock().depth
    }
}

impl<'g> Transaction<'g> {
    fn begin(graph: &'g GraphStore) -> Result<Self, GraphError> {
        let mut registry = graph.transactions.lock();
        let scope = if registry.depth == 0 {
            graph.run_control("BEGIN IMMEDIATE")?;
            graph.metrics.record_tx_begin();
            Scope::Root
        } else {
            let generation = registry.allocate_generation();
            graph.run_control(&format!("SAVEPOINT {}", tx_savepoint_name(generation)))?;
            Scope::Nested { generation }
        };
        registry.depth += 1;
        tracing::trace!(target: "relgraph::transaction", depth = registry.depth, ?scope, "begin");
        Ok(Self {
            graph,
            scope,
            savepoints: Vec::new(),
            finalized: false,
        })
    }

    /// The store this transaction writes through.
    pub fn graph(&self) -> &'g GraphStore {
        self.graph
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// True when this context is a savepoint inside an outer transaction.
    pub fn is_nested(&self) -> bool {
        matches!(self.scope, Scope::Nested { .. })
    }

    /// Names of the active savepoints, oldest first.
    pub fn savepoints(&self) -> Vec<&str> {
        self.savepoints.iter().map(|sp| sp.name.as_str()).collect()
    }

    pub fn commit(&mut self) -> Result<(), GraphError> {
        self.ensure_active("commit")?;
        match self.scope {
            Scope::Root => self.graph.run_control("COMMIT")?,
            Scope::Nested { generation } => self
                .graph
                .run_control(&format!("RELEASE {}", tx_savepoint_name(generation)))?,
        }
        self.graph.metrics.record_tx_commit();
        self.finish("commit");
        Ok(())
    }

    pub fn rollback(&mut self) -> Result<(), GraphError> {
        self.ensure_active("rollback")?;
        let result = match self.scope {
            Scope::Root if self.graph.conn.is_autocommit() => Ok(()),
            Scope::Root => self.graph.run_control("ROLLBACK"),
            Scope::Nested { generation } => {
                let name = tx_savepoint_name(generation);
                self.graph
                    .run_control(&format!("ROLLBACK TO {name}; RELEASE {name}"))
            }
        };
        self.graph.invalidate_caches();
        self.graph.metrics.record_tx_rollback();
        self.finish("rollback");
        result
    }

    /// Creates a named checkpoint. Fails if `name` is already active.
    pub fn savepoint(&mut self, name: &str) -> Result<SavepointHandle, GraphError> {
        self.ensure_active("savepoint")?;
        if name.trim().is_empty() {
            return Err(GraphError::validation("savepoint name must be set"));
        }
        if self.savepoints.iter().any(|sp| sp.name == name) {
            return Err(GraphError::transaction_state(format!(
                "savepoint '{name}' is already active"
            )));
        }
        let generation = self.graph.transactions.lock().allocate_generation();
        self.graph
            .run_control(&format!("SAVEPOINT {}", user_savepoint_name(generation)))?;
        self.graph.metrics.record_savepoint();
        let handle = SavepointHandle {
            name: name.to_string(),
            generation,
        };
        self.savepoints.push(handle.clone());
        tracing::trace!(target: "relgraph::transaction", name, generation, "savepoint");
        Ok(handle)
    }

    /// Discards writes made since `name`; the savepoint stays active and every
    /// savepoint created after it is invalidated.
    pub fn rollback_to(&mut self, name: &str) -> Result<(), GraphError> {
        self.ensure_active("rollback_to")?;
        let index = self.position_by_name(name)?;
        self.rollback_to_index(index)
    }

    pub fn rollback_to_handle(&mut self, handle: &SavepointHandle) -> Result<(), GraphError> {
        self.ensure_active("rollback_to")?;
        let index = self.position_by_handle(handle)?;
        self.rollback_to_index(index)
    }

    /// Drops `name` (and every later savepoint) while keeping their writes.
    pub fn release_savepoint(&mut self, name: &str) -> Result<(), GraphError> {
        self.ensure_active("release_savepoint")?;
        let index = self.position_by_name(name)?;
        self.release_index(index)
    }

    pub fn release_handle(&mut self, handle: &SavepointHandle) -> Result<(), GraphError> {
        self.ensure_active("release_savepoint")?;
        let index = self.position_by_handle(handle)?;
        self.release_index(index)
    }

    fn rollback_to_index(&mut self, index: usize) -> Result<(), GraphError> {
        let target = &self.savepoints[index];
        self.graph.run_control(&format!(
            "ROLLBACK TO {}",
            user_savepoint_name(target.generation)
        ))?;
        tracing::trace!(
            target: "relgraph::transaction",
            name = %target.name,
            discarded = self.savepoints.len() - index - 1,
            "rollback to savepoint"
        );
        self.savepoints.truncate(index + 1);
        self.graph.invalidate_caches();
        Ok(())
    }

    fn release_index(&mut self, index: usize) -> Result<(), GraphError> {
        let target = &self.savepoints[index];
        self.graph.run_control(&format!(
            "RELEASE {}",
            user_savepoint_name(target.generation)
        ))?;
        self.savepoints.truncate(index);
        Ok(())
    }

    fn position_by_name(&self, name: &str) -> Result<usize, GraphError> {
        self.savepoints
            .iter()
            .rposition(|sp| sp.name == name)
            .ok_or_else(|| {
                GraphError::transaction_state(format!("savepoint '{name}' is not active"))
            })
    }

    fn position_by_handle(&self, handle: &SavepointHandle) -> Result<usize, GraphError> {
        self.savepoints
            .iter()
            .rposition(|sp| sp.generation == handle.generation)
            .ok_or_else(|| {
                GraphError::transaction_state(format!(
                    "savepoint '{}' (generation {}) is no longer active",
                    handle.name, handle.generation
                ))
            })
    }

    fn ensure_active(&self, operation: &str) -> Result<(), GraphError> {
        if self.finalized {
            return Err(GraphError::transaction_state(format!(
                "cannot {operation}: transaction already finalized"
            )));
        }
        Ok(())
    }

    fn finish(&mut self, outcome: &str) {
        self.finalized = true;
        self.savepoints.clear();
        let mut registry = self.graph.transactions.lock();
        registry.depth = registry.depth.saturating_sub(1);
        tracing::trace!(target: "relgraph::transaction", depth = registry.depth, outcome, "finish");
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.finalized {
            if let Err(err) = self.rollback() {
                tracing::warn!(
                    target: "relgraph::transaction",
                    error = %err,
                    "rollback of abandoned transaction failed"
                );
            }
        }
    }
}

fn tx_savepoint_name(generation: u64) -> String {
    format!("relgraph_tx_{generation}")
}

fn user_savepoint_name(generation: u64) -> String {
    format!("relgraph_sp_{generation}")
}
