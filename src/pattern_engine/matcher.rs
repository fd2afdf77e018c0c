use std::{
    collections::BTreeMap,
    time::{Duration, Instant},
};

use rusqlite::types::Value as SqlValue;
use serde::Serialize;

use crate::{
    errors::GraphError,
    graph::{NODE_COLUMN_COUNT, Node, node_from_row},
};

use super::{
    compiler::{self, CompiledPattern, PlanStage},
    pattern::Pattern,
};

/// One match: the node bound to each selected variable plus the edge used
/// for every hop, in pattern order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PatternMatch {
    pub bindings: BTreeMap<String, Node>,
    pub edges: Vec<i64>,
    pub path_length: usize,
    /// Wall time of the query that produced this match.
    pub elapsed: Duration,
}

impl PatternMatch {
    pub fn get(&self, variable: &str) -> Option<&Node> {
        self.bindings.get(variable)
    }
}

/// Compiled plan as reported by [`Pattern::explain`]. Nothing is executed.
#[derive(Clone, Debug, PartialEq)]
pub struct PatternPlan {
    pub sql: String,
    pub params: Vec<SqlValue>,
    pub stages: Vec<PlanStage>,
    pub join_order: Vec<String>,
}

impl Pattern<'_> {
    fn compile(&self, limit: Option<u64>) -> Result<CompiledPattern, GraphError> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        let layout = compiler::analyze(&self.spec)?;
        compiler::plan(&self.spec, &layout, limit)
    }

    pub fn exec(&self) -> Result<Vec<PatternMatch>, GraphError> {
        let compiled = self.compile(None)?;
        self.run(&compiled)
    }

    /// First match under the pattern ordering, any configured limit aside.
    pub fn first(&self) -> Result<Option<PatternMatch>, GraphError> {
        let compiled = self.compile(Some(1))?;
        Ok(self.run(&compiled)?.into_iter().next())
    }

    /// Number of matches, pagination ignored.
    pub fn count(&self) -> Result<u64, GraphError> {
        let compiled = self.compile(None)?;
        self.graph.query_count(&compiled.count)
    }

    pub fn exists(&self) -> Result<bool, GraphError> {
        Ok(self.count()? > 0)
    }

    pub fn explain(&self) -> Result<PatternPlan, GraphError> {
        let compiled = self.compile(None)?;
        Ok(PatternPlan {
            sql: compiled.select.sql,
            params: compiled.select.params,
            stages: compiled.stages,
            join_order: compiled.join_order,
        })
    }

    fn run(&self, compiled: &CompiledPattern) -> Result<Vec<PatternMatch>, GraphError> {
        tracing::debug!(
            target: "relgraph::pattern",
            sql = %compiled.select.sql,
            hops = compiled.edge_count,
            "pattern query"
        );
        let started = Instant::now();
        let edge_base = compiled.projected.len() * NODE_COLUMN_COUNT;
        let rows = self.graph.query_statement(&compiled.select, |row| {
            let mut bindings = BTreeMap::new();
            for (idx, variable) in compiled.projected.iter().enumerate() {
                bindings.insert(variable.clone(), node_from_row(row, idx * NODE_COLUMN_COUNT)?);
            }
            let edges = (0..compiled.edge_count)
                .map(|idx| row.get::<_, i64>(edge_base + idx))
                .collect::<Result<Vec<_>, _>>()?;
            Ok((bindings, edges))
        })?;
        let elapsed = started.elapsed();
        Ok(rows
            .into_iter()
            .map(|(bindings, edges)| PatternMatch {
                bindings,
                edges,
                path_length: compiled.edge_count,
                elapsed,
            })
            .collect())
    }
}
