//! Adjacency lookups driving traversal, memoised per (node, direction, type).

use crate::{cache::AdjacencyKey, errors::GraphError, statement::{ParamList, SqlStatement}};

use super::{GraphStore, types::Direction};

impl GraphStore {
    /// Distinct neighbor ids of `node` reachable over one edge, ordered by
    /// neighbor id. `edge_type`/`target_kind` of `None` mean "any".
    ///
    /// File-backed stores consult `PRAGMA data_version` first so commits
    /// from other connections invalidate memoised lookups.
    pub fn neighbors(
        &self,
        node: i64,
        edge_type: Option<&str>,
        direction: Direction,
        target_kind: Option<&str>,
    ) -> Result<Vec<i64>, GraphError> {
        let key = AdjacencyKey {
            node,
            direction,
            edge_type: edge_type.map(str::to_string),
            target_kind: target_kind.map(str::to_string),
        };
        if self.cache.is_enabled() && self.is_file_backed() {
            let version = self
                .conn
                .pragma_query_value(None, "data_version", |row| row.get::<_, i64>(0))
                .map_err(GraphError::sqlite)?;
            self.cache.observe_data_version(version);
        }
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached);
        }
        let statement = adjacency_statement(node, edge_type, direction, target_kind);
        let rows = self.query_statement(&statement, |row| row.get::<_, i64>(0))?;
        let mut result: Vec<i64> = Vec::with_capacity(rows.len());
        for neighbor in rows {
            if result.last().copied() != Some(neighbor) {
                result.push(neighbor);
            }
        }
        self.cache.insert(key, result.clone());
        Ok(result)
    }
}

fn adjacency_statement(
    node: i64,
    edge_type: Option<&str>,
    direction: Direction,
    target_kind: Option<&str>,
) -> SqlStatement {
    let mut params = ParamList::new();
    let node_ph = params.bind(node);
    let (neighbor, anchor) = match direction {
        Direction::Out => ("e.to_id".to_string(), format!("e.from_id = {node_ph}")),
        Direction::In => ("e.from_id".to_string(), format!("e.to_id = {node_ph}")),
        Direction::Both => (
            format!("CASE WHEN e.from_id = {node_ph} THEN e.to_id ELSE e.from_id END"),
            format!("(e.from_id = {node_ph} OR e.to_id = {node_ph})"),
        ),
    };
    let mut sql = format!("SELECT {neighbor} AS neighbor FROM graph_edges e");
    if let Some(kind) = target_kind {
        let kind_ph = params.bind(kind.to_string());
        sql.push_str(&format!(
            " JOIN graph_nodes t ON t.id = {neighbor} AND t.kind = {kind_ph}"
        ));
    }
    sql.push_str(&format!(" WHERE {anchor}"));
    if let Some(edge_type) = edge_type {
        let type_ph = params.bind(edge_type.to_string());
        sql.push_str(&format!(" AND e.edge_type = {type_ph}"));
    }
    sql.push_str(" ORDER BY neighbor, e.id");
    SqlStatement::new(sql, params)
}
