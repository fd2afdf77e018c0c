//! Edge CRUD operations for GraphStore.

use rusqlite::{OptionalExtension, params};

use crate::errors::GraphError;

use super::{
    GraphStore,
    types::{Edge, Properties, edge_from_row, encode_properties, now_millis, validate_id, validate_type_name},
};

const EDGE_COLUMNS: &str = "id, edge_type, from_id, to_id, properties, created_at";

impl GraphStore {
    /// Inserts a directed edge. Both endpoints must exist; self-edges and
    /// parallel edges are allowed.
    pub fn create_edge(
        &self,
        from_id: i64,
        edge_type: &str,
        to_id: i64,
        properties: Option<Properties>,
    ) -> Result<Edge, GraphError> {
        validate_type_name("edge type", edge_type)?;
        validate_id("edge source", from_id)?;
        validate_id("edge target", to_id)?;
        for endpoint in [from_id, to_id] {
            if !self.node_exists(endpoint)? {
                return Err(GraphError::referential(format!(
                    "edge {edge_type} ({from_id} -> {to_id}) references missing node {endpoint}"
                )));
            }
        }
        let data = properties.as_ref().map(encode_properties).transpose()?;
        let now = now_millis();
        self.run(
            "INSERT INTO graph_edges(edge_type, from_id, to_id, properties, created_at) VALUES(?1, ?2, ?3, ?4, ?5)",
            params![edge_type, from_id, to_id, data, now],
        )?;
        self.invalidate_caches();
        Ok(Edge {
            id: self.conn.last_insert_rowid(),
            edge_type: edge_type.to_string(),
            from_id,
            to_id,
            properties,
            created_at: now,
        })
    }

    pub fn get_edge(&self, id: i64) -> Result<Option<Edge>, GraphError> {
        self.metrics.record_statement();
        self.conn
            .prepare_cached(&format!("SELECT {EDGE_COLUMNS} FROM graph_edges WHERE id=?1"))
            .and_then(|mut stmt| stmt.query_row(params![id], edge_from_row).optional())
            .map_err(GraphError::sqlite)
    }

    /// Replaces the property bag of an edge. Returns `None` when the edge is missing.
    pub fn update_edge(&self, id: i64, properties: Properties) -> Result<Option<Edge>, GraphError> {
        let data = encode_properties(&properties)?;
        let affected = self.run(
            "UPDATE graph_edges SET properties=?1 WHERE id=?2",
            params![data, id],
        )?;
        if affected == 0 {
            return Ok(None);
        }
        self.get_edge(id)
    }

    pub fn delete_edge(&self, id: i64) -> Result<bool, GraphError> {
        let affected = self.run("DELETE FROM graph_edges WHERE id=?1", params![id])?;
        self.invalidate_caches();
        Ok(affected > 0)
    }

    /// Every edge matching the exact `(from, type, to)` triple, in id order.
    pub fn edges_between(
        &self,
        from_id: i64,
        edge_type: &str,
        to_id: i64,
    ) -> Result<Vec<Edge>, GraphError> {
        self.metrics.record_statement();
        let mut stmt = self
            .conn
            .prepare_cached(&format!(
                "SELECT {EDGE_COLUMNS} FROM graph_edges WHERE from_id=?1 AND edge_type=?2 AND to_id=?3 ORDER BY id"
            ))
            .map_err(GraphError::sqlite)?;
        let rows = stmt
            .query_map(params![from_id, edge_type, to_id], edge_from_row)
            .map_err(GraphError::sqlite)?;
        let mut edges = Vec::new();
        for edge in rows {
            edges.push(edge.map_err(GraphError::sqlite)?);
        }
        Ok(edges)
    }

    pub(crate) fn node_exists(&self, id: i64) -> Result<bool, GraphError> {
        self.metrics.record_statement();
        let exists: Option<i64> = self
            .conn
            .prepare_cached("SELECT 1 FROM graph_nodes WHERE id=?1")
            .and_then(|mut stmt| stmt.query_row(params![id], |row| row.get(0)).optional())
            .map_err(GraphError::sqlite)?;
        Ok(exists.is_some())
    }
}
