//! Node CRUD operations for GraphStore.

use rusqlite::{OptionalExtension, params};

use crate::{errors::GraphError, property::PropertyPath, schema::property_index_name};

use super::{
    GraphStore,
    types::{
        Node, Properties, encode_properties, node_columns, node_from_row, now_millis,
        validate_type_name,
    },
};

impl GraphStore {
    /// Inserts a node; the id is the SQLite rowid and is never reused.
    pub fn create_node(&self, kind: &str, properties: Properties) -> Result<Node, GraphError> {
        validate_type_name("node kind", kind)?;
        let data = encode_properties(&properties)?;
        let now = now_millis();
        self.run(
            "INSERT INTO graph_nodes(kind, properties, created_at, updated_at) VALUES(?1, ?2, ?3, ?3)",
            params![kind, data, now],
        )?;
        Ok(Node {
            id: self.conn.last_insert_rowid(),
            kind: kind.to_string(),
            properties,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn get_node(&self, id: i64) -> Result<Option<Node>, GraphError> {
        self.metrics.record_statement();
        self.conn
            .prepare_cached(&format!(
                "SELECT {} FROM graph_nodes n WHERE n.id=?1",
                node_columns("n")
            ))
            .and_then(|mut stmt| stmt.query_row(params![id], |row| node_from_row(row, 0)).optional())
            .map_err(GraphError::sqlite)
    }

    /// Replaces the property bag of a node. Returns `None` when the node is missing.
    pub fn update_node(&self, id: i64, properties: Properties) -> Result<Option<Node>, GraphError> {
        let data = encode_properties(&properties)?;
        let affected = self.run(
            "UPDATE graph_nodes SET properties=?1, updated_at=?2 WHERE id=?3",
            params![data, now_millis(), id],
        )?;
        if affected == 0 {
            return Ok(None);
        }
        self.get_node(id)
    }

    /// Deletes a node and every edge touching it. Returns whether a node was removed.
    pub fn delete_node(&self, id: i64) -> Result<bool, GraphError> {
        let removed = self.transaction(|tx| {
            let graph = tx.graph();
            graph.run(
                "DELETE FROM graph_edges WHERE from_id=?1 OR to_id=?1",
                params![id],
            )?;
            graph.run("DELETE FROM graph_nodes WHERE id=?1", params![id])
        })?;
        self.invalidate_caches();
        Ok(removed > 0)
    }

    /// Creates an expression index over `(kind, json_extract(properties, path))`.
    /// Purely a throughput aid; no query depends on it.
    pub fn ensure_property_index(&self, kind: &str, path: &str) -> Result<(), GraphError> {
        validate_type_name("node kind", kind)?;
        let path = PropertyPath::parse(path)?;
        let sql = format!(
            "CREATE INDEX IF NOT EXISTS {} ON graph_nodes(kind, {})",
            property_index_name(kind, path.as_str()),
            path.extract_sql("properties")
        );
        tracing::debug!(target: "relgraph::schema", %sql, "ensuring property index");
        self.run_control(&sql)
    }
}
