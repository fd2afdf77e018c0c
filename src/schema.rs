use rusqlite::Connection;

use crate::errors::GraphError;

pub fn ensure_schema(conn: &Connection) -> Result<(), GraphError> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;
        CREATE TABLE IF NOT EXISTS graph_nodes (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            kind       TEXT NOT NULL,
            properties TEXT NOT NULL DEFAULT '{}',
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS graph_edges (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            edge_type  TEXT NOT NULL,
            from_id    INTEGER NOT NULL REFERENCES graph_nodes(id) ON DELETE CASCADE,
            to_id      INTEGER NOT NULL REFERENCES graph_nodes(id) ON DELETE CASCADE,
            properties TEXT,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_nodes_kind ON graph_nodes(kind);
        CREATE INDEX IF NOT EXISTS idx_edges_from ON graph_edges(from_id, edge_type);
        CREATE INDEX IF NOT EXISTS idx_edges_to ON graph_edges(to_id, edge_type);
        CREATE INDEX IF NOT EXISTS idx_edges_type ON graph_edges(edge_type);
        "#,
    )
    .map_err(|e| GraphError::schema(e.to_string()))?;
    Ok(())
}

/// Name of the expression index created for `kind` + `path`.
pub(crate) fn property_index_name(kind: &str, path: &str) -> String {
    let mut name = format!("idx_prop_{}_", kind.len());
    for ch in kind.chars().chain(std::iter::once('_')).chain(path.chars()) {
        if ch.is_ascii_alphanumeric() {
            name.push(ch.to_ascii_lowercase());
        } else {
            name.push('_');
        }
    }
    name
}
