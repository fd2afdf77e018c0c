use std::{
    fmt,
    str::FromStr,
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::GraphError;

/// Opaque property bag attached to nodes and edges.
pub type Properties = Map<String, Value>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub id: i64,
    pub kind: String,
    pub properties: Properties,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    pub updated_at: i64,
}

impl Node {
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Edge {
    pub id: i64,
    pub edge_type: String,
    pub from_id: i64,
    pub to_id: i64,
    pub properties: Option<Properties>,
    pub created_at: i64,
}

/// Direction of an edge hop relative to the node being expanded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Out,
    In,
    Both,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Out => "out",
            Direction::In => "in",
            Direction::Both => "both",
        }
    }

    /// The direction that walks the same edge back.
    pub fn reverse(&self) -> Self {
        match self {
            Direction::Out => Direction::In,
            Direction::In => Direction::Out,
            Direction::Both => Direction::Both,
        }
    }
}

impl FromStr for Direction {
    type Err = GraphError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token {
            "out" => Ok(Direction::Out),
            "in" => Ok(Direction::In),
            "both" => Ok(Direction::Both),
            other => Err(GraphError::validation(format!(
                "invalid direction '{other}': expected one of in, out, both"
            ))),
        }
    }
}

/// Accepts either a [`Direction`] or one of the tokens `in`, `out`, `both`.
pub trait IntoDirection {
    fn into_direction(self) -> Result<Direction, GraphError>;
}

impl IntoDirection for Direction {
    fn into_direction(self) -> Result<Direction, GraphError> {
        Ok(self)
    }
}

impl IntoDirection for &str {
    fn into_direction(self) -> Result<Direction, GraphError> {
        self.parse()
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validates a node kind or edge type name.
pub fn validate_type_name(what: &str, name: &str) -> Result<(), GraphError> {
    if name.trim().is_empty() {
        return Err(GraphError::validation(format!("{what} must be set")));
    }
    if name.chars().any(char::is_control) {
        return Err(GraphError::validation(format!(
            "{what} '{}' contains control characters",
            name.escape_debug()
        )));
    }
    Ok(())
}

pub fn validate_id(what: &str, id: i64) -> Result<(), GraphError> {
    if id <= 0 {
        return Err(GraphError::validation(format!(
            "{what} id must be positive, got {id}"
        )));
    }
    Ok(())
}

pub(crate) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

pub(crate) fn encode_properties(properties: &Properties) -> Result<String, GraphError> {
    Ok(serde_json::to_string(properties)?)
}

fn decode_properties(raw: &str) -> Result<Properties, rusqlite::Error> {
    serde_json::from_str(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(raw.len(), rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Column list matching [`node_from_row`], qualified with `alias`.
pub(crate) fn node_columns(alias: &str) -> String {
    format!("{alias}.id, {alias}.kind, {alias}.properties, {alias}.created_at, {alias}.updated_at")
}

pub(crate) const NODE_COLUMN_COUNT: usize = 5;

/// Reads a node from five consecutive columns starting at `base`.
pub(crate) fn node_from_row(row: &rusqlite::Row<'_>, base: usize) -> Result<Node, rusqlite::Error> {
    let raw: String = row.get(base + 2)?;
    Ok(Node {
        id: row.get(base)?,
        kind: row.get(base + 1)?,
        properties: decode_properties(&raw)?,
        created_at: row.get(base + 3)?,
        updated_at: row.get(base + 4)?,
    })
}

pub(crate) fn edge_from_row(row: &rusqlite::Row<'_>) -> Result<Edge, rusqlite::Error> {
    let raw: Option<String> = row.get(4)?;
    Ok(Edge {
        id: row.get(0)?,
        edge_type: row.get(1)?,
        from_id: row.get(2)?,
        to_id: row.get(3)?,
        properties: raw.as_deref().map(decode_properties).transpose()?,
        created_at: row.get(5)?,
    })
}
