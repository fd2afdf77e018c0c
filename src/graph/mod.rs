mod adjacency;
mod core;
mod edge_ops;
mod node_ops;
mod types;

pub use self::core::GraphStore;
pub use types::{
    Direction, Edge, IntoDirection, Node, Properties, validate_id, validate_type_name,
};
pub(crate) use types::{NODE_COLUMN_COUNT, node_columns, node_from_row};
