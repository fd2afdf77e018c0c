//! Embedded graph query and traversal engine on SQLite.
//!
//! Typed nodes and directed edges with JSON property bags live in two
//! relations. On top of them sit a fluent node query builder, BFS/DFS
//! traversal and path finding, a declarative multi-hop pattern compiler,
//! savepoint-based nested transactions, find-or-create merges and the
//! coordination needed to share one store between writers.
//! Run Criterion benchmarks with `cargo bench` to inspect reports under `target/criterion`.

pub mod cache;
pub mod concurrency;
pub mod config;
pub mod errors;
pub mod graph;
pub mod merge;
pub mod metrics;
pub mod pattern_engine;
pub mod property;
pub mod query;
pub mod schema;
pub mod statement;
pub mod transaction;
pub mod traversal;

pub use crate::concurrency::{WriteQueue, backoff_delay, with_retry};
pub use crate::config::{GraphConfig, JournalConfig, JournalMode, RetryPolicy, SyncLevel};
pub use crate::errors::GraphError;
pub use crate::graph::{Direction, Edge, GraphStore, IntoDirection, Node, Properties};
pub use crate::merge::{MergeOptions, MergeOutcome};
pub use crate::metrics::GraphMetricsSnapshot;
pub use crate::pattern_engine::{Pattern, PatternMatch, PatternPlan, PlanStage};
pub use crate::property::{Comparison, PropertyFilter, PropertyPath};
pub use crate::query::{NodeQuery, SortOrder};
pub use crate::statement::{ParamList, SqlStatement};
pub use crate::transaction::{SavepointHandle, Transaction};
pub use crate::traversal::{PathOptions, Traversal, TraversalStep};
