//! Declarative multi-hop pattern matching compiled to staged SQL.

mod compiler;
mod matcher;
mod pattern;
mod symmetry;


pub use compiler::PlanStage;
pub use matcher::{PatternMatch, PatternPlan};
pub use pattern::{EdgeStep, NodeStep, Pattern, PatternSpec, PatternStep};
