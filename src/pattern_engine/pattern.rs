use serde_json::{Map, Value};

use crate::{
    errors::GraphError,
    graph::{Direction, GraphStore, IntoDirection, validate_type_name},
    property::{PropertyFilter, PropertyPath, parse_filter_map},
    query::{OrderKey, SortOrder, non_negative},
};

/// A node position in the chain, bound to a variable.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeStep {
    pub variable: String,
    pub kind: Option<String>,
    pub is_start: bool,
    pub is_end: bool,
}

/// A hop between two node positions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EdgeStep {
    pub edge_type: String,
    pub direction: Direction,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PatternStep {
    Node(NodeStep),
    Edge(EdgeStep),
}

/// Everything the compiler needs, detached from the store.
#[derive(Clone, Debug, Default)]
pub struct PatternSpec {
    pub steps: Vec<PatternStep>,
    pub filters: Vec<(String, PropertyPath, PropertyFilter)>,
    pub select: Option<Vec<String>>,
    pub(crate) ordering: Vec<(String, OrderKey, SortOrder)>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Declarative multi-hop pattern.
///
/// Node variables bind homomorphically: two variables may resolve to the
/// same node. Hops of the same edge type never reuse an edge within one
/// match, so `a-[T both]-b-[T both]-a` needs two distinct `T` edges between
/// `a` and `b` and is not satisfied by walking a single edge back and forth.
///
/// ```
/// # use relgraph::GraphStore;
/// let graph = GraphStore::open_in_memory().unwrap();
/// let knows = graph
///     .pattern()
///     .start("p", "Person")
///     .through("KNOWS", "out")
///     .end("f", "Person");
/// assert_eq!(knows.count().unwrap(), 0);
/// ```
pub struct Pattern<'g> {
    pub(crate) graph: &'g GraphStore,
    pub(crate) spec: PatternSpec,
    pub(crate) error: Option<GraphError>,
}

impl GraphStore {
    pub fn pattern(&self) -> Pattern<'_> {
        Pattern {
            graph: self,
            spec: PatternSpec::default(),
            error: None,
        }
    }
}

impl<'g> Pattern<'g> {
    fn check<T>(&mut self, result: Result<T, GraphError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.error.get_or_insert(err);
                None
            }
        }
    }

    fn push_node<'k>(
        mut self,
        variable: &str,
        kind: impl Into<Option<&'k str>>,
        is_start: bool,
        is_end: bool,
    ) -> Self {
        let kind = kind.into();
        if self.check(validate_variable(variable)).is_none() {
            return self;
        }
        if let Some(kind) = kind {
            if self.check(validate_type_name("node kind", kind)).is_none() {
                return self;
            }
        }
        self.spec.steps.push(PatternStep::Node(NodeStep {
            variable: variable.to_string(),
            kind: kind.map(str::to_string),
            is_start,
            is_end,
        }));
        self
    }

    pub fn start<'k>(self, variable: &str, kind: impl Into<Option<&'k str>>) -> Self {
        self.push_node(variable, kind, true, false)
    }

    /// Intermediate node. Reusing an earlier variable closes a cycle.
    pub fn node<'k>(self, variable: &str, kind: impl Into<Option<&'k str>>) -> Self {
        self.push_node(variable, kind, false, false)
    }

    pub fn end<'k>(self, variable: &str, kind: impl Into<Option<&'k str>>) -> Self {
        self.push_node(variable, kind, false, true)
    }

    pub fn through(mut self, edge_type: &str, direction: impl IntoDirection) -> Self {
        if self.check(validate_type_name("edge type", edge_type)).is_none() {
            return self;
        }
        if let Some(direction) = self.check(direction.into_direction()) {
            self.spec.steps.push(PatternStep::Edge(EdgeStep {
                edge_type: edge_type.to_string(),
                direction,
            }));
        }
        self
    }

    /// Filters on `variable`: plain values are exact matches, `{"$op": v}`
    /// objects are comparisons.
    pub fn where_var(mut self, variable: &str, filters: Map<String, Value>) -> Self {
        if let Some(parsed) = self.check(parse_filter_map(filters)) {
            for (path, filter) in parsed {
                self.spec.filters.push((variable.to_string(), path, filter));
            }
        }
        self
    }

    pub fn where_filter(mut self, variable: &str, path: &str, filter: PropertyFilter) -> Self {
        if let Some(path) = self.check(PropertyPath::parse(path)) {
            self.spec.filters.push((variable.to_string(), path, filter));
        }
        self
    }

    /// Restricts the bindings returned per match. Defaults to every variable.
    pub fn select<I, S>(mut self, variables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.spec.select = Some(
            variables
                .into_iter()
                .map(|v| v.as_ref().to_string())
                .collect(),
        );
        self
    }

    pub fn order_by(mut self, variable: &str, key: &str, order: SortOrder) -> Self {
        if let Some(key) = self.check(OrderKey::parse(key)) {
            self.spec.ordering.push((variable.to_string(), key, order));
        }
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        if let Some(limit) = self.check(non_negative("limit", limit)) {
            self.spec.limit = Some(limit);
        }
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        if let Some(offset) = self.check(non_negative("offset", offset)) {
            self.spec.offset = Some(offset);
        }
        self
    }

    pub fn spec(&self) -> &PatternSpec {
        &self.spec
    }
}

fn validate_variable(variable: &str) -> Result<(), GraphError> {
    if variable.is_empty() || !variable.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(GraphError::pattern(format!(
            "invalid variable name '{}': use letters, digits and '_'",
            variable.escape_debug()
        )));
    }
    Ok(())
}
