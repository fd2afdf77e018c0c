//! Fluent node queries compiled to a single SQL statement.
//!
//! Conditions, joins, ordering and pagination are pushed into SQLite. Only
//! [`NodeQuery::filter`] predicates run in-process; when any are present,
//! pagination is applied after them so `limit` counts accepted nodes.

use serde_json::Value;

use crate::{
    errors::GraphError,
    graph::{
        Direction, GraphStore, IntoDirection, Node, Properties, node_columns, node_from_row,
        validate_type_name,
    },
    property::{PropertyFilter, PropertyPath},
    statement::{ParamList, SqlStatement},
};

/// In-process node predicate.
pub type NodePredicate<'g> = Box<dyn Fn(&Node) -> bool + 'g>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub(crate) fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Sort key over a node alias: a system column or a property path.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum OrderKey {
    Id,
    CreatedAt,
    UpdatedAt,
    Property(PropertyPath),
}

impl OrderKey {
    pub(crate) fn parse(key: &str) -> Result<Self, GraphError> {
        match key {
            "id" => Ok(OrderKey::Id),
            "createdAt" | "created_at" => Ok(OrderKey::CreatedAt),
            "updatedAt" | "updated_at" => Ok(OrderKey::UpdatedAt),
            path => PropertyPath::parse(path).map(OrderKey::Property),
        }
    }

    pub(crate) fn sql(&self, alias: &str) -> String {
        match self {
            OrderKey::Id => format!("{alias}.id"),
            OrderKey::CreatedAt => format!("{alias}.created_at"),
            OrderKey::UpdatedAt => format!("{alias}.updated_at"),
            OrderKey::Property(path) => path.extract_sql(&format!("{alias}.properties")),
        }
    }
}

#[derive(Clone, Debug)]
struct JoinConstraint {
    target_kind: String,
    edge_type: String,
    direction: Direction,
}

/// Builder over nodes of one kind. Construction never touches storage; the
/// first invalid argument is remembered and returned by the terminal call.
pub struct NodeQuery<'g> {
    graph: &'g GraphStore,
    kind: String,
    conditions: Vec<(PropertyPath, PropertyFilter)>,
    predicates: Vec<NodePredicate<'g>>,
    joins: Vec<JoinConstraint>,
    exclusions: Vec<JoinConstraint>,
    ordering: Vec<(OrderKey, SortOrder)>,
    limit: Option<u64>,
    offset: Option<u64>,
    error: Option<GraphError>,
}

impl GraphStore {
    /// Starts a query over nodes of `kind`.
    pub fn nodes(&self, kind: &str) -> NodeQuery<'_> {
        let mut query = NodeQuery {
            graph: self,
            kind: kind.to_string(),
            conditions: Vec::new(),
            predicates: Vec::new(),
            joins: Vec::new(),
            exclusions: Vec::new(),
            ordering: Vec::new(),
            limit: None,
            offset: None,
            error: None,
        };
        query.check(validate_type_name("node kind", kind));
        query
    }
}

impl<'g> NodeQuery<'g> {
    fn check<T>(&mut self, result: Result<T, GraphError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                if self.error.is_none() {
                    self.error = Some(err);
                }
                None
            }
        }
    }

    /// Exact-match condition on a property path. Repeated calls AND together.
    pub fn where_eq(self, path: &str, value: impl Into<Value>) -> Self {
        self.where_filter(path, PropertyFilter::Equals(value.into()))
    }

    /// Exact-match conditions for every entry of `props`.
    pub fn where_props(mut self, props: &Properties) -> Self {
        for (key, value) in props {
            self = self.where_filter(key, PropertyFilter::Equals(value.clone()));
        }
        self
    }

    pub fn where_filter(mut self, path: &str, filter: PropertyFilter) -> Self {
        if let Some(path) = self.check(PropertyPath::parse(path)) {
            self.conditions.push((path, filter));
        }
        self
    }

    /// Adds an in-process predicate, ANDed with earlier ones.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Node) -> bool + 'g,
    {
        self.predicates.push(Box::new(predicate));
        self
    }

    /// Keeps nodes with at least one `edge_type` edge to a `target_kind`
    /// node. Each call adds an independent join; calls intersect.
    pub fn connected_to(
        mut self,
        target_kind: &str,
        edge_type: &str,
        direction: impl IntoDirection,
    ) -> Self {
        if let Some(join) = self.join_constraint(target_kind, edge_type, direction) {
            self.joins.push(join);
        }
        self
    }

    /// Keeps nodes with no `edge_type` edge to any `target_kind` node.
    pub fn not_connected_to(
        mut self,
        target_kind: &str,
        edge_type: &str,
        direction: impl IntoDirection,
    ) -> Self {
        if let Some(join) = self.join_constraint(target_kind, edge_type, direction) {
            self.exclusions.push(join);
        }
        self
    }

    fn join_constraint(
        &mut self,
        target_kind: &str,
        edge_type: &str,
        direction: impl IntoDirection,
    ) -> Option<JoinConstraint> {
        self.check(validate_type_name("target node kind", target_kind))?;
        self.check(validate_type_name("edge type", edge_type))?;
        let direction = self.check(direction.into_direction())?;
        Some(JoinConstraint {
            target_kind: target_kind.to_string(),
            edge_type: edge_type.to_string(),
            direction,
        })
    }

    /// Sort key: `id`, `createdAt`, `updatedAt` or a property path.
    /// Repeated calls add secondary keys.
    pub fn order_by(mut self, key: &str, order: SortOrder) -> Self {
        if let Some(key) = self.check(OrderKey::parse(key)) {
            self.ordering.push((key, order));
        }
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        if let Some(limit) = self.check(non_negative("limit", limit)) {
            self.limit = Some(limit);
        }
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        if let Some(offset) = self.check(non_negative("offset", offset)) {
            self.offset = Some(offset);
        }
        self
    }

    pub fn exec(&self) -> Result<Vec<Node>, GraphError> {
        self.run(self.limit)
    }

    /// First node under the current ordering, ignoring any configured limit.
    pub fn first(&self) -> Result<Option<Node>, GraphError> {
        Ok(self.run(Some(1))?.into_iter().next())
    }

    /// Number of matching nodes, pagination ignored.
    pub fn count(&self) -> Result<u64, GraphError> {
        self.ensure_valid()?;
        if !self.predicates.is_empty() {
            let all = self.fetch(None, None)?;
            return Ok(all.iter().filter(|node| self.accepts(node)).count() as u64);
        }
        let mut params = ParamList::new();
        let body = self.body(&mut params)?;
        let statement = SqlStatement::new(format!("SELECT COUNT(DISTINCT n.id) {body}"), params);
        self.graph.query_count(&statement)
    }

    pub fn exists(&self) -> Result<bool, GraphError> {
        self.ensure_valid()?;
        if !self.predicates.is_empty() {
            return Ok(!self.run(Some(1))?.is_empty());
        }
        let mut params = ParamList::new();
        let body = self.body(&mut params)?;
        let statement =
            SqlStatement::new(format!("SELECT EXISTS(SELECT 1 {body} LIMIT 1)"), params);
        Ok(self.graph.query_count(&statement)? > 0)
    }

    /// The statement [`exec`](Self::exec) would run, without running it.
    pub fn to_statement(&self) -> Result<SqlStatement, GraphError> {
        self.ensure_valid()?;
        if self.predicates.is_empty() {
            self.select_statement(self.limit, self.offset)
        } else {
            self.select_statement(None, None)
        }
    }

    fn ensure_valid(&self) -> Result<(), GraphError> {
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn accepts(&self, node: &Node) -> bool {
        self.predicates.iter().all(|predicate| predicate(node))
    }

    fn run(&self, limit: Option<u64>) -> Result<Vec<Node>, GraphError> {
        self.ensure_valid()?;
        if self.predicates.is_empty() {
            return self.fetch(limit, self.offset);
        }
        let skip = usize::try_from(self.offset.unwrap_or(0)).unwrap_or(usize::MAX);
        let take = limit.map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));
        Ok(self
            .fetch(None, None)?
            .into_iter()
            .filter(|node| self.accepts(node))
            .skip(skip)
            .take(take)
            .collect())
    }

    fn fetch(&self, limit: Option<u64>, offset: Option<u64>) -> Result<Vec<Node>, GraphError> {
        let statement = self.select_statement(limit, offset)?;
        tracing::debug!(target: "relgraph::query", kind = %self.kind, sql = %statement.sql, "node query");
        self.graph
            .query_statement(&statement, |row| node_from_row(row, 0))
    }

    fn select_statement(
        &self,
        limit: Option<u64>,
        offset: Option<u64>,
    ) -> Result<SqlStatement, GraphError> {
        let mut params = ParamList::new();
        let body = self.body(&mut params)?;
        let distinct = if self.joins.is_empty() { "" } else { "DISTINCT " };
        let mut sql = format!("SELECT {distinct}{} {body}", node_columns("n"));

        let mut order: Vec<String> = self
            .ordering
            .iter()
            .map(|(key, direction)| format!("{} {}", key.sql("n"), direction.as_sql()))
            .collect();
        if !self.ordering.iter().any(|(key, _)| matches!(key, OrderKey::Id)) {
            order.push("n.id ASC".to_string());
        }
        sql.push_str(" ORDER BY ");
        sql.push_str(&order.join(", "));

        push_pagination(&mut sql, &mut params, limit, offset);
        Ok(SqlStatement::new(sql, params))
    }

    /// `FROM ... WHERE ...` shared by every projection.
    fn body(&self, params: &mut ParamList) -> Result<String, GraphError> {
        let mut sql = String::from("FROM graph_nodes n");
        let mut clauses = Vec::new();
        let kind_ph = params.bind(self.kind.clone());
        clauses.push(format!("n.kind = {kind_ph}"));

        for (idx, join) in self.joins.iter().enumerate() {
            let edge = format!("e{idx}");
            let target = format!("t{idx}");
            let (anchor, other) = endpoint_sql(&edge, "n.id", join.direction);
            let type_ph = params.bind(join.edge_type.clone());
            let target_ph = params.bind(join.target_kind.clone());
            sql.push_str(&format!(
                " JOIN graph_edges {edge} ON {anchor} AND {edge}.edge_type = {type_ph} \
                 JOIN graph_nodes {target} ON {target}.id = {other} AND {target}.kind = {target_ph}"
            ));
        }

        for (path, filter) in &self.conditions {
            clauses.push(filter.render(path, "n.properties", params)?);
        }

        for (idx, exclusion) in self.exclusions.iter().enumerate() {
            let edge = format!("x{idx}");
            let target = format!("y{idx}");
            let (anchor, other) = endpoint_sql(&edge, "n.id", exclusion.direction);
            let type_ph = params.bind(exclusion.edge_type.clone());
            let target_ph = params.bind(exclusion.target_kind.clone());
            clauses.push(format!(
                "NOT EXISTS (SELECT 1 FROM graph_edges {edge} \
                 JOIN graph_nodes {target} ON {target}.id = {other} AND {target}.kind = {target_ph} \
                 WHERE {anchor} AND {edge}.edge_type = {type_ph})"
            ));
        }

        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
        Ok(sql)
    }
}

/// Join condition anchoring `edge` at `node_id`, and the expression for the
/// edge's opposite endpoint.
pub(crate) fn endpoint_sql(edge: &str, node_id: &str, direction: Direction) -> (String, String) {
    match direction {
        Direction::Out => (
            format!("{edge}.from_id = {node_id}"),
            format!("{edge}.to_id"),
        ),
        Direction::In => (
            format!("{edge}.to_id = {node_id}"),
            format!("{edge}.from_id"),
        ),
        Direction::Both => (
            format!("({edge}.from_id = {node_id} OR {edge}.to_id = {node_id})"),
            format!("CASE WHEN {edge}.from_id = {node_id} THEN {edge}.to_id ELSE {edge}.from_id END"),
        ),
    }
}

/// Appends `LIMIT`/`OFFSET`; an offset alone gets the unbounded `LIMIT -1`.
pub(crate) fn push_pagination(
    sql: &mut String,
    params: &mut ParamList,
    limit: Option<u64>,
    offset: Option<u64>,
) {
    match (limit, offset) {
        (Some(limit), Some(offset)) => {
            let limit_ph = params.bind(to_sql_int(limit));
            let offset_ph = params.bind(to_sql_int(offset));
            sql.push_str(&format!(" LIMIT {limit_ph} OFFSET {offset_ph}"));
        }
        (Some(limit), None) => {
            let limit_ph = params.bind(to_sql_int(limit));
            sql.push_str(&format!(" LIMIT {limit_ph}"));
        }
        (None, Some(offset)) => {
            let offset_ph = params.bind(to_sql_int(offset));
            sql.push_str(&format!(" LIMIT -1 OFFSET {offset_ph}"));
        }
        (None, None) => {}
    }
}

pub(crate) fn non_negative(what: &str, value: i64) -> Result<u64, GraphError> {
    u64::try_from(value)
        .map_err(|_| GraphError::validation(format!("{what} must be non-negative, got {value}")))
}

fn to_sql_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
