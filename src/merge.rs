//! Find-or-create (merge) for nodes and edges.
//!
//! A merge runs inside a transaction: the match query and the create or
//! update it leads to commit together. Zero matches create, one match applies
//! `on_match`, more than one is a [`GraphError::MergeConflict`] and nothing is
//! written.

use serde_json::Value;

use crate::{
    errors::GraphError,
    graph::{
        Edge, GraphStore, Node, Properties, node_columns, node_from_row, validate_id,
        validate_type_name,
    },
    property::{PropertyFilter, PropertyPath},
    statement::{ParamList, SqlStatement},
};

/// Property policies applied depending on the merge outcome.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MergeOptions {
    /// Applied last when the merge creates, may override match/base values.
    pub on_create: Option<Properties>,
    /// Shallow-merged onto the existing properties when the merge matches.
    pub on_match: Option<Properties>,
}

impl MergeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_create(mut self, properties: Properties) -> Self {
        self.on_create = Some(properties);
        self
    }

    pub fn on_match(mut self, properties: Properties) -> Self {
        self.on_match = Some(properties);
        self
    }
}

/// Result of a merge: the resulting entity and whether it was created.
#[derive(Clone, Debug, PartialEq)]
pub struct MergeOutcome<T> {
    pub value: T,
    pub created: bool,
}

impl GraphStore {
    /// Finds the single node of `kind` whose properties equal every entry of
    /// `match_props`, or creates one from `match_props`, `base_props` and
    /// `on_create` (later ones override earlier ones).
    pub fn merge_node(
        &self,
        kind: &str,
        match_props: &Properties,
        base_props: Option<&Properties>,
        options: &MergeOptions,
    ) -> Result<MergeOutcome<Node>, GraphError> {
        validate_type_name("node kind", kind)?;
        if match_props.is_empty() {
            return Err(GraphError::validation(format!(
                "merge on {kind} requires at least one match property"
            )));
        }
        let statement = match_statement(kind, match_props)?;
        let outcome = self.transaction(|tx| {
            let graph = tx.graph();
            let mut matches =
                graph.query_statement(&statement, |row| node_from_row(row, 0))?;
            match matches.len() {
                0 => {
                    let mut properties = match_props.clone();
                    overlay(&mut properties, base_props);
                    overlay(&mut properties, options.on_create.as_ref());
                    let node = graph.create_node(kind, properties)?;
                    Ok(MergeOutcome {
                        value: node,
                        created: true,
                    })
                }
                1 => {
                    let existing = matches.remove(0);
                    let node = match options.on_match.as_ref() {
                        Some(on_match) if !on_match.is_empty() => {
                            let mut properties = existing.properties.clone();
                            overlay(&mut properties, Some(on_match));
                            graph.update_node(existing.id, properties)?.ok_or_else(|| {
                                GraphError::query(format!(
                                    "node {} vanished during merge",
                                    existing.id
                                ))
                            })?
                        }
                        _ => existing,
                    };
                    Ok(MergeOutcome {
                        value: node,
                        created: false,
                    })
                }
                _ => Err(GraphError::merge_conflict(
                    kind,
                    Value::Object(match_props.clone()).to_string(),
                    matches.iter().map(|node| node.id).collect(),
                )),
            }
        })?;
        self.metrics.record_merge(outcome.created);
        tracing::debug!(
            target: "relgraph::merge",
            kind,
            id = outcome.value.id,
            created = outcome.created,
            "merged node"
        );
        Ok(outcome)
    }

    /// Edge analogue of [`GraphStore::merge_node`], matched on the exact
    /// `(from, edge_type, to)` triple.
    pub fn merge_edge(
        &self,
        from_id: i64,
        edge_type: &str,
        to_id: i64,
        base_props: Option<&Properties>,
        options: &MergeOptions,
    ) -> Result<MergeOutcome<Edge>, GraphError> {
        validate_type_name("edge type", edge_type)?;
        validate_id("edge source", from_id)?;
        validate_id("edge target", to_id)?;
        let outcome = self.transaction(|tx| {
            let graph = tx.graph();
            let mut matches = graph.edges_between(from_id, edge_type, to_id)?;
            match matches.len() {
                0 => {
                    let properties = match (base_props, options.on_create.as_ref()) {
                        (None, None) => None,
                        (base, on_create) => {
                            let mut properties = Properties::new();
                            overlay(&mut properties, base);
                            overlay(&mut properties, on_create);
                            Some(properties)
                        }
                    };
                    let edge = graph.create_edge(from_id, edge_type, to_id, properties)?;
                    Ok(MergeOutcome {
                        value: edge,
                        created: true,
                    })
                }
                1 => {
                    let existing = matches.remove(0);
                    let edge = match options.on_match.as_ref() {
                        Some(on_match) if !on_match.is_empty() => {
                            let mut properties = existing.properties.clone().unwrap_or_default();
                            overlay(&mut properties, Some(on_match));
                            graph.update_edge(existing.id, properties)?.ok_or_else(|| {
                                GraphError::query(format!(
                                    "edge {} vanished during merge",
                                    existing.id
                                ))
                            })?
                        }
                        _ => existing,
                    };
                    Ok(MergeOutcome {
                        value: edge,
                        created: false,
                    })
                }
                _ => Err(GraphError::merge_conflict(
                    edge_type,
                    format!("({from_id})-[{edge_type}]->({to_id})"),
                    matches.iter().map(|edge| edge.id).collect(),
                )),
            }
        })?;
        self.metrics.record_merge(outcome.created);
        tracing::debug!(
            target: "relgraph::merge",
            edge_type,
            id = outcome.value.id,
            created = outcome.created,
            "merged edge"
        );
        Ok(outcome)
    }
}

/// Shallow merge: top-level keys of `layer` replace those in `base`.
fn overlay(base: &mut Properties, layer: Option<&Properties>) {
    if let Some(layer) = layer {
        for (key, value) in layer {
            base.insert(key.clone(), value.clone());
        }
    }
}

fn match_statement(kind: &str, match_props: &Properties) -> Result<SqlStatement, GraphError> {
    let mut params = ParamList::new();
    let mut clauses = vec![format!("n.kind = {}", params.bind(kind.to_string()))];
    for (key, value) in match_props {
        let path = PropertyPath::top_level(key)?;
        clauses.push(PropertyFilter::Equals(value.clone()).render(&path, "n.properties", &mut params)?);
    }
    Ok(SqlStatement::new(
        format!(
            "SELECT {} FROM graph_nodes n WHERE {} ORDER BY n.id",
            node_columns("n"),
            clauses.join(" AND ")
        ),
        params,
    ))
}
