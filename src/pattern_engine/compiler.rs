//! Two-pass pattern compilation.
//!
//! [`analyze`] validates the step chain and resolves variables to slots,
//! detecting reuse (cycles) without touching any plan state. [`plan`] then
//! emits one staged relation per slot (`n{slot}`) and per edge step
//! (`h{i}`), joins them along the chain and closes cycles on the reused
//! slot.

use crate::{
    errors::GraphError,
    graph::node_columns,
    property::{PropertyFilter, PropertyPath},
    query::{endpoint_sql, push_pagination},
    statement::{ParamList, SqlStatement},
};

use super::{
    pattern::{EdgeStep, NodeStep, PatternSpec, PatternStep},
    symmetry::{self, Member},
};

/// A distinct variable and everything constraining it.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct NodeSlot {
    pub variable: String,
    pub kind: Option<String>,
    pub filters: Vec<(PropertyPath, PropertyFilter)>,
}

impl NodeSlot {
    /// Same kind and filters, so either slot admits exactly the same nodes.
    pub fn same_shape(&self, other: &NodeSlot) -> bool {
        self.kind == other.kind && self.filters == other.filters
    }
}

/// Result of the first pass: slots in declaration order, the slot bound at
/// each node position, and the edge steps between consecutive positions.
#[derive(Clone, Debug)]
pub(crate) struct Layout {
    pub slots: Vec<NodeSlot>,
    pub positions: Vec<usize>,
    pub edges: Vec<EdgeStep>,
}

impl Layout {
    pub fn slot_of(&self, variable: &str) -> Option<usize> {
        self.slots.iter().position(|slot| slot.variable == variable)
    }
}

/// One staged relation of a compiled plan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlanStage {
    pub name: String,
    pub description: String,
}

#[derive(Clone, Debug)]
pub(crate) struct CompiledPattern {
    pub select: SqlStatement,
    pub count: SqlStatement,
    pub stages: Vec<PlanStage>,
    pub join_order: Vec<String>,
    /// Variables projected per row, in column order.
    pub projected: Vec<String>,
    pub edge_count: usize,
}

/// First pass: structural validation and variable resolution.
pub(crate) fn analyze(spec: &PatternSpec) -> Result<Layout, GraphError> {
    let steps = &spec.steps;
    let starts = steps.iter().filter(|s| matches!(s, PatternStep::Node(n) if n.is_start)).count();
    let ends = steps.iter().filter(|s| matches!(s, PatternStep::Node(n) if n.is_end)).count();
    if starts != 1 {
        return Err(GraphError::pattern(format!(
            "pattern needs exactly one start(), found {starts}"
        )));
    }
    if ends != 1 {
        return Err(GraphError::pattern(format!(
            "pattern needs exactly one end(), found {ends}"
        )));
    }
    if !matches!(steps.first(), Some(PatternStep::Node(n)) if n.is_start) {
        return Err(GraphError::pattern("pattern must begin with start()"));
    }
    if !matches!(steps.last(), Some(PatternStep::Node(n)) if n.is_end) {
        return Err(GraphError::pattern("pattern must finish with end()"));
    }

    let mut layout = Layout {
        slots: Vec::new(),
        positions: Vec::new(),
        edges: Vec::new(),
    };
    let edge_steps = steps.iter().filter(|s| matches!(s, PatternStep::Edge(_))).count();
    if edge_steps == 0 {
        let nodes: Vec<&NodeStep> = steps
            .iter()
            .filter_map(|s| match s {
                PatternStep::Node(n) => Some(n),
                PatternStep::Edge(_) => None,
            })
            .collect();
        let (Some(first), Some(last)) = (nodes.first(), nodes.last()) else {
            return Err(GraphError::pattern("pattern has no steps"));
        };
        if nodes.len() != 2 || first.variable != last.variable {
            return Err(GraphError::pattern(format!(
                "a pattern without edges must start and end on the same variable, got '{}' and '{}'",
                first.variable, last.variable
            )));
        }
        for node in nodes {
            let slot = declare(&mut layout, node)?;
            if layout.positions.is_empty() {
                layout.positions.push(slot);
            }
        }
    } else {
        for (idx, step) in steps.iter().enumerate() {
            match (step, idx % 2 == 0) {
                (PatternStep::Node(node), true) => {
                    let slot = declare(&mut layout, node)?;
                    layout.positions.push(slot);
                }
                (PatternStep::Edge(edge), false) => layout.edges.push(edge.clone()),
                (PatternStep::Node(node), false) => {
                    return Err(GraphError::pattern(format!(
                        "node '{}' follows another node; join them with through()",
                        node.variable
                    )));
                }
                (PatternStep::Edge(edge), true) => {
                    return Err(GraphError::pattern(format!(
                        "edge '{}' must connect two nodes",
                        edge.edge_type
                    )));
                }
            }
        }
    }

    for (variable, path, filter) in &spec.filters {
        let slot = require_slot(&layout, variable, "filter")?;
        layout.slots[slot].filters.push((path.clone(), filter.clone()));
    }
    if let Some(select) = &spec.select {
        if select.is_empty() {
            return Err(GraphError::pattern("select() needs at least one variable"));
        }
        for variable in select {
            require_slot(&layout, variable, "select")?;
        }
    }
    for (variable, _, _) in &spec.ordering {
        require_slot(&layout, variable, "order_by")?;
    }
    Ok(layout)
}

fn declare(layout: &mut Layout, node: &NodeStep) -> Result<usize, GraphError> {
    let Some(slot) = layout.slot_of(&node.variable) else {
        layout.slots.push(NodeSlot {
            variable: node.variable.clone(),
            kind: node.kind.clone(),
            filters: Vec::new(),
        });
        return Ok(layout.slots.len() - 1);
    };
    let existing = &mut layout.slots[slot];
    if let Some(again) = &node.kind {
        match existing.kind.clone() {
            None => existing.kind = Some(again.clone()),
            Some(declared) if &declared != again => {
                return Err(GraphError::pattern(format!(
                    "variable '{}' is declared as '{declared}' and as '{again}'",
                    node.variable
                )));
            }
            Some(_) => {}
        }
    }
    Ok(slot)
}

fn require_slot(layout: &Layout, variable: &str, used_by: &str) -> Result<usize, GraphError> {
    layout.slot_of(variable).ok_or_else(|| {
        GraphError::pattern(format!("{used_by} references undeclared variable '{variable}'"))
    })
}

/// Second pass: emits the staged plan for an analysed layout.
pub(crate) fn plan(
    spec: &PatternSpec,
    layout: &Layout,
    limit: Option<u64>,
) -> Result<CompiledPattern, GraphError> {
    let mut params = ParamList::new();
    let mut stages = Vec::new();
    let mut join_order = Vec::new();

    let (prefix, from_where) = if layout.edges.is_empty() {
        let slot = &layout.slots[layout.positions[0]];
        let conditions = node_conditions(slot, "n0.", &mut params)?;
        stages.push(PlanStage {
            name: "n0".to_string(),
            description: describe_slot(slot, "filtered scan"),
        });
        join_order.push("n0".to_string());
        (String::new(), format!("FROM graph_nodes n0 WHERE {conditions}"))
    } else {
        staged_body(layout, &mut params, &mut stages, &mut join_order)?
    };

    let projected: Vec<String> = match &spec.select {
        Some(select) => select.clone(),
        None => layout.slots.iter().map(|s| s.variable.clone()).collect(),
    };
    let mut columns = Vec::new();
    for variable in &projected {
        let slot = require_slot(layout, variable, "select")?;
        columns.push(node_columns(&format!("n{slot}")));
    }
    for idx in 0..layout.edges.len() {
        columns.push(format!("h{idx}.edge_id"));
    }

    let count = SqlStatement::new(
        format!("{prefix}SELECT COUNT(*) {from_where}"),
        params.clone(),
    );

    let mut order = Vec::new();
    for (variable, key, direction) in &spec.ordering {
        let slot = require_slot(layout, variable, "order_by")?;
        order.push(format!("{} {}", key.sql(&format!("n{slot}")), direction.as_sql()));
    }
    order.extend((0..layout.slots.len()).map(|slot| format!("n{slot}.id")));
    order.extend((0..layout.edges.len()).map(|idx| format!("h{idx}.edge_id")));

    let mut sql = format!(
        "{prefix}SELECT {} {from_where} ORDER BY {}",
        columns.join(", "),
        order.join(", ")
    );
    push_pagination(&mut sql, &mut params, limit.or(spec.limit), spec.offset);

    Ok(CompiledPattern {
        select: SqlStatement::new(sql, params),
        count,
        stages,
        join_order,
        projected,
        edge_count: layout.edges.len(),
    })
}

/// `WITH` prefix plus `FROM ... WHERE ...` for patterns with at least one edge.
fn staged_body(
    layout: &Layout,
    params: &mut ParamList,
    stages: &mut Vec<PlanStage>,
    join_order: &mut Vec<String>,
) -> Result<(String, String), GraphError> {
    let mut ctes = Vec::new();
    for (idx, slot) in layout.slots.iter().enumerate() {
        let conditions = node_conditions(slot, "", params)?;
        ctes.push(format!(
            "n{idx} AS (SELECT id, kind, properties, created_at, updated_at \
             FROM graph_nodes WHERE {conditions})"
        ));
        stages.push(PlanStage {
            name: format!("n{idx}"),
            description: describe_slot(slot, "node stage"),
        });
    }
    for (idx, edge) in layout.edges.iter().enumerate() {
        let prev = layout.positions[idx];
        let (anchor, other) = endpoint_sql("e", "p.id", edge.direction);
        let type_ph = params.bind(edge.edge_type.clone());
        ctes.push(format!(
            "h{idx} AS (SELECT e.id AS edge_id, p.id AS src, {other} AS dst \
             FROM n{prev} p JOIN graph_edges e ON {anchor} WHERE e.edge_type = {type_ph})"
        ));
        stages.push(PlanStage {
            name: format!("h{idx}"),
            description: format!(
                "edge stage: {} edges {} from n{prev}",
                edge.edge_type,
                edge.direction
            ),
        });
    }

    let first = layout.positions[0];
    let mut from = format!("FROM n{first}");
    join_order.push(format!("n{first}"));
    let mut seen = vec![false; layout.slots.len()];
    seen[first] = true;
    let mut conditions = Vec::new();
    for idx in 0..layout.edges.len() {
        let prev = layout.positions[idx];
        let next = layout.positions[idx + 1];
        from.push_str(&format!(" JOIN h{idx} ON h{idx}.src = n{prev}.id"));
        join_order.push(format!("h{idx}"));
        if seen[next] {
            conditions.push(format!("h{idx}.dst = n{next}.id"));
        } else {
            seen[next] = true;
            from.push_str(&format!(" JOIN n{next} ON n{next}.id = h{idx}.dst"));
            join_order.push(format!("n{next}"));
        }
    }

    // A match never uses the same edge for two hops.
    for (i, left) in layout.edges.iter().enumerate() {
        for (j, right) in layout.edges.iter().enumerate().skip(i + 1) {
            if left.edge_type == right.edge_type {
                conditions.push(format!("h{i}.edge_id <> h{j}.edge_id"));
            }
        }
    }

    for ordering in symmetry::ordering_constraints(layout) {
        conditions.push(format!(
            "({}) <= ({})",
            render_members(&ordering.lhs),
            render_members(&ordering.rhs)
        ));
    }

    let mut body = from;
    if !conditions.is_empty() {
        body.push_str(" WHERE ");
        body.push_str(&conditions.join(" AND "));
    }
    Ok((format!("WITH {} ", ctes.join(", ")), body))
}

fn node_conditions(
    slot: &NodeSlot,
    prefix: &str,
    params: &mut ParamList,
) -> Result<String, GraphError> {
    let mut clauses = Vec::new();
    if let Some(kind) = &slot.kind {
        clauses.push(format!("{prefix}kind = {}", params.bind(kind.clone())));
    }
    let column = format!("{prefix}properties");
    for (path, filter) in &slot.filters {
        clauses.push(filter.render(path, &column, params)?);
    }
    if clauses.is_empty() {
        return Ok("1".to_string());
    }
    Ok(clauses.join(" AND "))
}

fn render_members(members: &[Member]) -> String {
    members
        .iter()
        .map(|member| match member {
            Member::Node(slot) => format!("n{slot}.id"),
            Member::Edge(idx) => format!("h{idx}.edge_id"),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_slot(slot: &NodeSlot, stage: &str) -> String {
    let kind = slot.kind.as_deref().unwrap_or("any");
    let mut description = format!("{stage}: {kind} nodes bound to '{}'", slot.variable);
    if !slot.filters.is_empty() {
        let paths: Vec<&str> = slot.filters.iter().map(|(path, _)| path.as_str()).collect();
        description.push_str(&format!(" filtered on {}", paths.join(", ")));
    }
    description
}

