//! Breadth/depth-first traversal and path finding over adjacency lookups.
//!
//! A traversal holds an ordered list of [`TraversalStep`]s. Expanding a node
//! reached at depth `d` uses `steps[min(d, steps.len() - 1)]`: once the list
//! is exhausted the last step repeats for every deeper hop, so a single step
//! describes a homogeneous traversal of any depth. With no steps at all,
//! every edge in either direction is followed.

use std::collections::VecDeque;

use ahash::{AHashMap, AHashSet};

use crate::{
    errors::GraphError,
    graph::{Direction, GraphStore, IntoDirection, Node, validate_id, validate_type_name},
    query::NodePredicate,
};

/// One hop: which edges to follow, which way, and optionally which node kind
/// the hop must land on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraversalStep {
    pub edge_type: Option<String>,
    pub target_kind: Option<String>,
    pub direction: Direction,
}

static ANY_STEP: TraversalStep = TraversalStep {
    edge_type: None,
    target_kind: None,
    direction: Direction::Both,
};

impl TraversalStep {
    pub fn new(edge_type: &str, direction: Direction) -> Self {
        Self {
            edge_type: Some(edge_type.to_string()),
            target_kind: None,
            direction,
        }
    }

    /// Any edge type, either direction, any target.
    pub fn any() -> Self {
        ANY_STEP.clone()
    }

    pub fn to_kind(mut self, kind: &str) -> Self {
        self.target_kind = Some(kind.to_string());
        self
    }

    fn validate(&self) -> Result<(), GraphError> {
        if let Some(edge_type) = &self.edge_type {
            validate_type_name("edge type", edge_type)?;
        }
        if let Some(kind) = &self.target_kind {
            validate_type_name("target node kind", kind)?;
        }
        Ok(())
    }
}

/// Bounds for [`Traversal::paths`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PathOptions {
    pub max_paths: Option<usize>,
    pub max_depth: Option<u32>,
}

pub struct Traversal<'g> {
    graph: &'g GraphStore,
    start: i64,
    steps: Vec<TraversalStep>,
    min_depth: u32,
    max_depth: Option<u32>,
    predicates: Vec<NodePredicate<'g>>,
    unique: bool,
    error: Option<GraphError>,
}

impl GraphStore {
    /// Starts a traversal from `start`.
    pub fn traverse(&self, start: i64) -> Traversal<'_> {
        Traversal {
            graph: self,
            start,
            steps: Vec::new(),
            min_depth: 0,
            max_depth: None,
            predicates: Vec::new(),
            unique: false,
            error: validate_id("start node", start).err(),
        }
    }
}

impl<'g> Traversal<'g> {
    pub fn out(self, edge_type: &str) -> Self {
        self.step(TraversalStep::new(edge_type, Direction::Out))
    }

    pub fn incoming(self, edge_type: &str) -> Self {
        self.step(TraversalStep::new(edge_type, Direction::In))
    }

    pub fn both(self, edge_type: &str) -> Self {
        self.step(TraversalStep::new(edge_type, Direction::Both))
    }

    /// Appends a hop given as an edge type and a direction token or value.
    pub fn via(mut self, edge_type: &str, direction: impl IntoDirection) -> Self {
        match direction.into_direction() {
            Ok(direction) => self.step(TraversalStep::new(edge_type, direction)),
            Err(err) => {
                self.error.get_or_insert(err);
                self
            }
        }
    }

    pub fn step(mut self, step: TraversalStep) -> Self {
        if let Err(err) = step.validate() {
            self.error.get_or_insert(err);
        }
        self.steps.push(step);
        self
    }

    pub fn min_depth(mut self, depth: u32) -> Self {
        self.min_depth = depth;
        self
    }

    pub fn max_depth(mut self, depth: u32) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Only nodes accepted by every predicate are reported.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Node) -> bool + 'g,
    {
        self.predicates.push(Box::new(predicate));
        self
    }

    /// Visits each node at most once across the whole traversal. Without it a
    /// node reached along several parent paths is reported once per arrival.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Breadth-first reachable nodes within the depth bounds, start excluded.
    pub fn to_vec(&self) -> Result<Vec<Node>, GraphError> {
        let mut nodes = NodeLoader::new(self.graph);
        let mut result = Vec::new();
        for id in self.reachable_ids(&mut nodes)? {
            if let Some(node) = nodes.load(id)? {
                result.push(node.clone());
            }
        }
        Ok(result)
    }

    /// Like [`to_vec`](Self::to_vec) but returns ids only.
    pub fn ids(&self) -> Result<Vec<i64>, GraphError> {
        self.reachable_ids(&mut NodeLoader::new(self.graph))
    }

    fn reachable_ids(&self, nodes: &mut NodeLoader<'_>) -> Result<Vec<i64>, GraphError> {
        let max_depth = self.prepare()?;
        let mut visited = AHashSet::new();
        visited.insert(self.start);
        let mut queue = VecDeque::new();
        queue.push_back((self.start, 0u32));
        let mut result = Vec::new();
        while let Some((node, depth)) = queue.pop_front() {
            if depth > 0 && depth >= self.min_depth && self.accepts(nodes, node)? {
                result.push(node);
            }
            if depth >= max_depth {
                continue;
            }
            for next in self.expand(node, depth)? {
                if next == self.start || (self.unique && !visited.insert(next)) {
                    continue;
                }
                queue.push_back((next, depth + 1));
            }
        }
        tracing::debug!(
            target: "relgraph::traversal",
            start = self.start,
            max_depth,
            found = result.len(),
            "breadth-first traversal"
        );
        Ok(result)
    }

    /// Every simple path from the start within the depth bounds, in
    /// breadth-first order. A path never repeats a node, whatever the
    /// uniqueness flag, so cyclic graphs terminate.
    pub fn to_paths(&self) -> Result<Vec<Vec<i64>>, GraphError> {
        let max_depth = self.prepare()?;
        let mut nodes = NodeLoader::new(self.graph);
        let mut queue = VecDeque::new();
        queue.push_back(vec![self.start]);
        let mut result = Vec::new();
        while let Some(path) = queue.pop_front() {
            let depth = hops(&path);
            let Some(&tip) = path.last() else { continue };
            if depth > 0 && depth >= self.min_depth && self.accepts(&mut nodes, tip)? {
                result.push(path.clone());
            }
            if depth >= max_depth {
                continue;
            }
            for next in self.expand(tip, depth)? {
                if path.contains(&next) {
                    continue;
                }
                let mut extended = Vec::with_capacity(path.len() + 1);
                extended.extend_from_slice(&path);
                extended.push(next);
                queue.push_back(extended);
            }
        }
        Ok(result)
    }

    /// Fewest-hop path from the start to `target`, both included. Expands via
    /// the first step, or any edge in either direction when none is set.
    /// Unbounded unless [`max_depth`](Self::max_depth) was set.
    pub fn shortest_path(&self, target: i64) -> Result<Option<Vec<i64>>, GraphError> {
        self.ensure_valid()?;
        validate_id("target node", target)?;
        if self.start == target {
            return Ok(Some(vec![self.start]));
        }
        let step = self.steps.first().unwrap_or(&ANY_STEP);
        let mut parents: AHashMap<i64, i64> = AHashMap::new();
        let mut queue = VecDeque::new();
        queue.push_back((self.start, 0u32));
        let mut found = false;
        'search: while let Some((node, depth)) = queue.pop_front() {
            if self.max_depth.is_some_and(|max| depth >= max) {
                continue;
            }
            let neighbors = self.graph.neighbors(
                node,
                step.edge_type.as_deref(),
                step.direction,
                step.target_kind.as_deref(),
            )?;
            for next in neighbors {
                if next == self.start || parents.contains_key(&next) {
                    continue;
                }
                parents.insert(next, node);
                if next == target {
                    found = true;
                    break 'search;
                }
                queue.push_back((next, depth + 1));
            }
        }
        if !found {
            return Ok(None);
        }
        let mut path = vec![target];
        let mut current = target;
        while let Some(&parent) = parents.get(&current) {
            path.push(parent);
            current = parent;
        }
        path.reverse();
        Ok(Some(path))
    }

    /// Depth-first enumeration of simple paths from the start to `target`,
    /// stopping after `max_paths` paths. Worst case is exponential in the
    /// branching factor; bound both paths and depth on dense graphs.
    pub fn all_paths(&self, target: i64, max_paths: usize) -> Result<Vec<Vec<i64>>, GraphError> {
        let max_depth = self.prepare()?;
        validate_id("target node", target)?;
        let mut paths = Vec::new();
        if max_paths == 0 || max_depth == 0 {
            return Ok(paths);
        }

        struct Frame {
            neighbors: Vec<i64>,
            next: usize,
        }

        let mut path = vec![self.start];
        let mut on_path = AHashSet::new();
        on_path.insert(self.start);
        let mut stack = vec![Frame {
            neighbors: self.expand(self.start, 0)?,
            next: 0,
        }];
        while let Some(frame) = stack.last_mut() {
            let Some(&next) = frame.neighbors.get(frame.next) else {
                stack.pop();
                if let Some(done) = path.pop() {
                    on_path.remove(&done);
                }
                continue;
            };
            frame.next += 1;
            if on_path.contains(&next) {
                continue;
            }
            let depth = hops(&path) + 1;
            if next == target {
                let mut found = path.clone();
                found.push(next);
                paths.push(found);
                if paths.len() >= max_paths {
                    break;
                }
                continue;
            }
            if depth >= max_depth {
                continue;
            }
            let neighbors = self.expand(next, depth)?;
            path.push(next);
            on_path.insert(next);
            stack.push(Frame { neighbors, next: 0 });
        }
        tracing::debug!(
            target: "relgraph::traversal",
            start = self.start,
            target,
            found = paths.len(),
            "depth-first path enumeration"
        );
        Ok(paths)
    }

    /// Paths from the start to `target`. `max_depth` overrides the traversal
    /// bound; with `max_paths` the search is depth-first and stops early,
    /// otherwise every breadth-first path ending at `target` is returned.
    pub fn paths(mut self, target: i64, options: PathOptions) -> Result<Vec<Vec<i64>>, GraphError> {
        validate_id("target node", target)?;
        if let Some(depth) = options.max_depth {
            self.max_depth = Some(depth);
        }
        match options.max_paths {
            Some(max_paths) => self.all_paths(target, max_paths),
            None => Ok(self
                .to_paths()?
                .into_iter()
                .filter(|path| path.last() == Some(&target))
                .collect()),
        }
    }

    fn ensure_valid(&self) -> Result<(), GraphError> {
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    /// Validates the traversal and resolves the effective maximum depth.
    fn prepare(&self) -> Result<u32, GraphError> {
        self.ensure_valid()?;
        if self.graph.get_node(self.start)?.is_none() {
            return Err(GraphError::validation(format!(
                "start node {} does not exist",
                self.start
            )));
        }
        let max_depth = self
            .max_depth
            .unwrap_or(self.graph.config().traversal_default_max_depth);
        if self.min_depth > max_depth {
            return Err(GraphError::validation(format!(
                "min depth {} exceeds max depth {max_depth}",
                self.min_depth
            )));
        }
        Ok(max_depth)
    }

    fn step_at(&self, depth: u32) -> &TraversalStep {
        let idx = usize::try_from(depth).unwrap_or(usize::MAX);
        self.steps
            .get(idx)
            .or_else(|| self.steps.last())
            .unwrap_or(&ANY_STEP)
    }

    fn expand(&self, node: i64, depth: u32) -> Result<Vec<i64>, GraphError> {
        let step = self.step_at(depth);
        self.graph.neighbors(
            node,
            step.edge_type.as_deref(),
            step.direction,
            step.target_kind.as_deref(),
        )
    }

    fn accepts(&self, nodes: &mut NodeLoader<'_>, id: i64) -> Result<bool, GraphError> {
        if self.predicates.is_empty() {
            return Ok(true);
        }
        Ok(match nodes.load(id)? {
            Some(node) => self.predicates.iter().all(|predicate| predicate(node)),
            None => false,
        })
    }
}

fn hops(path: &[i64]) -> u32 {
    u32::try_from(path.len().saturating_sub(1)).unwrap_or(u32::MAX)
}

/// Per-run node memo so predicates and result materialisation read each node once.
struct NodeLoader<'g> {
    graph: &'g GraphStore,
    loaded: AHashMap<i64, Option<Node>>,
}

impl<'g> NodeLoader<'g> {
    fn new(graph: &'g GraphStore) -> Self {
        Self {
            graph,
            loaded: AHashMap::new(),
        }
    }

    fn load(&mut self, id: i64) -> Result<Option<&Node>, GraphError> {
        if !self.loaded.contains_key(&id) {
            let node = self.graph.get_node(id)?;
            self.loaded.insert(id, node);
        }
        Ok(self.loaded.get(&id).and_then(Option::as_ref))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_step_repeats_past_the_end_of_the_list() {
        let graph = GraphStore::open_in_memory().expect("graph");
        let traversal = graph.traverse(1).out("A").incoming("B");
        assert_eq!(traversal.step_at(0).direction, Direction::Out);
        assert_eq!(traversal.step_at(1).edge_type.as_deref(), Some("B"));
        assert_eq!(traversal.step_at(7).direction, Direction::In);
        assert_eq!(graph.traverse(1).step_at(3), &ANY_STEP);
    }

    #[test]
    fn invalid_direction_token_is_reported() {
        let graph = GraphStore::open_in_memory().expect("graph");
        let err = graph.traverse(1).via("KNOWS", "up").ids().expect_err("invalid");
        assert!(matches!(err, GraphError::Validation(msg) if msg.contains("up")));
    }
}
