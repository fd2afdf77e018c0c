//! Duplicate suppression for cyclic patterns.
//!
//! When the end variable re-binds an earlier one, the cycle between them can
//! often be walked in more than one way that satisfies the same steps: from a
//! different starting point (when the cycle is the whole pattern) or in the
//! opposite direction. Each such signature-preserving rotation or reflection
//! `g` maps a match `t` to another match `g(t)`. Requiring
//! `t <= g(t)` for every `g`, compared as row values over the cycle's node
//! and edge ids, keeps exactly the lexicographically least member of each
//! orbit. Cycles with no such symmetry get no constraint.

use super::compiler::Layout;

/// Column taking part in an ordering constraint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Member {
    Node(usize),
    Edge(usize),
}

/// `lhs <= rhs` compared as row values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct RowOrdering {
    pub lhs: Vec<Member>,
    pub rhs: Vec<Member>,
}

/// The cycle closed by the final position: node slots `c_0..c_{L-1}` and the
/// edge steps `k_i` joining `c_i` to `c_{i+1 mod L}`.
#[derive(Debug)]
struct Cycle {
    nodes: Vec<usize>,
    edges: Vec<usize>,
    /// The cycle starts at position 0, so there is no tail to hold fixed.
    whole: bool,
}

/// A dihedral transformation of the cycle: `c_i -> c_node[i]`, `k_i -> k_edge[i]`.
#[derive(Debug, PartialEq, Eq)]
struct Transform {
    node: Vec<usize>,
    edge: Vec<usize>,
    reflected: bool,
}

pub(crate) fn ordering_constraints(layout: &Layout) -> Vec<RowOrdering> {
    let Some(cycle) = closing_cycle(layout) else {
        return Vec::new();
    };
    let mut accepted: Vec<Transform> = Vec::new();
    for transform in transforms(&cycle) {
        if is_identity(&transform) || accepted.contains(&transform) {
            continue;
        }
        if preserves_signature(layout, &cycle, &transform) {
            accepted.push(transform);
        }
    }
    tracing::trace!(
        target: "relgraph::pattern",
        cycle_len = cycle.nodes.len(),
        whole = cycle.whole,
        automorphisms = accepted.len(),
        "cycle symmetry"
    );
    accepted
        .iter()
        .map(|transform| RowOrdering {
            lhs: members(&cycle, |i| i, |i| i),
            rhs: members(&cycle, |i| transform.node[i], |i| transform.edge[i]),
        })
        .collect()
}

/// The cycle is only recognised when the last position is the single reuse
/// of an earlier variable.
fn closing_cycle(layout: &Layout) -> Option<Cycle> {
    let last = layout.positions.len().checked_sub(1)?;
    if last == 0 {
        return None;
    }
    let mut seen = vec![false; layout.slots.len()];
    let mut reused = Vec::new();
    for (pos, &slot) in layout.positions.iter().enumerate() {
        if seen[slot] {
            reused.push(pos);
        }
        seen[slot] = true;
    }
    if reused != [last] {
        return None;
    }
    let closing = layout.positions[last];
    let opened = layout.positions.iter().position(|&slot| slot == closing)?;
    Some(Cycle {
        nodes: layout.positions[opened..last].to_vec(),
        edges: (opened..last).collect(),
        whole: opened == 0,
    })
}

fn transforms(cycle: &Cycle) -> Vec<Transform> {
    let len = cycle.nodes.len();
    let mut result = Vec::new();
    if cycle.whole {
        for shift in 1..len {
            result.push(Transform {
                node: (0..len).map(|i| (i + shift) % len).collect(),
                edge: (0..len).map(|i| (i + shift) % len).collect(),
                reflected: false,
            });
        }
    }
    // A tail hangs off c_0, so only the reflection fixing c_0 is available.
    let axes = if cycle.whole { len } else { 1 };
    for axis in 0..axes {
        result.push(Transform {
            node: (0..len).map(|i| (axis + len - i) % len).collect(),
            edge: (0..len).map(|i| (axis + 2 * len - i - 1) % len).collect(),
            reflected: true,
        });
    }
    result
}

fn is_identity(transform: &Transform) -> bool {
    transform.node.iter().enumerate().all(|(i, &j)| i == j)
        && transform.edge.iter().enumerate().all(|(i, &j)| i == j)
}

fn preserves_signature(layout: &Layout, cycle: &Cycle, transform: &Transform) -> bool {
    let nodes_match = (0..cycle.nodes.len()).all(|i| {
        let here = &layout.slots[cycle.nodes[i]];
        let there = &layout.slots[cycle.nodes[transform.node[i]]];
        here.same_shape(there)
    });
    let edges_match = (0..cycle.edges.len()).all(|i| {
        let here = &layout.edges[cycle.edges[i]];
        let there = &layout.edges[cycle.edges[transform.edge[i]]];
        let direction = if transform.reflected {
            there.direction.reverse()
        } else {
            there.direction
        };
        here.edge_type == there.edge_type && here.direction == direction
    });
    nodes_match && edges_match
}

fn members(
    cycle: &Cycle,
    node_at: impl Fn(usize) -> usize,
    edge_at: impl Fn(usize) -> usize,
) -> Vec<Member> {
    let nodes = (0..cycle.nodes.len()).map(|i| Member::Node(cycle.nodes[node_at(i)]));
    let edges = (0..cycle.edges.len()).map(|i| Member::Edge(cycle.edges[edge_at(i)]));
    nodes.chain(edges).collect()
}
