use std::time::Duration;

use criterion::{Criterion, criterion_group, criterion_main};
use rand::{Rng, SeedableRng, rngs::StdRng};
use relgraph::{Direction, GraphStore, Properties};
use serde_json::json;

const LINE_SEED: u64 = 0xDD21;
const ER_SEED: u64 = 0xEE45;
const SAMPLE_SIZE: usize = 20;
const WARM_UP: Duration = Duration::from_millis(300);
const MEASURE: Duration = Duration::from_millis(500);

struct PreparedGraph {
    graph: GraphStore,
    ids: Vec<i64>,
    label: &'static str,
}

fn bench_scale() -> usize {
    #[cfg(feature = "bench-ci")]
    {
        2_000
    }
    #[cfg(not(feature = "bench-ci"))]
    {
        10_000
    }
}

fn prepared_graphs() -> Vec<PreparedGraph> {
    let nodes = bench_scale();
    let line: Vec<(usize, usize)> = (1..nodes).map(|idx| (idx - 1, idx)).collect();
    let mut rng = StdRng::seed_from_u64(ER_SEED);
    let random: Vec<(usize, usize)> = (0..nodes.saturating_mul(3))
        .map(|_| (rng.gen_range(0..nodes), rng.gen_range(0..nodes)))
        .collect();
    vec![
        materialize(nodes, &line, LINE_SEED, "line"),
        materialize(nodes, &random, ER_SEED, "er"),
    ]
}

fn materialize(
    nodes: usize,
    edges: &[(usize, usize)],
    seed: u64,
    label: &'static str,
) -> PreparedGraph {
    let graph = GraphStore::open_in_memory().expect("graph");
    let mut rng = StdRng::seed_from_u64(seed);
    let ids = graph
        .transaction(|tx| {
            let g = tx.graph();
            let mut ids = Vec::with_capacity(nodes);
            for idx in 0..nodes {
                let props = json!({"idx": idx, "score": rng.gen_range(0..100)});
                let props: Properties = props.as_object().cloned().unwrap_or_default();
                ids.push(g.create_node("Item", props)?.id);
            }
            for &(from, to) in edges {
                g.create_edge(ids[from], "LINK", ids[to], None)?;
            }
            Ok(ids)
        })
        .expect("load");
    PreparedGraph { graph, ids, label }
}

fn configure(c: &mut Criterion, name: &str) -> criterion::BenchmarkGroup<'_, criterion::measurement::WallTime> {
    let mut group = c.benchmark_group(name);
    group.sample_size(SAMPLE_SIZE);
    group.warm_up_time(WARM_UP);
    group.measurement_time(MEASURE);
    group
}

fn bench_neighbors(c: &mut Criterion) {
    let graphs = prepared_graphs();
    let mut group = configure(c, "neighbors");
    for prepared in &graphs {
        let start = prepared.ids[prepared.ids.len() / 2];
        group.bench_function(prepared.label, |b| {
            b.iter(|| {
                prepared
                    .graph
                    .neighbors(start, Some("LINK"), Direction::Both, None)
                    .expect("neighbors")
            });
        });
    }
    group.finish();
}

fn bench_traverse(c: &mut Criterion) {
    let graphs = prepared_graphs();
    let mut group = configure(c, "traverse_depth_3");
    for prepared in &graphs {
        let start = prepared.ids[0];
        group.bench_function(prepared.label, |b| {
            b.iter(|| {
                prepared
                    .graph
                    .traverse(start)
                    .out("LINK")
                    .max_depth(3)
                    .unique()
                    .ids()
                    .expect("traverse")
            });
        });
    }
    group.finish();
}

fn bench_shortest_paths(c: &mut Criterion) {
    let graphs = prepared_graphs();
    let mut group = configure(c, "shortest_path");
    for prepared in &graphs {
        let start = prepared.ids[0];
        let end = match prepared.label {
            "line" => prepared.ids[prepared.ids.len().min(64) - 1],
            _ => prepared.ids[prepared.ids.len() - 1],
        };
        group.bench_function(prepared.label, |b| {
            b.iter(|| {
                prepared
                    .graph
                    .traverse(start)
                    .both("LINK")
                    .max_depth(64)
                    .shortest_path(end)
                    .expect("shortest")
            });
        });
    }
    group.finish();
}

fn bench_pattern(c: &mut Criterion) {
    let graphs = prepared_graphs();
    let mut group = configure(c, "pattern_two_hop");
    for prepared in &graphs {
        group.bench_function(prepared.label, |b| {
            b.iter(|| {
                prepared
                    .graph
                    .pattern()
                    .start("a", "Item")
                    .through("LINK", Direction::Out)
                    .node("b", "Item")
                    .through("LINK", Direction::Out)
                    .end("c", "Item")
                    .where_var("a", json!({"score": {"$gte": 95}}).as_object().cloned().unwrap_or_default())
                    .limit(100)
                    .exec()
                    .expect("pattern")
            });
        });
    }
    group.finish();
}

criterion_group!(
    name = traversal_benches;
    config = Criterion::default();
    targets = bench_neighbors, bench_traverse, bench_shortest_paths, bench_pattern
);
criterion_main!(traversal_benches);
