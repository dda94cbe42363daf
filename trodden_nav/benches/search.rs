// Hot-path benchmarks: raw search and the shortcutting pass on a mid-size
// open lattice.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};
use trodden_nav::config::NavConfig;
use trodden_nav::graph::NavGraph;
use trodden_nav::grid::{GroundPos, GroundRect};
use trodden_nav::pathfinding::{PathRequest, SearchScratch, search};
use trodden_nav::simplify::simplify;
use trodden_nav::terrain::FlatTerrain;

fn bench_graph(extent: f32) -> NavGraph {
    let graph = NavGraph::new(Arc::new(FlatTerrain::default()), &NavConfig::default());
    graph.build(GroundRect::new(
        GroundPos::new(0.0, 0.0),
        GroundPos::new(extent, extent),
    ));
    graph
}

fn search_benchmarks(c: &mut Criterion) {
    let graph = bench_graph(63.0);
    let mut scratch = SearchScratch::new();

    let across =
        PathRequest::to_position(GroundPos::new(0.0, 0.0), GroundPos::new(63.0, 63.0));
    c.bench_function("search_64x64_diagonal", |b| {
        b.iter(|| {
            let (outcome, path) = search(&graph, black_box(&across), &mut scratch);
            black_box((outcome, path))
        })
    });

    let blended = across.clone().with_trail_blend(1.0);
    c.bench_function("search_64x64_diagonal_blended", |b| {
        b.iter(|| {
            let (outcome, path) = search(&graph, black_box(&blended), &mut scratch);
            black_box((outcome, path))
        })
    });

    let dogleg =
        PathRequest::to_position(GroundPos::new(0.0, 0.0), GroundPos::new(63.0, 17.0));
    let (_, raw) = search(&graph, &dogleg, &mut scratch);
    let raw = raw.expect("bench path");
    c.bench_function("simplify_64x64_dogleg", |b| {
        b.iter(|| black_box(simplify(&graph, black_box(&raw), 0.0)))
    });
}

criterion_group!(benches, search_benchmarks);
criterion_main!(benches);
