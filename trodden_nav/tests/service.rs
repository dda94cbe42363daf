// End-to-end scenarios through the public service surface: build a graph,
// submit requests to the scheduler, walk the results with a cursor.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, mpsc};
use std::time::Duration;

use trodden_nav::config::NavConfig;
use trodden_nav::graph::{NavGraph, RegrowthClock};
use trodden_nav::grid::{CellCoord, GroundPos, GroundRect, Polygon};
use trodden_nav::path::PathCursor;
use trodden_nav::pathfinding::{GoalPredicate, PathRequest, SearchOutcome};
use trodden_nav::scheduler::{PathScheduler, RequestState};
use trodden_nav::terrain::FlatTerrain;
use trodden_nav::types::{ConnectorKind, NodeKind};

const SQRT_2: f32 = std::f32::consts::SQRT_2;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn open_graph(extent: f32, config: &NavConfig) -> Arc<NavGraph> {
    let graph = NavGraph::new(Arc::new(FlatTerrain::default()), config);
    graph.build(GroundRect::new(
        GroundPos::new(0.0, 0.0),
        GroundPos::new(extent, extent),
    ));
    Arc::new(graph)
}

fn run_to_completion(scheduler: &PathScheduler, request: PathRequest) -> (SearchOutcome, Option<trodden_nav::path::Path>) {
    let (tx, rx) = mpsc::channel();
    scheduler.submit_with_callback(request, move |outcome| {
        let _ = tx.send((outcome.outcome, outcome.path.clone()));
    });
    rx.recv_timeout(Duration::from_secs(5))
        .expect("request did not complete")
}

#[test]
fn open_lattice_corner_to_corner() {
    init_logging();
    let config = NavConfig {
        wear_amount: 0.0,
        ..NavConfig::default()
    };
    let graph = open_graph(2.0, &config);
    let scheduler = PathScheduler::new(graph);

    let (outcome, path) = run_to_completion(
        &scheduler,
        PathRequest::to_position(GroundPos::new(0.0, 0.0), GroundPos::new(2.0, 2.0)),
    );
    assert_eq!(outcome, SearchOutcome::Success);
    let path = path.unwrap();
    assert!((path.total_cost() - 2.0 * SQRT_2).abs() < 1e-3);
    assert!(path.len() <= 9);
}

#[test]
fn obstructed_center_routes_around_at_higher_cost() {
    init_logging();
    let config = NavConfig {
        wear_amount: 0.0,
        ..NavConfig::default()
    };
    let graph = open_graph(2.0, &config);
    graph.apply_obstruction(&Polygon::new(vec![
        GroundPos::new(0.6, 0.6),
        GroundPos::new(1.4, 0.6),
        GroundPos::new(1.4, 1.4),
        GroundPos::new(0.6, 1.4),
    ]));
    let blocked = graph.node_at_cell(CellCoord::new(1, 1)).unwrap().id();
    let scheduler = PathScheduler::new(graph.clone());

    let (outcome, path) = run_to_completion(
        &scheduler,
        PathRequest::to_position(GroundPos::new(0.0, 0.0), GroundPos::new(2.0, 2.0)),
    );
    assert_eq!(outcome, SearchOutcome::Success);
    let path = path.unwrap();
    assert!(path.node_ids().all(|id| id != blocked));
    assert!(path.total_cost() > 2.0 * SQRT_2);
}

#[test]
fn budget_below_shortest_path_is_too_far() {
    init_logging();
    let graph = open_graph(2.0, &NavConfig::default());
    let scheduler = PathScheduler::new(graph);

    let (outcome, path) = run_to_completion(
        &scheduler,
        PathRequest::to_position(GroundPos::new(0.0, 0.0), GroundPos::new(2.0, 2.0))
            .with_max_cost(2.0),
    );
    assert_eq!(outcome, SearchOutcome::TooFar);
    assert!(path.is_none());
}

#[test]
fn immediate_cancel_never_completes() {
    init_logging();
    let config = NavConfig {
        worker_count: 1,
        ..NavConfig::default()
    };
    let graph = open_graph(2.0, &config);
    let scheduler = PathScheduler::new(graph);

    // Hold the lone worker inside a callback so the cancelled request can
    // never plausibly start.
    let (gate_tx, gate_rx) = mpsc::channel::<()>();
    let _parked = scheduler.submit_with_callback(
        PathRequest::to_position(GroundPos::new(0.0, 0.0), GroundPos::new(1.0, 0.0)),
        move |_| {
            let _ = gate_rx.recv_timeout(Duration::from_secs(5));
        },
    );

    let cancelled = scheduler.submit(PathRequest::to_position(
        GroundPos::new(0.0, 0.0),
        GroundPos::new(2.0, 2.0),
    ));
    assert!(cancelled.cancel());
    gate_tx.send(()).unwrap();
    drop(scheduler);

    assert_eq!(cancelled.state(), RequestState::Cancelled);
    assert!(!cancelled.is_complete());
    assert!(cancelled.take_result().is_none());
}

#[test]
fn finished_path_drives_a_cursor() {
    init_logging();
    let graph = open_graph(4.0, &NavConfig::default());
    let scheduler = PathScheduler::new(graph);

    let (outcome, path) = run_to_completion(
        &scheduler,
        PathRequest::to_position(GroundPos::new(0.0, 0.0), GroundPos::new(4.0, 0.0)),
    );
    assert_eq!(outcome, SearchOutcome::Success);
    let mut cursor = PathCursor::new(path.unwrap());

    let start = cursor.set_distance(0.0);
    assert!((start.x - 0.0).abs() < 1e-5);
    let total = cursor.total_length();
    assert!((total - 4.0).abs() < 1e-3);

    // Tick forward like movement code would.
    let mut walked = 0.0;
    while cursor.t() < 1.0 {
        let applied = cursor.advance(0.3);
        walked += applied;
        if applied == 0.0 {
            break;
        }
    }
    assert!((walked - total).abs() < 1e-3);
    let end = cursor.position();
    assert!((end.x - 4.0).abs() < 1e-5);
}

#[test]
fn agents_wear_a_trail_that_later_agents_prefer() {
    init_logging();
    let config = NavConfig {
        wear_amount: 0.25,
        ..NavConfig::default()
    };
    let graph = open_graph(4.0, &config);
    let scheduler = PathScheduler::new(graph.clone());

    // March the same straight route a few times to wear it in.
    for _ in 0..3 {
        let (outcome, _) = run_to_completion(
            &scheduler,
            PathRequest::to_position(GroundPos::new(0.0, 2.0), GroundPos::new(4.0, 2.0)),
        );
        assert_eq!(outcome, SearchOutcome::Success);
    }
    let worn = graph.node_at(GroundPos::new(2.0, 2.0)).unwrap();
    assert!(worn.desirability() <= graph.config().min_desirability + 1e-6);

    // A trail-following agent starting one row off drifts onto the worn row.
    let (outcome, path) = run_to_completion(
        &scheduler,
        PathRequest::to_position(GroundPos::new(0.0, 1.0), GroundPos::new(4.0, 1.0))
            .with_trail_blend(1.0),
    );
    assert_eq!(outcome, SearchOutcome::Success);
    let path = path.unwrap();
    let ignores = PathRequest::to_position(GroundPos::new(0.0, 1.0), GroundPos::new(4.0, 1.0));
    let (_, straight) = run_to_completion(&scheduler, ignores);
    // The blended route is cheaper than blind distance would be.
    assert!(path.total_cost() < straight.unwrap().total_cost());
}

#[test]
fn regrowth_erases_an_unused_trail() {
    init_logging();
    let config = NavConfig {
        wear_amount: 0.5,
        regrowth_interval_secs: 1.0,
        regrowth_amount: 0.25,
        ..NavConfig::default()
    };
    let graph = open_graph(2.0, &config);
    let scheduler = PathScheduler::new(graph.clone());
    let (outcome, _) = run_to_completion(
        &scheduler,
        PathRequest::to_position(GroundPos::new(0.0, 0.0), GroundPos::new(2.0, 0.0)),
    );
    assert_eq!(outcome, SearchOutcome::Success);

    let node = graph.node_at(GroundPos::new(1.0, 0.0)).unwrap();
    assert!(node.desirability() < graph.config().max_desirability);

    let mut clock = RegrowthClock::new(&config);
    clock.advance(Duration::from_secs(10), &graph);
    assert_eq!(node.desirability(), graph.config().max_desirability);
}

#[test]
fn predicate_request_finds_a_work_site_through_the_scheduler() {
    init_logging();
    let graph = open_graph(3.0, &NavConfig::default());
    let site = graph
        .attach_connector(GroundPos::new(2.5, 2.5), ConnectorKind::WorkSite)
        .unwrap();
    let scheduler = PathScheduler::new(graph);

    let accept: GoalPredicate = Arc::new(|node| {
        matches!(node.kind(), NodeKind::Connector(ConnectorKind::WorkSite))
    });
    let (outcome, path) = run_to_completion(
        &scheduler,
        PathRequest::to_predicate(GroundPos::new(0.0, 0.0), accept)
            .toward(GroundPos::new(2.5, 2.5)),
    );
    assert_eq!(outcome, SearchOutcome::Success);
    assert_eq!(path.unwrap().node_ids().last(), Some(site));
}

#[test]
fn many_concurrent_requests_all_terminate() {
    init_logging();
    let config = NavConfig {
        worker_count: 4,
        ..NavConfig::default()
    };
    let graph = open_graph(8.0, &config);
    let scheduler = PathScheduler::new(graph);

    let done = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = mpsc::channel();
    let total = 64;
    for i in 0..total {
        let done = done.clone();
        let tx = tx.clone();
        let x = (i % 9) as f32;
        let z = (i % 7) as f32;
        scheduler.submit_with_callback(
            PathRequest::to_position(GroundPos::new(0.0, 0.0), GroundPos::new(x, z)),
            move |outcome| {
                assert!(outcome.outcome.found_path());
                done.fetch_add(1, Ordering::Relaxed);
                let _ = tx.send(());
            },
        );
    }
    for _ in 0..total {
        rx.recv_timeout(Duration::from_secs(10))
            .expect("a request never completed");
    }
    assert_eq!(done.load(Ordering::Relaxed), total);
}
