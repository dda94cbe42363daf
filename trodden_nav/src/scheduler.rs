// Asynchronous request scheduling over a fixed worker pool.
//
// The simulation thread never pathfinds. It submits `PathRequest`s and gets
// back a `RequestHandle`; a fixed pool of long-lived worker threads runs
// the searches. Each worker owns its own queue and its own reusable
// `SearchScratch`, pulls requests strictly in arrival order, and runs them
// one at a time; different workers run fully in parallel. Submission picks
// the worker with the fewest pending requests (first found wins ties).
//
// Request lifecycle: Queued -> Started -> Completed, or Queued -> Cancelled
// if `cancel` wins the race before a worker claims the request. The
// transitions run on one atomic with compare-exchange, so cancellation is
// race-free only before a worker claims the request; once claimed, a
// request always runs to completion.
//
// The completion callback runs on the worker thread. Callers must
// synchronize before touching shared state from it.
//
// Shutdown is graceful: dropping the scheduler closes the queues, lets
// every worker drain what it already has, and joins the threads.
//
// See also: `pathfinding.rs` for the search itself, `simplify.rs` for the
// post-pass, `graph.rs` for the shared graph the workers read.

use crate::graph::NavGraph;
use crate::path::Path;
use crate::pathfinding::{self, PathRequest, SearchOutcome, SearchScratch};
use crate::simplify;
use crate::types::NodeId;
use log::{debug, trace};
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::{self, JoinHandle};

// ---------------------------------------------------------------------------
// Request lifecycle
// ---------------------------------------------------------------------------

/// Where a submitted request is in its life.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum RequestState {
    /// Waiting in a worker's queue.
    Queued = 0,
    /// A worker has claimed it; it will run to completion.
    Started = 1,
    /// Finished with a terminal `SearchOutcome`; the result is available.
    Completed = 2,
    /// Cancelled before any worker claimed it. No result will appear.
    Cancelled = 3,
}

impl RequestState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => RequestState::Queued,
            1 => RequestState::Started,
            2 => RequestState::Completed,
            3 => RequestState::Cancelled,
            _ => unreachable!("invalid request state {value}"),
        }
    }
}

/// Terminal product of one request.
#[derive(Clone, Debug)]
pub struct PathOutcome {
    pub outcome: SearchOutcome,
    pub path: Option<Path>,
}

type Callback = Box<dyn FnOnce(&PathOutcome) + Send>;

struct RequestShared {
    request: PathRequest,
    state: AtomicU8,
    result: Mutex<Option<PathOutcome>>,
    callback: Mutex<Option<Callback>>,
}

/// Caller-side view of one submitted request. Clone freely; all clones
/// observe the same request.
#[derive(Clone)]
pub struct RequestHandle {
    shared: Arc<RequestShared>,
}

impl RequestHandle {
    pub fn state(&self) -> RequestState {
        RequestState::from_u8(self.shared.state.load(Ordering::Acquire))
    }

    /// Cancel if no worker has claimed the request yet. Returns whether the
    /// cancellation won; cancelling a started or finished request is a
    /// no-op.
    pub fn cancel(&self) -> bool {
        self.shared
            .state
            .compare_exchange(
                RequestState::Queued as u8,
                RequestState::Cancelled as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub fn is_complete(&self) -> bool {
        self.state() == RequestState::Completed
    }

    /// Take the terminal outcome, once. `None` until completed, and `None`
    /// again after the outcome has been taken.
    pub fn take_result(&self) -> Option<PathOutcome> {
        self.shared
            .result
            .lock()
            .expect("request result poisoned")
            .take()
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

struct WorkerLink {
    queue: Sender<Arc<RequestShared>>,
    pending: Arc<AtomicUsize>,
}

struct WorkerPool {
    links: Vec<WorkerLink>,
    threads: Vec<JoinHandle<()>>,
}

/// The pathfinding service front end. Owns the worker pool; the pool is
/// started lazily on first submission and joined when the scheduler drops.
pub struct PathScheduler {
    graph: Arc<NavGraph>,
    worker_count: usize,
    pool: OnceLock<WorkerPool>,
}

impl PathScheduler {
    pub fn new(graph: Arc<NavGraph>) -> Self {
        let worker_count = graph.config().worker_count.max(1);
        Self {
            graph,
            worker_count,
            pool: OnceLock::new(),
        }
    }

    fn pool(&self) -> &WorkerPool {
        self.pool.get_or_init(|| {
            let mut links = Vec::with_capacity(self.worker_count);
            let mut threads = Vec::with_capacity(self.worker_count);
            for index in 0..self.worker_count {
                let (queue, inbox) = channel::<Arc<RequestShared>>();
                let pending = Arc::new(AtomicUsize::new(0));
                let graph = self.graph.clone();
                let worker_pending = pending.clone();
                threads.push(thread::spawn(move || {
                    worker_loop(index, &graph, &inbox, &worker_pending);
                }));
                links.push(WorkerLink { queue, pending });
            }
            debug!("started {} path workers", self.worker_count);
            WorkerPool { links, threads }
        })
    }

    /// Queue a request on the least-loaded worker.
    pub fn submit(&self, request: PathRequest) -> RequestHandle {
        self.submit_internal(request, None)
    }

    /// Queue a request with a completion callback. The callback runs on the
    /// worker thread after the terminal state is visible.
    pub fn submit_with_callback(
        &self,
        request: PathRequest,
        callback: impl FnOnce(&PathOutcome) + Send + 'static,
    ) -> RequestHandle {
        self.submit_internal(request, Some(Box::new(callback)))
    }

    fn submit_internal(&self, request: PathRequest, callback: Option<Callback>) -> RequestHandle {
        let shared = Arc::new(RequestShared {
            request,
            state: AtomicU8::new(RequestState::Queued as u8),
            result: Mutex::new(None),
            callback: Mutex::new(callback),
        });

        let pool = self.pool();
        let mut chosen = 0usize;
        let mut fewest = usize::MAX;
        for (index, link) in pool.links.iter().enumerate() {
            let load = link.pending.load(Ordering::Relaxed);
            if load < fewest {
                fewest = load;
                chosen = index;
            }
        }
        let link = &pool.links[chosen];
        link.pending.fetch_add(1, Ordering::Relaxed);
        link.queue
            .send(shared.clone())
            .expect("path worker exited unexpectedly");
        trace!("request queued on worker {chosen} (load {fewest})");

        RequestHandle { shared }
    }

    /// Requests currently queued or executing, across all workers.
    pub fn pending(&self) -> usize {
        match self.pool.get() {
            Some(pool) => pool
                .links
                .iter()
                .map(|link| link.pending.load(Ordering::Relaxed))
                .sum(),
            None => 0,
        }
    }
}

impl Drop for PathScheduler {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            // Closing the senders ends each worker's receive loop after it
            // drains what is already queued.
            drop(pool.links);
            for handle in pool.threads {
                let _ = handle.join();
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Workers
// ---------------------------------------------------------------------------

fn worker_loop(
    index: usize,
    graph: &NavGraph,
    inbox: &Receiver<Arc<RequestShared>>,
    pending: &AtomicUsize,
) {
    debug!("path worker {index} running");
    let mut scratch = SearchScratch::new();
    for shared in inbox.iter() {
        let claimed = shared
            .state
            .compare_exchange(
                RequestState::Queued as u8,
                RequestState::Started as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if claimed {
            let outcome = execute(graph, &shared.request, &mut scratch);
            *shared.result.lock().expect("request result poisoned") = Some(outcome.clone());
            shared
                .state
                .store(RequestState::Completed as u8, Ordering::Release);
            let callback = shared
                .callback
                .lock()
                .expect("request callback poisoned")
                .take();
            if let Some(callback) = callback {
                callback(&outcome);
            }
        }
        pending.fetch_sub(1, Ordering::Relaxed);
    }
    debug!("path worker {index} stopped");
}

/// Search, wear the trail in on success, then simplify.
fn execute(graph: &NavGraph, request: &PathRequest, scratch: &mut SearchScratch) -> PathOutcome {
    let (outcome, raw) = pathfinding::search(graph, request, scratch);
    let path = raw.map(|raw| {
        if outcome == SearchOutcome::Success {
            let trodden: Vec<NodeId> = raw.node_ids().collect();
            graph.wear_trail(&trodden, graph.config().wear_amount);
            simplify::simplify(graph, &raw, request.trail_blend)
        } else {
            raw
        }
    });
    PathOutcome { outcome, path }
}
