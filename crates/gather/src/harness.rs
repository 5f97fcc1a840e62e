use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam::channel::{self, Receiver};

use crate::latch::Latch;
use crate::plan::{ChildPlan, ChildPlanFactory};
use crate::queue::QueueMessage;
use crate::stats::{GatherStats, WorkerStats};

/// Bound on each worker's queue. A real shared-memory queue is a fixed-size
/// ring; bounding the channel here reproduces the backpressure that gives
/// `QueueReader::read` a reason to ever see "empty, not done".
const WORKER_QUEUE_CAPACITY: usize = 64;

/// How a launched worker delivers its tuples.
///
/// `Queued` is the normal funnel-through-the-leader path. `DirectSink` sends
/// tuples straight to a caller-supplied sink instead: the leader's only job
/// is to wait for every worker to finish, never touching a queue.
pub enum WorkerMode<T: Send + 'static> {
    Queued,
    DirectSink(Arc<dyn Fn(T) + Send + Sync>),
}

/// Launches worker threads attached to a child plan, tracks how many
/// actually started, and reaps them once the scan is done.
///
/// Workers are threads rather than separate processes: each one runs its
/// own `ChildPlanFactory::for_worker` instance to completion and reports
/// through a bounded channel or a direct sink.
pub struct ThreadHarness<F: ChildPlanFactory> {
    factory: Arc<F>,
    capacity: u32,
    executor_done: Arc<AtomicBool>,
    handles: Vec<JoinHandle<WorkerStats>>,
    launched: u32,
}

impl<F: ChildPlanFactory> ThreadHarness<F> {
    #[must_use]
    pub fn new(factory: Arc<F>, capacity: u32) -> Self {
        Self {
            factory,
            capacity,
            executor_done: Arc::new(AtomicBool::new(false)),
            handles: Vec::new(),
            launched: 0,
        }
    }

    /// Resets shared state for another scan while keeping the allocation.
    pub fn reinitialize(&mut self) {
        self.executor_done.store(false, Ordering::Release);
        self.handles.clear();
        self.launched = 0;
    }

    /// Launches up to `capacity` workers, each running its own
    /// `ChildPlanFactory::for_worker` instance. Returns the per-worker
    /// receivers in `Queued` mode (empty in `DirectSink` mode, since tuples
    /// never pass through the leader there).
    pub fn launch(
        &mut self,
        mode: &WorkerMode<<F::Plan as ChildPlan>::Tuple>,
        statistics_enabled: bool,
        latch: Latch,
    ) -> Vec<Receiver<QueueMessage<<F::Plan as ChildPlan>::Tuple>>> {
        self.handles.clear();
        let mut receivers = Vec::with_capacity(self.capacity as usize);

        for idx in 0..self.capacity {
            let mut plan = self.factory.for_worker(idx, self.capacity);
            let done_flag = self.executor_done.clone();
            let worker_latch = latch.clone();

            let spawned = match mode {
                WorkerMode::Queued => {
                    let (tx, rx) = channel::bounded(WORKER_QUEUE_CAPACITY);
                    let spawned = thread::Builder::new()
                        .name(format!("gather-worker-{idx}"))
                        .spawn(move || {
                            let stats = run_worker_queued(
                                &mut plan,
                                &tx,
                                &done_flag,
                                statistics_enabled,
                            );
                            drop(tx);
                            worker_latch.set();
                            stats
                        });
                    if spawned.is_ok() {
                        receivers.push(rx);
                    }
                    spawned
                }
                WorkerMode::DirectSink(sink) => {
                    let sink = Arc::clone(sink);
                    thread::Builder::new()
                        .name(format!("gather-worker-{idx}"))
                        .spawn(move || {
                            let stats = run_worker_direct(
                                &mut plan,
                                sink.as_ref(),
                                &done_flag,
                                statistics_enabled,
                            );
                            worker_latch.set();
                            stats
                        })
                }
            };

            match spawned {
                Ok(handle) => self.handles.push(handle),
                Err(err) => ewe_trace::warn!("gather worker {idx} failed to start: {err}"),
            }
        }

        self.launched = self.handles.len() as u32;
        ewe_trace::info!("gather harness launched {} of {} requested workers", self.launched, self.capacity);
        receivers
    }

    pub fn launched_count(&self) -> u32 {
        self.launched
    }

    /// Sets the cooperative early-termination flag workers poll between
    /// tuples — backs `GatherCore::finish_early`.
    pub fn request_early_stop(&self) {
        self.executor_done.store(true, Ordering::Release);
    }

    /// Joins every launched worker and merges its statistics. No worker
    /// stats are safe to read before this returns — safe to call repeatedly,
    /// later calls simply find nothing left to join.
    pub fn finish(&mut self) -> GatherStats {
        let mut aggregate = GatherStats::default();
        for handle in self.handles.drain(..) {
            match handle.join() {
                Ok(worker_stats) => aggregate.merge_worker(worker_stats),
                Err(_) => ewe_trace::error!("a gather worker thread panicked"),
            }
        }
        aggregate
    }

    /// Releases the harness's shared state. There is nothing left to free
    /// once `finish` has joined every thread, so this only resets
    /// bookkeeping.
    pub fn cleanup(&mut self) {
        self.launched = 0;
        self.executor_done.store(false, Ordering::Release);
    }
}

fn run_worker_queued<P: ChildPlan>(
    plan: &mut P,
    tx: &channel::Sender<QueueMessage<P::Tuple>>,
    done_flag: &AtomicBool,
    statistics_enabled: bool,
) -> WorkerStats {
    let mut stats = WorkerStats::default();
    loop {
        if done_flag.load(Ordering::Acquire) {
            break;
        }

        let started = statistics_enabled.then(Instant::now);
        match plan.next_tuple() {
            Ok(Some(tuple)) => {
                if let Some(t0) = started {
                    stats.record(t0.elapsed());
                }
                if tx.send(Ok(tuple)).is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(err) => {
                ewe_trace::error!("gather worker's child plan failed: {err}");
                let _ = tx.send(Err(err.to_string()));
                break;
            }
        }
    }
    plan.shutdown();
    stats
}

fn run_worker_direct<P: ChildPlan>(
    plan: &mut P,
    sink: &(dyn Fn(P::Tuple) + Send + Sync),
    done_flag: &AtomicBool,
    statistics_enabled: bool,
) -> WorkerStats {
    let mut stats = WorkerStats::default();
    loop {
        if done_flag.load(Ordering::Acquire) {
            break;
        }

        let started = statistics_enabled.then(Instant::now);
        match plan.next_tuple() {
            Ok(Some(tuple)) => {
                if let Some(t0) = started {
                    stats.record(t0.elapsed());
                }
                sink(tuple);
            }
            Ok(None) => break,
            Err(err) => {
                // There is no queue back to the leader in direct-sink mode to
                // carry this error on, so it can only be logged here.
                ewe_trace::error!("gather worker's child plan failed: {err}");
                break;
            }
        }
    }
    plan.shutdown();
    stats
}
