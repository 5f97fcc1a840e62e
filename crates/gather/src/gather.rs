use std::sync::Arc;
use std::time::Duration;

use crate::config::GatherConfig;
use crate::error::GatherResult;
use crate::harness::{ThreadHarness, WorkerMode};
use crate::interrupt::Interrupt;
use crate::latch::Latch;
use crate::plan::{identity_projection, ChildPlan, ChildPlanFactory, LocalExecutor, Projection};
use crate::queue::ChannelQueueReader;
use crate::stats::GatherStats;
use crate::worker_set::{PollOutcome, WorkerSet};

/// How long a `Wait` outcome blocks before re-checking anyway. There is no
/// caller-facing timeout on `next()` itself; this only bounds a lost wakeup
/// that could otherwise race a `latch.reset()` against a worker's
/// `latch.set()`.
const LATCH_WAIT_TIMEOUT: Duration = Duration::from_millis(200);

type TupleOf<F> = <<F as ChildPlanFactory>::Plan as ChildPlan>::Tuple;

/// The Gather operator: fans N worker copies of a child plan, plus
/// optionally the leader itself, into a single tuple stream.
pub struct GatherCore<F: ChildPlanFactory> {
    config: GatherConfig,
    is_worker_context: bool,

    initialized: bool,
    terminal: bool,
    need_to_scan_locally: bool,

    harness: Option<ThreadHarness<F>>,
    workers: Option<WorkerSet<TupleOf<F>>>,
    funnel_slot: Option<TupleOf<F>>,

    local_plan: LocalExecutor<F::Plan>,
    factory: Arc<F>,

    projection: Projection<TupleOf<F>>,
    sink: Option<Arc<dyn Fn(TupleOf<F>) + Send + Sync>>,

    interrupt: Interrupt,
    latch: Latch,
    stats: Option<GatherStats>,
}

impl<F: ChildPlanFactory> GatherCore<F> {
    /// Constructs the operator. Workers are **not** launched yet — that
    /// happens lazily on the first `next()` call.
    #[must_use]
    pub fn init(factory: Arc<F>, config: GatherConfig, is_worker_context: bool) -> Self {
        let local_plan = LocalExecutor::new(factory.local());
        let need_to_scan_locally = !config.single_copy;
        let stats = config.statistics_enabled.then(GatherStats::default);

        Self {
            initialized: false,
            terminal: false,
            need_to_scan_locally,
            harness: None,
            workers: None,
            funnel_slot: None,
            local_plan,
            factory,
            projection: identity_projection(),
            sink: None,
            interrupt: Interrupt::new(),
            latch: Latch::new(),
            stats,
            config,
            is_worker_context,
        }
    }

    #[must_use]
    pub fn with_projection(mut self, projection: Projection<TupleOf<F>>) -> Self {
        self.projection = projection;
        self
    }

    /// Required before the first `next()` call when `config.parallel_send`
    /// is set — workers write directly to this sink instead of a queue.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn Fn(TupleOf<F>) + Send + Sync>) -> Self {
        self.sink = Some(sink);
        self
    }

    #[must_use]
    pub fn interrupt_handle(&self) -> Interrupt {
        self.interrupt.clone()
    }

    #[must_use]
    pub fn stats(&self) -> Option<GatherStats> {
        self.stats
    }

    /// Returns the next projected tuple, or `None` at end-of-stream. Once
    /// `None` is returned, every subsequent call also returns `None` until
    /// `rescan()`.
    pub fn next(&mut self) -> GatherResult<Option<TupleOf<F>>> {
        if self.terminal {
            return Ok(None);
        }

        self.interrupt.check()?;

        if !self.initialized {
            self.do_initialize()?;
        }

        if self.config.parallel_send {
            return self.next_parallel_send();
        }

        loop {
            self.interrupt.check()?;
            self.funnel_slot = None;

            if self.workers.is_none() && !self.need_to_scan_locally {
                self.shutdown_workers();
                self.terminal = true;
                return Ok(None);
            }

            if self.workers.is_some() {
                let outcome = self
                    .workers
                    .as_mut()
                    .unwrap()
                    .poll_one(self.need_to_scan_locally, &self.interrupt)?;

                match outcome {
                    PollOutcome::Tuple(t) => {
                        self.funnel_slot = Some(t);
                    }
                    PollOutcome::ExhaustedAll => {
                        ewe_trace::debug!("gather: all worker queues exhausted");
                        self.workers = None;
                        continue;
                    }
                    PollOutcome::YieldToLocal => {
                        // fall through to the local attempt below.
                    }
                    PollOutcome::Wait => {
                        self.latch.wait(LATCH_WAIT_TIMEOUT);
                        self.latch.reset();
                        continue;
                    }
                }
            }

            if self.funnel_slot.is_none() && self.need_to_scan_locally {
                match self.local_plan.next_tuple()? {
                    Some(t) => {
                        if let Some(stats) = self.stats.as_mut() {
                            stats.record_local_tuple();
                        }
                        self.funnel_slot = Some(t);
                    }
                    None => {
                        self.need_to_scan_locally = false;
                        continue;
                    }
                }
            }

            if let Some(t) = self.funnel_slot.take() {
                return Ok(Some((self.projection)(t)));
            }
        }
    }

    /// `parallel_send` mode: workers write straight to the caller's sink, so
    /// `next()` has nothing to funnel. The leader's only job is to wait for
    /// the workers to finish, then report end-of-stream.
    fn next_parallel_send(&mut self) -> GatherResult<Option<TupleOf<F>>> {
        if let Some(harness) = self.harness.as_mut() {
            let gathered = harness.finish();
            if let Some(stats) = self.stats.as_mut() {
                stats.merge(gathered);
            }
        }
        self.terminal = true;
        Ok(None)
    }

    fn do_initialize(&mut self) -> GatherResult<()> {
        if self.is_worker_context {
            // Already running inside a worker's slice: do not nest further
            // parallelism, fall back to scanning the child plan directly.
            self.workers = None;
            self.need_to_scan_locally = true;
            self.initialized = true;
            return Ok(());
        }

        if self.config.num_workers_requested > 0 {
            if self.harness.is_none() {
                self.harness = Some(ThreadHarness::new(
                    self.factory.clone(),
                    self.config.num_workers_requested,
                ));
            }
            // If the harness already existed, the preceding `rescan()` call
            // reinitialized it, not this branch — keeps "reinitialize" a
            // single call per rescan rather than a variable one to two.

            let mode = if self.config.parallel_send {
                WorkerMode::DirectSink(
                    self.sink
                        .clone()
                        .expect("parallel_send requires with_sink() before the first next()"),
                )
            } else {
                WorkerMode::Queued
            };

            let receivers = self.harness.as_mut().unwrap().launch(
                &mode,
                self.config.statistics_enabled,
                self.latch.clone(),
            );
            let launched = self.harness.as_ref().unwrap().launched_count();

            if launched > 0 {
                if !self.config.parallel_send {
                    let readers: Vec<_> = receivers.into_iter().map(ChannelQueueReader::new).collect();
                    self.workers = Some(WorkerSet::new(readers));
                }
            } else {
                ewe_trace::warn!("gather: no workers launched, falling back to leader-only scan");
                self.shutdown_workers();
                self.harness = None;
            }
        }

        self.need_to_scan_locally = if self.config.single_copy {
            self.workers.is_none()
        } else {
            true
        };

        self.initialized = true;
        Ok(())
    }

    /// Destroys any surviving readers and joins the harness's worker
    /// threads, merging their statistics. Idempotent: safe to call again
    /// after workers/harness have already been drained.
    fn shutdown_workers(&mut self) {
        if let Some(mut workers) = self.workers.take() {
            workers.shutdown();
        }

        if let Some(harness) = self.harness.as_mut() {
            let gathered = harness.finish();
            if let Some(stats) = self.stats.as_mut() {
                stats.merge(gathered);
            }
        }
    }

    /// Resets for a fresh scan of the same plan.
    pub fn rescan(&mut self) -> GatherResult<()> {
        self.shutdown_workers();
        self.initialized = false;
        self.terminal = false;
        self.funnel_slot = None;

        if let Some(harness) = self.harness.as_mut() {
            harness.reinitialize();
        }

        self.local_plan.rescan();
        self.need_to_scan_locally = !self.config.single_copy;
        Ok(())
    }

    /// Terminal teardown: destroys workers, finishes and cleans up the
    /// harness, and shuts down the leader's own plan instance.
    pub fn shutdown(&mut self) {
        self.shutdown_workers();

        if let Some(harness) = self.harness.as_mut() {
            harness.cleanup();
        }
        self.harness = None;

        self.local_plan.shutdown();
        self.terminal = true;
    }

    /// Requests cooperative early termination (e.g. a satisfied LIMIT) and
    /// drains `next()` to the empty sentinel.
    pub fn finish_early(&mut self) -> GatherResult<()> {
        if let Some(harness) = self.harness.as_ref() {
            harness.request_early_stop();
        }
        while self.next()?.is_some() {}
        Ok(())
    }
}

/// Joins any outstanding worker threads even if the caller drops a
/// `GatherCore` without calling `shutdown()` first — e.g. after `next()`
/// returns `Err(GatherError::Cancelled)`.
impl<F: ChildPlanFactory> Drop for GatherCore<F> {
    fn drop(&mut self) {
        self.shutdown_workers();
    }
}
