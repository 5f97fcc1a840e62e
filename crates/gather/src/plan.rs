use crate::error::GatherResult;

/// The child plan Gather pulls tuples from.
///
/// A `ChildPlan` is parallel-safe when `N` independently built instances (one
/// per worker, plus the leader's own) produce a disjoint partition of the
/// full rowset — see [`ChildPlanFactory`]. Gather never inspects a plan's
/// internals beyond this contract.
pub trait ChildPlan: Send + 'static {
    type Tuple: Send + 'static;

    /// Returns the next tuple, `Ok(None)` once the plan is exhausted, or an
    /// error if the underlying scan fails. An error here is fatal to the
    /// whole Gather scan, not just this one copy of the plan.
    fn next_tuple(&mut self) -> GatherResult<Option<Self::Tuple>>;
    fn rescan(&mut self);
    fn shutdown(&mut self);
}

/// Builds independent `ChildPlan` instances: one for the leader, one per
/// launched worker. Implementations are responsible for partitioning (e.g.
/// by worker index modulo row count) so the instances are parallel-safe.
pub trait ChildPlanFactory: Send + Sync + 'static {
    type Plan: ChildPlan;

    fn local(&self) -> Self::Plan;
    fn for_worker(&self, worker_index: u32, worker_count: u32) -> Self::Plan;
}

/// Applies the target-list projection to an outgoing tuple. Boxed so
/// `GatherCore` stays generic only over the child plan/tuple type, not over
/// the projection closure.
pub type Projection<T> = Box<dyn FnMut(T) -> T + Send>;

#[must_use]
pub fn identity_projection<T: Send + 'static>() -> Projection<T> {
    Box::new(|t| t)
}

/// Pulls one tuple at a time from the child plan running locally in the
/// leader. Thin by design — the interesting behavior lives in when
/// `GatherCore` decides to call it.
pub struct LocalExecutor<P: ChildPlan> {
    plan: P,
}

impl<P: ChildPlan> LocalExecutor<P> {
    pub fn new(plan: P) -> Self {
        Self { plan }
    }

    pub fn next_tuple(&mut self) -> GatherResult<Option<P::Tuple>> {
        self.plan.next_tuple()
    }

    pub fn rescan(&mut self) {
        self.plan.rescan();
    }

    pub fn shutdown(&mut self) {
        self.plan.shutdown();
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{ChildPlan, ChildPlanFactory};
    use crate::error::{GatherError, GatherResult};
    use std::sync::Arc;

    /// A plan over a fixed, pre-partitioned set of rowsets: one rowset per
    /// worker index, plus a dedicated rowset for the leader when it runs
    /// locally. Built to exercise Gather's merge behavior, not to model a
    /// real scan. Optionally fails with `ChildPlan` after a fixed number of
    /// rows, to exercise fatal-error propagation out of a running scan.
    #[derive(Clone)]
    pub(crate) struct VecChildPlan {
        rows: Vec<String>,
        cursor: usize,
        original: Vec<String>,
        fail_after: Option<usize>,
    }

    impl VecChildPlan {
        pub(crate) fn new(rows: Vec<String>) -> Self {
            Self {
                original: rows.clone(),
                rows,
                cursor: 0,
                fail_after: None,
            }
        }

        pub(crate) fn failing_after(rows: Vec<String>, fail_after: usize) -> Self {
            Self {
                original: rows.clone(),
                rows,
                cursor: 0,
                fail_after: Some(fail_after),
            }
        }
    }

    impl ChildPlan for VecChildPlan {
        type Tuple = String;

        fn next_tuple(&mut self) -> GatherResult<Option<String>> {
            if let Some(n) = self.fail_after {
                if self.cursor == n {
                    return Err(GatherError::ChildPlan("simulated scan failure".into()));
                }
            }
            if self.cursor >= self.rows.len() {
                return Ok(None);
            }
            let row = self.rows[self.cursor].clone();
            self.cursor += 1;
            Ok(Some(row))
        }

        fn rescan(&mut self) {
            self.rows = self.original.clone();
            self.cursor = 0;
        }

        fn shutdown(&mut self) {
            self.cursor = self.rows.len();
        }
    }

    /// Hands a fixed rowset to the leader and a fixed rowset per worker
    /// index; worker rowsets past the configured partition count are empty,
    /// letting tests launch more workers than there is data for.
    pub(crate) struct VecChildPlanFactory {
        local_rows: Vec<String>,
        worker_rows: Vec<Vec<String>>,
        worker_fail_after: Option<usize>,
    }

    impl VecChildPlanFactory {
        pub(crate) fn new(local_rows: Vec<String>, worker_rows: Vec<Vec<String>>) -> Self {
            Self {
                local_rows,
                worker_rows,
                worker_fail_after: None,
            }
        }

        /// Makes every worker-side plan fail after emitting `fail_after`
        /// rows, to exercise `ChildPlanError` propagation through a queue.
        pub(crate) fn with_worker_failure(mut self, fail_after: usize) -> Self {
            self.worker_fail_after = Some(fail_after);
            self
        }

        pub(crate) fn shared(self) -> Arc<Self> {
            Arc::new(self)
        }
    }

    impl ChildPlanFactory for VecChildPlanFactory {
        type Plan = VecChildPlan;

        fn local(&self) -> VecChildPlan {
            VecChildPlan::new(self.local_rows.clone())
        }

        fn for_worker(&self, worker_index: u32, _worker_count: u32) -> VecChildPlan {
            let rows = self
                .worker_rows
                .get(worker_index as usize)
                .cloned()
                .unwrap_or_default();
            match self.worker_fail_after {
                Some(n) => VecChildPlan::failing_after(rows, n),
                None => VecChildPlan::new(rows),
            }
        }
    }
}
