use thiserror::Error;

/// Errors surfaced by the Gather operator's runtime.
///
/// A worker launching fewer copies than requested, or none at all, is not an
/// error here: it degrades gracefully to whatever started (see
/// `ThreadHarness::launch`), so there is no variant for it.
///
/// There is also no transport-level variant: each worker's queue is a typed
/// `crossbeam` channel, not a shared-memory ring with its own wire framing,
/// so there's nothing for a reader to misparse. A worker's `ChildPlan` error
/// rides the same channel as its tuples (see `queue::QueueMessage`) and comes
/// out the other end as `ChildPlan`, the same variant a local scan failure
/// would raise.
#[derive(Error, Debug)]
pub enum GatherError {
    #[error("scan was cancelled")]
    Cancelled,

    #[error("child plan error: {0}")]
    ChildPlan(String),
}

pub type GatherResult<T> = std::result::Result<T, GatherError>;
