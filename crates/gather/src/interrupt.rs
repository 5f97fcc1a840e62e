use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{GatherError, GatherResult};

/// Cooperative cancellation, checked at the top of every loop iteration in
/// `WorkerSet::poll_one` and `GatherCore::next`.
///
/// A pending cancel turns the next `check()` call into an `Err`, which the
/// caller propagates with `?`.
#[derive(Clone)]
pub struct Interrupt {
    cancelled: Arc<AtomicBool>,
}

impl Default for Interrupt {
    fn default() -> Self {
        Self::new()
    }
}

impl Interrupt {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn check(&self) -> GatherResult<()> {
        if self.cancelled.load(Ordering::Acquire) {
            return Err(GatherError::Cancelled);
        }
        Ok(())
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_succeeds_until_cancelled() {
        let interrupt = Interrupt::new();
        assert!(interrupt.check().is_ok());

        interrupt.cancel();
        assert!(matches!(interrupt.check(), Err(GatherError::Cancelled)));
    }

    #[test]
    fn clones_share_cancellation_state() {
        let interrupt = Interrupt::new();
        let cloned = interrupt.clone();

        cloned.cancel();
        assert!(interrupt.is_cancelled());
    }
}
