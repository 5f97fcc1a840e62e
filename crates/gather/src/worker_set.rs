use crate::error::GatherResult;
use crate::interrupt::Interrupt;
use crate::queue::ChannelQueueReader;

/// Result of one call to [`WorkerSet::poll_one`].
pub enum PollOutcome<T> {
    Tuple(T),
    ExhaustedAll,
    YieldToLocal,
    Wait,
}

/// Owns the surviving queue readers and performs a sticky round-robin scan
/// across them.
///
/// `next_reader` only advances after an *unproductive* read (empty, not
/// done) — once a reader yields a tuple the cursor stays pinned to it, so a
/// burst from one worker drains before the cursor ever moves. This avoids
/// per-tuple cursor churn across queues that would otherwise ping-pong a
/// cache line between workers for no benefit.
pub struct WorkerSet<T> {
    readers: Vec<ChannelQueueReader<T>>,
    next_reader: usize,
}

impl<T> WorkerSet<T> {
    /// # Panics
    ///
    /// Panics if `readers` is empty — a `WorkerSet` only exists while at
    /// least one worker's queue may still yield tuples.
    #[must_use]
    pub fn new(readers: Vec<ChannelQueueReader<T>>) -> Self {
        assert!(!readers.is_empty(), "WorkerSet requires at least one reader");
        Self {
            readers,
            next_reader: 0,
        }
    }

    pub fn n_readers(&self) -> usize {
        self.readers.len()
    }

    pub fn poll_one(
        &mut self,
        leader_participating: bool,
        interrupt: &Interrupt,
    ) -> GatherResult<PollOutcome<T>> {
        let mut visited = 0usize;

        loop {
            interrupt.check()?;

            if self.readers.is_empty() {
                return Ok(PollOutcome::ExhaustedAll);
            }

            let idx = self.next_reader;
            let (tuple, done) = self.readers[idx].read()?;

            if done {
                // swap-to-end compaction: the element that was last moves
                // into `idx`, so the cursor stays at `idx` to visit it next
                // without counting this iteration as a visit.
                self.readers.swap_remove(idx);

                if self.readers.is_empty() {
                    return Ok(PollOutcome::ExhaustedAll);
                }
                if idx >= self.readers.len() {
                    self.next_reader = 0;
                }
                continue;
            }

            if let Some(t) = tuple {
                return Ok(PollOutcome::Tuple(t));
            }

            self.next_reader = (self.next_reader + 1) % self.readers.len();
            visited += 1;

            if visited >= self.readers.len() {
                return Ok(if leader_participating {
                    PollOutcome::YieldToLocal
                } else {
                    PollOutcome::Wait
                });
            }
        }
    }

    pub fn shutdown(&mut self) {
        self.readers.clear();
    }
}
