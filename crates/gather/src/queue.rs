use crossbeam::channel::{Receiver, TryRecvError};

use crate::error::{GatherError, GatherResult};

/// One message on a worker's queue: a tuple, or a serialized description of
/// why the worker's child plan gave up. Real shared-memory transports
/// serialize worker-side errors onto the same channel tuples travel on
/// rather than opening a side channel for them; this mirrors that.
pub type QueueMessage<T> = Result<T, String>;

/// The consuming endpoint of a single-producer/single-consumer channel
/// standing in for a shared-memory queue.
///
/// `read()` never blocks: it reports a tuple if one is queued, `done=true`
/// once the producing worker has dropped its sender and the queue has been
/// drained, `(None, false)` otherwise, or an error if the worker reported one.
/// Once `done=true` is observed it is latched forever — `WorkerSet` relies on
/// this to retire the reader without re-checking it.
pub struct ChannelQueueReader<T> {
    receiver: Receiver<QueueMessage<T>>,
    done: bool,
}

impl<T> ChannelQueueReader<T> {
    #[must_use]
    pub fn new(receiver: Receiver<QueueMessage<T>>) -> Self {
        Self {
            receiver,
            done: false,
        }
    }

    pub fn read(&mut self) -> GatherResult<(Option<T>, bool)> {
        if self.done {
            return Ok((None, true));
        }

        match self.receiver.try_recv() {
            Ok(Ok(tuple)) => Ok((Some(tuple), false)),
            Ok(Err(message)) => {
                self.done = true;
                Err(GatherError::ChildPlan(message))
            }
            Err(TryRecvError::Empty) => Ok((None, false)),
            Err(TryRecvError::Disconnected) => {
                self.done = true;
                Ok((None, true))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::unbounded;

    #[test]
    fn reports_a_tuple_when_available() {
        let (tx, rx) = unbounded::<QueueMessage<u32>>();
        tx.send(Ok(7)).unwrap();

        let mut reader = ChannelQueueReader::new(rx);
        assert_eq!(reader.read().unwrap(), (Some(7), false));
    }

    #[test]
    fn reports_empty_without_done_while_sender_lives() {
        let (tx, rx) = unbounded::<QueueMessage<u32>>();
        let mut reader = ChannelQueueReader::new(rx);

        assert_eq!(reader.read().unwrap(), (None, false));
        drop(tx);
    }

    #[test]
    fn reports_done_permanently_once_drained_and_disconnected() {
        let (tx, rx) = unbounded::<QueueMessage<u32>>();
        tx.send(Ok(1)).unwrap();
        drop(tx);

        let mut reader = ChannelQueueReader::new(rx);
        assert_eq!(reader.read().unwrap(), (Some(1), false));
        assert_eq!(reader.read().unwrap(), (None, true));
        assert_eq!(reader.read().unwrap(), (None, true));
    }

    #[test]
    fn surfaces_a_worker_reported_failure_and_then_latches_done() {
        let (tx, rx) = unbounded::<QueueMessage<u32>>();
        tx.send(Err("disk read failed".into())).unwrap();
        drop(tx);

        let mut reader = ChannelQueueReader::new(rx);
        let err = reader.read().unwrap_err();
        assert!(matches!(err, GatherError::ChildPlan(msg) if msg == "disk read failed"));
        assert_eq!(reader.read().unwrap(), (None, true));
    }
}
