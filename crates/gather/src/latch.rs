use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// A one-shot wakeup primitive, settable by any thread and consumed by
/// `wait` + `reset`.
///
/// Workers call `set()` after pushing a tuple onto their queue (or upon
/// exhaustion); the leader calls `wait()` once a full unproductive
/// round-robin lap has found nothing (`PollOutcome::Wait`), then `reset()`
/// before resuming the loop.
#[derive(Clone)]
pub struct Latch {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Default for Latch {
    fn default() -> Self {
        Self::new()
    }
}

impl Latch {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new((Mutex::new(false), Condvar::new())),
        }
    }

    pub fn set(&self) {
        let (lock, cvar) = &*self.inner;
        let mut signaled = lock.lock().unwrap();
        *signaled = true;
        cvar.notify_all();
    }

    /// Blocks until `set()` has been called or `timeout` elapses. The timeout
    /// only guards against a lost wakeup racing a concurrent `reset()`; there
    /// is no caller-facing timeout on the operator itself.
    pub fn wait(&self, timeout: Duration) {
        let (lock, cvar) = &*self.inner;
        let signaled = lock.lock().unwrap();
        let _ = cvar.wait_timeout_while(signaled, timeout, |s| !*s).unwrap();
    }

    pub fn reset(&self) {
        let (lock, _cvar) = &*self.inner;
        *lock.lock().unwrap() = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn wait_returns_once_set_from_another_thread() {
        let latch = Latch::new();
        let setter = latch.clone();

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            setter.set();
        });

        latch.wait(Duration::from_secs(5));
        handle.join().unwrap();
    }

    #[test]
    fn reset_clears_the_signal() {
        let latch = Latch::new();
        latch.set();
        latch.reset();

        // with no one to set it again, this should simply time out quickly.
        latch.wait(Duration::from_millis(20));
    }
}
