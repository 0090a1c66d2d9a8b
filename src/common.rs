use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Wait for a worker thread to finish, giving up after `timeout`.
///
/// Returns `false` when the deadline elapsed; the handle is dropped and
/// the thread left to observe its stop flag on its own time.
pub fn join_with_timeout(handle: JoinHandle<()>, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(10));
    }
    if handle.join().is_err() {
        tracing::error!("worker thread panicked");
    }
    true
}
