use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::backend::Backend;
use crate::color::{Color, BLACK};
use crate::common::join_with_timeout;

/// How a transient overlay coexists with other writers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayMode {
    /// Non-black overlay pixels stay visible on top of subsequent writes.
    Overlay,
    /// Other writers are dropped for the overlay's lifetime.
    ExclusivePause,
}

/// Overlay phase, consulted by the buffer write entry point.
pub enum OverlayState {
    Inactive,
    Active {
        mode: OverlayMode,
        snapshot: Vec<Color>,
        pixels: Vec<Color>,
        deadline: Instant,
    },
}

const CANCEL_JOIN: Duration = Duration::from_millis(200);
const POLL: Duration = Duration::from_millis(50);

/// Runs the snapshot/apply/restore cycle for one transient overlay, such
/// as the volume bar, on top of whatever the display is doing.
///
/// A new `show` cancels and replaces the overlay in flight. On natural
/// expiry the pre-overlay snapshot is written back; a cancelled cycle
/// leaves the buffer to its replacement.
pub struct OverlayController {
    worker: Option<OverlayWorker>,
}

struct OverlayWorker {
    cancel: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

impl OverlayController {
    pub fn new() -> Self {
        Self { worker: None }
    }

    /// Show a level bar on the bottom row for `duration`: `percent` of the
    /// row in `color`, the remainder in a dimmed variant, all other rows
    /// untouched from the snapshot.
    pub fn show(
        &mut self,
        backend: &Arc<dyn Backend>,
        percent: u8,
        duration: Duration,
        color: Color,
        mode: OverlayMode,
    ) {
        self.cancel();

        let percent = percent.min(100);
        let (w, h) = backend.native_size();
        let snapshot = backend.read_pixels();
        let mut display = snapshot.clone();
        // the bar alone is what merges over later writes; the snapshot
        // rows only back the initial render
        let mut bar = vec![BLACK; snapshot.len()];
        let filled = ((f32::from(percent) / 100.0) * w as f32).round() as u32;
        let dim = color.dimmed(0.12);
        let row = (h.saturating_sub(1) * w) as usize;
        for x in 0..w as usize {
            let cell = if (x as u32) < filled { color } else { dim };
            if let Some(slot) = display.get_mut(row + x) {
                *slot = cell;
            }
            if let Some(slot) = bar.get_mut(row + x) {
                *slot = cell;
            }
        }

        let deadline = Instant::now() + duration;
        backend.buffer().begin_overlay(mode, snapshot, bar, deadline);
        backend.render(&display, true);

        let cancel = Arc::new(AtomicBool::new(false));
        let flag = cancel.clone();
        let backend = backend.clone();
        let join = thread::spawn(move || run(backend, deadline, flag));
        self.worker = Some(OverlayWorker { cancel, join });
    }

    /// Cancel an in-flight overlay without restoring its snapshot.
    pub fn cancel(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.cancel.store(true, Ordering::SeqCst);
            if !join_with_timeout(worker.join, CANCEL_JOIN) {
                tracing::warn!("overlay worker did not stop within the join deadline");
            }
        }
    }
}

impl Default for OverlayController {
    fn default() -> Self {
        Self::new()
    }
}

fn run(backend: Arc<dyn Backend>, deadline: Instant, cancel: Arc<AtomicBool>) {
    loop {
        if cancel.load(Ordering::SeqCst) {
            // replaced: the next overlay owns the buffer now
            backend.buffer().end_overlay();
            return;
        }
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep(POLL.min(deadline - now));
    }
    if let Some(snapshot) = backend.buffer().end_overlay() {
        backend.render(&snapshot, true);
    }
}
