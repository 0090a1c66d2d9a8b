use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::backend::Backend;
use crate::color::Color;
use crate::common::join_with_timeout;
use crate::{gif, preset};

/// What the running playback worker is iterating over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationKind {
    GifFrames,
    SegmentPreset,
}

/// Playback state as observed from outside the worker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnimationState {
    Idle,
    Playing {
        kind: AnimationKind,
        looping: bool,
        speed: f32,
    },
    Paused {
        kind: AnimationKind,
        looping: bool,
        speed: f32,
    },
}

/// One decoded playback frame. Preset frames may carry a brightness
/// change that applies before the pixels are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimationFrame {
    pub pixels: Vec<Color>,
    pub duration: Duration,
    pub brightness: Option<u8>,
}

/// Why a play call was rejected. Raised synchronously, before any worker
/// is spawned, so a failed play leaves the previous state untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayError {
    SourceNotFound { path: PathBuf },
    NoFramesFound,
}

impl fmt::Display for PlayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayError::SourceNotFound { path } => {
                write!(f, "animation source not found: {}", path.display())
            }
            PlayError::NoFramesFound => write!(f, "no playable frames in animation source"),
        }
    }
}

impl std::error::Error for PlayError {}

const STOP_JOIN: Duration = Duration::from_secs(2);
const STOP_POLL: Duration = Duration::from_millis(50);
const PAUSE_POLL: Duration = Duration::from_millis(20);
const MIN_FRAME: Duration = Duration::from_millis(10);

/// Drives at most one background playback worker against a backend.
///
/// Re-entrant play calls cancel and replace the running worker rather
/// than queue. Stop, pause and resume are cooperative flags observed at
/// frame boundaries and during the inter-frame delay, which keeps stop
/// latency bounded regardless of frame duration.
pub struct AnimationController {
    worker: Option<Worker>,
}

struct Worker {
    kind: AnimationKind,
    looping: bool,
    speed: f32,
    stop: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    playing: Arc<AtomicBool>,
    join: JoinHandle<()>,
}

impl AnimationController {
    pub fn new() -> Self {
        Self { worker: None }
    }

    /// Decode a GIF up front and start playing it. The running animation
    /// is only replaced once decoding succeeded.
    pub fn play_gif(
        &mut self,
        backend: &Arc<dyn Backend>,
        path: &Path,
        speed: f32,
        looping: bool,
    ) -> Result<(), PlayError> {
        let frames = gif::load_gif_frames(path, backend.native_size())?;
        self.start(backend, frames, AnimationKind::GifFrames, speed, looping);
        Ok(())
    }

    /// Parse a segment preset and start playing it.
    pub fn play_preset(
        &mut self,
        backend: &Arc<dyn Backend>,
        path: &Path,
        speed: f32,
        looping: bool,
    ) -> Result<(), PlayError> {
        let (w, h) = backend.native_size();
        let frames = preset::load_preset_file(path, (w * h) as usize)?;
        self.start(backend, frames, AnimationKind::SegmentPreset, speed, looping);
        Ok(())
    }

    fn start(
        &mut self,
        backend: &Arc<dyn Backend>,
        frames: Vec<AnimationFrame>,
        kind: AnimationKind,
        speed: f32,
        looping: bool,
    ) {
        self.stop();
        let stop = Arc::new(AtomicBool::new(false));
        let paused = Arc::new(AtomicBool::new(false));
        let playing = Arc::new(AtomicBool::new(true));
        let backend = backend.clone();
        let stop_flag = stop.clone();
        let pause_flag = paused.clone();
        let playing_flag = playing.clone();
        let join = thread::spawn(move || {
            run(&*backend, &frames, speed, looping, &stop_flag, &pause_flag);
            playing_flag.store(false, Ordering::SeqCst);
        });
        self.worker = Some(Worker {
            kind,
            looping,
            speed,
            stop,
            paused,
            playing,
            join,
        });
    }

    /// Signal the worker and wait (bounded) for it to exit. Best-effort:
    /// a join timeout is logged and the call returns anyway.
    pub fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.stop.store(true, Ordering::SeqCst);
            worker.paused.store(false, Ordering::SeqCst);
            if !join_with_timeout(worker.join, STOP_JOIN) {
                tracing::warn!("animation worker did not stop within the join deadline");
            }
        }
    }

    /// Hold the current frame; no-op unless something is playing.
    pub fn pause(&mut self) {
        if let Some(worker) = &self.worker {
            if worker.playing.load(Ordering::SeqCst) {
                worker.paused.store(true, Ordering::SeqCst);
            }
        }
    }

    pub fn resume(&mut self) {
        if let Some(worker) = &self.worker {
            worker.paused.store(false, Ordering::SeqCst);
        }
    }

    /// True while the worker is alive, paused or not.
    pub fn is_playing(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|w| w.playing.load(Ordering::SeqCst))
    }

    pub fn is_paused(&self) -> bool {
        matches!(self.state(), AnimationState::Paused { .. })
    }

    pub fn kind(&self) -> Option<AnimationKind> {
        match self.state() {
            AnimationState::Playing { kind, .. } | AnimationState::Paused { kind, .. } => Some(kind),
            AnimationState::Idle => None,
        }
    }

    pub fn state(&self) -> AnimationState {
        match &self.worker {
            Some(w) if w.playing.load(Ordering::SeqCst) => {
                if w.paused.load(Ordering::SeqCst) {
                    AnimationState::Paused {
                        kind: w.kind,
                        looping: w.looping,
                        speed: w.speed,
                    }
                } else {
                    AnimationState::Playing {
                        kind: w.kind,
                        looping: w.looping,
                        speed: w.speed,
                    }
                }
            }
            _ => AnimationState::Idle,
        }
    }
}

impl Default for AnimationController {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for AnimationController {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(
    backend: &dyn Backend,
    frames: &[AnimationFrame],
    speed: f32,
    looping: bool,
    stop: &AtomicBool,
    paused: &AtomicBool,
) {
    let speed = if speed > 0.0 { speed } else { 1.0 };
    loop {
        for frame in frames {
            while paused.load(Ordering::SeqCst) && !stop.load(Ordering::SeqCst) {
                thread::sleep(PAUSE_POLL);
            }
            if stop.load(Ordering::SeqCst) {
                return;
            }
            if let Some(percent) = frame.brightness {
                backend.set_brightness(percent);
            }
            backend.render(&frame.pixels, false);
            if !sleep_frame(frame.duration, speed, stop, paused) {
                return;
            }
        }
        if !looping {
            return;
        }
    }
}

/// Sleep `duration / speed` (min 10 ms) in short slices so stop latency
/// stays bounded. Pausing holds the current frame without advancing.
fn sleep_frame(duration: Duration, speed: f32, stop: &AtomicBool, paused: &AtomicBool) -> bool {
    let total = duration.div_f32(speed).max(MIN_FRAME);
    let deadline = Instant::now() + total;
    loop {
        if stop.load(Ordering::SeqCst) {
            return false;
        }
        if paused.load(Ordering::SeqCst) {
            thread::sleep(PAUSE_POLL);
            continue;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep(STOP_POLL.min(deadline - now));
    }
}
