use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::color::{Color, BLACK};
use crate::overlay::{OverlayMode, OverlayState};

/// Change notification fired for every stored frame: `(width, height, pixels)`.
pub type UpdateCallback = Box<dyn Fn(u32, u32, &[Color]) + Send + Sync>;

type StoredCallback = Arc<dyn Fn(u32, u32, &[Color]) + Send + Sync>;

/// Shared pixel store for one backend instance.
///
/// Every write in the engine funnels through [`FrameBuffer::write`], which
/// owns the only pixel lock: length normalization, the overlay policy, the
/// store and the hardware push all happen atomically with respect to
/// concurrent writers, so a reader never observes a torn frame.
pub struct FrameBuffer {
    width: u32,
    height: u32,
    state: Mutex<BufferState>,
    on_update: Mutex<Option<StoredCallback>>,
}

struct BufferState {
    pixels: Vec<Color>,
    overlay: OverlayState,
}

impl FrameBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        let len = (width * height) as usize;
        Self {
            width,
            height,
            state: Mutex::new(BufferState {
                pixels: vec![BLACK; len],
                overlay: OverlayState::Inactive,
            }),
            on_update: Mutex::new(None),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn len(&self) -> usize {
        (self.width * self.height) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the current pixels.
    pub fn read(&self) -> Vec<Color> {
        self.state.lock().unwrap().pixels.clone()
    }

    /// Store a frame and push it to the hardware sink under the lock.
    ///
    /// The frame is padded with black or truncated to `width * height`
    /// first. Unless `bypass_overlay` is set, an active exclusive-pause
    /// overlay drops the write (returns `false`) and an active overlay
    /// merges its non-black pixels on top. The update callback fires with
    /// a copy after the lock is released.
    pub fn write<F>(&self, pixels: &[Color], bypass_overlay: bool, sink: F) -> bool
    where
        F: FnOnce(&[Color]),
    {
        let mut frame = self.normalized(pixels);
        {
            let mut state = self.state.lock().unwrap();
            match &state.overlay {
                OverlayState::Active {
                    mode: OverlayMode::ExclusivePause,
                    ..
                } if !bypass_overlay => {
                    return false;
                }
                OverlayState::Active {
                    mode: OverlayMode::Overlay,
                    pixels: over,
                    ..
                } if !bypass_overlay => {
                    for (dst, src) in frame.iter_mut().zip(over) {
                        if !src.is_black() {
                            *dst = *src;
                        }
                    }
                }
                _ => {}
            }
            state.pixels.clone_from(&frame);
            sink(&frame);
        }
        self.notify(&frame);
        true
    }

    fn normalized(&self, pixels: &[Color]) -> Vec<Color> {
        let len = self.len();
        let mut out = Vec::with_capacity(len);
        out.extend_from_slice(&pixels[..pixels.len().min(len)]);
        out.resize(len, BLACK);
        out
    }

    pub fn set_on_update(&self, cb: Option<UpdateCallback>) {
        *self.on_update.lock().unwrap() = cb.map(Arc::from);
    }

    // the callback runs outside both locks so it may safely call back
    // into the buffer
    fn notify(&self, pixels: &[Color]) {
        let cb = self.on_update.lock().unwrap().clone();
        if let Some(cb) = cb {
            cb(self.width, self.height, pixels);
        }
    }

    pub(crate) fn begin_overlay(
        &self,
        mode: OverlayMode,
        snapshot: Vec<Color>,
        pixels: Vec<Color>,
        deadline: Instant,
    ) {
        self.state.lock().unwrap().overlay = OverlayState::Active {
            mode,
            snapshot,
            pixels,
            deadline,
        };
    }

    /// Clear the overlay, handing back the pre-overlay snapshot when one
    /// was active.
    pub(crate) fn end_overlay(&self) -> Option<Vec<Color>> {
        let mut state = self.state.lock().unwrap();
        match std::mem::replace(&mut state.overlay, OverlayState::Inactive) {
            OverlayState::Active { snapshot, .. } => Some(snapshot),
            OverlayState::Inactive => None,
        }
    }

    pub fn overlay_active(&self) -> bool {
        matches!(
            self.state.lock().unwrap().overlay,
            OverlayState::Active { .. }
        )
    }

    /// Deadline of the active overlay cycle, if any.
    pub fn overlay_deadline(&self) -> Option<Instant> {
        match &self.state.lock().unwrap().overlay {
            OverlayState::Active { deadline, .. } => Some(*deadline),
            OverlayState::Inactive => None,
        }
    }
}
