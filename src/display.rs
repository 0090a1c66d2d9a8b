use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::animation::{AnimationController, AnimationKind, AnimationState, PlayError};
use crate::backend::{create_backend, Backend, BackendConfig};
use crate::color::Color;
use crate::overlay::{OverlayController, OverlayMode};
use crate::settings::DisplaySettings;

/// Manager-level change notification, `(width, height, pixels)`.
pub type DisplayUpdateFn = dyn Fn(u32, u32, &[Color]) + Send + Sync;

/// Top-level facade over the active backend, animation playback and the
/// transient overlay.
///
/// All methods take `&self`; the manager is meant to sit behind an `Arc`
/// shared between the web layer, input handlers and the audio side. A
/// display malfunction never propagates out of here as a panic.
pub struct DisplayManager {
    backend: Mutex<Arc<dyn Backend>>,
    animation: Mutex<AnimationController>,
    overlay: Mutex<OverlayController>,
    last_started: Mutex<Option<(String, Instant)>>,
    on_update: Mutex<Option<Arc<DisplayUpdateFn>>>,
}

impl DisplayManager {
    pub fn new(backend_name: &str, cfg: &BackendConfig) -> Self {
        Self {
            backend: Mutex::new(create_backend(backend_name, cfg)),
            animation: Mutex::new(AnimationController::new()),
            overlay: Mutex::new(OverlayController::new()),
            last_started: Mutex::new(None),
            on_update: Mutex::new(None),
        }
    }

    /// Build a manager from persisted display settings.
    pub fn from_settings(settings: &DisplaySettings) -> Self {
        Self::new(&settings.active, &settings.active_config())
    }

    fn backend(&self) -> Arc<dyn Backend> {
        self.backend.lock().unwrap().clone()
    }

    pub fn size(&self) -> (u32, u32) {
        self.backend().native_size()
    }

    pub fn backend_name(&self) -> String {
        self.backend().name().to_string()
    }

    /// Hot-swap the active backend. The running animation and any overlay
    /// are stopped first; the update callback carries over to the new
    /// instance.
    pub fn set_active_backend(&self, name: &str, cfg: &BackendConfig) {
        self.stop_animation();
        self.overlay.lock().unwrap().cancel();
        let backend = create_backend(name, cfg);
        if let Some(cb) = self.on_update.lock().unwrap().clone() {
            attach(&backend, cb);
        }
        *self.backend.lock().unwrap() = backend;
    }

    /// Register the change hook external UIs mirror the display through.
    /// Fired with a copy of the buffer on every stored frame: animation
    /// frames, overlay frames and direct writes alike.
    pub fn set_on_update<F>(&self, cb: F)
    where
        F: Fn(u32, u32, &[Color]) + Send + Sync + 'static,
    {
        let cb: Arc<DisplayUpdateFn> = Arc::new(cb);
        *self.on_update.lock().unwrap() = Some(cb.clone());
        attach(&self.backend(), cb);
    }

    /// Write a raw frame. Colors are coerced, the frame padded or
    /// truncated to the native size; this never fails.
    pub fn render_pixels<S: AsRef<str>>(&self, pixels: &[S], bypass_overlay: bool) {
        let colors: Vec<Color> = pixels.iter().map(|p| Color::coerce(p.as_ref())).collect();
        self.backend().render(&colors, bypass_overlay);
    }

    /// Render an arbitrary image; the backend resamples it to its native
    /// resolution.
    pub fn show_image(&self, img: &image::RgbImage) {
        self.backend().render_image(img, false);
    }

    pub fn get_pixels(&self) -> Vec<Color> {
        self.backend().read_pixels()
    }

    /// Flat `#RRGGBB` mirror of the buffer, the shape the web UI consumes.
    pub fn get_pixel_hex(&self) -> Vec<String> {
        self.get_pixels().iter().map(Color::hex).collect()
    }

    pub fn set_brightness(&self, percent: u8) {
        self.backend().set_brightness(percent);
    }

    pub fn get_brightness(&self) -> u8 {
        self.backend().brightness()
    }

    pub fn play_gif(&self, path: &Path, speed: f32, looping: bool) -> Result<(), PlayError> {
        let backend = self.backend();
        let result = self
            .animation
            .lock()
            .unwrap()
            .play_gif(&backend, path, speed, looping);
        if result.is_ok() {
            self.record_started(path);
        }
        result
    }

    pub fn play_preset(&self, path: &Path, speed: f32, looping: bool) -> Result<(), PlayError> {
        let backend = self.backend();
        let result = self
            .animation
            .lock()
            .unwrap()
            .play_preset(&backend, path, speed, looping);
        if result.is_ok() {
            self.record_started(path);
        }
        result
    }

    /// Play a source file by extension: `.gif` runs the GIF player,
    /// anything else the segment-preset player.
    pub fn play_animation(&self, path: &Path, speed: f32, looping: bool) -> Result<(), PlayError> {
        let is_gif = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("gif"));
        if is_gif {
            self.play_gif(path, speed, looping)
        } else {
            self.play_preset(path, speed, looping)
        }
    }

    pub fn stop_animation(&self) {
        self.animation.lock().unwrap().stop();
    }

    pub fn pause_animation(&self) {
        self.animation.lock().unwrap().pause();
    }

    pub fn resume_animation(&self) {
        self.animation.lock().unwrap().resume();
    }

    pub fn is_animating(&self) -> bool {
        self.animation.lock().unwrap().is_playing()
    }

    pub fn animation_kind(&self) -> Option<AnimationKind> {
        self.animation.lock().unwrap().kind()
    }

    pub fn animation_state(&self) -> AnimationState {
        self.animation.lock().unwrap().state()
    }

    /// Most recently started animation (file name and when), kept for
    /// duplicate suppression by collaborators.
    pub fn last_started(&self) -> Option<(String, Instant)> {
        self.last_started.lock().unwrap().clone()
    }

    fn record_started(&self, path: &Path) {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        *self.last_started.lock().unwrap() = Some((name, Instant::now()));
    }

    /// Overlay a level bar on the bottom row for `duration`, replacing
    /// any overlay already showing.
    pub fn show_volume_bar(&self, percent: u8, duration: Duration, color: Color, mode: OverlayMode) {
        let backend = self.backend();
        self.overlay
            .lock()
            .unwrap()
            .show(&backend, percent, duration, color, mode);
    }

    /// Cancel a showing overlay without waiting for its deadline.
    pub fn cancel_overlay(&self) {
        self.overlay.lock().unwrap().cancel();
    }
}

impl Drop for DisplayManager {
    fn drop(&mut self) {
        self.stop_animation();
        self.overlay.lock().unwrap().cancel();
    }
}

fn attach(backend: &Arc<dyn Backend>, cb: Arc<DisplayUpdateFn>) {
    backend.set_on_update(Some(Box::new(move |w, h, pixels| cb(w, h, pixels))));
}
