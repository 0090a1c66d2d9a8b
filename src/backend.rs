use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::backends::panel::PanelBackend;
use crate::backends::strip::StripBackend;
use crate::buffer::{FrameBuffer, UpdateCallback};
use crate::color::Color;

/// Rendering contract every display backend implements.
///
/// A backend owns its native resolution; callers hand over pixel runs or
/// whole images and the backend resamples as needed, so collaborators
/// never have to know what is physically attached.
pub trait Backend: Send + Sync {
    fn name(&self) -> &str;

    fn native_size(&self) -> (u32, u32);

    /// Write a frame through the overlay-aware buffer entry point.
    /// Ordinary callers pass `bypass_overlay = false`; only the overlay
    /// machinery and its restore path bypass.
    fn render(&self, pixels: &[Color], bypass_overlay: bool);

    /// Resample `img` to the native size (nearest-neighbor) and render it.
    fn render_image(&self, img: &RgbImage, bypass_overlay: bool) {
        let (w, h) = self.native_size();
        let resized = imageops::resize(img, w, h, FilterType::Nearest);
        let pixels: Vec<Color> = resized
            .pixels()
            .map(|p| Color::new(p[0], p[1], p[2]))
            .collect();
        self.render(&pixels, bypass_overlay);
    }

    fn read_pixels(&self) -> Vec<Color>;

    /// Brightness as a percentage, clamped to 0-100.
    fn set_brightness(&self, percent: u8);

    fn brightness(&self) -> u8;

    fn set_on_update(&self, cb: Option<UpdateCallback>);

    /// Shared pixel store; the overlay machinery goes through this.
    fn buffer(&self) -> &FrameBuffer;
}

/// Per-backend settings as persisted in the display configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendConfig {
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Panel wiring; takes precedence over width/height for the panel
    /// backend.
    pub rows: Option<u32>,
    pub cols: Option<u32>,
    #[serde(default)]
    pub serpentine: bool,
    /// Initial brightness percent.
    pub brightness: Option<u8>,
}

/// Build a backend by its configured name. Unknown names fall back to the
/// strip backend so a stale config cannot leave the display dead.
pub fn create_backend(name: &str, cfg: &BackendConfig) -> Arc<dyn Backend> {
    match name {
        "strip" => Arc::new(StripBackend::new(cfg)),
        "panel" => Arc::new(PanelBackend::new(cfg)),
        other => {
            tracing::warn!("unknown display backend '{other}', using strip");
            Arc::new(StripBackend::new(cfg))
        }
    }
}
