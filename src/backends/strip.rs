use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;

use crate::backend::{Backend, BackendConfig};
use crate::buffer::{FrameBuffer, UpdateCallback};
use crate::color::Color;

pub const DEFAULT_WIDTH: u32 = 16;
pub const DEFAULT_HEIGHT: u32 = 16;
// 64/255 on the hardware scale, safe for USB-powered rigs
const DEFAULT_BRIGHTNESS: u8 = 25;

/// Write-only driver for a physical pixel strip. Implementations push one
/// pixel at a time and latch the frame with `show`.
pub trait StripDriver: Send {
    fn set_pixel(&mut self, index: usize, color: Color);
    fn show(&mut self);
    /// Hardware brightness on the driver's native 0-255 scale.
    fn set_brightness(&mut self, value: u8);
}

/// Pixel-strip backend with optional serpentine row addressing.
///
/// Without a driver the backend keeps the in-memory mirror only, so the
/// rest of the system behaves identically whether hardware is attached
/// or not.
pub struct StripBackend {
    frame: FrameBuffer,
    serpentine: bool,
    brightness: AtomicU8,
    driver: Mutex<Option<Box<dyn StripDriver>>>,
}

impl StripBackend {
    pub fn new(cfg: &BackendConfig) -> Self {
        Self::with_driver(cfg, None)
    }

    pub fn with_driver(cfg: &BackendConfig, driver: Option<Box<dyn StripDriver>>) -> Self {
        let width = cfg.width.unwrap_or(DEFAULT_WIDTH);
        let height = cfg.height.unwrap_or(DEFAULT_HEIGHT);
        if driver.is_none() {
            tracing::info!(width, height, "no strip driver attached, using software mirror");
        }
        let backend = Self {
            frame: FrameBuffer::new(width, height),
            serpentine: cfg.serpentine,
            brightness: AtomicU8::new(cfg.brightness.unwrap_or(DEFAULT_BRIGHTNESS).min(100)),
            driver: Mutex::new(driver),
        };
        let percent = backend.brightness.load(Ordering::SeqCst);
        if let Some(driver) = backend.driver.lock().unwrap().as_mut() {
            driver.set_brightness(percent_to_hw(percent));
        }
        backend
    }

    pub fn serpentine(&self) -> bool {
        self.serpentine
    }

    /// Logical (x, y) to physical strip index for this backend's wiring.
    pub fn physical_index(&self, x: u32, y: u32) -> usize {
        physical_index(x, y, self.frame.width(), self.serpentine)
    }
}

/// Map a logical coordinate onto the physical 1-D strip. With serpentine
/// wiring odd rows are walked right-to-left, matching strips that fold
/// back and forth.
pub fn physical_index(x: u32, y: u32, width: u32, serpentine: bool) -> usize {
    let x = if serpentine && y % 2 == 1 {
        width - 1 - x
    } else {
        x
    };
    (y * width + x) as usize
}

impl Backend for StripBackend {
    fn name(&self) -> &str {
        "strip"
    }

    fn native_size(&self) -> (u32, u32) {
        self.frame.size()
    }

    fn render(&self, pixels: &[Color], bypass_overlay: bool) {
        self.frame.write(pixels, bypass_overlay, |frame| {
            let mut driver = self.driver.lock().unwrap();
            if let Some(driver) = driver.as_mut() {
                let (w, h) = self.frame.size();
                for y in 0..h {
                    for x in 0..w {
                        let color = frame[(y * w + x) as usize];
                        driver.set_pixel(physical_index(x, y, w, self.serpentine), color);
                    }
                }
                driver.show();
            }
        });
    }

    fn read_pixels(&self) -> Vec<Color> {
        self.frame.read()
    }

    fn set_brightness(&self, percent: u8) {
        let percent = percent.min(100);
        self.brightness.store(percent, Ordering::SeqCst);
        if let Some(driver) = self.driver.lock().unwrap().as_mut() {
            driver.set_brightness(percent_to_hw(percent));
        }
    }

    fn brightness(&self) -> u8 {
        self.brightness.load(Ordering::SeqCst)
    }

    fn set_on_update(&self, cb: Option<UpdateCallback>) {
        self.frame.set_on_update(cb);
    }

    fn buffer(&self) -> &FrameBuffer {
        &self.frame
    }
}

fn percent_to_hw(percent: u8) -> u8 {
    (u16::from(percent.min(100)) * 255 / 100) as u8
}
