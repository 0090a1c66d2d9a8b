use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;

use crate::backend::{Backend, BackendConfig};
use crate::buffer::{FrameBuffer, UpdateCallback};
use crate::color::Color;

const DEFAULT_ROWS: u32 = 16;
const DEFAULT_COLS: u32 = 16;
const DEFAULT_BRIGHTNESS: u8 = 25;

/// Driver for a matrix panel that consumes whole frames at a time.
pub trait PanelDriver: Send {
    fn push_frame(&mut self, width: u32, height: u32, pixels: &[Color]);
    /// Hardware brightness on the driver's native 0-255 scale.
    fn set_brightness(&mut self, value: u8);
}

/// Matrix-panel backend; native size comes from the rows/cols config.
///
/// With no driver attached the in-memory mirror and the update hook keep
/// external UIs working unchanged.
pub struct PanelBackend {
    frame: FrameBuffer,
    brightness: AtomicU8,
    driver: Mutex<Option<Box<dyn PanelDriver>>>,
}

impl PanelBackend {
    pub fn new(cfg: &BackendConfig) -> Self {
        Self::with_driver(cfg, None)
    }

    pub fn with_driver(cfg: &BackendConfig, driver: Option<Box<dyn PanelDriver>>) -> Self {
        let width = cfg.cols.or(cfg.width).unwrap_or(DEFAULT_COLS);
        let height = cfg.rows.or(cfg.height).unwrap_or(DEFAULT_ROWS);
        if driver.is_none() {
            tracing::info!(width, height, "no panel driver attached, using software mirror");
        }
        let backend = Self {
            frame: FrameBuffer::new(width, height),
            brightness: AtomicU8::new(cfg.brightness.unwrap_or(DEFAULT_BRIGHTNESS).min(100)),
            driver: Mutex::new(driver),
        };
        let percent = backend.brightness.load(Ordering::SeqCst);
        if let Some(driver) = backend.driver.lock().unwrap().as_mut() {
            driver.set_brightness(percent_to_hw(percent));
        }
        backend
    }
}

impl Backend for PanelBackend {
    fn name(&self) -> &str {
        "panel"
    }

    fn native_size(&self) -> (u32, u32) {
        self.frame.size()
    }

    fn render(&self, pixels: &[Color], bypass_overlay: bool) {
        self.frame.write(pixels, bypass_overlay, |frame| {
            let mut driver = self.driver.lock().unwrap();
            if let Some(driver) = driver.as_mut() {
                let (w, h) = self.frame.size();
                driver.push_frame(w, h, frame);
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
