use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use image::codecs::gif::GifDecoder;
use image::imageops::{self, FilterType};
use image::{AnimationDecoder, DynamicImage};

use crate::animation::{AnimationFrame, PlayError};
use crate::color::Color;

// GIFs with a zero/absent delay are commonly authored assuming this
const FALLBACK_FRAME_MS: u32 = 100;

/// Decode every frame of a GIF up front, resampled to `size` with
/// nearest-neighbor so pixel art stays crisp on small matrices.
pub fn load_gif_frames(path: &Path, size: (u32, u32)) -> Result<Vec<AnimationFrame>, PlayError> {
    let file = File::open(path).map_err(|err| {
        tracing::debug!(?err, path = %path.display(), "gif unreadable");
        PlayError::SourceNotFound {
            path: path.to_path_buf(),
        }
    })?;
    let decoder = GifDecoder::new(BufReader::new(file)).map_err(|err| {
        tracing::warn!(%err, path = %path.display(), "gif decode failed");
        PlayError::NoFramesFound
    })?;
    let frames = decoder.into_frames().collect_frames().map_err(|err| {
        tracing::warn!(%err, path = %path.display(), "gif frame decode failed");
        PlayError::NoFramesFound
    })?;
    if frames.is_empty() {
        return Err(PlayError::NoFramesFound);
    }

    let (w, h) = size;
    let mut out = Vec::with_capacity(frames.len());
    for frame in frames {
        let (numer, denom) = frame.delay().numer_denom_ms();
        let mut ms = if denom == 0 { 0 } else { numer / denom };
        if ms == 0 {
            ms = FALLBACK_FRAME_MS;
        }
        let rgb = DynamicImage::ImageRgba8(frame.into_buffer()).to_rgb8();
        let resized = imageops::resize(&rgb, w, h, FilterType::Nearest);
        let pixels = resized
            .pixels()
            .map(|p| Color::new(p[0], p[1], p[2]))
            .collect();
        out.push(AnimationFrame {
            pixels,
            duration: Duration::from_millis(u64::from(ms)),
            brightness: None,
        });
    }
    Ok(out)
}
