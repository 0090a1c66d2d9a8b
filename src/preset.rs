use std::fs;
use std::path::Path;
use std::time::Duration;

use serde_json::Value;

use crate::animation::{AnimationFrame, PlayError};
use crate::color::{Color, BLACK};

pub const DEFAULT_FRAME_MS: u64 = 200;

/// Load a segment-preset file and decode every frame it contains.
pub fn load_preset_file(path: &Path, pixel_count: usize) -> Result<Vec<AnimationFrame>, PlayError> {
    let raw = fs::read_to_string(path).map_err(|err| {
        tracing::debug!(?err, path = %path.display(), "preset file unreadable");
        PlayError::SourceNotFound {
            path: path.to_path_buf(),
        }
    })?;
    let frames = parse_preset(&raw, pixel_count);
    if frames.is_empty() {
        return Err(PlayError::NoFramesFound);
    }
    Ok(frames)
}

/// Decode the tolerant segment-preset text format into dense frames.
///
/// The source is one or more concatenated top-level JSON objects (or one
/// array of them), possibly with `//` comment lines interleaved. Each
/// object is a frame source, or carries a `frames` array of them; a
/// source contributes a frame when it has segment data and is skipped
/// otherwise. Never fails; the caller decides what zero frames means.
pub fn parse_preset(text: &str, pixel_count: usize) -> Vec<AnimationFrame> {
    let cleaned = strip_comment_lines(text);
    let mut frames = Vec::new();
    for value in decode_values(&cleaned) {
        match value {
            Value::Array(items) => {
                for item in items {
                    collect_source(&item, pixel_count, &mut frames);
                }
            }
            other => collect_source(&other, pixel_count, &mut frames),
        }
    }
    frames
}

fn strip_comment_lines(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with("//"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Decode concatenated top-level JSON values. The first undecodable tail
/// truncates the scan; trailing garbage is ignored, not an error.
fn decode_values(text: &str) -> Vec<Value> {
    let mut values = Vec::new();
    for item in serde_json::Deserializer::from_str(text).into_iter::<Value>() {
        match item {
            Ok(value) => values.push(value),
            Err(err) => {
                tracing::debug!(%err, "stopping preset scan at undecodable tail");
                break;
            }
        }
    }
    values
}

fn collect_source(value: &Value, pixel_count: usize, frames: &mut Vec<AnimationFrame>) {
    if let Some(list) = value.get("frames").and_then(Value::as_array) {
        for item in list {
            decode_source(item, pixel_count, frames);
        }
    } else {
        decode_source(value, pixel_count, frames);
    }
}

fn decode_source(value: &Value, pixel_count: usize, frames: &mut Vec<AnimationFrame>) {
    let Some(items) = segment_items(value) else {
        // brightness-only and other segment-less sources are skipped
        return;
    };
    if items.is_empty() {
        return;
    }
    let pixels = decode_runs(&items, pixel_count);
    let duration = value
        .get("duration")
        .or_else(|| value.get("dur"))
        .or_else(|| value.get("ms"))
        .and_then(Value::as_u64)
        .unwrap_or(DEFAULT_FRAME_MS);
    let brightness = value.get("bri").and_then(Value::as_u64).map(brightness_percent);
    frames.push(AnimationFrame {
        pixels,
        duration: Duration::from_millis(duration),
        brightness,
    });
}

/// Pull the flat `(start, end, colors...)` item list out of a frame
/// source. `seg` may be one segment object or a list of them (their `i`
/// arrays concatenate), and some exports nest the segment under a
/// top-level `presets` list.
fn segment_items(value: &Value) -> Option<Vec<Value>> {
    let seg = value.get("seg").or_else(|| {
        value
            .get("presets")
            .and_then(Value::as_array)
            .and_then(|presets| presets.first())
            .and_then(|preset| preset.get("seg"))
    })?;
    match seg {
        Value::Object(_) => seg.get("i").and_then(Value::as_array).cloned(),
        Value::Array(segments) => {
            let mut items = Vec::new();
            for segment in segments {
                if let Some(part) = segment.get("i").and_then(Value::as_array) {
                    items.extend(part.iter().cloned());
                }
            }
            if items.is_empty() {
                None
            } else {
                Some(items)
            }
        }
        _ => None,
    }
}

/// Walk the alternating `(start, end, colors...)` list into a dense
/// pixel frame of `pixel_count` cells.
fn decode_runs(items: &[Value], pixel_count: usize) -> Vec<Color> {
    let mut out = vec![BLACK; pixel_count];
    let mut i = 0;
    while i < items.len() {
        match &items[i] {
            Value::Number(n) => {
                let start = n.as_i64().unwrap_or(0);
                i += 1;
                let end = match items.get(i) {
                    Some(Value::Number(n)) => {
                        i += 1;
                        n.as_i64().unwrap_or(start + 1)
                    }
                    _ => start + 1,
                };
                let mut colors = Vec::new();
                while let Some(Value::String(token)) = items.get(i) {
                    colors.push(coerce_token(token));
                    i += 1;
                }
                let a = start.clamp(0, pixel_count as i64) as usize;
                let b = end.clamp(0, pixel_count as i64) as usize;
                if a >= b || colors.is_empty() {
                    continue;
                }
                let run = b - a;
                if colors.len() == 1 {
                    out[a..b].fill(colors[0]);
                } else if colors.len() >= run {
                    // one color per pixel, extras truncated
                    for (k, p) in (a..b).enumerate() {
                        out[p] = colors[k];
                    }
                } else {
                    // fewer colors than pixels: repeat cyclically
                    for (k, p) in (a..b).enumerate() {
                        out[p] = colors[k % colors.len()];
                    }
                }
            }
            Value::String(token) => {
                // stray color with no index pair: best-effort into the
                // first still-black slot
                if let Some(slot) = out.iter().position(Color::is_black) {
                    out[slot] = coerce_token(token);
                }
                i += 1;
            }
            _ => {
                i += 1;
            }
        }
    }
    out
}

/// Segment color tokens usually omit the leading `#`.
fn coerce_token(token: &str) -> Color {
    let t = token.trim();
    if t.starts_with('#') {
        Color::coerce(t)
    } else {
        Color::coerce(&format!("#{t}"))
    }
}

/// WLED-style 0-255 brightness to a percentage.
fn brightness_percent(v: u64) -> u8 {
    ((v.min(255) as f64 * 100.0 / 255.0).round() as u8).min(100)
}
