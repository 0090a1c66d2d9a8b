use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::codecs::gif::GifEncoder;
use image::{Delay, Frame, Rgba, RgbaImage};
use ledgrid::animation::{AnimationController, AnimationKind, AnimationState, PlayError};
use ledgrid::backend::{Backend, BackendConfig};
use ledgrid::backends::strip::StripBackend;
use ledgrid::color::Color;
use serial_test::serial;
use tempfile::tempdir;

const RED: Color = Color::new(255, 0, 0);
const WHITE: Color = Color::new(255, 255, 255);

fn small_backend() -> Arc<dyn Backend> {
    let cfg = BackendConfig {
        width: Some(4),
        height: Some(4),
        ..Default::default()
    };
    Arc::new(StripBackend::new(&cfg))
}

fn write_two_frame_preset(path: &Path, duration_ms: u32) {
    let text = format!(
        "{{\"seg\":{{\"i\":[0, 16, \"FF0000\"]}},\"duration\":{duration_ms}}}\n{{\"seg\":{{\"i\":[0, 16, \"FFFFFF\"]}},\"duration\":{duration_ms}}}"
    );
    std::fs::write(path, text).unwrap();
}

fn wait_until(deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
    let end = Instant::now() + deadline;
    while Instant::now() < end {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    done()
}

#[test]
fn missing_source_fails_before_spawning() {
    let backend = small_backend();
    let mut controller = AnimationController::new();
    let err = controller
        .play_preset(&backend, Path::new("/nonexistent/preset.json"), 1.0, true)
        .unwrap_err();
    assert!(matches!(err, PlayError::SourceNotFound { .. }));
    assert!(!controller.is_playing());

    let err = controller
        .play_gif(&backend, Path::new("/nonexistent/anim.gif"), 1.0, true)
        .unwrap_err();
    assert!(matches!(err, PlayError::SourceNotFound { .. }));
    assert!(!controller.is_playing());
}

#[test]
fn frameless_source_fails_before_spawning() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("empty.json");
    std::fs::write(&path, "{\"bri\": 40}").unwrap();
    let backend = small_backend();
    let mut controller = AnimationController::new();
    assert_eq!(
        controller.play_preset(&backend, &path, 1.0, true),
        Err(PlayError::NoFramesFound)
    );
    assert!(!controller.is_playing());
}

#[test]
#[serial]
fn single_pass_playback_stops_on_its_own() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("two.json");
    write_two_frame_preset(&path, 30);
    let backend = small_backend();
    let mut controller = AnimationController::new();
    controller.play_preset(&backend, &path, 1.0, false).unwrap();
    assert!(controller.is_playing());
    assert_eq!(controller.kind(), Some(AnimationKind::SegmentPreset));

    assert!(wait_until(Duration::from_secs(3), || !controller.is_playing()));
    // last frame stays on the display
    assert!(backend.read_pixels().iter().all(|p| *p == WHITE));
}

#[test]
#[serial]
fn looping_playback_runs_until_stopped() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("two.json");
    write_two_frame_preset(&path, 20);
    let backend = small_backend();
    let mut controller = AnimationController::new();
    controller.play_preset(&backend, &path, 1.0, true).unwrap();

    std::thread::sleep(Duration::from_millis(200));
    assert!(controller.is_playing());
    controller.stop();
    assert!(!controller.is_playing());
}

#[test]
#[serial]
fn stop_latency_is_bounded_for_long_frames() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("slow.json");
    write_two_frame_preset(&path, 10_000);
    let backend = small_backend();
    let mut controller = AnimationController::new();
    controller.play_preset(&backend, &path, 1.0, true).unwrap();
    assert!(wait_until(Duration::from_secs(1), || {
        backend.read_pixels()[0] == RED
    }));

    let begin = Instant::now();
    controller.stop();
    assert!(begin.elapsed() < Duration::from_secs(1));
    assert!(!controller.is_playing());
}

#[test]
#[serial]
fn replay_replaces_the_running_worker() {
    let dir = tempdir().unwrap();
    let red = dir.path().join("red.json");
    std::fs::write(&red, "{\"seg\":{\"i\":[0, 16, \"FF0000\"]},\"duration\":20}").unwrap();
    let blue = dir.path().join("blue.json");
    std::fs::write(&blue, "{\"seg\":{\"i\":[0, 16, \"0000FF\"]},\"duration\":20}").unwrap();

    let backend = small_backend();
    let mut controller = AnimationController::new();
    controller.play_preset(&backend, &red, 1.0, true).unwrap();
    controller.play_preset(&backend, &blue, 1.0, true).unwrap();
    assert!(controller.is_playing());

    // after the swap settles, only the second preset's frames appear
    std::thread::sleep(Duration::from_millis(100));
    for _ in 0..5 {
        assert_eq!(backend.read_pixels()[0], Color::new(0, 0, 255));
        std::thread::sleep(Duration::from_millis(20));
    }
    controller.stop();
}

#[test]
#[serial]
fn pause_holds_the_frame_and_resume_continues() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("two.json");
    write_two_frame_preset(&path, 40);
    let backend = small_backend();
    let mut controller = AnimationController::new();
    controller.play_preset(&backend, &path, 1.0, true).unwrap();
    std::thread::sleep(Duration::from_millis(60));

    controller.pause();
    assert!(controller.is_paused());
    assert!(controller.is_playing());
    std::thread::sleep(Duration::from_millis(60));
    let frozen = backend.read_pixels();
    std::thread::sleep(Duration::from_millis(150));
    assert_eq!(backend.read_pixels(), frozen);

    controller.resume();
    assert!(!controller.is_paused());
    assert!(wait_until(Duration::from_secs(2), || {
        backend.read_pixels() != frozen
    }));
    controller.stop();
}

#[test]
#[serial]
fn state_walks_idle_playing_paused_and_back() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("two.json");
    write_two_frame_preset(&path, 40);
    let backend = small_backend();
    let mut controller = AnimationController::new();
    assert_eq!(controller.state(), AnimationState::Idle);

    controller.play_preset(&backend, &path, 2.0, true).unwrap();
    assert_eq!(
        controller.state(),
        AnimationState::Playing {
            kind: AnimationKind::SegmentPreset,
            looping: true,
            speed: 2.0
        }
    );

    controller.pause();
    assert!(matches!(controller.state(), AnimationState::Paused { .. }));
    controller.resume();
    assert!(matches!(controller.state(), AnimationState::Playing { .. }));
    controller.stop();
    assert_eq!(controller.state(), AnimationState::Idle);
}

#[test]
fn pause_without_playback_is_a_no_op() {
    let mut controller = AnimationController::new();
    controller.pause();
    assert!(!controller.is_paused());
    controller.resume();
    assert!(!controller.is_playing());
}

#[test]
#[serial]
fn preset_brightness_is_applied_per_frame() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dim.json");
    std::fs::write(
        &path,
        "{\"seg\":{\"i\":[0, 16, \"FF0000\"]},\"bri\":128,\"duration\":30}",
    )
    .unwrap();
    let backend = small_backend();
    let mut controller = AnimationController::new();
    controller.play_preset(&backend, &path, 1.0, false).unwrap();
    assert!(wait_until(Duration::from_secs(2), || !controller.is_playing()));
    assert_eq!(backend.brightness(), 50);
}

fn write_gif(path: &Path, colors: &[[u8; 3]]) {
    let file = File::create(path).unwrap();
    let mut encoder = GifEncoder::new(file);
    for rgb in colors {
        let mut img = RgbaImage::new(4, 4);
        for p in img.pixels_mut() {
            *p = Rgba([rgb[0], rgb[1], rgb[2], 255]);
        }
        let frame = Frame::from_parts(img, 0, 0, Delay::from_numer_denom_ms(30, 1));
        encoder.encode_frame(frame).unwrap();
    }
}

#[test]
#[serial]
fn gif_single_pass_plays_every_frame_and_stops() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("anim.gif");
    write_gif(&path, &[[255, 0, 0], [0, 255, 0], [0, 0, 255]]);

    let backend = small_backend();
    let mut controller = AnimationController::new();
    controller.play_gif(&backend, &path, 1.0, false).unwrap();
    assert_eq!(controller.kind(), Some(AnimationKind::GifFrames));

    assert!(wait_until(Duration::from_secs(3), || !controller.is_playing()));
    // the encoder may quantize, so only check the dominant channel
    let last = backend.read_pixels()[0];
    assert!(last.b > 200 && last.r < 50 && last.g < 50, "expected blue, got {last}");
}

#[test]
fn corrupt_gif_is_rejected_synchronously() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.gif");
    std::fs::write(&path, b"definitely not a gif").unwrap();
    let backend = small_backend();
    let mut controller = AnimationController::new();
    assert_eq!(
        controller.play_gif(&backend, &path, 1.0, true),
        Err(PlayError::NoFramesFound)
    );
    assert!(!controller.is_playing());
}
