//! Camera Capture Layer
//!
//! Stands in for the device camera: replays still images from a directory as
//! a paced frame stream on its own thread. Each frame is converted to planar
//! YUV 4:2:0 and carries a release hook, so the feed always knows how many
//! frames are still held downstream.

pub mod frame;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use image::RgbImage;
use tracing::{debug, info, warn};

use frame::Frame;

/// File extensions the feed picks up, lowercase
const STILL_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Camera feed configuration
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Directory holding the still images to replay
    pub frames_dir: PathBuf,
    /// Frames delivered per second
    pub max_fps: u32,
    /// Start over after the last image
    pub loop_playback: bool,
    /// Rotation reported with every frame
    pub rotation_degrees: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            frames_dir: PathBuf::from("frames"),
            max_fps: 15,
            loop_playback: true,
            rotation_degrees: 0,
        }
    }
}

impl CaptureConfig {
    fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.max_fps.max(1) as f64)
    }
}

/// List the still images in `dir`, sorted by file name
pub fn list_stills(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read frames directory {:?}", dir))?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.context("Failed to read frames directory entry")?.path();
        let is_still = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| STILL_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if is_still && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Load every still image in `dir` as RGB
pub fn load_stills(dir: &Path) -> Result<Vec<RgbImage>> {
    let paths = list_stills(dir)?;
    if paths.is_empty() {
        anyhow::bail!("No .png/.jpg/.jpeg images found in {:?}", dir);
    }

    paths
        .iter()
        .map(|path| {
            let image = image::open(path).with_context(|| format!("Failed to load frame image {:?}", path))?;
            debug!("Loaded {:?} ({}x{})", path, image.width(), image.height());
            Ok(image.to_rgb8())
        })
        .collect()
}

/// Replays stills as camera frames on a producer thread
pub struct CameraFeed {
    stop_flag: Arc<AtomicBool>,
    outstanding: Arc<AtomicUsize>,
    produced: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl CameraFeed {
    /// Load the stills and start delivering frames into `sink`
    pub fn start<F>(config: CaptureConfig, sink: F) -> Result<Self>
    where
        F: Fn(Frame) + Send + 'static,
    {
        let stills = load_stills(&config.frames_dir)?;
        info!(
            "Camera feed: {} stills from {:?} at {} fps{}",
            stills.len(),
            config.frames_dir,
            config.max_fps,
            if config.loop_playback { ", looping" } else { "" }
        );

        let stop_flag = Arc::new(AtomicBool::new(false));
        let outstanding = Arc::new(AtomicUsize::new(0));
        let produced = Arc::new(AtomicU64::new(0));

        let producer = Producer {
            config,
            stills,
            stop_flag: stop_flag.clone(),
            outstanding: outstanding.clone(),
            produced: produced.clone(),
        };

        let handle = std::thread::Builder::new()
            .name("camera-feed".to_string())
            .spawn(move || producer.run(sink))
            .context("Failed to spawn camera feed thread")?;

        Ok(Self {
            stop_flag,
            outstanding,
            produced,
            handle: Some(handle),
        })
    }

    /// Frames delivered but not yet released
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Frames delivered so far
    pub fn frames_produced(&self) -> u64 {
        self.produced.load(Ordering::SeqCst)
    }

    /// Check if the producer thread is still delivering
    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Stop delivering and wait for the producer thread
    pub fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Camera feed thread panicked");
            }
            info!(
                "Camera feed stopped after {} frames, {} still outstanding",
                self.frames_produced(),
                self.outstanding()
            );
        }
    }
}

impl Drop for CameraFeed {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Producer {
    config: CaptureConfig,
    stills: Vec<RgbImage>,
    stop_flag: Arc<AtomicBool>,
    outstanding: Arc<AtomicUsize>,
    produced: Arc<AtomicU64>,
}

impl Producer {
    fn run<F: Fn(Frame)>(self, sink: F) {
        let interval = self.config.frame_interval();
        let mut next_due = Instant::now();
        let mut next_id: u64 = 0;

        'playback: loop {
            for still in &self.stills {
                if self.stop_flag.load(Ordering::SeqCst) {
                    break 'playback;
                }

                let now = Instant::now();
                if next_due > now {
                    std::thread::sleep(next_due - now);
                }
                next_due += interval;

                let outstanding = self.outstanding.clone();
                outstanding.fetch_add(1, Ordering::SeqCst);
                let frame = Frame::from_rgb(next_id, still, self.config.rotation_degrees)
                    .with_release(move |_| {
                        outstanding.fetch_sub(1, Ordering::SeqCst);
                    });

                next_id += 1;
                self.produced.fetch_add(1, Ordering::SeqCst);
                sink(frame);
            }

            if !self.config.loop_playback {
                debug!("Camera feed reached the last still");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use parking_lot::Mutex;
    use tempfile::TempDir;

    fn stills_dir(count: usize) -> TempDir {
        let dir = TempDir::new().unwrap();
        for i in 0..count {
            let image = RgbImage::from_pixel(16, 8, image::Rgb([10 * i as u8, 100, 200]));
            image.save(dir.path().join(format!("frame_{:02}.png", i))).unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "not a frame").unwrap();
        dir
    }

    fn wait_for_end(feed: &CameraFeed) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while feed.is_running() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    fn config(dir: &Path, loop_playback: bool) -> CaptureConfig {
        CaptureConfig {
            frames_dir: dir.to_path_buf(),
            max_fps: 1000,
            loop_playback,
            rotation_degrees: 90,
        }
    }

    #[test]
    fn test_list_stills_sorted_and_filtered() {
        let dir = stills_dir(3);
        std::fs::write(dir.path().join("upper.JPG"), b"").unwrap();

        let names: Vec<_> = list_stills(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["frame_00.png", "frame_01.png", "frame_02.png", "upper.JPG"]);
    }

    #[test]
    fn test_start_fails_without_images() {
        let dir = TempDir::new().unwrap();
        assert!(CameraFeed::start(config(dir.path(), false), |_frame| {}).is_err());
        assert!(CameraFeed::start(config(&dir.path().join("missing"), false), |_frame| {}).is_err());
    }

    #[test]
    fn test_single_pass_delivers_each_still_once() {
        let dir = stills_dir(3);
        let (tx, rx) = unbounded();

        let mut feed = CameraFeed::start(config(dir.path(), false), move |frame| {
            let _ = tx.send((frame.id(), frame.dimensions(), frame.rotation_degrees()));
        })
        .unwrap();
        wait_for_end(&feed);
        feed.stop();

        let delivered: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            delivered,
            vec![(0, (16, 8), 90), (1, (16, 8), 90), (2, (16, 8), 90)]
        );
        assert_eq!(feed.frames_produced(), 3);
        // The sink dropped every frame
        assert_eq!(feed.outstanding(), 0);
    }

    #[test]
    fn test_outstanding_tracks_held_frames() {
        let dir = stills_dir(2);
        let held = Arc::new(Mutex::new(Vec::new()));

        let sink_held = held.clone();
        let mut feed = CameraFeed::start(config(dir.path(), false), move |frame| {
            sink_held.lock().push(frame);
        })
        .unwrap();
        wait_for_end(&feed);
        feed.stop();

        assert_eq!(feed.outstanding(), 2);
        let frame = held.lock().pop().unwrap();
        frame.release();
        assert_eq!(feed.outstanding(), 1);
        held.lock().clear();
        assert_eq!(feed.outstanding(), 0);
    }

    #[test]
    fn test_looping_feed_runs_until_stopped() {
        let dir = stills_dir(2);
        let (tx, rx) = unbounded();

        let mut feed = CameraFeed::start(config(dir.path(), true), move |frame: Frame| {
            let _ = tx.send(frame.id());
        })
        .unwrap();

        // More frames than stills means playback wrapped around
        for expected in 0..5 {
            assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), expected);
        }
        assert!(feed.is_running());

        feed.stop();
        assert!(!feed.is_running());
    }
}
