//! Demo binary: routes frames from a camera (or a synthetic generator)
//! through the conversion and equalization pipeline to a presentation sink.

#[cfg(feature = "camera")]
mod camera;
mod present;
mod synthetic;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::sync::{mpsc, oneshot};
use tracing_subscriber::EnvFilter;

use lumeq_pipeline::convert::CpuBackend;
use lumeq_pipeline::frame::PlanarFrame;
use lumeq_pipeline::pipeline::FramePipeline;

use present::SharedImage;
use synthetic::SyntheticSource;

/// A producer of owned planar frames, polled from the capture thread.
trait FrameSource {
    fn next_frame(&mut self) -> Result<PlanarFrame>;
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self) -> Result<PlanarFrame> {
        Ok(self.generate())
    }
}

#[cfg(feature = "camera")]
impl FrameSource for camera::CameraSource {
    fn next_frame(&mut self) -> Result<PlanarFrame> {
        self.capture_frame()
    }
}

/// Runtime options. Defaults run the synthetic source indefinitely.
#[derive(Debug, Clone)]
struct RunConfig {
    /// Camera index to open; `None` selects the synthetic source.
    camera: Option<u32>,
    width: u32,
    height: u32,
    frame_rate: u32,
    /// Stop after this many captured frames.
    max_frames: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            camera: None,
            width: 640,
            height: 480,
            frame_rate: 30,
            max_frames: None,
        }
    }
}

fn parse_args(args: impl Iterator<Item = String>) -> Result<RunConfig> {
    let mut config = RunConfig::default();
    let mut args = args;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--camera" => {
                let index = args.next().context("--camera needs an index")?;
                config.camera = Some(index.parse().context("camera index must be a number")?);
            }
            "--size" => {
                let value = args.next().context("--size needs WIDTHxHEIGHT")?;
                let (w, h) = value
                    .split_once('x')
                    .context("--size needs WIDTHxHEIGHT")?;
                config.width = w.parse().context("width must be a number")?;
                config.height = h.parse().context("height must be a number")?;
            }
            "--fps" => {
                let value = args.next().context("--fps needs a number")?;
                config.frame_rate = value.parse().context("fps must be a number")?;
            }
            "--frames" => {
                let value = args.next().context("--frames needs a number")?;
                config.max_frames = Some(value.parse().context("frame count must be a number")?);
            }
            other => bail!("unknown argument {other:?}"),
        }
    }
    Ok(config)
}

fn open_source(config: &RunConfig) -> Result<Box<dyn FrameSource>> {
    match config.camera {
        #[cfg(feature = "camera")]
        Some(index) => {
            let source = camera::CameraSource::open(
                index,
                camera::CameraConfig {
                    width: config.width,
                    height: config.height,
                    frame_rate: config.frame_rate,
                },
            )?;
            Ok(Box::new(source))
        }
        #[cfg(not(feature = "camera"))]
        Some(_) => bail!("built without camera support, rebuild with --features camera"),
        None => Ok(Box::new(SyntheticSource::new(config.width, config.height)?)),
    }
}

/// Run the capture loop on a dedicated thread.
///
/// Camera handles are not `Send`, so the source is opened and polled on the
/// same thread that feeds the pipeline. An open failure is reported back
/// through the ready channel before the loop starts.
fn spawn_capture(
    config: RunConfig,
    mut pipeline: FramePipeline<CpuBackend>,
    stop: Arc<AtomicBool>,
    done_tx: oneshot::Sender<()>,
) -> Result<std::thread::JoinHandle<()>> {
    let (ready_tx, ready_rx) = std::sync::mpsc::channel();

    let handle = std::thread::spawn(move || {
        let mut source = match open_source(&config) {
            Ok(s) => {
                let _ = ready_tx.send(Ok(()));
                s
            }
            Err(e) => {
                let _ = ready_tx.send(Err(e));
                return;
            }
        };

        let interval = Duration::from_millis(1000 / u64::from(config.frame_rate.max(1)));
        let mut captured: u64 = 0;
        while !stop.load(Ordering::Relaxed) {
            match source.next_frame() {
                Ok(frame) => {
                    pipeline.process_frame(&frame.views());
                }
                Err(e) => {
                    tracing::warn!(error = %e, "frame capture failed");
                }
            }
            captured += 1;
            if config.max_frames.is_some_and(|n| captured >= n) {
                break;
            }
            std::thread::sleep(interval);
        }
        tracing::info!(captured, "capture loop stopped");
        let _ = done_tx.send(());
    });

    ready_rx
        .recv()
        .context("capture thread exited before reporting readiness")??;
    Ok(handle)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = parse_args(std::env::args().skip(1))?;
    tracing::info!(?config, "lumeq starting");

    let (present_tx, present_rx) = mpsc::unbounded_channel();
    let latest: SharedImage = Arc::new(Mutex::new(None));
    let presenter = tokio::spawn(present::run_presenter(present_rx, Arc::clone(&latest)));

    let pipeline = FramePipeline::new(CpuBackend, present_tx);
    let metrics = Arc::clone(pipeline.metrics());

    let stop = Arc::new(AtomicBool::new(false));
    let (done_tx, done_rx) = oneshot::channel();
    let worker = spawn_capture(config, pipeline, Arc::clone(&stop), done_tx)?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => tracing::info!("shutdown requested"),
        _ = done_rx => tracing::info!("capture finished"),
    }

    stop.store(true, Ordering::Relaxed);
    if worker.join().is_err() {
        tracing::error!("capture thread panicked");
    }
    // The pipeline (and with it the presentation sender) is gone once the
    // capture thread ends, so the presenter drains and exits.
    presenter.await.context("presenter task failed")?;

    tracing::info!(
        received = metrics.frames_received.load(Ordering::Relaxed),
        presented = metrics.frames_presented.load(Ordering::Relaxed),
        dropped = metrics.frames_dropped.load(Ordering::Relaxed),
        "lumeq stopped"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn default_config_uses_the_synthetic_source() {
        let config = parse_args(args(&[])).unwrap();
        assert!(config.camera.is_none());
        assert_eq!((config.width, config.height), (640, 480));
        assert_eq!(config.frame_rate, 30);
        assert!(config.max_frames.is_none());
    }

    #[test]
    fn all_flags_parse() {
        let config = parse_args(args(&[
            "--camera", "1", "--size", "1280x720", "--fps", "24", "--frames", "100",
        ]))
        .unwrap();
        assert_eq!(config.camera, Some(1));
        assert_eq!((config.width, config.height), (1280, 720));
        assert_eq!(config.frame_rate, 24);
        assert_eq!(config.max_frames, Some(100));
    }

    #[test]
    fn malformed_arguments_are_rejected() {
        assert!(parse_args(args(&["--size", "1280"])).is_err());
        assert!(parse_args(args(&["--camera"])).is_err());
        assert!(parse_args(args(&["--fps", "fast"])).is_err());
        assert!(parse_args(args(&["--banana"])).is_err());
    }

    #[tokio::test]
    async fn synthetic_run_presents_the_requested_frames() {
        let config = parse_args(args(&["--size", "64x48", "--fps", "240", "--frames", "5"]))
            .unwrap();

        let (present_tx, present_rx) = mpsc::unbounded_channel();
        let latest: SharedImage = Arc::new(Mutex::new(None));
        let presenter = tokio::spawn(present::run_presenter(present_rx, Arc::clone(&latest)));

        let pipeline = FramePipeline::new(CpuBackend, present_tx);
        let metrics = Arc::clone(pipeline.metrics());
        let stop = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = oneshot::channel();

        let worker = spawn_capture(config, pipeline, stop, done_tx).unwrap();
        tokio::time::timeout(Duration::from_secs(5), done_rx)
            .await
            .expect("capture should finish")
            .expect("capture thread should signal completion");
        worker.join().expect("capture thread should not panic");
        presenter.await.expect("presenter should not panic");

        assert_eq!(metrics.frames_presented.load(Ordering::Relaxed), 5);
        let image = latest.lock().unwrap().take().expect("an image was kept");
        assert_eq!((image.width, image.height), (64, 48));
    }
}
