//! Camera capture using `nokhwa`.
//!
//! Requires the `camera` feature to be enabled. Frames are handed out raw in
//! whatever planar layout the device negotiates; the pipeline decides whether
//! a conversion path exists.

use anyhow::{bail, Context, Result};
use nokhwa::pixel_format::RgbAFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution,
};

use lumeq_pipeline::frame::{PlanarFrame, SourceLayout};

/// Camera configuration.
#[derive(Debug, Clone)]
pub struct CameraConfig {
    /// Horizontal resolution in pixels.
    pub width: u32,
    /// Vertical resolution in pixels.
    pub height: u32,
    /// Target frame rate.
    pub frame_rate: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            frame_rate: 30,
        }
    }
}

/// Information about an available camera.
#[derive(Debug, Clone)]
pub struct CameraInfo {
    /// Human-readable camera name.
    pub name: String,
    /// Camera index (for opening).
    pub index: u32,
    /// Additional description (backend-specific).
    pub description: String,
}

/// List available cameras.
///
/// Returns an empty list if no cameras are detected (does not panic).
pub fn list_cameras() -> Result<Vec<CameraInfo>> {
    let cameras = match nokhwa::query(ApiBackend::Auto) {
        Ok(c) => c,
        Err(e) => {
            tracing::debug!(error = %e, "camera query returned error, treating as empty");
            return Ok(Vec::new());
        }
    };

    let mut result = Vec::new();
    for cam in cameras {
        let index = match cam.index() {
            CameraIndex::Index(i) => *i,
            CameraIndex::String(_) => continue,
        };
        result.push(CameraInfo {
            name: cam.human_name().to_string(),
            index,
            description: cam.description().to_string(),
        });
    }

    tracing::debug!(count = result.len(), "enumerated cameras");
    Ok(result)
}

/// Map a device frame format onto a planar source layout.
fn layout_for(format: FrameFormat) -> Result<SourceLayout> {
    match format {
        FrameFormat::NV12 => Ok(SourceLayout::Nv12),
        FrameFormat::YUYV => Ok(SourceLayout::Yuyv),
        other => bail!("camera frame format {other:?} has no planar mapping"),
    }
}

/// Camera wrapping `nokhwa`, producing raw planar frames.
pub struct CameraSource {
    inner: nokhwa::Camera,
    layout: SourceLayout,
}

impl CameraSource {
    /// Open a camera with the given configuration.
    pub fn open(camera_index: u32, config: CameraConfig) -> Result<Self> {
        let index = CameraIndex::Index(camera_index);

        let requested_format =
            RequestedFormat::new::<RgbAFormat>(RequestedFormatType::Closest(CameraFormat::new(
                Resolution::new(config.width, config.height),
                FrameFormat::NV12,
                config.frame_rate,
            )));

        let mut camera =
            nokhwa::Camera::new(index, requested_format).context("failed to open camera")?;

        camera
            .open_stream()
            .context("failed to open camera stream")?;

        let format = camera.frame_format();
        let layout = layout_for(format)?;
        let actual_res = camera.resolution();
        tracing::info!(
            camera_index,
            width = actual_res.width(),
            height = actual_res.height(),
            fps = camera.frame_rate(),
            ?format,
            "camera opened"
        );

        Ok(Self {
            inner: camera,
            layout,
        })
    }

    /// Capture a single raw frame in the negotiated layout.
    pub fn capture_frame(&mut self) -> Result<PlanarFrame> {
        let frame = self.inner.frame().context("failed to capture frame")?;
        let res = frame.resolution();
        let data = frame.buffer().to_vec();

        let expected = match self.layout {
            SourceLayout::Yuyv => (res.width() * res.height() * 2) as usize,
            _ => PlanarFrame::packed_len(res.width(), res.height()),
        };
        if data.len() < expected {
            bail!(
                "camera frame holds {} bytes, {:?} at {}x{} needs {expected}",
                data.len(),
                self.layout,
                res.width(),
                res.height()
            );
        }

        Ok(PlanarFrame {
            layout: self.layout,
            width: res.width(),
            height: res.height(),
            data,
        })
    }

    /// Stop the camera stream.
    pub fn stop(&mut self) -> Result<()> {
        self.inner
            .stop_stream()
            .context("failed to stop camera stream")?;
        tracing::info!("camera stopped");
        Ok(())
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        if self.inner.is_stream_open() {
            if let Err(e) = self.stop() {
                tracing::debug!(error = %e, "camera stop on drop failed");
            }
        }
    }
}
