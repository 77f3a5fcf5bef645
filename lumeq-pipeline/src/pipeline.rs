//! Per-frame orchestrator: negotiate → bind → convert → equalize → present.
//!
//! One `FramePipeline` instance is driven by exactly one worker; it mutates
//! shared buffer-pool state and is not reentrant for concurrent frames. The
//! only cross-context interaction is the fire-and-forget presentation send.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::buffers::{BufferPool, DestinationBuffer};
use crate::convert::{bind_source_planes, Converter, PixelBackend};
use crate::error::{ConversionError, FrameError, NegotiationError};
use crate::frame::{LockedFrame, SourceLayout, XrgbImage};

/// Counters exposed for observability and test assertions.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    pub frames_received: AtomicU64,
    pub frames_converted: AtomicU64,
    pub frames_equalized: AtomicU64,
    pub frames_presented: AtomicU64,
    pub frames_dropped: AtomicU64,
}

/// The per-frame pipeline.
///
/// Converter and buffers are initialized lazily on the first successful
/// frame and live for the lifetime of the instance; the destination memory
/// is released when the instance is dropped, never per frame.
pub struct FramePipeline<B: PixelBackend> {
    backend: B,
    converter: Option<Converter>,
    pool: BufferPool,
    present_tx: mpsc::UnboundedSender<XrgbImage>,
    metrics: Arc<PipelineMetrics>,
    negotiation_warned: bool,
}

impl<B: PixelBackend> FramePipeline<B> {
    /// Create a pipeline that presents finished images on `present_tx`.
    pub fn new(backend: B, present_tx: mpsc::UnboundedSender<XrgbImage>) -> Self {
        tracing::info!("frame pipeline created");
        Self {
            backend,
            converter: None,
            pool: BufferPool::new(),
            present_tx,
            metrics: Arc::new(PipelineMetrics::default()),
            negotiation_warned: false,
        }
    }

    /// Process one locked frame to completion.
    ///
    /// Returns `true` if the frame was presented. Any failure drops the
    /// frame: no presentation call is made and no failure state latches, so
    /// the next frame starts from scratch. The frame's planes are only read
    /// during this call; the caller may unlock the backing memory as soon as
    /// it returns.
    pub fn process_frame(&mut self, frame: &LockedFrame<'_>) -> bool {
        self.metrics.frames_received.fetch_add(1, Ordering::Relaxed);

        match self.run_frame(frame) {
            Ok(()) => {
                self.metrics.frames_presented.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(err) => {
                self.metrics.frames_dropped.fetch_add(1, Ordering::Relaxed);
                match &err {
                    // Likely persistent: surface once, then drop quietly.
                    FrameError::Negotiation(e) => {
                        if !self.negotiation_warned {
                            self.negotiation_warned = true;
                            tracing::warn!(
                                error = %e,
                                "format negotiation failed, frames of this layout will be dropped"
                            );
                        }
                    }
                    // Transient: per-frame skip.
                    _ => tracing::debug!(error = %err, "frame dropped"),
                }
                false
            }
        }
    }

    fn run_frame(&mut self, frame: &LockedFrame<'_>) -> Result<(), FrameError> {
        let converter = self.ensure_converter(frame.layout)?;

        // Zero-copy bind; the planes stay valid through the convert call.
        let planes = bind_source_planes(frame, &converter, &mut self.pool)?;
        let primary = planes.first().ok_or(ConversionError::BindFailed {
            expected: converter.layout(),
            expected_planes: converter.plane_count(),
            actual: frame.layout,
            actual_planes: 0,
        })?;

        // Destination dimensions are fixed by the first frame's primary plane.
        let (width, height) = (primary.width, primary.height);
        let dest = self.pool.ensure_destination(width, height);

        self.backend.convert(&converter, planes, dest)?;
        self.metrics.frames_converted.fetch_add(1, Ordering::Relaxed);

        // The source lock is no longer needed from here on; equalization
        // touches only the pool-owned destination.
        self.backend.equalize(dest)?;
        self.metrics.frames_equalized.fetch_add(1, Ordering::Relaxed);

        let image = XrgbImage {
            width: dest.width(),
            height: dest.height(),
            data: dest.data().to_vec(),
        };
        // Fire-and-forget hand-off to the UI-affine context; no backpressure
        // signal comes back.
        if self.present_tx.send(image).is_err() {
            tracing::debug!("presentation channel closed");
        }
        Ok(())
    }

    /// Negotiate the converter on the first frame; no-op afterwards.
    fn ensure_converter(&mut self, layout: SourceLayout) -> Result<Converter, NegotiationError> {
        if let Some(converter) = self.converter {
            return Ok(converter);
        }
        let converter = self.backend.negotiate(layout)?;
        tracing::info!(
            ?layout,
            planes = converter.plane_count(),
            "converter negotiated"
        );
        self.converter = Some(converter);
        Ok(converter)
    }

    /// Pipeline metrics.
    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }

    /// The cached converter, once the first frame has negotiated it.
    pub fn converter(&self) -> Option<Converter> {
        self.converter
    }

    /// The reusable destination buffer, once allocated.
    pub fn destination(&self) -> Option<&DestinationBuffer> {
        self.pool.destination()
    }
}
