//! Error taxonomy for the per-frame pipeline.
//!
//! Every variant is handled at the frame boundary: a failing frame is
//! dropped without a presentation call, and the next frame starts fresh.

use thiserror::Error;

use crate::frame::SourceLayout;

/// No conversion path exists between the observed source layout and the
/// XRGB8888 destination. Likely persistent for the session, so the pipeline
/// surfaces it once and silently drops matching frames afterwards.
#[derive(Debug, Error)]
pub enum NegotiationError {
    #[error("no conversion path from {layout:?} to XRGB8888")]
    Unsupported { layout: SourceLayout },
}

/// Per-frame conversion failures; both are transient drop-the-frame cases.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// The frame's layout or plane count no longer matches the cached
    /// converter (e.g. the stream format changed mid-session).
    #[error(
        "source bind failed: converter expects {expected:?} with {expected_planes} planes, \
         frame has {actual:?} with {actual_planes}"
    )]
    BindFailed {
        expected: SourceLayout,
        expected_planes: usize,
        actual: SourceLayout,
        actual_planes: usize,
    },
    /// The planar→XRGB conversion itself failed (e.g. a plane is shorter
    /// than its declared geometry).
    #[error("conversion failed: {detail}")]
    ConversionFailed { detail: String },
}

/// The destination buffer's geometry is malformed. Not expected to occur
/// while the pool invariants hold.
#[derive(Debug, Error)]
pub enum EqualizationError {
    #[error(
        "destination geometry mismatch: {width}x{height} needs {needed} bytes, buffer holds {actual}"
    )]
    BadGeometry {
        width: u32,
        height: u32,
        needed: usize,
        actual: usize,
    },
}

/// Union of the per-frame failure modes, used internally by the orchestrator
/// so steps compose with `?`. Callers of `process_frame` only ever observe a
/// dropped frame.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error(transparent)]
    Negotiation(#[from] NegotiationError),
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    #[error(transparent)]
    Equalization(#[from] EqualizationError),
}
