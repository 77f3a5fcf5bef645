//! Per-frame camera pipeline: planar YUV → XRGB8888 conversion plus in-place
//! histogram equalization.
//!
//! A [`pipeline::FramePipeline`] receives locked planar frames one at a time
//! on a dedicated worker, converts them into a reusable XRGB destination
//! buffer, equalizes the result, and hands a finished image off to a
//! presentation channel. Frames that fail any step are dropped; the next
//! frame starts fresh.

pub mod buffers;
pub mod convert;
pub mod equalize;
pub mod error;
pub mod frame;
pub mod pipeline;
