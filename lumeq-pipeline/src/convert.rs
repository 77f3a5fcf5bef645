//! Format negotiation and planar→XRGB8888 conversion.

use crate::buffers::{BufferPool, DestinationBuffer};
use crate::equalize;
use crate::error::{ConversionError, EqualizationError, NegotiationError};
use crate::frame::{LockedFrame, PlaneView, SourceLayout, DEST_BYTES_PER_PIXEL};

/// Immutable conversion descriptor, derived once from the first frame.
///
/// Encodes the source plane layout (count and order, luma first) and the
/// fixed XRGB8888 destination. The plane views handed to
/// [`PixelBackend::convert`] must match this descriptor's count and order
/// exactly; the bind step enforces that.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Converter {
    layout: SourceLayout,
    plane_count: usize,
}

impl Converter {
    pub fn layout(&self) -> SourceLayout {
        self.layout
    }

    pub fn plane_count(&self) -> usize {
        self.plane_count
    }
}

/// Pixel-processing capability: negotiation, conversion, equalization.
///
/// The scalar [`CpuBackend`] is the one in-tree implementation; a platform
/// backend can be substituted without touching the orchestrator.
pub trait PixelBackend: Send {
    /// Derive a conversion descriptor for the observed source layout.
    fn negotiate(&self, layout: SourceLayout) -> Result<Converter, NegotiationError>;

    /// Convert bound source planes into the XRGB destination, in place.
    ///
    /// Runs synchronously while the source frame's memory is locked; the
    /// planes are only valid for the duration of this call.
    fn convert(
        &self,
        converter: &Converter,
        planes: &[PlaneView<'_>],
        dest: &mut DestinationBuffer,
    ) -> Result<(), ConversionError>;

    /// Equalize the destination's R, G, B channels in place, leaving the
    /// padding byte of every pixel untouched.
    fn equalize(&self, dest: &mut DestinationBuffer) -> Result<(), EqualizationError>;
}

/// Bind the pool's source slots to the locked frame's planes.
///
/// Zero-copy: the slots cache per-plane geometry while the returned views
/// point straight into the locked frame's memory, to be consumed by the
/// conversion call within the same locked span. Fails if the frame's layout
/// or plane count no longer matches the cached converter.
pub fn bind_source_planes<'f, 'a>(
    frame: &'f LockedFrame<'a>,
    converter: &Converter,
    pool: &mut BufferPool,
) -> Result<&'f [PlaneView<'a>], ConversionError> {
    let expected = converter.plane_count();
    let slots = pool.ensure_source_slots(expected);

    if frame.layout != converter.layout() || frame.planes.len() != expected {
        return Err(ConversionError::BindFailed {
            expected: converter.layout(),
            expected_planes: expected,
            actual: frame.layout,
            actual_planes: frame.planes.len(),
        });
    }

    for (slot, plane) in slots.iter_mut().zip(&frame.planes) {
        slot.width = plane.width;
        slot.height = plane.height;
        slot.stride = plane.stride;
    }

    Ok(&frame.planes)
}

/// Scalar CPU backend converting 4:2:0 planar sources to XRGB8888.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuBackend;

impl PixelBackend for CpuBackend {
    fn negotiate(&self, layout: SourceLayout) -> Result<Converter, NegotiationError> {
        match layout {
            SourceLayout::I420 | SourceLayout::Nv12 => Ok(Converter {
                layout,
                plane_count: layout.plane_count(),
            }),
            SourceLayout::Yuyv => Err(NegotiationError::Unsupported { layout }),
        }
    }

    fn convert(
        &self,
        converter: &Converter,
        planes: &[PlaneView<'_>],
        dest: &mut DestinationBuffer,
    ) -> Result<(), ConversionError> {
        match converter.layout() {
            SourceLayout::I420 => i420_to_xrgb(planes, dest),
            SourceLayout::Nv12 => nv12_to_xrgb(planes, dest),
            // negotiate never produces a YUYV converter; a foreign one is
            // still answered with an error, not a panic.
            SourceLayout::Yuyv => Err(ConversionError::ConversionFailed {
                detail: "no conversion routine for packed YUYV".into(),
            }),
        }
    }

    fn equalize(&self, dest: &mut DestinationBuffer) -> Result<(), EqualizationError> {
        equalize::equalize_xrgb(dest)
    }
}

/// Validate that a plane's bytes cover its declared geometry.
fn check_plane(
    index: usize,
    plane: &PlaneView<'_>,
    row_bytes: usize,
) -> Result<(), ConversionError> {
    if plane.width == 0 || plane.height == 0 || row_bytes == 0 {
        return Err(ConversionError::ConversionFailed {
            detail: format!(
                "plane {index} has degenerate geometry {}x{}",
                plane.width, plane.height
            ),
        });
    }
    let needed = plane.stride * (plane.height as usize - 1) + row_bytes;
    if plane.data.len() < needed {
        return Err(ConversionError::ConversionFailed {
            detail: format!(
                "plane {index} holds {} bytes, geometry needs {needed}",
                plane.data.len()
            ),
        });
    }
    Ok(())
}

#[inline]
fn yuv_to_xrgb_pixel(y: f32, u: f32, v: f32) -> [u8; 4] {
    let r = (y + 1.402 * v).round().clamp(0.0, 255.0) as u8;
    let g = (y - 0.344 * u - 0.714 * v).round().clamp(0.0, 255.0) as u8;
    let b = (y + 1.772 * u).round().clamp(0.0, 255.0) as u8;
    // Padding byte kept opaque for viewers that read it as alpha.
    [0xFF, r, g, b]
}

/// Convert I420 planes (Y, U, V) into the XRGB destination.
fn i420_to_xrgb(
    planes: &[PlaneView<'_>],
    dest: &mut DestinationBuffer,
) -> Result<(), ConversionError> {
    let [y, u, v] = planes else {
        return Err(ConversionError::ConversionFailed {
            detail: format!("I420 conversion needs 3 planes, got {}", planes.len()),
        });
    };
    check_plane(0, y, y.width as usize)?;
    check_plane(1, u, u.width as usize)?;
    check_plane(2, v, v.width as usize)?;

    // Clip against both the destination and the subsampled chroma extents;
    // the odd trailing row/column of a 4:2:0 frame is left untouched.
    let w = (dest.width() as usize)
        .min(y.width as usize)
        .min(u.width as usize * 2)
        .min(v.width as usize * 2)
        & !1;
    let h = (dest.height() as usize)
        .min(y.height as usize)
        .min(u.height as usize * 2)
        .min(v.height as usize * 2)
        & !1;

    let dst_stride = dest.stride();
    let out = dest.data_mut();
    for row in 0..h {
        for col in 0..w {
            let luma = y.data[row * y.stride + col] as f32;
            let uv_idx_u = (row / 2) * u.stride + col / 2;
            let uv_idx_v = (row / 2) * v.stride + col / 2;
            let cb = u.data[uv_idx_u] as f32 - 128.0;
            let cr = v.data[uv_idx_v] as f32 - 128.0;

            let px = yuv_to_xrgb_pixel(luma, cb, cr);
            let o = row * dst_stride + col * DEST_BYTES_PER_PIXEL;
            out[o..o + DEST_BYTES_PER_PIXEL].copy_from_slice(&px);
        }
    }
    Ok(())
}

/// Convert NV12 planes (Y, interleaved UV) into the XRGB destination.
fn nv12_to_xrgb(
    planes: &[PlaneView<'_>],
    dest: &mut DestinationBuffer,
) -> Result<(), ConversionError> {
    let [y, uv] = planes else {
        return Err(ConversionError::ConversionFailed {
            detail: format!("NV12 conversion needs 2 planes, got {}", planes.len()),
        });
    };
    check_plane(0, y, y.width as usize)?;
    check_plane(1, uv, uv.width as usize * 2)?;

    let w = (dest.width() as usize)
        .min(y.width as usize)
        .min(uv.width as usize * 2)
        & !1;
    let h = (dest.height() as usize)
        .min(y.height as usize)
        .min(uv.height as usize * 2)
        & !1;

    let dst_stride = dest.stride();
    let out = dest.data_mut();
    for row in 0..h {
        for col in 0..w {
            let luma = y.data[row * y.stride + col] as f32;
            let uv_idx = (row / 2) * uv.stride + (col / 2) * 2;
            let cb = uv.data[uv_idx] as f32 - 128.0;
            let cr = uv.data[uv_idx + 1] as f32 - 128.0;

            let px = yuv_to_xrgb_pixel(luma, cb, cr);
            let o = row * dst_stride + col * DEST_BYTES_PER_PIXEL;
            out[o..o + DEST_BYTES_PER_PIXEL].copy_from_slice(&px);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PlanarFrame;

    /// Solid-color I420 frame from a YUV triple.
    fn solid_i420(width: u32, height: u32, y: u8, u: u8, v: u8) -> PlanarFrame {
        let y_len = (width * height) as usize;
        let c_len = (width / 2 * (height / 2)) as usize;
        let mut data = vec![y; y_len];
        data.extend(std::iter::repeat(u).take(c_len));
        data.extend(std::iter::repeat(v).take(c_len));
        PlanarFrame {
            layout: SourceLayout::I420,
            width,
            height,
            data,
        }
    }

    /// Solid-color NV12 frame from the same YUV triple.
    fn solid_nv12(width: u32, height: u32, y: u8, u: u8, v: u8) -> PlanarFrame {
        let y_len = (width * height) as usize;
        let c_len = (width / 2 * (height / 2)) as usize;
        let mut data = vec![y; y_len];
        for _ in 0..c_len {
            data.push(u);
            data.push(v);
        }
        PlanarFrame {
            layout: SourceLayout::Nv12,
            width,
            height,
            data,
        }
    }

    #[test]
    fn negotiate_accepts_planar_420_layouts() {
        let backend = CpuBackend;
        let c = backend.negotiate(SourceLayout::I420).unwrap();
        assert_eq!(c.layout(), SourceLayout::I420);
        assert_eq!(c.plane_count(), 3);

        let c = backend.negotiate(SourceLayout::Nv12).unwrap();
        assert_eq!(c.plane_count(), 2);
    }

    #[test]
    fn negotiate_rejects_packed_yuyv() {
        let backend = CpuBackend;
        let err = backend.negotiate(SourceLayout::Yuyv).unwrap_err();
        assert!(matches!(
            err,
            NegotiationError::Unsupported {
                layout: SourceLayout::Yuyv
            }
        ));
    }

    #[test]
    fn bind_accepts_matching_frame_and_fills_slots() {
        let backend = CpuBackend;
        let converter = backend.negotiate(SourceLayout::I420).unwrap();
        let mut pool = BufferPool::new();
        let frame = solid_i420(8, 8, 128, 128, 128);
        let locked = frame.views();

        let planes = bind_source_planes(&locked, &converter, &mut pool).unwrap();
        assert_eq!(planes.len(), 3);
        assert_eq!(pool.slot_count(), 3);
    }

    #[test]
    fn bind_rejects_layout_change() {
        let backend = CpuBackend;
        let converter = backend.negotiate(SourceLayout::I420).unwrap();
        let mut pool = BufferPool::new();
        let frame = solid_nv12(8, 8, 128, 128, 128);
        let locked = frame.views();

        let err = bind_source_planes(&locked, &converter, &mut pool).unwrap_err();
        assert!(matches!(
            err,
            ConversionError::BindFailed {
                expected: SourceLayout::I420,
                expected_planes: 3,
                actual: SourceLayout::Nv12,
                actual_planes: 2,
            }
        ));
    }

    #[test]
    fn bind_rejects_truncated_plane_list() {
        let backend = CpuBackend;
        let converter = backend.negotiate(SourceLayout::I420).unwrap();
        let mut pool = BufferPool::new();
        let frame = solid_i420(8, 8, 128, 128, 128);
        let mut locked = frame.views();
        locked.planes.pop();

        let err = bind_source_planes(&locked, &converter, &mut pool).unwrap_err();
        assert!(matches!(
            err,
            ConversionError::BindFailed {
                actual_planes: 2,
                ..
            }
        ));
    }

    #[test]
    fn neutral_chroma_converts_to_gray() {
        let backend = CpuBackend;
        let converter = backend.negotiate(SourceLayout::I420).unwrap();
        let mut pool = BufferPool::new();
        let frame = solid_i420(4, 4, 100, 128, 128);
        let locked = frame.views();
        pool.ensure_destination(4, 4);
        let planes = locked.planes.clone();
        let dest = pool.destination_mut().unwrap();

        backend.convert(&converter, &planes, dest).unwrap();

        for px in dest.data().chunks_exact(DEST_BYTES_PER_PIXEL) {
            assert_eq!(px, [0xFF, 100, 100, 100]);
        }
    }

    #[test]
    fn nv12_and_i420_agree_on_solid_color() {
        let backend = CpuBackend;
        let (y, u, v) = (90u8, 180u8, 60u8);

        let mut pool_a = BufferPool::new();
        let conv_a = backend.negotiate(SourceLayout::I420).unwrap();
        let frame_a = solid_i420(8, 8, y, u, v);
        let locked_a = frame_a.views();
        pool_a.ensure_destination(8, 8);
        backend
            .convert(&conv_a, &locked_a.planes, pool_a.destination_mut().unwrap())
            .unwrap();

        let mut pool_b = BufferPool::new();
        let conv_b = backend.negotiate(SourceLayout::Nv12).unwrap();
        let frame_b = solid_nv12(8, 8, y, u, v);
        let locked_b = frame_b.views();
        pool_b.ensure_destination(8, 8);
        backend
            .convert(&conv_b, &locked_b.planes, pool_b.destination_mut().unwrap())
            .unwrap();

        assert_eq!(
            pool_a.destination().unwrap().data(),
            pool_b.destination().unwrap().data()
        );
    }

    #[test]
    fn short_plane_fails_conversion_not_bind() {
        let backend = CpuBackend;
        let converter = backend.negotiate(SourceLayout::I420).unwrap();
        let mut pool = BufferPool::new();
        pool.ensure_destination(8, 8);

        let frame = solid_i420(8, 8, 128, 128, 128);
        let mut locked = frame.views();
        // Correct plane count, but the luma plane lies about its extent.
        locked.planes[0].data = &frame.data[..10];

        let planes = bind_source_planes(&locked, &converter, &mut pool).unwrap();
        let planes = planes.to_vec();
        let dest = pool.destination_mut().unwrap();
        let err = backend.convert(&converter, &planes, dest).unwrap_err();
        assert!(matches!(err, ConversionError::ConversionFailed { .. }));
    }

    #[test]
    fn oversized_source_is_clipped_to_destination() {
        let backend = CpuBackend;
        let converter = backend.negotiate(SourceLayout::I420).unwrap();
        let mut pool = BufferPool::new();
        pool.ensure_destination(4, 4);

        // 8x8 source against the 4x4 destination must not index out of bounds.
        let frame = solid_i420(8, 8, 50, 128, 128);
        let locked = frame.views();
        let planes = locked.planes.clone();
        backend
            .convert(&converter, &planes, pool.destination_mut().unwrap())
            .unwrap();

        let dest = pool.destination().unwrap();
        assert_eq!(&dest.data()[..4], [0xFF, 50, 50, 50]);
    }
}
