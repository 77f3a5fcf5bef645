//! Shared frame and plane types.

/// Bytes per pixel of the fixed XRGB8888 destination format.
pub const DEST_BYTES_PER_PIXEL: usize = 4;

/// Pixel layout of a source frame.
///
/// The variant determines plane count and order: the primary (luma) plane
/// always comes first, chroma after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLayout {
    /// YUV 4:2:0 planar — Y, U, V in three separate planes.
    I420,
    /// YUV 4:2:0 semi-planar — Y plane plus one interleaved UV plane.
    Nv12,
    /// Packed YUV 4:2:2 in a single plane. Cameras deliver it, but no
    /// conversion path exists in the CPU backend.
    Yuyv,
}

impl SourceLayout {
    /// Number of planes a frame of this layout carries.
    pub fn plane_count(&self) -> usize {
        match self {
            SourceLayout::I420 => 3,
            SourceLayout::Nv12 => 2,
            SourceLayout::Yuyv => 1,
        }
    }
}

/// Non-owning view over one image plane of a locked frame.
///
/// Points into memory owned by the frame source; it must not outlive the
/// locked frame it was created from.
#[derive(Debug, Clone, Copy)]
pub struct PlaneView<'a> {
    /// Plane width in pixels (chroma planes are subsampled).
    pub width: u32,
    /// Plane height in pixels.
    pub height: u32,
    /// Row stride in bytes.
    pub stride: usize,
    /// Plane bytes.
    pub data: &'a [u8],
}

/// A locked, read-only planar frame as delivered by a frame source.
///
/// The source guarantees the planes stay valid and unmodified for the
/// duration of the synchronous pipeline call that receives this frame, and
/// unlocks the backing memory only after that call returns.
#[derive(Debug, Clone)]
pub struct LockedFrame<'a> {
    pub layout: SourceLayout,
    /// Planes in layout order, luma first.
    pub planes: Vec<PlaneView<'a>>,
}

impl<'a> LockedFrame<'a> {
    /// The primary (luma) plane, if present.
    pub fn primary(&self) -> Option<&PlaneView<'a>> {
        self.planes.first()
    }
}

/// An owned planar frame with tightly packed planes.
///
/// Frame sources that own their pixel data (camera capture, synthetic
/// generators) produce these; [`PlanarFrame::views`] borrows the planes as a
/// [`LockedFrame`] for the pipeline's synchronous processing span.
///
/// Width and height must be even (4:2:0 geometry).
#[derive(Debug, Clone)]
pub struct PlanarFrame {
    pub layout: SourceLayout,
    pub width: u32,
    pub height: u32,
    /// All planes concatenated, luma first, no row padding.
    pub data: Vec<u8>,
}

impl PlanarFrame {
    /// Byte length of a tightly packed 4:2:0 frame (I420 and NV12 agree).
    pub fn packed_len(width: u32, height: u32) -> usize {
        let w = width as usize;
        let h = height as usize;
        w * h + 2 * ((w / 2) * (h / 2))
    }

    /// Borrow the planes as a locked frame.
    ///
    /// Panics if `data` is shorter than [`PlanarFrame::packed_len`] for the
    /// frame's dimensions; owned frames are produced by sources that size
    /// them correctly.
    pub fn views(&self) -> LockedFrame<'_> {
        let w = self.width as usize;
        let y_len = w * self.height as usize;
        let c_w = self.width / 2;
        let c_h = self.height / 2;
        let c_len = c_w as usize * c_h as usize;

        let planes = match self.layout {
            SourceLayout::I420 => {
                let u_end = y_len + c_len;
                vec![
                    PlaneView {
                        width: self.width,
                        height: self.height,
                        stride: w,
                        data: &self.data[..y_len],
                    },
                    PlaneView {
                        width: c_w,
                        height: c_h,
                        stride: c_w as usize,
                        data: &self.data[y_len..u_end],
                    },
                    PlaneView {
                        width: c_w,
                        height: c_h,
                        stride: c_w as usize,
                        data: &self.data[u_end..u_end + c_len],
                    },
                ]
            }
            SourceLayout::Nv12 => {
                vec![
                    PlaneView {
                        width: self.width,
                        height: self.height,
                        stride: w,
                        data: &self.data[..y_len],
                    },
                    // Interleaved UV: c_w pixel pairs per row, 2 bytes each.
                    PlaneView {
                        width: c_w,
                        height: c_h,
                        stride: c_w as usize * 2,
                        data: &self.data[y_len..y_len + c_len * 2],
                    },
                ]
            }
            SourceLayout::Yuyv => {
                vec![PlaneView {
                    width: self.width,
                    height: self.height,
                    stride: w * 2,
                    data: &self.data,
                }]
            }
        };

        LockedFrame {
            layout: self.layout,
            planes,
        }
    }
}

/// An owned, ready-to-display XRGB8888 image.
///
/// Byte order per pixel is `[X, R, G, B]` where `X` is an unused padding
/// byte. One is handed to the presentation sink per successfully processed
/// frame and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct XrgbImage {
    pub width: u32,
    pub height: u32,
    /// `width * height * 4` bytes, row-major.
    pub data: Vec<u8>,
}
