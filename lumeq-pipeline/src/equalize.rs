//! In-place histogram equalization over the XRGB destination buffer.

use crate::buffers::DestinationBuffer;
use crate::error::EqualizationError;
use crate::frame::DEST_BYTES_PER_PIXEL;

/// Equalize the R, G, B channels of `dest` in place.
///
/// Classic histogram → CDF → lookup-table mapping, applied to each color
/// channel independently; each call is a pure function of the current buffer
/// contents (no state carries across frames). The padding byte of every
/// pixel is left byte-identical. A channel whose histogram collapses to a
/// single value is left unchanged.
pub fn equalize_xrgb(dest: &mut DestinationBuffer) -> Result<(), EqualizationError> {
    let w = dest.width() as usize;
    let h = dest.height() as usize;
    let stride = dest.stride();
    let needed = stride * h;
    let actual = dest.data().len();
    if w == 0 || h == 0 || actual < needed {
        return Err(EqualizationError::BadGeometry {
            width: dest.width(),
            height: dest.height(),
            needed,
            actual,
        });
    }

    let total = (w * h) as f32;
    let data = dest.data_mut();

    // Channel 0 is the padding byte; only R, G, B are remapped.
    for c in 1..DEST_BYTES_PER_PIXEL {
        let mut hist = [0u32; 256];
        for row in 0..h {
            for col in 0..w {
                hist[data[row * stride + col * DEST_BYTES_PER_PIXEL + c] as usize] += 1;
            }
        }

        let mut cdf = [0u32; 256];
        cdf[0] = hist[0];
        for i in 1..256 {
            cdf[i] = cdf[i - 1] + hist[i];
        }

        let cdf_min = cdf.iter().copied().find(|&v| v > 0).unwrap_or(0) as f32;
        let denom = total - cdf_min;
        if denom <= 0.0 {
            // Single-value channel: nothing to stretch.
            continue;
        }

        let mut lut = [0u8; 256];
        for (i, entry) in lut.iter_mut().enumerate() {
            *entry = ((cdf[i] as f32 - cdf_min) / denom * 255.0).clamp(0.0, 255.0) as u8;
        }

        for row in 0..h {
            for col in 0..w {
                let idx = row * stride + col * DEST_BYTES_PER_PIXEL + c;
                data[idx] = lut[data[idx] as usize];
            }
        }
    }

    Ok(())
}
