//! Synthetic frame source: a drifting low-contrast gradient.
//!
//! Lets the demo run without camera hardware. Luma deliberately stays in a
//! narrow band so the equalization stage has contrast to recover.

use anyhow::{ensure, Result};

use lumeq_pipeline::frame::{PlanarFrame, SourceLayout};

/// Generator of I420 test frames that change slightly every tick.
pub struct SyntheticSource {
    width: u32,
    height: u32,
    tick: u32,
}

impl SyntheticSource {
    /// Create a generator for the given even dimensions.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        ensure!(
            width > 0 && height > 0,
            "synthetic dimensions must be non-zero, got {width}x{height}"
        );
        ensure!(
            width % 2 == 0 && height % 2 == 0,
            "4:2:0 dimensions must be even, got {width}x{height}"
        );
        Ok(Self {
            width,
            height,
            tick: 0,
        })
    }

    /// Produce the next frame and advance the animation tick.
    pub fn generate(&mut self) -> PlanarFrame {
        let (w, h, t) = (self.width, self.height, self.tick);
        let mut data = Vec::with_capacity(PlanarFrame::packed_len(w, h));

        // Luma band 96..160 out of 0..255.
        for row in 0..h {
            for col in 0..w {
                data.push((96 + (row + col + t) % 64) as u8);
            }
        }
        // Chroma drifts slowly around neutral.
        for row in 0..h / 2 {
            let u = (120 + (row + t / 8) % 16) as u8;
            data.extend(std::iter::repeat(u).take(w as usize / 2));
        }
        for _ in 0..h / 2 {
            for col in 0..w / 2 {
                data.push((132 - (col + t / 8) % 16) as u8);
            }
        }

        self.tick = self.tick.wrapping_add(1);
        PlanarFrame {
            layout: SourceLayout::I420,
            width: w,
            height: h,
            data,
        }
    }
}
