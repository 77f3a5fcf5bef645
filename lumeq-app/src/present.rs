//! Presentation sink: the receiving end of the pipeline's one-way hand-off.
//!
//! Stands in for a display surface: it drains presented images, keeps the
//! newest one in shared state for a renderer to pick up, and logs a periodic
//! digest instead of drawing.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use lumeq_pipeline::frame::{XrgbImage, DEST_BYTES_PER_PIXEL};

/// Latest presented image, written by the presenter and read by a renderer.
pub type SharedImage = Arc<Mutex<Option<XrgbImage>>>;

/// Drain presented images until the pipeline side closes the channel.
pub async fn run_presenter(mut rx: mpsc::UnboundedReceiver<XrgbImage>, latest: SharedImage) {
    let mut shown: u64 = 0;
    while let Some(image) = rx.recv().await {
        shown += 1;
        if shown == 1 || shown % 30 == 0 {
            tracing::info!(
                frames = shown,
                width = image.width,
                height = image.height,
                mean_red = mean_channel(&image, 1),
                "frame presented"
            );
        }
        *latest.lock().unwrap() = Some(image);
    }
    tracing::debug!(frames = shown, "presenter finished");
}

/// Mean value of one byte channel across all pixels, 0 for an empty image.
fn mean_channel(image: &XrgbImage, channel: usize) -> u8 {
    let mut sum: u64 = 0;
    let mut count: u64 = 0;
    for px in image.data.chunks_exact(DEST_BYTES_PER_PIXEL) {
        sum += u64::from(px[channel]);
        count += 1;
    }
    if count == 0 {
        return 0;
    }
    (sum / count) as u8
}
