//! Physical-to-pixel mapping and lossless placement of a board on paper.
//!
//! The board keeps its aspect ratio and is scaled up until one axis touches
//! the page border. It is then centred; any leftover from integer rounding
//! ends up as padding, never as distortion or clipping.

use crate::{BoardError, BoardPattern, BoardSpec};
use calibkit_core::{px_per_mm, resize_nearest, white_image, ImageSize};
use image::{imageops, GrayImage};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Largest page raster generated, in pixels (1 GiB of 8-bit gray).
pub const MAX_CANVAS_PIXELS: u64 = 1 << 30;

/// Where the board lands on the page.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasLayout {
    /// Full page in pixels.
    pub canvas: ImageSize,
    /// Board footprint in pixels.
    pub board: ImageSize,
    /// Top-left corner of the board on the page.
    pub offset_x: u32,
    pub offset_y: u32,
}

impl CanvasLayout {
    /// Compute the page size and the largest aspect-preserving board footprint.
    pub fn compute(spec: &BoardSpec) -> Result<Self, BoardError> {
        let ppm = px_per_mm(spec.dpi());
        let (canvas_w, canvas_h) = spec.paper().size_px(spec.dpi());
        let pixels = u64::from(canvas_w) * u64::from(canvas_h);
        if pixels > MAX_CANVAS_PIXELS {
            return Err(BoardError::CanvasTooLarge {
                dpi: spec.dpi(),
                pixels,
                max: MAX_CANVAS_PIXELS,
            });
        }
        let (board_mm_w, board_mm_h) = spec.board_size_mm();
        let board_w = (board_mm_w * ppm) as u32;
        let board_h = (board_mm_h * ppm) as u32;
        if board_w == 0 || board_h == 0 {
            return Err(BoardError::EmptyFootprint { dpi: spec.dpi() });
        }

        // Fit the width first; fall back to the height if that overflows.
        let mut scale = f64::from(canvas_w) / f64::from(board_w);
        let mut scaled_w = canvas_w;
        let mut scaled_h = (f64::from(board_h) * scale) as u32;
        if scaled_h > canvas_h {
            scale = f64::from(canvas_h) / f64::from(board_h);
            scaled_w = ((f64::from(board_w) * scale) as u32).min(canvas_w);
            scaled_h = canvas_h;
        }
        if scaled_w == 0 || scaled_h == 0 {
            return Err(BoardError::EmptyFootprint { dpi: spec.dpi() });
        }

        log::debug!(
            "canvas {canvas_w}x{canvas_h}px, board {board_w}x{board_h}px scaled by {scale:.4} to {scaled_w}x{scaled_h}px"
        );

        Ok(Self::centered(
            ImageSize::new(canvas_w, canvas_h),
            ImageSize::new(scaled_w, scaled_h),
        ))
    }

    /// Centre `board` on `canvas`, each axis independently.
    pub fn centered(canvas: ImageSize, board: ImageSize) -> Self {
        Self {
            canvas,
            board,
            offset_x: canvas.width.saturating_sub(board.width) / 2,
            offset_y: canvas.height.saturating_sub(board.height) / 2,
        }
    }

    /// Resample `board_img` to the footprint and paste it on a white page.
    pub fn compose(&self, board_img: &GrayImage) -> GrayImage {
        let board = resize_nearest(board_img, self.board.width, self.board.height);
        let mut canvas = white_image(self.canvas.width, self.canvas.height);
        imageops::replace(
            &mut canvas,
            &board,
            i64::from(self.offset_x),
            i64::from(self.offset_y),
        );
        canvas
    }
}

/// Render `pattern` at the footprint computed for `spec` and place it on the page.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(spec, pattern), fields(dpi = spec.dpi(), paper = %spec.paper()))
)]
pub fn render_canvas(
    spec: &BoardSpec,
    pattern: &dyn BoardPattern,
) -> Result<(GrayImage, CanvasLayout), BoardError> {
    let layout = CanvasLayout::compute(spec)?;
    let board_img = pattern.render(layout.board.width, layout.board.height)?;
    Ok((layout.compose(&board_img), layout))
}
