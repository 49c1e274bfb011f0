use crate::convert::{cv_size, dictionary, mat_to_gray};
use crate::OpenCvBackend;
use calibkit_core::{MarkerBoardKind, MarkerBoardLayout};
use calibkit_print::{MarkerRenderer, RendererError};
use image::GrayImage;
use opencv::{
    core::{self, Mat},
    objdetect::{CharucoBoard, GridBoard},
    prelude::*,
};

/// Width of the black marker border in cells.
const BORDER_BITS: i32 = 1;

impl OpenCvBackend {
    fn render(&self, layout: &MarkerBoardLayout, width: u32, height: u32) -> opencv::Result<GrayImage> {
        let dict = dictionary(layout.dictionary)?;
        let size = core::Size::new(layout.squares_x as i32, layout.squares_y as i32);
        let mut out = Mat::default();
        match layout.kind {
            MarkerBoardKind::Charuco => {
                let board = CharucoBoard::new(
                    size,
                    layout.square_length as f32,
                    layout.marker_length as f32,
                    &dict,
                    &core::no_array(),
                )?;
                board.generate_image(cv_size(width, height), &mut out, 0, BORDER_BITS)?;
            }
            MarkerBoardKind::Grid => {
                let board = GridBoard::new(
                    size,
                    layout.marker_length as f32,
                    layout.marker_separation as f32,
                    &dict,
                    &core::no_array(),
                )?;
                board.generate_image(cv_size(width, height), &mut out, 0, BORDER_BITS)?;
            }
        }
        mat_to_gray(&out)
    }
}

impl MarkerRenderer for OpenCvBackend {
    fn render_marker_board(
        &self,
        layout: &MarkerBoardLayout,
        width: u32,
        height: u32,
    ) -> Result<GrayImage, RendererError> {
        log::debug!(
            "rendering {:?} {}x{} board ({}) at {width}x{height}",
            layout.kind,
            layout.squares_x,
            layout.squares_y,
            layout.dictionary
        );
        Ok(self.render(layout, width, height)?)
    }
}
