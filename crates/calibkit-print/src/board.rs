//! Board families and the single rendering contract they share.

use crate::error::RendererError;
use crate::scaler::{render_canvas, CanvasLayout};
use crate::spec::check_length;
use crate::{BoardError, BoardSpec};
use calibkit_core::{
    resize_nearest, white_image, MarkerBoardKind, MarkerBoardLayout, MarkerDictionary, BLACK,
};
use image::{GrayImage, Luma};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Produces the raw board bitmap at an exact pixel size.
///
/// Implementations must return a single-channel image of exactly
/// `width × height` pixels.
pub trait BoardPattern {
    fn render(&self, width: u32, height: u32) -> Result<GrayImage, BoardError>;
}

/// Synthesizes marker-based boards.
///
/// Marker codebooks are owned by the vision backend; this crate only
/// validates parameters and passes the pixel footprint through.
pub trait MarkerRenderer {
    fn render_marker_board(
        &self,
        layout: &MarkerBoardLayout,
        width: u32,
        height: u32,
    ) -> Result<GrayImage, RendererError>;
}

/// Alternating black/white squares; the top-left square is black.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CheckerboardPattern {
    pub squares_x: u32,
    pub squares_y: u32,
}

impl BoardPattern for CheckerboardPattern {
    fn render(&self, width: u32, height: u32) -> Result<GrayImage, BoardError> {
        // One pixel per square, then nearest-neighbour up to the footprint.
        let base = GrayImage::from_fn(self.squares_x, self.squares_y, |x, y| {
            Luma([if (x + y) % 2 == 0 { 0 } else { 255 }])
        });
        Ok(resize_nearest(&base, width, height))
    }
}

/// Filled black circles on white, optionally in a staggered lattice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CircleGridPattern {
    pub cols: u32,
    pub rows: u32,
    pub asymmetric: bool,
}

impl CircleGridPattern {
    /// Circle radius for a bitmap of `width × height`: a quarter of the
    /// smaller cell side.
    pub fn radius(&self, width: u32, height: u32) -> u32 {
        let cell_w = f64::from(width) / f64::from(self.cols);
        let cell_h = f64::from(height) / f64::from(self.rows);
        (0.25 * cell_w.min(cell_h)) as u32
    }

    /// Circle centres in row-major order. Centres falling outside the bitmap
    /// are dropped.
    ///
    /// In asymmetric mode odd rows are shifted right by half a cell.
    pub fn circle_centers(&self, width: u32, height: u32) -> Vec<(u32, u32)> {
        let cell_w = f64::from(width) / f64::from(self.cols);
        let cell_h = f64::from(height) / f64::from(self.rows);
        let mut out = Vec::with_capacity((self.cols * self.rows) as usize);
        for y in 0..self.rows {
            let shift = if self.asymmetric && y % 2 == 1 { 0.5 } else { 0.0 };
            for x in 0..self.cols {
                let cx = ((f64::from(x) + 0.5 + shift) * cell_w) as u32;
                let cy = ((f64::from(y) + 0.5) * cell_h) as u32;
                if cx < width && cy < height {
                    out.push((cx, cy));
                }
            }
        }
        out
    }
}

impl BoardPattern for CircleGridPattern {
    fn render(&self, width: u32, height: u32) -> Result<GrayImage, BoardError> {
        let mut img = white_image(width, height);
        let r = self.radius(width, height);
        for (cx, cy) in self.circle_centers(width, height) {
            fill_circle(&mut img, cx, cy, r);
        }
        Ok(img)
    }
}

fn fill_circle(img: &mut GrayImage, cx: u32, cy: u32, r: u32) {
    let r2 = i64::from(r) * i64::from(r);
    let x0 = cx.saturating_sub(r);
    let y0 = cy.saturating_sub(r);
    let x1 = (cx + r).min(img.width() - 1);
    let y1 = (cy + r).min(img.height() - 1);
    for y in y0..=y1 {
        let dy = i64::from(y) - i64::from(cy);
        for x in x0..=x1 {
            let dx = i64::from(x) - i64::from(cx);
            if dx * dx + dy * dy <= r2 {
                img.put_pixel(x, y, BLACK);
            }
        }
    }
}

struct MarkerPattern<'a> {
    layout: MarkerBoardLayout,
    renderer: &'a dyn MarkerRenderer,
}

impl BoardPattern for MarkerPattern<'_> {
    fn render(&self, width: u32, height: u32) -> Result<GrayImage, BoardError> {
        let img = self
            .renderer
            .render_marker_board(&self.layout, width, height)
            .map_err(BoardError::Renderer)?;
        if img.dimensions() != (width, height) {
            return Err(BoardError::RenderedSizeMismatch {
                want_w: width,
                want_h: height,
                got_w: img.width(),
                got_h: img.height(),
            });
        }
        Ok(img)
    }
}

/// Board family and its family-specific parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BoardKind {
    Checkerboard,
    CircleGrid {
        #[serde(default)]
        asymmetric: bool,
    },
    ArucoGrid {
        dictionary: MarkerDictionary,
        /// Marker side as a fraction of the cell length, in (0, 1].
        marker_length_ratio: f64,
    },
    Charuco {
        dictionary: MarkerDictionary,
        marker_length_mm: f64,
    },
}

impl BoardKind {
    pub fn name(&self) -> &'static str {
        match self {
            BoardKind::Checkerboard => "checkerboard",
            BoardKind::CircleGrid { .. } => "circle_grid",
            BoardKind::ArucoGrid { .. } => "aruco_grid",
            BoardKind::Charuco { .. } => "charuco",
        }
    }

    pub fn needs_marker_renderer(&self) -> bool {
        matches!(self, BoardKind::ArucoGrid { .. } | BoardKind::Charuco { .. })
    }
}

/// A fully validated printable target.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCalibrationBoard")]
pub struct CalibrationBoard {
    spec: BoardSpec,
    kind: BoardKind,
}

#[derive(Deserialize)]
struct RawCalibrationBoard {
    spec: BoardSpec,
    kind: BoardKind,
}

impl TryFrom<RawCalibrationBoard> for CalibrationBoard {
    type Error = BoardError;

    fn try_from(raw: RawCalibrationBoard) -> Result<Self, Self::Error> {
        CalibrationBoard::new(raw.spec, raw.kind)
    }
}

impl CalibrationBoard {
    /// Validate the family parameters against `spec`.
    pub fn new(spec: BoardSpec, kind: BoardKind) -> Result<Self, BoardError> {
        match kind {
            BoardKind::Checkerboard | BoardKind::CircleGrid { .. } => {}
            BoardKind::ArucoGrid {
                marker_length_ratio,
                ..
            } => {
                if !marker_length_ratio.is_finite()
                    || marker_length_ratio <= 0.0
                    || marker_length_ratio > 1.0
                {
                    return Err(BoardError::InvalidMarkerRatio(marker_length_ratio));
                }
            }
            BoardKind::Charuco {
                marker_length_mm, ..
            } => {
                check_length("marker_length_mm", marker_length_mm)?;
                if marker_length_mm >= spec.square_length_mm() {
                    return Err(BoardError::MarkerLargerThanSquare {
                        marker: marker_length_mm,
                        square: spec.square_length_mm(),
                    });
                }
            }
        }
        let board = Self { spec, kind };
        if let Some(layout) = board.marker_layout() {
            if !layout.fits_dictionary() {
                return Err(BoardError::NotEnoughMarkers {
                    dictionary: layout.dictionary.name(),
                    needed: layout.marker_count(),
                    available: layout.dictionary.marker_count(),
                });
            }
        }
        Ok(board)
    }

    pub fn checkerboard(spec: BoardSpec) -> Self {
        Self {
            spec,
            kind: BoardKind::Checkerboard,
        }
    }

    pub fn circle_grid(spec: BoardSpec, asymmetric: bool) -> Self {
        Self {
            spec,
            kind: BoardKind::CircleGrid { asymmetric },
        }
    }

    pub fn aruco_grid(
        spec: BoardSpec,
        dictionary: &str,
        marker_length_ratio: f64,
    ) -> Result<Self, BoardError> {
        let dictionary = MarkerDictionary::from_name(dictionary)?;
        Self::new(
            spec,
            BoardKind::ArucoGrid {
                dictionary,
                marker_length_ratio,
            },
        )
    }

    pub fn charuco(
        spec: BoardSpec,
        dictionary: &str,
        marker_length_mm: f64,
    ) -> Result<Self, BoardError> {
        let dictionary = MarkerDictionary::from_name(dictionary)?;
        Self::new(
            spec,
            BoardKind::Charuco {
                dictionary,
                marker_length_mm,
            },
        )
    }

    #[inline]
    pub fn spec(&self) -> &BoardSpec {
        &self.spec
    }

    #[inline]
    pub fn kind(&self) -> &BoardKind {
        &self.kind
    }

    /// Page and footprint geometry for this board.
    pub fn layout(&self) -> Result<CanvasLayout, BoardError> {
        CanvasLayout::compute(&self.spec)
    }

    /// Renderer parameters for marker families, `None` otherwise.
    pub fn marker_layout(&self) -> Option<MarkerBoardLayout> {
        let square_m = self.spec.square_length_mm() / 1000.0;
        let base = MarkerBoardLayout {
            kind: MarkerBoardKind::Grid,
            squares_x: self.spec.squares_x(),
            squares_y: self.spec.squares_y(),
            square_length: square_m,
            marker_length: square_m,
            marker_separation: 0.0,
            dictionary: MarkerDictionary::Dict4x4_50,
        };
        match self.kind {
            BoardKind::ArucoGrid {
                dictionary,
                marker_length_ratio,
            } => Some(MarkerBoardLayout {
                marker_length: square_m * marker_length_ratio,
                marker_separation: square_m * (1.0 - marker_length_ratio),
                dictionary,
                ..base
            }),
            BoardKind::Charuco {
                dictionary,
                marker_length_mm,
            } => Some(MarkerBoardLayout {
                kind: MarkerBoardKind::Charuco,
                marker_length: marker_length_mm / 1000.0,
                dictionary,
                ..base
            }),
            BoardKind::Checkerboard | BoardKind::CircleGrid { .. } => None,
        }
    }

    /// Render the page for families that need no marker renderer.
    pub fn generate(&self) -> Result<GrayImage, BoardError> {
        self.generate_inner(None)
    }

    /// Render the page, delegating marker synthesis to `renderer`.
    pub fn generate_with(&self, renderer: &dyn MarkerRenderer) -> Result<GrayImage, BoardError> {
        self.generate_inner(Some(renderer))
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, renderer), fields(kind = self.kind.name()))
    )]
    pub(crate) fn generate_inner(
        &self,
        renderer: Option<&dyn MarkerRenderer>,
    ) -> Result<GrayImage, BoardError> {
        let sx = self.spec.squares_x();
        let sy = self.spec.squares_y();
        let (canvas, layout) = match self.kind {
            BoardKind::Checkerboard => render_canvas(
                &self.spec,
                &CheckerboardPattern {
                    squares_x: sx,
                    squares_y: sy,
                },
            )?,
            BoardKind::CircleGrid { asymmetric } => render_canvas(
                &self.spec,
                &CircleGridPattern {
                    cols: sx,
                    rows: sy,
                    asymmetric,
                },
            )?,
            BoardKind::ArucoGrid { .. } | BoardKind::Charuco { .. } => {
                let (Some(renderer), Some(layout)) = (renderer, self.marker_layout()) else {
                    return Err(BoardError::MarkerRendererRequired {
                        kind: self.kind.name(),
                    });
                };
                render_canvas(&self.spec, &MarkerPattern { layout, renderer })?
            }
        };
        log::info!(
            "generated {} board {}x{} on {} at {} dpi: board {}x{}px at ({}, {})",
            self.kind.name(),
            sx,
            sy,
            self.spec.paper(),
            self.spec.dpi(),
            layout.board.width,
            layout.board.height,
            layout.offset_x,
            layout.offset_y
        );
        Ok(canvas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calibkit_core::{distinct_levels, PaperFormat};

    fn spec(sx: u32, sy: u32) -> BoardSpec {
        BoardSpec::new(sx, sy, 20.0, 72, PaperFormat::A4).unwrap()
    }

    #[test]
    fn checkerboard_pattern_alternates_parity() {
        let img = CheckerboardPattern {
            squares_x: 4,
            squares_y: 3,
        }
        .render(40, 30)
        .unwrap();
        assert_eq!(img.get_pixel(5, 5).0[0], 0);
        assert_eq!(img.get_pixel(15, 5).0[0], 255);
        assert_eq!(img.get_pixel(5, 15).0[0], 255);
        assert_eq!(img.get_pixel(15, 15).0[0], 0);
        assert_eq!(distinct_levels(&img), vec![0, 255]);
    }

    #[test]
    fn asymmetric_rows_are_shifted_by_half_a_cell() {
        let pattern = CircleGridPattern {
            cols: 4,
            rows: 3,
            asymmetric: true,
        };
        let centers = pattern.circle_centers(400, 300);
        assert_eq!(&centers[..4], &[(50, 50), (150, 50), (250, 50), (350, 50)]);
        // The last shifted centre would sit on x == width and is dropped.
        assert_eq!(&centers[4..7], &[(100, 150), (200, 150), (300, 150)]);
        assert_eq!(centers[7], (50, 250));
        assert_eq!(centers.len(), 11);
    }

    #[test]
    fn out_of_bounds_centres_are_skipped() {
        // With two columns the shifted second centre lands at x == width.
        let pattern = CircleGridPattern {
            cols: 2,
            rows: 2,
            asymmetric: true,
        };
        let centers = pattern.circle_centers(100, 100);
        assert_eq!(centers, vec![(25, 25), (75, 25), (50, 75)]);
    }

    #[test]
    fn circle_radius_is_quarter_of_smaller_cell() {
        let pattern = CircleGridPattern {
            cols: 4,
            rows: 2,
            asymmetric: false,
        };
        assert_eq!(pattern.radius(400, 400), 25);
        let img = pattern.render(400, 400).unwrap();
        assert_eq!(img.get_pixel(50, 100).0[0], 0);
        assert_eq!(img.get_pixel(0, 0).0[0], 255);
    }

    #[test]
    fn marker_parameters_are_validated() {
        let s = spec(4, 4);
        assert!(matches!(
            CalibrationBoard::aruco_grid(s, "5x5_250", -0.1),
            Err(BoardError::InvalidMarkerRatio(_))
        ));
        assert!(matches!(
            CalibrationBoard::aruco_grid(s, "5x5_250", 1.5),
            Err(BoardError::InvalidMarkerRatio(_))
        ));
        assert!(CalibrationBoard::aruco_grid(s, "5x5_250", 1.0).is_ok());
        assert!(matches!(
            CalibrationBoard::aruco_grid(s, "invalid_dict", 0.8),
            Err(BoardError::UnknownDictionary(_))
        ));
        assert!(matches!(
            CalibrationBoard::charuco(s, "4x4_50", -15.0),
            Err(BoardError::InvalidLength { .. })
        ));
        assert!(matches!(
            CalibrationBoard::charuco(s, "4x4_50", 25.0),
            Err(BoardError::MarkerLargerThanSquare { .. })
        ));
    }

    #[test]
    fn dictionary_must_cover_every_marker() {
        let s = spec(10, 8);
        assert!(matches!(
            CalibrationBoard::aruco_grid(s, "4x4_50", 0.75),
            Err(BoardError::NotEnoughMarkers {
                needed: 80,
                available: 50,
                ..
            })
        ));
        // ChArUco only places markers on half of the squares.
        assert!(CalibrationBoard::charuco(s, "4x4_50", 13.0).is_ok());
    }

    #[test]
    fn marker_layout_converts_to_metres() {
        let board = CalibrationBoard::aruco_grid(
            BoardSpec::new(3, 5, 30.0, 150, PaperFormat::A4).unwrap(),
            "4x4_50",
            0.75,
        )
        .unwrap();
        let layout = board.marker_layout().unwrap();
        assert_eq!(layout.kind, MarkerBoardKind::Grid);
        assert!((layout.marker_length - 0.0225).abs() < 1e-12);
        assert!((layout.marker_separation - 0.0075).abs() < 1e-12);

        let charuco = CalibrationBoard::charuco(spec(6, 8), "5x5_250", 13.0).unwrap();
        let layout = charuco.marker_layout().unwrap();
        assert_eq!(layout.kind, MarkerBoardKind::Charuco);
        assert!((layout.square_length - 0.02).abs() < 1e-12);
        assert!((layout.marker_length - 0.013).abs() < 1e-12);
        assert_eq!(layout.marker_count(), 24);
    }

    #[test]
    fn marker_board_without_renderer_fails_before_rendering() {
        let board = CalibrationBoard::charuco(spec(7, 5), "5x5_250", 15.0).unwrap();
        assert!(matches!(
            board.generate(),
            Err(BoardError::MarkerRendererRequired { kind: "charuco" })
        ));
    }
}
