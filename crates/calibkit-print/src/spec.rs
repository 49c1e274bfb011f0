//! Validated physical board specification.

use crate::BoardError;
use calibkit_core::PaperFormat;
use serde::{Deserialize, Serialize};

/// Lowest accepted rendering density. Below this markers and edges stop
/// being legible on paper.
pub const MIN_DPI: u32 = 50;

/// Physical description shared by every board family.
///
/// `squares_x`/`squares_y` count **cells** (squares, circles or markers), not
/// inner corners. Values are checked once in [`BoardSpec::new`]; the `with_*`
/// methods return a new, re-validated spec.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBoardSpec")]
pub struct BoardSpec {
    squares_x: u32,
    squares_y: u32,
    square_length_mm: f64,
    dpi: u32,
    paper: PaperFormat,
}

#[derive(Deserialize)]
struct RawBoardSpec {
    squares_x: u32,
    squares_y: u32,
    square_length_mm: f64,
    dpi: u32,
    paper: PaperFormat,
}

impl TryFrom<RawBoardSpec> for BoardSpec {
    type Error = BoardError;

    fn try_from(raw: RawBoardSpec) -> Result<Self, Self::Error> {
        BoardSpec::new(
            raw.squares_x,
            raw.squares_y,
            raw.square_length_mm,
            raw.dpi,
            raw.paper,
        )
    }
}

impl BoardSpec {
    pub fn new(
        squares_x: u32,
        squares_y: u32,
        square_length_mm: f64,
        dpi: u32,
        paper: PaperFormat,
    ) -> Result<Self, BoardError> {
        check_grid("squares_x", squares_x)?;
        check_grid("squares_y", squares_y)?;
        check_length("square_length_mm", square_length_mm)?;
        if dpi < MIN_DPI {
            return Err(BoardError::InvalidDpi {
                value: dpi,
                min: MIN_DPI,
            });
        }
        Ok(Self {
            squares_x,
            squares_y,
            square_length_mm,
            dpi,
            paper,
        })
    }

    /// Same as [`BoardSpec::new`] with the paper format given by name.
    pub fn with_paper_name(
        squares_x: u32,
        squares_y: u32,
        square_length_mm: f64,
        dpi: u32,
        paper: &str,
    ) -> Result<Self, BoardError> {
        let paper = PaperFormat::from_name(paper)?;
        Self::new(squares_x, squares_y, square_length_mm, dpi, paper)
    }

    #[inline]
    pub fn squares_x(&self) -> u32 {
        self.squares_x
    }

    #[inline]
    pub fn squares_y(&self) -> u32 {
        self.squares_y
    }

    #[inline]
    pub fn square_length_mm(&self) -> f64 {
        self.square_length_mm
    }

    #[inline]
    pub fn dpi(&self) -> u32 {
        self.dpi
    }

    #[inline]
    pub fn paper(&self) -> PaperFormat {
        self.paper
    }

    /// Physical board size `(width, height)` in millimetres.
    pub fn board_size_mm(&self) -> (f64, f64) {
        (
            f64::from(self.squares_x) * self.square_length_mm,
            f64::from(self.squares_y) * self.square_length_mm,
        )
    }

    pub fn with_grid(&self, squares_x: u32, squares_y: u32) -> Result<Self, BoardError> {
        Self::new(
            squares_x,
            squares_y,
            self.square_length_mm,
            self.dpi,
            self.paper,
        )
    }

    pub fn with_square_length_mm(&self, square_length_mm: f64) -> Result<Self, BoardError> {
        Self::new(
            self.squares_x,
            self.squares_y,
            square_length_mm,
            self.dpi,
            self.paper,
        )
    }

    pub fn with_dpi(&self, dpi: u32) -> Result<Self, BoardError> {
        Self::new(
            self.squares_x,
            self.squares_y,
            self.square_length_mm,
            dpi,
            self.paper,
        )
    }

    pub fn with_paper(&self, paper: PaperFormat) -> Self {
        Self { paper, ..*self }
    }
}

fn check_grid(axis: &'static str, value: u32) -> Result<(), BoardError> {
    if value < 2 {
        return Err(BoardError::InvalidGrid { axis, value });
    }
    Ok(())
}

pub(crate) fn check_length(name: &'static str, value: f64) -> Result<(), BoardError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(BoardError::InvalidLength { name, value });
    }
    Ok(())
}
