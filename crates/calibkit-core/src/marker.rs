use crate::MarkerDictionary;
use serde::{Deserialize, Serialize};

/// Layout family of a marker board.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerBoardKind {
    /// A grid of markers separated by white gaps.
    Grid,
    /// A chessboard with markers in the white squares.
    Charuco,
}

/// Geometry of a marker board as seen by a vision backend.
///
/// Lengths share one unit. Printable boards hand them over in metres;
/// calibration targets use whatever unit the object points should carry.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarkerBoardLayout {
    pub kind: MarkerBoardKind,
    pub squares_x: u32,
    pub squares_y: u32,
    /// Square side for ChArUco, marker pitch (marker + gap) for grids.
    pub square_length: f64,
    pub marker_length: f64,
    /// Gap between markers (grids only, zero for ChArUco).
    pub marker_separation: f64,
    pub dictionary: MarkerDictionary,
}

impl MarkerBoardLayout {
    /// Number of markers placed on the board.
    pub fn marker_count(&self) -> usize {
        let cells = self.squares_x as usize * self.squares_y as usize;
        match self.kind {
            MarkerBoardKind::Grid => cells,
            // White squares only; the top-left square is black.
            MarkerBoardKind::Charuco => cells / 2,
        }
    }

    /// Whether the dictionary holds enough distinct markers for the board.
    pub fn fits_dictionary(&self) -> bool {
        self.marker_count() <= self.dictionary.marker_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charuco_uses_half_of_the_squares() {
        let layout = MarkerBoardLayout {
            kind: MarkerBoardKind::Charuco,
            squares_x: 7,
            squares_y: 5,
            square_length: 0.03,
            marker_length: 0.022,
            marker_separation: 0.0,
            dictionary: MarkerDictionary::Dict4x4_50,
        };
        assert_eq!(layout.marker_count(), 17);
        assert!(layout.fits_dictionary());

        let grid = MarkerBoardLayout {
            kind: MarkerBoardKind::Grid,
            squares_x: 10,
            squares_y: 6,
            ..layout
        };
        assert_eq!(grid.marker_count(), 60);
        assert!(!grid.fits_dictionary());
    }
}
