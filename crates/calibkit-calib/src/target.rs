//! Calibration target families: what to look for in an image and which board
//! coordinates the detections correspond to.

use crate::{BackendError, CameraSolution, ConfigError, Correspondences, VisionBackend};
use calibkit_core::{ImageSize, MarkerBoardKind, MarkerBoardLayout, MarkerDictionary};
use image::GrayImage;
use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Grid dimensions `(cols, rows)`.
///
/// Inner corners for chessboards, circles for circle grids and squares for
/// marker boards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatternSize {
    pub cols: u32,
    pub rows: u32,
}

impl PatternSize {
    pub fn new(cols: u32, rows: u32) -> Result<Self, ConfigError> {
        let size = Self { cols, rows };
        size.validate()?;
        Ok(size)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cols < 2 || self.rows < 2 {
            return Err(ConfigError::InvalidPatternSize {
                cols: self.cols,
                rows: self.rows,
            });
        }
        Ok(())
    }

    /// Number of grid points.
    pub fn count(&self) -> usize {
        self.cols as usize * self.rows as usize
    }
}

impl fmt::Display for PatternSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.cols, self.rows)
    }
}

/// Per-family detection and solving.
pub trait CalibrationTarget: Send + Sync {
    fn name(&self) -> &'static str;

    fn pattern_size(&self) -> PatternSize;

    /// Check every parameter; called when a calibrator is built.
    fn validate(&self) -> Result<(), ConfigError>;

    /// Find the target in one image. `Ok(None)` when it is not visible.
    fn detect(
        &self,
        backend: &dyn VisionBackend,
        image: &GrayImage,
    ) -> Result<Option<Correspondences>, BackendError>;

    /// Solve intrinsics from the collected views.
    fn solve(
        &self,
        backend: &dyn VisionBackend,
        views: &[Correspondences],
        image_size: ImageSize,
    ) -> Result<CameraSolution, BackendError> {
        backend.calibrate_camera(views, image_size)
    }
}

/// Supported calibration targets.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TargetFamily {
    /// Chessboard; `pattern_size` counts inner corners.
    Chessboard {
        pattern_size: PatternSize,
        square_size: f64,
    },
    /// Symmetric or staggered circle grid.
    CircleGrid {
        pattern_size: PatternSize,
        spacing: f64,
        #[serde(default)]
        asymmetric: bool,
    },
    /// Grid of ArUco markers; `pattern_size` counts markers.
    ArucoGrid {
        pattern_size: PatternSize,
        marker_length: f64,
        marker_separation: f64,
        dictionary: MarkerDictionary,
    },
    /// ChArUco board; `pattern_size` counts squares.
    Charuco {
        pattern_size: PatternSize,
        square_length: f64,
        marker_length: f64,
        dictionary: MarkerDictionary,
    },
}

impl TargetFamily {
    /// Board coordinates of every grid point in detection order.
    ///
    /// Chessboards and symmetric grids use `(i*s, j*s, 0)`; asymmetric grids
    /// stagger odd rows with `((2i + j%2)*s, j*s, 0)`. Marker boards return
    /// `None`: their object points come with each detection.
    pub fn object_points(&self) -> Option<Vec<Point3<f64>>> {
        let (pattern, step, asymmetric) = match *self {
            TargetFamily::Chessboard {
                pattern_size,
                square_size,
            } => (pattern_size, square_size, false),
            TargetFamily::CircleGrid {
                pattern_size,
                spacing,
                asymmetric,
            } => (pattern_size, spacing, asymmetric),
            TargetFamily::ArucoGrid { .. } | TargetFamily::Charuco { .. } => return None,
        };
        let mut points = Vec::with_capacity(pattern.count());
        for j in 0..pattern.rows {
            for i in 0..pattern.cols {
                let x = if asymmetric {
                    f64::from(2 * i + j % 2) * step
                } else {
                    f64::from(i) * step
                };
                points.push(Point3::new(x, f64::from(j) * step, 0.0));
            }
        }
        Some(points)
    }

    /// Board description handed to the backend for marker families.
    pub fn marker_layout(&self) -> Option<MarkerBoardLayout> {
        match *self {
            TargetFamily::ArucoGrid {
                pattern_size,
                marker_length,
                marker_separation,
                dictionary,
            } => Some(MarkerBoardLayout {
                kind: MarkerBoardKind::Grid,
                squares_x: pattern_size.cols,
                squares_y: pattern_size.rows,
                square_length: marker_length + marker_separation,
                marker_length,
                marker_separation,
                dictionary,
            }),
            TargetFamily::Charuco {
                pattern_size,
                square_length,
                marker_length,
                dictionary,
            } => Some(MarkerBoardLayout {
                kind: MarkerBoardKind::Charuco,
                squares_x: pattern_size.cols,
                squares_y: pattern_size.rows,
                square_length,
                marker_length,
                marker_separation: 0.0,
                dictionary,
            }),
            TargetFamily::Chessboard { .. } | TargetFamily::CircleGrid { .. } => None,
        }
    }

    fn grid_view(
        &self,
        operation: &'static str,
        found: Option<Vec<Point2<f64>>>,
    ) -> Result<Option<Correspondences>, BackendError> {
        let (Some(image_points), Some(object_points)) = (found, self.object_points()) else {
            return Ok(None);
        };
        if image_points.len() != object_points.len() {
            return Err(BackendError::new(
                operation,
                format!(
                    "returned {} points for a {} pattern",
                    image_points.len(),
                    self.pattern_size()
                ),
            ));
        }
        Ok(Some(Correspondences {
            image_points,
            object_points,
            ids: None,
        }))
    }
}

impl CalibrationTarget for TargetFamily {
    fn name(&self) -> &'static str {
        match self {
            TargetFamily::Chessboard { .. } => "chessboard",
            TargetFamily::CircleGrid { .. } => "circle_grid",
            TargetFamily::ArucoGrid { .. } => "aruco_grid",
            TargetFamily::Charuco { .. } => "charuco",
        }
    }

    fn pattern_size(&self) -> PatternSize {
        match *self {
            TargetFamily::Chessboard { pattern_size, .. }
            | TargetFamily::CircleGrid { pattern_size, .. }
            | TargetFamily::ArucoGrid { pattern_size, .. }
            | TargetFamily::Charuco { pattern_size, .. } => pattern_size,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.pattern_size().validate()?;
        match *self {
            TargetFamily::Chessboard { square_size, .. } => {
                check_length("square_size", square_size)?;
            }
            TargetFamily::CircleGrid { spacing, .. } => {
                check_length("spacing", spacing)?;
            }
            TargetFamily::ArucoGrid {
                marker_length,
                marker_separation,
                ..
            } => {
                check_length("marker_length", marker_length)?;
                if !marker_separation.is_finite() || marker_separation < 0.0 {
                    return Err(ConfigError::InvalidLength {
                        name: "marker_separation",
                        value: marker_separation,
                    });
                }
            }
            TargetFamily::Charuco {
                square_length,
                marker_length,
                ..
            } => {
                check_length("square_length", square_length)?;
                check_length("marker_length", marker_length)?;
                if marker_length >= square_length {
                    return Err(ConfigError::MarkerLargerThanSquare {
                        marker: marker_length,
                        square: square_length,
                    });
                }
            }
        }
        if let Some(layout) = self.marker_layout() {
            if !layout.fits_dictionary() {
                return Err(ConfigError::NotEnoughMarkers {
                    dictionary: layout.dictionary.name(),
                    needed: layout.marker_count(),
                    available: layout.dictionary.marker_count(),
                });
            }
        }
        Ok(())
    }

    fn detect(
        &self,
        backend: &dyn VisionBackend,
        image: &GrayImage,
    ) -> Result<Option<Correspondences>, BackendError> {
        match *self {
            TargetFamily::Chessboard { pattern_size, .. } => {
                let found = backend.find_chessboard_corners(image, pattern_size)?;
                self.grid_view("find_chessboard_corners", found)
            }
            TargetFamily::CircleGrid {
                pattern_size,
                asymmetric,
                ..
            } => {
                let found = backend.find_circles_grid(image, pattern_size, asymmetric)?;
                self.grid_view("find_circles_grid", found)
            }
            TargetFamily::ArucoGrid { .. } | TargetFamily::Charuco { .. } => {
                let Some(layout) = self.marker_layout() else {
                    return Ok(None);
                };
                // Fewer than four points cannot constrain a pose.
                Ok(backend
                    .detect_marker_board(image, &layout)?
                    .filter(|view| view.len() >= 4))
            }
        }
    }
}

fn check_length(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::InvalidLength { name, value });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn pattern(cols: u32, rows: u32) -> PatternSize {
        PatternSize { cols, rows }
    }

    #[test]
    fn pattern_dimensions_must_be_at_least_two() {
        assert!(PatternSize::new(9, 6).is_ok());
        assert!(matches!(
            PatternSize::new(1, 6),
            Err(ConfigError::InvalidPatternSize { cols: 1, rows: 6 })
        ));
        let target = TargetFamily::Chessboard {
            pattern_size: pattern(9, 0),
            square_size: 1.0,
        };
        assert!(target.validate().is_err());
    }

    #[test]
    fn chessboard_points_are_row_major() {
        let target = TargetFamily::Chessboard {
            pattern_size: pattern(3, 2),
            square_size: 25.0,
        };
        let pts = target.object_points().unwrap();
        assert_eq!(pts.len(), 6);
        assert_relative_eq!(pts[1], Point3::new(25.0, 0.0, 0.0));
        assert_relative_eq!(pts[3], Point3::new(0.0, 25.0, 0.0));
        assert_relative_eq!(pts[5], Point3::new(50.0, 25.0, 0.0));
    }

    #[test]
    fn asymmetric_grid_staggers_odd_rows() {
        let target = TargetFamily::CircleGrid {
            pattern_size: pattern(4, 3),
            spacing: 10.0,
            asymmetric: true,
        };
        let pts = target.object_points().unwrap();
        assert_relative_eq!(pts[0], Point3::new(0.0, 0.0, 0.0));
        assert_relative_eq!(pts[1], Point3::new(20.0, 0.0, 0.0));
        assert_relative_eq!(pts[4], Point3::new(10.0, 10.0, 0.0));
        assert_relative_eq!(pts[5], Point3::new(30.0, 10.0, 0.0));
        assert_relative_eq!(pts[8], Point3::new(0.0, 20.0, 0.0));
    }

    #[test]
    fn marker_families_are_validated() {
        let charuco = TargetFamily::Charuco {
            pattern_size: pattern(7, 5),
            square_length: 0.03,
            marker_length: 0.035,
            dictionary: MarkerDictionary::Dict4x4_50,
        };
        assert!(matches!(
            charuco.validate(),
            Err(ConfigError::MarkerLargerThanSquare { .. })
        ));
        assert!(charuco.object_points().is_none());

        let grid = TargetFamily::ArucoGrid {
            pattern_size: pattern(10, 8),
            marker_length: 0.04,
            marker_separation: 0.01,
            dictionary: MarkerDictionary::Dict4x4_50,
        };
        assert!(matches!(
            grid.validate(),
            Err(ConfigError::NotEnoughMarkers { needed: 80, .. })
        ));
        let layout = grid.marker_layout().unwrap();
        assert_relative_eq!(layout.square_length, 0.05);
    }

    #[test]
    fn family_parses_from_json() {
        let json = r#"{"type": "circle_grid", "pattern_size": {"cols": 4, "rows": 11}, "spacing": 20.0, "asymmetric": true}"#;
        let target: TargetFamily = serde_json::from_str(json).unwrap();
        assert_eq!(target.name(), "circle_grid");
        assert_eq!(target.pattern_size(), pattern(4, 11));
        assert!(target.validate().is_ok());
    }
}
