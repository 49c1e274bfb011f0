//! The seam between calibration orchestration and the vision library doing
//! the numerical work.

use crate::{BackendError, HandEyeMethod, HandEyeTransform, PatternSize};
use calibkit_core::{ImageSize, MarkerBoardLayout};
use image::GrayImage;
use nalgebra::{Isometry3, Matrix3, Point2, Point3, Vector3};
use serde::{Deserialize, Serialize};

/// 2D-3D correspondences found in one image.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Correspondences {
    /// Detected feature positions in pixels.
    pub image_points: Vec<Point2<f64>>,
    /// Matching board coordinates (z = 0 plane).
    pub object_points: Vec<Point3<f64>>,
    /// Marker or ChArUco corner ids, when the target carries them.
    #[serde(default)]
    pub ids: Option<Vec<u32>>,
}

impl Correspondences {
    pub fn len(&self) -> usize {
        self.image_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.image_points.is_empty()
    }
}

/// Intrinsics and per-view extrinsics from a camera calibration.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraSolution {
    /// RMS reprojection error in pixels.
    pub rms: f64,
    pub camera_matrix: Matrix3<f64>,
    pub distortion: Vec<f64>,
    /// Rodrigues rotation vector per view.
    pub rvecs: Vec<Vector3<f64>>,
    pub tvecs: Vec<Vector3<f64>>,
}

/// Feature detection and solvers used by the calibrator.
///
/// Every detector returns `Ok(None)` when the target is simply not visible;
/// `Err` is reserved for failures of the backend itself. Implementations are
/// shared across the rayon pool and must be `Sync`.
pub trait VisionBackend: Sync {
    /// Inner chessboard corners in row-major order, `pattern.count()` of them.
    fn find_chessboard_corners(
        &self,
        image: &GrayImage,
        pattern: PatternSize,
    ) -> Result<Option<Vec<Point2<f64>>>, BackendError>;

    /// Circle centres in row-major order.
    fn find_circles_grid(
        &self,
        image: &GrayImage,
        pattern: PatternSize,
        asymmetric: bool,
    ) -> Result<Option<Vec<Point2<f64>>>, BackendError>;

    /// Detect markers and return matched board points with their ids.
    fn detect_marker_board(
        &self,
        image: &GrayImage,
        board: &MarkerBoardLayout,
    ) -> Result<Option<Correspondences>, BackendError>;

    fn calibrate_camera(
        &self,
        views: &[Correspondences],
        image_size: ImageSize,
    ) -> Result<CameraSolution, BackendError>;

    /// Pose of the target in the camera frame.
    fn solve_pnp(
        &self,
        view: &Correspondences,
        camera_matrix: &Matrix3<f64>,
        distortion: &[f64],
    ) -> Result<Isometry3<f64>, BackendError>;

    /// Camera pose in the gripper frame from paired motions.
    fn calibrate_hand_eye(
        &self,
        gripper_in_base: &[Isometry3<f64>],
        target_in_camera: &[Isometry3<f64>],
        method: HandEyeMethod,
    ) -> Result<HandEyeTransform, BackendError>;
}
