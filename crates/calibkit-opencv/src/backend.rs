use crate::convert::{
    column, dictionary, from_points2, from_points3, gray_to_mat, image_size, isometry, mat3,
    points2, points3, rotation_translation, to_matrix3, to_vector3,
};
use calibkit_calib::{
    BackendError, CameraSolution, Correspondences, HandEyeMethod, HandEyeTransform, PatternSize,
    VisionBackend,
};
use calibkit_core::{ImageSize, MarkerBoardKind, MarkerBoardLayout};
use image::GrayImage;
use nalgebra::{Isometry3, Matrix3, Point2};
use opencv::{
    calib3d,
    core::{self, Mat, Point2f, Point3f, Ptr, Size, TermCriteria, Vector},
    features2d::{Feature2D, SimpleBlobDetector, SimpleBlobDetector_Params},
    imgproc,
    objdetect::{
        ArucoDetector, CharucoBoard, CharucoDetector, CharucoParameters, DetectorParameters,
        GridBoard, RefineParameters,
    },
    prelude::*,
};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Fewest marker board points `solvePnP` accepts.
const MIN_BOARD_POINTS: usize = 4;

/// Solver and detector settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OpenCvParams {
    /// Refine chessboard corners to sub-pixel accuracy.
    pub subpix_refine: bool,
    /// Half size of the sub-pixel search window.
    pub subpix_window: i32,
    /// Extra `CALIB_*` flags passed to `calibrateCamera`.
    pub calibration_flags: i32,
    pub max_iterations: i32,
    pub epsilon: f64,
}

impl Default for OpenCvParams {
    fn default() -> Self {
        Self {
            subpix_refine: true,
            subpix_window: 11,
            calibration_flags: 0,
            max_iterations: 30,
            epsilon: 1e-3,
        }
    }
}

/// [`VisionBackend`] built on OpenCV's `calib3d` and `objdetect` modules.
///
/// Detectors are created per call, so one backend can be shared across the
/// calibrator's worker threads.
#[derive(Clone, Copy, Debug, Default)]
pub struct OpenCvBackend {
    params: OpenCvParams,
}

impl OpenCvBackend {
    pub fn new(params: OpenCvParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &OpenCvParams {
        &self.params
    }

    fn criteria(&self) -> opencv::Result<TermCriteria> {
        TermCriteria::new(
            core::TermCriteria_COUNT + core::TermCriteria_EPS,
            self.params.max_iterations,
            self.params.epsilon,
        )
    }

    fn chessboard(&self, image: &GrayImage, pattern: PatternSize) -> opencv::Result<Option<Vec<Point2<f64>>>> {
        let mat = gray_to_mat(image)?;
        let mut corners = Vector::<Point2f>::new();
        let found = calib3d::find_chessboard_corners(
            &mat,
            pattern_size(pattern),
            &mut corners,
            calib3d::CALIB_CB_ADAPTIVE_THRESH | calib3d::CALIB_CB_NORMALIZE_IMAGE,
        )?;
        if !found {
            return Ok(None);
        }
        if self.params.subpix_refine {
            let w = self.params.subpix_window;
            imgproc::corner_sub_pix(
                &mat,
                &mut corners,
                Size::new(w, w),
                Size::new(-1, -1),
                self.criteria()?,
            )?;
        }
        Ok(Some(from_points2(&corners)))
    }

    fn circles(
        &self,
        image: &GrayImage,
        pattern: PatternSize,
        asymmetric: bool,
    ) -> opencv::Result<Option<Vec<Point2<f64>>>> {
        let mat = gray_to_mat(image)?;
        let mut centers = Vector::<Point2f>::new();
        let flags = if asymmetric {
            calib3d::CALIB_CB_ASYMMETRIC_GRID
        } else {
            calib3d::CALIB_CB_SYMMETRIC_GRID
        };
        let detector: Ptr<Feature2D> =
            SimpleBlobDetector::create(SimpleBlobDetector_Params::default()?)?.into();
        let found = calib3d::find_circles_grid(
            &mat,
            pattern_size(pattern),
            &mut centers,
            flags,
            &detector,
            calib3d::CirclesGridFinderParameters::default()?,
        )?;
        Ok(found.then(|| from_points2(&centers)))
    }

    fn marker_board(
        &self,
        image: &GrayImage,
        layout: &MarkerBoardLayout,
    ) -> opencv::Result<Option<Correspondences>> {
        let mat = gray_to_mat(image)?;
        let dict = dictionary(layout.dictionary)?;
        let size = Size::new(layout.squares_x as i32, layout.squares_y as i32);
        let mut object_points = Vector::<Point3f>::new();
        let mut image_points = Vector::<Point2f>::new();

        let ids: Vec<u32> = match layout.kind {
            MarkerBoardKind::Charuco => {
                let board = CharucoBoard::new(
                    size,
                    layout.square_length as f32,
                    layout.marker_length as f32,
                    &dict,
                    &core::no_array(),
                )?;
                let detector = CharucoDetector::new(
                    &board,
                    &CharucoParameters::default()?,
                    &DetectorParameters::default()?,
                    refine_parameters(),
                )?;
                let mut corners = Vector::<Point2f>::new();
                let mut ids = Vector::<i32>::new();
                let mut marker_corners = Vector::<Vector<Point2f>>::new();
                let mut marker_ids = Vector::<i32>::new();
                detector.detect_board(
                    &mat,
                    &mut corners,
                    &mut ids,
                    &mut marker_corners,
                    &mut marker_ids,
                )?;
                if ids.is_empty() {
                    return Ok(None);
                }
                board.match_image_points(&corners, &ids, &mut object_points, &mut image_points)?;
                ids.iter().map(|id| id as u32).collect()
            }
            MarkerBoardKind::Grid => {
                let board = GridBoard::new(
                    size,
                    layout.marker_length as f32,
                    layout.marker_separation as f32,
                    &dict,
                    &core::no_array(),
                )?;
                let detector =
                    ArucoDetector::new(&dict, &DetectorParameters::default()?, refine_parameters())?;
                let mut marker_corners = Vector::<Vector<Point2f>>::new();
                let mut marker_ids = Vector::<i32>::new();
                detector.detect_markers(
                    &mat,
                    &mut marker_corners,
                    &mut marker_ids,
                    &mut core::no_array(),
                )?;
                if marker_ids.is_empty() {
                    return Ok(None);
                }
                board.match_image_points(
                    &marker_corners,
                    &marker_ids,
                    &mut object_points,
                    &mut image_points,
                )?;
                // Four corners per marker.
                marker_ids
                    .iter()
                    .flat_map(|id| std::iter::repeat(id as u32).take(4))
                    .collect()
            }
        };

        if image_points.len() < MIN_BOARD_POINTS {
            return Ok(None);
        }
        Ok(Some(Correspondences {
            image_points: from_points2(&image_points),
            object_points: from_points3(&object_points),
            ids: (ids.len() == image_points.len()).then_some(ids),
        }))
    }

    fn calibrate(&self, views: &[Correspondences], size: ImageSize) -> opencv::Result<CameraSolution> {
        let object_points: Vector<Vector<Point3f>> =
            views.iter().map(|v| points3(&v.object_points)).collect();
        let image_points: Vector<Vector<Point2f>> =
            views.iter().map(|v| points2(&v.image_points)).collect();

        let mut camera_matrix = Mat::default();
        let mut dist_coeffs = Mat::default();
        let mut rvecs = Vector::<Mat>::new();
        let mut tvecs = Vector::<Mat>::new();
        let rms = calib3d::calibrate_camera(
            &object_points,
            &image_points,
            image_size(size),
            &mut camera_matrix,
            &mut dist_coeffs,
            &mut rvecs,
            &mut tvecs,
            self.params.calibration_flags,
            self.criteria()?,
        )?;

        Ok(CameraSolution {
            rms,
            camera_matrix: to_matrix3(&camera_matrix)?,
            distortion: dist_coeffs.data_typed::<f64>()?.to_vec(),
            rvecs: rvecs.iter().map(|r| to_vector3(&r)).collect::<opencv::Result<_>>()?,
            tvecs: tvecs.iter().map(|t| to_vector3(&t)).collect::<opencv::Result<_>>()?,
        })
    }

    fn pnp(
        &self,
        view: &Correspondences,
        camera_matrix: &Matrix3<f64>,
        distortion: &[f64],
    ) -> opencv::Result<Isometry3<f64>> {
        let mut rvec = Mat::default();
        let mut tvec = Mat::default();
        calib3d::solve_pnp(
            &points3(&view.object_points),
            &points2(&view.image_points),
            &mat3(camera_matrix)?,
            &column(distortion)?,
            &mut rvec,
            &mut tvec,
            false,
            calib3d::SOLVEPNP_ITERATIVE,
        )?;
        isometry(&rvec, &tvec)
    }

    fn hand_eye(
        &self,
        gripper_in_base: &[Isometry3<f64>],
        target_in_camera: &[Isometry3<f64>],
        method: HandEyeMethod,
    ) -> opencv::Result<HandEyeTransform> {
        let (r_gripper, t_gripper) = split(gripper_in_base)?;
        let (r_target, t_target) = split(target_in_camera)?;
        let mut r_cam = Mat::default();
        let mut t_cam = Mat::default();
        calib3d::calibrate_hand_eye(
            &r_gripper,
            &t_gripper,
            &r_target,
            &t_target,
            &mut r_cam,
            &mut t_cam,
            hand_eye_method(method),
        )?;
        Ok(HandEyeTransform::new(
            to_matrix3(&r_cam)?,
            to_vector3(&t_cam)?,
            method,
        ))
    }
}

fn pattern_size(pattern: PatternSize) -> Size {
    Size::new(pattern.cols as i32, pattern.rows as i32)
}

fn refine_parameters() -> RefineParameters {
    RefineParameters {
        min_rep_distance: 10.0,
        error_correction_rate: 3.0,
        check_all_orders: true,
    }
}

fn split(poses: &[Isometry3<f64>]) -> opencv::Result<(Vector<Mat>, Vector<Mat>)> {
    let mut rotations = Vector::<Mat>::new();
    let mut translations = Vector::<Mat>::new();
    for pose in poses {
        let (r, t) = rotation_translation(pose)?;
        rotations.push(r);
        translations.push(t);
    }
    Ok((rotations, translations))
}

fn hand_eye_method(method: HandEyeMethod) -> calib3d::HandEyeCalibrationMethod {
    use calib3d::HandEyeCalibrationMethod as M;
    match method {
        HandEyeMethod::Tsai => M::CALIB_HAND_EYE_TSAI,
        HandEyeMethod::Park => M::CALIB_HAND_EYE_PARK,
        HandEyeMethod::Horaud => M::CALIB_HAND_EYE_HORAUD,
        HandEyeMethod::Andreff => M::CALIB_HAND_EYE_ANDREFF,
        HandEyeMethod::Daniilidis => M::CALIB_HAND_EYE_DANIILIDIS,
    }
}

fn wrap(operation: &'static str) -> impl FnOnce(opencv::Error) -> BackendError {
    move |err| BackendError::new(operation, err)
}

impl VisionBackend for OpenCvBackend {
    fn find_chessboard_corners(
        &self,
        image: &GrayImage,
        pattern: PatternSize,
    ) -> Result<Option<Vec<Point2<f64>>>, BackendError> {
        self.chessboard(image, pattern)
            .map_err(wrap("find_chessboard_corners"))
    }

    fn find_circles_grid(
        &self,
        image: &GrayImage,
        pattern: PatternSize,
        asymmetric: bool,
    ) -> Result<Option<Vec<Point2<f64>>>, BackendError> {
        self.circles(image, pattern, asymmetric)
            .map_err(wrap("find_circles_grid"))
    }

    fn detect_marker_board(
        &self,
        image: &GrayImage,
        board: &MarkerBoardLayout,
    ) -> Result<Option<Correspondences>, BackendError> {
        self.marker_board(image, board)
            .map_err(wrap("detect_marker_board"))
    }

    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(self, views), fields(views = views.len())))]
    fn calibrate_camera(
        &self,
        views: &[Correspondences],
        image_size: ImageSize,
    ) -> Result<CameraSolution, BackendError> {
        log::debug!("calibrateCamera on {} views at {image_size}", views.len());
        self.calibrate(views, image_size)
            .map_err(wrap("calibrate_camera"))
    }

    fn solve_pnp(
        &self,
        view: &Correspondences,
        camera_matrix: &Matrix3<f64>,
        distortion: &[f64],
    ) -> Result<Isometry3<f64>, BackendError> {
        self.pnp(view, camera_matrix, distortion)
            .map_err(wrap("solve_pnp"))
    }

    #[cfg_attr(feature = "tracing", instrument(level = "info", skip_all, fields(method = %method)))]
    fn calibrate_hand_eye(
        &self,
        gripper_in_base: &[Isometry3<f64>],
        target_in_camera: &[Isometry3<f64>],
        method: HandEyeMethod,
    ) -> Result<HandEyeTransform, BackendError> {
        self.hand_eye(gripper_in_base, target_in_camera, method)
            .map_err(wrap("calibrate_hand_eye"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calibkit_core::MarkerDictionary;

    #[test]
    fn blank_images_have_no_detections() {
        let backend = OpenCvBackend::default();
        let blank = GrayImage::from_pixel(320, 240, image::Luma([255]));
        let pattern = PatternSize { cols: 9, rows: 6 };
        assert_eq!(backend.find_chessboard_corners(&blank, pattern).unwrap(), None);
        assert_eq!(backend.find_circles_grid(&blank, pattern, true).unwrap(), None);

        let layout = MarkerBoardLayout {
            kind: MarkerBoardKind::Charuco,
            squares_x: 5,
            squares_y: 4,
            square_length: 0.04,
            marker_length: 0.03,
            marker_separation: 0.0,
            dictionary: MarkerDictionary::Dict4x4_50,
        };
        assert_eq!(backend.detect_marker_board(&blank, &layout).unwrap(), None);
    }
}
