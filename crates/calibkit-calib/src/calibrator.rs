//! The calibration session: validate the image set, calibrate intrinsics,
//! persist them and run hand-eye calibration on top.

use crate::persist::{load_result, save_result};
use crate::{
    BackendError, CalibError, CalibrationResult, CalibrationTarget, ConfigError, Correspondences,
    GripperPose, HandEyeMethod, HandEyeTransform, ImageSource, InputSetError, PreconditionError,
    TargetFamily, VisionBackend,
};
use calibkit_core::{load_gray, ImageSize};
use nalgebra::Isometry3;
use rayon::prelude::*;
use std::fmt;
use std::path::{Path, PathBuf};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Fewest views with a detected target that a calibration accepts.
pub const MIN_VIEWS: usize = 1;

/// Tolerance for the determinant/orthogonality check on hand-eye rotations.
const ROTATION_TOL: f64 = 1e-6;

/// Where a [`Calibrator`] is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CalibrationStage {
    /// Folder and target validated, no image read yet.
    Constructed,
    /// Image set checked for a common resolution.
    Validated,
    /// Intrinsics computed in this session.
    Calibrated,
    /// Intrinsics written to disk.
    Persisted,
    /// Intrinsics read back from disk.
    Reloaded,
    HandEyeSolved,
}

impl CalibrationStage {
    pub fn has_result(self) -> bool {
        matches!(
            self,
            CalibrationStage::Calibrated
                | CalibrationStage::Persisted
                | CalibrationStage::Reloaded
                | CalibrationStage::HandEyeSolved
        )
    }
}

impl fmt::Display for CalibrationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CalibrationStage::Constructed => "constructed",
            CalibrationStage::Validated => "validated",
            CalibrationStage::Calibrated => "calibrated",
            CalibrationStage::Persisted => "persisted",
            CalibrationStage::Reloaded => "reloaded",
            CalibrationStage::HandEyeSolved => "hand-eye solved",
        };
        f.write_str(name)
    }
}

/// Calibration of one camera against one target family.
///
/// Holds at most one live [`CalibrationResult`]; `calibrate` and `load`
/// replace it.
#[derive(Debug)]
pub struct Calibrator {
    source: ImageSource,
    target: TargetFamily,
    stage: CalibrationStage,
    images: Vec<PathBuf>,
    image_size: Option<ImageSize>,
    result: Option<CalibrationResult>,
    hand_eye: Option<HandEyeTransform>,
}

impl Calibrator {
    pub fn new(source: ImageSource, target: TargetFamily) -> Result<Self, ConfigError> {
        target.validate()?;
        log::debug!(
            "{} calibrator on {} ({} pattern `{}`)",
            target.name(),
            source.folder().display(),
            target.pattern_size(),
            source.pattern()
        );
        Ok(Self {
            source,
            target,
            stage: CalibrationStage::Constructed,
            images: Vec::new(),
            image_size: None,
            result: None,
            hand_eye: None,
        })
    }

    /// Validate `folder` and build a calibrator selecting every file in it.
    pub fn from_folder(folder: impl Into<PathBuf>, target: TargetFamily) -> Result<Self, ConfigError> {
        Self::new(ImageSource::new(folder)?, target)
    }

    /// Point the calibrator at another image set.
    ///
    /// The live result is kept so intrinsics from one folder can drive
    /// hand-eye calibration on another; cached image lists are dropped.
    pub fn retarget(&mut self, source: ImageSource) {
        log::info!(
            "retargeting calibrator to {} (`{}`)",
            source.folder().display(),
            source.pattern()
        );
        self.source = source;
        self.images.clear();
        self.image_size = None;
        if !self.stage.has_result() {
            self.stage = CalibrationStage::Constructed;
        }
    }

    pub fn source(&self) -> &ImageSource {
        &self.source
    }

    pub fn target(&self) -> &TargetFamily {
        &self.target
    }

    pub fn stage(&self) -> CalibrationStage {
        self.stage
    }

    /// Images accepted by the last resolution check, in name order.
    pub fn images(&self) -> &[PathBuf] {
        &self.images
    }

    pub fn image_size(&self) -> Option<ImageSize> {
        self.image_size
    }

    pub fn result(&self) -> Option<&CalibrationResult> {
        self.result.as_ref()
    }

    pub fn hand_eye(&self) -> Option<&HandEyeTransform> {
        self.hand_eye.as_ref()
    }

    /// Check the current image set for a common resolution and cache it.
    pub fn check_images_size(&mut self) -> Result<(ImageSize, &[PathBuf]), CalibError> {
        let (size, images) = self.source.check_images_size()?;
        self.image_size = Some(size);
        self.images = images;
        if self.stage == CalibrationStage::Constructed {
            self.stage = CalibrationStage::Validated;
        }
        Ok((size, &self.images))
    }

    /// Detect the target in every image and solve for the intrinsics.
    ///
    /// Images without a detection are skipped with a warning. Backend
    /// failures abort the run.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, backend), fields(target = self.target.name()))
    )]
    pub fn calibrate(&mut self, backend: &dyn VisionBackend) -> Result<&CalibrationResult, CalibError> {
        let (size, _) = self.check_images_size()?;
        let target = &self.target;
        let detections = self
            .images
            .par_iter()
            .map(|path| detect_in(target, backend, path))
            .collect::<Result<Vec<_>, BackendError>>()?;

        let views: Vec<Correspondences> = detections
            .into_iter()
            .zip(&self.images)
            .filter_map(|(view, path)| {
                if view.is_none() {
                    log::warn!("no {} found in {}, skipping", target.name(), path.display());
                }
                view
            })
            .collect();
        if views.len() < MIN_VIEWS {
            return Err(InputSetError::NoDetections {
                found: views.len(),
                needed: MIN_VIEWS,
            }
            .into());
        }
        log::info!(
            "{} detected in {}/{} images",
            target.name(),
            views.len(),
            self.images.len()
        );

        let solution = target.solve(backend, &views, size)?;
        let result = CalibrationResult::from_solution(solution, size);
        log::info!("calibrated {} at {}: rms {:.4} px", target.name(), size, result.rms);

        self.hand_eye = None;
        self.stage = CalibrationStage::Calibrated;
        Ok(self.result.insert(result))
    }

    /// Write the live result; the format follows the extension.
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<(), CalibError> {
        let result = self.result.as_ref().ok_or(PreconditionError::NoCalibration {
            operation: "save",
        })?;
        save_result(result, path.as_ref())?;
        if self.stage != CalibrationStage::HandEyeSolved {
            self.stage = CalibrationStage::Persisted;
        }
        Ok(())
    }

    /// Replace the live result with one read from disk.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<&CalibrationResult, CalibError> {
        let result = load_result(path.as_ref())?;
        self.hand_eye = None;
        self.stage = CalibrationStage::Reloaded;
        Ok(self.result.insert(result))
    }

    /// Solve the camera-to-gripper transform.
    ///
    /// `poses[i]` must be the gripper pose at the time image `i` (in name
    /// order) was taken; every image must show the target.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip_all, fields(poses = poses.len(), method = %method))
    )]
    pub fn calibrate_hand_eye(
        &mut self,
        backend: &dyn VisionBackend,
        poses: &[GripperPose],
        method: HandEyeMethod,
    ) -> Result<&HandEyeTransform, CalibError> {
        let (camera_matrix, distortion) = match &self.result {
            Some(r) => (r.camera_matrix, r.distortion.clone()),
            None => {
                return Err(PreconditionError::NoCalibration {
                    operation: "hand-eye calibration",
                }
                .into())
            }
        };
        self.check_images_size()?;
        if poses.len() != self.images.len() {
            return Err(InputSetError::PoseCountMismatch {
                poses: poses.len(),
                images: self.images.len(),
            }
            .into());
        }

        let target = &self.target;
        let views = self
            .images
            .par_iter()
            .map(|path| detect_in(target, backend, path))
            .collect::<Result<Vec<_>, BackendError>>()?;

        let mut target_in_camera = Vec::with_capacity(views.len());
        for (index, (view, path)) in views.iter().zip(&self.images).enumerate() {
            let Some(view) = view else {
                return Err(InputSetError::NoDetectionInImage {
                    index,
                    path: path.clone(),
                }
                .into());
            };
            target_in_camera.push(backend.solve_pnp(view, &camera_matrix, &distortion)?);
        }
        let gripper_in_base: Vec<Isometry3<f64>> = poses.iter().map(|p| p.0).collect();

        let transform = backend.calibrate_hand_eye(&gripper_in_base, &target_in_camera, method)?;
        if !transform.is_proper_rotation(ROTATION_TOL) {
            log::warn!(
                "hand-eye rotation from {method} is not a proper rotation (det {:.6})",
                transform.rotation.determinant()
            );
        }
        log::info!(
            "hand-eye ({method}) from {} poses: t = [{:.4}, {:.4}, {:.4}]",
            poses.len(),
            transform.translation.x,
            transform.translation.y,
            transform.translation.z
        );
        self.stage = CalibrationStage::HandEyeSolved;
        Ok(self.hand_eye.insert(transform))
    }
}

/// Load one image and run the target detector on it. Undecodable images
/// count as "no detection".
fn detect_in(
    target: &TargetFamily,
    backend: &dyn VisionBackend,
    path: &Path,
) -> Result<Option<Correspondences>, BackendError> {
    let image = match load_gray(path) {
        Ok(image) => image,
        Err(err) => {
            log::warn!("failed to decode {}: {err}", path.display());
            return Ok(None);
        }
    };
    target.detect(backend, &image)
}
