//! Camera calibration orchestration.
//!
//! This crate owns everything around the numerical work: validating the image
//! set, choosing a target family, collecting detections, persisting results
//! and pairing images with robot poses for hand-eye calibration. Feature
//! detection and the solvers themselves live behind [`VisionBackend`].
//!
//! ```no_run
//! use calibkit_calib::{Calibrator, PatternSize, TargetFamily, VisionBackend};
//!
//! # fn run(backend: &dyn VisionBackend) -> Result<(), Box<dyn std::error::Error>> {
//! let target = TargetFamily::Chessboard {
//!     pattern_size: PatternSize::new(9, 6)?,
//!     square_size: 25.0,
//! };
//! let mut calibrator = Calibrator::from_folder("data/intrinsics", target)?;
//! let result = calibrator.calibrate(backend)?;
//! println!("rms = {:.3}", result.rms);
//! calibrator.save("out/camera.npz")?;
//! # Ok(())
//! # }
//! ```

mod backend;
mod calibrator;
mod error;
mod handeye;
mod images;
mod io;
pub mod persist;
mod result;
mod target;

pub use backend::{CameraSolution, Correspondences, VisionBackend};
pub use calibrator::{CalibrationStage, Calibrator, MIN_VIEWS};
pub use error::{
    BackendError, CalibError, ConfigError, InputSetError, PersistError, PreconditionError,
};
pub use handeye::{
    load_gripper_poses, GripperPose, GripperPoseRecord, HandEyeMethod, HandEyeTransform,
    RotationRecord,
};
pub use images::{ImageSource, DEFAULT_PATTERN};
pub use io::{CalibrationConfig, HandEyeConfig};
pub use persist::{load_result, save_result, PersistFormat};
pub use result::{
    CalibrationResult, ResultValue, KEY_DISTORTION, KEY_IMAGE_SIZE, KEY_MATRIX, KEY_RMS,
    KEY_RVECS, KEY_TVECS,
};
pub use target::{CalibrationTarget, PatternSize, TargetFamily};
