//! OpenCV implementation of the calibkit backends.
//!
//! [`OpenCvBackend`] implements both [`calibkit_calib::VisionBackend`]
//! (chessboard, circle grid and marker board detection, `calibrateCamera`,
//! `solvePnP`, `calibrateHandEye`) and [`calibkit_print::MarkerRenderer`]
//! (ArUco grid and ChArUco synthesis). Linking needs a system OpenCV 4.7+
//! install.
//!
//! ```no_run
//! use calibkit_calib::{CalibrationConfig, HandEyeMethod};
//! use calibkit_opencv::OpenCvBackend;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CalibrationConfig::load_json("calib.json")?;
//! let backend = OpenCvBackend::default();
//! let mut calibrator = config.build_calibrator()?;
//! calibrator.calibrate(&backend)?;
//! calibrator.save(config.output_path())?;
//! if let Some((images, poses)) = config.hand_eye_inputs()? {
//!     calibrator.retarget(images);
//!     calibrator.calibrate_hand_eye(&backend, &poses, HandEyeMethod::Tsai)?;
//! }
//! # Ok(())
//! # }
//! ```

mod backend;
mod convert;
mod render;

pub use backend::{OpenCvBackend, OpenCvParams};
