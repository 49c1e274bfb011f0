//! High-level facade for the `calibkit-*` workspace.
//!
//! This crate provides:
//! - re-exports of the board generation and calibration crates
//! - the `calibkit` command-line tool (feature `cli`, on by default)
//!
//! ## Quickstart
//!
//! ```no_run
//! use calibkit::print::{BoardSpec, CalibrationBoard};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let spec = BoardSpec::with_paper_name(9, 7, 20.0, 300, "A4")?;
//! CalibrationBoard::circle_grid(spec, true).generate_to_file(Path::new("circles.pdf"), None)?;
//! # Ok(())
//! # }
//! ```
//!
//! Calibration needs a [`calib::VisionBackend`]; the `calibkit-opencv` crate
//! provides one built on OpenCV, and it also implements
//! [`print::MarkerRenderer`] for ArUco and ChArUco boards.
//!
//! ## API map
//! - `calibkit::core`: paper formats, marker dictionaries, image helpers, logging.
//! - `calibkit::print`: board specs, rendering, PDF/PNG export, board configs.
//! - `calibkit::calib`: image sets, target families, the calibrator, hand-eye,
//!   result persistence.

pub use calibkit_calib as calib;
pub use calibkit_core as core;
pub use calibkit_print as print;

pub use calibkit_calib::{CalibError, CalibrationResult, Calibrator, TargetFamily, VisionBackend};
pub use calibkit_core::{MarkerDictionary, PaperFormat};
pub use calibkit_print::{BoardKind, BoardSpec, CalibrationBoard, MarkerRenderer};
