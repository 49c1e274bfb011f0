//! Printable calibration targets.
//!
//! A [`CalibrationBoard`] pairs a validated [`BoardSpec`] (grid, square size,
//! DPI, paper) with a [`BoardKind`]. Generation computes the page in pixels,
//! renders the board at the largest aspect-preserving footprint and centres
//! it on a white page:
//!
//! ```no_run
//! use calibkit_print::{BoardSpec, CalibrationBoard};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let spec = BoardSpec::with_paper_name(8, 6, 25.0, 300, "A4")?;
//! let board = CalibrationBoard::checkerboard(spec);
//! let canvas = board.generate_to_file(Path::new("checker_a4.pdf"), None)?;
//! println!("{}x{}", canvas.width(), canvas.height());
//! # Ok(())
//! # }
//! ```
//!
//! ArUco grids and ChArUco boards are synthesized through a
//! [`MarkerRenderer`]; this crate validates their parameters and owns the page
//! layout.

mod board;
mod error;
mod export;
mod io;
mod pdf;
mod scaler;
mod spec;

pub use board::{
    BoardKind, BoardPattern, CalibrationBoard, CheckerboardPattern, CircleGridPattern,
    MarkerRenderer,
};
pub use calibkit_core::{MarkerBoardKind, MarkerBoardLayout};
pub use error::{BoardError, BoardIoError, ExportError, RendererError};
pub use export::{save_canvas, OutputFormat};
pub use io::BoardConfig;
pub use pdf::PdfExporter;
pub use scaler::{render_canvas, CanvasLayout, MAX_CANVAS_PIXELS};
pub use spec::{BoardSpec, MIN_DPI};
