use calibkit_core::{UnknownDictionary, UnknownPaperFormat};
use std::path::PathBuf;

/// Error type produced by a [`crate::MarkerRenderer`].
pub type RendererError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Board configuration and rendering errors.
///
/// Every parameter check runs when the board is built, before any pixel is
/// rendered.
#[derive(thiserror::Error, Debug)]
pub enum BoardError {
    #[error("{axis} must be an integer >= 2 (got {value})")]
    InvalidGrid { axis: &'static str, value: u32 },
    #[error("{name} must be a positive finite length in mm (got {value})")]
    InvalidLength { name: &'static str, value: f64 },
    #[error("dpi must be >= {min} (got {value})")]
    InvalidDpi { value: u32, min: u32 },
    #[error("marker_length_ratio must be in (0, 1] (got {0})")]
    InvalidMarkerRatio(f64),
    #[error("marker_length_mm ({marker}) must be smaller than square_length_mm ({square})")]
    MarkerLargerThanSquare { marker: f64, square: f64 },
    #[error("board needs {needed} markers, dictionary {dictionary} has {available}")]
    NotEnoughMarkers {
        dictionary: &'static str,
        needed: usize,
        available: usize,
    },
    #[error(transparent)]
    UnknownPaper(#[from] UnknownPaperFormat),
    #[error(transparent)]
    UnknownDictionary(#[from] UnknownDictionary),
    #[error("page at {dpi} dpi needs {pixels} pixels, limit is {max}")]
    CanvasTooLarge { dpi: u32, pixels: u64, max: u64 },
    #[error("board is too small to cover a single pixel at {dpi} dpi")]
    EmptyFootprint { dpi: u32 },
    #[error("{kind} boards are synthesized by a marker renderer; none was provided")]
    MarkerRendererRequired { kind: &'static str },
    #[error("marker renderer failed")]
    Renderer(#[source] RendererError),
    #[error("pattern rendered at {got_w}x{got_h}, expected {want_w}x{want_h}")]
    RenderedSizeMismatch {
        want_w: u32,
        want_h: u32,
        got_w: u32,
        got_h: u32,
    },
}

/// Errors from writing a canvas to disk or to a document.
#[derive(thiserror::Error, Debug)]
pub enum ExportError {
    #[error(transparent)]
    UnknownPaper(#[from] UnknownPaperFormat),
    #[error("canvas is empty ({width}x{height})")]
    EmptyCanvas { width: u32, height: u32 },
    #[error("unsupported output extension for {path:?}, expected .pdf or an image extension (.png, .jpg, ...)")]
    UnsupportedExtension { path: PathBuf },
    #[error(transparent)]
    Board(#[from] BoardError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Png(#[from] png::EncodingError),
    #[error(transparent)]
    Image(#[from] image::ImageError),
}

/// JSON config I/O errors.
#[derive(thiserror::Error, Debug)]
pub enum BoardIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
