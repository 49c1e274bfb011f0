use calibkit_core::{ImageSize, UnknownDictionary};
use std::error::Error as StdError;
use std::path::PathBuf;

/// Invalid calibrator configuration. Raised before any image is read.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("image folder does not exist: {}", path.display())]
    MissingFolder { path: PathBuf },
    #[error("image folder path is not a directory: {}", path.display())]
    NotADirectory { path: PathBuf },
    #[error("each pattern dimension must be >= 2 (got {cols}x{rows})")]
    InvalidPatternSize { cols: u32, rows: u32 },
    #[error("{name} must be a positive finite length (got {value})")]
    InvalidLength { name: &'static str, value: f64 },
    #[error("marker_length ({marker}) must be smaller than square_length ({square})")]
    MarkerLargerThanSquare { marker: f64, square: f64 },
    #[error("board needs {needed} markers, dictionary {dictionary} has {available}")]
    NotEnoughMarkers {
        dictionary: &'static str,
        needed: usize,
        available: usize,
    },
    #[error(transparent)]
    UnknownDictionary(#[from] UnknownDictionary),
    #[error("invalid filename pattern `{pattern}`")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
    #[error("unknown hand-eye method `{0}`, expected one of: tsai, park, horaud, andreff, daniilidis")]
    UnknownHandEyeMethod(String),
    #[error("unsupported file extension for {}, use .npz, .json or .txt", path.display())]
    UnsupportedExtension { path: PathBuf },
}

/// The image set (or the poses paired with it) cannot be used.
#[derive(thiserror::Error, Debug)]
pub enum InputSetError {
    #[error("no images found in {} matching `{pattern}`", folder.display())]
    NoImages { folder: PathBuf, pattern: String },
    #[error("no valid images found for calibration in {}", folder.display())]
    NoValidImages { folder: PathBuf },
    #[error("image at index {index} has different resolution: {found} vs {expected}")]
    ResolutionMismatch {
        index: usize,
        found: ImageSize,
        expected: ImageSize,
    },
    #[error("calibration target detected in {found} image(s), at least {needed} required")]
    NoDetections { found: usize, needed: usize },
    #[error("{poses} gripper poses for {images} images; counts must match")]
    PoseCountMismatch { poses: usize, images: usize },
    #[error("no calibration target detected in image {index} ({})", path.display())]
    NoDetectionInImage { index: usize, path: PathBuf },
    #[error("cannot list {}", folder.display())]
    Unreadable {
        folder: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// An operation was called out of order.
#[derive(thiserror::Error, Debug)]
pub enum PreconditionError {
    #[error("no calibration data available for {operation}; run calibrate() or load() first")]
    NoCalibration { operation: &'static str },
}

/// A vision backend call failed. Passed through as-is, never retried.
#[derive(thiserror::Error, Debug)]
#[error("{operation} failed: {source}")]
pub struct BackendError {
    pub operation: &'static str,
    #[source]
    pub source: Box<dyn StdError + Send + Sync + 'static>,
}

impl BackendError {
    pub fn new(
        operation: &'static str,
        source: impl Into<Box<dyn StdError + Send + Sync + 'static>>,
    ) -> Self {
        Self {
            operation,
            source: source.into(),
        }
    }
}

/// Reading or writing persisted results and pose files.
#[derive(thiserror::Error, Debug)]
pub enum PersistError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
    #[error("malformed npy member `{member}`: {reason}")]
    Npy { member: String, reason: String },
    #[error("malformed text result at line {line}: {reason}")]
    Text { line: usize, reason: String },
    #[error("result file has no `{key}` entry")]
    MissingKey { key: &'static str },
    #[error("invalid `{key}` entry: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Top-level calibration error.
#[derive(thiserror::Error, Debug)]
pub enum CalibError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    InputSet(#[from] InputSetError),
    #[error(transparent)]
    Precondition(#[from] PreconditionError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Persist(#[from] PersistError),
}
