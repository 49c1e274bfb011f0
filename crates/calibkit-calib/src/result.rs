//! The calibration result and its key/value view used for persistence.

use crate::{CameraSolution, PersistError};
use calibkit_core::ImageSize;
use nalgebra::{DMatrix, Matrix3, Vector3};
use std::collections::BTreeMap;
use std::fmt;

pub const KEY_RMS: &str = "ret";
pub const KEY_MATRIX: &str = "matrix";
pub const KEY_DISTORTION: &str = "distortion";
pub const KEY_RVECS: &str = "rvecs";
pub const KEY_TVECS: &str = "tvecs";
pub const KEY_IMAGE_SIZE: &str = "image_size";

/// One persisted value.
#[derive(Clone, Debug, PartialEq)]
pub enum ResultValue {
    Scalar(f64),
    Matrix(DMatrix<f64>),
    Text(String),
}

impl ResultValue {
    /// A scalar, or a matrix holding exactly one value.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            ResultValue::Scalar(v) => Some(*v),
            ResultValue::Matrix(m) if m.len() == 1 => Some(m[0]),
            _ => None,
        }
    }

    pub fn as_matrix(&self) -> Option<&DMatrix<f64>> {
        match self {
            ResultValue::Matrix(m) => Some(m),
            _ => None,
        }
    }
}

impl fmt::Display for ResultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultValue::Scalar(v) => write!(f, "{v}"),
            ResultValue::Text(s) => f.write_str(s),
            ResultValue::Matrix(m) => {
                for (r, row) in m.row_iter().enumerate() {
                    if r > 0 {
                        writeln!(f)?;
                    }
                    let cells: Vec<String> = row.iter().map(|v| format!("{v:.10}")).collect();
                    f.write_str(&cells.join(" "))?;
                }
                Ok(())
            }
        }
    }
}

/// Intrinsic calibration of one camera.
#[derive(Clone, Debug, PartialEq)]
pub struct CalibrationResult {
    /// RMS reprojection error in pixels.
    pub rms: f64,
    pub camera_matrix: Matrix3<f64>,
    pub distortion: Vec<f64>,
    pub rvecs: Vec<Vector3<f64>>,
    pub tvecs: Vec<Vector3<f64>>,
    pub image_size: Option<ImageSize>,
    /// Additional named values carried through save/load untouched.
    pub extras: BTreeMap<String, ResultValue>,
}

impl CalibrationResult {
    pub fn from_solution(solution: CameraSolution, image_size: ImageSize) -> Self {
        Self {
            rms: solution.rms,
            camera_matrix: solution.camera_matrix,
            distortion: solution.distortion,
            rvecs: solution.rvecs,
            tvecs: solution.tvecs,
            image_size: Some(image_size),
            extras: BTreeMap::new(),
        }
    }

    /// Ordered `(key, value)` pairs: the fixed keys first, then the extras.
    pub fn to_entries(&self) -> Vec<(String, ResultValue)> {
        let mut out = vec![
            (KEY_RMS.to_string(), ResultValue::Scalar(self.rms)),
            (
                KEY_MATRIX.to_string(),
                ResultValue::Matrix(DMatrix::from_iterator(
                    3,
                    3,
                    self.camera_matrix.iter().copied(),
                )),
            ),
            (
                KEY_DISTORTION.to_string(),
                ResultValue::Matrix(DMatrix::from_row_slice(
                    1,
                    self.distortion.len(),
                    &self.distortion,
                )),
            ),
            (KEY_RVECS.to_string(), ResultValue::Matrix(stack_rows(&self.rvecs))),
            (KEY_TVECS.to_string(), ResultValue::Matrix(stack_rows(&self.tvecs))),
        ];
        if let Some(size) = self.image_size {
            out.push((
                KEY_IMAGE_SIZE.to_string(),
                ResultValue::Matrix(DMatrix::from_row_slice(
                    1,
                    2,
                    &[f64::from(size.width), f64::from(size.height)],
                )),
            ));
        }
        out.extend(self.extras.iter().map(|(k, v)| (k.clone(), v.clone())));
        out
    }

    /// Rebuild a result from persisted entries. Keys are matched
    /// case-insensitively; unknown keys land in `extras`.
    pub fn from_entries(
        entries: impl IntoIterator<Item = (String, ResultValue)>,
    ) -> Result<Self, PersistError> {
        let mut map: BTreeMap<String, ResultValue> = entries
            .into_iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v))
            .collect();

        let rms = map
            .remove(KEY_RMS)
            .ok_or(PersistError::MissingKey { key: KEY_RMS })?;
        let rms = rms.as_scalar().ok_or_else(|| invalid(KEY_RMS, "expected a scalar"))?;

        let matrix = map
            .remove(KEY_MATRIX)
            .ok_or(PersistError::MissingKey { key: KEY_MATRIX })?;
        let matrix = matrix
            .as_matrix()
            .filter(|m| m.shape() == (3, 3))
            .ok_or_else(|| invalid(KEY_MATRIX, "expected a 3x3 matrix"))?;
        let camera_matrix = Matrix3::from_iterator(matrix.iter().copied());

        let distortion = map
            .remove(KEY_DISTORTION)
            .ok_or(PersistError::MissingKey {
                key: KEY_DISTORTION,
            })?;
        let distortion = match distortion {
            ResultValue::Matrix(m) if m.nrows() <= 1 || m.ncols() <= 1 => {
                m.transpose().iter().copied().collect()
            }
            ResultValue::Scalar(v) => vec![v],
            _ => return Err(invalid(KEY_DISTORTION, "expected a vector")),
        };

        let rvecs = take_vectors(&mut map, KEY_RVECS)?;
        let tvecs = take_vectors(&mut map, KEY_TVECS)?;
        if rvecs.len() != tvecs.len() {
            return Err(invalid(
                KEY_TVECS,
                &format!("{} rvecs but {} tvecs", rvecs.len(), tvecs.len()),
            ));
        }

        let image_size = match map.remove(KEY_IMAGE_SIZE) {
            None => None,
            Some(ResultValue::Matrix(m)) if m.len() == 2 => {
                Some(ImageSize::new(to_dim(m[0])?, to_dim(m[1])?))
            }
            Some(_) => return Err(invalid(KEY_IMAGE_SIZE, "expected (width, height)")),
        };

        Ok(Self {
            rms,
            camera_matrix,
            distortion,
            rvecs,
            tvecs,
            image_size,
            extras: map,
        })
    }
}

fn stack_rows(vectors: &[Vector3<f64>]) -> DMatrix<f64> {
    DMatrix::from_fn(vectors.len(), 3, |r, c| vectors[r][c])
}

fn take_vectors(
    map: &mut BTreeMap<String, ResultValue>,
    key: &'static str,
) -> Result<Vec<Vector3<f64>>, PersistError> {
    match map.remove(key) {
        None => Ok(Vec::new()),
        Some(ResultValue::Matrix(m)) if m.is_empty() => Ok(Vec::new()),
        Some(ResultValue::Matrix(m)) if m.ncols() == 3 => Ok(m
            .row_iter()
            .map(|row| Vector3::new(row[0], row[1], row[2]))
            .collect()),
        Some(_) => Err(invalid(key, "expected an N x 3 matrix")),
    }
}

fn to_dim(v: f64) -> Result<u32, PersistError> {
    if v.fract() != 0.0 || v < 0.0 || v > f64::from(u32::MAX) {
        return Err(invalid(KEY_IMAGE_SIZE, &format!("{v} is not a pixel count")));
    }
    Ok(v as u32)
}

fn invalid(key: &str, reason: &str) -> PersistError {
    PersistError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
