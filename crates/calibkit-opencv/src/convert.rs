//! Conversions between `image`/`nalgebra` values and OpenCV containers.

use calibkit_core::{ImageSize, MarkerDictionary};
use image::GrayImage;
use nalgebra::{Isometry3, Matrix3, Point2, Point3, Translation3, UnitQuaternion, Vector3};
use opencv::{
    core::{self, Mat, Point2f, Point3f, Size, Vector},
    objdetect::{self, PredefinedDictionaryType},
    prelude::*,
};

pub(crate) fn gray_to_mat(image: &GrayImage) -> opencv::Result<Mat> {
    Mat::from_slice_rows_cols(
        image.as_raw(),
        image.height() as usize,
        image.width() as usize,
    )
}

/// Copy an 8-bit single channel `Mat` into a `GrayImage`.
pub(crate) fn mat_to_gray(mat: &Mat) -> opencv::Result<GrayImage> {
    let size = mat.size()?;
    let bytes = if mat.is_continuous() {
        mat.data_bytes()?.to_vec()
    } else {
        mat.try_clone()?.data_bytes()?.to_vec()
    };
    GrayImage::from_raw(size.width as u32, size.height as u32, bytes).ok_or_else(|| {
        opencv::Error::new(
            core::StsUnmatchedSizes,
            format!("{}x{} mat does not hold 8-bit gray pixels", size.width, size.height),
        )
    })
}

pub(crate) fn cv_size(width: u32, height: u32) -> Size {
    Size::new(width as i32, height as i32)
}

pub(crate) fn image_size(size: ImageSize) -> Size {
    cv_size(size.width, size.height)
}

pub(crate) fn points2(points: &[Point2<f64>]) -> Vector<Point2f> {
    points
        .iter()
        .map(|p| Point2f::new(p.x as f32, p.y as f32))
        .collect()
}

pub(crate) fn points3(points: &[Point3<f64>]) -> Vector<Point3f> {
    points
        .iter()
        .map(|p| Point3f::new(p.x as f32, p.y as f32, p.z as f32))
        .collect()
}

pub(crate) fn from_points2(points: &Vector<Point2f>) -> Vec<Point2<f64>> {
    points
        .iter()
        .map(|p| Point2::new(f64::from(p.x), f64::from(p.y)))
        .collect()
}

pub(crate) fn from_points3(points: &Vector<Point3f>) -> Vec<Point3<f64>> {
    points
        .iter()
        .map(|p| Point3::new(f64::from(p.x), f64::from(p.y), f64::from(p.z)))
        .collect()
}

/// Row-major 3x3 `CV_64F` matrix.
pub(crate) fn mat3(m: &Matrix3<f64>) -> opencv::Result<Mat> {
    let rows: Vec<f64> = m.transpose().iter().copied().collect();
    Mat::from_slice_rows_cols(&rows, 3, 3)
}

pub(crate) fn column(values: &[f64]) -> opencv::Result<Mat> {
    Mat::from_slice_rows_cols(values, values.len(), 1)
}

pub(crate) fn to_matrix3(mat: &Mat) -> opencv::Result<Matrix3<f64>> {
    let data = mat.data_typed::<f64>()?;
    if data.len() != 9 {
        return Err(opencv::Error::new(
            core::StsUnmatchedSizes,
            format!("expected 9 values, got {}", data.len()),
        ));
    }
    Ok(Matrix3::from_row_slice(data))
}

pub(crate) fn to_vector3(mat: &Mat) -> opencv::Result<Vector3<f64>> {
    let data = mat.data_typed::<f64>()?;
    if data.len() != 3 {
        return Err(opencv::Error::new(
            core::StsUnmatchedSizes,
            format!("expected 3 values, got {}", data.len()),
        ));
    }
    Ok(Vector3::new(data[0], data[1], data[2]))
}

/// Rodrigues vector and translation to a rigid transform.
pub(crate) fn isometry(rvec: &Mat, tvec: &Mat) -> opencv::Result<Isometry3<f64>> {
    let r = to_vector3(rvec)?;
    let t = to_vector3(tvec)?;
    Ok(Isometry3::from_parts(
        Translation3::from(t),
        UnitQuaternion::from_scaled_axis(r),
    ))
}

/// Rotation matrix and translation column of a rigid transform.
pub(crate) fn rotation_translation(iso: &Isometry3<f64>) -> opencv::Result<(Mat, Mat)> {
    let r = iso.rotation.to_rotation_matrix();
    let t = iso.translation.vector;
    Ok((mat3(r.matrix())?, column(&[t.x, t.y, t.z])?))
}

pub(crate) fn dictionary(dict: MarkerDictionary) -> opencv::Result<objdetect::Dictionary> {
    let kind = match dict {
        MarkerDictionary::Dict4x4_50 => PredefinedDictionaryType::DICT_4X4_50,
        MarkerDictionary::Dict5x5_100 => PredefinedDictionaryType::DICT_5X5_100,
        MarkerDictionary::Dict5x5_250 => PredefinedDictionaryType::DICT_5X5_250,
        MarkerDictionary::Dict6x6_1000 => PredefinedDictionaryType::DICT_6X6_1000,
        MarkerDictionary::Dict7x7_1000 => PredefinedDictionaryType::DICT_7X7_1000,
    };
    objdetect::get_predefined_dictionary(kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn gray_image_roundtrip() {
        let img = GrayImage::from_fn(5, 3, |x, y| image::Luma([(x * 10 + y) as u8]));
        let mat = gray_to_mat(&img).unwrap();
        assert_eq!(mat.rows(), 3);
        assert_eq!(mat.cols(), 5);
        assert_eq!(mat_to_gray(&mat).unwrap(), img);
    }

    #[test]
    fn matrices_are_row_major() {
        let m = Matrix3::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0);
        let mat = mat3(&m).unwrap();
        assert_eq!(*mat.at_2d::<f64>(0, 2).unwrap(), 3.0);
        assert_eq!(*mat.at_2d::<f64>(2, 0).unwrap(), 7.0);
        assert_eq!(to_matrix3(&mat).unwrap(), m);
    }

    #[test]
    fn isometry_roundtrip() {
        let iso = Isometry3::from_parts(
            Translation3::new(0.1, -0.2, 0.5),
            UnitQuaternion::from_euler_angles(0.3, 0.1, -0.7),
        );
        let (r, t) = rotation_translation(&iso).unwrap();
        let mut rvec = Mat::default();
        opencv::calib3d::rodrigues(&r, &mut rvec, &mut core::no_array()).unwrap();
        assert_relative_eq!(isometry(&rvec, &t).unwrap(), iso, epsilon = 1e-9);
    }
}
