use approx::assert_relative_eq;
use calibkit_calib::{
    load_result, persist::read_npy, save_result, CalibError, CalibrationResult, ConfigError, PersistError,
    ResultValue,
};
use calibkit_core::ImageSize;
use nalgebra::{DMatrix, Matrix3, Vector3};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Read;

fn sample() -> CalibrationResult {
    CalibrationResult {
        rms: 0.318_273_645_5,
        camera_matrix: Matrix3::new(
            1204.123_456_789,
            0.0,
            639.5,
            0.0,
            1203.987_654_321,
            359.75,
            0.0,
            0.0,
            1.0,
        ),
        distortion: vec![-0.213_4, 0.087_65, 0.000_12, -0.000_34, -0.015_6],
        rvecs: vec![
            Vector3::new(0.11, -0.52, 1.57),
            Vector3::new(-0.2, 0.33, 0.01),
            Vector3::new(0.0, 0.0, -3.1),
        ],
        tvecs: vec![
            Vector3::new(-101.5, 20.25, 612.0),
            Vector3::new(33.0, -7.125, 580.5),
            Vector3::new(0.5, 0.25, 700.0),
        ],
        image_size: Some(ImageSize::new(1280, 720)),
        extras: BTreeMap::from([
            (
                "new_matrix".to_string(),
                ResultValue::Matrix(DMatrix::from_row_slice(
                    3,
                    3,
                    &[1100.0, 0.0, 640.0, 0.0, 1100.0, 360.0, 0.0, 0.0, 1.0],
                )),
            ),
            ("target".to_string(), ResultValue::Text("chessboard".to_string())),
        ]),
    }
}

fn assert_close(a: &CalibrationResult, b: &CalibrationResult, eps: f64) {
    assert_relative_eq!(a.rms, b.rms, epsilon = eps);
    assert_relative_eq!(a.camera_matrix, b.camera_matrix, epsilon = eps);
    assert_eq!(a.distortion.len(), b.distortion.len());
    for (x, y) in a.distortion.iter().zip(&b.distortion) {
        assert_relative_eq!(*x, *y, epsilon = eps);
    }
    assert_eq!(a.rvecs.len(), b.rvecs.len());
    for (x, y) in a.rvecs.iter().zip(&b.rvecs).chain(a.tvecs.iter().zip(&b.tvecs)) {
        assert_relative_eq!(*x, *y, epsilon = eps);
    }
    assert_eq!(a.image_size, b.image_size);
    assert_eq!(
        a.extras.keys().collect::<Vec<_>>(),
        b.extras.keys().collect::<Vec<_>>()
    );
}

#[test]
fn npz_roundtrip_is_exact() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("camera.npz");
    let result = sample();
    save_result(&result, &path).unwrap();
    assert_eq!(load_result(&path).unwrap(), result);
}

#[test]
fn npz_members_are_plain_npy_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("camera.npz");
    save_result(&sample(), &path).unwrap();

    let mut archive = zip::ZipArchive::new(File::open(&path).unwrap()).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    assert_eq!(
        names,
        [
            "distortion.npy",
            "image_size.npy",
            "matrix.npy",
            "new_matrix.npy",
            "ret.npy",
            "rvecs.npy",
            "target.npy",
            "tvecs.npy"
        ]
    );

    let mut bytes = Vec::new();
    archive
        .by_name("matrix.npy")
        .unwrap()
        .read_to_end(&mut bytes)
        .unwrap();
    assert!(bytes.starts_with(b"\x93NUMPY\x01\x00"));
    let matrix = read_npy(&bytes, "matrix.npy").unwrap();
    assert_eq!(matrix.as_matrix().unwrap()[(0, 2)], 639.5);
}

#[test]
fn json_roundtrip_within_tolerance() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("camera.json");
    let result = sample();
    save_result(&result, &path).unwrap();

    let raw = fs::read_to_string(&path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["matrix"][1][2], serde_json::json!(359.75));
    assert_eq!(value["rvecs"].as_array().unwrap().len(), 3);

    let back = load_result(&path).unwrap();
    assert_close(&back, &result, 1e-12);
    assert_eq!(back.extras["target"], ResultValue::Text("chessboard".to_string()));
}

#[test]
fn text_roundtrip_within_tolerance() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("camera.txt");
    let result = sample();
    save_result(&result, &path).unwrap();

    let raw = fs::read_to_string(&path).unwrap();
    assert!(raw.starts_with("RET:\n0.3182736455\n\nMATRIX:\n1204.1234567890 0.0000000000 639.5000000000\n"));
    assert!(raw.contains("\nTARGET:\n\"chessboard\"\n"));

    let back = load_result(&path).unwrap();
    assert_close(&back, &result, 1e-9);
    assert_eq!(back.extras["target"], ResultValue::Text("chessboard".to_string()));
}

#[test]
fn text_matrices_are_quantised_to_ten_decimals() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tiny.txt");
    let mut result = sample();
    result.distortion = vec![1.234_567e-7, -9.87e-12, 0.0, 0.0, 0.0];
    save_result(&result, &path).unwrap();

    let back = load_result(&path).unwrap();
    for (x, y) in back.distortion.iter().zip(&result.distortion) {
        assert!((x - y).abs() <= 5e-11, "{x} vs {y}");
    }
    assert_eq!(back.distortion[0], 1.235e-7);
    assert_eq!(back.distortion[1], 0.0);
}

#[test]
fn text_extras_keep_their_type() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("extras.txt");
    let mut result = sample();
    result.extras = BTreeMap::from([
        ("serial".to_string(), ResultValue::Text("42".to_string())),
        ("empty".to_string(), ResultValue::Text(String::new())),
        (
            "note".to_string(),
            ResultValue::Text("line1\n\nline2: \"quoted\"".to_string()),
        ),
        ("lens".to_string(), ResultValue::Text("  8 mm  ".to_string())),
    ]);
    save_result(&result, &path).unwrap();

    let back = load_result(&path).unwrap();
    assert_eq!(back.extras, result.extras);
}

#[test]
fn json_written_by_hand_is_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.json");
    fs::write(
        &path,
        r#"{
            "RET": 0.5,
            "Matrix": [[500, 0, 320], [0, 500, 240], [0, 0, 1]],
            "distortion": [[0.1], [0.01], [0.0], [0.0], [0.0]]
        }"#,
    )
    .unwrap();
    let result = load_result(&path).unwrap();
    assert_eq!(result.rms, 0.5);
    assert_eq!(result.camera_matrix[(1, 2)], 240.0);
    assert_eq!(result.distortion, vec![0.1, 0.01, 0.0, 0.0, 0.0]);
    assert!(result.rvecs.is_empty());
    assert_eq!(result.image_size, None);
}

#[test]
fn unsupported_extension_and_missing_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("camera.yaml");
    assert!(matches!(
        save_result(&sample(), &path),
        Err(CalibError::Config(ConfigError::UnsupportedExtension { .. }))
    ));
    assert!(!path.exists());

    let path = dir.path().join("partial.json");
    fs::write(&path, r#"{"ret": 0.5}"#).unwrap();
    assert!(matches!(
        load_result(&path),
        Err(CalibError::Persist(PersistError::MissingKey { key: "matrix" }))
    ));
}
