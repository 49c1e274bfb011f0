//! JSON configuration for calibration runs.

use crate::{
    load_gripper_poses, CalibError, Calibrator, GripperPose, HandEyeMethod, ImageSource,
    PersistError, TargetFamily, DEFAULT_PATTERN,
};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

fn default_pattern() -> String {
    DEFAULT_PATTERN.to_string()
}

/// Hand-eye part of a calibration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandEyeConfig {
    /// Robot pose file, one entry per image in name order.
    pub poses_path: String,
    /// Images for the hand-eye step; defaults to the intrinsics folder.
    #[serde(default)]
    pub image_folder: Option<String>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub method: HandEyeMethod,
    #[serde(default)]
    pub output_path: Option<String>,
}

/// Configuration for an intrinsic (and optional hand-eye) calibration.
///
/// ```json
/// {
///   "image_folder": "data/intrinsics",
///   "pattern": "*.png",
///   "target": { "type": "chessboard", "pattern_size": { "cols": 9, "rows": 6 }, "square_size": 25.0 },
///   "output_path": "out/camera.json"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    pub image_folder: String,
    #[serde(default = "default_pattern")]
    pub pattern: String,
    pub target: TargetFamily,
    #[serde(default)]
    pub output_path: Option<String>,
    #[serde(default)]
    pub hand_eye: Option<HandEyeConfig>,
}

impl CalibrationConfig {
    pub fn new(image_folder: impl Into<String>, target: TargetFamily) -> Self {
        Self {
            image_folder: image_folder.into(),
            pattern: default_pattern(),
            target,
            output_path: None,
            hand_eye: None,
        }
    }

    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Resolve the result path.
    pub fn output_path(&self) -> PathBuf {
        self.output_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("calibration_result.json"))
    }

    /// Validate folder, pattern and target and build the calibrator.
    pub fn build_calibrator(&self) -> Result<Calibrator, CalibError> {
        let source = ImageSource::new(&self.image_folder)?.with_pattern(&self.pattern)?;
        Ok(Calibrator::new(source, self.target)?)
    }

    /// Image source and poses for the hand-eye step, if configured.
    pub fn hand_eye_inputs(&self) -> Result<Option<(ImageSource, Vec<GripperPose>)>, CalibError> {
        let Some(cfg) = &self.hand_eye else {
            return Ok(None);
        };
        let folder = cfg.image_folder.as_deref().unwrap_or(&self.image_folder);
        let pattern = cfg.pattern.as_deref().unwrap_or(&self.pattern);
        let source = ImageSource::new(folder)?.with_pattern(pattern)?;
        let poses = load_gripper_poses(&cfg.poses_path)?;
        Ok(Some((source, poses)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConfigError, PatternSize};

    fn chessboard() -> TargetFamily {
        TargetFamily::Chessboard {
            pattern_size: PatternSize { cols: 9, rows: 6 },
            square_size: 25.0,
        }
    }

    #[test]
    fn config_defaults_and_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let json = format!(
            r#"{{"image_folder": {:?}, "target": {{"type": "chessboard", "pattern_size": {{"cols": 9, "rows": 6}}, "square_size": 25.0}},
               "hand_eye": {{"poses_path": "poses.json"}}}}"#,
            dir.path().display().to_string()
        );
        let path = dir.path().join("calib.json");
        fs::write(&path, json).unwrap();

        let cfg = CalibrationConfig::load_json(&path).unwrap();
        assert_eq!(cfg.pattern, "*");
        assert_eq!(cfg.target, chessboard());
        assert_eq!(cfg.output_path(), PathBuf::from("calibration_result.json"));
        assert_eq!(cfg.hand_eye.as_ref().unwrap().method, HandEyeMethod::Tsai);

        cfg.write_json(&path).unwrap();
        assert_eq!(CalibrationConfig::load_json(&path).unwrap(), cfg);

        let calibrator = cfg.build_calibrator().unwrap();
        assert_eq!(calibrator.source().folder(), dir.path());
    }

    #[test]
    fn invalid_target_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = CalibrationConfig::new(dir.path().display().to_string(), chessboard());
        cfg.target = TargetFamily::Chessboard {
            pattern_size: PatternSize { cols: 1, rows: 6 },
            square_size: 25.0,
        };
        assert!(matches!(
            cfg.build_calibrator(),
            Err(CalibError::Config(ConfigError::InvalidPatternSize { .. }))
        ));

        cfg.image_folder = dir.path().join("nope").display().to_string();
        assert!(matches!(
            cfg.build_calibrator(),
            Err(CalibError::Config(ConfigError::MissingFolder { .. }))
        ));
    }
}
