//! JSON configuration for board generation.

use crate::{BoardIoError, CalibrationBoard};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Board plus where to write it.
///
/// ```json
/// {
///   "board": {
///     "spec": { "squares_x": 8, "squares_y": 6, "square_length_mm": 25.0,
///               "dpi": 300, "paper": "A4" },
///     "kind": { "type": "charuco", "dictionary": "4x4_50", "marker_length_mm": 18.0 }
///   },
///   "output_path": "charuco_a4.pdf"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardConfig {
    pub board: CalibrationBoard,
    #[serde(default)]
    pub output_path: Option<String>,
}

impl BoardConfig {
    pub fn new(board: CalibrationBoard) -> Self {
        Self {
            board,
            output_path: None,
        }
    }

    /// Load a JSON config from disk. Board parameters are validated on load.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, BoardIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), BoardIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Resolve the output path, defaulting to `<kind>_<paper>.pdf`.
    pub fn output_path(&self) -> PathBuf {
        self.output_path.as_ref().map(PathBuf::from).unwrap_or_else(|| {
            PathBuf::from(format!(
                "{}_{}.pdf",
                self.board.kind().name(),
                self.board.spec().paper().name().to_ascii_lowercase()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BoardKind, BoardSpec};
    use calibkit_core::{MarkerDictionary, PaperFormat};

    #[test]
    fn config_roundtrips_through_disk() {
        let spec = BoardSpec::new(8, 6, 25.0, 300, PaperFormat::A4).unwrap();
        let board = CalibrationBoard::charuco(spec, "4x4_50", 18.0).unwrap();
        let cfg = BoardConfig::new(board);
        assert_eq!(cfg.output_path(), PathBuf::from("charuco_a4.pdf"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.json");
        cfg.write_json(&path).unwrap();
        let back = BoardConfig::load_json(&path).unwrap();
        assert_eq!(back, cfg);
        assert_eq!(
            *back.board.kind(),
            BoardKind::Charuco {
                dictionary: MarkerDictionary::Dict4x4_50,
                marker_length_mm: 18.0
            }
        );
    }

    #[test]
    fn invalid_board_fails_to_load() {
        let json = r#"{
            "board": {
                "spec": {"squares_x": 5, "squares_y": 5, "square_length_mm": 20.0, "dpi": 300, "paper": "A4"},
                "kind": {"type": "aruco_grid", "dictionary": "5x5_250", "marker_length_ratio": 1.5}
            }
        }"#;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, json).unwrap();
        assert!(matches!(
            BoardConfig::load_json(&path),
            Err(BoardIoError::Json(_))
        ));
    }
}
