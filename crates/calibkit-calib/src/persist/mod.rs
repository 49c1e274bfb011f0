//! Saving and loading calibration results. The format follows the file
//! extension: `.npz`, `.json` or `.txt`.

mod json;
mod npy;
mod text;

use crate::{CalibError, CalibrationResult, ConfigError};
use std::fs;
use std::path::Path;

pub use npy::{read_npy, write_npy};

/// On-disk result formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PersistFormat {
    /// Zip archive of NPY members, one per key (NumPy `savez_compressed`).
    Npz,
    /// Pretty-printed object; matrices as nested row lists.
    Json,
    /// `KEY:` sections with space separated rows.
    Text,
}

impl PersistFormat {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("npz") => Ok(Self::Npz),
            Some("json") => Ok(Self::Json),
            Some("txt") => Ok(Self::Text),
            _ => Err(ConfigError::UnsupportedExtension {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// Write `result` to `path`, creating parent directories as needed.
pub fn save_result(result: &CalibrationResult, path: &Path) -> Result<(), CalibError> {
    let format = PersistFormat::from_path(path)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(crate::PersistError::from)?;
    }
    let entries = result.to_entries();
    match format {
        PersistFormat::Npz => npy::write_npz(&entries, path)?,
        PersistFormat::Json => json::write_json(&entries, path)?,
        PersistFormat::Text => text::write_text(&entries, path)?,
    }
    log::info!("saved calibration result to {}", path.display());
    Ok(())
}

/// Read a result written by [`save_result`] (or by NumPy for `.npz`).
pub fn load_result(path: &Path) -> Result<CalibrationResult, CalibError> {
    let entries = match PersistFormat::from_path(path)? {
        PersistFormat::Npz => npy::read_npz(path)?,
        PersistFormat::Json => json::read_json(path)?,
        PersistFormat::Text => text::read_text(path)?,
    };
    let result = CalibrationResult::from_entries(entries)?;
    log::info!(
        "loaded calibration result from {} (rms {:.4})",
        path.display(),
        result.rms
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn format_follows_extension() {
        assert_eq!(
            PersistFormat::from_path(Path::new("out/result.NPZ")).unwrap(),
            PersistFormat::Npz
        );
        assert_eq!(
            PersistFormat::from_path(Path::new("r.json")).unwrap(),
            PersistFormat::Json
        );
        assert_eq!(
            PersistFormat::from_path(Path::new("r.txt")).unwrap(),
            PersistFormat::Text
        );
        for bad in ["r.xml", "r", "r.npy"] {
            assert!(matches!(
                PersistFormat::from_path(&PathBuf::from(bad)),
                Err(ConfigError::UnsupportedExtension { .. })
            ));
        }
    }
}
