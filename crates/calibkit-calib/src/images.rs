//! Calibration image folders and the resolution check shared by all stages.

use crate::{ConfigError, InputSetError};
use calibkit_core::{load_gray, ImageSize};
use glob::Pattern;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Filename pattern used when none is given.
pub const DEFAULT_PATTERN: &str = "*";

/// A validated image folder plus the filename pattern selecting the images.
///
/// The pattern is matched against file names directly inside the folder
/// (`*.png`, `left_??.jpg`, ...); subdirectories are not searched.
#[derive(Clone, Debug)]
pub struct ImageSource {
    folder: PathBuf,
    pattern: Pattern,
}

impl ImageSource {
    /// Validate `folder` and select every entry in it.
    pub fn new(folder: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let folder = folder.into();
        if !folder.exists() {
            return Err(ConfigError::MissingFolder { path: folder });
        }
        if !folder.is_dir() {
            return Err(ConfigError::NotADirectory { path: folder });
        }
        Ok(Self {
            folder,
            pattern: Pattern::new(DEFAULT_PATTERN).map_err(|source| {
                ConfigError::InvalidPattern {
                    pattern: DEFAULT_PATTERN.to_string(),
                    source,
                }
            })?,
        })
    }

    /// Same folder, different filename pattern.
    pub fn with_pattern(&self, pattern: &str) -> Result<Self, ConfigError> {
        let pattern = Pattern::new(pattern).map_err(|source| ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            folder: self.folder.clone(),
            pattern,
        })
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Folder entries whose file name matches the pattern, sorted by name.
    ///
    /// Directories and other non-files are included; callers decide what to
    /// do with them.
    pub fn matching_paths(&self) -> Result<Vec<PathBuf>, InputSetError> {
        let unreadable = |source| InputSetError::Unreadable {
            folder: self.folder.clone(),
            source,
        };
        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.folder).map_err(unreadable)? {
            let entry = entry.map_err(unreadable)?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                log::warn!("skipped non UTF-8 file name: {}", entry.path().display());
                continue;
            };
            if self.pattern.matches(name) {
                paths.push(entry.path());
            }
        }
        paths.sort();
        Ok(paths)
    }

    /// Check that every readable matched image has the same resolution.
    ///
    /// Non-files and files that do not decode are skipped with a warning. Returns the common resolution and the readable images in name
    /// order.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self), fields(folder = %self.folder.display(), pattern = self.pattern()))
    )]
    pub fn check_images_size(&self) -> Result<(ImageSize, Vec<PathBuf>), InputSetError> {
        let paths = self.matching_paths()?;
        if paths.is_empty() {
            return Err(InputSetError::NoImages {
                folder: self.folder.clone(),
                pattern: self.pattern().to_string(),
            });
        }

        let sizes: Vec<Option<ImageSize>> = paths.par_iter().map(|p| decoded_size(p)).collect();

        let readable: Vec<(PathBuf, ImageSize)> = paths
            .into_iter()
            .zip(sizes)
            .filter_map(|(path, size)| size.map(|s| (path, s)))
            .collect();
        let Some(&(_, expected)) = readable.first() else {
            return Err(InputSetError::NoValidImages {
                folder: self.folder.clone(),
            });
        };
        if let Some((index, (_, found))) = readable
            .iter()
            .enumerate()
            .find(|(_, (_, size))| *size != expected)
        {
            return Err(InputSetError::ResolutionMismatch {
                index,
                found: *found,
                expected,
            });
        }

        log::info!(
            "{} image(s) at {} in {}",
            readable.len(),
            expected,
            self.folder.display()
        );
        Ok((expected, readable.into_iter().map(|(p, _)| p).collect()))
    }
}

fn decoded_size(path: &Path) -> Option<ImageSize> {
    if !path.is_file() {
        log::warn!("skipped non-file path: {}", path.display());
        return None;
    }
    match load_gray(path) {
        Ok(img) => Some(ImageSize::of(&img)),
        Err(err) => {
            log::warn!("failed to load image {}: {err}", path.display());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GrayImage;

    fn write_png(dir: &Path, name: &str, w: u32, h: u32) {
        GrayImage::new(w, h).save(dir.join(name)).unwrap();
    }

    #[test]
    fn folder_must_exist_and_be_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ImageSource::new(dir.path().join("missing")),
            Err(ConfigError::MissingFolder { .. })
        ));
        let file = dir.path().join("file.txt");
        fs::write(&file, b"x").unwrap();
        assert!(matches!(
            ImageSource::new(&file),
            Err(ConfigError::NotADirectory { .. })
        ));
        assert!(matches!(
            ImageSource::new(dir.path()).unwrap().with_pattern("[*.png"),
            Err(ConfigError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn uniform_folder_returns_sorted_paths() {
        let dir = tempfile::tempdir().unwrap();
        for i in (0..3).rev() {
            write_png(dir.path(), &format!("img_{i}.png"), 64, 48);
        }
        let source = ImageSource::new(dir.path()).unwrap();
        let (size, paths) = source.check_images_size().unwrap();
        assert_eq!(size, ImageSize::new(64, 48));
        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["img_0.png", "img_1.png", "img_2.png"]);
    }

    #[test]
    fn junk_entries_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "a.png", 32, 24);
        fs::create_dir(dir.path().join("b_subdir")).unwrap();
        fs::write(dir.path().join("c_notes.txt"), b"not an image").unwrap();
        let (size, paths) = ImageSource::new(dir.path())
            .unwrap()
            .check_images_size()
            .unwrap();
        assert_eq!(size, ImageSize::new(32, 24));
        assert_eq!(paths, vec![dir.path().join("a.png")]);
    }

    #[test]
    fn truncated_images_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "a.png", 64, 48);
        write_png(dir.path(), "b.png", 64, 48);
        // Signature and IHDR survive, pixel data does not.
        let bytes = fs::read(dir.path().join("a.png")).unwrap();
        fs::write(dir.path().join("c.png"), &bytes[..40]).unwrap();

        let (size, paths) = ImageSource::new(dir.path())
            .unwrap()
            .check_images_size()
            .unwrap();
        assert_eq!(size, ImageSize::new(64, 48));
        assert_eq!(paths, vec![dir.path().join("a.png"), dir.path().join("b.png")]);
    }

    #[test]
    fn unmatched_and_unreadable_sets_fail() {
        let dir = tempfile::tempdir().unwrap();
        let source = ImageSource::new(dir.path()).unwrap();
        assert!(matches!(
            source.check_images_size(),
            Err(InputSetError::NoImages { .. })
        ));

        fs::write(dir.path().join("broken.png"), b"garbage").unwrap();
        assert!(matches!(
            source.with_pattern("*.jpg").unwrap().check_images_size(),
            Err(InputSetError::NoImages { .. })
        ));
        assert!(matches!(
            source.check_images_size(),
            Err(InputSetError::NoValidImages { .. })
        ));
    }

    #[test]
    fn mismatched_resolution_names_the_index() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "0.png", 64, 48);
        write_png(dir.path(), "1.png", 64, 48);
        write_png(dir.path(), "2.png", 80, 60);
        let err = ImageSource::new(dir.path())
            .unwrap()
            .check_images_size()
            .unwrap_err();
        match err {
            InputSetError::ResolutionMismatch {
                index,
                found,
                expected,
            } => {
                assert_eq!(index, 2);
                assert_eq!(found, ImageSize::new(80, 60));
                assert_eq!(expected, ImageSize::new(64, 48));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
