//! Core types shared by the `calibkit` crates.
//!
//! This crate is intentionally small. It owns the two read-only tables the
//! rest of the workspace validates against (paper formats and marker
//! dictionaries), the marker board layout shared by renderers and detectors,
//! a couple of grayscale image helpers and the logger.

mod dictionary;
mod image;
mod logger;
mod marker;
mod paper;

pub use crate::image::{
    distinct_levels, load_gray, resize_nearest, white_image, ImageSize, BLACK,
    WHITE,
};
pub use dictionary::{MarkerDictionary, UnknownDictionary};
pub use marker::{MarkerBoardKind, MarkerBoardLayout};
pub use paper::{px_per_mm, PaperFormat, UnknownPaperFormat, MM_PER_INCH, POINTS_PER_INCH};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_with_level, level_from_verbosity};
