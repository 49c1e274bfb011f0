//! Fixed table of supported paper formats.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Millimetres per inch.
pub const MM_PER_INCH: f64 = 25.4;

/// PostScript points per inch.
pub const POINTS_PER_INCH: f64 = 72.0;

/// Paper format a printable target is laid out on.
///
/// Sizes are portrait `(width, height)` in millimetres.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaperFormat {
    A3,
    A4,
    A5,
    Letter,
    Legal,
}

/// Returned when a paper format name is not part of the table.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown paper format `{name}`, expected one of: A4, A3, A5, Letter, Legal")]
pub struct UnknownPaperFormat {
    pub name: String,
}

impl PaperFormat {
    pub const ALL: [PaperFormat; 5] = [
        PaperFormat::A4,
        PaperFormat::A3,
        PaperFormat::A5,
        PaperFormat::Letter,
        PaperFormat::Legal,
    ];

    /// Canonical table name.
    pub fn name(self) -> &'static str {
        match self {
            PaperFormat::A3 => "A3",
            PaperFormat::A4 => "A4",
            PaperFormat::A5 => "A5",
            PaperFormat::Letter => "Letter",
            PaperFormat::Legal => "Legal",
        }
    }

    /// Physical size `(width, height)` in millimetres.
    pub fn size_mm(self) -> (f64, f64) {
        match self {
            PaperFormat::A3 => (297.0, 420.0),
            PaperFormat::A4 => (210.0, 297.0),
            PaperFormat::A5 => (148.0, 210.0),
            PaperFormat::Letter => (216.0, 279.0),
            PaperFormat::Legal => (216.0, 356.0),
        }
    }

    /// Physical size in PostScript points (1/72 inch).
    pub fn size_points(self) -> (f64, f64) {
        let (w, h) = self.size_mm();
        let k = POINTS_PER_INCH / MM_PER_INCH;
        (w * k, h * k)
    }

    /// Page size in whole pixels at `dpi`; fractional pixels are truncated.
    pub fn size_px(self, dpi: u32) -> (u32, u32) {
        let px_per_mm = px_per_mm(dpi);
        let (w, h) = self.size_mm();
        ((w * px_per_mm) as u32, (h * px_per_mm) as u32)
    }

    /// Look a format up by name, ignoring ASCII case.
    pub fn from_name(name: &str) -> Result<Self, UnknownPaperFormat> {
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| UnknownPaperFormat {
                name: name.to_string(),
            })
    }
}

/// Pixel density for a DPI value.
#[inline]
pub fn px_per_mm(dpi: u32) -> f64 {
    f64::from(dpi) / MM_PER_INCH
}

impl fmt::Display for PaperFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PaperFormat {
    type Err = UnknownPaperFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}
