//! Table of supported marker dictionaries.
//!
//! Only metadata lives here. The marker codes themselves belong to the vision
//! backend that renders and decodes markers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A fixed ArUco dictionary identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarkerDictionary {
    #[serde(rename = "4x4_50", alias = "DICT_4X4_50")]
    Dict4x4_50,
    #[serde(rename = "5x5_100", alias = "DICT_5X5_100")]
    Dict5x5_100,
    #[serde(rename = "5x5_250", alias = "DICT_5X5_250")]
    Dict5x5_250,
    #[serde(rename = "6x6_1000", alias = "DICT_6X6_1000")]
    Dict6x6_1000,
    #[serde(rename = "7x7_1000", alias = "DICT_7X7_1000")]
    Dict7x7_1000,
}

/// Returned when a dictionary name is not part of the table.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown marker dictionary `{name}`, expected one of: 4x4_50, 5x5_100, 5x5_250, 6x6_1000, 7x7_1000")]
pub struct UnknownDictionary {
    pub name: String,
}

impl MarkerDictionary {
    pub const ALL: [MarkerDictionary; 5] = [
        MarkerDictionary::Dict4x4_50,
        MarkerDictionary::Dict5x5_100,
        MarkerDictionary::Dict5x5_250,
        MarkerDictionary::Dict6x6_1000,
        MarkerDictionary::Dict7x7_1000,
    ];

    /// Short table name, e.g. `5x5_250`.
    pub fn name(self) -> &'static str {
        match self {
            MarkerDictionary::Dict4x4_50 => "4x4_50",
            MarkerDictionary::Dict5x5_100 => "5x5_100",
            MarkerDictionary::Dict5x5_250 => "5x5_250",
            MarkerDictionary::Dict6x6_1000 => "6x6_1000",
            MarkerDictionary::Dict7x7_1000 => "7x7_1000",
        }
    }

    /// OpenCV predefined dictionary name, e.g. `DICT_5X5_250`.
    pub fn opencv_name(self) -> &'static str {
        match self {
            MarkerDictionary::Dict4x4_50 => "DICT_4X4_50",
            MarkerDictionary::Dict5x5_100 => "DICT_5X5_100",
            MarkerDictionary::Dict5x5_250 => "DICT_5X5_250",
            MarkerDictionary::Dict6x6_1000 => "DICT_6X6_1000",
            MarkerDictionary::Dict7x7_1000 => "DICT_7X7_1000",
        }
    }

    /// Inner bits per marker side.
    pub fn marker_bits(self) -> usize {
        match self {
            MarkerDictionary::Dict4x4_50 => 4,
            MarkerDictionary::Dict5x5_100 | MarkerDictionary::Dict5x5_250 => 5,
            MarkerDictionary::Dict6x6_1000 => 6,
            MarkerDictionary::Dict7x7_1000 => 7,
        }
    }

    /// Number of distinct marker ids.
    pub fn marker_count(self) -> usize {
        match self {
            MarkerDictionary::Dict4x4_50 => 50,
            MarkerDictionary::Dict5x5_100 => 100,
            MarkerDictionary::Dict5x5_250 => 250,
            MarkerDictionary::Dict6x6_1000 | MarkerDictionary::Dict7x7_1000 => 1000,
        }
    }

    /// Accepts both `5x5_250` and `DICT_5X5_250`, ignoring ASCII case.
    pub fn from_name(name: &str) -> Result<Self, UnknownDictionary> {
        let trimmed = name.trim();
        let short = trimmed
            .get(..5)
            .filter(|p| p.eq_ignore_ascii_case("dict_"))
            .map_or(trimmed, |_| &trimmed[5..]);
        Self::ALL
            .into_iter()
            .find(|d| d.name().eq_ignore_ascii_case(short))
            .ok_or_else(|| UnknownDictionary {
                name: name.to_string(),
            })
    }
}

impl fmt::Display for MarkerDictionary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MarkerDictionary {
    type Err = UnknownDictionary;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_and_opencv_names_resolve() {
        assert_eq!(
            MarkerDictionary::from_name("5x5_250"),
            Ok(MarkerDictionary::Dict5x5_250)
        );
        assert_eq!(
            MarkerDictionary::from_name("DICT_4X4_50"),
            Ok(MarkerDictionary::Dict4x4_50)
        );
        assert!(MarkerDictionary::from_name("invalid_dict").is_err());
    }

    #[test]
    fn serde_uses_table_names() {
        let json = serde_json::to_string(&MarkerDictionary::Dict6x6_1000).unwrap();
        assert_eq!(json, "\"6x6_1000\"");
        let back: MarkerDictionary = serde_json::from_str("\"DICT_7X7_1000\"").unwrap();
        assert_eq!(back, MarkerDictionary::Dict7x7_1000);
    }

    #[test]
    fn every_entry_round_trips_through_its_name() {
        for dict in MarkerDictionary::ALL {
            assert_eq!(MarkerDictionary::from_name(dict.name()), Ok(dict));
            assert_eq!(MarkerDictionary::from_name(dict.opencv_name()), Ok(dict));
            assert!(dict.marker_bits() * dict.marker_bits() <= 64);
        }
    }
}
