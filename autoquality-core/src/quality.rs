//! Canonical quality identifiers.
//!
//! User preferences and discovered menu rows meet in this identifier space,
//! independent of how the player words its labels.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Suffix appended to enhanced-bitrate variants of a canonical id.
pub const ENHANCED_SUFFIX: &str = "_hbr";

/// Canonical resolution token from the fixed closed set.
///
/// Variants are declared in descending resolution order, with the enhanced
/// bitrate variants immediately above their standard counterparts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QualityId {
    #[serde(rename = "4320p")]
    P4320,
    #[serde(rename = "2880p")]
    P2880,
    #[serde(rename = "2160p")]
    P2160,
    #[serde(rename = "1440p")]
    P1440,
    #[serde(rename = "1080p_hbr")]
    P1080Enhanced,
    #[serde(rename = "1080p")]
    P1080,
    #[serde(rename = "720p_hbr")]
    P720Enhanced,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "360p")]
    P360,
    #[serde(rename = "240p")]
    P240,
    #[serde(rename = "144p")]
    P144,
}

impl QualityId {
    /// Every canonical id, highest resolution first.
    pub const ALL: [QualityId; 12] = [
        QualityId::P4320,
        QualityId::P2880,
        QualityId::P2160,
        QualityId::P1440,
        QualityId::P1080Enhanced,
        QualityId::P1080,
        QualityId::P720Enhanced,
        QualityId::P720,
        QualityId::P480,
        QualityId::P360,
        QualityId::P240,
        QualityId::P144,
    ];

    /// Priority list used when no usable preference has been stored.
    pub const DEFAULT_PRIORITY: [QualityId; 4] = [
        QualityId::P1080Enhanced,
        QualityId::P1080,
        QualityId::P720Enhanced,
        QualityId::P720,
    ];

    /// Returns the persisted token, e.g. `1080p_hbr`.
    pub fn as_str(self) -> &'static str {
        match self {
            QualityId::P4320 => "4320p",
            QualityId::P2880 => "2880p",
            QualityId::P2160 => "2160p",
            QualityId::P1440 => "1440p",
            QualityId::P1080Enhanced => "1080p_hbr",
            QualityId::P1080 => "1080p",
            QualityId::P720Enhanced => "720p_hbr",
            QualityId::P720 => "720p",
            QualityId::P480 => "480p",
            QualityId::P360 => "360p",
            QualityId::P240 => "240p",
            QualityId::P144 => "144p",
        }
    }

    /// Nominal vertical resolution.
    pub fn rank(self) -> u32 {
        match self {
            QualityId::P4320 => 4320,
            QualityId::P2880 => 2880,
            QualityId::P2160 => 2160,
            QualityId::P1440 => 1440,
            QualityId::P1080Enhanced | QualityId::P1080 => 1080,
            QualityId::P720Enhanced | QualityId::P720 => 720,
            QualityId::P480 => 480,
            QualityId::P360 => 360,
            QualityId::P240 => 240,
            QualityId::P144 => 144,
        }
    }

    pub fn is_enhanced(self) -> bool {
        matches!(self, QualityId::P1080Enhanced | QualityId::P720Enhanced)
    }

    /// Human-readable label for settings displays.
    pub fn display_label(self) -> &'static str {
        match self {
            QualityId::P1080Enhanced => "1080p (High bitrate)",
            QualityId::P720Enhanced => "720p (High bitrate)",
            other => other.as_str(),
        }
    }

    /// Maps a parsed rank and enhanced flag onto the canonical set.
    ///
    /// Only 1080 and 720 have enhanced variants; an enhanced flag on any
    /// other rank maps to the standard id.
    pub fn from_rank(rank: u32, enhanced: bool) -> Option<Self> {
        match (rank, enhanced) {
            (1080, true) => Some(QualityId::P1080Enhanced),
            (720, true) => Some(QualityId::P720Enhanced),
            _ => QualityId::ALL
                .into_iter()
                .find(|id| !id.is_enhanced() && id.rank() == rank),
        }
    }
}

impl fmt::Display for QualityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QualityId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| format!("Unknown quality id: '{s}'"))
    }
}

/// Identifier of a discovered menu option.
///
/// Only `Canonical` ids can be matched by priority rules. The other two
/// variants exist so every row still has a stable, printable identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OptionId {
    /// A member of the canonical set.
    Canonical(QualityId),
    /// A parsed resolution outside the canonical set, e.g. `540p`.
    Unlisted(u32),
    /// A row without a recognizable resolution; keyed by its menu index so
    /// two unknown rows never collide.
    Unknown(usize),
}

impl OptionId {
    /// Builds the id for a parsed row.
    pub fn from_parsed(rank: Option<u32>, enhanced: bool, menu_index: usize) -> Self {
        match rank {
            Some(rank) => QualityId::from_rank(rank, enhanced)
                .map(OptionId::Canonical)
                .unwrap_or(OptionId::Unlisted(rank)),
            None => OptionId::Unknown(menu_index),
        }
    }

    pub fn canonical(&self) -> Option<QualityId> {
        match self {
            OptionId::Canonical(id) => Some(*id),
            _ => None,
        }
    }
}

impl fmt::Display for OptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionId::Canonical(id) => write!(f, "{id}"),
            OptionId::Unlisted(rank) => write!(f, "{rank}p"),
            OptionId::Unknown(index) => write!(f, "unknown_{index}"),
        }
    }
}
