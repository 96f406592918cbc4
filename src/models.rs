// Core data structures for the leaguedex catalog

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A geographic or organizational grouping of competitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub name_zh: String,  // Simplified Chinese
    pub name_zht: String, // Traditional Chinese
    pub name_en: String,
    pub level: u32, // Unique ordering key
}

impl Region {
    pub fn new(name_zh: &str, name_zht: &str, name_en: &str, level: u32) -> Self {
        Self {
            name_zh: name_zh.to_string(),
            name_zht: name_zht.to_string(),
            name_en: name_en.to_string(),
            level,
        }
    }
}

/// Competition kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompetitionKind {
    League,
    Cup,
}

impl CompetitionKind {
    /// Get string representation used in the store
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::League => "league",
            Self::Cup => "cup",
        }
    }
}

impl fmt::Display for CompetitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompetitionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "league" => Ok(Self::League),
            "cup" => Ok(Self::Cup),
            other => Err(format!("unknown competition kind: {other}")),
        }
    }
}

/// A league or cup nested under a region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Competition {
    pub id: i64,
    pub name_zh: String,
    pub name_zht: String,
    pub name_en: String,
    pub kind: CompetitionKind,
    /// 0 = sub-tier league, 1 = top-tier league, 2 = cup
    pub type_code: i32,
    pub region_level: u32,
    pub detail_url: String,
    pub url_is_valid: bool,
}

/// One region together with the competitions extracted for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionBlock {
    pub region: Region,
    pub leagues: Vec<Competition>,
    pub cups: Vec<Competition>,
}

impl RegionBlock {
    /// All competitions of this block, leagues first
    pub fn competitions(&self) -> impl Iterator<Item = &Competition> {
        self.leagues.iter().chain(self.cups.iter())
    }

    /// Mutable access to all competitions of this block
    pub fn competitions_mut(&mut self) -> impl Iterator<Item = &mut Competition> {
        self.leagues.iter_mut().chain(self.cups.iter_mut())
    }

    /// Number of competitions in this block
    pub fn competition_count(&self) -> usize {
        self.leagues.len() + self.cups.len()
    }
}

/// A season span discovered for a competition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Season {
    pub start_year: String,
    pub end_year: String,
}

impl Season {
    /// Parse `"2024-2025"` or `"2025"`
    pub fn parse(label: &str) -> Self {
        let label = label.trim();
        match label.split_once('-') {
            Some((start, end)) => Self {
                start_year: start.trim().to_string(),
                end_year: end.trim().to_string(),
            },
            None => Self {
                start_year: label.to_string(),
                end_year: label.to_string(),
            },
        }
    }
}

/// Persisted competition joined with its region name, used by season discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionCompetition {
    pub region_level: u32,
    pub region_name: String,
    pub event_id: i64,
    pub name_zh: String,
    pub type_code: i32,
    pub access_url: String,
}
