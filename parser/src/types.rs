use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::Club;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("XML parse error: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("File is not valid UTF-8")]
    InvalidUtf8,
    #[error("No parser selected")]
    NoParserSelected,
    #[error("Unexpected {to} section after {from}")]
    IllegalTransition { from: String, to: String },
    #[error("Unrecognised tag: {0}")]
    UnknownTag(String),
    #[error("{section} row has {found} columns but its header has {expected}")]
    ColumnCountMismatch {
        section: String,
        expected: usize,
        found: usize,
    },
    #[error("Missing header: {0}")]
    MissingHeader(String),
    #[error("Invalid file structure: {0}")]
    Structure(String),
    #[error("{0}")]
    Custom(String),
}

impl From<String> for ParseError {
    fn from(msg: String) -> Self {
        ParseError::Custom(msg)
    }
}

impl From<&str> for ParseError {
    fn from(msg: &str) -> Self {
        ParseError::Custom(msg.to_string())
    }
}

/// Normalizes an upstream keyword: upper-case, `-` and spaces folded to `_`.
fn keyword(value: &str) -> String {
    value
        .trim()
        .to_uppercase()
        .chars()
        .map(|c| if c == '-' || c == ' ' { '_' } else { c })
        .collect()
}

/// Kind of competitor an event ranks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParticipantKind {
    Player,
    Pair,
    Team,
}

impl fmt::Display for ParticipantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParticipantKind::Player => write!(f, "player"),
            ParticipantKind::Pair => write!(f, "pair"),
            ParticipantKind::Team => write!(f, "team"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    MpPairs,
    ImpPairs,
    ButlerPairs,
    CrossImps,
    SwissPairs,
    Individual,
    TeamsOfFour,
    SwissTeams,
    MultipleTeams,
    Unknown(String),
}

impl EventType {
    pub fn parse(value: &str) -> Self {
        match keyword(value).as_str() {
            "MP_PAIRS" | "PAIRS" => EventType::MpPairs,
            "IMP_PAIRS" => EventType::ImpPairs,
            "BUTLER_PAIRS" => EventType::ButlerPairs,
            "CROSS_IMPS" => EventType::CrossImps,
            "SWISS_PAIRS" => EventType::SwissPairs,
            "INDIVIDUAL" => EventType::Individual,
            "TEAMS_OF_FOUR" | "TEAMS" => EventType::TeamsOfFour,
            "SWISS_TEAMS" => EventType::SwissTeams,
            "MULTIPLE_TEAMS" => EventType::MultipleTeams,
            _ => EventType::Unknown(value.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EventType::MpPairs => "MP_PAIRS",
            EventType::ImpPairs => "IMP_PAIRS",
            EventType::ButlerPairs => "BUTLER_PAIRS",
            EventType::CrossImps => "CROSS_IMPS",
            EventType::SwissPairs => "SWISS_PAIRS",
            EventType::Individual => "INDIVIDUAL",
            EventType::TeamsOfFour => "TEAMS_OF_FOUR",
            EventType::SwissTeams => "SWISS_TEAMS",
            EventType::MultipleTeams => "MULTIPLE_TEAMS",
            EventType::Unknown(name) => name,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, EventType::Unknown(_))
    }

    /// Participant kind every participant of this event must carry.
    /// Unknown types fall back to pairs.
    pub fn participant_kind(&self) -> ParticipantKind {
        match self {
            EventType::Individual => ParticipantKind::Player,
            EventType::TeamsOfFour | EventType::SwissTeams | EventType::MultipleTeams => {
                ParticipantKind::Team
            }
            _ => ParticipantKind::Pair,
        }
    }

    pub fn requires_win_draw(&self) -> bool {
        matches!(
            self,
            EventType::SwissPairs | EventType::SwissTeams | EventType::TeamsOfFour
        )
    }

    /// Pairs events that may rank NS and EW separately.
    pub fn is_direction_split(&self) -> bool {
        matches!(
            self,
            EventType::MpPairs | EventType::ImpPairs | EventType::ButlerPairs | EventType::CrossImps
        )
    }

    pub fn swiss_variant(&self) -> Self {
        match self.participant_kind() {
            ParticipantKind::Team => EventType::SwissTeams,
            ParticipantKind::Pair => EventType::SwissPairs,
            ParticipantKind::Player => self.clone(),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit a board or a match is scored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoringMethod {
    MatchPoints,
    Imps,
    CrossImps,
    Aggregate,
    VictoryPoints,
}

impl ScoringMethod {
    pub fn parse(value: &str) -> Option<Self> {
        match keyword(value).as_str() {
            "MATCH_POINTS" | "MATCHPOINTS" | "MP" | "PERCENTAGE" => Some(ScoringMethod::MatchPoints),
            "IMPS" | "IMP" => Some(ScoringMethod::Imps),
            "CROSS_IMPS" | "BUTLER" => Some(ScoringMethod::CrossImps),
            "AGGREGATE" | "TOTAL_POINTS" => Some(ScoringMethod::Aggregate),
            "VICTORY_POINTS" | "VPS" | "VP" => Some(ScoringMethod::VictoryPoints),
            _ => None,
        }
    }

    pub fn is_vp(&self) -> bool {
        matches!(self, ScoringMethod::VictoryPoints)
    }

    /// Combines per-board (or per-session) scores into one total.
    pub fn combine(&self, scores: &[f64]) -> f64 {
        match self {
            ScoringMethod::MatchPoints => {
                if scores.is_empty() {
                    0.0
                } else {
                    scores.iter().sum::<f64>() / scores.len() as f64
                }
            }
            _ => scores.iter().sum(),
        }
    }

    /// The score the other side holds when one side holds `score`.
    pub fn mirror(&self, score: f64, max_vp: f64) -> f64 {
        match self {
            ScoringMethod::MatchPoints => 100.0 - score,
            ScoringMethod::VictoryPoints => max_vp - score,
            ScoringMethod::Imps | ScoringMethod::CrossImps | ScoringMethod::Aggregate => -score,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    NS,
    EW,
}

impl Direction {
    pub fn parse(value: &str) -> Option<Self> {
        match keyword(value).as_str() {
            "NS" | "N_S" | "N" | "S" | "NORTH" | "SOUTH" => Some(Direction::NS),
            "EW" | "E_W" | "E" | "W" | "EAST" | "WEST" => Some(Direction::EW),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::NS => write!(f, "NS"),
            Direction::EW => write!(f, "EW"),
        }
    }
}

/// Level at which win/draw tallies are recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum WinDrawGranularity {
    #[default]
    Participant,
    Match,
    Board,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VpStyle {
    #[default]
    Continuous,
    Discrete,
}

/// Numeric settings the scoring routines read.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub max_vp: u32,
    pub vp_decimal_places: u32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            max_vp: 20,
            vp_decimal_places: 2,
        }
    }
}

/// Caller-supplied filters and flags for one parse.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParseOptions {
    /// Only the SESSION with this id feeds the primary model.
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub min_number: Option<String>,
    #[serde(default)]
    pub max_number: Option<String>,
    /// Overrides the event type declared by the file.
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub win_draw: Option<WinDrawGranularity>,
    #[serde(default)]
    pub merge_matches: bool,
    #[serde(default)]
    pub vp_style: Option<VpStyle>,
    /// Club identity for formats that carry none.
    #[serde(default)]
    pub club: Option<Club>,
    #[serde(default)]
    pub scoring: ScoringConfig,
}

/// True for the spellings upstream tools use for "yes".
pub fn is_truthy(value: &str) -> bool {
    matches!(keyword(value).as_str(), "Y" | "YES" | "1" | "TRUE" | "T")
}
