//! Normalized tournament model shared by every parser.
//!
//! All entities are appended during one forward parse, rewritten by the
//! recalculation pass, and read-only after that.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::types::{
    Direction, EventType, ParticipantKind, ScoringConfig, ScoringMethod, VpStyle,
    WinDrawGranularity,
};

/// Result of importing one file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoreData {
    /// Format version; USEBIO files carry it, CSV parsers normalize it.
    pub version: Option<String>,
    pub events: Vec<Event>,
    pub clubs: Vec<Club>,
    pub win_draw: WinDrawGranularity,
    pub vp_style: VpStyle,
    pub merge_matches: bool,
    pub round_continuous_vp_draws: bool,
    pub scoring: ScoringConfig,
    /// Data from sessions excluded by the session filter.
    pub other_session: Option<Box<ScoreData>>,
}

impl ScoreData {
    /// Empty model carrying the same scoring flags as `self`.
    pub fn with_same_flags(&self) -> Self {
        Self {
            version: self.version.clone(),
            win_draw: self.win_draw,
            vp_style: self.vp_style,
            merge_matches: self.merge_matches,
            round_continuous_vp_draws: self.round_continuous_vp_draws,
            scoring: self.scoring,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Club {
    pub name: Option<String>,
    pub id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_type: EventType,
    pub title: Option<String>,
    pub identifier: Option<String>,
    pub date: Option<String>,
    pub program_name: Option<String>,
    pub program_version: Option<String>,
    pub contact: Option<String>,
    pub board_scoring: Option<ScoringMethod>,
    pub match_scoring: Option<ScoringMethod>,
    pub boards: Option<u32>,
    pub boards_per_round: Option<u32>,
    pub rounds: Option<u32>,
    /// Simultaneous winners: 1, or 2 for NS/EW split pairs events.
    pub winners: Option<u32>,
    pub section_count: Option<u32>,
    pub session_count: Option<u32>,
    pub participants: Vec<Participant>,
    pub matches: Vec<Match>,
    /// Set when win/draw was recalculated from another session's matches.
    pub uses_other_session: bool,
}

impl Event {
    pub fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            title: None,
            identifier: None,
            date: None,
            program_name: None,
            program_version: None,
            contact: None,
            board_scoring: None,
            match_scoring: None,
            boards: None,
            boards_per_round: None,
            rounds: None,
            winners: None,
            section_count: None,
            session_count: None,
            participants: Vec::new(),
            matches: Vec::new(),
            uses_other_session: false,
        }
    }

    /// Copy of the header fields with no participants or matches.
    pub fn header_copy(&self) -> Self {
        Self {
            participants: Vec::new(),
            matches: Vec::new(),
            uses_other_session: false,
            ..self.clone()
        }
    }

    pub fn participant_kind(&self) -> ParticipantKind {
        self.event_type.participant_kind()
    }

    pub fn winner_count(&self) -> u32 {
        self.winners.unwrap_or(1)
    }

    pub fn parsed_date(&self) -> Option<NaiveDate> {
        let date = self.date.as_deref()?.trim();
        ["%d/%m/%Y", "%Y-%m-%d", "%d-%m-%Y", "%d.%m.%Y"]
            .iter()
            .find_map(|format| NaiveDate::parse_from_str(date, format).ok())
    }

    pub fn find_participant(&self, number: &str) -> Option<usize> {
        self.participants
            .iter()
            .position(|p| p.member.number() == Some(number))
    }
}

/// A ranked competitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub member: Member,
    pub place: Option<u32>,
    pub score: Option<f64>,
    pub win_draw: Option<f64>,
    /// Point total typed in by hand rather than computed.
    pub manual_points: Option<f64>,
}

impl Participant {
    pub fn new(member: Member) -> Self {
        Self {
            member,
            place: None,
            score: None,
            win_draw: None,
            manual_points: None,
        }
    }

    /// Human readable label used in diagnostics, e.g. `pair 3 (Smith & Jones)`.
    pub fn describe(&self) -> String {
        let mut label = self.member.kind().to_string();
        if let Some(number) = self.member.number() {
            label.push(' ');
            label.push_str(number);
        }
        if let Some(direction) = self.member.direction() {
            label.push_str(&format!(" {}", direction));
        }
        let names = self.member.display_name();
        if !names.is_empty() {
            label.push_str(&format!(" ({})", names));
        }
        label
    }
}

/// Competitor variants; shared fields are reached through the accessors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Member {
    Player(Player),
    Pair(Pair),
    Team(Team),
}

impl Member {
    pub fn for_kind(kind: ParticipantKind) -> Self {
        match kind {
            ParticipantKind::Player => Member::Player(Player::default()),
            ParticipantKind::Pair => Member::Pair(Pair::default()),
            ParticipantKind::Team => Member::Team(Team::default()),
        }
    }

    pub fn kind(&self) -> ParticipantKind {
        match self {
            Member::Player(_) => ParticipantKind::Player,
            Member::Pair(_) => ParticipantKind::Pair,
            Member::Team(_) => ParticipantKind::Team,
        }
    }

    pub fn number(&self) -> Option<&str> {
        match self {
            Member::Player(player) => player.number.as_deref(),
            Member::Pair(pair) => pair.number.as_deref(),
            Member::Team(team) => team.number.as_deref(),
        }
    }

    pub fn set_number(&mut self, number: String) {
        match self {
            Member::Player(player) => player.number = Some(number),
            Member::Pair(pair) => pair.number = Some(number),
            Member::Team(team) => team.number = Some(number),
        }
    }

    pub fn direction(&self) -> Option<Direction> {
        match self {
            Member::Pair(pair) => pair.direction,
            _ => None,
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            Member::Player(player) => player.name.clone(),
            Member::Pair(pair) => pair.display_name(),
            Member::Team(team) => team.name.clone().unwrap_or_else(|| {
                team.effective_players()
                    .iter()
                    .map(|p| p.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            }),
        }
    }

    /// Every player of the competitor, with team duplicates merged.
    pub fn players(&self) -> Vec<Player> {
        match self {
            Member::Player(player) => vec![player.clone()],
            Member::Pair(pair) => pair.players.clone(),
            Member::Team(team) => team.effective_players(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    pub number: Option<String>,
    pub national_id: Option<String>,
    pub seat: Option<String>,
    /// Index of the owning pair within its team; lookup only.
    pub pair: Option<usize>,
    pub boards_played: f64,
    pub win_draw: Option<f64>,
}

impl Player {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// National id unless it is blank or the "0" placeholder.
    pub fn known_national_id(&self) -> Option<&str> {
        self.national_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty() && *id != "0")
    }

    fn merge_key(&self) -> (String, String) {
        (
            self.name.trim().to_lowercase(),
            self.national_id.clone().unwrap_or_default().trim().to_string(),
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pair {
    pub number: Option<String>,
    pub name: Option<String>,
    pub players: Vec<Player>,
    pub direction: Option<Direction>,
    pub boards_played: Option<f64>,
    pub win_draw: Option<f64>,
}

impl Pair {
    pub fn display_name(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        self.players
            .iter()
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>()
            .join(" & ")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub number: Option<String>,
    pub name: Option<String>,
    pub pairs: Vec<Pair>,
    /// Flat roster for formats without pair structure.
    pub players: Vec<Player>,
}

impl Team {
    /// Players of all pairs plus the flat roster. Entries with the same
    /// lower-cased name and national id are merged, summing their boards
    /// played and win/draw.
    pub fn effective_players(&self) -> Vec<Player> {
        let flattened = self.pairs.iter().enumerate().flat_map(|(index, pair)| {
            pair.players.iter().map(move |player| Player {
                pair: Some(index),
                boards_played: pair.boards_played.unwrap_or(player.boards_played),
                win_draw: pair.win_draw.or(player.win_draw),
                ..player.clone()
            })
        });

        let mut merged: Vec<Player> = Vec::new();
        for player in flattened.chain(self.players.iter().cloned()) {
            match merged.iter_mut().find(|p| p.merge_key() == player.merge_key()) {
                Some(existing) => {
                    existing.boards_played += player.boards_played;
                    existing.win_draw = match (existing.win_draw, player.win_draw) {
                        (Some(a), Some(b)) => Some(a + b),
                        (a, b) => a.or(b),
                    };
                }
                None => merged.push(player),
            }
        }
        merged
    }

    pub fn pair_index(&self, number: &str) -> Option<usize> {
        self.pairs
            .iter()
            .position(|pair| pair.number.as_deref() == Some(number))
    }
}

/// Pair numbers seen on each side of a match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchPairs {
    pub own: BTreeSet<String>,
    pub opposing: BTreeSet<String>,
}

impl MatchPairs {
    pub fn is_empty(&self) -> bool {
        self.own.is_empty() && self.opposing.is_empty()
    }
}

/// One head-to-head record between two participant numbers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub round: Option<u32>,
    pub number: Option<String>,
    pub opponent: Option<String>,
    pub score: Option<f64>,
    pub opposing_score: Option<f64>,
    pub vp: Option<f64>,
    pub opposing_vp: Option<f64>,
    pub boards: Vec<Board>,
    pub pairs: MatchPairs,
}

impl Match {
    /// Which side `number` plays in this match, if any. `true` means the
    /// match's own side.
    pub fn side_of(&self, number: &str) -> Option<bool> {
        if self.number.as_deref() == Some(number) {
            Some(true)
        } else if self.opponent.as_deref() == Some(number) {
            Some(false)
        } else {
            None
        }
    }
}

/// Scores for one board of one match; NS is the match's own side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub number: Option<u32>,
    pub ns_score: Option<f64>,
    pub ew_score: Option<f64>,
}

impl Board {
    pub fn swapped(&self) -> Self {
        Self {
            number: self.number,
            ns_score: self.ew_score,
            ew_score: self.ns_score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(name: &str, id: &str) -> Player {
        Player {
            national_id: Some(id.to_string()),
            ..Player::named(name)
        }
    }

    #[test]
    fn test_team_effective_players_merges_duplicates() {
        let team = Team {
            number: Some("4".to_string()),
            pairs: vec![
                Pair {
                    players: vec![player("Ann Lee", "101"), player("Bob Ray", "102")],
                    boards_played: Some(16.0),
                    win_draw: Some(2.0),
                    ..Default::default()
                },
                Pair {
                    players: vec![player("ann lee", "101"), player("Cat Poe", "103")],
                    boards_played: Some(8.0),
                    win_draw: Some(0.5),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        let players = team.effective_players();
        assert_eq!(players.len(), 3);
        assert_eq!(players[0].name, "Ann Lee");
        assert_eq!(players[0].boards_played, 24.0);
        assert_eq!(players[0].win_draw, Some(2.5));
        assert_eq!(players[2].pair, Some(1));
    }

    #[test]
    fn test_same_name_different_id_is_not_merged() {
        let team = Team {
            players: vec![player("Ann Lee", "101"), player("Ann Lee", "999")],
            ..Default::default()
        };
        assert_eq!(team.effective_players().len(), 2);
    }

    #[test]
    fn test_participant_describe() {
        let mut participant = Participant::new(Member::Pair(Pair {
            number: Some("7".to_string()),
            players: vec![Player::named("Ann"), Player::named("Bob")],
            direction: Some(Direction::EW),
            ..Default::default()
        }));
        participant.place = Some(1);
        assert_eq!(participant.describe(), "pair 7 EW (Ann & Bob)");
    }

    #[test]
    fn test_event_parsed_date_formats() {
        let mut event = Event::new(EventType::MpPairs);
        event.date = Some("14/02/2024".to_string());
        assert_eq!(event.parsed_date(), NaiveDate::from_ymd_opt(2024, 2, 14));
        event.date = Some("2024-02-14".to_string());
        assert_eq!(event.parsed_date(), NaiveDate::from_ymd_opt(2024, 2, 14));
        event.date = Some("Valentine's".to_string());
        assert_eq!(event.parsed_date(), None);
    }

    #[test]
    fn test_known_national_id_ignores_placeholder() {
        assert_eq!(player("A", "0").known_national_id(), None);
        assert_eq!(player("A", " ").known_national_id(), None);
        assert_eq!(player("A", "42").known_national_id(), Some("42"));
    }
}
