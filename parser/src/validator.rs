//! Structural and semantic checks over a recalculated model.
//!
//! Errors make a file unacceptable for ranking; warnings are advisory.

use crate::model::{Event, Member, Participant, Player, ScoreData};
use crate::types::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Largest acceptable numeric national id, when ids are numbered.
    #[serde(default)]
    pub max_national_id: Option<u64>,
    #[serde(default = "default_supported_version")]
    pub supported_version: String,
}

fn default_supported_version() -> String {
    "1.2".to_string()
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_national_id: None,
            supported_version: default_supported_version(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub has_missing_national_ids: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, message: String) {
        debug!("Validation error: {}", message);
        self.errors.push(message);
    }

    fn warning(&mut self, message: String) {
        debug!("Validation warning: {}", message);
        self.warnings.push(message);
    }
}

pub fn validate(data: &ScoreData, config: &ValidationConfig) -> ValidationReport {
    let mut report = ValidationReport::default();

    if data.events.len() != 1 {
        report.error(format!(
            "File must contain exactly one event, found {}",
            data.events.len()
        ));
    }
    if data.clubs.len() != 1 {
        report.error(format!(
            "File must contain exactly one club, found {}",
            data.clubs.len()
        ));
    }
    match data.version.as_deref() {
        Some(version) if version.trim() == config.supported_version => {}
        Some(version) => report.error(format!(
            "Unsupported file version {} (expected {})",
            version, config.supported_version
        )),
        None => report.error(format!(
            "File has no version (expected {})",
            config.supported_version
        )),
    }

    for event in &data.events {
        validate_event(event, config, &mut report);
    }

    info!(
        "Validation finished: {} errors, {} warnings",
        report.errors.len(),
        report.warnings.len()
    );
    report
}

fn validate_event(event: &Event, config: &ValidationConfig, report: &mut ValidationReport) {
    let label = event
        .title
        .clone()
        .unwrap_or_else(|| event.event_type.to_string());

    if !event.event_type.is_supported() {
        report.error(format!(
            "{}: unsupported event type '{}'",
            label, event.event_type
        ));
    }
    if event.board_scoring.is_none() {
        report.error(format!("{}: no board scoring method", label));
    }
    if event.boards.unwrap_or(0) == 0 {
        report.error(format!("{}: number of boards played is missing", label));
    }
    if event.event_type.requires_win_draw() && event.boards_per_round.unwrap_or(0) == 0 {
        report.error(format!("{}: boards per round is missing", label));
    }

    let winners = event.winner_count();
    match winners {
        1 => {}
        2 if event.event_type.is_direction_split() => {}
        2 => report.error(format!(
            "{}: two winners are not allowed for {} events",
            label, event.event_type
        )),
        n => report.error(format!("{}: invalid number of winners {}", label, n)),
    }

    for (count, what) in [(event.section_count, "sections"), (event.session_count, "sessions")] {
        if let Some(n) = count.filter(|&n| n != 1) {
            report.warning(format!("{}: {} {} in one event", label, n, what));
        }
    }

    if event.date.is_some() && event.parsed_date().is_none() {
        report.warning(format!(
            "{}: date '{}' is not a readable calendar date",
            label,
            event.date.as_deref().unwrap_or_default()
        ));
    }

    let per_winner = winners.max(1);
    let ceiling = (event.participants.len() as u32 + per_winner - 1) / per_winner;
    let expected_kind = event.participant_kind();
    let mut seen: HashSet<(Option<Direction>, String)> = HashSet::new();

    for participant in &event.participants {
        let who = participant.describe();

        if participant.member.kind() != expected_kind {
            report.error(format!(
                "{}: {} is not a {} as {} events require",
                label, who, expected_kind, event.event_type
            ));
        }

        match participant.member.number() {
            None => report.error(format!("{}: {} has no number", label, who)),
            Some(number) => {
                let direction = if winners == 2 {
                    participant.member.direction()
                } else {
                    None
                };
                if !seen.insert((direction, number.to_string())) {
                    report.error(format!("{}: number {} is used more than once", label, number));
                }
            }
        }

        match participant.place {
            None => report.error(format!("{}: {} has no place", label, who)),
            Some(place) if place < 1 || place > ceiling => report.error(format!(
                "{}: {} has place {} outside 1..{}",
                label, who, place, ceiling
            )),
            Some(_) => {}
        }

        if participant.score.is_none() {
            report.error(format!("{}: {} has no score", label, who));
        }

        if event.event_type.requires_win_draw() && participant.win_draw.is_none() {
            report.error(format!("{}: {} has no wins/draws", label, who));
        }

        check_composition(&label, participant, report);

        for player in participant.member.players() {
            check_national_id(&label, &who, &player, config, report);
        }
    }

    duplicate_national_ids(&label, event, report);
}

fn check_composition(label: &str, participant: &Participant, report: &mut ValidationReport) {
    let who = participant.describe();
    match &participant.member {
        Member::Pair(pair) if pair.players.len() != 2 => report.error(format!(
            "{}: {} has {} players instead of 2",
            label,
            who,
            pair.players.len()
        )),
        Member::Team(team) if team.pairs.is_empty() && team.players.len() < 4 => {
            report.error(format!(
                "{}: {} has {} players, a team needs at least 4",
                label,
                who,
                team.players.len()
            ))
        }
        Member::Team(team) if !team.pairs.is_empty() && team.pairs.len() < 2 => report.error(
            format!("{}: {} has {} pair, a team needs at least 2", label, who, team.pairs.len()),
        ),
        _ => {}
    }
}

fn check_national_id(
    label: &str,
    who: &str,
    player: &Player,
    config: &ValidationConfig,
    report: &mut ValidationReport,
) {
    let Some(id) = player.known_national_id() else {
        report.has_missing_national_ids = true;
        return;
    };
    if let Some(max) = config.max_national_id {
        match id.parse::<u64>() {
            Ok(n) if n <= max => {}
            Ok(n) => report.warning(format!(
                "{}: {} in {} has national id {} above {}",
                label, player.name, who, n, max
            )),
            Err(_) => report.warning(format!(
                "{}: {} in {} has non-numeric national id '{}'",
                label, player.name, who, id
            )),
        }
    }
}

/// One warning per national id held by more than one player, naming every
/// occurrence.
fn duplicate_national_ids(label: &str, event: &Event, report: &mut ValidationReport) {
    let mut holders: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for participant in &event.participants {
        let who = participant.describe();
        for player in participant.member.players() {
            if let Some(id) = player.known_national_id() {
                holders
                    .entry(id.to_string())
                    .or_default()
                    .push(format!("{} in {}", player.name, who));
            }
        }
    }
    for (id, occurrences) in holders.into_iter().filter(|(_, o)| o.len() > 1) {
        report.warning(format!(
            "{}: national id {} appears {} times: {}",
            label,
            id,
            occurrences.len(),
            occurrences.join("; ")
        ));
    }
}
