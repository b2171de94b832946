//! Win/draw recalculation.
//!
//! Runs after every parse and again whenever a caller toggles
//! `round_continuous_vp_draws`. Every step derives its output from data the
//! step itself never overwrites, so repeated runs leave the model unchanged.

use crate::model::{Event, Match, MatchPairs, Member, ScoreData};
use crate::scoring::{imps_to_vp, percentage_to_vp, points_to_imps};
use crate::types::{ScoringConfig, ScoringMethod, VpStyle, WinDrawGranularity};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Flags copied out of the model so events can be borrowed mutably.
#[derive(Debug, Clone, Copy)]
struct Settings {
    granularity: WinDrawGranularity,
    merge: bool,
    style: VpStyle,
    round_draws: bool,
    scoring: ScoringConfig,
}

impl Settings {
    fn of(data: &ScoreData) -> Self {
        Self {
            granularity: data.win_draw,
            merge: data.merge_matches,
            style: data.vp_style,
            round_draws: data.round_continuous_vp_draws,
            scoring: data.scoring,
        }
    }

    fn max_vp(&self) -> f64 {
        self.scoring.max_vp as f64
    }
}

/// Recomputes match scores and participant win/draw tallies for events
/// that need them. Returns human readable change messages; never fails.
pub fn recalculate(data: &mut ScoreData) -> Vec<String> {
    let mut changes = Vec::new();
    let settings = Settings::of(data);
    if settings.granularity == WinDrawGranularity::Participant {
        debug!("Win/draw granularity is per participant; nothing to recalculate");
        return changes;
    }

    let mut other = data.other_session.take();
    if let Some(other) = other.as_deref_mut() {
        for event in &mut other.events {
            prepare_matches(event, &settings, &mut changes);
        }
    }

    for (index, event) in data.events.iter_mut().enumerate() {
        if !event.event_type.requires_win_draw() {
            continue;
        }
        prepare_matches(event, &settings, &mut changes);
        let fallback = other
            .as_deref()
            .and_then(|other| other_session_matches(other, event, index));
        tally_win_draw(event, fallback, &settings, &mut changes);
    }

    data.other_session = other;
    info!("Recalculation produced {} messages", changes.len());
    changes
}

fn label(event: &Event) -> String {
    event
        .title
        .clone()
        .unwrap_or_else(|| event.event_type.to_string())
}

/// Merges duplicate matches and, at board granularity, rescores matches
/// from their boards.
fn prepare_matches(event: &mut Event, settings: &Settings, changes: &mut Vec<String>) {
    let match_method = event
        .match_scoring
        .or(event.board_scoring)
        .unwrap_or(ScoringMethod::Imps);

    if settings.merge {
        let merged = merge_matches(&mut event.matches, match_method);
        if merged > 0 {
            changes.push(format!(
                "{}: merged {} duplicate match records",
                label(event),
                merged
            ));
        }
    }

    if settings.granularity == WinDrawGranularity::Board && !event.matches.is_empty() {
        let rescored = rescore_from_boards(event, settings);
        if rescored == 0 {
            changes.push(format!(
                "{}: no board results recorded, using match totals",
                label(event)
            ));
        } else {
            changes.push(format!(
                "{}: {} matches rescored from board results",
                label(event),
                rescored
            ));
        }
    }
}

/// The other session's matches for the event at `index` of the primary.
fn other_session_matches<'a>(other: &'a ScoreData, event: &Event, index: usize) -> Option<&'a [Match]> {
    other
        .events
        .get(index)
        .filter(|candidate| candidate.event_type == event.event_type)
        .or_else(|| other.events.iter().find(|e| e.event_type == event.event_type))
        .map(|e| e.matches.as_slice())
        .filter(|matches| !matches.is_empty())
}

/// Coalesces matches between the same two participants, in either order.
/// Reversed records are flipped before their scores are combined. Returns
/// the number of records absorbed.
pub fn merge_matches(matches: &mut Vec<Match>, method: ScoringMethod) -> usize {
    let mut merged: Vec<Match> = Vec::with_capacity(matches.len());
    let mut absorbed = 0;

    for record in matches.drain(..) {
        let existing = merged.iter_mut().find(|m| same_opponents(m, &record));
        match existing {
            Some(target) => {
                let record = if target.number == record.number {
                    record
                } else {
                    flipped(record)
                };
                absorb(target, record, method);
                absorbed += 1;
            }
            None => merged.push(record),
        }
    }

    *matches = merged;
    absorbed
}

fn same_opponents(a: &Match, b: &Match) -> bool {
    match (&a.number, &a.opponent, &b.number, &b.opponent) {
        (Some(a1), Some(a2), Some(b1), Some(b2)) => {
            (a1 == b1 && a2 == b2) || (a1 == b2 && a2 == b1)
        }
        _ => false,
    }
}

fn flipped(record: Match) -> Match {
    Match {
        round: record.round,
        number: record.opponent,
        opponent: record.number,
        score: record.opposing_score,
        opposing_score: record.score,
        vp: record.opposing_vp,
        opposing_vp: record.vp,
        boards: record.boards.iter().map(|b| b.swapped()).collect(),
        pairs: MatchPairs {
            own: record.pairs.opposing,
            opposing: record.pairs.own,
        },
    }
}

fn absorb(target: &mut Match, record: Match, method: ScoringMethod) {
    let combine = |method: ScoringMethod, a: Option<f64>, b: Option<f64>| match (a, b) {
        (Some(a), Some(b)) => Some(method.combine(&[a, b])),
        (a, b) => a.or(b),
    };
    target.score = combine(method, target.score, record.score);
    target.opposing_score = combine(method, target.opposing_score, record.opposing_score);
    target.vp = combine(ScoringMethod::VictoryPoints, target.vp, record.vp);
    target.opposing_vp = combine(ScoringMethod::VictoryPoints, target.opposing_vp, record.opposing_vp);
    target.round = target.round.or(record.round);
    target.boards.extend(record.boards);
    target.pairs.own.extend(record.pairs.own);
    target.pairs.opposing.extend(record.pairs.opposing);
}

/// Rewrites match scores (and VPs for VP-scored matches) from board
/// results. Returns the number of matches rescored.
fn rescore_from_boards(event: &mut Event, settings: &Settings) -> usize {
    let board_method = event.board_scoring.unwrap_or(ScoringMethod::Imps);
    let match_method = event.match_scoring.unwrap_or(board_method);
    let max_vp = settings.max_vp();
    let mut rescored = 0;

    for record in event.matches.iter_mut().filter(|m| !m.boards.is_empty()) {
        let values: Vec<f64> = record
            .boards
            .iter()
            .filter_map(|b| b.ns_score.or_else(|| b.ew_score.map(|ew| board_method.mirror(ew, max_vp))))
            .collect();
        if values.is_empty() {
            continue;
        }
        let total = board_method.combine(&values);
        let boards = record.boards.len() as u32;

        let (score, vp) = match (board_method, match_method) {
            (ScoringMethod::MatchPoints, ScoringMethod::VictoryPoints) => (
                total,
                Some(percentage_to_vp(total, boards, &settings.scoring, settings.style)),
            ),
            (ScoringMethod::Aggregate, ScoringMethod::VictoryPoints) => {
                let imps = points_to_imps(total) as f64;
                (total, Some(imps_to_vp(imps, boards, &settings.scoring, settings.style)))
            }
            (_, ScoringMethod::VictoryPoints) => (
                total,
                Some(imps_to_vp(total, boards, &settings.scoring, settings.style)),
            ),
            (ScoringMethod::Aggregate, ScoringMethod::Imps | ScoringMethod::CrossImps) => {
                (points_to_imps(total) as f64, None)
            }
            _ => (total, None),
        };

        record.score = Some(score);
        record.opposing_score = Some(board_method.mirror(score, max_vp));
        if let Some(vp) = vp {
            record.vp = Some(vp);
            record.opposing_vp = Some(ScoringMethod::VictoryPoints.mirror(vp, max_vp));
        }
        rescored += 1;
    }
    rescored
}

/// Win/draw credit for each side of a match, or `None` when the match has
/// nothing comparable.
fn outcome(record: &Match, round_draws: bool) -> Option<(f64, f64)> {
    let (own, opposing) = match (record.vp, record.opposing_vp) {
        (Some(vp), Some(opposing)) => (vp, opposing),
        _ => (record.score?, record.opposing_score?),
    };
    let drawn = (own - opposing).abs() < 1e-9 || (round_draws && own.round() == opposing.round());
    Some(if drawn {
        (0.5, 0.5)
    } else if own > opposing {
        (1.0, 0.0)
    } else {
        (0.0, 1.0)
    })
}

fn credit(event: &mut Event, number: Option<&str>, amount: f64, pairs: &BTreeSet<String>) {
    let Some(index) = number.and_then(|n| event.find_participant(n)) else {
        return;
    };
    let participant = &mut event.participants[index];
    participant.win_draw = Some(participant.win_draw.unwrap_or_default() + amount);

    if let Member::Team(team) = &mut participant.member {
        if team.pairs.len() > 2 {
            for pair in team.pairs.iter_mut() {
                if pair.number.as_ref().is_some_and(|n| pairs.contains(n)) {
                    pair.win_draw = Some(pair.win_draw.unwrap_or_default() + amount);
                }
            }
        }
    }
}

fn tally_win_draw(
    event: &mut Event,
    fallback: Option<&[Match]>,
    settings: &Settings,
    changes: &mut Vec<String>,
) {
    let from_other_session = event.matches.is_empty() && fallback.is_some();
    let matches: Vec<Match> = if from_other_session {
        fallback.unwrap_or_default().to_vec()
    } else {
        event.matches.clone()
    };
    if matches.is_empty() {
        changes.push(format!(
            "{}: no matches recorded, win/draw left as imported",
            label(event)
        ));
        return;
    }

    let round_draws = settings.round_draws && event.match_scoring.is_some_and(|m| m.is_vp());
    let before: Vec<Option<f64>> = event.participants.iter().map(|p| p.win_draw).collect();

    for participant in &mut event.participants {
        participant.win_draw = Some(0.0);
        if let Member::Team(team) = &mut participant.member {
            if team.pairs.len() > 2 {
                for pair in team.pairs.iter_mut() {
                    pair.win_draw = Some(0.0);
                }
            }
        }
    }

    for record in &matches {
        let Some((own, opposing)) = outcome(record, round_draws) else {
            continue;
        };
        credit(event, record.number.as_deref(), own, &record.pairs.own);
        credit(event, record.opponent.as_deref(), opposing, &record.pairs.opposing);
    }

    event.uses_other_session = from_other_session;
    let mut summary = format!(
        "{}: win/draw recalculated from {} matches",
        label(event),
        matches.len()
    );
    if from_other_session {
        summary.push_str(" of another session");
    }
    changes.push(summary);

    for (participant, previous) in event.participants.iter().zip(before) {
        if participant.win_draw != previous {
            changes.push(format!(
                "{}: {} win/draw {} -> {}",
                label(event),
                participant.describe(),
                previous.map_or_else(|| "none".to_string(), |v| v.to_string()),
                participant.win_draw.unwrap_or_default()
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Board, Pair, Participant, Team};
    use crate::scoring::discrete_vp;
    use crate::types::EventType;

    fn team(number: &str, pairs: &[&str]) -> Participant {
        Participant::new(Member::Team(Team {
            number: Some(number.to_string()),
            pairs: pairs
                .iter()
                .map(|n| Pair {
                    number: Some(n.to_string()),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }))
    }

    fn vp_match(a: &str, b: &str, vp: f64, opposing: f64) -> Match {
        Match {
            number: Some(a.to_string()),
            opponent: Some(b.to_string()),
            vp: Some(vp),
            opposing_vp: Some(opposing),
            ..Default::default()
        }
    }

    fn swiss(matches: Vec<Match>) -> ScoreData {
        let mut event = Event::new(EventType::SwissTeams);
        event.board_scoring = Some(ScoringMethod::Imps);
        event.match_scoring = Some(ScoringMethod::VictoryPoints);
        event.participants = vec![team("1", &["11", "12"]), team("2", &["21", "22"]), team("3", &[])];
        event.matches = matches;
        ScoreData {
            events: vec![event],
            win_draw: WinDrawGranularity::Match,
            ..Default::default()
        }
    }

    fn tallies(data: &ScoreData) -> Vec<Option<f64>> {
        data.events[0].participants.iter().map(|p| p.win_draw).collect()
    }

    #[test]
    fn test_win_loss_and_draw() {
        let mut data = swiss(vec![vp_match("1", "2", 15.0, 5.0), vp_match("2", "3", 10.0, 10.0)]);
        recalculate(&mut data);
        assert_eq!(tallies(&data), vec![Some(1.0), Some(0.5), Some(0.5)]);
    }

    #[test]
    fn test_scores_compared_without_vps() {
        let record = Match {
            number: Some("1".to_string()),
            opponent: Some("3".to_string()),
            score: Some(-12.0),
            opposing_score: Some(12.0),
            ..Default::default()
        };
        let mut data = swiss(vec![record]);
        recalculate(&mut data);
        assert_eq!(tallies(&data), vec![Some(0.0), Some(0.0), Some(1.0)]);
    }

    #[test]
    fn test_rounded_vp_draws() {
        let mut data = swiss(vec![vp_match("1", "2", 10.4, 9.6)]);
        recalculate(&mut data);
        assert_eq!(tallies(&data)[..2], [Some(1.0), Some(0.0)]);

        data.round_continuous_vp_draws = true;
        recalculate(&mut data);
        assert_eq!(tallies(&data)[..2], [Some(0.5), Some(0.5)]);
    }

    #[test]
    fn test_recalculate_is_idempotent() {
        let mut data = swiss(vec![vp_match("1", "2", 15.0, 5.0), vp_match("2", "1", 8.0, 12.0)]);
        data.merge_matches = true;
        recalculate(&mut data);
        let first = serde_json::to_string(&data).unwrap();
        recalculate(&mut data);
        assert_eq!(serde_json::to_string(&data).unwrap(), first);
    }

    #[test]
    fn test_merge_flips_reversed_records() {
        let mut matches = vec![
            Match {
                score: Some(10.0),
                opposing_score: Some(-10.0),
                ..vp_match("1", "2", 14.0, 6.0)
            },
            Match {
                score: Some(4.0),
                opposing_score: Some(-4.0),
                ..vp_match("2", "1", 12.0, 8.0)
            },
            vp_match("1", "3", 11.0, 9.0),
        ];
        matches[1].pairs.own.insert("21".to_string());
        matches[1].pairs.opposing.insert("11".to_string());

        let absorbed = merge_matches(&mut matches, ScoringMethod::Imps);
        assert_eq!(absorbed, 1);
        assert_eq!(matches.len(), 2);
        let merged = &matches[0];
        assert_eq!(merged.score, Some(6.0));
        assert_eq!(merged.opposing_score, Some(-6.0));
        assert_eq!(merged.vp, Some(22.0));
        assert_eq!(merged.opposing_vp, Some(18.0));
        assert!(merged.pairs.own.contains("11"));
        assert!(merged.pairs.opposing.contains("21"));
    }

    #[test]
    fn test_board_granularity_rescores_vps() {
        let record = Match {
            number: Some("1".to_string()),
            opponent: Some("2".to_string()),
            vp: Some(0.0),
            opposing_vp: Some(20.0),
            boards: [5.0, -2.0, 3.0]
                .iter()
                .map(|&imps| Board {
                    ns_score: Some(imps),
                    ew_score: Some(-imps),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };
        let mut data = swiss(vec![record]);
        data.win_draw = WinDrawGranularity::Board;
        let changes = recalculate(&mut data);

        let rescored = &data.events[0].matches[0];
        assert_eq!(rescored.score, Some(6.0));
        let vp = rescored.vp.unwrap();
        assert!(vp > 10.0 && vp < 20.0);
        assert!((rescored.opposing_vp.unwrap() - (20.0 - vp)).abs() < 1e-9);
        assert_eq!(tallies(&data)[..2], [Some(1.0), Some(0.0)]);
        assert!(changes.iter().any(|c| c.contains("rescored from board results")));
    }

    fn board_match(values: &[f64]) -> Match {
        Match {
            number: Some("1".to_string()),
            opponent: Some("2".to_string()),
            boards: values
                .iter()
                .map(|&value| Board {
                    ns_score: Some(value),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    fn by_boards(record: Match, board: ScoringMethod, matched: ScoringMethod) -> ScoreData {
        let mut data = swiss(vec![record]);
        data.win_draw = WinDrawGranularity::Board;
        data.vp_style = VpStyle::Discrete;
        data.events[0].board_scoring = Some(board);
        data.events[0].match_scoring = Some(matched);
        data
    }

    #[test]
    fn test_match_point_boards_convert_through_percentage_scale() {
        let mut data = by_boards(
            board_match(&[60.0, 70.0]),
            ScoringMethod::MatchPoints,
            ScoringMethod::VictoryPoints,
        );
        recalculate(&mut data);

        let rescored = &data.events[0].matches[0];
        assert_eq!(rescored.score, Some(65.0));
        assert_eq!(rescored.opposing_score, Some(35.0));
        // 65% over two boards reaches the fifth cutoff.
        assert_eq!(rescored.vp, Some(15.0));
        assert_eq!(rescored.opposing_vp, Some(5.0));
        assert_eq!(tallies(&data)[..2], [Some(1.0), Some(0.0)]);
    }

    #[test]
    fn test_aggregate_boards_convert_to_imps_then_vps() {
        let mut data = by_boards(
            board_match(&[420.0, -50.0, 100.0]),
            ScoringMethod::Aggregate,
            ScoringMethod::VictoryPoints,
        );
        recalculate(&mut data);

        let rescored = &data.events[0].matches[0];
        assert_eq!(rescored.score, Some(470.0));
        assert_eq!(rescored.opposing_score, Some(-470.0));
        // 470 points is 10 IMPs.
        let vp = discrete_vp(10.0, 3, 20);
        assert!(vp > 10.0);
        assert_eq!(rescored.vp, Some(vp));
        assert_eq!(rescored.opposing_vp, Some(20.0 - vp));
    }

    #[test]
    fn test_aggregate_boards_convert_to_imp_match_scores() {
        let mut data = by_boards(
            board_match(&[-420.0, -50.0, 100.0]),
            ScoringMethod::Aggregate,
            ScoringMethod::Imps,
        );
        recalculate(&mut data);

        let rescored = &data.events[0].matches[0];
        assert_eq!(rescored.score, Some(-9.0));
        assert_eq!(rescored.opposing_score, Some(9.0));
        assert_eq!(rescored.vp, None);
        assert_eq!(tallies(&data)[..2], [Some(0.0), Some(1.0)]);
    }

    #[test]
    fn test_discrete_style_gives_whole_vps() {
        let mut data = by_boards(
            board_match(&[5.0, -2.0, 3.0]),
            ScoringMethod::Imps,
            ScoringMethod::VictoryPoints,
        );
        recalculate(&mut data);

        let vp = data.events[0].matches[0].vp.unwrap();
        assert_eq!(vp, discrete_vp(6.0, 3, 20));
        assert_eq!(vp.fract(), 0.0);
    }

    #[test]
    fn test_board_granularity_without_boards_keeps_match_totals() {
        let mut data = swiss(vec![vp_match("1", "2", 12.0, 8.0)]);
        data.win_draw = WinDrawGranularity::Board;
        let changes = recalculate(&mut data);

        assert!(changes.iter().any(|c| c.contains("no board results recorded")));
        assert_eq!(data.events[0].matches[0].vp, Some(12.0));
        assert_eq!(tallies(&data)[..2], [Some(1.0), Some(0.0)]);
    }

    #[test]
    fn test_large_team_credits_pairs() {
        let mut data = swiss(vec![]);
        data.events[0].participants[0] = team("1", &["11", "12", "13"]);
        let mut record = vp_match("1", "2", 16.0, 4.0);
        record.pairs.own.insert("11".to_string());
        record.pairs.own.insert("13".to_string());
        data.events[0].matches.push(record);

        recalculate(&mut data);
        let Member::Team(team) = &data.events[0].participants[0].member else {
            panic!("expected a team");
        };
        let pair_tallies: Vec<Option<f64>> = team.pairs.iter().map(|p| p.win_draw).collect();
        assert_eq!(pair_tallies, vec![Some(1.0), Some(0.0), Some(1.0)]);
    }

    #[test]
    fn test_participant_granularity_is_untouched() {
        let mut data = swiss(vec![vp_match("1", "2", 15.0, 5.0)]);
        data.win_draw = WinDrawGranularity::Participant;
        data.events[0].participants[0].win_draw = Some(7.0);
        assert!(recalculate(&mut data).is_empty());
        assert_eq!(data.events[0].participants[0].win_draw, Some(7.0));
    }

    #[test]
    fn test_events_without_win_draw_are_skipped() {
        let mut data = swiss(vec![vp_match("1", "2", 15.0, 5.0)]);
        data.events[0].event_type = EventType::MpPairs;
        recalculate(&mut data);
        assert_eq!(tallies(&data), vec![None, None, None]);
    }

    #[test]
    fn test_falls_back_to_other_session() {
        let mut data = swiss(vec![]);
        let mut other = data.with_same_flags();
        let mut copy = data.events[0].header_copy();
        copy.matches.push(vp_match("2", "3", 18.0, 2.0));
        other.events.push(copy);
        data.other_session = Some(Box::new(other));

        let changes = recalculate(&mut data);
        assert!(data.events[0].uses_other_session);
        assert_eq!(tallies(&data), vec![Some(0.0), Some(1.0), Some(0.0)]);
        assert!(changes.iter().any(|c| c.contains("another session")));
    }
}
