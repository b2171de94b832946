//! Passes run over a freshly parsed model before recalculation.

use crate::model::{Event, Member, ScoreData};
use crate::recalc;
use crate::types::{Direction, ParseOptions, ParticipantKind, ScoringMethod};
use std::cmp::Ordering;
use tracing::debug;

/// Runs the number filter, scoring defaults, match number resolution and
/// place derivation over every event, including other-session events, then
/// recalculates win/draw. Returns the recalculation messages.
pub fn finish(data: &mut ScoreData, options: &ParseOptions) -> Vec<String> {
    for event in &mut data.events {
        finish_event(event, options);
    }
    if let Some(other) = data.other_session.as_deref_mut() {
        for event in &mut other.events {
            finish_event(event, options);
        }
    }
    recalc::recalculate(data)
}

fn finish_event(event: &mut Event, options: &ParseOptions) {
    apply_number_filter(event, options.min_number.as_deref(), options.max_number.as_deref());
    default_board_scoring(event);
    resolve_match_numbers(event);
    derive_places(event);
}

/// True when `number` lies within the inclusive bounds. The comparison is
/// numeric when the number and every supplied bound parse as numbers,
/// lexical otherwise.
pub fn within_bounds(number: &str, min: Option<&str>, max: Option<&str>) -> bool {
    let numeric = |value: &str| value.trim().parse::<f64>().ok();
    let all_numeric = numeric(number).is_some()
        && min.map_or(true, |m| numeric(m).is_some())
        && max.map_or(true, |m| numeric(m).is_some());

    let compare = |bound: &str| -> Ordering {
        if all_numeric {
            let (a, b) = (numeric(number).unwrap_or_default(), numeric(bound).unwrap_or_default());
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        } else {
            number.trim().cmp(bound.trim())
        }
    };

    min.map_or(true, |m| compare(m) != Ordering::Less)
        && max.map_or(true, |m| compare(m) != Ordering::Greater)
}

/// Drops participants whose number falls outside the bounds, then
/// renumbers the remaining places contiguously from 1 in original place
/// order. Participants that shared a place still share one.
pub fn apply_number_filter(event: &mut Event, min: Option<&str>, max: Option<&str>) {
    if min.is_none() && max.is_none() {
        return;
    }
    let before = event.participants.len();
    event.participants.retain(|participant| {
        participant
            .member
            .number()
            .map_or(true, |number| within_bounds(number, min, max))
    });
    let dropped = before - event.participants.len();
    if dropped == 0 {
        return;
    }
    debug!("Number filter dropped {} participants", dropped);

    for group in direction_groups(event) {
        let mut placed: Vec<(usize, u32)> = group
            .into_iter()
            .filter_map(|i| event.participants[i].place.map(|place| (i, place)))
            .collect();
        placed.sort_by_key(|&(_, place)| place);

        let mut previous: Option<(u32, u32)> = None;
        for (index, original) in placed {
            let place = match previous {
                Some((last_original, last_place)) if last_original == original => last_place,
                Some((_, last_place)) => last_place + 1,
                None => 1,
            };
            event.participants[index].place = Some(place);
            previous = Some((original, place));
        }
    }
}

/// Team events default to IMPs, everything else to match points.
pub fn default_board_scoring(event: &mut Event) {
    if event.board_scoring.is_none() {
        let method = match event.participant_kind() {
            ParticipantKind::Team => ScoringMethod::Imps,
            _ => ScoringMethod::MatchPoints,
        };
        debug!("Defaulting board scoring to {:?}", method);
        event.board_scoring = Some(method);
    }
}

/// Fills a match's missing participant numbers from the pair numbers
/// recorded on its traveller lines.
pub fn resolve_match_numbers(event: &mut Event) {
    let Event {
        participants,
        matches,
        ..
    } = event;

    let owner_of = |pairs: &std::collections::BTreeSet<String>| -> Option<String> {
        if pairs.is_empty() {
            return None;
        }
        participants.iter().find_map(|participant| match &participant.member {
            Member::Team(team) => {
                let numbers = team.pairs.iter().filter_map(|p| p.number.as_deref());
                let owns_all = pairs.iter().all(|n| numbers.clone().any(|m| m == n));
                if owns_all {
                    team.number.clone()
                } else {
                    None
                }
            }
            Member::Pair(pair) if pairs.len() == 1 && pair.number.as_ref() == pairs.iter().next() => {
                pair.number.clone()
            }
            _ => None,
        })
    };

    for record in matches.iter_mut().filter(|m| !m.pairs.is_empty()) {
        if record.number.is_none() {
            record.number = owner_of(&record.pairs.own);
        }
        if record.opponent.is_none() {
            record.opponent = owner_of(&record.pairs.opposing);
        }
    }
}

/// Assigns places from scores when any participant lacks one. Scores are
/// ranked descending; equal scores share a place and the next distinct
/// score takes its ordinal position. Two-winner events rank each
/// direction on its own.
pub fn derive_places(event: &mut Event) {
    if event.participants.iter().all(|p| p.place.is_some()) {
        return;
    }
    debug!("Deriving places for {} participants", event.participants.len());

    for group in direction_groups(event) {
        let mut order = group;
        order.sort_by(|&a, &b| {
            let (x, y) = (event.participants[a].score, event.participants[b].score);
            match (x, y) {
                (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        });

        let mut previous: Option<(Option<f64>, u32)> = None;
        for (ordinal, index) in order.into_iter().enumerate() {
            let score = event.participants[index].score;
            let place = match previous {
                Some((last_score, last_place)) if last_score == score => last_place,
                _ => ordinal as u32 + 1,
            };
            event.participants[index].place = Some(place);
            previous = Some((score, place));
        }
    }
}

/// Participant indices grouped by direction for two-winner events, or a
/// single group otherwise.
fn direction_groups(event: &Event) -> Vec<Vec<usize>> {
    let all: Vec<usize> = (0..event.participants.len()).collect();
    if event.winner_count() != 2 {
        return vec![all];
    }
    let of = |direction: Option<Direction>| -> Vec<usize> {
        all.iter()
            .copied()
            .filter(|&i| event.participants[i].member.direction() == direction)
            .collect()
    };
    vec![of(Some(Direction::NS)), of(Some(Direction::EW)), of(None)]
}
