use crate::base_parser::{decode, split_rows, Parser};
use crate::fields;
use crate::model::{Event, Member, Pair, Participant, Player, ScoreData};
use crate::types::{is_truthy, Direction, EventType, ParseError, ParseOptions, ScoringMethod};
use std::collections::HashMap;
use tracing::{debug, info};

/// Phases of a tag-CSV file. A `#TAG` row moves to the phase named by the
/// tag, which must be a successor of the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Start,
    Version,
    Detail,
    Scores,
    ScoresHeader,
    Score,
    BoardFormat,
    TravellersHeader,
    Travellers,
    Board,
    Traveller,
}

impl Phase {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "VERSION" => Some(Phase::Version),
            "LINE" | "DATE" | "TITLE" | "DIRECTOR" | "SCORER" | "PAIRS" | "BOARDS" | "WINNERS"
            | "ROUNDS" => Some(Phase::Detail),
            "SCORES" => Some(Phase::Scores),
            "SCORESHEADER" => Some(Phase::ScoresHeader),
            "SCORE" => Some(Phase::Score),
            "BOARDFORMAT" => Some(Phase::BoardFormat),
            "TRAVELLERSHEADER" => Some(Phase::TravellersHeader),
            "TRAVELLERS" => Some(Phase::Travellers),
            "BOARD" => Some(Phase::Board),
            "TRAVELLER" => Some(Phase::Traveller),
            _ => None,
        }
    }

    fn successors(self) -> &'static [Phase] {
        match self {
            Phase::Start => &[Phase::Version],
            Phase::Version | Phase::Detail => &[Phase::Detail, Phase::Scores],
            Phase::Scores => &[Phase::ScoresHeader],
            Phase::ScoresHeader => &[Phase::Score],
            Phase::Score => &[Phase::Score, Phase::Scores, Phase::BoardFormat],
            Phase::BoardFormat => &[Phase::TravellersHeader],
            Phase::TravellersHeader => &[Phase::Travellers],
            Phase::Travellers => &[Phase::Board],
            Phase::Board => &[Phase::Traveller],
            Phase::Traveller => &[Phase::Traveller, Phase::Board],
        }
    }

    fn name(self) -> &'static str {
        match self {
            Phase::Start => "start of file",
            Phase::Version => "VERSION",
            Phase::Detail => "header detail",
            Phase::Scores => "SCORES",
            Phase::ScoresHeader => "SCORESHEADER",
            Phase::Score => "SCORE",
            Phase::BoardFormat => "BOARDFORMAT",
            Phase::TravellersHeader => "TRAVELLERSHEADER",
            Phase::Travellers => "TRAVELLERS",
            Phase::Board => "BOARD",
            Phase::Traveller => "TRAVELLER",
        }
    }
}

/// Upper-cased header cell → column index.
type ColumnMap = HashMap<String, usize>;

fn column_map(cells: &[String]) -> ColumnMap {
    cells
        .iter()
        .enumerate()
        .map(|(index, name)| (name.trim().to_uppercase(), index))
        .collect()
}

fn cell<'a>(columns: &ColumnMap, row: &'a [String], name: &str) -> &'a str {
    columns
        .get(name)
        .and_then(|&index| row.get(index))
        .map(String::as_str)
        .unwrap_or_default()
}

/// Tag-CSV parser for percentage/IMP pairs results with travellers.
pub struct TagCsvParser;

impl Parser for TagCsvParser {
    fn name(&self) -> &'static str {
        "tag-csv"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["csv"]
    }

    fn can_parse(&self, data: &[u8]) -> bool {
        let Ok(text) = decode(data) else {
            return false;
        };
        text.trim_start()
            .trim_start_matches('#')
            .to_uppercase()
            .starts_with("VERSION")
    }

    fn read(&self, data: &[u8], options: &ParseOptions) -> Result<ScoreData, ParseError> {
        let rows = split_rows(decode(data)?)?;
        info!("Starting tag-CSV parsing of {} rows", rows.len());

        let mut state = TagState::new();
        for row in &rows {
            state.row(row)?;
        }
        state.finish(options)
    }
}

struct TagState {
    phase: Phase,
    event: Event,
    pairs: bool,
    rounds_supplied: bool,
    score_columns: ColumnMap,
    traveller_columns: ColumnMap,
    sections: u32,
    board: Option<u32>,
}

impl TagState {
    fn new() -> Self {
        Self {
            phase: Phase::Start,
            event: Event::new(EventType::ImpPairs),
            pairs: true,
            rounds_supplied: false,
            score_columns: ColumnMap::new(),
            traveller_columns: ColumnMap::new(),
            sections: 0,
            board: None,
        }
    }

    fn row(&mut self, row: &[String]) -> Result<(), ParseError> {
        let first = row.first().map(String::as_str).unwrap_or_default();
        let tag = first.trim_start_matches('#').trim().to_uppercase();
        // A tag occupies the first column; untagged rows are all values.
        let values = row.get(1..).unwrap_or_default();

        match Phase::from_tag(&tag) {
            Some(next) => {
                if !self.phase.successors().contains(&next) {
                    return Err(ParseError::IllegalTransition {
                        from: self.phase.name().to_string(),
                        to: tag,
                    });
                }
                self.phase = next;
                self.enter(&tag, values)
            }
            None if first.starts_with('#') => Err(ParseError::UnknownTag(tag)),
            None => self.data(row),
        }
    }

    /// Handles the row that selected the current phase.
    fn enter(&mut self, tag: &str, values: &[String]) -> Result<(), ParseError> {
        let value = values.first().map(String::as_str).unwrap_or_default();
        match self.phase {
            Phase::Version => {
                debug!("Tag-CSV version {}", value);
                self.event.program_version = fields::text(value);
            }
            Phase::Detail => self.detail(tag, value),
            Phase::Scores => {
                self.sections += 1;
                debug!("Scores section {}", self.sections);
            }
            Phase::ScoresHeader => {
                self.score_columns = column_map(values);
                for required in ["PAIR", "NAME1"] {
                    if !self.score_columns.contains_key(required) {
                        return Err(ParseError::MissingHeader(required.to_string()));
                    }
                }
            }
            Phase::TravellersHeader => {
                self.traveller_columns = column_map(values);
                let individual = ["N", "S", "E", "W"]
                    .iter()
                    .all(|seat| self.traveller_columns.contains_key(*seat));
                if !individual {
                    for required in ["NS", "EW"] {
                        if !self.traveller_columns.contains_key(required) {
                            return Err(ParseError::MissingHeader(required.to_string()));
                        }
                    }
                }
            }
            Phase::Board => self.board = fields::count(value),
            Phase::Score | Phase::Traveller => return self.data(values),
            Phase::Start | Phase::BoardFormat | Phase::Travellers => {}
        }
        Ok(())
    }

    fn detail(&mut self, tag: &str, value: &str) {
        let event = &mut self.event;
        match tag {
            "DATE" => event.date = fields::text(value),
            "TITLE" => event.title = fields::text(value),
            "DIRECTOR" => event.contact = fields::text(value).or(event.contact.take()),
            "SCORER" => event.contact = event.contact.take().or(fields::text(value)),
            "PAIRS" => self.pairs = value.trim().is_empty() || is_truthy(value),
            "BOARDS" => event.boards = fields::count(value),
            "WINNERS" => event.winners = fields::count(value),
            "ROUNDS" => {
                event.rounds = fields::count(value);
                self.rounds_supplied = event.rounds.is_some();
            }
            _ => {}
        }
    }

    /// A data row for the current phase.
    fn data(&mut self, values: &[String]) -> Result<(), ParseError> {
        match self.phase {
            Phase::Score => {
                self.score(values);
                Ok(())
            }
            Phase::Traveller => {
                self.traveller(values);
                Ok(())
            }
            // Free text under #LINE and the board format description.
            Phase::Detail | Phase::BoardFormat | Phase::Travellers => Ok(()),
            phase => Err(ParseError::Structure(format!(
                "unexpected data row in {} section",
                phase.name()
            ))),
        }
    }

    fn score(&mut self, values: &[String]) {
        let columns = &self.score_columns;
        let number = fields::text(cell(columns, values, "PAIR"));
        let first = cell(columns, values, "NAME1").to_string();

        let member = if self.pairs {
            let direction = match self.sections {
                1 => Some(Direction::NS),
                2 => Some(Direction::EW),
                _ => None,
            };
            Member::Pair(Pair {
                number,
                players: vec![
                    Player::named(first),
                    Player::named(cell(columns, values, "NAME2")),
                ],
                direction,
                ..Default::default()
            })
        } else {
            Member::Player(Player {
                number,
                ..Player::named(first)
            })
        };

        let mut participant = Participant::new(member);
        participant.place = fields::place(cell(columns, values, "POSITION"));
        participant.score = fields::number(cell(columns, values, "PERCENT"));
        self.event.participants.push(participant);
    }

    fn traveller(&mut self, values: &[String]) {
        let columns = &self.traveller_columns;
        let seats: Vec<(String, Option<Direction>)> = if self.pairs {
            [("NS", Direction::NS), ("EW", Direction::EW)]
                .iter()
                .filter_map(|(column, direction)| {
                    fields::text(cell(columns, values, column)).map(|n| (n, Some(*direction)))
                })
                .collect()
        } else {
            ["N", "S", "E", "W", "NS", "EW"]
                .iter()
                .filter_map(|column| fields::text(cell(columns, values, column)).map(|n| (n, None)))
                .collect()
        };

        let split = self.sections > 1;
        for (number, direction) in seats {
            let found = self.event.participants.iter_mut().find(|p| {
                p.member.number() == Some(number.as_str())
                    && (!split || direction.is_none() || p.member.direction() == direction)
            });
            match found.map(|p| &mut p.member) {
                Some(Member::Pair(pair)) => {
                    pair.boards_played = Some(pair.boards_played.unwrap_or_default() + 1.0);
                }
                Some(Member::Player(player)) => player.boards_played += 1.0,
                _ => debug!(
                    "Traveller for board {:?} names unknown number {}",
                    self.board, number
                ),
            }
        }
    }

    fn finish(mut self, options: &ParseOptions) -> Result<ScoreData, ParseError> {
        let scored = matches!(
            self.phase,
            Phase::Score
                | Phase::BoardFormat
                | Phase::TravellersHeader
                | Phase::Travellers
                | Phase::Board
                | Phase::Traveller
        );
        if !scored || self.event.participants.is_empty() {
            return Err(ParseError::Structure("file ends before any score rows".into()));
        }

        if self.sections < 2 {
            for participant in &mut self.event.participants {
                if let Member::Pair(pair) = &mut participant.member {
                    pair.direction = None;
                }
            }
        }

        let event = &mut self.event;
        event.event_type = match options.event_type.as_deref() {
            Some(overridden) => EventType::parse(overridden),
            None if self.pairs => EventType::ImpPairs,
            None => EventType::Individual,
        };
        event.board_scoring = Some(ScoringMethod::Imps);
        event.match_scoring = Some(ScoringMethod::Imps);
        if self.rounds_supplied {
            if let (Some(boards), Some(rounds)) = (event.boards, event.rounds) {
                if boards > 0 && rounds > 0 {
                    event.boards_per_round = Some(boards / rounds);
                }
            }
        }

        info!(
            "Tag-CSV parsing complete: {} participants in {} sections",
            event.participants.len(),
            self.sections
        );

        Ok(ScoreData {
            version: Some("1.2".to_string()),
            events: vec![self.event],
            clubs: options.club.clone().into_iter().collect(),
            win_draw: options.win_draw.unwrap_or_default(),
            vp_style: options.vp_style.unwrap_or_default(),
            merge_matches: options.merge_matches,
            scoring: options.scoring,
            ..Default::default()
        })
    }
}
