//! Wide-CSV parser: one participant per row, with team and pair rosters
//! flattened into indexed columns such as `Name (2)` or `Wins (3)`.

use crate::base_parser::{decode, split_rows, Parser};
use crate::fields;
use crate::model::{Event, Member, Participant, Player, ScoreData};
use crate::types::{
    is_truthy, Direction, EventType, ParseError, ParseOptions, ParticipantKind, ScoringMethod,
};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Start,
    Instructions,
    ParametersHeader,
    Parameters,
    RoundHeader,
    Round,
    ParticipantsHeader,
    Participants,
}

impl Section {
    /// Section named by a marker cell, if any.
    fn marker(cell: &str) -> Option<Self> {
        match cell.trim().to_uppercase().as_str() {
            "INSTRUCTIONS" => Some(Section::Instructions),
            "PARAMETERS" => Some(Section::ParametersHeader),
            "ROUND" => Some(Section::RoundHeader),
            "PARTICIPANTS" => Some(Section::ParticipantsHeader),
            _ => None,
        }
    }

    /// Section a value row continues.
    fn values(self) -> Option<Self> {
        match self {
            Section::Instructions => Some(Section::Instructions),
            Section::ParametersHeader | Section::Parameters => Some(Section::Parameters),
            Section::RoundHeader | Section::Round => Some(Section::Round),
            Section::ParticipantsHeader | Section::Participants => Some(Section::Participants),
            Section::Start => None,
        }
    }

    fn successors(self) -> &'static [Section] {
        match self {
            Section::Start => &[Section::Instructions, Section::ParametersHeader],
            Section::Instructions => &[Section::Instructions, Section::ParametersHeader],
            Section::ParametersHeader => &[Section::Parameters],
            Section::Parameters => &[Section::Parameters, Section::RoundHeader],
            Section::RoundHeader => &[Section::Round],
            Section::Round => &[Section::Round, Section::ParticipantsHeader],
            Section::ParticipantsHeader => &[Section::Participants],
            Section::Participants => &[Section::Participants],
        }
    }

    fn name(self) -> &'static str {
        match self {
            Section::Start => "start of file",
            Section::Instructions => "INSTRUCTIONS",
            Section::ParametersHeader => "PARAMETERS header",
            Section::Parameters => "PARAMETERS",
            Section::RoundHeader => "ROUND header",
            Section::Round => "ROUND",
            Section::ParticipantsHeader => "PARTICIPANTS header",
            Section::Participants => "PARTICIPANTS",
        }
    }
}

/// Participant column meanings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Place,
    Direction,
    Number,
    Score,
    BoardsPlayed,
    WinsDraws,
    Wins,
    Draws,
    Name,
    FirstName,
    OtherNames,
    NationalId,
    ManualPoints,
    Ignored,
}

impl Field {
    fn is_participant_only(self) -> bool {
        matches!(
            self,
            Field::Place | Field::Direction | Field::Score | Field::ManualPoints
        )
    }

    /// Fields naming or identifying a player.
    fn is_identity(self) -> bool {
        matches!(
            self,
            Field::Name | Field::FirstName | Field::OtherNames | Field::NationalId
        )
    }

    fn parse(name: &str) -> Self {
        match name {
            "PLACE" => Field::Place,
            "DIRECTION" => Field::Direction,
            "NUMBER" => Field::Number,
            "SCORE" => Field::Score,
            "BOARDS PLAYED" => Field::BoardsPlayed,
            "WINS/DRAWS" => Field::WinsDraws,
            "WINS" => Field::Wins,
            "DRAWS" => Field::Draws,
            "NAME" | "NAMES" => Field::Name,
            "FIRST NAME" | "FIRST NAMES" => Field::FirstName,
            "OTHER NAME" | "OTHER NAMES" => Field::OtherNames,
            "NATIONAL ID" | "NATIONAL IDS" => Field::NationalId,
            "MANUAL MPS" => Field::ManualPoints,
            _ => Field::Ignored,
        }
    }
}

/// A participant header cell: its meaning plus an optional 1-based player
/// index from a `(n)` suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Column {
    field: Field,
    player: Option<usize>,
}

/// Largest `(n)` player index a participants header may use.
const PLAYER_INDEX_LIMIT: usize = 64;

impl Column {
    fn parse(header: &str) -> Result<Self, ParseError> {
        let header = header.trim().to_uppercase();
        let (name, player) = match header.strip_suffix(')').and_then(|h| h.rsplit_once('(')) {
            Some((name, index)) => match index.trim().parse::<usize>() {
                Ok(index) if index > 0 => (name.trim().to_string(), Some(index)),
                _ => (header.clone(), None),
            },
            None => (header.clone(), None),
        };
        if let Some(index) = player.filter(|&i| i > PLAYER_INDEX_LIMIT) {
            return Err(ParseError::Structure(format!(
                "column {} addresses player {}, the limit is {}",
                header, index, PLAYER_INDEX_LIMIT
            )));
        }
        Ok(Self {
            field: Field::parse(&name),
            player,
        })
    }
}

/// Name parts gathered for one player while a row is read.
#[derive(Debug, Default)]
struct NameParts {
    name: Option<String>,
    first: Option<String>,
    other: Option<String>,
}

impl NameParts {
    fn compose(self) -> Option<String> {
        self.name.or_else(|| {
            let joined = [self.first, self.other]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ");
            fields::text(&joined)
        })
    }
}

/// Wide-CSV parser
pub struct WideCsvParser;

impl Parser for WideCsvParser {
    fn name(&self) -> &'static str {
        "wide-csv"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["csv"]
    }

    fn can_parse(&self, data: &[u8]) -> bool {
        let Ok(text) = decode(data) else {
            return false;
        };
        let leading = text.trim_start().to_uppercase();
        leading.starts_with("PARAMETERS") || leading.starts_with("INSTRUCTIONS")
    }

    fn read(&self, data: &[u8], options: &ParseOptions) -> Result<ScoreData, ParseError> {
        let rows = split_rows(decode(data)?)?;
        info!("Starting wide-CSV parsing of {} rows", rows.len());

        let mut state = WideState::new(options);
        for row in &rows {
            state.row(row)?;
        }
        state.finish()
    }
}

struct WideState<'a> {
    options: &'a ParseOptions,
    section: Section,
    header: Vec<String>,
    columns: Vec<Column>,
    event: Event,
    max_players: Option<usize>,
    win_bonus: bool,
}

impl<'a> WideState<'a> {
    fn new(options: &'a ParseOptions) -> Self {
        Self {
            options,
            section: Section::Start,
            header: Vec::new(),
            columns: Vec::new(),
            event: Event::new(EventType::MpPairs),
            max_players: None,
            win_bonus: false,
        }
    }

    fn row(&mut self, row: &[String]) -> Result<(), ParseError> {
        let first = row.first().map(String::as_str).unwrap_or_default();
        let cells = row.get(1..).unwrap_or_default();

        let next = match Section::marker(first) {
            Some(marker) => marker,
            None => self.section.values().ok_or_else(|| ParseError::IllegalTransition {
                from: self.section.name().to_string(),
                to: "value row".to_string(),
            })?,
        };
        // Anything may follow the instructions until PARAMETERS begins.
        if self.section == Section::Instructions && next != Section::ParametersHeader {
            return Ok(());
        }
        if !self.section.successors().contains(&next) {
            return Err(ParseError::IllegalTransition {
                from: self.section.name().to_string(),
                to: next.name().to_string(),
            });
        }
        self.section = next;

        match next {
            Section::ParametersHeader | Section::RoundHeader => {
                self.header = cells.iter().map(|c| c.trim().to_uppercase()).collect();
            }
            Section::ParticipantsHeader => {
                self.header = cells.iter().map(|c| c.trim().to_uppercase()).collect();
                self.columns = cells
                    .iter()
                    .map(|c| Column::parse(c))
                    .collect::<Result<_, _>>()?;
            }
            Section::Parameters | Section::Round | Section::Participants => {
                if cells.len() != self.header.len() {
                    return Err(ParseError::ColumnCountMismatch {
                        section: next.name().to_string(),
                        expected: self.header.len(),
                        found: cells.len(),
                    });
                }
                match next {
                    Section::Parameters => self.parameters(cells),
                    Section::Round => self.round(cells),
                    _ => self.participant(cells),
                }
            }
            Section::Start | Section::Instructions => {}
        }
        Ok(())
    }

    fn parameters(&mut self, cells: &[String]) {
        for (key, value) in self.header.iter().zip(cells) {
            match key.as_str() {
                "ROUND TYPE" => {
                    if fields::text(value).is_some() {
                        self.event.event_type = EventType::parse(value);
                    }
                }
                "MAX PLAYERS" => self.max_players = fields::count(value).map(|n| n as usize),
                "WINNERS" => self.event.winners = fields::count(value),
                "WIN BONUS" => self.win_bonus = is_truthy(value),
                "VERSION" => self.event.program_version = fields::text(value),
                other => debug!("Ignoring parameter {}", other),
            }
        }
    }

    fn round(&mut self, cells: &[String]) {
        let event = &mut self.event;
        for (key, value) in self.header.iter().zip(cells) {
            match key.as_str() {
                "ROUND NAME" => event.title = fields::text(value),
                "ROUND DATE" => event.date = fields::text(value),
                "CONTACT" => event.contact = fields::text(value),
                "BOARDS" => event.boards = fields::count(value),
                "ROUNDS" => event.rounds = fields::count(value),
                "BOARD SCORING" => event.board_scoring = ScoringMethod::parse(value),
                "MATCH SCORING" => event.match_scoring = ScoringMethod::parse(value),
                other => debug!("Ignoring round field {}", other),
            }
        }
    }

    fn participant(&mut self, cells: &[String]) {
        let kind = self
            .options
            .event_type
            .as_deref()
            .map(EventType::parse)
            .unwrap_or_else(|| self.event.event_type.clone())
            .participant_kind();
        let mut participant = Participant::new(Member::for_kind(kind));
        let mut names: Vec<NameParts> = Vec::new();

        for (column, value) in self.columns.iter().zip(cells) {
            if value.trim().is_empty() || column.field == Field::Ignored {
                continue;
            }
            let index = match column.player {
                Some(index) if !column.field.is_participant_only() => index,
                None if column.field.is_identity() && kind == ParticipantKind::Player => 1,
                _ => {
                    bind_participant(&mut participant, column.field, value);
                    continue;
                }
            };
            if self.max_players.is_some_and(|max| index > max) {
                debug!("Player index {} above MAX PLAYERS", index);
                continue;
            }
            if names.len() < index {
                names.resize_with(index, NameParts::default);
            }
            match player_slot(&mut participant.member, index) {
                Some(player) => bind_player(player, &mut names[index - 1], column.field, value),
                None => warn!("No player {} in a {} participant", index, kind),
            }
        }

        for (index, parts) in names.into_iter().enumerate() {
            if let Some(name) = parts.compose() {
                if let Some(player) = player_slot(&mut participant.member, index + 1) {
                    player.name = name;
                }
            }
        }
        if let Member::Team(team) = &mut participant.member {
            team.players
                .retain(|p| !p.name.is_empty() || p.known_national_id().is_some());
        }

        self.event.participants.push(participant);
    }

    fn finish(mut self) -> Result<ScoreData, ParseError> {
        if !matches!(
            self.section,
            Section::ParticipantsHeader | Section::Participants
        ) {
            return Err(ParseError::Structure(format!(
                "file ends in the {} section without participants",
                self.section.name()
            )));
        }

        let event = &mut self.event;
        if let Some(overridden) = self.options.event_type.as_deref() {
            event.event_type = EventType::parse(overridden);
        }
        if self.win_bonus {
            event.event_type = event.event_type.swiss_variant();
        }
        if let (Some(boards), Some(rounds)) = (event.boards, event.rounds) {
            if boards > 0 && rounds > 0 {
                event.boards_per_round = Some(boards / rounds);
            }
        }

        info!(
            "Wide-CSV parsing complete: {} event with {} participants",
            event.event_type,
            event.participants.len()
        );

        let options = self.options;
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

/// The `index`th (1-based) player of a member, created on demand where the
/// member's roster can grow.
fn player_slot(member: &mut Member, index: usize) -> Option<&mut Player> {
    match member {
        Member::Player(player) => (index == 1).then_some(player),
        Member::Pair(pair) => {
            if index > 2 {
                return None;
            }
            if pair.players.len() < index {
                pair.players.resize_with(index, Player::default);
            }
            pair.players.get_mut(index - 1)
        }
        Member::Team(team) => {
            if team.players.len() < index {
                team.players.resize_with(index, Player::default);
            }
            team.players.get_mut(index - 1)
        }
    }
}

fn wins_and_draws(field: Field, value: &str) -> Option<f64> {
    let n = fields::number(value)?;
    match field {
        Field::Wins => Some(n.round()),
        Field::Draws => Some((n * 0.5 * 10.0).round() / 10.0),
        _ => Some(n),
    }
}

fn add(total: Option<f64>, amount: f64) -> Option<f64> {
    Some(total.unwrap_or_default() + amount)
}

fn bind_participant(participant: &mut Participant, field: Field, value: &str) {
    match field {
        Field::Place => participant.place = fields::place(value),
        Field::Score => participant.score = fields::number(value),
        Field::ManualPoints => participant.manual_points = fields::number(value),
        Field::Number => {
            if let Some(number) = fields::text(value) {
                participant.member.set_number(number);
            }
        }
        Field::Direction => {
            if let Member::Pair(pair) = &mut participant.member {
                pair.direction = Direction::parse(value);
            }
        }
        Field::BoardsPlayed => match &mut participant.member {
            Member::Pair(pair) => pair.boards_played = fields::number(value),
            Member::Player(player) => player.boards_played = fields::number(value).unwrap_or_default(),
            Member::Team(_) => {}
        },
        Field::WinsDraws | Field::Wins | Field::Draws => {
            if let Some(amount) = wins_and_draws(field, value) {
                participant.win_draw = add(participant.win_draw, amount);
            }
        }
        Field::Name => {
            if let Member::Team(team) = &mut participant.member {
                team.name = fields::text(value);
            } else if let Member::Pair(pair) = &mut participant.member {
                pair.name = fields::text(value);
            }
        }
        Field::FirstName | Field::OtherNames | Field::NationalId | Field::Ignored => {}
    }
}

fn bind_player(player: &mut Player, names: &mut NameParts, field: Field, value: &str) {
    match field {
        Field::Name => names.name = fields::text(value),
        Field::FirstName => names.first = fields::text(value),
        Field::OtherNames => names.other = fields::text(value),
        Field::NationalId => player.national_id = fields::text(value),
        Field::Number => player.number = fields::text(value),
        Field::BoardsPlayed => player.boards_played += fields::number(value).unwrap_or_default(),
        Field::WinsDraws | Field::Wins | Field::Draws => {
            if let Some(amount) = wins_and_draws(field, value) {
                player.win_draw = add(player.win_draw, amount);
            }
        }
        Field::Place | Field::Direction | Field::Score | Field::ManualPoints | Field::Ignored => {}
    }
}
