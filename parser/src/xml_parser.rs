//! USEBIO 1.2 parser.
//!
//! The document is walked depth first as start / text / end events. Each open
//! element owns one [`Frame`] on an explicit stack; a frame's [`FrameKind`]
//! decides which model object its children bind to.

use crate::base_parser::{decode, Parser};
use crate::fields;
use crate::model::{Board, Club, Event, Match, Member, Participant, Player, ScoreData};
use crate::types::{Direction, EventType, ParseError, ParseOptions, ParticipantKind, ScoringMethod};
use roxmltree::{Document, Node, ParsingOptions};
use tracing::{debug, info, warn};

/// Stands in for `&apos;` while the document is decoded.
const APOS_SENTINEL: &str = "\u{E000}";

/// USEBIO XML parser
pub struct UsebioParser;

impl Parser for UsebioParser {
    fn name(&self) -> &'static str {
        "usebio"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["xml", "usebio"]
    }

    fn can_parse(&self, data: &[u8]) -> bool {
        let Ok(text) = decode(data) else {
            return false;
        };
        text.trim_start().starts_with('<') && text.to_uppercase().contains("<USEBIO")
    }

    fn read(&self, data: &[u8], options: &ParseOptions) -> Result<ScoreData, ParseError> {
        info!("Starting USEBIO parsing of {} bytes", data.len());
        let text = decode(data)?.replace("&apos;", APOS_SENTINEL);
        let parsing = ParsingOptions {
            allow_dtd: true,
            ..ParsingOptions::default()
        };
        let document = Document::parse_with_options(&text, parsing)?;

        let mut walker = Walker::new(options);
        for child in document.root().children() {
            walk(child, &mut walker)?;
        }
        let score_data = walker.end_document()?;

        info!(
            "USEBIO parsing complete: {} events, {} clubs",
            score_data.events.len(),
            score_data.clubs.len()
        );
        Ok(score_data)
    }
}

/// Replays one subtree as start / text / end callbacks.
fn walk(node: Node, walker: &mut Walker) -> Result<(), ParseError> {
    if node.is_text() {
        walker.characters(&restore(node.text().unwrap_or_default()));
        return Ok(());
    }
    if !node.is_element() {
        return Ok(());
    }

    let attributes: Vec<(String, String)> = node
        .attributes()
        .map(|a| (a.name().to_string(), restore(a.value())))
        .collect();
    walker.start_element(node.tag_name().name(), &attributes)?;
    for child in node.children() {
        walk(child, walker)?;
    }
    walker.end_element();
    Ok(())
}

fn restore(value: &str) -> String {
    value.replace(APOS_SENTINEL, "'")
}

fn attribute<'a>(attributes: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.trim())
}

/// Which accumulator a frame binds into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sink {
    Primary,
    OtherSession,
}

/// Location of a player inside a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlayerSlot {
    PairPlayer(usize),
    TeamPlayer(usize),
    TeamPairPlayer(usize, usize),
}

#[derive(Debug, Clone, PartialEq)]
enum FrameKind {
    Document,
    Usebio,
    Club(usize),
    /// EVENT and its SESSION / SECTION re-entries.
    EventData,
    Contact,
    Participants,
    Participant(usize),
    TeamPair { participant: usize, pair: usize },
    Player { participant: usize, slot: PlayerSlot },
    Match(usize),
    Board { matched: usize, board: usize },
    TravellerLine {
        matched: usize,
        direction: Option<Direction>,
        ns: Option<String>,
        ew: Option<String>,
    },
    /// Leaf element whose text is bound to the parent on close.
    Field(String),
    /// Unrecognized subtree; nothing inside it is bound.
    PassThrough,
}

#[derive(Debug)]
struct Frame {
    kind: FrameKind,
    sink: Sink,
    /// Current event slot in this frame's sink.
    event: Option<usize>,
    text: String,
}

struct Walker<'a> {
    options: &'a ParseOptions,
    primary: ScoreData,
    other: Option<ScoreData>,
    /// (primary event, other-session event) header copies.
    other_events: Vec<(usize, usize)>,
    frames: Vec<Frame>,
}

impl<'a> Walker<'a> {
    fn new(options: &'a ParseOptions) -> Self {
        let primary = ScoreData {
            win_draw: options.win_draw.unwrap_or_default(),
            vp_style: options.vp_style.unwrap_or_default(),
            merge_matches: options.merge_matches,
            scoring: options.scoring,
            ..Default::default()
        };
        Self {
            options,
            primary,
            other: None,
            other_events: Vec::new(),
            frames: vec![Frame {
                kind: FrameKind::Document,
                sink: Sink::Primary,
                event: None,
                text: String::new(),
            }],
        }
    }

    fn data(&mut self, sink: Sink) -> &mut ScoreData {
        match sink {
            Sink::Primary => &mut self.primary,
            Sink::OtherSession => {
                let primary = &self.primary;
                self.other.get_or_insert_with(|| primary.with_same_flags())
            }
        }
    }

    fn event(&mut self, sink: Sink, event: Option<usize>) -> Option<&mut Event> {
        let index = event?;
        self.data(sink).events.get_mut(index)
    }

    fn participant(&mut self, sink: Sink, event: Option<usize>, index: usize) -> Option<&mut Participant> {
        self.event(sink, event)?.participants.get_mut(index)
    }

    fn matched(&mut self, sink: Sink, event: Option<usize>, index: usize) -> Option<&mut Match> {
        self.event(sink, event)?.matches.get_mut(index)
    }

    fn player(&mut self, sink: Sink, event: Option<usize>, participant: usize, slot: PlayerSlot) -> Option<&mut Player> {
        let member = &mut self.participant(sink, event, participant)?.member;
        match (member, slot) {
            (Member::Pair(pair), PlayerSlot::PairPlayer(i)) => pair.players.get_mut(i),
            (Member::Team(team), PlayerSlot::TeamPlayer(i)) => team.players.get_mut(i),
            (Member::Team(team), PlayerSlot::TeamPairPlayer(p, i)) => {
                team.pairs.get_mut(p)?.players.get_mut(i)
            }
            _ => None,
        }
    }

    fn start_element(&mut self, name: &str, attributes: &[(String, String)]) -> Result<(), ParseError> {
        let name = name.to_uppercase();
        let (parent, sink, event) = {
            let top = self.frames.last().ok_or_else(|| ParseError::Structure("unbalanced document".into()))?;
            (top.kind.clone(), top.sink, top.event)
        };

        let mut frame = Frame {
            kind: FrameKind::PassThrough,
            sink,
            event,
            text: String::new(),
        };

        frame.kind = match (&parent, name.as_str()) {
            (FrameKind::Document, "USEBIO") => {
                self.primary.version = attribute(attributes, "Version").and_then(fields::text);
                FrameKind::Usebio
            }
            (FrameKind::Document, other) => {
                return Err(ParseError::Structure(format!("root element is {}, not USEBIO", other)));
            }
            (FrameKind::Usebio | FrameKind::EventData, "CLUB") => {
                let clubs = &mut self.data(sink).clubs;
                clubs.push(Club::default());
                FrameKind::Club(clubs.len() - 1)
            }
            (FrameKind::Usebio, "EVENT") => {
                let event_type = self
                    .options
                    .event_type
                    .as_deref()
                    .or_else(|| attribute(attributes, "EVENT_TYPE"))
                    .map(EventType::parse)
                    .unwrap_or_else(|| EventType::Unknown(String::new()));
                debug!("Event of type {}", event_type);
                let events = &mut self.data(sink).events;
                events.push(Event::new(event_type));
                frame.event = Some(events.len() - 1);
                FrameKind::EventData
            }
            (FrameKind::EventData, "SESSION") => {
                let session = attribute(attributes, "SESSION_ID").unwrap_or_default();
                match self.options.session_id.as_deref() {
                    Some(wanted) if sink == Sink::Primary && wanted.trim() != session => {
                        debug!("Session {} excluded by filter {}", session, wanted);
                        frame.sink = Sink::OtherSession;
                        frame.event = self.other_session_event(event);
                    }
                    _ => {}
                }
                FrameKind::EventData
            }
            (FrameKind::EventData, "SECTION") => FrameKind::EventData,
            (FrameKind::EventData, "CONTACT") => FrameKind::Contact,
            (FrameKind::EventData, "PARTICIPANTS") => FrameKind::Participants,
            (FrameKind::EventData, "MATCH") => match self.event(sink, event) {
                Some(current) => {
                    current.matches.push(Match::default());
                    FrameKind::Match(current.matches.len() - 1)
                }
                None => FrameKind::PassThrough,
            },
            (FrameKind::EventData, "PROGRAM_NAME") => {
                if let Some(version) = attribute(attributes, "VERSION").and_then(fields::text) {
                    if let Some(current) = self.event(sink, event) {
                        current.program_version = Some(version);
                    }
                }
                FrameKind::Field(name.clone())
            }
            (FrameKind::Participants, "TEAM" | "PAIR" | "PLAYER") => {
                let kind = match name.as_str() {
                    "TEAM" => ParticipantKind::Team,
                    "PAIR" => ParticipantKind::Pair,
                    _ => ParticipantKind::Player,
                };
                match self.event(sink, event) {
                    Some(current) => {
                        current.participants.push(Participant::new(Member::for_kind(kind)));
                        FrameKind::Participant(current.participants.len() - 1)
                    }
                    None => FrameKind::PassThrough,
                }
            }
            (FrameKind::Participant(index), "PAIR" | "PLAYER") => {
                let index = *index;
                let member = self.participant(sink, event, index).map(|p| &mut p.member);
                match (member, name.as_str()) {
                    (Some(Member::Team(team)), "PAIR") => {
                        team.pairs.push(Default::default());
                        FrameKind::TeamPair {
                            participant: index,
                            pair: team.pairs.len() - 1,
                        }
                    }
                    (Some(Member::Team(team)), "PLAYER") => {
                        team.players.push(Player::default());
                        FrameKind::Player {
                            participant: index,
                            slot: PlayerSlot::TeamPlayer(team.players.len() - 1),
                        }
                    }
                    (Some(Member::Pair(pair)), "PLAYER") => {
                        pair.players.push(Player::default());
                        FrameKind::Player {
                            participant: index,
                            slot: PlayerSlot::PairPlayer(pair.players.len() - 1),
                        }
                    }
                    _ => FrameKind::PassThrough,
                }
            }
            (FrameKind::TeamPair { participant, pair }, "PLAYER") => {
                let (participant, pair) = (*participant, *pair);
                let member = self.participant(sink, event, participant).map(|p| &mut p.member);
                match member {
                    Some(Member::Team(team)) => match team.pairs.get_mut(pair) {
                        Some(owner) => {
                            owner.players.push(Player {
                                pair: Some(pair),
                                ..Default::default()
                            });
                            FrameKind::Player {
                                participant,
                                slot: PlayerSlot::TeamPairPlayer(pair, owner.players.len() - 1),
                            }
                        }
                        None => FrameKind::PassThrough,
                    },
                    _ => FrameKind::PassThrough,
                }
            }
            (FrameKind::Match(matched), "BOARD") => {
                let matched = *matched;
                match self.matched(sink, event, matched) {
                    Some(record) => {
                        record.boards.push(Board::default());
                        FrameKind::Board {
                            matched,
                            board: record.boards.len() - 1,
                        }
                    }
                    None => FrameKind::PassThrough,
                }
            }
            (FrameKind::Board { matched, .. }, "TRAVELLER_LINE") => FrameKind::TravellerLine {
                matched: *matched,
                direction: None,
                ns: None,
                ew: None,
            },
            (FrameKind::PassThrough | FrameKind::Field(_), _) => FrameKind::PassThrough,
            (kind, element) if is_field(kind, element) => FrameKind::Field(name.clone()),
            (_, element) => {
                debug!("Skipping unrecognised element {}", element);
                FrameKind::PassThrough
            }
        };

        self.frames.push(frame);
        Ok(())
    }

    /// Event slot in the other-session model mirroring `event` in the primary.
    fn other_session_event(&mut self, event: Option<usize>) -> Option<usize> {
        let primary_index = event?;
        if let Some(&(_, other_index)) = self.other_events.iter().find(|(p, _)| *p == primary_index) {
            return Some(other_index);
        }
        let header = self.primary.events.get(primary_index)?.header_copy();
        let other = self.data(Sink::OtherSession);
        other.events.push(header);
        let other_index = other.events.len() - 1;
        self.other_events.push((primary_index, other_index));
        Some(other_index)
    }

    fn characters(&mut self, text: &str) {
        if let Some(frame) = self.frames.last_mut() {
            if matches!(frame.kind, FrameKind::Field(_)) {
                frame.text.push_str(text);
            }
        }
    }

    fn end_element(&mut self) {
        let Some(frame) = self.frames.pop() else {
            return;
        };
        match frame.kind {
            FrameKind::Field(name) => self.bind_field(&name, frame.text.trim()),
            FrameKind::TravellerLine {
                matched,
                direction,
                ns,
                ew,
            } => {
                if let Some(record) = self.matched(frame.sink, frame.event, matched) {
                    let (own, opposing) = match direction {
                        Some(Direction::EW) => (ew, ns),
                        _ => (ns, ew),
                    };
                    record.pairs.own.extend(own);
                    record.pairs.opposing.extend(opposing);
                }
            }
            _ => {}
        }
    }

    /// Binds a closed leaf element's text to the frame now on top.
    fn bind_field(&mut self, name: &str, value: &str) {
        let Some(parent) = self.frames.last_mut() else {
            return;
        };
        let (sink, event) = (parent.sink, parent.event);
        let text = fields::text(value);

        if let FrameKind::TravellerLine { direction, ns, ew, .. } = &mut parent.kind {
            match name {
                "DIRECTION" => *direction = Direction::parse(value),
                "NS_PAIR_NUMBER" => *ns = text,
                "EW_PAIR_NUMBER" => *ew = text,
                _ => {}
            }
            return;
        }

        let kind = parent.kind.clone();
        match kind {
            FrameKind::Club(index) => {
                if let Some(club) = self.data(sink).clubs.get_mut(index) {
                    match name {
                        "CLUB_NAME" => club.name = text,
                        "CLUB_ID_NUMBER" => club.id = text,
                        _ => {}
                    }
                }
            }
            FrameKind::Contact => {
                if let (Some(current), "FULL_NAME") = (self.event(sink, event), name) {
                    current.contact = text;
                }
            }
            FrameKind::EventData => {
                if let Some(current) = self.event(sink, event) {
                    bind_event_field(current, name, value);
                }
            }
            FrameKind::Participant(index) => {
                if let Some(participant) = self.participant(sink, event, index) {
                    bind_participant_field(participant, name, value);
                }
            }
            FrameKind::TeamPair { participant, pair } => {
                if let Some(Member::Team(team)) = self.participant(sink, event, participant).map(|p| &mut p.member) {
                    if let Some(pair) = team.pairs.get_mut(pair) {
                        match name {
                            "PAIR_NUMBER" => pair.number = text,
                            "PAIR_NAME" => pair.name = text,
                            "DIRECTION" => pair.direction = Direction::parse(value),
                            "BOARDS_PLAYED" => pair.boards_played = fields::number(value),
                            "WINS_OR_DRAWS" => pair.win_draw = fields::number(value),
                            _ => {}
                        }
                    }
                }
            }
            FrameKind::Player { participant, slot } => {
                if let Some(player) = self.player(sink, event, participant, slot) {
                    bind_player_field(player, name, value);
                }
            }
            FrameKind::Match(index) => {
                if let Some(record) = self.matched(sink, event, index) {
                    bind_match_field(record, name, value);
                }
            }
            FrameKind::Board { matched, board } => {
                let board = self
                    .matched(sink, event, matched)
                    .and_then(|record| record.boards.get_mut(board));
                if let Some(board) = board {
                    match name {
                        "BOARD_NUMBER" => board.number = fields::count(value),
                        "IMPS" => {
                            let imps = fields::number(value);
                            board.ns_score = imps;
                            board.ew_score = imps.map(|i| -i);
                        }
                        "NS_SCORE" => board.ns_score = fields::number(value),
                        "EW_SCORE" => board.ew_score = fields::number(value),
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    fn end_document(mut self) -> Result<ScoreData, ParseError> {
        if self.primary.version.is_none() && self.primary.events.is_empty() {
            warn!("USEBIO document has no version and no events");
        }
        if let Some(mut other) = self.other.take() {
            for &(primary_index, other_index) in &self.other_events {
                if let (Some(source), Some(copy)) =
                    (self.primary.events.get(primary_index), other.events.get_mut(other_index))
                {
                    copy.board_scoring = copy.board_scoring.or(source.board_scoring);
                    copy.match_scoring = copy.match_scoring.or(source.match_scoring);
                    copy.boards = copy.boards.or(source.boards);
                    copy.boards_per_round = copy.boards_per_round.or(source.boards_per_round);
                }
            }
            info!(
                "Other sessions hold {} matches",
                other.events.iter().map(|e| e.matches.len()).sum::<usize>()
            );
            self.primary.other_session = Some(Box::new(other));
        }
        Ok(self.primary)
    }
}

/// Leaf elements recognised under each frame kind.
fn is_field(kind: &FrameKind, name: &str) -> bool {
    let names: &[&str] = match kind {
        FrameKind::Club(_) => &["CLUB_NAME", "CLUB_ID_NUMBER"],
        FrameKind::Contact => &["FULL_NAME"],
        FrameKind::EventData => &[
            "PROGRAM_VERSION",
            "EVENT_DESCRIPTION",
            "DATE",
            "EVENT_IDENTIFIER",
            "BOARD_SCORING_METHOD",
            "MATCH_SCORING_METHOD",
            "BOARDS_PLAYED",
            "BOARDS_PER_ROUND",
            "ROUNDS",
            "WINNER_TYPE",
            "SECTION_COUNT",
            "SESSION_COUNT",
        ],
        FrameKind::Participant(_) => &[
            "PLACE",
            "TOTAL_SCORE",
            "PERCENTAGE",
            "WINS_OR_DRAWS",
            "MASTER_POINTS_AWARDED",
            "TEAM_NUMBER",
            "TEAM_NAME",
            "PAIR_NUMBER",
            "PAIR_NAME",
            "PLAYER_NUMBER",
            "PLAYER_NAME",
            "NATIONAL_ID_NUMBER",
            "DIRECTION",
            "SEAT",
            "BOARDS_PLAYED",
        ],
        FrameKind::TeamPair { .. } => &[
            "PAIR_NUMBER",
            "PAIR_NAME",
            "DIRECTION",
            "BOARDS_PLAYED",
            "WINS_OR_DRAWS",
        ],
        FrameKind::Player { .. } => &[
            "PLAYER_NAME",
            "PLAYER_NUMBER",
            "NATIONAL_ID_NUMBER",
            "SEAT",
            "BOARDS_PLAYED",
            "WINS_OR_DRAWS",
        ],
        FrameKind::Match(_) => &[
            "ROUND_NUMBER",
            "TEAM",
            "TEAM_NUMBER",
            "NS_PAIR_NUMBER",
            "OPPOSING_TEAM",
            "OPPOSING_TEAM_NUMBER",
            "EW_PAIR_NUMBER",
            "TEAM_SCORE",
            "NS_SCORE",
            "OPPOSING_TEAM_SCORE",
            "EW_SCORE",
            "TEAM_VP",
            "TEAM_VPS",
            "TEAM_VICTORY_POINTS",
            "NS_VP",
            "NS_VICTORY_POINTS",
            "OPPOSING_TEAM_VP",
            "OPPOSING_TEAM_VPS",
            "OPPOSING_TEAM_VICTORY_POINTS",
            "EW_VP",
            "EW_VICTORY_POINTS",
        ],
        FrameKind::Board { .. } => &["BOARD_NUMBER", "IMPS", "NS_SCORE", "EW_SCORE"],
        FrameKind::TravellerLine { .. } => &["DIRECTION", "NS_PAIR_NUMBER", "EW_PAIR_NUMBER"],
        _ => &[],
    };
    names.contains(&name)
}

fn bind_event_field(event: &mut Event, name: &str, value: &str) {
    let text = fields::text(value);
    match name {
        "PROGRAM_NAME" => event.program_name = text,
        "PROGRAM_VERSION" => event.program_version = text,
        "EVENT_DESCRIPTION" => event.title = text,
        "DATE" => event.date = text,
        "EVENT_IDENTIFIER" => event.identifier = text,
        "BOARD_SCORING_METHOD" => event.board_scoring = ScoringMethod::parse(value),
        "MATCH_SCORING_METHOD" => event.match_scoring = ScoringMethod::parse(value),
        "BOARDS_PLAYED" => event.boards = fields::count(value),
        "BOARDS_PER_ROUND" => event.boards_per_round = fields::count(value),
        "ROUNDS" => event.rounds = fields::count(value),
        "WINNER_TYPE" => event.winners = fields::count(value),
        "SECTION_COUNT" => event.section_count = fields::count(value),
        "SESSION_COUNT" => event.session_count = fields::count(value),
        _ => {}
    }
}

fn bind_participant_field(participant: &mut Participant, name: &str, value: &str) {
    let text = fields::text(value);
    match name {
        "PLACE" => participant.place = fields::place(value),
        "TOTAL_SCORE" | "PERCENTAGE" => participant.score = fields::number(value),
        "WINS_OR_DRAWS" => participant.win_draw = fields::number(value),
        "MASTER_POINTS_AWARDED" => participant.manual_points = fields::number(value),
        "TEAM_NUMBER" | "PAIR_NUMBER" | "PLAYER_NUMBER" => {
            if let Some(number) = text {
                participant.member.set_number(number);
            }
        }
        _ => match &mut participant.member {
            Member::Team(team) => {
                if name == "TEAM_NAME" {
                    team.name = text;
                }
            }
            Member::Pair(pair) => match name {
                "PAIR_NAME" => pair.name = text,
                "DIRECTION" => pair.direction = Direction::parse(value),
                "BOARDS_PLAYED" => pair.boards_played = fields::number(value),
                _ => {}
            },
            Member::Player(player) => bind_player_field(player, name, value),
        },
    }
}

fn bind_player_field(player: &mut Player, name: &str, value: &str) {
    let text = fields::text(value);
    match name {
        "PLAYER_NAME" => player.name = text.unwrap_or_default(),
        "PLAYER_NUMBER" => player.number = text,
        "NATIONAL_ID_NUMBER" => player.national_id = text,
        "SEAT" => player.seat = text,
        "BOARDS_PLAYED" => player.boards_played = fields::number(value).unwrap_or_default(),
        "WINS_OR_DRAWS" => player.win_draw = fields::number(value),
        _ => {}
    }
}

fn bind_match_field(record: &mut Match, name: &str, value: &str) {
    let text = fields::text(value);
    match name {
        "ROUND_NUMBER" => record.round = fields::count(value),
        "TEAM" | "TEAM_NUMBER" | "NS_PAIR_NUMBER" => record.number = text,
        "OPPOSING_TEAM" | "OPPOSING_TEAM_NUMBER" | "EW_PAIR_NUMBER" => record.opponent = text,
        "TEAM_SCORE" | "NS_SCORE" => record.score = fields::number(value),
        "OPPOSING_TEAM_SCORE" | "EW_SCORE" => record.opposing_score = fields::number(value),
        "TEAM_VP" | "TEAM_VPS" | "TEAM_VICTORY_POINTS" | "NS_VP" | "NS_VICTORY_POINTS" => {
            record.vp = fields::number(value)
        }
        "OPPOSING_TEAM_VP"
        | "OPPOSING_TEAM_VPS"
        | "OPPOSING_TEAM_VICTORY_POINTS"
        | "EW_VP"
        | "EW_VICTORY_POINTS" => record.opposing_vp = fields::number(value),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WinDrawGranularity;

    const PAIRS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<USEBIO Version="1.2">
  <CLUB><CLUB_NAME>Hilltop BC</CLUB_NAME><CLUB_ID_NUMBER>1234</CLUB_ID_NUMBER></CLUB>
  <EVENT EVENT_TYPE="MP_PAIRS">
    <PROGRAM_NAME VERSION="3.1">ScoreMate</PROGRAM_NAME>
    <EVENT_DESCRIPTION>Monday Pairs</EVENT_DESCRIPTION>
    <DATE>05/02/2024</DATE>
    <BOARD_SCORING_METHOD>MATCH_POINTS</BOARD_SCORING_METHOD>
    <BOARDS_PLAYED>24</BOARDS_PLAYED>
    <WINNER_TYPE>1</WINNER_TYPE>
    <CONTACT><FULL_NAME>Pat O&apos;Neill</FULL_NAME></CONTACT>
    <PARTICIPANTS>
      <PAIR>
        <PAIR_NUMBER>1</PAIR_NUMBER>
        <PERCENTAGE>55.2</PERCENTAGE>
        <PLAYER><PLAYER_NAME>Ann Lee</PLAYER_NAME><NATIONAL_ID_NUMBER>101</NATIONAL_ID_NUMBER></PLAYER>
        <PLAYER><PLAYER_NAME>Bob Ray</PLAYER_NAME><NATIONAL_ID_NUMBER>102</NATIONAL_ID_NUMBER></PLAYER>
      </PAIR>
      <PAIR>
        <PAIR_NUMBER>2</PAIR_NUMBER>
        <PERCENTAGE>61.0</PERCENTAGE>
        <SCORER_NOTES><PLACE>9</PLACE></SCORER_NOTES>
        <PLAYER><PLAYER_NAME>Cy O&apos;Hara</PLAYER_NAME><NATIONAL_ID_NUMBER>103</NATIONAL_ID_NUMBER></PLAYER>
        <PLAYER><PLAYER_NAME>Di Fox</PLAYER_NAME><NATIONAL_ID_NUMBER>104</NATIONAL_ID_NUMBER></PLAYER>
      </PAIR>
    </PARTICIPANTS>
  </EVENT>
</USEBIO>"#;

    fn swiss_teams(extra: &str) -> String {
        format!(
            r#"<USEBIO Version="1.2">
  <CLUB><CLUB_NAME>Hilltop BC</CLUB_NAME></CLUB>
  <EVENT EVENT_TYPE="SWISS_TEAMS">
    <BOARD_SCORING_METHOD>IMPS</BOARD_SCORING_METHOD>
    <MATCH_SCORING_METHOD>VICTORY_POINTS</MATCH_SCORING_METHOD>
    <BOARDS_PLAYED>16</BOARDS_PLAYED>
    <BOARDS_PER_ROUND>8</BOARDS_PER_ROUND>
    <PARTICIPANTS>
      <TEAM><TEAM_NUMBER>1</TEAM_NUMBER><TOTAL_SCORE>30</TOTAL_SCORE>
        <PAIR><PAIR_NUMBER>11</PAIR_NUMBER><PLAYER><PLAYER_NAME>A</PLAYER_NAME></PLAYER><PLAYER><PLAYER_NAME>B</PLAYER_NAME></PLAYER></PAIR>
        <PAIR><PAIR_NUMBER>12</PAIR_NUMBER><PLAYER><PLAYER_NAME>C</PLAYER_NAME></PLAYER><PLAYER><PLAYER_NAME>D</PLAYER_NAME></PLAYER></PAIR>
      </TEAM>
      <TEAM><TEAM_NUMBER>2</TEAM_NUMBER><TOTAL_SCORE>10</TOTAL_SCORE>
        <PAIR><PAIR_NUMBER>21</PAIR_NUMBER><PLAYER><PLAYER_NAME>E</PLAYER_NAME></PLAYER><PLAYER><PLAYER_NAME>F</PLAYER_NAME></PLAYER></PAIR>
        <PAIR><PAIR_NUMBER>22</PAIR_NUMBER><PLAYER><PLAYER_NAME>G</PLAYER_NAME></PLAYER><PLAYER><PLAYER_NAME>H</PLAYER_NAME></PLAYER></PAIR>
      </TEAM>
    </PARTICIPANTS>
    {}
  </EVENT>
</USEBIO>"#,
            extra
        )
    }

    #[test]
    fn test_parse_pairs_event() {
        let data = UsebioParser
            .parse(PAIRS.as_bytes(), &ParseOptions::default())
            .unwrap();

        assert_eq!(data.version.as_deref(), Some("1.2"));
        assert_eq!(data.clubs[0].name.as_deref(), Some("Hilltop BC"));
        let event = &data.events[0];
        assert_eq!(event.event_type, EventType::MpPairs);
        assert_eq!(event.title.as_deref(), Some("Monday Pairs"));
        assert_eq!(event.program_version.as_deref(), Some("3.1"));
        assert_eq!(event.contact.as_deref(), Some("Pat O'Neill"));
        assert_eq!(event.boards, Some(24));
        assert_eq!(event.participants.len(), 2);

        let second = &event.participants[1];
        assert_eq!(second.score, Some(61.0));
        assert_eq!(second.member.players()[0].name, "Cy O'Hara");
        // PLACE inside an unknown element is not bound; places are derived.
        assert_eq!(second.place, Some(1));
        assert_eq!(event.participants[0].place, Some(2));
    }

    #[test]
    fn test_doctype_declaration_is_accepted() {
        let xml = PAIRS.replacen(
            "<USEBIO Version=\"1.2\">",
            "<!DOCTYPE USEBIO SYSTEM \"usebio_v1_2.dtd\">\n<USEBIO Version=\"1.2\">",
            1,
        );
        let data = UsebioParser.parse(xml.as_bytes(), &ParseOptions::default()).unwrap();
        assert_eq!(data.version.as_deref(), Some("1.2"));
        assert_eq!(data.events[0].participants.len(), 2);
        assert_eq!(
            data.events[0].participants[1].member.players()[1].name,
            "Di Fox"
        );
    }

    #[test]
    fn test_nested_elements_bind_in_document_order() {
        let data = UsebioParser
            .parse(PAIRS.as_bytes(), &ParseOptions::default())
            .unwrap();
        let names: Vec<String> = data.events[0]
            .participants
            .iter()
            .flat_map(|p| p.member.players().into_iter().map(|player| player.name))
            .collect();
        assert_eq!(names, ["Ann Lee", "Bob Ray", "Cy O'Hara", "Di Fox"]);
    }

    #[test]
    fn test_event_type_override() {
        let options = ParseOptions {
            event_type: Some("CROSS_IMPS".to_string()),
            ..Default::default()
        };
        let data = UsebioParser.parse(PAIRS.as_bytes(), &options).unwrap();
        assert_eq!(data.events[0].event_type, EventType::CrossImps);
    }

    #[test]
    fn test_default_board_scoring_for_teams() {
        let xml = swiss_teams("").replace(
            "<BOARD_SCORING_METHOD>IMPS</BOARD_SCORING_METHOD>",
            "",
        );
        let data = UsebioParser.parse(xml.as_bytes(), &ParseOptions::default()).unwrap();
        assert_eq!(data.events[0].board_scoring, Some(ScoringMethod::Imps));
    }

    #[test]
    fn test_team_pairs_and_back_references() {
        let xml = swiss_teams("");
        let data = UsebioParser.parse(xml.as_bytes(), &ParseOptions::default()).unwrap();
        let Member::Team(team) = &data.events[0].participants[0].member else {
            panic!("expected a team");
        };
        assert_eq!(team.pairs.len(), 2);
        assert_eq!(team.pairs[1].number.as_deref(), Some("12"));
        assert_eq!(team.pairs[1].players[0].pair, Some(1));
        assert_eq!(team.effective_players().len(), 4);
    }

    #[test]
    fn test_matches_boards_and_traveller_pairs() {
        let xml = swiss_teams(
            r#"<MATCH>
      <ROUND_NUMBER>1</ROUND_NUMBER>
      <BOARD><BOARD_NUMBER>1</BOARD_NUMBER><IMPS>5</IMPS></BOARD>
      <BOARD><BOARD_NUMBER>2</BOARD_NUMBER>
        <TRAVELLER_LINE><DIRECTION>NS</DIRECTION><NS_PAIR_NUMBER>11</NS_PAIR_NUMBER><EW_PAIR_NUMBER>21</EW_PAIR_NUMBER></TRAVELLER_LINE>
        <TRAVELLER_LINE><DIRECTION>EW</DIRECTION><NS_PAIR_NUMBER>22</NS_PAIR_NUMBER><EW_PAIR_NUMBER>12</EW_PAIR_NUMBER></TRAVELLER_LINE>
      </BOARD>
    </MATCH>"#,
        );
        let data = UsebioParser.parse(xml.as_bytes(), &ParseOptions::default()).unwrap();
        let record = &data.events[0].matches[0];

        assert_eq!(record.round, Some(1));
        assert_eq!(record.boards.len(), 2);
        assert_eq!(record.boards[0].ns_score, Some(5.0));
        assert_eq!(record.boards[0].ew_score, Some(-5.0));
        assert!(record.pairs.own.contains("11") && record.pairs.own.contains("12"));
        assert!(record.pairs.opposing.contains("21") && record.pairs.opposing.contains("22"));
        // Participant numbers resolved from the pair rosters.
        assert_eq!(record.number.as_deref(), Some("1"));
        assert_eq!(record.opponent.as_deref(), Some("2"));
    }

    #[test]
    fn test_session_filter_diverts_other_sessions() {
        let xml = swiss_teams(
            r#"<SESSION SESSION_ID="1">
      <MATCH><TEAM>1</TEAM><OPPOSING_TEAM>2</OPPOSING_TEAM><TEAM_VP>12</TEAM_VP><OPPOSING_TEAM_VP>8</OPPOSING_TEAM_VP></MATCH>
    </SESSION>
    <SESSION SESSION_ID="2">
      <MATCH><TEAM>1</TEAM><OPPOSING_TEAM>2</OPPOSING_TEAM><TEAM_VP>4</TEAM_VP><OPPOSING_TEAM_VP>16</OPPOSING_TEAM_VP></MATCH>
    </SESSION>"#,
        );
        let options = ParseOptions {
            session_id: Some("2".to_string()),
            ..Default::default()
        };
        let data = UsebioParser.parse(xml.as_bytes(), &options).unwrap();

        assert_eq!(data.events[0].matches.len(), 1);
        assert_eq!(data.events[0].matches[0].vp, Some(4.0));
        let other = data.other_session.as_ref().unwrap();
        assert_eq!(other.events[0].matches.len(), 1);
        assert_eq!(other.events[0].matches[0].vp, Some(12.0));
        assert_eq!(other.events[0].event_type, EventType::SwissTeams);
        assert!(other.events[0].participants.is_empty());
    }

    #[test]
    fn test_without_filter_sessions_are_merged() {
        let xml = swiss_teams(
            r#"<SESSION SESSION_ID="1"><MATCH><TEAM>1</TEAM><OPPOSING_TEAM>2</OPPOSING_TEAM></MATCH></SESSION>
    <SESSION SESSION_ID="2"><MATCH><TEAM>2</TEAM><OPPOSING_TEAM>1</OPPOSING_TEAM></MATCH></SESSION>"#,
        );
        let data = UsebioParser.parse(xml.as_bytes(), &ParseOptions::default()).unwrap();
        assert_eq!(data.events[0].matches.len(), 2);
        assert!(data.other_session.is_none());
    }

    #[test]
    fn test_win_draw_from_other_session_when_primary_has_no_matches() {
        let xml = swiss_teams(
            r#"<SESSION SESSION_ID="1">
      <MATCH><TEAM>1</TEAM><OPPOSING_TEAM>2</OPPOSING_TEAM><TEAM_VP>12</TEAM_VP><OPPOSING_TEAM_VP>8</OPPOSING_TEAM_VP></MATCH>
    </SESSION>"#,
        );
        let options = ParseOptions {
            session_id: Some("9".to_string()),
            win_draw: Some(WinDrawGranularity::Match),
            ..Default::default()
        };
        let data = UsebioParser.parse(xml.as_bytes(), &options).unwrap();
        let event = &data.events[0];
        assert!(event.matches.is_empty());
        assert!(event.uses_other_session);
        assert_eq!(event.participants[0].win_draw, Some(1.0));
        assert_eq!(event.participants[1].win_draw, Some(0.0));
    }

    #[test]
    fn test_number_filter_drops_and_renumbers() {
        let options = ParseOptions {
            min_number: Some("2".to_string()),
            max_number: Some("10".to_string()),
            ..Default::default()
        };
        let data = UsebioParser.parse(PAIRS.as_bytes(), &options).unwrap();
        let event = &data.events[0];
        assert_eq!(event.participants.len(), 1);
        assert_eq!(event.participants[0].member.number(), Some("2"));
        assert_eq!(event.participants[0].place, Some(1));
    }

    #[test]
    fn test_malformed_markup_is_fatal() {
        let result = UsebioParser.parse(b"<USEBIO><EVENT></USEBIO>", &ParseOptions::default());
        assert!(matches!(result, Err(ParseError::Xml(_))));
    }

    #[test]
    fn test_wrong_root_is_fatal() {
        let result = UsebioParser.parse(b"<RESULTS/>", &ParseOptions::default());
        assert!(matches!(result, Err(ParseError::Structure(_))));
    }

    #[test]
    fn test_can_parse() {
        assert!(UsebioParser.can_parse(PAIRS.as_bytes()));
        assert!(!UsebioParser.can_parse(b"<html></html>"));
        assert!(!UsebioParser.can_parse(b"VERSION,1.2"));
    }
}
