// Parser crate for bridge tournament result files
// Format parsers share one trait; the registry picks one per file

pub mod types;
pub mod model;
pub mod fields;
pub mod scoring;
pub mod base_parser;
pub mod postprocess;
pub mod recalc;
pub mod validator;
pub mod parsers;
pub mod registry_parser;
pub mod import;

// Individual parser implementations
pub mod xml_parser;
pub mod tag_csv_parser;
pub mod wide_csv_parser;

// Re-export main types
pub use types::*;
pub use model::{Board, Club, Event, Match, MatchPairs, Member, Pair, Participant, Player, ScoreData, Team};
pub use base_parser::{Parser, FormatHint};
pub use registry_parser::ParserRegistry;
pub use recalc::recalculate;
pub use validator::{validate, ValidationConfig, ValidationReport};
pub use import::{import, import_with_callback, ImportOutcome};

// Re-export parsers
pub use xml_parser::UsebioParser;
pub use tag_csv_parser::TagCsvParser;
pub use wide_csv_parser::WideCsvParser;
