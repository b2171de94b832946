/// Central parser registration module
///
/// Every result-file parser is listed once here. When adding a new parser:
/// 1. Create your parser file (e.g., pbn_parser.rs) implementing `Parser`
/// 2. Export it in lib.rs
/// 3. Add it to `all_parsers()` below
///
/// The registry picks parsers by name, extension or content, so nothing
/// else needs to change.
use crate::{TagCsvParser, UsebioParser, WideCsvParser};
use tracing::info;

/// Boxes a list of parsers for the registry.
///
/// Usage:
/// ```rust,ignore
/// register_parsers![
///     UsebioParser,
///     TagCsvParser,
///     WideCsvParser,
/// ]
/// ```
#[macro_export]
macro_rules! register_parsers {
    ($($parser:expr),* $(,)?) => {
        vec![
            $(Box::new($parser) as Box<dyn $crate::base_parser::Parser>),*
        ]
    };
}

/// Returns every available parser.
///
/// XML comes first so content sniffing tries it before the CSV dialects.
pub fn all_parsers() -> Vec<Box<dyn crate::base_parser::Parser>> {
    info!("Initializing parser collection");

    register_parsers![UsebioParser, TagCsvParser, WideCsvParser]
}
