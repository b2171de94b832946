use crate::base_parser::{detect_format, dispatch_csv, FormatHint, Parser};
use crate::parsers::all_parsers;
use crate::{ParseError, ParseOptions, ScoreData};
use tracing::{debug, error, info, warn};

/// ParserRegistry - holds the available parsers and picks one per file
///
/// To add a new parser, modify `parsers.rs`; this file needs no changes.
pub struct ParserRegistry {
    parsers: Vec<Box<dyn Parser>>,
}

impl ParserRegistry {
    /// Create a new registry with all parsers from `parsers::all_parsers()`.
    pub fn new() -> Self {
        info!("Initializing ParserRegistry");
        let parsers = all_parsers();

        info!(
            "Registered {} parsers: {}",
            parsers.len(),
            parsers.iter().map(|p| p.name()).collect::<Vec<_>>().join(", ")
        );

        Self { parsers }
    }

    /// Register a custom parser
    pub fn register(&mut self, parser: Box<dyn Parser>) {
        info!("Registering custom parser: {}", parser.name());
        debug!("Parser supports extensions: {:?}", parser.extensions());
        self.parsers.push(parser);
    }

    /// Get parser by name
    pub fn get_parser(&self, name: &str) -> Option<&dyn Parser> {
        debug!("Looking up parser by name: {}", name);
        let result = self.parsers.iter().find(|p| p.name() == name).map(|p| p.as_ref());

        if result.is_none() {
            warn!("Parser not found: {}", name);
        }
        result
    }

    /// Get parser by file extension, when exactly one parser claims it
    pub fn get_parser_by_extension(&self, extension: &str) -> Option<&dyn Parser> {
        debug!("Looking up parser by extension: {}", extension);
        let mut candidates = self
            .parsers
            .iter()
            .filter(|p| p.extensions().contains(&extension));

        match (candidates.next(), candidates.next()) {
            (Some(parser), None) => {
                info!("Selected parser '{}' for extension '.{}'", parser.name(), extension);
                Some(parser.as_ref())
            }
            (Some(_), Some(_)) => {
                debug!("Extension '.{}' is shared; content decides", extension);
                None
            }
            _ => {
                warn!("No parser found for extension '.{}'", extension);
                None
            }
        }
    }

    fn parser_for_hint(&self, hint: FormatHint) -> Option<&dyn Parser> {
        match hint {
            FormatHint::Xml => self.get_parser("usebio"),
            FormatHint::TagCsv => self.get_parser("tag-csv"),
            FormatHint::WideCsv => self.get_parser("wide-csv"),
            FormatHint::Unknown => None,
        }
    }

    /// Picks a parser from the file name's extension, falling back to the
    /// file's content.
    pub fn select(&self, data: &[u8], filename: Option<&str>) -> Result<&dyn Parser, ParseError> {
        let extension = filename
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_lowercase());

        if let Some(extension) = extension.as_deref() {
            if extension == "csv" {
                let hint = dispatch_csv(data)?;
                info!("CSV dialect from first row: {:?}", hint);
                return self.parser_for_hint(hint).ok_or(ParseError::NoParserSelected);
            }
            if let Some(parser) = self.get_parser_by_extension(extension) {
                return Ok(parser);
            }
        }

        info!("Starting auto-detection of file format");
        let hint = detect_format(data);
        info!("Format hint from content analysis: {:?}", hint);

        if let Some(parser) = self.parser_for_hint(hint) {
            return Ok(parser);
        }

        warn!("Format unknown, trying parsers individually");
        self.parsers
            .iter()
            .find(|p| {
                let can_parse = p.can_parse(data);
                debug!("Parser '{}' can_parse result: {}", p.name(), can_parse);
                can_parse
            })
            .map(|p| p.as_ref())
            .ok_or_else(|| {
                error!("Unable to detect format - no suitable parser found");
                ParseError::NoParserSelected
            })
    }

    /// Auto-detect and parse data
    pub fn parse_auto(&self, data: &[u8], options: &ParseOptions) -> Result<ScoreData, ParseError> {
        let parser = self.select(data, None)?;
        info!("Selected parser: {}", parser.name());
        parser.parse(data, options)
    }

    /// Parse with explicit format hint (filename extension)
    pub fn parse_with_hint(
        &self,
        data: &[u8],
        filename: &str,
        options: &ParseOptions,
    ) -> Result<ScoreData, ParseError> {
        info!("Parsing file with hint: {}", filename);
        let parser = self.select(data, Some(filename))?;
        info!("Using parser '{}' for file '{}'", parser.name(), filename);
        parser.parse(data, options)
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const XML: &str = r#"<USEBIO Version="1.2"><EVENT EVENT_TYPE="MP_PAIRS"><PARTICIPANTS>
<PAIR><PAIR_NUMBER>1</PAIR_NUMBER><PERCENTAGE>50</PERCENTAGE></PAIR>
</PARTICIPANTS></EVENT></USEBIO>"#;

    #[test]
    fn test_registry_auto_detect_xml() {
        let registry = ParserRegistry::new();
        let data = registry.parse_auto(XML.as_bytes(), &ParseOptions::default()).unwrap();
        assert_eq!(data.events[0].participants.len(), 1);
    }

    #[test]
    fn test_csv_extension_dispatches_on_content() {
        let registry = ParserRegistry::new();
        let wide = b"PARAMETERS,ROUND TYPE\r\n,PAIRS\r\n";
        assert_eq!(registry.select(wide, Some("results.CSV")).unwrap().name(), "wide-csv");

        let tag = b"#VERSION,1\r\n";
        assert_eq!(registry.select(tag, Some("results.csv")).unwrap().name(), "tag-csv");
    }

    #[test]
    fn test_extension_then_content_fallback() {
        let registry = ParserRegistry::new();
        assert_eq!(registry.select(XML.as_bytes(), Some("day1.xml")).unwrap().name(), "usebio");
        assert_eq!(registry.select(XML.as_bytes(), Some("day1.txt")).unwrap().name(), "usebio");
        assert!(registry.get_parser_by_extension("csv").is_none());
    }

    #[test]
    fn test_parse_with_hint_uses_file_name() {
        let registry = ParserRegistry::new();
        let data = b"#VERSION,1\r#SCORES\r#SCORESHEADER,POSITION,PAIR,NAME1,NAME2\r#SCORE,1,4,Ann Lee,Bob Ray\r";
        let parsed = registry
            .parse_with_hint(data, "club.csv", &ParseOptions::default())
            .unwrap();
        assert_eq!(parsed.events[0].participants[0].member.number(), Some("4"));

        let result = registry.parse_with_hint(b"", "empty.csv", &ParseOptions::default());
        assert!(matches!(result, Err(ParseError::NoParserSelected)));
    }

    #[test]
    fn test_nothing_selected() {
        let registry = ParserRegistry::new();
        assert!(matches!(
            registry.select(b"", Some("blank.csv")),
            Err(ParseError::NoParserSelected)
        ));
        assert!(matches!(
            registry.select(&[0xc3, 0x28], None),
            Err(ParseError::NoParserSelected)
        ));
    }
}
