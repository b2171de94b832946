use crate::postprocess;
use crate::{ParseError, ParseOptions, ScoreData};
use csv::{ReaderBuilder, Terminator, Trim};
use tracing::debug;

/// Base trait that all parsers must implement
pub trait Parser: Send + Sync {
    /// Returns the name of this parser (e.g., "usebio", "tag-csv", "wide-csv")
    fn name(&self) -> &'static str;

    /// Returns the file extensions this parser supports
    fn extensions(&self) -> &'static [&'static str];

    /// Checks if this parser can handle the given data by inspecting content
    fn can_parse(&self, data: &[u8]) -> bool;

    /// Format-specific forward walk producing the raw model.
    /// Structural problems abort the walk; nothing partial is returned.
    fn read(&self, data: &[u8], options: &ParseOptions) -> Result<ScoreData, ParseError>;

    /// Reads the file, then runs the post-document passes and the win/draw
    /// recalculation. Returns the model and the recalculation messages.
    fn parse_with_changes(
        &self,
        data: &[u8],
        options: &ParseOptions,
    ) -> Result<(ScoreData, Vec<String>), ParseError> {
        let mut score_data = self.read(data, options)?;
        let changes = postprocess::finish(&mut score_data, options);
        for change in &changes {
            debug!("{}: {}", self.name(), change);
        }
        Ok((score_data, changes))
    }

    fn parse(&self, data: &[u8], options: &ParseOptions) -> Result<ScoreData, ParseError> {
        self.parse_with_changes(data, options).map(|(score_data, _)| score_data)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatHint {
    Xml,
    TagCsv,
    WideCsv,
    Unknown,
}

/// Decodes file bytes, dropping a UTF-8 byte order mark.
pub fn decode(data: &[u8]) -> Result<&str, ParseError> {
    let data = data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data);
    std::str::from_utf8(data).map_err(|_| ParseError::InvalidUtf8)
}

/// Splits CSV text into trimmed rows. Only CR ends a row; LF is dropped
/// wherever it appears. Rows with no content in any cell are dropped.
pub fn split_rows(text: &str) -> Result<Vec<Vec<String>>, ParseError> {
    let text = text.replace('\n', "");
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .terminator(Terminator::Any(b'\r'))
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|cell| cell.is_empty()) {
            continue;
        }
        rows.push(record.iter().map(str::to_string).collect());
    }
    debug!("Split CSV input into {} rows", rows.len());
    Ok(rows)
}

/// Picks the CSV dialect from the first non-empty row.
pub fn dispatch_csv(data: &[u8]) -> Result<FormatHint, ParseError> {
    let text = decode(data).map_err(|_| ParseError::NoParserSelected)?;
    let rows = split_rows(text).map_err(|_| ParseError::NoParserSelected)?;
    let first = rows.first().ok_or(ParseError::NoParserSelected)?;
    let leading = first.join(",").to_uppercase();

    if leading.starts_with("PARAMETERS") || leading.starts_with("INSTRUCTIONS") {
        Ok(FormatHint::WideCsv)
    } else {
        Ok(FormatHint::TagCsv)
    }
}

/// Helper to detect format from content
pub fn detect_format(data: &[u8]) -> FormatHint {
    let Ok(text) = decode(data) else {
        return FormatHint::Unknown;
    };
    if text.trim_start().starts_with('<') {
        return FormatHint::Xml;
    }
    dispatch_csv(data).unwrap_or(FormatHint::Unknown)
}
