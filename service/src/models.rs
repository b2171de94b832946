use chrono::{DateTime, Utc};
use scorecard_parser::{is_truthy, Club, ImportOutcome, ParseOptions, ValidationReport, VpStyle, WinDrawGranularity};
use serde::{Deserialize, Serialize};

/// One import as kept on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredImport {
    pub import_id: String,
    pub filename: String,
    pub created_at: DateTime<Utc>,
    pub options: ParseOptions,
    pub outcome: ImportOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportSummary {
    pub import_id: String,
    pub filename: String,
    pub parser: String,
    pub events: usize,
    pub participants: usize,
    pub is_valid: bool,
    pub has_missing_national_ids: bool,
    pub diagnostics: Vec<String>,
}

impl From<&StoredImport> for ImportSummary {
    fn from(stored: &StoredImport) -> Self {
        let data = &stored.outcome.score_data;
        Self {
            import_id: stored.import_id.clone(),
            filename: stored.filename.clone(),
            parser: stored.outcome.parser.clone(),
            events: data.events.len(),
            participants: data.events.iter().map(|e| e.participants.len()).sum(),
            is_valid: stored.outcome.report.is_valid(),
            has_missing_national_ids: stored.outcome.report.has_missing_national_ids,
            diagnostics: stored.outcome.diagnostics(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecalculateRequest {
    #[serde(default)]
    pub round_continuous_vp_draws: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecalculateResponse {
    pub changes: Vec<String>,
    pub report: ValidationReport,
}

fn optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Applies one multipart text field to the parse options.
///
/// Unknown field names are ignored; malformed values are rejected.
pub fn apply_option(options: &mut ParseOptions, name: &str, value: &str) -> Result<(), String> {
    match name {
        "session_id" => options.session_id = optional(value),
        "min_number" => options.min_number = optional(value),
        "max_number" => options.max_number = optional(value),
        "event_type" => options.event_type = optional(value),
        "merge_matches" => options.merge_matches = is_truthy(value),
        "win_draw" => {
            options.win_draw = match value.trim().to_lowercase().as_str() {
                "" => None,
                "participant" => Some(WinDrawGranularity::Participant),
                "match" => Some(WinDrawGranularity::Match),
                "board" => Some(WinDrawGranularity::Board),
                other => return Err(format!("unknown win_draw level '{}'", other)),
            }
        }
        "vp_style" => {
            options.vp_style = match value.trim().to_lowercase().as_str() {
                "" => None,
                "continuous" => Some(VpStyle::Continuous),
                "discrete" => Some(VpStyle::Discrete),
                other => return Err(format!("unknown vp_style '{}'", other)),
            }
        }
        "club_name" => options.club.get_or_insert_with(Club::default).name = optional(value),
        "club_id" => options.club.get_or_insert_with(Club::default).id = optional(value),
        "max_vp" => {
            options.scoring.max_vp = value
                .trim()
                .parse()
                .map_err(|_| format!("max_vp must be a whole number, got '{}'", value))?
        }
        "vp_decimal_places" => {
            options.scoring.vp_decimal_places = value
                .trim()
                .parse()
                .map_err(|_| format!("vp_decimal_places must be a whole number, got '{}'", value))?
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_option_fields() {
        let mut options = ParseOptions::default();
        apply_option(&mut options, "session_id", " 2 ").unwrap();
        apply_option(&mut options, "win_draw", "Match").unwrap();
        apply_option(&mut options, "vp_style", "discrete").unwrap();
        apply_option(&mut options, "merge_matches", "yes").unwrap();
        apply_option(&mut options, "club_name", "Hilltop").unwrap();
        apply_option(&mut options, "max_vp", "30").unwrap();
        apply_option(&mut options, "colour", "blue").unwrap();

        assert_eq!(options.session_id.as_deref(), Some("2"));
        assert_eq!(options.win_draw, Some(WinDrawGranularity::Match));
        assert_eq!(options.vp_style, Some(VpStyle::Discrete));
        assert!(options.merge_matches);
        assert_eq!(options.club.and_then(|c| c.name).as_deref(), Some("Hilltop"));
        assert_eq!(options.scoring.max_vp, 30);
    }

    #[test]
    fn test_apply_option_rejects_bad_values() {
        let mut options = ParseOptions::default();
        assert!(apply_option(&mut options, "win_draw", "session").is_err());
        assert!(apply_option(&mut options, "max_vp", "twenty").is_err());
    }
}
