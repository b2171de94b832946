//! Import pipeline: format selection, parse, recalculation, validation.

use crate::model::ScoreData;
use crate::recalc::recalculate;
use crate::registry_parser::ParserRegistry;
use crate::types::{ParseError, ParseOptions};
use crate::validator::{validate, ValidationConfig, ValidationReport};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Everything one import produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportOutcome {
    /// Name of the parser that read the file.
    pub parser: String,
    pub score_data: ScoreData,
    /// Recalculation messages.
    pub changes: Vec<String>,
    pub report: ValidationReport,
}

impl ImportOutcome {
    /// Re-runs recalculation and validation, e.g. after the caller toggled
    /// `round_continuous_vp_draws`.
    pub fn refresh(&mut self, config: &ValidationConfig) {
        self.changes = recalculate(&mut self.score_data);
        self.report = validate(&self.score_data, config);
    }

    /// Recalculation messages followed by validation errors and warnings.
    pub fn diagnostics(&self) -> Vec<String> {
        self.changes
            .iter()
            .chain(&self.report.errors)
            .chain(&self.report.warnings)
            .cloned()
            .collect()
    }
}

/// Imports one file with the default parser set.
pub fn import(
    data: &[u8],
    filename: Option<&str>,
    options: &ParseOptions,
    config: &ValidationConfig,
) -> Result<ImportOutcome, ParseError> {
    import_with(&ParserRegistry::new(), data, filename, options, config)
}

/// Imports one file with the parsers of `registry`.
pub fn import_with(
    registry: &ParserRegistry,
    data: &[u8],
    filename: Option<&str>,
    options: &ParseOptions,
    config: &ValidationConfig,
) -> Result<ImportOutcome, ParseError> {
    let parser = registry.select(data, filename)?;
    info!(
        "Importing {} with parser '{}'",
        filename.unwrap_or("<unnamed>"),
        parser.name()
    );

    let (score_data, changes) = parser.parse_with_changes(data, options)?;
    let report = validate(&score_data, config);
    info!(
        "Import finished: {} changes, {} errors, {} warnings",
        changes.len(),
        report.errors.len(),
        report.warnings.len()
    );

    Ok(ImportOutcome {
        parser: parser.name().to_string(),
        score_data,
        changes,
        report,
    })
}

/// Single-shot completion form of [`import`]. `on_complete` runs exactly
/// once, with the outcome and its diagnostics, or with `None` and the
/// failure message.
pub fn import_with_callback<F>(
    data: &[u8],
    filename: Option<&str>,
    options: &ParseOptions,
    config: &ValidationConfig,
    on_complete: F,
) where
    F: FnOnce(Option<ImportOutcome>, Vec<String>),
{
    match import(data, filename, options, config) {
        Ok(outcome) => {
            let diagnostics = outcome.diagnostics();
            on_complete(Some(outcome), diagnostics);
        }
        Err(e) => {
            error!("Import failed: {}", e);
            on_complete(None, vec![e.to_string()]);
        }
    }
}
