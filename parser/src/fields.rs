//! Field coercion shared by the three parsers.
//!
//! Unreadable numeric content becomes `None` instead of an error. Callers
//! that need a value treat `None` as absent (or zero where the format
//! implies it).

/// Trimmed text, or `None` when blank.
pub fn text(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Decimal number; tolerates a trailing `%` and a decimal comma.
pub fn number(value: &str) -> Option<f64> {
    let trimmed = value.trim().trim_end_matches('%').trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed
        .parse::<f64>()
        .or_else(|_| trimmed.replace(',', ".").parse::<f64>())
        .ok()
        .filter(|n| n.is_finite())
}

/// Non-negative whole number.
pub fn count(value: &str) -> Option<u32> {
    let trimmed = value.trim();
    trimmed.parse::<u32>().ok().or_else(|| {
        number(trimmed)
            .filter(|n| *n >= 0.0 && n.fract() == 0.0)
            .map(|n| n as u32)
    })
}

/// Place cell; tolerates a trailing `=` marking a tie.
pub fn place(value: &str) -> Option<u32> {
    count(value.trim().trim_end_matches('='))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text() {
        assert_eq!(text("  Club  "), Some("Club".to_string()));
        assert_eq!(text("   "), None);
    }

    #[test]
    fn provisional_unreadable_numbers_default_to_none() {
        assert_eq!(number("n/a"), None);
        assert_eq!(number(""), None);
        assert_eq!(count("twelve"), None);
        assert_eq!(count("-3"), None);
        assert_eq!(count("2.5"), None);
    }

    #[test]
    fn test_number_variants() {
        assert_eq!(number("62.5%"), Some(62.5));
        assert_eq!(number("62,5"), Some(62.5));
        assert_eq!(number("-14"), Some(-14.0));
        assert_eq!(count("16.0"), Some(16));
        assert_eq!(place("3="), Some(3));
    }
}
