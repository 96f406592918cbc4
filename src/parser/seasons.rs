//! Extraction of season lists from per-competition season scripts

use regex::Regex;
use std::sync::LazyLock;

use super::literal::{parse_prefix, Literal};
use crate::models::Season;
use crate::utils::error::ExtractionError;

static SEASON_ASSIGNMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"var\s+arrSeason\s*=\s*").expect("Invalid regex pattern"));

/// Check whether a script looks like a season payload
pub fn has_season_data(script: &str) -> bool {
    SEASON_ASSIGNMENT.is_match(script) && script.contains('[') && script.contains(']')
}

/// Parse `var arrSeason = [...]` into seasons, preserving upstream order
///
/// # Errors
///
/// - [`ExtractionError::MissingAssignment`] if the script has no `arrSeason`
/// - [`ExtractionError::Malformed`] if the literal cannot be parsed
/// - [`ExtractionError::Shape`] if the value is not a flat list of labels
pub fn parse(script: &str) -> Result<Vec<Season>, ExtractionError> {
    let found = SEASON_ASSIGNMENT
        .find(script)
        .ok_or_else(|| ExtractionError::MissingAssignment("arrSeason".to_string()))?;

    let (value, _) = parse_prefix(&script[found.end()..], found.end())?;
    let labels = match value {
        Literal::Array(labels) => labels,
        other => {
            return Err(ExtractionError::shape(
                "arrSeason",
                format!("expected array, found {}", other.kind()),
            ))
        }
    };

    labels
        .iter()
        .filter(|label| !label.is_hole())
        .map(|label| {
            label
                .to_text()
                .map(|text| Season::parse(&text))
                .ok_or_else(|| ExtractionError::shape("arrSeason", "season label is not text"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_season_labels() {
        let script = "var arrSeason = ['2024-2025','2023-2024','2022'];\nvar other = 1;";
        let seasons = parse(script).unwrap();

        assert_eq!(seasons.len(), 3);
        assert_eq!(seasons[0].start_year, "2024");
        assert_eq!(seasons[0].end_year, "2025");
        assert_eq!(seasons[2].start_year, "2022");
        assert_eq!(seasons[2].end_year, "2022");
    }

    #[test]
    fn test_integer_labels() {
        let seasons = parse("var arrSeason=[2021,2020];").unwrap();
        assert_eq!(seasons[0], Season::parse("2021"));
    }

    #[test]
    fn test_missing_assignment() {
        let err = parse("var arrTeam = [];").unwrap_err();
        assert_eq!(err, ExtractionError::MissingAssignment("arrSeason".to_string()));
    }

    #[test]
    fn test_nested_value_is_rejected() {
        assert!(matches!(
            parse("var arrSeason = [['2024']];"),
            Err(ExtractionError::Shape { .. })
        ));
    }

    #[test]
    fn test_has_season_data() {
        assert!(has_season_data("var arrSeason = ['2024'];"));
        assert!(!has_season_data("<title>404</title>"));
    }
}
