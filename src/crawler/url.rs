//! Detail page and season script URL derivation
//!
//! Detail pages live under `{source_url}{lang}`:
//! - cups: `/CupMatch/{id}.html`
//! - top-tier leagues (type code 1): `/League/{id}.html`
//! - sub-tier leagues (type code 0): `/SubLeague/{id}.html`
//!
//! Any other league type code is treated as top-tier.

use crate::models::{Competition, CompetitionKind};

const CUP_PATH: &str = "CupMatch";
const LEAGUE_PATH: &str = "League";
const SUB_LEAGUE_PATH: &str = "SubLeague";

/// Path segment of a competition's detail page
#[must_use]
pub fn detail_path(kind: CompetitionKind, type_code: i32) -> &'static str {
    match (kind, type_code) {
        (CompetitionKind::Cup, _) => CUP_PATH,
        (CompetitionKind::League, 0) => SUB_LEAGUE_PATH,
        (CompetitionKind::League, _) => LEAGUE_PATH,
    }
}

/// Primary detail page URL
///
/// # Examples
///
/// ```
/// use leaguedex::crawler::url::detail_url;
/// use leaguedex::models::CompetitionKind;
///
/// let url = detail_url("https://host/cn", CompetitionKind::League, 1, 36);
/// assert_eq!(url, "https://host/cn/League/36.html");
/// ```
#[must_use]
pub fn detail_url(base: &str, kind: CompetitionKind, type_code: i32, id: i64) -> String {
    format!(
        "{}/{}/{id}.html",
        base.trim_end_matches('/'),
        detail_path(kind, type_code)
    )
}

/// Detail URL of a competition
#[must_use]
pub fn competition_url(base: &str, competition: &Competition) -> String {
    detail_url(base, competition.kind, competition.type_code, competition.id)
}

/// The other league path for an unreachable league URL
///
/// Cups have no alternate.
#[must_use]
pub fn alternate_league_url(base: &str, competition: &Competition) -> Option<String> {
    if competition.kind != CompetitionKind::League {
        return None;
    }

    let alternate = match detail_path(competition.kind, competition.type_code) {
        SUB_LEAGUE_PATH => LEAGUE_PATH,
        _ => SUB_LEAGUE_PATH,
    };

    Some(format!(
        "{}/{alternate}/{}.html",
        base.trim_end_matches('/'),
        competition.id
    ))
}

/// Season script URL of a competition
///
/// `source_url` is the site root including its trailing slash.
#[must_use]
pub fn season_url(source_url: &str, event_id: i64) -> String {
    format!("{source_url}jsData/LeagueSeason/sea{event_id}.js")
}
