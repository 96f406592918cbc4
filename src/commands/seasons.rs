//! The seasons job: discover the seasons of every persisted competition

use anyhow::{Context, Result};
use std::collections::HashMap;

use crate::config::Config;
use crate::crawler::url::season_url;
use crate::crawler::{InvalidUrl, UrlProber};
use crate::error::{CatalogError, Error};
use crate::models::{RegionCompetition, Season};
use crate::parser;
use crate::storage::{open_store, CatalogStore, Cell, Sheet, WorkbookWriter};

/// Columns of the seasons workbook
pub const SEASON_COLUMNS: &[&str] = &[
    "event_id",
    "name_zh",
    "type_code",
    "access_url",
    "season_url",
    "seasons",
];

/// Placeholder for competitions without season data
pub const NO_DATA: &str = "no data";

/// Season lookup result for one competition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeasonRecord {
    pub competition: RegionCompetition,
    pub season_url: String,
    /// `None` when the season script is missing or unusable
    pub seasons: Option<Vec<Season>>,
}

impl SeasonRecord {
    pub fn is_valid(&self) -> bool {
        self.seasons.is_some()
    }

    /// Seasons as a JSON array, or [`NO_DATA`] when there are none
    pub fn seasons_cell(&self) -> String {
        self.seasons
            .as_ref()
            .filter(|seasons| !seasons.is_empty())
            .and_then(|seasons| serde_json::to_string(seasons).ok())
            .unwrap_or_else(|| NO_DATA.to_string())
    }

    fn invalid_url(&self) -> InvalidUrl {
        InvalidUrl {
            region_name: self.competition.region_name.clone(),
            competition_name: self.competition.name_zh.clone(),
            url: self.season_url.clone(),
        }
    }
}

/// End-of-run summary of the seasons job
#[derive(Debug, Clone, Default)]
pub struct SeasonsSummary {
    pub competitions: usize,
    pub valid: usize,
    pub invalid_urls: Vec<InvalidUrl>,
    pub sheets_exported: Option<usize>,
    pub export_error: Option<String>,
}

impl SeasonsSummary {
    /// Print the summary to stdout
    pub fn print(&self) {
        println!();
        println!("Season Discovery Summary");
        println!("========================");
        println!("  Competitions:  {}", self.competitions);
        println!("  Season URLs:   {} valid, {} invalid", self.valid, self.invalid_urls.len());
        if let Some(sheets) = self.sheets_exported {
            println!("  Workbook:      {sheets} sheets");
        }
        if let Some(err) = &self.export_error {
            println!("  Export failed: {err}");
        }
        if !self.invalid_urls.is_empty() {
            println!();
            println!("Invalid season URLs:");
            for invalid in &self.invalid_urls {
                println!(
                    "  [{}] {}: {}",
                    invalid.region_name, invalid.competition_name, invalid.url
                );
            }
        }
    }
}

/// Run the seasons job
pub async fn run(config: &Config) -> Result<SeasonsSummary> {
    let store = open_store(&config.database)
        .await
        .map_err(Error::from)
        .context("Failed to open catalog store")?;
    let prober = UrlProber::new(&config.prober)
        .map_err(Error::from)
        .context("Failed to create URL prober")?;

    run_with(config, &prober, store.as_ref()).await
}

/// Run the seasons job with an explicit prober and store
pub async fn run_with(
    config: &Config,
    prober: &UrlProber,
    store: &dyn CatalogStore,
) -> Result<SeasonsSummary> {
    let competitions = store
        .competitions_by_region()
        .await
        .context("Failed to load competitions")?;
    tracing::info!(count = competitions.len(), "Discovering seasons");

    let records = discover(prober, &config.source.source_url, competitions).await;

    let mut summary = SeasonsSummary {
        competitions: records.len(),
        valid: records.iter().filter(|r| r.is_valid()).count(),
        invalid_urls: records
            .iter()
            .filter(|r| !r.is_valid())
            .map(SeasonRecord::invalid_url)
            .collect(),
        ..SeasonsSummary::default()
    };

    let writer = WorkbookWriter::new(&config.output.seasons_workbook);
    match writer.write(&season_sheets(&records)) {
        Ok(sheets) => summary.sheets_exported = Some(sheets),
        Err(e) => {
            tracing::error!(
                path = %writer.path().display(),
                category = e.category().label(),
                error = %e,
                "Workbook export failed"
            );
            summary.export_error = Some(e.to_string());
        }
    }

    Ok(summary)
}

/// Fetch and parse the season script of every competition
///
/// Requests share the prober's concurrency limit. Results keep input order.
pub async fn discover(
    prober: &UrlProber,
    source_url: &str,
    competitions: Vec<RegionCompetition>,
) -> Vec<SeasonRecord> {
    let mut handles = Vec::with_capacity(competitions.len());

    for competition in &competitions {
        let url = season_url(source_url, competition.event_id);
        let prober = prober.clone();
        let event_id = competition.event_id;
        handles.push(tokio::spawn(async move {
            let seasons = fetch_seasons(&prober, &url).await;
            (event_id, url, seasons)
        }));
    }

    let mut found: HashMap<i64, (String, Option<Vec<Season>>)> = HashMap::new();
    for joined in futures::future::join_all(handles).await {
        match joined {
            Ok((event_id, url, seasons)) => {
                found.insert(event_id, (url, seasons));
            }
            Err(e) => tracing::warn!(error = %e, "Season task failed"),
        }
    }

    competitions
        .into_iter()
        .map(|competition| {
            let (url, seasons) = found
                .remove(&competition.event_id)
                .unwrap_or_else(|| (season_url(source_url, competition.event_id), None));
            SeasonRecord {
                competition,
                season_url: url,
                seasons,
            }
        })
        .collect()
}

async fn fetch_seasons(prober: &UrlProber, url: &str) -> Option<Vec<Season>> {
    let body = prober.fetch_body(url).await?;

    if prober.has_not_found_marker(&body) || !parser::seasons::has_season_data(&body) {
        tracing::debug!(url = %url, "No season data");
        return None;
    }

    match parser::seasons::parse(&body) {
        Ok(seasons) => {
            tracing::debug!(url = %url, count = seasons.len(), "Seasons found");
            Some(seasons)
        }
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "Unparsable season script");
            None
        }
    }
}

/// One worksheet per region, in region level order
pub fn season_sheets(records: &[SeasonRecord]) -> Vec<Sheet> {
    let mut sheets: Vec<(u32, Sheet)> = Vec::new();

    for record in records {
        let c = &record.competition;
        let index = match sheets.iter().position(|(level, _)| *level == c.region_level) {
            Some(index) => index,
            None => {
                sheets.push((c.region_level, Sheet::new(c.region_name.clone(), SEASON_COLUMNS)));
                sheets.len() - 1
            }
        };

        sheets[index].1.push_row(vec![
            Cell::from(c.event_id),
            Cell::from(c.name_zh.as_str()),
            Cell::from(c.type_code),
            Cell::from(c.access_url.as_str()),
            Cell::from(record.season_url.as_str()),
            Cell::from(record.seasons_cell()),
        ]);
    }

    sheets.sort_by_key(|(level, _)| *level);
    sheets.into_iter().map(|(_, sheet)| sheet).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(level: u32, region: &str, id: i64, seasons: Option<Vec<Season>>) -> SeasonRecord {
        SeasonRecord {
            competition: RegionCompetition {
                region_level: level,
                region_name: region.into(),
                event_id: id,
                name_zh: format!("赛事{id}"),
                type_code: 1,
                access_url: format!("https://host/cn/League/{id}.html"),
            },
            season_url: format!("https://host/jsData/LeagueSeason/sea{id}.js"),
            seasons,
        }
    }

    #[test]
    fn test_seasons_cell() {
        let with = record(0, "国际", 1, Some(vec![Season::parse("2024-2025")]));
        assert_eq!(with.seasons_cell(), r#"[{"start_year":"2024","end_year":"2025"}]"#);

        let without = record(0, "国际", 2, None);
        assert_eq!(without.seasons_cell(), NO_DATA);
        assert!(!without.is_valid());

        let empty = record(0, "国际", 3, Some(Vec::new()));
        assert_eq!(empty.seasons_cell(), NO_DATA);
    }

    #[test]
    fn test_sheets_grouped_by_region() {
        let records = vec![
            record(1, "欧洲", 36, None),
            record(0, "国际", 75, None),
            record(1, "欧洲", 40, None),
        ];

        let sheets = season_sheets(&records);
        assert_eq!(sheets.len(), 2);
        assert_eq!(sheets[0].name, "国际");
        assert_eq!(sheets[1].name, "欧洲");
        assert_eq!(sheets[1].rows.len(), 2);
        assert_eq!(sheets[1].rows[0][5], Cell::Text(NO_DATA.into()));
    }
}
