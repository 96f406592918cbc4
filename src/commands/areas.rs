//! The areas job: fetch, extract, probe, reconcile and export the catalog
//!
//! What gets written depends on the local cache files and the store:
//!
//! | store   | cached script & workbook | script / store state   | mode              |
//! |---------|--------------------------|------------------------|-------------------|
//! | empty   | any                      | any                    | full refresh      |
//! | has rows| either missing           | catalog matches store  | local files only  |
//! | has rows| either missing           | catalog differs        | full refresh      |
//! | has rows| both present             | unchanged and in sync  | no change         |
//! | has rows| both present             | otherwise              | full refresh      |

use anyhow::{Context, Result};
use std::fmt;
use std::path::Path;

use crate::config::Config;
use crate::crawler::{Catalog, Crawler, InvalidUrl};
use crate::error::{CatalogError, Error};
use crate::models::RegionBlock;
use crate::reconcile::{ApplyResult, Reconcilable, Reconciler, SyncReport};
use crate::storage::{open_store, CatalogStore, Cell, Sheet, WorkbookWriter};
use crate::utils::same_ignoring_whitespace;

/// Columns of the events workbook
pub const EVENT_COLUMNS: &[&str] = &[
    "region",
    "level",
    "event_id",
    "name_zh",
    "name_zht",
    "name_en",
    "event_type",
    "type_code",
    "access_url",
    "url_status",
];

/// What a run will write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Write the script cache, reconcile the store and export the workbook
    FullRefresh,
    /// Rewrite the script cache and workbook without touching the store
    LocalFilesOnly,
    /// Nothing to do
    NoChange,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FullRefresh => "full refresh",
            Self::LocalFilesOnly => "local files only",
            Self::NoChange => "no change",
        })
    }
}

/// Observations the run mode is decided from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunInputs {
    /// Both store tables hold rows
    pub store_has_data: bool,
    /// The cached area script exists
    pub script_cached: bool,
    /// The events workbook exists
    pub workbook_exists: bool,
    /// The cached script equals the fresh one, ignoring whitespace
    pub script_unchanged: bool,
    /// The fresh catalog has no adds or updates against the store
    pub store_in_sync: bool,
}

/// Choose the run mode
pub fn decide(inputs: RunInputs) -> RunMode {
    if !inputs.store_has_data {
        return RunMode::FullRefresh;
    }

    if !inputs.script_cached || !inputs.workbook_exists {
        return if inputs.store_in_sync {
            RunMode::LocalFilesOnly
        } else {
            RunMode::FullRefresh
        };
    }

    if inputs.script_unchanged && inputs.store_in_sync {
        RunMode::NoChange
    } else {
        RunMode::FullRefresh
    }
}

/// Counts from one entity sync
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncCounts {
    pub adds: usize,
    pub updates: usize,
    pub applied: ApplyResult,
}

impl<T: Reconcilable> From<&SyncReport<T>> for SyncCounts {
    fn from(report: &SyncReport<T>) -> Self {
        Self {
            adds: report.changes.add_count(),
            updates: report.changes.update_count(),
            applied: report.applied,
        }
    }
}

/// End-of-run summary of the areas job
#[derive(Debug, Clone)]
pub struct AreasSummary {
    pub mode: RunMode,
    pub regions: usize,
    pub competitions: usize,
    pub valid_urls: usize,
    pub invalid_urls: Vec<InvalidUrl>,
    pub region_sync: Option<SyncCounts>,
    pub competition_sync: Option<SyncCounts>,
    pub sheets_exported: Option<usize>,
    pub export_error: Option<String>,
}

impl AreasSummary {
    fn new(mode: RunMode, catalog: &Catalog) -> Self {
        Self {
            mode,
            regions: catalog.blocks.len(),
            competitions: catalog.competition_count(),
            valid_urls: catalog.valid_url_count(),
            invalid_urls: catalog.invalid_urls.clone(),
            region_sync: None,
            competition_sync: None,
            sheets_exported: None,
            export_error: None,
        }
    }

    /// Print the summary to stdout
    pub fn print(&self) {
        println!();
        println!("Areas Run Summary");
        println!("=================");
        println!("  Mode:          {}", self.mode);
        println!("  Regions:       {}", self.regions);
        println!("  Competitions:  {}", self.competitions);
        println!(
            "  Detail URLs:   {} valid, {} invalid",
            self.valid_urls,
            self.competitions.saturating_sub(self.valid_urls)
        );

        for (label, counts) in [
            ("Regions", self.region_sync),
            ("Competitions", self.competition_sync),
        ] {
            if let Some(c) = counts {
                println!(
                    "  {label} sync: {} added, {} updated, {} written, {} skipped, {} errors",
                    c.adds,
                    c.updates,
                    c.applied.success_count,
                    c.applied.skipped_count,
                    c.applied.error_count
                );
            }
        }

        if let Some(sheets) = self.sheets_exported {
            println!("  Workbook:      {sheets} sheets");
        }
        if let Some(err) = &self.export_error {
            println!("  Export failed: {err}");
        }

        if !self.invalid_urls.is_empty() {
            println!();
            println!("Invalid detail URLs:");
            for invalid in &self.invalid_urls {
                println!(
                    "  [{}] {}: {}",
                    invalid.region_name, invalid.competition_name, invalid.url
                );
            }
        }
    }
}

/// Run the areas job
///
/// Fetch and extraction failures abort the run. Per-record store failures and
/// export failures are reported in the summary.
pub async fn run(config: &Config) -> Result<AreasSummary> {
    let crawler = Crawler::new(config)?;
    let store = open_store(&config.database)
        .await
        .map_err(Error::from)
        .context("Failed to open catalog store")?;

    run_with(config, &crawler, store.as_ref()).await
}

/// Run the areas job with an explicit crawler and store
pub async fn run_with(
    config: &Config,
    crawler: &Crawler,
    store: &dyn CatalogStore,
) -> Result<AreasSummary> {
    let script = crawler.fetch_area_script().await?;
    let catalog = crawler.build_catalog(&script).await?;

    let reconciler = Reconciler::new(store);
    let counts = store.counts().await.context("Failed to count store rows")?;

    let script_path = config.script_cache_file();
    let cached_script = read_optional(&script_path).await?;
    let workbook_exists = tokio::fs::try_exists(&config.output.events_workbook)
        .await
        .unwrap_or(false);

    let store_in_sync = if counts.has_data() {
        let (regions_changed, _) = reconciler.diff_with_store(&catalog.regions()).await?;
        let (competitions_changed, _) = reconciler
            .diff_with_store(&catalog.competitions())
            .await?;
        !regions_changed && !competitions_changed
    } else {
        false
    };

    let inputs = RunInputs {
        store_has_data: counts.has_data(),
        script_cached: cached_script.is_some(),
        workbook_exists,
        script_unchanged: cached_script
            .as_deref()
            .is_some_and(|cached| same_ignoring_whitespace(cached, &script)),
        store_in_sync,
    };
    let mode = decide(inputs);
    tracing::info!(?inputs, %mode, "Run mode decided");

    let mut summary = AreasSummary::new(mode, &catalog);

    match mode {
        RunMode::NoChange => {
            tracing::info!("Catalog unchanged, nothing to do");
        }
        RunMode::LocalFilesOnly => {
            write_script_cache(&script_path, &script).await?;
            export(config, &catalog, &mut summary);
        }
        RunMode::FullRefresh => {
            write_script_cache(&script_path, &script).await?;

            let regions = reconciler.sync(&catalog.regions()).await?;
            summary.region_sync = Some(SyncCounts::from(&regions));

            let competitions = reconciler.sync(&catalog.competitions()).await?;
            summary.competition_sync = Some(SyncCounts::from(&competitions));

            export(config, &catalog, &mut summary);
        }
    }

    Ok(summary)
}

/// One worksheet per region block
pub fn event_sheets(blocks: &[RegionBlock]) -> Vec<Sheet> {
    blocks
        .iter()
        .map(|block| {
            let mut sheet = Sheet::new(block.region.name_zh.clone(), EVENT_COLUMNS);
            for c in block.competitions() {
                sheet.push_row(vec![
                    Cell::from(block.region.name_zh.as_str()),
                    Cell::from(c.region_level),
                    Cell::from(c.id),
                    Cell::from(c.name_zh.as_str()),
                    Cell::from(c.name_zht.as_str()),
                    Cell::from(c.name_en.as_str()),
                    Cell::from(c.kind.as_str()),
                    Cell::from(c.type_code),
                    Cell::from(c.detail_url.as_str()),
                    Cell::from(i32::from(c.url_is_valid)),
                ]);
            }
            sheet
        })
        .collect()
}

fn export(config: &Config, catalog: &Catalog, summary: &mut AreasSummary) {
    let writer = WorkbookWriter::new(&config.output.events_workbook);
    match writer.write(&event_sheets(&catalog.blocks)) {
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
}

async fn read_optional(path: &Path) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => {
            Err(e).with_context(|| format!("Failed to read cached script: {}", path.display()))
        }
    }
}

async fn write_script_cache(path: &Path, script: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    tokio::fs::write(path, script)
        .await
        .with_context(|| format!("Failed to write script cache: {}", path.display()))?;

    tracing::info!(path = %path.display(), "Script cache written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(store: bool, script: bool, workbook: bool, unchanged: bool, in_sync: bool) -> RunInputs {
        RunInputs {
            store_has_data: store,
            script_cached: script,
            workbook_exists: workbook,
            script_unchanged: unchanged,
            store_in_sync: in_sync,
        }
    }

    #[test]
    fn test_empty_store_always_refreshes() {
        assert_eq!(decide(inputs(false, true, true, true, true)), RunMode::FullRefresh);
        assert_eq!(decide(inputs(false, false, false, false, false)), RunMode::FullRefresh);
    }

    #[test]
    fn test_missing_local_files() {
        assert_eq!(decide(inputs(true, false, true, false, true)), RunMode::LocalFilesOnly);
        assert_eq!(decide(inputs(true, true, false, true, true)), RunMode::LocalFilesOnly);
        assert_eq!(decide(inputs(true, false, false, false, false)), RunMode::FullRefresh);
    }

    #[test]
    fn test_local_files_present() {
        assert_eq!(decide(inputs(true, true, true, true, true)), RunMode::NoChange);
        assert_eq!(decide(inputs(true, true, true, false, true)), RunMode::FullRefresh);
        assert_eq!(decide(inputs(true, true, true, true, false)), RunMode::FullRefresh);
    }

    #[test]
    fn test_event_sheet_rows() {
        let blocks = crate::parser::areas::parse(
            "arrArea[1] = [['英格兰','英格蘭','England',1,[[36,'英超','英超','Premier League',1]],[[87,'英足总杯','英足總盃','FA Cup',2]]]];",
        )
        .unwrap();

        let sheets = event_sheets(&blocks);
        assert_eq!(sheets.len(), 1);
        assert_eq!(sheets[0].name, "英格兰");
        assert_eq!(sheets[0].header.len(), EVENT_COLUMNS.len());
        assert_eq!(sheets[0].rows.len(), 2);
        assert_eq!(sheets[0].rows[1][2], Cell::Int(87));
        assert_eq!(sheets[0].rows[1][6], Cell::Text("cup".into()));
    }
}
