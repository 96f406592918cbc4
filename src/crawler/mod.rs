//! Catalog crawling: fetch the area script, extract it and probe detail pages
//!
//! The [`Crawler`] ties the [`ScriptFetcher`], the area extractor and the
//! [`UrlProber`] together. Each detail URL is probed once per crawler, so a
//! catalog built for a store comparison and reused for a refresh shares its
//! probe results.

pub mod fetcher;
pub mod probe;
pub mod url;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{Competition, CompetitionKind, Region, RegionBlock};
use crate::parser;

pub use fetcher::ScriptFetcher;
pub use probe::UrlProber;

/// A detail URL that failed its probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidUrl {
    pub region_name: String,
    pub competition_name: String,
    pub url: String,
}

/// Regions and competitions of one crawl, with probed detail URLs
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub blocks: Vec<RegionBlock>,
    /// Primary URLs that failed, including leagues later rescued by the alternate path
    pub invalid_urls: Vec<InvalidUrl>,
}

impl Catalog {
    /// All regions, in group order
    pub fn regions(&self) -> Vec<Region> {
        self.blocks.iter().map(|block| block.region.clone()).collect()
    }

    /// All competitions, in group order, leagues before cups
    pub fn competitions(&self) -> Vec<Competition> {
        self.blocks
            .iter()
            .flat_map(|block| block.competitions().cloned())
            .collect()
    }

    /// Number of competitions with a reachable detail page
    pub fn valid_url_count(&self) -> usize {
        self.blocks
            .iter()
            .flat_map(RegionBlock::competitions)
            .filter(|c| c.url_is_valid)
            .count()
    }

    /// Total number of competitions
    pub fn competition_count(&self) -> usize {
        self.blocks.iter().map(RegionBlock::competition_count).sum()
    }
}

/// Main crawler structure
pub struct Crawler {
    /// Script fetcher
    fetcher: ScriptFetcher,

    /// Detail page prober
    prober: UrlProber,

    /// Area script URL
    areas_url: String,

    /// Root of detail page URLs
    detail_base: String,
}

impl Crawler {
    /// Create a new crawler instance
    pub fn new(config: &Config) -> Result<Self> {
        config
            .validate()
            .map_err(|e| Error::config(format!("Invalid configuration: {e}")))?;

        let fetcher = ScriptFetcher::from_config(&config.fetcher)?;
        let prober = UrlProber::new(&config.prober)?;

        Ok(Self::from_parts(fetcher, prober, config))
    }

    /// Assemble a crawler from pre-built parts
    pub fn from_parts(fetcher: ScriptFetcher, prober: UrlProber, config: &Config) -> Self {
        Self {
            fetcher,
            prober,
            areas_url: config.source.areas_url.clone(),
            detail_base: config.detail_base_url(),
        }
    }

    /// Download the raw area script
    pub async fn fetch_area_script(&self) -> Result<String> {
        tracing::info!(url = %self.areas_url, "Fetching area script");

        let script = self.fetcher.fetch_text(&self.areas_url).await?;

        tracing::info!(bytes = script.len(), "Area script fetched");
        Ok(script)
    }

    /// Extract the script and probe every competition's detail page
    ///
    /// Leagues whose primary URL fails are retried on the alternate league
    /// path; the record keeps whichever URL was probed last and its result.
    pub async fn build_catalog(&self, raw_script: &str) -> Result<Catalog> {
        let mut blocks = parser::areas::parse(raw_script)?;

        let primary_urls: Vec<String> = blocks
            .iter()
            .flat_map(RegionBlock::competitions)
            .map(|c| url::competition_url(&self.detail_base, c))
            .collect();
        let primary = self.prober.probe_all(primary_urls).await;

        let mut invalid_urls = Vec::new();
        let mut fallbacks = Vec::new();

        for block in &mut blocks {
            let region_name = block.region.name_zh.clone();

            for competition in block.competitions_mut() {
                let primary_url = url::competition_url(&self.detail_base, competition);
                let valid = primary.get(&primary_url).copied().unwrap_or(false);

                if !valid {
                    invalid_urls.push(InvalidUrl {
                        region_name: region_name.clone(),
                        competition_name: competition.name_zh.clone(),
                        url: primary_url.clone(),
                    });
                    if let Some(alternate) = url::alternate_league_url(&self.detail_base, competition) {
                        fallbacks.push(alternate);
                    }
                }

                competition.detail_url = primary_url;
                competition.url_is_valid = valid;
            }
        }

        if !fallbacks.is_empty() {
            tracing::info!(count = fallbacks.len(), "Probing alternate league URLs");
            let alternates = self.prober.probe_all(fallbacks).await;

            for competition in blocks.iter_mut().flat_map(RegionBlock::competitions_mut) {
                if competition.url_is_valid || competition.kind != CompetitionKind::League {
                    continue;
                }
                if let Some(alternate) = url::alternate_league_url(&self.detail_base, competition) {
                    competition.url_is_valid = alternates.get(&alternate).copied().unwrap_or(false);
                    competition.detail_url = alternate;
                }
            }
        }

        let catalog = Catalog {
            blocks,
            invalid_urls,
        };

        tracing::info!(
            regions = catalog.blocks.len(),
            competitions = catalog.competition_count(),
            valid_urls = catalog.valid_url_count(),
            "Catalog built"
        );

        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crawler_creation() {
        let crawler = Crawler::new(&Config::default());
        assert!(crawler.is_ok());
    }

    #[test]
    fn test_invalid_config_fails() {
        let mut config = Config::default();
        config.prober.max_concurrent_requests = 0;
        assert!(matches!(Crawler::new(&config), Err(Error::Config(_))));
    }

    #[test]
    fn test_catalog_counts() {
        let mut league = Competition {
            id: 36,
            name_zh: "英超".into(),
            name_zht: "英超".into(),
            name_en: "Premier League".into(),
            kind: CompetitionKind::League,
            type_code: 1,
            region_level: 1,
            detail_url: String::new(),
            url_is_valid: true,
        };
        let mut cup = league.clone();
        cup.id = 87;
        cup.kind = CompetitionKind::Cup;
        cup.type_code = 2;
        cup.url_is_valid = false;
        league.name_en = "EPL".into();

        let catalog = Catalog {
            blocks: vec![RegionBlock {
                region: Region::new("英格兰", "英格蘭", "England", 1),
                leagues: vec![league],
                cups: vec![cup],
            }],
            invalid_urls: Vec::new(),
        };

        assert_eq!(catalog.regions().len(), 1);
        assert_eq!(catalog.competitions().len(), 2);
        assert_eq!(catalog.competition_count(), 2);
        assert_eq!(catalog.valid_url_count(), 1);
    }
}
