//! Common test utilities

#![allow(dead_code)]

use std::path::Path;

use leaguedex::config::Config;
use leaguedex::models::{Competition, CompetitionKind, Region};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path of the area script on the mock server
pub const AREAS_PATH: &str = "/jsData/leftData/leftData.js";

/// Two groups: international (level 0) and Europe headed by England (level 1)
pub const SAMPLE_SCRIPT: &str = r#"
var arrArea = new Array();
arrArea[0] = [['国际赛事','國際賽事','International',0,[[1,'世界杯','世界盃','World Cup',1]],[[75,'欧冠杯','歐聯盃','UEFA Champions League',2]]]];
arrArea[1] = [
    ['英格兰','英格蘭','England',1,
        [[36,'英超','英超','Premier League',1],[37,'英冠','英冠','Championship',0]],
        [[87,'英足总杯','英足總盃','FA Cup',2]]]
];
"#;

/// A page body that passes the reachability heuristic
pub fn real_page(title: &str) -> String {
    format!(
        "<html><head><title>{title}</title></head><body>{}</body></html>",
        "<p>fixture</p>".repeat(200)
    )
}

/// A soft-404 page served with status 200
pub fn soft_404_page() -> String {
    format!(
        "<html><head><title>404</title></head><body>{}</body></html>",
        "<p>missing</p>".repeat(200)
    )
}

/// Configuration pointing every upstream URL at `server` and every output
/// file into `dir`
pub fn test_config(server: &MockServer, dir: &Path) -> Config {
    let mut config = Config::default();
    config.source.source_url = format!("{}/", server.uri());
    config.source.areas_url = format!("{}{AREAS_PATH}", server.uri());

    config.fetcher.rate_limit = 100;
    config.fetcher.max_retries = 0;
    config.fetcher.request_timeout_secs = 5;

    config.prober.request_timeout_secs = 5;
    config.prober.dispatch_delay_min_ms = 0;
    config.prober.dispatch_delay_max_ms = 0;

    config.database.sqlite_path = dir.join("catalog.db");
    config.output.script_cache_dir = dir.join("source_js");
    config.output.events_workbook = dir.join("events.xlsx");
    config.output.seasons_workbook = dir.join("seasons.xlsx");
    config
}

/// Serve `body` with status 200 at `route`
pub async fn mount_page(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// Serve the sample script and a real detail page for every sample competition
pub async fn mount_sample_site(server: &MockServer) {
    mount_site(server, SAMPLE_SCRIPT.to_string()).await;
}

/// Serve `script` as the area script alongside the sample detail pages
pub async fn mount_site(server: &MockServer, script: String) {
    mount_page(server, AREAS_PATH, script).await;
    for route in [
        "/cn/League/1.html",
        "/cn/CupMatch/75.html",
        "/cn/League/36.html",
        "/cn/SubLeague/37.html",
        "/cn/CupMatch/87.html",
    ] {
        mount_page(server, route, real_page(route)).await;
    }
}

pub fn region(name_zh: &str, level: u32) -> Region {
    Region::new(name_zh, name_zh, "Region", level)
}

pub fn league(id: i64, level: u32) -> Competition {
    Competition {
        id,
        name_zh: format!("联赛{id}"),
        name_zht: format!("聯賽{id}"),
        name_en: format!("League {id}"),
        kind: CompetitionKind::League,
        type_code: 1,
        region_level: level,
        detail_url: format!("https://host/cn/League/{id}.html"),
        url_is_valid: true,
    }
}

pub fn cup(id: i64, level: u32) -> Competition {
    Competition {
        id,
        name_zh: format!("杯赛{id}"),
        name_zht: format!("盃賽{id}"),
        name_en: format!("Cup {id}"),
        kind: CompetitionKind::Cup,
        type_code: 2,
        region_level: level,
        detail_url: format!("https://host/cn/CupMatch/{id}.html"),
        url_is_valid: false,
    }
}
