//! Extraction of regions and competitions from the area script
//!
//! The script consists of statements of the form
//!
//! ```text
//! arrArea[1] = [
//!     ['英格兰', '英格蘭', 'England', 1,
//!         [[36, '英超', '英超', 'Premier League', 1], ...],   // leagues
//!         [[87, '英足总杯', '英足總盃', 'FA Cup', 2], ...]],  // cups
//!     ...
//! ];
//! ```
//!
//! Each `arrArea[i]` group becomes one [`RegionBlock`]. The group's first area
//! tuple names the region; the leagues and cups of every tuple in the group
//! belong to the block and keep the level of the tuple they came from.

use regex::Regex;
use std::sync::LazyLock;

use super::literal::{parse_prefix, Literal};
use crate::models::{Competition, CompetitionKind, Region, RegionBlock};
use crate::utils::error::ExtractionError;
use crate::utils::normalize_whitespace;

static GROUP_ASSIGNMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"arrArea\[(\d+)\]\s*=\s*").expect("Invalid regex pattern"));

/// Minimum arity of an area tuple: three names and a level
const AREA_MIN_ARITY: usize = 4;

/// Arity of a league or cup tuple: id, three names, type code
const COMPETITION_ARITY: usize = 5;

/// Parse the area script into region blocks ordered by group index
///
/// Missing or elided league and cup sub-arrays are treated as empty. Area
/// tuples too short to name a region are skipped with a warning.
///
/// # Errors
///
/// - [`ExtractionError::Malformed`] if an array literal cannot be parsed
/// - [`ExtractionError::Shape`] if a competition tuple has the wrong shape
/// - [`ExtractionError::NoRegions`] if no region could be recovered
pub fn parse(raw_script: &str) -> Result<Vec<RegionBlock>, ExtractionError> {
    let mut groups: Vec<(usize, Literal)> = Vec::new();

    for caps in GROUP_ASSIGNMENT.captures_iter(raw_script) {
        let (Some(whole), Some(index)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let group_index: usize = index
            .as_str()
            .parse()
            .map_err(|_| ExtractionError::shape("arrArea index", index.as_str()))?;

        // `arrArea[i] = new Array();` style declarations carry no data
        let start = whole.end();
        if !raw_script[start..].starts_with('[') {
            tracing::debug!(group = group_index, "Skipping non-literal assignment");
            continue;
        }

        let (value, _) = parse_prefix(&raw_script[start..], start)?;
        groups.push((group_index, value));
    }

    groups.sort_by_key(|(index, _)| *index);

    let mut blocks = Vec::new();
    for (group_index, value) in &groups {
        if let Some(block) = parse_group(*group_index, value)? {
            blocks.push(block);
        }
    }

    if blocks.is_empty() {
        return Err(ExtractionError::NoRegions);
    }

    tracing::debug!(
        groups = groups.len(),
        regions = blocks.len(),
        competitions = blocks.iter().map(RegionBlock::competition_count).sum::<usize>(),
        "Parsed area script"
    );

    Ok(blocks)
}

fn parse_group(group_index: usize, value: &Literal) -> Result<Option<RegionBlock>, ExtractionError> {
    let context = format!("arrArea[{group_index}]");
    let areas = value
        .as_array()
        .ok_or_else(|| ExtractionError::shape(&context, format!("expected array, found {}", value.kind())))?;

    let mut block: Option<RegionBlock> = None;

    for (area_index, area) in areas.iter().enumerate() {
        if area.is_hole() {
            continue;
        }
        let area_context = format!("{context}[{area_index}]");
        let Some(tuple) = area.as_array() else {
            return Err(ExtractionError::shape(&area_context, "area entry is not an array"));
        };

        if tuple.len() < AREA_MIN_ARITY {
            tracing::warn!(context = %area_context, arity = tuple.len(), "Skipping incomplete area tuple");
            continue;
        }

        let region = parse_region(tuple, &area_context)?;
        let leagues = parse_competitions(
            tuple.get(4),
            CompetitionKind::League,
            region.level,
            &format!("{area_context}.leagues"),
        )?;
        let cups = parse_competitions(
            tuple.get(5),
            CompetitionKind::Cup,
            region.level,
            &format!("{area_context}.cups"),
        )?;

        match block.as_mut() {
            Some(existing) => {
                existing.leagues.extend(leagues);
                existing.cups.extend(cups);
            }
            None => {
                block = Some(RegionBlock {
                    region,
                    leagues,
                    cups,
                });
            }
        }
    }

    Ok(block)
}

fn parse_region(tuple: &[Literal], context: &str) -> Result<Region, ExtractionError> {
    let level = tuple[3]
        .to_i64()
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| ExtractionError::shape(context, "level is not a non-negative integer"))?;

    Ok(Region {
        name_zh: text_field(&tuple[0], context, "name_zh")?,
        name_zht: text_field(&tuple[1], context, "name_zht")?,
        name_en: text_field(&tuple[2], context, "name_en")?,
        level,
    })
}

fn parse_competitions(
    list: Option<&Literal>,
    kind: CompetitionKind,
    region_level: u32,
    context: &str,
) -> Result<Vec<Competition>, ExtractionError> {
    let items = match list {
        None | Some(Literal::Hole) => return Ok(Vec::new()),
        Some(Literal::Array(items)) => items,
        // Placeholders like '' or 0 stand for "no competitions"
        Some(Literal::Str(s)) if s.trim().is_empty() => return Ok(Vec::new()),
        Some(Literal::Int(0)) => return Ok(Vec::new()),
        Some(other) => {
            return Err(ExtractionError::shape(
                context,
                format!("expected array, found {}", other.kind()),
            ))
        }
    };

    items
        .iter()
        .enumerate()
        .filter(|(_, item)| !item.is_hole())
        .map(|(i, item)| parse_competition(item, kind, region_level, &format!("{context}[{i}]")))
        .collect()
}

fn parse_competition(
    item: &Literal,
    kind: CompetitionKind,
    region_level: u32,
    context: &str,
) -> Result<Competition, ExtractionError> {
    let tuple = item
        .as_array()
        .ok_or_else(|| ExtractionError::shape(context, "competition entry is not an array"))?;

    if tuple.len() < COMPETITION_ARITY {
        return Err(ExtractionError::shape(
            context,
            format!("expected {COMPETITION_ARITY} fields, found {}", tuple.len()),
        ));
    }

    let id = tuple[0]
        .to_i64()
        .ok_or_else(|| ExtractionError::shape(context, "id is not an integer"))?;
    let type_code = tuple[4]
        .to_i64()
        .and_then(|n| i32::try_from(n).ok())
        .ok_or_else(|| ExtractionError::shape(context, "type code is not an integer"))?;

    Ok(Competition {
        id,
        name_zh: text_field(&tuple[1], context, "name_zh")?,
        name_zht: text_field(&tuple[2], context, "name_zht")?,
        name_en: text_field(&tuple[3], context, "name_en")?,
        kind,
        type_code,
        region_level,
        // Filled in once the detail page has been probed
        detail_url: String::new(),
        url_is_valid: false,
    })
}

fn text_field(value: &Literal, context: &str, field: &str) -> Result<String, ExtractionError> {
    value
        .to_text()
        .map(|s| normalize_whitespace(&s))
        .ok_or_else(|| ExtractionError::shape(context, format!("{field} is not text")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = r#"
var arrArea = new Array();
arrArea[0] = [['国际赛事','國際賽事','International',0,[[1,'世界杯','世界盃','World Cup',1]],[[75,'欧冠杯','歐聯盃','UEFA Champions League',2]]]];
arrArea[1] = [
    ['英格兰','英格蘭','England',1,
        [[36,'英超','英超','Premier League',1],[37,'英冠','英冠','Championship',0],],
        [[87,'英足总杯','英足總盃','FA Cup',2]]],
    ['意大利','意大利','Italy',1,[[34,'意甲','意甲','Serie A',1]],[]],
];
"#;

    #[test]
    fn test_parse_groups() {
        let blocks = parse(SCRIPT).unwrap();
        assert_eq!(blocks.len(), 2);

        assert_eq!(blocks[0].region, Region::new("国际赛事", "國際賽事", "International", 0));
        assert_eq!(blocks[0].leagues.len(), 1);
        assert_eq!(blocks[0].cups.len(), 1);

        let europe = &blocks[1];
        assert_eq!(europe.region.name_en, "England");
        assert_eq!(europe.region.level, 1);
        assert_eq!(europe.leagues.len(), 3);
        assert_eq!(europe.cups.len(), 1);
    }

    #[test]
    fn test_competition_fields() {
        let blocks = parse(SCRIPT).unwrap();
        let epl = &blocks[1].leagues[0];

        assert_eq!(epl.id, 36);
        assert_eq!(epl.name_zh, "英超");
        assert_eq!(epl.name_en, "Premier League");
        assert_eq!(epl.kind, CompetitionKind::League);
        assert_eq!(epl.type_code, 1);
        assert_eq!(epl.region_level, 1);
        assert!(epl.detail_url.is_empty());

        let fa_cup = &blocks[1].cups[0];
        assert_eq!(fa_cup.kind, CompetitionKind::Cup);
        assert_eq!(fa_cup.type_code, 2);
    }

    #[test]
    fn test_missing_sub_arrays_are_empty() {
        let script = "arrArea[2] = [['亚洲','亞洲','Asia',2]];";
        let blocks = parse(script).unwrap();
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].leagues.is_empty());
        assert!(blocks[0].cups.is_empty());
    }

    #[test]
    fn test_empty_placeholder_sub_arrays() {
        let script = "arrArea[3] = [['美洲','美洲','America',3,,'']];";
        let blocks = parse(script).unwrap();
        assert_eq!(blocks[0].competition_count(), 0);
    }

    #[test]
    fn test_elided_league_slot_keeps_cups_in_place() {
        let script = "arrArea[1] = [['英格兰','英格蘭','England',1,,[[87,'英足总杯','英足總盃','FA Cup',2]]]];";
        let blocks = parse(script).unwrap();

        assert!(blocks[0].leagues.is_empty());
        assert_eq!(blocks[0].cups.len(), 1);
        assert_eq!(blocks[0].cups[0].id, 87);
        assert_eq!(blocks[0].cups[0].kind, CompetitionKind::Cup);
    }

    #[test]
    fn test_elided_entries_in_lists_are_skipped() {
        let script = "arrArea[0] = [,['a','b','c',0,[[1,'x','x','X',1],,[2,'y','y','Y',1]]],];";
        let blocks = parse(script).unwrap();

        assert_eq!(blocks[0].region.name_zh, "a");
        let ids: Vec<i64> = blocks[0].leagues.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_no_regions_is_an_error() {
        assert_eq!(parse("var arrArea = new Array();"), Err(ExtractionError::NoRegions));
        assert_eq!(parse("arrArea[0] = [];"), Err(ExtractionError::NoRegions));
        assert_eq!(parse("<html>maintenance</html>"), Err(ExtractionError::NoRegions));
    }

    #[test]
    fn test_malformed_literal_is_rejected() {
        let err = parse("arrArea[0] = [['a','b','c',0, eval('x')]];").unwrap_err();
        assert!(matches!(err, ExtractionError::Malformed { .. }));
    }

    #[test]
    fn test_bad_competition_shape_is_rejected() {
        let err = parse("arrArea[0] = [['a','b','c',0,[[1,'x']],[]]];").unwrap_err();
        assert!(matches!(err, ExtractionError::Shape { .. }));
    }

    #[test]
    fn test_incomplete_area_tuple_is_skipped() {
        let script = "arrArea[0] = [['a','b']];\narrArea[1] = [['c','d','e',1]];";
        let blocks = parse(script).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].region.level, 1);
    }

    #[test]
    fn test_groups_sorted_by_index() {
        let script = "arrArea[2] = [['c','c','C',2]];\narrArea[0] = [['a','a','A',0]];";
        let blocks = parse(script).unwrap();
        assert_eq!(blocks[0].region.level, 0);
        assert_eq!(blocks[1].region.level, 2);
    }
}
