use anyhow::{Context, Result};
use tracing::debug;

use crate::roster::Player;
use crate::stats_api::{ResultSet, StatsSource};

pub const SHOT_COLUMNS: [&str; 12] = [
    "GAME_ID",
    "PLAYER_ID",
    "PLAYER_NAME",
    "SHOT_ZONE_BASIC",
    "SHOT_ZONE_AREA",
    "SHOT_ZONE_RANGE",
    "SHOT_DISTANCE",
    "LOC_X",
    "LOC_Y",
    "SHOT_ATTEMPTED_FLAG",
    "SHOT_MADE_FLAG",
    "GAME_DATE",
];

/// One attempted field goal.
#[derive(Debug, Clone, PartialEq)]
pub struct ShotRecord {
    pub game_id: String,
    pub player_id: u32,
    pub player_name: String,
    pub zone_basic: String,
    pub zone_area: String,
    pub zone_range: String,
    pub shot_distance: f64,
    pub loc_x: f64,
    pub loc_y: f64,
    pub attempted: u8,
    pub made: u8,
    pub game_date: String,
}

pub fn fetch_player_shots(
    source: &dyn StatsSource,
    player: &Player,
    season: &str,
    include_misses: bool,
) -> Result<Vec<ShotRecord>> {
    let set = source
        .shot_chart(player.id, season, include_misses)
        .context("shot chart request failed")?;
    shots_from_set(&set, player)
}

/// Decodes a shot chart result set. The player name comes from the roster,
/// not from the source rows.
pub fn shots_from_set(set: &ResultSet, player: &Player) -> Result<Vec<ShotRecord>> {
    if set.is_empty() {
        return Ok(Vec::new());
    }
    // Every source column except PLAYER_NAME, which is injected.
    let cols = set.require_columns(&[
        "GAME_ID",
        "PLAYER_ID",
        "SHOT_ZONE_BASIC",
        "SHOT_ZONE_AREA",
        "SHOT_ZONE_RANGE",
        "SHOT_DISTANCE",
        "LOC_X",
        "LOC_Y",
        "SHOT_ATTEMPTED_FLAG",
        "SHOT_MADE_FLAG",
        "GAME_DATE",
    ])?;

    let mut out = Vec::with_capacity(set.len());
    let mut skipped = 0usize;
    for row in &set.rows {
        let parsed = (|| {
            Some(ShotRecord {
                game_id: ResultSet::string_at(row, cols[0])?,
                player_id: ResultSet::u32_at(row, cols[1]).unwrap_or(player.id),
                player_name: player.name.clone(),
                zone_basic: ResultSet::string_at(row, cols[2]).unwrap_or_default(),
                zone_area: ResultSet::string_at(row, cols[3]).unwrap_or_default(),
                zone_range: ResultSet::string_at(row, cols[4]).unwrap_or_default(),
                shot_distance: ResultSet::f64_at(row, cols[5])?,
                loc_x: ResultSet::f64_at(row, cols[6])?,
                loc_y: ResultSet::f64_at(row, cols[7])?,
                attempted: flag(ResultSet::i64_at(row, cols[8]).unwrap_or(1)),
                made: flag(ResultSet::i64_at(row, cols[9])?),
                game_date: ResultSet::string_at(row, cols[10]).unwrap_or_default(),
            })
        })();
        match parsed {
            Some(shot) => out.push(shot),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        debug!(player_id = player.id, skipped, "dropped malformed shot rows");
    }
    Ok(out)
}

fn flag(v: i64) -> u8 {
    u8::from(v != 0)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::shots_from_set;
    use crate::roster::Player;
    use crate::stats_api::ResultSet;

    fn player() -> Player {
        Player {
            id: 201939,
            name: "Stephen Curry".to_string(),
        }
    }

    #[test]
    fn empty_set_is_empty_result() {
        let shots = shots_from_set(&ResultSet::default(), &player()).unwrap();
        assert!(shots.is_empty());
    }

    #[test]
    fn missing_column_is_an_error() {
        let set = ResultSet {
            name: "Shot_Chart_Detail".to_string(),
            headers: vec!["GAME_ID".to_string()],
            rows: vec![vec![json!("0022300001")]],
        };
        assert!(shots_from_set(&set, &player()).is_err());
    }

    #[test]
    fn rows_without_made_flag_are_skipped() {
        let headers = [
            "GAME_ID",
            "PLAYER_ID",
            "SHOT_ZONE_BASIC",
            "SHOT_ZONE_AREA",
            "SHOT_ZONE_RANGE",
            "SHOT_DISTANCE",
            "LOC_X",
            "LOC_Y",
            "SHOT_ATTEMPTED_FLAG",
            "SHOT_MADE_FLAG",
            "GAME_DATE",
        ];
        let set = ResultSet {
            name: "Shot_Chart_Detail".to_string(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: vec![
                vec![
                    json!("0022300001"),
                    json!(201939),
                    json!("Above the Break 3"),
                    json!("Center(C)"),
                    json!("24+ ft."),
                    json!(26),
                    json!(-12),
                    json!(262),
                    json!(1),
                    json!(1),
                    json!("20231024"),
                ],
                vec![
                    json!("0022300001"),
                    json!(201939),
                    json!("Restricted Area"),
                    json!("Center(C)"),
                    json!("Less Than 8 ft."),
                    json!(1),
                    json!(3),
                    json!(9),
                    json!(1),
                    json!(null),
                    json!("20231024"),
                ],
            ],
        };
        let shots = shots_from_set(&set, &player()).unwrap();
        assert_eq!(shots.len(), 1);
        assert_eq!(shots[0].player_name, "Stephen Curry");
        assert_eq!(shots[0].made, 1);
        assert_eq!(shots[0].shot_distance, 26.0);
    }
}
