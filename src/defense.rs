use std::collections::HashMap;

use anyhow::{Context, Result};
use tracing::debug;

use crate::config::DefenseSource;
use crate::roster::Player;
use crate::stats_api::{MeasureType, ResultSet, StatsSource};

pub const DEFENSE_COLUMNS: [&str; 2] = ["DEF_RATING", "BLK_PCT"];

#[derive(Debug, Clone, PartialEq)]
pub struct DefenseRecord {
    pub player_id: u32,
    pub player_name: String,
    pub def_rating: f64,
    pub blk_pct: Option<f64>,
}

/// Per-player defensive lookup. The league strategy downloads the season table
/// once and answers later players from memory.
pub struct DefenseFetcher {
    strategy: DefenseSource,
    league_table: Option<HashMap<u32, DefenseRecord>>,
}

impl DefenseFetcher {
    pub fn new(strategy: DefenseSource) -> Self {
        Self {
            strategy,
            league_table: None,
        }
    }

    pub fn strategy(&self) -> DefenseSource {
        self.strategy
    }

    pub fn fetch(
        &mut self,
        source: &dyn StatsSource,
        player: &Player,
        season: &str,
    ) -> Result<Option<DefenseRecord>> {
        match self.strategy {
            DefenseSource::League => self.fetch_from_league(source, player, season),
            DefenseSource::Career => {
                let set = source
                    .career_stats(player.id)
                    .context("career stats request failed")?;
                Ok(career_average(&set, player))
            }
        }
    }

    fn fetch_from_league(
        &mut self,
        source: &dyn StatsSource,
        player: &Player,
        season: &str,
    ) -> Result<Option<DefenseRecord>> {
        if self.league_table.is_none() {
            let set = source
                .league_player_stats(season, MeasureType::Advanced)
                .context("league advanced stats request failed")?;
            let table = league_records(&set)?;
            debug!(players = table.len(), "cached league defensive table");
            self.league_table = Some(table);
        }
        let found = self
            .league_table
            .as_ref()
            .and_then(|t| t.get(&player.id))
            .cloned();
        if found.is_none() {
            debug!(player_id = player.id, player = %player.name, "no defensive data");
        }
        Ok(found)
    }
}

/// Every row of a league-wide Advanced table that carries a defensive rating.
pub fn league_records(set: &ResultSet) -> Result<HashMap<u32, DefenseRecord>> {
    let mut out = HashMap::new();
    if set.is_empty() {
        return Ok(out);
    }
    let cols = set.require_columns(&["PLAYER_ID", "PLAYER_NAME", "DEF_RATING"])?;
    let blk_col = set.column("BLK_PCT");
    for row in &set.rows {
        let (Some(id), Some(def_rating)) = (
            ResultSet::u32_at(row, cols[0]),
            ResultSet::f64_at(row, cols[2]),
        ) else {
            continue;
        };
        out.entry(id).or_insert_with(|| DefenseRecord {
            player_id: id,
            player_name: ResultSet::string_at(row, cols[1]).unwrap_or_default(),
            def_rating,
            blk_pct: blk_col.and_then(|c| ResultSet::f64_at(row, c)),
        });
    }
    Ok(out)
}

/// Averages a player's career rows. Tables lacking either defensive column
/// produce nothing.
pub fn career_average(set: &ResultSet, player: &Player) -> Option<DefenseRecord> {
    if set.is_empty() || !set.has_columns(&["PLAYER_ID", "BLK_PCT", "DEF_RATING"]) {
        debug!(player_id = player.id, "career stats lack defensive columns");
        return None;
    }
    let id_col = set.column("PLAYER_ID")?;
    let blk_col = set.column("BLK_PCT")?;
    let def_col = set.column("DEF_RATING")?;

    let mut def_sum = 0.0_f64;
    let mut def_n = 0usize;
    let mut blk_sum = 0.0_f64;
    let mut blk_n = 0usize;
    for row in &set.rows {
        if ResultSet::u32_at(row, id_col) != Some(player.id) {
            continue;
        }
        if let Some(v) = ResultSet::f64_at(row, def_col) {
            def_sum += v;
            def_n += 1;
        }
        if let Some(v) = ResultSet::f64_at(row, blk_col) {
            blk_sum += v;
            blk_n += 1;
        }
    }
    if def_n == 0 {
        return None;
    }
    Some(DefenseRecord {
        player_id: player.id,
        player_name: player.name.clone(),
        def_rating: def_sum / def_n as f64,
        blk_pct: (blk_n > 0).then(|| blk_sum / blk_n as f64),
    })
}
