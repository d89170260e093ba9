use anyhow::{Context, Result, anyhow};
use reqwest::blocking::Client;
use serde_json::Value;
use tracing::debug;

use crate::config::PipelineConfig;
use crate::http_client::{Throttle, http_client};

const LEAGUE_ID: &str = "00";
const SEASON_TYPE: &str = "Regular Season";

/// One tabular payload from the stats API: a header row plus value rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.eq_ignore_ascii_case(name))
    }

    pub fn has_columns(&self, names: &[&str]) -> bool {
        names.iter().all(|n| self.column(n).is_some())
    }

    /// Column indices for `names`, failing on the first one that is absent.
    pub fn require_columns(&self, names: &[&str]) -> Result<Vec<usize>> {
        names
            .iter()
            .map(|n| {
                self.column(n)
                    .ok_or_else(|| anyhow!("result set '{}' has no column {n}", self.name))
            })
            .collect()
    }

    pub fn f64_at(row: &[Value], idx: usize) -> Option<f64> {
        match row.get(idx)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .filter(|v| v.is_finite())
    }

    pub fn i64_at(row: &[Value], idx: usize) -> Option<i64> {
        match row.get(idx)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    pub fn u32_at(row: &[Value], idx: usize) -> Option<u32> {
        Self::i64_at(row, idx).and_then(|v| u32::try_from(v).ok())
    }

    pub fn string_at(row: &[Value], idx: usize) -> Option<String> {
        match row.get(idx)? {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

/// Parses a stats API body into its result sets. `null` and blank bodies are
/// treated as having no sets.
pub fn parse_result_sets(raw: &str) -> Result<Vec<ResultSet>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    let v: Value = serde_json::from_str(trimmed).context("invalid stats json")?;

    // Most endpoints use `resultSets: [...]`; a few answer with a single `resultSet`.
    let sets = match (v.get("resultSets"), v.get("resultSet")) {
        (Some(Value::Array(arr)), _) => arr.iter().collect::<Vec<_>>(),
        (Some(obj @ Value::Object(_)), _) => vec![obj],
        (_, Some(Value::Array(arr))) => arr.iter().collect(),
        (_, Some(obj @ Value::Object(_))) => vec![obj],
        _ => return Err(anyhow!("stats response has no result sets")),
    };

    Ok(sets.into_iter().filter_map(parse_result_set).collect())
}

fn parse_result_set(v: &Value) -> Option<ResultSet> {
    let name = v
        .get("name")
        .and_then(|x| x.as_str())
        .unwrap_or_default()
        .to_string();
    let headers = v
        .get("headers")?
        .as_array()?
        .iter()
        .filter_map(|h| h.as_str().map(|s| s.to_string()))
        .collect::<Vec<_>>();
    let rows = v
        .get("rowSet")
        .and_then(|x| x.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|r| r.as_array().cloned())
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    Some(ResultSet {
        name,
        headers,
        rows,
    })
}

/// Picks the set named `name`, falling back to the first one. No sets yields
/// an empty table rather than an error.
pub fn pick_set(mut sets: Vec<ResultSet>, name: &str) -> ResultSet {
    if let Some(pos) = sets.iter().position(|s| s.name.eq_ignore_ascii_case(name)) {
        return sets.swap_remove(pos);
    }
    if sets.is_empty() {
        ResultSet::default()
    } else {
        sets.swap_remove(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasureType {
    Base,
    Advanced,
}

impl MeasureType {
    fn as_param(self) -> &'static str {
        match self {
            MeasureType::Base => "Base",
            MeasureType::Advanced => "Advanced",
        }
    }
}

/// The four read-only queries the pipeline issues against the stats source.
pub trait StatsSource {
    fn all_players(&self, season: &str) -> Result<ResultSet>;

    fn league_player_stats(&self, season: &str, measure: MeasureType) -> Result<ResultSet>;

    fn shot_chart(&self, player_id: u32, season: &str, include_misses: bool) -> Result<ResultSet>;

    fn career_stats(&self, player_id: u32) -> Result<ResultSet>;
}

/// HTTP-backed stats source. Every request passes through one throttle.
pub struct NbaStatsClient {
    client: Client,
    base_url: String,
    throttle: Throttle,
}

impl NbaStatsClient {
    pub fn new(cfg: &PipelineConfig) -> Result<Self> {
        let throttle = Throttle::new(cfg.api_delay);
        debug!(
            base_url = %cfg.base_url,
            cooldown_ms = throttle.cooldown().as_millis() as u64,
            "stats client ready"
        );
        Ok(Self {
            client: http_client(cfg.timeout)?,
            base_url: cfg.base_url.clone(),
            throttle,
        })
    }

    fn get(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Vec<ResultSet>> {
        let url = format!("{}/{endpoint}", self.base_url);
        let body = self.throttle.run(|| -> Result<String> {
            debug!(endpoint, "stats request");
            let resp = self
                .client
                .get(&url)
                .query(params)
                .send()
                .with_context(|| format!("{endpoint} request failed"))?;
            let status = resp.status();
            let body = resp.text().context("failed reading body")?;
            if !status.is_success() {
                return Err(anyhow!("{endpoint}: http {status}"));
            }
            Ok(body)
        })?;
        parse_result_sets(&body).with_context(|| format!("{endpoint} response"))
    }
}

impl StatsSource for NbaStatsClient {
    fn all_players(&self, season: &str) -> Result<ResultSet> {
        let params = [
            ("LeagueID", LEAGUE_ID.to_string()),
            ("Season", season.to_string()),
            ("IsOnlyCurrentSeason", "0".to_string()),
        ];
        let sets = self.get("commonallplayers", &params)?;
        Ok(pick_set(sets, "CommonAllPlayers"))
    }

    fn league_player_stats(&self, season: &str, measure: MeasureType) -> Result<ResultSet> {
        let mut params = blank_params(&[
            "College",
            "Conference",
            "Country",
            "DateFrom",
            "DateTo",
            "Division",
            "DraftPick",
            "DraftYear",
            "GameScope",
            "GameSegment",
            "Height",
            "Location",
            "Outcome",
            "PlayerExperience",
            "PlayerPosition",
            "SeasonSegment",
            "ShotClockRange",
            "StarterBench",
            "VsConference",
            "VsDivision",
            "Weight",
        ]);
        params.extend([
            ("LastNGames", "0".to_string()),
            ("LeagueID", LEAGUE_ID.to_string()),
            ("MeasureType", measure.as_param().to_string()),
            ("Month", "0".to_string()),
            ("OpponentTeamID", "0".to_string()),
            ("PORound", "0".to_string()),
            ("PaceAdjust", "N".to_string()),
            ("PerMode", "PerGame".to_string()),
            ("Period", "0".to_string()),
            ("PlusMinus", "N".to_string()),
            ("Rank", "N".to_string()),
            ("Season", season.to_string()),
            ("SeasonType", SEASON_TYPE.to_string()),
            ("TeamID", "0".to_string()),
            ("TwoWay", "0".to_string()),
        ]);
        let sets = self.get("leaguedashplayerstats", &params)?;
        Ok(pick_set(sets, "LeagueDashPlayerStats"))
    }

    fn shot_chart(&self, player_id: u32, season: &str, include_misses: bool) -> Result<ResultSet> {
        let mut params = blank_params(&[
            "AheadBehind",
            "ClutchTime",
            "ContextFilter",
            "DateFrom",
            "DateTo",
            "EndPeriod",
            "EndRange",
            "GameID",
            "GameSegment",
            "Location",
            "Outcome",
            "PlayerPosition",
            "PointDiff",
            "Position",
            "RangeType",
            "RookieYear",
            "SeasonSegment",
            "StartPeriod",
            "StartRange",
            "VsConference",
            "VsDivision",
        ]);
        // PTS only reports made field goals; FGA reports every attempt.
        let measure = if include_misses { "FGA" } else { "PTS" };
        params.extend([
            ("ContextMeasure", measure.to_string()),
            ("LastNGames", "0".to_string()),
            ("LeagueID", LEAGUE_ID.to_string()),
            ("Month", "0".to_string()),
            ("OpponentTeamID", "0".to_string()),
            ("Period", "0".to_string()),
            ("PlayerID", player_id.to_string()),
            ("Season", season.to_string()),
            ("SeasonType", SEASON_TYPE.to_string()),
            ("TeamID", "0".to_string()),
        ]);
        let sets = self.get("shotchartdetail", &params)?;
        Ok(pick_set(sets, "Shot_Chart_Detail"))
    }

    fn career_stats(&self, player_id: u32) -> Result<ResultSet> {
        let params = [
            ("LeagueID", LEAGUE_ID.to_string()),
            ("PerMode", "Totals".to_string()),
            ("PlayerID", player_id.to_string()),
        ];
        let sets = self.get("playercareerstats", &params)?;
        Ok(pick_set(sets, "SeasonTotalsRegularSeason"))
    }
}

fn blank_params(names: &[&'static str]) -> Vec<(&'static str, String)> {
    names.iter().map(|n| (*n, String::new())).collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ResultSet, parse_result_sets, pick_set};

    #[test]
    fn parses_plural_and_singular_result_sets() {
        let plural = r#"{"resultSets":[{"name":"A","headers":["X"],"rowSet":[[1],[2]]}]}"#;
        let sets = parse_result_sets(plural).unwrap();
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].len(), 2);

        let single = r#"{"resultSet":{"name":"B","headers":["Y"],"rowSet":[]}}"#;
        let sets = parse_result_sets(single).unwrap();
        assert_eq!(sets[0].name, "B");
        assert!(sets[0].is_empty());
    }

    #[test]
    fn null_body_is_no_sets_and_garbage_is_an_error() {
        assert!(parse_result_sets("null").unwrap().is_empty());
        assert!(parse_result_sets("  ").unwrap().is_empty());
        assert!(parse_result_sets("<html>").is_err());
        assert!(parse_result_sets(r#"{"message":"x"}"#).is_err());
    }

    #[test]
    fn pick_set_prefers_name_then_first() {
        let a = ResultSet {
            name: "First".to_string(),
            ..ResultSet::default()
        };
        let b = ResultSet {
            name: "Wanted".to_string(),
            ..ResultSet::default()
        };
        assert_eq!(pick_set(vec![a.clone(), b], "wanted").name, "Wanted");
        assert_eq!(pick_set(vec![a], "missing").name, "First");
        assert!(pick_set(Vec::new(), "missing").headers.is_empty());
    }

    #[test]
    fn cell_accessors_coerce_numbers_and_strings() {
        let row = vec![json!(12.5), json!("7"), json!(null), json!("0022300001")];
        assert_eq!(ResultSet::f64_at(&row, 0), Some(12.5));
        assert_eq!(ResultSet::i64_at(&row, 1), Some(7));
        assert_eq!(ResultSet::f64_at(&row, 2), None);
        assert_eq!(ResultSet::string_at(&row, 3).as_deref(), Some("0022300001"));
        assert_eq!(ResultSet::u32_at(&row, 9), None);
    }
}
