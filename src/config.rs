use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::features::ScaleMethod;
use crate::model::forest::ForestParams;

const DEFAULT_BASE_URL: &str = "https://stats.nba.com/stats";
const DEFAULT_TEAM: &str = "Golden State Warriors";
const DEFAULT_API_DELAY_MS: u64 = 1000;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_TEST_FRACTION: f64 = 0.2;
const DEFAULT_SEED: u64 = 42;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefenseSource {
    /// One league-wide Advanced table per season, filtered per player.
    League,
    /// Per-player career rows averaged down to one record.
    Career,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKey {
    PlayerId,
    PlayerName,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub base_url: String,
    pub api_delay: Duration,
    pub timeout: Duration,
    pub season: Option<String>,
    /// `None` means every league player.
    pub team: Option<String>,
    pub include_misses: bool,
    pub defense_source: DefenseSource,
    pub join_key: JoinKey,
    pub scale: ScaleMethod,
    pub raw_out: PathBuf,
    pub processed_out: PathBuf,
    pub split_dir: PathBuf,
    pub model_path: PathBuf,
    pub test_fraction: f64,
    pub seed: u64,
    pub forest: ForestParams,
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        let base_url = env::var("NBA_STATS_BASE_URL")
            .ok()
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let api_delay_ms = env_parse::<u64>("NBA_API_DELAY_MS")
            .unwrap_or(DEFAULT_API_DELAY_MS)
            .min(60_000);
        let timeout_secs = env_parse::<u64>("NBA_TIMEOUT_SECS")
            .unwrap_or(DEFAULT_TIMEOUT_SECS)
            .clamp(1, 300);
        let season = env_string("NBA_SEASON");
        let team = match env::var("NBA_TEAM") {
            Ok(raw) => parse_team(&raw),
            Err(_) => Some(DEFAULT_TEAM.to_string()),
        };
        let defense_source = match env_string("NBA_DEFENSE_SOURCE")
            .map(|s| s.to_ascii_lowercase())
            .as_deref()
        {
            Some("career") => DefenseSource::Career,
            _ => DefenseSource::League,
        };
        let join_key = match env_string("NBA_JOIN_KEY")
            .map(|s| s.to_ascii_lowercase())
            .as_deref()
        {
            Some("name") | Some("player_name") => JoinKey::PlayerName,
            _ => JoinKey::PlayerId,
        };
        let scale = match env_string("NBA_SCALE")
            .map(|s| s.to_ascii_lowercase())
            .as_deref()
        {
            Some("standard") | Some("zscore") => ScaleMethod::Standard,
            _ => ScaleMethod::MinMax,
        };
        let test_fraction = env_parse::<f64>("NBA_TEST_FRACTION")
            .filter(|v| v.is_finite())
            .unwrap_or(DEFAULT_TEST_FRACTION)
            .clamp(0.05, 0.5);
        let seed = env_parse::<u64>("NBA_SEED").unwrap_or(DEFAULT_SEED);

        let defaults = ForestParams::default();
        let forest = ForestParams {
            n_trees: env_parse::<usize>("NBA_TREES")
                .unwrap_or(defaults.n_trees)
                .clamp(1, 2000),
            max_depth: env_parse::<usize>("NBA_MAX_DEPTH")
                .unwrap_or(defaults.max_depth)
                .clamp(1, 64),
            min_samples_leaf: env_parse::<usize>("NBA_MIN_LEAF")
                .unwrap_or(defaults.min_samples_leaf)
                .max(1),
            seed,
        };

        Self {
            base_url,
            api_delay: Duration::from_millis(api_delay_ms),
            timeout: Duration::from_secs(timeout_secs),
            season,
            team,
            include_misses: env_bool("NBA_INCLUDE_MISSES", true),
            defense_source,
            join_key,
            scale,
            raw_out: env_path("NBA_RAW_OUT", "nba_player_shots_with_defense.csv"),
            processed_out: env_path("NBA_PROCESSED_OUT", "processed_data.csv"),
            split_dir: env_path("NBA_SPLIT_DIR", "."),
            model_path: env_path("NBA_MODEL_PATH", "fg_model.json"),
            test_fraction,
            seed,
            forest,
        }
    }

    /// Applies command-line overrides on top of the environment.
    pub fn apply_args(&mut self, args: &[String]) {
        if let Some(team) = parse_string_arg(args, "--team") {
            self.team = parse_team(&team);
        }
        if has_flag(args, "--all-players") {
            self.team = None;
        }
        if let Some(season) = parse_string_arg(args, "--season") {
            self.season = Some(season);
        }
        if has_flag(args, "--include-misses") {
            self.include_misses = true;
        }
        if has_flag(args, "--made-only") {
            self.include_misses = false;
        }
        if let Some(out) = parse_string_arg(args, "--out") {
            self.raw_out = PathBuf::from(out);
        }
        if let Some(path) = parse_string_arg(args, "--model") {
            self.model_path = PathBuf::from(path);
        }
    }
}

fn parse_team(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Reads `--name=value` or `--name value` from the argument list.
pub fn parse_string_arg(args: &[String], name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefix) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
            && !next.starts_with("--")
        {
            return Some(next.trim().to_string());
        }
    }
    None
}

pub fn parse_f64_arg(args: &[String], name: &str) -> Option<f64> {
    parse_string_arg(args, name)
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

pub fn has_flag(args: &[String], name: &str) -> bool {
    args.iter().any(|a| a == name)
}

fn env_string(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

fn env_path(key: &str, default: &str) -> PathBuf {
    env_string(key)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .map(|v| {
            let t = v.trim().to_ascii_lowercase();
            !(t.is_empty() || t == "0" || t == "false" || t == "off" || t == "no")
        })
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::{has_flag, parse_f64_arg, parse_string_arg, parse_team};

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn string_arg_accepts_both_forms() {
        let a = args(&["--team=Boston Celtics", "--season", "2022-23"]);
        assert_eq!(parse_string_arg(&a, "--team").as_deref(), Some("Boston Celtics"));
        assert_eq!(parse_string_arg(&a, "--season").as_deref(), Some("2022-23"));
        assert_eq!(parse_string_arg(&a, "--out"), None);
    }

    #[test]
    fn value_form_does_not_swallow_next_flag() {
        let a = args(&["--season", "--made-only"]);
        assert_eq!(parse_string_arg(&a, "--season"), None);
        assert!(has_flag(&a, "--made-only"));
    }

    #[test]
    fn numeric_args_reject_non_finite() {
        let a = args(&["--distance=NaN", "--rating=104.5"]);
        assert_eq!(parse_f64_arg(&a, "--distance"), None);
        assert_eq!(parse_f64_arg(&a, "--rating"), Some(104.5));
    }

    #[test]
    fn blank_or_all_team_means_every_player() {
        assert_eq!(parse_team("  "), None);
        assert_eq!(parse_team("ALL"), None);
        assert_eq!(parse_team(" GSW ").as_deref(), Some("GSW"));
    }
}
