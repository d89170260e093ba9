use anyhow::{Context, Result};
use tracing::info;

use nba_fg_model::collect::{CollectOptions, CollectStage, collect_all};
use nba_fg_model::config::PipelineConfig;
use nba_fg_model::logging;
use nba_fg_model::merge::merge;
use nba_fg_model::roster::{self, Player};
use nba_fg_model::season::resolve_season;
use nba_fg_model::stats_api::{NbaStatsClient, StatsSource};

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    logging::init()?;

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let mut cfg = PipelineConfig::from_env();
    cfg.apply_args(&args);

    let season = resolve_season(cfg.season.as_deref());
    let client = NbaStatsClient::new(&cfg)?;
    let players = load_roster(&client, cfg.team.as_deref(), &season)?;
    info!(season = %season, players = players.len(), "roster loaded");

    let opts = CollectOptions {
        season: season.clone(),
        include_misses: cfg.include_misses,
        defense_source: cfg.defense_source,
    };
    let collected = collect_all(&client, &players, &opts, |p| {
        if p.stage == CollectStage::Defense && p.processed == p.total {
            info!("collection finished");
        }
    });

    let merged = merge(&collected.shots, &collected.defense, cfg.join_key);
    let frame = merged.to_frame().context("build merged table")?;
    frame
        .write_csv(&cfg.raw_out)
        .with_context(|| format!("write {}", cfg.raw_out.display()))?;

    let summary = &collected.summary;
    println!("Shot collection complete");
    println!("Season: {season}");
    println!("Scope: {}", cfg.team.as_deref().unwrap_or("all players"));
    println!(
        "Players: shots {}/{} defense {}/{}",
        summary.shot_players, summary.players_total, summary.defense_players, summary.players_total
    );
    println!("Shot rows: {}", summary.shot_rows);
    println!(
        "Merged rows: {} (defense columns: {})",
        merged.len(),
        if merged.has_defense { "yes" } else { "no" }
    );
    println!("Output: {}", cfg.raw_out.display());
    if !summary.errors.is_empty() {
        println!("  errors: {}", summary.errors.len());
        for err in summary.errors.iter().take(6) {
            println!("   - {err}");
        }
    }

    Ok(())
}

fn load_roster(source: &dyn StatsSource, team: Option<&str>, season: &str) -> Result<Vec<Player>> {
    match team {
        Some(query) => {
            let team = roster::resolve_team(query)?;
            info!(team = team.full_name, team_id = team.id, "fetching team roster");
            roster::fetch_team_roster(source, team.id, season)
                .with_context(|| format!("fetch roster for {}", team.full_name))
        }
        None => roster::fetch_all_players(source, season).context("fetch all players"),
    }
}
