use tracing::{info, warn};

use crate::config::DefenseSource;
use crate::defense::{DefenseFetcher, DefenseRecord};
use crate::roster::Player;
use crate::shots::{ShotRecord, fetch_player_shots};
use crate::stats_api::StatsSource;

const PROGRESS_LOG_EVERY: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectStage {
    Shots,
    Defense,
}

impl CollectStage {
    pub fn label(self) -> &'static str {
        match self {
            CollectStage::Shots => "Shots Processed",
            CollectStage::Defense => "Defense Processed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectProgress {
    pub stage: CollectStage,
    pub processed: usize,
    pub total: usize,
}

#[derive(Debug, Clone)]
pub struct CollectOptions {
    pub season: String,
    pub include_misses: bool,
    pub defense_source: DefenseSource,
}

#[derive(Debug, Clone, Default)]
pub struct CollectionSummary {
    pub players_total: usize,
    pub shot_players: usize,
    pub defense_players: usize,
    pub shot_rows: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Collected {
    pub shots: Vec<ShotRecord>,
    pub defense: Vec<DefenseRecord>,
    pub summary: CollectionSummary,
}

/// Walks the roster twice, shots first and defense second, one player at a
/// time. A failed or empty player contributes nothing and never stops the run.
pub fn collect_all(
    source: &dyn StatsSource,
    roster: &[Player],
    opts: &CollectOptions,
    mut on_progress: impl FnMut(CollectProgress),
) -> Collected {
    let total = roster.len();
    let mut summary = CollectionSummary {
        players_total: total,
        ..CollectionSummary::default()
    };

    info!(players = total, season = %opts.season, "fetching shot data");
    let mut shot_batches: Vec<Vec<ShotRecord>> = Vec::new();
    for (idx, player) in roster.iter().enumerate() {
        match fetch_player_shots(source, player, &opts.season, opts.include_misses) {
            Ok(shots) if !shots.is_empty() => shot_batches.push(shots),
            Ok(_) => {}
            Err(err) => {
                warn!(player_id = player.id, player = %player.name, "error fetching shot data: {err:#}");
                summary.errors.push(format!(
                    "shots {} (ID: {}): {err:#}",
                    player.name, player.id
                ));
            }
        }
        report(&mut on_progress, CollectStage::Shots, idx + 1, total);
    }

    let mut fetcher = DefenseFetcher::new(opts.defense_source);
    info!(players = total, strategy = ?fetcher.strategy(), "fetching defensive data");
    let mut defense: Vec<DefenseRecord> = Vec::new();
    for (idx, player) in roster.iter().enumerate() {
        match fetcher.fetch(source, player, &opts.season) {
            Ok(Some(record)) => defense.push(record),
            Ok(None) => {}
            Err(err) => {
                warn!(player_id = player.id, player = %player.name, "error fetching defensive data: {err:#}");
                summary.errors.push(format!(
                    "defense {} (ID: {}): {err:#}",
                    player.name, player.id
                ));
            }
        }
        report(&mut on_progress, CollectStage::Defense, idx + 1, total);
    }

    summary.shot_players = shot_batches.len();
    summary.defense_players = defense.len();
    let shots = shot_batches.into_iter().flatten().collect::<Vec<_>>();
    summary.shot_rows = shots.len();

    Collected {
        shots,
        defense,
        summary,
    }
}

fn report(
    on_progress: &mut impl FnMut(CollectProgress),
    stage: CollectStage,
    processed: usize,
    total: usize,
) {
    if processed % PROGRESS_LOG_EVERY == 0 || processed == total {
        info!("{}: {processed}/{total}", stage.label());
    }
    on_progress(CollectProgress {
        stage,
        processed,
        total,
    });
}
