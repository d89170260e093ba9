use anyhow::{Context, Result};
use tracing::info;

use nba_fg_model::config::PipelineConfig;
use nba_fg_model::features::split_indices;
use nba_fg_model::logging;
use nba_fg_model::model::{ShotContext, ShotModel, TrainingRow, training_rows};
use nba_fg_model::table::Frame;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    logging::init()?;

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let mut cfg = PipelineConfig::from_env();
    cfg.apply_args(&args);

    let input = &cfg.raw_out;
    let frame = Frame::read_csv(input).with_context(|| format!("read {}", input.display()))?;
    let rows = training_rows(&frame).context("extract training rows")?;
    info!(rows = rows.len(), path = %input.display(), "loaded training data");

    let (train_idx, test_idx) = split_indices(rows.len(), cfg.test_fraction, cfg.seed);
    let pick = |idx: &[usize]| idx.iter().map(|&i| rows[i].clone()).collect::<Vec<TrainingRow>>();
    let train_rows = pick(&train_idx);
    let test_rows = pick(&test_idx);

    let model = ShotModel::train(&train_rows, cfg.forest).context("train model")?;
    model
        .save(&cfg.model_path)
        .with_context(|| format!("save {}", cfg.model_path.display()))?;

    println!("Training complete");
    println!("Rows: train {} test {}", train_rows.len(), test_rows.len());
    println!("Features: {}", model.preprocessor.feature_names().len());
    println!(
        "Forest: {} trees, max depth {}, min leaf {}",
        model.forest.tree_count(),
        cfg.forest.max_depth,
        cfg.forest.min_samples_leaf
    );
    if test_rows.is_empty() {
        println!("Evaluation skipped: no held-out rows");
    } else {
        let metrics = model.evaluate(&test_rows).context("evaluate model")?;
        println!("Mean Squared Error: {:.4}", metrics.mse);
        println!("R^2 Score: {:.4}", metrics.r2);
    }
    println!("Model: {}", cfg.model_path.display());

    if let Some(sample) = train_rows.first() {
        let ctx = ShotContext {
            shot_distance: 15.0,
            ..sample.context.clone()
        };
        let prediction = model.predict(&ctx, None)?;
        println!(
            "Example: {} from {} ft ({}, {}, {}): {:.2}%",
            ctx.player_name,
            ctx.shot_distance,
            ctx.zone_basic,
            ctx.zone_area,
            ctx.zone_range,
            prediction.percent()
        );
    }

    Ok(())
}
