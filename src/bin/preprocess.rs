use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use tracing::info;

use nba_fg_model::config::{PipelineConfig, parse_string_arg};
use nba_fg_model::features::{FeaturePipeline, ScaleMethod, TARGET_COLUMN, train_test_split};
use nba_fg_model::logging;
use nba_fg_model::table::Frame;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    logging::init()?;

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let cfg = PipelineConfig::from_env();
    let input = parse_string_arg(&args, "--in")
        .map(PathBuf::from)
        .unwrap_or_else(|| cfg.raw_out.clone());
    let output = parse_string_arg(&args, "--out")
        .map(PathBuf::from)
        .unwrap_or_else(|| cfg.processed_out.clone());
    let split_dir = parse_string_arg(&args, "--split-dir")
        .map(PathBuf::from)
        .unwrap_or_else(|| cfg.split_dir.clone());
    let scale = match parse_string_arg(&args, "--scale").as_deref() {
        Some("minmax") => ScaleMethod::MinMax,
        Some("standard") => ScaleMethod::Standard,
        Some(other) => return Err(anyhow!("unknown scale method '{other}'")),
        None => cfg.scale,
    };

    let raw = Frame::read_csv(&input).with_context(|| format!("read {}", input.display()))?;
    info!(rows = raw.len(), path = %input.display(), "loaded raw table");

    let processed = FeaturePipeline::new(scale)
        .run(raw)
        .context("feature engineering failed")?;
    processed
        .write_csv(&output)
        .with_context(|| format!("write {}", output.display()))?;

    let split = train_test_split(&processed, TARGET_COLUMN, cfg.test_fraction, cfg.seed)
        .context("train/test split failed")?;
    for (name, frame) in [
        ("X_train.csv", &split.x_train),
        ("X_test.csv", &split.x_test),
        ("y_train.csv", &split.y_train),
        ("y_test.csv", &split.y_test),
    ] {
        let path = split_dir.join(name);
        frame
            .write_csv(&path)
            .with_context(|| format!("write {}", path.display()))?;
    }

    println!("Preprocessing complete");
    println!("Input: {}", input.display());
    println!("Processed rows: {} columns: {}", processed.len(), processed.names().len());
    println!("Output: {}", output.display());
    println!(
        "Split: train {} test {} (seed {}) in {}",
        split.x_train.len(),
        split.x_test.len(),
        cfg.seed,
        split_dir.display()
    );

    Ok(())
}
