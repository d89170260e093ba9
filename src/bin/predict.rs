use anyhow::{Context, Result, anyhow};

use nba_fg_model::config::{PipelineConfig, parse_f64_arg, parse_string_arg};
use nba_fg_model::logging;
use nba_fg_model::model::{ShotContext, ShotModel};

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    logging::init()?;

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let mut cfg = PipelineConfig::from_env();
    cfg.apply_args(&args);

    let required = |name: &str| {
        parse_string_arg(&args, name).ok_or_else(|| anyhow!("missing required argument {name}"))
    };
    let ctx = ShotContext {
        player_name: required("--player")?,
        zone_basic: required("--zone-basic")?,
        zone_area: required("--zone-area")?,
        zone_range: required("--zone-range")?,
        shot_distance: parse_f64_arg(&args, "--distance")
            .ok_or_else(|| anyhow!("missing or invalid --distance"))?,
    };
    let defender_rating = match parse_string_arg(&args, "--defender-rating") {
        Some(_) => Some(
            parse_f64_arg(&args, "--defender-rating")
                .ok_or_else(|| anyhow!("invalid --defender-rating"))?,
        ),
        None => None,
    };

    let model = ShotModel::load(&cfg.model_path)
        .with_context(|| format!("load {}", cfg.model_path.display()))?;
    let prediction = model.predict(&ctx, defender_rating)?;

    println!(
        "Predicted FG% for {} from {} ft: {:.2}%",
        ctx.player_name,
        ctx.shot_distance,
        prediction.raw_percent()
    );
    if let Some(rating) = prediction.defender_rating {
        println!(
            "Adjusted for defender rating {rating:.1}: {:.2}%",
            prediction.percent()
        );
    }

    Ok(())
}
