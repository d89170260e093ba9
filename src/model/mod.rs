pub mod encoding;
pub mod forest;

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::features::REQUIRED_COLUMNS;
use crate::table::{Column, Frame};
use encoding::ShotPreprocessor;
use forest::{ForestParams, RegressionForest};

pub const ARTIFACT_VERSION: u32 = 1;

/// Defensive rating treated as neutral by the defender adjustment.
pub const DEFENDER_BASELINE_RATING: f64 = 110.0;
const DEFENDER_RATING_SPAN: f64 = 100.0;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("no training rows")]
    EmptyTrainingSet,

    #[error("shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: usize, got: usize },

    #[error("missing column {0}")]
    MissingColumn(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("model artifact version {found} is not supported (expected {expected})")]
    VersionMismatch { found: u32, expected: u32 },

    #[error("failed to access {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid model artifact {path}: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
}

/// The inputs the model sees for one shot.
#[derive(Debug, Clone, PartialEq)]
pub struct ShotContext {
    pub player_name: String,
    pub zone_basic: String,
    pub zone_area: String,
    pub zone_range: String,
    pub shot_distance: f64,
}

impl ShotContext {
    pub fn new(
        player_name: &str,
        zone_basic: &str,
        zone_area: &str,
        zone_range: &str,
        shot_distance: f64,
    ) -> Self {
        Self {
            player_name: player_name.to_string(),
            zone_basic: zone_basic.to_string(),
            zone_area: zone_area.to_string(),
            zone_range: zone_range.to_string(),
            shot_distance,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingRow {
    pub context: ShotContext,
    pub made: f64,
}

const FEATURE_COLUMNS: [&str; 5] = [
    "PLAYER_NAME",
    "SHOT_ZONE_BASIC",
    "SHOT_ZONE_AREA",
    "SHOT_ZONE_RANGE",
    "SHOT_DISTANCE",
];
const TARGET_COLUMN: &str = "SHOT_MADE_FLAG";

/// Pulls model rows out of a raw merged table. Rows missing any of the
/// feature pipeline's required values (the defensive rating included) or any
/// model input are skipped; an absent column is an error.
pub fn training_rows(frame: &Frame) -> Result<Vec<TrainingRow>, ModelError> {
    let column = |name: &str| {
        frame
            .column(name)
            .map_err(|_| ModelError::MissingColumn(name.to_string()))
    };
    let required = REQUIRED_COLUMNS
        .iter()
        .map(|&name| column(name))
        .collect::<Result<Vec<_>, _>>()?;
    let player = column(FEATURE_COLUMNS[0])?;
    let basic = column(FEATURE_COLUMNS[1])?;
    let area = column(FEATURE_COLUMNS[2])?;
    let range = column(FEATURE_COLUMNS[3])?;
    let distance = column(FEATURE_COLUMNS[4])?;
    let target = column(TARGET_COLUMN)?;

    let mut rows = Vec::with_capacity(frame.len());
    let mut skipped = 0usize;
    for i in 0..frame.len() {
        if required.iter().any(|c| c.is_null(i)) {
            skipped += 1;
            continue;
        }
        let (
            Some(player_name),
            Some(zone_basic),
            Some(zone_area),
            Some(zone_range),
            Some(shot_distance),
            Some(made),
        ) = (
            text_cell(player, i),
            text_cell(basic, i),
            text_cell(area, i),
            text_cell(range, i),
            num_cell(distance, i),
            num_cell(target, i),
        )
        else {
            skipped += 1;
            continue;
        };
        rows.push(TrainingRow {
            context: ShotContext {
                player_name,
                zone_basic,
                zone_area,
                zone_range,
                shot_distance,
            },
            made,
        });
    }
    if skipped > 0 {
        debug!(skipped, "skipped rows with missing model inputs");
    }
    Ok(rows)
}

fn text_cell(column: &Column, row: usize) -> Option<String> {
    match column {
        Column::Text(v) => v.get(row).cloned().flatten(),
        Column::Num(v) => v.get(row).copied().flatten().map(|n| n.to_string()),
    }
}

fn num_cell(column: &Column, row: usize) -> Option<f64> {
    match column {
        Column::Num(v) => v.get(row).copied().flatten(),
        Column::Text(v) => v
            .get(row)
            .and_then(|c| c.as_deref())
            .and_then(|s| s.trim().parse().ok()),
    }
}

/// `1 + (rating - 110) / 100`, floored at 0. Higher ratings mean weaker
/// defense and raise the make probability.
pub fn defender_multiplier(rating: f64) -> f64 {
    (1.0 + (rating - DEFENDER_BASELINE_RATING) / DEFENDER_RATING_SPAN).max(0.0)
}

pub fn adjust_for_defender(raw: f64, rating: f64) -> f64 {
    (raw * defender_multiplier(rating)).clamp(0.0, 1.0)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FgPrediction {
    pub raw: f64,
    pub adjusted: f64,
    pub defender_rating: Option<f64>,
}

impl FgPrediction {
    /// Adjusted probability on a 0-100 scale, two decimals.
    pub fn percent(&self) -> f64 {
        to_percent(self.adjusted)
    }

    pub fn raw_percent(&self) -> f64 {
        to_percent(self.raw)
    }
}

fn to_percent(p: f64) -> f64 {
    (p.clamp(0.0, 1.0) * 10_000.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    pub samples: usize,
    pub mse: f64,
    pub r2: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShotModel {
    pub version: u32,
    pub trained_at: String,
    pub train_samples: usize,
    pub preprocessor: ShotPreprocessor,
    pub forest: RegressionForest,
}

impl ShotModel {
    pub fn train(rows: &[TrainingRow], params: ForestParams) -> Result<Self, ModelError> {
        if rows.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }
        let contexts = rows.iter().map(|r| &r.context).collect::<Vec<_>>();
        let preprocessor = ShotPreprocessor::fit(&contexts);
        let x = contexts
            .iter()
            .map(|c| preprocessor.transform(c))
            .collect::<Vec<_>>();
        let y = rows.iter().map(|r| r.made).collect::<Vec<_>>();

        let forest = RegressionForest::fit(&x, &y, params)?;
        info!(
            samples = rows.len(),
            features = preprocessor.width(),
            trees = forest.tree_count(),
            "trained field-goal model"
        );
        Ok(Self {
            version: ARTIFACT_VERSION,
            trained_at: chrono::Utc::now().to_rfc3339(),
            train_samples: rows.len(),
            preprocessor,
            forest,
        })
    }

    /// Unadjusted make probability in [0, 1].
    pub fn predict_raw(&self, ctx: &ShotContext) -> f64 {
        let x = self.preprocessor.transform(ctx);
        self.forest.predict(&x).clamp(0.0, 1.0)
    }

    pub fn predict(
        &self,
        ctx: &ShotContext,
        defender_rating: Option<f64>,
    ) -> Result<FgPrediction, ModelError> {
        if !ctx.shot_distance.is_finite() || ctx.shot_distance < 0.0 {
            return Err(ModelError::InvalidInput(format!(
                "shot distance must be a non-negative number, got {}",
                ctx.shot_distance
            )));
        }
        if let Some(rating) = defender_rating
            && !rating.is_finite()
        {
            return Err(ModelError::InvalidInput(format!(
                "defender rating must be finite, got {rating}"
            )));
        }
        let raw = self.predict_raw(ctx);
        let adjusted = match defender_rating {
            Some(rating) => adjust_for_defender(raw, rating),
            None => raw,
        };
        Ok(FgPrediction {
            raw,
            adjusted,
            defender_rating,
        })
    }

    pub fn evaluate(&self, rows: &[TrainingRow]) -> Result<Metrics, ModelError> {
        if rows.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }
        let n = rows.len() as f64;
        let mean = rows.iter().map(|r| r.made).sum::<f64>() / n;
        let mut sse = 0.0;
        let mut sst = 0.0;
        for row in rows {
            let pred = self.predict_raw(&row.context);
            sse += (row.made - pred).powi(2);
            sst += (row.made - mean).powi(2);
        }
        // A constant target has no variance to explain.
        let r2 = if sst > 0.0 {
            1.0 - sse / sst
        } else if sse == 0.0 {
            1.0
        } else {
            0.0
        };
        Ok(Metrics {
            samples: rows.len(),
            mse: sse / n,
            r2,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        let raw = serde_json::to_string_pretty(self).map_err(|source| ModelError::Json {
            path: path.display().to_string(),
            source,
        })?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, raw).map_err(io_error(&tmp))?;
        fs::rename(&tmp, path).map_err(io_error(path))
    }

    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let raw = fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let model: ShotModel = serde_json::from_str(&raw).map_err(|source| ModelError::Json {
            path: path.display().to_string(),
            source,
        })?;
        if model.version != ARTIFACT_VERSION {
            return Err(ModelError::VersionMismatch {
                found: model.version,
                expected: ARTIFACT_VERSION,
            });
        }
        Ok(model)
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ModelError {
    let path = path.display().to_string();
    move |source| ModelError::Io { path, source }
}
