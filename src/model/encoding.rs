use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::ShotContext;

/// One-hot encoder over a fixed, sorted category list. Categories never seen
/// during fitting encode as all zeros.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryEncoder {
    pub name: String,
    pub categories: Vec<String>,
}

impl CategoryEncoder {
    pub fn fit<'a>(name: &str, values: impl Iterator<Item = &'a str>) -> Self {
        let categories = values
            .map(str::trim)
            .map(|s| s.to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        Self {
            name: name.to_string(),
            categories,
        }
    }

    pub fn width(&self) -> usize {
        self.categories.len()
    }

    pub fn encode_into(&self, value: &str, out: &mut Vec<f64>) {
        let hit = self
            .categories
            .binary_search_by(|c| c.as_str().cmp(value.trim()))
            .ok();
        out.extend((0..self.width()).map(|i| if Some(i) == hit { 1.0 } else { 0.0 }));
    }

    fn feature_names(&self) -> impl Iterator<Item = String> + '_ {
        self.categories
            .iter()
            .map(move |c| format!("{}_{c}", self.name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: f64,
    pub std: f64,
}

impl StandardScaler {
    pub fn fit(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self { mean: 0.0, std: 1.0 };
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Self {
            mean,
            std: var.sqrt(),
        }
    }

    pub fn transform(&self, v: f64) -> f64 {
        if self.std > 0.0 {
            (v - self.mean) / self.std
        } else {
            v - self.mean
        }
    }
}

/// Encoding bound to a trained model, so prediction reuses the exact
/// categories and scaling learned at training time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShotPreprocessor {
    pub distance: StandardScaler,
    pub zone_basic: CategoryEncoder,
    pub zone_area: CategoryEncoder,
    pub zone_range: CategoryEncoder,
    pub player: CategoryEncoder,
}

impl ShotPreprocessor {
    pub fn fit(contexts: &[&ShotContext]) -> Self {
        let distances = contexts.iter().map(|c| c.shot_distance).collect::<Vec<_>>();
        Self {
            distance: StandardScaler::fit(&distances),
            zone_basic: CategoryEncoder::fit(
                "SHOT_ZONE_BASIC",
                contexts.iter().map(|c| c.zone_basic.as_str()),
            ),
            zone_area: CategoryEncoder::fit(
                "SHOT_ZONE_AREA",
                contexts.iter().map(|c| c.zone_area.as_str()),
            ),
            zone_range: CategoryEncoder::fit(
                "SHOT_ZONE_RANGE",
                contexts.iter().map(|c| c.zone_range.as_str()),
            ),
            player: CategoryEncoder::fit(
                "PLAYER_NAME",
                contexts.iter().map(|c| c.player_name.as_str()),
            ),
        }
    }

    pub fn width(&self) -> usize {
        1 + self.zone_basic.width()
            + self.zone_area.width()
            + self.zone_range.width()
            + self.player.width()
    }

    pub fn transform(&self, ctx: &ShotContext) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.width());
        out.push(self.distance.transform(ctx.shot_distance));
        self.zone_basic.encode_into(&ctx.zone_basic, &mut out);
        self.zone_area.encode_into(&ctx.zone_area, &mut out);
        self.zone_range.encode_into(&ctx.zone_range, &mut out);
        self.player.encode_into(&ctx.player_name, &mut out);
        out
    }

    pub fn feature_names(&self) -> Vec<String> {
        std::iter::once("SHOT_DISTANCE".to_string())
            .chain(self.zone_basic.feature_names())
            .chain(self.zone_area.feature_names())
            .chain(self.zone_range.feature_names())
            .chain(self.player.feature_names())
            .collect()
    }
}
