use std::cmp::Ordering;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::ModelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 12,
            min_samples_leaf: 5,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    fn fit(x: &[Vec<f64>], y: &[f64], sample: &mut [usize], params: &ForestParams) -> Self {
        let mut tree = RegressionTree { nodes: Vec::new() };
        tree.grow(x, y, sample, 0, params);
        tree
    }

    fn grow(
        &mut self,
        x: &[Vec<f64>],
        y: &[f64],
        idx: &mut [usize],
        depth: usize,
        params: &ForestParams,
    ) -> usize {
        let n = idx.len();
        let sum = idx.iter().map(|&i| y[i]).sum::<f64>();
        let mean = if n > 0 { sum / n as f64 } else { 0.0 };
        let node_id = self.nodes.len();
        self.nodes.push(Node::Leaf { value: mean });

        let min_leaf = params.min_samples_leaf.max(1);
        if depth >= params.max_depth || n < 2 * min_leaf {
            return node_id;
        }
        let Some(split) = best_split(x, y, idx, sum, min_leaf) else {
            return node_id;
        };

        sort_by_feature(x, idx, split.feature);
        let (left_idx, right_idx) = idx.split_at_mut(split.left_count);
        let left = self.grow(x, y, left_idx, depth + 1, params);
        let right = self.grow(x, y, right_idx, depth + 1, params);
        self.nodes[node_id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        node_id
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut at = 0usize;
        loop {
            match self.nodes.get(at) {
                Some(Node::Leaf { value }) => return *value,
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let v = row.get(*feature).copied().unwrap_or(0.0);
                    at = if v <= *threshold { *left } else { *right };
                }
                None => return 0.0,
            }
        }
    }
}

#[derive(Debug, PartialEq)]
struct SplitChoice {
    feature: usize,
    threshold: f64,
    left_count: usize,
}

// Maximizing sum_l^2/n_l + sum_r^2/n_r is the same as minimizing the summed
// squared error of the two children.
fn best_split(
    x: &[Vec<f64>],
    y: &[f64],
    idx: &mut [usize],
    total: f64,
    min_leaf: usize,
) -> Option<SplitChoice> {
    let n_features = x.first().map(Vec::len).unwrap_or(0);
    let parent_score = total * total / idx.len() as f64;
    let mut best: Option<(f64, SplitChoice)> = None;

    for feature in 0..n_features {
        let candidate = match indicator_split(x, y, idx, feature, total, min_leaf) {
            IndicatorScan::Binary(found) => found,
            IndicatorScan::NotBinary => sorted_split(x, y, idx, feature, total, min_leaf),
        };
        let Some((score, choice)) = candidate else {
            continue;
        };
        let better = best.as_ref().is_none_or(|(s, _)| score > *s);
        if better && score > parent_score + 1e-12 {
            best = Some((score, choice));
        }
    }
    best.map(|(_, choice)| choice)
}

enum IndicatorScan {
    Binary(Option<(f64, SplitChoice)>),
    NotBinary,
}

// One-hot columns only admit the 0 | 1 cut, so they are scored from counts
// without sorting.
fn indicator_split(
    x: &[Vec<f64>],
    y: &[f64],
    idx: &[usize],
    feature: usize,
    total: f64,
    min_leaf: usize,
) -> IndicatorScan {
    let mut ones_n = 0usize;
    let mut ones_sum = 0.0_f64;
    for &i in idx {
        let v = x[i][feature];
        if v == 1.0 {
            ones_n += 1;
            ones_sum += y[i];
        } else if v != 0.0 {
            return IndicatorScan::NotBinary;
        }
    }
    let left_n = idx.len() - ones_n;
    if left_n < min_leaf || ones_n < min_leaf {
        return IndicatorScan::Binary(None);
    }
    let left_sum = total - ones_sum;
    let score = left_sum * left_sum / left_n as f64 + ones_sum * ones_sum / ones_n as f64;
    IndicatorScan::Binary(Some((
        score,
        SplitChoice {
            feature,
            threshold: 0.5,
            left_count: left_n,
        },
    )))
}

fn sorted_split(
    x: &[Vec<f64>],
    y: &[f64],
    idx: &mut [usize],
    feature: usize,
    total: f64,
    min_leaf: usize,
) -> Option<(f64, SplitChoice)> {
    let n = idx.len();
    sort_by_feature(x, idx, feature);
    let mut best: Option<(f64, SplitChoice)> = None;
    let mut left_sum = 0.0_f64;
    for k in 0..n - 1 {
        left_sum += y[idx[k]];
        let left_n = k + 1;
        let right_n = n - left_n;
        if left_n < min_leaf {
            continue;
        }
        if right_n < min_leaf {
            break;
        }
        let here = x[idx[k]][feature];
        let next = x[idx[k + 1]][feature];
        if here >= next {
            continue;
        }
        let right_sum = total - left_sum;
        let score = left_sum * left_sum / left_n as f64 + right_sum * right_sum / right_n as f64;
        if best.as_ref().is_none_or(|(s, _)| score > *s) {
            best = Some((
                score,
                SplitChoice {
                    feature,
                    threshold: here + (next - here) / 2.0,
                    left_count: left_n,
                },
            ));
        }
    }
    best
}

fn sort_by_feature(x: &[Vec<f64>], idx: &mut [usize], feature: usize) {
    idx.sort_unstable_by(|&a, &b| {
        x[a][feature]
            .partial_cmp(&x[b][feature])
            .unwrap_or(Ordering::Equal)
            .then(a.cmp(&b))
    });
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionForest {
    pub params: ForestParams,
    pub n_features: usize,
    trees: Vec<RegressionTree>,
}

impl RegressionForest {
    pub fn fit(x: &[Vec<f64>], y: &[f64], params: ForestParams) -> Result<Self, ModelError> {
        if x.is_empty() || y.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }
        if x.len() != y.len() {
            return Err(ModelError::ShapeMismatch {
                expected: x.len(),
                got: y.len(),
            });
        }
        let n_features = x[0].len();
        if let Some(bad) = x.iter().find(|row| row.len() != n_features) {
            return Err(ModelError::ShapeMismatch {
                expected: n_features,
                got: bad.len(),
            });
        }

        let n = x.len();
        let n_trees = params.n_trees.max(1);
        let trees = (0..n_trees)
            .into_par_iter()
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(t as u64));
                let mut sample = (0..n).map(|_| rng.gen_range(0..n)).collect::<Vec<_>>();
                RegressionTree::fit(x, y, &mut sample, &params)
            })
            .collect::<Vec<_>>();

        Ok(Self {
            params,
            n_features,
            trees,
        })
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let sum = self.trees.iter().map(|t| t.predict(row)).sum::<f64>();
        sum / self.trees.len() as f64
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ForestParams, IndicatorScan, RegressionForest, indicator_split, sorted_split,
    };
    use crate::model::ModelError;

    fn params(n_trees: usize) -> ForestParams {
        ForestParams {
            n_trees,
            max_depth: 6,
            min_samples_leaf: 1,
            seed: 7,
        }
    }

    #[test]
    fn learns_a_step_function() {
        let x = (0..40).map(|i| vec![i as f64]).collect::<Vec<_>>();
        let y = (0..40)
            .map(|i| if i < 20 { 0.0 } else { 1.0 })
            .collect::<Vec<_>>();
        let forest = RegressionForest::fit(&x, &y, params(25)).unwrap();
        assert!(forest.predict(&[2.0]) < 0.2);
        assert!(forest.predict(&[37.0]) > 0.8);
    }

    #[test]
    fn predictions_stay_within_target_range() {
        let x = (0..30)
            .map(|i| vec![(i % 7) as f64, (i % 3) as f64])
            .collect::<Vec<_>>();
        let y = (0..30).map(|i| (i % 2) as f64).collect::<Vec<_>>();
        let forest = RegressionForest::fit(&x, &y, params(10)).unwrap();
        for row in [[-10.0, 0.0], [3.0, 1.0], [100.0, 5.0]] {
            let p = forest.predict(&row);
            assert!((0.0..=1.0).contains(&p));
        }
    }

    #[test]
    fn same_seed_gives_same_forest() {
        let x = (0..25).map(|i| vec![(i * 3 % 11) as f64]).collect::<Vec<_>>();
        let y = (0..25).map(|i| (i % 3 == 0) as u8 as f64).collect::<Vec<_>>();
        let a = RegressionForest::fit(&x, &y, params(8)).unwrap();
        let b = RegressionForest::fit(&x, &y, params(8)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_empty_and_ragged_input() {
        assert!(matches!(
            RegressionForest::fit(&[], &[], params(1)),
            Err(ModelError::EmptyTrainingSet)
        ));
        let ragged = vec![vec![1.0], vec![1.0, 2.0]];
        assert!(matches!(
            RegressionForest::fit(&ragged, &[0.0, 1.0], params(1)),
            Err(ModelError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn indicator_columns_split_like_a_full_scan() {
        let x = (0..60)
            .map(|i| vec![(i % 2) as f64, (i % 3 == 0) as u8 as f64, (i % 5) as f64])
            .collect::<Vec<_>>();
        let y = (0..60)
            .map(|i| (i % 2 == 1 || i % 7 == 0) as u8 as f64)
            .collect::<Vec<_>>();
        let total = y.iter().sum::<f64>();
        for feature in 0..2 {
            let mut idx = (0..60).rev().collect::<Vec<_>>();
            let IndicatorScan::Binary(Some((quick_score, quick))) =
                indicator_split(&x, &y, &idx, feature, total, 3)
            else {
                panic!("feature {feature} should split on counts");
            };
            let (full_score, full) = sorted_split(&x, &y, &mut idx, feature, total, 3).unwrap();
            assert!((quick_score - full_score).abs() < 1e-9);
            assert_eq!(quick, full);
        }
        let idx = (0..60).collect::<Vec<_>>();
        assert!(matches!(
            indicator_split(&x, &y, &idx, 2, total, 3),
            IndicatorScan::NotBinary
        ));
    }

    #[test]
    fn learns_from_wide_one_hot_rows() {
        let width = 200;
        let x = (0..400)
            .map(|i| {
                let mut row = vec![0.0; width];
                row[i % width] = 1.0;
                row
            })
            .collect::<Vec<_>>();
        let y = (0..400)
            .map(|i| if i % width < 10 { 1.0 } else { 0.0 })
            .collect::<Vec<_>>();
        let forest = RegressionForest::fit(&x, &y, params(15)).unwrap();
        let mut hot = vec![0.0; width];
        hot[3] = 1.0;
        let mut cold = vec![0.0; width];
        cold[150] = 1.0;
        assert!(forest.predict(&hot) > forest.predict(&cold));
        assert!(forest.predict(&cold) < 0.2);
    }
}
