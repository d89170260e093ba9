use std::collections::{BTreeSet, HashMap};

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::info;

use crate::table::{Column, Frame, TableError};

pub const TARGET_COLUMN: &str = "SHOT_MADE_FLAG";
pub const REQUIRED_COLUMNS: [&str; 3] = [TARGET_COLUMN, "SHOT_ZONE_AREA", "DEF_RATING"];
pub const ENCODED_COLUMN: &str = "SHOT_ZONE_AREA";
pub const DEFAULT_SCALED_COLUMNS: [&str; 4] = ["SHOT_DISTANCE", "DEF_RATING", "LOC_X", "LOC_Y"];
// Always 1 because the shot fetch only returns attempts.
pub const REDUNDANT_COLUMNS: [&str; 1] = ["SHOT_ATTEMPTED_FLAG"];

#[derive(Debug, thiserror::Error)]
pub enum FeatureError {
    #[error("required column {0} is missing")]
    MissingColumn(String),

    #[error("cannot split {rows} rows into train and test partitions")]
    TooFewRows { rows: usize },

    #[error(transparent)]
    Table(#[from] TableError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleMethod {
    /// Maps each column onto [0, 1].
    MinMax,
    /// Zero mean, unit (population) variance.
    Standard,
}

#[derive(Debug, Clone)]
pub struct FeaturePipeline {
    pub scale: ScaleMethod,
    pub scaled_columns: Vec<String>,
}

impl FeaturePipeline {
    pub fn new(scale: ScaleMethod) -> Self {
        Self {
            scale,
            scaled_columns: DEFAULT_SCALED_COLUMNS.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Runs every transform in order: drop incomplete rows, one-hot the zone
    /// area, rescale, derive difficulty/impact, then the per-zone FG%.
    pub fn run(&self, mut frame: Frame) -> Result<Frame, FeatureError> {
        let before = frame.len();
        let dropped = drop_missing(&mut frame, &REQUIRED_COLUMNS)?;
        info!(rows = before, dropped, "dropped rows missing required values");

        for col in REDUNDANT_COLUMNS {
            frame.remove_column(col);
        }
        let encoded = one_hot_encode(&mut frame, ENCODED_COLUMN)?;
        info!(columns = encoded.len(), "encoded {ENCODED_COLUMN}");

        let scaled = self
            .scaled_columns
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>();
        rescale(&mut frame, &scaled, self.scale)?;
        derive_features(&mut frame)?;
        add_zone_fg(&mut frame)?;
        Ok(frame)
    }
}

/// Drops every row with a null in any of `required`. Returns how many went.
pub fn drop_missing(frame: &mut Frame, required: &[&str]) -> Result<usize, FeatureError> {
    let mut keep = vec![true; frame.len()];
    for name in required {
        let column = frame
            .column(name)
            .map_err(|_| FeatureError::MissingColumn(name.to_string()))?;
        for (row, k) in keep.iter_mut().enumerate() {
            if column.is_null(row) {
                *k = false;
            }
        }
    }
    let dropped = keep.iter().filter(|k| !**k).count();
    if dropped > 0 {
        frame.retain_rows(&keep);
    }
    Ok(dropped)
}

/// Replaces `column` with 0/1 indicator columns, one per sorted category minus
/// the first. Does nothing when the column is already gone.
pub fn one_hot_encode(frame: &mut Frame, column: &str) -> Result<Vec<String>, FeatureError> {
    let Some(source) = frame.remove_column(column) else {
        return Ok(Vec::new());
    };
    let values: Vec<Option<String>> = match source {
        Column::Text(v) => v,
        Column::Num(v) => v.into_iter().map(|x| x.map(|f| f.to_string())).collect(),
    };
    let categories = values
        .iter()
        .flatten()
        .cloned()
        .collect::<BTreeSet<_>>();

    let mut added = Vec::new();
    for category in categories.iter().skip(1) {
        let name = format!("{column}_{category}");
        let indicator = values
            .iter()
            .map(|v| Some(if v.as_deref() == Some(category.as_str()) { 1.0 } else { 0.0 }))
            .collect();
        frame.set_column(&name, Column::Num(indicator))?;
        added.push(name);
    }
    Ok(added)
}

/// Rescales columns using statistics from the same frame. A constant column
/// maps to 0.
pub fn rescale(frame: &mut Frame, columns: &[&str], method: ScaleMethod) -> Result<(), FeatureError> {
    for name in columns {
        let values = frame
            .num(name)
            .map_err(|err| match err {
                TableError::MissingColumn(c) => FeatureError::MissingColumn(c),
                other => FeatureError::Table(other),
            })?
            .to_vec();
        let present = values.iter().flatten().copied().collect::<Vec<_>>();
        if present.is_empty() {
            continue;
        }
        let (offset, scale) = match method {
            ScaleMethod::MinMax => {
                let min = present.iter().copied().fold(f64::INFINITY, f64::min);
                let max = present.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                (min, max - min)
            }
            ScaleMethod::Standard => {
                let n = present.len() as f64;
                let mean = present.iter().sum::<f64>() / n;
                let var = present.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                (mean, var.sqrt())
            }
        };
        let scaled = values
            .into_iter()
            .map(|v| v.map(|x| if scale > 0.0 { (x - offset) / scale } else { 0.0 }))
            .collect();
        frame.set_column(name, Column::Num(scaled))?;
    }
    Ok(())
}

/// Reciprocal of distance + 1: 1 at the rim and shrinking with range.
pub fn shot_difficulty(distance: f64) -> f64 {
    1.0 / (distance + 1.0)
}

pub fn defender_impact(def_rating: f64, distance: f64) -> f64 {
    def_rating * distance
}

/// Adds `SHOT_DIFFICULTY` and `DEFENDER_IMPACT`.
pub fn derive_features(frame: &mut Frame) -> Result<(), FeatureError> {
    let distance = required_num(frame, "SHOT_DISTANCE")?.to_vec();
    let rating = required_num(frame, "DEF_RATING")?.to_vec();

    let difficulty = distance.iter().map(|d| d.map(shot_difficulty)).collect();
    let impact = distance
        .iter()
        .zip(&rating)
        .map(|(d, r)| match (d, r) {
            (Some(d), Some(r)) => Some(defender_impact(*r, *d)),
            _ => None,
        })
        .collect();
    frame.set_column("SHOT_DIFFICULTY", Column::Num(difficulty))?;
    frame.set_column("DEFENDER_IMPACT", Column::Num(impact))?;
    Ok(())
}

/// Adds `SHOT_ZONE_FG`: the make rate of each row's basic zone.
pub fn add_zone_fg(frame: &mut Frame) -> Result<(), FeatureError> {
    let zones = zone_labels(frame, "SHOT_ZONE_BASIC")?;
    let made = required_num(frame, TARGET_COLUMN)?;

    let mut totals: HashMap<&str, (f64, usize)> = HashMap::new();
    for (zone, flag) in zones.iter().zip(made) {
        if let (Some(zone), Some(flag)) = (zone, flag) {
            let entry = totals.entry(zone.as_str()).or_insert((0.0, 0));
            entry.0 += flag;
            entry.1 += 1;
        }
    }
    let zone_fg = zones
        .iter()
        .map(|z| {
            z.as_deref()
                .and_then(|z| totals.get(z))
                .map(|(sum, n)| sum / *n as f64)
        })
        .collect();
    frame.set_column("SHOT_ZONE_FG", Column::Num(zone_fg))?;
    Ok(())
}

// A table with no rows reads back with every column numeric; treat an
// all-null numeric column as a zone column with no labels.
fn zone_labels(frame: &Frame, name: &str) -> Result<Vec<Option<String>>, FeatureError> {
    match frame.column(name) {
        Ok(Column::Text(v)) => Ok(v.clone()),
        Ok(Column::Num(v)) if v.iter().all(Option::is_none) => Ok(vec![None; v.len()]),
        Ok(Column::Num(_)) => Err(FeatureError::Table(TableError::WrongType {
            column: name.to_string(),
            expected: "text",
        })),
        Err(TableError::MissingColumn(c)) => Err(FeatureError::MissingColumn(c)),
        Err(other) => Err(FeatureError::Table(other)),
    }
}

fn required_num<'a>(frame: &'a Frame, name: &str) -> Result<&'a [Option<f64>], FeatureError> {
    frame.num(name).map_err(|err| match err {
        TableError::MissingColumn(c) => FeatureError::MissingColumn(c),
        other => FeatureError::Table(other),
    })
}

#[derive(Debug, Clone)]
pub struct Split {
    pub x_train: Frame,
    pub x_test: Frame,
    pub y_train: Frame,
    pub y_test: Frame,
}

/// Seeded shuffle split. The test share is rounded up and both sides always
/// keep at least one row.
pub fn train_test_split(
    frame: &Frame,
    target: &str,
    test_fraction: f64,
    seed: u64,
) -> Result<Split, FeatureError> {
    let n = frame.len();
    if n < 2 {
        return Err(FeatureError::TooFewRows { rows: n });
    }
    let target_col = frame
        .column(target)
        .map_err(|_| FeatureError::MissingColumn(target.to_string()))?
        .clone();

    let (train_idx, test_idx) = split_indices(n, test_fraction, seed);

    let mut x = frame.clone();
    x.remove_column(target);
    let mut y = Frame::new();
    y.set_column(target, target_col)?;

    Ok(Split {
        x_train: x.take_rows(&train_idx),
        x_test: x.take_rows(&test_idx),
        y_train: y.take_rows(&train_idx),
        y_test: y.take_rows(&test_idx),
    })
}

/// Row indices of a seeded shuffle split, for callers that keep typed rows.
pub fn split_indices(n: usize, test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut order = (0..n).collect::<Vec<_>>();
    let mut rng = StdRng::seed_from_u64(seed);
    order.shuffle(&mut rng);
    if n < 2 {
        return (order, Vec::new());
    }
    let n_test = ((n as f64 * test_fraction).ceil() as usize).clamp(1, n - 1);
    let test = order[..n_test].to_vec();
    let train = order[n_test..].to_vec();
    (train, test)
}

#[cfg(test)]
mod tests {
    use super::{
        FeatureError, ScaleMethod, add_zone_fg, drop_missing, one_hot_encode, rescale,
        shot_difficulty, split_indices,
    };
    use crate::table::{Column, Frame, TableError};

    fn zone_frame() -> Frame {
        let mut f = Frame::new();
        f.set_column(
            "SHOT_ZONE_AREA",
            Column::Text(
                ["Left Side(L)", "Center(C)", "Right Side(R)", "Center(C)"]
                    .iter()
                    .map(|s| Some(s.to_string()))
                    .collect(),
            ),
        )
        .unwrap();
        f.set_column(
            "SHOT_DISTANCE",
            Column::Num(vec![Some(0.0), Some(10.0), Some(20.0), None]),
        )
        .unwrap();
        f
    }

    #[test]
    fn one_hot_drops_first_sorted_category() {
        let mut f = zone_frame();
        let added = one_hot_encode(&mut f, "SHOT_ZONE_AREA").unwrap();
        assert_eq!(
            added,
            vec!["SHOT_ZONE_AREA_Left Side(L)", "SHOT_ZONE_AREA_Right Side(R)"]
        );
        assert!(!f.has_column("SHOT_ZONE_AREA"));
        assert_eq!(
            f.num("SHOT_ZONE_AREA_Left Side(L)").unwrap(),
            &[Some(1.0), Some(0.0), Some(0.0), Some(0.0)]
        );
    }

    #[test]
    fn one_hot_is_a_no_op_once_encoded() {
        let mut f = zone_frame();
        one_hot_encode(&mut f, "SHOT_ZONE_AREA").unwrap();
        let once = f.clone();
        let added = one_hot_encode(&mut f, "SHOT_ZONE_AREA").unwrap();
        assert!(added.is_empty());
        assert_eq!(f, once);
    }

    #[test]
    fn drop_missing_requires_the_column() {
        let mut f = zone_frame();
        assert_eq!(drop_missing(&mut f, &["SHOT_DISTANCE"]).unwrap(), 1);
        assert_eq!(f.len(), 3);
        assert!(matches!(
            drop_missing(&mut f, &["DEF_RATING"]),
            Err(FeatureError::MissingColumn(_))
        ));
    }

    #[test]
    fn minmax_and_standard_scaling() {
        let mut f = zone_frame();
        rescale(&mut f, &["SHOT_DISTANCE"], ScaleMethod::MinMax).unwrap();
        assert_eq!(
            f.num("SHOT_DISTANCE").unwrap(),
            &[Some(0.0), Some(0.5), Some(1.0), None]
        );

        let mut g = zone_frame();
        rescale(&mut g, &["SHOT_DISTANCE"], ScaleMethod::Standard).unwrap();
        let v = g.num("SHOT_DISTANCE").unwrap();
        assert!((v[1].unwrap()).abs() < 1e-12);
        assert!((v[0].unwrap() + v[2].unwrap()).abs() < 1e-12);
    }

    #[test]
    fn constant_column_scales_to_zero() {
        let mut f = Frame::new();
        f.set_column("X", Column::Num(vec![Some(5.0), Some(5.0)]))
            .unwrap();
        rescale(&mut f, &["X"], ScaleMethod::MinMax).unwrap();
        assert_eq!(f.num("X").unwrap(), &[Some(0.0), Some(0.0)]);
    }

    #[test]
    fn shot_difficulty_is_one_at_rim_and_strictly_decreasing() {
        assert_eq!(shot_difficulty(0.0), 1.0);
        let mut prev = shot_difficulty(0.0);
        for step in 1..=400 {
            let d = step as f64 * 0.25;
            let cur = shot_difficulty(d);
            assert!(cur.is_finite());
            assert!(cur < prev);
            prev = cur;
        }
    }

    #[test]
    fn split_indices_partition_every_row_once() {
        let (train, test) = split_indices(50, 0.2, 42);
        assert_eq!(test.len(), 10);
        let mut all = train.iter().chain(&test).copied().collect::<Vec<_>>();
        all.sort_unstable();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
        assert_eq!(split_indices(50, 0.2, 42), (train, test));
    }

    #[test]
    fn zone_fg_reports_wrong_type_instead_of_missing() {
        let mut f = Frame::new();
        f.set_column("SHOT_ZONE_BASIC", Column::Num(vec![Some(1.0), Some(2.0)]))
            .unwrap();
        f.set_column("SHOT_MADE_FLAG", Column::Num(vec![Some(1.0), Some(0.0)]))
            .unwrap();
        assert!(matches!(
            add_zone_fg(&mut f),
            Err(FeatureError::Table(TableError::WrongType { .. }))
        ));

        let mut g = Frame::new();
        g.set_column("SHOT_MADE_FLAG", Column::Num(vec![Some(1.0)]))
            .unwrap();
        assert!(matches!(
            add_zone_fg(&mut g),
            Err(FeatureError::MissingColumn(c)) if c == "SHOT_ZONE_BASIC"
        ));
    }

    #[test]
    fn zone_fg_on_an_empty_table() {
        let mut f = Frame::read_from("SHOT_ZONE_BASIC,SHOT_MADE_FLAG\n".as_bytes()).unwrap();
        add_zone_fg(&mut f).unwrap();
        assert!(f.is_empty());
        assert!(f.has_column("SHOT_ZONE_FG"));
    }

    #[test]
    fn zone_fg_is_the_make_rate_per_basic_zone() {
        let csv = "SHOT_ZONE_BASIC,SHOT_MADE_FLAG\n\
                   Mid-Range,1\n\
                   Mid-Range,0\n\
                   Restricted Area,1\n";
        let mut f = Frame::read_from(csv.as_bytes()).unwrap();
        add_zone_fg(&mut f).unwrap();
        assert_eq!(
            f.num("SHOT_ZONE_FG").unwrap(),
            &[Some(0.5), Some(0.5), Some(1.0)]
        );
    }
}
