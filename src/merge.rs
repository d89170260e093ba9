use std::collections::HashMap;

use tracing::warn;

use crate::config::JoinKey;
use crate::defense::{DEFENSE_COLUMNS, DefenseRecord};
use crate::shots::{SHOT_COLUMNS, ShotRecord};
use crate::table::{Column, Frame, TableError};

#[derive(Debug, Clone, PartialEq)]
pub struct MergedRow {
    pub shot: ShotRecord,
    pub def_rating: Option<f64>,
    pub blk_pct: Option<f64>,
}

/// Shots left-joined to defense. `has_defense` is false when the defense side
/// was empty, in which case the table carries no defense columns at all.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedTable {
    pub rows: Vec<MergedRow>,
    pub has_defense: bool,
}

impl MergedTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn to_frame(&self) -> Result<Frame, TableError> {
        let shots = self.rows.iter().map(|r| &r.shot).collect::<Vec<_>>();
        let mut frame = shot_frame(&shots)?;
        if self.has_defense {
            frame.set_column(
                DEFENSE_COLUMNS[0],
                Column::Num(self.rows.iter().map(|r| r.def_rating).collect()),
            )?;
            frame.set_column(
                DEFENSE_COLUMNS[1],
                Column::Num(self.rows.iter().map(|r| r.blk_pct).collect()),
            )?;
        }
        Ok(frame)
    }
}

/// Left outer join of shots onto defense. Output row count always equals the
/// shot count; when several defense records share a key the first one wins.
pub fn merge(shots: &[ShotRecord], defense: &[DefenseRecord], key: JoinKey) -> MergedTable {
    if defense.is_empty() {
        warn!("defensive data is empty, merging without defensive stats");
        return MergedTable {
            rows: shots
                .iter()
                .cloned()
                .map(|shot| MergedRow {
                    shot,
                    def_rating: None,
                    blk_pct: None,
                })
                .collect(),
            has_defense: false,
        };
    }

    let rows = match key {
        JoinKey::PlayerId => {
            let mut by_id: HashMap<u32, &DefenseRecord> = HashMap::new();
            for rec in defense {
                by_id.entry(rec.player_id).or_insert(rec);
            }
            join_rows(shots, |s| by_id.get(&s.player_id).copied())
        }
        JoinKey::PlayerName => {
            let mut by_name: HashMap<&str, &DefenseRecord> = HashMap::new();
            for rec in defense {
                by_name.entry(rec.player_name.as_str()).or_insert(rec);
            }
            join_rows(shots, |s| by_name.get(s.player_name.as_str()).copied())
        }
    };

    MergedTable {
        rows,
        has_defense: true,
    }
}

fn join_rows<'a>(
    shots: &[ShotRecord],
    lookup: impl Fn(&ShotRecord) -> Option<&'a DefenseRecord>,
) -> Vec<MergedRow> {
    shots
        .iter()
        .map(|shot| {
            let found = lookup(shot);
            MergedRow {
                shot: shot.clone(),
                def_rating: found.map(|d| d.def_rating),
                blk_pct: found.and_then(|d| d.blk_pct),
            }
        })
        .collect()
}

/// The raw shot columns, in their persisted order.
pub fn shot_frame(shots: &[&ShotRecord]) -> Result<Frame, TableError> {
    let columns = [
        text_column(shots, |s| s.game_id.clone()),
        num_column(shots, |s| s.player_id as f64),
        text_column(shots, |s| s.player_name.clone()),
        text_column(shots, |s| s.zone_basic.clone()),
        text_column(shots, |s| s.zone_area.clone()),
        text_column(shots, |s| s.zone_range.clone()),
        num_column(shots, |s| s.shot_distance),
        num_column(shots, |s| s.loc_x),
        num_column(shots, |s| s.loc_y),
        num_column(shots, |s| s.attempted as f64),
        num_column(shots, |s| s.made as f64),
        text_column(shots, |s| s.game_date.clone()),
    ];
    let mut frame = Frame::new();
    for (name, column) in SHOT_COLUMNS.iter().zip(columns) {
        frame.set_column(name, column)?;
    }
    Ok(frame)
}

// Blank strings are written as empty cells, which read back as nulls.
fn text_column(shots: &[&ShotRecord], f: impl Fn(&ShotRecord) -> String) -> Column {
    Column::Text(
        shots
            .iter()
            .map(|s| Some(f(s)).filter(|v| !v.is_empty()))
            .collect(),
    )
}

fn num_column(shots: &[&ShotRecord], f: impl Fn(&ShotRecord) -> f64) -> Column {
    Column::Num(shots.iter().map(|s| Some(f(s))).collect())
}

#[cfg(test)]
mod tests {
    use super::{merge, shot_frame};
    use crate::config::JoinKey;
    use crate::defense::DefenseRecord;
    use crate::shots::ShotRecord;

    fn shot(id: u32, name: &str) -> ShotRecord {
        ShotRecord {
            game_id: "0022300001".to_string(),
            player_id: id,
            player_name: name.to_string(),
            zone_basic: "Mid-Range".to_string(),
            zone_area: "Center(C)".to_string(),
            zone_range: "8-16 ft.".to_string(),
            shot_distance: 12.0,
            loc_x: 0.0,
            loc_y: 120.0,
            attempted: 1,
            made: 0,
            game_date: "20231024".to_string(),
        }
    }

    fn def(id: u32, name: &str, rating: f64) -> DefenseRecord {
        DefenseRecord {
            player_id: id,
            player_name: name.to_string(),
            def_rating: rating,
            blk_pct: None,
        }
    }

    #[test]
    fn empty_defense_returns_shot_table_unchanged() {
        let shots = vec![shot(1, "A"), shot(2, "B")];
        let merged = merge(&shots, &[], JoinKey::PlayerId);
        assert!(!merged.has_defense);
        let refs = shots.iter().collect::<Vec<_>>();
        assert_eq!(merged.to_frame().unwrap(), shot_frame(&refs).unwrap());
    }

    #[test]
    fn duplicate_defense_keys_do_not_multiply_rows() {
        let shots = vec![shot(1, "A"), shot(1, "A")];
        let defense = vec![def(1, "A", 101.0), def(1, "A", 99.0)];
        let merged = merge(&shots, &defense, JoinKey::PlayerId);
        assert_eq!(merged.len(), 2);
        assert!(merged.rows.iter().all(|r| r.def_rating == Some(101.0)));
    }

    #[test]
    fn id_join_survives_name_formatting_differences() {
        let shots = vec![shot(1, "Nikola Jokic")];
        let defense = vec![def(1, "Nikola Jokić", 108.0)];
        let by_id = merge(&shots, &defense, JoinKey::PlayerId);
        assert_eq!(by_id.rows[0].def_rating, Some(108.0));
        let by_name = merge(&shots, &defense, JoinKey::PlayerName);
        assert_eq!(by_name.rows[0].def_rating, None);
    }

    #[test]
    fn shot_columns_are_preserved_row_by_row() {
        let shots = vec![shot(1, "A"), shot(2, "B"), shot(3, "C")];
        let defense = vec![def(2, "B", 104.0)];
        let merged = merge(&shots, &defense, JoinKey::PlayerName);
        assert_eq!(merged.len(), shots.len());
        for (row, src) in merged.rows.iter().zip(&shots) {
            assert_eq!(&row.shot, src);
        }
        let frame = merged.to_frame().unwrap();
        assert_eq!(frame.num("DEF_RATING").unwrap(), &[None, Some(104.0), None]);
    }
}
