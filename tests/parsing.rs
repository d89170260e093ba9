use std::fs;
use std::path::PathBuf;

use nba_fg_model::defense::{career_average, league_records};
use nba_fg_model::roster::Player;
use nba_fg_model::shots::shots_from_set;
use nba_fg_model::stats_api::{ResultSet, parse_result_sets, pick_set};

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

fn fixture_set(name: &str, set_name: &str) -> ResultSet {
    let sets = parse_result_sets(&read_fixture(name)).expect("fixture should parse");
    pick_set(sets, set_name)
}

fn curry() -> Player {
    Player {
        id: 201939,
        name: "Stephen Curry".to_string(),
    }
}

#[test]
fn picks_the_named_set_among_several() {
    let sets = parse_result_sets(&read_fixture("shot_chart.json")).expect("fixture should parse");
    assert_eq!(sets.len(), 2);
    let set = pick_set(sets, "LeagueAverages");
    assert_eq!(set.name, "LeagueAverages");
    assert_eq!(set.len(), 1);
}

#[test]
fn parses_shot_chart_fixture() {
    let set = fixture_set("shot_chart.json", "Shot_Chart_Detail");
    let shots = shots_from_set(&set, &curry()).expect("shots should decode");
    // The row without a shot distance is dropped.
    assert_eq!(shots.len(), 3);
    assert_eq!(shots[0].game_id, "0022300061");
    assert_eq!(shots[0].zone_basic, "Above the Break 3");
    assert_eq!(shots[0].shot_distance, 26.0);
    assert_eq!(shots[0].made, 1);
    assert_eq!(shots[1].made, 0);
    assert_eq!(shots[2].zone_area, "Left Side(L)");
    assert_eq!(shots[2].loc_x, -225.0);
    assert!(shots.iter().all(|s| s.attempted == 1));
}

#[test]
fn shot_player_name_comes_from_roster() {
    let set = fixture_set("shot_chart.json", "Shot_Chart_Detail");
    let renamed = Player {
        id: 201939,
        name: "Wardell Curry".to_string(),
    };
    let shots = shots_from_set(&set, &renamed).expect("shots should decode");
    assert!(shots.iter().all(|s| s.player_name == "Wardell Curry"));
}

#[test]
fn parses_league_defense_fixture() {
    let set = fixture_set("league_dash_advanced.json", "LeagueDashPlayerStats");
    let table = league_records(&set).expect("defense should decode");
    // LeBron has no DEF_RATING and is left out.
    assert_eq!(table.len(), 3);
    let curry = &table[&201939];
    assert_eq!(curry.def_rating, 114.3);
    assert_eq!(curry.blk_pct, Some(0.009));
    assert_eq!(table[&1628369].blk_pct, None);
    assert!(!table.contains_key(&2544));
}

#[test]
fn career_totals_without_defensive_columns_yield_nothing() {
    let set = fixture_set("career_stats.json", "SeasonTotalsRegularSeason");
    assert_eq!(set.len(), 2);
    assert_eq!(career_average(&set, &curry()), None);
}

#[test]
fn empty_and_malformed_bodies() {
    assert!(parse_result_sets("").expect("blank body").is_empty());
    assert!(parse_result_sets("null").expect("null body").is_empty());
    assert!(parse_result_sets("{\"message\": \"throttled\"}").is_err());
    assert!(parse_result_sets("<html>").is_err());

    let single = r#"{"resultSet": {"name": "One", "headers": ["A"], "rowSet": [[1], [2]]}}"#;
    let sets = parse_result_sets(single).expect("single set");
    assert_eq!(sets.len(), 1);
    assert_eq!(sets[0].len(), 2);
    assert_eq!(pick_set(Vec::new(), "Any"), ResultSet::default());
}
