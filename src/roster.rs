use anyhow::{Context, Result, anyhow};

use crate::stats_api::{MeasureType, ResultSet, StatsSource};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Team {
    pub id: u32,
    pub abbreviation: &'static str,
    pub nickname: &'static str,
    pub full_name: &'static str,
}

pub const TEAMS: &[Team] = &[
    team(1610612737, "ATL", "Hawks", "Atlanta Hawks"),
    team(1610612738, "BOS", "Celtics", "Boston Celtics"),
    team(1610612739, "CLE", "Cavaliers", "Cleveland Cavaliers"),
    team(1610612740, "NOP", "Pelicans", "New Orleans Pelicans"),
    team(1610612741, "CHI", "Bulls", "Chicago Bulls"),
    team(1610612742, "DAL", "Mavericks", "Dallas Mavericks"),
    team(1610612743, "DEN", "Nuggets", "Denver Nuggets"),
    team(1610612744, "GSW", "Warriors", "Golden State Warriors"),
    team(1610612745, "HOU", "Rockets", "Houston Rockets"),
    team(1610612746, "LAC", "Clippers", "LA Clippers"),
    team(1610612747, "LAL", "Lakers", "Los Angeles Lakers"),
    team(1610612748, "MIA", "Heat", "Miami Heat"),
    team(1610612749, "MIL", "Bucks", "Milwaukee Bucks"),
    team(1610612750, "MIN", "Timberwolves", "Minnesota Timberwolves"),
    team(1610612751, "BKN", "Nets", "Brooklyn Nets"),
    team(1610612752, "NYK", "Knicks", "New York Knicks"),
    team(1610612753, "ORL", "Magic", "Orlando Magic"),
    team(1610612754, "IND", "Pacers", "Indiana Pacers"),
    team(1610612755, "PHI", "76ers", "Philadelphia 76ers"),
    team(1610612756, "PHX", "Suns", "Phoenix Suns"),
    team(1610612757, "POR", "Trail Blazers", "Portland Trail Blazers"),
    team(1610612758, "SAC", "Kings", "Sacramento Kings"),
    team(1610612759, "SAS", "Spurs", "San Antonio Spurs"),
    team(1610612760, "OKC", "Thunder", "Oklahoma City Thunder"),
    team(1610612761, "TOR", "Raptors", "Toronto Raptors"),
    team(1610612762, "UTA", "Jazz", "Utah Jazz"),
    team(1610612763, "MEM", "Grizzlies", "Memphis Grizzlies"),
    team(1610612764, "WAS", "Wizards", "Washington Wizards"),
    team(1610612765, "DET", "Pistons", "Detroit Pistons"),
    team(1610612766, "CHA", "Hornets", "Charlotte Hornets"),
];

const fn team(
    id: u32,
    abbreviation: &'static str,
    nickname: &'static str,
    full_name: &'static str,
) -> Team {
    Team {
        id,
        abbreviation,
        nickname,
        full_name,
    }
}

/// Looks a team up by numeric id, abbreviation, nickname or full name.
pub fn find_team(query: &str) -> Option<&'static Team> {
    let q = query.trim();
    if let Ok(id) = q.parse::<u32>() {
        return TEAMS.iter().find(|t| t.id == id);
    }
    TEAMS.iter().find(|t| {
        t.full_name.eq_ignore_ascii_case(q)
            || t.abbreviation.eq_ignore_ascii_case(q)
            || t.nickname.eq_ignore_ascii_case(q)
    })
}

pub fn resolve_team(query: &str) -> Result<&'static Team> {
    find_team(query).ok_or_else(|| anyhow!("unknown team '{}'", query.trim()))
}

/// Every player the source knows about, regardless of team.
pub fn fetch_all_players(source: &dyn StatsSource, season: &str) -> Result<Vec<Player>> {
    let set = source
        .all_players(season)
        .context("all players request failed")?;
    players_from_set(&set, "PERSON_ID", "DISPLAY_FIRST_LAST", None)
}

/// Players who logged stats for `team_id` in `season`.
pub fn fetch_team_roster(
    source: &dyn StatsSource,
    team_id: u32,
    season: &str,
) -> Result<Vec<Player>> {
    let set = source
        .league_player_stats(season, MeasureType::Base)
        .context("league player stats request failed")?;
    players_from_set(&set, "PLAYER_ID", "PLAYER_NAME", Some(team_id))
}

fn players_from_set(
    set: &ResultSet,
    id_col: &str,
    name_col: &str,
    team_id: Option<u32>,
) -> Result<Vec<Player>> {
    if set.is_empty() {
        return Ok(Vec::new());
    }
    let cols = set.require_columns(&[id_col, name_col])?;
    let team_col = match team_id {
        Some(_) => Some(set.require_columns(&["TEAM_ID"])?[0]),
        None => None,
    };

    let mut out = Vec::new();
    for row in &set.rows {
        if let (Some(want), Some(col)) = (team_id, team_col)
            && ResultSet::u32_at(row, col) != Some(want)
        {
            continue;
        }
        let Some(id) = ResultSet::u32_at(row, cols[0]) else {
            continue;
        };
        let name = ResultSet::string_at(row, cols[1]).unwrap_or_default();
        out.push(Player { id, name });
    }
    Ok(out)
}
