use chrono::{Datelike, Local};

/// Season label for the current calendar year, e.g. "2023-24" during 2024.
pub fn current_season() -> String {
    season_for_year(Local::now().year())
}

pub fn season_for_year(year: i32) -> String {
    format!("{}-{:02}", year - 1, year.rem_euclid(100))
}

/// Resolves the season to use: a non-blank override wins, otherwise the clock.
pub fn resolve_season(override_label: Option<&str>) -> String {
    override_label
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(current_season)
}
