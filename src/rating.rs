//! Ratings - per-discipline standings and the overall leaderboard
//!
//! Scoring scheme "A": with N participants, place 1 earns N points,
//! place 2 earns N-1, ..., last place earns 1. No result earns 0.
//! Tied users share the average of the places they occupy.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;

use crate::catalog::{Direction, Discipline};
use crate::history::History;
use crate::users::User;

/// One row of a discipline table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisciplineRow {
    pub user_id: String,
    pub user_name: String,
    pub value: Option<f64>,
    pub place: Option<usize>,
    pub points: f64,
}

/// One row of the overall leaderboard
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverallRow {
    pub user_id: String,
    pub user_name: String,
    pub points: f64,
    pub place: usize,
}

/// Points for a 1-based place among `total_users`
pub fn points_for_place(place: usize, total_users: usize) -> f64 {
    if place == 0 || place > total_users {
        return 0.0;
    }
    (total_users - place + 1) as f64
}

/// Mean of the points for places `place_start .. place_start + tie_size`
pub fn average_tie_points(place_start: usize, tie_size: usize, total_users: usize) -> f64 {
    if tie_size == 0 {
        return 0.0;
    }
    let sum: f64 = (0..tie_size)
        .map(|i| points_for_place(place_start + i, total_users))
        .sum();
    sum / tie_size as f64
}

/// Walk a sorted slice and yield `(start, end, place)` for each run of equal keys
fn tie_groups<T>(sorted: &[T], same: impl Fn(&T, &T) -> bool) -> Vec<(usize, usize, usize)> {
    let mut groups = Vec::new();
    let mut i = 0;
    while i < sorted.len() {
        let mut j = i + 1;
        while j < sorted.len() && same(&sorted[i], &sorted[j]) {
            j += 1;
        }
        groups.push((i, j, i + 1));
        i = j;
    }
    groups
}

/// Standings for one discipline.
///
/// Ranked users come first ordered by place then name, users without a
/// result follow ordered by name. `N` in the point table is the total number
/// of users, including those without a result.
pub fn rank_discipline(discipline: &Discipline, users: &[User], history: &History) -> Vec<DisciplineRow> {
    let total_users = users.len();

    let rows: Vec<DisciplineRow> = users
        .iter()
        .map(|u| DisciplineRow {
            user_id: u.id.clone(),
            user_name: u.display_name(),
            value: history.latest_value(&u.id, &discipline.slug),
            place: None,
            points: 0.0,
        })
        .collect();

    let (mut ranked, mut unranked): (Vec<_>, Vec<_>) =
        rows.into_iter().partition(|r| r.value.is_some());

    let lower_better = discipline.direction == Direction::LowerIsBetter;
    ranked.sort_by(|a, b| {
        let (av, bv) = (a.value.unwrap_or_default(), b.value.unwrap_or_default());
        if lower_better { av.total_cmp(&bv) } else { bv.total_cmp(&av) }
    });

    for (start, end, place) in tie_groups(&ranked, |a, b| a.value == b.value) {
        let points = average_tie_points(place, end - start, total_users);
        for row in &mut ranked[start..end] {
            row.place = Some(place);
            row.points = points;
        }
    }

    ranked.sort_by(|a, b| a.place.cmp(&b.place).then_with(|| a.user_name.cmp(&b.user_name)));
    unranked.sort_by(|a, b| a.user_name.cmp(&b.user_name));

    ranked.extend(unranked);
    ranked
}

/// Overall leaderboard: sum of discipline points, best first
pub fn rank_overall(disciplines: &[Discipline], users: &[User], history: &History) -> Vec<OverallRow> {
    let mut totals: HashMap<&str, f64> = users.iter().map(|u| (u.id.as_str(), 0.0)).collect();

    for d in disciplines {
        for row in rank_discipline(d, users, history) {
            if let Some(total) = totals.get_mut(row.user_id.as_str()) {
                *total += row.points;
            }
        }
    }

    let mut rows: Vec<OverallRow> = users
        .iter()
        .map(|u| OverallRow {
            user_id: u.id.clone(),
            user_name: u.display_name(),
            points: totals.get(u.id.as_str()).copied().unwrap_or(0.0),
            place: 0,
        })
        .collect();

    // Stable: equal totals keep the input order
    rows.sort_by(|a, b| b.points.partial_cmp(&a.points).unwrap_or(Ordering::Equal));

    for (start, end, place) in tie_groups(&rows, |a, b| a.points == b.points) {
        for row in &mut rows[start..end] {
            row.place = place;
        }
    }

    rows
}

/// Format points for display: integers without a fraction, halves with one digit
pub fn format_points(points: f64) -> String {
    if points.fract() == 0.0 {
        format!("{:.0}", points)
    } else {
        format!("{:.1}", points)
    }
}
