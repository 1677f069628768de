//! RPG progression - standard levels, character stats and rank titles
//!
//! Raw personal records are graded against the coach's standards table.
//! Points per discipline are the achieved level's base points plus up to
//! 10 bonus points for progress toward the next level.

use serde::Serialize;

use crate::catalog::{Catalog, Direction, Discipline, StandardLevel, Standards, Stat};
use crate::history::{HistoryBySlug, latest_value};

/// Progress cap while the next level is not reached yet
const PROGRESS_CAP: f64 = 99.0;

/// Bonus points for a full bar toward the next level
const PROGRESS_BONUS: f64 = 10.0;

/// Points per percent of progress toward the first level
const PRE_LEVEL_SCALE: f64 = 0.1;

/// Result of grading one value against a discipline ladder
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LevelLookup<'a> {
    pub level: Option<&'a StandardLevel>,
    pub next_level: Option<&'a StandardLevel>,
    /// 0-100, where 100 means there is nothing left to reach
    pub progress: f64,
    pub points: u32,
}

impl LevelLookup<'_> {
    fn empty() -> Self {
        Self { level: None, next_level: None, progress: 0.0, points: 0 }
    }
}

/// Rank title derived from the overall level
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankTitle {
    pub id: String,
    pub name: String,
    pub color: String,
}

impl RankTitle {
    fn none() -> Self {
        Self {
            id: "none".to_string(),
            name: "Без уровня".to_string(),
            color: "#6b7280".to_string(),
        }
    }
}

impl Standards {
    pub fn first_level(&self) -> Option<&StandardLevel> {
        self.levels.first()
    }

    /// Grade `value` for the discipline `slug`
    pub fn lookup(&self, slug: &str, value: f64) -> LevelLookup<'_> {
        let Some(standard) = self.standards.get(slug) else {
            return LevelLookup::empty();
        };
        let values = &standard.values;
        let direction = standard.direction;

        let achieved = (0..values.len())
            .rev()
            .find(|&i| matches!(values[i], Some(t) if direction.satisfies(value, t)));

        let Some(achieved) = achieved else {
            return self.pre_level(values, direction, value);
        };

        let Some(current_level) = self.levels.get(achieved) else {
            return LevelLookup::empty();
        };
        let next_index = achieved + 1;
        let next_level = self.levels.get(next_index);

        let mut progress = 100.0;
        if let (Some(_), Some(&Some(next_threshold)), Some(current_threshold)) =
            (next_level, values.get(next_index), values[achieved])
        {
            let (range, done) = match direction {
                Direction::HigherIsBetter => (next_threshold - current_threshold, value - current_threshold),
                Direction::LowerIsBetter => (current_threshold - next_threshold, current_threshold - value),
            };
            let raw = if range > 0.0 { (done / range * 100.0).min(PROGRESS_CAP) } else { 0.0 };
            progress = raw.max(0.0).round();
        }

        LevelLookup {
            level: Some(current_level),
            next_level,
            progress,
            points: current_level.points + (progress / 100.0 * PROGRESS_BONUS).round() as u32,
        }
    }

    /// Below the first defined threshold: a small score toward the minimum
    fn pre_level(&self, values: &[Option<f64>], direction: Direction, value: f64) -> LevelLookup<'_> {
        let Some((first_valid, threshold)) = values
            .iter()
            .enumerate()
            .find_map(|(i, v)| v.map(|t| (i, t)))
        else {
            return LevelLookup::empty();
        };

        let ratio = match direction {
            Direction::HigherIsBetter => value / threshold,
            Direction::LowerIsBetter => threshold / value,
        };
        let progress = (ratio * 100.0).max(0.0).min(PROGRESS_CAP);

        LevelLookup {
            level: None,
            next_level: self.levels.get(first_valid),
            progress,
            points: (progress * PRE_LEVEL_SCALE).round() as u32,
        }
    }

    /// Highest level whose points do not exceed `level`
    pub fn rank_title(&self, level: u32) -> RankTitle {
        self.levels
            .iter()
            .rev()
            .find(|l| level >= l.points)
            .map(|l| RankTitle {
                id: l.id.clone(),
                name: l.name.clone(),
                color: l.color.clone(),
            })
            .unwrap_or_else(RankTitle::none)
    }
}

/// Composite level for one stat
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatLevel {
    pub stat: Stat,
    pub level: u32,
    /// Fractional part of the average, in percent
    pub progress: u32,
    /// Disciplines with a recorded value; 0 means "no data", not "level 0"
    pub discipline_count: usize,
}

/// Average points over the stat's disciplines that have a value
pub fn stat_level(
    stat: Stat,
    disciplines: &[Discipline],
    standards: &Standards,
    history: &HistoryBySlug,
) -> StatLevel {
    let points: Vec<u32> = disciplines
        .iter()
        .filter(|d| d.stat == Some(stat))
        .filter_map(|d| latest_value(history, &d.slug).map(|v| standards.lookup(&d.slug, v).points))
        .collect();

    let count = points.len();
    let avg = if count > 0 {
        points.iter().map(|p| *p as f64).sum::<f64>() / count as f64
    } else {
        0.0
    };

    StatLevel {
        stat,
        level: avg.round() as u32,
        progress: (avg.fract() * 100.0).round() as u32,
        discipline_count: count,
    }
}

/// All four stats in profile order
pub fn user_stats(disciplines: &[Discipline], standards: &Standards, history: &HistoryBySlug) -> Vec<StatLevel> {
    Stat::all()
        .iter()
        .map(|stat| stat_level(*stat, disciplines, standards, history))
        .collect()
}

/// Mean level of stats with data; never below 1
pub fn overall_level(stats: &[StatLevel]) -> u32 {
    let active: Vec<u32> = stats
        .iter()
        .filter(|s| s.discipline_count > 0)
        .map(|s| s.level)
        .collect();
    if active.is_empty() {
        return 1;
    }
    let avg = active.iter().map(|l| *l as f64).sum::<f64>() / active.len() as f64;
    (avg.round() as u32).max(1)
}

/// Per-discipline achievement row ("filled" vs "empty")
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Achievement<'a> {
    pub discipline: &'a Discipline,
    pub value: Option<f64>,
    pub level: Option<&'a StandardLevel>,
    pub next_level: Option<&'a StandardLevel>,
    pub progress: f64,
}

/// One row for every discipline in the catalog
pub fn discipline_achievements<'a>(
    disciplines: &'a [Discipline],
    standards: &'a Standards,
    history: &HistoryBySlug,
) -> Vec<Achievement<'a>> {
    disciplines
        .iter()
        .map(|d| match latest_value(history, &d.slug) {
            None => Achievement {
                discipline: d,
                value: None,
                level: None,
                next_level: standards.first_level(),
                progress: 0.0,
            },
            Some(value) => {
                let lookup = standards.lookup(&d.slug, value);
                Achievement {
                    discipline: d,
                    value: Some(value),
                    level: lookup.level,
                    next_level: lookup.next_level,
                    progress: lookup.progress,
                }
            }
        })
        .collect()
}

/// Everything the profile page shows about a user
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CharacterSheet {
    pub stats: Vec<StatLevel>,
    pub level: u32,
    pub rank: RankTitle,
}

pub fn character_sheet(catalog: &Catalog, history: &HistoryBySlug) -> CharacterSheet {
    let stats = user_stats(&catalog.disciplines, &catalog.standards, history);
    let level = overall_level(&stats);
    let rank = catalog.standards.rank_title(level);
    CharacterSheet { stats, level, rank }
}

/// Text progress bar, e.g. `[######....]`
pub fn progress_bar(progress: f64, width: usize) -> String {
    let filled = ((progress.clamp(0.0, 100.0) / 100.0) * width as f64).round() as usize;
    format!("[{}{}]", "#".repeat(filled), ".".repeat(width - filled))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DisciplineStandard;
    use crate::history::HistoryItem;
    use chrono::{TimeZone, Utc};

    fn level(id: &str, points: u32) -> StandardLevel {
        StandardLevel {
            id: id.to_string(),
            name: id.to_string(),
            points,
            color: "#000".to_string(),
        }
    }

    fn ladder(direction: Direction, values: &[Option<f64>]) -> DisciplineStandard {
        DisciplineStandard {
            category: String::new(),
            unit: String::new(),
            direction,
            values: values.to_vec(),
            note: None,
        }
    }

    fn create_discipline(slug: &str, direction: Direction, stat: Option<Stat>) -> Discipline {
        Discipline {
            slug: slug.to_string(),
            name: slug.to_string(),
            category: "Сила".to_string(),
            unit: "reps".to_string(),
            icon: String::new(),
            direction,
            stat,
            has_1rm: false,
        }
    }

    fn history_of(values: &[(&str, f64)]) -> HistoryBySlug {
        let ts = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();
        values
            .iter()
            .map(|(slug, v)| (slug.to_string(), vec![HistoryItem::new(ts, *v)]))
            .collect()
    }

    /// Four levels worth 0/5/10/20, pull-up thresholds 1/5/10
    fn pullup_standards() -> Standards {
        let mut standards = Standards {
            levels: vec![level("l0", 0), level("l1", 5), level("l2", 10), level("l3", 20)],
            ..Default::default()
        };
        standards.standards.insert(
            "pullups".to_string(),
            ladder(Direction::HigherIsBetter, &[Some(1.0), Some(5.0), Some(10.0)]),
        );
        standards
    }

    /// Three levels 10/20/30 with a, b (higher) and c (lower)
    fn small_standards() -> Standards {
        let mut standards = Standards {
            levels: vec![level("novice", 10), level("amateur", 20), level("athlete", 30)],
            ..Default::default()
        };
        let up = [Some(10.0), Some(20.0), Some(30.0)];
        standards.standards.insert("a".to_string(), ladder(Direction::HigherIsBetter, &up));
        standards.standards.insert("b".to_string(), ladder(Direction::HigherIsBetter, &up));
        standards.standards.insert(
            "c".to_string(),
            ladder(Direction::LowerIsBetter, &[Some(60.0), Some(50.0), Some(40.0)]),
        );
        standards.standards.insert(
            "gap".to_string(),
            ladder(Direction::HigherIsBetter, &[None, Some(5.0), None]),
        );
        standards
    }

    #[test]
    fn test_lookup_interpolates() {
        let standards = pullup_standards();
        let result = standards.lookup("pullups", 7.0);

        assert_eq!(result.level.unwrap().id, "l1");
        assert_eq!(result.next_level.unwrap().id, "l2");
        assert_eq!(result.progress, 40.0);
        assert_eq!(result.points, 9);
    }

    #[test]
    fn test_lookup_next_threshold_undefined() {
        let standards = pullup_standards();
        let result = standards.lookup("pullups", 15.0);

        assert_eq!(result.level.unwrap().id, "l2");
        assert_eq!(result.next_level.unwrap().id, "l3");
        assert_eq!(result.progress, 100.0);
        assert_eq!(result.points, 20);
    }

    #[test]
    fn test_lookup_top_level() {
        let standards = small_standards();
        let result = standards.lookup("a", 500.0);

        assert_eq!(result.level.unwrap().id, "athlete");
        assert!(result.next_level.is_none());
        assert_eq!(result.progress, 100.0);
        assert_eq!(result.points, 40);
    }

    #[test]
    fn test_lookup_progress_capped_below_next() {
        let standards = small_standards();
        // 19.99 of 10..20 is 99.9% -> capped at 99
        let result = standards.lookup("a", 19.99);
        assert_eq!(result.level.unwrap().id, "novice");
        assert_eq!(result.progress, 99.0);
        assert_eq!(result.points, 20);
    }

    #[test]
    fn test_lookup_pre_level() {
        let standards = pullup_standards();
        let result = standards.lookup("pullups", 0.5);

        assert!(result.level.is_none());
        assert_eq!(result.next_level.unwrap().id, "l0");
        assert_eq!(result.progress, 50.0);
        assert_eq!(result.points, 5);
    }

    #[test]
    fn test_lookup_pre_level_lower_better() {
        let standards = small_standards();
        let result = standards.lookup("c", 75.0);

        assert!(result.level.is_none());
        assert_eq!(result.progress, 80.0);
        assert_eq!(result.points, 8);
    }

    #[test]
    fn test_lookup_lower_better_interpolates() {
        let standards = small_standards();
        let result = standards.lookup("c", 57.0);

        assert_eq!(result.level.unwrap().id, "novice");
        assert_eq!(result.progress, 30.0);
        assert_eq!(result.points, 13);
    }

    #[test]
    fn test_lookup_skips_undefined_thresholds() {
        let standards = small_standards();

        let below = standards.lookup("gap", 2.0);
        assert!(below.level.is_none());
        assert_eq!(below.next_level.unwrap().id, "amateur");
        assert_eq!(below.progress, 40.0);

        let reached = standards.lookup("gap", 8.0);
        assert_eq!(reached.level.unwrap().id, "amateur");
        assert_eq!(reached.progress, 100.0);
        assert_eq!(reached.points, 30);
    }

    #[test]
    fn test_lookup_unknown_slug() {
        let standards = small_standards();
        assert_eq!(standards.lookup("nope", 100.0), LevelLookup::empty());
    }

    #[test]
    fn test_progress_always_in_range() {
        let standards = small_standards();
        for slug in ["a", "b", "c", "gap"] {
            for value in [-50.0, 0.0, 0.1, 9.0, 10.0, 15.0, 45.0, 55.0, 1e9] {
                let p = standards.lookup(slug, value).progress;
                assert!((0.0..=100.0).contains(&p), "{} {} -> {}", slug, value, p);
            }
        }
    }

    #[test]
    fn test_stat_level_average() {
        let standards = small_standards();
        let disciplines = vec![
            create_discipline("a", Direction::HigherIsBetter, Some(Stat::Strength)),
            create_discipline("b", Direction::HigherIsBetter, Some(Stat::Strength)),
            create_discipline("c", Direction::LowerIsBetter, Some(Stat::Endurance)),
        ];
        // a=20 -> 20 points, b=25 -> 25 points
        let history = history_of(&[("a", 20.0), ("b", 25.0)]);

        let strength = stat_level(Stat::Strength, &disciplines, &standards, &history);
        assert_eq!(strength.level, 23);
        assert_eq!(strength.progress, 50);
        assert_eq!(strength.discipline_count, 2);

        let endurance = stat_level(Stat::Endurance, &disciplines, &standards, &history);
        assert_eq!(endurance.level, 0);
        assert_eq!(endurance.discipline_count, 0);
    }

    #[test]
    fn test_stat_level_excludes_missing() {
        let standards = small_standards();
        let disciplines = vec![
            create_discipline("a", Direction::HigherIsBetter, Some(Stat::Strength)),
            create_discipline("b", Direction::HigherIsBetter, Some(Stat::Strength)),
        ];
        let history = history_of(&[("a", 30.0)]);

        let strength = stat_level(Stat::Strength, &disciplines, &standards, &history);
        assert_eq!(strength.level, 40);
        assert_eq!(strength.discipline_count, 1);
    }

    #[test]
    fn test_user_stats_order() {
        let standards = small_standards();
        let stats = user_stats(&[], &standards, &HistoryBySlug::new());
        let order: Vec<Stat> = stats.iter().map(|s| s.stat).collect();
        assert_eq!(order, Stat::all());
    }

    fn stat(level: u32, discipline_count: usize) -> StatLevel {
        StatLevel { stat: Stat::Strength, level, progress: 0, discipline_count }
    }

    #[test]
    fn test_overall_level() {
        let stats = vec![stat(4, 2), stat(6, 1), stat(0, 0), stat(0, 0)];
        assert_eq!(overall_level(&stats), 5);
    }

    #[test]
    fn test_overall_level_floor() {
        assert_eq!(overall_level(&[]), 1);
        assert_eq!(overall_level(&[stat(0, 0), stat(0, 0)]), 1);
        assert_eq!(overall_level(&[stat(0, 3)]), 1);
    }

    #[test]
    fn test_rank_title() {
        let standards = small_standards();
        assert_eq!(standards.rank_title(25).id, "amateur");
        assert_eq!(standards.rank_title(30).id, "athlete");
        assert_eq!(standards.rank_title(99).id, "athlete");

        let none = standards.rank_title(5);
        assert_eq!(none.id, "none");
        assert_eq!(none.name, "Без уровня");
    }

    #[test]
    fn test_achievements() {
        let standards = small_standards();
        let disciplines = vec![
            create_discipline("a", Direction::HigherIsBetter, Some(Stat::Strength)),
            create_discipline("c", Direction::LowerIsBetter, Some(Stat::Endurance)),
        ];
        let history = history_of(&[("a", 25.0)]);

        let rows = discipline_achievements(&disciplines, &standards, &history);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].value, Some(25.0));
        assert_eq!(rows[0].level.unwrap().id, "amateur");
        assert_eq!(rows[0].progress, 50.0);

        assert_eq!(rows[1].value, None);
        assert!(rows[1].level.is_none());
        assert_eq!(rows[1].next_level.unwrap().id, "novice");
        assert_eq!(rows[1].progress, 0.0);
    }

    #[test]
    fn test_character_sheet_builtin() {
        let catalog = Catalog::builtin().unwrap();
        let empty = character_sheet(&catalog, &HistoryBySlug::new());
        assert_eq!(empty.level, 1);
        assert_eq!(empty.rank.id, "none");

        let history = history_of(&[("pullups", 12.0), ("bench_press", 85.0)]);
        let sheet = character_sheet(&catalog, &history);
        assert!(sheet.stats[0].discipline_count == 2);
        assert!(sheet.level >= 30);
        assert_eq!(sheet, character_sheet(&catalog, &history));
    }

    #[test]
    fn test_progress_bar() {
        assert_eq!(progress_bar(40.0, 10), "[####......]");
        assert_eq!(progress_bar(150.0, 4), "[####]");
    }
}
