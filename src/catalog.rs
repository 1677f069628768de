//! Discipline catalog and standards table - база дисциплин и нормативов

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const BUILTIN_DISCIPLINES: &str = include_str!("../data/disciplines.json");
const BUILTIN_STANDARDS: &str = include_str!("../data/standards.json");

/// Fixed display order of categories (same as the results page)
pub const CATEGORY_ORDER: &[&str] = &["Сила", "Статика", "Навыки", "Выносливость", "Бег", "Подвижность"];

/// Which way a result improves
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    #[default]
    #[serde(rename = "higher_better")]
    HigherIsBetter, // больше = лучше (вес, повторы)
    #[serde(rename = "lower_better")]
    LowerIsBetter,  // меньше = лучше (время бега)
}

impl Direction {
    /// Whether `value` reaches `threshold` in this direction
    pub fn satisfies(self, value: f64, threshold: f64) -> bool {
        match self {
            Direction::HigherIsBetter => value >= threshold,
            Direction::LowerIsBetter => value <= threshold,
        }
    }

    pub fn arrow(&self) -> &'static str {
        match self {
            Direction::HigherIsBetter => "↑",
            Direction::LowerIsBetter => "↓",
        }
    }
}

/// Composite character stat a discipline feeds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Stat {
    Strength,    // Сила
    Endurance,   // Выносливость
    Agility,     // Ловкость
    Flexibility, // Гибкость
}

impl Stat {
    pub fn name_ru(&self) -> &'static str {
        match self {
            Stat::Strength => "Сила",
            Stat::Endurance => "Выносливость",
            Stat::Agility => "Ловкость",
            Stat::Flexibility => "Гибкость",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Stat::Strength => "💪",
            Stat::Endurance => "🏃",
            Stat::Agility => "🤸",
            Stat::Flexibility => "🧘",
        }
    }

    /// Hex colour, `#rrggbb`
    pub fn color(&self) -> &'static str {
        match self {
            Stat::Strength => "#ef4444",
            Stat::Endurance => "#22c55e",
            Stat::Agility => "#3b82f6",
            Stat::Flexibility => "#a855f7",
        }
    }

    /// All stats in profile order
    pub fn all() -> &'static [Stat] {
        &[Stat::Strength, Stat::Endurance, Stat::Agility, Stat::Flexibility]
    }
}

/// A trackable exercise or test
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Discipline {
    pub slug: String,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub stat: Option<Stat>,
    #[serde(default, rename = "has1RM")]
    pub has_1rm: bool,
}

/// One rung of the global level ladder
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StandardLevel {
    pub id: String,
    pub name: String,
    pub points: u32,
    pub color: String,
}

/// Threshold ladder for one discipline, one entry per `StandardLevel` index
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DisciplineStandard {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub direction: Direction,
    pub values: Vec<Option<f64>>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Level ladder plus per-discipline thresholds (`standards.json`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Standards {
    pub levels: Vec<StandardLevel>,
    pub standards: HashMap<String, DisciplineStandard>,
}

/// Everything loaded once at startup
#[derive(Debug, Clone)]
pub struct Catalog {
    pub disciplines: Vec<Discipline>,
    pub standards: Standards,
}

impl Catalog {
    /// Catalog compiled into the binary
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_DISCIPLINES, BUILTIN_STANDARDS)
    }

    /// Load `disciplines.json` and `standards.json` from a directory
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let disciplines_path = dir.join("disciplines.json");
        let standards_path = dir.join("standards.json");

        let disciplines = std::fs::read_to_string(&disciplines_path)
            .with_context(|| format!("reading {}", disciplines_path.display()))?;
        let standards = std::fs::read_to_string(&standards_path)
            .with_context(|| format!("reading {}", standards_path.display()))?;

        Self::from_json(&disciplines, &standards)
    }

    pub fn from_json(disciplines: &str, standards: &str) -> Result<Self> {
        let disciplines: Vec<Discipline> =
            serde_json::from_str(disciplines).context("parsing disciplines catalog")?;
        let standards: Standards =
            serde_json::from_str(standards).context("parsing standards table")?;
        Ok(Self { disciplines, standards })
    }

    pub fn find(&self, slug: &str) -> Option<&Discipline> {
        self.disciplines.iter().find(|d| d.slug == slug)
    }

    /// Disciplines grouped by category, known categories first in fixed order
    pub fn by_category(&self) -> Vec<(&str, Vec<&Discipline>)> {
        let mut groups: Vec<(&str, Vec<&Discipline>)> = Vec::new();
        for d in &self.disciplines {
            match groups.iter_mut().find(|(cat, _)| *cat == d.category) {
                Some((_, list)) => list.push(d),
                None => groups.push((d.category.as_str(), vec![d])),
            }
        }

        let rank = |cat: &str| {
            CATEGORY_ORDER
                .iter()
                .position(|c| *c == cat)
                .unwrap_or(CATEGORY_ORDER.len())
        };
        groups.sort_by_key(|(cat, _)| rank(cat));
        groups
    }
}
