//! Training program calendar
//!
//! A program is cycles -> phases -> workouts -> blocks -> rows. Workouts run
//! on a Mon/Wed/Fri schedule starting from the program start date.

use chrono::{Datelike, Duration, NaiveDate};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::users::random_id;

/// Day offsets inside a week for the three weekly workouts (Mon, Wed, Fri)
const WEEK_OFFSETS: [i64; 3] = [0, 2, 4];

const MONTHS_GENITIVE: [&str; 12] = [
    "января", "февраля", "марта", "апреля", "мая", "июня",
    "июля", "августа", "сентября", "октября", "ноября", "декабря",
];

const WEEKDAYS: [&str; 7] = [
    "понедельник", "вторник", "среда", "четверг", "пятница", "суббота", "воскресенье",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub id: String,
    pub title: String,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub cycles: Vec<Cycle>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cycle {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub color: Option<String>,
    pub order_index: i32,
    #[serde(default)]
    pub phases: Vec<Phase>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    pub id: String,
    pub title: String,
    pub order_index: i32,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub workouts: Vec<Workout>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workout {
    pub id: String,
    pub title: String,
    pub order_index: i32,
    #[serde(default)]
    pub blocks: Vec<WorkoutBlock>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutBlock {
    pub id: String,
    /// e.g. "15 min"
    #[serde(default)]
    pub title: Option<String>,
    pub order_index: i32,
    #[serde(default)]
    pub rows: Vec<BlockRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockRow {
    pub id: String,
    /// e.g. "A1"
    #[serde(default)]
    pub prefix: Option<String>,
    pub content: String,
    pub order_index: i32,
}

/// Level of the program tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProgramNode {
    Program,
    Cycle,
    Phase,
    Workout,
    Block,
    Row,
}

impl ProgramNode {
    fn id_prefix(self) -> &'static str {
        match self {
            ProgramNode::Program => "prg",
            ProgramNode::Cycle => "cyc",
            ProgramNode::Phase => "ph",
            ProgramNode::Workout => "wo",
            ProgramNode::Block => "blk",
            ProgramNode::Row => "row",
        }
    }
}

pub fn new_node_id(node: ProgramNode) -> String {
    random_id(node.id_prefix())
}

/// Partial edit of a tree node; fields a node does not have are rejected on save
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeUpdate {
    pub title: Option<String>,
    pub color: Option<String>,
    pub content: Option<String>,
    pub prefix: Option<String>,
    pub order_index: Option<i32>,
    pub start_date: Option<NaiveDate>,
}

impl NodeUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Phases and workouts in a ready-made cycle
pub const SMART_PHASES: i32 = 4;
pub const SMART_WORKOUTS: i32 = 4;

/// Row prefixes of the standard workout blocks
pub const SMART_BLOCKS: &[&[&str]] = &[
    &["A1", "A2"],
    &["B1", "B2"],
    &["C1", "C2"],
    &["D1", "D2"],
    &["E1", "E2", "E3", "E4", "E5"],
    &["F1"],
];

/// Cycle pre-filled with 4 phases of 4 workouts, each with the standard
/// A-F blocks and empty rows
pub fn smart_cycle(title: &str, order_index: i32, color: Option<&str>) -> Cycle {
    let block = |index: usize, prefixes: &[&str]| WorkoutBlock {
        id: new_node_id(ProgramNode::Block),
        title: None,
        order_index: index as i32 + 1,
        rows: prefixes
            .iter()
            .enumerate()
            .map(|(r, prefix)| BlockRow {
                id: new_node_id(ProgramNode::Row),
                prefix: Some(prefix.to_string()),
                content: String::new(),
                order_index: r as i32 + 1,
            })
            .collect(),
    };

    let workout = |w: i32| Workout {
        id: new_node_id(ProgramNode::Workout),
        title: format!("Тренировка {}", w),
        order_index: w,
        blocks: SMART_BLOCKS.iter().enumerate().map(|(i, p)| block(i, *p)).collect(),
    };

    Cycle {
        id: new_node_id(ProgramNode::Cycle),
        title: title.to_string(),
        color: color.map(str::to_string),
        order_index,
        phases: (1..=SMART_PHASES)
            .map(|p| Phase {
                id: new_node_id(ProgramNode::Phase),
                title: format!("Фаза {}", p),
                order_index: p,
                color: None,
                workouts: (1..=SMART_WORKOUTS).map(&workout).collect(),
            })
            .collect(),
    }
}

/// Date of the workout with a global 0-based index
pub fn workout_date(start: NaiveDate, index: usize) -> NaiveDate {
    let week = (index / 3) as i64;
    let offset = WEEK_OFFSETS[index % 3];
    start + Duration::days(week * 7 + offset)
}

/// Global workout index for a date, None on rest days or before the start
pub fn workout_index_for_date(start: NaiveDate, date: NaiveDate) -> Option<usize> {
    let diff = (date - start).num_days();
    if diff < 0 {
        return None;
    }
    let week = (diff / 7) as usize;
    let remainder = WEEK_OFFSETS.iter().position(|o| *o == diff % 7)?;
    Some(week * 3 + remainder)
}

pub fn week_label(start: NaiveDate, date: NaiveDate) -> String {
    let diff = (date - start).num_days();
    if diff < 0 {
        return "До начала".to_string();
    }
    format!("Неделя {}", diff / 7 + 1)
}

/// "6 января, понедельник"
pub fn format_training_date(date: NaiveDate) -> String {
    format!(
        "{} {}, {}",
        date.day(),
        MONTHS_GENITIVE[date.month0() as usize],
        WEEKDAYS[date.weekday().num_days_from_monday() as usize]
    )
}

/// Phase a date belongs to
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseMatch<'a> {
    pub cycle: &'a Cycle,
    pub phase: &'a Phase,
    /// Phase colour, falling back to the cycle colour
    pub color: Option<&'a str>,
}

/// Scheduled workout with its position in the program
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledWorkout<'a> {
    pub index: usize,
    pub date: NaiveDate,
    pub cycle: &'a Cycle,
    pub phase: &'a Phase,
    pub workout: &'a Workout,
}

impl Program {
    /// Phases of a cycle ordered by `order_index`
    fn sorted_phases(cycle: &Cycle) -> Vec<&Phase> {
        let mut phases: Vec<&Phase> = cycle.phases.iter().collect();
        phases.sort_by_key(|p| p.order_index);
        phases
    }

    /// Every workout in schedule order with its date
    pub fn schedule(&self) -> Vec<ScheduledWorkout<'_>> {
        let mut out = Vec::new();
        for cycle in &self.cycles {
            for phase in Self::sorted_phases(cycle) {
                let mut workouts: Vec<&Workout> = phase.workouts.iter().collect();
                workouts.sort_by_key(|w| w.order_index);
                for workout in workouts {
                    let index = out.len();
                    out.push(ScheduledWorkout {
                        index,
                        date: workout_date(self.start_date, index),
                        cycle,
                        phase,
                        workout,
                    });
                }
            }
        }
        out
    }

    pub fn workout_for_date(&self, date: NaiveDate) -> Option<ScheduledWorkout<'_>> {
        let index = workout_index_for_date(self.start_date, date)?;
        self.schedule().into_iter().nth(index)
    }

    /// Phase covering a date. A phase's colour lasts until its last workout
    /// day; the next phase starts the following day. Empty phases are skipped.
    pub fn phase_for_date(&self, date: NaiveDate) -> Option<PhaseMatch<'_>> {
        let diff = (date - self.start_date).num_days();
        if diff < 0 {
            return None;
        }

        let mut counter = 0;
        for cycle in &self.cycles {
            for phase in Self::sorted_phases(cycle) {
                if phase.workouts.is_empty() {
                    continue;
                }
                let last = workout_date(self.start_date, counter + phase.workouts.len() - 1);
                if diff <= (last - self.start_date).num_days() {
                    return Some(PhaseMatch {
                        cycle,
                        phase,
                        color: phase.color.as_deref().or(cycle.color.as_deref()),
                    });
                }
                counter += phase.workouts.len();
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 6).unwrap()
    }

    fn day(offset: i64) -> NaiveDate {
        monday() + Duration::days(offset)
    }

    fn create_workout(id: &str, order_index: i32) -> Workout {
        Workout { id: id.to_string(), title: id.to_string(), order_index, blocks: vec![] }
    }

    fn create_phase(id: &str, order_index: i32, color: Option<&str>, workouts: usize) -> Phase {
        Phase {
            id: id.to_string(),
            title: id.to_string(),
            order_index,
            color: color.map(str::to_string),
            workouts: (0..workouts)
                .map(|i| create_workout(&format!("{}-w{}", id, i), i as i32))
                .collect(),
        }
    }

    fn create_program() -> Program {
        Program {
            id: "p".to_string(),
            title: "Базовый".to_string(),
            start_date: monday(),
            is_active: true,
            cycles: vec![Cycle {
                id: "c1".to_string(),
                title: "Цикл 1".to_string(),
                color: Some("#111".to_string()),
                order_index: 1,
                // stored out of order on purpose
                phases: vec![
                    create_phase("ph2", 2, None, 3),
                    create_phase("empty", 3, Some("#999"), 0),
                    create_phase("ph1", 1, Some("#f00"), 3),
                ],
            }],
        }
    }

    #[test]
    fn test_workout_date() {
        assert_eq!(workout_date(monday(), 0), day(0));
        assert_eq!(workout_date(monday(), 1), day(2));
        assert_eq!(workout_date(monday(), 2), day(4));
        assert_eq!(workout_date(monday(), 3), day(7));
        assert_eq!(workout_date(monday(), 5), day(11));
    }

    #[test]
    fn test_workout_index_for_date() {
        assert_eq!(workout_index_for_date(monday(), day(0)), Some(0));
        assert_eq!(workout_index_for_date(monday(), day(4)), Some(2));
        assert_eq!(workout_index_for_date(monday(), day(9)), Some(4));
        assert_eq!(workout_index_for_date(monday(), day(1)), None);
        assert_eq!(workout_index_for_date(monday(), day(6)), None);
        assert_eq!(workout_index_for_date(monday(), day(-2)), None);
    }

    #[test]
    fn test_index_date_inverse() {
        for i in 0..30 {
            assert_eq!(workout_index_for_date(monday(), workout_date(monday(), i)), Some(i));
        }
    }

    #[test]
    fn test_week_label() {
        assert_eq!(week_label(monday(), day(-1)), "До начала");
        assert_eq!(week_label(monday(), day(0)), "Неделя 1");
        assert_eq!(week_label(monday(), day(13)), "Неделя 2");
    }

    #[test]
    fn test_format_training_date() {
        assert_eq!(format_training_date(monday()), "6 января, понедельник");
        assert_eq!(format_training_date(day(4)), "10 января, пятница");
    }

    #[test]
    fn test_phase_for_date() {
        let program = create_program();

        let first = program.phase_for_date(day(0)).unwrap();
        assert_eq!(first.phase.id, "ph1");
        assert_eq!(first.color, Some("#f00"));

        // Saturday after the last ph1 workout (Fri) already belongs to ph2
        let second = program.phase_for_date(day(5)).unwrap();
        assert_eq!(second.phase.id, "ph2");
        assert_eq!(second.color, Some("#111"));

        assert_eq!(program.phase_for_date(day(11)).unwrap().phase.id, "ph2");
        assert!(program.phase_for_date(day(12)).is_none());
        assert!(program.phase_for_date(day(-1)).is_none());
    }

    #[test]
    fn test_schedule_and_workout_for_date() {
        let program = create_program();
        let schedule = program.schedule();
        assert_eq!(schedule.len(), 6);
        assert_eq!(schedule[0].workout.id, "ph1-w0");
        assert_eq!(schedule[3].phase.id, "ph2");
        assert_eq!(schedule[3].date, day(7));

        let wed = program.workout_for_date(day(9)).unwrap();
        assert_eq!(wed.workout.id, "ph2-w1");
        assert!(program.workout_for_date(day(8)).is_none());
        assert!(program.workout_for_date(day(14)).is_none());
    }

    #[test]
    fn test_program_json() {
        let json = r#"{
            "id": "p", "title": "T", "start_date": "2025-01-06",
            "cycles": [{ "id": "c", "title": "C", "order_index": 1,
                "phases": [{ "id": "ph", "title": "P", "order_index": 1,
                    "workouts": [{ "id": "w", "title": "W", "order_index": 1,
                        "blocks": [{ "id": "b", "title": "15 min", "order_index": 1,
                            "rows": [{ "id": "r", "prefix": "A1", "content": "Подтягивания 5х5", "order_index": 1 }]
                        }]
                    }]
                }]
            }]
        }"#;
        let program: Program = serde_json::from_str(json).unwrap();
        let workout = program.workout_for_date(monday()).unwrap();
        assert_eq!(workout.workout.blocks[0].rows[0].prefix.as_deref(), Some("A1"));
    }

    #[test]
    fn test_smart_cycle_layout() {
        let cycle = smart_cycle("Цикл 1", 1, Some("#0ea5e9"));
        assert_eq!(cycle.phases.len(), 4);
        assert_eq!(cycle.phases[3].title, "Фаза 4");

        let workout = &cycle.phases[0].workouts[0];
        assert_eq!(cycle.phases[0].workouts.len(), 4);
        assert_eq!(workout.title, "Тренировка 1");
        assert_eq!(workout.blocks.len(), 6);
        assert_eq!(workout.blocks[4].rows.len(), 5);
        assert_eq!(workout.blocks[4].rows[4].prefix.as_deref(), Some("E5"));
        assert_eq!(workout.blocks[5].order_index, 6);
        assert!(workout.blocks[0].rows[0].content.is_empty());
    }

    #[test]
    fn test_smart_cycle_schedules_sixteen_workouts() {
        let mut program = create_program();
        program.cycles = vec![smart_cycle("Цикл 1", 1, None)];
        let schedule = program.schedule();
        assert_eq!(schedule.len(), 16);
        assert_eq!(schedule[15].date, workout_date(monday(), 15));
    }

    #[test]
    fn test_node_ids_prefixed() {
        assert!(new_node_id(ProgramNode::Program).starts_with("prg_"));
        assert_ne!(new_node_id(ProgramNode::Row), new_node_id(ProgramNode::Row));
    }
}
