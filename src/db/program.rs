//! Training program storage: programs -> cycles -> phases -> workouts -> blocks -> rows

use anyhow::{Result, bail};
use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter, types::{Type, Value}};
use tracing::info;

use super::{Database, format_ts};
use crate::program::{
    BlockRow, Cycle, NodeUpdate, Phase, Program, ProgramNode, Workout, WorkoutBlock,
    new_node_id, smart_cycle,
};

pub(super) const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS programs (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        start_date TEXT NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS cycles (
        id TEXT PRIMARY KEY,
        program_id TEXT NOT NULL,
        title TEXT NOT NULL,
        color TEXT,
        order_index INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS phases (
        id TEXT PRIMARY KEY,
        cycle_id TEXT NOT NULL,
        title TEXT NOT NULL,
        color TEXT,
        order_index INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS workouts (
        id TEXT PRIMARY KEY,
        phase_id TEXT NOT NULL,
        title TEXT NOT NULL,
        order_index INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS workout_blocks (
        id TEXT PRIMARY KEY,
        workout_id TEXT NOT NULL,
        title TEXT,
        order_index INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS block_rows (
        id TEXT PRIMARY KEY,
        block_id TEXT NOT NULL,
        prefix TEXT,
        content TEXT NOT NULL DEFAULT '',
        order_index INTEGER NOT NULL
    );";

fn table(node: ProgramNode) -> &'static str {
    match node {
        ProgramNode::Program => "programs",
        ProgramNode::Cycle => "cycles",
        ProgramNode::Phase => "phases",
        ProgramNode::Workout => "workouts",
        ProgramNode::Block => "workout_blocks",
        ProgramNode::Row => "block_rows",
    }
}

/// Child level and the child's column pointing at its parent
fn children(node: ProgramNode) -> Option<(ProgramNode, &'static str)> {
    match node {
        ProgramNode::Program => Some((ProgramNode::Cycle, "program_id")),
        ProgramNode::Cycle => Some((ProgramNode::Phase, "cycle_id")),
        ProgramNode::Phase => Some((ProgramNode::Workout, "phase_id")),
        ProgramNode::Workout => Some((ProgramNode::Block, "workout_id")),
        ProgramNode::Block => Some((ProgramNode::Row, "block_id")),
        ProgramNode::Row => None,
    }
}

fn editable_columns(node: ProgramNode) -> &'static [&'static str] {
    match node {
        ProgramNode::Program => &["title", "start_date"],
        ProgramNode::Cycle | ProgramNode::Phase => &["title", "color", "order_index"],
        ProgramNode::Workout | ProgramNode::Block => &["title", "order_index"],
        ProgramNode::Row => &["content", "prefix", "order_index"],
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn parse_date(idx: usize, s: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn program_from_row(row: &Row) -> rusqlite::Result<Program> {
    let start_date: String = row.get(2)?;
    Ok(Program {
        id: row.get(0)?,
        title: row.get(1)?,
        start_date: parse_date(2, &start_date)?,
        is_active: row.get(3)?,
        cycles: vec![],
    })
}

// === INSERTS (whole subtrees) ===

fn insert_cycle(conn: &Connection, program_id: &str, cycle: &Cycle) -> Result<()> {
    conn.execute(
        "INSERT INTO cycles (id, program_id, title, color, order_index) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![cycle.id, program_id, cycle.title, cycle.color, cycle.order_index],
    )?;
    for phase in &cycle.phases {
        insert_phase(conn, &cycle.id, phase)?;
    }
    Ok(())
}

fn insert_phase(conn: &Connection, cycle_id: &str, phase: &Phase) -> Result<()> {
    conn.execute(
        "INSERT INTO phases (id, cycle_id, title, color, order_index) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![phase.id, cycle_id, phase.title, phase.color, phase.order_index],
    )?;
    for workout in &phase.workouts {
        insert_workout(conn, &phase.id, workout)?;
    }
    Ok(())
}

fn insert_workout(conn: &Connection, phase_id: &str, workout: &Workout) -> Result<()> {
    conn.execute(
        "INSERT INTO workouts (id, phase_id, title, order_index) VALUES (?1, ?2, ?3, ?4)",
        params![workout.id, phase_id, workout.title, workout.order_index],
    )?;
    for block in &workout.blocks {
        insert_block(conn, &workout.id, block)?;
    }
    Ok(())
}

fn insert_block(conn: &Connection, workout_id: &str, block: &WorkoutBlock) -> Result<()> {
    conn.execute(
        "INSERT INTO workout_blocks (id, workout_id, title, order_index) VALUES (?1, ?2, ?3, ?4)",
        params![block.id, workout_id, block.title, block.order_index],
    )?;
    for row in &block.rows {
        insert_row(conn, &block.id, row)?;
    }
    Ok(())
}

fn insert_row(conn: &Connection, block_id: &str, row: &BlockRow) -> Result<()> {
    conn.execute(
        "INSERT INTO block_rows (id, block_id, prefix, content, order_index) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![row.id, block_id, row.prefix, row.content, row.order_index],
    )?;
    Ok(())
}

// === LOADS (ordered by order_index) ===

fn load_cycles(conn: &Connection, program_id: &str) -> Result<Vec<Cycle>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, color, order_index FROM cycles WHERE program_id = ?1 ORDER BY order_index, rowid"
    )?;
    let mut cycles = stmt
        .query_map(params![program_id], |row| {
            Ok(Cycle {
                id: row.get(0)?,
                title: row.get(1)?,
                color: row.get(2)?,
                order_index: row.get(3)?,
                phases: vec![],
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    for cycle in &mut cycles {
        cycle.phases = load_phases(conn, &cycle.id)?;
    }
    Ok(cycles)
}

fn load_phases(conn: &Connection, cycle_id: &str) -> Result<Vec<Phase>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, color, order_index FROM phases WHERE cycle_id = ?1 ORDER BY order_index, rowid"
    )?;
    let mut phases = stmt
        .query_map(params![cycle_id], |row| {
            Ok(Phase {
                id: row.get(0)?,
                title: row.get(1)?,
                color: row.get(2)?,
                order_index: row.get(3)?,
                workouts: vec![],
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    for phase in &mut phases {
        phase.workouts = load_workouts(conn, &phase.id)?;
    }
    Ok(phases)
}

fn load_workouts(conn: &Connection, phase_id: &str) -> Result<Vec<Workout>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, order_index FROM workouts WHERE phase_id = ?1 ORDER BY order_index, rowid"
    )?;
    let mut workouts = stmt
        .query_map(params![phase_id], |row| {
            Ok(Workout {
                id: row.get(0)?,
                title: row.get(1)?,
                order_index: row.get(2)?,
                blocks: vec![],
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    for workout in &mut workouts {
        workout.blocks = load_blocks(conn, &workout.id)?;
    }
    Ok(workouts)
}

fn load_blocks(conn: &Connection, workout_id: &str) -> Result<Vec<WorkoutBlock>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, order_index FROM workout_blocks WHERE workout_id = ?1 ORDER BY order_index, rowid"
    )?;
    let mut blocks = stmt
        .query_map(params![workout_id], |row| {
            Ok(WorkoutBlock {
                id: row.get(0)?,
                title: row.get(1)?,
                order_index: row.get(2)?,
                rows: vec![],
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut rows_stmt = conn.prepare(
        "SELECT id, prefix, content, order_index FROM block_rows WHERE block_id = ?1 ORDER BY order_index, rowid"
    )?;
    for block in &mut blocks {
        block.rows = rows_stmt
            .query_map(params![block.id], |row| {
                Ok(BlockRow {
                    id: row.get(0)?,
                    prefix: row.get(1)?,
                    content: row.get(2)?,
                    order_index: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
    }
    Ok(blocks)
}

/// Delete a node and everything below it. Returns rows removed at the node's level.
fn delete_subtree(conn: &Connection, node: ProgramNode, id: &str) -> Result<usize> {
    if let Some((child, parent_column)) = children(node) {
        let sql = format!("SELECT id FROM {} WHERE {} = ?1", table(child), parent_column);
        let mut stmt = conn.prepare(&sql)?;
        let child_ids = stmt
            .query_map(params![id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        for child_id in child_ids {
            delete_subtree(conn, child, &child_id)?;
        }
    }
    let sql = format!("DELETE FROM {} WHERE id = ?1", table(node));
    Ok(conn.execute(&sql, params![id])?)
}

impl Database {
    fn node_exists(&self, node: ProgramNode, id: &str) -> Result<bool> {
        let sql = format!("SELECT 1 FROM {} WHERE id = ?1", table(node));
        let found = self.conn
            .query_row(&sql, params![id], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    fn ensure_parent(&self, node: ProgramNode, id: &str) -> Result<()> {
        if !self.node_exists(node, id)? {
            bail!("{:?} not found: {}", node, id);
        }
        Ok(())
    }

    /// Next free `order_index` among the children of `parent_id`
    pub fn next_order_index(&self, parent: ProgramNode, parent_id: &str) -> Result<i32> {
        let Some((child, parent_column)) = children(parent) else {
            bail!("{:?} has no children", parent);
        };
        let sql = format!(
            "SELECT COALESCE(MAX(order_index), 0) + 1 FROM {} WHERE {} = ?1",
            table(child),
            parent_column
        );
        Ok(self.conn.query_row(&sql, params![parent_id], |row| row.get(0))?)
    }

    // === PROGRAMS ===

    pub fn create_program(&self, title: &str, start_date: NaiveDate) -> Result<Program> {
        let program = Program {
            id: new_node_id(ProgramNode::Program),
            title: title.to_string(),
            start_date,
            is_active: false,
            cycles: vec![],
        };
        self.conn.execute(
            "INSERT INTO programs (id, title, start_date, is_active, created_at) VALUES (?1, ?2, ?3, 0, ?4)",
            params![program.id, program.title, format_date(start_date), format_ts(&Utc::now())],
        )?;
        info!("Program created: {} ({})", program.title, program.id);
        Ok(program)
    }

    /// Store a whole program tree, replacing a program with the same id
    pub fn save_program(&self, program: &Program) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        delete_subtree(&tx, ProgramNode::Program, &program.id)?;
        tx.execute(
            "INSERT INTO programs (id, title, start_date, is_active, created_at) VALUES (?1, ?2, ?3, 0, ?4)",
            params![program.id, program.title, format_date(program.start_date), format_ts(&Utc::now())],
        )?;
        for cycle in &program.cycles {
            insert_cycle(&tx, &program.id, cycle)?;
        }
        if program.is_active {
            tx.execute("UPDATE programs SET is_active = (id = ?1)", params![program.id])?;
        }
        tx.commit()?;

        info!("Program saved: {} ({} cycles)", program.title, program.cycles.len());
        Ok(())
    }

    /// All programs without their trees, newest first
    pub fn get_programs(&self) -> Result<Vec<Program>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, start_date, is_active FROM programs ORDER BY created_at DESC, rowid DESC"
        )?;
        let programs = stmt
            .query_map([], program_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(programs)
    }

    /// Program with its full tree
    pub fn get_program(&self, id: &str) -> Result<Option<Program>> {
        let program = self.conn
            .query_row(
                "SELECT id, title, start_date, is_active FROM programs WHERE id = ?1",
                params![id],
                program_from_row,
            )
            .optional()?;

        match program {
            Some(mut p) => {
                p.cycles = load_cycles(&self.conn, &p.id)?;
                Ok(Some(p))
            }
            None => Ok(None),
        }
    }

    pub fn get_active_program(&self) -> Result<Option<Program>> {
        let id: Option<String> = self.conn
            .query_row("SELECT id FROM programs WHERE is_active = 1 LIMIT 1", [], |row| row.get(0))
            .optional()?;
        match id {
            Some(id) => self.get_program(&id),
            None => Ok(None),
        }
    }

    /// Make one program active and every other inactive. False if it does not exist.
    pub fn set_active_program(&self, id: &str) -> Result<bool> {
        if !self.node_exists(ProgramNode::Program, id)? {
            return Ok(false);
        }
        self.conn.execute("UPDATE programs SET is_active = (id = ?1)", params![id])?;
        info!("Active program: {}", id);
        Ok(true)
    }

    // === TREE NODES ===

    pub fn create_cycle(&self, program_id: &str, title: &str, order_index: i32, color: Option<&str>) -> Result<Cycle> {
        self.ensure_parent(ProgramNode::Program, program_id)?;
        let cycle = Cycle {
            id: new_node_id(ProgramNode::Cycle),
            title: title.to_string(),
            color: color.map(str::to_string),
            order_index,
            phases: vec![],
        };
        insert_cycle(&self.conn, program_id, &cycle)?;
        Ok(cycle)
    }

    /// Cycle with 4 phases x 4 workouts and the standard blocks
    pub fn create_smart_cycle(&self, program_id: &str, title: &str, order_index: i32, color: Option<&str>) -> Result<Cycle> {
        self.ensure_parent(ProgramNode::Program, program_id)?;
        let cycle = smart_cycle(title, order_index, color);

        let tx = self.conn.unchecked_transaction()?;
        insert_cycle(&tx, program_id, &cycle)?;
        tx.commit()?;

        info!("Smart cycle created: {} in {}", cycle.title, program_id);
        Ok(cycle)
    }

    pub fn create_phase(&self, cycle_id: &str, title: &str, order_index: i32) -> Result<Phase> {
        self.ensure_parent(ProgramNode::Cycle, cycle_id)?;
        let phase = Phase {
            id: new_node_id(ProgramNode::Phase),
            title: title.to_string(),
            order_index,
            color: None,
            workouts: vec![],
        };
        insert_phase(&self.conn, cycle_id, &phase)?;
        Ok(phase)
    }

    pub fn create_workout(&self, phase_id: &str, title: &str, order_index: i32) -> Result<Workout> {
        self.ensure_parent(ProgramNode::Phase, phase_id)?;
        let workout = Workout {
            id: new_node_id(ProgramNode::Workout),
            title: title.to_string(),
            order_index,
            blocks: vec![],
        };
        insert_workout(&self.conn, phase_id, &workout)?;
        Ok(workout)
    }

    pub fn create_block(&self, workout_id: &str, title: Option<&str>, order_index: i32) -> Result<WorkoutBlock> {
        self.ensure_parent(ProgramNode::Workout, workout_id)?;
        let block = WorkoutBlock {
            id: new_node_id(ProgramNode::Block),
            title: title.map(str::to_string),
            order_index,
            rows: vec![],
        };
        insert_block(&self.conn, workout_id, &block)?;
        Ok(block)
    }

    pub fn create_row(&self, block_id: &str, content: &str, order_index: i32, prefix: Option<&str>) -> Result<BlockRow> {
        self.ensure_parent(ProgramNode::Block, block_id)?;
        let row = BlockRow {
            id: new_node_id(ProgramNode::Row),
            prefix: prefix.map(str::to_string),
            content: content.to_string(),
            order_index,
        };
        insert_row(&self.conn, block_id, &row)?;
        Ok(row)
    }

    /// Apply a partial edit. Returns false if the node does not exist.
    pub fn update_node(&self, node: ProgramNode, id: &str, update: &NodeUpdate) -> Result<bool> {
        if update.is_empty() {
            bail!("Nothing to update");
        }

        let mut sets: Vec<(&str, Value)> = Vec::new();
        if let Some(title) = &update.title {
            sets.push(("title", Value::Text(title.clone())));
        }
        if let Some(color) = &update.color {
            sets.push(("color", Value::Text(color.clone())));
        }
        if let Some(content) = &update.content {
            sets.push(("content", Value::Text(content.clone())));
        }
        if let Some(prefix) = &update.prefix {
            sets.push(("prefix", Value::Text(prefix.clone())));
        }
        if let Some(order_index) = update.order_index {
            sets.push(("order_index", Value::Integer(order_index as i64)));
        }
        if let Some(start_date) = update.start_date {
            sets.push(("start_date", Value::Text(format_date(start_date))));
        }

        let allowed = editable_columns(node);
        if let Some((column, _)) = sets.iter().find(|(c, _)| !allowed.contains(c)) {
            bail!("{:?} has no field {}", node, column);
        }

        let assignments: Vec<String> = sets
            .iter()
            .enumerate()
            .map(|(i, (column, _))| format!("{} = ?{}", column, i + 1))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?{}",
            table(node),
            assignments.join(", "),
            sets.len() + 1
        );

        let mut values: Vec<Value> = sets.into_iter().map(|(_, v)| v).collect();
        values.push(Value::Text(id.to_string()));
        let changed = self.conn.execute(&sql, params_from_iter(values))?;
        Ok(changed > 0)
    }

    /// Delete a node with its whole subtree. Returns false if it does not exist.
    pub fn delete_node(&self, node: ProgramNode, id: &str) -> Result<bool> {
        let tx = self.conn.unchecked_transaction()?;
        let deleted = delete_subtree(&tx, node, id)?;
        tx.commit()?;

        if deleted > 0 {
            info!("{:?} deleted: {}", node, id);
        }
        Ok(deleted > 0)
    }
}
