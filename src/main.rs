//! Training BAZA - personal records, RPG stats and leaderboards

use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use tracing::info;

use training_baza::catalog::Catalog;
use training_baza::db::Database;
use training_baza::feed::FeedItem;
use training_baza::history::{HistoryItem, format_utc};
use training_baza::one_rep_max::{DEFAULT_STEP, Formula, percentage_table};
use training_baza::program::{self, NodeUpdate, Program, ProgramNode};
use training_baza::progression;
use training_baza::rating::{self, format_points};
use training_baza::sync::{CloudExport, CloudProfile};
use training_baza::time_format::{format_value, parse_value};
use training_baza::tui::App;
use training_baza::users::{self, BodyMeasurement, Role, User, UserUpdate};

/// Measurements listed in a profile
const MEASUREMENTS_SHOWN: usize = 5;

#[derive(Parser)]
#[command(name = "training-baza")]
#[command(author, version, about = "Training BAZA - personal records and leaderboards")]
struct Cli {
    /// SQLite database file
    #[arg(long, global = true, env = "BAZA_DB", default_value = "training_baza.db")]
    db: String,

    /// Directory with disciplines.json and standards.json (built-in catalog otherwise)
    #[arg(long, global = true, env = "BAZA_CATALOG")]
    catalog: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open TUI leaderboard
    Tui,

    /// Manage athletes
    Users {
        #[command(subcommand)]
        action: UsersAction,
    },

    /// Log a result
    Log {
        /// Discipline slug (e.g. "pullups", "run_1km")
        slug: String,

        /// Result value; MM:SS for runs
        value: String,

        /// Athlete the result belongs to (id or name), defaults to the acting user
        #[arg(long = "for")]
        target: Option<String>,

        /// Acting user (id or name)
        #[arg(long = "as")]
        actor: Option<String>,
    },

    /// Result history of an athlete
    History {
        user: String,

        /// Only this discipline
        #[arg(short, long)]
        slug: Option<String>,

        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Overall leaderboard, or standings in one discipline
    Ratings {
        slug: Option<String>,
    },

    /// Character sheet and standards of an athlete
    Profile {
        user: String,
    },

    /// Record body measurements
    Measure {
        user: String,

        #[arg(long)]
        weight: Option<f64>,
        #[arg(long)]
        height: Option<f64>,
        #[arg(long)]
        chest: Option<f64>,
        #[arg(long)]
        waist: Option<f64>,
        #[arg(long)]
        hips: Option<f64>,
        #[arg(long)]
        biceps: Option<f64>,
        #[arg(long)]
        shoulders: Option<f64>,
        #[arg(long)]
        glutes: Option<f64>,

        #[arg(long = "as")]
        actor: Option<String>,
    },

    /// One-rep-max estimate with working weights
    Orm {
        /// Weight lifted, kg
        weight: f64,

        /// Repetitions done
        reps: u32,

        #[arg(short, long, value_enum, default_value_t = Formula::Epley)]
        formula: Formula,

        /// Plate step for rounding, kg
        #[arg(short, long, default_value_t = DEFAULT_STEP)]
        step: f64,
    },

    /// Import profiles and results from a cloud export (JSON)
    Import {
        file: String,
    },

    /// Export profiles and results as JSON to stdout
    Export,

    /// Training programs; authoring needs an admin
    Program {
        /// Acting user (id or name)
        #[arg(long = "as", global = true)]
        actor: Option<String>,

        #[command(subcommand)]
        action: ProgramAction,
    },

    /// Activity feed: achievements and notes
    Feed {
        #[command(subcommand)]
        action: FeedAction,
    },

    /// Start Telegram bot
    Bot {
        /// Telegram bot token (or set TELOXIDE_TOKEN env var)
        #[arg(short, long, env = "TELOXIDE_TOKEN")]
        token: String,
    },
}

#[derive(Subcommand)]
enum UsersAction {
    /// List athletes
    List,

    /// Add an athlete (admin only)
    Add {
        name: String,

        #[arg(long)]
        admin: bool,

        #[arg(long = "as")]
        actor: Option<String>,
    },

    /// Rename an athlete
    Rename {
        user: String,
        name: String,

        #[arg(long = "as")]
        actor: Option<String>,
    },

    /// Set an avatar: one of the emoji options or a data:image URL
    Avatar {
        user: String,
        avatar: String,

        #[arg(long = "as")]
        actor: Option<String>,
    },

    /// Remove an athlete with all results (admin only)
    Remove {
        user: String,

        #[arg(long = "as")]
        actor: Option<String>,
    },
}

#[derive(Subcommand)]
enum ProgramAction {
    /// Workout for a date from the active program or a JSON file
    Show {
        /// Program JSON file instead of the active program
        #[arg(short, long)]
        file: Option<String>,

        /// Date (YYYY-MM-DD), today by default
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },

    /// List programs
    List,

    /// Print a program tree with node ids (active program by default)
    Tree {
        id: Option<String>,
    },

    /// Create an empty program
    Create {
        title: String,

        /// First training day (YYYY-MM-DD)
        start_date: NaiveDate,

        #[arg(long)]
        activate: bool,
    },

    /// Load a program tree from JSON, replacing one with the same id
    Import {
        file: String,
    },

    /// Make a program the active one
    Activate {
        id: String,
    },

    /// Add a cycle to a program
    AddCycle {
        program_id: String,
        title: String,

        #[arg(long)]
        order: Option<i32>,

        #[arg(long)]
        color: Option<String>,

        /// Fill with 4 phases of 4 workouts and the standard blocks
        #[arg(long)]
        smart: bool,
    },

    AddPhase {
        cycle_id: String,
        title: String,

        #[arg(long)]
        order: Option<i32>,
    },

    AddWorkout {
        phase_id: String,
        title: String,

        #[arg(long)]
        order: Option<i32>,
    },

    AddBlock {
        workout_id: String,

        /// e.g. "15 min"
        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        order: Option<i32>,
    },

    AddRow {
        block_id: String,
        content: String,

        /// e.g. "A1"
        #[arg(long)]
        prefix: Option<String>,

        #[arg(long)]
        order: Option<i32>,
    },

    /// Edit fields of a node
    Update {
        #[arg(value_enum)]
        node: ProgramNode,
        id: String,

        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        content: Option<String>,
        #[arg(long)]
        prefix: Option<String>,
        #[arg(long)]
        order: Option<i32>,
        #[arg(long)]
        start_date: Option<NaiveDate>,
    },

    /// Delete a node with everything under it
    Delete {
        #[arg(value_enum)]
        node: ProgramNode,
        id: String,
    },
}

#[derive(Subcommand)]
enum FeedAction {
    /// Latest posts, newest first
    List {
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Post a note, or an achievement when --video is given
    Post {
        title: String,

        #[arg(long)]
        text: Option<String>,

        /// Discipline slug of the achievement
        #[arg(long)]
        slug: Option<String>,

        /// Achieved value; MM:SS for runs
        #[arg(long)]
        value: Option<String>,

        /// Video link
        #[arg(long)]
        video: Option<String>,

        /// Athlete the post is about, defaults to the acting user
        #[arg(long = "for")]
        target: Option<String>,

        #[arg(long = "as")]
        actor: Option<String>,
    },
}

fn load_catalog(dir: Option<&str>) -> Result<Catalog> {
    match dir {
        Some(dir) => Catalog::load_dir(dir),
        None => Catalog::builtin(),
    }
}

/// Acting user: `--as` if given, otherwise the first admin of the local database
fn resolve_actor(db: &Database, actor: Option<&str>) -> Result<User> {
    match actor {
        Some(key) => db.find_user(key)?.with_context(|| format!("Unknown user: {}", key)),
        None => db
            .ensure_admin()?
            .into_iter()
            .find(User::is_admin)
            .context("No admin in database, pass --as"),
    }
}

fn resolve_user(db: &Database, key: &str) -> Result<User> {
    db.find_user(key)?.with_context(|| format!("Unknown user: {}", key))
}

fn require_admin(db: &Database, actor: Option<&str>) -> Result<User> {
    let actor = resolve_actor(db, actor)?;
    if !users::is_admin(Some(&actor)) {
        bail!("Only an admin can edit programs ({} is not)", actor.display_name());
    }
    Ok(actor)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let catalog = load_catalog(cli.catalog.as_deref())?;

    let db = Database::open(&cli.db)?;

    match cli.command {
        None | Some(Commands::Tui) => {
            db.ensure_admin()?;
            let mut app = App::new(db, catalog)?;
            app.run()?;
        }

        Some(Commands::Users { action }) => run_users(&db, action)?,

        Some(Commands::Log { slug, value, target, actor }) => {
            let discipline = catalog
                .find(&slug)
                .with_context(|| format!("Unknown discipline: {}", slug))?;
            let actor = resolve_actor(&db, actor.as_deref())?;
            let target = match target {
                Some(key) => resolve_user(&db, &key)?,
                None => actor.clone(),
            };
            if !users::can_add_results_for(Some(&actor), &target.id) {
                bail!("{} cannot log results for {}", actor.display_name(), target.display_name());
            }

            let Some(value) = parse_value(&value, &discipline.unit, discipline.direction) else {
                bail!("Invalid value for {}: {}", discipline.name, value);
            };
            let id = db.add_result(&target.id, &discipline.slug, &HistoryItem::now(value))?;
            println!(
                "Logged: {} - {} for {} (id: {})",
                discipline.name,
                format_value(value, &discipline.unit, discipline.direction),
                target.display_name(),
                id
            );

            let lookup = catalog.standards.lookup(&discipline.slug, value);
            if let Some(level) = lookup.level {
                println!("Норматив: {} (+{} очк.)", level.name, lookup.points);
            }
        }

        Some(Commands::History { user, slug, limit }) => {
            let user = resolve_user(&db, &user)?;
            let mut records = db.get_user_results(&user.id)?;
            if let Some(slug) = &slug {
                records.retain(|r| &r.discipline_slug == slug);
            }
            records.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));

            println!("History of {}:", user.display_name());
            println!("{:-<60}", "");
            for r in records.iter().take(limit) {
                let (name, value) = match catalog.find(&r.discipline_slug) {
                    Some(d) => (d.name.as_str(), format_value(r.value, &d.unit, d.direction)),
                    None => (r.discipline_slug.as_str(), r.value.to_string()),
                };
                println!("{} | {:24} | {}", format_utc(&r.recorded_at), name, value);
            }
        }

        Some(Commands::Ratings { slug }) => {
            let users = db.get_users()?;
            let history = db.get_history()?;

            match slug {
                Some(slug) => {
                    let discipline = catalog
                        .find(&slug)
                        .with_context(|| format!("Unknown discipline: {}", slug))?;
                    println!("{} {} {}", discipline.icon, discipline.name, discipline.direction.arrow());
                    println!("{:-<50}", "");
                    for r in rating::rank_discipline(discipline, &users, &history) {
                        let place = r.place.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string());
                        let value = r
                            .value
                            .map(|v| format_value(v, &discipline.unit, discipline.direction))
                            .unwrap_or_else(|| "-".to_string());
                        println!("{:>3} | {:20} | {:>10} | {}", place, r.user_name, value, format_points(r.points));
                    }
                }
                None => {
                    println!("Общий рейтинг");
                    println!("{:-<40}", "");
                    for r in rating::rank_overall(&catalog.disciplines, &users, &history) {
                        println!("{:>3} | {:20} | {}", r.place, r.user_name, format_points(r.points));
                    }
                }
            }
        }

        Some(Commands::Profile { user }) => {
            let user = resolve_user(&db, &user)?;
            let history = db.get_history()?;
            let by_slug = history.for_user(&user.id);
            let sheet = progression::character_sheet(&catalog, by_slug);

            println!("{} - уровень {} ({})", user.display_name(), sheet.level, sheet.rank.name);
            println!("{:-<50}", "");
            for s in &sheet.stats {
                if s.discipline_count == 0 {
                    println!("{} {:12} нет данных", s.stat.icon(), s.stat.name_ru());
                } else {
                    println!(
                        "{} {:12} {:>3} {}",
                        s.stat.icon(),
                        s.stat.name_ru(),
                        s.level,
                        progression::progress_bar(s.progress as f64, 20)
                    );
                }
            }

            println!();
            for a in progression::discipline_achievements(&catalog.disciplines, &catalog.standards, by_slug) {
                let Some(value) = a.value else { continue };
                let d = a.discipline;
                let level = a.level.map(|l| l.name.as_str()).unwrap_or("-");
                let next = a
                    .next_level
                    .map(|n| format!("{:.0}% до «{}»", a.progress, n.name))
                    .unwrap_or_default();
                println!(
                    "{} {:24} {:>10} | {:12} {}",
                    d.icon,
                    d.name,
                    format_value(value, &d.unit, d.direction),
                    level,
                    next
                );
            }

            let measurements = user.measurement_history(MEASUREMENTS_SHOWN);
            if let Some(m) = measurements.first() {
                println!();
                println!("Замеры от {}:", format_utc(&m.timestamp));
                for (field, value) in m.fields() {
                    println!("  {}: {}", field, value);
                }
            }
            if let Some(weight) = weight_trend(&measurements) {
                println!("  вес по замерам: {}", weight);
            }
        }

        Some(Commands::Measure { user, weight, height, chest, waist, hips, biceps, shoulders, glutes, actor }) => {
            let actor = resolve_actor(&db, actor.as_deref())?;
            let user = resolve_user(&db, &user)?;
            if !users::can_edit_user(Some(&actor), &user.id) {
                bail!("{} cannot edit {}", actor.display_name(), user.display_name());
            }
            let m = BodyMeasurement {
                weight,
                height,
                chest,
                waist,
                hips,
                biceps,
                shoulders,
                glutes,
                timestamp: chrono::Utc::now(),
            };
            if m.fields().is_empty() {
                bail!("Nothing to record, pass at least one measurement");
            }
            db.add_measurement(&user.id, &m)?;
            println!("Measurements saved for {}", user.display_name());
        }

        Some(Commands::Orm { weight, reps, formula, step }) => {
            let one_rm = formula.estimate(weight, reps);
            println!("1RM ({:?}): {:.1} кг", formula, one_rm);
            println!("{:-<30}", "");
            for row in percentage_table(one_rm, step) {
                println!("{:>3}% | {:>6.1} | {:>6.1}", row.percent, row.weight, row.rounded_weight);
            }
        }

        Some(Commands::Import { file }) => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file))?;
            let export: CloudExport = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", file))?;

            let created = db.import_profiles(&export.profiles)?;
            let added = db.import_results(&export.results)?;
            info!("Imported {} from {}", export.results.len(), file);
            println!("Imported: {} new users, {} new results", created, added);
        }

        Some(Commands::Export) => {
            let export = CloudExport {
                profiles: db.get_users()?.iter().map(CloudProfile::from).collect(),
                results: db.get_results()?,
            };
            println!("{}", serde_json::to_string_pretty(&export)?);
        }

        Some(Commands::Program { actor, action }) => run_program(&db, actor.as_deref(), action)?,

        Some(Commands::Feed { action }) => run_feed(&db, &catalog, action)?,

        Some(Commands::Bot { token }) => {
            // the bot keeps its own shared connection
            drop(db);
            println!("Starting Telegram bot...");
            println!("База данных: {}", cli.db);
            training_baza::bot::run_bot(token, &cli.db, catalog).await?;
        }
    }

    Ok(())
}

fn run_users(db: &Database, action: UsersAction) -> Result<()> {
    match action {
        UsersAction::List => {
            let users = db.ensure_admin()?;
            println!("Athletes:");
            println!("{:-<50}", "");
            for u in &users {
                println!(
                    "{:16} | {:20} | {}",
                    u.id,
                    u.display_name(),
                    u.role.as_str()
                );
            }
        }

        UsersAction::Add { name, admin, actor } => {
            let actor = resolve_actor(db, actor.as_deref())?;
            if !actor.is_admin() {
                bail!("Only an admin can add athletes");
            }
            let role = if admin { Role::Admin } else { Role::User };
            let user = User::new(&name, role);
            db.add_user(&user)?;
            println!("Added: {} (id: {})", user.display_name(), user.id);
        }

        UsersAction::Rename { user, name, actor } => {
            let actor = resolve_actor(db, actor.as_deref())?;
            let user = resolve_user(db, &user)?;
            if !users::can_edit_user(Some(&actor), &user.id) {
                bail!("{} cannot edit {}", actor.display_name(), user.display_name());
            }
            let update = UserUpdate { name: Some(name), ..Default::default() };
            db.update_user(&user.id, &update)?;
            println!("Renamed {}", user.id);
        }

        UsersAction::Avatar { user, avatar, actor } => {
            let actor = resolve_actor(db, actor.as_deref())?;
            let user = resolve_user(db, &user)?;
            if !users::can_edit_user(Some(&actor), &user.id) {
                bail!("{} cannot edit {}", actor.display_name(), user.display_name());
            }
            let update = users::avatar_update(&avatar)?;
            db.update_user(&user.id, &update)?;
            println!("Avatar updated for {}", user.display_name());
        }

        UsersAction::Remove { user, actor } => {
            let actor = resolve_actor(db, actor.as_deref())?;
            if !actor.is_admin() {
                bail!("Only an admin can remove athletes");
            }
            let user = resolve_user(db, &user)?;
            if db.delete_user(&user.id)? {
                println!("Removed {} with all results", user.display_name());
            }
        }
    }
    Ok(())
}

/// Weights of recent measurements, oldest to newest
fn weight_trend(measurements: &[&BodyMeasurement]) -> Option<String> {
    let weights: Vec<String> = measurements
        .iter()
        .rev()
        .filter_map(|m| m.weight)
        .map(|w| format!("{:.1}", w))
        .collect();
    (weights.len() > 1).then(|| weights.join(" → "))
}

fn print_workout_for_date(program: &Program, date: NaiveDate) {
    println!("{} - {}", program.title, program::week_label(program.start_date, date));
    if let Some(phase) = program.phase_for_date(date) {
        println!("{} / {}", phase.cycle.title, phase.phase.title);
    }
    println!("{:-<50}", "");

    match program.workout_for_date(date) {
        Some(scheduled) => {
            println!("{}: {}", program::format_training_date(scheduled.date), scheduled.workout.title);
            let mut blocks: Vec<_> = scheduled.workout.blocks.iter().collect();
            blocks.sort_by_key(|b| b.order_index);
            for block in blocks {
                if let Some(title) = &block.title {
                    println!("  [{}]", title);
                }
                let mut rows: Vec<_> = block.rows.iter().collect();
                rows.sort_by_key(|r| r.order_index);
                for row in rows {
                    println!("  {:4} {}", row.prefix.as_deref().unwrap_or(""), row.content);
                }
            }
        }
        None => println!("{}: отдых", program::format_training_date(date)),
    }
}

/// Tree as stored: children come back in order
fn print_program_tree(program: &Program) {
    let active = if program.is_active { " (active)" } else { "" };
    println!("{} [{}] from {}{}", program.title, program.id, program.start_date, active);
    for cycle in &program.cycles {
        println!("  {} [{}]", cycle.title, cycle.id);
        for phase in &cycle.phases {
            println!("    {} [{}]", phase.title, phase.id);
            for workout in &phase.workouts {
                println!("      {} [{}]", workout.title, workout.id);
                for block in &workout.blocks {
                    println!("        {} [{}]", block.title.as_deref().unwrap_or("-"), block.id);
                    for row in &block.rows {
                        println!(
                            "          {:4} {} [{}]",
                            row.prefix.as_deref().unwrap_or(""),
                            row.content,
                            row.id
                        );
                    }
                }
            }
        }
    }
}

fn read_program(file: &str) -> Result<Program> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", file))
}

fn order_or_next(db: &Database, order: Option<i32>, parent: ProgramNode, parent_id: &str) -> Result<i32> {
    match order {
        Some(order) => Ok(order),
        None => db.next_order_index(parent, parent_id),
    }
}

fn run_program(db: &Database, actor: Option<&str>, action: ProgramAction) -> Result<()> {
    match action {
        ProgramAction::Show { file, date } => {
            let program = match file {
                Some(file) => read_program(&file)?,
                None => db
                    .get_active_program()?
                    .context("No active program, pass --file or activate one")?,
            };
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            print_workout_for_date(&program, date);
        }

        ProgramAction::List => {
            println!("Programs:");
            println!("{:-<50}", "");
            for p in db.get_programs()? {
                let marker = if p.is_active { "*" } else { " " };
                println!("{} {:16} | {:24} | {}", marker, p.id, p.title, p.start_date);
            }
        }

        ProgramAction::Tree { id } => {
            let program = match id {
                Some(id) => db.get_program(&id)?.with_context(|| format!("Program not found: {}", id))?,
                None => db.get_active_program()?.context("No active program")?,
            };
            print_program_tree(&program);
        }

        ProgramAction::Create { title, start_date, activate } => {
            require_admin(db, actor)?;
            let program = db.create_program(&title, start_date)?;
            if activate {
                db.set_active_program(&program.id)?;
            }
            println!("Created: {} (id: {})", program.title, program.id);
        }

        ProgramAction::Import { file } => {
            require_admin(db, actor)?;
            let program = read_program(&file)?;
            db.save_program(&program)?;
            println!("Saved: {} (id: {})", program.title, program.id);
        }

        ProgramAction::Activate { id } => {
            require_admin(db, actor)?;
            if !db.set_active_program(&id)? {
                bail!("Program not found: {}", id);
            }
            println!("Active program: {}", id);
        }

        ProgramAction::AddCycle { program_id, title, order, color, smart } => {
            require_admin(db, actor)?;
            let order = order_or_next(db, order, ProgramNode::Program, &program_id)?;
            let cycle = if smart {
                db.create_smart_cycle(&program_id, &title, order, color.as_deref())?
            } else {
                db.create_cycle(&program_id, &title, order, color.as_deref())?
            };
            println!("Cycle added: {} (id: {})", cycle.title, cycle.id);
        }

        ProgramAction::AddPhase { cycle_id, title, order } => {
            require_admin(db, actor)?;
            let order = order_or_next(db, order, ProgramNode::Cycle, &cycle_id)?;
            let phase = db.create_phase(&cycle_id, &title, order)?;
            println!("Phase added: {} (id: {})", phase.title, phase.id);
        }

        ProgramAction::AddWorkout { phase_id, title, order } => {
            require_admin(db, actor)?;
            let order = order_or_next(db, order, ProgramNode::Phase, &phase_id)?;
            let workout = db.create_workout(&phase_id, &title, order)?;
            println!("Workout added: {} (id: {})", workout.title, workout.id);
        }

        ProgramAction::AddBlock { workout_id, title, order } => {
            require_admin(db, actor)?;
            let order = order_or_next(db, order, ProgramNode::Workout, &workout_id)?;
            let block = db.create_block(&workout_id, title.as_deref(), order)?;
            println!("Block added (id: {})", block.id);
        }

        ProgramAction::AddRow { block_id, content, prefix, order } => {
            require_admin(db, actor)?;
            let order = order_or_next(db, order, ProgramNode::Block, &block_id)?;
            let row = db.create_row(&block_id, &content, order, prefix.as_deref())?;
            println!("Row added (id: {})", row.id);
        }

        ProgramAction::Update { node, id, title, color, content, prefix, order, start_date } => {
            require_admin(db, actor)?;
            let update = NodeUpdate { title, color, content, prefix, order_index: order, start_date };
            if !db.update_node(node, &id, &update)? {
                bail!("{:?} not found: {}", node, id);
            }
            println!("Updated {}", id);
        }

        ProgramAction::Delete { node, id } => {
            require_admin(db, actor)?;
            if !db.delete_node(node, &id)? {
                bail!("{:?} not found: {}", node, id);
            }
            println!("Deleted {} with everything under it", id);
        }
    }
    Ok(())
}

fn run_feed(db: &Database, catalog: &Catalog, action: FeedAction) -> Result<()> {
    match action {
        FeedAction::List { limit } => {
            let names: std::collections::HashMap<String, String> = db
                .get_users()?
                .into_iter()
                .map(|u| (u.id.clone(), u.display_name()))
                .collect();

            for item in db.get_feed(limit)? {
                let author = names.get(&item.user_id).map(String::as_str).unwrap_or(&item.user_id);
                println!("{} | {} | {}", item.date, author, item.title);
                if let (Some(slug), Some(value)) = (&item.discipline_slug, item.value) {
                    let shown = match catalog.find(slug) {
                        Some(d) => format!("{} {}", d.name, format_value(value, &d.unit, d.direction)),
                        None => format!("{} {}", slug, value),
                    };
                    println!("    {}", shown);
                }
                if let Some(text) = &item.text {
                    println!("    {}", text);
                }
                if let Some(url) = &item.video_url {
                    println!("    {}", url);
                }
            }
        }

        FeedAction::Post { title, text, slug, value, video, target, actor } => {
            let actor = resolve_actor(db, actor.as_deref())?;
            let target = match target {
                Some(key) => resolve_user(db, &key)?,
                None => actor.clone(),
            };
            if !users::can_add_results_for(Some(&actor), &target.id) {
                bail!("{} cannot post for {}", actor.display_name(), target.display_name());
            }

            let item = match video {
                Some(video) => {
                    let (Some(slug), Some(value)) = (slug, value) else {
                        bail!("An achievement needs --slug and --value");
                    };
                    let discipline = catalog
                        .find(&slug)
                        .with_context(|| format!("Unknown discipline: {}", slug))?;
                    let Some(value) = parse_value(&value, &discipline.unit, discipline.direction) else {
                        bail!("Invalid value for {}: {}", discipline.name, value);
                    };
                    let mut item = FeedItem::achievement(&target.id, &title, &discipline.slug, value, &video);
                    item.text = text;
                    item
                }
                None => FeedItem::note(&target.id, &title, text),
            };
            db.add_feed_item(&item)?;
            println!("Posted: {} (id: {})", item.title, item.id);
        }
    }
    Ok(())
}
