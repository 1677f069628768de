//! Telegram bot module - log results and check ratings from the chat

use std::sync::Arc;
use teloxide::{
    prelude::*,
    types::{Chat, InlineKeyboardButton, InlineKeyboardMarkup},
    utils::command::BotCommands,
    dispatching::dialogue::{InMemStorage, Dialogue},
};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::catalog::{Catalog, Discipline};
use crate::db::Database;
use crate::history::HistoryItem;
use crate::progression::{self, Achievement, CharacterSheet, LevelLookup};
use crate::rating::{self, DisciplineRow, OverallRow, format_points};
use crate::time_format::{format_value, parse_value, should_use_time_input};
use crate::users::{Role, User};

type MyDialogue = Dialogue<State, InMemStorage<State>>;
type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;
type SharedDb = Arc<Mutex<Database>>;

/// Rows shown by /rating
const RATING_LIMIT: usize = 10;

#[derive(Clone, Default)]
pub enum State {
    #[default]
    Start,
    /// Discipline picked, waiting for the result value
    WaitingForValue {
        slug: String,
    },
}

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Команды бота:")]
pub enum Command {
    #[command(description = "Начать работу")]
    Start,
    #[command(description = "Показать помощь")]
    Help,
    #[command(description = "Записать результат")]
    Log,
    #[command(description = "Общий рейтинг")]
    Rating,
    #[command(description = "Рейтинг по дисциплине: /top pullups")]
    Top(String),
    #[command(description = "Мои характеристики")]
    Stats,
}

/// Each chat is one athlete
fn chat_user_id(chat: &Chat) -> String {
    format!("tg_{}", chat.id)
}

/// Find the chat's user, registering it on first contact
fn ensure_chat_user(db: &Database, chat: &Chat) -> anyhow::Result<User> {
    let id = chat_user_id(chat);
    if let Some(user) = db.get_user(&id)? {
        return Ok(user);
    }
    let name = chat.first_name().unwrap_or("Атлет");
    let user = User::with_id(id, name, Role::User);
    db.add_user(&user)?;
    Ok(user)
}

/// Inline keyboard with all disciplines, two per row
fn make_disciplines_keyboard(catalog: &Catalog) -> InlineKeyboardMarkup {
    let buttons: Vec<Vec<InlineKeyboardButton>> = catalog
        .disciplines
        .chunks(2)
        .map(|chunk| {
            chunk.iter().map(|d| {
                let label = format!("{} {}", d.icon, d.name);
                InlineKeyboardButton::callback(label, format!("d:{}", d.slug))
            }).collect()
        })
        .collect();

    InlineKeyboardMarkup::new(buttons)
}

/// Start the Telegram bot
pub async fn run_bot(token: String, db_path: &str, catalog: Catalog) -> anyhow::Result<()> {
    let bot = Bot::new(token);
    let db: SharedDb = Arc::new(Mutex::new(Database::open(db_path)?));
    let catalog = Arc::new(catalog);

    info!("Bot started with {} disciplines", catalog.disciplines.len());

    let handler = dptree::entry()
        .enter_dialogue::<Update, InMemStorage<State>, State>()
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(
            Update::filter_message()
                .endpoint(handle_message),
        )
        .branch(
            Update::filter_callback_query()
                .endpoint(handle_callback),
        );

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![InMemStorage::<State>::new(), db, catalog])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    dialogue: MyDialogue,
    db: SharedDb,
    catalog: Arc<Catalog>,
) -> HandlerResult {
    match cmd {
        Command::Start => {
            let user = ensure_chat_user(&*db.lock().await, &msg.chat)?;
            info!("Chat {} registered as {}", msg.chat.id, user.id);

            let text = format!(
                "🏋️ Training BAZA\n\n\
                Привет, {}!\n\n\
                /log - записать результат\n\
                /rating - общий рейтинг\n\
                /top <дисциплина> - рейтинг по дисциплине\n\
                /stats - мои характеристики",
                user.display_name()
            );
            bot.send_message(msg.chat.id, text).await?;
        }

        Command::Help => {
            bot.send_message(msg.chat.id, Command::descriptions().to_string())
                .await?;
        }

        Command::Log => {
            dialogue.reset().await?;
            bot.send_message(msg.chat.id, "Выбери дисциплину:")
                .reply_markup(make_disciplines_keyboard(&catalog))
                .await?;
        }

        Command::Rating => {
            let text = {
                let db = db.lock().await;
                let users = db.get_users()?;
                let history = db.get_history()?;
                let rows = rating::rank_overall(&catalog.disciplines, &users, &history);
                format_overall(&rows, RATING_LIMIT)
            };
            bot.send_message(msg.chat.id, text).await?;
        }

        Command::Top(slug) => {
            let slug = slug.trim();
            let text = match catalog.find(slug) {
                Some(discipline) => {
                    let db = db.lock().await;
                    let users = db.get_users()?;
                    let history = db.get_history()?;
                    let rows = rating::rank_discipline(discipline, &users, &history);
                    format_standings(discipline, &rows)
                }
                None => {
                    let slugs: Vec<&str> = catalog.disciplines.iter().map(|d| d.slug.as_str()).collect();
                    format!("Неизвестная дисциплина «{}».\n\nДоступные: {}", slug, slugs.join(", "))
                }
            };
            bot.send_message(msg.chat.id, text).await?;
        }

        Command::Stats => {
            let text = {
                let db = db.lock().await;
                let user = ensure_chat_user(&db, &msg.chat)?;
                let history = db.get_history()?;
                let by_slug = history.for_user(&user.id);
                let sheet = progression::character_sheet(&catalog, by_slug);
                let achievements = progression::discipline_achievements(
                    &catalog.disciplines,
                    &catalog.standards,
                    by_slug,
                );
                format_sheet(&user, &sheet, &achievements)
            };
            bot.send_message(msg.chat.id, text).await?;
        }
    }

    Ok(())
}

async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    dialogue: MyDialogue,
    catalog: Arc<Catalog>,
) -> HandlerResult {
    if let Some(slug) = q.data.as_deref().and_then(|d| d.strip_prefix("d:"))
        && let Some(discipline) = catalog.find(slug)
    {
        dialogue.update(State::WaitingForValue { slug: slug.to_string() }).await?;

        let hint = if should_use_time_input(&discipline.unit, discipline.direction) {
            "в формате ММ:СС".to_string()
        } else {
            format!("в {}", discipline.unit)
        };
        let text = format!("{} {}\n\nТвой результат ({})?", discipline.icon, discipline.name, hint);

        if let Some(msg) = q.message {
            bot.edit_message_text(msg.chat().id, msg.id(), text).await?;
        }
    }

    bot.answer_callback_query(q.id).await?;
    Ok(())
}

async fn handle_message(
    bot: Bot,
    msg: Message,
    dialogue: MyDialogue,
    db: SharedDb,
    catalog: Arc<Catalog>,
) -> HandlerResult {
    let state = dialogue.get().await?.unwrap_or_default();

    match state {
        State::WaitingForValue { slug } => {
            let Some(discipline) = catalog.find(&slug) else {
                warn!("Discipline {} vanished from catalog", slug);
                dialogue.reset().await?;
                return Ok(());
            };
            let Some(text) = msg.text() else {
                return Ok(());
            };
            let Some(value) = parse_value(text, &discipline.unit, discipline.direction) else {
                bot.send_message(msg.chat.id, "Не понял число, попробуй ещё раз").await?;
                return Ok(());
            };

            let response = {
                let db = db.lock().await;
                let user = ensure_chat_user(&db, &msg.chat)?;
                db.add_result(&user.id, &discipline.slug, &HistoryItem::now(value))?;

                let users = db.get_users()?;
                let history = db.get_history()?;
                let rows = rating::rank_discipline(discipline, &users, &history);
                let place = rows.iter().find(|r| r.user_id == user.id).and_then(|r| r.place);
                let lookup = catalog.standards.lookup(&discipline.slug, value);
                format_logged(discipline, value, &lookup, place, users.len())
            };

            info!("Chat {} logged {} = {}", msg.chat.id, slug, value);
            bot.send_message(msg.chat.id, response).await?;
            dialogue.reset().await?;
        }

        State::Start => {
            bot.send_message(msg.chat.id, "Жми /log чтобы записать результат")
                .await?;
        }
    }

    Ok(())
}

fn medal(place: usize) -> &'static str {
    match place {
        1 => "🥇",
        2 => "🥈",
        3 => "🥉",
        _ => "  ",
    }
}

/// /rating message
pub fn format_overall(rows: &[OverallRow], limit: usize) -> String {
    if rows.is_empty() {
        return "Пока нет участников".to_string();
    }
    let mut text = format!("🏆 Общий рейтинг ({} участников)\n\n", rows.len());
    for r in rows.iter().take(limit) {
        text.push_str(&format!(
            "{} {}. {} - {}\n",
            medal(r.place),
            r.place,
            r.user_name,
            format_points(r.points)
        ));
    }
    text
}

/// /top message
pub fn format_standings(discipline: &Discipline, rows: &[DisciplineRow]) -> String {
    let mut text = format!("{} {} {}\n\n", discipline.icon, discipline.name, discipline.direction.arrow());
    let mut ranked = 0;
    for r in rows {
        if let (Some(place), Some(value)) = (r.place, r.value) {
            ranked += 1;
            text.push_str(&format!(
                "{} {}. {} - {} ({} очк.)\n",
                medal(place),
                place,
                r.user_name,
                format_value(value, &discipline.unit, discipline.direction),
                format_points(r.points)
            ));
        }
    }
    if ranked == 0 {
        text.push_str("Результатов пока нет. /log - будь первым!");
    }
    text
}

/// Reply after a result is saved
pub fn format_logged(
    discipline: &Discipline,
    value: f64,
    lookup: &LevelLookup<'_>,
    place: Option<usize>,
    total_users: usize,
) -> String {
    let mut text = format!(
        "Записано!\n\n{} {} - {}\n",
        discipline.icon,
        discipline.name,
        format_value(value, &discipline.unit, discipline.direction)
    );

    match (lookup.level, lookup.next_level) {
        (Some(level), Some(next)) if lookup.progress < 100.0 => text.push_str(&format!(
            "Норматив: {} ({:.0}% до «{}»)\n",
            level.name, lookup.progress, next.name
        )),
        (Some(level), _) => text.push_str(&format!("Норматив: {}\n", level.name)),
        (None, Some(next)) => text.push_str(&format!(
            "До норматива «{}»: {:.0}%\n",
            next.name, lookup.progress
        )),
        (None, None) => {}
    }

    if let Some(place) = place {
        text.push_str(&format!("Место: {} из {}\n", place, total_users));
    }
    text.push_str("\n/log - ещё");
    text
}

/// /stats message
pub fn format_sheet(user: &User, sheet: &CharacterSheet, achievements: &[Achievement<'_>]) -> String {
    let mut text = format!(
        "📈 {}\n\nУровень {} - {}\n\n",
        user.display_name(),
        sheet.level,
        sheet.rank.name
    );

    for s in &sheet.stats {
        if s.discipline_count == 0 {
            text.push_str(&format!("{} {}: нет данных\n", s.stat.icon(), s.stat.name_ru()));
        } else {
            text.push_str(&format!(
                "{} {}: {} {}\n",
                s.stat.icon(),
                s.stat.name_ru(),
                s.level,
                progression::progress_bar(s.progress as f64, 10)
            ));
        }
    }

    let filled: Vec<_> = achievements.iter().filter(|a| a.value.is_some()).collect();
    if !filled.is_empty() {
        text.push_str("\n🏅 Нормативы:\n");
        for a in filled {
            let level = a.level.map(|l| l.name.as_str()).unwrap_or("-");
            text.push_str(&format!("• {} - {}\n", a.discipline.name, level));
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistoryBySlug;

    fn catalog() -> Catalog {
        Catalog::builtin().unwrap()
    }

    fn create_overall_row(name: &str, points: f64, place: usize) -> OverallRow {
        OverallRow {
            user_id: name.to_string(),
            user_name: name.to_string(),
            points,
            place,
        }
    }

    #[test]
    fn test_format_overall() {
        let rows = vec![
            create_overall_row("Анна", 7.5, 1),
            create_overall_row("Борис", 7.5, 1),
            create_overall_row("Вера", 3.0, 3),
        ];
        let text = format_overall(&rows, 2);
        assert!(text.contains("3 участников"));
        assert!(text.contains("🥇 1. Анна - 7.5"));
        assert!(text.contains("🥇 1. Борис - 7.5"));
        assert!(!text.contains("Вера"));
    }

    #[test]
    fn test_format_overall_empty() {
        assert_eq!(format_overall(&[], 10), "Пока нет участников");
    }

    #[test]
    fn test_format_standings() {
        let catalog = catalog();
        let run = catalog.find("run_1km").unwrap();
        let rows = vec![
            DisciplineRow { user_id: "a".into(), user_name: "Анна".into(), value: Some(245.0), place: Some(1), points: 2.0 },
            DisciplineRow { user_id: "b".into(), user_name: "Борис".into(), value: None, place: None, points: 0.0 },
        ];
        let text = format_standings(run, &rows);
        assert!(text.contains("🥇 1. Анна - 04:05 (2 очк.)"), "{}", text);
        assert!(!text.contains("Борис"));
    }

    #[test]
    fn test_format_standings_empty() {
        let catalog = catalog();
        let text = format_standings(catalog.find("pullups").unwrap(), &[]);
        assert!(text.contains("Результатов пока нет"));
    }

    #[test]
    fn test_format_logged() {
        let catalog = catalog();
        let pullups = catalog.find("pullups").unwrap();
        let lookup = catalog.standards.lookup("pullups", 12.0);
        let text = format_logged(pullups, 12.0, &lookup, Some(2), 5);

        assert!(text.contains("Записано!"));
        assert!(text.contains("Норматив: Спортсмен (40% до «Продвинутый»)"), "{}", text);
        assert!(text.contains("Место: 2 из 5"));
    }

    #[test]
    fn test_format_logged_below_minimum() {
        let catalog = catalog();
        let plank = catalog.find("plank").unwrap();
        let lookup = catalog.standards.lookup("plank", 15.0);
        let text = format_logged(plank, 15.0, &lookup, None, 1);
        assert!(text.contains("До норматива «Новичок»: 50%"), "{}", text);
        assert!(!text.contains("Место"));
    }

    #[test]
    fn test_format_sheet_empty() {
        let catalog = catalog();
        let user = User::with_id("tg_1", "Ира", Role::User);
        let history = HistoryBySlug::new();
        let sheet = progression::character_sheet(&catalog, &history);
        let achievements = progression::discipline_achievements(&catalog.disciplines, &catalog.standards, &history);

        let text = format_sheet(&user, &sheet, &achievements);
        assert!(text.contains("Уровень 1 - Без уровня"));
        assert!(text.contains("нет данных"));
        assert!(!text.contains("Нормативы"));
    }
}
