//! TUI module - leaderboard dashboard with ratatui

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
};
use std::io::{stdout, Stdout};

use crate::catalog::{Catalog, Discipline, Stat};
use crate::db::Database;
use crate::history::History;
use crate::progression;
use crate::rating::{self, format_points};
use crate::time_format::format_value;
use crate::users::User;

type Tui = Terminal<CrosstermBackend<Stdout>>;

/// Which table is on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Overall,
    Discipline(usize),
}

/// App state for TUI
pub struct App {
    db: Database,
    catalog: Catalog,
    users: Vec<User>,
    history: History,
    view: View,
    should_quit: bool,
}

impl App {
    pub fn new(db: Database, catalog: Catalog) -> Result<Self> {
        let users = db.get_users()?;
        let history = db.get_history()?;
        Ok(Self {
            db,
            catalog,
            users,
            history,
            view: View::Overall,
            should_quit: false,
        })
    }

    /// Run the TUI application
    pub fn run(&mut self) -> Result<()> {
        let mut terminal = init_terminal()?;

        while !self.should_quit {
            terminal.draw(|frame| self.render(frame))?;
            self.handle_events()?;
        }

        restore_terminal()?;
        Ok(())
    }

    fn reload(&mut self) -> Result<()> {
        self.users = self.db.get_users()?;
        self.history = self.db.get_history()?;
        Ok(())
    }

    /// Cycle Overall -> first discipline -> ... -> last -> Overall
    pub fn next_view(&mut self) {
        let count = self.catalog.disciplines.len();
        self.view = match self.view {
            View::Overall if count > 0 => View::Discipline(0),
            View::Discipline(i) if i + 1 < count => View::Discipline(i + 1),
            _ => View::Overall,
        };
    }

    pub fn prev_view(&mut self) {
        let count = self.catalog.disciplines.len();
        self.view = match self.view {
            View::Overall if count > 0 => View::Discipline(count - 1),
            View::Discipline(0) => View::Overall,
            View::Discipline(i) => View::Discipline(i - 1),
            View::Overall => View::Overall,
        };
    }

    pub fn view(&self) -> View {
        self.view
    }

    fn render(&self, frame: &mut Frame) {
        let area = frame.area();

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(10),
                Constraint::Length(3),
            ])
            .split(area);

        // Header
        let header = Paragraph::new(format!("🏆 Training BAZA - {} участников", self.users.len()))
            .style(Style::default().fg(Color::Cyan).bold())
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(header, chunks[0]);

        let table = match self.view {
            View::Overall => self.overall_table(),
            View::Discipline(i) => self.discipline_table(&self.catalog.disciplines[i]),
        };
        frame.render_widget(table, chunks[1]);

        // Footer
        let footer = Paragraph::new("q: quit | ←/→: discipline | r: refresh")
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(footer, chunks[2]);
    }

    fn overall_table(&self) -> Table<'static> {
        let rows: Vec<Row> = rating::rank_overall(&self.catalog.disciplines, &self.users, &self.history)
            .into_iter()
            .map(|r| {
                let sheet = progression::character_sheet(&self.catalog, self.history.for_user(&r.user_id));
                let mut cells = vec![
                    Cell::from(r.place.to_string()),
                    Cell::from(r.user_name),
                    Cell::from(format_points(r.points)),
                    Cell::from(format!("{} ({})", sheet.level, sheet.rank.name)),
                ];
                cells.extend(sheet.stats.iter().map(|s| {
                    if s.discipline_count == 0 {
                        Cell::from("-").style(Style::default().fg(Color::DarkGray))
                    } else {
                        Cell::from(s.level.to_string()).style(Style::default().fg(stat_color(s.stat)))
                    }
                }));
                Row::new(cells)
            })
            .collect();

        let mut widths = vec![
            Constraint::Length(6),
            Constraint::Min(20),
            Constraint::Length(10),
            Constraint::Length(24),
        ];
        widths.extend(Stat::all().iter().map(|_| Constraint::Length(6)));

        let mut header: Vec<Cell> = ["Место", "Атлет", "Очки", "Уровень"]
            .into_iter()
            .map(Cell::from)
            .collect();
        header.extend(Stat::all().iter().map(|s| {
            Cell::from(s.icon()).style(Style::default().fg(stat_color(*s)))
        }));

        Table::new(rows, widths)
            .header(Row::new(header).style(Style::default().bold()))
            .block(Block::default().borders(Borders::ALL).title("Общий рейтинг"))
    }

    fn discipline_table(&self, discipline: &Discipline) -> Table<'static> {
        let rows: Vec<Row> = rating::rank_discipline(discipline, &self.users, &self.history)
            .into_iter()
            .map(|r| {
                let (value, level) = match r.value {
                    Some(v) => {
                        let lookup = self.catalog.standards.lookup(&discipline.slug, v);
                        (
                            format_value(v, &discipline.unit, discipline.direction),
                            lookup.level.map(|l| l.name.clone()).unwrap_or_else(|| "-".to_string()),
                        )
                    }
                    None => ("-".to_string(), String::new()),
                };
                let style = if r.place.is_some() {
                    Style::default()
                } else {
                    Style::default().fg(Color::DarkGray)
                };
                Row::new(vec![
                    Cell::from(r.place.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string())),
                    Cell::from(r.user_name),
                    Cell::from(value),
                    Cell::from(format_points(r.points)),
                    Cell::from(level),
                ])
                .style(style)
            })
            .collect();

        let title = format!(
            "{} {} ({}, {})",
            discipline.icon,
            discipline.name,
            discipline.category,
            discipline.direction.arrow()
        );

        Table::new(
            rows,
            [
                Constraint::Length(6),
                Constraint::Min(20),
                Constraint::Length(12),
                Constraint::Length(8),
                Constraint::Length(14),
            ],
        )
        .header(Row::new(vec!["Место", "Атлет", "Результат", "Очки", "Норматив"])
            .style(Style::default().bold()))
        .block(Block::default().borders(Borders::ALL).title(title))
    }

    fn handle_events(&mut self) -> Result<()> {
        if event::poll(std::time::Duration::from_millis(100))?
            && let Event::Key(key) = event::read()?
                && key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') => self.should_quit = true,
                        KeyCode::Char('r') => self.reload()?,
                        KeyCode::Right | KeyCode::Tab => self.next_view(),
                        KeyCode::Left | KeyCode::BackTab => self.prev_view(),
                        _ => {}
                    }
                }
        Ok(())
    }
}

/// Stat colour for the terminal, white if the hex code does not parse
fn stat_color(stat: Stat) -> Color {
    stat.color().parse().unwrap_or(Color::White)
}

fn init_terminal() -> Result<Tui> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    Ok(terminal)
}

fn restore_terminal() -> Result<()> {
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    Ok(())
}
