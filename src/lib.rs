//! Training BAZA - personal records, RPG stats and leaderboards
//!
//! Results are graded against the coach's standards (levels, ranks,
//! character stats) and compared between athletes (ratings).

pub mod bot;
pub mod catalog;
pub mod db;
pub mod feed;
pub mod history;
pub mod one_rep_max;
pub mod program;
pub mod progression;
pub mod rating;
pub mod sync;
pub mod time_format;
pub mod tui;
pub mod users;

pub use catalog::Catalog;
pub use db::Database;
pub use history::{History, HistoryItem};
