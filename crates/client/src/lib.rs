//! Client for the habit tracking HTTP service
//!
//! This crate binds the service's JSON endpoints to typed Rust calls. The
//! [`HabitService`] trait is the seam the sync engine depends on, so callers
//! can substitute an in-process fake for [`HabitClient`].

mod client;
pub mod error;
pub mod fetch;
pub mod models;

pub use client::{HabitClient, HabitService};
pub use error::{ClientError, Result};
pub use models::{
    format_date, parse_date, DailyHabit, Habit, HabitId, StreakInfo, User, UserId, DATE_FORMAT,
};
