//! Wire models for the habit service

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

pub type UserId = i64;
pub type HabitId = i64;

/// Calendar date format used in every `date=` query parameter
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A registered user. Assigned by the service and read-only for the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(rename = "name", default)]
    pub display_name: Option<String>,
}

/// A habit definition. Not scoped to any date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Habit {
    pub id: HabitId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// One entry of the per-date endpoint.
///
/// Older deployments only list completed habits and omit the flag, so a
/// missing `completed` reads as `true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyHabit {
    pub id: HabitId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_completed")]
    pub completed: bool,
}

fn default_completed() -> bool {
    true
}

/// Streak counters as computed by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakInfo {
    pub habit_id: HabitId,
    pub current_streak: u32,
    pub longest_streak: u32,
}

impl StreakInfo {
    /// Value shown for a habit with no cached entry
    pub fn empty(habit_id: HabitId) -> Self {
        Self {
            habit_id,
            current_streak: 0,
            longest_streak: 0,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct NewUser<'a> {
    pub name: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct NewHabit<'a> {
    pub title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| ClientError::invalid_response(format!("bad date '{}': {}", value, e)))
}
