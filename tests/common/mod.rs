#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use habit_sync::{ClientError, Habit, HabitId, HabitService, StreakInfo, User, UserId};
use habit_sync_client::Result;
use tokio::sync::oneshot;

pub fn june(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, day).unwrap()
}

pub fn rejected() -> ClientError {
    ClientError::ServerRejected {
        status: 500,
        message: "scripted failure".to_string(),
    }
}

#[derive(Default)]
struct Script {
    habits: Vec<Habit>,
    completions: HashMap<NaiveDate, Vec<HabitId>>,
    gates: HashMap<NaiveDate, oneshot::Receiver<()>>,
    streak_gates: HashMap<HabitId, oneshot::Receiver<()>>,
    streaks: HashMap<HabitId, u32>,
    fail_mark: bool,
    fail_unmark: bool,
    streak_calls: Vec<HabitId>,
    marked: HashSet<(HabitId, NaiveDate)>,
}

/// Service whose answers are set up by the test, with optional gates
/// holding back completion listings and streak answers until released.
///
/// Helper names follow the in-crate `FakeService`.
#[derive(Default)]
pub struct ScriptedService {
    script: Mutex<Script>,
}

impl ScriptedService {
    pub fn new(habits: &[(HabitId, &str)]) -> Self {
        let service = Self::default();
        service.set_habits(habits);
        service
    }

    pub fn set_habits(&self, habits: &[(HabitId, &str)]) {
        self.script.lock().unwrap().habits = habits
            .iter()
            .map(|&(id, title)| Habit {
                id,
                title: title.to_string(),
                description: None,
            })
            .collect();
    }

    pub fn set_completions(&self, date: NaiveDate, ids: &[HabitId]) {
        self.script
            .lock()
            .unwrap()
            .completions
            .insert(date, ids.to_vec());
    }

    /// Hold back the listing for `date` until the returned sender fires
    pub fn gate_listing(&self, date: NaiveDate) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.script.lock().unwrap().gates.insert(date, rx);
        tx
    }

    /// Hold back the next streak answer for `habit_id`. The value is read
    /// when the call arrives, not when it is released.
    pub fn gate_streak(&self, habit_id: HabitId) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.script.lock().unwrap().streak_gates.insert(habit_id, rx);
        tx
    }

    pub fn set_streak(&self, habit_id: HabitId, current: u32) {
        self.script.lock().unwrap().streaks.insert(habit_id, current);
    }

    pub fn fail_mark(&self, fail: bool) {
        self.script.lock().unwrap().fail_mark = fail;
    }

    pub fn fail_unmark(&self, fail: bool) {
        self.script.lock().unwrap().fail_unmark = fail;
    }

    pub fn streak_calls(&self) -> usize {
        self.script.lock().unwrap().streak_calls.len()
    }

    pub fn last_streak_call(&self) -> Option<HabitId> {
        self.script.lock().unwrap().streak_calls.last().copied()
    }
}

#[async_trait]
impl HabitService for ScriptedService {
    async fn create_user(&self, display_name: Option<&str>) -> Result<User> {
        Ok(User {
            id: 1,
            display_name: display_name.map(str::to_string),
        })
    }

    async fn get_user(&self, user_id: UserId) -> Result<User> {
        Ok(User {
            id: user_id,
            display_name: None,
        })
    }

    async fn create_habit(&self, _title: &str, _description: Option<&str>) -> Result<Habit> {
        Err(rejected())
    }

    async fn list_habits(&self) -> Result<Vec<Habit>> {
        Ok(self.script.lock().unwrap().habits.clone())
    }

    async fn list_habits_for_user(&self, _user_id: UserId) -> Result<Vec<Habit>> {
        Ok(self.script.lock().unwrap().habits.clone())
    }

    async fn list_completions_for_date(&self, _user_id: UserId, date: NaiveDate) -> Result<Vec<HabitId>> {
        let gate = self.script.lock().unwrap().gates.remove(&date);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        Ok(self
            .script
            .lock()
            .unwrap()
            .completions
            .get(&date)
            .cloned()
            .unwrap_or_default())
    }

    async fn mark_complete(&self, _user_id: UserId, habit_id: HabitId, date: NaiveDate) -> Result<bool> {
        let mut script = self.script.lock().unwrap();
        if script.fail_mark {
            return Err(rejected());
        }
        script.marked.insert((habit_id, date));
        Ok(true)
    }

    async fn unmark_complete(&self, _user_id: UserId, habit_id: HabitId, date: NaiveDate) -> Result<bool> {
        let mut script = self.script.lock().unwrap();
        if script.fail_unmark {
            return Err(rejected());
        }
        script.marked.remove(&(habit_id, date));
        Ok(true)
    }

    async fn get_streak(&self, _user_id: UserId, habit_id: HabitId) -> Result<StreakInfo> {
        let (current, gate) = {
            let mut script = self.script.lock().unwrap();
            script.streak_calls.push(habit_id);
            let current = script.streaks.get(&habit_id).copied().unwrap_or(0);
            (current, script.streak_gates.remove(&habit_id))
        };
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        Ok(StreakInfo {
            habit_id,
            current_streak: current,
            longest_streak: current,
        })
    }
}
