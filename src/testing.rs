//! In-process stand-in for the habit service

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use habit_sync_client::{
    ClientError, Habit, HabitId, HabitService, Result, StreakInfo, User, UserId,
};

#[derive(Default)]
struct FakeState {
    habits: Vec<Habit>,
    completions: HashMap<NaiveDate, BTreeSet<HabitId>>,
    streaks: HashMap<HabitId, u32>,
    failing_streaks: HashSet<HabitId>,
    fail_listings: bool,
    fail_mutations: bool,
    refuse_mutations: bool,
    streak_calls: usize,
}

#[derive(Default)]
pub(crate) struct FakeService {
    state: Mutex<FakeState>,
}

fn rejected() -> ClientError {
    ClientError::ServerRejected {
        status: 500,
        message: "fake failure".to_string(),
    }
}

impl FakeService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_habits(&self, habits: &[(HabitId, &str)]) {
        self.state.lock().unwrap().habits = habits
            .iter()
            .map(|&(id, title)| Habit {
                id,
                title: title.to_string(),
                description: None,
            })
            .collect();
    }

    pub fn set_completions(&self, date: NaiveDate, ids: &[HabitId]) {
        self.state
            .lock()
            .unwrap()
            .completions
            .insert(date, ids.iter().copied().collect());
    }

    pub fn set_streak(&self, habit_id: HabitId, current: u32) {
        self.state.lock().unwrap().streaks.insert(habit_id, current);
    }

    pub fn fail_streak(&self, habit_id: HabitId, fail: bool) {
        let mut state = self.state.lock().unwrap();
        if fail {
            state.failing_streaks.insert(habit_id);
        } else {
            state.failing_streaks.remove(&habit_id);
        }
    }

    pub fn fail_listings(&self, fail: bool) {
        self.state.lock().unwrap().fail_listings = fail;
    }

    pub fn fail_mutations(&self, fail: bool) {
        self.state.lock().unwrap().fail_mutations = fail;
    }

    pub fn refuse_mutations(&self, refuse: bool) {
        self.state.lock().unwrap().refuse_mutations = refuse;
    }

    pub fn streak_calls(&self) -> usize {
        self.state.lock().unwrap().streak_calls
    }

    pub fn completed_on(&self, date: NaiveDate) -> Vec<HabitId> {
        self.state
            .lock()
            .unwrap()
            .completions
            .get(&date)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    fn mutate(&self, habit_id: HabitId, date: NaiveDate, complete: bool) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        if state.fail_mutations {
            return Err(rejected());
        }
        if state.refuse_mutations {
            return Ok(false);
        }
        let ids = state.completions.entry(date).or_default();
        if complete {
            ids.insert(habit_id);
        } else {
            ids.remove(&habit_id);
        }
        Ok(true)
    }
}

#[async_trait]
impl HabitService for FakeService {
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

    async fn create_habit(&self, title: &str, description: Option<&str>) -> Result<Habit> {
        let mut state = self.state.lock().unwrap();
        let habit = Habit {
            id: state.habits.iter().map(|h| h.id).max().unwrap_or(0) + 1,
            title: title.to_string(),
            description: description.map(str::to_string),
        };
        state.habits.push(habit.clone());
        Ok(habit)
    }

    async fn list_habits(&self) -> Result<Vec<Habit>> {
        Ok(self.state.lock().unwrap().habits.clone())
    }

    async fn list_habits_for_user(&self, _user_id: UserId) -> Result<Vec<Habit>> {
        let state = self.state.lock().unwrap();
        if state.fail_listings {
            return Err(rejected());
        }
        Ok(state.habits.clone())
    }

    async fn list_completions_for_date(&self, _user_id: UserId, date: NaiveDate) -> Result<Vec<HabitId>> {
        if self.state.lock().unwrap().fail_listings {
            return Err(rejected());
        }
        Ok(self.completed_on(date))
    }

    async fn mark_complete(&self, _user_id: UserId, habit_id: HabitId, date: NaiveDate) -> Result<bool> {
        self.mutate(habit_id, date, true)
    }

    async fn unmark_complete(&self, _user_id: UserId, habit_id: HabitId, date: NaiveDate) -> Result<bool> {
        self.mutate(habit_id, date, false)
    }

    async fn get_streak(&self, _user_id: UserId, habit_id: HabitId) -> Result<StreakInfo> {
        let mut state = self.state.lock().unwrap();
        state.streak_calls += 1;
        if state.failing_streaks.contains(&habit_id) {
            return Err(rejected());
        }
        let current = state.streaks.get(&habit_id).copied().unwrap_or(0);
        Ok(StreakInfo {
            habit_id,
            current_streak: current,
            longest_streak: current,
        })
    }
}
