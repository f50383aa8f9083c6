//! Date-scoped view of which habits are done
//!
//! The store owns the habit list and the completion set for exactly one
//! selected date. Loads replace both together. Every write, including the
//! optimistic flips issued by the toggle coordinator, takes the same write
//! lock once.
//!
//! Local writes are journaled per habit. A load for the date already shown
//! reapplies every write that is still in flight or that happened after the
//! load was issued, since the server listing may predate them.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::NaiveDate;
use habit_sync_client::{Habit, HabitId, HabitService, UserId};
use log::{debug, info, warn};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::streak::StreakCache;

/// Progress of the most recent load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Idle,
    Loading,
    Loaded,
    Failed,
}

/// What happened to the result of a load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The response replaced the store contents
    Applied,
    /// A newer load was started first; the response was dropped
    Superseded,
}

/// One row of the daily screen: a habit joined with its derived flags
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyHabitView {
    pub habit: Habit,
    pub completed: bool,
    pub current_streak: u32,
}

/// Last local write of one habit's membership
#[derive(Debug, Clone, Copy, Default)]
struct LocalWrite {
    seq: u64,
    completed: bool,
    in_flight: u32,
}

#[derive(Debug)]
struct DailyState {
    selected_date: Option<NaiveDate>,
    habits: Vec<Habit>,
    completed: HashSet<HabitId>,
    // Date the completion set belongs to; `None` once it has been discarded
    completed_date: Option<NaiveDate>,
    status: LoadStatus,
    generation: u64,
    cancel: Option<CancellationToken>,
    writes: HashMap<HabitId, LocalWrite>,
    write_seq: u64,
}

impl Default for DailyState {
    fn default() -> Self {
        Self {
            selected_date: None,
            habits: Vec::new(),
            completed: HashSet::new(),
            completed_date: None,
            status: LoadStatus::Idle,
            generation: 0,
            cancel: None,
            writes: HashMap::new(),
            write_seq: 0,
        }
    }
}

impl DailyState {
    fn loaded_for(&self, date: NaiveDate) -> bool {
        self.completed_date == Some(date) && self.selected_date == Some(date)
    }

    fn write(&mut self, habit_id: HabitId, completed: bool) -> &mut LocalWrite {
        if completed {
            self.completed.insert(habit_id);
        } else {
            self.completed.remove(&habit_id);
        }
        self.write_seq += 1;
        let entry = self.writes.entry(habit_id).or_default();
        entry.seq = self.write_seq;
        entry.completed = completed;
        entry
    }

    /// Replace the completion set with a listing for `date` fetched by a
    /// load issued when the journal stood at `issued_at`
    fn replace_completions(&mut self, date: NaiveDate, listed: Vec<HabitId>, issued_at: u64) {
        let mut completed: HashSet<HabitId> = listed.into_iter().collect();
        if self.completed_date == Some(date) {
            for (habit_id, write) in &self.writes {
                if write.in_flight == 0 && write.seq <= issued_at {
                    continue;
                }
                if !self.habits.iter().any(|h| h.id == *habit_id) {
                    continue;
                }
                debug!("keeping local write of habit {} over load for {}", habit_id, date);
                if write.completed {
                    completed.insert(*habit_id);
                } else {
                    completed.remove(habit_id);
                }
            }
            self.writes.retain(|_, w| w.in_flight > 0);
        } else {
            self.writes.clear();
        }
        self.completed = completed;
        self.completed_date = Some(date);
    }
}

/// Holds the habit list and completion set for the selected date
pub struct DailyCompletionStore {
    service: Arc<dyn HabitService>,
    state: RwLock<DailyState>,
}

impl DailyCompletionStore {
    pub fn new(service: Arc<dyn HabitService>) -> Self {
        Self {
            service,
            state: RwLock::new(DailyState::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, DailyState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn update<R>(&self, f: impl FnOnce(&mut DailyState) -> R) -> R {
        let mut guard: RwLockWriteGuard<'_, DailyState> =
            self.state.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Fetch the habit list and the completions for `date`, then replace
    /// both at once.
    ///
    /// Until the replacement happens the previous data stays readable. A
    /// failed load keeps it as well. If another load starts before this one
    /// finishes, this one is cancelled and reports [`LoadOutcome::Superseded`].
    pub async fn load(&self, user_id: UserId, date: NaiveDate) -> Result<LoadOutcome> {
        let (generation, cancel, issued_at) = self.update(|state| {
            if let Some(previous) = state.cancel.take() {
                previous.cancel();
            }
            state.generation = state.generation.wrapping_add(1);
            state.selected_date = Some(date);
            state.status = LoadStatus::Loading;
            let cancel = CancellationToken::new();
            state.cancel = Some(cancel.clone());
            (state.generation, cancel, state.write_seq)
        });
        debug!("load #{} started for user {} on {}", generation, user_id, date);

        let fetch = async {
            tokio::try_join!(
                self.service.list_habits_for_user(user_id),
                self.service.list_completions_for_date(user_id, date),
            )
        };
        let result = tokio::select! {
            _ = cancel.cancelled() => {
                warn!("load #{} for {} cancelled by a newer load", generation, date);
                return Ok(LoadOutcome::Superseded);
            }
            result = fetch => result,
        };

        self.update(|state| {
            if state.generation != generation || state.selected_date != Some(date) {
                warn!("dropping stale load #{} for {}", generation, date);
                return Ok(LoadOutcome::Superseded);
            }
            state.cancel = None;
            match result {
                Ok((habits, completions)) => {
                    info!(
                        "loaded {} habits, {} completed on {}",
                        habits.len(),
                        completions.len(),
                        date
                    );
                    state.habits = habits;
                    state.replace_completions(date, completions, issued_at);
                    state.status = LoadStatus::Loaded;
                    Ok(LoadOutcome::Applied)
                }
                Err(e) => {
                    warn!("load for {} failed, keeping previous data: {}", date, e);
                    state.status = LoadStatus::Failed;
                    Err(Error::from(e))
                }
            }
        })
    }

    /// Switch to `date`, discarding the current completion set, and load it.
    ///
    /// The habit list is not date-scoped and stays visible meanwhile.
    pub async fn change_date(&self, user_id: UserId, date: NaiveDate) -> Result<LoadOutcome> {
        self.update(|state| {
            if state.selected_date != Some(date) {
                info!("selected date {:?} -> {}", state.selected_date, date);
                state.selected_date = Some(date);
                state.completed.clear();
                state.completed_date = None;
                state.writes.clear();
            }
        });
        self.load(user_id, date).await
    }

    /// Membership test against the completion set of the selected date
    pub fn is_completed(&self, habit_id: HabitId) -> bool {
        let state = self.read();
        state.completed_date.is_some()
            && state.completed_date == state.selected_date
            && state.completed.contains(&habit_id)
    }

    pub fn selected_date(&self) -> Option<NaiveDate> {
        self.read().selected_date
    }

    pub fn status(&self) -> LoadStatus {
        self.read().status
    }

    pub fn is_loading(&self) -> bool {
        self.status() == LoadStatus::Loading
    }

    /// Habits in server order
    pub fn habits(&self) -> Vec<Habit> {
        self.read().habits.clone()
    }

    /// Completed habit ids for the selected date, ascending
    pub fn completed_ids(&self) -> Vec<HabitId> {
        let state = self.read();
        let mut ids: Vec<HabitId> = state.completed.iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Join the habit list with completion and cached streaks
    pub fn view(&self, streaks: &StreakCache) -> Vec<DailyHabitView> {
        let state = self.read();
        let loaded = state.completed_date.is_some() && state.completed_date == state.selected_date;
        state
            .habits
            .iter()
            .map(|habit| DailyHabitView {
                habit: habit.clone(),
                completed: loaded && state.completed.contains(&habit.id),
                current_streak: streaks.current_streak(habit.id),
            })
            .collect()
    }

    /// Flip membership of `habit_id` for `date` and return the state before
    /// the flip.
    pub(crate) fn flip(&self, date: NaiveDate, habit_id: HabitId) -> Result<bool> {
        self.update(|state| {
            if !state.loaded_for(date) {
                return Err(Error::NotLoaded);
            }
            if !state.habits.iter().any(|h| h.id == habit_id) {
                return Err(Error::UnknownHabit(habit_id));
            }
            let was_completed = state.completed.contains(&habit_id);
            state.write(habit_id, !was_completed).in_flight += 1;
            Ok(was_completed)
        })
    }

    /// Close one in-flight flip of `habit_id` on `date`, forcing membership
    /// to `restore` when given.
    ///
    /// Returns `false` without touching anything when `date` is no longer
    /// the loaded date.
    pub(crate) fn settle(&self, date: NaiveDate, habit_id: HabitId, restore: Option<bool>) -> bool {
        self.update(|state| {
            if !state.loaded_for(date) {
                return false;
            }
            let completed = restore.unwrap_or_else(|| state.completed.contains(&habit_id));
            let entry = state.write(habit_id, completed);
            entry.in_flight = entry.in_flight.saturating_sub(1);
            true
        })
    }

    /// Force membership of `habit_id` on `date`.
    ///
    /// Returns `false` without touching anything when `date` is no longer
    /// the loaded date.
    pub(crate) fn set_membership(&self, date: NaiveDate, habit_id: HabitId, completed: bool) -> bool {
        self.update(|state| {
            if !state.loaded_for(date) {
                return false;
            }
            state.write(habit_id, completed);
            true
        })
    }
}
