//! Habit completion sync engine
//!
//! Keeps a local, date-scoped view of which habits are done consistent with
//! a remote habit service. Toggles are applied optimistically and rolled
//! back on failure, and the latest streak per habit is cached.
//!
//! The service is injected as an [`Arc<dyn HabitService>`], so tests can
//! swap the HTTP client for a fake.

pub mod config;
pub mod error;
pub mod store;
pub mod streak;
pub mod toggle;

#[cfg(test)]
mod testing;

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{Local, NaiveDate};
use log::info;

pub use habit_sync_client::{
    format_date, parse_date, ClientError, Habit, HabitClient, HabitId, HabitService, StreakInfo,
    User, UserId,
};

use crate::config::ClientOptions;
use crate::error::{Error, Result};
use crate::store::{DailyCompletionStore, DailyHabitView, LoadOutcome};
use crate::streak::StreakCache;
use crate::toggle::{PendingToggle, ToggleCoordinator, ToggleOutcome};

/// Session-level entry point tying the store, coordinator and streak cache
/// to one service and one signed-in user
pub struct HabitTracker {
    service: Arc<dyn HabitService>,
    store: Arc<DailyCompletionStore>,
    streaks: Arc<StreakCache>,
    toggles: ToggleCoordinator,
    user: RwLock<Option<User>>,
}

impl HabitTracker {
    /// Build a tracker around an explicit service
    pub fn new(service: Arc<dyn HabitService>) -> Self {
        let store = Arc::new(DailyCompletionStore::new(service.clone()));
        let streaks = Arc::new(StreakCache::new());
        let toggles = ToggleCoordinator::new(service.clone(), store.clone(), streaks.clone());
        Self {
            service,
            store,
            streaks,
            toggles,
            user: RwLock::new(None),
        }
    }

    /// Build a tracker talking HTTP to the service described by `options`
    ///
    /// # Example
    ///
    /// ```
    /// use habit_sync::{config::ClientOptions, HabitTracker};
    ///
    /// let options = ClientOptions::default().with_base_url("http://127.0.0.1:5000");
    /// let tracker = HabitTracker::with_options(&options).unwrap();
    /// assert!(tracker.current_user().is_none());
    /// ```
    pub fn with_options(options: &ClientOptions) -> Result<Self> {
        let client = HabitClient::new(&options.base_url, options.http_client()?)?;
        Ok(Self::new(Arc::new(client)))
    }

    pub fn store(&self) -> &DailyCompletionStore {
        &self.store
    }

    pub fn streaks(&self) -> &StreakCache {
        &self.streaks
    }

    pub fn toggles(&self) -> &ToggleCoordinator {
        &self.toggles
    }

    pub fn service(&self) -> &dyn HabitService {
        self.service.as_ref()
    }

    pub fn current_user(&self) -> Option<User> {
        self.user.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn user_id(&self) -> Result<UserId> {
        self.current_user().map(|u| u.id).ok_or(Error::NoUser)
    }

    fn set_user(&self, user: User) {
        info!("signed in as user {}", user.id);
        *self.user.write().unwrap_or_else(PoisonError::into_inner) = Some(user);
    }

    /// Register a new user, make it current and load its day
    pub async fn sign_in(&self, display_name: Option<&str>) -> Result<User> {
        let user = self.service.create_user(display_name).await?;
        self.set_user(user.clone());
        self.reload().await?;
        Ok(user)
    }

    /// Continue a session for an already registered user
    pub async fn resume(&self, user_id: UserId) -> Result<User> {
        let user = self.service.get_user(user_id).await?;
        self.set_user(user.clone());
        self.reload().await?;
        Ok(user)
    }

    /// Reload habits and completions for the selected date (today if none),
    /// then refresh the streak of every loaded habit.
    pub async fn reload(&self) -> Result<LoadOutcome> {
        let user_id = self.user_id()?;
        let date = self
            .store
            .selected_date()
            .unwrap_or_else(|| Local::now().date_naive());

        let outcome = self.store.load(user_id, date).await?;
        if outcome == LoadOutcome::Applied {
            let ids: Vec<HabitId> = self.store.habits().iter().map(|h| h.id).collect();
            self.streaks
                .refresh_all(self.service.as_ref(), user_id, &ids)
                .await;
        }
        Ok(outcome)
    }

    /// Select another date and load its completions
    pub async fn change_date(&self, date: NaiveDate) -> Result<LoadOutcome> {
        let user_id = self.user_id()?;
        self.store.change_date(user_id, date).await
    }

    /// Create a habit definition, then reload
    pub async fn create_habit(&self, title: &str, description: Option<&str>) -> Result<Habit> {
        let habit = self.service.create_habit(title, description).await?;
        info!("created habit {} '{}'", habit.id, habit.title);
        self.reload().await?;
        Ok(habit)
    }

    /// Every habit the service knows about
    pub async fn catalogue(&self) -> Result<Vec<Habit>> {
        Ok(self.service.list_habits().await?)
    }

    /// Flip a habit on the selected date without waiting for the service
    pub fn begin_toggle(&self, habit_id: HabitId) -> Result<PendingToggle<'_>> {
        let user_id = self.user_id()?;
        self.toggles.begin(user_id, habit_id)
    }

    /// Flip a habit and wait until it is committed or rolled back
    pub async fn toggle(&self, habit_id: HabitId) -> Result<ToggleOutcome> {
        Ok(self.begin_toggle(habit_id)?.resolve().await)
    }

    pub fn is_completed(&self, habit_id: HabitId) -> bool {
        self.store.is_completed(habit_id)
    }

    pub fn streak(&self, habit_id: HabitId) -> StreakInfo {
        self.streaks.get(habit_id)
    }

    /// Rows for the selected date, in server order
    pub fn daily_view(&self) -> Vec<DailyHabitView> {
        self.store.view(&self.streaks)
    }
}

/// A convenience module for common imports
pub mod prelude {
    pub use crate::config::ClientOptions;
    pub use crate::error::{Error, Result};
    pub use crate::store::{DailyHabitView, LoadOutcome, LoadStatus};
    pub use crate::toggle::{ToggleOutcome, ToggleState};
    pub use crate::HabitTracker;
}
