//! Optimistic completion toggles
//!
//! A toggle flips the local completion set before any network round trip,
//! then sends the matching mark/unmark call. Success commits the flip and
//! refreshes the habit's streak. Any failure puts the habit back to its
//! pre-toggle membership. Nothing is retried.
//!
//! Toggles on the same habit are not serialized. When two of them are in
//! flight, each resolution applies as it arrives, so responses that arrive
//! out of order can leave a state the user did not ask for last.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::NaiveDate;
use habit_sync_client::{ClientError, HabitId, HabitService, StreakInfo, UserId};
use log::{debug, info, warn};

use crate::error::{Error, Result};
use crate::store::DailyCompletionStore;
use crate::streak::StreakCache;

/// Lifecycle of a toggle on one habit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleState {
    Idle,
    Pending,
    Committed,
    RolledBack,
}

/// Why a toggle was rolled back
#[derive(Debug)]
pub enum RollbackReason {
    /// The service answered with a success code other than the expected one
    Refused,
    /// The call itself failed
    Failed(ClientError),
}

/// Final result of one toggle
#[derive(Debug)]
pub enum ToggleOutcome {
    Committed {
        /// Membership the toggle set
        completed: bool,
        /// Freshly fetched streak; `None` if that fetch failed
        streak: Option<StreakInfo>,
    },
    RolledBack {
        /// Membership restored
        completed: bool,
        reason: RollbackReason,
    },
}

impl ToggleOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, ToggleOutcome::Committed { .. })
    }
}

#[derive(Debug, Clone, Copy)]
struct HabitToggles {
    in_flight: u32,
    last: ToggleState,
}

/// Applies optimistic flips and reconciles them with the service
pub struct ToggleCoordinator {
    service: Arc<dyn HabitService>,
    store: Arc<DailyCompletionStore>,
    streaks: Arc<StreakCache>,
    toggles: RwLock<HashMap<HabitId, HabitToggles>>,
}

impl ToggleCoordinator {
    pub fn new(
        service: Arc<dyn HabitService>,
        store: Arc<DailyCompletionStore>,
        streaks: Arc<StreakCache>,
    ) -> Self {
        Self {
            service,
            store,
            streaks,
            toggles: RwLock::new(HashMap::new()),
        }
    }

    /// Current lifecycle state of toggles on `habit_id`
    pub fn state(&self, habit_id: HabitId) -> ToggleState {
        match self
            .toggles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&habit_id)
        {
            Some(t) if t.in_flight > 0 => ToggleState::Pending,
            Some(t) => t.last,
            None => ToggleState::Idle,
        }
    }

    fn record(&self, habit_id: HabitId, state: ToggleState) {
        let mut toggles = self.toggles.write().unwrap_or_else(PoisonError::into_inner);
        let entry = toggles.entry(habit_id).or_insert(HabitToggles {
            in_flight: 0,
            last: ToggleState::Idle,
        });
        match state {
            ToggleState::Pending => entry.in_flight += 1,
            _ => entry.in_flight = entry.in_flight.saturating_sub(1),
        }
        entry.last = state;
    }

    /// Flip `habit_id` on the selected date right away.
    ///
    /// The returned [`PendingToggle`] must be resolved to send the remote
    /// call.
    pub fn begin(&self, user_id: UserId, habit_id: HabitId) -> Result<PendingToggle<'_>> {
        let date = self.store.selected_date().ok_or(Error::NotLoaded)?;
        let was_completed = self.store.flip(date, habit_id)?;
        self.record(habit_id, ToggleState::Pending);
        debug!(
            "habit {} optimistically {} on {}",
            habit_id,
            if was_completed { "unmarked" } else { "marked" },
            date
        );
        Ok(PendingToggle {
            coordinator: self,
            user_id,
            habit_id,
            date,
            was_completed,
        })
    }

    /// Flip `habit_id` and wait for the service to confirm or refuse it
    pub async fn toggle(&self, user_id: UserId, habit_id: HabitId) -> Result<ToggleOutcome> {
        let pending = self.begin(user_id, habit_id)?;
        Ok(pending.resolve().await)
    }
}

/// A flip that is applied locally and not yet confirmed
#[must_use = "a pending toggle does nothing remotely until resolved"]
pub struct PendingToggle<'a> {
    coordinator: &'a ToggleCoordinator,
    user_id: UserId,
    habit_id: HabitId,
    date: NaiveDate,
    was_completed: bool,
}

impl PendingToggle<'_> {
    pub fn habit_id(&self) -> HabitId {
        self.habit_id
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Membership shown while the call is in flight
    pub fn optimistic_completed(&self) -> bool {
        !self.was_completed
    }

    /// Send the remote call and commit or roll back
    pub async fn resolve(self) -> ToggleOutcome {
        let c = self.coordinator;
        let service = c.service.as_ref();

        let response = if self.was_completed {
            service
                .unmark_complete(self.user_id, self.habit_id, self.date)
                .await
        } else {
            service
                .mark_complete(self.user_id, self.habit_id, self.date)
                .await
        };

        let reason = match response {
            Ok(true) => return self.commit().await,
            Ok(false) => RollbackReason::Refused,
            Err(e) => RollbackReason::Failed(e),
        };

        let restored = c
            .store
            .settle(self.date, self.habit_id, Some(self.was_completed));
        if !restored {
            debug!(
                "rollback of habit {} skipped, {} is no longer loaded",
                self.habit_id, self.date
            );
        }
        c.record(self.habit_id, ToggleState::RolledBack);
        match &reason {
            RollbackReason::Refused => warn!("toggle of habit {} refused, rolled back", self.habit_id),
            RollbackReason::Failed(e) => warn!("toggle of habit {} failed, rolled back: {}", self.habit_id, e),
        }
        ToggleOutcome::RolledBack {
            completed: self.was_completed,
            reason,
        }
    }

    async fn commit(self) -> ToggleOutcome {
        let c = self.coordinator;
        c.store.settle(self.date, self.habit_id, None);
        c.record(self.habit_id, ToggleState::Committed);
        info!(
            "habit {} {} on {}",
            self.habit_id,
            if self.was_completed { "unmarked" } else { "marked" },
            self.date
        );

        let streak = match c
            .streaks
            .refresh(c.service.as_ref(), self.user_id, self.habit_id)
            .await
        {
            Ok(info) => Some(info),
            Err(e) => {
                warn!("streak refresh after toggle of habit {} failed: {}", self.habit_id, e);
                None
            }
        };

        ToggleOutcome::Committed {
            completed: !self.was_completed,
            streak,
        }
    }
}
