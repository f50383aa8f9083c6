//! Per-habit cache of the latest known streak

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockWriteGuard};

use futures_util::future::join_all;
use habit_sync_client::{HabitId, HabitService, StreakInfo, UserId};
use log::{debug, warn};

use crate::error::Result;

#[derive(Debug, Clone, Copy)]
struct Entry {
    ticket: u64,
    info: StreakInfo,
}

#[derive(Debug, Default)]
struct Entries {
    by_habit: HashMap<HabitId, Entry>,
    issued: u64,
}

impl Entries {
    fn issue(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    /// Store `info` unless a fetch issued later already landed
    fn offer(&mut self, ticket: u64, info: StreakInfo) -> bool {
        match self.by_habit.get(&info.habit_id) {
            Some(current) if current.ticket > ticket => false,
            _ => {
                self.by_habit.insert(info.habit_id, Entry { ticket, info });
                true
            }
        }
    }
}

/// Latest [`StreakInfo`] per habit.
///
/// Entries are only overwritten, never evicted. A habit without an entry
/// reads as a zero streak. Each fetch takes a ticket when it is issued, and
/// an answer never replaces one from a fetch issued after it.
#[derive(Debug, Default)]
pub struct StreakCache {
    entries: RwLock<Entries>,
}

impl StreakCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn write(&self) -> RwLockWriteGuard<'_, Entries> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, habit_id: HabitId) -> StreakInfo {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_habit
            .get(&habit_id)
            .map(|e| e.info)
            .unwrap_or_else(|| StreakInfo::empty(habit_id))
    }

    pub fn current_streak(&self, habit_id: HabitId) -> u32 {
        self.get(habit_id).current_streak
    }

    pub fn contains(&self, habit_id: HabitId) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_habit
            .contains_key(&habit_id)
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_habit
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn insert(&self, info: StreakInfo) {
        let mut entries = self.write();
        let ticket = entries.issue();
        entries.offer(ticket, info);
    }

    /// Fetch and cache the streak of one habit.
    ///
    /// Returns the fetched value even when a newer fetch already replaced
    /// it in the cache.
    pub async fn refresh(
        &self,
        service: &dyn HabitService,
        user_id: UserId,
        habit_id: HabitId,
    ) -> Result<StreakInfo> {
        let ticket = self.write().issue();
        let info = service.get_streak(user_id, habit_id).await?;
        if !self.write().offer(ticket, info) {
            debug!("dropping outdated streak of habit {}", habit_id);
        }
        Ok(info)
    }

    /// Refresh every habit in `habit_ids` concurrently.
    ///
    /// A failed fetch leaves that habit's entry as it was. Returns how many
    /// entries were refreshed.
    pub async fn refresh_all(
        &self,
        service: &dyn HabitService,
        user_id: UserId,
        habit_ids: &[HabitId],
    ) -> usize {
        let results = join_all(
            habit_ids
                .iter()
                .map(|&habit_id| async move { (habit_id, self.refresh(service, user_id, habit_id).await) }),
        )
        .await;

        let mut refreshed = 0;
        for (habit_id, result) in results {
            match result {
                Ok(_) => refreshed += 1,
                Err(e) => warn!("streak refresh for habit {} failed: {}", habit_id, e),
            }
        }
        debug!("refreshed {}/{} streaks", refreshed, habit_ids.len());
        refreshed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeService;

    #[test]
    fn test_missing_entry_reads_as_zero() {
        let cache = StreakCache::new();
        assert!(cache.is_empty());
        assert_eq!(cache.current_streak(3), 0);
        assert_eq!(cache.get(3), StreakInfo::empty(3));
        assert!(!cache.contains(3));
    }

    #[test]
    fn test_insert_overwrites_in_place() {
        let cache = StreakCache::new();
        cache.insert(StreakInfo { habit_id: 1, current_streak: 2, longest_streak: 5 });
        cache.insert(StreakInfo { habit_id: 1, current_streak: 3, longest_streak: 5 });
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.current_streak(1), 3);
    }

    #[test]
    fn test_older_fetch_does_not_replace_newer() {
        let cache = StreakCache::new();
        let older = cache.write().issue();
        cache.insert(StreakInfo { habit_id: 1, current_streak: 4, longest_streak: 4 });

        let stale = StreakInfo { habit_id: 1, current_streak: 3, longest_streak: 4 };
        assert!(!cache.write().offer(older, stale));
        assert_eq!(cache.current_streak(1), 4);
    }

    #[tokio::test]
    async fn test_refresh_all_skips_failures() {
        let service = FakeService::new();
        service.set_streak(1, 4);
        service.set_streak(2, 1);
        service.fail_streak(2, true);

        let cache = StreakCache::new();
        cache.insert(StreakInfo { habit_id: 2, current_streak: 7, longest_streak: 7 });

        let refreshed = cache.refresh_all(&service, 1, &[1, 2]).await;
        assert_eq!(refreshed, 1);
        assert_eq!(cache.current_streak(1), 4);
        assert_eq!(cache.current_streak(2), 7);
    }
}
