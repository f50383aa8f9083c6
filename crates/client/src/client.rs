use async_trait::async_trait;
use chrono::NaiveDate;
use log::{debug, warn};
use reqwest::{Client, StatusCode};
use url::Url;

use crate::error::{ClientError, Result};
use crate::fetch::Fetch;
use crate::models::{
    format_date, DailyHabit, Habit, HabitId, NewHabit, NewUser, StreakInfo, User, UserId,
};

/// Logical operations offered by the habit service.
///
/// Implementations never retry. Every failure surfaces as a [`ClientError`].
#[async_trait]
pub trait HabitService: Send + Sync {
    async fn create_user(&self, display_name: Option<&str>) -> Result<User>;

    async fn get_user(&self, user_id: UserId) -> Result<User>;

    async fn create_habit(&self, title: &str, description: Option<&str>) -> Result<Habit>;

    /// Every habit known to the service, regardless of user
    async fn list_habits(&self) -> Result<Vec<Habit>>;

    async fn list_habits_for_user(&self, user_id: UserId) -> Result<Vec<Habit>>;

    /// Ids of the habits completed by `user_id` on `date`
    async fn list_completions_for_date(&self, user_id: UserId, date: NaiveDate) -> Result<Vec<HabitId>>;

    async fn mark_complete(&self, user_id: UserId, habit_id: HabitId, date: NaiveDate) -> Result<bool>;

    async fn unmark_complete(&self, user_id: UserId, habit_id: HabitId, date: NaiveDate) -> Result<bool>;

    async fn get_streak(&self, user_id: UserId, habit_id: HabitId) -> Result<StreakInfo>;
}

/// HTTP implementation of [`HabitService`]
#[derive(Debug, Clone)]
pub struct HabitClient {
    base_url: Url,
    http_client: Client,
}

impl HabitClient {
    /// Create a client rooted at `base_url`
    ///
    /// # Example
    ///
    /// ```
    /// use habit_sync_client::HabitClient;
    ///
    /// let client = HabitClient::new("http://127.0.0.1:5000", reqwest::Client::new()).unwrap();
    /// assert_eq!(client.base_url().as_str(), "http://127.0.0.1:5000/");
    /// ```
    pub fn new(base_url: &str, http_client: Client) -> Result<Self> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidBaseUrl(base_url.to_string()));
        }
        Ok(Self {
            base_url,
            http_client,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Raw per-date listing, completed flag included
    pub async fn daily_habits(&self, user_id: UserId, date: NaiveDate) -> Result<Vec<DailyHabit>> {
        let uid = user_id.to_string();
        Fetch::get(&self.http_client, &self.base_url, &["api", "users", uid.as_str(), "habits", "daily"])?
            .query("date", format_date(date))
            .execute()
            .await
    }

    async fn completion_request(
        &self,
        remove: bool,
        user_id: UserId,
        habit_id: HabitId,
        date: NaiveDate,
    ) -> Result<StatusCode> {
        let uid = user_id.to_string();
        let hid = habit_id.to_string();
        let segments = ["api", "users", uid.as_str(), "habits", hid.as_str(), "complete"];
        let builder = if remove {
            Fetch::delete(&self.http_client, &self.base_url, &segments)?
        } else {
            Fetch::post(&self.http_client, &self.base_url, &segments)?
        };
        builder.query("date", format_date(date)).execute_status().await
    }
}

#[async_trait]
impl HabitService for HabitClient {
    async fn create_user(&self, display_name: Option<&str>) -> Result<User> {
        let body = NewUser {
            name: display_name.unwrap_or_default(),
        };
        Fetch::post(&self.http_client, &self.base_url, &["api", "users"])?
            .json(&body)?
            .execute()
            .await
    }

    async fn get_user(&self, user_id: UserId) -> Result<User> {
        let uid = user_id.to_string();
        Fetch::get(&self.http_client, &self.base_url, &["api", "users", uid.as_str()])?
            .execute()
            .await
    }

    async fn create_habit(&self, title: &str, description: Option<&str>) -> Result<Habit> {
        let body = NewHabit { title, description };
        Fetch::post(&self.http_client, &self.base_url, &["api", "habits"])?
            .json(&body)?
            .execute()
            .await
    }

    async fn list_habits(&self) -> Result<Vec<Habit>> {
        Fetch::get(&self.http_client, &self.base_url, &["api", "habits"])?
            .execute()
            .await
    }

    async fn list_habits_for_user(&self, user_id: UserId) -> Result<Vec<Habit>> {
        let uid = user_id.to_string();
        Fetch::get(&self.http_client, &self.base_url, &["api", "users", uid.as_str(), "habits"])?
            .execute()
            .await
    }

    async fn list_completions_for_date(&self, user_id: UserId, date: NaiveDate) -> Result<Vec<HabitId>> {
        let entries = self.daily_habits(user_id, date).await?;
        Ok(entries
            .into_iter()
            .filter(|entry| entry.completed)
            .map(|entry| entry.id)
            .collect())
    }

    async fn mark_complete(&self, user_id: UserId, habit_id: HabitId, date: NaiveDate) -> Result<bool> {
        let status = self.completion_request(false, user_id, habit_id, date).await?;
        let done = status == StatusCode::OK || status == StatusCode::CREATED;
        if !done {
            warn!("mark_complete for habit {} answered {}", habit_id, status);
        }
        Ok(done)
    }

    async fn unmark_complete(&self, user_id: UserId, habit_id: HabitId, date: NaiveDate) -> Result<bool> {
        let status = self.completion_request(true, user_id, habit_id, date).await?;
        let done = status == StatusCode::OK;
        if !done {
            warn!("unmark_complete for habit {} answered {}", habit_id, status);
        }
        Ok(done)
    }

    async fn get_streak(&self, user_id: UserId, habit_id: HabitId) -> Result<StreakInfo> {
        let uid = user_id.to_string();
        let hid = habit_id.to_string();
        let streak: StreakInfo = Fetch::get(
            &self.http_client,
            &self.base_url,
            &["api", "users", uid.as_str(), "habits", hid.as_str(), "streak"],
        )?
        .execute()
        .await?;

        if streak.habit_id != habit_id {
            return Err(ClientError::invalid_response(format!(
                "streak requested for habit {} but response is for habit {}",
                habit_id, streak.habit_id
            )));
        }
        debug!(
            "habit {} streak: current {}, longest {}",
            habit_id, streak.current_streak, streak.longest_streak
        );
        Ok(streak)
    }
}
