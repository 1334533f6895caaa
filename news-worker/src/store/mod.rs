use chrono::NaiveDateTime;
use common::database::Ulid;

use crate::database::{
	AlertSubscription, AlertSubscriptionPatch, AlertTiming, NewAlertSubscription, NewScheduleSubscription, NewsEvent,
	NewsFields, NewsKey, ScheduleSubscription, ScheduleSubscriptionPatch,
};

mod pg;

pub use pg::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
	#[error("sqlx: {0}")]
	Sqlx(#[from] sqlx::Error),
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

#[async_trait::async_trait]
pub trait EventStore: Send + Sync {
	/// Inserts the event or refreshes forecast and previous on an existing
	/// one. A stored `actual` is never replaced.
	async fn upsert_event(&self, key: NewsKey, fields: NewsFields) -> Result<NewsEvent>;

	/// Events scheduled exactly at `at`.
	async fn find_events_at(&self, at: NaiveDateTime) -> Result<Vec<NewsEvent>>;

	/// Events in `[start, end)`, ordered by time.
	async fn find_events_between(&self, start: NaiveDateTime, end: NaiveDateTime) -> Result<Vec<NewsEvent>>;

	/// Deletes events scheduled before `cutoff`, returning how many went.
	async fn delete_events_older_than(&self, cutoff: NaiveDateTime) -> Result<u64>;
}

#[async_trait::async_trait]
pub trait SubscriptionStore: Send + Sync {
	async fn find_alert_subscriptions_by_timing(&self, timing: AlertTiming) -> Result<Vec<AlertSubscription>>;

	async fn find_alert_subscriptions_by_server(&self, server_id: &str) -> Result<Vec<AlertSubscription>>;

	/// Creates the subscription, or overwrites the one already bound to the
	/// same (server, channel).
	async fn create_alert_subscription(&self, new: NewAlertSubscription) -> Result<AlertSubscription>;

	async fn update_alert_subscription(&self, id: Ulid, patch: AlertSubscriptionPatch) -> Result<Option<AlertSubscription>>;

	async fn delete_alert_subscription(&self, id: Ulid) -> Result<bool>;

	async fn find_schedule_subscriptions_by_server(&self, server_id: &str) -> Result<Vec<ScheduleSubscription>>;

	async fn find_all_schedule_subscriptions(&self) -> Result<Vec<ScheduleSubscription>>;

	async fn create_schedule_subscription(&self, new: NewScheduleSubscription) -> Result<ScheduleSubscription>;

	async fn update_schedule_subscription(
		&self,
		id: Ulid,
		patch: ScheduleSubscriptionPatch,
	) -> Result<Option<ScheduleSubscription>>;

	async fn delete_schedule_subscription(&self, id: Ulid) -> Result<bool>;
}
