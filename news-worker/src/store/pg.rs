use std::sync::Arc;

use chrono::NaiveDateTime;
use common::database::Ulid;
use sqlx::postgres::PgRow;
use sqlx::FromRow;

use super::{EventStore, Result, SubscriptionStore};
use crate::database::{
	AlertSubscription, AlertSubscriptionPatch, AlertTiming, NewAlertSubscription, NewScheduleSubscription, NewsEvent,
	NewsFields, NewsKey, ScheduleSubscription, ScheduleSubscriptionPatch,
};

const ALERT_COLUMNS: &str = "id, server_id, channel_id, role_id, impacts, currencies, timings, created_at";

const SCHEDULE_COLUMNS: &str = "id, server_id, channel_id, role_id, hour, minute, timezone, frequency, news_scope, market, \
                                impacts, currencies, time_display, created_at";

/// Postgres backed event and subscription store.
#[derive(Clone)]
pub struct PgStore {
	db: Arc<sqlx::PgPool>,
}

impl PgStore {
	pub fn new(db: Arc<sqlx::PgPool>) -> Self {
		Self { db }
	}
}

/// Decodes rows one by one so a single unreadable row is skipped instead of
/// failing the whole read.
fn decode_rows<T>(rows: Vec<PgRow>, table: &'static str) -> Vec<T>
where
	T: for<'r> FromRow<'r, PgRow>,
{
	rows.iter()
		.filter_map(|row| match T::from_row(row) {
			Ok(value) => Some(value),
			Err(err) => {
				tracing::warn!(table, error = %err, "skipping malformed row");
				None
			}
		})
		.collect()
}

#[async_trait::async_trait]
impl EventStore for PgStore {
	async fn upsert_event(&self, key: NewsKey, fields: NewsFields) -> Result<NewsEvent> {
		Ok(sqlx::query_as(
			"INSERT INTO news_events (id, title, scheduled_at, impact, currency, forecast, previous, actual, source) \
			 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
			 ON CONFLICT (title, scheduled_at, impact, currency) DO UPDATE SET \
			 forecast = EXCLUDED.forecast, \
			 previous = EXCLUDED.previous, \
			 actual = COALESCE(news_events.actual, EXCLUDED.actual), \
			 updated_at = NOW() \
			 RETURNING *",
		)
		.bind(Ulid::new())
		.bind(key.title)
		.bind(key.scheduled_at)
		.bind(key.impact)
		.bind(key.currency)
		.bind(fields.forecast)
		.bind(fields.previous)
		.bind(fields.actual)
		.bind(fields.source)
		.fetch_one(self.db.as_ref())
		.await?)
	}

	async fn find_events_at(&self, at: NaiveDateTime) -> Result<Vec<NewsEvent>> {
		let rows = sqlx::query("SELECT * FROM news_events WHERE scheduled_at = $1 ORDER BY title")
			.bind(at)
			.fetch_all(self.db.as_ref())
			.await?;

		Ok(decode_rows(rows, "news_events"))
	}

	async fn find_events_between(&self, start: NaiveDateTime, end: NaiveDateTime) -> Result<Vec<NewsEvent>> {
		let rows = sqlx::query(
			"SELECT * FROM news_events WHERE scheduled_at >= $1 AND scheduled_at < $2 ORDER BY scheduled_at, title",
		)
		.bind(start)
		.bind(end)
		.fetch_all(self.db.as_ref())
		.await?;

		Ok(decode_rows(rows, "news_events"))
	}

	async fn delete_events_older_than(&self, cutoff: NaiveDateTime) -> Result<u64> {
		let result = sqlx::query("DELETE FROM news_events WHERE scheduled_at < $1")
			.bind(cutoff)
			.execute(self.db.as_ref())
			.await?;

		Ok(result.rows_affected())
	}
}

#[async_trait::async_trait]
impl SubscriptionStore for PgStore {
	async fn find_alert_subscriptions_by_timing(&self, timing: AlertTiming) -> Result<Vec<AlertSubscription>> {
		let rows = sqlx::query(&format!(
			"SELECT {ALERT_COLUMNS} FROM alert_subscriptions WHERE $1 = ANY(timings) ORDER BY created_at"
		))
		.bind(timing)
		.fetch_all(self.db.as_ref())
		.await?;

		Ok(decode_rows(rows, "alert_subscriptions"))
	}

	async fn find_alert_subscriptions_by_server(&self, server_id: &str) -> Result<Vec<AlertSubscription>> {
		let rows = sqlx::query(&format!(
			"SELECT {ALERT_COLUMNS} FROM alert_subscriptions WHERE server_id = $1 ORDER BY created_at"
		))
		.bind(server_id)
		.fetch_all(self.db.as_ref())
		.await?;

		Ok(decode_rows(rows, "alert_subscriptions"))
	}

	async fn create_alert_subscription(&self, new: NewAlertSubscription) -> Result<AlertSubscription> {
		Ok(sqlx::query_as(&format!(
			"INSERT INTO alert_subscriptions (id, server_id, channel_id, role_id, impacts, currencies, timings) \
			 VALUES ($1, $2, $3, $4, $5, $6, $7) \
			 ON CONFLICT (server_id, channel_id) DO UPDATE SET \
			 role_id = EXCLUDED.role_id, \
			 impacts = EXCLUDED.impacts, \
			 currencies = EXCLUDED.currencies, \
			 timings = EXCLUDED.timings \
			 RETURNING {ALERT_COLUMNS}"
		))
		.bind(Ulid::new())
		.bind(new.server_id)
		.bind(new.channel_id)
		.bind(new.role_id)
		.bind(new.impacts)
		.bind(new.currencies)
		.bind(new.timings)
		.fetch_one(self.db.as_ref())
		.await?)
	}

	async fn update_alert_subscription(&self, id: Ulid, patch: AlertSubscriptionPatch) -> Result<Option<AlertSubscription>> {
		Ok(sqlx::query_as(&format!(
			"UPDATE alert_subscriptions SET \
			 role_id = CASE WHEN $2 THEN $3 ELSE role_id END, \
			 impacts = COALESCE($4, impacts), \
			 currencies = COALESCE($5, currencies), \
			 timings = COALESCE($6, timings) \
			 WHERE id = $1 \
			 RETURNING {ALERT_COLUMNS}"
		))
		.bind(id)
		.bind(patch.role_id.is_some())
		.bind(patch.role_id.flatten())
		.bind(patch.impacts)
		.bind(patch.currencies)
		.bind(patch.timings)
		.fetch_optional(self.db.as_ref())
		.await?)
	}

	async fn delete_alert_subscription(&self, id: Ulid) -> Result<bool> {
		let result = sqlx::query("DELETE FROM alert_subscriptions WHERE id = $1")
			.bind(id)
			.execute(self.db.as_ref())
			.await?;

		Ok(result.rows_affected() > 0)
	}

	async fn find_schedule_subscriptions_by_server(&self, server_id: &str) -> Result<Vec<ScheduleSubscription>> {
		let rows = sqlx::query(&format!(
			"SELECT {SCHEDULE_COLUMNS} FROM schedule_subscriptions WHERE server_id = $1 ORDER BY hour, minute"
		))
		.bind(server_id)
		.fetch_all(self.db.as_ref())
		.await?;

		Ok(decode_rows(rows, "schedule_subscriptions"))
	}

	async fn find_all_schedule_subscriptions(&self) -> Result<Vec<ScheduleSubscription>> {
		let rows = sqlx::query(&format!("SELECT {SCHEDULE_COLUMNS} FROM schedule_subscriptions"))
			.fetch_all(self.db.as_ref())
			.await?;

		Ok(decode_rows(rows, "schedule_subscriptions"))
	}

	async fn create_schedule_subscription(&self, new: NewScheduleSubscription) -> Result<ScheduleSubscription> {
		Ok(sqlx::query_as(&format!(
			"INSERT INTO schedule_subscriptions \
			 (id, server_id, channel_id, role_id, hour, minute, timezone, frequency, news_scope, market, impacts, currencies, time_display) \
			 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
			 RETURNING {SCHEDULE_COLUMNS}"
		))
		.bind(Ulid::new())
		.bind(new.server_id)
		.bind(new.channel_id)
		.bind(new.role_id)
		.bind(new.hour)
		.bind(new.minute)
		.bind(new.timezone)
		.bind(new.frequency)
		.bind(new.news_scope)
		.bind(new.market)
		.bind(new.impacts)
		.bind(new.currencies)
		.bind(new.time_display)
		.fetch_one(self.db.as_ref())
		.await?)
	}

	async fn update_schedule_subscription(
		&self,
		id: Ulid,
		patch: ScheduleSubscriptionPatch,
	) -> Result<Option<ScheduleSubscription>> {
		Ok(sqlx::query_as(&format!(
			"UPDATE schedule_subscriptions SET \
			 channel_id = COALESCE($2, channel_id), \
			 role_id = CASE WHEN $3 THEN $4 ELSE role_id END, \
			 hour = COALESCE($5, hour), \
			 minute = COALESCE($6, minute), \
			 timezone = COALESCE($7, timezone), \
			 frequency = COALESCE($8, frequency), \
			 news_scope = COALESCE($9, news_scope), \
			 market = COALESCE($10, market), \
			 impacts = COALESCE($11, impacts), \
			 currencies = COALESCE($12, currencies), \
			 time_display = COALESCE($13, time_display) \
			 WHERE id = $1 \
			 RETURNING {SCHEDULE_COLUMNS}"
		))
		.bind(id)
		.bind(patch.channel_id)
		.bind(patch.role_id.is_some())
		.bind(patch.role_id.flatten())
		.bind(patch.hour)
		.bind(patch.minute)
		.bind(patch.timezone)
		.bind(patch.frequency)
		.bind(patch.news_scope)
		.bind(patch.market)
		.bind(patch.impacts)
		.bind(patch.currencies)
		.bind(patch.time_display)
		.fetch_optional(self.db.as_ref())
		.await?)
	}

	async fn delete_schedule_subscription(&self, id: Ulid) -> Result<bool> {
		let result = sqlx::query("DELETE FROM schedule_subscriptions WHERE id = $1")
			.bind(id)
			.execute(self.db.as_ref())
			.await?;

		Ok(result.rows_affected() > 0)
	}
}
