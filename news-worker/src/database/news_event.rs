use chrono::{DateTime, NaiveDateTime, Utc};
use common::database::Ulid;

use super::{Currency, Impact};

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
/// A scheduled economic announcement.
pub struct NewsEvent {
	/// Surrogate id, assigned on first insert.
	pub id: Ulid,
	pub title: String,
	/// Naive UTC.
	pub scheduled_at: NaiveDateTime,
	pub impact: Impact,
	pub currency: Currency,
	pub forecast: Option<String>,
	pub previous: Option<String>,
	/// Filled in once the figure is released; a re-sync never clears it.
	pub actual: Option<String>,
	/// Where the event was ingested from.
	pub source: String,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

/// The natural key of a [`NewsEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NewsKey {
	pub title: String,
	pub scheduled_at: NaiveDateTime,
	pub impact: Impact,
	pub currency: Currency,
}

/// The mutable part of a [`NewsEvent`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewsFields {
	pub forecast: Option<String>,
	pub previous: Option<String>,
	pub actual: Option<String>,
	pub source: String,
}

impl NewsEvent {
	pub fn key(&self) -> NewsKey {
		NewsKey {
			title: self.title.clone(),
			scheduled_at: self.scheduled_at,
			impact: self.impact,
			currency: self.currency,
		}
	}

	/// The scheduled time as an absolute instant.
	pub fn scheduled_utc(&self) -> DateTime<Utc> {
		self.scheduled_at.and_utc()
	}
}
