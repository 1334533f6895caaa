use chrono::{DateTime, Utc};
use common::database::Ulid;

use super::{AlertTiming, Currency, Frequency, Impact, Market, NewsEvent, NewsScope, TimeDisplay};

/// A (server, channel) pair, both Discord snowflakes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Destination {
	pub server_id: String,
	pub channel_id: String,
}

impl Destination {
	pub fn new(server_id: impl Into<String>, channel_id: impl Into<String>) -> Self {
		Self {
			server_id: server_id.into(),
			channel_id: channel_id.into(),
		}
	}
}

impl std::fmt::Display for Destination {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}/{}", self.server_id, self.channel_id)
	}
}

fn is_snowflake(id: &str) -> bool {
	!id.is_empty() && id.parse::<u64>().is_ok()
}

fn filter_allows<T: PartialEq>(filter: &[T], value: &T) -> bool {
	filter.is_empty() || filter.contains(value)
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct AlertSubscription {
	pub id: Ulid,
	pub server_id: String,
	pub channel_id: String,
	pub role_id: Option<String>,
	/// Empty matches every impact.
	pub impacts: Vec<Impact>,
	/// Empty matches every currency.
	pub currencies: Vec<Currency>,
	pub timings: Vec<AlertTiming>,
	pub created_at: DateTime<Utc>,
}

impl AlertSubscription {
	pub fn destination(&self) -> Destination {
		Destination::new(&self.server_id, &self.channel_id)
	}

	/// Whether `event` is wanted by this subscription at `timing`.
	pub fn matches(&self, event: &NewsEvent, timing: AlertTiming) -> bool {
		self.timings.contains(&timing)
			&& filter_allows(&self.impacts, &event.impact)
			&& filter_allows(&self.currencies, &event.currency)
	}

	/// Rejects rows that can never be delivered.
	pub fn validate(&self) -> Result<(), &'static str> {
		if !is_snowflake(&self.server_id) {
			return Err("server id is not a snowflake");
		}

		if !is_snowflake(&self.channel_id) {
			return Err("channel id is not a snowflake");
		}

		if self.role_id.as_deref().is_some_and(|id| !is_snowflake(id)) {
			return Err("role id is not a snowflake");
		}

		if self.timings.is_empty() {
			return Err("no alert timings");
		}

		Ok(())
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAlertSubscription {
	pub server_id: String,
	pub channel_id: String,
	pub role_id: Option<String>,
	pub impacts: Vec<Impact>,
	pub currencies: Vec<Currency>,
	pub timings: Vec<AlertTiming>,
}

/// Fields left as `None` keep their stored value. `role_id: Some(None)`
/// clears the role.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertSubscriptionPatch {
	pub role_id: Option<Option<String>>,
	pub impacts: Option<Vec<Impact>>,
	pub currencies: Option<Vec<Currency>>,
	pub timings: Option<Vec<AlertTiming>>,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ScheduleSubscription {
	pub id: Ulid,
	pub server_id: String,
	pub channel_id: String,
	pub role_id: Option<String>,
	pub hour: i16,
	pub minute: i16,
	/// A fixed UTC offset such as `UTC`, `UTC+05:30` or `-03:00`.
	pub timezone: String,
	pub frequency: Frequency,
	pub news_scope: NewsScope,
	pub market: Market,
	pub impacts: Vec<Impact>,
	pub currencies: Vec<Currency>,
	pub time_display: TimeDisplay,
	pub created_at: DateTime<Utc>,
}

impl ScheduleSubscription {
	pub fn destination(&self) -> Destination {
		Destination::new(&self.server_id, &self.channel_id)
	}

	pub fn wants(&self, event: &NewsEvent) -> bool {
		filter_allows(&self.impacts, &event.impact) && filter_allows(&self.currencies, &event.currency)
	}

	pub fn validate(&self) -> Result<(), &'static str> {
		if !is_snowflake(&self.server_id) || !is_snowflake(&self.channel_id) {
			return Err("destination is not a snowflake pair");
		}

		if self.role_id.as_deref().is_some_and(|id| !is_snowflake(id)) {
			return Err("role id is not a snowflake");
		}

		if !(0..24).contains(&self.hour) || !(0..60).contains(&self.minute) {
			return Err("time of day out of range");
		}

		Ok(())
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewScheduleSubscription {
	pub server_id: String,
	pub channel_id: String,
	pub role_id: Option<String>,
	pub hour: i16,
	pub minute: i16,
	pub timezone: String,
	pub frequency: Frequency,
	pub news_scope: NewsScope,
	pub market: Market,
	pub impacts: Vec<Impact>,
	pub currencies: Vec<Currency>,
	pub time_display: TimeDisplay,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScheduleSubscriptionPatch {
	pub channel_id: Option<String>,
	pub role_id: Option<Option<String>>,
	pub hour: Option<i16>,
	pub minute: Option<i16>,
	pub timezone: Option<String>,
	pub frequency: Option<Frequency>,
	pub news_scope: Option<NewsScope>,
	pub market: Option<Market>,
	pub impacts: Option<Vec<Impact>>,
	pub currencies: Option<Vec<Currency>>,
	pub time_display: Option<TimeDisplay>,
}
