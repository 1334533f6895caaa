use std::sync::Arc;

use anyhow::Context as _;
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc, Weekday};
use common::database::Ulid;
use common::global::{GlobalConfig, GlobalCtx};

use crate::config::AppConfig;
use crate::database::{Frequency, NewsScope, ScheduleSubscription};
use crate::global::NewsGlobal;
use crate::periodic;
use crate::queue::{EventPayload, ScheduleTask};

/// Parses a fixed offset written as `UTC`, `UTC+05:30`, `GMT-3`, `+0530` or
/// `-03:00`. Named zones are not supported.
pub fn parse_offset(value: &str) -> Option<FixedOffset> {
	let value = value.trim();
	let upper = value.to_ascii_uppercase();
	let rest = upper
		.strip_prefix("UTC")
		.or_else(|| upper.strip_prefix("GMT"))
		.unwrap_or(&upper)
		.trim();

	if rest.is_empty() || rest == "Z" {
		return FixedOffset::east_opt(0);
	}

	let (sign, digits) = if let Some(digits) = rest.strip_prefix('+') {
		(1, digits)
	} else if let Some(digits) = rest.strip_prefix('-') {
		(-1, digits)
	} else {
		return None;
	};

	let (hours, minutes) = match digits.split_once(':') {
		Some((hours, minutes)) => (hours, minutes),
		None if digits.len() == 4 && digits.is_ascii() => digits.split_at(2),
		None => (digits, "0"),
	};

	let hours = hours.parse::<i32>().ok().filter(|h| (0..=14).contains(h))?;
	let minutes = minutes.parse::<i32>().ok().filter(|m| (0..60).contains(m))?;

	FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Identifies one firing of one schedule. Two ticks that land on the same
/// local minute produce the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScheduleKey {
	pub schedule_id: Ulid,
	pub date: NaiveDate,
	pub hour: u32,
	pub minute: u32,
}

impl ScheduleKey {
	pub fn new(schedule_id: Ulid, local: &DateTime<FixedOffset>) -> Self {
		Self {
			schedule_id,
			date: local.date_naive(),
			hour: local.hour(),
			minute: local.minute(),
		}
	}
}

/// Whether `schedule` fires at the local minute `local`. Weekly schedules
/// fire on Mondays.
pub fn is_due(schedule: &ScheduleSubscription, local: &DateTime<FixedOffset>) -> bool {
	local.hour() as i16 == schedule.hour
		&& local.minute() as i16 == schedule.minute
		&& (schedule.frequency == Frequency::Daily || local.weekday() == Weekday::Mon)
}

/// The naive UTC range `[start, end)` of events a digest covers: the local
/// day of `local`, or the local Monday-to-Monday week containing it.
pub fn scope_window(scope: NewsScope, local: &DateTime<FixedOffset>) -> (NaiveDateTime, NaiveDateTime) {
	let date = local.date_naive();
	let (start, days) = match scope {
		NewsScope::Daily => (date, 1),
		NewsScope::Weekly => (date - Duration::days(local.weekday().num_days_from_monday() as i64), 7),
	};

	let offset = Duration::seconds(local.offset().local_minus_utc() as i64);
	let start = start.and_time(NaiveTime::default()) - offset;

	(start, start + Duration::days(days))
}

async fn publish_digest<G: NewsGlobal>(
	global: &Arc<G>,
	schedule: &ScheduleSubscription,
	local: &DateTime<FixedOffset>,
) -> anyhow::Result<usize> {
	let (start, end) = scope_window(schedule.news_scope, local);

	let events = global
		.events()
		.find_events_between(start, end)
		.await
		.context("failed to fetch events")?;

	let news = events
		.iter()
		.filter(|event| schedule.wants(event))
		.map(EventPayload::from)
		.collect::<Vec<_>>();

	let count = news.len();

	let task = ScheduleTask {
		schedule_id: schedule.id,
		server_id: schedule.server_id.clone(),
		channel_id: schedule.channel_id.clone(),
		news,
		market: schedule.market,
		role_id: schedule.role_id.clone(),
		time_display: schedule.time_display,
		timezone: schedule.timezone.clone(),
	};

	global
		.publisher()
		.publish_schedule(&task)
		.await
		.context("failed to publish schedule task")?;

	Ok(count)
}

/// Publishes a digest for every schedule due at `now`, returning how many
/// were published. A failing schedule is logged and does not affect the
/// others.
pub async fn tick<G: NewsGlobal>(global: &Arc<G>, now: DateTime<Utc>) -> anyhow::Result<usize> {
	let schedules = global
		.subscriptions()
		.find_all_schedule_subscriptions()
		.await
		.context("failed to fetch schedules")?;

	let mut published = 0;

	for schedule in &schedules {
		if let Err(reason) = schedule.validate() {
			tracing::warn!(schedule_id = %schedule.id, reason, "skipping malformed schedule");
			continue;
		}

		let Some(offset) = parse_offset(&schedule.timezone) else {
			tracing::warn!(schedule_id = %schedule.id, timezone = %schedule.timezone, "skipping schedule with unknown timezone");
			continue;
		};

		let local = now.with_timezone(&offset);
		if !is_due(schedule, &local) {
			continue;
		}

		if !global.schedule_dedup().insert(ScheduleKey::new(schedule.id, &local)) {
			tracing::debug!(schedule_id = %schedule.id, "digest already published this minute");
			continue;
		}

		match publish_digest(global, schedule, &local).await {
			Ok(events) => {
				published += 1;
				tracing::info!(schedule_id = %schedule.id, destination = %schedule.destination(), events, "published digest");
			}
			Err(err) => {
				tracing::error!(schedule_id = %schedule.id, "digest failed: {:#}", err);
			}
		}
	}

	Ok(published)
}

pub async fn run<G: NewsGlobal>(global: Arc<G>) {
	let config = &global.config::<AppConfig>().jobs.schedule;

	periodic::run(global.ctx(), "schedule", config, |fire_at| {
		let global = global.clone();
		async move {
			if let Err(err) = tick(&global, fire_at).await {
				tracing::error!("schedule tick failed: {:#}", err);
			}
		}
	})
	.await;
}
