use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use common::context::Context;
use tracing::Instrument;

/// A job that fires every `interval`, aligned to `offset` past the Unix
/// epoch. An interval of one day with a two hour offset fires daily at
/// 02:00 UTC.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct JobConfig {
	pub enabled: bool,
	#[serde(with = "humantime_serde")]
	pub interval: Duration,
	#[serde(with = "humantime_serde")]
	pub offset: Duration,
}

impl Default for JobConfig {
	fn default() -> Self {
		Self::every(Duration::from_secs(60), Duration::ZERO)
	}
}

impl JobConfig {
	pub fn every(interval: Duration, offset: Duration) -> Self {
		Self {
			enabled: true,
			interval,
			offset,
		}
	}

	/// The first firing strictly after `now`, or `None` when it falls outside
	/// the representable range.
	pub fn next_fire(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
		let interval = i64::try_from(self.interval.as_millis()).ok()?.max(1);
		let offset = i64::try_from(self.offset.as_millis()).ok()? % interval;

		let elapsed = now.timestamp_millis().checked_sub(offset)?;
		let next = elapsed
			.div_euclid(interval)
			.checked_add(1)?
			.checked_mul(interval)?
			.checked_add(offset)?;

		Utc.timestamp_millis_opt(next).single()
	}
}

/// Fires `job` on the schedule of `config` until `ctx` is cancelled.
///
/// Each firing runs on its own task and receives its scheduled time, so a
/// slow run never delays the next one and runs may overlap. Every task holds
/// a clone of `ctx`, which makes shutdown wait for runs in progress.
pub async fn run<F, Fut>(ctx: &Context, name: &'static str, config: &JobConfig, mut job: F)
where
	F: FnMut(DateTime<Utc>) -> Fut,
	Fut: Future<Output = ()> + Send + 'static,
{
	if !config.enabled {
		tracing::info!(job = name, "job disabled");
		return;
	}

	tracing::info!(
		job = name,
		interval = %humantime::format_duration(config.interval),
		offset = %humantime::format_duration(config.offset),
		"job scheduled",
	);

	loop {
		let now = Utc::now();
		let Some(fire_at) = config.next_fire(now) else {
			tracing::error!(job = name, "next run is out of range, stopping job");
			break;
		};
		let wait = (fire_at - now).to_std().unwrap_or_default();

		tracing::debug!(job = name, %fire_at, "waiting for next run");

		tokio::select! {
			_ = tokio::time::sleep(wait) => {}
			_ = ctx.done() => break,
		}

		let run = job(fire_at);
		let guard = ctx.clone();
		tokio::spawn(
			async move {
				run.await;
				drop(guard);
			}
			.instrument(tracing::info_span!("job", name, %fire_at)),
		);
	}

	tracing::info!(job = name, "job stopped");
}
