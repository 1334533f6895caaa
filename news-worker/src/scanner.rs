use std::sync::Arc;

use anyhow::Context as _;
use chrono::{DateTime, Duration, NaiveDateTime, Timelike, Utc};
use common::global::{GlobalConfig, GlobalCtx};

use crate::config::AppConfig;
use crate::database::AlertTiming;
use crate::global::NewsGlobal;
use crate::periodic;
use crate::queue::AlertMessage;

fn floor_minute(at: DateTime<Utc>) -> NaiveDateTime {
	let at = at.naive_utc();
	at - Duration::seconds(at.second() as i64) - Duration::nanoseconds(at.nanosecond() as i64)
}

/// The scheduled times a tick at `now` looks at, with the timing each one
/// is alerted under.
pub fn scan_targets(now: DateTime<Utc>) -> [(NaiveDateTime, AlertTiming); 2] {
	[
		(floor_minute(now), AlertTiming::OnNewsDrop),
		(floor_minute(now + Duration::minutes(5)), AlertTiming::FiveMinutesBefore),
	]
}

/// Runs one scan and returns how many alert messages were published.
///
/// A failed publish only loses that destination's alert. Any other failure
/// aborts the tick; the next tick does not retry it.
pub async fn tick<G: NewsGlobal>(global: &Arc<G>, now: DateTime<Utc>) -> anyhow::Result<usize> {
	let mut published = 0;

	for (at, timing) in scan_targets(now) {
		let events = global
			.events()
			.find_events_at(at)
			.await
			.with_context(|| format!("failed to fetch events at {at}"))?;

		if events.is_empty() {
			continue;
		}

		let subscriptions = global
			.subscriptions()
			.find_alert_subscriptions_by_timing(timing)
			.await
			.with_context(|| format!("failed to fetch {timing} subscriptions"))?;

		let batches = global.alert_matcher().match_events(&events, timing, &subscriptions);

		tracing::debug!(%at, %timing, events = events.len(), subscriptions = subscriptions.len(), batches = batches.len(), "matched events");

		for batch in &batches {
			let message = AlertMessage::from_batch(batch);

			match global.publisher().publish_alert(&message).await {
				Ok(()) => {
					published += 1;
					tracing::info!(
						destination = %batch.destination,
						%timing,
						events = batch.events.len(),
						"published alert",
					);
				}
				Err(err) => {
					tracing::error!(destination = %batch.destination, %timing, error = %err, "failed to publish alert");
				}
			}
		}
	}

	Ok(published)
}

pub async fn run<G: NewsGlobal>(global: Arc<G>) {
	let config = &global.config::<AppConfig>().jobs.scanner;

	periodic::run(global.ctx(), "scanner", config, |fire_at| {
		let global = global.clone();
		async move {
			if let Err(err) = tick(&global, fire_at).await {
				tracing::error!("scan failed: {:#}", err);
			}
		}
	})
	.await;
}
