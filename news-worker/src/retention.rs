use std::sync::Arc;

use anyhow::Context as _;
use chrono::{DateTime, Duration, Utc};
use common::global::{GlobalConfig, GlobalCtx};

use crate::config::AppConfig;
use crate::global::NewsGlobal;
use crate::periodic;

/// Deletes events scheduled more than `retention.days` before `now`.
pub async fn sweep<G: NewsGlobal>(global: &Arc<G>, now: DateTime<Utc>) -> anyhow::Result<u64> {
	let days = global.config::<AppConfig>().retention.days;
	let cutoff = Duration::try_days(i64::from(days))
		.and_then(|age| now.naive_utc().checked_sub_signed(age))
		.with_context(|| format!("retention of {days} days is out of range"))?;

	let deleted = global
		.events()
		.delete_events_older_than(cutoff)
		.await
		.context("failed to delete old events")?;

	tracing::info!(%cutoff, deleted, "retention sweep finished");

	Ok(deleted)
}

pub async fn run<G: NewsGlobal>(global: Arc<G>) {
	let config = &global.config::<AppConfig>().jobs.retention;

	periodic::run(global.ctx(), "retention", config, |fire_at| {
		let global = global.clone();
		async move {
			if let Err(err) = sweep(&global, fire_at).await {
				tracing::error!("{:#}", err);
			}
		}
	})
	.await;
}
