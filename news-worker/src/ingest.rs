use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use common::global::{GlobalConfig, GlobalCtx};
use reqwest::StatusCode;

use crate::config::{AppConfig, IngestConfig};
use crate::database::{Currency, Impact, Market, NewsFields, NewsKey};
use crate::global::NewsGlobal;
use crate::periodic;

/// One entry of a weekly calendar feed.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct FeedEvent {
	pub title: String,
	pub country: String,
	pub date: DateTime<FixedOffset>,
	pub impact: String,
	#[serde(default)]
	pub forecast: Option<String>,
	#[serde(default)]
	pub previous: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SkipReason {
	#[error("unsupported currency {0:?}")]
	Currency(String),
	#[error("unsupported impact {0:?}")]
	Impact(String),
}

fn non_empty(value: &Option<String>) -> Option<String> {
	value.as_deref().map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

impl FeedEvent {
	/// Splits the entry into the key and fields it is stored under. Times are
	/// stored as naive UTC.
	pub fn to_record(&self, source: &str) -> Result<(NewsKey, NewsFields), SkipReason> {
		let currency = self
			.country
			.parse::<Currency>()
			.map_err(|_| SkipReason::Currency(self.country.clone()))?;
		let impact = self
			.impact
			.parse::<Impact>()
			.map_err(|_| SkipReason::Impact(self.impact.clone()))?;

		let key = NewsKey {
			title: self.title.trim().to_string(),
			scheduled_at: self.date.with_timezone(&Utc).naive_utc(),
			impact,
			currency,
		};

		let fields = NewsFields {
			forecast: non_empty(&self.forecast),
			previous: non_empty(&self.previous),
			actual: None,
			source: source.to_string(),
		};

		Ok((key, fields))
	}
}

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
	#[error("http: {0}")]
	Http(#[from] reqwest::Error),
	#[error("feed responded {0}")]
	Status(StatusCode),
}

#[async_trait::async_trait]
pub trait NewsFeed: Send + Sync {
	/// This week's calendar for `market`.
	async fn weekly_events(&self, market: Market) -> Result<Vec<FeedEvent>, FeedError>;
}

/// The ForexFactory family of weekly JSON calendars.
pub struct ForexFactoryFeed {
	http: reqwest::Client,
	base_url: String,
}

impl ForexFactoryFeed {
	pub fn new(config: &IngestConfig) -> Result<Self, FeedError> {
		let http = reqwest::Client::builder()
			.timeout(Duration::from_secs(config.timeout_secs))
			.user_agent(concat!("news-worker/", env!("CARGO_PKG_VERSION")))
			.build()?;

		Ok(Self {
			http,
			base_url: config.feed_base_url.trim_end_matches('/').to_string(),
		})
	}
}

#[async_trait::async_trait]
impl NewsFeed for ForexFactoryFeed {
	async fn weekly_events(&self, market: Market) -> Result<Vec<FeedEvent>, FeedError> {
		let url = format!("{}/{}", self.base_url, market.feed_file());
		let response = self.http.get(&url).send().await?;

		if !response.status().is_success() {
			return Err(FeedError::Status(response.status()));
		}

		Ok(response.json().await?)
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
	pub upserted: usize,
	pub skipped: usize,
	pub failed: usize,
}

/// Pulls every configured market's feed into the event store. Failures are
/// counted per entry and per market; nothing aborts the sync as a whole.
pub async fn sync<G: NewsGlobal>(global: &Arc<G>) -> SyncReport {
	let config = &global.config::<AppConfig>().ingest;
	let mut report = SyncReport::default();

	for &market in &config.markets {
		let entries = match global.feed().weekly_events(market).await {
			Ok(entries) => entries,
			Err(err) => {
				tracing::error!(%market, error = %err, "failed to fetch feed");
				report.failed += 1;
				continue;
			}
		};

		tracing::debug!(%market, entries = entries.len(), "fetched feed");

		for entry in &entries {
			let (key, fields) = match entry.to_record(&config.source) {
				Ok(record) => record,
				Err(reason) => {
					tracing::debug!(title = %entry.title, %reason, "skipping feed entry");
					report.skipped += 1;
					continue;
				}
			};

			match global.events().upsert_event(key, fields).await {
				Ok(_) => report.upserted += 1,
				Err(err) => {
					tracing::warn!(title = %entry.title, error = %err, "failed to store feed entry");
					report.failed += 1;
				}
			}
		}
	}

	tracing::info!(
		upserted = report.upserted,
		skipped = report.skipped,
		failed = report.failed,
		"ingestion finished",
	);

	report
}

pub async fn run<G: NewsGlobal>(global: Arc<G>) {
	let config = &global.config::<AppConfig>().jobs.ingest;

	periodic::run(global.ctx(), "ingest", config, |_| {
		let global = global.clone();
		async move {
			sync(&global).await;
		}
	})
	.await;
}
