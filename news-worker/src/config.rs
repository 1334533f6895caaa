use std::time::Duration;

use anyhow::Context as _;
use common::config::{DatabaseConfig, LoggingConfig, RmqConfig};

use crate::database::Market;
use crate::periodic::JobConfig;

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct AppConfig {
	/// The name of the application
	pub name: String,

	/// The path to the config file
	pub config_file: Option<String>,

	/// The logging configuration
	pub logging: LoggingConfig,

	/// The database configuration
	pub database: DatabaseConfig,

	/// The RabbitMQ configuration
	pub rmq: RmqConfig,

	pub queues: QueuesConfig,

	pub discord: DiscordConfig,

	pub jobs: JobsConfig,

	pub consumers: ConsumersConfig,

	pub dedup: DedupConfig,

	pub ingest: IngestConfig,

	pub retention: RetentionConfig,
}

impl Default for AppConfig {
	fn default() -> Self {
		Self {
			name: "news-worker".to_string(),
			config_file: Some("config".to_string()),
			logging: Default::default(),
			database: Default::default(),
			rmq: Default::default(),
			queues: Default::default(),
			discord: Default::default(),
			jobs: Default::default(),
			consumers: Default::default(),
			dedup: Default::default(),
			ingest: Default::default(),
			retention: Default::default(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct QueuesConfig {
	/// Queue carrying near-real-time alerts
	pub alert_queue: String,

	/// Queue carrying scheduled digests
	pub schedule_queue: String,

	/// Unacked deliveries allowed per consumer
	pub prefetch: u16,
}

impl Default for QueuesConfig {
	fn default() -> Self {
		Self {
			alert_queue: "news_alerts".to_string(),
			schedule_queue: "schedule_tasks".to_string(),
			prefetch: 10,
		}
	}
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct DiscordConfig {
	/// Base URL of the REST API, including the version
	pub api_base: String,

	/// Bot token
	pub token: String,

	/// Per-request timeout, in seconds
	pub timeout_secs: u64,
}

impl Default for DiscordConfig {
	fn default() -> Self {
		Self {
			api_base: "https://discord.com/api/v10".to_string(),
			token: String::new(),
			timeout_secs: 15,
		}
	}
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct JobsConfig {
	/// Matches due events against alert subscriptions
	pub scanner: JobConfig,

	/// Publishes scheduled digests
	pub schedule: JobConfig,

	/// Pulls the weekly calendar feed
	pub ingest: JobConfig,

	/// Deletes old events
	pub retention: JobConfig,
}

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(60 * 60);
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Upper bound for job intervals and offsets.
pub const MAX_JOB_PERIOD: Duration = Duration::from_secs(366 * 24 * 60 * 60);

/// Upper bound for `retention.days`.
pub const MAX_RETENTION_DAYS: u32 = 36_500;

impl Default for JobsConfig {
	fn default() -> Self {
		Self {
			scanner: JobConfig::every(MINUTE, Duration::ZERO),
			schedule: JobConfig::every(MINUTE, Duration::ZERO),
			ingest: JobConfig::every(DAY, 2 * HOUR),
			// The epoch was a Thursday, so three days and three hours in is
			// Sunday 03:00.
			retention: JobConfig::every(7 * DAY, 3 * DAY + 3 * HOUR),
		}
	}
}

impl JobsConfig {
	fn iter(&self) -> impl Iterator<Item = (&'static str, &JobConfig)> {
		[
			("scanner", &self.scanner),
			("schedule", &self.schedule),
			("ingest", &self.ingest),
			("retention", &self.retention),
		]
		.into_iter()
	}
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct ConsumerConfig {
	pub enabled: bool,
}

impl Default for ConsumerConfig {
	fn default() -> Self {
		Self { enabled: true }
	}
}

#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct ConsumersConfig {
	pub alerts: ConsumerConfig,
	pub schedules: ConsumerConfig,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct DedupConfig {
	/// Entries kept before the record is cleared
	pub capacity: usize,
}

impl Default for DedupConfig {
	fn default() -> Self {
		Self { capacity: 1000 }
	}
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct IngestConfig {
	/// Host serving the weekly calendar files
	pub feed_base_url: String,

	/// Markets whose feeds are pulled
	pub markets: Vec<Market>,

	/// Stored as the source of every ingested event
	pub source: String,

	/// Run one ingestion before the jobs start
	pub sync_on_startup: bool,

	/// Per-request timeout for feed downloads, in seconds
	pub timeout_secs: u64,
}

impl Default for IngestConfig {
	fn default() -> Self {
		Self {
			feed_base_url: "https://nfs.faireconomy.media".to_string(),
			markets: vec![Market::Forex],
			source: "ForexFactory".to_string(),
			sync_on_startup: true,
			timeout_secs: 30,
		}
	}
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct RetentionConfig {
	/// Events scheduled longer ago than this are deleted
	pub days: u32,
}

impl Default for RetentionConfig {
	fn default() -> Self {
		Self { days: 30 }
	}
}

impl common::bootstrap::Config for AppConfig {
	fn parse() -> anyhow::Result<Self> {
		let (mut config, config_file) =
			common::config::parse::<Self>("NEWS", Self::default().config_file.as_deref(), &["ingest.markets"])?;

		config.config_file = config_file;

		Ok(config)
	}

	fn logging(&self) -> &LoggingConfig {
		&self.logging
	}

	fn name(&self) -> &str {
		&self.name
	}

	fn pre_hook(&mut self) -> anyhow::Result<()> {
		for (name, job) in self.jobs.iter() {
			anyhow::ensure!(!job.interval.is_zero(), "jobs.{name}.interval must not be zero");
			anyhow::ensure!(
				job.interval <= MAX_JOB_PERIOD && job.offset <= MAX_JOB_PERIOD,
				"jobs.{name} interval and offset must not exceed {}",
				humantime::format_duration(MAX_JOB_PERIOD),
			);
		}

		anyhow::ensure!(
			self.retention.days <= MAX_RETENTION_DAYS,
			"retention.days must not exceed {MAX_RETENTION_DAYS}"
		);
		anyhow::ensure!(self.ingest.timeout_secs > 0, "ingest.timeout_secs must not be zero");

		anyhow::ensure!(self.dedup.capacity > 0, "dedup.capacity must not be zero");
		anyhow::ensure!(self.queues.prefetch > 0, "queues.prefetch must not be zero");

		if self.consumers.alerts.enabled || self.consumers.schedules.enabled {
			anyhow::ensure!(!self.discord.token.is_empty(), "discord.token is required to run consumers");
		}

		reqwest::Url::parse(&self.ingest.feed_base_url).context("ingest.feed_base_url is not a url")?;

		Ok(())
	}
}
