use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDateTime, Utc};
use common::context::{Context, Handler};
use common::database::Ulid;
use common::rmq::QueueError;

use crate::config::AppConfig;
use crate::database::{
	AlertSubscription, AlertSubscriptionPatch, AlertTiming, Currency, Frequency, Impact, Market, NewAlertSubscription,
	NewScheduleSubscription, NewsEvent, NewsFields, NewsKey, NewsScope, ScheduleSubscription, ScheduleSubscriptionPatch,
	TimeDisplay,
};
use crate::dedup::DedupRecord;
use crate::delivery::{Capability, CapabilityOracle, MessageSender, OutboundMessage};
use crate::discord::DiscordError;
use crate::ingest::{FeedError, FeedEvent, NewsFeed};
use crate::matcher::AlertMatcher;
use crate::queue::{AlertMessage, Publisher, ScheduleTask};
use crate::schedule::ScheduleKey;
use crate::store::{EventStore, Result, SubscriptionStore};

pub fn at(value: &str) -> DateTime<Utc> {
	DateTime::parse_from_rfc3339(value).unwrap().with_timezone(&Utc)
}

pub fn naive(value: &str) -> NaiveDateTime {
	at(value).naive_utc()
}

pub fn event(title: &str, scheduled_at: NaiveDateTime, impact: Impact, currency: Currency) -> NewsEvent {
	NewsEvent {
		id: Ulid::new(),
		title: title.to_string(),
		scheduled_at,
		impact,
		currency,
		forecast: Some("0.3%".to_string()),
		previous: None,
		actual: None,
		source: "ForexFactory".to_string(),
		created_at: Utc::now(),
		updated_at: Utc::now(),
	}
}

pub fn alert_subscription(
	channel_id: &str,
	impacts: &[Impact],
	currencies: &[Currency],
	timings: &[AlertTiming],
) -> AlertSubscription {
	AlertSubscription {
		id: Ulid::new(),
		server_id: "100".to_string(),
		channel_id: channel_id.to_string(),
		role_id: None,
		impacts: impacts.to_vec(),
		currencies: currencies.to_vec(),
		timings: timings.to_vec(),
		created_at: Utc::now(),
	}
}

pub fn schedule_subscription(hour: i16, minute: i16, timezone: &str, frequency: Frequency) -> ScheduleSubscription {
	ScheduleSubscription {
		id: Ulid::new(),
		server_id: "100".to_string(),
		channel_id: "200".to_string(),
		role_id: None,
		hour,
		minute,
		timezone: timezone.to_string(),
		frequency,
		news_scope: NewsScope::Daily,
		market: Market::Forex,
		impacts: Vec::new(),
		currencies: Vec::new(),
		time_display: TimeDisplay::Fixed,
		created_at: Utc::now(),
	}
}

#[derive(Default)]
pub struct MemoryStore {
	pub events: Mutex<Vec<NewsEvent>>,
	pub alerts: Mutex<Vec<AlertSubscription>>,
	pub schedules: Mutex<Vec<ScheduleSubscription>>,
}

#[async_trait::async_trait]
impl EventStore for MemoryStore {
	async fn upsert_event(&self, key: NewsKey, fields: NewsFields) -> Result<NewsEvent> {
		let mut events = self.events.lock().unwrap();

		if let Some(existing) = events.iter_mut().find(|e| e.key() == key) {
			existing.forecast = fields.forecast;
			existing.previous = fields.previous;
			if existing.actual.is_none() {
				existing.actual = fields.actual;
			}
			existing.updated_at = Utc::now();
			return Ok(existing.clone());
		}

		let event = NewsEvent {
			id: Ulid::new(),
			title: key.title,
			scheduled_at: key.scheduled_at,
			impact: key.impact,
			currency: key.currency,
			forecast: fields.forecast,
			previous: fields.previous,
			actual: fields.actual,
			source: fields.source,
			created_at: Utc::now(),
			updated_at: Utc::now(),
		};
		events.push(event.clone());

		Ok(event)
	}

	async fn find_events_at(&self, at: NaiveDateTime) -> Result<Vec<NewsEvent>> {
		Ok(self
			.events
			.lock()
			.unwrap()
			.iter()
			.filter(|e| e.scheduled_at == at)
			.cloned()
			.collect())
	}

	async fn find_events_between(&self, start: NaiveDateTime, end: NaiveDateTime) -> Result<Vec<NewsEvent>> {
		let mut events = self
			.events
			.lock()
			.unwrap()
			.iter()
			.filter(|e| e.scheduled_at >= start && e.scheduled_at < end)
			.cloned()
			.collect::<Vec<_>>();
		events.sort_by_key(|e| e.scheduled_at);
		Ok(events)
	}

	async fn delete_events_older_than(&self, cutoff: NaiveDateTime) -> Result<u64> {
		let mut events = self.events.lock().unwrap();
		let before = events.len();
		events.retain(|e| e.scheduled_at >= cutoff);
		Ok((before - events.len()) as u64)
	}
}

#[async_trait::async_trait]
impl SubscriptionStore for MemoryStore {
	async fn find_alert_subscriptions_by_timing(&self, timing: AlertTiming) -> Result<Vec<AlertSubscription>> {
		Ok(self
			.alerts
			.lock()
			.unwrap()
			.iter()
			.filter(|s| s.timings.contains(&timing))
			.cloned()
			.collect())
	}

	async fn find_alert_subscriptions_by_server(&self, server_id: &str) -> Result<Vec<AlertSubscription>> {
		Ok(self
			.alerts
			.lock()
			.unwrap()
			.iter()
			.filter(|s| s.server_id == server_id)
			.cloned()
			.collect())
	}

	async fn create_alert_subscription(&self, new: NewAlertSubscription) -> Result<AlertSubscription> {
		let mut alerts = self.alerts.lock().unwrap();

		if let Some(existing) = alerts
			.iter_mut()
			.find(|s| s.server_id == new.server_id && s.channel_id == new.channel_id)
		{
			existing.role_id = new.role_id;
			existing.impacts = new.impacts;
			existing.currencies = new.currencies;
			existing.timings = new.timings;
			return Ok(existing.clone());
		}

		let subscription = AlertSubscription {
			id: Ulid::new(),
			server_id: new.server_id,
			channel_id: new.channel_id,
			role_id: new.role_id,
			impacts: new.impacts,
			currencies: new.currencies,
			timings: new.timings,
			created_at: Utc::now(),
		};
		alerts.push(subscription.clone());

		Ok(subscription)
	}

	async fn update_alert_subscription(&self, id: Ulid, patch: AlertSubscriptionPatch) -> Result<Option<AlertSubscription>> {
		let mut alerts = self.alerts.lock().unwrap();
		let Some(existing) = alerts.iter_mut().find(|s| s.id == id) else {
			return Ok(None);
		};

		if let Some(role_id) = patch.role_id {
			existing.role_id = role_id;
		}
		if let Some(impacts) = patch.impacts {
			existing.impacts = impacts;
		}
		if let Some(currencies) = patch.currencies {
			existing.currencies = currencies;
		}
		if let Some(timings) = patch.timings {
			existing.timings = timings;
		}

		Ok(Some(existing.clone()))
	}

	async fn delete_alert_subscription(&self, id: Ulid) -> Result<bool> {
		let mut alerts = self.alerts.lock().unwrap();
		let before = alerts.len();
		alerts.retain(|s| s.id != id);
		Ok(alerts.len() != before)
	}

	async fn find_schedule_subscriptions_by_server(&self, server_id: &str) -> Result<Vec<ScheduleSubscription>> {
		Ok(self
			.schedules
			.lock()
			.unwrap()
			.iter()
			.filter(|s| s.server_id == server_id)
			.cloned()
			.collect())
	}

	async fn find_all_schedule_subscriptions(&self) -> Result<Vec<ScheduleSubscription>> {
		Ok(self.schedules.lock().unwrap().clone())
	}

	async fn create_schedule_subscription(&self, new: NewScheduleSubscription) -> Result<ScheduleSubscription> {
		let subscription = ScheduleSubscription {
			id: Ulid::new(),
			server_id: new.server_id,
			channel_id: new.channel_id,
			role_id: new.role_id,
			hour: new.hour,
			minute: new.minute,
			timezone: new.timezone,
			frequency: new.frequency,
			news_scope: new.news_scope,
			market: new.market,
			impacts: new.impacts,
			currencies: new.currencies,
			time_display: new.time_display,
			created_at: Utc::now(),
		};
		self.schedules.lock().unwrap().push(subscription.clone());
		Ok(subscription)
	}

	async fn update_schedule_subscription(
		&self,
		id: Ulid,
		patch: ScheduleSubscriptionPatch,
	) -> Result<Option<ScheduleSubscription>> {
		let mut schedules = self.schedules.lock().unwrap();
		let Some(existing) = schedules.iter_mut().find(|s| s.id == id) else {
			return Ok(None);
		};

		if let Some(hour) = patch.hour {
			existing.hour = hour;
		}
		if let Some(minute) = patch.minute {
			existing.minute = minute;
		}
		if let Some(role_id) = patch.role_id {
			existing.role_id = role_id;
		}

		Ok(Some(existing.clone()))
	}

	async fn delete_schedule_subscription(&self, id: Ulid) -> Result<bool> {
		let mut schedules = self.schedules.lock().unwrap();
		let before = schedules.len();
		schedules.retain(|s| s.id != id);
		Ok(schedules.len() != before)
	}
}

/// Records everything published. Alerts for channels in `fail_channels`
/// are rejected.
#[derive(Default)]
pub struct RecordingPublisher {
	pub alerts: Mutex<Vec<AlertMessage>>,
	pub schedules: Mutex<Vec<ScheduleTask>>,
	pub fail_channels: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl Publisher for RecordingPublisher {
	async fn publish_alert(&self, message: &AlertMessage) -> std::result::Result<(), QueueError> {
		if self.fail_channels.lock().unwrap().contains(&message.channel_id) {
			return Err(QueueError::Rejected);
		}

		self.alerts.lock().unwrap().push(message.clone());
		Ok(())
	}

	async fn publish_schedule(&self, task: &ScheduleTask) -> std::result::Result<(), QueueError> {
		self.schedules.lock().unwrap().push(task.clone());
		Ok(())
	}
}

pub enum OracleAnswer {
	Capability(Capability),
	Unavailable,
}

pub struct StaticOracle(pub OracleAnswer);

impl StaticOracle {
	pub fn available() -> Self {
		Self(OracleAnswer::Capability(Capability::Available))
	}
}

#[async_trait::async_trait]
impl CapabilityOracle for StaticOracle {
	async fn check(&self, _: &crate::database::Destination) -> std::result::Result<Capability, DiscordError> {
		match &self.0 {
			OracleAnswer::Capability(capability) => Ok(*capability),
			OracleAnswer::Unavailable => Err(DiscordError::Status {
				status: reqwest::StatusCode::BAD_GATEWAY,
				body: String::new(),
			}),
		}
	}
}

/// Records sent pages. Each send pops the next scripted status, if any:
/// `Some(status)` fails that send with the status.
#[derive(Default)]
pub struct RecordingSender {
	pub sent: Mutex<Vec<(String, OutboundMessage)>>,
	pub script: Mutex<VecDeque<Option<reqwest::StatusCode>>>,
}

impl RecordingSender {
	pub fn scripted(script: impl IntoIterator<Item = Option<reqwest::StatusCode>>) -> Self {
		Self {
			sent: Mutex::default(),
			script: Mutex::new(script.into_iter().collect()),
		}
	}
}

#[async_trait::async_trait]
impl MessageSender for RecordingSender {
	async fn send(&self, channel_id: &str, message: &OutboundMessage) -> std::result::Result<(), DiscordError> {
		if let Some(Some(status)) = self.script.lock().unwrap().pop_front() {
			return Err(DiscordError::Status {
				status,
				body: String::new(),
			});
		}

		self.sent.lock().unwrap().push((channel_id.to_string(), message.clone()));
		Ok(())
	}
}

#[derive(Default)]
pub struct StaticFeed {
	pub entries: Vec<FeedEvent>,
}

#[async_trait::async_trait]
impl NewsFeed for StaticFeed {
	async fn weekly_events(&self, market: Market) -> std::result::Result<Vec<FeedEvent>, FeedError> {
		if market == Market::Forex {
			Ok(self.entries.clone())
		} else {
			Err(FeedError::Status(reqwest::StatusCode::NOT_FOUND))
		}
	}
}

pub struct GlobalState {
	ctx: Context,
	config: AppConfig,
	pub store: Arc<MemoryStore>,
	pub publisher: Arc<RecordingPublisher>,
	pub sender: Arc<RecordingSender>,
	events: Arc<dyn EventStore>,
	subscriptions: Arc<dyn SubscriptionStore>,
	publisher_dyn: Arc<dyn Publisher>,
	oracle: Arc<dyn CapabilityOracle>,
	sender_dyn: Arc<dyn MessageSender>,
	feed: Arc<dyn NewsFeed>,
	alert_matcher: AlertMatcher,
	schedule_dedup: DedupRecord<ScheduleKey>,
}

impl common::global::GlobalCtx for GlobalState {
	fn ctx(&self) -> &Context {
		&self.ctx
	}
}

impl common::global::GlobalConfigProvider<AppConfig> for GlobalState {
	fn provide_config(&self) -> &AppConfig {
		&self.config
	}
}

impl common::global::GlobalConfig for GlobalState {}

impl crate::global::NewsState for GlobalState {
	fn events(&self) -> &Arc<dyn EventStore> {
		&self.events
	}

	fn subscriptions(&self) -> &Arc<dyn SubscriptionStore> {
		&self.subscriptions
	}

	fn publisher(&self) -> &Arc<dyn Publisher> {
		&self.publisher_dyn
	}

	fn oracle(&self) -> &Arc<dyn CapabilityOracle> {
		&self.oracle
	}

	fn sender(&self) -> &Arc<dyn MessageSender> {
		&self.sender_dyn
	}

	fn feed(&self) -> &Arc<dyn NewsFeed> {
		&self.feed
	}

	fn alert_matcher(&self) -> &AlertMatcher {
		&self.alert_matcher
	}

	fn schedule_dedup(&self) -> &DedupRecord<ScheduleKey> {
		&self.schedule_dedup
	}
}

pub fn mock_global_state(config: AppConfig, feed: StaticFeed) -> (Arc<GlobalState>, Handler) {
	let (ctx, handler) = Context::new();

	let store = Arc::new(MemoryStore::default());
	let publisher = Arc::new(RecordingPublisher::default());
	let sender = Arc::new(RecordingSender::default());

	let global = Arc::new(GlobalState {
		ctx,
		store: store.clone(),
		publisher: publisher.clone(),
		sender: sender.clone(),
		events: store.clone(),
		subscriptions: store,
		publisher_dyn: publisher,
		oracle: Arc::new(StaticOracle::available()),
		sender_dyn: sender,
		feed: Arc::new(feed),
		alert_matcher: AlertMatcher::new(config.dedup.capacity),
		schedule_dedup: DedupRecord::new(config.dedup.capacity),
		config,
	});

	(global, handler)
}

pub async fn teardown(global: Arc<GlobalState>, handler: Handler) {
	drop(global);
	handler.cancel().await;
}
