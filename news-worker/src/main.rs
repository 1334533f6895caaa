use std::sync::Arc;

use anyhow::Context as _;
use common::bootstrap::{bootstrap, Global};
use common::context::Context;
use common::global::{setup_database, setup_rmq, GlobalCtx, GlobalDb, GlobalRmq};
use common::impl_global_traits;
use news_worker::config::AppConfig;
use news_worker::dedup::DedupRecord;
use news_worker::delivery::{AlertHandler, CapabilityOracle, MessageSender, ScheduleHandler};
use news_worker::discord::DiscordClient;
use news_worker::ingest::{ForexFactoryFeed, NewsFeed};
use news_worker::matcher::AlertMatcher;
use news_worker::queue::{self, Publisher, RmqPublisher};
use news_worker::schedule::ScheduleKey;
use news_worker::store::{EventStore, PgStore, SubscriptionStore};
use news_worker::{ingest, retention, scanner, schedule};
use tokio::task::JoinSet;

struct GlobalState {
	ctx: Context,
	db: Arc<sqlx::PgPool>,
	rmq: Arc<common::rmq::ConnectionPool>,
	config: AppConfig,
	events: Arc<dyn EventStore>,
	subscriptions: Arc<dyn SubscriptionStore>,
	publisher: Arc<dyn Publisher>,
	oracle: Arc<dyn CapabilityOracle>,
	sender: Arc<dyn MessageSender>,
	feed: Arc<dyn NewsFeed>,
	alert_matcher: AlertMatcher,
	schedule_dedup: DedupRecord<ScheduleKey>,
}

impl_global_traits!(GlobalState);

impl common::global::GlobalConfigProvider<AppConfig> for GlobalState {
	#[inline(always)]
	fn provide_config(&self) -> &AppConfig {
		&self.config
	}
}

impl news_worker::global::NewsState for GlobalState {
	#[inline(always)]
	fn events(&self) -> &Arc<dyn EventStore> {
		&self.events
	}

	#[inline(always)]
	fn subscriptions(&self) -> &Arc<dyn SubscriptionStore> {
		&self.subscriptions
	}

	#[inline(always)]
	fn publisher(&self) -> &Arc<dyn Publisher> {
		&self.publisher
	}

	#[inline(always)]
	fn oracle(&self) -> &Arc<dyn CapabilityOracle> {
		&self.oracle
	}

	#[inline(always)]
	fn sender(&self) -> &Arc<dyn MessageSender> {
		&self.sender
	}

	#[inline(always)]
	fn feed(&self) -> &Arc<dyn NewsFeed> {
		&self.feed
	}

	#[inline(always)]
	fn alert_matcher(&self) -> &AlertMatcher {
		&self.alert_matcher
	}

	#[inline(always)]
	fn schedule_dedup(&self) -> &DedupRecord<ScheduleKey> {
		&self.schedule_dedup
	}
}

impl Global<AppConfig> for GlobalState {
	async fn new(ctx: Context, config: AppConfig) -> anyhow::Result<Self> {
		let db = setup_database(&config.database).await?;

		if config.database.migrate {
			sqlx::migrate!("./migrations")
				.run(db.as_ref())
				.await
				.context("failed to run migrations")?;
		}

		let rmq = setup_rmq(&ctx, &config.name, &config.rmq).await?;

		let publisher = RmqPublisher::new(rmq.clone(), &config.queues.alert_queue, &config.queues.schedule_queue)
			.await
			.context("failed to declare queues")?;

		let discord = Arc::new(DiscordClient::new(&config.discord).context("failed to create discord client")?);
		let feed = ForexFactoryFeed::new(&config.ingest).context("failed to create feed client")?;
		let store = Arc::new(PgStore::new(db.clone()));

		Ok(Self {
			ctx,
			db,
			rmq,
			events: store.clone(),
			subscriptions: store,
			publisher: Arc::new(publisher),
			oracle: discord.clone(),
			sender: discord,
			feed: Arc::new(feed),
			alert_matcher: AlertMatcher::new(config.dedup.capacity),
			schedule_dedup: DedupRecord::new(config.dedup.capacity),
			config,
		})
	}
}

#[tokio::main]
pub async fn main() {
	if let Err(err) = bootstrap::<AppConfig, GlobalState, _>(|global| async move {
		if global.config.ingest.sync_on_startup {
			ingest::sync(&global).await;
		}

		let mut tasks = JoinSet::new();

		tasks.spawn(scanner::run(global.clone()));
		tasks.spawn(schedule::run(global.clone()));
		tasks.spawn(ingest::run(global.clone()));
		tasks.spawn(retention::run(global.clone()));

		let queues = &global.config.queues;

		if global.config.consumers.alerts.enabled {
			let handler = Arc::new(AlertHandler::new(global.oracle.clone(), global.sender.clone()));
			let global = global.clone();
			let queue_name = queues.alert_queue.clone();
			let prefetch = queues.prefetch;
			tasks.spawn(async move {
				if let Err(err) = queue::run(global.ctx(), global.rmq(), &queue_name, "news-worker-alerts", prefetch, handler).await {
					tracing::error!(error = %err, "alert consumer failed");
				}
			});
		}

		if global.config.consumers.schedules.enabled {
			let handler = Arc::new(ScheduleHandler::new(global.oracle.clone(), global.sender.clone()));
			let global = global.clone();
			let queue_name = queues.schedule_queue.clone();
			let prefetch = queues.prefetch;
			tasks.spawn(async move {
				if let Err(err) = queue::run(global.ctx(), global.rmq(), &queue_name, "news-worker-schedules", prefetch, handler).await {
					tracing::error!(error = %err, "schedule consumer failed");
				}
			});
		}

		global.ctx().done().await;

		while let Some(result) = tasks.join_next().await {
			result.context("task panicked")?;
		}

		global.rmq().close().await;
		global.db().close().await;

		Ok(())
	})
	.await
	{
		tracing::error!("{:#}", err);
		std::process::exit(1);
	}
}
