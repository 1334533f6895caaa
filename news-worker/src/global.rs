use std::sync::Arc;

use crate::config::AppConfig;
use crate::dedup::DedupRecord;
use crate::delivery::{CapabilityOracle, MessageSender};
use crate::ingest::NewsFeed;
use crate::matcher::AlertMatcher;
use crate::queue::Publisher;
use crate::schedule::ScheduleKey;
use crate::store::{EventStore, SubscriptionStore};

pub trait NewsState {
	fn events(&self) -> &Arc<dyn EventStore>;
	fn subscriptions(&self) -> &Arc<dyn SubscriptionStore>;
	fn publisher(&self) -> &Arc<dyn Publisher>;
	fn oracle(&self) -> &Arc<dyn CapabilityOracle>;
	fn sender(&self) -> &Arc<dyn MessageSender>;
	fn feed(&self) -> &Arc<dyn NewsFeed>;

	/// Shared by every scanner tick.
	fn alert_matcher(&self) -> &AlertMatcher;

	/// Digests already published, shared by every schedule tick.
	fn schedule_dedup(&self) -> &DedupRecord<ScheduleKey>;
}

pub trait NewsGlobal:
	common::global::GlobalCtx
	+ common::global::GlobalConfigProvider<AppConfig>
	+ common::global::GlobalConfig
	+ NewsState
	+ Send
	+ Sync
	+ 'static
{
}

impl<T> NewsGlobal for T where
	T: common::global::GlobalCtx
		+ common::global::GlobalConfigProvider<AppConfig>
		+ common::global::GlobalConfig
		+ NewsState
		+ Send
		+ Sync
		+ 'static
{
}
