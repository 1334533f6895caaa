use chrono::Duration;

use crate::config::AppConfig;
use crate::database::{Currency, Impact};
use crate::retention::sweep;
use crate::tests::utils::{at, event, mock_global_state, teardown, StaticFeed};

#[tokio::test]
async fn test_sweep_keeps_the_retention_window() {
	let (global, handler) = mock_global_state(AppConfig::default(), StaticFeed::default());

	let now = at("2024-03-17T03:00:00Z");
	let old = event("Retail Sales m/m", (now - Duration::days(31)).naive_utc(), Impact::High, Currency::Usd);
	let recent = event("Retail Sales m/m", (now - Duration::days(29)).naive_utc(), Impact::High, Currency::Usd);
	global.store.events.lock().unwrap().extend([old, recent.clone()]);

	assert_eq!(sweep(&global, now).await.unwrap(), 1);

	let remaining = global.store.events.lock().unwrap().clone();
	assert_eq!(remaining, vec![recent]);

	teardown(global, handler).await;
}

#[tokio::test]
async fn test_sweep_uses_configured_days() {
	let mut config = AppConfig::default();
	config.retention.days = 7;
	let (global, handler) = mock_global_state(config, StaticFeed::default());

	let now = at("2024-03-17T03:00:00Z");
	global.store.events.lock().unwrap().push(event(
		"Bank Holiday",
		(now - Duration::days(8)).naive_utc(),
		Impact::Holiday,
		Currency::Jpy,
	));

	assert_eq!(sweep(&global, now).await.unwrap(), 1);
	assert!(global.store.events.lock().unwrap().is_empty());

	teardown(global, handler).await;
}

#[tokio::test]
async fn test_sweep_rejects_out_of_range_retention() {
	let mut config = AppConfig::default();
	config.retention.days = u32::MAX;
	let (global, handler) = mock_global_state(config, StaticFeed::default());

	let now = at("2024-03-17T03:00:00Z");
	global.store.events.lock().unwrap().push(event(
		"CPI m/m",
		(now - Duration::days(1)).naive_utc(),
		Impact::High,
		Currency::Usd,
	));

	assert!(sweep(&global, now).await.is_err());
	assert_eq!(global.store.events.lock().unwrap().len(), 1);

	teardown(global, handler).await;
}
