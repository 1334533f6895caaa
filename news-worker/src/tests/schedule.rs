use chrono::FixedOffset;

use crate::config::AppConfig;
use crate::database::{Currency, Frequency, Impact, NewsScope, TimeDisplay};
use crate::schedule::{is_due, parse_offset, scope_window, tick};
use crate::tests::utils::{at, event, mock_global_state, naive, schedule_subscription, teardown, StaticFeed};

fn offset(secs: i32) -> FixedOffset {
	FixedOffset::east_opt(secs).unwrap()
}

#[test]
fn test_parse_offset() {
	assert_eq!(parse_offset("UTC"), Some(offset(0)));
	assert_eq!(parse_offset(" utc "), Some(offset(0)));
	assert_eq!(parse_offset("UTC+05:30"), Some(offset(5 * 3600 + 1800)));
	assert_eq!(parse_offset("-03:00"), Some(offset(-3 * 3600)));
	assert_eq!(parse_offset("GMT+1"), Some(offset(3600)));
	assert_eq!(parse_offset("+0545"), Some(offset(5 * 3600 + 45 * 60)));

	assert_eq!(parse_offset("Europe/London"), None);
	assert_eq!(parse_offset("UTC+25:00"), None);
	assert_eq!(parse_offset("UTC+05:75"), None);
	assert_eq!(parse_offset("UTC+"), None);
}

#[test]
fn test_daily_schedule_is_due_at_local_minute() {
	let schedule = schedule_subscription(9, 0, "UTC+05:30", Frequency::Daily);
	let tz = offset(5 * 3600 + 1800);

	assert!(is_due(&schedule, &at("2024-03-12T03:30:00Z").with_timezone(&tz)));
	assert!(is_due(&schedule, &at("2024-03-12T03:30:59Z").with_timezone(&tz)));
	assert!(!is_due(&schedule, &at("2024-03-12T03:31:00Z").with_timezone(&tz)));
	assert!(!is_due(&schedule, &at("2024-03-12T09:00:00Z").with_timezone(&tz)));
}

#[test]
fn test_weekly_schedule_fires_on_monday() {
	let schedule = schedule_subscription(8, 0, "UTC", Frequency::Weekly);
	let utc = offset(0);

	assert!(is_due(&schedule, &at("2024-03-11T08:00:00Z").with_timezone(&utc)));
	assert!(!is_due(&schedule, &at("2024-03-12T08:00:00Z").with_timezone(&utc)));
}

#[test]
fn test_scope_window_is_local() {
	let local = at("2024-03-13T03:30:00Z").with_timezone(&offset(5 * 3600 + 1800));

	assert_eq!(
		scope_window(NewsScope::Daily, &local),
		(naive("2024-03-12T18:30:00Z"), naive("2024-03-13T18:30:00Z"))
	);
	assert_eq!(
		scope_window(NewsScope::Weekly, &local),
		(naive("2024-03-10T18:30:00Z"), naive("2024-03-17T18:30:00Z"))
	);
}

#[tokio::test]
async fn test_schedule_fires_once_per_local_minute() {
	let (global, handler) = mock_global_state(AppConfig::default(), StaticFeed::default());

	let mut schedule = schedule_subscription(9, 0, "UTC+05:30", Frequency::Daily);
	schedule.impacts = vec![Impact::High];
	schedule.time_display = TimeDisplay::Relative;
	global.store.schedules.lock().unwrap().push(schedule.clone());

	global.store.events.lock().unwrap().extend([
		event("CPI y/y", naive("2024-03-12T12:30:00Z"), Impact::High, Currency::Usd),
		event("Trade Balance", naive("2024-03-12T13:00:00Z"), Impact::Low, Currency::Usd),
		event("GDP m/m", naive("2024-03-13T07:00:00Z"), Impact::High, Currency::Gbp),
	]);

	assert_eq!(tick(&global, at("2024-03-12T03:30:05Z")).await.unwrap(), 1);
	assert_eq!(tick(&global, at("2024-03-12T03:30:40Z")).await.unwrap(), 0);
	assert_eq!(tick(&global, at("2024-03-12T03:31:00Z")).await.unwrap(), 0);

	let tasks = global.publisher.schedules.lock().unwrap().clone();
	assert_eq!(tasks.len(), 1);
	assert_eq!(tasks[0].schedule_id, schedule.id);
	assert_eq!(tasks[0].timezone, "UTC+05:30");
	assert_eq!(tasks[0].time_display, TimeDisplay::Relative);
	let titles = tasks[0].news.iter().map(|e| e.title.as_str()).collect::<Vec<_>>();
	assert_eq!(titles, vec!["CPI y/y"]);

	assert_eq!(tick(&global, at("2024-03-13T03:30:00Z")).await.unwrap(), 1);

	teardown(global, handler).await;
}

#[tokio::test]
async fn test_bad_schedules_are_skipped() {
	let (global, handler) = mock_global_state(AppConfig::default(), StaticFeed::default());

	let unknown_zone = schedule_subscription(9, 0, "Mars/Olympus", Frequency::Daily);
	let mut bad_channel = schedule_subscription(9, 0, "UTC", Frequency::Daily);
	bad_channel.channel_id = "general".to_string();
	let good = schedule_subscription(9, 0, "UTC", Frequency::Daily);
	global
		.store
		.schedules
		.lock()
		.unwrap()
		.extend([unknown_zone, bad_channel, good.clone()]);

	assert_eq!(tick(&global, at("2024-03-12T09:00:00Z")).await.unwrap(), 1);
	assert_eq!(global.publisher.schedules.lock().unwrap()[0].schedule_id, good.id);

	teardown(global, handler).await;
}
