use common::database::Ulid;

use crate::database::{AlertSubscription, AlertTiming, Destination, NewsEvent};
use crate::dedup::DedupRecord;

/// Events bound for one destination at one timing.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertBatch {
	pub subscription_id: Ulid,
	pub destination: Destination,
	pub role_id: Option<String>,
	pub timing: AlertTiming,
	pub events: Vec<NewsEvent>,
}

/// Matches due events against alert subscriptions, remembering which
/// `(event, timing)` pairs have already been handed out.
pub struct AlertMatcher {
	sent: DedupRecord<(Ulid, AlertTiming)>,
}

impl AlertMatcher {
	pub fn new(capacity: usize) -> Self {
		Self {
			sent: DedupRecord::new(capacity),
		}
	}

	/// One batch per subscription that wants at least one of `events`.
	///
	/// Pairs already marked are dropped from every subscription's candidates,
	/// and every matched pair is marked before returning. Filtering, matching
	/// and marking happen under one lock, so overlapping calls never hand out
	/// the same pair twice.
	pub fn match_events(
		&self,
		events: &[NewsEvent],
		timing: AlertTiming,
		subscriptions: &[AlertSubscription],
	) -> Vec<AlertBatch> {
		let mut sent = self.sent.lock();

		let candidates = events
			.iter()
			.filter(|event| !sent.contains(&(event.id, timing)))
			.collect::<Vec<_>>();

		if candidates.is_empty() {
			return Vec::new();
		}

		let mut batches = Vec::new();

		for subscription in subscriptions {
			if let Err(reason) = subscription.validate() {
				tracing::warn!(subscription_id = %subscription.id, reason, "skipping malformed alert subscription");
				continue;
			}

			let matched = candidates
				.iter()
				.filter(|event| subscription.matches(event, timing))
				.map(|event| (*event).clone())
				.collect::<Vec<_>>();

			if matched.is_empty() {
				continue;
			}

			batches.push(AlertBatch {
				subscription_id: subscription.id,
				destination: subscription.destination(),
				role_id: subscription.role_id.clone(),
				timing,
				events: matched,
			});
		}

		for batch in &batches {
			for event in &batch.events {
				sent.mark((event.id, timing));
			}
		}

		batches
	}
}
