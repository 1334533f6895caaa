use chrono::{DateTime, Utc};
use common::database::Ulid;
use serde::{Deserialize, Serialize};

use crate::database::{AlertTiming, Currency, Destination, Impact, Market, NewsEvent, TimeDisplay};
use crate::matcher::AlertBatch;

/// An event as it travels on the queues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPayload {
	pub title: String,
	pub country: Currency,
	pub impact: Impact,
	pub date: DateTime<Utc>,
	#[serde(default)]
	pub forecast: Option<String>,
	#[serde(default)]
	pub previous: Option<String>,
}

impl From<&NewsEvent> for EventPayload {
	fn from(event: &NewsEvent) -> Self {
		Self {
			title: event.title.clone(),
			country: event.currency,
			impact: event.impact,
			date: event.scheduled_utc(),
			forecast: event.forecast.clone(),
			previous: event.previous.clone(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WireError {
	#[error("grouped alert without events")]
	MissingEvents,
	#[error("single alert missing {0}")]
	MissingField(&'static str),
}

/// Payload of the alert queue.
///
/// A single event is sent flat, with its fields next to the routing fields,
/// and several events go in an `events` list with `isGrouped` set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "AlertWire", try_from = "AlertWire")]
pub struct AlertMessage {
	pub events: Vec<EventPayload>,
	pub alert_type: AlertTiming,
	pub server_id: String,
	pub channel_id: String,
	pub role_id: Option<String>,
}

impl AlertMessage {
	pub fn from_batch(batch: &AlertBatch) -> Self {
		Self {
			events: batch.events.iter().map(EventPayload::from).collect(),
			alert_type: batch.timing,
			server_id: batch.destination.server_id.clone(),
			channel_id: batch.destination.channel_id.clone(),
			role_id: batch.role_id.clone(),
		}
	}

	pub fn destination(&self) -> Destination {
		Destination::new(&self.server_id, &self.channel_id)
	}

	pub fn is_grouped(&self) -> bool {
		self.events.len() != 1
	}
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlertWire {
	#[serde(default)]
	is_grouped: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	events: Option<Vec<EventPayload>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	title: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	country: Option<Currency>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	impact: Option<Impact>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	date: Option<DateTime<Utc>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	forecast: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	previous: Option<String>,
	alert_type: AlertTiming,
	server_id: String,
	channel_id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	role_id: Option<String>,
}

impl From<AlertMessage> for AlertWire {
	fn from(message: AlertMessage) -> Self {
		let mut wire = AlertWire {
			is_grouped: message.is_grouped(),
			events: None,
			title: None,
			country: None,
			impact: None,
			date: None,
			forecast: None,
			previous: None,
			alert_type: message.alert_type,
			server_id: message.server_id,
			channel_id: message.channel_id,
			role_id: message.role_id,
		};

		let mut events = message.events;
		if wire.is_grouped {
			wire.events = Some(events);
		} else if let Some(event) = events.pop() {
			wire.title = Some(event.title);
			wire.country = Some(event.country);
			wire.impact = Some(event.impact);
			wire.date = Some(event.date);
			wire.forecast = event.forecast;
			wire.previous = event.previous;
		}

		wire
	}
}

impl TryFrom<AlertWire> for AlertMessage {
	type Error = WireError;

	fn try_from(wire: AlertWire) -> Result<Self, Self::Error> {
		let events = if wire.is_grouped {
			wire.events.ok_or(WireError::MissingEvents)?
		} else {
			vec![EventPayload {
				title: wire.title.ok_or(WireError::MissingField("title"))?,
				country: wire.country.ok_or(WireError::MissingField("country"))?,
				impact: wire.impact.ok_or(WireError::MissingField("impact"))?,
				date: wire.date.ok_or(WireError::MissingField("date"))?,
				forecast: wire.forecast,
				previous: wire.previous,
			}]
		};

		Ok(Self {
			events,
			alert_type: wire.alert_type,
			server_id: wire.server_id,
			channel_id: wire.channel_id,
			role_id: wire.role_id,
		})
	}
}

/// Payload of the schedule queue: one digest for one destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleTask {
	pub schedule_id: Ulid,
	pub server_id: String,
	pub channel_id: String,
	pub news: Vec<EventPayload>,
	pub market: Market,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub role_id: Option<String>,
	#[serde(default = "default_time_display")]
	pub time_display: TimeDisplay,
	#[serde(default = "default_timezone")]
	pub timezone: String,
}

fn default_time_display() -> TimeDisplay {
	TimeDisplay::Fixed
}

fn default_timezone() -> String {
	"UTC".to_string()
}

impl ScheduleTask {
	pub fn destination(&self) -> Destination {
		Destination::new(&self.server_id, &self.channel_id)
	}
}
