use std::sync::Arc;

use chrono::{Offset, Utc};

use super::{deliver, render_pages, Banner, CapabilityOracle, MessageSender, TimeFormat};
use crate::queue::{AlertMessage, Handler, Outcome, ScheduleTask};
use crate::schedule::parse_offset;

/// Delivers messages from the alert queue.
pub struct AlertHandler {
	oracle: Arc<dyn CapabilityOracle>,
	sender: Arc<dyn MessageSender>,
}

impl AlertHandler {
	pub fn new(oracle: Arc<dyn CapabilityOracle>, sender: Arc<dyn MessageSender>) -> Self {
		Self { oracle, sender }
	}
}

#[async_trait::async_trait]
impl Handler for AlertHandler {
	type Message = AlertMessage;

	async fn handle(&self, message: AlertMessage) -> Outcome {
		// Alerts carry no timezone, so times go out as Discord timestamps.
		let pages = render_pages(
			&message.events,
			Banner::from(message.alert_type),
			&TimeFormat::relative(),
			message.role_id.as_deref(),
		);

		deliver(self.oracle.as_ref(), self.sender.as_ref(), &message.destination(), &pages).await
	}
}

/// Delivers digests from the schedule queue.
pub struct ScheduleHandler {
	oracle: Arc<dyn CapabilityOracle>,
	sender: Arc<dyn MessageSender>,
}

impl ScheduleHandler {
	pub fn new(oracle: Arc<dyn CapabilityOracle>, sender: Arc<dyn MessageSender>) -> Self {
		Self { oracle, sender }
	}
}

#[async_trait::async_trait]
impl Handler for ScheduleHandler {
	type Message = ScheduleTask;

	async fn handle(&self, task: ScheduleTask) -> Outcome {
		let offset = parse_offset(&task.timezone).unwrap_or_else(|| {
			tracing::warn!(schedule_id = %task.schedule_id, timezone = %task.timezone, "unknown timezone, using UTC");
			Utc.fix()
		});

		let format = TimeFormat {
			display: task.time_display,
			offset,
		};

		let pages = render_pages(&task.news, Banner::Digest(task.market), &format, task.role_id.as_deref());

		deliver(self.oracle.as_ref(), self.sender.as_ref(), &task.destination(), &pages).await
	}
}
