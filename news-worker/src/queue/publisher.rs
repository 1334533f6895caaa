use std::sync::Arc;

use common::rmq::{ConnectionPool, QueueError};

use super::{AlertMessage, ScheduleTask};

#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
	async fn publish_alert(&self, message: &AlertMessage) -> Result<(), QueueError>;

	async fn publish_schedule(&self, task: &ScheduleTask) -> Result<(), QueueError>;
}

/// Publishes onto the two durable queues of a RabbitMQ pool.
pub struct RmqPublisher {
	pool: Arc<ConnectionPool>,
	alert_queue: String,
	schedule_queue: String,
}

impl RmqPublisher {
	/// Declares both queues so that nothing published before the first
	/// consumer attaches is lost.
	pub async fn new(pool: Arc<ConnectionPool>, alert_queue: &str, schedule_queue: &str) -> Result<Self, QueueError> {
		pool.declare_durable_queue(alert_queue).await?;
		pool.declare_durable_queue(schedule_queue).await?;

		Ok(Self {
			pool,
			alert_queue: alert_queue.to_string(),
			schedule_queue: schedule_queue.to_string(),
		})
	}
}

#[async_trait::async_trait]
impl Publisher for RmqPublisher {
	async fn publish_alert(&self, message: &AlertMessage) -> Result<(), QueueError> {
		self.pool.publish_json(&self.alert_queue, message).await
	}

	async fn publish_schedule(&self, task: &ScheduleTask) -> Result<(), QueueError> {
		self.pool.publish_json(&self.schedule_queue, task).await
	}
}
