use std::sync::Arc;

use common::context::Context;
use common::rmq::{ConnectionPool, QueueError};
use futures::StreamExt;
use lapin::message::Delivery;
use lapin::options::{BasicAckOptions, BasicNackOptions};
use serde::de::DeserializeOwned;
use tokio::select;
use tokio::task::JoinSet;
use tracing::Instrument;

/// What to do with a delivery once its handler has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
	/// Remove it from the queue. Used for success and for deliveries that can
	/// never succeed.
	Ack,
	/// Put it back for another attempt.
	Requeue,
}

#[async_trait::async_trait]
pub trait Handler: Send + Sync + 'static {
	type Message: DeserializeOwned + Send;

	async fn handle(&self, message: Self::Message) -> Outcome;
}

/// Decodes `body` and runs it through `handler`. A body that does not decode
/// would fail the same way on every redelivery, so it is acked and logged.
pub async fn dispatch<H: Handler>(handler: &H, body: &[u8]) -> Outcome {
	match serde_json::from_slice::<H::Message>(body) {
		Ok(message) => handler.handle(message).await,
		Err(err) => {
			tracing::warn!(error = %err, body = %String::from_utf8_lossy(body), "dropping undecodable message");
			Outcome::Ack
		}
	}
}

async fn settle(delivery: &Delivery, outcome: Outcome) {
	let result = match outcome {
		Outcome::Ack => delivery.ack(BasicAckOptions::default()).await,
		Outcome::Requeue => {
			delivery
				.nack(BasicNackOptions {
					requeue: true,
					..Default::default()
				})
				.await
		}
	};

	if let Err(err) = result {
		tracing::error!(error = %err, ?outcome, "failed to settle delivery");
	}
}

/// Consumes `queue` until `ctx` is cancelled, handling each delivery on its
/// own task. At most `prefetch` deliveries are in flight. On cancellation no
/// new deliveries are taken and the call returns once every in-flight one
/// has been settled.
pub async fn run<H: Handler>(
	ctx: &Context,
	pool: &ConnectionPool,
	queue: &str,
	consumer_tag: &str,
	prefetch: u16,
	handler: Arc<H>,
) -> Result<(), QueueError> {
	let mut deliveries = Box::pin(pool.basic_consume(queue, consumer_tag, prefetch));
	let mut in_flight = JoinSet::new();

	tracing::info!(queue, "consumer started");

	loop {
		select! {
			delivery = deliveries.next() => {
				let delivery = match delivery {
					Some(Ok(delivery)) => delivery,
					Some(Err(err)) => {
						tracing::error!(queue, error = %err, "failed to receive delivery");
						continue;
					}
					None => break,
				};

				let handler = handler.clone();
				let span = tracing::info_span!("delivery", queue, tag = delivery.delivery_tag, redelivered = delivery.redelivered);
				in_flight.spawn(
					async move {
						let outcome = dispatch(handler.as_ref(), &delivery.data).await;
						tracing::debug!(?outcome, "handled delivery");
						settle(&delivery, outcome).await;
					}
					.instrument(span),
				);
			}
			Some(result) = in_flight.join_next() => {
				if let Err(err) = result {
					tracing::error!(queue, error = %err, "delivery task failed");
				}
			}
			_ = ctx.done() => break,
		}
	}

	drop(deliveries);

	tracing::info!(queue, in_flight = in_flight.len(), "consumer stopping, draining in-flight deliveries");

	while let Some(result) = in_flight.join_next().await {
		if let Err(err) = result {
			tracing::error!(queue, error = %err, "delivery task failed");
		}
	}

	Ok(())
}
