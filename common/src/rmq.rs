use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use async_stream::stream;
use futures::{Stream, StreamExt};
use lapin::message::Delivery;
use lapin::options::{BasicConsumeOptions, BasicPublishOptions, BasicQosOptions, ConfirmSelectOptions, QueueDeclareOptions};
use lapin::publisher_confirm::Confirmation;
use lapin::topology::TopologyDefinition;
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::Instrument;

/// AMQP delivery mode for messages that survive a broker restart.
const PERSISTENT: u8 = 2;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
	#[error("amqp: {0}")]
	Amqp(#[from] lapin::Error),
	#[error("failed to encode message: {0}")]
	Encode(#[from] serde_json::Error),
	#[error("timed out after {0:?}")]
	Timeout(Duration),
	#[error("no connections available")]
	NoConnection,
	#[error("broker rejected the message")]
	Rejected,
}

pub struct ConnectionPool {
	uri: String,
	timeout: Duration,
	properties: ConnectionProperties,
	error_queue: mpsc::Sender<usize>,
	error_queue_rx: Mutex<mpsc::Receiver<usize>>,
	new_connection_waker: broadcast::Sender<()>,
	connections: Vec<ArcSwap<Connection>>,
	aquire_idx: AtomicUsize,
}

impl ConnectionPool {
	pub async fn connect(
		uri: String,
		properties: ConnectionProperties,
		timeout: Duration,
		pool_size: usize,
	) -> Result<Self, QueueError> {
		let pool_size = pool_size.max(1);
		let (tx, rx) = mpsc::channel(pool_size);

		let mut pool = Self {
			uri,
			properties,
			timeout,
			connections: Vec::with_capacity(pool_size),
			error_queue: tx,
			error_queue_rx: Mutex::new(rx),
			new_connection_waker: broadcast::channel(1).0,
			aquire_idx: AtomicUsize::new(0),
		};

		for idx in 0..pool_size {
			let conn = pool.new_connection(idx, None).await?;
			pool.connections.push(ArcSwap::from(Arc::new(conn)));
		}

		Ok(pool)
	}

	/// Replaces connections reported broken by their error callback, restoring
	/// the declared topology on the new one. Runs until the caller drops it.
	pub async fn handle_reconnects(&self) -> Result<(), QueueError> {
		loop {
			let Some(idx) = self.error_queue_rx.lock().await.recv().await else {
				return Ok(());
			};

			let topology = self.connections[idx].load().topology();

			let reconnect = async {
				loop {
					match self.new_connection(idx, Some(topology.clone())).await {
						Ok(conn) => {
							tracing::info!("reconnected to rabbitmq");
							break conn;
						}
						Err(err) => {
							tracing::error!(error = %err, "failed to reconnect");
							tokio::time::sleep(Duration::from_secs(1)).await;
						}
					}
				}
			}
			.instrument(tracing::info_span!("reconnect rmq", idx));

			let conn = tokio::time::timeout(self.timeout, reconnect)
				.await
				.map_err(|_| QueueError::Timeout(self.timeout))?;

			self.connections[idx].store(Arc::new(conn));
			self.new_connection_waker.send(()).ok();
		}
	}

	async fn new_connection(&self, idx: usize, topology: Option<TopologyDefinition>) -> Result<Connection, QueueError> {
		let conn = tokio::time::timeout(self.timeout, Connection::connect(&self.uri, self.properties.clone()))
			.await
			.map_err(|_| QueueError::Timeout(self.timeout))??;

		if let Some(topology) = topology {
			conn.restore(topology).await?;
		}

		let sender = self.error_queue.clone();
		conn.on_error(move |err| {
			tracing::error!(error = %err, idx, "rabbitmq connection error");

			if let Err(err) = sender.try_send(idx) {
				tracing::error!(error = %err, "failed to schedule reconnect");
			}
		});

		Ok(conn)
	}

	/// Opens a channel on the next connected connection, waiting once for a
	/// reconnect if none is up.
	pub async fn aquire(&self) -> Result<Channel, QueueError> {
		let mut waited = false;
		loop {
			let start = self.aquire_idx.fetch_add(1, Ordering::Relaxed) % self.connections.len();

			let conn = self.connections[start..]
				.iter()
				.chain(self.connections[..start].iter())
				.map(|c| c.load_full())
				.find(|c| c.status().connected());

			if let Some(conn) = conn {
				return Ok(conn.create_channel().await?);
			}

			if waited {
				return Err(QueueError::NoConnection);
			}

			waited = true;
			let mut waker = self.new_connection_waker.subscribe();
			tokio::time::timeout(self.timeout, waker.recv())
				.await
				.map_err(|_| QueueError::Timeout(self.timeout))?
				.map_err(|_| QueueError::NoConnection)?;
		}
	}

	/// Declares a durable queue. Declarations are part of the connection
	/// topology and get replayed after a reconnect.
	pub async fn declare_durable_queue(&self, name: &str) -> Result<(), QueueError> {
		let channel = self.aquire().await?;
		channel
			.queue_declare(
				name,
				QueueDeclareOptions {
					durable: true,
					..Default::default()
				},
				FieldTable::default(),
			)
			.await?;

		Ok(())
	}

	/// Publishes `payload` as a persistent JSON message on the default
	/// exchange and waits for the broker to confirm it.
	pub async fn publish_json<T: Serialize + ?Sized>(&self, queue: &str, payload: &T) -> Result<(), QueueError> {
		let body = serde_json::to_vec(payload)?;

		let channel = self.aquire().await?;
		channel.confirm_select(ConfirmSelectOptions::default()).await?;

		let confirm = channel
			.basic_publish(
				"",
				queue,
				BasicPublishOptions::default(),
				&body,
				BasicProperties::default()
					.with_delivery_mode(PERSISTENT)
					.with_content_type("application/json".into()),
			)
			.await?
			.await?;

		let result = match confirm {
			Confirmation::Nack(_) => Err(QueueError::Rejected),
			_ => Ok(()),
		};

		if let Err(err) = channel.close(200, "published").await {
			tracing::debug!(error = %err, "failed to close publish channel");
		}

		result
	}

	/// A stream of deliveries from `queue` that resubscribes on a fresh channel
	/// whenever the connection underneath it resets.
	pub fn basic_consume(
		&self,
		queue: impl ToString,
		consumer_tag: impl ToString,
		prefetch: u16,
	) -> impl Stream<Item = Result<Delivery, QueueError>> + '_ {
		let queue = queue.to_string();
		let consumer_tag = consumer_tag.to_string();

		stream!({
			'connection_loop: loop {
				let mut consumer = match self.subscribe(&queue, &consumer_tag, prefetch).await {
					Ok(consumer) => consumer,
					Err(err) => {
						yield Err(err);
						tokio::time::sleep(Duration::from_secs(1)).await;
						continue 'connection_loop;
					}
				};

				loop {
					match consumer.next().await {
						Some(Ok(delivery)) => yield Ok(delivery),
						Some(Err(lapin::Error::IOError(err))) if err.kind() == std::io::ErrorKind::ConnectionReset => {
							continue 'connection_loop;
						}
						Some(Err(err)) => yield Err(QueueError::Amqp(err)),
						None => continue 'connection_loop,
					}
				}
			}
		})
	}

	async fn subscribe(&self, queue: &str, consumer_tag: &str, prefetch: u16) -> Result<lapin::Consumer, QueueError> {
		let channel = self.aquire().await?;
		channel.basic_qos(prefetch, BasicQosOptions::default()).await?;

		Ok(channel
			.basic_consume(queue, consumer_tag, BasicConsumeOptions::default(), FieldTable::default())
			.await?)
	}

	/// Closes every connection, and with them every channel opened on it.
	pub async fn close(&self) {
		for conn in &self.connections {
			let conn = conn.load_full();
			if !conn.status().connected() {
				continue;
			}

			if let Err(err) = conn.close(200, "shutting down").await {
				tracing::warn!(error = %err, "failed to close rabbitmq connection");
			}
		}
	}
}
