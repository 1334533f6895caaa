use crate::database::Destination;
use crate::discord::DiscordError;
use crate::queue::Outcome;

mod handler;
pub mod permissions;
mod render;

pub use handler::*;
pub use render::*;

/// Whether a destination can currently receive messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
	Available,
	GuildMissing,
	ChannelMissing,
	MissingPermission,
}

impl Capability {
	pub fn is_available(&self) -> bool {
		matches!(self, Self::Available)
	}
}

#[async_trait::async_trait]
pub trait CapabilityOracle: Send + Sync {
	/// A destination that no longer exists is a [`Capability`], not an error.
	/// Errors are reserved for failures worth retrying.
	async fn check(&self, destination: &Destination) -> Result<Capability, DiscordError>;
}

#[async_trait::async_trait]
pub trait MessageSender: Send + Sync {
	async fn send(&self, channel_id: &str, message: &OutboundMessage) -> Result<(), DiscordError>;
}

/// Checks `destination` and sends `pages` to it in order.
pub async fn deliver(
	oracle: &dyn CapabilityOracle,
	sender: &dyn MessageSender,
	destination: &Destination,
	pages: &[OutboundMessage],
) -> Outcome {
	match oracle.check(destination).await {
		Ok(Capability::Available) => {}
		Ok(capability) => {
			tracing::warn!(%destination, ?capability, "destination cannot receive messages, dropping");
			return Outcome::Ack;
		}
		Err(err) => {
			tracing::warn!(%destination, error = %err, "capability check failed");
			return Outcome::Requeue;
		}
	}

	for (idx, page) in pages.iter().enumerate() {
		let Err(err) = sender.send(&destination.channel_id, page).await else {
			continue;
		};

		if idx > 0 {
			tracing::error!(%destination, page = idx + 1, pages = pages.len(), error = %err, "send failed mid-way, dropping remaining pages");
			return Outcome::Ack;
		}

		if err.is_terminal() {
			tracing::warn!(%destination, error = %err, "send rejected, dropping");
			return Outcome::Ack;
		}

		tracing::warn!(%destination, error = %err, "send failed, requeueing");
		return Outcome::Requeue;
	}

	tracing::info!(%destination, pages = pages.len(), "delivered");
	Outcome::Ack
}
