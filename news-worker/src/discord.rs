use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::OnceCell;

use crate::config::DiscordConfig;
use crate::database::Destination;
use crate::delivery::permissions::{Overwrite, OverwriteTarget, PermissionContext, Permissions};
use crate::delivery::{Capability, CapabilityOracle, MessageSender, OutboundMessage};

#[derive(Debug, thiserror::Error)]
pub enum DiscordError {
	#[error("discord responded {status}: {body}")]
	Status { status: StatusCode, body: String },
	#[error("http: {0}")]
	Http(#[from] reqwest::Error),
	#[error("invalid permission value {0:?}")]
	InvalidPermissions(String),
}

impl DiscordError {
	/// Whether retrying the same request can never succeed.
	pub fn is_terminal(&self) -> bool {
		match self {
			Self::Status { status, .. } => {
				matches!(*status, StatusCode::FORBIDDEN | StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST)
			}
			Self::Http(_) => false,
			Self::InvalidPermissions(_) => true,
		}
	}
}

#[derive(Debug, Deserialize)]
struct CurrentUser {
	id: String,
}

#[derive(Debug, Deserialize)]
struct Guild {
	id: String,
	owner_id: String,
	#[serde(default)]
	roles: Vec<Role>,
}

#[derive(Debug, Deserialize)]
struct Role {
	id: String,
	permissions: String,
}

#[derive(Debug, Deserialize)]
struct Channel {
	#[serde(default)]
	guild_id: Option<String>,
	#[serde(default)]
	permission_overwrites: Vec<RawOverwrite>,
}

#[derive(Debug, Deserialize)]
struct RawOverwrite {
	id: String,
	#[serde(rename = "type")]
	kind: u8,
	allow: String,
	deny: String,
}

#[derive(Debug, Deserialize)]
struct Member {
	#[serde(default)]
	roles: Vec<String>,
}

fn parse_permissions(value: &str) -> Result<Permissions, DiscordError> {
	Permissions::parse(value).map_err(|_| DiscordError::InvalidPermissions(value.to_string()))
}

impl TryFrom<RawOverwrite> for Overwrite {
	type Error = DiscordError;

	fn try_from(raw: RawOverwrite) -> Result<Self, Self::Error> {
		Ok(Self {
			target: if raw.kind == 1 {
				OverwriteTarget::Member
			} else {
				OverwriteTarget::Role
			},
			allow: parse_permissions(&raw.allow)?,
			deny: parse_permissions(&raw.deny)?,
			id: raw.id,
		})
	}
}

/// Bot client for the Discord REST API. It answers capability checks and
/// posts messages, nothing else.
pub struct DiscordClient {
	http: reqwest::Client,
	api_base: String,
	token: String,
	bot: OnceCell<CurrentUser>,
}

impl DiscordClient {
	pub fn new(config: &DiscordConfig) -> Result<Self, DiscordError> {
		let http = reqwest::Client::builder()
			.timeout(Duration::from_secs(config.timeout_secs))
			.user_agent(concat!("news-worker/", env!("CARGO_PKG_VERSION")))
			.build()?;

		Ok(Self {
			http,
			api_base: config.api_base.trim_end_matches('/').to_string(),
			token: config.token.clone(),
			bot: OnceCell::new(),
		})
	}

	fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
		self.http
			.request(method, format!("{}{}", self.api_base, path))
			.header(reqwest::header::AUTHORIZATION, format!("Bot {}", self.token))
	}

	/// GETs `path`, mapping 403 and 404 to `None`: to a bot both mean the
	/// resource is out of reach.
	async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, DiscordError> {
		let response = self.request(Method::GET, path).send().await?;

		match response.status() {
			StatusCode::NOT_FOUND | StatusCode::FORBIDDEN => Ok(None),
			status if status.is_success() => Ok(Some(response.json().await?)),
			status => Err(DiscordError::Status {
				status,
				body: response.text().await.unwrap_or_default(),
			}),
		}
	}

	async fn bot_user(&self) -> Result<&CurrentUser, DiscordError> {
		self.bot
			.get_or_try_init(|| async {
				self.get::<CurrentUser>("/users/@me").await?.ok_or(DiscordError::Status {
					status: StatusCode::UNAUTHORIZED,
					body: "bot user not found".to_string(),
				})
			})
			.await
	}
}

#[async_trait::async_trait]
impl CapabilityOracle for DiscordClient {
	async fn check(&self, destination: &Destination) -> Result<Capability, DiscordError> {
		let bot = self.bot_user().await?;

		let Some(guild) = self.get::<Guild>(&format!("/guilds/{}", destination.server_id)).await? else {
			return Ok(Capability::GuildMissing);
		};

		let Some(channel) = self
			.get::<Channel>(&format!("/channels/{}", destination.channel_id))
			.await?
		else {
			return Ok(Capability::ChannelMissing);
		};

		if channel.guild_id.as_deref() != Some(guild.id.as_str()) {
			return Ok(Capability::ChannelMissing);
		}

		let Some(member) = self
			.get::<Member>(&format!("/guilds/{}/members/{}", guild.id, bot.id))
			.await?
		else {
			return Ok(Capability::GuildMissing);
		};

		let roles = guild
			.roles
			.iter()
			.map(|role| Ok((role.id.clone(), parse_permissions(&role.permissions)?)))
			.collect::<Result<Vec<_>, DiscordError>>()?;

		let overwrites = channel
			.permission_overwrites
			.into_iter()
			.map(Overwrite::try_from)
			.collect::<Result<Vec<_>, _>>()?;

		let permissions = PermissionContext {
			guild_id: &guild.id,
			owner_id: &guild.owner_id,
			roles: &roles,
			member_id: &bot.id,
			member_roles: &member.roles,
			overwrites: &overwrites,
		}
		.compute();

		if permissions.has(Permissions::send()) {
			Ok(Capability::Available)
		} else {
			Ok(Capability::MissingPermission)
		}
	}
}

#[async_trait::async_trait]
impl MessageSender for DiscordClient {
	async fn send(&self, channel_id: &str, message: &OutboundMessage) -> Result<(), DiscordError> {
		let response = self
			.request(Method::POST, &format!("/channels/{channel_id}/messages"))
			.json(message)
			.send()
			.await?;

		let status = response.status();
		if status.is_success() {
			return Ok(());
		}

		Err(DiscordError::Status {
			status,
			body: response.text().await.unwrap_or_default(),
		})
	}
}
