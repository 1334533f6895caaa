use chrono::{FixedOffset, Offset, Utc};
use serde::Serialize;

use crate::database::{AlertTiming, Market, TimeDisplay};
use crate::queue::EventPayload;

/// Discord rejects embeds with more fields than this.
pub const MAX_FIELDS_PER_PAGE: usize = 25;

const FOOTER: &str = "Powered by ForexFactory";
const EMPTY_DESCRIPTION: &str = "No news found for the specified criteria.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundMessage {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub content: Option<String>,
	pub embeds: Vec<Embed>,
	pub allowed_mentions: AllowedMentions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Embed {
	pub title: String,
	pub color: u32,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub fields: Vec<EmbedField>,
	pub footer: EmbedFooter,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedField {
	pub name: String,
	pub value: String,
	pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedFooter {
	pub text: String,
}

/// Mentions are limited to the listed roles, so event titles can never ping
/// anyone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AllowedMentions {
	pub parse: Vec<String>,
	pub roles: Vec<String>,
}

/// The heading a set of pages is rendered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Banner {
	FiveMinutes,
	DroppingNow,
	Digest(Market),
}

impl From<AlertTiming> for Banner {
	fn from(timing: AlertTiming) -> Self {
		match timing {
			AlertTiming::FiveMinutesBefore => Self::FiveMinutes,
			AlertTiming::OnNewsDrop => Self::DroppingNow,
		}
	}
}

impl Banner {
	pub fn title(&self) -> String {
		match self {
			Self::FiveMinutes => "🔔 NEWS IN 5 MINUTES".to_string(),
			Self::DroppingNow => "🚨 NEWS DROPPING RIGHT NOW".to_string(),
			Self::Digest(market) => format!("{market} News Update"),
		}
	}

	pub fn color(&self) -> u32 {
		match self {
			Self::FiveMinutes => 0xFF6600,
			Self::DroppingNow => 0xFF1744,
			Self::Digest(_) => 0x02EBF7,
		}
	}
}

/// How event times are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeFormat {
	pub display: TimeDisplay,
	/// Only used by [`TimeDisplay::Fixed`].
	pub offset: FixedOffset,
}

impl TimeFormat {
	pub fn fixed(offset: FixedOffset) -> Self {
		Self {
			display: TimeDisplay::Fixed,
			offset,
		}
	}

	/// Discord timestamp tokens, shown in each reader's own timezone.
	pub fn relative() -> Self {
		Self {
			display: TimeDisplay::Relative,
			offset: Utc.fix(),
		}
	}

	fn date_and_time(&self, event: &EventPayload) -> (String, String) {
		match self.display {
			TimeDisplay::Fixed => {
				let local = event.date.with_timezone(&self.offset);
				(local.format("%b %-d").to_string(), local.format("%-I:%M %p").to_string())
			}
			TimeDisplay::Relative => {
				let ts = event.date.timestamp();
				(format!("<t:{ts}:D>"), format!("<t:{ts}:t> (<t:{ts}:R>)"))
			}
		}
	}
}

fn field(event: &EventPayload, time: &TimeFormat) -> EmbedField {
	let (date, clock) = time.date_and_time(event);
	let forecast = event.forecast.as_deref().filter(|v| !v.is_empty()).unwrap_or("N/A");
	let previous = event.previous.as_deref().filter(|v| !v.is_empty()).unwrap_or("N/A");

	EmbedField {
		name: format!("{} {} - {}", event.country.flag(), event.country, event.title),
		value: format!(
			"📅 {date}\n🕒 {clock}\n{} {} impact\n```Forecast: {forecast}\nPrevious: {previous}```",
			event.impact.emoji(),
			event.impact,
		),
		inline: true,
	}
}

/// Renders `events` into one message per page of at most
/// [`MAX_FIELDS_PER_PAGE`] events. An empty list still renders one page that
/// says so.
pub fn render_pages(
	events: &[EventPayload],
	banner: Banner,
	time: &TimeFormat,
	role_id: Option<&str>,
) -> Vec<OutboundMessage> {
	let title = banner.title();
	let footer = EmbedFooter { text: FOOTER.to_string() };

	let embeds = if events.is_empty() {
		vec![Embed {
			title,
			color: banner.color(),
			description: Some(EMPTY_DESCRIPTION.to_string()),
			fields: Vec::new(),
			footer,
		}]
	} else {
		let pages = events.len().div_ceil(MAX_FIELDS_PER_PAGE);
		events
			.chunks(MAX_FIELDS_PER_PAGE)
			.enumerate()
			.map(|(idx, chunk)| Embed {
				title: if pages > 1 {
					format!("{title} (Page {}/{pages})", idx + 1)
				} else {
					title.clone()
				},
				color: banner.color(),
				description: None,
				fields: chunk.iter().map(|event| field(event, time)).collect(),
				footer: footer.clone(),
			})
			.collect()
	};

	let allowed_mentions = AllowedMentions {
		parse: Vec::new(),
		roles: role_id.map(|id| vec![id.to_string()]).unwrap_or_default(),
	};

	embeds
		.into_iter()
		.map(|embed| OutboundMessage {
			content: role_id.map(|id| format!("<@&{id}>")),
			embeds: vec![embed],
			allowed_mentions: allowed_mentions.clone(),
		})
		.collect()
}
