use sqlx::postgres::{PgHasArrayType, PgTypeInfo};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value:?}")]
pub struct UnknownVariant {
	pub kind: &'static str,
	pub value: String,
}

/// Declares a Postgres enum that also travels as its upper case name in JSON
/// and parses case-insensitively from feeds and config.
macro_rules! db_enum {
	($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
		#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize, sqlx::Type)]
		$(#[$meta])*
		pub enum $name {
			$(
				#[serde(rename = $text)]
				#[sqlx(rename = $text)]
				$variant,
			)+
		}

		impl $name {
			pub const ALL: &'static [Self] = &[$(Self::$variant),+];

			pub const fn as_str(&self) -> &'static str {
				match self {
					$(Self::$variant => $text),+
				}
			}
		}

		impl std::fmt::Display for $name {
			fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
				f.write_str(self.as_str())
			}
		}

		impl std::str::FromStr for $name {
			type Err = UnknownVariant;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				let s = s.trim();
				Self::ALL
					.iter()
					.copied()
					.find(|v| v.as_str().eq_ignore_ascii_case(s))
					.ok_or_else(|| UnknownVariant {
						kind: stringify!($name),
						value: s.to_string(),
					})
			}
		}
	};
}

macro_rules! pg_array {
	($name:ident, $array:literal) => {
		impl PgHasArrayType for $name {
			fn array_type_info() -> PgTypeInfo {
				PgTypeInfo::with_name($array)
			}
		}
	};
}

db_enum! {
	#[sqlx(type_name = "impact")]
	Impact {
		High => "HIGH",
		Medium => "MEDIUM",
		Low => "LOW",
		Holiday => "HOLIDAY",
	}
}

db_enum! {
	#[sqlx(type_name = "currency")]
	Currency {
		Usd => "USD",
		Eur => "EUR",
		Gbp => "GBP",
		Jpy => "JPY",
		Chf => "CHF",
		Aud => "AUD",
		Cad => "CAD",
		Cny => "CNY",
		Nzd => "NZD",
	}
}

db_enum! {
	/// When, relative to an event, an alert goes out.
	#[sqlx(type_name = "alert_timing")]
	AlertTiming {
		FiveMinutesBefore => "FIVE_MINUTES_BEFORE",
		OnNewsDrop => "ON_NEWS_DROP",
	}
}

db_enum! {
	#[sqlx(type_name = "market")]
	Market {
		Forex => "FOREX",
		Crypto => "CRYPTO",
		Energy => "ENERGY",
		Metal => "METAL",
	}
}

db_enum! {
	#[sqlx(type_name = "frequency")]
	Frequency {
		Daily => "DAILY",
		Weekly => "WEEKLY",
	}
}

db_enum! {
	/// The window of events a scheduled digest covers.
	#[sqlx(type_name = "news_scope")]
	NewsScope {
		Daily => "DAILY",
		Weekly => "WEEKLY",
	}
}

db_enum! {
	#[sqlx(type_name = "time_display")]
	TimeDisplay {
		Fixed => "FIXED",
		Relative => "RELATIVE",
	}
}

pg_array!(Impact, "_impact");
pg_array!(Currency, "_currency");
pg_array!(AlertTiming, "_alert_timing");

impl Impact {
	pub const fn emoji(&self) -> &'static str {
		match self {
			Self::High => "🔴",
			Self::Medium => "🟠",
			Self::Low => "🟡",
			Self::Holiday => "⚪",
		}
	}
}

impl Currency {
	pub const fn flag(&self) -> &'static str {
		match self {
			Self::Usd => "🇺🇸",
			Self::Eur => "🇪🇺",
			Self::Gbp => "🇬🇧",
			Self::Jpy => "🇯🇵",
			Self::Chf => "🇨🇭",
			Self::Aud => "🇦🇺",
			Self::Cad => "🇨🇦",
			Self::Cny => "🇨🇳",
			Self::Nzd => "🇳🇿",
		}
	}
}

impl Market {
	/// Calendar file served by the ForexFactory family of sites.
	pub const fn feed_file(&self) -> &'static str {
		match self {
			Self::Forex => "ff_calendar_thisweek.json",
			Self::Crypto => "cc_calendar_thisweek.json",
			Self::Energy => "ee_calendar_thisweek.json",
			Self::Metal => "mm_calendar_thisweek.json",
		}
	}
}
