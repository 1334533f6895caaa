use sqlx::postgres::{PgArgumentBuffer, PgHasArrayType, PgTypeInfo, PgValueRef};

/// A ULID that lives in Postgres as a `UUID` column and travels over the wire
/// as its canonical 26 character string.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Ulid(pub ulid::Ulid);

impl Ulid {
	pub fn new() -> Self {
		Self(ulid::Ulid::new())
	}
}

impl Default for Ulid {
	fn default() -> Self {
		Self(ulid::Ulid::nil())
	}
}

impl std::fmt::Display for Ulid {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.0.fmt(f)
	}
}

impl std::fmt::Debug for Ulid {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.0.fmt(f)
	}
}

impl std::str::FromStr for Ulid {
	type Err = ulid::DecodeError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		ulid::Ulid::from_string(s).map(Self)
	}
}

impl sqlx::Type<sqlx::Postgres> for Ulid {
	fn type_info() -> PgTypeInfo {
		<uuid::Uuid as sqlx::Type<sqlx::Postgres>>::type_info()
	}
}

impl PgHasArrayType for Ulid {
	fn array_type_info() -> PgTypeInfo {
		<uuid::Uuid as PgHasArrayType>::array_type_info()
	}
}

impl sqlx::Decode<'_, sqlx::Postgres> for Ulid {
	fn decode(value: PgValueRef<'_>) -> Result<Self, sqlx::error::BoxDynError> {
		let id = <uuid::Uuid as sqlx::Decode<'_, sqlx::Postgres>>::decode(value)?;
		Ok(Self::from(id))
	}
}

impl sqlx::Encode<'_, sqlx::Postgres> for Ulid {
	fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> sqlx::encode::IsNull {
		<uuid::Uuid as sqlx::Encode<'_, sqlx::Postgres>>::encode_by_ref(&uuid::Uuid::from(*self), buf)
	}
}

impl From<ulid::Ulid> for Ulid {
	fn from(id: ulid::Ulid) -> Self {
		Self(id)
	}
}

impl From<Ulid> for ulid::Ulid {
	fn from(id: Ulid) -> Self {
		id.0
	}
}

impl From<uuid::Uuid> for Ulid {
	fn from(id: uuid::Uuid) -> Self {
		Self(ulid::Ulid::from(id))
	}
}

impl From<Ulid> for uuid::Uuid {
	fn from(id: Ulid) -> Self {
		id.0.into()
	}
}
