use bitmask_enum::bitmask;

/// Discord permission bits, in wire order. Only the low bits this worker
/// inspects are named, the rest pass through untouched.
#[bitmask(u64)]
pub enum Permissions {
	CreateInstantInvite,
	KickMembers,
	BanMembers,
	/// Grants every permission and bypasses channel overwrites
	Administrator,
	ManageChannels,
	ManageGuild,
	AddReactions,
	ViewAuditLog,
	PrioritySpeaker,
	Stream,
	ViewChannel,
	SendMessages,
}

impl Permissions {
	/// What posting an embed into a channel needs.
	pub fn send() -> Self {
		Self::ViewChannel | Self::SendMessages
	}

	pub fn everything() -> Self {
		Self::from(u64::MAX)
	}

	pub fn has(&self, other: Self) -> bool {
		*self & other == other
	}

	/// Parses the decimal string Discord uses for permission sets.
	pub fn parse(value: &str) -> Result<Self, std::num::ParseIntError> {
		value.parse::<u64>().map(Self::from)
	}

	fn apply(self, allow: Self, deny: Self) -> Self {
		(self & !deny) | allow
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverwriteTarget {
	Role,
	Member,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Overwrite {
	pub id: String,
	pub target: OverwriteTarget,
	pub allow: Permissions,
	pub deny: Permissions,
}

/// Everything needed to resolve one member's permissions in one channel.
pub struct PermissionContext<'a> {
	pub guild_id: &'a str,
	pub owner_id: &'a str,
	/// Every role of the guild with its base permissions. The @everyone
	/// role has the guild's id.
	pub roles: &'a [(String, Permissions)],
	pub member_id: &'a str,
	pub member_roles: &'a [String],
	pub overwrites: &'a [Overwrite],
}

impl PermissionContext<'_> {
	/// Effective permissions of the member in the channel. Base permissions
	/// come from @everyone and the member's roles; then the channel's
	/// @everyone overwrite, its role overwrites taken together, and finally
	/// the member's own overwrite.
	pub fn compute(&self) -> Permissions {
		if self.member_id == self.owner_id {
			return Permissions::everything();
		}

		let base = self
			.roles
			.iter()
			.filter(|(id, _)| id == self.guild_id || self.member_roles.contains(id))
			.fold(Permissions::none(), |acc, (_, permissions)| acc | *permissions);

		if base.has(Permissions::Administrator) {
			return Permissions::everything();
		}

		let mut permissions = base;

		if let Some(everyone) = self
			.overwrites
			.iter()
			.find(|o| o.target == OverwriteTarget::Role && o.id == self.guild_id)
		{
			permissions = permissions.apply(everyone.allow, everyone.deny);
		}

		let (allow, deny) = self
			.overwrites
			.iter()
			.filter(|o| o.target == OverwriteTarget::Role && self.member_roles.contains(&o.id))
			.fold((Permissions::none(), Permissions::none()), |(allow, deny), o| {
				(allow | o.allow, deny | o.deny)
			});
		permissions = permissions.apply(allow, deny);

		if let Some(member) = self
			.overwrites
			.iter()
			.find(|o| o.target == OverwriteTarget::Member && o.id == self.member_id)
		{
			permissions = permissions.apply(member.allow, member.deny);
		}

		permissions
	}
}
