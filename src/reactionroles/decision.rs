use super::event::{ReactionEvent, ReactionKind};
use crate::data::config::Config;
use serenity::model::id::{RoleId, UserId};
use serenity::model::permissions::Permissions;
use std::collections::HashMap;
use std::fmt;

/// Why a reaction did not lead to a role change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    WrongGuild,
    WrongChannel,
    WrongMessage,
    UnknownEmoji,
    RoleNotFound,
    PrivilegeEscalationBlocked,
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::WrongGuild => "reaction in another guild",
            Self::WrongChannel => "reaction in another channel",
            Self::WrongMessage => "reaction on another message",
            Self::UnknownEmoji => "emoji has no matching role",
            Self::RoleNotFound => "configured role does not exist",
            Self::PrivilegeEscalationBlocked => "role has a non-zero permissions value",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleOp {
    Grant,
    Revoke,
}

impl From<ReactionKind> for RoleOp {
    fn from(kind: ReactionKind) -> Self {
        match kind {
            ReactionKind::Add => Self::Grant,
            ReactionKind::Remove => Self::Revoke,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Ignore(IgnoreReason),
    MutateRole {
        user_id: UserId,
        role_id: RoleId,
        op: RoleOp,
    },
}

/// The parts of a guild role the reconciler looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleInfo {
    pub id: RoleId,
    pub name: String,
    pub permissions: Permissions,
}

/// Role lookup over a guild role list the caller already fetched.
pub trait RoleLookup {
    fn role(&self, id: RoleId) -> Option<&RoleInfo>;
}

impl RoleLookup for HashMap<RoleId, RoleInfo> {
    fn role(&self, id: RoleId) -> Option<&RoleInfo> {
        self.get(&id)
    }
}

impl RoleLookup for [RoleInfo] {
    fn role(&self, id: RoleId) -> Option<&RoleInfo> {
        self.iter().find(|r| r.id == id)
    }
}

/// Runs the guild, channel, message and emoji checks and returns the mapped role.
///
/// This needs no guild data, so callers can use it to skip the role lookup for
/// reactions that are not addressed to the tracked message.
pub fn target_role(config: &Config, event: &ReactionEvent) -> Result<RoleId, IgnoreReason> {
    if event.guild_id != config.server_id {
        return Err(IgnoreReason::WrongGuild);
    }
    if event.channel_id != config.roles.channel_id {
        return Err(IgnoreReason::WrongChannel);
    }
    if event.message_id != config.roles.message_id {
        return Err(IgnoreReason::WrongMessage);
    }

    event
        .emoji
        .id
        .and_then(|id| config.roles.emoji_to_role.get(&id).copied())
        .ok_or(IgnoreReason::UnknownEmoji)
}

/// Decides whether `event` should grant or revoke a role.
///
/// Roles carrying any permission bit are never granted, only revoked.
pub fn decide<L>(config: &Config, event: &ReactionEvent, roles: &L) -> Decision
where
    L: RoleLookup + ?Sized,
{
    let role_id = match target_role(config, event) {
        Ok(role_id) => role_id,
        Err(reason) => return Decision::Ignore(reason),
    };

    let role = match roles.role(role_id) {
        Some(role) => role,
        None => return Decision::Ignore(IgnoreReason::RoleNotFound),
    };

    let op = RoleOp::from(event.kind);
    if op == RoleOp::Grant && role.permissions.bits() != 0 {
        return Decision::Ignore(IgnoreReason::PrivilegeEscalationBlocked);
    }

    Decision::MutateRole {
        user_id: event.user_id,
        role_id,
        op,
    }
}
