use super::decision::RoleInfo;
use serenity::async_trait;
use serenity::model::id::{GuildId, RoleId, UserId};
use serenity::prelude::Context;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RoleError {
    #[error("member {user_id} not found")]
    MemberNotFound {
        user_id: UserId,
        #[source]
        source: serenity::Error,
    },
    #[error(transparent)]
    Discord(#[from] serenity::Error),
}

/// Role lookup and mutation against the chat platform.
#[async_trait]
pub trait RoleService {
    async fn find_role(
        &self,
        guild_id: GuildId,
        role_id: RoleId,
    ) -> Result<Option<RoleInfo>, RoleError>;
    async fn grant_role(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        role_id: RoleId,
    ) -> Result<(), RoleError>;
    async fn revoke_role(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        role_id: RoleId,
    ) -> Result<(), RoleError>;
}

/// [`RoleService`] backed by the gateway context of the current event.
pub struct DiscordRoles<'a> {
    ctx: &'a Context,
}

impl<'a> DiscordRoles<'a> {
    pub fn new(ctx: &'a Context) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl RoleService for DiscordRoles<'_> {
    async fn find_role(
        &self,
        guild_id: GuildId,
        role_id: RoleId,
    ) -> Result<Option<RoleInfo>, RoleError> {
        let roles = guild_id.roles(&self.ctx.http).await?;
        Ok(roles.get(&role_id).map(|role| RoleInfo {
            id: role.id,
            name: role.name.clone(),
            permissions: role.permissions,
        }))
    }

    async fn grant_role(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        role_id: RoleId,
    ) -> Result<(), RoleError> {
        let mut member = guild_id
            .member(self.ctx, user_id)
            .await
            .map_err(|source| RoleError::MemberNotFound { user_id, source })?;
        member.add_role(&self.ctx.http, role_id).await?;
        Ok(())
    }

    async fn revoke_role(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        role_id: RoleId,
    ) -> Result<(), RoleError> {
        let mut member = guild_id
            .member(self.ctx, user_id)
            .await
            .map_err(|source| RoleError::MemberNotFound { user_id, source })?;
        member.remove_role(&self.ctx.http, role_id).await?;
        Ok(())
    }
}
