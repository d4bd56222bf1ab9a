use super::decision::{decide, target_role, Decision, IgnoreReason, RoleInfo, RoleOp};
use super::event::{ReactionEvent, ReactionKind};
use super::service::{RoleError, RoleService};
use crate::data::config::Config;
use serenity::model::id::{RoleId, UserId};
use tracing::{error, info};

#[derive(Debug)]
pub enum Outcome {
    Ignored(IgnoreReason),
    Applied {
        user_id: UserId,
        role_id: RoleId,
        op: RoleOp,
    },
    Failed(RoleError),
}

/// Handles one reaction event end to end. Nothing is retried; failures are
/// logged and the event is dropped.
pub async fn reconcile<S>(service: &S, config: &Config, event: &ReactionEvent) -> Outcome
where
    S: RoleService + Sync + ?Sized,
{
    let role_id = match target_role(config, event) {
        Ok(role_id) => role_id,
        Err(reason) => {
            info!(
                "Ignoring reaction {:?} on message id={} in channel id={}: {}",
                event.emoji.name, event.message_id, event.channel_id, reason
            );
            return Outcome::Ignored(reason);
        }
    };

    let action = match event.kind {
        ReactionKind::Add => "add",
        ReactionKind::Remove => "remove",
    };
    info!(
        "Reaction {} {:?} to message id={}",
        action, event.emoji.name, event.message_id
    );

    let roles: Vec<RoleInfo> = match service.find_role(event.guild_id, role_id).await {
        Ok(role) => role.into_iter().collect(),
        Err(why) => {
            error!("Could not look up role id={}: {}", role_id, why);
            return Outcome::Failed(why);
        }
    };
    let role_name = roles.first().map_or("", |r| r.name.as_str());

    match decide(config, event, roles.as_slice()) {
        Decision::Ignore(reason @ IgnoreReason::RoleNotFound) => {
            error!("No role found with id={}", role_id);
            Outcome::Ignored(reason)
        }
        Decision::Ignore(reason @ IgnoreReason::PrivilegeEscalationBlocked) => {
            error!(
                "Can't give role {:?} (id={}) with non-zero permissions value",
                role_name, role_id
            );
            Outcome::Ignored(reason)
        }
        Decision::Ignore(reason) => {
            info!("Ignoring reaction {:?}: {}", event.emoji.name, reason);
            Outcome::Ignored(reason)
        }
        Decision::MutateRole {
            user_id,
            role_id,
            op,
        } => {
            let result = match op {
                RoleOp::Grant => service.grant_role(event.guild_id, user_id, role_id).await,
                RoleOp::Revoke => service.revoke_role(event.guild_id, user_id, role_id).await,
            };

            match (result, op) {
                (Ok(()), RoleOp::Grant) => {
                    info!("Gave {:?} (id={}) to user id={}", role_name, role_id, user_id);
                }
                (Ok(()), RoleOp::Revoke) => {
                    info!(
                        "Removed {:?} (id={}) from user id={}",
                        role_name, role_id, user_id
                    );
                }
                (Err(why), _) => {
                    error!(
                        "Role {:?} (id={}) could not be {} for user id={}: {}",
                        role_name,
                        role_id,
                        if op == RoleOp::Grant { "added" } else { "removed" },
                        user_id,
                        why
                    );
                    return Outcome::Failed(why);
                }
            }

            Outcome::Applied {
                user_id,
                role_id,
                op,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactionroles::decision::tests::{config, event, role, ROLE};
    use serenity::async_trait;
    use serenity::model::id::{EmojiId, GuildId};
    use serenity::model::permissions::Permissions;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory guild with at most one role and a member list.
    struct FakeGuild {
        role: Option<RoleInfo>,
        members: Vec<UserId>,
        lookups: AtomicUsize,
        mutations: Mutex<Vec<(UserId, RoleId, RoleOp)>>,
    }

    impl FakeGuild {
        fn new(role: Option<RoleInfo>) -> Self {
            Self {
                role,
                members: vec![UserId(42)],
                lookups: AtomicUsize::new(0),
                mutations: Mutex::new(Vec::new()),
            }
        }

        fn mutate(&self, user_id: UserId, role_id: RoleId, op: RoleOp) -> Result<(), RoleError> {
            if !self.members.contains(&user_id) {
                return Err(RoleError::MemberNotFound {
                    user_id,
                    source: serenity::Error::Other("Unknown Member"),
                });
            }
            self.mutations.lock().unwrap().push((user_id, role_id, op));
            Ok(())
        }

        fn mutations(&self) -> Vec<(UserId, RoleId, RoleOp)> {
            self.mutations.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RoleService for FakeGuild {
        async fn find_role(
            &self,
            _guild_id: GuildId,
            role_id: RoleId,
        ) -> Result<Option<RoleInfo>, RoleError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self.role.clone().filter(|r| r.id == role_id))
        }

        async fn grant_role(
            &self,
            _guild_id: GuildId,
            user_id: UserId,
            role_id: RoleId,
        ) -> Result<(), RoleError> {
            self.mutate(user_id, role_id, RoleOp::Grant)
        }

        async fn revoke_role(
            &self,
            _guild_id: GuildId,
            user_id: UserId,
            role_id: RoleId,
        ) -> Result<(), RoleError> {
            self.mutate(user_id, role_id, RoleOp::Revoke)
        }
    }

    #[tokio::test]
    async fn grants_role_on_add() {
        let guild = FakeGuild::new(Some(role(Permissions::empty())));
        let outcome = reconcile(&guild, &config(), &event(ReactionKind::Add)).await;

        assert!(matches!(
            outcome,
            Outcome::Applied {
                op: RoleOp::Grant,
                ..
            }
        ));
        assert_eq!(guild.mutations(), [(UserId(42), ROLE, RoleOp::Grant)]);
    }

    #[tokio::test]
    async fn never_grants_permission_bearing_role() {
        let guild = FakeGuild::new(Some(role(Permissions::ADMINISTRATOR)));
        let outcome = reconcile(&guild, &config(), &event(ReactionKind::Add)).await;

        assert!(matches!(
            outcome,
            Outcome::Ignored(IgnoreReason::PrivilegeEscalationBlocked)
        ));
        assert!(guild.mutations().is_empty());
    }

    #[tokio::test]
    async fn revokes_permission_bearing_role() {
        let guild = FakeGuild::new(Some(role(Permissions::ADMINISTRATOR)));
        let outcome = reconcile(&guild, &config(), &event(ReactionKind::Remove)).await;

        assert!(matches!(
            outcome,
            Outcome::Applied {
                op: RoleOp::Revoke,
                ..
            }
        ));
        assert_eq!(guild.mutations(), [(UserId(42), ROLE, RoleOp::Revoke)]);
    }

    #[tokio::test]
    async fn skips_lookup_for_untracked_reactions() {
        let guild = FakeGuild::new(Some(role(Permissions::empty())));
        let mut event = event(ReactionKind::Add);
        event.emoji.id = Some(EmojiId(99));

        let outcome = reconcile(&guild, &config(), &event).await;

        assert!(matches!(outcome, Outcome::Ignored(IgnoreReason::UnknownEmoji)));
        assert_eq!(guild.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_role_is_ignored() {
        let guild = FakeGuild::new(None);
        let outcome = reconcile(&guild, &config(), &event(ReactionKind::Add)).await;

        assert!(matches!(outcome, Outcome::Ignored(IgnoreReason::RoleNotFound)));
        assert!(guild.mutations().is_empty());
    }

    #[tokio::test]
    async fn missing_member_drops_event() {
        let guild = FakeGuild::new(Some(role(Permissions::empty())));
        let mut event = event(ReactionKind::Add);
        event.user_id = UserId(43);

        let outcome = reconcile(&guild, &config(), &event).await;

        assert!(matches!(
            outcome,
            Outcome::Failed(RoleError::MemberNotFound { user_id: UserId(43), .. })
        ));
        assert!(guild.mutations().is_empty());
    }
}
