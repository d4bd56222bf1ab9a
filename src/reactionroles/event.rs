use serenity::model::channel::{Reaction, ReactionType};
use serenity::model::id::{ChannelId, EmojiId, GuildId, MessageId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionKind {
    Add,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionEmoji {
    /// Only custom emoji carry an id.
    pub id: Option<EmojiId>,
    pub name: String,
}

/// A reaction add/remove with every id the reconciler needs already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionEvent {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    pub emoji: ReactionEmoji,
    pub user_id: UserId,
    pub kind: ReactionKind,
}

impl ReactionEvent {
    /// Returns [`None`] for reactions outside a guild or without a user.
    pub fn from_reaction(reaction: &Reaction, kind: ReactionKind) -> Option<Self> {
        Some(Self {
            guild_id: reaction.guild_id?,
            channel_id: reaction.channel_id,
            message_id: reaction.message_id,
            emoji: ReactionEmoji::from(&reaction.emoji),
            user_id: reaction.user_id?,
            kind,
        })
    }
}

impl From<&ReactionType> for ReactionEmoji {
    fn from(emoji: &ReactionType) -> Self {
        match emoji {
            ReactionType::Custom { id, name, .. } => Self {
                id: Some(*id),
                name: name.clone().unwrap_or_default(),
            },
            ReactionType::Unicode(name) => Self {
                id: None,
                name: name.clone(),
            },
            other => Self {
                id: None,
                name: other.to_string(),
            },
        }
    }
}
