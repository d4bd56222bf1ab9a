pub mod decision;
pub mod event;
pub mod reconcile;
pub mod service;

pub use event::{ReactionEvent, ReactionKind};
pub use reconcile::reconcile;
pub use service::DiscordRoles;
