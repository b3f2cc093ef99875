mod avatar;
mod models;
mod role;

pub use avatar::{AVATAR_CHOICES, pick_avatar, stable_avatar};
pub use models::*;
pub use role::Role;
