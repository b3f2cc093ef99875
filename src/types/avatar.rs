use sha2::{Digest, Sha256};

/// The fixed avatar set. Paths are resolved by the presentation layer.
pub const AVATAR_CHOICES: [&str; 8] = [
    "img/avatars/avatar1.svg",
    "img/avatars/avatar2.svg",
    "img/avatars/avatar3.svg",
    "img/avatars/avatar4.svg",
    "img/avatars/avatar5.svg",
    "img/avatars/avatar6.svg",
    "img/avatars/avatar7.svg",
    "img/avatars/avatar8.svg",
];

/// Picks an avatar by seed. Callers supply their own randomness; there is no
/// hidden RNG state here.
#[must_use]
pub fn pick_avatar(seed: u64) -> &'static str {
    AVATAR_CHOICES[(seed % AVATAR_CHOICES.len() as u64) as usize]
}

/// Deterministic avatar for a username, for users without a stored profile.
/// The same username always resolves to the same avatar.
#[must_use]
pub fn stable_avatar(username: &str) -> &'static str {
    let digest = Sha256::digest(username.as_bytes());
    let mut seed_bytes = [0u8; 8];
    seed_bytes.copy_from_slice(&digest[..8]);
    pick_avatar(u64::from_be_bytes(seed_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_avatar_in_set() {
        for seed in 0..32 {
            assert!(AVATAR_CHOICES.contains(&pick_avatar(seed)));
        }
    }

    #[test]
    fn test_stable_avatar_is_deterministic() {
        assert_eq!(stable_avatar("marge"), stable_avatar("marge"));
        assert!(AVATAR_CHOICES.contains(&stable_avatar("anon")));
    }
}
