use serde::{Deserialize, Serialize};

/// Public view of an account: everything a client may learn about a user.
/// The password digest never leaves the account store.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub name: String,
    pub rank: u32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    /// Accumulated time on the server, finished sessions plus the running
    /// one, in seconds.
    pub online_seconds: u64,
}

/// A profile as shown in the lobby, annotated with how it relates to the
/// user the listing is built for.
#[derive(Serialize, Debug, Clone)]
pub struct LobbyUser {
    #[serde(flatten)]
    pub profile: UserProfile,
    /// Whether the viewer has already invited this user.
    pub invited: bool,
    /// Whether this user is currently in a match.
    pub playing: bool,
}
