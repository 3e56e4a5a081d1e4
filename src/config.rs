use std::env;
use std::path::PathBuf;
use std::time::Duration;

use log::warn;

/// Runtime settings for the server. Everything has a sensible default so the
/// binary starts with no configuration at all; the main knobs can be
/// overridden through environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP/WebSocket listener binds to. `CHESS_BIND_ADDR`.
    pub bind_addr: String,
    /// Directory holding the account store and ban lists. `CHESS_DATA_DIR`.
    pub data_dir: PathBuf,
    /// Time budget each player gets for a whole match. `CHESS_MATCH_TIME_SECS`.
    pub time_per_player: Duration,
    /// Rank assigned to freshly created accounts.
    pub default_rank: u32,
    /// How long an unauthenticated connection may stay open.
    pub unauth_ttl: Duration,
    /// How often the connection registry is swept.
    pub connection_sweep_every: Duration,
    /// How long a pending invitation lives before it is dropped.
    pub invitation_ttl: Duration,
    /// How often expired invitations are swept.
    pub invitation_sweep_every: Duration,
    /// How often running matches are checked for clock expiry.
    pub match_sweep_every: Duration,
    /// How often the lobby bundle is pushed to every online user.
    pub presence_every: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_addr: "127.0.0.1:8080".to_string(),
            data_dir: PathBuf::from("data"),
            time_per_player: Duration::from_secs(30 * 60),
            default_rank: 1000,
            unauth_ttl: Duration::from_secs(60),
            connection_sweep_every: Duration::from_secs(60),
            invitation_ttl: Duration::from_secs(10 * 60),
            invitation_sweep_every: Duration::from_secs(3 * 60),
            match_sweep_every: Duration::from_secs(3),
            presence_every: Duration::from_secs(7),
        }
    }
}

impl ServerConfig {
    /// Builds the configuration from the environment, falling back to the
    /// defaults for anything missing or unparseable.
    pub fn from_env() -> Self {
        let mut config = ServerConfig::default();
        if let Ok(addr) = env::var("CHESS_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Ok(dir) = env::var("CHESS_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(secs) = read_secs("CHESS_MATCH_TIME_SECS") {
            config.time_per_player = secs;
        }
        if let Some(rank) = read_u32("CHESS_DEFAULT_RANK") {
            config.default_rank = rank;
        }
        config
    }

    pub fn accounts_path(&self) -> PathBuf {
        self.data_dir.join("accounts.json")
    }

    pub fn banned_logins_path(&self) -> PathBuf {
        self.data_dir.join("banned_logins.txt")
    }

    pub fn banned_ips_path(&self) -> PathBuf {
        self.data_dir.join("banned_ips.txt")
    }
}

fn read_secs(key: &str) -> Option<Duration> {
    let raw = env::var(key).ok()?;
    match raw.parse::<u64>() {
        Ok(secs) => Some(Duration::from_secs(secs)),
        Err(_) => {
            warn!("Ignoring {}={:?}: expected a number of seconds", key, raw);
            None
        }
    }
}

fn read_u32(key: &str) -> Option<u32> {
    let raw = env::var(key).ok()?;
    match raw.parse::<u32>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring {}={:?}: expected an integer", key, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_reasonable() {
        let config = ServerConfig::default();
        assert_eq!(config.time_per_player, Duration::from_secs(1800));
        assert_eq!(config.default_rank, 1000);
        assert_eq!(config.accounts_path(), PathBuf::from("data/accounts.json"));
    }
}
