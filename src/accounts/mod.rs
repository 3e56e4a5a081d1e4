use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use thiserror::Error;

use crate::models::profile::UserProfile;

pub const NAME_MIN: usize = 3;
pub const NAME_MAX: usize = 15;

const FILE_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum AccountError {
    #[error("login must be {NAME_MIN} to {NAME_MAX} characters long")]
    BadNameLength,
    #[error("that login is already taken")]
    NameTaken,
    #[error("no account with login '{0}'")]
    NoSuchUser(String),
    #[error("wrong login or password")]
    BadCredentials,
    #[error("login '{0}' is not allowed on this server")]
    LoginBanned(String),
    #[error("unsupported account file version {0}")]
    UnsupportedVersion(u32),
    #[error("failed to access the account file: {0}")]
    Io(#[from] io::Error),
    #[error("the account file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// A stored account. Only the digest of the password ever touches disk or
/// memory; the plain credential is hashed the moment it arrives.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AccountRecord {
    pub name: String,
    pub password_digest: String,
    pub rank: u32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub online_seconds: u64,
}

impl AccountRecord {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            name: self.name.clone(),
            rank: self.rank,
            wins: self.wins,
            losses: self.losses,
            draws: self.draws,
            online_seconds: self.online_seconds,
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
struct AccountFile {
    version: u32,
    users: Vec<AccountRecord>,
}

/// Lowercase hex SHA-512 of the given string. Applied to whatever
/// credential string the client sends, so the server never stores it.
pub fn sha512_hex(input: &str) -> String {
    let digest = Sha512::digest(input.as_bytes());
    digest.iter().map(|byte| format!("{:02x}", byte)).collect()
}

/// A plain-text deny list, one entry per line. Blank lines and lines
/// starting with `//` are skipped.
#[derive(Debug, Clone, Default)]
pub struct BanList {
    entries: Vec<String>,
}

impl BanList {
    pub fn load(path: &Path) -> BanList {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("No ban list at {}", path.display());
                return BanList::default();
            }
            Err(err) => {
                log::error!("Failed to read ban list {}: {}", path.display(), err);
                return BanList::default();
            }
        };
        let entries: Vec<String> = raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with("//"))
            .map(str::to_string)
            .collect();
        info!("Loaded {} entries from {}", entries.len(), path.display());
        BanList { entries }
    }

    pub fn contains(&self, value: &str) -> bool {
        self.entries.iter().any(|entry| entry == value)
    }

    /// Prefix match, used for addresses so whole networks can be listed.
    pub fn matches_prefix(&self, value: &str) -> bool {
        self.entries.iter().any(|entry| value.starts_with(entry))
    }
}

/// All known accounts, kept in memory and rewritten to disk as a whole on
/// every mutation.
#[derive(Debug)]
pub struct AccountStore {
    path: PathBuf,
    users: HashMap<String, AccountRecord>,
    banned_logins: BanList,
    default_rank: u32,
}

impl AccountStore {
    /// Loads the store from `path`. A missing file is an empty store; a
    /// present but unreadable one is an error, silently starting over would
    /// lose every account.
    pub fn load(
        path: PathBuf,
        banned_logins: BanList,
        default_rank: u32,
    ) -> Result<AccountStore, AccountError> {
        let users = match fs::read_to_string(&path) {
            Ok(raw) => {
                let file: AccountFile = serde_json::from_str(&raw)?;
                if file.version != FILE_VERSION {
                    return Err(AccountError::UnsupportedVersion(file.version));
                }
                file.users
                    .into_iter()
                    .map(|record| (record.name.clone(), record))
                    .collect()
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => HashMap::new(),
            Err(err) => return Err(AccountError::Io(err)),
        };
        info!("Loaded {} accounts from {}", users.len(), path.display());
        Ok(AccountStore {
            path,
            users,
            banned_logins,
            default_rank,
        })
    }

    /// Registers a new account and persists it. The password arrives as an
    /// opaque string and is digested here.
    pub fn create(&mut self, name: &str, password: &str) -> Result<AccountRecord, AccountError> {
        if name.chars().count() < NAME_MIN || name.chars().count() > NAME_MAX {
            return Err(AccountError::BadNameLength);
        }
        if self.banned_logins.contains(name) {
            return Err(AccountError::LoginBanned(name.to_string()));
        }
        if self.users.contains_key(name) {
            return Err(AccountError::NameTaken);
        }
        let record = AccountRecord {
            name: name.to_string(),
            password_digest: sha512_hex(password),
            rank: self.default_rank,
            wins: 0,
            losses: 0,
            draws: 0,
            online_seconds: 0,
        };
        self.users.insert(name.to_string(), record.clone());
        self.persist()?;
        info!("Created account '{}'", name);
        Ok(record)
    }

    /// Checks a login attempt against the stored digest.
    pub fn login(&self, name: &str, password: &str) -> Result<AccountRecord, AccountError> {
        if self.banned_logins.contains(name) {
            return Err(AccountError::LoginBanned(name.to_string()));
        }
        let record = self
            .users
            .get(name)
            .ok_or_else(|| AccountError::NoSuchUser(name.to_string()))?;
        if record.password_digest != sha512_hex(password) {
            return Err(AccountError::BadCredentials);
        }
        Ok(record.clone())
    }

    pub fn find(&self, name: &str) -> Option<&AccountRecord> {
        self.users.get(name)
    }

    /// Replaces an existing record and persists the store.
    pub fn update(&mut self, record: AccountRecord) -> Result<(), AccountError> {
        if !self.users.contains_key(&record.name) {
            return Err(AccountError::NoSuchUser(record.name));
        }
        self.users.insert(record.name.clone(), record);
        self.persist()
    }

    /// Adds finished-session time to an account.
    pub fn add_online_seconds(&mut self, name: &str, seconds: u64) -> Result<(), AccountError> {
        let record = self
            .users
            .get_mut(name)
            .ok_or_else(|| AccountError::NoSuchUser(name.to_string()))?;
        record.online_seconds += seconds;
        self.persist()
    }

    fn persist(&self) -> Result<(), AccountError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut users: Vec<AccountRecord> = self.users.values().cloned().collect();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        let file = AccountFile {
            version: FILE_VERSION,
            users,
        };
        fs::write(&self.path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }
}
