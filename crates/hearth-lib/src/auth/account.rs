use chrono::{DateTime, Duration, Utc};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Seconds before `expires_at` at which a session is treated as expired.
pub const EXPIRY_MARGIN_SECS: i64 = 60;

/// Where an account's identity comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    /// Offline account, no server involved
    Local,
    /// Microsoft OAuth device flow
    Microsoft,
    /// Username and password against an authlib-injector compatible server
    Yggdrasil,
}

impl AccountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountKind::Local => "local",
            AccountKind::Microsoft => "microsoft",
            AccountKind::Yggdrasil => "yggdrasil",
        }
    }

    /// Value of the game's `--userType` argument. The game decides how to
    /// validate skins and ownership from this, so it must not change.
    pub fn user_type(&self) -> &'static str {
        match self {
            AccountKind::Local => "legacy",
            AccountKind::Microsoft => "msa",
            AccountKind::Yggdrasil => "mojang",
        }
    }
}

impl std::fmt::Display for AccountKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AccountKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" | "offline" => Ok(AccountKind::Local),
            "microsoft" | "msa" => Ok(AccountKind::Microsoft),
            "yggdrasil" | "elyby" => Ok(AccountKind::Yggdrasil),
            _ => Err(anyhow::anyhow!("Unknown account kind: {}", s)),
        }
    }
}

/// Identity of an account inside the store. Player ids are only unique per
/// kind, so both halves are needed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountKey {
    pub kind: AccountKind,
    pub player_id: String,
}

impl AccountKey {
    pub fn new(kind: AccountKind, player_id: impl Into<String>) -> Self {
        Self {
            kind,
            player_id: player_id.into(),
        }
    }
}

impl std::fmt::Display for AccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.player_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub kind: AccountKind,
    pub display_name: String,
    pub player_id: String,
    #[serde(default)]
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Provider-specific values (e.g. the Xbox user id for Microsoft accounts)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, String>,
}

impl Account {
    /// Build an offline account whose id is derived from the username.
    pub fn local(username: &str) -> Self {
        Self {
            kind: AccountKind::Local,
            display_name: username.to_string(),
            player_id: offline_player_id(username),
            access_token: String::new(),
            refresh_token: None,
            expires_at: None,
            extra: HashMap::new(),
        }
    }

    pub fn key(&self) -> AccountKey {
        AccountKey::new(self.kind, self.player_id.clone())
    }

    pub fn is_local(&self) -> bool {
        self.kind == AccountKind::Local
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Local accounts never expire. Everything else is expired from
    /// `EXPIRY_MARGIN_SECS` before `expires_at` onward, or when no expiry is
    /// known at all.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        if self.is_local() {
            return false;
        }
        match self.expires_at {
            Some(expires_at) => now >= expires_at - Duration::seconds(EXPIRY_MARGIN_SECS),
            None => true,
        }
    }

    /// Player id without dashes, the form the game expects for `--uuid`.
    pub fn compact_player_id(&self) -> String {
        self.player_id.replace('-', "")
    }
}

/// Stable offline identifier for `username`: the MD5 of
/// `"OfflinePlayer:<username>"` with the version nibble set to 3.
///
/// The variant bits are kept as hashed. Worlds already played with these ids
/// store player data under them, so they must not change.
pub fn offline_player_id(username: &str) -> String {
    let digest = Md5::digest(format!("OfflinePlayer:{}", username).as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest);
    bytes[6] = (bytes[6] & 0x0f) | 0x30;
    uuid::Uuid::from_bytes(bytes).hyphenated().to_string()
}
