/// Core types for game launching
use crate::auth::{offline_player_id, Account, AccountKind, DEFAULT_PLAYER_NAME};
use std::collections::HashMap;
use std::path::PathBuf;

/// Fully-specified process launch. Building one has no side effects apart
/// from creating the working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub executable: PathBuf,
    pub args: Vec<String>,
    pub working_directory: PathBuf,
    pub env: HashMap<String, String>,
}

/// Identity handed to the game process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchAuth {
    pub username: String,
    /// Player id without dashes
    pub uuid: String,
    pub access_token: String,
    /// `legacy`, `msa` or `mojang`
    pub user_type: String,
    /// Provider agent flags, prepended to the JVM arguments
    pub jvm_args: Vec<String>,
}

impl LaunchAuth {
    /// Offline "Player" identity with no token.
    pub fn default_player() -> Self {
        Self {
            username: DEFAULT_PLAYER_NAME.to_string(),
            uuid: offline_player_id(DEFAULT_PLAYER_NAME).replace('-', ""),
            access_token: String::new(),
            user_type: AccountKind::Local.user_type().to_string(),
            jvm_args: Vec::new(),
        }
    }

    pub fn from_account(account: &Account, jvm_args: Vec<String>) -> Self {
        Self {
            username: account.display_name.clone(),
            uuid: account.compact_player_id(),
            access_token: account.access_token.clone(),
            user_type: account.kind.user_type().to_string(),
            jvm_args,
        }
    }
}

/// What the version catalog knows about an installed version that the command
/// line needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchManifest {
    /// Id as stored by the catalog (the profile's resolved version id)
    pub version_id: String,
    pub main_class: String,
    /// Absolute jar paths, in classpath order
    pub classpath: Vec<PathBuf>,
    pub natives_dir: PathBuf,
    pub assets_dir: PathBuf,
    pub asset_index: String,
    /// "release", "snapshot", ...
    pub version_type: String,
    /// Extra game arguments required by the loader, if any
    pub game_args: Vec<String>,
}
