//! Core of the Hearth launcher: accounts, profiles, installs and launch assembly.
//!
//! Nothing in here talks to a network service directly. Identity providers,
//! version catalogs, loader installers and mod registries are collaborators
//! supplied by the embedding application through the traits in [`auth`] and
//! [`game::installer::core`].

pub mod auth;
pub mod config;
pub mod context;
pub mod error;
pub mod game;
pub mod utils;

pub use auth::{Account, AccountKey, AccountKind, AccountStore};
pub use config::{LauncherConfig, LauncherPaths};
pub use context::{LauncherContext, SharedProfileImport};
pub use error::{ArchiveError, AuthError, InstallError, LauncherError, StoreError};
pub use game::profile::{
    LoaderKind, NewProfile, Profile, ProfileDraft, ProfileStore, ProfileUpdate,
};
