//! Account store
//!
//! Keeps every signed-in account plus the single active one, and decides when
//! a session needs refreshing. Network work is delegated to the registered
//! [`IdentityProvider`]s; the store never holds its lock across a provider
//! call.

pub mod account;
pub mod provider;

pub use account::{offline_player_id, Account, AccountKey, AccountKind, EXPIRY_MARGIN_SECS};
pub use provider::{AuthlibInjector, Credentials, IdentityProvider, ProviderSession};

use crate::error::{AuthError, StoreError};
use crate::game::installer::types::CancelToken;
use crate::game::launcher::types::LaunchAuth;
use crate::utils::fs::{read_json, write_json_atomic};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Username used when launching with no account at all.
pub const DEFAULT_PLAYER_NAME: &str = "Player";

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountsDocument {
    #[serde(default)]
    accounts: Vec<Account>,
    #[serde(default)]
    active_player_id: Option<String>,
    #[serde(default)]
    active_kind: Option<AccountKind>,
}

#[derive(Debug, Default)]
struct AccountState {
    accounts: Vec<Account>,
    active: Option<AccountKey>,
}

impl AccountState {
    fn from_document(doc: AccountsDocument) -> Self {
        let active = doc.active_player_id.and_then(|player_id| {
            doc.accounts
                .iter()
                .find(|a| a.player_id == player_id && doc.active_kind.map_or(true, |k| k == a.kind))
                .map(Account::key)
        });
        Self {
            accounts: doc.accounts,
            active,
        }
    }

    fn to_document(&self) -> AccountsDocument {
        AccountsDocument {
            accounts: self.accounts.clone(),
            active_player_id: self.active.as_ref().map(|k| k.player_id.clone()),
            active_kind: self.active.as_ref().map(|k| k.kind),
        }
    }

    fn find(&self, key: &AccountKey) -> Option<&Account> {
        self.accounts
            .iter()
            .find(|a| a.kind == key.kind && a.player_id == key.player_id)
    }

    fn find_mut(&mut self, key: &AccountKey) -> Option<&mut Account> {
        self.accounts
            .iter_mut()
            .find(|a| a.kind == key.kind && a.player_id == key.player_id)
    }

    fn active_account(&self) -> Option<&Account> {
        self.active.as_ref().and_then(|key| self.find(key))
    }
}

pub struct AccountStore {
    path: PathBuf,
    client_token: String,
    providers: HashMap<AccountKind, Arc<dyn IdentityProvider>>,
    state: Mutex<AccountState>,
}

impl AccountStore {
    /// Open the store at `path`. An unreadable accounts file is logged and
    /// treated as empty; it will be overwritten on the next change.
    pub fn open(path: impl Into<PathBuf>, client_token_path: &Path) -> Self {
        let path = path.into();
        let state = match read_json::<AccountsDocument>(&path) {
            Ok(Some(doc)) => AccountState::from_document(doc),
            Ok(None) => AccountState::default(),
            Err(e) => {
                log::warn!("[accounts] Starting with no accounts: {:#}", e);
                AccountState::default()
            }
        };
        log::info!(
            "[accounts] Loaded {} account(s) from {}",
            state.accounts.len(),
            path.display()
        );

        Self {
            path,
            client_token: load_or_create_client_token(client_token_path),
            providers: HashMap::new(),
            state: Mutex::new(state),
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.register_provider(provider);
        self
    }

    pub fn register_provider(&mut self, provider: Arc<dyn IdentityProvider>) {
        self.providers.insert(provider.kind(), provider);
    }

    pub fn client_token(&self) -> &str {
        &self.client_token
    }

    pub async fn accounts(&self) -> Vec<Account> {
        self.state.lock().await.accounts.clone()
    }

    pub async fn active(&self) -> Option<Account> {
        self.state.lock().await.active_account().cloned()
    }

    pub async fn get(&self, key: &AccountKey) -> Option<Account> {
        self.state.lock().await.find(key).cloned()
    }

    /// Add (or reuse) an offline account and make it active. Usernames match
    /// case-insensitively, so "Steve" and "steve" are one account.
    pub async fn add_local_account(&self, username: &str) -> Account {
        let username = match username.trim() {
            "" => DEFAULT_PLAYER_NAME,
            name => name,
        };

        let mut state = self.state.lock().await;
        let existing = state
            .accounts
            .iter()
            .find(|a| a.is_local() && a.display_name.eq_ignore_ascii_case(username))
            .cloned();

        let account = match existing {
            Some(account) => {
                log::info!("[accounts] Reusing local account {}", account.display_name);
                account
            }
            None => {
                let account = Account::local(username);
                log::info!(
                    "[accounts] Added local account {} ({})",
                    account.display_name,
                    account.player_id
                );
                state.accounts.push(account.clone());
                account
            }
        };
        state.active = Some(account.key());
        self.persist_logged(&state);
        account
    }

    /// Sign in through the provider registered for `kind`. An existing account
    /// with the same kind and player id is replaced, and the new one becomes
    /// active.
    pub async fn complete_provider_login(
        &self,
        kind: AccountKind,
        credentials: Credentials,
    ) -> Result<Account, AuthError> {
        let provider = self.provider(kind)?;
        log::info!("[accounts] Starting {} login", kind);
        let session = provider
            .login(credentials, &self.client_token)
            .await
            .map_err(|e| {
                log::error!("[accounts] {} login failed: {}", kind, e);
                e
            })?;
        Ok(self.store_session(kind, session).await)
    }

    /// Like [`complete_provider_login`](Self::complete_provider_login), but
    /// gives up with [`AuthError::Cancelled`] as soon as `cancel` fires.
    pub async fn complete_provider_login_cancellable(
        &self,
        kind: AccountKind,
        credentials: Credentials,
        cancel: &CancelToken,
    ) -> Result<Account, AuthError> {
        tokio::select! {
            result = self.complete_provider_login(kind, credentials) => result,
            _ = cancel.cancelled() => {
                log::info!("[accounts] {} login abandoned", kind);
                Err(AuthError::Cancelled)
            }
        }
    }

    async fn store_session(&self, kind: AccountKind, session: ProviderSession) -> Account {
        let account = session.into_account(kind);
        let key = account.key();

        let mut state = self.state.lock().await;
        state
            .accounts
            .retain(|a| !(a.kind == key.kind && a.player_id == key.player_id));
        state.accounts.push(account.clone());
        state.active = Some(key);
        self.persist_logged(&state);

        log::info!("[accounts] Signed in {} via {}", account.display_name, kind);
        account
    }

    /// Refresh the session of `key`. Local accounts succeed without doing
    /// anything. On failure nothing is changed and `false` is returned; the
    /// caller decides whether to ask for a new login.
    pub async fn refresh(&self, key: &AccountKey) -> bool {
        let account = match self.get(key).await {
            Some(account) => account,
            None => {
                log::warn!("[accounts] Refresh requested for unknown account {}", key);
                return false;
            }
        };
        if account.is_local() {
            return true;
        }
        // Yggdrasil refreshes with the access token itself, so only give up
        // when there is nothing at all to refresh with.
        if account.refresh_token.is_none() && account.access_token.is_empty() {
            log::warn!(
                "[accounts] {}",
                AuthError::TokenExpiredNoRefresh(account.display_name.clone())
            );
            return false;
        }

        let provider = match self.provider(account.kind) {
            Ok(provider) => provider,
            Err(e) => {
                log::error!("[accounts] Cannot refresh {}: {}", key, e);
                return false;
            }
        };

        log::info!("[accounts] Refreshing session for {}", account.display_name);
        let session = match provider.refresh(&account, &self.client_token).await {
            Ok(session) => session,
            Err(e) => {
                log::error!(
                    "[accounts] Refresh failed for {} ({}): {}",
                    account.display_name,
                    e.kind(),
                    e
                );
                return false;
            }
        };

        let mut state = self.state.lock().await;
        match state.find_mut(key) {
            Some(stored) => {
                session.apply_refresh(stored);
                log::info!("[accounts] Refreshed session for {}", stored.display_name);
            }
            None => {
                log::warn!("[accounts] {} was removed during refresh", key);
                return false;
            }
        }
        self.persist_logged(&state);
        true
    }

    /// Make sure the given account (or the active one) has a usable session,
    /// refreshing it when it is about to expire. Returns `false` when there is
    /// no account or the refresh failed.
    pub async fn ensure_valid(&self, key: Option<&AccountKey>) -> bool {
        let account = match key {
            Some(key) => self.get(key).await,
            None => self.active().await,
        };
        let Some(account) = account else {
            return false;
        };
        if account.is_local() || !account.is_expired() {
            return true;
        }
        self.refresh(&account.key()).await
    }

    /// Remove an account. If it was active, the first remaining account takes
    /// over, or nothing is active when the store is now empty.
    pub async fn remove(&self, key: &AccountKey) -> bool {
        let mut state = self.state.lock().await;
        let before = state.accounts.len();
        state
            .accounts
            .retain(|a| !(a.kind == key.kind && a.player_id == key.player_id));
        if state.accounts.len() == before {
            return false;
        }

        if state.active.as_ref() == Some(key) {
            state.active = state.accounts.first().map(Account::key);
        }
        self.persist_logged(&state);
        log::info!("[accounts] Removed {}", key);
        true
    }

    /// Clear the active pointer. Accounts stay stored.
    pub async fn logout(&self) {
        let mut state = self.state.lock().await;
        state.active = None;
        self.persist_logged(&state);
    }

    pub async fn set_active(&self, key: &AccountKey) -> Result<(), AuthError> {
        let mut state = self.state.lock().await;
        if state.find(key).is_none() {
            return Err(AuthError::UnknownAccount(key.to_string()));
        }
        state.active = Some(key.clone());
        self.persist_logged(&state);
        Ok(())
    }

    /// Credentials to hand to the game for the active account, or the default
    /// offline "Player" identity when nobody is signed in.
    pub async fn launch_auth(&self) -> LaunchAuth {
        let Some(account) = self.active().await else {
            return LaunchAuth::default_player();
        };
        let jvm_args = self
            .providers
            .get(&account.kind)
            .map(|provider| provider.launch_jvm_args())
            .unwrap_or_default();
        LaunchAuth::from_account(&account, jvm_args)
    }

    /// Write the current state to disk, reporting failure to the caller.
    pub async fn flush(&self) -> Result<(), StoreError> {
        let state = self.state.lock().await;
        self.persist(&state)
    }

    fn provider(&self, kind: AccountKind) -> Result<Arc<dyn IdentityProvider>, AuthError> {
        self.providers.get(&kind).cloned().ok_or_else(|| {
            AuthError::ProviderRejected(format!("no identity provider registered for {}", kind))
        })
    }

    fn persist(&self, state: &AccountState) -> Result<(), StoreError> {
        write_json_atomic(&self.path, &state.to_document())
            .map_err(|e| StoreError::persistence(&self.path, format!("{:#}", e)))
    }

    fn persist_logged(&self, state: &AccountState) {
        if let Err(e) = self.persist(state) {
            log::error!("[accounts] {}", e);
        }
    }
}

/// Read the installation's client token, creating it on first use. If the
/// token cannot be written, a fresh one is used for this session only.
fn load_or_create_client_token(path: &Path) -> String {
    if let Ok(existing) = std::fs::read_to_string(path) {
        let existing = existing.trim();
        if !existing.is_empty() {
            return existing.to_string();
        }
    }

    let token = uuid::Uuid::new_v4().to_string();
    let written = path
        .parent()
        .map_or(Ok(()), std::fs::create_dir_all)
        .and_then(|_| std::fs::write(path, &token));
    if let Err(e) = written {
        log::error!(
            "[accounts] Failed to save client token to {}: {}",
            path.display(),
            e
        );
    }
    token
}
