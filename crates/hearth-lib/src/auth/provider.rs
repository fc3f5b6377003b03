//! Seam between the account store and remote identity services.

use crate::auth::account::{Account, AccountKind};
use crate::error::AuthError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;

/// What the user handed over to sign in.
#[derive(Clone)]
pub enum Credentials {
    /// Code returned by an OAuth or device-code flow
    AuthorizationCode { code: String },
    /// Username (or email) and password
    Password { username: String, password: String },
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::AuthorizationCode { .. } => f.write_str("AuthorizationCode { .. }"),
            Credentials::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .finish_non_exhaustive(),
        }
    }
}

/// Result of a successful login or refresh.
#[derive(Debug, Clone, Default)]
pub struct ProviderSession {
    pub display_name: String,
    pub player_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub extra: HashMap<String, String>,
}

impl ProviderSession {
    pub fn into_account(self, kind: AccountKind) -> Account {
        Account {
            kind,
            display_name: self.display_name,
            player_id: self.player_id,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self.expires_at,
            extra: self.extra,
        }
    }

    /// Copy refreshed tokens onto an existing account. The identity stays put;
    /// a refresh token the provider did not rotate is kept.
    pub(crate) fn apply_refresh(self, account: &mut Account) {
        if !self.display_name.is_empty() {
            account.display_name = self.display_name;
        }
        account.access_token = self.access_token;
        if self.refresh_token.is_some() {
            account.refresh_token = self.refresh_token;
        }
        account.expires_at = self.expires_at;
        account.extra.extend(self.extra);
    }
}

/// A remote identity service. Implementations own the wire protocol and map
/// their failures onto [`AuthError::Network`] / [`AuthError::ProviderRejected`].
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn kind(&self) -> AccountKind;

    /// `client_token` is the per-installation correlation token; providers
    /// that scope refresh tokens to a client must send it.
    async fn login(
        &self,
        credentials: Credentials,
        client_token: &str,
    ) -> Result<ProviderSession, AuthError>;

    async fn refresh(
        &self,
        account: &Account,
        client_token: &str,
    ) -> Result<ProviderSession, AuthError>;

    /// JVM arguments the game needs to talk to this provider, placed ahead of
    /// every other JVM flag.
    fn launch_jvm_args(&self) -> Vec<String> {
        Vec::new()
    }
}

/// authlib-injector agent, used by Yggdrasil-compatible providers to redirect
/// the game's session checks to their own server.
#[derive(Debug, Clone)]
pub struct AuthlibInjector {
    pub jar_path: PathBuf,
    pub server_url: String,
}

impl AuthlibInjector {
    pub fn new(jar_path: impl Into<PathBuf>, server_url: impl Into<String>) -> Self {
        Self {
            jar_path: jar_path.into(),
            server_url: server_url.into(),
        }
    }

    pub fn jvm_args(&self) -> Vec<String> {
        vec![
            format!("-javaagent:{}={}", self.jar_path.display(), self.server_url),
            "-Dauthlibinjector.side=client".to_string(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_debug_hides_secrets() {
        let creds = Credentials::Password {
            username: "alex@example.com".to_string(),
            password: "hunter2".to_string(),
        };
        let printed = format!("{:?}", creds);
        assert!(printed.contains("alex@example.com"));
        assert!(!printed.contains("hunter2"));
    }

    #[test]
    fn refresh_keeps_unrotated_refresh_token() {
        let mut account = ProviderSession {
            display_name: "Alex".to_string(),
            player_id: "abc".to_string(),
            access_token: "old".to_string(),
            refresh_token: Some("r1".to_string()),
            ..ProviderSession::default()
        }
        .into_account(AccountKind::Microsoft);

        ProviderSession {
            access_token: "new".to_string(),
            ..ProviderSession::default()
        }
        .apply_refresh(&mut account);

        assert_eq!(account.access_token, "new");
        assert_eq!(account.refresh_token.as_deref(), Some("r1"));
        assert_eq!(account.display_name, "Alex");
        assert_eq!(account.player_id, "abc");
    }

    #[test]
    fn authlib_agent_args() {
        let agent = AuthlibInjector::new("/data/authlib-injector.jar", "https://authserver.ely.by");
        assert_eq!(
            agent.jvm_args(),
            vec![
                "-javaagent:/data/authlib-injector.jar=https://authserver.ely.by".to_string(),
                "-Dauthlibinjector.side=client".to_string(),
            ]
        );
    }
}
