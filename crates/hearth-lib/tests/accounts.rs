mod common;

use common::{init_logging, session, ScriptedProvider};
use hearth_lib::auth::Credentials;
use hearth_lib::game::installer::types::CancelToken;
use hearth_lib::{AccountKind, AccountStore, AuthError};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn open(tmp: &TempDir) -> AccountStore {
    AccountStore::open(tmp.path().join("accounts.json"), &tmp.path().join("client_token"))
}

fn code() -> Credentials {
    Credentials::AuthorizationCode {
        code: "M.C507_BAY.2.U.abc".to_string(),
    }
}

#[tokio::test]
async fn local_accounts_match_case_insensitively() {
    init_logging();
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp);

    let a = store.add_local_account("Notch").await;
    let b = store.add_local_account("NOTCH").await;
    assert_eq!(a.player_id, b.player_id);
    assert_eq!(a.player_id, "b50ad385-829d-3141-a216-7e7d7539ba7f");
    assert_eq!(store.accounts().await.len(), 1);

    // Same id after a restart
    drop(store);
    let store = open(&tmp);
    assert_eq!(store.add_local_account("notch").await.player_id, a.player_id);
}

#[tokio::test]
async fn removing_active_falls_back_to_first_remaining() {
    let tmp = TempDir::new().unwrap();
    let store = open(&tmp);
    let alex = store.add_local_account("Alex").await;
    let steve = store.add_local_account("Steve").await;
    let herobrine = store.add_local_account("Herobrine").await;

    // Removing a non-active account leaves the active one alone
    assert!(store.remove(&steve.key()).await);
    assert_eq!(store.active().await.unwrap().key(), herobrine.key());

    assert!(store.remove(&herobrine.key()).await);
    assert_eq!(store.active().await.unwrap().key(), alex.key());

    assert!(store.remove(&alex.key()).await);
    assert!(store.active().await.is_none());
    assert!(!store.remove(&alex.key()).await);
}

#[tokio::test]
async fn provider_login_replaces_same_player() {
    let tmp = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::new(AccountKind::Microsoft));
    let store = open(&tmp).with_provider(provider.clone());
    store.add_local_account("Steve").await;

    provider.next_login(Ok(session("Jeb", "853c80ef3c3749fdaa49938b674adae6", "first")));
    store
        .complete_provider_login(AccountKind::Microsoft, code())
        .await
        .unwrap();
    provider.next_login(Ok(session("Jeb_", "853c80ef3c3749fdaa49938b674adae6", "second")));
    let account = store
        .complete_provider_login(AccountKind::Microsoft, code())
        .await
        .unwrap();

    let accounts = store.accounts().await;
    assert_eq!(accounts.len(), 2);
    let microsoft: Vec<_> = accounts
        .iter()
        .filter(|a| a.kind == AccountKind::Microsoft)
        .collect();
    assert_eq!(microsoft.len(), 1);
    assert_eq!(microsoft[0].access_token, "second");
    assert_eq!(store.active().await.unwrap().key(), account.key());
}

#[tokio::test]
async fn rejected_login_changes_nothing() {
    let tmp = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::new(AccountKind::Yggdrasil));
    let store = open(&tmp).with_provider(provider.clone());
    let steve = store.add_local_account("Steve").await;

    provider.next_login(Err(AuthError::ProviderRejected("Invalid credentials".to_string())));
    let err = store
        .complete_provider_login(
            AccountKind::Yggdrasil,
            Credentials::Password {
                username: "steve@example.com".to_string(),
                password: "hunter2".to_string(),
            },
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "provider_rejected");
    assert_eq!(store.accounts().await.len(), 1);
    assert_eq!(store.active().await.unwrap().key(), steve.key());
}

#[tokio::test]
async fn failed_refresh_leaves_account_untouched() {
    let tmp = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::new(AccountKind::Microsoft));
    let store = open(&tmp).with_provider(provider.clone());

    let mut expired = session("Jeb", "853c80ef3c3749fdaa49938b674adae6", "stale");
    expired.expires_at = Some(chrono::Utc::now() - chrono::Duration::minutes(5));
    provider.next_login(Ok(expired));
    let account = store
        .complete_provider_login(AccountKind::Microsoft, code())
        .await
        .unwrap();
    assert!(account.is_expired());

    provider.next_refresh(Err(AuthError::Network("timed out".to_string())));
    assert!(!store.ensure_valid(None).await);
    let after = store.get(&account.key()).await.unwrap();
    assert_eq!(after, account);

    provider.next_refresh(Ok(session("Jeb", "853c80ef3c3749fdaa49938b674adae6", "fresh")));
    assert!(store.ensure_valid(None).await);
    assert_eq!(store.get(&account.key()).await.unwrap().access_token, "fresh");
    assert_eq!(*provider.refresh_calls.lock().unwrap(), 2);
}

#[tokio::test]
async fn login_can_be_abandoned() {
    let tmp = TempDir::new().unwrap();
    let mut provider = ScriptedProvider::new(AccountKind::Microsoft);
    provider.login_delay = Duration::from_secs(30);
    let store = open(&tmp).with_provider(Arc::new(provider));

    let (handle, token) = CancelToken::pair();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.cancel();
    });

    let err = store
        .complete_provider_login_cancellable(AccountKind::Microsoft, code(), &token)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Cancelled));
    assert!(store.accounts().await.is_empty());
}

#[tokio::test]
async fn launch_auth_uses_provider_tag() {
    let tmp = TempDir::new().unwrap();
    let provider = Arc::new(ScriptedProvider::new(AccountKind::Yggdrasil));
    let store = open(&tmp).with_provider(provider.clone());

    assert_eq!(store.launch_auth().await.username, "Player");

    provider.next_login(Ok(session("Steve", "8667ba71-b85a-4004-af54-457a9734eed7", "tok")));
    store
        .complete_provider_login(AccountKind::Yggdrasil, code())
        .await
        .unwrap();
    let auth = store.launch_auth().await;
    assert_eq!(auth.user_type, "mojang");
    assert_eq!(auth.uuid, "8667ba71b85a4004af54457a9734eed7");
    assert_eq!(auth.access_token, "tok");
}
