//! External collaborator contracts (§6).
//!
//! The tray UI, OS keychain backends, the remote identity/license server, the
//! auto-updater, and the hook helper are explicitly out of scope (§1). This
//! module defines only the thin interfaces the core consumes from them, plus
//! in-memory default implementations so the rest of the workspace (and its
//! tests) can run without any of those shells wired up.

use async_trait::async_trait;

/// `Get(key) / Set(key, value) / Delete(key)` — async, nullable return,
/// never throws (§6).
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    async fn set(&self, key: &str, value: &str);
    async fn delete(&self, key: &str);
}

/// Sign-in state as observed by `AuthService::get_state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    SignedOut,
    SignedIn,
}

/// `GetAccessToken` (cached, auto-renew), `HandleAuthCallback`, `SignOut`,
/// `TriggerReauth`, `GetPat`, `GetState` (§6).
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Cached bearer credential for the conversation provider / cloud sync
    /// targets. `None` when signed out — callers treat this as
    /// `ErrorKind::AuthAbsent` and abort the current pass, not the process.
    async fn get_access_token(&self) -> Option<String>;

    /// The long-lived PAT used to authenticate the loopback intake (§4.8).
    async fn get_pat(&self) -> Option<String>;

    /// Hand both tokens from `/auth/callback` to the collaborator.
    async fn handle_auth_callback(&self, refresh: &str, access: &str);

    async fn sign_out(&self);

    async fn trigger_reauth(&self);

    async fn get_state(&self) -> AuthState;
}

/// License activation state as observed by `LicenseService::get_state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LicenseState {
    Unlicensed,
    Active,
    Revoked,
}

/// `GetState`, `ActivateAsync(key)`, `CheckRevocation`,
/// `NeedsRevocationCheck` (§6).
#[async_trait]
pub trait LicenseService: Send + Sync {
    async fn get_state(&self) -> LicenseState;
    async fn activate(&self, key: &str) -> Result<(), String>;
    async fn check_revocation(&self);
    async fn needs_revocation_check(&self) -> bool;
}

/// In-memory `CredentialStore` — stands in for the OS keychain in tests and
/// for any deployment that hasn't wired a real keychain backend.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    entries: tokio::sync::Mutex<std::collections::HashMap<String, String>>,
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().await.get(key).cloned()
    }

    async fn set(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
    }

    async fn delete(&self, key: &str) {
        self.entries.lock().await.remove(key);
    }
}

/// An `AuthService` that is always signed out. Used where no identity server
/// is reachable; every remote pass that depends on it logs an Auth-absent
/// condition and idles rather than failing.
#[derive(Debug, Default)]
pub struct NullAuthService;

#[async_trait]
impl AuthService for NullAuthService {
    async fn get_access_token(&self) -> Option<String> {
        None
    }

    async fn get_pat(&self) -> Option<String> {
        None
    }

    async fn handle_auth_callback(&self, _refresh: &str, _access: &str) {}

    async fn sign_out(&self) {}

    async fn trigger_reauth(&self) {}

    async fn get_state(&self) -> AuthState {
        AuthState::SignedOut
    }
}

/// A `LicenseService` that reports unlicensed and never checks revocation.
#[derive(Debug, Default)]
pub struct NullLicenseService;

#[async_trait]
impl LicenseService for NullLicenseService {
    async fn get_state(&self) -> LicenseState {
        LicenseState::Unlicensed
    }

    async fn activate(&self, _key: &str) -> Result<(), String> {
        Err("no license server configured".to_string())
    }

    async fn check_revocation(&self) {}

    async fn needs_revocation_check(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_credential_store_round_trips() {
        let store = InMemoryCredentialStore::default();
        assert_eq!(store.get("k").await, None);
        store.set("k", "v").await;
        assert_eq!(store.get("k").await, Some("v".to_string()));
        store.delete("k").await;
        assert_eq!(store.get("k").await, None);
    }

    #[tokio::test]
    async fn null_auth_service_is_always_signed_out() {
        let svc = NullAuthService;
        assert_eq!(svc.get_state().await, AuthState::SignedOut);
        assert_eq!(svc.get_access_token().await, None);
    }

    #[tokio::test]
    async fn null_license_service_rejects_activation() {
        let svc = NullLicenseService;
        assert!(svc.activate("key").await.is_err());
        assert_eq!(svc.get_state().await, LicenseState::Unlicensed);
    }
}
