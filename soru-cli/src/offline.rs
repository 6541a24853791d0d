//! Stand-ins for the Firebase adapters when running with `--offline`.

use async_trait::async_trait;
use soru::auth::IdentityListener;
use soru::{
    ApprovalRecord, ApprovalStore, AuthError, Identity, IdentityProvider, SignupProfile,
    Subscription,
};

pub const LOCAL_UID: &str = "local";

/// Reports a single, always signed-in local user.
pub struct LocalProvider;

#[async_trait]
impl IdentityProvider for LocalProvider {
    fn subscribe(&self, listener: IdentityListener) -> Subscription {
        listener(Some(Identity::new(LOCAL_UID).with_email("yerel kullanıcı")));
        Subscription::noop()
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        Ok(())
    }
}

/// Approves everyone and keeps no profiles.
pub struct ApproveAll;

#[async_trait]
impl ApprovalStore for ApproveAll {
    async fn approval(&self, _identity: &Identity) -> Result<Option<ApprovalRecord>, AuthError> {
        Ok(Some(ApprovalRecord {
            is_approved: Some(true),
        }))
    }

    async fn create_profile(
        &self,
        identity: &Identity,
        _profile: &SignupProfile,
    ) -> Result<(), AuthError> {
        tracing::debug!(uid = %identity.uid, "offline: profile not stored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use soru::{SessionGate, SessionState};

    use super::*;

    #[tokio::test]
    async fn offline_gate_approves_local_user() {
        let gate = SessionGate::start(Arc::new(LocalProvider), Arc::new(ApproveAll));
        let mut rx = gate.watch();
        let state = tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                let current = rx.borrow_and_update().clone();
                if current != SessionState::Loading {
                    return current;
                }
                rx.changed().await.unwrap();
            }
        })
        .await
        .unwrap();
        assert!(state.is_approved());
        assert_eq!(state.identity().unwrap().uid, LOCAL_UID);
    }

    #[tokio::test]
    async fn sign_out_is_a_noop() {
        assert!(LocalProvider.sign_out().await.is_ok());
    }
}
