use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::auth::{ApprovalStore, Identity, IdentityProvider, SessionState, Subscription, resolve_session};

/// Turns identity notifications into [`SessionState`]s.
///
/// Starts in `Loading`. Each notification is resolved against the approval
/// store in arrival order and published on a watch channel. Dropping the
/// gate unsubscribes and stops the resolver task.
pub struct SessionGate {
    provider: Arc<dyn IdentityProvider>,
    state: watch::Receiver<SessionState>,
    subscription: Option<Subscription>,
    task: JoinHandle<()>,
}

impl SessionGate {
    /// Must be called from within a tokio runtime.
    pub fn start(provider: Arc<dyn IdentityProvider>, store: Arc<dyn ApprovalStore>) -> Self {
        let (state_tx, state_rx) = watch::channel(SessionState::Loading);
        let (notify_tx, mut notify_rx) = mpsc::unbounded_channel::<Option<Identity>>();

        // Spawned before subscribing so an emission during `subscribe` is
        // queued, not lost.
        let task = tokio::spawn(async move {
            while let Some(identity) = notify_rx.recv().await {
                let lookup = match &identity {
                    Some(id) => store.approval(id).await,
                    None => Ok(None),
                };
                let next = resolve_session(identity, lookup);
                tracing::info!(state = ?StateTag::from(&next), "session state");
                state_tx.send_replace(next);
            }
        });

        let subscription = provider.subscribe(Box::new(move |identity| {
            let _ = notify_tx.send(identity);
        }));

        Self {
            provider,
            state: state_rx,
            subscription: Some(subscription),
            task,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// A receiver that observes every published state.
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Best effort: a failure is logged and the state is left as is. A
    /// successful sign-out arrives as a regular identity notification.
    pub async fn logout(&self) {
        if let Err(e) = self.provider.sign_out().await {
            tracing::warn!(error = %e, "sign-out failed");
        }
    }
}

impl Drop for SessionGate {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        self.task.abort();
    }
}

/// Log-friendly view of a state without the identity payload.
#[derive(Debug)]
enum StateTag {
    Loading,
    Approved,
    Unapproved,
    LoggedOut,
}

impl From<&SessionState> for StateTag {
    fn from(state: &SessionState) -> Self {
        match state {
            SessionState::Loading => StateTag::Loading,
            SessionState::Approved(_) => StateTag::Approved,
            SessionState::Unapproved(_) => StateTag::Unapproved,
            SessionState::LoggedOut => StateTag::LoggedOut,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{ApprovalRecord, AuthError, IdentityListener, SignupProfile};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    /// Provider that emits the current user on subscribe and on `emit`.
    #[derive(Default)]
    struct ManualProvider {
        current: Mutex<Option<Identity>>,
        listener: Arc<Mutex<Option<IdentityListener>>>,
        fail_sign_out: bool,
        unsubscribed: Arc<AtomicBool>,
    }

    impl ManualProvider {
        fn emit(&self, identity: Option<Identity>) {
            *self.current.lock().unwrap() = identity.clone();
            if let Some(listener) = self.listener.lock().unwrap().as_ref() {
                listener(identity);
            }
        }
    }

    #[async_trait]
    impl IdentityProvider for ManualProvider {
        fn subscribe(&self, listener: IdentityListener) -> Subscription {
            listener(self.current.lock().unwrap().clone());
            *self.listener.lock().unwrap() = Some(listener);
            let slot = self.listener.clone();
            let flag = self.unsubscribed.clone();
            Subscription::new(move || {
                slot.lock().unwrap().take();
                flag.store(true, Ordering::SeqCst);
            })
        }

        async fn sign_out(&self) -> Result<(), AuthError> {
            if self.fail_sign_out {
                return Err(AuthError::service("auth/network-request-failed"));
            }
            self.emit(None);
            Ok(())
        }
    }

    #[derive(Default)]
    struct MapStore {
        records: HashMap<String, Result<ApprovalRecord, ()>>,
    }

    #[async_trait]
    impl ApprovalStore for MapStore {
        async fn approval(&self, identity: &Identity) -> Result<Option<ApprovalRecord>, AuthError> {
            match self.records.get(&identity.uid) {
                Some(Ok(record)) => Ok(Some(record.clone())),
                Some(Err(())) => Err(AuthError::service("unavailable")),
                None => Ok(None),
            }
        }

        async fn create_profile(&self, _: &Identity, _: &SignupProfile) -> Result<(), AuthError> {
            Ok(())
        }
    }

    fn store() -> Arc<MapStore> {
        let mut records = HashMap::new();
        records.insert(
            "ok".to_string(),
            Ok(ApprovalRecord {
                is_approved: Some(true),
            }),
        );
        records.insert(
            "no".to_string(),
            Ok(ApprovalRecord {
                is_approved: Some(false),
            }),
        );
        records.insert("err".to_string(), Err(()));
        Arc::new(MapStore { records })
    }

    async fn settle(gate: &SessionGate, want: impl Fn(&SessionState) -> bool) -> SessionState {
        let mut rx = gate.watch();
        tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|s| want(s)))
            .await
            .expect("state never settled")
            .expect("gate closed")
            .clone()
    }

    #[tokio::test]
    async fn starts_loading_then_logged_out() {
        let provider = Arc::new(ManualProvider::default());
        let gate = SessionGate::start(provider, store());
        let state = settle(&gate, |s| *s != SessionState::Loading).await;
        assert_eq!(state, SessionState::LoggedOut);
    }

    #[tokio::test]
    async fn approval_flag_decides_state() {
        let provider = Arc::new(ManualProvider::default());
        let gate = SessionGate::start(provider.clone(), store());

        provider.emit(Some(Identity::new("ok")));
        let state = settle(&gate, |s| matches!(s, SessionState::Approved(_))).await;
        assert_eq!(state.identity().map(|i| i.uid.as_str()), Some("ok"));

        for uid in ["no", "err", "missing"] {
            provider.emit(Some(Identity::new(uid)));
            let state = settle(&gate, |s| s.identity().is_some_and(|i| i.uid == uid)).await;
            assert_eq!(state, SessionState::Unapproved(Identity::new(uid)));
        }
    }

    #[tokio::test]
    async fn emission_during_subscribe_is_not_lost() {
        let provider = Arc::new(ManualProvider::default());
        *provider.current.lock().unwrap() = Some(Identity::new("ok"));
        let gate = SessionGate::start(provider, store());
        let state = settle(&gate, |s| *s != SessionState::Loading).await;
        assert!(state.is_approved());
    }

    #[tokio::test]
    async fn logout_emits_logged_out() {
        let provider = Arc::new(ManualProvider::default());
        *provider.current.lock().unwrap() = Some(Identity::new("ok"));
        let gate = SessionGate::start(provider, store());
        settle(&gate, SessionState::is_approved).await;

        gate.logout().await;
        let state = settle(&gate, |s| *s == SessionState::LoggedOut).await;
        assert_eq!(state, SessionState::LoggedOut);
    }

    #[tokio::test]
    async fn failed_logout_keeps_state() {
        let provider = Arc::new(ManualProvider {
            fail_sign_out: true,
            ..Default::default()
        });
        *provider.current.lock().unwrap() = Some(Identity::new("ok"));
        let gate = SessionGate::start(provider, store());
        settle(&gate, SessionState::is_approved).await;

        gate.logout().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(gate.state().is_approved());
    }

    #[tokio::test]
    async fn drop_unsubscribes() {
        let provider = Arc::new(ManualProvider::default());
        let gate = SessionGate::start(provider.clone(), store());
        drop(gate);
        assert!(provider.unsubscribed.load(Ordering::SeqCst));
        assert!(provider.listener.lock().unwrap().is_none());
    }
}
