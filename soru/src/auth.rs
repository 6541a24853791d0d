//! Identity, approval lookup and account forms.
//!
//! The external identity service and document store sit behind
//! [`IdentityProvider`] and [`ApprovalStore`]; the session gate in
//! [`crate::gate`] combines them into a [`SessionState`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const NETWORK_FAILED: &str = "auth/network-request-failed";

/// A signed-in user. Opaque to the solver apart from display.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Bearer token for the document store, when the provider issues one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

impl Identity {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
            id_token: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn display_name(&self) -> &str {
        self.email.as_deref().unwrap_or(&self.uid)
    }
}

/// Where the user stands with respect to the app. Exactly one at a time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    Loading,
    Approved(Identity),
    Unapproved(Identity),
    LoggedOut,
}

impl SessionState {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            SessionState::Approved(id) | SessionState::Unapproved(id) => Some(id),
            SessionState::Loading | SessionState::LoggedOut => None,
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, SessionState::Approved(_))
    }
}

/// The per-user record the approval gate reads. `is_approved` is `None` when
/// the field is absent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ApprovalRecord {
    pub is_approved: Option<bool>,
}

/// Profile written at sign-up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignupProfile {
    pub full_name: String,
    pub grade: String,
    pub email: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// Rejected by the service, with an `auth/*` style code.
    #[error("{code}")]
    Service { code: String },
    #[error("{0}")]
    Validation(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AuthError {
    pub fn service(code: impl Into<String>) -> Self {
        AuthError::Service { code: code.into() }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            AuthError::Service { code } => Some(code.as_str()),
            AuthError::Http(_) => Some(NETWORK_FAILED),
            _ => None,
        }
    }

    /// Message to show on the sign-in/sign-up page.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::Validation(msg) => msg.clone(),
            other => friendly_message(other.code()),
        }
    }
}

/// Translate a failure code into a fixed Turkish message. Unknown codes fall
/// back to a generic message that still names the code.
pub fn friendly_message(code: Option<&str>) -> String {
    let Some(code) = code else {
        return "Beklenmedik bir hata oluştu. Lütfen internet bağlantınızı kontrol edin veya daha sonra tekrar deneyin.".to_string();
    };
    match code {
        "auth/invalid-email" => "Lütfen geçerli bir e-posta adresi girin.".to_string(),
        "auth/user-not-found" | "auth/wrong-password" | "auth/invalid-login-credentials" => {
            "E-posta veya şifre hatalı. Lütfen bilgilerinizi kontrol edip tekrar deneyin."
                .to_string()
        }
        "auth/email-already-in-use" => {
            "Bu e-posta adresi zaten başka bir hesap tarafından kullanılıyor.".to_string()
        }
        "auth/weak-password" => "Şifreniz en az 6 karakter uzunluğunda olmalıdır.".to_string(),
        NETWORK_FAILED => "Ağ hatası. Lütfen internet bağlantınızı kontrol edin.".to_string(),
        other => {
            tracing::warn!(code = other, "unmapped auth error");
            format!("Bir hata oluştu. Lütfen tekrar deneyin. (Kod: {other})")
        }
    }
}

pub type IdentityListener = Box<dyn Fn(Option<Identity>) + Send + Sync>;

/// Handle for an identity subscription. Dropping it unsubscribes.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A subscription with nothing to release.
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

/// Source of "who is signed in" notifications.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Register a listener. Implementations may call it synchronously from
    /// inside `subscribe` with the current user, and again on every change.
    fn subscribe(&self, listener: IdentityListener) -> Subscription;

    async fn sign_out(&self) -> Result<(), AuthError>;
}

/// Per-user approval records.
#[async_trait]
pub trait ApprovalStore: Send + Sync {
    /// `Ok(None)` when the user has no record.
    async fn approval(&self, identity: &Identity) -> Result<Option<ApprovalRecord>, AuthError>;

    async fn create_profile(
        &self,
        identity: &Identity,
        profile: &SignupProfile,
    ) -> Result<(), AuthError>;
}

/// Account creation and password sign-in against the identity service.
#[async_trait]
pub trait Accounts: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError>;
    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError>;
}

#[async_trait]
impl<T: Accounts + ?Sized> Accounts for Arc<T> {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        (**self).sign_in(email, password).await
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        (**self).sign_up(email, password).await
    }
}

#[async_trait]
impl<T: ApprovalStore + ?Sized> ApprovalStore for Arc<T> {
    async fn approval(&self, identity: &Identity) -> Result<Option<ApprovalRecord>, AuthError> {
        (**self).approval(identity).await
    }

    async fn create_profile(
        &self,
        identity: &Identity,
        profile: &SignupProfile,
    ) -> Result<(), AuthError> {
        (**self).create_profile(identity, profile).await
    }
}

/// Map a notification plus its approval lookup to a session state. Anything
/// short of an explicit `true` is treated as unapproved.
pub fn resolve_session(
    identity: Option<Identity>,
    lookup: Result<Option<ApprovalRecord>, AuthError>,
) -> SessionState {
    let Some(identity) = identity else {
        return SessionState::LoggedOut;
    };
    match lookup {
        Ok(Some(ApprovalRecord {
            is_approved: Some(true),
        })) => SessionState::Approved(identity),
        Ok(_) => SessionState::Unapproved(identity),
        Err(e) => {
            tracing::warn!(uid = %identity.uid, error = %e, "approval lookup failed");
            SessionState::Unapproved(identity)
        }
    }
}

// ── Forms ───────────────────────────────────────────────────────────

const FILL_ALL_FIELDS: &str = "Lütfen tüm alanları doldurun.";
pub const PASSWORD_MISMATCH: &str = "Girilen şifreler uyuşmuyor.";
pub const PASSWORD_HELP: &str = "Yeni bir şifre almak veya mevcut şifrenizle ilgili destek için lütfen Berkant Hoca ile doğrudan iletişime geçiniz.";

#[derive(Clone, Debug, Default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.email.trim().is_empty() || self.password.is_empty() {
            return Err(AuthError::Validation(FILL_ALL_FIELDS.into()));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct SignupForm {
    pub full_name: String,
    pub grade: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl SignupForm {
    /// Password confirmation is checked before anything else.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.password != self.confirm_password {
            return Err(AuthError::Validation(PASSWORD_MISMATCH.into()));
        }
        let required = [&self.full_name, &self.grade, &self.email];
        if required.iter().any(|f| f.trim().is_empty()) || self.password.is_empty() {
            return Err(AuthError::Validation(FILL_ALL_FIELDS.into()));
        }
        Ok(())
    }

    pub fn profile(&self) -> SignupProfile {
        SignupProfile {
            full_name: self.full_name.trim().to_string(),
            grade: self.grade.trim().to_string(),
            email: self.email.trim().to_string(),
        }
    }
}

/// Sign-in and sign-up flows. State changes reach the UI through the
/// identity subscription, not through these return values.
pub struct AccountService<A, S> {
    accounts: A,
    store: S,
}

impl<A: Accounts, S: ApprovalStore> AccountService<A, S> {
    pub fn new(accounts: A, store: S) -> Self {
        Self { accounts, store }
    }

    pub async fn sign_in(&self, form: &LoginForm) -> Result<Identity, AuthError> {
        form.validate()?;
        self.accounts
            .sign_in(form.email.trim(), &form.password)
            .await
    }

    /// Create the account, then its unapproved profile record.
    pub async fn sign_up(&self, form: &SignupForm) -> Result<Identity, AuthError> {
        form.validate()?;
        let profile = form.profile();
        let identity = self.accounts.sign_up(&profile.email, &form.password).await?;
        self.store.create_profile(&identity, &profile).await?;
        tracing::info!(uid = %identity.uid, "account created");
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn student() -> Identity {
        Identity::new("u1").with_email("ogrenci@okul.k12.tr")
    }

    #[test]
    fn only_explicit_true_is_approved() {
        let approved = resolve_session(
            Some(student()),
            Ok(Some(ApprovalRecord {
                is_approved: Some(true),
            })),
        );
        assert_eq!(approved, SessionState::Approved(student()));

        for lookup in [
            Ok(None),
            Ok(Some(ApprovalRecord::default())),
            Ok(Some(ApprovalRecord {
                is_approved: Some(false),
            })),
            Err(AuthError::service("permission-denied")),
        ] {
            assert_eq!(
                resolve_session(Some(student()), lookup),
                SessionState::Unapproved(student())
            );
        }
    }

    #[test]
    fn no_identity_is_logged_out() {
        assert_eq!(resolve_session(None, Ok(None)), SessionState::LoggedOut);
    }

    #[test]
    fn friendly_messages() {
        assert_eq!(
            friendly_message(Some("auth/wrong-password")),
            friendly_message(Some("auth/invalid-login-credentials"))
        );
        assert_eq!(
            friendly_message(Some("auth/weak-password")),
            "Şifreniz en az 6 karakter uzunluğunda olmalıdır."
        );
        assert_eq!(
            friendly_message(Some("auth/too-many-requests")),
            "Bir hata oluştu. Lütfen tekrar deneyin. (Kod: auth/too-many-requests)"
        );
        assert!(friendly_message(None).starts_with("Beklenmedik bir hata oluştu."));
    }

    #[test]
    fn signup_checks_password_match_first() {
        let form = SignupForm {
            password: "abcdef".into(),
            confirm_password: "abcdeg".into(),
            ..Default::default()
        };
        assert_eq!(form.validate().unwrap_err().user_message(), PASSWORD_MISMATCH);
    }

    #[test]
    fn signup_requires_every_field() {
        let form = SignupForm {
            full_name: "Ada".into(),
            grade: " ".into(),
            email: "a@b.c".into(),
            password: "abcdef".into(),
            confirm_password: "abcdef".into(),
        };
        assert_eq!(form.validate().unwrap_err().user_message(), FILL_ALL_FIELDS);
    }

    #[test]
    fn login_requires_both_fields() {
        assert!(LoginForm::default().validate().is_err());
        let form = LoginForm {
            email: "a@b.c".into(),
            password: "x".into(),
        };
        assert!(form.validate().is_ok());
    }

    #[test]
    fn subscription_cancels_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let sub = Subscription::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        sub.unsubscribe();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        let c = count.clone();
        drop(Subscription::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    struct FakeAccounts {
        fail_with: Option<&'static str>,
    }

    #[async_trait]
    impl Accounts for FakeAccounts {
        async fn sign_in(&self, email: &str, _password: &str) -> Result<Identity, AuthError> {
            Ok(Identity::new("u1").with_email(email))
        }

        async fn sign_up(&self, email: &str, _password: &str) -> Result<Identity, AuthError> {
            match self.fail_with {
                Some(code) => Err(AuthError::service(code)),
                None => Ok(Identity::new("new").with_email(email)),
            }
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        profiles: Mutex<Vec<(String, SignupProfile)>>,
    }

    #[async_trait]
    impl ApprovalStore for RecordingStore {
        async fn approval(&self, _identity: &Identity) -> Result<Option<ApprovalRecord>, AuthError> {
            Ok(None)
        }

        async fn create_profile(
            &self,
            identity: &Identity,
            profile: &SignupProfile,
        ) -> Result<(), AuthError> {
            self.profiles
                .lock()
                .unwrap()
                .push((identity.uid.clone(), profile.clone()));
            Ok(())
        }
    }

    fn signup_form() -> SignupForm {
        SignupForm {
            full_name: " Ada Yılmaz ".into(),
            grade: "11-A".into(),
            email: "ada@okul.k12.tr".into(),
            password: "gizli123".into(),
            confirm_password: "gizli123".into(),
        }
    }

    #[tokio::test]
    async fn sign_up_writes_profile() {
        let service = AccountService::new(FakeAccounts { fail_with: None }, RecordingStore::default());
        let identity = service.sign_up(&signup_form()).await.unwrap();
        assert_eq!(identity.uid, "new");

        let profiles = service.store.profiles.lock().unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].0, "new");
        assert_eq!(profiles[0].1.full_name, "Ada Yılmaz");
    }

    #[tokio::test]
    async fn failed_sign_up_writes_nothing() {
        let service = AccountService::new(
            FakeAccounts {
                fail_with: Some("auth/email-already-in-use"),
            },
            RecordingStore::default(),
        );
        let err = service.sign_up(&signup_form()).await.unwrap_err();
        assert_eq!(
            err.user_message(),
            "Bu e-posta adresi zaten başka bir hesap tarafından kullanılıyor."
        );
        assert!(service.store.profiles.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_form_never_reaches_service() {
        let service = AccountService::new(
            FakeAccounts {
                fail_with: Some("should-not-be-called"),
            },
            RecordingStore::default(),
        );
        let mut form = signup_form();
        form.confirm_password = "baska".into();
        let err = service.sign_up(&form).await.unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
    }
}
