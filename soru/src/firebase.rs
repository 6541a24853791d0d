//! REST adapters for Firebase Authentication and Cloud Firestore.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::auth::{
    Accounts, ApprovalRecord, ApprovalStore, AuthError, Identity, IdentityListener,
    IdentityProvider, SignupProfile, Subscription,
};
use crate::config::{SavedSession, SessionFile};

const IDENTITY_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const TOKEN_URL: &str = "https://securetoken.googleapis.com/v1/token";
const FIRESTORE_URL: &str = "https://firestore.googleapis.com/v1";

type SharedListener = Arc<dyn Fn(Option<Identity>) + Send + Sync>;
type Listeners = Arc<Mutex<Vec<(u64, SharedListener)>>>;

#[derive(Clone)]
struct SignedIn {
    identity: Identity,
    refresh_token: String,
}

/// Email/password accounts via the Identity Toolkit REST API.
pub struct FirebaseAuth {
    client: reqwest::Client,
    api_key: String,
    identity_url: String,
    token_url: String,
    current: Mutex<Option<SignedIn>>,
    listeners: Listeners,
    next_listener: AtomicU64,
    session_file: Option<SessionFile>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    local_id: String,
    email: Option<String>,
    id_token: String,
    refresh_token: String,
}

#[derive(Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    user_id: String,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

impl FirebaseAuth {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            identity_url: IDENTITY_URL.to_string(),
            token_url: TOKEN_URL.to_string(),
            current: Mutex::new(None),
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_listener: AtomicU64::new(0),
            session_file: None,
        }
    }

    /// Persist the refresh token here on every sign-in.
    pub fn with_session_file(mut self, file: SessionFile) -> Self {
        self.session_file = Some(file);
        self
    }

    /// Point at the Auth emulator or another compatible host.
    pub fn with_endpoints(mut self, identity_url: &str, token_url: &str) -> Self {
        self.identity_url = identity_url.trim_end_matches('/').to_string();
        self.token_url = token_url.to_string();
        self
    }

    pub fn current_user(&self) -> Option<Identity> {
        self.lock_current().as_ref().map(|s| s.identity.clone())
    }

    /// Resume the session saved by a previous run. A rejected refresh token
    /// is discarded and the user stays signed out.
    pub async fn restore(&self) -> Result<Option<Identity>, AuthError> {
        let Some(saved) = self.session_file.as_ref().and_then(SessionFile::load) else {
            return Ok(None);
        };
        let resp = self
            .client
            .post(format!("{}?key={}", self.token_url, self.api_key))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", saved.refresh_token.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let err = service_error(&body);
            tracing::warn!(status = status.as_u16(), error = %err, "saved session rejected");
            if let Some(file) = &self.session_file {
                file.clear()?;
            }
            return Err(err);
        }

        let tokens: RefreshResponse = resp.json().await?;
        let identity = Identity {
            uid: tokens.user_id,
            email: saved.email,
            id_token: Some(tokens.id_token),
        };
        self.set_user(Some(SignedIn {
            identity: identity.clone(),
            refresh_token: tokens.refresh_token,
        }))?;
        tracing::info!(uid = %identity.uid, "session restored");
        Ok(Some(identity))
    }

    async fn account_request(
        &self,
        endpoint: &str,
        email: &str,
        password: &str,
    ) -> Result<Identity, AuthError> {
        let resp = self
            .client
            .post(format!(
                "{}/accounts:{endpoint}?key={}",
                self.identity_url, self.api_key
            ))
            .json(&json!({
                "email": email,
                "password": password,
                "returnSecureToken": true,
            }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(service_error(&body));
        }

        let account: AccountResponse = resp.json().await?;
        let identity = Identity {
            uid: account.local_id,
            email: account.email.or_else(|| Some(email.to_string())),
            id_token: Some(account.id_token),
        };
        self.set_user(Some(SignedIn {
            identity: identity.clone(),
            refresh_token: account.refresh_token,
        }))?;
        Ok(identity)
    }

    fn lock_current(&self) -> std::sync::MutexGuard<'_, Option<SignedIn>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Swap the signed-in user, persist it and notify every listener.
    fn set_user(&self, user: Option<SignedIn>) -> Result<(), AuthError> {
        let persisted = match (&self.session_file, &user) {
            (Some(file), Some(signed_in)) => file.save(&SavedSession {
                uid: signed_in.identity.uid.clone(),
                email: signed_in.identity.email.clone(),
                refresh_token: signed_in.refresh_token.clone(),
            }),
            (Some(file), None) => file.clear(),
            (None, _) => Ok(()),
        };
        let identity = user.as_ref().map(|s| s.identity.clone());
        *self.lock_current() = user;
        self.notify(identity);
        persisted.map_err(AuthError::from)
    }

    fn notify(&self, identity: Option<Identity>) {
        let listeners: Vec<SharedListener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(identity.clone());
        }
    }
}

#[async_trait]
impl IdentityProvider for FirebaseAuth {
    fn subscribe(&self, listener: IdentityListener) -> Subscription {
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        let listener: SharedListener = Arc::from(listener);
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener.clone()));
        listener(self.current_user());

        let registry = Arc::downgrade(&self.listeners);
        Subscription::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .retain(|(other, _)| *other != id);
            }
        })
    }

    /// Local sign-out: forget the tokens and the saved session.
    async fn sign_out(&self) -> Result<(), AuthError> {
        self.set_user(None)
    }
}

#[async_trait]
impl Accounts for FirebaseAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        self.account_request("signInWithPassword", email, password)
            .await
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        self.account_request("signUp", email, password).await
    }
}

/// Map an Identity Toolkit error body to the `auth/*` codes the UI knows.
fn service_error(body: &str) -> AuthError {
    let message = serde_json::from_str::<ErrorWrapper>(body)
        .ok()
        .and_then(|w| w.error.message)
        .unwrap_or_default();
    // Messages look like "WEAK_PASSWORD : Password should be at least 6 characters".
    let key = message.split(':').next().unwrap_or_default().trim();
    AuthError::service(auth_code(key))
}

fn auth_code(key: &str) -> String {
    let code = match key {
        "EMAIL_EXISTS" => "auth/email-already-in-use",
        "EMAIL_NOT_FOUND" => "auth/user-not-found",
        "INVALID_PASSWORD" => "auth/wrong-password",
        "INVALID_LOGIN_CREDENTIALS" => "auth/invalid-login-credentials",
        "INVALID_EMAIL" => "auth/invalid-email",
        "WEAK_PASSWORD" => "auth/weak-password",
        "USER_DISABLED" => "auth/user-disabled",
        "TOO_MANY_ATTEMPTS_TRY_LATER" => "auth/too-many-requests",
        "TOKEN_EXPIRED" => "auth/user-token-expired",
        "INVALID_REFRESH_TOKEN" => "auth/invalid-refresh-token",
        "" => "auth/internal-error",
        other => return format!("auth/{}", other.to_ascii_lowercase().replace('_', "-")),
    };
    code.to_string()
}

/// Approval records in the `users` collection.
pub struct FirestoreApprovals {
    client: reqwest::Client,
    base_url: String,
    project_id: String,
}

#[derive(Deserialize)]
struct Document {
    #[serde(default)]
    fields: HashMap<String, serde_json::Value>,
}

impl FirestoreApprovals {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: FIRESTORE_URL.to_string(),
            project_id: project_id.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn document_url(&self, uid: &str) -> String {
        format!(
            "{}/projects/{}/databases/(default)/documents/users/{uid}",
            self.base_url, self.project_id
        )
    }

    fn request(&self, method: reqwest::Method, identity: &Identity) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, self.document_url(&identity.uid));
        match &identity.id_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

#[async_trait]
impl ApprovalStore for FirestoreApprovals {
    async fn approval(&self, identity: &Identity) -> Result<Option<ApprovalRecord>, AuthError> {
        let resp = self.request(reqwest::Method::GET, identity).send().await?;
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(firestore_error(&body, status.as_u16()));
        }
        let document: Document = resp.json().await?;
        Ok(Some(approval_from_fields(&document.fields)))
    }

    async fn create_profile(
        &self,
        identity: &Identity,
        profile: &SignupProfile,
    ) -> Result<(), AuthError> {
        let resp = self
            .request(reqwest::Method::PATCH, identity)
            .json(&profile_document(profile, chrono::Utc::now()))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(firestore_error(&body, status.as_u16()));
        }
        Ok(())
    }
}

/// Only a real boolean `true` counts; strings or other types do not.
fn approval_from_fields(fields: &HashMap<String, serde_json::Value>) -> ApprovalRecord {
    ApprovalRecord {
        is_approved: fields
            .get("isApproved")
            .and_then(|v| v.get("booleanValue"))
            .and_then(serde_json::Value::as_bool),
    }
}

fn profile_document(
    profile: &SignupProfile,
    created_at: chrono::DateTime<chrono::Utc>,
) -> serde_json::Value {
    json!({
        "fields": {
            "fullName": { "stringValue": profile.full_name },
            "grade": { "stringValue": profile.grade },
            "email": { "stringValue": profile.email },
            "createdAt": { "timestampValue": created_at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true) },
            "isApproved": { "booleanValue": false },
        }
    })
}

fn firestore_error(body: &str, status: u16) -> AuthError {
    let tag = serde_json::from_str::<ErrorWrapper>(body)
        .ok()
        .and_then(|w| w.error.status)
        .map(|s| s.to_ascii_lowercase().replace('_', "-"))
        .unwrap_or_else(|| status.to_string());
    AuthError::service(format!("firestore/{tag}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn signed_in(uid: &str) -> SignedIn {
        SignedIn {
            identity: Identity::new(uid).with_email("a@b.c"),
            refresh_token: format!("refresh-{uid}"),
        }
    }

    #[test]
    fn error_messages_map_to_auth_codes() {
        let body = |m: &str| format!(r#"{{"error":{{"code":400,"message":"{m}"}}}}"#);
        let code = |m: &str| service_error(&body(m)).code().map(str::to_string);

        assert_eq!(code("EMAIL_EXISTS").as_deref(), Some("auth/email-already-in-use"));
        assert_eq!(
            code("WEAK_PASSWORD : Password should be at least 6 characters").as_deref(),
            Some("auth/weak-password")
        );
        assert_eq!(
            code("INVALID_LOGIN_CREDENTIALS").as_deref(),
            Some("auth/invalid-login-credentials")
        );
        assert_eq!(code("OPERATION_NOT_ALLOWED").as_deref(), Some("auth/operation-not-allowed"));
        assert_eq!(
            service_error("<html>").code(),
            Some("auth/internal-error")
        );
    }

    #[test]
    fn approval_reads_boolean_field_only() {
        let doc: Document = serde_json::from_value(json!({
            "name": "projects/p/databases/(default)/documents/users/u1",
            "fields": { "isApproved": { "booleanValue": true }, "grade": { "stringValue": "11-A" } }
        }))
        .unwrap();
        assert_eq!(approval_from_fields(&doc.fields).is_approved, Some(true));

        let doc: Document = serde_json::from_value(json!({
            "fields": { "isApproved": { "stringValue": "true" } }
        }))
        .unwrap();
        assert_eq!(approval_from_fields(&doc.fields).is_approved, None);

        let doc: Document = serde_json::from_value(json!({ "name": "x" })).unwrap();
        assert_eq!(approval_from_fields(&doc.fields), ApprovalRecord::default());
    }

    #[test]
    fn profile_document_is_unapproved() {
        let profile = SignupProfile {
            full_name: "Ada Yılmaz".into(),
            grade: "11-A".into(),
            email: "ada@okul.k12.tr".into(),
        };
        let at = chrono::Utc.with_ymd_and_hms(2025, 9, 1, 8, 30, 0).unwrap();
        let doc = profile_document(&profile, at);
        assert_eq!(doc["fields"]["fullName"]["stringValue"], "Ada Yılmaz");
        assert_eq!(doc["fields"]["isApproved"]["booleanValue"], false);
        assert_eq!(
            doc["fields"]["createdAt"]["timestampValue"],
            "2025-09-01T08:30:00.000Z"
        );
    }

    #[test]
    fn document_url_targets_users_collection() {
        let store = FirestoreApprovals::new("okul-proje");
        assert_eq!(
            store.document_url("u1"),
            "https://firestore.googleapis.com/v1/projects/okul-proje/databases/(default)/documents/users/u1"
        );
    }

    #[test]
    fn firestore_errors_carry_status() {
        let err = firestore_error(
            r#"{"error":{"code":403,"message":"denied","status":"PERMISSION_DENIED"}}"#,
            403,
        );
        assert_eq!(err.code(), Some("firestore/permission-denied"));
        assert_eq!(firestore_error("", 502).code(), Some("firestore/502"));
    }

    #[tokio::test]
    async fn subscribe_emits_current_user_and_changes() {
        let auth = FirebaseAuth::new("key");
        let seen: Arc<Mutex<Vec<Option<String>>>> = Arc::default();
        let sink = seen.clone();
        let sub = auth.subscribe(Box::new(move |id| {
            sink.lock().unwrap().push(id.map(|i| i.uid));
        }));

        auth.set_user(Some(signed_in("u1"))).unwrap();
        auth.sign_out().await.unwrap();
        sub.unsubscribe();
        auth.set_user(Some(signed_in("u2"))).unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![None, Some("u1".to_string()), None]
        );
    }

    #[tokio::test]
    async fn sign_in_state_is_persisted_and_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let file = SessionFile::new(dir.path().join("session.json"));
        let auth = FirebaseAuth::new("key").with_session_file(file.clone());

        auth.set_user(Some(signed_in("u1"))).unwrap();
        let saved = file.load().unwrap();
        assert_eq!(saved.uid, "u1");
        assert_eq!(saved.refresh_token, "refresh-u1");

        auth.sign_out().await.unwrap();
        assert!(file.load().is_none());
        assert!(auth.current_user().is_none());
    }

    #[tokio::test]
    async fn restore_without_saved_session_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let auth = FirebaseAuth::new("key")
            .with_session_file(SessionFile::new(dir.path().join("missing.json")));
        assert!(auth.restore().await.unwrap().is_none());
    }
}
