//! REST client for a GoTrue-style `/auth/v1` API.
//!
//! Endpoints used:
//!
//! | Operation | Request |
//! |---|---|
//! | password sign-in | `POST token?grant_type=password` |
//! | refresh | `POST token?grant_type=refresh_token` |
//! | sign-up | `POST signup?redirect_to=...` |
//! | password reset | `POST recover?redirect_to=...` |
//! | sign-out | `POST logout?scope=local\|global` |
//! | federated sign-in | `GET authorize?provider=...` (opened by the user agent) |
//!
//! The session lives client-side at the canonical storage key;
//! `get_current_session` answers from there without a network call.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use chrono::Utc;
use reqwest::{RequestBuilder, Response, StatusCode, header};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use sessionward_protocol::{
    AuthBackend, AuthEvent, BackendError, FederatedSignIn, Session, SignOutScope, SignUpOutcome,
    SignUpRequest, User,
};
use sessionward_store::{KeyValueStore, StoreAdapter};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{EVENT_CHANNEL_CAPACITY, SetupError, parse_redirect_callback};

fn summarize_response_body(body: &str) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("len={},digest={:016x}", body.len(), hasher.finish())
}

/// The error shapes GoTrue has used over time.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    error_code: Option<String>,
    error: Option<String>,
    msg: Option<String>,
    message: Option<String>,
    error_description: Option<String>,
}

impl ErrorBody {
    fn code(&self) -> Option<&str> {
        self.error_code.as_deref().or(self.error.as_deref())
    }

    fn message(self, status: StatusCode) -> String {
        self.msg
            .or(self.message)
            .or(self.error_description)
            .or(self.error)
            .unwrap_or_else(|| status.to_string())
    }
}

/// [`AuthBackend`] over HTTP.
pub struct HttpBackend<S> {
    client: reqwest::Client,
    base: Url,
    anon_key: String,
    store: StoreAdapter<S>,
    events: broadcast::Sender<AuthEvent>,
}

impl<S: KeyValueStore> HttpBackend<S> {
    /// Creates a client for the project at `api_url`
    /// (e.g. `https://xyz.supabase.co`).
    pub fn new(
        api_url: &str,
        anon_key: impl Into<String>,
        store: StoreAdapter<S>,
    ) -> Result<Self, SetupError> {
        let base = Url::parse(api_url).map_err(|source| SetupError::InvalidUrl {
            url: api_url.to_string(),
            source,
        })?;
        if base.cannot_be_a_base() {
            return Err(SetupError::NotABase(api_url.to_string()));
        }
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            client: reqwest::Client::new(),
            base,
            anon_key: anon_key.into(),
            store,
            events,
        })
    }

    /// Replaces the default HTTP client (timeouts, proxies, ...).
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn store(&self) -> &StoreAdapter<S> {
        &self.store
    }

    /// `{api_url}/auth/v1/{path}?{query}`.
    pub fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["auth", "v1", path]);
        }
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        url
    }

    /// The URL that starts a federated sign-in.
    pub fn authorize_url(&self, request: &FederatedSignIn) -> Url {
        let scopes = request.scope_param();
        let mut query = vec![
            ("provider", request.provider.as_str()),
            ("redirect_to", request.redirect_to.as_str()),
            ("scopes", scopes.as_str()),
        ];
        if let Some(prompt) = request.prompt.as_param() {
            query.push(("prompt", prompt));
        }
        query.extend(
            request
                .query_params
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str())),
        );
        self.endpoint("authorize", &query)
    }

    /// Finishes a redirect-based sign-in from the callback URL the provider
    /// sent the user agent to.
    ///
    /// Persists the session and emits `SIGNED_IN`, or `PASSWORD_RECOVERY`
    /// for recovery links.
    pub fn complete_redirect(&self, callback_url: &str) -> Result<Session, BackendError> {
        let callback = parse_redirect_callback(callback_url)?;
        let kind = callback.event_kind();
        let session = callback.into_session(Utc::now().timestamp());

        self.persist(&session);
        info!(event = %kind, "redirect sign-in completed");
        self.emit(AuthEvent::new(kind, Some(session.clone())));
        Ok(session)
    }

    // -- Internals ----------------------------------------------------------

    fn emit(&self, event: AuthEvent) {
        let _ = self.events.send(event);
    }

    fn stored_session(&self) -> Option<Session> {
        let text = self.store.canonical()?;
        match Session::from_record(&text) {
            Ok(session) => Some(session),
            Err(e) => {
                debug!(error = %e, "stored session does not parse");
                None
            }
        }
    }

    fn persist(&self, session: &Session) {
        match session.to_record() {
            Ok(text) => {
                self.store.write_canonical(&text);
            }
            Err(e) => error!(error = %e, "could not encode session"),
        }
    }

    /// Sends `request` with the project key; non-2xx becomes a
    /// [`BackendError`].
    async fn send(&self, request: RequestBuilder) -> Result<Response, BackendError> {
        let response = request
            .header("apikey", &self.anon_key)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(transport_error)?;

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(error_from_response(response).await)
        }
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &Value,
        bearer: Option<&str>,
    ) -> Result<T, BackendError> {
        let bearer = bearer.unwrap_or(&self.anon_key);
        let response = self
            .send(self.client.post(url).bearer_auth(bearer).json(body))
            .await?;
        response
            .json::<T>()
            .await
            .map_err(|e| BackendError::Malformed(e.to_string()))
    }

    async fn token_grant(&self, grant_type: &str, body: &Value) -> Result<Session, BackendError> {
        let url = self.endpoint("token", &[("grant_type", grant_type)]);
        let mut session: Session = self.post_json(url, body, None).await?;
        if session.expires_at.is_none() {
            session.expires_at = session
                .expires_in
                .map(|secs| Utc::now().timestamp() + secs);
        }
        if !session.has_tokens() {
            return Err(BackendError::Malformed("token response without tokens".into()));
        }
        Ok(session)
    }
}

fn transport_error(e: reqwest::Error) -> BackendError {
    if e.is_decode() {
        BackendError::Malformed(e.to_string())
    } else {
        BackendError::Unavailable(e.to_string())
    }
}

async fn error_from_response(response: Response) -> BackendError {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());

    let text = response.text().await.unwrap_or_default();
    let body: ErrorBody = serde_json::from_str(&text).unwrap_or_default();
    let code = body.code().map(str::to_string);

    warn!(
        status = %status,
        code = code.as_deref().unwrap_or("-"),
        body_summary = %summarize_response_body(&text),
        "auth backend returned an error"
    );

    match BackendError::classify(status.as_u16(), code.as_deref(), body.message(status)) {
        BackendError::RateLimited { .. } => BackendError::RateLimited {
            retry_after_secs: retry_after,
        },
        other => other,
    }
}

impl<S: KeyValueStore> AuthBackend for HttpBackend<S> {
    async fn get_current_session(&self) -> Result<Option<Session>, BackendError> {
        Ok(self.stored_session())
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError> {
        let session = self
            .token_grant("password", &json!({ "email": email, "password": password }))
            .await?;
        self.persist(&session);
        info!("signed in with password");
        self.emit(AuthEvent::signed_in(session.clone()));
        Ok(session)
    }

    async fn sign_in_with_provider(&self, request: &FederatedSignIn) -> Result<String, BackendError> {
        let url = self.authorize_url(request);
        debug!(provider = %request.provider, "built authorize url");
        Ok(url.into())
    }

    async fn sign_up(&self, request: &SignUpRequest) -> Result<SignUpOutcome, BackendError> {
        let redirect = request.email_redirect_to.as_deref();
        let query: Vec<(&str, &str)> = redirect.map(|r| ("redirect_to", r)).into_iter().collect();
        let url = self.endpoint("signup", &query);
        let body = json!({
            "email": request.email,
            "password": request.password,
            "data": request.data,
        });

        let response: Value = self.post_json(url, &body, None).await?;

        // With auto-confirm the backend answers with a full session; we
        // keep only the user so sign-up never signs the caller in.
        let user_value = response.get("user").unwrap_or(&response);
        let user = serde_json::from_value::<User>(user_value.clone()).ok();
        let confirmation_sent = user_value
            .get("confirmation_sent_at")
            .is_some_and(|v| !v.is_null());

        Ok(SignUpOutcome {
            user,
            confirmation_sent,
        })
    }

    async fn request_password_reset(
        &self,
        email: &str,
        redirect_to: &str,
    ) -> Result<(), BackendError> {
        let url = self.endpoint("recover", &[("redirect_to", redirect_to)]);
        let _: Value = self.post_json(url, &json!({ "email": email }), None).await?;
        Ok(())
    }

    async fn refresh_session(&self) -> Result<Option<Session>, BackendError> {
        let Some(current) = self.stored_session() else {
            return Ok(None);
        };
        if current.refresh_token.is_empty() {
            return Ok(None);
        }

        match self
            .token_grant(
                "refresh_token",
                &json!({ "refresh_token": current.refresh_token }),
            )
            .await
        {
            Ok(session) => {
                self.persist(&session);
                self.emit(AuthEvent::token_refreshed(session.clone()));
                Ok(Some(session))
            }
            Err(e @ BackendError::InvalidCredentials(_)) => {
                warn!(error = %e, "refresh token rejected, clearing session");
                let keys = self.store.keys();
                self.store.remove(&keys.canonical);
                self.store.remove(&keys.legacy);
                self.emit(AuthEvent::signed_out());
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    async fn sign_out(&self, access_token: &str, scope: SignOutScope) -> Result<(), BackendError> {
        let url = self.endpoint("logout", &[("scope", scope.as_str())]);
        let request = self.client.post(url).bearer_auth(access_token);

        match self.send(request).await {
            Ok(_) => Ok(()),
            // The session is already gone on the server.
            Err(BackendError::InvalidCredentials(_)) | Err(BackendError::Rejected { status: 404, .. }) => {
                debug!(%scope, "session already invalid on server");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sessionward_protocol::{AuthEventKind, FederatedProvider, PromptMode, encode_unsigned};
    use sessionward_store::{MemoryStore, StorageKeys};

    fn backend() -> HttpBackend<MemoryStore> {
        HttpBackend::new(
            "https://project.example.co",
            "anon",
            StoreAdapter::new(MemoryStore::new(), StorageKeys::default()),
        )
        .unwrap()
    }

    #[test]
    fn test_new_rejects_invalid_url() {
        let store = StoreAdapter::new(MemoryStore::new(), StorageKeys::default());
        assert!(matches!(
            HttpBackend::new("not a url", "anon", store),
            Err(SetupError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_endpoint_appends_auth_path_and_query() {
        let b = backend();
        let url = b.endpoint("token", &[("grant_type", "password")]);
        assert_eq!(
            url.as_str(),
            "https://project.example.co/auth/v1/token?grant_type=password"
        );
        assert_eq!(
            b.endpoint("signup", &[]).as_str(),
            "https://project.example.co/auth/v1/signup"
        );
    }

    #[test]
    fn test_authorize_url_carries_scopes_prompt_and_params() {
        let b = backend();
        let url = b.authorize_url(&FederatedSignIn {
            provider: FederatedProvider::Google,
            redirect_to: "https://app.example/auth/callback".into(),
            scopes: vec!["openid".into(), "email".into()],
            prompt: PromptMode::Consent,
            query_params: vec![("access_type".into(), "offline".into())],
        });

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("provider".into(), "google".into())));
        assert!(pairs.contains(&("scopes".into(), "openid email".into())));
        assert!(pairs.contains(&("prompt".into(), "consent".into())));
        assert!(pairs.contains(&("access_type".into(), "offline".into())));
        assert_eq!(url.path(), "/auth/v1/authorize");
    }

    #[test]
    fn test_complete_redirect_persists_and_emits() {
        let b = backend();
        let mut events = b.subscribe();
        let access = encode_unsigned(&json!({ "sub": "u1", "exp": 4_000_000_000i64 }));

        let session = b
            .complete_redirect(&format!(
                "https://app.example/auth/callback#access_token={access}&refresh_token=r1&type=recovery"
            ))
            .unwrap();

        assert_eq!(session.refresh_token, "r1");
        assert_eq!(session.user.as_ref().map(|u| u.id.as_str()), Some("u1"));
        assert!(b.store().canonical().is_some());
        let event = events.try_recv().unwrap();
        assert_eq!(event.kind, AuthEventKind::PasswordRecovery);
    }

    #[test]
    fn test_complete_redirect_provider_error_writes_nothing() {
        let b = backend();
        let err = b
            .complete_redirect("https://app.example/cb#error=access_denied")
            .unwrap_err();
        assert!(matches!(err, BackendError::Rejected { status: 400, .. }));
        assert_eq!(b.store().canonical(), None);
    }

    #[test]
    fn test_error_body_message_prefers_msg() {
        let body: ErrorBody =
            serde_json::from_str(r#"{"error_code":"invalid_credentials","msg":"Invalid login credentials"}"#)
                .unwrap();
        assert_eq!(body.code(), Some("invalid_credentials"));
        assert_eq!(body.message(StatusCode::BAD_REQUEST), "Invalid login credentials");
    }

    #[test]
    fn test_summarize_response_body_hides_content() {
        let summary = summarize_response_body("secret-token");
        assert!(summary.starts_with("len=12,digest="));
        assert!(!summary.contains("secret"));
    }

    #[tokio::test]
    async fn test_get_current_session_reads_storage() {
        let b = backend();
        assert_eq!(b.get_current_session().await.unwrap(), None);

        b.store().write_canonical(r#"{"access_token":"a","refresh_token":"r"}"#);
        let session = b.get_current_session().await.unwrap().unwrap();
        assert_eq!(session.refresh_token, "r");
    }
}
