// Session/auth store
// One store per application run, created explicitly and shared by Arc with whatever needs the user.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::api::ApiService;
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::models::{ApiResponse, LoginRequest, RegisterRequest, User};
use crate::sequencer::{Generation, RequestSequencer};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub current_user: Option<User>,
    // True while any login or registration call is in flight
    pub pending: bool,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum AuthAction {
    Login,
    Register,
}

impl AuthAction {
    fn fallback_error(self) -> &'static str {
        match self {
            AuthAction::Login => "Login failed",
            AuthAction::Register => "Registration failed",
        }
    }
}

// Counts one auth call in flight however it ends, including when its future is dropped.
// The count only changes under the state write lock, so `pending` always matches it.
struct PendingGuard<'a> {
    state: &'a RwLock<SessionState>,
    in_flight: &'a AtomicUsize,
}

impl<'a> PendingGuard<'a> {
    fn start(state: &'a RwLock<SessionState>, in_flight: &'a AtomicUsize) -> Self {
        {
            let mut state = state.write();
            in_flight.fetch_add(1, Ordering::SeqCst);
            state.pending = true;
            state.last_error = None;
        }
        Self { state, in_flight }
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.write();
        let remaining = self.in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
        state.pending = remaining > 0;
    }
}

// Keeps the signed-in user in a JSON file so a restart doesn't start from nothing
#[derive(Debug, Clone)]
pub struct SessionPersistence {
    path: PathBuf,
}

impl SessionPersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Option<User> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "cannot read session file");
                return None;
            }
        };

        match serde_json::from_slice(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring corrupt session file");
                None
            }
        }
    }

    pub fn save(&self, user: &User) {
        let result = serde_json::to_vec_pretty(user)
            .map_err(|e| e.to_string())
            .and_then(|raw| fs::write(&self.path, raw).map_err(|e| e.to_string()));
        if let Err(e) = result {
            warn!(path = %self.path.display(), error = %e, "cannot write session file");
        }
    }

    pub fn clear(&self) {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "cannot remove session file"),
        }
    }
}

pub struct SessionStore {
    api: Arc<ApiService>,
    state: RwLock<SessionState>,
    persistence: Option<SessionPersistence>,
    // Only the most recently started auth call may change the user
    sequencer: RequestSequencer,
    in_flight: AtomicUsize,
}

impl SessionStore {
    // A fresh session with no user
    pub fn new(api: Arc<ApiService>) -> Self {
        Self {
            api,
            state: RwLock::new(SessionState::default()),
            persistence: None,
            sequencer: RequestSequencer::new(),
            in_flight: AtomicUsize::new(0),
        }
    }

    // Restores the user saved by a previous run, if any
    pub fn with_persistence(api: Arc<ApiService>, persistence: SessionPersistence) -> Self {
        let current_user = persistence.load();
        if let Some(user) = &current_user {
            info!(user_id = user.id, username = %user.username, "restored session");
        }
        Self {
            api,
            state: RwLock::new(SessionState {
                current_user,
                ..Default::default()
            }),
            persistence: Some(persistence),
            sequencer: RequestSequencer::new(),
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn from_config(api: Arc<ApiService>, config: &ClientConfig) -> Self {
        match &config.session_file {
            Some(path) => Self::with_persistence(api, SessionPersistence::new(path)),
            None => Self::new(api),
        }
    }

    pub fn current_user(&self) -> Option<User> {
        self.state.read().current_user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.read().current_user.is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.state.read().pending
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.read().last_error.clone()
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.read().clone()
    }

    // Returns true when the service accepted the credentials and the user is now signed in.
    // A call overtaken by a later login, registration or logout returns false and changes nothing.
    pub async fn login(&self, credentials: &LoginRequest) -> bool {
        let generation = self.sequencer.begin();
        let _pending = PendingGuard::start(&self.state, &self.in_flight);
        let result = self.api.login(credentials).await;
        self.complete(AuthAction::Login, generation, result)
    }

    // Password confirmation is the caller's job; see RegistrationForm
    pub async fn register(&self, user: &RegisterRequest) -> bool {
        let generation = self.sequencer.begin();
        let _pending = PendingGuard::start(&self.state, &self.in_flight);
        let result = self.api.register(user).await;
        self.complete(AuthAction::Register, generation, result)
    }

    // Validates the form locally, then registers. A mismatch never reaches the network.
    pub async fn register_form(&self, form: RegistrationForm) -> bool {
        match form.into_request() {
            Ok(request) => self.register(&request).await,
            Err(e) => {
                self.state.write().last_error = Some(e.to_string());
                false
            }
        }
    }

    pub fn logout(&self) {
        self.sequencer.invalidate();
        {
            let mut state = self.state.write();
            if let Some(user) = state.current_user.take() {
                info!(user_id = user.id, "logged out");
            }
            state.last_error = None;
        }
        if let Some(persistence) = &self.persistence {
            persistence.clear();
        }
    }

    fn complete(
        &self,
        action: AuthAction,
        generation: Generation,
        result: Result<ApiResponse<User>, ApiError>,
    ) -> bool {
        if !self.sequencer.is_current(generation) {
            debug!(?action, ?generation, "discarding superseded auth response");
            return false;
        }

        let outcome = match result {
            Ok(ApiResponse {
                data: Some(user), ..
            }) => Ok(user),
            Ok(response) => Err(response
                .error
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| action.fallback_error().to_string())),
            Err(e) => {
                let message = e.to_string();
                Err(if message.is_empty() {
                    action.fallback_error().to_string()
                } else {
                    message
                })
            }
        };

        match outcome {
            Ok(user) => {
                info!(?action, user_id = user.id, username = %user.username, "authenticated");
                if let Some(persistence) = &self.persistence {
                    persistence.save(&user);
                }
                self.state.write().current_user = Some(user);
                true
            }
            Err(message) => {
                warn!(?action, error = %message, "authentication failed");
                self.state.write().last_error = Some(message);
                false
            }
        }
    }
}

// Raw registration input, including the confirmation field the service never sees
#[derive(Debug, Clone, Default)]
pub struct RegistrationForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
}

impl RegistrationForm {
    pub fn into_request(self) -> Result<RegisterRequest, ApiError> {
        if self.password != self.confirm_password {
            return Err(ApiError::validation("Passwords do not match"));
        }

        let phone_number = Some(self.phone_number.trim().to_string()).filter(|p| !p.is_empty());
        Ok(RegisterRequest {
            username: self.username,
            email: self.email,
            password: self.password,
            first_name: self.first_name,
            last_name: self.last_name,
            phone_number,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock_transport::MockTransport;
    use reqwest::Method;
    use serde_json::json;
    use std::time::Duration;
    use test_case::test_case;

    fn store_with(mock: &Arc<MockTransport>) -> SessionStore {
        let api = ApiService::with_transport(&ClientConfig::default(), mock.clone()).unwrap();
        SessionStore::new(Arc::new(api))
    }

    fn credentials() -> LoginRequest {
        LoginRequest {
            username: "alice".to_string(),
            password: "secret".to_string(),
        }
    }

    fn alice() -> serde_json::Value {
        json!({"id": 1, "username": "alice", "email": "alice@example.com", "firstName": "Alice", "lastName": "Smith", "role": "USER"})
    }

    #[tokio::test]
    async fn test_login_success_sets_current_user() {
        let mock = Arc::new(MockTransport::new());
        mock.respond_json(Method::POST, "/api/auth/login", 200, json!({"data": alice()}));
        let store = store_with(&mock);

        assert!(store.login(&credentials()).await);

        let user = store.current_user().unwrap();
        assert_eq!(user.id, 1);
        assert_eq!(user.full_name(), "Alice Smith");
        assert!(store.last_error().is_none());
        assert!(!store.is_pending());

        let request = mock.last_request().unwrap();
        assert_eq!(
            request.body.as_deref(),
            Some("{\"username\":\"alice\",\"password\":\"secret\"}")
        );
    }

    #[tokio::test]
    async fn test_login_error_envelope_stores_message() {
        let mock = Arc::new(MockTransport::new());
        mock.respond_json(
            Method::POST,
            "/api/auth/login",
            200,
            json!({"error": "bad credentials"}),
        );
        let store = store_with(&mock);

        assert!(!store.login(&credentials()).await);
        assert!(store.current_user().is_none());
        assert_eq!(store.last_error().as_deref(), Some("bad credentials"));
        assert!(!store.is_pending());
    }

    #[tokio::test]
    async fn test_login_rejected_status_stores_server_message() {
        let mock = Arc::new(MockTransport::new());
        mock.respond_json(
            Method::POST,
            "/api/auth/login",
            401,
            json!({"error": "bad credentials"}),
        );
        let store = store_with(&mock);

        assert!(!store.login(&credentials()).await);
        assert!(!store.is_authenticated());
        assert_eq!(store.last_error().as_deref(), Some("bad credentials"));
    }

    #[tokio::test]
    async fn test_envelope_without_user_or_error_uses_fallback() {
        let mock = Arc::new(MockTransport::new());
        mock.respond_json(Method::POST, "/api/auth/register", 201, json!({"message": "ok"}));
        let store = store_with(&mock);

        let request = RegisterRequest {
            username: "bob".to_string(),
            ..Default::default()
        };
        assert!(!store.register(&request).await);
        assert_eq!(store.last_error().as_deref(), Some("Registration failed"));
    }

    #[tokio::test]
    async fn test_transport_failure_is_not_fatal() {
        let mock = Arc::new(MockTransport::new());
        mock.fail(Method::POST, "/api/auth/login", "connection refused");
        let store = store_with(&mock);

        assert!(!store.login(&credentials()).await);
        assert!(store.last_error().unwrap().contains("connection refused"));

        // The store stays usable after a failure
        mock.respond_json(Method::POST, "/api/auth/login", 200, json!({"user": alice()}));
        assert!(store.login(&credentials()).await);
        assert!(store.last_error().is_none());
        assert!(store.is_authenticated());
    }

    #[tokio::test]
    async fn test_pending_while_login_in_flight() {
        let mock = Arc::new(MockTransport::new());
        mock.respond_json_delayed(
            Method::POST,
            "/api/auth/login",
            json!({"data": alice()}),
            Duration::from_millis(100),
        );
        let store = store_with(&mock);
        let credentials = credentials();

        let (succeeded, pending_mid_flight) = tokio::join!(store.login(&credentials), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            store.is_pending()
        });

        assert!(succeeded);
        assert!(pending_mid_flight);
        assert!(!store.is_pending());
    }

    #[test_case(401, json!({"error": ""}), "HTTP error! status: 401"; "rejected with empty error")]
    #[test_case(200, json!({"error": ""}), "Login failed"; "envelope with empty error")]
    #[test_case(200, json!({"error": "   "}), "Login failed"; "envelope with blank error")]
    #[tokio::test]
    async fn test_empty_error_message_falls_back(status: u16, body: serde_json::Value, expected: &str) {
        let mock = Arc::new(MockTransport::new());
        mock.respond_json(Method::POST, "/api/auth/login", status, body);
        let store = store_with(&mock);

        assert!(!store.login(&credentials()).await);
        assert_eq!(store.last_error().as_deref(), Some(expected));
    }

    #[tokio::test]
    async fn test_overlapping_logins_latest_wins() {
        let mock = Arc::new(MockTransport::new());
        mock.respond_json_delayed(
            Method::POST,
            "/api/auth/login",
            json!({"data": alice()}),
            Duration::from_millis(100),
        );
        let store = store_with(&mock);
        let first = credentials();
        let second = LoginRequest {
            username: "bob".to_string(),
            password: "pw".to_string(),
        };

        let (first_ok, (second_ok, pending_after_second)) = tokio::join!(store.login(&first), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            mock.respond_json_delayed(
                Method::POST,
                "/api/auth/login",
                json!({"data": {"id": 5, "username": "bob"}}),
                Duration::from_millis(30),
            );
            let ok = store.login(&second).await;
            (ok, store.is_pending())
        });

        assert!(second_ok);
        assert!(pending_after_second, "first login is still in flight");
        assert!(!first_ok);
        assert_eq!(store.current_user().unwrap().username, "bob");
        assert!(!store.is_pending());
    }

    #[tokio::test]
    async fn test_logout_discards_login_in_flight() {
        let mock = Arc::new(MockTransport::new());
        mock.respond_json_delayed(
            Method::POST,
            "/api/auth/login",
            json!({"data": alice()}),
            Duration::from_millis(50),
        );
        let store = store_with(&mock);
        let credentials = credentials();

        let (succeeded, ()) = tokio::join!(store.login(&credentials), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            store.logout();
        });

        assert!(!succeeded);
        assert!(!store.is_authenticated());
        assert!(!store.is_pending());
    }

    #[tokio::test]
    async fn test_logout_clears_user_and_error() {
        let mock = Arc::new(MockTransport::new());
        mock.respond_json(Method::POST, "/api/auth/login", 200, json!({"data": alice()}));
        let store = store_with(&mock);

        // Logging out with nothing to clear is fine
        store.logout();
        assert_eq!(store.snapshot(), SessionState::default());

        assert!(store.login(&credentials()).await);
        store.logout();
        assert!(store.current_user().is_none());

        mock.respond_json(Method::POST, "/api/auth/login", 401, json!({"error": "nope"}));
        assert!(!store.login(&credentials()).await);
        assert!(store.last_error().is_some());
        store.logout();
        assert_eq!(store.snapshot(), SessionState::default());
        assert_eq!(mock.request_count(), 2, "logout makes no remote call");
    }

    #[tokio::test]
    async fn test_register_form_rejects_password_mismatch_locally() {
        let mock = Arc::new(MockTransport::new());
        let store = store_with(&mock);

        let form = RegistrationForm {
            username: "carol".to_string(),
            password: "one".to_string(),
            confirm_password: "two".to_string(),
            ..Default::default()
        };
        assert!(!store.register_form(form).await);
        assert_eq!(store.last_error().as_deref(), Some("Passwords do not match"));
        assert_eq!(mock.request_count(), 0);
    }

    #[tokio::test]
    async fn test_register_form_submits_when_passwords_match() {
        let mock = Arc::new(MockTransport::new());
        mock.respond_json(
            Method::POST,
            "/api/auth/register",
            201,
            json!({"message": "User registered successfully", "user": {"id": 9, "username": "carol"}}),
        );
        let store = store_with(&mock);

        let form = RegistrationForm {
            username: "carol".to_string(),
            email: "carol@example.com".to_string(),
            password: "hunter22".to_string(),
            confirm_password: "hunter22".to_string(),
            first_name: "Carol".to_string(),
            last_name: "Jones".to_string(),
            phone_number: "   ".to_string(),
        };
        assert!(store.register_form(form).await);
        assert_eq!(store.current_user().unwrap().id, 9);

        let body: serde_json::Value =
            serde_json::from_str(mock.last_request().unwrap().body.as_deref().unwrap()).unwrap();
        assert_eq!(body["firstName"], "Carol");
        assert!(body.get("phoneNumber").is_none());
        assert!(body.get("confirmPassword").is_none());
    }

    #[tokio::test]
    async fn test_persistence_survives_restart_and_logout_clears_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let mock = Arc::new(MockTransport::new());
        mock.respond_json(Method::POST, "/api/auth/login", 200, json!({"data": alice()}));
        let api = Arc::new(ApiService::with_transport(&ClientConfig::default(), mock.clone()).unwrap());

        let store = SessionStore::with_persistence(api.clone(), SessionPersistence::new(&path));
        assert!(!store.is_authenticated());
        assert!(store.login(&credentials()).await);
        assert!(path.exists());

        let restored = SessionStore::with_persistence(api.clone(), SessionPersistence::new(&path));
        assert_eq!(restored.current_user().unwrap().username, "alice");

        restored.logout();
        assert!(!path.exists());
        let after_logout = SessionStore::with_persistence(api, SessionPersistence::new(&path));
        assert!(!after_logout.is_authenticated());
    }

    #[test]
    fn test_corrupt_session_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, b"{ definitely not a user").unwrap();

        assert!(SessionPersistence::new(&path).load().is_none());
    }
}
