//! Server-side sessions keyed by an opaque cookie.
//!
//! A session carries the backend bearer token and role of the logged-in user,
//! the toast queue, and the defects a tester has recorded but not yet submitted.
//! Anonymous visitors only get a session once something needs to be queued for
//! them (e.g. a toast after a password reset).

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::api::{Severidade, Token};
use crate::error::AppError;
use crate::toast::{Toast, ToastKind, ToastQueue};
use crate::SharedAppState;

pub const SESSION_COOKIE: &str = "qa_session";

/// Logged-in sessions idle for longer than this are dropped.
const IDLE_TIMEOUT: Duration = Duration::from_secs(8 * 60 * 60);

/// Anonymous sessions only carry toasts between two requests.
const ANONYMOUS_IDLE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Oldest anonymous sessions are evicted past this count.
const MAX_ANONYMOUS_SESSIONS: usize = 1000;

#[derive(Debug, Clone, Copy)]
pub struct SessionLimits {
    pub idle: Duration,
    pub anonymous_idle: Duration,
    pub max_anonymous: usize,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            idle: IDLE_TIMEOUT,
            anonymous_idle: ANONYMOUS_IDLE_TIMEOUT,
            max_anonymous: MAX_ANONYMOUS_SESSIONS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("admin") {
            Role::Admin
        } else {
            Role::User
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }

    /// Landing page after login.
    pub fn home(&self) -> &'static str {
        match self {
            Role::Admin => "/admin",
            Role::User => "/qa/runner",
        }
    }
}

#[derive(Debug, Clone)]
pub struct UserSession {
    pub token: String,
    pub role: Role,
    pub username: String,
    pub nome: String,
}

impl UserSession {
    /// Builds the session from a login response.
    ///
    /// Older backends omit `role` and `username`; the role is then guessed
    /// from the login name.
    pub fn from_token(token: Token, login: &str) -> Self {
        let role = match token.role.as_deref() {
            Some(role) if !role.is_empty() => Role::parse(role),
            _ if login.to_lowercase().contains("admin") => Role::Admin,
            _ => Role::User,
        };
        let username = token
            .username
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| login.to_string());
        let nome = token
            .nome
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| username.clone());

        Self {
            token: token.access_token,
            role,
            username,
            nome,
        }
    }
}

/// A failed step's defect, held until the execution is finished.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedDefect {
    pub passo_id: i64,
    pub titulo: String,
    pub descricao: String,
    pub severidade: Severidade,
    pub evidencias: Vec<String>,
}

#[derive(Debug)]
pub struct Session {
    pub user: Option<UserSession>,
    pub toasts: ToastQueue,
    /// Execution id -> defects queued for its steps.
    pub defect_queues: HashMap<i64, Vec<QueuedDefect>>,
    last_seen: Instant,
}

impl Session {
    pub fn anonymous() -> Self {
        Self {
            user: None,
            toasts: ToastQueue::default(),
            defect_queues: HashMap::new(),
            last_seen: Instant::now(),
        }
    }

    pub fn for_user(user: UserSession) -> Self {
        Self {
            user: Some(user),
            ..Self::anonymous()
        }
    }

    fn is_expired(&self, limits: &SessionLimits) -> bool {
        let timeout = if self.user.is_some() {
            limits.idle
        } else {
            limits.anonymous_idle
        };
        self.last_seen.elapsed() >= timeout
    }
}

/// In-memory session table. Expired sessions are refused on lookup and
/// swept whenever a new session is created.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<Uuid, Session>>>,
    limits: SessionLimits,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: SessionLimits) -> Self {
        Self {
            inner: Arc::default(),
            limits,
        }
    }

    pub async fn create(&self, session: Session) -> Uuid {
        let id = Uuid::new_v4();
        let mut sessions = self.inner.write().await;
        sessions.retain(|_, s| !s.is_expired(&self.limits));

        if session.user.is_none() {
            let mut anonymous: Vec<(Uuid, Instant)> = sessions
                .iter()
                .filter(|(_, s)| s.user.is_none())
                .map(|(id, s)| (*id, s.last_seen))
                .collect();
            if anonymous.len() >= self.limits.max_anonymous {
                anonymous.sort_by_key(|(_, last_seen)| *last_seen);
                let excess = anonymous.len() + 1 - self.limits.max_anonymous.max(1);
                for (old, _) in anonymous.into_iter().take(excess) {
                    sessions.remove(&old);
                }
            }
        }

        sessions.insert(id, session);
        id
    }

    /// The live session under `id`, marked as just used. An expired one is removed.
    fn touch<'a>(&self, sessions: &'a mut HashMap<Uuid, Session>, id: Uuid) -> Option<&'a mut Session> {
        if sessions.get(&id)?.is_expired(&self.limits) {
            sessions.remove(&id);
            return None;
        }
        let session = sessions.get_mut(&id)?;
        session.last_seen = Instant::now();
        Some(session)
    }

    pub async fn contains(&self, id: Uuid) -> bool {
        self.inner
            .read()
            .await
            .get(&id)
            .is_some_and(|s| !s.is_expired(&self.limits))
    }

    pub async fn user(&self, id: Uuid) -> Option<UserSession> {
        let mut sessions = self.inner.write().await;
        self.touch(&mut sessions, id)?.user.clone()
    }

    /// Runs `f` against the session, if it still exists.
    pub async fn update<R>(&self, id: Uuid, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        let mut sessions = self.inner.write().await;
        self.touch(&mut sessions, id).map(f)
    }

    pub async fn push_toast(&self, id: Uuid, toast: Toast) {
        self.update(id, |s| s.toasts.push(toast)).await;
    }

    pub async fn drain_toasts(&self, id: Uuid) -> Vec<Toast> {
        self.update(id, |s| s.toasts.drain()).await.unwrap_or_default()
    }

    /// Forgets the logged-in user but keeps pending toasts.
    pub async fn logout(&self, id: Uuid) {
        self.update(id, |s| {
            s.user = None;
            s.defect_queues.clear();
        })
        .await;
    }

    pub async fn remove(&self, id: Uuid) {
        self.inner.write().await.remove(&id);
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Queues a toast for whoever holds `jar`, creating an anonymous session if needed.
    pub async fn notify(&self, jar: CookieJar, kind: ToastKind, message: impl Into<String>) -> CookieJar {
        let toast = Toast::new(kind, message);
        if let Some(id) = session_id(&jar)
            && self.contains(id).await
        {
            self.push_toast(id, toast).await;
            return jar;
        }

        let mut session = Session::anonymous();
        session.toasts.push(toast);
        let id = self.create(session).await;
        jar.add(session_cookie(id))
    }
}

pub fn session_id(jar: &CookieJar) -> Option<Uuid> {
    jar.get(SESSION_COOKIE)
        .and_then(|c| Uuid::parse_str(c.value()).ok())
}

pub fn session_cookie(id: Uuid) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, id.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

pub fn expired_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .max_age(time::Duration::ZERO)
        .build()
}

/// The logged-in user behind the request. Rejects with a redirect to the login page.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub session_id: Uuid,
    pub user: UserSession,
}

impl CurrentUser {
    pub fn token(&self) -> &str {
        &self.user.token
    }

    pub fn is_admin(&self) -> bool {
        self.user.role == Role::Admin
    }
}

#[async_trait]
impl FromRequestParts<SharedAppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &SharedAppState) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let session_id = session_id(&jar).ok_or(AppError::Unauthorized)?;
        let user = state
            .sessions
            .user(session_id)
            .await
            .ok_or(AppError::Unauthorized)?;
        Ok(CurrentUser { session_id, user })
    }
}

async fn require_role(
    parts: &mut Parts,
    state: &SharedAppState,
    role: Role,
) -> Result<CurrentUser, AppError> {
    let current = CurrentUser::from_request_parts(parts, state).await?;
    if current.user.role != role {
        tracing::warn!(
            "{} ({}) denied access to {}",
            current.user.username,
            current.user.role.as_str(),
            parts.uri.path()
        );
        state
            .sessions
            .push_toast(
                current.session_id,
                Toast::new(ToastKind::Warning, "Você não tem permissão para acessar esta página."),
            )
            .await;
        return Err(AppError::Forbidden(current.user.role.home()));
    }
    Ok(current)
}

/// Admin-only screens.
pub struct RequireAdmin(pub CurrentUser);

#[async_trait]
impl FromRequestParts<SharedAppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &SharedAppState) -> Result<Self, Self::Rejection> {
        require_role(parts, state, Role::Admin).await.map(RequireAdmin)
    }
}

/// Tester-only screens (the runner).
pub struct RequireTester(pub CurrentUser);

#[async_trait]
impl FromRequestParts<SharedAppState> for RequireTester {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &SharedAppState) -> Result<Self, Self::Rejection> {
        require_role(parts, state, Role::User).await.map(RequireTester)
    }
}
