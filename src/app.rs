use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::Router;
use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum_extra::extract::CookieJar;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;
use tracing::Span;

use crate::api;
use crate::config::Config;
use crate::error::ForcedLogout;
use crate::handlers;
use crate::session::{SessionStore, session_id};
use crate::toast::{Toast, ToastKind};

/// Format latency in human-readable units
fn format_latency(duration: std::time::Duration) -> String {
    let micros = duration.as_micros();
    if micros < 1000 {
        format!("{}µs", micros)
    } else if micros < 1_000_000 {
        format!("{}ms", micros / 1000)
    } else {
        format!("{:.1}s", micros as f64 / 1_000_000.0)
    }
}

pub struct AppState {
    pub client: api::Client,
    pub sessions: SessionStore,
    pub config: Config,
    pub app_name: String,
    pub app_version: String,
}

pub type SharedAppState = Arc<AppState>;

impl AppState {
    pub fn new(config: Config) -> api::Result<Self> {
        Ok(Self {
            client: api::Client::new(&config.api_url, config.timeout)?,
            sessions: SessionStore::new(),
            config,
            app_name: "QA Console".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }
}

/// Ends the session of any response flagged with [`ForcedLogout`].
///
/// The session itself survives so the "expired" toast shows on the login page.
async fn session_guard(
    State(state): State<SharedAppState>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    if response.extensions().get::<ForcedLogout>().is_none() {
        return response;
    }

    if let Some(id) = session_id(&jar)
        && state.sessions.user(id).await.is_some()
    {
        tracing::info!("forcing logout of session {}", id);
        state.sessions.logout(id).await;
        state
            .sessions
            .push_toast(id, Toast::new(ToastKind::Error, "Sessão expirada."))
            .await;
    }
    response
}

pub fn create_app(state: SharedAppState) -> Router {
    let admin = Router::new()
        .route("/sistemas", get(handlers::sistemas_page).post(handlers::create_sistema))
        .route("/sistemas/:id", post(handlers::update_sistema))
        .route("/sistemas/:id/toggle", post(handlers::toggle_sistema))
        .route("/sistemas/:id/delete", post(handlers::delete_sistema))
        .route("/modulos", get(handlers::modulos_page).post(handlers::create_modulo))
        .route("/modulos/:id", post(handlers::update_modulo))
        .route("/modulos/:id/toggle", post(handlers::toggle_modulo))
        .route("/modulos/:id/delete", post(handlers::delete_modulo))
        .route("/projetos", get(handlers::projetos_page).post(handlers::create_projeto))
        .route("/projetos/:id", post(handlers::update_projeto))
        .route("/projetos/:id/delete", post(handlers::delete_projeto))
        .route("/ciclos", get(handlers::ciclos_page).post(handlers::create_ciclo))
        .route("/ciclos/:id", post(handlers::update_ciclo))
        .route("/ciclos/:id/delete", post(handlers::delete_ciclo))
        .route("/casos", get(handlers::casos_page).post(handlers::create_caso))
        .route("/casos/:id", post(handlers::update_caso))
        .route("/casos/:id/delete", post(handlers::delete_caso))
        .route("/usuarios", get(handlers::usuarios_page).post(handlers::create_usuario))
        .route("/usuarios/:id", post(handlers::update_usuario))
        .route("/usuarios/:id/toggle", post(handlers::toggle_usuario))
        .route("/usuarios/:id/delete", post(handlers::delete_usuario))
        .route("/performance", get(handlers::performance_page))
        .route("/logs", get(handlers::logs_page))
        .route("/logs/:id/delete", post(handlers::delete_log));

    let qa = Router::new()
        .route("/defeitos", get(handlers::defeitos_page))
        .route("/defeitos/:id/status", post(handlers::update_defeito_status))
        .route("/defeitos/:id/delete", post(handlers::delete_defeito))
        .route("/runner", get(handlers::runner_page))
        .route("/runner/:exec/steps/:passo/approve", post(handlers::approve_step))
        .route("/runner/:exec/steps/:passo/fail", post(handlers::fail_step))
        .route("/runner/:exec/finish", post(handlers::finish_execution));

    Router::new()
        .route("/", get(handlers::login_page))
        .route("/login", post(handlers::login))
        .route("/logout", post(handlers::logout))
        .route(
            "/forgot-password",
            get(handlers::forgot_password_page).post(handlers::forgot_password),
        )
        .route(
            "/reset-password",
            get(handlers::reset_password_page).post(handlers::reset_password),
        )
        .route("/admin", get(handlers::dashboard))
        .nest("/admin", admin)
        .nest("/qa", qa)
        .route("/health", get(handlers::health_check))
        .route("/style.css", get(handlers::serve_css))
        .route("/app.js", get(handlers::serve_js))
        .route("/favicon.ico", get(handlers::serve_favicon))
        .route("/favicon.svg", get(handlers::serve_favicon))
        .layer(middleware::from_fn_with_state(state.clone(), session_guard))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    static REQUEST_ID: AtomicU64 = AtomicU64::new(1);
                    let request_id_num = REQUEST_ID.fetch_add(1, Ordering::Relaxed);
                    let generator = block_id::BlockId::new(
                        block_id::Alphabet::alphanumeric(),
                        1234,
                        5,
                    );
                    let request_id = generator
                        .encode_string(request_id_num)
                        .unwrap_or_else(|| request_id_num.to_string());
                    tracing::info_span!(
                        "request",
                        id = %request_id,
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                })
                .on_request(|request: &axum::http::Request<_>, _span: &Span| {
                    tracing::info!("-> {} {}", request.method(), request.uri());
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &Span| {
                        tracing::info!(
                            "<- {} latency={}",
                            response.status().as_u16(),
                            format_latency(latency)
                        );
                    },
                ),
        )
        .layer(CompressionLayer::new())
}
