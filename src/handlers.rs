pub mod auth;
pub mod casos;
pub mod ciclos;
pub mod dashboard;
pub mod defeitos;
pub mod general;
pub mod logs;
pub mod modulos;
pub mod performance;
pub mod projetos;
pub mod runner;
pub mod sistemas;
pub mod usuarios;

pub use auth::{
    forgot_password, forgot_password_page, login, login_page, logout, reset_password,
    reset_password_page,
};
pub use casos::{casos_page, create_caso, delete_caso, update_caso};
pub use ciclos::{ciclos_page, create_ciclo, delete_ciclo, update_ciclo};
pub use dashboard::dashboard;
pub use defeitos::{defeitos_page, delete_defeito, update_defeito_status};
pub use general::{health_check, serve_css, serve_favicon, serve_js};
pub use logs::{delete_log, logs_page};
pub use modulos::{create_modulo, delete_modulo, modulos_page, toggle_modulo, update_modulo};
pub use performance::performance_page;
pub use projetos::{create_projeto, delete_projeto, projetos_page, update_projeto};
pub use runner::{approve_step, fail_step, finish_execution, runner_page};
pub use sistemas::{create_sistema, delete_sistema, sistemas_page, toggle_sistema, update_sistema};
pub use usuarios::{create_usuario, delete_usuario, toggle_usuario, update_usuario, usuarios_page};

use axum::response::Redirect;

use crate::api::{self, ApiError};
use crate::error::{AppError, AppResult};
use crate::session::CurrentUser;
use crate::templates::Layout;
use crate::toast::{Toast, ToastKind};
use crate::SharedAppState;

/// Page chrome for a logged-in user, draining their pending toasts.
pub(crate) async fn page_layout(
    state: &SharedAppState,
    user: &CurrentUser,
    page_title: &str,
    active_nav: &str,
) -> Layout {
    let toasts = state.sessions.drain_toasts(user.session_id).await;
    Layout::for_user(state, user, page_title, active_nav, toasts)
}

pub(crate) async fn notify(state: &SharedAppState, user: &CurrentUser, kind: ToastKind, message: impl Into<String>) {
    state
        .sessions
        .push_toast(user.session_id, Toast::new(kind, message))
        .await;
}

/// Unwraps a screen's initial load.
///
/// A failed load still renders the page, empty, with an error toast. An
/// expired token propagates so the user is sent back to the login page.
pub(crate) async fn loaded<T: Default>(
    state: &SharedAppState,
    user: &CurrentUser,
    result: api::Result<T>,
    what: &str,
) -> AppResult<T> {
    match result {
        Ok(value) => Ok(value),
        Err(ApiError::Unauthorized) => Err(AppError::Unauthorized),
        Err(err) => {
            tracing::warn!("loading {} failed: {}", what, err);
            notify(state, user, ToastKind::Error, format!("Erro ao carregar {}.", what)).await;
            Ok(T::default())
        }
    }
}

/// Turns the outcome of a mutation into a toast. Returns whether it succeeded.
pub(crate) async fn report(
    state: &SharedAppState,
    user: &CurrentUser,
    result: api::Result<()>,
    success: &str,
    failure: &str,
) -> AppResult<bool> {
    match result {
        Ok(()) => {
            notify(state, user, ToastKind::Success, success).await;
            Ok(true)
        }
        Err(ApiError::Unauthorized) => Err(AppError::Unauthorized),
        Err(err) => {
            tracing::warn!("{}: {}", failure, err);
            notify(state, user, ToastKind::Error, format!("{}: {}", failure, err)).await;
            Ok(false)
        }
    }
}

/// Unwraps a read that an action depends on.
///
/// On failure the action is abandoned: an error toast is queued and the
/// caller gets the redirect to return. An expired token still propagates.
pub(crate) async fn prefetch<T>(
    state: &SharedAppState,
    user: &CurrentUser,
    result: api::Result<T>,
    failure: &str,
    to: &str,
) -> AppResult<Result<T, Redirect>> {
    match result {
        Ok(value) => Ok(Ok(value)),
        Err(ApiError::Unauthorized) => Err(AppError::Unauthorized),
        Err(err) => {
            tracing::warn!("{}: {}", failure, err);
            notify(state, user, ToastKind::Error, format!("{}: {}", failure, err)).await;
            Ok(Err(Redirect::to(to)))
        }
    }
}

/// Pushes a warning toast and sends the user back to `to`.
pub(crate) async fn reject(state: &SharedAppState, user: &CurrentUser, message: &str, to: &str) -> Redirect {
    notify(state, user, ToastKind::Warning, message).await;
    Redirect::to(to)
}
