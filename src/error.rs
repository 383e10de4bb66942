use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use thiserror::Error;

use crate::api::ApiError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Backend error: {0}")]
    Api(ApiError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// No session, or the backend rejected the session's token.
    #[error("Session expired")]
    Unauthorized,

    /// Logged in, but the role may not open this page. Carries the role's home.
    #[error("Forbidden, redirecting to {0}")]
    Forbidden(&'static str),
}

impl From<ApiError> for AppError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized => AppError::Unauthorized,
            other => AppError::Api(other),
        }
    }
}

/// Marks a response that must end the caller's session (see `app::session_guard`).
#[derive(Debug, Clone, Copy)]
pub struct ForcedLogout;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Unauthorized => {
                tracing::info!("{}", self);
                let mut response = Redirect::to("/").into_response();
                response.extensions_mut().insert(ForcedLogout);
                response
            }
            AppError::Forbidden(home) => {
                tracing::info!("{}", self);
                Redirect::to(home).into_response()
            }
            _ => {
                let status = match &self {
                    AppError::NotFound(_) => StatusCode::NOT_FOUND,
                    AppError::Api(err) if err.is_not_found() => StatusCode::NOT_FOUND,
                    AppError::Api(_) => StatusCode::BAD_GATEWAY,
                    _ => StatusCode::BAD_REQUEST,
                };
                tracing::error!("{}", self);
                (status, self.to_string()).into_response()
            }
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
