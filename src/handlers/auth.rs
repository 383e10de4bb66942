use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::{CookieJar, Form};
use serde::Deserialize;

use crate::api::ApiError;
use crate::session::{Session, UserSession, expired_cookie, session_cookie, session_id};
use crate::templates::{ForgotPasswordTemplate, Layout, LoginTemplate, ResetPasswordTemplate};
use crate::toast::{Toast, ToastKind};
use crate::{AppResult, SharedAppState};

const MIN_PASSWORD_LEN: usize = 6;

const RESET_SENT: &str =
    "Se o e-mail estiver cadastrado, um link de redefinição foi enviado. Verifique sua caixa de entrada.";

/// Toasts queued for a visitor who is not (or no longer) logged in.
async fn public_toasts(state: &SharedAppState, jar: &CookieJar) -> Vec<Toast> {
    match session_id(jar) {
        Some(id) => state.sessions.drain_toasts(id).await,
        None => Vec::new(),
    }
}

/// Opening the login page signs out whoever is signed in on this browser.
pub async fn login_page(State(state): State<SharedAppState>, jar: CookieJar) -> LoginTemplate {
    if let Some(id) = session_id(&jar) {
        state.sessions.logout(id).await;
    }
    LoginTemplate {
        layout: Layout::public(&state, "Login", public_toasts(&state, &jar).await),
        username: String::new(),
        error: None,
    }
}

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

pub async fn login(
    State(state): State<SharedAppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    let username = form.username.trim().to_string();
    let failed = |message: String| LoginTemplate {
        layout: Layout::public(&state, "Login", Vec::new()),
        username: username.clone(),
        error: Some(message),
    };

    if username.is_empty() || form.password.is_empty() {
        return Ok(failed("Informe usuário e senha.".to_string()).into_response());
    }

    let token = match state.client.login(&username, &form.password).await {
        Ok(token) => token,
        Err(err) => {
            tracing::warn!("login failed for {}: {}", username, err);
            let message = match err {
                ApiError::Status { message, .. } => message,
                ApiError::Unauthorized => "Falha no login. Verifique as credenciais.".to_string(),
                other => other.to_string(),
            };
            return Ok(failed(message).into_response());
        }
    };

    let user = UserSession::from_token(token, &username);
    tracing::info!("{} logged in as {}", user.username, user.role.as_str());
    let home = user.role.home();

    if let Some(old) = session_id(&jar) {
        state.sessions.remove(old).await;
    }
    let session = Session::for_user(user);
    let id = state.sessions.create(session).await;

    Ok((jar.add(session_cookie(id)), Redirect::to(home)).into_response())
}

pub async fn logout(State(state): State<SharedAppState>, jar: CookieJar) -> impl IntoResponse {
    if let Some(id) = session_id(&jar) {
        state.sessions.remove(id).await;
    }
    (jar.add(expired_cookie()), Redirect::to("/"))
}

pub async fn forgot_password_page(State(state): State<SharedAppState>, jar: CookieJar) -> ForgotPasswordTemplate {
    ForgotPasswordTemplate {
        layout: Layout::public(&state, "Recuperação de Senha", public_toasts(&state, &jar).await),
        email: String::new(),
    }
}

#[derive(Deserialize)]
pub struct ForgotPasswordForm {
    #[serde(default)]
    pub email: String,
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !email.contains(char::is_whitespace)
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
        }
        None => false,
    }
}

pub async fn forgot_password(
    State(state): State<SharedAppState>,
    jar: CookieJar,
    Form(form): Form<ForgotPasswordForm>,
) -> Response {
    let email = form.email.trim().to_string();
    if !looks_like_email(&email) {
        return ForgotPasswordTemplate {
            layout: Layout::public(
                &state,
                "Recuperação de Senha",
                vec![Toast::new(
                    ToastKind::Error,
                    "Por favor, inclua um '@' e um domínio válido no endereço de e-mail.",
                )],
            ),
            email,
        }
        .into_response();
    }

    // Whether the address exists is never revealed; only transport failures surface.
    let jar = match state.client.forgot_password(&email).await {
        Err(ApiError::Transport(err)) => {
            tracing::warn!("forgot-password request failed: {}", err);
            return ForgotPasswordTemplate {
                layout: Layout::public(
                    &state,
                    "Recuperação de Senha",
                    vec![Toast::new(
                        ToastKind::Error,
                        "Falha de comunicação com o servidor. Tente novamente.",
                    )],
                ),
                email,
            }
            .into_response();
        }
        Err(err) => {
            tracing::info!("forgot-password for {} answered: {}", email, err);
            state.sessions.notify(jar, ToastKind::Success, RESET_SENT).await
        }
        Ok(()) => state.sessions.notify(jar, ToastKind::Success, RESET_SENT).await,
    };
    (jar, Redirect::to("/")).into_response()
}

#[derive(Deserialize)]
pub struct ResetQuery {
    #[serde(default)]
    pub token: String,
}

/// Reset tokens issued by the backend are URL-safe; anything else is
/// refused without a backend call.
fn is_valid_token(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

pub async fn reset_password_page(
    State(state): State<SharedAppState>,
    jar: CookieJar,
    Query(query): Query<ResetQuery>,
) -> Response {
    if query.token.is_empty() {
        let jar = state
            .sessions
            .notify(jar, ToastKind::Error, "Token de redefinição não encontrado.")
            .await;
        return (jar, Redirect::to("/forgot-password")).into_response();
    }

    let valid = is_valid_token(&query.token)
        && match state.client.validate_reset_token(&query.token).await {
            Ok(()) => true,
            Err(err) => {
                tracing::info!("reset token rejected: {}", err);
                false
            }
        };
    if !valid {
        let jar = state
            .sessions
            .notify(jar, ToastKind::Error, "Link de redefinição inválido ou expirado.")
            .await;
        return (jar, Redirect::to("/forgot-password")).into_response();
    }

    ResetPasswordTemplate {
        layout: Layout::public(&state, "Redefinir Senha", public_toasts(&state, &jar).await),
        token: query.token,
    }
    .into_response()
}

#[derive(Deserialize)]
pub struct ResetPasswordForm {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

fn check_new_password(password: &str, confirm: &str) -> Result<(), &'static str> {
    if password.trim().is_empty() || confirm.trim().is_empty() {
        return Err("Por favor, preencha todos os campos.");
    }
    if password != confirm {
        return Err("As senhas não coincidem.");
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err("A senha deve ter no mínimo 6 caracteres.");
    }
    Ok(())
}

pub async fn reset_password(
    State(state): State<SharedAppState>,
    jar: CookieJar,
    Form(form): Form<ResetPasswordForm>,
) -> Response {
    let rerender = |message: String| ResetPasswordTemplate {
        layout: Layout::public(
            &state,
            "Redefinir Senha",
            vec![Toast::new(ToastKind::Error, message)],
        ),
        token: form.token.clone(),
    };

    if !is_valid_token(&form.token) {
        let jar = state
            .sessions
            .notify(jar, ToastKind::Error, "Link de redefinição inválido ou expirado.")
            .await;
        return (jar, Redirect::to("/forgot-password")).into_response();
    }
    if let Err(message) = check_new_password(&form.password, &form.confirm_password) {
        return rerender(message.to_string()).into_response();
    }

    match state.client.confirm_reset(&form.token, &form.password).await {
        Ok(()) => {
            let jar = state
                .sessions
                .notify(jar, ToastKind::Success, "Sua senha foi redefinida com sucesso!")
                .await;
            (jar, Redirect::to("/")).into_response()
        }
        Err(err) => {
            tracing::warn!("password reset failed: {}", err);
            let message = match err {
                ApiError::Status { message, .. } => message,
                _ => "Não foi possível redefinir a senha. Tente novamente ou solicite um novo link."
                    .to_string(),
            };
            rerender(message).into_response()
        }
    }
}
