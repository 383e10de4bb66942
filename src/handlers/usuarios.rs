use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::Form;
use serde::Deserialize;

use super::{loaded, notify, page_layout, prefetch, report};
use crate::api::{ADMIN_LEVEL_ID, USER_LEVEL_ID, UsuarioPayload};
use crate::listing::{self, ListQuery, Page, non_empty, parse_id};
use crate::session::{CurrentUser, RequireAdmin};
use crate::templates::{Pager, SelectOption, UsuarioForm, UsuarioRow, UsuariosTemplate};
use crate::toast::ToastKind;
use crate::{AppError, AppResult, SharedAppState};

const BASE: &str = "/admin/usuarios";

#[derive(Debug, Default, Deserialize)]
pub struct UsuarioFormData {
    #[serde(default)]
    pub nome: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub senha: String,
    #[serde(default)]
    pub nivel_acesso_id: String,
    #[serde(default)]
    pub ativo: String,
}

impl UsuarioFormData {
    fn nivel(&self) -> i64 {
        parse_id(&self.nivel_acesso_id).unwrap_or(USER_LEVEL_ID)
    }

    /// Radio buttons post `true`/`false`; anything else keeps the account active.
    fn ativo(&self) -> bool {
        self.ativo.trim() != "false"
    }
}

/// Checks required fields. The password is only mandatory for new accounts.
fn validate(data: &UsuarioFormData, creating: bool) -> Option<&'static str> {
    if data.nome.trim().is_empty() || data.email.trim().is_empty() {
        return Some("Nome e Email são obrigatórios.");
    }
    if creating && data.senha.is_empty() {
        return Some("Senha é obrigatória para novos usuários.");
    }
    None
}

fn payload(data: &UsuarioFormData) -> UsuarioPayload {
    UsuarioPayload {
        nome: data.nome.trim().to_string(),
        email: data.email.trim().to_string(),
        // A blank password on update leaves the current one untouched.
        senha: non_empty(&data.senha).map(|_| data.senha.clone()),
        nivel_acesso_id: data.nivel(),
        ativo: data.ativo(),
    }
}

fn nivel_options(selected: i64) -> Vec<SelectOption> {
    vec![
        SelectOption::new(USER_LEVEL_ID, "Usuário (Testador)", selected != ADMIN_LEVEL_ID),
        SelectOption::new(ADMIN_LEVEL_ID, "Administrador", selected == ADMIN_LEVEL_ID),
    ]
}

async fn render(
    state: &SharedAppState,
    user: &CurrentUser,
    query: ListQuery,
    draft: Option<(UsuarioForm, i64)>,
) -> AppResult<UsuariosTemplate> {
    let result = state.client.list_usuarios(user.token()).await;
    let usuarios = loaded(state, user, result, "usuários").await?;

    let (form, nivel) = draft.unwrap_or_else(|| {
        match query.edit.and_then(|id| usuarios.iter().find(|u| u.id == id)) {
            Some(u) => (
                UsuarioForm {
                    editing_id: Some(u.id),
                    nome: u.nome.clone(),
                    email: u.email.clone(),
                    ativo: u.ativo,
                },
                u.nivel_acesso_id,
            ),
            None => (
                UsuarioForm {
                    editing_id: None,
                    nome: String::new(),
                    email: String::new(),
                    ativo: true,
                },
                USER_LEVEL_ID,
            ),
        }
    });

    let filtered = listing::filter(usuarios, &query.q, |u| vec![u.nome.clone(), u.email.clone()]);
    let page = Page::paginate(filtered, query.page, state.config.page_size);
    let pager = Pager::new(&page, BASE, &query.q);
    let rows = page
        .items
        .into_iter()
        .map(|u| UsuarioRow {
            selected: form.editing_id == Some(u.id),
            role: u.role_name().to_uppercase(),
            id: u.id,
            nome: u.nome,
            email: u.email,
            ativo: u.ativo,
        })
        .collect();

    Ok(UsuariosTemplate {
        layout: page_layout(state, user, "Acessos", "usuarios").await,
        q: query.q,
        rows,
        pager,
        form,
        niveis: nivel_options(nivel),
    })
}

pub async fn usuarios_page(
    State(state): State<SharedAppState>,
    RequireAdmin(user): RequireAdmin,
    Query(query): Query<ListQuery>,
) -> AppResult<UsuariosTemplate> {
    render(&state, &user, query, None).await
}

async fn save(
    state: &SharedAppState,
    user: &CurrentUser,
    id: Option<i64>,
    data: UsuarioFormData,
) -> AppResult<Response> {
    let draft = (
        UsuarioForm {
            editing_id: id,
            nome: data.nome.clone(),
            email: data.email.clone(),
            ativo: data.ativo(),
        },
        data.nivel(),
    );

    if let Some(warning) = validate(&data, id.is_none()) {
        notify(state, user, ToastKind::Warning, warning).await;
        return Ok(render(state, user, ListQuery::default(), Some(draft)).await?.into_response());
    }

    let payload = payload(&data);
    let saved = match id {
        Some(id) => {
            let result = state.client.update_usuario(user.token(), id, &payload).await;
            report(state, user, result, "Usuário atualizado!", "Erro ao salvar usuário").await?
        }
        None => {
            let result = state.client.create_usuario(user.token(), &payload).await;
            report(state, user, result, "Usuário criado!", "Erro ao salvar usuário").await?
        }
    };

    if saved {
        Ok(Redirect::to(BASE).into_response())
    } else {
        Ok(render(state, user, ListQuery::default(), Some(draft)).await?.into_response())
    }
}

pub async fn create_usuario(
    State(state): State<SharedAppState>,
    RequireAdmin(user): RequireAdmin,
    Form(data): Form<UsuarioFormData>,
) -> AppResult<Response> {
    save(&state, &user, None, data).await
}

pub async fn update_usuario(
    State(state): State<SharedAppState>,
    RequireAdmin(user): RequireAdmin,
    Path(id): Path<i64>,
    Form(data): Form<UsuarioFormData>,
) -> AppResult<Response> {
    save(&state, &user, Some(id), data).await
}

pub async fn toggle_usuario(
    State(state): State<SharedAppState>,
    RequireAdmin(user): RequireAdmin,
    Path(id): Path<i64>,
) -> AppResult<Redirect> {
    let result = state.client.list_usuarios(user.token()).await;
    let usuarios = match prefetch(&state, &user, result, "Erro ao alterar status", BASE).await? {
        Ok(usuarios) => usuarios,
        Err(back) => return Ok(back),
    };
    let usuario = usuarios
        .into_iter()
        .find(|u| u.id == id)
        .ok_or_else(|| AppError::NotFound(format!("usuário {}", id)))?;

    let ativo = !usuario.ativo;
    let result = state.client.set_usuario_active(user.token(), id, ativo).await;
    let message = if ativo { "Usuário ativado!" } else { "Usuário desativado!" };
    report(&state, &user, result, message, "Erro ao alterar status").await?;
    Ok(Redirect::to(BASE))
}

pub async fn delete_usuario(
    State(state): State<SharedAppState>,
    RequireAdmin(user): RequireAdmin,
    Path(id): Path<i64>,
) -> AppResult<Redirect> {
    let result = state.client.delete_usuario(user.token(), id).await;
    report(&state, &user, result, "Usuário removido.", "Erro ao excluir").await?;
    Ok(Redirect::to(BASE))
}
