use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::Form;
use serde::Deserialize;

use super::{loaded, notify, page_layout, prefetch, report};
use crate::api::{ApiError, ModuloPayload, Sistema};
use crate::listing::{self, ListQuery, Page, is_duplicate_name, non_empty, parse_id, truncate};
use crate::session::{CurrentUser, RequireAdmin};
use crate::templates::{ModuloForm, ModuloRow, ModulosTemplate, Pager, SelectOption};
use crate::toast::ToastKind;
use crate::{AppError, AppResult, SharedAppState};

const BASE: &str = "/admin/modulos";

#[derive(Debug, Default, Deserialize)]
pub struct ModuloFormData {
    #[serde(default)]
    pub nome: String,
    #[serde(default)]
    pub descricao: String,
    #[serde(default)]
    pub ordem: String,
    #[serde(default)]
    pub sistema_id: String,
}

/// Only active systems can receive modules; the one already linked stays listed.
fn sistema_options(sistemas: &[Sistema], selected: Option<i64>) -> Vec<SelectOption> {
    sistemas
        .iter()
        .filter(|s| s.ativo || Some(s.id) == selected)
        .map(|s| SelectOption::new(s.id, truncate(&s.nome, 30), Some(s.id) == selected))
        .collect()
}

async fn render(
    state: &SharedAppState,
    user: &CurrentUser,
    query: ListQuery,
    draft: Option<(ModuloForm, Option<i64>)>,
) -> AppResult<ModulosTemplate> {
    let token = user.token();
    let result = tokio::try_join!(state.client.list_modulos(token), state.client.list_sistemas(token));
    let (modulos, sistemas) = loaded(state, user, result, "módulos").await?;

    let (form, selected_sistema) = draft.unwrap_or_else(|| {
        match query.edit.and_then(|id| modulos.iter().find(|m| m.id == id)) {
            Some(m) => (
                ModuloForm {
                    editing_id: Some(m.id),
                    nome: m.nome.clone(),
                    descricao: m.descricao.clone().unwrap_or_default(),
                    ordem: m.ordem.map(|o| o.to_string()).unwrap_or_default(),
                },
                Some(m.sistema_id),
            ),
            None => (
                ModuloForm {
                    editing_id: None,
                    nome: String::new(),
                    descricao: String::new(),
                    ordem: String::new(),
                },
                sistemas.iter().find(|s| s.ativo).map(|s| s.id),
            ),
        }
    });

    let sistema_nome = |id: i64| {
        sistemas
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.nome.clone())
            .unwrap_or_else(|| "-".to_string())
    };

    let filtered = listing::filter(modulos, &query.q, |m| {
        vec![m.nome.clone(), sistema_nome(m.sistema_id)]
    });
    let page = Page::paginate(filtered, query.page, state.config.page_size);
    let pager = Pager::new(&page, BASE, &query.q);
    let rows = page
        .items
        .into_iter()
        .map(|m| ModuloRow {
            selected: form.editing_id == Some(m.id),
            sistema_nome: sistema_nome(m.sistema_id),
            ordem: m.ordem.map(|o| o.to_string()).unwrap_or_else(|| "-".to_string()),
            id: m.id,
            nome: m.nome,
            descricao: m.descricao.unwrap_or_default(),
            ativo: m.ativo,
        })
        .collect();

    Ok(ModulosTemplate {
        layout: page_layout(state, user, "Módulos", "modulos").await,
        q: query.q,
        rows,
        pager,
        sistemas: sistema_options(&sistemas, selected_sistema),
        form,
    })
}

pub async fn modulos_page(
    State(state): State<SharedAppState>,
    RequireAdmin(user): RequireAdmin,
    Query(query): Query<ListQuery>,
) -> AppResult<ModulosTemplate> {
    render(&state, &user, query, None).await
}

async fn save(
    state: &SharedAppState,
    user: &CurrentUser,
    id: Option<i64>,
    data: ModuloFormData,
) -> AppResult<Response> {
    let sistema_id = parse_id(&data.sistema_id);
    let draft = (
        ModuloForm {
            editing_id: id,
            nome: data.nome.clone(),
            descricao: data.descricao.clone(),
            ordem: data.ordem.clone(),
        },
        sistema_id,
    );
    let nome = data.nome.trim();

    let Some(sistema_id) = sistema_id else {
        notify(state, user, ToastKind::Warning, "Por favor, selecione o Sistema Pai.").await;
        return Ok(render(state, user, ListQuery::default(), Some(draft)).await?.into_response());
    };
    if nome.is_empty() {
        notify(state, user, ToastKind::Warning, "Por favor, preencha o nome do módulo.").await;
        return Ok(render(state, user, ListQuery::default(), Some(draft)).await?.into_response());
    }

    let existing = match state.client.list_modulos(user.token()).await {
        Ok(list) => list,
        Err(ApiError::Unauthorized) => return Err(AppError::Unauthorized),
        Err(_) => Vec::new(),
    };
    let same_sistema = existing
        .iter()
        .filter(|m| m.sistema_id == sistema_id)
        .map(|m| (m.id, m.nome.as_str()));
    if is_duplicate_name(same_sistema, nome, id) {
        notify(
            state,
            user,
            ToastKind::Warning,
            "Já existe um módulo com este nome neste sistema.",
        )
        .await;
        return Ok(render(state, user, ListQuery::default(), Some(draft)).await?.into_response());
    }

    let payload = ModuloPayload {
        nome: nome.to_string(),
        descricao: non_empty(&data.descricao),
        ordem: data.ordem.trim().parse().ok(),
        sistema_id,
        ativo: id.is_none().then_some(true),
    };
    let saved = match id {
        Some(id) => {
            let result = state.client.update_modulo(user.token(), id, &payload).await;
            report(state, user, result, "Módulo atualizado com sucesso!", "Erro ao salvar módulo").await?
        }
        None => {
            let result = state.client.create_modulo(user.token(), &payload).await;
            report(state, user, result, "Módulo cadastrado com sucesso!", "Erro ao salvar módulo").await?
        }
    };

    if saved {
        Ok(Redirect::to(BASE).into_response())
    } else {
        Ok(render(state, user, ListQuery::default(), Some(draft)).await?.into_response())
    }
}

pub async fn create_modulo(
    State(state): State<SharedAppState>,
    RequireAdmin(user): RequireAdmin,
    Form(data): Form<ModuloFormData>,
) -> AppResult<Response> {
    save(&state, &user, None, data).await
}

pub async fn update_modulo(
    State(state): State<SharedAppState>,
    RequireAdmin(user): RequireAdmin,
    Path(id): Path<i64>,
    Form(data): Form<ModuloFormData>,
) -> AppResult<Response> {
    save(&state, &user, Some(id), data).await
}

pub async fn toggle_modulo(
    State(state): State<SharedAppState>,
    RequireAdmin(user): RequireAdmin,
    Path(id): Path<i64>,
) -> AppResult<Redirect> {
    let result = state.client.list_modulos(user.token()).await;
    let failure = "Não foi possível alterar o status do módulo";
    let modulos = match prefetch(&state, &user, result, failure, BASE).await? {
        Ok(modulos) => modulos,
        Err(back) => return Ok(back),
    };
    let modulo = modulos
        .into_iter()
        .find(|m| m.id == id)
        .ok_or_else(|| AppError::NotFound(format!("módulo {}", id)))?;

    let ativo = !modulo.ativo;
    let result = state.client.set_modulo_active(user.token(), id, ativo).await;
    let message = format!(
        "Módulo \"{}\" {}.",
        modulo.nome,
        if ativo { "ativado" } else { "desativado" }
    );
    report(&state, &user, result, &message, "Não foi possível alterar o status do módulo").await?;
    Ok(Redirect::to(BASE))
}

pub async fn delete_modulo(
    State(state): State<SharedAppState>,
    RequireAdmin(user): RequireAdmin,
    Path(id): Path<i64>,
) -> AppResult<Redirect> {
    let result = state.client.delete_modulo(user.token(), id).await;
    report(
        &state,
        &user,
        result,
        "Módulo excluído com sucesso.",
        "Não é possível excluir este módulo pois ele possui dependências",
    )
    .await?;
    Ok(Redirect::to(BASE))
}
