use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::Form;
use serde::Deserialize;

use super::{loaded, notify, page_layout, prefetch, report};
use crate::api::{ApiError, SistemaPayload};
use crate::listing::{self, ListQuery, Page, is_duplicate_name, non_empty};
use crate::session::{CurrentUser, RequireAdmin};
use crate::templates::{Pager, SistemaForm, SistemaRow, SistemasTemplate};
use crate::toast::ToastKind;
use crate::{AppError, AppResult, SharedAppState};

const BASE: &str = "/admin/sistemas";

#[derive(Debug, Default, Deserialize)]
pub struct SistemaFormData {
    #[serde(default)]
    pub nome: String,
    #[serde(default)]
    pub descricao: String,
}

async fn render(
    state: &SharedAppState,
    user: &CurrentUser,
    query: ListQuery,
    draft: Option<SistemaForm>,
) -> AppResult<SistemasTemplate> {
    let result = state.client.list_sistemas(user.token()).await;
    let sistemas = loaded(state, user, result, "sistemas").await?;

    let form = draft.unwrap_or_else(|| {
        match query.edit.and_then(|id| sistemas.iter().find(|s| s.id == id)) {
            Some(s) => SistemaForm {
                editing_id: Some(s.id),
                nome: s.nome.clone(),
                descricao: s.descricao.clone().unwrap_or_default(),
            },
            None => SistemaForm {
                editing_id: None,
                nome: String::new(),
                descricao: String::new(),
            },
        }
    });

    let filtered = listing::filter(sistemas, &query.q, |s| vec![s.nome.clone()]);
    let page = Page::paginate(filtered, query.page, state.config.page_size);
    let pager = Pager::new(&page, BASE, &query.q);
    let rows = page
        .items
        .into_iter()
        .map(|s| SistemaRow {
            selected: form.editing_id == Some(s.id),
            id: s.id,
            nome: s.nome,
            descricao: s.descricao.unwrap_or_default(),
            ativo: s.ativo,
        })
        .collect();

    Ok(SistemasTemplate {
        layout: page_layout(state, user, "Sistemas", "sistemas").await,
        q: query.q,
        rows,
        pager,
        form,
    })
}

pub async fn sistemas_page(
    State(state): State<SharedAppState>,
    RequireAdmin(user): RequireAdmin,
    Query(query): Query<ListQuery>,
) -> AppResult<SistemasTemplate> {
    render(&state, &user, query, None).await
}

async fn save(
    state: &SharedAppState,
    user: &CurrentUser,
    id: Option<i64>,
    data: SistemaFormData,
) -> AppResult<Response> {
    let draft = SistemaForm {
        editing_id: id,
        nome: data.nome.clone(),
        descricao: data.descricao.clone(),
    };
    let nome = data.nome.trim();

    if nome.is_empty() {
        notify(state, user, ToastKind::Warning, "Por favor, preencha o nome do sistema.").await;
        return Ok(render(state, user, ListQuery::default(), Some(draft)).await?.into_response());
    }

    let existing = match state.client.list_sistemas(user.token()).await {
        Ok(list) => list,
        Err(ApiError::Unauthorized) => return Err(AppError::Unauthorized),
        Err(_) => Vec::new(),
    };
    if is_duplicate_name(existing.iter().map(|s| (s.id, s.nome.as_str())), nome, id) {
        notify(state, user, ToastKind::Warning, "Já existe um Sistema com este nome.").await;
        return Ok(render(state, user, ListQuery::default(), Some(draft)).await?.into_response());
    }

    let payload = SistemaPayload {
        nome: nome.to_string(),
        descricao: non_empty(&data.descricao),
        ativo: id.is_none().then_some(true),
    };
    let saved = match id {
        Some(id) => {
            let result = state.client.update_sistema(user.token(), id, &payload).await;
            report(state, user, result, "Sistema atualizado com sucesso!", "Erro ao salvar sistema").await?
        }
        None => {
            let result = state.client.create_sistema(user.token(), &payload).await;
            report(state, user, result, "Sistema cadastrado com sucesso!", "Erro ao salvar sistema").await?
        }
    };

    if saved {
        Ok(Redirect::to(BASE).into_response())
    } else {
        Ok(render(state, user, ListQuery::default(), Some(draft)).await?.into_response())
    }
}

pub async fn create_sistema(
    State(state): State<SharedAppState>,
    RequireAdmin(user): RequireAdmin,
    Form(data): Form<SistemaFormData>,
) -> AppResult<Response> {
    save(&state, &user, None, data).await
}

pub async fn update_sistema(
    State(state): State<SharedAppState>,
    RequireAdmin(user): RequireAdmin,
    Path(id): Path<i64>,
    Form(data): Form<SistemaFormData>,
) -> AppResult<Response> {
    save(&state, &user, Some(id), data).await
}

pub async fn toggle_sistema(
    State(state): State<SharedAppState>,
    RequireAdmin(user): RequireAdmin,
    Path(id): Path<i64>,
) -> AppResult<Redirect> {
    let result = state.client.list_sistemas(user.token()).await;
    let sistemas = match prefetch(&state, &user, result, "Erro ao alterar status", BASE).await? {
        Ok(sistemas) => sistemas,
        Err(back) => return Ok(back),
    };
    let sistema = sistemas
        .into_iter()
        .find(|s| s.id == id)
        .ok_or_else(|| AppError::NotFound(format!("sistema {}", id)))?;

    let ativo = !sistema.ativo;
    let result = state.client.set_sistema_active(user.token(), id, ativo).await;
    let message = if ativo { "Sistema ativado!" } else { "Sistema desativado!" };
    report(&state, &user, result, message, "Erro ao alterar status").await?;
    Ok(Redirect::to(BASE))
}

pub async fn delete_sistema(
    State(state): State<SharedAppState>,
    RequireAdmin(user): RequireAdmin,
    Path(id): Path<i64>,
) -> AppResult<Redirect> {
    let result = state.client.delete_sistema(user.token(), id).await;
    report(
        &state,
        &user,
        result,
        "Sistema excluído com sucesso.",
        "Não foi possível excluir. Verifique se existem vínculos",
    )
    .await?;
    Ok(Redirect::to(BASE))
}
