use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::Form;
use serde::Deserialize;

use super::{loaded, notify, page_layout, report};
use crate::api::{CicloPayload, CicloStatus, Projeto, ProjetoStatus};
use crate::listing::{self, ListQuery, Page, non_empty, parse_id, truncate};
use crate::session::{CurrentUser, RequireAdmin};
use crate::templates::{CicloForm, CicloRow, CiclosTemplate, Pager, SelectOption, date_input, format_datetime};
use crate::toast::ToastKind;
use crate::{AppResult, SharedAppState};

const BASE: &str = "/admin/ciclos";

#[derive(Debug, Default, Deserialize)]
pub struct CicloFormData {
    #[serde(default)]
    pub nome: String,
    #[serde(default)]
    pub descricao: String,
    #[serde(default)]
    pub data_inicio: String,
    #[serde(default)]
    pub data_fim: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub projeto_id: String,
}

/// New cycles can only be planned for active projects.
fn projeto_options(projetos: &[Projeto], selected: Option<i64>) -> Vec<SelectOption> {
    projetos
        .iter()
        .filter(|p| p.status == ProjetoStatus::Ativo || Some(p.id) == selected)
        .map(|p| SelectOption::new(p.id, truncate(&p.nome, 40), Some(p.id) == selected))
        .collect()
}

fn periodo(inicio: Option<&str>, fim: Option<&str>) -> String {
    let day = |raw: Option<&str>| {
        let formatted = format_datetime(raw);
        formatted.get(..10).map(String::from).unwrap_or(formatted)
    };
    format!("{} a {}", day(inicio), day(fim))
}

async fn render(
    state: &SharedAppState,
    user: &CurrentUser,
    query: ListQuery,
    draft: Option<(CicloForm, Option<i64>, CicloStatus)>,
) -> AppResult<CiclosTemplate> {
    let token = user.token();
    let result = tokio::try_join!(state.client.list_ciclos(token), state.client.list_projetos(token));
    let (ciclos, projetos) = loaded(state, user, result, "ciclos").await?;

    let (form, projeto_id, status) = draft.unwrap_or_else(|| {
        match query.edit.and_then(|id| ciclos.iter().find(|c| c.id == id)) {
            Some(c) => (
                CicloForm {
                    editing_id: Some(c.id),
                    nome: c.nome.clone(),
                    descricao: c.descricao.clone().unwrap_or_default(),
                    data_inicio: date_input(c.data_inicio.as_deref()),
                    data_fim: date_input(c.data_fim.as_deref()),
                },
                Some(c.projeto_id),
                c.status.clone(),
            ),
            None => (
                CicloForm {
                    editing_id: None,
                    nome: String::new(),
                    descricao: String::new(),
                    data_inicio: String::new(),
                    data_fim: String::new(),
                },
                None,
                CicloStatus::Planejado,
            ),
        }
    });

    let filtered = listing::filter(ciclos, &query.q, |c| vec![c.nome.clone()]);
    let page = Page::paginate(filtered, query.page, state.config.page_size);
    let pager = Pager::new(&page, BASE, &query.q);
    let rows = page
        .items
        .into_iter()
        .map(|c| CicloRow {
            selected: form.editing_id == Some(c.id),
            projeto_nome: projetos
                .iter()
                .find(|p| p.id == c.projeto_id)
                .map(|p| p.nome.clone())
                .unwrap_or_else(|| "-".to_string()),
            periodo: periodo(c.data_inicio.as_deref(), c.data_fim.as_deref()),
            progress: c.progress_percent(),
            status: c.status.as_str().to_string(),
            status_label: c.status.label().to_string(),
            id: c.id,
            nome: c.nome,
        })
        .collect();

    let statuses = CicloStatus::all()
        .into_iter()
        .map(|s| SelectOption::new(s.as_str(), s.label(), s == status))
        .collect();

    Ok(CiclosTemplate {
        layout: page_layout(state, user, "Ciclos", "ciclos").await,
        q: query.q,
        rows,
        pager,
        projeto_locked: form.editing_id.is_some(),
        form,
        projetos: projeto_options(&projetos, projeto_id),
        statuses,
    })
}

pub async fn ciclos_page(
    State(state): State<SharedAppState>,
    RequireAdmin(user): RequireAdmin,
    Query(query): Query<ListQuery>,
) -> AppResult<CiclosTemplate> {
    render(&state, &user, query, None).await
}

async fn save(
    state: &SharedAppState,
    user: &CurrentUser,
    id: Option<i64>,
    data: CicloFormData,
) -> AppResult<Response> {
    let projeto_id = parse_id(&data.projeto_id);
    let status = non_empty(&data.status)
        .map(CicloStatus::from)
        .unwrap_or(CicloStatus::Planejado);
    let draft = (
        CicloForm {
            editing_id: id,
            nome: data.nome.clone(),
            descricao: data.descricao.clone(),
            data_inicio: data.data_inicio.clone(),
            data_fim: data.data_fim.clone(),
        },
        projeto_id,
        status.clone(),
    );

    let nome = data.nome.trim();
    let Some(projeto_id) = projeto_id.filter(|_| !nome.is_empty()) else {
        notify(state, user, ToastKind::Warning, "Nome e Projeto são obrigatórios.").await;
        return Ok(render(state, user, ListQuery::default(), Some(draft)).await?.into_response());
    };

    let payload = CicloPayload {
        nome: nome.to_string(),
        descricao: non_empty(&data.descricao),
        data_inicio: non_empty(&data.data_inicio),
        data_fim: non_empty(&data.data_fim),
        status,
        projeto_id,
    };
    let saved = match id {
        Some(id) => {
            let result = state.client.update_ciclo(user.token(), id, &payload).await;
            report(state, user, result, "Ciclo atualizado!", "Erro ao salvar ciclo").await?
        }
        None => {
            let result = state.client.create_ciclo(user.token(), &payload).await;
            report(state, user, result, "Ciclo criado!", "Erro ao salvar ciclo").await?
        }
    };

    if saved {
        Ok(Redirect::to(BASE).into_response())
    } else {
        Ok(render(state, user, ListQuery::default(), Some(draft)).await?.into_response())
    }
}

pub async fn create_ciclo(
    State(state): State<SharedAppState>,
    RequireAdmin(user): RequireAdmin,
    Form(data): Form<CicloFormData>,
) -> AppResult<Response> {
    save(&state, &user, None, data).await
}

pub async fn update_ciclo(
    State(state): State<SharedAppState>,
    RequireAdmin(user): RequireAdmin,
    Path(id): Path<i64>,
    Form(data): Form<CicloFormData>,
) -> AppResult<Response> {
    save(&state, &user, Some(id), data).await
}

pub async fn delete_ciclo(
    State(state): State<SharedAppState>,
    RequireAdmin(user): RequireAdmin,
    Path(id): Path<i64>,
) -> AppResult<Redirect> {
    let result = state.client.delete_ciclo(user.token(), id).await;
    report(&state, &user, result, "Ciclo excluído.", "Erro ao excluir").await?;
    Ok(Redirect::to(BASE))
}
