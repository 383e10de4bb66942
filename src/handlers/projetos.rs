use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::Form;
use serde::Deserialize;

use super::{loaded, notify, page_layout, prefetch, report};
use crate::api::{Modulo, ProjetoPayload, ProjetoStatus, Sistema, Usuario};
use crate::listing::{self, ListQuery, Page, non_empty, parse_id, truncate};
use crate::session::{CurrentUser, RequireAdmin};
use crate::templates::{Pager, ProjetoForm, ProjetoRow, ProjetosTemplate, SelectOption};
use crate::toast::ToastKind;
use crate::{AppResult, SharedAppState};

const BASE: &str = "/admin/projetos";

#[derive(Debug, Default, Deserialize)]
pub struct ProjetoFormData {
    #[serde(default)]
    pub nome: String,
    #[serde(default)]
    pub descricao: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub sistema_id: String,
    #[serde(default)]
    pub modulo_id: String,
    #[serde(default)]
    pub responsavel_id: String,
}

/// Select values of a project form, kept apart from the free-text fields.
#[derive(Debug, Clone, Default)]
struct Selection {
    status: Option<ProjetoStatus>,
    sistema_id: Option<i64>,
    modulo_id: Option<i64>,
    responsavel_id: Option<i64>,
}

fn name_of<'a>(items: impl IntoIterator<Item = (i64, &'a str)>, id: Option<i64>) -> String {
    id.and_then(|id| items.into_iter().find(|(i, _)| *i == id))
        .map(|(_, nome)| nome.to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Checks the project's required fields. Returns the warning to show, if any.
fn validate(nome: &str, sel: &Selection, modulos: &[Modulo]) -> Option<&'static str> {
    if nome.trim().is_empty() {
        return Some("Nome é obrigatório.");
    }
    let (Some(sistema_id), Some(modulo_id)) = (sel.sistema_id, sel.modulo_id) else {
        return Some("Sistema e Módulo são obrigatórios.");
    };
    let belongs = modulos
        .iter()
        .any(|m| m.id == modulo_id && m.sistema_id == sistema_id);
    if !belongs {
        return Some("O módulo selecionado não pertence ao sistema.");
    }
    None
}

fn options(
    sel: &Selection,
    sistemas: &[Sistema],
    modulos: &[Modulo],
    usuarios: &[Usuario],
) -> (Vec<SelectOption>, Vec<SelectOption>, Vec<SelectOption>, Vec<SelectOption>) {
    let current_status = sel.status.clone().unwrap_or(ProjetoStatus::Ativo);
    let statuses = ProjetoStatus::all()
        .into_iter()
        .map(|s| SelectOption::new(s.as_str(), s.label(), s == current_status))
        .collect();
    let sistemas = sistemas
        .iter()
        .filter(|s| s.ativo || Some(s.id) == sel.sistema_id)
        .map(|s| SelectOption::new(s.id, truncate(&s.nome, 30), Some(s.id) == sel.sistema_id))
        .collect();
    let modulos = modulos
        .iter()
        .filter(|m| m.ativo || Some(m.id) == sel.modulo_id)
        .map(|m| {
            SelectOption::new(m.id, truncate(&m.nome, 30), Some(m.id) == sel.modulo_id)
                .grouped(m.sistema_id)
        })
        .collect();
    let responsaveis = usuarios
        .iter()
        .filter(|u| u.ativo || Some(u.id) == sel.responsavel_id)
        .map(|u| SelectOption::new(u.id, u.nome.clone(), Some(u.id) == sel.responsavel_id))
        .collect();
    (statuses, sistemas, modulos, responsaveis)
}

async fn render(
    state: &SharedAppState,
    user: &CurrentUser,
    query: ListQuery,
    draft: Option<(ProjetoForm, Selection)>,
) -> AppResult<ProjetosTemplate> {
    let token = user.token();
    let result = tokio::try_join!(
        state.client.list_projetos(token),
        state.client.list_sistemas(token),
        state.client.list_modulos(token),
        state.client.list_usuarios(token),
    );
    let (projetos, sistemas, modulos, usuarios) = loaded(state, user, result, "projetos").await?;

    let (form, sel) = draft.unwrap_or_else(|| {
        match query.edit.and_then(|id| projetos.iter().find(|p| p.id == id)) {
            Some(p) => (
                ProjetoForm {
                    editing_id: Some(p.id),
                    nome: p.nome.clone(),
                    descricao: p.descricao.clone().unwrap_or_default(),
                },
                Selection {
                    status: Some(p.status.clone()),
                    sistema_id: Some(p.sistema_id),
                    modulo_id: Some(p.modulo_id),
                    responsavel_id: p.responsavel_id,
                },
            ),
            None => (
                ProjetoForm {
                    editing_id: None,
                    nome: String::new(),
                    descricao: String::new(),
                },
                Selection::default(),
            ),
        }
    });

    let filtered = listing::filter(projetos, &query.q, |p| {
        vec![p.nome.clone(), p.status.as_str().to_string(), p.status.label().to_string()]
    });
    let page = Page::paginate(filtered, query.page, state.config.page_size);
    let pager = Pager::new(&page, BASE, &query.q);
    let rows = page
        .items
        .into_iter()
        .map(|p| ProjetoRow {
            selected: form.editing_id == Some(p.id),
            sistema_nome: name_of(sistemas.iter().map(|s| (s.id, s.nome.as_str())), Some(p.sistema_id)),
            modulo_nome: name_of(modulos.iter().map(|m| (m.id, m.nome.as_str())), Some(p.modulo_id)),
            responsavel_nome: name_of(usuarios.iter().map(|u| (u.id, u.nome.as_str())), p.responsavel_id),
            status: p.status.as_str().to_string(),
            status_label: p.status.label().to_string(),
            id: p.id,
            nome: p.nome,
        })
        .collect();

    let (statuses, sistema_opts, modulo_opts, responsaveis) = options(&sel, &sistemas, &modulos, &usuarios);
    Ok(ProjetosTemplate {
        layout: page_layout(state, user, "Projetos", "projetos").await,
        q: query.q,
        rows,
        pager,
        form,
        statuses,
        sistemas: sistema_opts,
        modulos: modulo_opts,
        responsaveis,
    })
}

pub async fn projetos_page(
    State(state): State<SharedAppState>,
    RequireAdmin(user): RequireAdmin,
    Query(query): Query<ListQuery>,
) -> AppResult<ProjetosTemplate> {
    render(&state, &user, query, None).await
}

async fn save(
    state: &SharedAppState,
    user: &CurrentUser,
    id: Option<i64>,
    data: ProjetoFormData,
) -> AppResult<Response> {
    let sel = Selection {
        status: non_empty(&data.status).map(ProjetoStatus::from),
        sistema_id: parse_id(&data.sistema_id),
        modulo_id: parse_id(&data.modulo_id),
        responsavel_id: parse_id(&data.responsavel_id),
    };
    let draft = ProjetoForm {
        editing_id: id,
        nome: data.nome.clone(),
        descricao: data.descricao.clone(),
    };

    let result = state.client.list_modulos(user.token()).await;
    let Ok(modulos) = prefetch(state, user, result, "Erro ao carregar módulos", BASE).await? else {
        return Ok(render(state, user, ListQuery::default(), Some((draft, sel))).await?.into_response());
    };
    if let Some(warning) = validate(&data.nome, &sel, &modulos) {
        notify(state, user, ToastKind::Warning, warning).await;
        return Ok(render(state, user, ListQuery::default(), Some((draft, sel))).await?.into_response());
    }

    let payload = ProjetoPayload {
        nome: data.nome.trim().to_string(),
        descricao: non_empty(&data.descricao),
        status: sel.status.clone().unwrap_or(ProjetoStatus::Ativo),
        sistema_id: sel.sistema_id.unwrap_or_default(),
        modulo_id: sel.modulo_id.unwrap_or_default(),
        responsavel_id: sel.responsavel_id,
    };
    let saved = match id {
        Some(id) => {
            let result = state.client.update_projeto(user.token(), id, &payload).await;
            report(state, user, result, "Projeto atualizado!", "Erro ao salvar projeto").await?
        }
        None => {
            let result = state.client.create_projeto(user.token(), &payload).await;
            report(state, user, result, "Projeto criado!", "Erro ao salvar projeto").await?
        }
    };

    if saved {
        Ok(Redirect::to(BASE).into_response())
    } else {
        Ok(render(state, user, ListQuery::default(), Some((draft, sel))).await?.into_response())
    }
}

pub async fn create_projeto(
    State(state): State<SharedAppState>,
    RequireAdmin(user): RequireAdmin,
    Form(data): Form<ProjetoFormData>,
) -> AppResult<Response> {
    save(&state, &user, None, data).await
}

pub async fn update_projeto(
    State(state): State<SharedAppState>,
    RequireAdmin(user): RequireAdmin,
    Path(id): Path<i64>,
    Form(data): Form<ProjetoFormData>,
) -> AppResult<Response> {
    save(&state, &user, Some(id), data).await
}

pub async fn delete_projeto(
    State(state): State<SharedAppState>,
    RequireAdmin(user): RequireAdmin,
    Path(id): Path<i64>,
) -> AppResult<Redirect> {
    let result = state.client.delete_projeto(user.token(), id).await;
    report(&state, &user, result, "Projeto excluído.", "Erro ao excluir").await?;
    Ok(Redirect::to(BASE))
}
