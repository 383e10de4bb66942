use axum::extract::{Path, Query, State};
use axum::response::Redirect;
use axum_extra::extract::Form;
use serde::Deserialize;

use super::{loaded, page_layout, report};
use crate::api::{Defeito, DefeitoStatus};
use crate::listing::{self, ListQuery, Page, parse_evidence};
use crate::markdown;
use crate::session::{CurrentUser, RequireAdmin};
use crate::templates::{DefeitoRow, DefeitosTemplate, Pager, SelectOption, format_datetime};
use crate::{AppError, AppResult, SharedAppState};

const BASE: &str = "/qa/defeitos";

const STEP_MARKER: &str = " (DetalhesPasso: ";
const STEP_SEPARATOR: &str = " ||| ";

/// Title sent to the backend for a defect found on a step.
///
/// The backend has no field for the step, so its action and expected result
/// ride along in the title and are split back out for display.
pub(crate) fn defect_title(titulo: &str, acao: &str, resultado: &str) -> String {
    format!("{}{}{}{}{})", titulo.trim(), STEP_MARKER, acao, STEP_SEPARATOR, resultado)
}

/// Inverse of [`defect_title`]: the plain title plus the step's action and expected result.
pub(crate) fn split_defect_title(raw: &str) -> (String, Option<(String, String)>) {
    let Some(start) = raw.rfind(STEP_MARKER) else {
        return (raw.to_string(), None);
    };
    let details = &raw[start + STEP_MARKER.len()..];
    let Some(details) = details.strip_suffix(')') else {
        return (raw.to_string(), None);
    };
    match details.split_once(STEP_SEPARATOR) {
        Some((acao, resultado)) => (
            raw[..start].to_string(),
            Some((acao.to_string(), resultado.to_string())),
        ),
        None => (raw.to_string(), None),
    }
}

fn row(d: Defeito, is_admin: bool) -> DefeitoRow {
    let (titulo, passo) = split_defect_title(&d.titulo);
    let (passo_acao, passo_resultado) = passo.unwrap_or_default();
    let execucao = d.execucao.as_ref();
    let caso_nome = execucao
        .and_then(|e| e.caso_teste.as_ref())
        .map(|c| c.nome.clone())
        .unwrap_or_else(|| "Teste Removido".to_string());
    let responsavel = execucao
        .and_then(|e| e.responsavel.as_ref())
        .map(|r| r.nome.clone())
        .unwrap_or_else(|| "Desconhecido".to_string());
    let status_options = if is_admin {
        DefeitoStatus::all()
            .into_iter()
            .map(|s| SelectOption::new(s.as_str(), s.label(), s == d.status))
            .collect()
    } else {
        Vec::new()
    };

    DefeitoRow {
        id: d.id,
        titulo,
        passo_acao,
        passo_resultado,
        caso_nome,
        responsavel,
        descricao_html: markdown::render(&d.descricao),
        severidade_label: d.severidade.label().to_string(),
        severidade_color: d.severidade.color(),
        status: d.status.as_str().to_string(),
        status_label: d.status.label().to_string(),
        criado_em: format_datetime(d.created_at.as_deref()),
        evidencias: parse_evidence(d.evidencias.as_deref()),
        status_options,
    }
}

/// Defect list. Testers see their own reports; admins can triage.
pub async fn defeitos_page(
    State(state): State<SharedAppState>,
    user: CurrentUser,
    Query(query): Query<ListQuery>,
) -> AppResult<DefeitosTemplate> {
    let result = state.client.list_defeitos(user.token()).await;
    let defeitos = loaded(&state, &user, result, "defeitos").await?;

    let filtered = listing::filter(defeitos, &query.q, |d| {
        vec![
            d.titulo.clone(),
            d.severidade.as_str().to_string(),
            d.status.as_str().to_string(),
        ]
    });
    let page = Page::paginate(filtered, query.page, state.config.page_size);
    let pager = Pager::new(&page, BASE, &query.q);
    let is_admin = user.is_admin();
    let rows = page.items.into_iter().map(|d| row(d, is_admin)).collect();

    let title = if is_admin { "Gestão de Defeitos" } else { "Meus Reportes" };
    Ok(DefeitosTemplate {
        layout: page_layout(&state, &user, title, "defeitos").await,
        q: query.q,
        rows,
        pager,
    })
}

#[derive(Debug, Deserialize)]
pub struct StatusForm {
    pub status: String,
}

pub async fn update_defeito_status(
    State(state): State<SharedAppState>,
    RequireAdmin(user): RequireAdmin,
    Path(id): Path<i64>,
    Form(form): Form<StatusForm>,
) -> AppResult<Redirect> {
    let status = DefeitoStatus::from(form.status.trim());
    if let DefeitoStatus::Other(raw) = &status {
        return Err(AppError::BadRequest(format!("status de defeito desconhecido: {}", raw)));
    }

    let result = state.client.update_defeito_status(user.token(), id, &status).await;
    let message = format!("Status atualizado para {}", status.as_str().to_uppercase());
    report(&state, &user, result, &message, "Erro ao atualizar status").await?;
    Ok(Redirect::to(BASE))
}

pub async fn delete_defeito(
    State(state): State<SharedAppState>,
    RequireAdmin(user): RequireAdmin,
    Path(id): Path<i64>,
) -> AppResult<Redirect> {
    let result = state.client.delete_defeito(user.token(), id).await;
    report(&state, &user, result, "Defeito excluído.", "Erro ao excluir").await?;
    Ok(Redirect::to(BASE))
}
