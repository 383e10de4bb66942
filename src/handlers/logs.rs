use axum::extract::{Path, Query, State};
use axum::response::Redirect;

use super::{loaded, page_layout, report};
use crate::listing::{self, ListQuery, Page};
use crate::session::RequireAdmin;
use crate::templates::{LogRow, LogsTemplate, Pager, format_datetime};
use crate::{AppResult, SharedAppState};

const BASE: &str = "/admin/logs";

pub async fn logs_page(
    State(state): State<SharedAppState>,
    RequireAdmin(user): RequireAdmin,
    Query(query): Query<ListQuery>,
) -> AppResult<LogsTemplate> {
    let result = state.client.list_logs(user.token()).await;
    let logs = loaded(&state, &user, result, "o histórico de logs").await?;

    let filtered = listing::filter(logs, &query.q, |l| {
        vec![
            l.usuario_nome.clone().unwrap_or_default(),
            l.sistema_nome.clone().unwrap_or_default(),
            l.acao.clone(),
            l.entidade.clone(),
            l.detalhes.clone().unwrap_or_default(),
        ]
    });
    let page = Page::paginate(filtered, query.page, state.config.page_size);
    let pager = Pager::new(&page, BASE, &query.q);
    let rows = page
        .items
        .into_iter()
        .map(|l| LogRow {
            id: l.id,
            quando: format_datetime(l.created_at.as_deref()),
            usuario: l.usuario_nome.unwrap_or_else(|| "Sistema".to_string()),
            sistema: l.sistema_nome.unwrap_or_else(|| "-".to_string()),
            acao: l.acao,
            entidade: l.entidade,
            detalhes: l.detalhes.unwrap_or_default(),
        })
        .collect();

    Ok(LogsTemplate {
        layout: page_layout(&state, &user, "Logs", "logs").await,
        q: query.q,
        rows,
        pager,
    })
}

pub async fn delete_log(
    State(state): State<SharedAppState>,
    RequireAdmin(user): RequireAdmin,
    Path(id): Path<i64>,
) -> AppResult<Redirect> {
    let result = state.client.delete_log(user.token(), id).await;
    report(
        &state,
        &user,
        result,
        "Registro de log removido com sucesso.",
        "Erro ao remover o registro",
    )
    .await?;
    Ok(Redirect::to(BASE))
}
