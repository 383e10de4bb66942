//! Test runner: a tester's task list and the step-by-step execution player.
//!
//! Step verdicts are saved on the backend as soon as they are given. Defects
//! found on failed steps wait in the session until the execution is finished,
//! then are posted in one go before the execution is closed.

use axum::extract::{Path, Query, State};
use axum::response::Redirect;
use axum_extra::extract::Form;
use serde::Deserialize;

use super::defeitos::defect_title;
use super::{loaded, notify, page_layout, prefetch, reject};
use crate::api::{
    ApiError, DefeitoPayload, DefeitoStatus, ExecucaoPasso, ExecucaoStatus, ExecucaoTeste, PassoStatus,
    PassoUpdate, Severidade,
};
use crate::listing::{encode_evidence, evidence_lines, non_empty, parse_evidence};
use crate::markdown;
use crate::session::{CurrentUser, QueuedDefect, RequireTester};
use crate::templates::{ExecutionView, QueuedDefectView, RunnerTemplate, SelectOption, StepView, TaskRow};
use crate::toast::ToastKind;
use crate::{AppError, AppResult, SharedAppState};

const BASE: &str = "/qa/runner";

fn execution_url(id: i64) -> String {
    format!("{}?exec={}", BASE, id)
}

#[derive(Debug, Default, Deserialize)]
pub struct RunnerQuery {
    #[serde(default)]
    pub exec: Option<i64>,
}

async fn queued_defects(state: &SharedAppState, user: &CurrentUser, exec_id: i64) -> Vec<QueuedDefect> {
    state
        .sessions
        .update(user.session_id, |s| s.defect_queues.get(&exec_id).cloned().unwrap_or_default())
        .await
        .unwrap_or_default()
}

/// Drops whatever is queued for `passo_id` and, if given, queues `defect` in its place.
async fn replace_queued(
    state: &SharedAppState,
    user: &CurrentUser,
    exec_id: i64,
    passo_id: i64,
    defect: Option<QueuedDefect>,
) {
    state
        .sessions
        .update(user.session_id, |s| {
            let queue = s.defect_queues.entry(exec_id).or_default();
            queue.retain(|d| d.passo_id != passo_id);
            queue.extend(defect);
            if queue.is_empty() {
                s.defect_queues.remove(&exec_id);
            }
        })
        .await;
}

async fn clear_queue(state: &SharedAppState, user: &CurrentUser, exec_id: i64) {
    state
        .sessions
        .update(user.session_id, |s| s.defect_queues.remove(&exec_id))
        .await;
}

fn step_template(passo: &ExecucaoPasso) -> (i64, String, String) {
    match &passo.passo_template {
        Some(t) => (t.ordem, t.acao.clone(), t.resultado_esperado.clone()),
        None => (0, String::new(), String::new()),
    }
}

fn execution_view(exec: &ExecucaoTeste, queue: &[QueuedDefect]) -> ExecutionView {
    let mut steps: Vec<StepView> = exec
        .passos_executados
        .iter()
        .map(|p| {
            let (ordem, acao, resultado_esperado) = step_template(p);
            StepView {
                id: p.id,
                ordem,
                acao,
                resultado_esperado,
                status: p.status.as_str().to_string(),
                status_label: p.status.label().to_string(),
                evidencias: parse_evidence(p.evidencias.as_deref()),
                queued_defect: queue.iter().find(|d| d.passo_id == p.id).map(|d| QueuedDefectView {
                    titulo: d.titulo.clone(),
                    severidade_label: d.severidade.label().to_string(),
                }),
            }
        })
        .collect();
    steps.sort_by_key(|s| (s.ordem, s.id));

    let caso = exec.caso_teste.as_ref();
    ExecutionView {
        id: exec.id,
        title: exec.title(),
        status_label: exec.status_geral.label().to_string(),
        read_only: exec.status_geral.is_read_only(),
        descricao_html: markdown::render_opt(caso.and_then(|c| c.descricao.as_deref())),
        pre_condicoes_html: markdown::render_opt(caso.and_then(|c| c.pre_condicoes.as_deref())),
        pending: exec.pending_steps(),
        queued: queue.len(),
        steps,
    }
}

/// Opens an execution in the player.
///
/// A retest starts from a clean queue; a pending execution is moved to
/// "in progress" the first time it is opened.
async fn open_execution(
    state: &SharedAppState,
    user: &CurrentUser,
    exec_id: i64,
) -> AppResult<Option<ExecucaoTeste>> {
    let mut exec = match state.client.get_execucao(user.token(), exec_id).await {
        Ok(exec) => exec,
        Err(ApiError::Unauthorized) => return Err(AppError::Unauthorized),
        Err(err) => {
            tracing::warn!("loading execution {} failed: {}", exec_id, err);
            notify(state, user, ToastKind::Error, "Erro ao carregar execução.").await;
            return Ok(None);
        }
    };

    match exec.status_geral {
        ExecucaoStatus::Reteste => clear_queue(state, user, exec.id).await,
        ExecucaoStatus::Pendente => {
            match state
                .client
                .finalizar_execucao(user.token(), exec.id, &ExecucaoStatus::EmProgresso)
                .await
            {
                Ok(()) => exec.status_geral = ExecucaoStatus::EmProgresso,
                Err(ApiError::Unauthorized) => return Err(AppError::Unauthorized),
                Err(err) => tracing::warn!("could not start execution {}: {}", exec.id, err),
            }
        }
        _ => {}
    }
    Ok(Some(exec))
}

pub async fn runner_page(
    State(state): State<SharedAppState>,
    RequireTester(user): RequireTester,
    Query(query): Query<RunnerQuery>,
) -> AppResult<RunnerTemplate> {
    let result = state.client.minhas_tarefas(user.token()).await;
    let mut tarefas = loaded(&state, &user, result, "tarefas").await?;

    let execution = match query.exec {
        Some(exec_id) => match open_execution(&state, &user, exec_id).await? {
            Some(exec) => {
                // The task list was fetched before a pending execution was started.
                if let Some(t) = tarefas.iter_mut().find(|t| t.id == exec.id) {
                    t.status_geral = exec.status_geral.clone();
                }
                let queue = queued_defects(&state, &user, exec.id).await;
                Some(execution_view(&exec, &queue))
            }
            None => None,
        },
        None => None,
    };

    let active = execution.as_ref().map(|e| e.id);
    let tasks = tarefas
        .iter()
        .map(|t| TaskRow {
            id: t.id,
            title: t.title(),
            status: t.status_geral.as_str().to_string(),
            status_label: t.status_geral.label().to_string(),
            active: Some(t.id) == active,
        })
        .collect();

    let severidades = Severidade::all()
        .into_iter()
        .map(|s| SelectOption::new(s.as_str(), s.label(), s == Severidade::Medio))
        .collect();

    Ok(RunnerTemplate {
        layout: page_layout(&state, &user, "Minhas Tarefas", "runner").await,
        tasks,
        execution,
        severidades,
    })
}

/// Loads the execution and step a step action targets. Closed executions are refused.
async fn editable_step(
    state: &SharedAppState,
    user: &CurrentUser,
    exec_id: i64,
    passo_id: i64,
) -> AppResult<Result<(ExecucaoTeste, ExecucaoPasso), Redirect>> {
    let result = state.client.get_execucao(user.token(), exec_id).await;
    let exec = match prefetch(state, user, result, "Erro ao carregar execução", &execution_url(exec_id)).await? {
        Ok(exec) => exec,
        Err(back) => return Ok(Err(back)),
    };
    if exec.status_geral.is_read_only() {
        let back = reject(state, user, "Esta execução está fechada.", &execution_url(exec_id)).await;
        return Ok(Err(back));
    }
    let passo = exec
        .passos_executados
        .iter()
        .find(|p| p.id == passo_id)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("passo {} da execução {}", passo_id, exec_id)))?;
    Ok(Ok((exec, passo)))
}

pub async fn approve_step(
    State(state): State<SharedAppState>,
    RequireTester(user): RequireTester,
    Path((exec_id, passo_id)): Path<(i64, i64)>,
) -> AppResult<Redirect> {
    if let Err(back) = editable_step(&state, &user, exec_id, passo_id).await? {
        return Ok(back);
    }

    replace_queued(&state, &user, exec_id, passo_id, None).await;
    let update = PassoUpdate {
        status: Some(PassoStatus::Aprovado),
        evidencias: Some(encode_evidence(&[])),
        ..Default::default()
    };
    if let Err(err) = state.client.update_passo(user.token(), passo_id, &update).await {
        if matches!(err, ApiError::Unauthorized) {
            return Err(AppError::Unauthorized);
        }
        tracing::warn!("approving step {} failed: {}", passo_id, err);
        notify(&state, &user, ToastKind::Error, format!("Erro ao salvar passo: {}", err)).await;
    }
    Ok(Redirect::to(&execution_url(exec_id)))
}

#[derive(Debug, Default, Deserialize)]
pub struct FailStepForm {
    #[serde(default)]
    pub titulo: String,
    #[serde(default)]
    pub descricao: String,
    #[serde(default)]
    pub severidade: String,
    /// Evidence URLs, one per line.
    #[serde(default)]
    pub evidencias: String,
}

pub async fn fail_step(
    State(state): State<SharedAppState>,
    RequireTester(user): RequireTester,
    Path((exec_id, passo_id)): Path<(i64, i64)>,
    Form(form): Form<FailStepForm>,
) -> AppResult<Redirect> {
    let Some(titulo) = non_empty(&form.titulo) else {
        return Ok(reject(&state, &user, "Informe o título do defeito.", &execution_url(exec_id)).await);
    };
    if let Err(back) = editable_step(&state, &user, exec_id, passo_id).await? {
        return Ok(back);
    }

    let evidencias = evidence_lines(&form.evidencias);
    let defect = QueuedDefect {
        passo_id,
        titulo,
        descricao: form.descricao.trim().to_string(),
        severidade: non_empty(&form.severidade)
            .map(Severidade::from)
            .unwrap_or(Severidade::Medio),
        evidencias: evidencias.clone(),
    };
    replace_queued(&state, &user, exec_id, passo_id, Some(defect)).await;

    let update = PassoUpdate {
        status: Some(PassoStatus::Reprovado),
        evidencias: Some(encode_evidence(&evidencias)),
        ..Default::default()
    };
    match state.client.update_passo(user.token(), passo_id, &update).await {
        Ok(()) => notify(&state, &user, ToastKind::Success, "Falha registrada localmente.").await,
        Err(ApiError::Unauthorized) => return Err(AppError::Unauthorized),
        Err(err) => {
            tracing::warn!("failing step {} failed: {}", passo_id, err);
            notify(&state, &user, ToastKind::Error, format!("Erro ao salvar passo: {}", err)).await;
        }
    }
    Ok(Redirect::to(&execution_url(exec_id)))
}

fn defect_payload(exec: &ExecucaoTeste, defect: &QueuedDefect) -> DefeitoPayload {
    let template = exec
        .passos_executados
        .iter()
        .find(|p| p.id == defect.passo_id)
        .and_then(|p| p.passo_template.as_ref());
    let acao = template
        .map(|t| t.acao.as_str())
        .unwrap_or("Ação desconhecida");
    let resultado = template
        .map(|t| t.resultado_esperado.as_str())
        .unwrap_or("Sem resultado esperado");

    DefeitoPayload {
        titulo: defect_title(&defect.titulo, acao, resultado),
        descricao: defect.descricao.clone(),
        evidencias: Some(encode_evidence(&defect.evidencias)),
        severidade: defect.severidade.clone(),
        status: DefeitoStatus::Aberto,
        execucao_teste_id: exec.id,
    }
}

pub async fn finish_execution(
    State(state): State<SharedAppState>,
    RequireTester(user): RequireTester,
    Path(exec_id): Path<i64>,
) -> AppResult<Redirect> {
    let back = execution_url(exec_id);
    let result = state.client.get_execucao(user.token(), exec_id).await;
    let exec = match prefetch(&state, &user, result, "Erro ao carregar execução", &back).await? {
        Ok(exec) => exec,
        Err(redirect) => return Ok(redirect),
    };

    if exec.status_geral.is_read_only() {
        return Ok(reject(&state, &user, "Esta execução já está fechada.", &back).await);
    }
    let pending = exec.pending_steps();
    if pending > 0 {
        let message = format!("Faltam {} passos para validar.", pending);
        return Ok(reject(&state, &user, &message, &back).await);
    }

    let queue = queued_defects(&state, &user, exec_id).await;
    for defect in &queue {
        let payload = defect_payload(&exec, defect);
        match state.client.create_defeito(user.token(), &payload).await {
            Ok(()) => replace_queued(&state, &user, exec_id, defect.passo_id, None).await,
            Err(ApiError::Unauthorized) => return Err(AppError::Unauthorized),
            Err(err) => {
                tracing::warn!("posting defect for step {} failed: {}", defect.passo_id, err);
                notify(&state, &user, ToastKind::Error, format!("Falha: {}", err)).await;
                return Ok(Redirect::to(&back));
            }
        }
    }

    match state
        .client
        .finalizar_execucao(user.token(), exec_id, &ExecucaoStatus::Fechado)
        .await
    {
        Ok(()) => {
            clear_queue(&state, &user, exec_id).await;
            tracing::info!("{} closed execution {} ({} defects)", user.user.username, exec_id, queue.len());
            notify(&state, &user, ToastKind::Success, "Tarefa fechada com sucesso!").await;
        }
        Err(ApiError::Unauthorized) => return Err(AppError::Unauthorized),
        Err(err) => {
            tracing::warn!("closing execution {} failed: {}", exec_id, err);
            notify(&state, &user, ToastKind::Error, format!("Falha: {}", err)).await;
        }
    }
    Ok(Redirect::to(&back))
}
