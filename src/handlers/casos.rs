use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::Form;
use serde::Deserialize;

use super::{loaded, notify, page_layout, prefetch, report};
use crate::api::{CasoPayload, CasoTeste, CicloTeste, PassoTeste, Prioridade, ProjetoStatus, Usuario};
use crate::listing::{self, Page, non_empty, parse_id, truncate};
use crate::markdown;
use crate::session::{CurrentUser, RequireAdmin};
use crate::templates::{CasoForm, CasoRow, CasosTemplate, Pager, SelectOption, StepRow};
use crate::toast::ToastKind;
use crate::{AppResult, SharedAppState};

const BASE: &str = "/admin/casos";

#[derive(Debug, Default, Deserialize)]
pub struct CasosQuery {
    #[serde(default)]
    pub projeto: Option<i64>,
    #[serde(default)]
    pub q: String,
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub edit: Option<i64>,
    /// Prefills a new case from an existing one.
    #[serde(default)]
    pub copy: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CasoFormData {
    #[serde(default)]
    pub projeto_id: String,
    #[serde(default)]
    pub nome: String,
    #[serde(default)]
    pub descricao: String,
    #[serde(default)]
    pub pre_condicoes: String,
    #[serde(default)]
    pub criterios_aceitacao: String,
    #[serde(default)]
    pub prioridade: String,
    #[serde(default)]
    pub responsavel_id: String,
    #[serde(default)]
    pub ciclo_id: String,
    #[serde(default)]
    pub acao: Vec<String>,
    #[serde(default)]
    pub resultado_esperado: Vec<String>,
}

#[derive(Debug, Clone)]
struct Selection {
    prioridade: Prioridade,
    responsavel_id: Option<i64>,
    ciclo_id: Option<i64>,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            prioridade: Prioridade::Media,
            responsavel_id: None,
            ciclo_id: None,
        }
    }
}

fn blank_step() -> StepRow {
    StepRow {
        ordem: 1,
        acao: String::new(),
        resultado_esperado: String::new(),
    }
}

fn step_rows(passos: &[PassoTeste]) -> Vec<StepRow> {
    let mut sorted: Vec<&PassoTeste> = passos.iter().collect();
    sorted.sort_by_key(|p| p.ordem);
    let rows: Vec<StepRow> = sorted
        .into_iter()
        .enumerate()
        .map(|(i, p)| StepRow {
            ordem: i + 1,
            acao: p.acao.clone(),
            resultado_esperado: p.resultado_esperado.clone(),
        })
        .collect();
    if rows.is_empty() { vec![blank_step()] } else { rows }
}

/// Pairs the submitted step columns, drops blank rows and renumbers from 1.
///
/// A row with only one of the two columns filled is an error.
fn collect_steps(acoes: &[String], resultados: &[String]) -> Result<Vec<PassoTeste>, &'static str> {
    let mut passos = Vec::new();
    for i in 0..acoes.len().max(resultados.len()) {
        let acao = acoes.get(i).map(|s| s.trim()).unwrap_or_default();
        let resultado = resultados.get(i).map(|s| s.trim()).unwrap_or_default();
        match (acao.is_empty(), resultado.is_empty()) {
            (true, true) => continue,
            (false, false) => passos.push(PassoTeste {
                id: None,
                ordem: passos.len() as i64 + 1,
                acao: acao.to_string(),
                resultado_esperado: resultado.to_string(),
            }),
            _ => return Err("Cada passo precisa de ação e resultado esperado."),
        }
    }
    if passos.is_empty() {
        return Err("Preencha ao menos um passo.");
    }
    Ok(passos)
}

fn form_from(caso: &CasoTeste, editing: bool) -> (CasoForm, Selection) {
    let nome = if editing {
        caso.nome.clone()
    } else {
        format!("{} (Cópia)", caso.nome)
    };
    (
        CasoForm {
            editing_id: editing.then_some(caso.id),
            nome,
            descricao: caso.descricao.clone().unwrap_or_default(),
            pre_condicoes: caso.pre_condicoes.clone().unwrap_or_default(),
            criterios_aceitacao: caso.criterios_aceitacao.clone().unwrap_or_default(),
            passos: step_rows(&caso.passos),
        },
        Selection {
            prioridade: caso.prioridade.clone(),
            responsavel_id: if editing { caso.responsavel_id } else { None },
            ciclo_id: None,
        },
    )
}

fn selection_options(
    sel: &Selection,
    usuarios: &[Usuario],
    ciclos: &[CicloTeste],
) -> (Vec<SelectOption>, Vec<SelectOption>, Vec<SelectOption>) {
    let prioridades = Prioridade::all()
        .into_iter()
        .map(|p| SelectOption::new(p.as_str(), p.label(), p == sel.prioridade))
        .collect();
    let responsaveis = usuarios
        .iter()
        .filter(|u| u.ativo || Some(u.id) == sel.responsavel_id)
        .map(|u| SelectOption::new(u.id, truncate(&u.nome, 30), Some(u.id) == sel.responsavel_id))
        .collect();
    let ciclos = ciclos
        .iter()
        .map(|c| SelectOption::new(c.id, truncate(&c.nome, 30), Some(c.id) == sel.ciclo_id))
        .collect();
    (prioridades, responsaveis, ciclos)
}

async fn render(
    state: &SharedAppState,
    user: &CurrentUser,
    query: CasosQuery,
    draft: Option<(CasoForm, Selection)>,
) -> AppResult<CasosTemplate> {
    let token = user.token();
    let result = tokio::try_join!(state.client.list_projetos(token), state.client.list_usuarios(token));
    let (projetos, usuarios) = loaded(state, user, result, "dados básicos").await?;

    let projeto_id = query.projeto.or_else(|| {
        projetos
            .iter()
            .find(|p| p.status == ProjetoStatus::Ativo)
            .map(|p| p.id)
    });
    let projeto = projeto_id.and_then(|id| projetos.iter().find(|p| p.id == id));

    let (casos, ciclos) = match projeto_id {
        Some(id) => {
            let result = tokio::try_join!(
                state.client.list_casos_by_projeto(token, id),
                state.client.list_ciclos_by_projeto(token, id),
            );
            loaded(state, user, result, "casos de teste").await?
        }
        None => (Vec::new(), Vec::new()),
    };

    let (form, sel) = draft.unwrap_or_else(|| {
        let editing = query.edit.and_then(|id| casos.iter().find(|c| c.id == id));
        let template = query.copy.and_then(|id| casos.iter().find(|c| c.id == id));
        match (editing, template) {
            (Some(caso), _) => form_from(caso, true),
            (None, Some(caso)) => form_from(caso, false),
            (None, None) => (
                CasoForm {
                    editing_id: None,
                    nome: String::new(),
                    descricao: String::new(),
                    pre_condicoes: String::new(),
                    criterios_aceitacao: String::new(),
                    passos: vec![blank_step()],
                },
                Selection::default(),
            ),
        }
    });

    let modelos = casos
        .iter()
        .map(|c| SelectOption::new(c.id, truncate(&c.nome, 40), false))
        .collect();

    let responsavel_nome = |id: Option<i64>| {
        id.and_then(|id| usuarios.iter().find(|u| u.id == id))
            .map(|u| truncate(&u.nome, 20))
            .unwrap_or_else(|| "-".to_string())
    };

    let filtered = listing::filter(casos, &query.q, |c| {
        vec![c.nome.clone(), c.prioridade.as_str().to_string()]
    });
    let page = Page::paginate(filtered, query.page, state.config.page_size);
    let base = match projeto_id {
        Some(id) => format!("{}?projeto={}", BASE, id),
        None => BASE.to_string(),
    };
    let pager = Pager::new(&page, &base, &query.q);
    let rows = page
        .items
        .into_iter()
        .map(|c| CasoRow {
            selected: form.editing_id == Some(c.id),
            prioridade: c.prioridade.as_str().to_string(),
            prioridade_label: c.prioridade.label().to_string(),
            passos: c.passos.len(),
            responsavel_nome: responsavel_nome(c.responsavel_id),
            descricao_html: markdown::render_opt(c.descricao.as_deref()),
            pre_condicoes_html: markdown::render_opt(c.pre_condicoes.as_deref()),
            criterios_html: markdown::render_opt(c.criterios_aceitacao.as_deref()),
            id: c.id,
            nome: c.nome,
        })
        .collect();

    let projeto_opts = projetos
        .iter()
        .filter(|p| p.status == ProjetoStatus::Ativo || Some(p.id) == projeto_id)
        .map(|p| SelectOption::new(p.id, truncate(&p.nome, 40), Some(p.id) == projeto_id))
        .collect();
    let (prioridades, responsaveis, ciclo_opts) = selection_options(&sel, &usuarios, &ciclos);

    Ok(CasosTemplate {
        layout: page_layout(state, user, "Casos de Testes", "casos").await,
        q: query.q,
        projeto_id,
        projetos: projeto_opts,
        can_create: projeto.is_some_and(|p| p.status == ProjetoStatus::Ativo),
        modelos,
        rows,
        pager,
        form,
        prioridades,
        responsaveis,
        ciclos: ciclo_opts,
    })
}

pub async fn casos_page(
    State(state): State<SharedAppState>,
    RequireAdmin(user): RequireAdmin,
    Query(query): Query<CasosQuery>,
) -> AppResult<CasosTemplate> {
    render(&state, &user, query, None).await
}

async fn save(
    state: &SharedAppState,
    user: &CurrentUser,
    id: Option<i64>,
    data: CasoFormData,
) -> AppResult<Response> {
    let projeto_id = parse_id(&data.projeto_id);
    let sel = Selection {
        prioridade: non_empty(&data.prioridade)
            .map(Prioridade::from)
            .unwrap_or(Prioridade::Media),
        responsavel_id: parse_id(&data.responsavel_id),
        ciclo_id: parse_id(&data.ciclo_id),
    };
    let submitted_steps: Vec<StepRow> = (0..data.acao.len().max(data.resultado_esperado.len()))
        .map(|i| StepRow {
            ordem: i + 1,
            acao: data.acao.get(i).cloned().unwrap_or_default(),
            resultado_esperado: data.resultado_esperado.get(i).cloned().unwrap_or_default(),
        })
        .collect();
    let draft = CasoForm {
        editing_id: id,
        nome: data.nome.clone(),
        descricao: data.descricao.clone(),
        pre_condicoes: data.pre_condicoes.clone(),
        criterios_aceitacao: data.criterios_aceitacao.clone(),
        passos: if submitted_steps.is_empty() {
            vec![blank_step()]
        } else {
            submitted_steps
        },
    };
    let back = CasosQuery {
        projeto: projeto_id,
        ..Default::default()
    };

    let Some(projeto_id) = projeto_id else {
        notify(state, user, ToastKind::Error, "Selecione um projeto.").await;
        return Ok(render(state, user, back, Some((draft, sel))).await?.into_response());
    };
    if data.nome.trim().is_empty() {
        notify(state, user, ToastKind::Warning, "Título obrigatório.").await;
        return Ok(render(state, user, back, Some((draft, sel))).await?.into_response());
    }
    let passos = match collect_steps(&data.acao, &data.resultado_esperado) {
        Ok(passos) => passos,
        Err(warning) => {
            notify(state, user, ToastKind::Warning, warning).await;
            return Ok(render(state, user, back, Some((draft, sel))).await?.into_response());
        }
    };

    if id.is_none() {
        let result = state.client.get_projeto(user.token(), projeto_id).await;
        let failure = "Erro ao verificar projeto";
        let Ok(projeto) = prefetch(state, user, result, failure, BASE).await? else {
            return Ok(render(state, user, back, Some((draft, sel))).await?.into_response());
        };
        if projeto.status != ProjetoStatus::Ativo {
            let warning = format!(
                "Projeto {}. Criação bloqueada.",
                projeto.status.label().to_uppercase()
            );
            notify(state, user, ToastKind::Warning, warning).await;
            return Ok(render(state, user, back, Some((draft, sel))).await?.into_response());
        }
    }

    let payload = CasoPayload {
        nome: data.nome.trim().to_string(),
        descricao: non_empty(&data.descricao),
        pre_condicoes: non_empty(&data.pre_condicoes),
        criterios_aceitacao: non_empty(&data.criterios_aceitacao),
        prioridade: sel.prioridade.clone(),
        projeto_id,
        responsavel_id: sel.responsavel_id,
        ciclo_id: sel.ciclo_id,
        passos,
    };
    let saved = match id {
        Some(id) => {
            let result = state.client.update_caso(user.token(), id, &payload).await;
            report(state, user, result, "Cenário atualizado!", "Erro ao salvar").await?
        }
        None => {
            let result = state.client.create_caso(user.token(), &payload).await;
            report(state, user, result, "Cenário salvo!", "Erro ao salvar").await?
        }
    };

    if saved {
        Ok(Redirect::to(&format!("{}?projeto={}", BASE, projeto_id)).into_response())
    } else {
        Ok(render(state, user, back, Some((draft, sel))).await?.into_response())
    }
}

pub async fn create_caso(
    State(state): State<SharedAppState>,
    RequireAdmin(user): RequireAdmin,
    Form(data): Form<CasoFormData>,
) -> AppResult<Response> {
    save(&state, &user, None, data).await
}

pub async fn update_caso(
    State(state): State<SharedAppState>,
    RequireAdmin(user): RequireAdmin,
    Path(id): Path<i64>,
    Form(data): Form<CasoFormData>,
) -> AppResult<Response> {
    save(&state, &user, Some(id), data).await
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteCasoForm {
    #[serde(default)]
    pub projeto_id: String,
}

pub async fn delete_caso(
    State(state): State<SharedAppState>,
    RequireAdmin(user): RequireAdmin,
    Path(id): Path<i64>,
    Form(data): Form<DeleteCasoForm>,
) -> AppResult<Redirect> {
    let result = state.client.delete_caso(user.token(), id).await;
    report(&state, &user, result, "Cenário excluído.", "Erro ao excluir").await?;
    let to = match parse_id(&data.projeto_id) {
        Some(projeto_id) => format!("{}?projeto={}", BASE, projeto_id),
        None => BASE.to_string(),
    };
    Ok(Redirect::to(&to))
}
