//! QA team performance board: team-wide metrics, or one tester's.

use axum::extract::{Query, State};
use serde::Deserialize;

use super::dashboard::count_table;
use super::{loaded, page_layout};
use crate::api::{ChartPoint, RunnerPerformance, Usuario};
use crate::listing::parse_id;
use crate::session::RequireAdmin;
use crate::templates::{CountTable, Kpi, PerformanceTemplate, SelectOption};
use crate::{AppResult, SharedAppState};

const VELOCITY_COLOR: &str = "#3b82f6";
const OFFENDER_COLOR: &str = "#ef4444";

#[derive(Debug, Default, Deserialize)]
pub struct PerformanceQuery {
    /// Blank selects the team view.
    #[serde(default)]
    pub user_id: String,
}

fn with_color(points: Vec<ChartPoint>, color: &str) -> Vec<ChartPoint> {
    points
        .into_iter()
        .map(|p| ChartPoint {
            color: p.color.or_else(|| Some(color.to_string())),
            ..p
        })
        .collect()
}

fn team_kpis(perf: &RunnerPerformance) -> Vec<Kpi> {
    let stats = perf.stats_equipe.clone().unwrap_or_default();
    vec![
        Kpi::new("Taxa de Aprovação", format!("{}%", stats.taxa_aprovacao), "#10b981")
            .hint("Testes com sucesso vs falhas"),
        Kpi::new("Densidade de Defeitos", stats.densidade_defeitos, "#ef4444")
            .hint("Bugs encontrados por execução"),
        Kpi::new("Execuções Totais", stats.total_executions, "#3b82f6").hint("Volume total no período"),
        Kpi::new("Bugs Totais", stats.total_defects, "#f59e0b").hint("Total de defeitos reportados"),
    ]
}

fn tester_kpis(perf: &RunnerPerformance) -> Vec<Kpi> {
    let stats = perf.stats_testador.clone().unwrap_or_default();
    vec![
        Kpi::new("Caçador de Bugs", stats.bugs_reportados, "#ef4444").hint("Defeitos únicos reportados"),
        Kpi::new("Produtividade", stats.total_execucoes, "#3b82f6").hint("Casos de teste executados"),
        Kpi::new("Taxa de Bloqueio", format!("{}%", stats.taxa_bloqueio), "#f59e0b")
            .hint("% de testes impedidos"),
        // Everything that was not blocked counts as a clean run.
        Kpi::new("Rigor (Aprovações)", format!("{:.1}%", 100.0 - stats.taxa_bloqueio), "#10b981")
            .hint("Estimativa de fluxo limpo"),
    ]
}

fn build(perf: RunnerPerformance, individual: bool) -> (Vec<Kpi>, Vec<CountTable>) {
    let kpis = if individual {
        tester_kpis(&perf)
    } else {
        team_kpis(&perf)
    };
    let (velocity, rigor) = if individual {
        ("Ritmo de Trabalho Individual", "Perfil de Rigor")
    } else {
        ("Velocidade da Equipe (30 dias)", "Status Global")
    };
    let tables = vec![
        count_table(velocity, with_color(perf.grafico_velocidade, VELOCITY_COLOR)),
        count_table(rigor, perf.grafico_rigor),
        count_table(
            "Módulos Mais Críticos (Top Ofensores)",
            with_color(perf.grafico_top_modulos, OFFENDER_COLOR),
        ),
    ];
    (kpis, tables)
}

fn tester_options(usuarios: &[Usuario], selected: Option<i64>) -> Vec<SelectOption> {
    let team = SelectOption::new("", "Visão Geral (Equipe)", selected.is_none());
    std::iter::once(team)
        .chain(
            usuarios
                .iter()
                .map(|u| SelectOption::new(u.id, u.nome.as_str(), Some(u.id) == selected)),
        )
        .collect()
}

pub async fn performance_page(
    State(state): State<SharedAppState>,
    RequireAdmin(user): RequireAdmin,
    Query(query): Query<PerformanceQuery>,
) -> AppResult<PerformanceTemplate> {
    let selected = parse_id(&query.user_id);
    let token = user.token();
    let (usuarios, metrics) = tokio::join!(
        state.client.list_usuarios(token),
        state.client.runner_performance(token, selected)
    );
    let usuarios = loaded(&state, &user, usuarios, "lista de usuários").await?;
    let metrics = loaded(&state, &user, metrics, "métricas de performance").await?;

    let (title, subtitle) = match selected {
        Some(id) => {
            let nome = usuarios
                .iter()
                .find(|u| u.id == id)
                .map(|u| u.nome.clone())
                .unwrap_or_else(|| format!("Usuário #{}", id));
            (format!("Performance: {}", nome), "Análise individual de entrega e qualidade")
        }
        None => (
            "Performance da Equipe".to_string(),
            "Análise de saúde do produto e ritmo do time",
        ),
    };
    let (kpis, tables) = build(metrics, selected.is_some());

    Ok(PerformanceTemplate {
        layout: page_layout(&state, &user, "Dashboard: QA Team", "performance").await,
        title,
        subtitle,
        testers: tester_options(&usuarios, selected),
        kpis,
        tables,
    })
}
