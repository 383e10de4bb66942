use axum::extract::State;

use crate::api::{ChartPoint, Dashboard};
use crate::session::RequireAdmin;
use crate::templates::{CountRow, CountTable, DashboardTemplate, Kpi};
use crate::{AppResult, SharedAppState};

const DEFAULT_COLOR: &str = "#6b7280";

/// Rows with their share of the table total, for the inline bars.
pub(crate) fn count_table(title: &'static str, points: Vec<ChartPoint>) -> CountTable {
    let total: i64 = points.iter().map(|p| p.value.max(0)).sum();
    let rows = points
        .into_iter()
        .map(|p| CountRow {
            percent: if total > 0 { p.value.max(0) * 100 / total } else { 0 },
            color: p.color.unwrap_or_else(|| DEFAULT_COLOR.to_string()),
            label: p.label,
            value: p.value,
        })
        .collect();
    CountTable { title, rows }
}

fn build(dashboard: Dashboard) -> (Vec<Kpi>, Vec<CountTable>) {
    let kpis = dashboard.kpis;
    let cards = vec![
        Kpi::new("Projetos Ativos", kpis.total_projetos, "#3b82f6"),
        Kpi::new("Ciclos em Execução", kpis.total_ciclos_ativos, "#8b5cf6"),
        Kpi::new("Casos de Teste", kpis.total_casos_teste, "#10b981"),
        Kpi::new("Defeitos Abertos", kpis.total_defeitos_abertos, "#ef4444"),
    ];

    let charts = dashboard.charts;
    let tables = vec![
        count_table("Status de Execução", charts.status_execucao),
        count_table("Defeitos por Severidade", charts.defeitos_por_severidade),
        count_table("Módulos com Mais Defeitos", charts.top_modulos_defeitos),
    ];
    (cards, tables)
}

pub async fn dashboard(
    State(state): State<SharedAppState>,
    RequireAdmin(user): RequireAdmin,
) -> AppResult<DashboardTemplate> {
    let result = state.client.dashboard(user.token()).await;
    let data = super::loaded(&state, &user, result, "dashboard").await?;
    let (kpis, tables) = build(data);

    Ok(DashboardTemplate {
        layout: super::page_layout(&state, &user, "Dashboard", "dashboard").await,
        kpis,
        tables,
    })
}
