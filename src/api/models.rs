//! JSON shapes of the records owned by the QA backend.
//!
//! The console never validates or derives anything from these beyond what a
//! screen needs to display, so every optional backend field stays optional here
//! and unknown enum values are kept verbatim instead of failing the page.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Declares a string-backed backend enum with a catch-all variant.
///
/// `wire` is the value the backend sends, `label` is what the console shows.
macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $wire:literal, $label:literal;)+ }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            $($variant,)+
            Other(String),
        }

        impl $name {
            /// Every known variant, in declaration order.
            pub fn all() -> Vec<$name> {
                vec![$($name::$variant),+]
            }

            pub fn as_str(&self) -> &str {
                match self {
                    $($name::$variant => $wire,)+
                    $name::Other(raw) => raw.as_str(),
                }
            }

            pub fn label(&self) -> &str {
                match self {
                    $($name::$variant => $label,)+
                    $name::Other(raw) => raw.as_str(),
                }
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                let known = match raw.as_str() {
                    $($wire => Some($name::$variant),)+
                    _ => None,
                };
                known.unwrap_or_else(|| $name::Other(raw))
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                $name::from(raw.to_string())
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.as_str().to_string()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }
    };
}

wire_enum!(
    /// Project lifecycle.
    ProjetoStatus {
        Ativo => "ativo", "Ativo";
        Pausado => "pausado", "Pausado";
        Finalizado => "finalizado", "Finalizado";
    }
);

wire_enum!(
    CicloStatus {
        Planejado => "planejado", "Planejado";
        EmExecucao => "em_execucao", "Em execução";
        Concluido => "concluido", "Concluído";
        Pausado => "pausado", "Pausado";
        Cancelado => "cancelado", "Cancelado";
        Erro => "erro", "Erro";
    }
);

wire_enum!(
    Prioridade {
        Alta => "alta", "Alta";
        Media => "media", "Média";
        Baixa => "baixa", "Baixa";
    }
);

wire_enum!(
    /// Overall state of a test execution. Transitions are decided by the backend.
    ExecucaoStatus {
        Pendente => "pendente", "Pendente";
        EmProgresso => "em_progresso", "Em progresso";
        Passou => "passou", "Passou";
        Falhou => "falhou", "Falhou";
        Bloqueado => "bloqueado", "Bloqueado";
        Fechado => "fechado", "Fechado";
        Reteste => "reteste", "Reteste";
    }
);

wire_enum!(
    PassoStatus {
        Pendente => "pendente", "Pendente";
        Aprovado => "aprovado", "Aprovado";
        Reprovado => "reprovado", "Reprovado";
        Bloqueado => "bloqueado", "Bloqueado";
    }
);

wire_enum!(
    DefeitoStatus {
        Aberto => "aberto", "Aberto";
        EmTeste => "em_teste", "Em teste";
        Corrigido => "corrigido", "Corrigido";
        Fechado => "fechado", "Fechado";
    }
);

wire_enum!(
    Severidade {
        Critico => "critico", "Crítico";
        Alto => "alto", "Alto";
        Medio => "medio", "Médio";
        Baixo => "baixo", "Baixo";
    }
);

impl Severidade {
    pub fn color(&self) -> &'static str {
        match self {
            Severidade::Critico => "#b91c1c",
            Severidade::Alto => "#ef4444",
            Severidade::Medio => "#f59e0b",
            _ => "#10b981",
        }
    }
}

impl Default for ProjetoStatus {
    fn default() -> Self {
        ProjetoStatus::Ativo
    }
}

impl Default for CicloStatus {
    fn default() -> Self {
        CicloStatus::Planejado
    }
}

impl Default for Prioridade {
    fn default() -> Self {
        Prioridade::Media
    }
}

impl Default for Severidade {
    fn default() -> Self {
        Severidade::Medio
    }
}

impl Default for DefeitoStatus {
    fn default() -> Self {
        DefeitoStatus::Aberto
    }
}

impl Default for PassoStatus {
    fn default() -> Self {
        PassoStatus::Pendente
    }
}

impl Default for ExecucaoStatus {
    fn default() -> Self {
        ExecucaoStatus::Pendente
    }
}

impl ExecucaoStatus {
    /// Closed executions can no longer be edited from the runner.
    pub fn is_read_only(&self) -> bool {
        *self == ExecucaoStatus::Fechado
    }
}

/// Response of `POST /login/`.
#[derive(Debug, Clone, Deserialize)]
pub struct Token {
    #[serde(alias = "token")]
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub nome: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sistema {
    pub id: i64,
    pub nome: String,
    #[serde(default)]
    pub descricao: Option<String>,
    #[serde(default = "default_true")]
    pub ativo: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Modulo {
    pub id: i64,
    pub nome: String,
    #[serde(default)]
    pub descricao: Option<String>,
    #[serde(default)]
    pub ordem: Option<i64>,
    #[serde(default = "default_true")]
    pub ativo: bool,
    pub sistema_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Projeto {
    pub id: i64,
    pub nome: String,
    #[serde(default)]
    pub descricao: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: ProjetoStatus,
    pub sistema_id: i64,
    pub modulo_id: i64,
    #[serde(default)]
    pub responsavel_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CicloTeste {
    pub id: i64,
    pub nome: String,
    #[serde(default)]
    pub descricao: Option<String>,
    #[serde(default)]
    pub data_inicio: Option<String>,
    #[serde(default)]
    pub data_fim: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: CicloStatus,
    pub projeto_id: i64,
    #[serde(default)]
    pub total_testes: i64,
    #[serde(default)]
    pub testes_concluidos: i64,
}

impl CicloTeste {
    pub fn progress_percent(&self) -> i64 {
        if self.total_testes > 0 {
            self.testes_concluidos * 100 / self.total_testes
        } else {
            0
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PassoTeste {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub ordem: i64,
    pub acao: String,
    pub resultado_esperado: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CasoTeste {
    pub id: i64,
    pub nome: String,
    #[serde(default)]
    pub descricao: Option<String>,
    #[serde(default)]
    pub pre_condicoes: Option<String>,
    #[serde(default)]
    pub criterios_aceitacao: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub prioridade: Prioridade,
    pub projeto_id: i64,
    #[serde(default)]
    pub responsavel_id: Option<i64>,
    #[serde(default)]
    pub passos: Vec<PassoTeste>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsuarioResumo {
    pub id: i64,
    pub nome: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecucaoPasso {
    pub id: i64,
    #[serde(default)]
    pub execucao_teste_id: Option<i64>,
    #[serde(default)]
    pub passo_caso_teste_id: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: PassoStatus,
    #[serde(default)]
    pub resultado_obtido: Option<String>,
    #[serde(default)]
    pub evidencias: Option<String>,
    #[serde(default)]
    pub passo_template: Option<PassoTeste>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecucaoTeste {
    pub id: i64,
    pub ciclo_teste_id: i64,
    pub caso_teste_id: i64,
    #[serde(default)]
    pub responsavel_id: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status_geral: ExecucaoStatus,
    #[serde(default)]
    pub caso_teste: Option<CasoTeste>,
    #[serde(default)]
    pub responsavel: Option<UsuarioResumo>,
    #[serde(default)]
    pub passos_executados: Vec<ExecucaoPasso>,
}

impl ExecucaoTeste {
    pub fn title(&self) -> String {
        self.caso_teste
            .as_ref()
            .map(|c| c.nome.clone())
            .unwrap_or_else(|| format!("Execução #{}", self.id))
    }

    /// Steps that still have no verdict.
    pub fn pending_steps(&self) -> usize {
        self.passos_executados
            .iter()
            .filter(|p| p.status == PassoStatus::Pendente)
            .count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Defeito {
    pub id: i64,
    pub titulo: String,
    #[serde(default)]
    pub descricao: String,
    #[serde(default)]
    pub evidencias: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub severidade: Severidade,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: DefeitoStatus,
    pub execucao_teste_id: i64,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub execucao: Option<ExecucaoTeste>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NivelAcesso {
    pub id: i64,
    pub nome: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usuario {
    pub id: i64,
    pub nome: String,
    #[serde(default)]
    pub username: Option<String>,
    pub email: String,
    pub nivel_acesso_id: i64,
    #[serde(default = "default_true")]
    pub ativo: bool,
    #[serde(default)]
    pub nivel_acesso: Option<NivelAcesso>,
}

impl Usuario {
    pub fn role_name(&self) -> String {
        match &self.nivel_acesso {
            Some(nivel) => nivel.nome.clone(),
            None if self.nivel_acesso_id == ADMIN_LEVEL_ID => "admin".to_string(),
            None => "user".to_string(),
        }
    }
}

/// Access level ids as seeded by the backend.
pub const ADMIN_LEVEL_ID: i64 = 1;
pub const USER_LEVEL_ID: i64 = 2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: i64,
    #[serde(default)]
    pub usuario_nome: Option<String>,
    #[serde(default)]
    pub sistema_nome: Option<String>,
    pub acao: String,
    pub entidade: String,
    #[serde(default)]
    pub detalhes: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardKpis {
    pub total_projetos: i64,
    pub total_ciclos_ativos: i64,
    pub total_casos_teste: i64,
    pub total_defeitos_abertos: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartPoint {
    pub label: String,
    pub value: i64,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardCharts {
    #[serde(default)]
    pub status_execucao: Vec<ChartPoint>,
    #[serde(default)]
    pub defeitos_por_severidade: Vec<ChartPoint>,
    #[serde(default)]
    pub top_modulos_defeitos: Vec<ChartPoint>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dashboard {
    pub kpis: DashboardKpis,
    #[serde(default)]
    pub charts: DashboardCharts,
}

/// Team-wide figures of the runner performance board.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatsEquipe {
    #[serde(default)]
    pub taxa_aprovacao: f64,
    #[serde(default)]
    pub densidade_defeitos: f64,
    #[serde(default)]
    pub total_executions: i64,
    #[serde(default)]
    pub total_defects: i64,
}

/// Figures for a single tester.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatsTestador {
    #[serde(default)]
    pub bugs_reportados: i64,
    #[serde(default)]
    pub total_execucoes: i64,
    #[serde(default)]
    pub taxa_bloqueio: f64,
}

/// `GET /dashboard-runners/performance`. Only the block matching the
/// requested view (team or one tester) is expected to be filled.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunnerPerformance {
    #[serde(default)]
    pub stats_equipe: Option<StatsEquipe>,
    #[serde(default)]
    pub stats_testador: Option<StatsTestador>,
    #[serde(default)]
    pub grafico_velocidade: Vec<ChartPoint>,
    #[serde(default)]
    pub grafico_rigor: Vec<ChartPoint>,
    #[serde(default)]
    pub grafico_top_modulos: Vec<ChartPoint>,
}

// Request payloads

#[derive(Debug, Clone, Serialize)]
pub struct SistemaPayload {
    pub nome: String,
    pub descricao: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ativo: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModuloPayload {
    pub nome: String,
    pub descricao: Option<String>,
    pub ordem: Option<i64>,
    pub sistema_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ativo: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjetoPayload {
    pub nome: String,
    pub descricao: Option<String>,
    pub status: ProjetoStatus,
    pub sistema_id: i64,
    pub modulo_id: i64,
    pub responsavel_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CicloPayload {
    pub nome: String,
    pub descricao: Option<String>,
    pub data_inicio: Option<String>,
    pub data_fim: Option<String>,
    pub status: CicloStatus,
    pub projeto_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CasoPayload {
    pub nome: String,
    pub descricao: Option<String>,
    pub pre_condicoes: Option<String>,
    pub criterios_aceitacao: Option<String>,
    pub prioridade: Prioridade,
    pub projeto_id: i64,
    pub responsavel_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ciclo_id: Option<i64>,
    pub passos: Vec<PassoTeste>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UsuarioPayload {
    pub nome: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub senha: Option<String>,
    pub nivel_acesso_id: i64,
    pub ativo: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DefeitoPayload {
    pub titulo: String,
    pub descricao: String,
    pub evidencias: Option<String>,
    pub severidade: Severidade,
    pub status: DefeitoStatus,
    pub execucao_teste_id: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PassoUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PassoStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resultado_obtido: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidencias: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Treats an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
