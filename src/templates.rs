use askama::Template;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};

use crate::listing::{Page, list_url};
use crate::session::{CurrentUser, Role};
use crate::toast::Toast;

/// Formats a backend timestamp as `dd/mm/yyyy hh:mm`; `-` when missing.
pub fn format_datetime(raw: Option<&str>) -> String {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return "-".to_string();
    };
    let display = format_description!("[day]/[month]/[year] [hour]:[minute]");

    if let Ok(dt) = OffsetDateTime::parse(raw, &Rfc3339) {
        return dt.format(&display).unwrap_or_else(|_| raw.to_string());
    }
    // Naive timestamps, with or without fractional seconds.
    let naive = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
    if let Some(prefix) = raw.get(..19)
        && let Ok(dt) = PrimitiveDateTime::parse(prefix, &naive)
    {
        return dt.format(&display).unwrap_or_else(|_| raw.to_string());
    }
    if let Some(date) = parse_date(raw) {
        let date_only = format_description!("[day]/[month]/[year]");
        return date.format(&date_only).unwrap_or_else(|_| raw.to_string());
    }
    raw.to_string()
}

/// Value for an `<input type="date">`: `yyyy-mm-dd`, or empty.
pub fn date_input(raw: Option<&str>) -> String {
    raw.and_then(parse_date)
        .map(|d| d.to_string())
        .unwrap_or_default()
}

fn parse_date(raw: &str) -> Option<Date> {
    let format = format_description!("[year]-[month]-[day]");
    Date::parse(raw.trim().get(..10)?, &format).ok()
}

pub struct NavLink {
    pub href: &'static str,
    pub label: &'static str,
    pub active: bool,
}

pub struct NavSection {
    pub title: &'static str,
    pub links: Vec<NavLink>,
}

fn nav_for(role: Role, active: &str) -> Vec<NavSection> {
    let link = |href: &'static str, label: &'static str, key: &str| NavLink {
        href,
        label,
        active: key == active,
    };
    match role {
        Role::Admin => vec![
            NavSection {
                title: "ADMINISTRAÇÃO",
                links: vec![
                    link("/admin", "Dashboard", "dashboard"),
                    link("/admin/performance", "Dashboard: QA Team", "performance"),
                    link("/admin/usuarios", "Acessos", "usuarios"),
                    link("/admin/logs", "Logs", "logs"),
                ],
            },
            NavSection {
                title: "ESTRUTURA",
                links: vec![
                    link("/admin/sistemas", "Sistemas", "sistemas"),
                    link("/admin/modulos", "Módulos", "modulos"),
                    link("/admin/projetos", "Projetos", "projetos"),
                ],
            },
            NavSection {
                title: "PLANEJAMENTO",
                links: vec![
                    link("/admin/ciclos", "Ciclos", "ciclos"),
                    link("/admin/casos", "Casos de Testes", "casos"),
                ],
            },
            NavSection {
                title: "MONITORAMENTO",
                links: vec![link("/qa/defeitos", "Gestão de Defeitos", "defeitos")],
            },
        ],
        Role::User => vec![
            NavSection {
                title: "MINHA ÁREA",
                links: vec![link("/qa/runner", "Minhas Tarefas", "runner")],
            },
            NavSection {
                title: "QUALIDADE",
                links: vec![link("/qa/defeitos", "Meus Reportes", "defeitos")],
            },
        ],
    }
}

/// Chrome shared by every page: title, navigation, signed-in user and toasts.
pub struct Layout {
    pub app_name: String,
    pub app_version: String,
    pub page_title: String,
    pub logged_in: bool,
    pub is_admin: bool,
    pub user_nome: String,
    pub home: &'static str,
    pub nav: Vec<NavSection>,
    pub toasts: Vec<Toast>,
}

impl Layout {
    pub fn public(state: &crate::AppState, page_title: &str, toasts: Vec<Toast>) -> Self {
        Self {
            app_name: state.app_name.clone(),
            app_version: state.app_version.clone(),
            page_title: page_title.to_string(),
            logged_in: false,
            is_admin: false,
            user_nome: String::new(),
            home: "/",
            nav: Vec::new(),
            toasts,
        }
    }

    pub fn for_user(
        state: &crate::AppState,
        user: &CurrentUser,
        page_title: &str,
        active_nav: &str,
        toasts: Vec<Toast>,
    ) -> Self {
        Self {
            logged_in: true,
            is_admin: user.is_admin(),
            user_nome: user.user.nome.clone(),
            home: user.user.role.home(),
            nav: nav_for(user.user.role, active_nav),
            ..Self::public(state, page_title, toasts)
        }
    }
}

pub struct PagerLink {
    pub number: usize,
    pub current: bool,
    pub href: String,
}

pub struct Pager {
    pub links: Vec<PagerLink>,
    pub prev_href: Option<String>,
    pub next_href: Option<String>,
    pub total_items: usize,
}

impl Pager {
    pub fn new<T>(page: &Page<T>, base: &str, q: &str) -> Self {
        Self {
            links: page
                .links()
                .into_iter()
                .map(|l| PagerLink {
                    href: list_url(base, q, l.number),
                    number: l.number,
                    current: l.current,
                })
                .collect(),
            prev_href: page.has_prev().then(|| list_url(base, q, page.prev())),
            next_href: page.has_next().then(|| list_url(base, q, page.next())),
            total_items: page.total_items,
        }
    }

    pub fn show(&self) -> bool {
        self.links.len() > 1
    }
}

pub struct SelectOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
    /// Parent id, used client-side to narrow dependent selects.
    pub group: String,
}

impl SelectOption {
    pub fn new(value: impl ToString, label: impl Into<String>, selected: bool) -> Self {
        Self {
            value: value.to_string(),
            label: label.into(),
            selected,
            group: String::new(),
        }
    }

    pub fn grouped(mut self, group: impl ToString) -> Self {
        self.group = group.to_string();
        self
    }
}

// Public pages

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub layout: Layout,
    pub username: String,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "forgot_password.html")]
pub struct ForgotPasswordTemplate {
    pub layout: Layout,
    pub email: String,
}

#[derive(Template)]
#[template(path = "reset_password.html")]
pub struct ResetPasswordTemplate {
    pub layout: Layout,
    pub token: String,
}

// Dashboard

pub struct Kpi {
    pub label: &'static str,
    /// Already formatted (`12`, `85.5%`).
    pub value: String,
    pub color: &'static str,
    pub hint: &'static str,
}

impl Kpi {
    pub fn new(label: &'static str, value: impl ToString, color: &'static str) -> Self {
        Self {
            label,
            value: value.to_string(),
            color,
            hint: "",
        }
    }

    pub fn hint(mut self, hint: &'static str) -> Self {
        self.hint = hint;
        self
    }
}

pub struct CountRow {
    pub label: String,
    pub value: i64,
    pub color: String,
    pub percent: i64,
}

pub struct CountTable {
    pub title: &'static str,
    pub rows: Vec<CountRow>,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub layout: Layout,
    pub kpis: Vec<Kpi>,
    pub tables: Vec<CountTable>,
}

#[derive(Template)]
#[template(path = "admin/performance.html")]
pub struct PerformanceTemplate {
    pub layout: Layout,
    pub title: String,
    pub subtitle: &'static str,
    /// Team view first, then one entry per tester.
    pub testers: Vec<SelectOption>,
    pub kpis: Vec<Kpi>,
    pub tables: Vec<CountTable>,
}

// Sistemas

pub struct SistemaRow {
    pub id: i64,
    pub nome: String,
    pub descricao: String,
    pub ativo: bool,
    pub selected: bool,
}

pub struct SistemaForm {
    pub editing_id: Option<i64>,
    pub nome: String,
    pub descricao: String,
}

#[derive(Template)]
#[template(path = "admin/sistemas.html")]
pub struct SistemasTemplate {
    pub layout: Layout,
    pub q: String,
    pub rows: Vec<SistemaRow>,
    pub pager: Pager,
    pub form: SistemaForm,
}

// Modulos

pub struct ModuloRow {
    pub id: i64,
    pub nome: String,
    pub descricao: String,
    pub sistema_nome: String,
    pub ordem: String,
    pub ativo: bool,
    pub selected: bool,
}

pub struct ModuloForm {
    pub editing_id: Option<i64>,
    pub nome: String,
    pub descricao: String,
    pub ordem: String,
}

#[derive(Template)]
#[template(path = "admin/modulos.html")]
pub struct ModulosTemplate {
    pub layout: Layout,
    pub q: String,
    pub rows: Vec<ModuloRow>,
    pub pager: Pager,
    pub form: ModuloForm,
    pub sistemas: Vec<SelectOption>,
}

// Projetos

pub struct ProjetoRow {
    pub id: i64,
    pub nome: String,
    pub sistema_nome: String,
    pub modulo_nome: String,
    pub responsavel_nome: String,
    pub status: String,
    pub status_label: String,
    pub selected: bool,
}

pub struct ProjetoForm {
    pub editing_id: Option<i64>,
    pub nome: String,
    pub descricao: String,
}

#[derive(Template)]
#[template(path = "admin/projetos.html")]
pub struct ProjetosTemplate {
    pub layout: Layout,
    pub q: String,
    pub rows: Vec<ProjetoRow>,
    pub pager: Pager,
    pub form: ProjetoForm,
    pub statuses: Vec<SelectOption>,
    pub sistemas: Vec<SelectOption>,
    pub modulos: Vec<SelectOption>,
    pub responsaveis: Vec<SelectOption>,
}

// Ciclos

pub struct CicloRow {
    pub id: i64,
    pub nome: String,
    pub projeto_nome: String,
    pub periodo: String,
    pub status: String,
    pub status_label: String,
    pub progress: i64,
    pub selected: bool,
}

pub struct CicloForm {
    pub editing_id: Option<i64>,
    pub nome: String,
    pub descricao: String,
    pub data_inicio: String,
    pub data_fim: String,
}

#[derive(Template)]
#[template(path = "admin/ciclos.html")]
pub struct CiclosTemplate {
    pub layout: Layout,
    pub q: String,
    pub rows: Vec<CicloRow>,
    pub pager: Pager,
    pub form: CicloForm,
    pub projetos: Vec<SelectOption>,
    pub statuses: Vec<SelectOption>,
    pub projeto_locked: bool,
}

// Casos de teste

pub struct CasoRow {
    pub id: i64,
    pub nome: String,
    pub prioridade: String,
    pub prioridade_label: String,
    pub passos: usize,
    pub responsavel_nome: String,
    pub descricao_html: String,
    pub pre_condicoes_html: String,
    pub criterios_html: String,
    pub selected: bool,
}

pub struct StepRow {
    pub ordem: usize,
    pub acao: String,
    pub resultado_esperado: String,
}

pub struct CasoForm {
    pub editing_id: Option<i64>,
    pub nome: String,
    pub descricao: String,
    pub pre_condicoes: String,
    pub criterios_aceitacao: String,
    pub passos: Vec<StepRow>,
}

#[derive(Template)]
#[template(path = "admin/casos.html")]
pub struct CasosTemplate {
    pub layout: Layout,
    pub q: String,
    pub projeto_id: Option<i64>,
    pub projetos: Vec<SelectOption>,
    /// False when the selected project is paused or finished.
    pub can_create: bool,
    pub modelos: Vec<SelectOption>,
    pub rows: Vec<CasoRow>,
    pub pager: Pager,
    pub form: CasoForm,
    pub prioridades: Vec<SelectOption>,
    pub responsaveis: Vec<SelectOption>,
    pub ciclos: Vec<SelectOption>,
}

// Usuarios

pub struct UsuarioRow {
    pub id: i64,
    pub nome: String,
    pub email: String,
    pub role: String,
    pub ativo: bool,
    pub selected: bool,
}

pub struct UsuarioForm {
    pub editing_id: Option<i64>,
    pub nome: String,
    pub email: String,
    pub ativo: bool,
}

#[derive(Template)]
#[template(path = "admin/usuarios.html")]
pub struct UsuariosTemplate {
    pub layout: Layout,
    pub q: String,
    pub rows: Vec<UsuarioRow>,
    pub pager: Pager,
    pub form: UsuarioForm,
    pub niveis: Vec<SelectOption>,
}

// Logs

pub struct LogRow {
    pub id: i64,
    pub quando: String,
    pub usuario: String,
    pub sistema: String,
    pub acao: String,
    pub entidade: String,
    pub detalhes: String,
}

#[derive(Template)]
#[template(path = "admin/logs.html")]
pub struct LogsTemplate {
    pub layout: Layout,
    pub q: String,
    pub rows: Vec<LogRow>,
    pub pager: Pager,
}

// Defeitos

pub struct DefeitoRow {
    pub id: i64,
    pub titulo: String,
    pub passo_acao: String,
    pub passo_resultado: String,
    pub caso_nome: String,
    pub responsavel: String,
    pub descricao_html: String,
    pub severidade_label: String,
    pub severidade_color: &'static str,
    pub status: String,
    pub status_label: String,
    pub criado_em: String,
    pub evidencias: Vec<String>,
    pub status_options: Vec<SelectOption>,
}

#[derive(Template)]
#[template(path = "defeitos.html")]
pub struct DefeitosTemplate {
    pub layout: Layout,
    pub q: String,
    pub rows: Vec<DefeitoRow>,
    pub pager: Pager,
}

// Runner

pub struct TaskRow {
    pub id: i64,
    pub title: String,
    pub status: String,
    pub status_label: String,
    pub active: bool,
}

pub struct QueuedDefectView {
    pub titulo: String,
    pub severidade_label: String,
}

pub struct StepView {
    pub id: i64,
    pub ordem: i64,
    pub acao: String,
    pub resultado_esperado: String,
    pub status: String,
    pub status_label: String,
    pub evidencias: Vec<String>,
    pub queued_defect: Option<QueuedDefectView>,
}

pub struct ExecutionView {
    pub id: i64,
    pub title: String,
    pub status_label: String,
    pub read_only: bool,
    pub descricao_html: String,
    pub pre_condicoes_html: String,
    pub steps: Vec<StepView>,
    pub pending: usize,
    pub queued: usize,
}

#[derive(Template)]
#[template(path = "runner.html")]
pub struct RunnerTemplate {
    pub layout: Layout,
    pub tasks: Vec<TaskRow>,
    pub execution: Option<ExecutionView>,
    pub severidades: Vec<SelectOption>,
}
