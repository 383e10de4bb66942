//! Admin screen integration tests.
//!
//! Tests for the registry screens (sistemas, módulos, projetos, ciclos,
//! casos, usuários), the dashboard and the audit log

use crate::common::{admin_server, location};
use axum::http::{Method, StatusCode};
use serde_json::json;

#[tokio::test]
async fn test_dashboard_shows_kpis_and_counts() {
    let (server, backend) = admin_server().await;

    let response = server.get("/admin").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let html = response.text();
    assert!(html.contains("<span class=\"kpi-value\">12</span>"));
    assert!(html.contains("Contas a Pagar"));
    assert_eq!(backend.calls_to(Method::GET, "/dashboard/").len(), 1);
}

#[tokio::test]
async fn test_dashboard_load_failure_still_renders() {
    let (server, backend) = admin_server().await;
    backend.fail(Method::GET, "/dashboard/", StatusCode::INTERNAL_SERVER_ERROR, "boom");

    let response = server.get("/admin").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert!(response.text().contains("Erro ao carregar"));
}

#[tokio::test]
async fn test_performance_team_view() {
    let (server, backend) = admin_server().await;

    let response = server.get("/admin/performance").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let html = response.text();
    assert!(html.contains("Performance da Equipe"));
    assert!(html.contains("<span class=\"kpi-value\">87.5%</span>"));
    assert!(html.contains("Velocidade da Equipe (30 dias)"));
    assert!(html.contains("Faturamento Web"));
    assert!(html.contains("Visão Geral (Equipe)"));
    assert!(html.contains("Tiago Tester"));
    assert!(html.contains("Dashboard: QA Team"));
    let calls = backend.calls_to(Method::GET, "/dashboard-runners/performance");
    assert_eq!(calls[0].path, "/dashboard-runners/performance");
}

#[tokio::test]
async fn test_performance_for_one_tester() {
    let (server, backend) = admin_server().await;

    let html = server.get("/admin/performance?user_id=5").await.text();

    assert!(html.contains("Performance: Tiago Tester"));
    assert!(html.contains("Caçador de Bugs"));
    assert!(html.contains("<span class=\"kpi-value\">95.5%</span>"));
    assert!(html.contains("Ritmo de Trabalho Individual"));
    let calls = backend.calls_to(Method::GET, "/dashboard-runners/performance");
    assert_eq!(calls[0].path, "/dashboard-runners/performance?user_id=5");
}

#[tokio::test]
async fn test_performance_load_failure_still_renders() {
    let (server, backend) = admin_server().await;
    backend.fail(
        Method::GET,
        "/dashboard-runners/performance",
        StatusCode::INTERNAL_SERVER_ERROR,
        "boom",
    );

    let response = server.get("/admin/performance?user_id=").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let html = response.text();
    assert!(html.contains("Erro ao carregar métricas de performance."));
    assert!(html.contains("Performance da Equipe"));
}

#[tokio::test]
async fn test_sistemas_list_and_search() {
    let (server, _backend) = admin_server().await;

    let html = server.get("/admin/sistemas").await.text();
    assert!(html.contains("Financeiro"));
    assert!(html.contains("Faturamento"));

    let filtered = server.get("/admin/sistemas?q=fatur").await.text();
    assert!(filtered.contains("Faturamento"));
    assert!(!filtered.contains("ERP financeiro"));
}

#[tokio::test]
async fn test_create_sistema() {
    let (server, backend) = admin_server().await;

    let response = server
        .post("/admin/sistemas")
        .form(&[("nome", "  Estoque "), ("descricao", "")])
        .await;
    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/admin/sistemas");

    let calls = backend.calls_to(Method::POST, "/sistemas/");
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0].body,
        json!({"nome": "Estoque", "descricao": null, "ativo": true})
    );

    let html = server.get("/admin/sistemas").await.text();
    assert!(html.contains("Sistema cadastrado com sucesso!"));
}

#[tokio::test]
async fn test_create_sistema_rejects_duplicate_name() {
    let (server, backend) = admin_server().await;

    let response = server
        .post("/admin/sistemas")
        .form(&[("nome", "FINANCEIRO"), ("descricao", "outro")])
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let html = response.text();
    assert!(html.contains("Já existe um Sistema com este nome."));
    assert!(html.contains("value=\"FINANCEIRO\""));
    assert!(backend.calls_to(Method::POST, "/sistemas/").is_empty());
}

#[tokio::test]
async fn test_update_sistema_keeps_its_own_name() {
    let (server, backend) = admin_server().await;

    let response = server
        .post("/admin/sistemas/1")
        .form(&[("nome", "Financeiro"), ("descricao", "ERP")])
        .await;

    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    let calls = backend.calls_to(Method::PUT, "/sistemas/1");
    assert_eq!(calls.len(), 1);
    assert!(calls[0].body.get("ativo").is_none());
}

#[tokio::test]
async fn test_toggle_sistema_flips_active_flag() {
    let (server, backend) = admin_server().await;

    server.post("/admin/sistemas/2/toggle").await;

    let calls = backend.calls_to(Method::PUT, "/sistemas/2");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].body, json!({"ativo": true}));
    assert!(server.get("/admin/sistemas").await.text().contains("Sistema ativado!"));
}

#[tokio::test]
async fn test_toggle_sistema_reports_list_failure() {
    let (server, backend) = admin_server().await;
    backend.fail(Method::GET, "/sistemas/", StatusCode::INTERNAL_SERVER_ERROR, "banco indisponível");

    let response = server.post("/admin/sistemas/1/toggle").await;

    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/admin/sistemas");
    assert!(backend.calls_to(Method::PUT, "/sistemas/").is_empty());
    let html = server.get("/admin/sistemas").await.text();
    assert!(html.contains("Erro ao alterar status: banco indisponível"));
}

#[tokio::test]
async fn test_delete_sistema_failure_is_reported() {
    let (server, backend) = admin_server().await;
    backend.fail(Method::DELETE, "/sistemas/1", StatusCode::CONFLICT, "Sistema possui módulos");

    let response = server.post("/admin/sistemas/1/delete").await;
    assert_eq!(location(&response), "/admin/sistemas");

    let html = server.get("/admin/sistemas").await.text();
    assert!(html.contains("Verifique se existem vínculos: Sistema possui módulos"));
}

#[tokio::test]
async fn test_modulo_duplicate_is_checked_per_sistema() {
    let (server, backend) = admin_server().await;

    let duplicate = server
        .post("/admin/modulos")
        .form(&[("sistema_id", "1"), ("nome", "contas a pagar"), ("ordem", "3")])
        .await;
    assert_eq!(duplicate.status_code(), StatusCode::OK);
    assert!(duplicate.text().contains("Já existe um módulo com este nome neste sistema."));

    let other_sistema = server
        .post("/admin/modulos")
        .form(&[("sistema_id", "2"), ("nome", "Contas a Pagar"), ("ordem", "3")])
        .await;
    assert_eq!(other_sistema.status_code(), StatusCode::SEE_OTHER);

    let calls = backend.calls_to(Method::POST, "/modulos/");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].body["sistema_id"], 2);
    assert_eq!(calls[0].body["ordem"], 3);
}

#[tokio::test]
async fn test_modulo_requires_sistema() {
    let (server, backend) = admin_server().await;

    let response = server
        .post("/admin/modulos")
        .form(&[("sistema_id", ""), ("nome", "Relatórios")])
        .await;

    assert!(response.text().contains("Por favor, selecione o Sistema Pai."));
    assert!(backend.calls_to(Method::POST, "/modulos/").is_empty());
}

#[tokio::test]
async fn test_projeto_modulo_must_belong_to_sistema() {
    let (server, backend) = admin_server().await;

    let response = server
        .post("/admin/projetos")
        .form(&[
            ("nome", "Portal 2"),
            ("status", "ativo"),
            ("sistema_id", "1"),
            ("modulo_id", "2"),
        ])
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert!(response.text().contains("O módulo selecionado não pertence ao sistema."));
    assert!(backend.calls_to(Method::POST, "/projetos/").is_empty());
}

#[tokio::test]
async fn test_create_projeto() {
    let (server, backend) = admin_server().await;

    let response = server
        .post("/admin/projetos")
        .form(&[
            ("nome", "Portal 2"),
            ("status", "pausado"),
            ("sistema_id", "1"),
            ("modulo_id", "1"),
            ("responsavel_id", "5"),
        ])
        .await;

    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    let calls = backend.calls_to(Method::POST, "/projetos/");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].body["status"], "pausado");
    assert_eq!(calls[0].body["modulo_id"], 1);
    assert_eq!(calls[0].body["responsavel_id"], 5);
}

#[tokio::test]
async fn test_projetos_list_resolves_names() {
    let (server, _backend) = admin_server().await;

    let html = server.get("/admin/projetos").await.text();

    assert!(html.contains("Portal do Cliente"));
    assert!(html.contains("Contas a Pagar"));
    assert!(html.contains("Tiago Tester"));
    assert!(html.contains("Pausado"));
}

#[tokio::test]
async fn test_ciclos_list_shows_period_and_progress() {
    let (server, _backend) = admin_server().await;

    let html = server.get("/admin/ciclos").await.text();

    assert!(html.contains("Sprint 1"));
    assert!(html.contains("06/01/2025 a 17/01/2025"));
    assert!(html.contains("25%"));
}

#[tokio::test]
async fn test_create_ciclo_posts_under_project() {
    let (server, backend) = admin_server().await;

    let missing = server
        .post("/admin/ciclos")
        .form(&[("nome", "Sprint 2"), ("projeto_id", "")])
        .await;
    assert!(missing.text().contains("Nome e Projeto são obrigatórios."));

    let response = server
        .post("/admin/ciclos")
        .form(&[
            ("nome", "Sprint 2"),
            ("projeto_id", "3"),
            ("data_inicio", "2025-02-03"),
            ("data_fim", "2025-02-14"),
            ("status", "planejado"),
        ])
        .await;
    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);

    let calls = backend.calls_to(Method::POST, "/testes/projetos/3/ciclos");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].body["data_inicio"], "2025-02-03");
    assert_eq!(calls[0].body["status"], "planejado");
}

#[tokio::test]
async fn test_casos_defaults_to_first_active_project() {
    let (server, _backend) = admin_server().await;

    let html = server.get("/admin/casos").await.text();

    assert!(html.contains("Login válido"));
    assert!(html.contains("<strong>senha</strong>"));
    assert!(html.contains("name=\"projeto_id\" value=\"3\""));
}

#[tokio::test]
async fn test_create_caso_numbers_steps() {
    let (server, backend) = admin_server().await;

    let response = server
        .post("/admin/casos")
        .form(&[
            ("projeto_id", "3"),
            ("nome", "Recuperar senha"),
            ("prioridade", "baixa"),
            ("ciclo_id", "7"),
            ("acao", "Abrir login"),
            ("resultado_esperado", "Link visível"),
            ("acao", ""),
            ("resultado_esperado", ""),
            ("acao", "Clicar no link"),
            ("resultado_esperado", "Formulário de e-mail"),
        ])
        .await;

    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/admin/casos?projeto=3");

    let calls = backend.calls_to(Method::POST, "/testes/projetos/3/casos");
    assert_eq!(calls.len(), 1);
    let body = &calls[0].body;
    assert_eq!(body["prioridade"], "baixa");
    assert_eq!(body["ciclo_id"], 7);
    assert_eq!(
        body["passos"],
        json!([
            {"ordem": 1, "acao": "Abrir login", "resultado_esperado": "Link visível"},
            {"ordem": 2, "acao": "Clicar no link", "resultado_esperado": "Formulário de e-mail"}
        ])
    );
}

#[tokio::test]
async fn test_create_caso_rejects_half_filled_step() {
    let (server, backend) = admin_server().await;

    let response = server
        .post("/admin/casos")
        .form(&[
            ("projeto_id", "3"),
            ("nome", "Recuperar senha"),
            ("acao", "Abrir login"),
            ("resultado_esperado", ""),
        ])
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let html = response.text();
    assert!(html.contains("Cada passo precisa de ação e resultado esperado."));
    assert!(html.contains("value=\"Abrir login\""));
    assert!(backend.calls_to(Method::POST, "/testes/projetos/3/casos").is_empty());
}

#[tokio::test]
async fn test_create_caso_blocked_on_paused_project() {
    let (server, backend) = admin_server().await;

    let response = server
        .post("/admin/casos")
        .form(&[
            ("projeto_id", "4"),
            ("nome", "Importar notas"),
            ("acao", "Enviar arquivo"),
            ("resultado_esperado", "Notas importadas"),
        ])
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert!(response.text().contains("Projeto PAUSADO. Criação bloqueada."));
    assert!(backend.calls_to(Method::POST, "/testes/projetos/4/casos").is_empty());
}

#[tokio::test]
async fn test_copy_caso_from_model() {
    let (server, _backend) = admin_server().await;

    let html = server.get("/admin/casos?projeto=3&copy=20").await.text();

    assert!(html.contains("value=\"Login válido (Cópia)\""));
    assert!(html.contains("value=\"Clicar em entrar\""));
    assert!(html.contains("action=\"/admin/casos\""));
}

#[tokio::test]
async fn test_delete_caso_returns_to_project() {
    let (server, backend) = admin_server().await;

    let response = server
        .post("/admin/casos/20/delete")
        .form(&[("projeto_id", "3")])
        .await;

    assert_eq!(location(&response), "/admin/casos?projeto=3");
    assert_eq!(backend.calls_to(Method::DELETE, "/testes/casos/20").len(), 1);
}

#[tokio::test]
async fn test_create_usuario_requires_password() {
    let (server, backend) = admin_server().await;

    let response = server
        .post("/admin/usuarios")
        .form(&[
            ("nome", "Bia"),
            ("email", "bia@qa.test"),
            ("senha", ""),
            ("nivel_acesso_id", "2"),
            ("ativo", "true"),
        ])
        .await;

    assert!(response.text().contains("Senha é obrigatória para novos usuários."));
    assert!(backend.calls_to(Method::POST, "/usuarios/").is_empty());
}

#[tokio::test]
async fn test_update_usuario_without_password_keeps_it() {
    let (server, backend) = admin_server().await;

    let response = server
        .post("/admin/usuarios/5")
        .form(&[
            ("nome", "Tiago Tester"),
            ("email", "tiago@qa.test"),
            ("senha", ""),
            ("nivel_acesso_id", "1"),
            ("ativo", "false"),
        ])
        .await;

    assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
    let calls = backend.calls_to(Method::PUT, "/usuarios/5");
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0].body,
        json!({"nome": "Tiago Tester", "email": "tiago@qa.test", "nivel_acesso_id": 1, "ativo": false})
    );
}

#[tokio::test]
async fn test_toggle_usuario() {
    let (server, backend) = admin_server().await;

    server.post("/admin/usuarios/5/toggle").await;

    let calls = backend.calls_to(Method::PUT, "/usuarios/5");
    assert_eq!(calls[0].body, json!({"ativo": false}));
    assert!(server.get("/admin/usuarios").await.text().contains("Usuário desativado!"));
}

#[tokio::test]
async fn test_logs_list_and_delete() {
    let (server, backend) = admin_server().await;

    let html = server.get("/admin/logs").await.text();
    assert!(html.contains("Financeiro criado"));
    assert!(html.contains("17/01/2025 10:00"));

    let response = server.post("/admin/logs/1/delete").await;
    assert_eq!(location(&response), "/admin/logs");
    assert_eq!(backend.calls_to(Method::DELETE, "/logs/1").len(), 1);
    assert!(server.get("/admin/logs").await.text().contains("Registro de log removido com sucesso."));
}
