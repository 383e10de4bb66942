//! Test runner integration tests.
//!
//! Drives an execution from the task list through step verdicts to closing,
//! checking what reaches the backend at each point

use crate::common::{location, tester_server};
use axum::http::{Method, StatusCode};

#[tokio::test]
async fn test_task_list() {
    let (server, _backend) = tester_server().await;

    let html = server.get("/qa/runner").await.text();

    assert!(html.contains("href=\"/qa/runner?exec=10\""));
    assert!(html.contains("Login válido"));
    assert!(html.contains("Logout"));
    assert!(html.contains("Selecione uma tarefa"));
}

#[tokio::test]
async fn test_opening_pending_execution_starts_it() {
    let (server, backend) = tester_server().await;

    let response = server.get("/qa/runner?exec=10").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let html = response.text();
    assert!(html.contains("Abrir a tela"));
    assert!(html.contains("Entrar no <strong>portal</strong>"));
    assert!(html.contains("/qa/runner/10/steps/101/approve"));

    let starts = backend.calls_to(Method::PUT, "/testes/execucoes/10/finalizar");
    assert_eq!(starts.len(), 1);
    assert_eq!(starts[0].path, "/testes/execucoes/10/finalizar?status=em_progresso");
    assert_eq!(backend.execucao(10)["status_geral"], "em_progresso");

    server.get("/qa/runner?exec=10").await;
    assert_eq!(
        backend.calls_to(Method::PUT, "/testes/execucoes/10/finalizar").len(),
        1
    );
}

#[tokio::test]
async fn test_finish_refused_while_steps_pending() {
    let (server, backend) = tester_server().await;

    let response = server.post("/qa/runner/10/finish").await;
    assert_eq!(location(&response), "/qa/runner?exec=10");

    let html = server.get("/qa/runner?exec=10").await.text();
    assert!(html.contains("Faltam 2 passos para validar."));
    assert!(backend.calls_to(Method::POST, "/defeitos/").is_empty());
}

#[tokio::test]
async fn test_full_execution_posts_queued_defect_then_closes() {
    let (server, backend) = tester_server().await;
    server.get("/qa/runner?exec=10").await;

    let approve = server.post("/qa/runner/10/steps/101/approve").await;
    assert_eq!(approve.status_code(), StatusCode::SEE_OTHER);
    let saved = backend.calls_to(Method::PUT, "/testes/passos/101");
    assert_eq!(saved[0].body["status"], "aprovado");
    assert_eq!(saved[0].body["evidencias"], "[]");

    let fail = server
        .post("/qa/runner/10/steps/102/fail")
        .form(&[
            ("titulo", "Painel não abre"),
            ("descricao", "Tela branca após login"),
            ("severidade", "alto"),
            ("evidencias", "https://img.test/a.png\n\n  https://img.test/b.png  "),
        ])
        .await;
    assert_eq!(location(&fail), "/qa/runner?exec=10");
    let saved = backend.calls_to(Method::PUT, "/testes/passos/102");
    assert_eq!(saved[0].body["status"], "reprovado");
    assert_eq!(
        saved[0].body["evidencias"],
        "[\"https://img.test/a.png\",\"https://img.test/b.png\"]"
    );
    // The defect waits in the session until the execution is finished.
    assert!(backend.calls_to(Method::POST, "/defeitos/").is_empty());

    let html = server.get("/qa/runner?exec=10").await.text();
    assert!(html.contains("Falha registrada localmente."));
    assert!(html.contains("Defeito pendente: Painel não abre (Alto)"));

    let finish = server.post("/qa/runner/10/finish").await;
    assert_eq!(location(&finish), "/qa/runner?exec=10");

    let defects = backend.calls_to(Method::POST, "/defeitos/");
    assert_eq!(defects.len(), 1);
    let body = &defects[0].body;
    assert_eq!(
        body["titulo"],
        "Painel não abre (DetalhesPasso: Clicar em entrar ||| Painel aberto)"
    );
    assert_eq!(body["severidade"], "alto");
    assert_eq!(body["status"], "aberto");
    assert_eq!(body["execucao_teste_id"], 10);

    let closes: Vec<_> = backend
        .calls_to(Method::PUT, "/testes/execucoes/10/finalizar")
        .into_iter()
        .map(|c| c.path)
        .collect();
    assert_eq!(
        closes.last().map(String::as_str),
        Some("/testes/execucoes/10/finalizar?status=fechado")
    );
    assert_eq!(backend.execucao(10)["status_geral"], "fechado");

    let html = server.get("/qa/runner?exec=10").await.text();
    assert!(html.contains("Tarefa fechada com sucesso!"));
    assert!(!html.contains("Defeito pendente"));
    assert!(!html.contains("/qa/runner/10/finish"));
}

#[tokio::test]
async fn test_approving_a_failed_step_drops_its_defect() {
    let (server, backend) = tester_server().await;
    server.get("/qa/runner?exec=10").await;

    server
        .post("/qa/runner/10/steps/102/fail")
        .form(&[("titulo", "Painel não abre"), ("severidade", "medio")])
        .await;
    server.post("/qa/runner/10/steps/102/approve").await;
    server.post("/qa/runner/10/steps/101/approve").await;
    server.post("/qa/runner/10/finish").await;

    assert!(backend.calls_to(Method::POST, "/defeitos/").is_empty());
    assert_eq!(backend.execucao(10)["status_geral"], "fechado");
}

#[tokio::test]
async fn test_failed_defect_post_keeps_queue_and_execution_open() {
    let (server, backend) = tester_server().await;
    backend.fail(Method::POST, "/defeitos/", StatusCode::INTERNAL_SERVER_ERROR, "Erro interno");
    server.get("/qa/runner?exec=10").await;

    server.post("/qa/runner/10/steps/101/approve").await;
    server
        .post("/qa/runner/10/steps/102/fail")
        .form(&[("titulo", "Painel não abre")])
        .await;
    server.post("/qa/runner/10/finish").await;

    assert_eq!(backend.execucao(10)["status_geral"], "em_progresso");
    let html = server.get("/qa/runner?exec=10").await.text();
    assert!(html.contains("Falha: Erro interno"));
    assert!(html.contains("Defeito pendente: Painel não abre"));
}

#[tokio::test]
async fn test_fail_requires_title() {
    let (server, backend) = tester_server().await;

    let response = server
        .post("/qa/runner/10/steps/102/fail")
        .form(&[("titulo", "  "), ("descricao", "sem título")])
        .await;

    assert_eq!(location(&response), "/qa/runner?exec=10");
    assert!(backend.calls_to(Method::PUT, "/testes/passos/").is_empty());
    let html = server.get("/qa/runner?exec=10").await.text();
    assert!(html.contains("Informe o título do defeito."));
}

#[tokio::test]
async fn test_closed_execution_is_read_only() {
    let (server, backend) = tester_server().await;

    let html = server.get("/qa/runner?exec=11").await.text();
    assert!(html.contains("Clicar em sair"));
    assert!(!html.contains("/qa/runner/11/steps/111/approve"));

    let response = server.post("/qa/runner/11/steps/111/approve").await;
    assert_eq!(location(&response), "/qa/runner?exec=11");
    assert!(backend.calls_to(Method::PUT, "/testes/passos/").is_empty());
    assert!(
        server
            .get("/qa/runner?exec=11")
            .await
            .text()
            .contains("Esta execução está fechada.")
    );
}

#[tokio::test]
async fn test_unknown_step_is_404() {
    let (server, _backend) = tester_server().await;
    server.get("/qa/runner?exec=10").await;

    let response = server.post("/qa/runner/10/steps/999/approve").await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_missing_execution_shows_error() {
    let (server, _backend) = tester_server().await;

    let response = server.get("/qa/runner?exec=404").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let html = response.text();
    assert!(html.contains("Erro ao carregar execução."));
    assert!(html.contains("Selecione uma tarefa"));
}

#[tokio::test]
async fn test_step_actions_report_execution_load_failure() {
    let (server, backend) = tester_server().await;
    backend.fail(
        Method::GET,
        "/testes/execucoes/10",
        StatusCode::INTERNAL_SERVER_ERROR,
        "banco indisponível",
    );

    let approve = server.post("/qa/runner/10/steps/101/approve").await;
    assert_eq!(approve.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(location(&approve), "/qa/runner?exec=10");

    let finish = server.post("/qa/runner/10/finish").await;
    assert_eq!(finish.status_code(), StatusCode::SEE_OTHER);
    assert_eq!(location(&finish), "/qa/runner?exec=10");

    assert!(backend.calls_to(Method::PUT, "/testes/passos/").is_empty());
    assert!(backend.calls_to(Method::PUT, "/testes/execucoes/").is_empty());
    let html = server.get("/qa/runner").await.text();
    assert!(html.contains("Erro ao carregar execução: banco indisponível"));
}
