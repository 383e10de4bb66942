//! Shared test utilities for integration tests.
//!
//! Each test gets its own in-process fake of the QA backend, listening on an
//! ephemeral port, plus a console [`TestServer`] pointed at it. The fake keeps
//! executions in memory so the runner flow can be driven end to end, and
//! records every call it receives.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Form, Json, Router};
use axum_test::{TestResponse, TestServer};
use qa_console::{AppState, Config, create_app};
use serde_json::{Value, json};

pub const PASSWORD: &str = "secret";
pub const ADMIN: &str = "admin@qa.test";
pub const TESTER: &str = "tiago@qa.test";
/// Logging in as this account yields a token the backend rejects on every call.
pub const EXPIRED: &str = "expired@qa.test";
pub const GOOD_RESET_TOKEN: &str = "good-token";

const EXPIRED_TOKEN: &str = "expired-token";

#[derive(Debug, Clone)]
pub struct Call {
    pub method: Method,
    /// Path below `/api/v1`, with the query string when there is one.
    pub path: String,
    pub body: Value,
}

#[derive(Default)]
struct Store {
    calls: Vec<Call>,
    execucoes: Vec<Value>,
    failures: HashMap<(Method, String), (StatusCode, String)>,
}

#[derive(Clone)]
pub struct FakeBackend {
    store: Arc<Mutex<Store>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        let store = Store {
            execucoes: vec![pending_execution(), closed_execution()],
            ..Default::default()
        };
        Self {
            store: Arc::new(Mutex::new(store)),
        }
    }

    /// Serves the fake on an ephemeral port and returns its API base URL.
    pub async fn spawn(&self) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new()
            .route("/api/v1/login/", post(login))
            .fallback(handle)
            .with_state(self.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/api/v1", addr)
    }

    /// Makes `method path` answer with `status` and a `{"detail": ...}` body.
    pub fn fail(&self, method: Method, path: &str, status: StatusCode, detail: &str) {
        self.store
            .lock()
            .unwrap()
            .failures
            .insert((method, path.to_string()), (status, detail.to_string()));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.store.lock().unwrap().calls.clone()
    }

    /// Calls whose method matches and whose path starts with `prefix`.
    pub fn calls_to(&self, method: Method, prefix: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.method == method && c.path.starts_with(prefix))
            .collect()
    }

    pub fn execucao(&self, id: i64) -> Value {
        self.store
            .lock()
            .unwrap()
            .execucoes
            .iter()
            .find(|e| e["id"] == id)
            .cloned()
            .unwrap_or(Value::Null)
    }

    fn record(&self, call: Call) {
        self.store.lock().unwrap().calls.push(call);
    }
}

/// A console server wired to a fresh fake backend. Cookies persist between requests.
pub async fn test_server() -> (TestServer, FakeBackend) {
    let backend = FakeBackend::new();
    let api_url = backend.spawn().await;
    let state = AppState::new(Config::for_backend(&api_url)).unwrap();
    let app = create_app(Arc::new(state));
    let mut server = TestServer::new(app).unwrap();
    server.do_save_cookies();
    (server, backend)
}

pub async fn login_as(server: &TestServer, username: &str) -> TestResponse {
    server
        .post("/login")
        .form(&[("username", username), ("password", PASSWORD)])
        .await
}

pub async fn admin_server() -> (TestServer, FakeBackend) {
    let (server, backend) = test_server().await;
    login_as(&server, ADMIN).await.assert_status(StatusCode::SEE_OTHER);
    (server, backend)
}

pub async fn tester_server() -> (TestServer, FakeBackend) {
    let (server, backend) = test_server().await;
    login_as(&server, TESTER).await.assert_status(StatusCode::SEE_OTHER);
    (server, backend)
}

pub fn location(response: &TestResponse) -> String {
    response
        .header("location")
        .to_str()
        .unwrap()
        .to_string()
}

// Fake backend handlers

async fn login(State(backend): State<FakeBackend>, Form(form): Form<HashMap<String, String>>) -> Response {
    let username = form.get("username").cloned().unwrap_or_default();
    backend.record(Call {
        method: Method::POST,
        path: "/login/".to_string(),
        body: json!({ "username": username }),
    });

    if form.get("password").map(String::as_str) != Some(PASSWORD) {
        return error(StatusCode::UNAUTHORIZED, "Email ou senha incorretos");
    }
    let token = match username.as_str() {
        EXPIRED => json!({"access_token": EXPIRED_TOKEN, "token_type": "bearer", "role": "user"}),
        ADMIN => json!({"access_token": "admin-token", "token_type": "bearer", "role": "admin", "nome": "Ana Admin"}),
        _ => json!({"access_token": "tester-token", "token_type": "bearer", "role": "user", "nome": "Tiago Tester"}),
    };
    Json(token).into_response()
}

async fn handle(
    State(backend): State<FakeBackend>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().trim_start_matches("/api/v1").to_string();
    let query = uri.query().unwrap_or_default().to_string();
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    backend.record(Call {
        method: method.clone(),
        path: if query.is_empty() {
            path.clone()
        } else {
            format!("{}?{}", path, query)
        },
        body: body.clone(),
    });

    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    if bearer == Some(EXPIRED_TOKEN) {
        return error(StatusCode::UNAUTHORIZED, "Could not validate credentials");
    }

    let failure = backend
        .store
        .lock()
        .unwrap()
        .failures
        .get(&(method.clone(), path.clone()))
        .cloned();
    if let Some((status, detail)) = failure {
        return error(status, &detail);
    }

    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    match (method.as_str(), segments.as_slice()) {
        ("GET", ["sistemas"]) => Json(sistemas()).into_response(),
        ("GET", ["modulos"]) => Json(modulos()).into_response(),
        ("GET", ["projetos"]) => Json(projetos()).into_response(),
        ("GET", ["projetos", id]) => find(projetos(), id),
        ("GET", ["usuarios"]) => Json(usuarios()).into_response(),
        ("GET", ["testes", "ciclos"]) => Json(ciclos()).into_response(),
        ("GET", ["testes", "projetos", "3", "ciclos"]) => Json(ciclos()).into_response(),
        ("GET", ["testes", "projetos", "3", "casos"]) => Json(casos()).into_response(),
        ("GET", ["testes", "projetos", _, _]) => Json(json!([])).into_response(),
        ("GET", ["defeitos"]) => Json(defeitos()).into_response(),
        ("GET", ["dashboard"]) => Json(dashboard()).into_response(),
        ("GET", ["dashboard-runners", "performance"]) => Json(performance(&query)).into_response(),
        ("GET", ["logs"]) => Json(logs()).into_response(),
        ("GET", ["testes", "minhas-tarefas"]) => {
            Json(Value::Array(backend.store.lock().unwrap().execucoes.clone())).into_response()
        }
        ("GET", ["testes", "execucoes", id]) => {
            let execucoes = Value::Array(backend.store.lock().unwrap().execucoes.clone());
            find(execucoes, id)
        }
        ("PUT", ["testes", "passos", id]) => {
            let id: i64 = id.parse().unwrap_or_default();
            let mut store = backend.store.lock().unwrap();
            for exec in store.execucoes.iter_mut() {
                if let Some(passos) = exec["passos_executados"].as_array_mut() {
                    for passo in passos.iter_mut().filter(|p| p["id"] == id) {
                        if let Some(status) = body.get("status") {
                            passo["status"] = status.clone();
                        }
                        if let Some(evidencias) = body.get("evidencias") {
                            passo["evidencias"] = evidencias.clone();
                        }
                    }
                }
            }
            Json(json!({"id": id})).into_response()
        }
        ("PUT", ["testes", "execucoes", id, "finalizar"]) => {
            let id: i64 = id.parse().unwrap_or_default();
            let status = query.strip_prefix("status=").unwrap_or_default().to_string();
            let mut store = backend.store.lock().unwrap();
            if let Some(exec) = store.execucoes.iter_mut().find(|e| e["id"] == id) {
                exec["status_geral"] = Value::String(status);
            }
            Json(json!({"id": id})).into_response()
        }
        ("GET", ["reset-password", "validate"]) => {
            if query == format!("token={}", GOOD_RESET_TOKEN) {
                Json(json!({"valid": true})).into_response()
            } else {
                error(StatusCode::BAD_REQUEST, "Token inválido ou expirado")
            }
        }
        ("GET", _) => error(StatusCode::NOT_FOUND, "Not Found"),
        ("DELETE", _) => StatusCode::NO_CONTENT.into_response(),
        _ => Json(json!({"id": 99})).into_response(),
    }
}

fn error(status: StatusCode, detail: &str) -> Response {
    (status, Json(json!({ "detail": detail }))).into_response()
}

fn find(items: Value, id: &str) -> Response {
    let id: i64 = id.parse().unwrap_or_default();
    items
        .as_array()
        .and_then(|items| items.iter().find(|i| i["id"] == id))
        .map(|item| Json(item.clone()).into_response())
        .unwrap_or_else(|| error(StatusCode::NOT_FOUND, "Registro não encontrado"))
}

// Fixtures

fn sistemas() -> Value {
    json!([
        {"id": 1, "nome": "Financeiro", "descricao": "ERP financeiro", "ativo": true},
        {"id": 2, "nome": "Faturamento", "descricao": null, "ativo": false}
    ])
}

fn modulos() -> Value {
    json!([
        {"id": 1, "nome": "Contas a Pagar", "descricao": "Títulos", "ordem": 1, "ativo": true, "sistema_id": 1},
        {"id": 2, "nome": "Notas Fiscais", "ordem": 2, "ativo": true, "sistema_id": 2}
    ])
}

fn projetos() -> Value {
    json!([
        {"id": 3, "nome": "Portal do Cliente", "status": "ativo", "sistema_id": 1, "modulo_id": 1, "responsavel_id": 5},
        {"id": 4, "nome": "Migração Legado", "status": "pausado", "sistema_id": 2, "modulo_id": 2}
    ])
}

fn usuarios() -> Value {
    json!([
        {"id": 1, "nome": "Ana Admin", "email": ADMIN, "nivel_acesso_id": 1, "ativo": true,
         "nivel_acesso": {"id": 1, "nome": "admin"}},
        {"id": 5, "nome": "Tiago Tester", "email": TESTER, "nivel_acesso_id": 2, "ativo": true}
    ])
}

fn ciclos() -> Value {
    json!([
        {"id": 7, "nome": "Sprint 1", "status": "em_execucao", "projeto_id": 3,
         "data_inicio": "2025-01-06", "data_fim": "2025-01-17", "total_testes": 4, "testes_concluidos": 1}
    ])
}

fn casos() -> Value {
    json!([
        {"id": 20, "nome": "Login válido", "prioridade": "alta", "projeto_id": 3, "responsavel_id": 5,
         "descricao": "Entrar com **senha** <script>alert(1)</script>",
         "passos": [
            {"id": 201, "ordem": 1, "acao": "Abrir a tela", "resultado_esperado": "Formulário exibido"},
            {"id": 202, "ordem": 2, "acao": "Clicar em entrar", "resultado_esperado": "Painel aberto"}
         ]}
    ])
}

fn defeitos() -> Value {
    json!([
        {"id": 30, "titulo": "Botão sem ação (DetalhesPasso: Clicar em entrar ||| Painel aberto)",
         "descricao": "Nada acontece", "evidencias": "[\"https://img.test/print.png\"]",
         "severidade": "critico", "status": "aberto", "execucao_teste_id": 11,
         "created_at": "2025-01-17T17:37:05",
         "execucao": {"id": 11, "ciclo_teste_id": 7, "caso_teste_id": 20,
                      "caso_teste": {"id": 20, "nome": "Login válido", "projeto_id": 3},
                      "responsavel": {"id": 5, "nome": "Tiago Tester"}}}
    ])
}

/// Team metrics, or a single tester's when the query carries `user_id`.
fn performance(query: &str) -> Value {
    if query.starts_with("user_id=") {
        json!({
            "stats_testador": {"bugs_reportados": 7, "total_execucoes": 21, "taxa_bloqueio": 4.5},
            "grafico_velocidade": [{"label": "Seg", "value": 3}, {"label": "Ter", "value": 5}],
            "grafico_rigor": [{"label": "Aprovados", "value": 18, "color": "#10b981"}],
            "grafico_top_modulos": [{"label": "Contas a Pagar", "value": 4}]
        })
    } else {
        json!({
            "stats_equipe": {"taxa_aprovacao": 87.5, "densidade_defeitos": 0.3,
                             "total_executions": 120, "total_defects": 36},
            "grafico_velocidade": [{"label": "01/02", "value": 12}],
            "grafico_rigor": [{"label": "Fechado", "value": 90, "color": "#10b981"}],
            "grafico_top_modulos": [{"label": "Faturamento Web", "value": 9}]
        })
    }
}

fn dashboard() -> Value {
    json!({
        "kpis": {"total_projetos": 2, "total_ciclos_ativos": 1, "total_casos_teste": 12, "total_defeitos_abertos": 3},
        "charts": {
            "status_execucao": [{"label": "passou", "value": 6}, {"label": "falhou", "value": 2}],
            "defeitos_por_severidade": [{"label": "critico", "value": 1, "color": "#b91c1c"}],
            "top_modulos_defeitos": [{"label": "Contas a Pagar", "value": 3}]
        }
    })
}

fn logs() -> Value {
    json!([
        {"id": 1, "usuario_nome": "Ana Admin", "sistema_nome": "Financeiro", "acao": "CREATE",
         "entidade": "sistema", "detalhes": "Financeiro criado", "created_at": "2025-01-17T10:00:00"}
    ])
}

fn pending_execution() -> Value {
    json!({
        "id": 10, "ciclo_teste_id": 7, "caso_teste_id": 20, "responsavel_id": 5, "status_geral": "pendente",
        "caso_teste": {"id": 20, "nome": "Login válido", "projeto_id": 3, "descricao": "Entrar no **portal**"},
        "passos_executados": [
            {"id": 101, "status": "pendente",
             "passo_template": {"ordem": 1, "acao": "Abrir a tela", "resultado_esperado": "Formulário exibido"}},
            {"id": 102, "status": "pendente",
             "passo_template": {"ordem": 2, "acao": "Clicar em entrar", "resultado_esperado": "Painel aberto"}}
        ]
    })
}

fn closed_execution() -> Value {
    json!({
        "id": 11, "ciclo_teste_id": 7, "caso_teste_id": 21, "responsavel_id": 5, "status_geral": "fechado",
        "caso_teste": {"id": 21, "nome": "Logout", "projeto_id": 3},
        "passos_executados": [
            {"id": 111, "status": "aprovado",
             "passo_template": {"ordem": 1, "acao": "Clicar em sair", "resultado_esperado": "Tela de login"}}
        ]
    })
}
