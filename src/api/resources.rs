use reqwest::Method;
use serde_json::json;

use super::models::*;
use super::{Client, Result};

impl Client {
    // Sistemas

    pub async fn list_sistemas(&self, token: &str) -> Result<Vec<Sistema>> {
        self.get_list("/sistemas/", token).await
    }

    pub async fn create_sistema(&self, token: &str, payload: &SistemaPayload) -> Result<()> {
        self.post("/sistemas/", Some(token), payload).await?;
        Ok(())
    }

    pub async fn update_sistema(&self, token: &str, id: i64, payload: &SistemaPayload) -> Result<()> {
        self.put(&format!("/sistemas/{}", id), token, Some(payload)).await?;
        Ok(())
    }

    pub async fn set_sistema_active(&self, token: &str, id: i64, ativo: bool) -> Result<()> {
        self.put(&format!("/sistemas/{}", id), token, Some(&json!({ "ativo": ativo })))
            .await?;
        Ok(())
    }

    pub async fn delete_sistema(&self, token: &str, id: i64) -> Result<()> {
        self.delete(&format!("/sistemas/{}", id), token).await
    }

    // Modulos

    pub async fn list_modulos(&self, token: &str) -> Result<Vec<Modulo>> {
        self.get_list("/modulos/", token).await
    }

    pub async fn create_modulo(&self, token: &str, payload: &ModuloPayload) -> Result<()> {
        self.post("/modulos/", Some(token), payload).await?;
        Ok(())
    }

    pub async fn update_modulo(&self, token: &str, id: i64, payload: &ModuloPayload) -> Result<()> {
        self.put(&format!("/modulos/{}", id), token, Some(payload)).await?;
        Ok(())
    }

    pub async fn set_modulo_active(&self, token: &str, id: i64, ativo: bool) -> Result<()> {
        self.put(&format!("/modulos/{}", id), token, Some(&json!({ "ativo": ativo })))
            .await?;
        Ok(())
    }

    pub async fn delete_modulo(&self, token: &str, id: i64) -> Result<()> {
        self.delete(&format!("/modulos/{}", id), token).await
    }

    // Projetos

    pub async fn list_projetos(&self, token: &str) -> Result<Vec<Projeto>> {
        self.get_list("/projetos/", token).await
    }

    pub async fn get_projeto(&self, token: &str, id: i64) -> Result<Projeto> {
        self.get(&format!("/projetos/{}", id), token).await
    }

    pub async fn create_projeto(&self, token: &str, payload: &ProjetoPayload) -> Result<()> {
        self.post("/projetos/", Some(token), payload).await?;
        Ok(())
    }

    pub async fn update_projeto(&self, token: &str, id: i64, payload: &ProjetoPayload) -> Result<()> {
        self.put(&format!("/projetos/{}", id), token, Some(payload)).await?;
        Ok(())
    }

    pub async fn delete_projeto(&self, token: &str, id: i64) -> Result<()> {
        self.delete(&format!("/projetos/{}", id), token).await
    }

    // Ciclos

    pub async fn list_ciclos(&self, token: &str) -> Result<Vec<CicloTeste>> {
        self.get_list("/testes/ciclos", token).await
    }

    pub async fn list_ciclos_by_projeto(&self, token: &str, projeto_id: i64) -> Result<Vec<CicloTeste>> {
        self.get_list(&format!("/testes/projetos/{}/ciclos", projeto_id), token)
            .await
    }

    pub async fn create_ciclo(&self, token: &str, payload: &CicloPayload) -> Result<()> {
        let endpoint = format!("/testes/projetos/{}/ciclos", payload.projeto_id);
        self.post(&endpoint, Some(token), payload).await?;
        Ok(())
    }

    pub async fn update_ciclo(&self, token: &str, id: i64, payload: &CicloPayload) -> Result<()> {
        self.put(&format!("/testes/ciclos/{}", id), token, Some(payload))
            .await?;
        Ok(())
    }

    pub async fn delete_ciclo(&self, token: &str, id: i64) -> Result<()> {
        self.delete(&format!("/testes/ciclos/{}", id), token).await
    }

    // Casos de teste

    pub async fn list_casos_by_projeto(&self, token: &str, projeto_id: i64) -> Result<Vec<CasoTeste>> {
        self.get_list(&format!("/testes/projetos/{}/casos", projeto_id), token)
            .await
    }

    pub async fn create_caso(&self, token: &str, payload: &CasoPayload) -> Result<()> {
        let endpoint = format!("/testes/projetos/{}/casos", payload.projeto_id);
        self.post(&endpoint, Some(token), payload).await?;
        Ok(())
    }

    pub async fn update_caso(&self, token: &str, id: i64, payload: &CasoPayload) -> Result<()> {
        self.put(&format!("/testes/casos/{}", id), token, Some(payload))
            .await?;
        Ok(())
    }

    pub async fn delete_caso(&self, token: &str, id: i64) -> Result<()> {
        self.delete(&format!("/testes/casos/{}", id), token).await
    }

    // Usuarios

    pub async fn list_usuarios(&self, token: &str) -> Result<Vec<Usuario>> {
        self.get_list("/usuarios/", token).await
    }

    pub async fn create_usuario(&self, token: &str, payload: &UsuarioPayload) -> Result<()> {
        self.post("/usuarios/", Some(token), payload).await?;
        Ok(())
    }

    pub async fn update_usuario(&self, token: &str, id: i64, payload: &UsuarioPayload) -> Result<()> {
        self.put(&format!("/usuarios/{}", id), token, Some(payload)).await?;
        Ok(())
    }

    pub async fn set_usuario_active(&self, token: &str, id: i64, ativo: bool) -> Result<()> {
        self.put(&format!("/usuarios/{}", id), token, Some(&json!({ "ativo": ativo })))
            .await?;
        Ok(())
    }

    pub async fn delete_usuario(&self, token: &str, id: i64) -> Result<()> {
        self.delete(&format!("/usuarios/{}", id), token).await
    }

    // Defeitos

    pub async fn list_defeitos(&self, token: &str) -> Result<Vec<Defeito>> {
        self.get_list("/defeitos/", token).await
    }

    pub async fn create_defeito(&self, token: &str, payload: &DefeitoPayload) -> Result<()> {
        self.post("/defeitos/", Some(token), payload).await?;
        Ok(())
    }

    pub async fn update_defeito_status(&self, token: &str, id: i64, status: &DefeitoStatus) -> Result<()> {
        self.put(&format!("/defeitos/{}", id), token, Some(&json!({ "status": status })))
            .await?;
        Ok(())
    }

    pub async fn delete_defeito(&self, token: &str, id: i64) -> Result<()> {
        self.delete(&format!("/defeitos/{}", id), token).await
    }

    // Runner

    pub async fn minhas_tarefas(&self, token: &str) -> Result<Vec<ExecucaoTeste>> {
        self.get_list("/testes/minhas-tarefas", token).await
    }

    pub async fn get_execucao(&self, token: &str, id: i64) -> Result<ExecucaoTeste> {
        self.get(&format!("/testes/execucoes/{}", id), token).await
    }

    pub async fn update_passo(&self, token: &str, passo_id: i64, update: &PassoUpdate) -> Result<()> {
        self.put(&format!("/testes/passos/{}", passo_id), token, Some(update))
            .await?;
        Ok(())
    }

    pub async fn finalizar_execucao(&self, token: &str, id: i64, status: &ExecucaoStatus) -> Result<()> {
        let endpoint = format!("/testes/execucoes/{}/finalizar", id);
        let query = [("status", status.as_str())];
        self.send(Method::PUT, &endpoint, Some(token), &query, None)
            .await?;
        Ok(())
    }

    // Dashboard & audit log

    pub async fn dashboard(&self, token: &str) -> Result<Dashboard> {
        self.get("/dashboard/", token).await
    }

    /// Team metrics, or one tester's when `user_id` is given.
    pub async fn runner_performance(&self, token: &str, user_id: Option<i64>) -> Result<RunnerPerformance> {
        let user_id = user_id.map(|id| id.to_string());
        let query: Vec<(&str, &str)> = user_id.iter().map(|id| ("user_id", id.as_str())).collect();
        self.get_query("/dashboard-runners/performance", token, &query)
            .await
    }

    pub async fn list_logs(&self, token: &str) -> Result<Vec<LogEntry>> {
        self.get_list("/logs/", token).await
    }

    pub async fn delete_log(&self, token: &str, id: i64) -> Result<()> {
        self.delete(&format!("/logs/{}", id), token).await
    }

    // Password recovery (no session)

    pub async fn forgot_password(&self, email: &str) -> Result<()> {
        self.post("/forgot-password", None, &json!({ "email": email }))
            .await?;
        Ok(())
    }

    pub async fn validate_reset_token(&self, token: &str) -> Result<()> {
        self.send(Method::GET, "/reset-password/validate", None, &[("token", token)], None)
            .await?;
        Ok(())
    }

    pub async fn confirm_reset(&self, token: &str, new_password: &str) -> Result<()> {
        self.post(
            "/reset-password/confirm",
            None,
            &json!({ "token": token, "new_password": new_password }),
        )
        .await?;
        Ok(())
    }
}
