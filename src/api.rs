//! Thin wrapper over the QA backend REST API.
//!
//! Every call goes through [`Client::send`], which attaches the bearer token,
//! encodes JSON bodies and normalizes error bodies into [`ApiError`].

mod models;
mod resources;

pub use models::*;

use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

const GENERIC_ERROR: &str = "Erro na requisição";

#[derive(Error, Debug)]
pub enum ApiError {
    /// The backend rejected the bearer token (401) or the account (403).
    #[error("Sessão expirada.")]
    Unauthorized,

    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("Falha de comunicação com o servidor: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Resposta inválida do servidor: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::Status { status: 404, .. })
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: String,
}

impl Client {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolves an endpoint against the base URL. Absolute URLs pass through.
    pub fn url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http") {
            endpoint.to_string()
        } else if endpoint.starts_with('/') {
            format!("{}{}", self.base_url, endpoint)
        } else {
            format!("{}/{}", self.base_url, endpoint)
        }
    }

    /// Sends one request. Query parameters are percent-encoded by reqwest.
    async fn send(
        &self,
        method: Method,
        endpoint: &str,
        token: Option<&str>,
        query: &[(&str, &str)],
        body: Option<Value>,
    ) -> Result<Value> {
        let url = self.url(endpoint);
        tracing::debug!("api {} {}", method, url);

        let mut request = self.http.request(method, &url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            tracing::warn!("api {} rejected credentials ({})", url, status.as_u16());
            return Err(ApiError::Unauthorized);
        }
        read_body(response).await
    }

    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str, token: &str) -> Result<T> {
        self.get_query(endpoint, token, &[]).await
    }

    pub async fn get_query<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        token: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let data = self.send(Method::GET, endpoint, Some(token), query, None).await?;
        Ok(serde_json::from_value(data)?)
    }

    /// GET for collection endpoints. A non-array body is treated as an empty list.
    pub async fn get_list<T: DeserializeOwned>(&self, endpoint: &str, token: &str) -> Result<Vec<T>> {
        let data = self.send(Method::GET, endpoint, Some(token), &[], None).await?;
        match data {
            Value::Array(_) => Ok(serde_json::from_value(data)?),
            _ => Ok(Vec::new()),
        }
    }

    pub async fn post<B: Serialize>(&self, endpoint: &str, token: Option<&str>, body: &B) -> Result<Value> {
        let body = serde_json::to_value(body)?;
        self.send(Method::POST, endpoint, token, &[], Some(body)).await
    }

    pub async fn put<B: Serialize>(&self, endpoint: &str, token: &str, body: Option<&B>) -> Result<Value> {
        let body = body.map(serde_json::to_value).transpose()?;
        self.send(Method::PUT, endpoint, Some(token), &[], body).await
    }

    pub async fn delete(&self, endpoint: &str, token: &str) -> Result<()> {
        self.send(Method::DELETE, endpoint, Some(token), &[], None).await?;
        Ok(())
    }

    /// Exchanges credentials for a token. The backend expects an OAuth2 password form.
    ///
    /// Unlike other calls, 401/403 here mean bad credentials or an inactive
    /// account, so they surface as [`ApiError::Status`] with the backend message.
    pub async fn login(&self, username: &str, password: &str) -> Result<Token> {
        let url = self.url("/login/");
        tracing::debug!("api POST {}", url);

        let response = self
            .http
            .post(&url)
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;
        let data = read_body(response).await?;
        Ok(serde_json::from_value(data)?)
    }
}

async fn read_body(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let bytes = response.bytes().await?;

    // Bodies that are empty (204) or not JSON are treated as `{}`.
    let data: Value = if status == StatusCode::NO_CONTENT || bytes.is_empty() {
        Value::Object(Default::default())
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::Object(Default::default()))
    };

    if !status.is_success() {
        return Err(ApiError::Status {
            status: status.as_u16(),
            message: error_message(&data),
        });
    }

    Ok(data)
}

/// Extracts a human message from an error body: `detail`, then `message`.
pub fn error_message(data: &Value) -> String {
    match data.get("detail") {
        Some(Value::String(detail)) if !detail.is_empty() => return detail.clone(),
        // FastAPI validation errors: [{"loc": [...], "msg": "...", ...}]
        Some(Value::Array(items)) => {
            let msgs: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            if !msgs.is_empty() {
                return msgs.join("; ");
            }
        }
        _ => {}
    }

    match data.get("message") {
        Some(Value::String(message)) if !message.is_empty() => message.clone(),
        _ => GENERIC_ERROR.to_string(),
    }
}
