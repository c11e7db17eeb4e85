//! HTTP transport seam. The executor only ever needs "POST this, tell me the
//! status, the `Location` header and the body".

use async_trait::async_trait;
use reqwest::header::LOCATION;
use reqwest::redirect::Policy;

use crate::config::ApiConfig;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(serde_json::Value),
    Form(Vec<(String, String)>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub url: String,
    pub body: RequestBody,
}

impl HttpRequest {
    pub fn json(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            url: url.into(),
            body: RequestBody::Json(body),
        }
    }

    pub fn form(url: impl Into<String>, fields: Vec<(String, String)>) -> Self {
        Self {
            url: url.into(),
            body: RequestBody::Form(fields),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub location: Option<String>,
    pub body: String,
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Sends one POST. `Err` only for transport-level failures; any HTTP status
    /// is a successful `HttpResponse`.
    async fn post(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// reqwest-backed transport. Redirects are not followed here: the executor
/// follows at most one itself.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .redirect(Policy::none())
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post(&self, request: HttpRequest) -> Result<HttpResponse> {
        let builder = self.client.post(&request.url);
        let builder = match &request.body {
            RequestBody::Json(body) => builder.json(body),
            RequestBody::Form(fields) => builder.form(fields),
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;

        Ok(HttpResponse {
            status,
            location,
            body,
        })
    }
}
