//! JSON-LD/Hydra transport over HTTP.

use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde_json::Value as Json;

use super::{parse_collection, parse_ids, Page, Transport};
use crate::error::TransportError;
use crate::record::Id;

const LD_JSON: &str = "application/ld+json";

/// Credentials sent with every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Auth {
    /// OAuth access token, sent as `Authorization: Bearer ...`.
    Bearer(String),
    /// Data API JWT, sent as `Auth: JWT ...`.
    Jwt(String),
}

/// HTTP client for a Data API rooted at `base_url`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    base_url: String,
    client: Client,
    auth: Option<Auth>,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: Client::new(),
            auth: None,
        }
    }

    pub fn with_auth(mut self, auth: Auth) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Joins the base URL and a resource path.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.client.request(method, url).header(ACCEPT, LD_JSON);
        match &self.auth {
            Some(Auth::Bearer(token)) => builder.header(AUTHORIZATION, format!("Bearer {}", token)),
            Some(Auth::Jwt(token)) => builder.header("Auth", format!("JWT {}", token)),
            None => builder,
        }
    }

    async fn send(&self, method: Method, url: &str, builder: RequestBuilder) -> Result<Response, TransportError> {
        tracing::debug!("{} {}", method, url);
        let response = builder.send().await?;
        tracing::debug!("{} {} -> {}", method, url, response.status());
        Ok(response)
    }
}

/// Expected status and content type per method.
fn expectation(method: &Method) -> (StatusCode, Option<&'static str>) {
    match *method {
        Method::POST => (StatusCode::CREATED, Some(LD_JSON)),
        Method::DELETE => (StatusCode::NO_CONTENT, None),
        _ => (StatusCode::OK, Some(LD_JSON)),
    }
}

fn method_name(method: &Method) -> &'static str {
    match *method {
        Method::POST => "POST",
        Method::PUT => "PUT",
        Method::DELETE => "DELETE",
        _ => "GET",
    }
}

/// Fails unless the response has the status and content type the method
/// calls for.
async fn checked(method: &Method, url: &str, response: Response) -> Result<Response, TransportError> {
    let (status, content_type) = expectation(method);

    if response.status() != status {
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(TransportError::Unauthorized);
        }
        let code = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(TransportError::Status {
            method: method_name(method),
            url: url.to_string(),
            status: code,
            body,
        });
    }

    if let Some(expected) = content_type {
        let received = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !received.starts_with(expected) {
            return Err(TransportError::ContentType {
                expected: expected.to_string(),
                received,
            });
        }
    }

    Ok(response)
}

async fn json_body(response: Response) -> Result<Json, TransportError> {
    let body: Json = response
        .json()
        .await
        .map_err(|e| TransportError::Body(e.to_string()))?;
    Ok(parse_ids(body))
}

impl Transport for HttpTransport {
    async fn get_by_id(&self, endpoint: &str, id: Id) -> Result<Option<Json>, TransportError> {
        let url = self.url(&format!("{}/{}", endpoint, id));
        let response = self
            .send(Method::GET, &url, self.request(Method::GET, &url))
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = checked(&Method::GET, &url, response).await?;
        json_body(response).await.map(Some)
    }

    async fn get_page(
        &self,
        endpoint: &str,
        page: u32,
        query: &[(String, String)],
    ) -> Result<Page, TransportError> {
        let url = self.url(endpoint);
        let mut builder = self.request(Method::GET, &url).query(query);
        if page > 1 {
            builder = builder.query(&[("page", page)]);
        }

        let response = self.send(Method::GET, &url, builder).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Page::empty());
        }
        let response = checked(&Method::GET, &url, response).await?;
        let body: Json = response
            .json()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?;
        Ok(parse_collection(body))
    }

    async fn post(&self, endpoint: &str, body: &Json) -> Result<Json, TransportError> {
        let url = self.url(endpoint);
        let builder = self.request(Method::POST, &url).json(body);
        let response = self.send(Method::POST, &url, builder).await?;
        let response = checked(&Method::POST, &url, response).await?;
        json_body(response).await
    }

    async fn put(&self, endpoint: &str, id: Id, body: &Json) -> Result<Json, TransportError> {
        let url = self.url(&format!("{}/{}", endpoint, id));
        let builder = self.request(Method::PUT, &url).json(body);
        let response = self.send(Method::PUT, &url, builder).await?;
        let response = checked(&Method::PUT, &url, response).await?;
        json_body(response).await
    }

    async fn delete(&self, endpoint: &str, id: Id) -> Result<bool, TransportError> {
        let url = self.url(&format!("{}/{}", endpoint, id));
        let builder = self.request(Method::DELETE, &url);
        let response = self.send(Method::DELETE, &url, builder).await?;
        checked(&Method::DELETE, &url, response).await?;
        Ok(true)
    }
}
