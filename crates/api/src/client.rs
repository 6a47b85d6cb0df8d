use std::time::Duration;

use reqwest::{Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::session::Sessions;
use crate::types::Version;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("bad url: {0}")]
    Url(String),
}

/// Client for the Jupyter Server REST API.
pub struct Client {
    http: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

pub struct ClientBuilder {
    base_url: String,
    token: Option<String>,
    timeout: Duration,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8888".to_owned(),
            token: None,
            timeout: Duration::from_secs(30),
        }
    }
}

impl ClientBuilder {
    /// Base URL of the server, e.g. `http://localhost:8888`.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Authentication token; sent as `Authorization: Token <token>` on every
    /// request. Without one no authentication header is sent.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<Client, ApiError> {
        let base_url = Url::parse(&self.base_url).map_err(|e| ApiError::Url(e.to_string()))?;
        let http = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(ApiError::Http)?;

        Ok(Client {
            http,
            base_url,
            token: self.token,
        })
    }
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Session lifecycle endpoints.
    pub fn sessions(&self) -> Sessions<'_> {
        Sessions::new(self)
    }

    /// Server version, from `GET /api`.
    pub async fn version(&self) -> Result<Version, ApiError> {
        self.get("/api").await
    }

    /// The streaming connection target for a kernel:
    /// `ws(s)://<host>/api/kernels/<kernel>/channels?session_id=<session>`.
    pub fn ws_url(&self, kernel_id: &str, session_id: &str) -> Result<Url, ApiError> {
        let mut url = self
            .base_url
            .join(&format!("/api/kernels/{kernel_id}/channels"))
            .map_err(|e| ApiError::Url(e.to_string()))?;

        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme)
            .map_err(|()| ApiError::Url(format!("cannot use scheme {scheme}")))?;
        url.query_pairs_mut().append_pair("session_id", session_id);

        Ok(url)
    }

    pub(crate) fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| ApiError::Url(e.to_string()))?;

        debug!(%method, %url, "api request");
        let mut request = self.http.request(method, url);
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Token {token}"));
        }

        Ok(request)
    }

    pub(crate) async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    /// Sends a request and discards the response body after the status check.
    pub(crate) async fn send_empty(&self, request: RequestBuilder) -> Result<(), ApiError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let request = self.request(Method::GET, path)?;
        self.send(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use googletest::prelude::*;

    #[googletest::test]
    fn ws_url_maps_the_scheme_and_carries_the_session() {
        let client = Client::builder()
            .base_url("http://localhost:8888")
            .build()
            .unwrap();

        let url = client.ws_url("kern-1", "sess-1").unwrap();
        expect_that!(
            url.as_str(),
            eq("ws://localhost:8888/api/kernels/kern-1/channels?session_id=sess-1")
        );
    }

    #[googletest::test]
    fn ws_url_uses_wss_for_https_servers() {
        let client = Client::builder()
            .base_url("https://hub.example.org")
            .build()
            .unwrap();

        let url = client.ws_url("k", "s").unwrap();
        expect_that!(url.scheme(), eq("wss"));
    }

    #[googletest::test]
    fn requests_carry_the_token_header() {
        let client = Client::builder()
            .base_url("http://localhost:8888")
            .token("secret")
            .build()
            .unwrap();

        let request = client
            .request(Method::GET, "/api/sessions")
            .unwrap()
            .build()
            .unwrap();
        let auth = request.headers().get("Authorization").unwrap();
        expect_that!(auth.to_str().unwrap(), eq("Token secret"));
    }

    #[googletest::test]
    fn requests_without_token_have_no_auth_header() {
        let client = Client::builder()
            .base_url("http://localhost:8888")
            .build()
            .unwrap();

        let request = client
            .request(Method::GET, "/api/sessions")
            .unwrap()
            .build()
            .unwrap();
        expect_that!(request.headers().get("Authorization").is_none(), eq(true));
    }

    #[googletest::test]
    fn invalid_base_url_is_rejected() {
        let result = Client::builder().base_url("not a url").build();
        expect_that!(matches!(result, Err(ApiError::Url(_))), eq(true));
    }
}
