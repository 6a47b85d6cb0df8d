use reqwest::Method;

use crate::client::{ApiError, Client};
use crate::types::{NewSession, Session};

/// Session lifecycle endpoints under `/api/sessions`.
pub struct Sessions<'a> {
    client: &'a Client,
}

impl<'a> Sessions<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Creates a session; the response carries the id of the kernel started
    /// (or reused) for it.
    pub async fn create(&self, body: &NewSession) -> Result<Session, ApiError> {
        let request = self.client.request(Method::POST, "/api/sessions")?.json(body);
        self.client.send(request).await
    }

    pub async fn list(&self) -> Result<Vec<Session>, ApiError> {
        self.client.get("/api/sessions").await
    }

    pub async fn get(&self, id: &str) -> Result<Session, ApiError> {
        self.client.get(&format!("/api/sessions/{id}")).await
    }

    pub async fn update(&self, id: &str, body: &NewSession) -> Result<Session, ApiError> {
        let request = self
            .client
            .request(Method::PATCH, &format!("/api/sessions/{id}"))?
            .json(body);
        self.client.send(request).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        let request = self
            .client
            .request(Method::DELETE, &format!("/api/sessions/{id}"))?;
        self.client.send_empty(request).await
    }
}
