use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};

use crate::common::{Message, UserId};

use super::document_store::DocumentStore;
use super::error::StoreError;

/// Document store reached over HTTP:
/// `POST {base}/users/{uid}/messages` and
/// `GET {base}/users/{uid}/messages?limit=N&since=RFC3339`.
pub struct HttpDocumentStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDocumentStore {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn collection_url(&self, owner: &UserId) -> String {
        format!("{}/users/{}/messages", self.base_url, owner)
    }
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn save(&self, owner: &UserId, message: &Message) -> Result<(), StoreError> {
        let response = self
            .client
            .post(self.collection_url(owner))
            .json(message)
            .send()
            .await
            .map_err(classify)?;

        check_status(response).await.map(|_| ())
    }

    async fn list(
        &self,
        owner: &UserId,
        limit: usize,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Message>, StoreError> {
        let mut query = vec![("limit", limit.to_string())];
        if let Some(since) = since {
            query.push(("since", since.to_rfc3339_opts(SecondsFormat::Millis, true)));
        }

        let response = self
            .client
            .get(self.collection_url(owner))
            .query(&query)
            .send()
            .await
            .map_err(classify)?;

        let response = check_status(response).await?;
        response
            .json::<Vec<Message>>()
            .await
            .map_err(|err| StoreError::Decode(err.to_string()))
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    if status.is_server_error() {
        Err(StoreError::Backend(format!("{status}: {body}")))
    } else {
        Err(StoreError::Rejected(format!("{status}: {body}")))
    }
}

fn classify(err: reqwest::Error) -> StoreError {
    if err.is_connect() || err.is_timeout() {
        StoreError::Connectivity(err.to_string())
    } else {
        StoreError::Backend(err.to_string())
    }
}
