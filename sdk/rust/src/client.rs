use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::stream::NotificationStream;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub description: String,
}

impl ConfigEntry {
    pub fn new(key: &str, value: &str, description: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
            description: description.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigRecord {
    pub label: String,
    pub version: u64,
    pub config_data: Vec<ConfigEntry>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySnapshot {
    pub label: String,
    pub version: u64,
    /// Entries as the server archived them (a JSON-encoded array).
    pub entries: String,
    pub updated_at: DateTime<Utc>,
    pub archived_at: DateTime<Utc>,
}

impl HistorySnapshot {
    pub fn decoded_entries(&self) -> Result<Vec<ConfigEntry>, serde_json::Error> {
        serde_json::from_str(&self.entries)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientFeedback {
    pub label: String,
    pub client_id: String,
    pub client_version: u64,
    pub last_update_time: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum SdkError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid server URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("server URL cannot carry a path: {0}")]
    BaseUrl(String),

    /// Non-success status with the server's `message`.
    #[error("server returned {status}: {message}")]
    Api { status: StatusCode, message: String },
}

impl SdkError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            SdkError::Api { status, .. } => Some(*status),
            SdkError::Http(e) => e.status(),
            SdkError::Url(_) | SdkError::BaseUrl(_) => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            SdkError::Api { message, .. } => Some(message),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

pub struct ConfigClient {
    client: Client,
    server_url: String,
}

impl ConfigClient {
    pub fn new(server_url: &str) -> Self {
        Self {
            client: Client::new(),
            server_url: server_url.trim_end_matches('/').to_string(),
        }
    }

    /// Server URL with `segments` appended, each percent-encoded as one path segment.
    fn url(&self, segments: &[&str]) -> Result<Url, SdkError> {
        endpoint(&self.server_url, segments)
    }

    pub async fn labels(&self) -> Result<Vec<String>, SdkError> {
        let resp = self.client.get(self.url(&["config"])?).send().await?;
        parse(resp).await
    }

    /// Current record, or `None` for an unknown label.
    pub async fn get(&self, label: &str) -> Result<Option<ConfigRecord>, SdkError> {
        let resp = self.client.get(self.url(&["config", label])?).send().await?;
        match parse(resp).await {
            Ok(record) => Ok(Some(record)),
            Err(SdkError::Api { status: StatusCode::NOT_FOUND, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn create(&self, label: &str, entries: &[ConfigEntry]) -> Result<ConfigRecord, SdkError> {
        let resp = self
            .client
            .post(self.url(&["config", label])?)
            .json(entries)
            .send()
            .await?;
        parse(resp).await
    }

    pub async fn patch(&self, label: &str, entries: &[ConfigEntry]) -> Result<ConfigRecord, SdkError> {
        let resp = self
            .client
            .patch(self.url(&["config", label])?)
            .json(entries)
            .send()
            .await?;
        parse(resp).await
    }

    pub async fn update(&self, label: &str, entries: &[ConfigEntry]) -> Result<ConfigRecord, SdkError> {
        let resp = self
            .client
            .put(self.url(&["config", label])?)
            .json(entries)
            .send()
            .await?;
        parse(resp).await
    }

    pub async fn history(&self, label: &str) -> Result<Vec<HistorySnapshot>, SdkError> {
        let resp = self
            .client
            .get(self.url(&["config", label, "history"])?)
            .send()
            .await?;
        parse(resp).await
    }

    pub async fn history_version(&self, label: &str, version: u64) -> Result<HistorySnapshot, SdkError> {
        let resp = self
            .client
            .get(self.url(&["config", label, "history", &version.to_string()])?)
            .send()
            .await?;
        parse(resp).await
    }

    pub async fn feedback(&self, feedback: &ClientFeedback) -> Result<(), SdkError> {
        let resp = self
            .client
            .post(self.url(&["config", "feedback"])?)
            .json(feedback)
            .send()
            .await?;
        check(resp).await.map(|_| ())
    }

    pub async fn health(&self) -> Result<serde_json::Value, SdkError> {
        let resp = self.client.get(self.url(&["health"])?).send().await?;
        parse(resp).await
    }

    /// Open the change-notification stream for `label`.
    pub async fn watch(&self, label: &str) -> Result<NotificationStream, SdkError> {
        let resp = self
            .client
            .get(self.url(&["config", "notification", label])?)
            .send()
            .await?;
        Ok(NotificationStream::new(check(resp).await?))
    }
}

fn endpoint(base: &str, segments: &[&str]) -> Result<Url, SdkError> {
    let mut url = Url::parse(base)?;
    url.path_segments_mut()
        .map_err(|_| SdkError::BaseUrl(base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

async fn check(resp: Response) -> Result<Response, SdkError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let text = resp.text().await?;
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|b| b.message)
        .unwrap_or(text);
    Err(SdkError::Api { status, message })
}

async fn parse<T: DeserializeOwned>(resp: Response) -> Result<T, SdkError> {
    Ok(check(resp).await?.json().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_are_single_encoded_segments() {
        let url = endpoint("http://localhost:8888/", &["config", "APP#1"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8888/config/APP%231");

        let url = endpoint("http://localhost:8888", &["config", "B?x=1", "history"]).unwrap();
        assert_eq!(url.path(), "/config/B%3Fx=1/history");
        assert_eq!(url.query(), None);

        let url = endpoint("http://localhost:8888/api", &["config", "C/D"]).unwrap();
        assert_eq!(url.path(), "/api/config/C%2FD");
    }

    #[test]
    fn test_rejects_unusable_base() {
        assert!(matches!(endpoint("not a url", &["config"]), Err(SdkError::Url(_))));
        assert!(matches!(endpoint("mailto:ops@example.com", &["config"]), Err(SdkError::BaseUrl(_))));
    }
}
