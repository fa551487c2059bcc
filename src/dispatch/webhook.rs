//! Webhook implementation of the external handler slots.
//!
//! Handlers are invoked on the blocking pool, so the async HTTP call is
//! driven to completion through the runtime handle captured at construction.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::runtime::Handle;
use url::Url;

use crate::dispatch::events::{ChangeEvent, EventHandler};
use crate::dispatch::feedback::{ClientFeedback, FeedbackHandler};
use crate::dispatch::pool::HandlerError;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("invalid webhook URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("webhook must be created inside a Tokio runtime")]
    NoRuntime,
}

/// POSTs each event or feedback report as JSON to a fixed URL.
pub struct WebhookHandler {
    client: reqwest::Client,
    url: Url,
    runtime: Handle,
}

impl WebhookHandler {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, WebhookError> {
        let url = Url::parse(url)?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let runtime = Handle::try_current().map_err(|_| WebhookError::NoRuntime)?;
        Ok(Self {
            client,
            url,
            runtime,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    fn post<T: Serialize>(&self, body: &T) -> Result<(), HandlerError> {
        self.runtime.block_on(async {
            self.client
                .post(self.url.clone())
                .json(body)
                .send()
                .await?
                .error_for_status()?;
            Ok::<(), HandlerError>(())
        })
    }
}

impl EventHandler for WebhookHandler {
    fn on_event(&self, event: &ChangeEvent) -> Result<(), HandlerError> {
        self.post(event)
    }
}

impl FeedbackHandler for WebhookHandler {
    fn on_feedback(&self, feedback: &ClientFeedback) -> Result<(), HandlerError> {
        self.post(feedback)
    }
}
