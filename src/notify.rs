use std::{
    sync::{Mutex, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use itertools::Itertools;
use reqwest::{Client, Url};
use serde::Serialize;

use crate::prelude::*;

/// Chat services reject longer messages, code fences included.
const MAX_CHUNK_CHARS: usize = 1900;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub title: String,
    pub is_error: bool,

    /// May be held back and sent together with the rest of the run.
    pub batchable: bool,
}

impl Notification {
    pub fn info(message: impl Into<String>) -> Self {
        Self { message: message.into(), title: String::new(), is_error: false, batchable: true }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { is_error: true, title: "Octobot error".to_string(), ..Self::info(message) }
    }

    #[must_use]
    pub fn unbatched(mut self) -> Self {
        self.batchable = false;
        self
    }
}

/// Delivery is best-effort: failures are logged and never reach the caller.
#[async_trait]
pub trait Notifier: Sync {
    async fn send(&self, notification: Notification);
}

pub struct NotificationService {
    client: Client,
    urls: Vec<Url>,

    /// Pending messages when batching is enabled.
    batch: Option<Mutex<Vec<String>>>,
}

impl NotificationService {
    pub fn new(urls: Vec<Url>, batch: bool) -> Result<Self> {
        if urls.is_empty() {
            warn!("no notification URLs configured, notifications will only be logged");
        }
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self { client, urls, batch: batch.then(Mutex::default) })
    }

    /// Send the pending batch as a single notification.
    #[instrument(skip_all)]
    pub async fn flush(&self, title: &str) {
        let Some(batch) = &self.batch else { return };
        let body = {
            let mut messages = batch.lock().unwrap_or_else(PoisonError::into_inner);
            if messages.is_empty() {
                debug!("nothing to flush");
                return;
            }
            info!(n_messages = messages.len(), "flushing the batch…");
            messages.drain(..).join("\n")
        };
        self.deliver(title, &body).await;
    }

    async fn deliver(&self, title: &str, body: &str) {
        #[derive(Serialize)]
        struct Payload<'a> {
            title: &'a str,
            body: &'a str,
        }

        for url in &self.urls {
            let result = self
                .client
                .post(url.clone())
                .json(&Payload { title, body })
                .send()
                .await
                .and_then(reqwest::Response::error_for_status);
            if let Err(error) = result {
                warn!(host = url.host_str(), "failed to deliver the notification: {error:#}");
            }
        }
    }
}

#[async_trait]
impl Notifier for NotificationService {
    async fn send(&self, notification: Notification) {
        if notification.is_error {
            error!(title = %notification.title, "{}", notification.message);
        } else {
            info!(title = %notification.title, "{}", notification.message);
        }
        let bodies = if notification.is_error {
            fence_error(&notification.message)
        } else {
            vec![notification.message]
        };
        if notification.batchable
            && let Some(batch) = &self.batch
        {
            batch.lock().unwrap_or_else(PoisonError::into_inner).extend(bodies);
            return;
        }
        for body in bodies {
            self.deliver(&notification.title, &body).await;
        }
    }
}

/// Wrap an error in code fences, splitting it into deliverable chunks.
fn fence_error(message: &str) -> Vec<String> {
    if message.is_empty() {
        return vec!["```\n```".to_string()];
    }
    message
        .chars()
        .chunks(MAX_CHUNK_CHARS)
        .into_iter()
        .map(|chunk| format!("```\n{}\n```", chunk.collect::<String>()))
        .collect()
}
