//! Kraken GraphQL transport with token handling and bounded retries.

use std::{
    sync::{Mutex, PoisonError},
    time::Duration,
};

use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};

use crate::prelude::*;

/// Error code of an expired or invalid token.
const INVALID_TOKEN_CODE: &str = "KT-CT-1124";

const OBTAIN_TOKEN: &str = "
    mutation ObtainKrakenToken($input: ObtainJSONWebTokenInput!) {
        obtainKrakenToken(input: $input) { token }
    }
";

/// Bounded exponential backoff: `base_delay`, `2 × base_delay`, `4 × base_delay`…
#[derive(Copy, Clone, Debug)]
pub struct Backoff {
    /// Total number of attempts, the first one included.
    pub max_attempts: u32,

    pub base_delay: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self { max_attempts: 5, base_delay: Duration::from_secs(30) }
    }
}

impl Backoff {
    /// Delay after the failed attempt (1-based).
    pub fn delay(self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2_u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

#[derive(Debug, thiserror::Error)]
enum CallError {
    #[error("the token has been rejected: {0}")]
    Unauthorized(String),

    #[error("request failed: {0:#}")]
    Transport(Error),

    #[error("the request has been rejected: {0}")]
    Rejected(String),
}

#[derive(Deserialize)]
struct Response<D> {
    data: Option<D>,

    #[serde(default)]
    errors: Vec<ResponseError>,
}

#[derive(Deserialize)]
struct ResponseError {
    message: String,

    #[serde(default)]
    extensions: Option<Extensions>,
}

#[derive(Deserialize)]
struct Extensions {
    #[serde(rename = "errorCode")]
    error_code: Option<String>,
}

impl ResponseError {
    fn error_code(&self) -> Option<&str> {
        self.extensions.as_ref()?.error_code.as_deref()
    }
}

pub struct Graphql {
    client: Client,
    url: Url,
    api_key: String,
    backoff: Backoff,
    token: Mutex<Option<String>>,
}

impl Graphql {
    pub fn new(client: Client, url: Url, api_key: String, backoff: Backoff) -> Self {
        Self { client, url, api_key, backoff, token: Mutex::new(None) }
    }

    /// Execute the operation.
    ///
    /// A rejected token is refreshed once. Transport failures and server errors are retried
    /// with the backoff, while client errors and errors reported by the API are returned right away.
    #[instrument(skip_all, level = Level::DEBUG, fields(operation = operation))]
    pub async fn execute<V: Serialize, R: DeserializeOwned>(
        &self,
        operation: &str,
        query: &str,
        variables: V,
    ) -> Result<R> {
        let variables = serde_json::to_value(variables)?;
        let mut refreshed = false;
        let mut attempt = 1;
        loop {
            let result = match self.token().await {
                Ok(token) => self.send(Some(&token), query, &variables).await,
                Err(error) => Err(CallError::Transport(error)),
            };
            match result {
                Ok(data) => return Ok(data),
                Err(CallError::Unauthorized(message)) if !refreshed => {
                    warn!(%message, "refreshing the token…");
                    self.invalidate_token();
                    refreshed = true;
                }
                Err(CallError::Transport(error)) if attempt < self.backoff.max_attempts => {
                    let delay = self.backoff.delay(attempt);
                    warn!(attempt, ?delay, "`{operation}` failed, retrying: {error:#}");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error).with_context(|| format!("`{operation}` failed")),
            }
        }
    }

    async fn token(&self) -> Result<String> {
        let cached = self.token.lock().unwrap_or_else(PoisonError::into_inner).clone();
        if let Some(token) = cached {
            return Ok(token);
        }

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Data {
            obtain_kraken_token: Token,
        }

        #[derive(Deserialize)]
        struct Token {
            token: String,
        }

        info!("obtaining a token…");
        let variables = json!({ "input": { "APIKey": self.api_key } });
        let token = self
            .send::<Data>(None, OBTAIN_TOKEN, &variables)
            .await
            .context("failed to obtain a token")?
            .obtain_kraken_token
            .token;
        debug!(token = token.get(..8).unwrap_or_default(), "obtained");
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.clone());
        Ok(token)
    }

    fn invalidate_token(&self) {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    async fn send<R: DeserializeOwned>(
        &self,
        token: Option<&str>,
        query: &str,
        variables: &Value,
    ) -> Result<R, CallError> {
        let mut request =
            self.client.post(self.url.clone()).json(&json!({ "query": query, "variables": variables }));
        if let Some(token) = token {
            request = request.header("Authorization", token);
        }
        let response = request
            .send()
            .await
            .map_err(|error| CallError::Transport(Error::new(error).context("failed to call")))?;
        let status = response.status();
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Err(CallError::Unauthorized(status.to_string()));
        }
        if status.is_client_error() {
            return Err(CallError::Rejected(format!("the API responded with {status}")));
        }
        let response = response
            .error_for_status()
            .map_err(|error| CallError::Transport(error.into()))?
            .json::<Response<R>>()
            .await
            .map_err(|error| {
                CallError::Transport(Error::new(error).context("failed to deserialize the response"))
            })?;

        if let Some(error) =
            response.errors.iter().find(|error| error.error_code() == Some(INVALID_TOKEN_CODE))
        {
            return Err(CallError::Unauthorized(error.message.clone()));
        }
        if !response.errors.is_empty() {
            let messages = response
                .errors
                .iter()
                .map(|error| match error.error_code() {
                    Some(code) => format!("{code}: {}", error.message),
                    None => error.message.clone(),
                })
                .collect::<Vec<_>>();
            return Err(CallError::Rejected(messages.join("; ")));
        }
        response.data.ok_or_else(|| CallError::Rejected("the response has no data".to_string()))
    }
}
