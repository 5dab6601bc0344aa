//! Synthesis client - asks the colorization service for a composite image
//!
//! The service receives the four channel paths plus the target path, writes
//! the composite itself and answers with `{code, msg, data: {save_path}}`.
//! The returned path must equal the requested one byte for byte.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::SynthesisConfig;
use crate::error::SynthesisError;

/// Request body understood by the colorization service
///
/// Channel paths are empty strings when the batch had no file for that role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisRequest {
    pub color_img_path: String,
    pub ir_image: String,
    pub green_image: String,
    pub red_image: String,
    pub blue_image: String,
}

/// Composes a color image from channel images
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Returns the path the composite was written to
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<String, SynthesisError>;
}

/// HTTP client for the colorization endpoint
#[derive(Clone)]
pub struct HttpSynthesisClient {
    http: Client,
    endpoint: String,
    retry_count: u32,
    retry_backoff: Duration,
}

impl HttpSynthesisClient {
    pub fn new(
        endpoint: impl Into<String>,
        timeout: Duration,
        retry_count: u32,
        retry_backoff: Duration,
    ) -> Result<Self, SynthesisError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SynthesisError::Unavailable(format!("Failed to create HTTP client: {e}")))?;

        let endpoint = endpoint.into();
        info!(endpoint = %endpoint, ?timeout, "Synthesis client initialized");

        Ok(Self {
            http,
            endpoint,
            retry_count: retry_count.min(1),
            retry_backoff,
        })
    }

    pub fn from_config(cfg: &SynthesisConfig) -> Result<Self, SynthesisError> {
        Self::new(
            cfg.endpoint.clone(),
            cfg.timeout(),
            cfg.retry_count,
            cfg.retry_backoff(),
        )
    }

    async fn send(&self, request: &SynthesisRequest) -> Result<(u16, String), reqwest::Error> {
        let response = self.http.post(&self.endpoint).json(request).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok((status, body))
    }
}

#[async_trait]
impl Synthesizer for HttpSynthesisClient {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<String, SynthesisError> {
        let mut attempt = 0;

        loop {
            match self.send(request).await {
                Ok((status, body)) => {
                    debug!(status, body_len = body.len(), "Synthesis service responded");
                    return interpret_response(status, &body, &request.color_img_path);
                }
                // Same target path on every attempt, so a retry cannot produce a second composite
                Err(e) if attempt < self.retry_count => {
                    attempt += 1;
                    warn!(
                        attempt,
                        max_retries = self.retry_count,
                        error = %e,
                        "Synthesis call failed, retrying"
                    );
                    tokio::time::sleep(self.retry_backoff).await;
                }
                Err(e) => {
                    let reason = if e.is_timeout() {
                        format!("request to {} timed out", self.endpoint)
                    } else {
                        e.to_string()
                    };
                    return Err(SynthesisError::Unavailable(reason));
                }
            }
        }
    }
}

/// Validate the service envelope and extract `data.save_path`
fn interpret_response(status: u16, body: &str, requested: &str) -> Result<String, SynthesisError> {
    let value: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(_) if !(200..300).contains(&status) => {
            return Err(SynthesisError::Rejected {
                code: i64::from(status),
                message: truncate(body, 200),
            })
        }
        Err(e) => {
            return Err(SynthesisError::MalformedResponse(format!(
                "body is not JSON: {e}"
            )))
        }
    };

    let code = value.get("code").and_then(Value::as_i64);
    let message = value
        .get("msg")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    if !(200..300).contains(&status) || code.is_some_and(|c| c != 200) {
        return Err(SynthesisError::Rejected {
            code: code.unwrap_or(i64::from(status)),
            message,
        });
    }
    if code.is_none() {
        return Err(SynthesisError::MalformedResponse(
            "missing status code".to_string(),
        ));
    }

    let save_path = value
        .get("data")
        .and_then(|d| d.get("save_path"))
        .ok_or_else(|| SynthesisError::MalformedResponse("missing data.save_path".to_string()))?
        .as_str()
        .ok_or_else(|| {
            SynthesisError::MalformedResponse("data.save_path is not a string".to_string())
        })?;

    if save_path != requested {
        return Err(SynthesisError::PathMismatch {
            requested: requested.to_string(),
            returned: save_path.to_string(),
        });
    }

    Ok(save_path.to_string())
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
