//! The hosted multimodal gateway and its failure taxonomy.

use crate::wire::{ChatRequest, ChatResponse};
use async_trait::async_trait;
use reqwest::Client;
use shared::settings::GatewaySettings;
use std::sync::LazyLock;
use std::time::Duration;

static SHARED_HTTP: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .pool_max_idle_per_host(2)
        .build()
        .expect("failed to build HTTP client")
});

/// How many body characters are kept in error messages.
const ERROR_BODY_CHARS: usize = 800;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("Rate limit exceeded. Please try again in a moment.")]
    RateLimited,

    #[error("AI service credits depleted. Please add credits to continue.")]
    PaymentRequired,

    #[error("AI gateway returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("AI gateway request timed out after {0}s")]
    Timeout(u64),

    #[error("AI gateway unreachable: {0}")]
    Transport(String),

    #[error("Unexpected AI gateway response: {0}")]
    Decode(String),

    #[error("{0}")]
    EmptyResponse(String),

    #[error("AI service not configured: {0}")]
    NotConfigured(String),
}

/// Raw HTTP result of one gateway call.
#[derive(Debug, Clone)]
pub struct GatewayReply {
    pub status: u16,
    pub body: String,
}

impl GatewayReply {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Map non-success statuses onto the failure taxonomy.
    pub fn check_status(&self) -> Result<(), GatewayError> {
        match self.status {
            _ if self.is_success() => Ok(()),
            429 => Err(GatewayError::RateLimited),
            402 => Err(GatewayError::PaymentRequired),
            status => Err(GatewayError::Http {
                status,
                body: self.body.chars().take(ERROR_BODY_CHARS).collect(),
            }),
        }
    }

    pub fn parse(&self) -> Result<ChatResponse, GatewayError> {
        serde_json::from_str(&self.body).map_err(|e| GatewayError::Decode(e.to_string()))
    }
}

/// A chat-completions endpoint.
///
/// Implementations report transport problems as errors and hand back every
/// HTTP status untouched; interpreting statuses is the caller's job.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<GatewayReply, GatewayError>;
}

/// Send `request` and decode a successful reply.
pub async fn send_chat(
    gateway: &dyn Gateway,
    request: &ChatRequest,
) -> Result<ChatResponse, GatewayError> {
    tracing::info!(model = %request.model, "sending request to AI gateway");
    let reply = gateway.complete(request).await?;
    tracing::info!(status = reply.status, "AI gateway responded");
    if let Err(err) = reply.check_status() {
        tracing::warn!(status = reply.status, error = %err, "AI gateway error response");
        return Err(err);
    }
    reply.parse()
}

// ── HTTP implementation ──────────────────────────────────────────────

pub struct HttpGateway {
    http: Client,
    auth_token: String,
    base_url: String,
    timeout: Duration,
}

impl HttpGateway {
    pub fn from_settings(settings: &GatewaySettings) -> Result<Self, GatewayError> {
        let auth_token = settings
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| GatewayError::NotConfigured("gateway API key is not set".into()))?;
        Ok(Self {
            http: SHARED_HTTP.clone(),
            auth_token,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(settings.timeout_secs.max(1)),
        })
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn complete(&self, request: &ChatRequest) -> Result<GatewayReply, GatewayError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let resp = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.auth_token))
            .header("Content-Type", "application/json")
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(|e| self.transport_error(e))?;
        tracing::debug!(status, body_len = body.len(), "gateway body received");
        Ok(GatewayReply { status, body })
    }
}

impl HttpGateway {
    fn transport_error(&self, err: reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            GatewayError::Timeout(self.timeout.as_secs())
        } else {
            GatewayError::Transport(err.to_string())
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned replies and records every request it receives.
    pub struct ScriptedGateway {
        replies: Mutex<VecDeque<Result<GatewayReply, GatewayError>>>,
        pub requests: Mutex<Vec<serde_json::Value>>,
    }

    impl ScriptedGateway {
        pub fn new(replies: Vec<Result<GatewayReply, GatewayError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn replying(status: u16, body: serde_json::Value) -> Self {
            Self::new(vec![Ok(GatewayReply {
                status,
                body: body.to_string(),
            })])
        }

        pub fn last_request(&self) -> serde_json::Value {
            self.requests
                .lock()
                .unwrap()
                .last()
                .cloned()
                .expect("no request recorded")
        }
    }

    #[async_trait]
    impl Gateway for ScriptedGateway {
        async fn complete(&self, request: &ChatRequest) -> Result<GatewayReply, GatewayError> {
            self.requests
                .lock()
                .unwrap()
                .push(serde_json::to_value(request).unwrap());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(GatewayError::Transport("script exhausted".into())))
        }
    }
}
