// crates/diting-delivery/src/feishu.rs
// ============================================================================
// Module: Feishu Delivery Provider
// Description: Tenant-token client with retrying message delivery.
// Purpose: Fan confirmations out to approvers with bounded retries.
// Dependencies: diting-core, reqwest, serde_json, tokio
// ============================================================================

//! ## Overview
//! Delivery path: acquire (and cache) a tenant access token, render the
//! message (interactive card or text with approval links), then send one
//! message per approver. Each send retries with exponential backoff; when
//! every direct delivery fails and a group chat is configured, the message
//! falls back to the chat id. Errors surface as [`DeliveryError`] and the
//! caller treats them as informational.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use diting_core::DeliverInput;
use diting_core::DeliveryError;
use diting_core::DeliveryProvider;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::card::approval_card;
use crate::card::approval_links;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default Feishu open-platform endpoint.
const DEFAULT_ENDPOINT: &str = "https://open.feishu.cn";
/// Default receive id kind for direct deliveries.
const DEFAULT_RECEIVE_ID_TYPE: &str = "open_id";
/// Default maximum delivery attempts per target.
const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;
/// Default initial backoff between attempts.
const DEFAULT_RETRY_INITIAL_BACKOFF: Duration = Duration::from_secs(1);
/// Safety margin subtracted from the token lifetime.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Feishu provider configuration.
///
/// # Invariants
/// - Zero retry fields fall back to the defaults (3 attempts, 1 s backoff).
/// - `endpoint` is overridable for tests; production leaves it empty.
#[derive(Debug, Clone, Default)]
pub struct FeishuProviderConfig {
    /// Application id.
    pub app_id: String,
    /// Application secret.
    pub app_secret: String,
    /// Default approver ids when a delivery carries none.
    pub approval_user_ids: Vec<String>,
    /// Receive id kind (`open_id` or `user_id`).
    pub receive_id_type: String,
    /// Group chat id used as the fallback target.
    pub chat_id: String,
    /// Gateway base URL for approval links and card backup links.
    pub gateway_base_url: String,
    /// Send interactive cards instead of text messages.
    pub use_card_delivery: bool,
    /// Maximum attempts per target (0 → 3).
    pub retry_max_attempts: u32,
    /// Initial backoff in seconds, doubling per attempt (0 → 1).
    pub retry_initial_backoff_seconds: u64,
    /// API endpoint override; empty uses the public endpoint.
    pub endpoint: String,
}

impl FeishuProviderConfig {
    /// Returns the effective API endpoint.
    #[must_use]
    fn endpoint(&self) -> &str {
        if self.endpoint.is_empty() { DEFAULT_ENDPOINT } else { &self.endpoint }
    }

    /// Returns the effective receive id kind.
    #[must_use]
    fn receive_id_type(&self) -> &str {
        if self.receive_id_type.is_empty() { DEFAULT_RECEIVE_ID_TYPE } else { &self.receive_id_type }
    }

    /// Returns the effective retry attempt limit.
    #[must_use]
    const fn retry_max_attempts(&self) -> u32 {
        if self.retry_max_attempts == 0 { DEFAULT_RETRY_MAX_ATTEMPTS } else { self.retry_max_attempts }
    }

    /// Returns the effective initial backoff.
    #[must_use]
    const fn retry_initial_backoff(&self) -> Duration {
        if self.retry_initial_backoff_seconds == 0 {
            DEFAULT_RETRY_INITIAL_BACKOFF
        } else {
            Duration::from_secs(self.retry_initial_backoff_seconds)
        }
    }
}

/// Backoff schedule: `initial * 2^attempt`, one entry per retry gap.
#[must_use]
pub(crate) fn backoff_schedule(attempts: u32, initial: Duration) -> Vec<Duration> {
    (0..attempts.saturating_sub(1)).map(|attempt| initial * 2_u32.saturating_pow(attempt)).collect()
}

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// Tenant access token response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    /// Vendor status code; zero is success.
    code: i64,
    /// Vendor status message.
    #[serde(default)]
    msg: String,
    /// Issued token.
    #[serde(default)]
    tenant_access_token: String,
    /// Token lifetime in seconds.
    #[serde(default)]
    expire: u64,
}

/// Message send response.
#[derive(Debug, Deserialize)]
struct SendResponse {
    /// Vendor status code; zero is success.
    code: i64,
    /// Vendor status message.
    #[serde(default)]
    msg: String,
}

/// Cached tenant token with its refresh deadline.
struct CachedToken {
    /// Token value.
    value: String,
    /// Instant after which the token must be refreshed.
    refresh_after: Instant,
}

// ============================================================================
// SECTION: Provider
// ============================================================================

/// Feishu delivery provider.
///
/// # Invariants
/// - The token cache is refreshed before expiry with a safety margin.
/// - A delivery succeeds when at least one target accepted the message.
pub struct FeishuProvider {
    /// Provider configuration.
    config: FeishuProviderConfig,
    /// Shared HTTP client.
    client: reqwest::Client,
    /// Cached tenant access token.
    token: Mutex<Option<CachedToken>>,
}

impl FeishuProvider {
    /// Creates a provider from configuration.
    #[must_use]
    pub fn new(config: FeishuProviderConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            token: Mutex::new(None),
        }
    }

    /// Returns a valid tenant access token, refreshing when needed.
    async fn tenant_token(&self) -> Result<String, DeliveryError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref()
            && Instant::now() < token.refresh_after
        {
            return Ok(token.value.clone());
        }
        let url = format!("{}/open-apis/auth/v3/tenant_access_token/internal", self.config.endpoint());
        let response = self
            .client
            .post(&url)
            .json(&json!({ "app_id": self.config.app_id, "app_secret": self.config.app_secret }))
            .send()
            .await
            .map_err(|err| DeliveryError::Failed(format!("token request: {err}")))?;
        let body: TokenResponse = response
            .json()
            .await
            .map_err(|err| DeliveryError::Failed(format!("token decode: {err}")))?;
        if body.code != 0 {
            return Err(DeliveryError::Failed(format!("token rejected: {} {}", body.code, body.msg)));
        }
        let lifetime = Duration::from_secs(body.expire).saturating_sub(TOKEN_EXPIRY_MARGIN);
        *cached = Some(CachedToken {
            value: body.tenant_access_token.clone(),
            refresh_after: Instant::now() + lifetime,
        });
        Ok(body.tenant_access_token)
    }

    /// Renders the message payload for one confirmation.
    fn render(&self, input: &DeliverInput) -> (&'static str, String) {
        let summary =
            if input.options.summary.is_empty() { &input.object.summary } else { &input.options.summary };
        if self.config.use_card_delivery {
            let card = approval_card(&input.object, summary, &self.config.gateway_base_url);
            ("interactive", card.to_string())
        } else {
            let (approve, reject) = approval_links(&self.config.gateway_base_url, &input.object.id);
            let text = format!("{summary}\napprove: {approve}\nreject: {reject}");
            ("text", json!({ "text": text }).to_string())
        }
    }

    /// Sends one message, retrying with exponential backoff.
    async fn send_with_retry(
        &self,
        receive_id_type: &str,
        receive_id: &str,
        msg_type: &str,
        content: &str,
    ) -> Result<(), DeliveryError> {
        let gaps = backoff_schedule(self.config.retry_max_attempts(), self.config.retry_initial_backoff());
        let mut last_error = DeliveryError::Failed("no attempt made".to_string());
        for (attempt, gap) in
            gaps.iter().map(Some).chain(std::iter::once(None)).enumerate()
        {
            match self.send_once(receive_id_type, receive_id, msg_type, content).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    tracing::warn!(
                        receive_id,
                        attempt = attempt + 1,
                        error = %err,
                        "feishu send failed"
                    );
                    last_error = err;
                }
            }
            match gap {
                Some(gap) => tokio::time::sleep(*gap).await,
                None => break,
            }
        }
        Err(last_error)
    }

    /// Performs one message send.
    async fn send_once(
        &self,
        receive_id_type: &str,
        receive_id: &str,
        msg_type: &str,
        content: &str,
    ) -> Result<(), DeliveryError> {
        let token = self.tenant_token().await?;
        let url = format!(
            "{}/open-apis/im/v1/messages?receive_id_type={receive_id_type}",
            self.config.endpoint()
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&json!({
                "receive_id": receive_id,
                "msg_type": msg_type,
                "content": content,
            }))
            .send()
            .await
            .map_err(|err| DeliveryError::Failed(format!("send request: {err}")))?;
        let body: SendResponse = response
            .json()
            .await
            .map_err(|err| DeliveryError::Failed(format!("send decode: {err}")))?;
        if body.code != 0 {
            return Err(DeliveryError::Failed(format!("send rejected: {} {}", body.code, body.msg)));
        }
        Ok(())
    }
}

#[async_trait]
impl DeliveryProvider for FeishuProvider {
    async fn deliver(&self, input: &DeliverInput) -> Result<(), DeliveryError> {
        let targets = if input.options.confirmer_ids.is_empty() {
            self.config.approval_user_ids.clone()
        } else {
            input.options.confirmer_ids.clone()
        };
        if targets.is_empty() && self.config.chat_id.is_empty() {
            return Err(DeliveryError::Failed(
                "no approver ids and no fallback chat configured".to_string(),
            ));
        }
        let (msg_type, content) = self.render(input);

        let mut delivered = 0_usize;
        for target in &targets {
            match self
                .send_with_retry(self.config.receive_id_type(), target, msg_type, &content)
                .await
            {
                Ok(()) => delivered += 1,
                Err(err) => {
                    tracing::warn!(id = %input.object.id, target = %target, error = %err, "direct delivery failed");
                }
            }
        }
        if delivered > 0 {
            return Ok(());
        }
        // Every direct target failed; fall back to the group chat when one is
        // configured.
        if !self.config.chat_id.is_empty() {
            return self
                .send_with_retry("chat_id", &self.config.chat_id, msg_type, &content)
                .await;
        }
        Err(DeliveryError::Failed("all deliveries failed".to_string()))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions."
    )]

    use super::*;

    #[test]
    fn backoff_doubles_from_initial() {
        let gaps = backoff_schedule(4, Duration::from_secs(1));
        assert_eq!(
            gaps,
            vec![Duration::from_secs(1), Duration::from_secs(2), Duration::from_secs(4)]
        );
        assert!(backoff_schedule(1, Duration::from_secs(1)).is_empty());
        assert!(backoff_schedule(0, Duration::from_secs(1)).is_empty());
    }

    #[test]
    fn config_defaults_apply_for_zero_values() {
        let config = FeishuProviderConfig::default();
        assert_eq!(config.endpoint(), DEFAULT_ENDPOINT);
        assert_eq!(config.receive_id_type(), DEFAULT_RECEIVE_ID_TYPE);
        assert_eq!(config.retry_max_attempts(), 3);
        assert_eq!(config.retry_initial_backoff(), Duration::from_secs(1));
    }
}
