//! HttpDeliveryChannel - reqwest による本番用の DeliveryChannel
//!
//! One pooled `reqwest::Client` per channel. `reqwest::Client` is cheap to
//! share across tasks, so workers and `publish_force` call `send` without
//! any extra locking.

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::{Envelope, Settings, TransportError};
use crate::ports::{DeliveryChannel, DeliveryResponse, SUCCESS_STATUS};

/// Header carrying the access token.
pub const TOKEN_HEADER: &str = "token";

#[derive(Debug, Clone)]
pub struct HttpDeliveryChannel {
    client: reqwest::Client,
    url: String,
}

impl HttpDeliveryChannel {
    /// Build the channel from settings: endpoint, token header, timeout and
    /// TLS verification.
    pub fn new(settings: &Settings) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        let token = HeaderValue::from_str(&settings.access_token)
            .map_err(|e| TransportError::Other(format!("invalid access token header: {e}")))?;
        headers.insert(TOKEN_HEADER, token);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(settings.request_timeout)
            .danger_accept_invalid_certs(!settings.verify_tls)
            .build()
            .map_err(|e| TransportError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: settings.publish_url(),
        })
    }
}

#[async_trait]
impl DeliveryChannel for HttpDeliveryChannel {
    async fn send(&self, envelope: &Envelope) -> Result<DeliveryResponse, TransportError> {
        debug!(
            message_id = %envelope.id(),
            topics = envelope.len(),
            url = %self.url,
            "posting envelope"
        );

        let response = self
            .client
            .post(&self.url)
            .json(envelope)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(classify)?;

        if status == SUCCESS_STATUS {
            let body = serde_json::from_str(&text).map_err(|e| TransportError::Decode {
                status,
                message: e.to_string(),
            })?;
            return Ok(DeliveryResponse::new(status, body));
        }

        warn!(message_id = %envelope.id(), status, "broker returned incorrect response");
        // 失敗レスポンスの body は JSON とは限らない
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);
        Ok(DeliveryResponse::new(status, body))
    }
}

fn classify(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else {
        TransportError::Other(e.to_string())
    }
}
