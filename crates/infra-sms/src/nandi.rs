// Nandi Mobile SMS gateway
// reason: reqwest form POST with a client-wide timeout bounds every send

use async_trait::async_trait;
use reqwest::Client;
use rubix_core::port::{DeliveryError, GatewayCredentials, SmsGateway};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_NANDI_BASE_URL: &str = "https://infoline.nandiclient.com";

/// Sends SMS through Nandi Mobile's campaign endpoint
pub struct NandiSmsGateway {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl NandiSmsGateway {
    /// Create a gateway client
    ///
    /// # Arguments
    /// * `base_url` - Gateway root, without trailing path
    /// * `timeout` - Bound on each send (connect + response)
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, DeliveryError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeliveryError::Request(format!("failed building HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// Campaign endpoint for an account
    fn endpoint(&self, username: &str) -> String {
        format!("{}/{}/campaigns/sendmsg", self.base_url, username)
    }

    /// Form fields expected by the gateway
    fn form<'a>(
        body: &'a str,
        recipient: &'a str,
        credentials: &'a GatewayCredentials,
    ) -> [(&'static str, &'a str); 5] {
        [
            ("username", credentials.username.as_str()),
            ("password", credentials.password.as_str()),
            ("numbers", recipient),
            ("message", body),
            ("from", credentials.sender_id.as_str()),
        ]
    }
}

#[async_trait]
impl SmsGateway for NandiSmsGateway {
    async fn send(
        &self,
        body: &str,
        recipient: &str,
        credentials: &GatewayCredentials,
    ) -> Result<(), DeliveryError> {
        let url = self.endpoint(&credentials.username);
        debug!(recipient, "Sending SMS via Nandi");

        let response = self
            .client
            .post(&url)
            .form(&Self::form(body, recipient, credentials))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::Timeout(self.timeout.as_millis() as u64)
                } else {
                    DeliveryError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let reason = response.text().await.unwrap_or_default();
            warn!(recipient, status = status.as_u16(), "Nandi rejected SMS");
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                reason,
            });
        }

        Ok(())
    }
}
