// SMS Gateway Port
// The external service that actually transmits text to a phone number

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Account used to authenticate against the SMS provider
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayCredentials {
    pub sender_id: String,
    pub username: String,
    pub password: String,
}

impl GatewayCredentials {
    pub fn new(
        sender_id: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            sender_id: sender_id.into(),
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for GatewayCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayCredentials")
            .field("sender_id", &self.sender_id)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Delivery errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("Gateway request failed: {0}")]
    Request(String),

    #[error("Gateway rejected message with status {status}: {reason}")]
    Rejected { status: u16, reason: String },

    #[error("Gateway timed out after {0}ms")]
    Timeout(u64),
}

/// SMS gateway adapter
///
/// A single outbound call bounded by the adapter's own timeout.
#[async_trait]
pub trait SmsGateway: Send + Sync {
    async fn send(
        &self,
        body: &str,
        recipient: &str,
        credentials: &GatewayCredentials,
    ) -> Result<(), DeliveryError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// A message the mock gateway accepted
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct SentSms {
        pub recipient: String,
        pub body: String,
        pub sender_id: String,
    }

    /// Mock gateway behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Always deliver
        Success,
        /// Always fail with error
        Fail(DeliveryError),
        /// Fail the first N calls, then deliver
        FailTimes(usize),
    }

    /// Mock SMS gateway for testing
    pub struct MockSmsGateway {
        behavior: Arc<Mutex<MockBehavior>>,
        sent: Arc<Mutex<Vec<SentSms>>>,
        attempts: Arc<Mutex<VecDeque<String>>>,
        latency: Option<Duration>,
    }

    impl MockSmsGateway {
        pub fn new(behavior: MockBehavior) -> Self {
            Self {
                behavior: Arc::new(Mutex::new(behavior)),
                sent: Arc::new(Mutex::new(Vec::new())),
                attempts: Arc::new(Mutex::new(VecDeque::new())),
                latency: None,
            }
        }

        pub fn new_success() -> Self {
            Self::new(MockBehavior::Success)
        }

        pub fn new_fail(message: impl Into<String>) -> Self {
            Self::new(MockBehavior::Fail(DeliveryError::Request(message.into())))
        }

        /// Delay every send (for concurrency tests)
        pub fn with_latency(mut self, latency: Duration) -> Self {
            self.latency = Some(latency);
            self
        }

        pub fn sent(&self) -> Vec<SentSms> {
            self.sent.lock().unwrap().clone()
        }

        /// Recipients of every attempt, successful or not
        pub fn attempts(&self) -> Vec<String> {
            self.attempts.lock().unwrap().iter().cloned().collect()
        }

        pub fn call_count(&self) -> usize {
            self.attempts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl SmsGateway for MockSmsGateway {
        async fn send(
            &self,
            body: &str,
            recipient: &str,
            credentials: &GatewayCredentials,
        ) -> Result<(), DeliveryError> {
            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }
            self.attempts
                .lock()
                .unwrap()
                .push_back(recipient.to_string());

            let outcome = {
                let mut behavior = self.behavior.lock().unwrap();
                match &mut *behavior {
                    MockBehavior::Success => Ok(()),
                    MockBehavior::Fail(err) => Err(err.clone()),
                    MockBehavior::FailTimes(remaining) if *remaining > 0 => {
                        *remaining -= 1;
                        Err(DeliveryError::Request("transient failure".to_string()))
                    }
                    MockBehavior::FailTimes(_) => Ok(()),
                }
            };

            if outcome.is_ok() {
                self.sent.lock().unwrap().push(SentSms {
                    recipient: recipient.to_string(),
                    body: body.to_string(),
                    sender_id: credentials.sender_id.clone(),
                });
            }
            outcome
        }
    }
}
