// Notification Message - wire format shared by publisher and SMS worker
//
// Payload layout: "<recipient>#<body>" as UTF-8 text.

use super::error::{DomainError, Result};
use serde::{Deserialize, Serialize};

/// Separates recipient from body in an encoded payload
pub const MESSAGE_DELIMITER: char = '#';

/// Outbound SMS handed to the broker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub recipient: String,
    pub body: String,
}

impl NotificationMessage {
    /// Build a message, rejecting fields that would not survive `decode`
    pub fn new(recipient: impl Into<String>, body: impl Into<String>) -> Result<Self> {
        let recipient = recipient.into();
        let body = body.into();

        if recipient.is_empty() {
            return Err(DomainError::ValidationError(
                "recipient must not be empty".to_string(),
            ));
        }
        if recipient.contains(MESSAGE_DELIMITER) || body.contains(MESSAGE_DELIMITER) {
            return Err(DomainError::ValidationError(format!(
                "recipient and body must not contain '{}'",
                MESSAGE_DELIMITER
            )));
        }

        Ok(Self { recipient, body })
    }

    /// Message telling a customer which ticket they hold
    pub fn ticket_issued(recipient: impl Into<String>, ticket: &str) -> Result<Self> {
        Self::new(
            recipient,
            format!("Ticket number {}. Kindly wait for your turn.", ticket),
        )
    }

    pub fn encode(&self) -> String {
        format!("{}{}{}", self.recipient, MESSAGE_DELIMITER, self.body)
    }

    /// Parse a payload produced by `encode`
    ///
    /// Exactly one delimiter is accepted and the recipient must be non-empty.
    pub fn decode(payload: &str) -> Result<Self> {
        let (recipient, body) = payload.split_once(MESSAGE_DELIMITER).ok_or_else(|| {
            DomainError::MalformedMessage(format!("missing '{}' delimiter", MESSAGE_DELIMITER))
        })?;

        if recipient.is_empty() {
            return Err(DomainError::MalformedMessage(
                "empty recipient".to_string(),
            ));
        }
        if body.contains(MESSAGE_DELIMITER) {
            return Err(DomainError::MalformedMessage(format!(
                "more than one '{}' delimiter",
                MESSAGE_DELIMITER
            )));
        }

        Ok(Self {
            recipient: recipient.to_string(),
            body: body.to_string(),
        })
    }

    /// Decode raw broker bytes (must be UTF-8)
    pub fn decode_bytes(payload: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(payload)
            .map_err(|e| DomainError::MalformedMessage(format!("payload is not UTF-8: {}", e)))?;
        Self::decode(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_known_payload() {
        let msg = NotificationMessage::decode(
            "+233200000000#Ticket number A007. Kindly wait for your turn.",
        )
        .unwrap();
        assert_eq!(msg.recipient, "+233200000000");
        assert_eq!(msg.body, "Ticket number A007. Kindly wait for your turn.");
    }

    #[test]
    fn test_ticket_issued_text() {
        let msg = NotificationMessage::ticket_issued("+233200000000", "A007").unwrap();
        assert_eq!(
            msg.encode(),
            "+233200000000#Ticket number A007. Kindly wait for your turn."
        );
        assert_eq!(NotificationMessage::decode(&msg.encode()).unwrap(), msg);
    }

    #[test]
    fn test_empty_body_is_allowed() {
        let msg = NotificationMessage::decode("+233200000000#").unwrap();
        assert_eq!(msg.body, "");
    }

    #[test]
    fn test_new_rejects_delimiter_in_fields() {
        assert!(NotificationMessage::new("+233#1", "hi").is_err());
        assert!(NotificationMessage::new("+233", "issue #4").is_err());
        assert!(NotificationMessage::new("", "hi").is_err());
    }

    #[test]
    fn test_decode_missing_delimiter() {
        let err = NotificationMessage::decode("+233200000000 no delimiter").unwrap_err();
        assert!(matches!(err, DomainError::MalformedMessage(_)));
        assert!(err.to_string().contains("delimiter"));
    }

    #[test]
    fn test_decode_rejects_empty_recipient_and_extra_delimiter() {
        assert!(NotificationMessage::decode("#body").is_err());
        assert!(NotificationMessage::decode("+233#body#tail").is_err());
    }

    #[test]
    fn test_decode_bytes_rejects_invalid_utf8() {
        let err = NotificationMessage::decode_bytes(&[0xff, b'#', b'x']).unwrap_err();
        assert!(err.to_string().contains("UTF-8"));
    }
}
