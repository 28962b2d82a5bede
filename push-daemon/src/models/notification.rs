use serde::{Deserialize, Serialize};
use validator::Validate;

/// Inbound body of `POST /send_notifications`.
///
/// Missing fields decode to their empty value; only the token list is
/// checked, since a request without a target cannot be addressed.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct NotificationRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "At least one device token is required"))]
    pub device_tokens: Vec<String>,
}

impl NotificationRequest {
    /// Builds the single provider message for this request.
    ///
    /// Only the first device token is addressed. Returns `None` when the token
    /// list is empty.
    pub fn to_push_message(&self) -> Option<PushMessage> {
        let token = self.device_tokens.first()?;
        Some(PushMessage {
            title: self.title.clone(),
            body: self.body.clone(),
            token: token.clone(),
        })
    }

    /// Number of tokens beyond the first, which are not addressed.
    pub fn ignored_tokens(&self) -> usize {
        self.device_tokens.len().saturating_sub(1)
    }
}

/// A notification addressed to exactly one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_wire_field_names() {
        let request: NotificationRequest = serde_json::from_str(
            r#"{"title":"Hi","body":"There","device_tokens":["tok-123","tok-456"]}"#,
        )
        .unwrap();

        assert_eq!(request.title, "Hi");
        assert_eq!(request.body, "There");
        assert_eq!(request.device_tokens, vec!["tok-123", "tok-456"]);
    }

    #[test]
    fn first_token_is_the_only_target() {
        let request = NotificationRequest {
            title: "Hi".to_string(),
            body: "There".to_string(),
            device_tokens: vec!["first".to_string(), "second".to_string()],
        };

        let message = request.to_push_message().unwrap();
        assert_eq!(message.token, "first");
        assert_eq!(request.ignored_tokens(), 1);
    }

    #[test]
    fn empty_token_list_fails_validation() {
        let request: NotificationRequest =
            serde_json::from_str(r#"{"title":"Hi","body":"There","device_tokens":[]}"#).unwrap();

        assert!(request.validate().is_err());
        assert!(request.to_push_message().is_none());
    }

    #[test]
    fn missing_token_field_fails_validation() {
        let request: NotificationRequest =
            serde_json::from_str(r#"{"title":"Hi","body":"There"}"#).unwrap();

        assert!(request.device_tokens.is_empty());
        assert!(request.validate().is_err());
    }

    #[test]
    fn wrong_token_type_is_rejected_by_decoder() {
        let result = serde_json::from_str::<NotificationRequest>(
            r#"{"title":"Hi","body":"There","device_tokens":"tok-123"}"#,
        );
        assert!(result.is_err());
    }
}
