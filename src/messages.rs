//! Notification message payload exchanged with the mail boundary.

use serde::{Deserialize, Serialize};

/// Notification request payload. Field names are part of the wire contract.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMessage {
    /// Recipient address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    /// Sender address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Template name to render the body from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    /// Message subject
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Message body, literal or rendered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}
