use serde::{Deserialize, Serialize};

/// Plain-text transactional email, in the shape the mail relay accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub email: String,
    pub subject: String,
    pub message: String,
}
