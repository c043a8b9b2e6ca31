use serde::{Deserialize, Deserializer, Serialize};

use crate::{Error, Result};

/// Envelope returned by every token gateway endpoint.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    /// The backend sends this as either a JSON bool or a string such as `"true"`.
    #[serde(deserialize_with = "lenient_bool", default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ApiResponse {
    /// Extracts the token carried in `data`, failing when the envelope
    /// reports an error or carries no data.
    pub fn into_token(self) -> Result<String> {
        if !self.success {
            return Err(Error::gateway(
                self.error
                    .filter(|e| !e.is_empty())
                    .unwrap_or_else(|| "request was not successful".into()),
            ));
        }
        self.data
            .filter(|d| !d.is_empty())
            .ok_or_else(|| Error::gateway("response carried no token"))
    }
}

fn lenient_bool<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
        Null(Option<()>),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Text(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1" | "ok"),
        Flag::Null(_) => false,
    })
}

/// A chat line as exchanged between participants. Travels as JSON text
/// inside a single-chat text message.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub user: String,
    pub text: String,
}

impl ChatMessage {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Conversation type of an outbound chat message.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum ChatType {
    #[serde(rename = "singleChat")]
    Single,
    #[serde(rename = "groupChat")]
    Group,
}

/// Outbound text message handed to the chat SDK.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct OutboundText {
    #[serde(rename = "chatType")]
    pub chat_type: ChatType,
    #[serde(rename = "type")]
    pub kind: String,
    pub to: String,
    pub msg: String,
}

impl OutboundText {
    /// A plain text message addressed to a single target.
    pub fn single(to: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            chat_type: ChatType::Single,
            kind: "txt".into(),
            to: to.into(),
            msg: msg.into(),
        }
    }
}

/// Inbound text message delivered by the chat SDK.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct InboundText {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    pub msg: String,
}
