use base64::{ engine::general_purpose::STANDARD, Engine as _ };
use serde::{ Serialize, Deserialize };

use super::chat::Role;

/// Binary payload with its declared media type. Raw bytes; base64 only on the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineData {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl InlineData {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self { mime_type: mime_type.into(), data }
    }

    /// Parses a `data:<mime>;base64,<payload>` URL. Anything else yields `None`.
    pub fn from_data_url(url: &str) -> Option<Self> {
        let rest = url.strip_prefix("data:")?;
        let (mime_type, payload) = rest.split_once(";base64,")?;
        if mime_type.is_empty() || payload.is_empty() {
            return None;
        }
        let data = STANDARD.decode(payload.trim()).ok()?;
        Some(Self::new(mime_type, data))
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.data)
    }

    pub fn from_base64(mime_type: impl Into<String>, encoded: &str) -> Result<Self, base64::DecodeError> {
        Ok(Self::new(mime_type, STANDARD.decode(encoded)?))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Part {
    Text(String),
    InlineData(InlineData),
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text(text.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text(text) => Some(text),
            Part::InlineData(_) => None,
        }
    }
}

/// One role-tagged unit of conversation content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Turn {
    pub fn new(role: Role, parts: Vec<Part>) -> Self {
        Self { role, parts }
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![Part::text(text)])
    }

    pub fn model_text(text: impl Into<String>) -> Self {
        Self::new(Role::Model, vec![Part::text(text)])
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingSource {
    pub title: String,
    pub uri: String,
}
