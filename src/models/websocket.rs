use serde::{ Serialize, Deserialize };

use super::content::GroundingSource;
use super::feature::Feature;
use crate::records::blog::BlogPost;
use crate::records::courts::CourtInfo;
use crate::records::vault::LegalDoc;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Research {
        query: String,
    },
    /// `image` is a `data:<mime>;base64,<payload>` URL.
    Analyze {
        #[serde(default)]
        text: String,
        #[serde(default)]
        image: Option<String>,
    },
    DocumentChat {
        content: String,
    },
    Predict {
        facts: String,
    },
    Draft {
        document_type: String,
        details: String,
    },
    Chat {
        content: String,
    },
    Lookup {
        term: String,
    },
    News,
    Blog {
        topic: String,
    },
    Speak {
        text: String,
    },
    Courts {
        #[serde(default)]
        search: Option<String>,
    },
    VaultList,
    VaultAdd {
        #[serde(default)]
        title: Option<String>,
        #[serde(default = "default_doc_type")]
        doc_type: String,
    },
    VaultDelete {
        id: String,
    },
    BlogList,
}

fn default_doc_type() -> String {
    "PDF".to_string()
}

impl ClientMessage {
    /// The model-backed feature this message triggers, if any.
    pub fn feature(&self) -> Option<Feature> {
        match self {
            ClientMessage::Research { .. } => Some(Feature::Research),
            ClientMessage::Analyze { .. } => Some(Feature::Analysis),
            ClientMessage::DocumentChat { .. } => Some(Feature::DocumentChat),
            ClientMessage::Predict { .. } => Some(Feature::Prediction),
            ClientMessage::Draft { .. } => Some(Feature::Drafting),
            ClientMessage::Chat { .. } => Some(Feature::Chat),
            ClientMessage::Lookup { .. } => Some(Feature::Lookup),
            ClientMessage::News => Some(Feature::News),
            ClientMessage::Blog { .. } => Some(Feature::Blog),
            ClientMessage::Speak { .. } => Some(Feature::Speech),
            ClientMessage::Courts { .. }
            | ClientMessage::VaultList
            | ClientMessage::VaultAdd { .. }
            | ClientMessage::VaultDelete { .. }
            | ClientMessage::BlogList => None,
        }
    }

    /// The first required field left blank, if any. Such a request is refused
    /// before it reaches the model or the conversation log.
    pub fn blank_field(&self) -> Option<&'static str> {
        let blank = |value: &str| value.trim().is_empty();
        match self {
            ClientMessage::Research { query } if blank(query) => Some("query"),
            ClientMessage::DocumentChat { content } | ClientMessage::Chat { content } if
                blank(content)
            => Some("content"),
            ClientMessage::Predict { facts } if blank(facts) => Some("facts"),
            ClientMessage::Draft { document_type, .. } if blank(document_type) =>
                Some("document_type"),
            ClientMessage::Draft { details, .. } if blank(details) => Some("details"),
            ClientMessage::Lookup { term } if blank(term) => Some("term"),
            ClientMessage::Blog { topic } if blank(topic) => Some("topic"),
            ClientMessage::Speak { text } if blank(text) => Some("text"),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Processing {
        feature: Feature,
    },
    Busy {
        feature: Feature,
    },
    Response {
        feature: Feature,
        content: String,
        timestamp: i64,
    },
    News {
        content: String,
        sources: Vec<GroundingSource>,
        timestamp: i64,
    },
    /// Base64 WAV.
    Audio {
        mime_type: String,
        data: String,
    },
    Courts {
        entries: Vec<CourtEntry>,
    },
    Vault {
        documents: Vec<LegalDoc>,
    },
    Blog {
        posts: Vec<BlogPost>,
    },
    Error {
        message: String,
    },
}

/// Owned copy of a directory entry for the wire.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CourtEntry {
    pub name: String,
    pub jurisdiction: String,
    pub kind: String,
    pub location: String,
}

impl From<&CourtInfo> for CourtEntry {
    fn from(court: &CourtInfo) -> Self {
        Self {
            name: court.name.to_string(),
            jurisdiction: court.jurisdiction.to_string(),
            kind: format!("{:?}", court.kind),
            location: court.location.to_string(),
        }
    }
}
