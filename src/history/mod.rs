//! Conversation context assembly.
//!
//! Every outgoing chat request carries the full context the model needs, rebuilt
//! from scratch: the document under discussion, the earlier single-shot analysis
//! of it, and every prior message of the conversation, in that order.

use crate::models::chat::{ Message, Role };
use crate::models::content::{ InlineData, Part, Turn };

pub const ANALYZE_CONTEXT_INSTRUCTION: &str = "Analyze the above document context.";
pub const NO_DOCUMENT_FALLBACK: &str = "No document provided, just general legal questions.";

/// Material a document chat is grounded in.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DocumentContext {
    pub image: Option<InlineData>,
    pub text: Option<String>,
}

impl DocumentContext {
    pub fn new(image: Option<InlineData>, text: Option<String>) -> Self {
        Self { image, text }
    }

    /// From user input: empty text means no text; anything else is kept as typed.
    pub fn from_input(image: Option<InlineData>, text: &str) -> Self {
        Self::new(image, Some(text.to_string()).filter(|t| !t.is_empty()))
    }

    pub fn is_empty(&self) -> bool {
        self.image.is_none() && self.document_text().is_none()
    }

    fn document_text(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.is_empty())
    }

    /// The opening user turn: image, then text, then the instruction; or the
    /// fallback part alone when there is no material.
    pub fn to_turn(&self) -> Turn {
        let mut parts = Vec::with_capacity(3);
        if let Some(image) = &self.image {
            parts.push(Part::InlineData(image.clone()));
        }
        if let Some(text) = self.document_text() {
            parts.push(Part::Text(format!("Document Content:\n{}", text)));
        }
        if parts.is_empty() {
            parts.push(Part::text(NO_DOCUMENT_FALLBACK));
        } else {
            parts.push(Part::text(ANALYZE_CONTEXT_INSTRUCTION));
        }
        Turn::new(Role::User, parts)
    }
}

/// Builds the history sent ahead of a new user message. No truncation: every
/// prior message is included.
pub fn build_history(
    document: Option<&DocumentContext>,
    prior_analysis: Option<&str>,
    messages: &[Message]
) -> Vec<Turn> {
    let mut history = Vec::with_capacity(messages.len() + 2);

    if let Some(document) = document {
        history.push(document.to_turn());
    }

    if let Some(analysis) = prior_analysis.filter(|a| !a.is_empty()) {
        history.push(Turn::model_text(analysis));
    }

    history.extend(messages.iter().map(|msg| Turn::new(msg.role, vec![Part::text(msg.text.clone())])));

    history
}
