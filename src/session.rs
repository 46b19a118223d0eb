use std::collections::HashMap;
use std::sync::atomic::{ AtomicBool, Ordering };
use std::sync::Arc;

use crate::agent::LegalAssistant;
use crate::history::{ build_history, DocumentContext };
use crate::models::chat::{ Conversation, Message };
use crate::models::content::Turn;
use crate::models::feature::Feature;

pub const CHAT_GREETING: &str =
    "Hello. I am U-Practice Assistant. How can I help you with your legal practice today?";

/// Held while a feature has a request in flight; releases the feature on drop.
#[derive(Debug)]
pub struct FeatureTicket {
    busy: Arc<AtomicBool>,
}

impl Drop for FeatureTicket {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// One in-flight request per feature. A second submission while busy is
/// refused, never queued, and nothing is cancelled.
#[derive(Debug, Clone)]
pub struct FeatureGuard {
    flags: Arc<HashMap<Feature, Arc<AtomicBool>>>,
}

impl FeatureGuard {
    pub fn new() -> Self {
        let flags = Feature::ALL
            .iter()
            .map(|f| (*f, Arc::new(AtomicBool::new(false))))
            .collect();
        Self { flags: Arc::new(flags) }
    }

    pub fn try_begin(&self, feature: Feature) -> Option<FeatureTicket> {
        let busy = self.flags.get(&feature)?;
        busy.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).ok()?;
        Some(FeatureTicket { busy: Arc::clone(busy) })
    }

    pub fn is_busy(&self, feature: Feature) -> bool {
        self.flags
            .get(&feature)
            .map(|b| b.load(Ordering::Acquire))
            .unwrap_or(false)
    }
}

impl Default for FeatureGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// A user message waiting for its reply, with the history that precedes it.
#[derive(Debug, Clone)]
pub struct PendingExchange {
    pub history: Vec<Turn>,
    pub message: String,
    pub document_chat: bool,
}

/// Conversation state for the general chat or a document chat.
#[derive(Debug, Clone)]
pub struct ChatSession {
    conversation: Conversation,
    document: Option<DocumentContext>,
    prior_analysis: Option<String>,
}

impl ChatSession {
    /// General chat, opened with the assistant greeting.
    pub fn general() -> Self {
        let mut conversation = Conversation::new();
        conversation.push(Message::model(CHAT_GREETING));
        Self { conversation, document: None, prior_analysis: None }
    }

    /// Q&A about a document and its earlier analysis.
    pub fn for_document(document: DocumentContext, prior_analysis: Option<String>) -> Self {
        Self {
            conversation: Conversation::new(),
            document: Some(document),
            prior_analysis,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn is_document_chat(&self) -> bool {
        self.document.is_some()
    }

    pub fn set_prior_analysis(&mut self, analysis: Option<String>) {
        self.prior_analysis = analysis;
    }

    /// Builds the history from the messages so far, then records `text` as the
    /// newest user message.
    pub fn begin(&mut self, text: &str) -> PendingExchange {
        let history = build_history(
            self.document.as_ref(),
            self.prior_analysis.as_deref(),
            self.conversation.messages()
        );
        self.conversation.push(Message::user(text));
        PendingExchange {
            history,
            message: text.to_string(),
            document_chat: self.is_document_chat(),
        }
    }

    pub fn complete(&mut self, reply: &str) {
        self.conversation.push(Message::model(reply));
    }

    pub async fn send(&mut self, assistant: &LegalAssistant, text: &str) -> String {
        let pending = self.begin(text);
        let reply = pending.dispatch(assistant).await;
        self.complete(&reply);
        reply
    }
}

impl PendingExchange {
    pub async fn dispatch(self, assistant: &LegalAssistant) -> String {
        if self.document_chat {
            assistant.send_document_chat_message(self.history, &self.message).await
        } else {
            assistant.send_chat_message(self.history, &self.message, None).await
        }
    }
}
