use crate::agent::LegalAssistant;
use crate::audio::speech_excerpt;
use crate::history::DocumentContext;
use crate::models::content::InlineData;
use crate::models::websocket::{ ClientMessage, CourtEntry, ServerMessage };
use crate::records::blog::BlogBoard;
use crate::records::courts;
use crate::records::vault::DocumentVault;
use crate::session::{ ChatSession, FeatureGuard };
use base64::{ engine::general_purpose::STANDARD, Engine as _ };
use chrono::Utc;
use futures::{ SinkExt, StreamExt };
use log::{ debug, info, warn, error };
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{ AsyncRead, AsyncWrite };
use tokio::sync::{ mpsc, Mutex, RwLock };
use tokio_tungstenite::{
    tungstenite::protocol::{ Message, WebSocketConfig },
    WebSocketStream,
};
use uuid::Uuid;

/// Application limit on one client message; larger ones get an `error` reply.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 32 * 1024 * 1024;
/// Transport ceiling; tungstenite drops the connection above this.
const TRANSPORT_MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;
const OUTBOUND_BUFFER: usize = 32;
pub const BLOG_AUTHOR: &str = "U-Practice";

/// Per-connection state. Dropped with the connection.
pub struct ConnectionState {
    pub chat: ChatSession,
    pub document_chat: ChatSession,
    pub vault: DocumentVault,
    pub blog: BlogBoard,
}

impl ConnectionState {
    pub fn new() -> Self {
        Self {
            chat: ChatSession::general(),
            document_chat: ChatSession::for_document(DocumentContext::default(), None),
            vault: DocumentVault::with_samples(),
            blog: BlogBoard::with_samples(),
        }
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-server options every connection shares.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub prompts_path: Option<String>,
    pub max_message_size: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self { prompts_path: None, max_message_size: DEFAULT_MAX_MESSAGE_SIZE }
    }
}

/// Handshake config with room for base64 document images in a single frame.
pub fn transport_config() -> WebSocketConfig {
    let mut config = WebSocketConfig::default();
    config.max_message_size = Some(TRANSPORT_MAX_MESSAGE_SIZE);
    config.max_frame_size = Some(TRANSPORT_MAX_MESSAGE_SIZE);
    config
}

fn blank_input_error(field: &str) -> ServerMessage {
    ServerMessage::Error {
        message: format!("'{}' must not be empty", field),
    }
}

fn to_frame(message: &ServerMessage) -> Option<Message> {
    match serde_json::to_string(message) {
        Ok(json) => Some(Message::Text(json)),
        Err(e) => {
            error!("Failed to serialize server message: {}", e);
            None
        }
    }
}

fn timestamp() -> i64 {
    Utc::now().timestamp()
}

/// Handles messages that need no model call.
pub fn handle_local(message: &ClientMessage, state: &mut ConnectionState) -> Option<ServerMessage> {
    match message {
        ClientMessage::Courts { search } => {
            let entries = courts
                ::search(search.as_deref().unwrap_or_default())
                .into_iter()
                .map(CourtEntry::from)
                .collect();
            Some(ServerMessage::Courts { entries })
        }
        ClientMessage::VaultList => Some(ServerMessage::Vault { documents: state.vault.list().to_vec() }),
        ClientMessage::VaultAdd { title, doc_type } => {
            state.vault.upload(title.as_deref(), doc_type);
            Some(ServerMessage::Vault { documents: state.vault.list().to_vec() })
        }
        ClientMessage::VaultDelete { id } => {
            if state.vault.delete(id).is_none() {
                return Some(ServerMessage::Error {
                    message: format!("No document with id '{}'", id),
                });
            }
            Some(ServerMessage::Vault { documents: state.vault.list().to_vec() })
        }
        ClientMessage::BlogList => Some(ServerMessage::Blog { posts: state.blog.posts().to_vec() }),
        _ => None,
    }
}

/// Runs one model-backed request to completion. The state lock is never held
/// across a model call.
pub async fn run_feature(
    message: ClientMessage,
    assistant: LegalAssistant,
    state: Arc<Mutex<ConnectionState>>
) -> ServerMessage {
    let Some(feature) = message.feature() else {
        return ServerMessage::Error {
            message: "Message does not name a feature".to_string(),
        };
    };
    if let Some(field) = message.blank_field() {
        return blank_input_error(field);
    }

    let content = match message {
        ClientMessage::Research { query } => assistant.conduct_deep_research(&query).await,
        ClientMessage::Analyze { text, image } => {
            let image = image.as_deref().and_then(|url| {
                let parsed = InlineData::from_data_url(url);
                if parsed.is_none() {
                    warn!("Ignoring image that is not a base64 data URL");
                }
                parsed
            });
            let document = DocumentContext::from_input(image.clone(), &text);
            state.lock().await.document_chat = ChatSession::for_document(document, None);

            let analysis = assistant.analyze_document(&text, image.as_ref()).await;
            state.lock().await.document_chat.set_prior_analysis(Some(analysis.clone()));
            analysis
        }
        ClientMessage::DocumentChat { content } => {
            let pending = state.lock().await.document_chat.begin(&content);
            let reply = pending.dispatch(&assistant).await;
            state.lock().await.document_chat.complete(&reply);
            reply
        }
        ClientMessage::Chat { content } => {
            let pending = state.lock().await.chat.begin(&content);
            let reply = pending.dispatch(&assistant).await;
            state.lock().await.chat.complete(&reply);
            reply
        }
        ClientMessage::Predict { facts } => assistant.predict_case_outcome(&facts).await,
        ClientMessage::Draft { document_type, details } =>
            assistant.draft_legal_document(&document_type, &details).await,
        ClientMessage::Lookup { term } => assistant.quick_legal_lookup(&term).await,
        ClientMessage::Blog { topic } => {
            let article = assistant.write_blog_article(&topic).await;
            state.lock().await.blog.publish(&topic, BLOG_AUTHOR, &article);
            article
        }
        ClientMessage::News => {
            let news = assistant.get_legal_news().await;
            return ServerMessage::News {
                content: news.content,
                sources: news.sources,
                timestamp: timestamp(),
            };
        }
        ClientMessage::Speak { text } => {
            return match assistant.generate_speech(&speech_excerpt(&text)).await {
                Some(clip) =>
                    ServerMessage::Audio {
                        mime_type: "audio/wav".to_string(),
                        data: STANDARD.encode(clip.to_wav()),
                    },
                None =>
                    ServerMessage::Error {
                        message: "Unable to generate speech.".to_string(),
                    },
            };
        }
        ClientMessage::Courts { .. }
        | ClientMessage::VaultList
        | ClientMessage::VaultAdd { .. }
        | ClientMessage::VaultDelete { .. }
        | ClientMessage::BlogList => {
            return ServerMessage::Error {
                message: "Message does not name a feature".to_string(),
            };
        }
    };

    ServerMessage::Response { feature, content, timestamp: timestamp() }
}

pub async fn handle_connection<S>(
    peer: SocketAddr,
    websocket: WebSocketStream<S>,
    agent: Arc<RwLock<LegalAssistant>>,
    settings: ConnectionSettings
)
    where S: AsyncRead + AsyncWrite + Unpin + Send + 'static
{
    info!("New WebSocket connection: {}", peer);

    if let Some(path) = &settings.prompts_path {
        if let Err(e) = agent.write().await.reload_prompts_if_changed(path) {
            error!("Failed to reload prompts: {}", e);
        }
    }

    let (mut sink, mut rx) = websocket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<Message>(OUTBOUND_BUFFER);
    let conversation_id = Uuid::new_v4().to_string();
    info!("Assigned conversation ID {} to {}", conversation_id, peer);

    let writer = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            if let Err(e) = sink.send(frame).await {
                error!("Error sending message to {}: {}", peer, e);
                break;
            }
        }
    });

    let state = Arc::new(Mutex::new(ConnectionState::new()));
    let guard = FeatureGuard::new();

    while let Some(msg) = rx.next().await {
        let message = match msg {
            Ok(message) => message,
            Err(e) => {
                match e {
                    | tokio_tungstenite::tungstenite::Error::ConnectionClosed
                    | tokio_tungstenite::tungstenite::Error::Protocol(_)
                    | tokio_tungstenite::tungstenite::Error::Utf8 => {
                        info!("WebSocket connection closed or protocol error for {}: {}", peer, e);
                    }
                    tokio_tungstenite::tungstenite::Error::Io(ref io_err) if
                        io_err.kind() == std::io::ErrorKind::ConnectionReset
                    => {
                        info!("WebSocket connection reset by peer {}", peer);
                    }
                    _ => {
                        error!("Error receiving message from {}: {}", peer, e);
                    }
                }
                break;
            }
        };

        if message.len() > settings.max_message_size {
            warn!(
                "Message from {} exceeds size limit ({} > {})",
                peer,
                message.len(),
                settings.max_message_size
            );
            let error_msg = ServerMessage::Error {
                message: "Message too large".to_string(),
            };
            if let Some(frame) = to_frame(&error_msg) {
                if out_tx.send(frame).await.is_err() {
                    break;
                }
            }
            continue;
        }

        match message {
            Message::Text(text) => {
                let client_msg = match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(client_msg) => client_msg,
                    Err(e) => {
                        error!("Failed to parse message from {}: {}", peer, e);
                        let error_msg = ServerMessage::Error {
                            message: format!("Failed to parse message: {}", e),
                        };
                        if let Some(frame) = to_frame(&error_msg) {
                            if out_tx.send(frame).await.is_err() {
                                break;
                            }
                        }
                        continue;
                    }
                };

                let Some(feature) = client_msg.feature() else {
                    let reply = handle_local(&client_msg, &mut *state.lock().await);
                    if let Some(frame) = reply.as_ref().and_then(to_frame) {
                        if out_tx.send(frame).await.is_err() {
                            break;
                        }
                    }
                    continue;
                };

                if let Some(field) = client_msg.blank_field() {
                    debug!("Blank '{}' in {} request from {}", field, feature, peer);
                    if let Some(frame) = to_frame(&blank_input_error(field)) {
                        if out_tx.send(frame).await.is_err() {
                            break;
                        }
                    }
                    continue;
                }

                let Some(ticket) = guard.try_begin(feature) else {
                    debug!("{} is busy for {}", feature, peer);
                    if let Some(frame) = to_frame(&(ServerMessage::Busy { feature })) {
                        if out_tx.send(frame).await.is_err() {
                            break;
                        }
                    }
                    continue;
                };

                if let Some(frame) = to_frame(&(ServerMessage::Processing { feature })) {
                    if out_tx.send(frame).await.is_err() {
                        break;
                    }
                }

                let assistant = agent.read().await.clone();
                let state = Arc::clone(&state);
                let out_tx = out_tx.clone();
                tokio::spawn(async move {
                    let _ticket = ticket;
                    let reply = run_feature(client_msg, assistant, state).await;
                    if let Some(frame) = to_frame(&reply) {
                        if out_tx.send(frame).await.is_err() {
                            debug!("Connection {} gone before {} finished", peer, feature);
                        }
                    }
                });
            }
            Message::Close(_) => {
                info!("Received close frame from {}", peer);
                break;
            }
            Message::Ping(ping_data) => {
                if out_tx.send(Message::Pong(ping_data)).await.is_err() {
                    error!("Failed to send pong to {}", peer);
                    break;
                }
            }
            Message::Pong(_) => {}
            Message::Binary(_) => {
                warn!("Ignoring binary message from {}", peer);
            }
            Message::Frame(_) => {}
        }
    }

    drop(out_tx);
    if let Err(e) = writer.await {
        error!("Writer task for {} failed: {}", peer, e);
    }
    info!("WebSocket connection closed for {} (Conv ID: {})", peer, conversation_id);
}
