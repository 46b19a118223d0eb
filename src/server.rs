use crate::agent::LegalAssistant;
use crate::websocket::{ handle_connection, transport_config, ConnectionSettings };
use std::error::Error;
use std::num::NonZeroU32;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::net::{ TcpListener, TcpStream };
use tokio_tungstenite::accept_hdr_async_with_config;
use tokio_tungstenite::tungstenite::handshake::server::{ Request, Response, ErrorResponse };
use tokio_tungstenite::tungstenite::http::StatusCode;
use lazy_static::lazy_static;
use governor::{ RateLimiter, Quota, state::{ InMemoryState, NotKeyed }, clock::DefaultClock };

use log::{ info, warn, error, debug };

const CONNECTIONS_PER_SECOND: NonZeroU32 = NonZeroU32::MIN.saturating_add(9);

lazy_static! {
    static ref CONNECTION_LIMITER: RateLimiter<NotKeyed, InMemoryState, DefaultClock> = RateLimiter::direct(Quota::per_second(CONNECTIONS_PER_SECOND));
}

pub struct Server {
    addr: String,
    assistant: Arc<RwLock<LegalAssistant>>,
    api_key: Option<String>,
    settings: ConnectionSettings,
}

/// Reads the client key from the `X-API-Key` header, falling back to the
/// `api_key` query parameter.
fn provided_api_key(req: &Request) -> Option<String> {
    let header = req
        .headers()
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    if header.is_some() {
        return header;
    }

    req.uri()
        .query()?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == "api_key")
        .map(|(_, v)| v.to_string())
}

fn unauthorized() -> ErrorResponse {
    let mut resp = ErrorResponse::new(Some("Unauthorized".to_string()));
    *resp.status_mut() = StatusCode::UNAUTHORIZED;
    resp
}

impl Server {
    pub fn new(
        addr: String,
        assistant: LegalAssistant,
        api_key: Option<String>,
        prompts_path: Option<String>
    ) -> Self {
        let api_key = api_key.filter(|k| !k.trim().is_empty());

        if api_key.is_some() {
            info!("Server configured with API Key authentication.");
        } else {
            warn!("Server configured WITHOUT API Key authentication. Connections are open.");
        }

        Self {
            addr,
            assistant: Arc::new(RwLock::new(assistant)),
            api_key,
            settings: ConnectionSettings { prompts_path, ..Default::default() },
        }
    }

    pub fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.settings.max_message_size = max_message_size;
        self
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let listener = TcpListener::bind(&self.addr).await?;
        self.serve(listener).await
    }

    /// Accepts connections on an already bound listener.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), Box<dyn Error + Send + Sync>> {
        info!("WS server listening on: {}", listener.local_addr()?);

        loop {
            let (stream, peer) = listener.accept().await?;

            if CONNECTION_LIMITER.check().is_err() {
                warn!("Global connection rate limit exceeded for {}. Dropping connection.", peer);
                continue;
            }

            info!("Incoming connection from: {}", peer);
            let assistant = Arc::clone(&self.assistant);
            let required_api_key = self.api_key.clone();
            let settings = self.settings.clone();

            tokio::spawn(async move {
                if
                    let Err(e) = Self::process_connection(
                        peer,
                        stream,
                        assistant,
                        required_api_key,
                        settings
                    ).await
                {
                    error!("Failed to process connection for {}: {}", peer, e);
                }
            });
        }
    }

    async fn process_connection(
        peer: SocketAddr,
        stream: TcpStream,
        assistant: Arc<RwLock<LegalAssistant>>,
        required_api_key: Option<String>,
        settings: ConnectionSettings
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let auth_callback = |req: &Request, response: Response| -> Result<Response, ErrorResponse> {
            info!("Handshake from {}", peer);

            let Some(required) = required_api_key.as_deref() else {
                debug!("{} no API key required", peer);
                return Ok(response);
            };

            if provided_api_key(req).as_deref() != Some(required) {
                warn!("{}: bad or missing API key", peer);
                return Err(unauthorized());
            }
            info!("{} authenticated", peer);
            Ok(response)
        };

        match accept_hdr_async_with_config(stream, auth_callback, Some(transport_config())).await {
            Ok(ws) => {
                handle_connection(peer, ws, assistant, settings).await;
                Ok(())
            }
            Err(e) => {
                error!("Handshake failed for {}: {}", peer, e);
                Err(Box::new(e) as _)
            }
        }
    }
}
