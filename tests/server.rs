//! WebSocket sessions against a server on a local port.

use std::sync::atomic::{ AtomicUsize, Ordering };
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{ SinkExt, StreamExt };
use tokio::net::{ TcpListener, TcpStream };
use tokio::sync::Semaphore;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{ HeaderValue, StatusCode };
use tokio_tungstenite::tungstenite::{ Error as WsError, Message };
use tokio_tungstenite::{ connect_async, MaybeTlsStream, WebSocketStream };
use u_practice::agent::LegalAssistant;
use u_practice::config::prompt::PromptConfig;
use u_practice::llm::{ GatewayError, GenerateRequest, GenerateResponse, ModelGateway, ModelSettings };
use u_practice::models::feature::Feature;
use u_practice::models::websocket::{ ClientMessage, ServerMessage };
use u_practice::server::Server;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const ANSWER: &str = "Released answer.";

/// Holds every model call until a permit is added.
struct GatedGateway {
    gate: Semaphore,
    calls: AtomicUsize,
}

impl GatedGateway {
    fn closed() -> Arc<Self> {
        Arc::new(Self { gate: Semaphore::new(0), calls: AtomicUsize::new(0) })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelGateway for GatedGateway {
    async fn generate(&self, _request: GenerateRequest) -> Result<GenerateResponse, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.gate.acquire().await.expect("gate stays open").forget();
        Ok(GenerateResponse { text: Some(ANSWER.to_string()), ..Default::default() })
    }
}

async fn start_server(gateway: &Arc<GatedGateway>, api_key: Option<&str>, max_message_size: usize) -> String {
    let assistant = LegalAssistant::new(
        Arc::clone(gateway) as Arc<dyn ModelGateway>,
        Arc::new(PromptConfig::default()),
        ModelSettings::default()
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Server::new(
        addr.to_string(),
        assistant,
        api_key.map(str::to_string),
        None
    ).with_max_message_size(max_message_size);
    tokio::spawn(async move {
        let _ = server.serve(listener).await;
    });
    format!("ws://{}", addr)
}

async fn send(client: &mut Client, message: &ClientMessage) {
    let json = serde_json::to_string(message).unwrap();
    client.send(Message::Text(json)).await.unwrap();
}

async fn next_reply(client: &mut Client) -> ServerMessage {
    loop {
        let frame = tokio::time
            ::timeout(Duration::from_secs(5), client.next()).await
            .expect("reply in time")
            .expect("connection open")
            .expect("valid frame");
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

#[tokio::test]
async fn busy_feature_refuses_a_second_request() {
    let gateway = GatedGateway::closed();
    let url = start_server(&gateway, None, 1024 * 1024).await;
    let (mut client, _) = connect_async(url.as_str()).await.unwrap();

    let research = ClientMessage::Research { query: "Adverse possession in Lagos".to_string() };
    send(&mut client, &research).await;
    assert_eq!(next_reply(&mut client).await, ServerMessage::Processing { feature: Feature::Research });

    send(&mut client, &research).await;
    assert_eq!(next_reply(&mut client).await, ServerMessage::Busy { feature: Feature::Research });

    send(&mut client, &(ClientMessage::Lookup { term: "estoppel".to_string() })).await;
    assert_eq!(next_reply(&mut client).await, ServerMessage::Processing { feature: Feature::Lookup });

    gateway.gate.add_permits(2);
    let mut answered = Vec::new();
    for _ in 0..2 {
        match next_reply(&mut client).await {
            ServerMessage::Response { feature, content, .. } => {
                assert_eq!(content, ANSWER);
                answered.push(feature);
            }
            other => panic!("expected a response, got {:?}", other),
        }
    }
    answered.sort_by_key(|f| f.name());
    assert_eq!(answered, vec![Feature::Lookup, Feature::Research]);
    assert_eq!(gateway.calls(), 2);
}

#[tokio::test]
async fn blank_input_is_refused_without_taking_the_feature() {
    let gateway = GatedGateway::closed();
    let url = start_server(&gateway, None, 1024 * 1024).await;
    let (mut client, _) = connect_async(url.as_str()).await.unwrap();

    send(&mut client, &(ClientMessage::Chat { content: "   ".to_string() })).await;
    assert!(matches!(next_reply(&mut client).await, ServerMessage::Error { .. }));

    gateway.gate.add_permits(1);
    send(&mut client, &(ClientMessage::Chat { content: "Hello".to_string() })).await;
    assert_eq!(next_reply(&mut client).await, ServerMessage::Processing { feature: Feature::Chat });
    assert!(matches!(next_reply(&mut client).await, ServerMessage::Response { feature: Feature::Chat, .. }));
    assert_eq!(gateway.calls(), 1);
}

#[tokio::test]
async fn oversize_message_gets_an_error_and_keeps_the_connection() {
    let gateway = GatedGateway::closed();
    let url = start_server(&gateway, None, 1024).await;
    let (mut client, _) = connect_async(url.as_str()).await.unwrap();

    let analyze = ClientMessage::Analyze {
        text: "x".repeat(2048),
        image: None,
    };
    send(&mut client, &analyze).await;
    assert_eq!(next_reply(&mut client).await, ServerMessage::Error {
        message: "Message too large".to_string(),
    });

    send(&mut client, &(ClientMessage::Courts { search: None })).await;
    assert!(matches!(next_reply(&mut client).await, ServerMessage::Courts { ref entries } if !entries.is_empty()));
    assert_eq!(gateway.calls(), 0);
}

#[tokio::test]
async fn handshake_requires_the_server_api_key() {
    let gateway = GatedGateway::closed();
    let url = start_server(&gateway, Some("secret"), 1024 * 1024).await;

    match connect_async(url.as_str()).await {
        Err(WsError::Http(response)) => assert_eq!(response.status(), StatusCode::UNAUTHORIZED),
        Err(e) => panic!("unexpected error: {}", e),
        Ok(_) => panic!("connection without a key was accepted"),
    }

    let mut request = url.as_str().into_client_request().unwrap();
    request.headers_mut().insert("X-API-Key", HeaderValue::from_static("secret"));
    let (mut client, _) = connect_async(request).await.unwrap();
    send(&mut client, &ClientMessage::BlogList).await;
    assert!(matches!(next_reply(&mut client).await, ServerMessage::Blog { .. }));

    let with_query = format!("{}/?api_key=secret", url);
    assert!(connect_async(with_query.as_str()).await.is_ok());
}
