//! Feature calls against a mocked Gemini REST endpoint.

use std::sync::Arc;

use base64::{ engine::general_purpose::STANDARD, Engine as _ };
use serde_json::{ json, Value };
use u_practice::agent::LegalAssistant;
use u_practice::config::prompt::{ PromptConfig, DOCUMENT_CHAT_INSTRUCTION };
use u_practice::history::DocumentContext;
use u_practice::llm::gemini::GeminiClient;
use u_practice::llm::{ GatewayError, GenerateRequest, ModelGateway, ModelSettings };
use u_practice::models::feature::Feature;
use u_practice::session::ChatSession;
use wiremock::matchers::{ body_partial_json, method, path, path_regex, query_param };
use wiremock::{ Mock, MockServer, ResponseTemplate };

const API_KEY: &str = "test-key";
const ANY_MODEL: &str = r"^/v1beta/models/[^/]+:generateContent$";

fn assistant_for(server: &MockServer, api_key: Option<&str>) -> LegalAssistant {
    let gateway = GeminiClient::new(
        api_key.map(str::to_string),
        Some(format!("{}/v1beta", server.uri()))
    ).expect("valid base url");
    LegalAssistant::new(
        Arc::new(gateway),
        Arc::new(PromptConfig::default()),
        ModelSettings::default()
    )
}

fn text_reply(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(
        json!({
            "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] } }]
        })
    )
}

async fn sent_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests().await
        .unwrap_or_default()
        .iter()
        .map(|r| serde_json::from_slice(&r.body).expect("json body"))
        .collect()
}

#[tokio::test]
async fn research_uses_pro_model_with_thinking_budget() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-3-pro-preview:generateContent"))
        .and(query_param("key", API_KEY))
        .and(body_partial_json(json!({ "generationConfig": { "thinkingConfig": { "thinkingBudget": 32768 } } })))
        .respond_with(text_reply("Under section 39 of the Constitution..."))
        .expect(1)
        .mount(&server).await;

    let assistant = assistant_for(&server, Some(API_KEY));
    let answer = assistant.conduct_deep_research("freedom of expression").await;
    assert_eq!(answer, "Under section 39 of the Constitution...");

    let bodies = sent_bodies(&server).await;
    let prompt = bodies[0]["contents"][0]["parts"][0]["text"].as_str().unwrap();
    assert!(prompt.contains("freedom of expression"));
    assert_eq!(bodies[0]["contents"][0]["role"], "user");
}

#[tokio::test]
async fn lookup_uses_lite_model_without_generation_config() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-flash-lite-latest:generateContent"))
        .respond_with(text_reply("Estoppel: a rule of evidence..."))
        .expect(1)
        .mount(&server).await;

    let assistant = assistant_for(&server, Some(API_KEY));
    assert_eq!(assistant.quick_legal_lookup("estoppel").await, "Estoppel: a rule of evidence...");

    let bodies = sent_bodies(&server).await;
    assert!(bodies[0].get("generationConfig").is_none());
    assert!(bodies[0].get("tools").is_none());
}

#[tokio::test]
async fn server_errors_become_feature_fallbacks() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(ANY_MODEL))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .mount(&server).await;

    let assistant = assistant_for(&server, Some(API_KEY));
    assert_eq!(assistant.conduct_deep_research("q").await, Feature::Research.fallback_text());
    assert_eq!(assistant.analyze_document("text", None).await, Feature::Analysis.fallback_text());
    assert_eq!(assistant.predict_case_outcome("facts").await, Feature::Prediction.fallback_text());
    assert_eq!(
        assistant.draft_legal_document("Tenancy Agreement", "details").await,
        Feature::Drafting.fallback_text()
    );
    assert_eq!(assistant.quick_legal_lookup("term").await, Feature::Lookup.fallback_text());
    assert_eq!(assistant.write_blog_article("topic").await, Feature::Blog.fallback_text());
    assert_eq!(
        assistant.send_chat_message(Vec::new(), "hello", None).await,
        "I am currently unable to respond."
    );

    let news = assistant.get_legal_news().await;
    assert_eq!(news.content, Feature::News.fallback_text());
    assert!(news.sources.is_empty());

    assert!(assistant.generate_speech("Read this").await.is_none());
}

#[tokio::test]
async fn status_error_keeps_the_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(ANY_MODEL))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota exhausted"))
        .mount(&server).await;

    let client = GeminiClient::new(Some(API_KEY.to_string()), Some(format!("{}/v1beta", server.uri()))).unwrap();
    let err = client.generate(GenerateRequest::prompt("gemini-2.5-flash", "hi")).await.unwrap_err();
    match err {
        GatewayError::Status { status, body } => {
            assert_eq!(status.as_u16(), 429);
            assert_eq!(body, "quota exhausted");
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn missing_api_key_falls_back_without_a_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(ANY_MODEL))
        .respond_with(text_reply("should not be used"))
        .expect(0)
        .mount(&server).await;

    let assistant = assistant_for(&server, None);
    assert_eq!(assistant.quick_legal_lookup("lien").await, Feature::Lookup.fallback_text());
    assert_eq!(assistant.get_legal_news().await.content, Feature::News.fallback_text());
}

#[tokio::test]
async fn empty_answers_use_the_empty_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(ANY_MODEL))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
        .mount(&server).await;

    let assistant = assistant_for(&server, Some(API_KEY));
    assert_eq!(assistant.conduct_deep_research("q").await, "No results found.");
    assert_eq!(assistant.predict_case_outcome("facts").await, "Prediction unavailable.");
    assert_eq!(assistant.quick_legal_lookup("term").await, "Definition not found.");
    assert_eq!(assistant.get_legal_news().await.content, "No news found.");
}

#[tokio::test]
async fn news_is_search_grounded_and_lists_sources() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
        .and(body_partial_json(json!({ "tools": [{ "googleSearch": {} }] })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(
                json!({
                "candidates": [{
                    "content": { "parts": [
                        { "text": "planning the summary", "thought": true },
                        { "text": "1. Supreme Court ruling on " },
                        { "text": "local government autonomy." }
                    ] },
                    "groundingMetadata": { "groundingChunks": [
                        { "web": { "title": "Premium Times", "uri": "https://example.ng/a" } },
                        { "web": { "title": "", "uri": "https://example.ng/b" } },
                        { "retrievedContext": {} }
                    ] }
                }]
            })
            )
        )
        .expect(1)
        .mount(&server).await;

    let assistant = assistant_for(&server, Some(API_KEY));
    let news = assistant.get_legal_news().await;
    assert_eq!(news.content, "1. Supreme Court ruling on local government autonomy.");
    assert_eq!(news.sources.len(), 1);
    assert_eq!(news.sources[0].title, "Premium Times");
    assert_eq!(news.sources[0].uri, "https://example.ng/a");
}

#[tokio::test]
async fn speech_requests_audio_and_decodes_pcm() {
    let pcm: Vec<u8> = [0i16, 1000, -1000, 32767]
        .iter()
        .flat_map(|s| s.to_le_bytes())
        .collect();

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash-preview-tts:generateContent"))
        .and(
            body_partial_json(
                json!({
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": { "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": "Kore" } } }
            }
        })
            )
        )
        .respond_with(
            ResponseTemplate::new(200).set_body_json(
                json!({
                "candidates": [{ "content": { "parts": [
                    { "inlineData": { "mimeType": "audio/L16;codec=pcm;rate=24000", "data": STANDARD.encode(&pcm) } }
                ] } }]
            })
            )
        )
        .expect(1)
        .mount(&server).await;

    let assistant = assistant_for(&server, Some(API_KEY));
    let clip = assistant.generate_speech("The court held that...").await.expect("audio clip");
    assert_eq!(clip.sample_rate, 24_000);
    assert_eq!(clip.channels, 1);
    assert_eq!(clip.samples(), vec![0, 1000, -1000, 32767]);
    assert_eq!(clip.to_wav().len(), 44 + pcm.len());
}

#[tokio::test]
async fn document_chat_sends_context_analysis_and_instruction() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-3-pro-preview:generateContent"))
        .respond_with(text_reply("Clause 4 purports to exclude liability for negligence."))
        .mount(&server).await;

    let assistant = assistant_for(&server, Some(API_KEY));
    let document = DocumentContext::new(None, Some("4. The landlord is not liable...".to_string()));
    let mut session = ChatSession::for_document(document, Some("Clause 4 is void due to X.".to_string()));

    let reply = session.send(&assistant, "Explain clause 4").await;
    assert_eq!(reply, "Clause 4 purports to exclude liability for negligence.");
    assert_eq!(session.conversation().len(), 2);

    let bodies = sent_bodies(&server).await;
    let body = &bodies[0];
    let instruction = PromptConfig::default()
        .system_instruction(DOCUMENT_CHAT_INSTRUCTION)
        .unwrap()
        .to_string();
    assert_eq!(body["systemInstruction"]["parts"][0]["text"], instruction);

    let contents = body["contents"].as_array().unwrap();
    assert_eq!(contents.len(), 3);
    assert_eq!(contents[0]["role"], "user");
    assert_eq!(contents[0]["parts"][0]["text"], "Document Content:\n4. The landlord is not liable...");
    assert_eq!(contents[0]["parts"][1]["text"], "Analyze the above document context.");
    assert_eq!(contents[1], json!({ "role": "model", "parts": [{ "text": "Clause 4 is void due to X." }] }));
    assert_eq!(contents[2], json!({ "role": "user", "parts": [{ "text": "Explain clause 4" }] }));
}
