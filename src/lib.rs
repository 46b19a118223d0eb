pub mod agent;
pub mod audio;
pub mod cli;
pub mod config;
pub mod history;
pub mod llm;
pub mod models;
pub mod records;
pub mod server;
pub mod session;
pub mod websocket;

use agent::LegalAssistant;
use audio::{ speech_excerpt, AudioPlayer };
use cli::{ Args, Command };
use history::DocumentContext;
use log::{ info, warn };
use models::content::InlineData;
use records::blog::BlogBoard;
use records::courts;
use server::Server;
use session::{ ChatSession, CHAT_GREETING };
use std::error::Error;
use std::path::Path;
use tokio::io::{ AsyncBufReadExt, BufReader };

const QUIT_COMMAND: &str = "/quit";

fn image_mime_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

async fn read_image(path: &Path) -> Result<InlineData, Box<dyn Error + Send + Sync>> {
    let mime_type = image_mime_type(path).ok_or_else(||
        format!("Unsupported image type: {}", path.display())
    )?;
    let data = tokio::fs::read(path).await?;
    Ok(InlineData::new(mime_type, data))
}

fn require(field: &str, value: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
    if value.trim().is_empty() {
        return Err(format!("'{}' must not be empty", field).into());
    }
    Ok(())
}

/// Reads lines from stdin and sends each to `session` until EOF or `/quit`.
async fn chat_loop(
    assistant: &LegalAssistant,
    mut session: ChatSession
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("(type {} to leave)", QUIT_COMMAND);
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line == QUIT_COMMAND {
            break;
        }
        if line.is_empty() {
            continue;
        }
        let reply = session.send(assistant, line).await;
        println!("\n{}\n", reply);
    }
    Ok(())
}

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Gateway URL: {}", args.gateway_url());
    info!("API Key Set: {}", !args.api_key.trim().is_empty());
    info!("Pro Model: {}", args.pro_model);
    info!("Lite Model: {}", args.lite_model);
    info!("News Model: {}", args.news_model);
    info!("TTS Model: {} ({})", args.tts_model, args.tts_voice);
    info!("Thinking Budget: {}", args.thinking_budget);
    info!("Prompts Path: {}", args.prompts_path.as_deref().unwrap_or("<built-in>"));
    info!("-------------------------");

    let assistant = LegalAssistant::from_args(&args)?;

    match args.command.clone() {
        Command::Research { query } => {
            require("query", &query)?;
            println!("{}", assistant.conduct_deep_research(&query).await);
        }
        Command::Analyze { text, image, chat } => {
            let image = match image {
                Some(path) => Some(read_image(&path).await?),
                None => None,
            };
            let analysis = assistant.analyze_document(&text, image.as_ref()).await;
            println!("{}", analysis);

            if chat {
                let document = DocumentContext::from_input(image, &text);
                let session = ChatSession::for_document(document, Some(analysis));
                chat_loop(&assistant, session).await?;
            }
        }
        Command::Predict { facts } => {
            require("facts", &facts)?;
            println!("{}", assistant.predict_case_outcome(&facts).await);
        }
        Command::Draft { document_type, details } => {
            require("doc-type", &document_type)?;
            require("details", &details)?;
            println!("{}", assistant.draft_legal_document(&document_type, &details).await);
        }
        Command::Lookup { term } => {
            require("term", &term)?;
            println!("{}", assistant.quick_legal_lookup(&term).await);
        }
        Command::News => {
            let news = assistant.get_legal_news().await;
            println!("{}", news.content);
            if !news.sources.is_empty() {
                println!("\nSources:");
                for source in &news.sources {
                    println!("- {} <{}>", source.title, source.uri);
                }
            }
        }
        Command::Blog { topic } => {
            require("topic", &topic)?;
            let article = assistant.write_blog_article(&topic).await;
            println!("{}\n", article);

            let mut board = BlogBoard::with_samples();
            board.publish(&topic, websocket::BLOG_AUTHOR, &article);
            println!("Posts:");
            for post in board.posts() {
                println!("- {} ({})", post.title, post.author);
            }
        }
        Command::Courts { search } => {
            let results = courts::search(search.as_deref().unwrap_or(""));
            if results.is_empty() {
                println!("No courts match.");
            }
            for court in results {
                println!(
                    "{} | {} | {:?} | {}",
                    court.name,
                    court.jurisdiction,
                    court.kind,
                    court.location
                );
            }
        }
        Command::Speak { text, output, play } => {
            require("text", &text)?;
            let Some(clip) = assistant.generate_speech(&speech_excerpt(&text)).await else {
                return Err("Unable to generate speech.".into());
            };
            if let Some(path) = &output {
                tokio::fs::write(path, clip.to_wav()).await?;
                info!("Wrote {:.1}s of speech to {}", clip.duration_secs(), path.display());
            }
            if play || output.is_none() {
                let mut player = AudioPlayer::new(&args.audio_player);
                player.play(&clip).await?;
                player.wait().await?;
            }
        }
        Command::Chat => {
            println!("{}", CHAT_GREETING);
            chat_loop(&assistant, ChatSession::general()).await?;
        }
        Command::Serve => {
            if args.api_key.trim().is_empty() {
                warn!("GEMINI_API_KEY is not set; model-backed features will return fallback text.");
            }
            let addr = args.server_addr.clone();
            info!("Starting server on: {}", addr);
            let server = Server::new(
                addr,
                assistant,
                args.server_api_key.clone(),
                args.prompts_path.clone()
            ).with_max_message_size(args.max_message_size);
            server.run().await?;
        }
    }

    Ok(())
}
