//! Solace console binary - composition root.
//!
//! Ties the crates together into a single interactive executable:
//! 1. Load configuration from TOML (flags > env > file > defaults)
//! 2. Build the streaming dispatcher with its HTTP fallback
//! 3. Wire semantic search enrichment and the assessment client
//! 4. Run the console loop: plain lines are chat messages, slash
//!    commands drive assessments and voice mode

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use solace_assessment::{AssessmentEngine, HttpAssessmentClient};
use solace_context::{ContextEnricher, HttpSearchClient};
use solace_core::config::SolaceConfig;
use solace_core::types::AssessmentProgress;
use solace_engine::ChatEngine;
use solace_stream::{ConnectionManager, FallbackClient, RequestDispatcher, StreamEvent};
use solace_voice::{VoiceMode, VoiceOrchestrator};

mod cli;
mod console;

use cli::CliArgs;
use console::{ConsoleRecognizer, ConsoleSynthesizer};

fn print_question(progress: &AssessmentProgress) {
    match &progress.current_question {
        Some(question) => {
            let step = match progress.total_questions {
                Some(total) => format!(" ({}/{total})", progress.current_step),
                None => String::new(),
            };
            println!("[assessment{step}] {}", question.text);
            for (i, option) in question.options.iter().enumerate() {
                println!("  {}. {option}", i + 1);
            }
        }
        None => println!("[assessment] complete, thank you"),
    }
}

fn print_help() {
    println!("  <text>                 send a message");
    println!("  /assessment <cat> [id] start a guided assessment");
    println!("  /answer <text>         answer the current assessment question");
    println!("  /cancel                abandon the assessment");
    println!("  /voice [fluid|script]  run a voice exchange (console speech)");
    println!("  /mute, /unmute         toggle the voice devices");
    println!("  /restart               start a fresh session");
    println!("  /quit                  exit");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config first: the log level may come from it.
    let config_file = args.resolve_config_path();
    let config = SolaceConfig::load_or_default(&config_file);

    // Tracing.
    let log_level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    tracing::info!("Starting Solace v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    let stream_url = args.resolve_stream_url(&config.backend.stream_url);
    let chat_url = args.resolve_chat_url(&config.backend.chat_url);
    tracing::info!(stream = %stream_url, fallback = %chat_url, "Backend endpoints resolved");

    // Streaming dispatcher with HTTP fallback.
    let http = reqwest::Client::new();
    let connection = ConnectionManager::new(stream_url);
    let fallback = FallbackClient::new(
        http.clone(),
        chat_url,
        Duration::from_millis(config.backend.request_timeout_ms),
    );
    let (dispatcher, mut events) = RequestDispatcher::new(connection, fallback, &config.backend);

    // Incremental chunk printing while a reply streams in.
    tokio::spawn(async move {
        while let Some((event, _id)) = events.recv().await {
            match event {
                StreamEvent::Chunk(chunk) => {
                    print!("{chunk}");
                    let _ = std::io::stdout().flush();
                }
                StreamEvent::Reset => {
                    // The text printed so far was superseded; start the
                    // reply over on a fresh line.
                    println!("\n[connection lost, starting the reply over]");
                }
                StreamEvent::End => println!(),
                StreamEvent::Error(message) => println!("\n[stream error] {message}"),
            }
        }
    });

    // Enrichment and assessment.
    let search = Arc::new(HttpSearchClient::new(http.clone(), &config.search));
    let enricher = ContextEnricher::new(search, config.search.limit);
    let assessment = AssessmentEngine::new(Arc::new(HttpAssessmentClient::new(
        http,
        &config.assessment,
    )));

    let engine = Arc::new(ChatEngine::new(enricher, dispatcher, assessment));
    let session = engine.session();
    println!("session {} started, /help for commands", session.session_id);

    // Voice mode speaks through the console.
    let stdin = console::shared_stdin();
    let mut voice = VoiceOrchestrator::new(
        Arc::new(ConsoleRecognizer::new(stdin.clone())),
        Arc::new(ConsoleSynthesizer),
        engine.clone(),
        config.voice.clone(),
    );

    loop {
        print!("> ");
        let _ = std::io::stdout().flush();
        let line = match stdin.lock().await.next_line().await? {
            Some(line) => line.trim().to_string(),
            None => break,
        };
        if line.is_empty() {
            continue;
        }

        let Some(command) = line.strip_prefix('/') else {
            match engine.send(&line).await {
                Ok(reply) => {
                    if reply.is_crisis == Some(true) {
                        println!("[please reach out to someone you trust, or a crisis line]");
                    }
                    if !reply.suggestions.is_empty() {
                        println!("[suggestions] {}", reply.suggestions.join(" | "));
                    }
                    if let Some(question) = &reply.assessment_question {
                        println!("[assessment offer] {}", question.text);
                    }
                }
                Err(e) => println!("[error] {e}"),
            }
            continue;
        };

        let mut parts = command.split_whitespace();
        match parts.next() {
            Some("quit") | Some("q") => {
                engine.disconnect().await;
                break;
            }
            Some("restart") => {
                let session = engine.restart_session().await;
                println!("new session {}", session.session_id);
            }
            Some("assessment") => {
                let category = parts.next().unwrap_or("general");
                let sub_category = parts.next().unwrap_or("default");
                match engine.start_assessment(category, sub_category).await {
                    Ok(progress) => print_question(&progress),
                    Err(e) => println!("[error] {e}"),
                }
            }
            Some("answer") => {
                let answer = command.trim_start_matches("answer").trim();
                match engine.respond_assessment(answer).await {
                    Ok(progress) => print_question(&progress),
                    Err(e) => println!("[error] {e}"),
                }
            }
            Some("cancel") => {
                engine.cancel_assessment().await;
                println!("assessment cancelled");
            }
            Some("voice") => {
                if voice.is_muted() {
                    println!("[voice is muted, /unmute first]");
                    continue;
                }
                let result = match parts.next() {
                    Some("fluid") => {
                        voice.set_mode(VoiceMode::Fluid);
                        voice.run_fluid().await
                    }
                    Some("script") => {
                        voice.set_mode(VoiceMode::TestScript);
                        voice.run_test_script().await
                    }
                    _ => {
                        voice.set_mode(VoiceMode::Manual);
                        voice.run_cycle().await.map(|_| ())
                    }
                };
                if let Err(e) = result {
                    println!("[error] {e}");
                }
            }
            Some("mute") => voice.toggle_mute(true).await,
            Some("unmute") => voice.toggle_mute(false).await,
            _ => print_help(),
        }
    }

    tracing::info!("Goodbye");
    Ok(())
}
