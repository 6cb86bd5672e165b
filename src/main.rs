use anyhow::{Context, Result};
use clap::Parser;
use loqa_interview::{
    create_router, run_console, spawn_line_reader, AppState, AudioOutput, AudioSource,
    CaptureRecorder, Config, HttpAudioPlayer, HttpInterviewClient, InterviewConfig,
    InterviewSession, PacedOutput, SessionEvent, SessionHandle, SessionId,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Run one voice interview session against the interview service
#[derive(Debug, Parser)]
#[command(name = "loqa-interview", version)]
struct Args {
    /// Session identifier issued by the interview service
    session_id: String,

    /// Configuration file (extension optional)
    #[arg(short, long, default_value = "config/interview-client")]
    config: String,

    /// Override the service API root
    #[arg(long)]
    base_url: Option<String>,

    /// Answer source: `microphone` or a WAV file to replay
    #[arg(short, long)]
    input: Option<String>,

    /// Playback: `speaker` or `paced`
    #[arg(short, long)]
    output: Option<String>,

    /// Serve the local control API for a UI
    #[arg(long)]
    serve: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut cfg = Config::load(&args.config)?;

    if let Some(base_url) = args.base_url {
        cfg.service.base_url = base_url;
    }
    if let Some(input) = args.input {
        cfg.audio.input = input;
    }
    if let Some(output) = args.output {
        cfg.audio.output = output;
    }

    info!("Loqa Interview v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);
    info!("Interview service: {}", cfg.service.base_url);

    let api = Arc::new(HttpInterviewClient::new(
        &cfg.service.base_url,
        cfg.request_timeout(),
    )?);
    let player = Arc::new(HttpAudioPlayer::new(create_output(&cfg.audio.output)));

    let source = cfg.audio.source();
    if let AudioSource::File(path) = &source {
        info!("Answers will be replayed from {}", path.display());
    }
    let recorder = Arc::new(CaptureRecorder::new(source, cfg.audio.backend_config()));

    let mut interview = InterviewConfig::new(SessionId::new(args.session_id));
    interview.clarification_delay = cfg.timing.clarification_delay();
    interview.skip_delay = cfg.timing.skip_delay();

    let session = InterviewSession::new(interview, api, player, recorder);
    let handle = session.handle();

    if args.serve {
        let addr = format!("{}:{}", cfg.http.bind, cfg.http.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind control API on {}", addr))?;
        info!("Control API listening on http://{}", addr);

        let app = create_router(AppState::new(handle.clone()));
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("Control API stopped: {}", e);
            }
        });
    }

    tokio::spawn(print_events(handle.clone()));
    // Stdin is read off the runtime so shutdown never waits for a keypress
    let input = std::io::BufReader::new(std::io::stdin());
    tokio::spawn(run_console(handle, spawn_line_reader(input)));

    println!("Commands: [Enter] stop & submit answer, r = retry, e = end interview, q = quit");

    match session.run().await {
        Ok(record) => {
            println!("\nInterview complete.");
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        Err(e) => {
            warn!("Interview did not complete: {}", e);
            Ok(())
        }
    }
}

fn create_output(kind: &str) -> Arc<dyn AudioOutput> {
    match kind {
        "paced" => Arc::new(PacedOutput::new()),
        _ => speaker_output(),
    }
}

#[cfg(feature = "backend-cpal")]
fn speaker_output() -> Arc<dyn AudioOutput> {
    match loqa_interview::audio::CpalOutput::new() {
        Ok(output) => Arc::new(output),
        Err(e) => {
            warn!("Speaker unavailable ({}), falling back to paced output", e);
            Arc::new(PacedOutput::new())
        }
    }
}

#[cfg(not(feature = "backend-cpal"))]
fn speaker_output() -> Arc<dyn AudioOutput> {
    warn!("Built without 'backend-cpal'; audio is paced but not audible");
    Arc::new(PacedOutput::new())
}

async fn print_events(handle: SessionHandle) {
    let mut events = handle.subscribe();

    while let Ok(event) = events.recv().await {
        match event {
            SessionEvent::Status(status) => {
                if let Some(question) = &status.question {
                    if status.phase == loqa_interview::Phase::PlayingQuestion {
                        println!("\nQ{} [{}]: {}", question.id, question.level, question.text);
                    }
                }
                match &status.error {
                    Some(error) => println!("!! {} (r = retry, e = end)", error),
                    None => println!("-- {}", status.message),
                }
            }
            SessionEvent::Finished => println!("-- Interview finished, fetching result..."),
            SessionEvent::Completed(_) => break,
        }
    }
}
