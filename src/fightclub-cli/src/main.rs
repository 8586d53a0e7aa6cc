//! Fight Club CLI - AI Debate Arena
//!
//! Runs a four-agent debate against an OpenAI-compatible API, scores it and
//! optionally writes the transcript and a spoken audio version.

use clap::Parser;
use colored::Colorize;
use fightclub_core::export::{output_filename, save_audio, save_transcript};
use fightclub_core::wav::inspect_wav;
use fightclub_core::{
    AudioConfig, AudioRenderer, Config, DebateError, DebateEvent, DebateOrchestrator,
    OpenAiBackend, OpenAiSpeech, Roster, Scorecard, SpeechBackendKind, SpeechSynthesizer, Turn,
    participant::ROTATION,
};
use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

#[derive(Parser)]
#[command(
    name = "fightclub",
    version,
    about = "AI Agent Fight Club - watch four AIs brawl over a topic",
    long_about = "Runs a moderated debate between four AI agents using OpenAI-compatible APIs, \
                  then scores it and optionally renders it to audio."
)]
struct Cli {
    /// The topic to debate (at least 10 characters)
    #[arg(value_name = "TOPIC")]
    topic: String,

    /// Number of debate rounds
    #[arg(short, long, value_name = "ROUNDS")]
    rounds: Option<u32>,

    /// Path to a TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Language the agents speak
    #[arg(long, value_name = "LANGUAGE")]
    language: Option<String>,

    /// Let the agents swear
    #[arg(long)]
    strong_language: bool,

    /// Model for every agent, overriding the configuration
    #[arg(short, long, value_name = "MODEL")]
    model: Option<String>,

    /// Render the debate to a WAV file (default name derived from the topic)
    #[arg(long, value_name = "PATH", num_args = 0..=1)]
    audio: Option<Option<PathBuf>>,

    /// Write a Markdown transcript (default name derived from the topic)
    #[arg(long, value_name = "PATH", num_args = 0..=1)]
    transcript: Option<Option<PathBuf>>,

    /// Skip the post-debate scorecard
    #[arg(long)]
    no_score: bool,

    /// Run a second bout on the same topic after the verdict
    #[arg(long)]
    rematch: bool,

    /// Swap the debaters' sides for the rematch
    #[arg(long, requires = "rematch")]
    swap_sides: bool,

    /// Verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::new("fightclub_core=debug,fightclub=debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
    };

    // Logs go to stderr so stdout stays the debate itself.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

async fn run(cli: Cli) -> Result<(), DebateError> {
    let config = load_config(&cli)?;

    // Get API configuration from environment
    let api_base = env::var("OPENAI_API_BASE")
        .or_else(|_| env::var("OPENAI_BASE_URL"))
        .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());

    let api_key = env::var("OPENAI_API_KEY").unwrap_or_else(|_| {
        eprintln!(
            "{}",
            "Warning: OPENAI_API_KEY not set. API calls may fail.".yellow()
        );
        String::new()
    });

    let backend = Arc::new(
        OpenAiBackend::new(&api_base, &api_key)?
            .with_analysis_model(config.agents.moderator.model.clone()),
    );

    let orchestrator = DebateOrchestrator::from_config(&config, backend.clone())
        .with_callback(create_console_callback());

    print_header(&cli.topic, &config);
    orchestrator.start(&cli.topic).await?;

    let bouts = if cli.rematch { 2 } else { 1 };
    for bout in 1..=bouts {
        if bout > 1 {
            orchestrator.rematch(cli.swap_sides).await?;
            let note = if cli.swap_sides { " (sides swapped)" } else { "" };
            println!();
            println!("{}", format!("  REMATCH{}", note).bright_red().bold());
        }

        let transcript = match orchestrator.run().await {
            Ok(transcript) => transcript,
            Err(e) => {
                let so_far = orchestrator.transcript().await;
                eprintln!(
                    "{}",
                    format!("Debate stopped after {} turns.", so_far.len()).yellow()
                );
                if let Some(path) = artifact_path(&cli.transcript, &cli.topic, "md", bout) {
                    save_transcript(&path, &cli.topic, &so_far, None)?;
                    eprintln!("Partial transcript saved to {}", path.display());
                }
                return Err(e);
            }
        };

        println!();
        println!("{}", "═".repeat(70).bright_blue());
        println!("{}", "  Debate concluded.".bright_green().bold());
        println!("{}", "═".repeat(70).bright_blue());

        let scorecard = if cli.no_score {
            None
        } else {
            let card = orchestrator.score(backend.as_ref()).await?;
            print_scorecard(&card);
            Some(card)
        };

        if let Some(path) = artifact_path(&cli.transcript, &cli.topic, "md", bout) {
            save_transcript(&path, &cli.topic, &transcript, scorecard.as_ref())?;
            println!("{} {}", "Transcript saved to".bold(), path.display());
        }

        if let Some(path) = artifact_path(&cli.audio, &cli.topic, "wav", bout) {
            let roster = orchestrator
                .config()
                .await
                .map(|c| c.roster)
                .unwrap_or_else(|| config.agents.clone());
            render_audio(&config.audio, &api_base, &api_key, &transcript, &roster, &path).await?;
        }
    }

    println!();
    Ok(())
}

/// Configuration file (or defaults) with command-line overrides applied.
fn load_config(cli: &Cli) -> Result<Config, DebateError> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    if let Some(rounds) = cli.rounds {
        config.debate.rounds = rounds;
    }
    if let Some(language) = &cli.language {
        config.debate.language = language.clone();
    }
    if cli.strong_language {
        config.debate.allow_strong_language = true;
    }
    if let Some(model) = &cli.model {
        config.agents.set_model_for_all(model);
    }

    config.validate()?;
    Ok(config)
}

/// Where to write an artifact, if it was asked for. The rematch gets its own
/// file next to the first bout's.
fn artifact_path(
    requested: &Option<Option<PathBuf>>,
    topic: &str,
    extension: &str,
    bout: u32,
) -> Option<PathBuf> {
    let base = match requested {
        None => return None,
        Some(Some(path)) => path.clone(),
        Some(None) => PathBuf::from(output_filename(topic, extension)),
    };
    if bout == 1 {
        return Some(base);
    }

    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = base
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| extension.to_string());
    Some(base.with_file_name(format!("{} (rematch).{}", stem, ext)))
}

async fn render_audio(
    audio: &AudioConfig,
    api_base: &str,
    api_key: &str,
    transcript: &[Turn],
    roster: &Roster,
    path: &Path,
) -> Result<(), DebateError> {
    let synthesizer = build_synthesizer(audio, api_base, api_key, roster).await?;
    let renderer = AudioRenderer::from_config(synthesizer, audio);

    println!();
    let report = renderer
        .render(transcript, roster, |done, total| {
            print!(
                "\r{} {:>3}% ({}/{})",
                "Rendering audio:".bold(),
                done * 100 / total.max(1),
                done,
                total
            );
            let _ = std::io::stdout().flush();
        })
        .await;
    println!();
    let report = report?;

    for skipped in &report.skipped {
        eprintln!(
            "{}",
            format!("Warning: no audio for {}: {}", skipped.speaker, skipped.error).yellow()
        );
    }

    save_audio(path, &report.wav)?;
    let summary = inspect_wav(&report.wav)?;
    let secs = summary.duration_secs.round() as u64;
    println!(
        "{} {} ({}:{:02}, {}/{} segments)",
        "Audio saved to".bold(),
        path.display(),
        secs / 60,
        secs % 60,
        report.segments,
        report.total
    );
    Ok(())
}

async fn build_synthesizer(
    audio: &AudioConfig,
    api_base: &str,
    api_key: &str,
    roster: &Roster,
) -> Result<Arc<dyn SpeechSynthesizer>, DebateError> {
    match audio.backend {
        SpeechBackendKind::OpenAi => Ok(Arc::new(OpenAiSpeech::new(
            api_base,
            api_key,
            audio.model.clone(),
            audio.timeout(),
        )?)),
        SpeechBackendKind::Kokoro => kokoro_synthesizer(roster).await,
    }
}

#[cfg(feature = "kokoro")]
async fn kokoro_synthesizer(roster: &Roster) -> Result<Arc<dyn SpeechSynthesizer>, DebateError> {
    println!("{}", "Initializing local TTS engine...".dimmed());
    let speech = fightclub_core::KokoroSpeech::new().await?;
    for role in ROTATION {
        let voice = &roster.get(role).voice;
        if !speech.available_voices().iter().any(|v| v == voice) {
            eprintln!(
                "{}",
                format!(
                    "Warning: voice '{}' for {} is not a kokoro voice; that agent will be silent.",
                    voice, role
                )
                .yellow()
            );
        }
    }
    Ok(Arc::new(speech))
}

#[cfg(not(feature = "kokoro"))]
async fn kokoro_synthesizer(_roster: &Roster) -> Result<Arc<dyn SpeechSynthesizer>, DebateError> {
    Err(DebateError::ConfigError(
        "audio.backend = \"kokoro\" needs a build with the `kokoro` feature".to_string(),
    ))
}

fn print_header(topic: &str, config: &Config) {
    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!(
        "{}",
        format!("  {} - {} rounds", "AI AGENT FIGHT CLUB".bold(), config.debate.rounds)
            .bright_blue()
            .bold()
    );
    println!("{}", "═".repeat(70).bright_blue());
    println!();
    println!("{} {}", "Topic:".bold(), topic.bright_white());
    println!();
    println!("{}", "Fighters:".bold());
    for (i, role) in ROTATION.iter().enumerate() {
        let agent = config.agents.get(*role);
        println!(
            "  {}. {} ({}) - using {}",
            i + 1,
            agent.name.bright_cyan(),
            role.display_name().yellow(),
            agent.model.dimmed()
        );
    }
    println!();
    println!("{}", "─".repeat(70).dimmed());
}

fn print_scorecard(card: &Scorecard) {
    println!();
    println!("{}", "  SCORECARD".bright_yellow().bold());
    println!("{}", "─".repeat(70).dimmed());

    match &card.most_cited {
        Some(leader) => println!(
            "  {} {} ({} sources)",
            "Most cited:".bold(),
            leader.speaker.bright_cyan(),
            leader.citations
        ),
        None => println!("  {} {}", "Most cited:".bold(), "nobody".dimmed()),
    }
    if let Some(fav) = &card.audience_favorite {
        println!(
            "  {} {}",
            "Audience favorite:".bold(),
            fav.speaker.bright_cyan()
        );
    }
    if let Some(h) = &card.savage_takedown {
        println!(
            "  {} {}: \"{}\"",
            "Savage takedown:".bold(),
            h.speaker.bright_cyan(),
            h.quote.italic()
        );
    }
    if let Some(h) = &card.wildest_non_sequitur {
        println!(
            "  {} {}: \"{}\"",
            "Wildest non-sequitur:".bold(),
            h.speaker.bright_cyan(),
            h.quote.italic()
        );
    }
    println!();
}

/// Create a callback that prints debate events to the console.
fn create_console_callback() -> Box<dyn Fn(DebateEvent) + Send + Sync> {
    Box::new(move |event| match event {
        DebateEvent::DebateStart { topic, rounds } => {
            debug!(%topic, rounds, "debate started");
        }
        DebateEvent::RoundStart { round, total } => {
            println!();
            println!("{}", "═".repeat(70).bright_magenta());
            println!(
                "{}",
                format!("  ROUND {} OF {}", round, total)
                    .bright_magenta()
                    .bold()
            );
            println!("{}", "═".repeat(70).bright_magenta());
            println!();
        }
        DebateEvent::SpeakerStart {
            name,
            role,
            verdict,
        } => {
            if verdict {
                println!();
                println!("{}", "  FINAL VERDICT".bright_yellow().bold());
                println!();
            }
            println!(
                "{} {} {}",
                "▶".bright_cyan(),
                name.bright_cyan().bold(),
                format!("({})", role).yellow()
            );
        }
        DebateEvent::SpeakerMessage { turn } => {
            // Word wrap and indent the content
            let wrapped = textwrap(&turn.text, 66);
            for line in wrapped.lines() {
                println!("  {}", line);
            }
            for source in &turn.sources {
                println!("    {} {}", "↳".dimmed(), source.uri.dimmed());
            }
            println!();
        }
        DebateEvent::Halted { reason } => {
            eprintln!("{} {}", "Debate halted:".red().bold(), reason);
        }
        DebateEvent::DebateEnd => {
            // Handled in run
        }
    })
}

/// Simple text wrapping function.
fn textwrap(text: &str, width: usize) -> String {
    let mut result = String::new();
    let mut current_line_len = 0;

    for word in text.split_whitespace() {
        if current_line_len + word.len() + 1 > width && current_line_len > 0 {
            result.push('\n');
            current_line_len = 0;
        }
        if current_line_len > 0 {
            result.push(' ');
            current_line_len += 1;
        }
        result.push_str(word);
        current_line_len += word.len();
    }

    result
}
