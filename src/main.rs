use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use voicestream_gateway::api::ApiServerBuilder;
use voicestream_gateway::voice::{
    DEFAULT_MIME_TYPE, OpenAiApi, SpeechSynthesizer, StagingArea, Synthesizer, WhisperTranscriber,
    resolve_format, transcribe_buffer,
};
use voicestream_gateway::{Config, SessionManager, SessionRegistry, VoicePipeline};

/// Voicestream - speech in, conversational speech out
#[derive(Parser)]
#[command(name = "voicestream", version, about)]
struct Cli {
    /// Port to listen on (overrides PORT / config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Synthesize text with the configured voice and write it to a file
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a text to speech test.")]
        text: String,
        /// Output file (MP3)
        #[arg(short, long, default_value = "voicestream-test.mp3")]
        out: PathBuf,
    },
    /// Transcribe an audio file with the configured STT model
    TestStt {
        /// Audio file to transcribe
        path: PathBuf,
        /// Declared MIME type of the file
        #[arg(short, long, default_value = DEFAULT_MIME_TYPE)]
        mime: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,voicestream_gateway=info",
        1 => "info,voicestream_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load()?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestTts { text, out } => test_tts(&config, &text, &out).await,
            Command::TestStt { path, mime } => test_stt(&config, &path, &mime).await,
        };
    }

    if config.has_api_key() {
        tracing::info!("OpenAI API key is configured");
    } else {
        tracing::warn!("OPENAI_API_KEY is not set. Voice processing will not work properly.");
    }

    let pipeline = VoicePipeline::from_config(&config)?;
    tracing::info!(
        staging_dir = %pipeline.staging().dir().display(),
        stt_model = %config.voice.stt_model,
        llm_model = %config.voice.llm_model,
        tts_model = %config.voice.tts_model,
        "voice pipeline ready"
    );

    let registry = SessionRegistry::new();
    let manager = SessionManager::new(registry, Arc::new(pipeline))
        .with_policy(config.voice.unknown_session);

    let port = cli.port.unwrap_or(config.api_server.port);
    ApiServerBuilder::new(Arc::new(manager), port)
        .api_key_configured(config.has_api_key())
        .static_dir(config.api_server.static_dir.clone())
        .build()
        .run()
        .await?;

    Ok(())
}

/// Synthesize `text` and write the audio to `out`
async fn test_tts(config: &Config, text: &str, out: &Path) -> anyhow::Result<()> {
    require_key(config)?;
    println!("Testing TTS with text: \"{text}\"\n");

    let api = OpenAiApi::from_config(config)?;
    let tts = SpeechSynthesizer::new(
        api,
        config.voice.tts_model.clone(),
        config.voice.tts_voice.clone(),
        config.voice.tts_speed,
    );

    let audio = tts.synthesize(text).await?;
    println!("Got {} bytes of audio data", audio.len());

    std::fs::write(out, &audio)?;
    println!("Wrote {}", out.display());
    Ok(())
}

/// Transcribe the file at `path`
async fn test_stt(config: &Config, path: &Path, mime: &str) -> anyhow::Result<()> {
    require_key(config)?;

    let data = std::fs::read(path)?;
    let extension = resolve_format(mime)?;
    println!(
        "Transcribing {} ({} bytes, .{extension})...",
        path.display(),
        data.len()
    );

    let api = OpenAiApi::from_config(config)?;
    let transcriber = WhisperTranscriber::new(api, config.voice.stt_model.clone());
    let staging = config
        .voice
        .staging_dir
        .clone()
        .map_or_else(StagingArea::default, StagingArea::new);

    let text = transcribe_buffer(&transcriber, &staging, &data, extension).await?;
    println!("Transcript: {text}");
    Ok(())
}

fn require_key(config: &Config) -> anyhow::Result<()> {
    if !config.has_api_key() {
        anyhow::bail!("OPENAI_API_KEY is not set");
    }
    Ok(())
}
